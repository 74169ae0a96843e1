use std::collections::BTreeMap;
use std::io::{BufReader, BufWriter, Write};
use std::net::{IpAddr, Ipv4Addr, TcpStream};
use std::path::PathBuf;
use std::thread;

use playmaker_server::prelude::*;
use playmaker_server::protocol;
use tracing::{Level, Metadata};
use tracing_subscriber::{
    fmt,
    layer::{Context, Filter, SubscriberExt},
    Layer, Registry,
};

struct CustomLevelFilter;
impl<S> Filter<S> for CustomLevelFilter {
    fn enabled(&self, meta: &Metadata<'_>, _cx: &Context<'_, S>) -> bool {
        meta.level() <= &Level::DEBUG
    }
}

fn init_debug_logger() {
    let format = fmt::format()
        .without_time()
        .with_ansi(true)
        .with_level(true)
        .with_thread_names(true)
        .with_target(false);

    let reg = Registry::default().with(
        fmt::layer()
            .event_format(format)
            .with_test_writer()
            .with_filter(CustomLevelFilter),
    );

    let _ = tracing::subscriber::set_global_default(reg);
}

fn local_config() -> Configuration {
    Configuration::new()
        .with_host(IpAddr::V4(Ipv4Addr::LOCALHOST))
        .with_rpc_port(0)
}

fn start() -> ServerHandle {
    init_debug_logger();
    Server::new(local_config()).start().unwrap()
}

fn error_kind(err: &anyhow::Error) -> ErrorKind {
    err.downcast_ref::<ErrorReply>()
        .unwrap_or_else(|| panic!("not an error reply: {err:?}"))
        .kind
}

fn world(cycle: i64) -> WorldSnapshot {
    WorldSnapshot {
        cycle,
        ..Default::default()
    }
}

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("playmaker-it-{}-{name}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

#[test]
fn concurrent_registrations_get_consecutive_ids() {
    let handle = start();
    let addr = handle.local_addr();

    let agents: Vec<_> = (1..=11)
        .map(|unum| {
            thread::spawn(move || {
                let mut agent = AgentClient::connect(addr).unwrap();
                let me = agent.register("CLS", unum, AgentType::Player).unwrap();
                assert_eq!(me.uniform_number, unum);
                me.client_id
            })
        })
        .collect();
    let mut ids: Vec<u64> = agents.into_iter().map(|a| a.join().unwrap()).collect();
    ids.sort_unstable();

    assert_eq!(ids, (1..=11).collect::<Vec<_>>());
    assert_eq!(handle.registry().tally().unwrap().issued, 11);
}

#[test]
fn decision_before_register_does_not_count() {
    let handle = start();
    let mut agent = AgentClient::connect(handle.local_addr()).unwrap();

    let impostor = ClientIdentity {
        client_id: 1,
        team_name: "CLS".to_owned(),
        uniform_number: 1,
        agent_type: AgentType::Player,
    };
    let reply = agent
        .call(&Request::GetPlayerActions(State {
            register_response: impostor,
            world_model: world(1),
        }))
        .unwrap();
    match reply {
        Reply::Error(e) => assert_eq!(e.kind, ErrorKind::Protocol),
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(handle.registry().tally().unwrap().issued, 0);

    // the connection is still usable
    let me = agent.register("CLS", 1, AgentType::Player).unwrap();
    assert_eq!(me.client_id, 1);
}

#[test]
fn player_follows_play_mode_and_ball_control() {
    let handle = start();
    let mut agent = AgentClient::connect(handle.local_addr()).unwrap();
    agent.register("CLS", 9, AgentType::Player).unwrap();

    let kick_off = agent.player_actions(world(0)).unwrap();
    assert_eq!(kick_off.actions, vec![PlayerAction::SetPlayBehavior]);

    let mut with_ball = world(1);
    with_ball.game_mode_type = GameModeType::PlayOn;
    with_ball.myself.is_kickable = true;
    let attack = agent.player_actions(with_ball).unwrap();
    assert_eq!(
        attack.actions,
        vec![
            PlayerAction::OffensivePlannerBehavior(OffensivePlannerFlags::all()),
            PlayerAction::ShootBehavior,
        ]
    );

    let err = agent.coach_actions(world(2)).unwrap_err();
    assert_eq!(error_kind(&err), ErrorKind::Protocol);

    let err = agent.player_actions(world(0)).unwrap_err();
    assert_eq!(error_kind(&err), ErrorKind::Validation);

    agent.bye().unwrap();
}

#[test]
fn coach_and_trainer_flows() {
    let handle = start();
    let addr = handle.local_addr();

    let mut coach = AgentClient::connect(addr).unwrap();
    coach.register("CLS", 0, AgentType::Coach).unwrap();
    assert_eq!(
        coach.coach_actions(world(10)).unwrap().actions,
        vec![CoachAction::SubstituteBehavior]
    );

    let mut trainer = AgentClient::connect(addr).unwrap();
    trainer.register("CLS", 0, AgentType::Trainer).unwrap();
    let mut drill = world(98);
    drill.teammates.push(PlayerState {
        position: Vector2D::new(-5.0, 3.0),
        uniform_number: 4,
        is_goalie: false,
    });
    assert!(trainer.trainer_actions(drill.clone()).unwrap().is_empty());

    drill.cycle = 99;
    let actions = trainer.trainer_actions(drill).unwrap().actions;
    let target = Vector2D::new(5.0, 13.0);
    assert_eq!(
        actions,
        vec![
            TrainerAction::MoveBall {
                position: target,
                velocity: Vector2D::zero(),
            },
            TrainerAction::MovePlayer {
                our_side: true,
                uniform_number: 4,
                position: target,
                body_direction: 0.0,
            },
            TrainerAction::ChangeMode {
                game_mode_type: GameModeType::PlayOn,
            },
        ]
    );

    coach.bye().unwrap();
    trainer.bye().unwrap();
    let tally = handle.registry().tally().unwrap();
    assert_eq!((tally.issued, tally.departed), (2, 2));
}

#[test]
fn planner_picks_furthest_root_action() {
    let handle = start();
    let mut agent = AgentClient::connect(handle.local_addr()).unwrap();
    agent.register("CLS", 10, AgentType::Player).unwrap();

    let entry = |index: i32, parent_index: i32, x: f64| {
        let mut entry = PlannerEntry {
            index,
            ..Default::default()
        };
        entry.candidate_action.index = index;
        entry.candidate_action.parent_index = parent_index;
        entry.predicted_state.ball_position = Vector2D::new(x, 0.0);
        (index, entry)
    };
    let pairs: BTreeMap<_, _> = [entry(0, -1, 12.0), entry(1, 0, 50.0), entry(2, -1, 30.0)]
        .into_iter()
        .collect();

    let best = agent.best_planner_action(pairs, world(5)).unwrap();
    assert_eq!(best.index, 2);

    let err = agent
        .best_planner_action(BTreeMap::new(), world(6))
        .unwrap_err();
    assert_eq!(error_kind(&err), ErrorKind::Validation);
}

#[test]
fn bye_closes_the_connection() {
    let handle = start();
    let stream = TcpStream::connect(handle.local_addr()).unwrap();
    let mut reader = BufReader::new(stream.try_clone().unwrap());
    let mut writer = BufWriter::new(stream);

    protocol::send(
        &mut writer,
        &Request::Register(RegisterRequest {
            team_name: "CLS".to_owned(),
            uniform_number: 2,
            agent_type: AgentType::Player,
        }),
    )
    .unwrap();
    let Some(Reply::Registered(me)) = protocol::receive(&mut reader).unwrap() else {
        panic!("registration failed");
    };

    protocol::send(&mut writer, &Request::SendByeCommand(me)).unwrap();
    assert_eq!(protocol::receive::<_, Reply>(&mut reader).unwrap(), Some(Reply::Empty));
    assert_eq!(protocol::receive::<_, Reply>(&mut reader).unwrap(), None);
    assert_eq!(handle.registry().tally().unwrap().departed, 1);
}

#[test]
fn malformed_frame_is_answered_and_connection_survives() {
    let handle = start();
    let stream = TcpStream::connect(handle.local_addr()).unwrap();
    let mut reader = BufReader::new(stream.try_clone().unwrap());
    let mut writer = BufWriter::new(stream);

    protocol::write_frame(&mut writer, br#"{"method":"Kick","params":{}}"#).unwrap();
    writer.flush().unwrap();
    match protocol::receive::<_, Reply>(&mut reader).unwrap() {
        Some(Reply::Error(e)) => assert_eq!(e.kind, ErrorKind::Protocol),
        other => panic!("unexpected {other:?}"),
    }

    protocol::send(
        &mut writer,
        &Request::Register(RegisterRequest {
            team_name: "CLS".to_owned(),
            uniform_number: 0,
            agent_type: AgentType::Coach,
        }),
    )
    .unwrap();
    assert!(matches!(
        protocol::receive::<_, Reply>(&mut reader).unwrap(),
        Some(Reply::Registered(_))
    ));
}

#[test]
fn parameters_are_accepted_before_registration() {
    let handle = start();
    let mut agent = AgentClient::connect(handle.local_addr()).unwrap();
    let anonymous = ClientIdentity {
        client_id: 0,
        team_name: String::new(),
        uniform_number: 0,
        agent_type: AgentType::Player,
    };

    let values = serde_json::json!({ "ball_speed_max": 3.0 });
    let server_param = playmaker_server::params::ServerParam {
        register_response: anonymous,
        values: values.as_object().cloned().unwrap_or_default(),
    };
    assert_eq!(
        agent.call(&Request::SendServerParams(server_param)).unwrap(),
        Reply::Empty
    );
    assert_eq!(handle.registry().tally().unwrap().issued, 0);
}

#[test]
fn agent_logs_are_written_per_identity() {
    init_debug_logger();
    let dir = scratch_dir("agent-logs");
    let handle = Server::new(local_config().with_log_dir(Some(dir.clone())))
        .start()
        .unwrap();

    let mut agent = AgentClient::connect(handle.local_addr()).unwrap();
    agent.register("CLS", 5, AgentType::Player).unwrap();
    agent.player_actions(world(42)).unwrap();
    agent.bye().unwrap();

    let log = std::fs::read_to_string(dir.join("CLS_player_5.log")).unwrap();
    assert!(log.contains("Cycle 42 : "), "{log}");
    assert!(log.ends_with("\n\n"));
}

#[test]
fn servers_share_ids_through_counter_file() {
    init_debug_logger();
    let state = scratch_dir("counter").join("client_counter");
    let config = local_config().with_counter_file(Some(state.clone()));
    let first = Server::new(config.clone()).start().unwrap();
    let second = Server::new(config).start().unwrap();

    let mut ids = Vec::new();
    for handle in [&first, &second, &first] {
        let mut agent = AgentClient::connect(handle.local_addr()).unwrap();
        ids.push(agent.register("CLS", 1, AgentType::Player).unwrap().client_id);
    }
    assert_eq!(ids, vec![1, 2, 3]);
    assert_eq!(std::fs::read_to_string(&state).unwrap(), "3 0\n");
}

#[test]
fn stalled_and_dropped_agents_do_not_affect_others() {
    let handle = start();
    let addr = handle.local_addr();
    let register = |unum: u32| {
        Request::Register(RegisterRequest {
            team_name: "CLS".to_owned(),
            uniform_number: unum,
            agent_type: AgentType::Player,
        })
    };

    // registers, then stops halfway through the next frame header and stays connected
    let mut stalled = TcpStream::connect(addr).unwrap();
    let mut stalled_reader = BufReader::new(stalled.try_clone().unwrap());
    protocol::send(&mut stalled, &register(1)).unwrap();
    assert!(matches!(
        protocol::receive::<_, Reply>(&mut stalled_reader).unwrap(),
        Some(Reply::Registered(me)) if me.client_id == 1
    ));
    stalled.write_all(&[0x20, 0x00]).unwrap();
    stalled.flush().unwrap();

    // registers, then goes away in the middle of a frame body
    {
        let mut dropped = TcpStream::connect(addr).unwrap();
        let mut dropped_reader = BufReader::new(dropped.try_clone().unwrap());
        protocol::send(&mut dropped, &register(2)).unwrap();
        assert!(matches!(
            protocol::receive::<_, Reply>(&mut dropped_reader).unwrap(),
            Some(Reply::Registered(me)) if me.client_id == 2
        ));
        dropped.write_all(&64u32.to_le_bytes()).unwrap();
        dropped.write_all(br#"{"method":"GetPl"#).unwrap();
        dropped.flush().unwrap();
    }

    let mut healthy = AgentClient::connect(addr).unwrap();
    let me = healthy.register("CLS", 3, AgentType::Player).unwrap();
    assert_eq!(me.client_id, 3);
    let actions = healthy.player_actions(world(1)).unwrap();
    assert_eq!(actions.actions, vec![PlayerAction::SetPlayBehavior]);

    let tally = handle.registry().tally().unwrap();
    assert_eq!((tally.issued, tally.departed), (3, 0));
    drop(stalled);
}
