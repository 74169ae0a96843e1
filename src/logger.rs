use std::fs::{self, File};
use std::path::{Path, PathBuf};

use anyhow::Context;
use time::{
    format_description::{self, parse},
    OffsetDateTime, UtcOffset,
};
use tracing::subscriber::set_global_default;
use tracing_subscriber::{fmt::writer::BoxMakeWriter, EnvFilter, FmtSubscriber};

use crate::configuration::Configuration;

/// Install the global tracing subscriber.
///
/// Verbosity comes from `RUST_LOG` (default `info`). With [`Configuration::with_log_file`] the
/// output goes to a timestamped file instead of stdout.
///
/// Call this before spawning threads: the local UTC offset can only be read reliably while
/// the process is single-threaded.
pub fn init_logger(config: &Configuration) -> anyhow::Result<()> {
    let local_offset = UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC);
    let timer = tracing_subscriber::fmt::time::OffsetTime::new(
        local_offset,
        format_description::parse("[year]-[month]-[day] [hour]:[minute]:[second]")
            .context("invalid log timestamp format")?,
    );
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_timer(timer)
        .with_thread_names(true);

    let installed = if config.log_file {
        let dir = config
            .log_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("."));
        fs::create_dir_all(&dir)
            .with_context(|| format!("could not create log directory {}", dir.display()))?;
        let path = dir.join(get_log_file_name()?);
        let file = File::create(&path)
            .with_context(|| format!("could not create log file {}", path.display()))?;
        let subscriber = builder
            .with_ansi(false)
            .with_writer(BoxMakeWriter::new(file))
            .finish();
        set_global_default(subscriber)
    } else {
        set_global_default(builder.finish())
    };
    installed.context("Could not set global default tracing subscriber. Consider disabling logs if you are already setting a subscriber.")
}

fn get_log_file_name() -> anyhow::Result<String> {
    let format = parse("[year]-[month]-[day]_[hour]:[minute]:[second]_log.txt")?;
    Ok(now().format(&format)?)
}

fn now() -> OffsetDateTime {
    OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc())
}

/// Move an existing log directory out of the way and recreate it empty.
///
/// The previous directory is renamed to `<dir>_<timestamp>` (with a numeric suffix if that
/// name is taken) so earlier runs are kept. Returns where the old directory went, if it
/// existed.
pub fn rotate_log_dir(dir: &Path) -> anyhow::Result<Option<PathBuf>> {
    let rotated = if dir.exists() {
        let format = parse("[year]-[month]-[day]_[hour]-[minute]-[second]")?;
        let stamp = now().format(&format)?;
        let base = dir
            .file_name()
            .with_context(|| format!("{} has no directory name", dir.display()))?
            .to_string_lossy()
            .into_owned();

        let mut target = dir.with_file_name(format!("{base}_{stamp}"));
        let mut n = 1;
        while target.exists() {
            target = dir.with_file_name(format!("{base}_{stamp}_{n}"));
            n += 1;
        }
        fs::rename(dir, &target).with_context(|| {
            format!("could not rotate {} to {}", dir.display(), target.display())
        })?;
        Some(target)
    } else {
        None
    };
    fs::create_dir_all(dir)
        .with_context(|| format!("could not create log directory {}", dir.display()))?;
    Ok(rotated)
}
