//! Tracing subscriber setup for processes embedding a manager

use std::fs;
use std::path::Path;

use eyre::{Context, Result, eyre};
use tracing::{Level, debug, info};
use tracing_subscriber::EnvFilter;

/// Resolve a log level name; unknown names fall back to INFO with a warning
pub fn parse_level(level: Option<&str>) -> Level {
    let Some(s) = level else {
        return Level::INFO;
    };
    match s.to_uppercase().as_str() {
        "TRACE" => Level::TRACE,
        "DEBUG" => Level::DEBUG,
        "INFO" => Level::INFO,
        "WARN" | "WARNING" => Level::WARN,
        "ERROR" => Level::ERROR,
        _ => {
            eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", s);
            Level::INFO
        }
    }
}

/// Effective level: `cli` when given, else `config`, else INFO
pub fn resolve_level(cli: Option<&str>, config: Option<&str>) -> Level {
    parse_level(cli.or(config))
}

/// Install the global subscriber
///
/// Level priority: `cli_level` > `config_level` > INFO. `RUST_LOG` directives
/// are honoured on top. Logs go to `log_file` when given, stderr otherwise.
pub fn init_logging(cli_level: Option<&str>, config_level: Option<&str>, log_file: Option<&Path>) -> Result<()> {
    let level = resolve_level(cli_level, config_level);
    let filter = EnvFilter::from_default_env().add_directive(level.into());

    match log_file {
        Some(path) => {
            if let Some(dir) = path.parent()
                && !dir.as_os_str().is_empty()
            {
                fs::create_dir_all(dir).context("Failed to create log directory")?;
            }
            let file = fs::File::create(path).context("Failed to create log file")?;
            tracing_subscriber::fmt()
                .with_writer(file)
                .with_ansi(false)
                .with_env_filter(filter)
                .try_init()
                .map_err(|e| eyre!("Failed to install tracing subscriber: {}", e))?;
        }
        None => {
            tracing_subscriber::fmt()
                .with_writer(std::io::stderr)
                .with_env_filter(filter)
                .try_init()
                .map_err(|e| eyre!("Failed to install tracing subscriber: {}", e))?;
        }
    }

    debug!(?log_file, "init_logging: subscriber installed");
    info!("Logging initialized (level: {:?})", level);
    Ok(())
}
