use std::{env, path::PathBuf};

use tracing::{level_filters::LevelFilter, warn};

/// Channel file used when `AIDA_PVA_CHANNELS_FILENAME` is not set
pub const DEFAULT_CHANNELS_FILENAME: &str = "channels.toml";

/// Get the channel configuration file, either from environment or `channels.toml`
pub fn get_channels_filename() -> PathBuf {
    env::var("AIDA_PVA_CHANNELS_FILENAME")
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or(DEFAULT_CHANNELS_FILENAME.to_string())
        .into()
}

/// Get the log level, either from environment or default INFO
pub fn get_default_log_level() -> LevelFilter {
    match env::var("AIDA_PVA_LOG_LEVEL") {
        Ok(level) => level.parse().unwrap_or_else(|_| {
            warn!("Ignoring unrecognised AIDA_PVA_LOG_LEVEL={level}");
            LevelFilter::INFO
        }),
        Err(_) => LevelFilter::INFO,
    }
}

/// Shorten a list of names for logging, to the first nine and `...`
pub fn abbreviate<S: AsRef<str>>(names: &[S]) -> Vec<String> {
    const SHOWN: usize = 9;
    let mut short: Vec<String> = names
        .iter()
        .take(SHOWN)
        .map(|n| n.as_ref().to_string())
        .collect();
    if names.len() > SHOWN {
        short.push("...".to_string());
    }
    short
}
