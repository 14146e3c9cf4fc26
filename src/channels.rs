//! The channel configuration file.
//!
//! A service describes the channels it hosts in a TOML file, listing for each
//! group of channels what its getter and setter return and which arguments
//! they take:
//!
//! ```toml
//! name = "SLC Klystron"
//!
//! [[channel]]
//! names = ["KLYS:*:*:TACT"]
//! getter = { type = "SCALAR", arguments = ["BEAM", "DGRP"] }
//!
//! [channel.setter]
//! type = "TABLE"
//! arguments = ["BEAM", "DGRP"]
//! fields = [{ name = "status", label = "Klystron Status" }]
//! ```
//!
//! A `*` in a name matches any single `:`-separated segment.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::{
    error::{AidaError, ExceptionKind},
    types::{Config, MAX_FIELDS},
    uri, utils,
};

#[derive(Error, Debug)]
pub enum ChannelFileError {
    #[error("Could not read channel file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid channel file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Channel {channel} declares {count} fields, at most {max} are allowed", max = MAX_FIELDS)]
    TooManyFields { channel: String, count: usize },
}

impl From<ChannelFileError> for AidaError {
    fn from(value: ChannelFileError) -> Self {
        AidaError::new(ExceptionKind::ServerInitialisation, value.to_string())
    }
}

/// A group of channels sharing one configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ChannelDefinition {
    pub names: Vec<String>,
    #[serde(default)]
    pub getter: Option<Config>,
    #[serde(default)]
    pub setter: Option<Config>,
}

#[derive(Debug, Deserialize)]
struct ChannelFile {
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default, rename = "channel")]
    channels: Vec<ChannelDefinition>,
}

fn matches(pattern: &str, channel: &str) -> bool {
    let mut pattern = pattern.split(':');
    let mut channel = channel.split(':');
    loop {
        match (pattern.next(), channel.next()) {
            (None, None) => return true,
            (Some(p), Some(c)) if p == "*" || p.eq_ignore_ascii_case(c) => {}
            _ => return false,
        }
    }
}

/// Every channel a service hosts, and how each is configured
#[derive(Debug, Clone)]
pub struct ChannelRegistry {
    name: String,
    description: Option<String>,
    definitions: Vec<ChannelDefinition>,
}

impl ChannelRegistry {
    pub fn from_toml(text: &str) -> Result<Self, ChannelFileError> {
        let file: ChannelFile = toml::from_str(text)?;
        for definition in &file.channels {
            let widest = [&definition.getter, &definition.setter]
                .into_iter()
                .flatten()
                .map(|c| c.fields.len())
                .max()
                .unwrap_or(0);
            if widest > MAX_FIELDS {
                return Err(ChannelFileError::TooManyFields {
                    channel: definition.names.join(", "),
                    count: widest,
                });
            }
        }
        Ok(Self {
            name: file.name,
            description: file.description,
            definitions: file.channels,
        })
    }

    pub fn load(path: &Path) -> Result<Self, ChannelFileError> {
        debug!("Loading channel definitions from {}", path.display());
        let text = std::fs::read_to_string(path).map_err(|source| ChannelFileError::Io {
            path: path.to_owned(),
            source,
        })?;
        Self::from_toml(&text)
    }

    /// Load from the file named by `AIDA_PVA_CHANNELS_FILENAME`
    pub fn load_default() -> Result<Self, ChannelFileError> {
        let path = utils::get_channels_filename();
        if path.as_os_str() != utils::DEFAULT_CHANNELS_FILENAME {
            info!("Using channel file {}", path.display());
        }
        Self::load(&path)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Find the definition of a channel
    ///
    /// Exact names are preferred over wildcards, and legacy `//` names are
    /// looked up in their new form.
    pub fn definition(&self, channel: &str) -> Option<&ChannelDefinition> {
        let find = |channel: &str| {
            let names = || {
                self.definitions
                    .iter()
                    .flat_map(|d| d.names.iter().map(move |n| (n, d)))
            };
            names()
                .find(|(n, _)| n.eq_ignore_ascii_case(channel))
                .or_else(|| names().find(|(n, _)| matches(n, channel)))
                .map(|(_, d)| d)
        };
        find(channel).or_else(|| find(&uri::to_new_format(channel)))
    }

    pub fn getter_config(&self, channel: &str) -> Option<&Config> {
        self.definition(channel)?.getter.as_ref()
    }

    pub fn setter_config(&self, channel: &str) -> Option<&Config> {
        self.definition(channel)?.setter.as_ref()
    }

    pub fn channel_names(&self) -> Vec<&str> {
        self.definitions
            .iter()
            .flat_map(|d| d.names.iter().map(String::as_str))
            .collect()
    }

    /// Channel names shortened for logging
    pub fn abbreviated_names(&self) -> Vec<String> {
        utils::abbreviate(&self.channel_names())
    }
}
