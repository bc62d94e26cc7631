// SPDX-License-Identifier: Apache-2.0

use std::io::Read;

use serde::Deserialize;

use crate::error::CliError;

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct Config {
    #[serde(default)]
    pub(crate) apply: ApplyConfig,
    #[serde(default)]
    pub(crate) parse: ParseConfig,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub(crate) struct ApplyConfig {
    /// Seconds allowed for one operation, no limit when unset.
    #[serde(default)]
    pub(crate) timeout: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct ParseConfig {
    #[serde(default)]
    pub(crate) strict: bool,
}

impl Config {
    pub(crate) const DEFAULT_CONFIG_PATH: &'static str =
        "/etc/devconf/devconf.conf";

    pub(crate) fn load(path: &str) -> Result<Self, CliError> {
        let path = std::path::Path::new(path);
        if !path.exists() {
            log::debug!(
                "Configuration file {} not found, using defaults",
                path.display()
            );
            return Ok(Config::default());
        }
        let mut fd = std::fs::File::open(path)?;
        let mut content = String::new();
        fd.read_to_string(&mut content)?;
        Self::from_toml(&content).map_err(|e| {
            CliError::from(format!(
                "Failed to read configuration from {}: {}",
                path.display(),
                e.error_msg
            ))
        })
    }

    fn from_toml(content: &str) -> Result<Self, CliError> {
        match toml::from_str::<Config>(content) {
            Ok(c) => {
                log::info!("Configuration loaded:\n{content}");
                Ok(c)
            }
            Err(e) => Err(CliError::from(e.to_string())),
        }
    }

    pub(crate) fn load_from_matches(
        matches: &clap::ArgMatches,
    ) -> Result<Self, CliError> {
        Self::load(
            matches
                .value_of("CONFIG")
                .unwrap_or(Self::DEFAULT_CONFIG_PATH),
        )
    }
}
