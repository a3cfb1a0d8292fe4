use anyhow::Result;
use figment::{providers::{Env, Format, Serialized, Toml}, Figment};
use serde::{Deserialize, Serialize};

use crate::allocator::SolverOptions;

/// Runtime settings layered from defaults, an optional TOML file and the
/// environment. Scenario content never lives here.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    pub solver: SolverOptions,
    pub run: RunConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunConfig {
    /// Round count override; the scenario's own default applies when unset.
    pub iterations: Option<u32>,
    /// Pretty-print JSON report output.
    pub pretty: bool,
}

impl Config {
    pub fn load() -> Result<Self> {
        let figment = Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file("config/default.toml"))
            .merge(Env::prefixed("INFRASIM__").split("__"));
        Ok(figment.extract()?)
    }
}
