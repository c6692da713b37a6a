use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

pub const DEFAULT_PORT: u16 = 8989;
pub const DEFAULT_BIND: &str = "127.0.0.1";

/// Gateway config (metronome.toml + METRONOME_* env overrides).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Parse specs with a leading seconds field.
    #[serde(default)]
    pub seconds_field: bool,
    /// IANA time zone name for schedule interpretation, e.g. "Europe/Berlin".
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            bind: DEFAULT_BIND.to_string(),
            seconds_field: false,
            timezone: default_timezone(),
        }
    }
}

fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}
fn default_timezone() -> String {
    "UTC".to_string()
}

impl GatewayConfig {
    /// Load config from a TOML file with METRONOME_* env var overrides.
    ///
    /// Checks the explicit path argument first, then `./metronome.toml`.
    pub fn load(config_path: Option<&str>) -> Result<Self, figment::Error> {
        let path = config_path.unwrap_or("metronome.toml");
        Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed("METRONOME_"))
            .extract()
    }
}
