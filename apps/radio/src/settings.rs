use std::{
    net::SocketAddr,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{bail, ensure, Context, Result};
use cloud_player::{cookie::DEFAULT_COOKIE_FILE, SessionSettings, TransportSettings};
use config::{Config, Environment, File};
use iokit::PotentiometerSettings;
use serde::Deserialize;
use shared::domain::Pin;
use url::Url;

pub const DEFAULT_CONFIG_FILE: &str = "radio";
pub const ENV_PREFIX: &str = "RADIO";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub bind_addr: String,
    pub api_base_url: String,
    pub accept_invalid_certs: bool,
    pub request_timeout_secs: u64,
    pub cookie_path: PathBuf,
    pub clk_pin: u8,
    pub dt_pin: u8,
    pub debounce_ms: u64,
    pub steps: u32,
    pub initial_volume: f64,
    pub token_interval_secs: u64,
    pub claim_interval_ms: u64,
    pub provider_id: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8040".into(),
            api_base_url: "https://api.cloud-player.io".into(),
            accept_invalid_certs: true,
            request_timeout_secs: 20,
            cookie_path: PathBuf::from(DEFAULT_COOKIE_FILE),
            clk_pin: 17,
            dt_pin: 18,
            debounce_ms: 24,
            steps: 32,
            initial_volume: 0.0,
            token_interval_secs: 60,
            claim_interval_ms: 1_000,
            provider_id: "cloudplayer".into(),
        }
    }
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.clk_pin != self.dt_pin,
            "clk_pin and dt_pin must differ (both are {})",
            self.clk_pin
        );
        ensure!(self.steps > 0, "steps must be positive");
        ensure!(
            (0.0..=1.0).contains(&self.initial_volume),
            "initial_volume must be within 0..=1, got {}",
            self.initial_volume
        );
        ensure!(
            self.token_interval_secs > 0 && self.claim_interval_ms > 0,
            "poll intervals must be positive"
        );
        self.bind_addr()?;
        self.api_url()?;
        Ok(())
    }

    pub fn bind_addr(&self) -> Result<SocketAddr> {
        self.bind_addr
            .parse()
            .with_context(|| format!("invalid bind_addr {}", self.bind_addr))
    }

    pub fn api_url(&self) -> Result<Url> {
        let url = Url::parse(&self.api_base_url)
            .with_context(|| format!("invalid api_base_url {}", self.api_base_url))?;
        if url.cannot_be_a_base() {
            bail!("api_base_url {} cannot carry paths", self.api_base_url);
        }
        Ok(url)
    }

    pub fn clk(&self) -> Pin {
        Pin(self.clk_pin)
    }

    pub fn dt(&self) -> Pin {
        Pin(self.dt_pin)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn potentiometer(&self) -> PotentiometerSettings {
        PotentiometerSettings {
            initial: self.initial_volume,
            steps: self.steps,
        }
    }

    pub fn transport(&self) -> Result<TransportSettings> {
        Ok(TransportSettings {
            base_url: self.api_url()?,
            accept_invalid_certs: self.accept_invalid_certs,
            timeout: (self.request_timeout_secs > 0)
                .then(|| Duration::from_secs(self.request_timeout_secs)),
        })
    }

    pub fn session(&self) -> SessionSettings {
        SessionSettings {
            token_interval: Duration::from_secs(self.token_interval_secs),
            claim_interval: Duration::from_millis(self.claim_interval_ms),
            provider_id: self.provider_id.clone(),
            ..SessionSettings::default()
        }
    }
}

fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("__")
        .separator("__")
        .try_parsing(true)
}

/// Defaults, then the config file, then `RADIO__*` variables.
pub fn load_settings(path: Option<&Path>) -> Result<Settings> {
    build_settings(path, environment())
}

fn build_settings(path: Option<&Path>, env: Environment) -> Result<Settings> {
    let file = match path {
        Some(path) => File::from(path).required(true),
        None => File::with_name(DEFAULT_CONFIG_FILE).required(false),
    };
    let settings: Settings = Config::builder()
        .add_source(file)
        .add_source(env)
        .build()
        .context("failed to read configuration")?
        .try_deserialize()
        .context("invalid configuration")?;
    settings.validate()?;
    Ok(settings)
}

#[cfg(test)]
#[path = "tests/settings_tests.rs"]
mod tests;
