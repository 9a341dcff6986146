use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context;
use billscan_core::ExtractionConfig;

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8000;

/// Process-level settings read from the environment at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub host: String,
    pub port: u16,
    /// Optional TOML file with extraction settings.
    pub config_path: Option<PathBuf>,
}

impl Settings {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let port = match lookup("BILLSCAN_PORT") {
            Some(raw) => raw
                .trim()
                .parse()
                .with_context(|| format!("BILLSCAN_PORT must be a port number, got '{raw}'"))?,
            None => DEFAULT_PORT,
        };
        Ok(Self {
            host: lookup("BILLSCAN_HOST").unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port,
            config_path: lookup("BILLSCAN_CONFIG").filter(|p| !p.is_empty()).map(PathBuf::from),
        })
    }

    pub fn addr(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("invalid bind address {}:{}", self.host, self.port))
    }

    pub fn extraction_config(&self) -> anyhow::Result<ExtractionConfig> {
        match &self.config_path {
            Some(path) => ExtractionConfig::from_file(path)
                .with_context(|| format!("loading {}", path.display())),
            None => Ok(ExtractionConfig::default()),
        }
    }
}
