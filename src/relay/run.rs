use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::{Config, RelayConfig};
use crate::log::NoopLogSink;
use crate::log::log_sink::LogSink;
use crate::relay::server::RelayServer;

/// Env var naming the config file to load instead of `relay.conf`.
pub const CONFIG_ENV_VAR: &str = "RUSTYRELAY_CONFIG";
const DEFAULT_CONFIG_FILE: &str = "relay.conf";

/// Bind and run the relay (blocks) with the given log sink.
pub fn run_relay_with_log(config: &RelayConfig, log_sink: Arc<dyn LogSink>) -> io::Result<()> {
    let server = RelayServer::bind(config, log_sink)?;
    server.audit().clear();
    server.run()
}

/// Convenience: run the relay with a `NoopLogSink` (no logging).
pub fn run_relay(config: &RelayConfig) -> io::Result<()> {
    run_relay_with_log(config, Arc::new(NoopLogSink))
}

/// Load the relay config from `RUSTYRELAY_CONFIG`, else `relay.conf` next to
/// the executable. A missing default file means built-in defaults.
pub fn load_config() -> Result<RelayConfig, String> {
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        let config = Config::load(&path)?;
        return Ok(RelayConfig::from_config(&config));
    }

    let path = default_config_path();
    if !path.is_file() {
        return Ok(RelayConfig::default());
    }
    let config = Config::load(&path.to_string_lossy())?;
    Ok(RelayConfig::from_config(&config))
}

fn default_config_path() -> PathBuf {
    // Next to the executable so restarts from another directory find the same file.
    std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(|dir| dir.join(DEFAULT_CONFIG_FILE)))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE))
}
