use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::log::log_level::LogLevel;
use crate::log::logger::expand_path;

/// Raw key/value view of an INI-like config file.
///
/// ```text
/// # comment
/// [Server]
/// bind_addr = 0.0.0.0:8080
/// default_room = "default"
/// ```
#[derive(Debug)]
pub struct Config {
    pub globals: HashMap<String, String>,
    pub sections: HashMap<String, HashMap<String, String>>,
}

impl Config {
    pub fn load(path: &str) -> Result<Self, String> {
        let content =
            fs::read_to_string(path).map_err(|e| format!("Error reading file {path}: {e}"))?;
        Ok(Self::parse(&content))
    }

    pub fn parse(content: &str) -> Self {
        let mut globals = HashMap::new();
        let mut sections: HashMap<String, HashMap<String, String>> = HashMap::new();
        let mut current_section: Option<String> = None;

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if line.starts_with('[') && line.ends_with(']') {
                let name = &line[1..line.len() - 1];
                current_section = Some(name.trim().to_string());
                continue;
            }

            if let Some((key, value)) = line.split_once('=') {
                let key = key.trim().to_string();
                let value = value.trim().trim_matches('"').to_string();

                match &current_section {
                    None => {
                        globals.insert(key, value);
                    }
                    Some(sec) => {
                        sections.entry(sec.clone()).or_default().insert(key, value);
                    }
                }
            }
        }
        Config { globals, sections }
    }

    pub fn empty() -> Self {
        Self {
            globals: HashMap::new(),
            sections: HashMap::new(),
        }
    }

    #[must_use]
    pub fn get(&self, section: &str, key: &str) -> Option<&str> {
        self.sections
            .get(section)
            .and_then(|sec| sec.get(key))
            .map(|s| s.as_str())
    }

    #[must_use]
    pub fn get_non_empty(&self, section: &str, key: &str) -> Option<&str> {
        self.get(section, key).filter(|s| !s.is_empty())
    }

    #[must_use]
    pub fn get_global(&self, key: &str) -> Option<&str> {
        self.globals.get(key).map(|s| s.as_str())
    }

    #[must_use]
    pub fn get_or_default<'a>(&'a self, section: &str, key: &str, default: &'a str) -> &'a str {
        self.get_non_empty(section, key)
            .or_else(|| self.get_global(key).filter(|s| !s.is_empty()))
            .unwrap_or(default)
    }

    /// Parsed lookup; missing or unparseable values fall back to `default`.
    #[must_use]
    pub fn get_parsed_or<T: FromStr>(&self, section: &str, key: &str, default: T) -> T {
        self.get_non_empty(section, key)
            .or_else(|| self.get_global(key).filter(|s| !s.is_empty()))
            .and_then(|s| s.parse().ok())
            .unwrap_or(default)
    }
}

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
pub const DEFAULT_ROOM: &str = "default";
pub const DEFAULT_LOG_FILENAME: &str = "signaling_relay";

/// Limits and policies applied to every WebSocket connection.
#[derive(Debug, Clone)]
pub struct WebSocketSettings {
    /// Largest accepted frame payload; anything declared above is a protocol error.
    pub max_frame_len: usize,
    /// Reject unmasked client frames (RFC 6455 requires masking).
    pub require_masked: bool,
    /// Upper bound on the size of the HTTP upgrade request.
    pub max_handshake_len: usize,
    pub handshake_timeout: Duration,
    /// A peer whose socket accepts no bytes for this long is disconnected.
    pub write_timeout: Duration,
}

impl Default for WebSocketSettings {
    fn default() -> Self {
        Self {
            max_frame_len: 1_048_576,
            require_masked: true,
            max_handshake_len: 8_192,
            handshake_timeout: Duration::from_millis(5_000),
            write_timeout: Duration::from_millis(5_000),
        }
    }
}

/// Where and how the process logger writes.
#[derive(Debug, Clone)]
pub struct LogSettings {
    pub dir: Option<PathBuf>,
    pub file_name: String,
    pub echo_stderr: bool,
    pub min_level: LogLevel,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            dir: None,
            file_name: DEFAULT_LOG_FILENAME.to_string(),
            echo_stderr: true,
            min_level: LogLevel::Info,
        }
    }
}

/// Typed settings for the relay process.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub bind_addr: String,
    pub default_room: String,
    /// Requested TLS mode. TLS is not implemented; enabling it only logs a warning.
    pub encrypted: bool,
    pub websocket: WebSocketSettings,
    pub logging: LogSettings,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            default_room: DEFAULT_ROOM.to_string(),
            encrypted: false,
            websocket: WebSocketSettings::default(),
            logging: LogSettings::default(),
        }
    }
}

impl RelayConfig {
    pub fn from_config(config: &Config) -> Self {
        let defaults = Self::default();
        let ws = &defaults.websocket;

        let websocket = WebSocketSettings {
            max_frame_len: config.get_parsed_or("WebSocket", "max_frame_len", ws.max_frame_len),
            require_masked: config.get_parsed_or("WebSocket", "require_masked", ws.require_masked),
            max_handshake_len: config.get_parsed_or(
                "WebSocket",
                "max_handshake_len",
                ws.max_handshake_len,
            ),
            handshake_timeout: Duration::from_millis(config.get_parsed_or(
                "WebSocket",
                "handshake_timeout_ms",
                5_000,
            )),
            write_timeout: Duration::from_millis(config.get_parsed_or(
                "WebSocket",
                "write_timeout_ms",
                5_000,
            )),
        };

        let logging = LogSettings {
            dir: config.get_non_empty("Logging", "log_path").map(expand_path),
            file_name: config
                .get_or_default("Logging", "log_filename", DEFAULT_LOG_FILENAME)
                .to_string(),
            echo_stderr: config.get_parsed_or("Logging", "echo_stderr", true),
            min_level: config
                .get_non_empty("Logging", "min_level")
                .and_then(LogLevel::from_name)
                .unwrap_or(LogLevel::Info),
        };

        Self {
            bind_addr: config
                .get_or_default("Server", "bind_addr", DEFAULT_BIND_ADDR)
                .to_string(),
            default_room: config
                .get_or_default("Server", "default_room", DEFAULT_ROOM)
                .to_string(),
            encrypted: config.get_parsed_or("Server", "encrypted", false),
            websocket,
            logging,
        }
    }
}
