use crate::log::log_level::LogLevel;

/// Destination for log lines, shared as `Arc<dyn LogSink>` by the server,
/// every session and the audit log.
///
/// Implementations must not block the caller for long: sessions log from the
/// same thread that reads the client socket.
pub trait LogSink: Send + Sync {
    fn log(&self, level: LogLevel, msg: &str, target: &'static str);
}
