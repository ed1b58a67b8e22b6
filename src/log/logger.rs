use crate::{
    config::LogSettings,
    log::{log_level::LogLevel, log_msg::LogMsg, logger_handle::LoggerHandle},
};

use std::{
    fs::{self, OpenOptions},
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
    sync::mpsc::{self, TrySendError},
    thread,
};

// -----------------------------------------------------------------------------
// COMPILE-TIME CONFIGURATION
// -----------------------------------------------------------------------------

/// Flush to disk every 100 lines if debugging/tracing (to see crashes near real-time).
#[cfg(feature = "log-debug")]
const FLUSH_BATCH_SIZE: u32 = 100;

/// Flush to disk every 1000 lines in production/default (to save I/O & CPU).
#[cfg(not(feature = "log-debug"))]
const FLUSH_BATCH_SIZE: u32 = 1_000;

// -----------------------------------------------------------------------------

/// Bounded, non-blocking logger that writes to a per-process log file.
///
/// This struct manages a background worker thread that consumes log messages from a
/// bounded channel and writes them to a file, optionally echoing each line to stderr
/// so the relay's security warnings are visible on the console.
///
/// # Architecture
///
/// 1. **Producers**: Sessions, the relay and the audit log call `try_log` through a `LoggerHandle`.
/// 2. **Queue**: A bounded `mpsc` channel buffers messages.
/// 3. **Consumer**: A dedicated background thread writes to disk and flushes periodically.
pub struct Logger {
    handle: LoggerHandle,
    _thread: Option<thread::JoinHandle<()>>,
    file_path: PathBuf,
}

impl Logger {
    /// Starts the logger as described by the `[Logging]` section of the config.
    ///
    /// Without a configured directory, a `logs/` directory next to the executable is used.
    #[must_use]
    pub fn start(settings: &LogSettings, cap: usize) -> Self {
        let dir = settings
            .dir
            .clone()
            .unwrap_or_else(|| exe_dir_fallback_cwd().join("logs"));
        Self::start_in_dir(
            dir,
            Some(settings.file_name.as_str()),
            cap,
            settings.echo_stderr,
            settings.min_level,
        )
    }

    /// Starts the logger in a specific directory.
    ///
    /// This function:
    /// 1. Creates the target directory if it is missing.
    /// 2. Generates a unique filename based on the timestamp and process ID (PID).
    /// 3. Spawns the background worker thread.
    ///
    /// # Example Filename
    /// `target/debug/logs/signaling_relay-20251102_023045-pid1234.log`
    pub fn start_in_dir<D: AsRef<Path>>(
        dir: D,
        app_name: Option<&str>,
        cap: usize,
        echo_stderr: bool,
        min_level: LogLevel,
    ) -> Self {
        let dir = dir.as_ref().to_path_buf();
        let _ = fs::create_dir_all(&dir);

        let ts = chrono::Utc::now().format("%Y%m%d_%H%M%S");
        let pid = std::process::id();

        let fname = if let Some(name) = app_name {
            format!("{}-{}-pid{}.log", name, ts, pid)
        } else {
            format!("{}-pid{}.log", ts, pid)
        };

        let file_path = dir.join(&fname);

        let (tx, rx) = mpsc::sync_channel::<LogMsg>(cap.max(1));
        let handle = LoggerHandle { tx, min_level };

        let file_path_clone = file_path.clone();

        let _thread = thread::Builder::new()
            .name("logger-worker".into())
            .spawn(move || {
                // Try target file -> temp file -> sink (never panic).
                let writer: Box<dyn Write + Send> = if let Ok(f) = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&file_path_clone)
                {
                    Box::new(f)
                } else {
                    let fallback = std::env::temp_dir().join("rustyrelay-fallback.log");
                    match OpenOptions::new().create(true).append(true).open(&fallback) {
                        Ok(f) => Box::new(f),
                        Err(_) => Box::new(io::sink()),
                    }
                };

                let mut out: BufWriter<Box<dyn Write + Send>> = BufWriter::new(writer);
                let mut lines_written: u32 = 0;

                while let Ok(m) = rx.recv() {
                    let line = format_line(&m);
                    let _ = writeln!(&mut out, "{line}");
                    lines_written = lines_written.wrapping_add(1);

                    if echo_stderr {
                        eprintln!("{line}");
                    }

                    // Warnings and errors are flushed immediately; the rest in batches.
                    if matches!(m.level, LogLevel::Warn | LogLevel::Error)
                        || lines_written.is_multiple_of(FLUSH_BATCH_SIZE)
                    {
                        let _ = out.flush();
                    }
                }

                let _ = out.flush();
            })
            .ok();

        Self {
            handle,
            _thread,
            file_path,
        }
    }

    /// Attempts to enqueue a log message without blocking the current thread.
    ///
    /// If the channel is full, the message is **dropped** and an error is returned.
    pub fn try_log<S: Into<String>>(
        &self,
        level: LogLevel,
        text: S,
        target: &'static str,
    ) -> Result<(), TrySendError<LogMsg>> {
        self.handle.try_log(level, text, target)
    }

    /// Returns a cloneable handle to the logger sink.
    #[must_use]
    pub fn handle(&self) -> LoggerHandle {
        self.handle.clone()
    }

    /// Returns the path of the active log file.
    #[must_use]
    pub fn file_path(&self) -> &Path {
        &self.file_path
    }
}

fn format_line(m: &LogMsg) -> String {
    format!("[{:?}] {} {} | {}", m.level, m.ts_ms, m.target, m.text)
}

/// Locates the directory of the executable (target/{debug,release}),
/// or falls back to the current working directory on error.
pub(crate) fn exe_dir_fallback_cwd() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
}

/// Expands tilde (`~`) in file paths to the user's home directory.
pub(crate) fn expand_path(path_str: &str) -> PathBuf {
    if path_str.starts_with('~') {
        let home = std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .ok()
            .map(PathBuf::from);

        if let Some(mut home_path) = home {
            if path_str == "~" {
                return home_path;
            }
            if path_str.starts_with("~/") || path_str.starts_with("~\\") {
                home_path.push(&path_str[2..]);
                return home_path;
            }
        }
    }
    PathBuf::from(path_str)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;
    use std::time::{Duration, Instant};

    #[test]
    fn writes_lines_to_file_in_given_dir() {
        let dir = std::env::temp_dir().join(format!("rustyrelay_logger_{}", std::process::id()));
        let logger = Logger::start_in_dir(&dir, Some("unit"), 16, false, LogLevel::Info);

        logger
            .try_log(LogLevel::Warn, "fingerprint seen", "test::target")
            .expect("queue has room");

        let path = logger.file_path().to_path_buf();
        assert!(path.starts_with(&dir));

        // Warnings are flushed right away by the worker.
        let deadline = Instant::now() + Duration::from_secs(2);
        let mut contents = String::new();
        while Instant::now() < deadline {
            contents = fs::read_to_string(&path).unwrap_or_default();
            if contents.contains("fingerprint seen") {
                break;
            }
            thread::sleep(Duration::from_millis(10));
        }
        assert!(contents.contains("[Warn]"), "got: {contents:?}");
        assert!(contents.contains("test::target | fingerprint seen"));

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn expand_path_leaves_plain_paths_alone() {
        assert_eq!(expand_path("/var/log/relay"), PathBuf::from("/var/log/relay"));
    }
}
