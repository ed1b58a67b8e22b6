use std::sync::Arc;
use std::{env, process};

use rustyrelay::log::log_sink::LogSink;
use rustyrelay::log::logger::Logger;
use rustyrelay::relay::run::{CONFIG_ENV_VAR, load_config, run_relay_with_log};

fn main() -> std::io::Result<()> {
    // --- Load config -------------------------------------------------------
    let mut config = match load_config() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("[signaling_relay] {e}");
            eprintln!("  (set {CONFIG_ENV_VAR} to a readable config file, or unset it)");
            process::exit(1);
        }
    };

    // --- Parse CLI args ----------------------------------------------------
    //
    // Supported:
    //   cargo run --bin signaling_relay
    //      -> binds to [Server] bind_addr (default 0.0.0.0:8080)
    //
    //   cargo run --bin signaling_relay -- 0.0.0.0:9000
    //      -> binds to 0.0.0.0:9000
    //
    //   cargo run --bin signaling_relay -- 127.0.0.1 9000
    //      -> binds to 127.0.0.1:9000

    let args: Vec<String> = env::args().collect();

    match args.len() {
        1 => {}
        2 => config.bind_addr = args[1].clone(),
        3 => config.bind_addr = format!("{}:{}", args[1], args[2]),
        _ => {
            eprintln!("Usage:");
            eprintln!("  {}                # listen on the configured address", args[0]);
            eprintln!("  {} [ADDR]         # e.g. 0.0.0.0:9000", args[0]);
            eprintln!("  {} [IP] [PORT]    # e.g. 127.0.0.1 9000", args[0]);
            eprintln!();
            eprintln!("When using cargo:");
            eprintln!("  cargo run --bin signaling_relay");
            eprintln!("  cargo run --bin signaling_relay -- 0.0.0.0:9000");
            eprintln!("  cargo run --bin signaling_relay -- 127.0.0.1 9000");
            process::exit(1);
        }
    }

    // --- Start process logger ----------------------------------------------
    let logger = Logger::start(&config.logging, 1024);
    let log_sink: Arc<dyn LogSink> = Arc::new(logger.handle());

    eprintln!(
        "[signaling_relay] starting on ws://{} (log file {})",
        config.bind_addr,
        logger.file_path().display()
    );

    // --- Run relay (blocks) ------------------------------------------------
    run_relay_with_log(&config, log_sink)
}
