//! Logging module
//!
//! Plain stdout/stderr logging: a startup banner, a timestamped access
//! line per request, and warning/error lines.

use crate::config::ServerConfig;
use chrono::Local;
use std::net::SocketAddr;

pub fn log_server_start(addr: &SocketAddr, config: &ServerConfig) {
    println!("======================================");
    println!("Serving on {}:{}", config.host, config.port);
    println!("Listening on: http://{addr}");
    if let Some(workers) = config.workers {
        println!("Worker threads: {workers}");
    }
    println!("Using Tokio runtime for concurrency");
    println!("======================================\n");
}

pub fn log_access(remote_addr: &str, method: &str, path: &str, status_line: &str, bytes: usize) {
    println!(
        "{} - [{}] \"{} {}\" {} {}",
        remote_addr,
        Local::now().format("%d/%b/%Y:%H:%M:%S %z"),
        method,
        path,
        status_line,
        bytes
    );
}

pub fn log_connection_error(err: &impl std::fmt::Debug) {
    eprintln!("[Error] Failed to serve connection: {err:?}");
}

pub fn log_warning(msg: &str) {
    eprintln!("[Warn] {msg}");
}

pub fn log_error(msg: &str) {
    eprintln!("[Error] {msg}");
}
