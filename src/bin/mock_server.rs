//! Mock automation server binary for integration testing
//!
//! Accepts the launch arguments of the real server, prints its readiness
//! banner and then idles until it is killed. It never serves HTTP, so it is
//! only useful together with the in-process mock driver.
//!
//! Flags:
//! - `--silent`: never print the banner
//! - `--exit`: print a line and exit immediately

use std::io::Write;
use std::time::Duration;

const BANNER: &str = "Appium REST http interface listener started";

fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();

    let mut host = "127.0.0.1".to_string();
    let mut port = "4723".to_string();
    let mut silent = false;
    let mut exit = false;

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "-a" | "--address" => {
                if let Some(value) = iter.next() {
                    host = value.clone();
                }
            }
            "-p" | "--port" => {
                if let Some(value) = iter.next() {
                    port = value.clone();
                }
            }
            "--silent" => silent = true,
            "--exit" => exit = true,
            _ => {}
        }
    }

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    writeln!(out, "[mock-server] Welcome to mock-server").ok();
    if exit {
        writeln!(out, "[mock-server] Shutting down").ok();
        return;
    }
    eprintln!("[mock-server] Non-default args: address={} port={}", host, port);
    if !silent {
        writeln!(out, "[mock-server] {} on http://{}:{}", BANNER, host, port).ok();
    }
    out.flush().ok();
    drop(out);

    loop {
        std::thread::sleep(Duration::from_secs(60));
    }
}
