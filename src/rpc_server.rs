//! Typeset RPC host: JSON-RPC over stdin/stdout.
//!
//! Protocol: one JSON object per line (newline-delimited JSON).
//! Request:  {"id":1, "method":"popup.edit", "params":{"control":"fontSize","value":"18"}}
//! Response: {"id":1, "result":{...}} or {"id":1, "error":"..."}
//!
//! Between requests a fixed-period tick drives store events and the
//! per-page re-apply timers.

use std::io::{self, Write};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, BufReader};

use typeset::app::App;
use typeset::logging;
use typeset::rpc_handler::handle_method;
use typeset::services::config_engine::{ConfigEngine, ConfigEngineTrait};

/// Simple rate limiter: max requests per one-second window.
struct RateLimiter {
    window_start: Instant,
    request_count: u32,
    max_per_second: u32,
}

impl RateLimiter {
    fn new(max_per_second: u32) -> Self {
        Self {
            window_start: Instant::now(),
            request_count: 0,
            max_per_second,
        }
    }

    /// Returns true if the request is allowed, false if rate-limited.
    fn check(&mut self) -> bool {
        if self.window_start.elapsed().as_secs() >= 1 {
            self.window_start = Instant::now();
            self.request_count = 0;
        }
        self.request_count += 1;
        self.request_count <= self.max_per_second
    }
}

fn emit(value: &Value) {
    let mut out = io::stdout().lock();
    if writeln!(out, "{}", value).and_then(|_| out.flush()).is_err() {
        tracing::error!("stdout closed");
    }
}

fn handle_line(app: &Mutex<App>, rate_limiter: &mut RateLimiter, line: &str) -> Option<Value> {
    if line.trim().is_empty() {
        return None;
    }
    let req: Value = match serde_json::from_str(line) {
        Ok(v) => v,
        Err(e) => return Some(json!({"id": null, "error": format!("parse error: {}", e)})),
    };
    let id = req.get("id").cloned().unwrap_or(Value::Null);

    if !rate_limiter.check() {
        tracing::warn!("rate limit exceeded");
        return Some(json!({"id": id, "error": "rate limit exceeded"}));
    }

    let method = req.get("method").and_then(|v| v.as_str()).unwrap_or("");
    let params = req.get("params").cloned().unwrap_or(json!({}));
    tracing::debug!(method, "rpc request");

    Some(match handle_method(app, method, &params) {
        Ok(val) => json!({"id": id, "result": val}),
        Err(err) => json!({"id": id, "error": err}),
    })
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut config_engine = ConfigEngine::new(std::env::var("TYPESET_CONFIG").ok());
    if let Err(e) = config_engine.load() {
        eprintln!("typeset: {}; using defaults", e);
    }
    let config = config_engine.get_config();
    logging::init(config.logging.debug);

    let tick_every = Duration::from_millis(config.runtime.tick_interval_ms.max(1));
    let app = Mutex::new(App::new(config_engine)?);

    emit(&json!({"event": "ready", "version": env!("CARGO_PKG_VERSION")}));

    // Max 200 RPC requests per second.
    let mut rate_limiter = RateLimiter::new(200);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut ticker = tokio::time::interval(tick_every);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            line = lines.next_line() => {
                match line {
                    Ok(Some(line)) => {
                        if let Some(response) = handle_line(&app, &mut rate_limiter, &line) {
                            emit(&response);
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        tracing::error!(error = %e, "stdin read failed");
                        break;
                    }
                }
            }
            _ = ticker.tick() => {
                match app.lock() {
                    Ok(mut a) => a.tick(Instant::now()),
                    Err(e) => {
                        tracing::error!(error = %e, "app state poisoned");
                        break;
                    }
                }
            }
        }
    }

    tracing::info!("stdin closed, shutting down");
    Ok(())
}
