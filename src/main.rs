use std::io::{self, BufRead, Write};

use anyhow::{Context, Result};
use attendd::backend::HttpBackend;
use attendd::capture::DirectoryCamera;
use attendd::config::{self, Args};
use attendd::ipc;
use attendd::orchestrator::AttendanceOrchestrator;
use attendd::session::{Clock, SystemClock};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    // stdout carries IPC frames; logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("ATTENDD_LOG").unwrap_or_else(|_| EnvFilter::new("attendd=info")),
        )
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    let cfg = config::load(&args).context("failed to load configuration")?;
    info!(backend = %cfg.backend_url, camera_dir = %cfg.camera_dir.display(), "starting attendd");

    let backend = HttpBackend::new(cfg.backend_url.clone()).context("failed to build HTTP client")?;
    let camera = DirectoryCamera::new(cfg.camera_dir.clone());
    let clock = SystemClock;
    let today = clock.today().format("%Y-%m-%d").to_string();
    let orchestrator =
        AttendanceOrchestrator::new(Box::new(backend), Box::new(camera), cfg.workflow(), &today);
    let mut state = ipc::AppState::new(orchestrator, Box::new(clock));

    if let Some(workspace) = cfg.workspace.clone() {
        let select = ipc::Request {
            id: "startup".to_string(),
            method: "workspace.select".to_string(),
            params: serde_json::json!({ "path": workspace }),
        };
        let resp = ipc::handle_request(&mut state, select);
        if resp.get("ok").and_then(|v| v.as_bool()) != Some(true) {
            warn!(response = %resp, "could not open configured workspace");
        }
    }

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(_) => break,
        };
        if line.trim().is_empty() {
            continue;
        }

        let req: ipc::Request = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                // No id to echo back.
                let resp = ipc::err("", "bad_json", e.to_string(), None);
                let _ = writeln!(stdout, "{}", resp);
                let _ = stdout.flush();
                continue;
            }
        };

        let resp = ipc::handle_request(&mut state, req);
        let _ = writeln!(stdout, "{}", resp);
        let _ = stdout.flush();
    }

    info!("stdin closed, shutting down");
    Ok(())
}
