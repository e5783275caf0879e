//! Command line front end: runs one job against a target and tracks it.
mod cli;
mod persistence;
mod render;

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use jobtrack_core::JobStatus;
use jobtrack_engine::{Orchestrator, ReqwestJobRunner};
use jobtrack_logging::{track_error, track_info, track_warn};

use crate::cli::Args;

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let args = Args::parse();
    jobtrack_logging::initialize(&args.log_destination(), args.log_level());
    run(args).await
}

async fn run(args: Args) -> anyhow::Result<ExitCode> {
    let config = args.engine_config();
    let runner = ReqwestJobRunner::new(&config).context("invalid job runner configuration")?;
    let mut orch = Orchestrator::new(Arc::new(runner), &config);

    orch.select_target(Some(args.target.clone()));
    if let Some(snapshot) = persistence::load_snapshot(&args.state_dir, &args.target) {
        orch.load_snapshot(snapshot);
    }
    if let Err(err) = orch.refresh().await {
        track_warn!("Could not load {} from the job runner: {}", args.target, err);
    }

    let request = args.request();
    let kind = request.kind();
    if let Err(err) = orch.start(request).await {
        render::print_summary(&orch.view(), kind);
        return Err(err).with_context(|| format!("{kind} was not started"));
    }

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut interrupted = false;
    while orch.state().status(kind).is_active() {
        tokio::select! {
            () = orch.next_turn() => {}
            _ = &mut ctrl_c, if !interrupted => interrupted = true,
        }
        if interrupted && orch.state().status(kind).is_active() {
            track_info!("Interrupted; no longer tracking {}", kind);
            orch.cancel(kind);
        }
        if orch.consume_dirty() {
            render::print_progress(&orch.view(), kind);
        }
    }

    let view = orch.view();
    render::print_summary(&view, kind);
    match persistence::save_snapshot(&args.state_dir, &view) {
        Ok(path) => track_info!("Saved document state to {:?}", path),
        Err(err) => track_error!("Failed to persist document state: {:#}", err),
    }
    orch.shutdown();

    let status = orch.state().status(kind);
    Ok(match status {
        JobStatus::Succeeded => ExitCode::SUCCESS,
        JobStatus::TimedOut => ExitCode::from(2),
        JobStatus::Idle => ExitCode::from(130),
        _ => ExitCode::FAILURE,
    })
}
