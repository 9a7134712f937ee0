//! CLI command implementations

use crate::{OutputArgs, ScopeArgs};
use callweave::{BarProgress, CallweaveConfig, RenderSink, Session, load_config, render_pairs};
use callweave_core::{UnitId, ViewScope};
use callweave_engine::{BuildReport, BuildRequest};
use callweave_watcher::{PathFilter, WatchService};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;

fn scope_for(scope: ScopeArgs, config: &CallweaveConfig) -> ViewScope {
    if let Some(selector) = scope.focus {
        ViewScope::UpstreamDownstream(selector)
    } else if let Some(module) = scope.module {
        ViewScope::Module(module)
    } else if let Some(dir) = scope.dir {
        ViewScope::Directory(dir)
    } else if !scope.unit.is_empty() {
        ViewScope::Units(scope.unit.into_iter().map(UnitId::new).collect())
    } else {
        ViewScope::WholeProject {
            include_tests: config.include_tests() && !scope.no_tests,
        }
    }
}

fn open_session(root: &Path, config: &CallweaveConfig, output: OutputArgs) -> anyhow::Result<Session> {
    let format = output.format.unwrap_or_else(|| config.output_format());
    let sink = Arc::new(RenderSink::new(format, output.output));
    Session::open(root, config, Some(Arc::new(BarProgress::new())), Some(sink))
}

fn summarize(report: &BuildReport) {
    let stats = &report.stats;
    tracing::info!(
        "Build #{}: {} units ({} new, {} changed, {} removed), {} reparsed, {} edges kept, {} dropped, {} found",
        report.id,
        stats.units,
        stats.new_units,
        stats.changed_units,
        stats.removed_units,
        stats.reparsed_units,
        stats.valid_edges,
        stats.stale_edges,
        stats.fresh_edges
    );
    for failure in &report.failures {
        tracing::warn!("{}", failure);
    }
    if let Some(warning) = &report.scope_warning {
        tracing::warn!("{}", warning);
        for unit in &warning.unknown {
            tracing::warn!("  unknown unit: {}", unit);
        }
    }
}

fn persist(session: &Session) {
    if let Err(e) = session.persist() {
        tracing::warn!("Failed to save snapshot cache: {}", e);
    }
}

pub fn build(root: PathBuf, scope: ScopeArgs, output: OutputArgs) -> anyhow::Result<()> {
    let config = load_config(&root)?;
    let session = open_session(&root, &config, output)?;
    let request = BuildRequest::new(scope_for(scope, &config));
    tracing::info!("Building call graph: {}", request.scope);

    let report = session.build(&request)?;
    summarize(&report);
    persist(&session);
    Ok(())
}

pub async fn watch(root: PathBuf, scope: ScopeArgs, output: OutputArgs) -> anyhow::Result<()> {
    let config = load_config(&root)?;
    let session = Arc::new(open_session(&root, &config, output)?);
    let request = BuildRequest::new(scope_for(scope, &config));
    tracing::info!("Watching {}: {}", root.display(), request.scope);

    let project = Arc::clone(session.project());
    let filter: PathFilter = Arc::new(move |path: &Path| project.tracks(path));
    let service = WatchService::new(&root, Arc::clone(session.coordinator()), filter)?.with_request(request);

    let (tx, mut rx) = mpsc::unbounded_channel();
    let running = tokio::spawn(service.run(tx));

    loop {
        tokio::select! {
            report = rx.recv() => {
                let Some(report) = report else { break };
                summarize(&report);
                let session = Arc::clone(&session);
                tokio::task::spawn_blocking(move || persist(&session)).await?;
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Stopping watch");
                break;
            }
        }
    }

    session.coordinator().cancel_running();
    running.abort();
    Ok(())
}

pub fn dump(root: PathBuf) -> anyhow::Result<()> {
    let config = load_config(&root)?;
    let session = Session::open(&root, &config, None, None)?;
    let report = session.build(&BuildRequest::default())?;
    summarize(&report);
    persist(&session);

    print!("{}", render_pairs(&session.coordinator().snapshot()));
    Ok(())
}

pub fn clear(root: PathBuf) -> anyhow::Result<()> {
    tracing::info!("Clearing cache for: {}", root.display());

    callweave_core::clear_cache(&root)?;

    tracing::info!("Cache cleared");
    Ok(())
}
