//! Loadable Runtime
//!
//! Simulates server render cycles against an in-memory host: resolves page
//! units eagerly or on demand, records what each render used, and prints the
//! flushed usage of every cycle as JSON for a packaging step to consume.

use anyhow::{Context, Result};
use loadable_core::{
    downcast_export, AcquireError, Acquisition, HostContext, Loadable, LoadableOptions,
    LoaderMetrics, Module, ModuleHost, Settings, Source, UsageLedger,
};
use loadable_host::MemoryHost;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

const ROUTES: [&str; 4] = ["Home", "About", "Home", "Missing"];
const FETCH_LATENCY: Duration = Duration::from_millis(25);

#[derive(Debug, Serialize)]
struct RenderManifest {
    route: String,
    rendered: Option<String>,
    chunk_names: Vec<String>,
    module_ids: Vec<String>,
}

fn page_id(route: &str) -> String {
    format!("./pages/{route}.js")
}

fn page_acquisition(host: &Arc<MemoryHost>) -> Acquisition<String> {
    let host = host.clone();
    Acquisition::procedure(move |route: &String| {
        let host = host.clone();
        let id = page_id(route);
        async move {
            tokio::time::sleep(FETCH_LATENCY).await;
            if let Some(module) = host.load_staged(&id) {
                return Ok(module);
            }
            match host.require_by_id(&id) {
                Ok(Some(module)) => Ok(module),
                Ok(None) => Err(AcquireError::msg(format!("no chunk for {id}"))),
                Err(err) => Err(AcquireError::from_error(err)),
            }
        }
    })
}

fn seed_host(host: &MemoryHost) {
    host.register(
        "shell",
        Module::es_module().with_default("<app-shell>").into_shared(),
    );
    for route in ["Home", "About"] {
        host.stage(
            page_id(route),
            Module::es_module()
                .with_default(format!("<{route}Page>"))
                .into_shared(),
        );
    }
}

async fn render(
    route: &str,
    host: &Arc<MemoryHost>,
    settings: &Settings,
    metrics: &Arc<LoaderMetrics>,
) -> RenderManifest {
    let ledger = Arc::new(UsageLedger::new(settings.ledger.context));
    let context = HostContext::new(host.clone(), ledger.clone());
    let route = route.to_string();

    let shell = Loadable::new(
        host.fetcher("shell", FETCH_LATENCY),
        LoadableOptions::from_settings(&settings.loader)
            .id("shell")
            .chunk_name("shell")
            .metrics(metrics.clone()),
        &context,
        &(),
    );
    shell.record_usage(&());

    let page = Loadable::new(
        page_acquisition(host),
        LoadableOptions::from_settings(&settings.loader)
            .id(Source::computed(|route: &String| Some(page_id(route))))
            .chunk_name(Source::computed(|route: &String| {
                Some(format!("page-{}", route.to_lowercase()))
            }))
            .metrics(metrics.clone())
            .on_error(|err, cx| tracing::warn!(%err, server = cx.is_server, "page failed to load")),
        &context,
        &route,
    );

    let value = match page.require_sync(&route) {
        Some(value) => Ok(value),
        None => page.require_async(&route).await,
    };
    let rendered = match value {
        Ok(value) => {
            page.record_usage(&route);
            downcast_export::<String>(&value).map(|markup| markup.to_string())
        }
        Err(err) => {
            tracing::error!(%route, %err, "render fell back to an empty page");
            None
        }
    };

    let used = ledger.flush();
    RenderManifest {
        route,
        rendered,
        chunk_names: used.chunk_names,
        module_ids: used.module_ids,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    tracing::info!("Loadable Runtime v{}", loadable_core::VERSION);

    let settings = match std::env::args().nth(1) {
        Some(path) => Settings::load(&path).with_context(|| format!("loading settings from {path}"))?,
        None => Settings::default(),
    };
    tracing::info!(?settings, "settings loaded");

    let host = Arc::new(MemoryHost::new(settings.ledger.context));
    seed_host(&host);
    let metrics = Arc::new(LoaderMetrics::new());

    for route in ROUTES {
        let manifest = render(route, &host, &settings, &metrics).await;
        println!("{}", serde_json::to_string(&manifest)?);
    }

    for (name, count) in metrics.snapshot() {
        tracing::info!(name, count, "loader metric");
    }
    tracing::info!(
        avg_ms = metrics.average_attempt_ms(),
        fetches = host.fetch_count(),
        "runtime finished"
    );

    Ok(())
}
