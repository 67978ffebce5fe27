use loadable_core::{
    Acquisition, HostContext, Loadable, LoadableOptions, Module, Source, UsageLedger,
};
use loadable_host::MemoryHost;
use std::sync::Arc;
use std::time::Duration;

fn unit() -> Arc<Module> {
    Module::es_module().with_default("page").into_shared()
}

#[tokio::test]
async fn record_usage_is_idempotent() {
    let host = Arc::new(MemoryHost::server());
    host.register("42", unit());
    let context = HostContext::new(host.clone(), Arc::new(UsageLedger::server()));

    let page = Loadable::new(
        host.fetcher("42", Duration::from_millis(1)),
        LoadableOptions::new().id("42").chunk_name("home"),
        &context,
        &(),
    );
    for _ in 0..3 {
        page.record_usage(&());
    }

    assert_eq!(context.ledger.drain_chunk_names(), vec!["home"]);
    assert_eq!(context.ledger.drain_module_ids(), vec!["42"]);
    assert!(context.ledger.is_empty());
}

#[tokio::test]
async fn usage_before_resolution_records_only_the_chunk_name() {
    let host = Arc::new(MemoryHost::server());
    host.stage("late", unit());
    let context = HostContext::new(host.clone(), Arc::new(UsageLedger::server()));

    let page = Loadable::new(
        host.fetcher("late", Duration::from_millis(1)),
        LoadableOptions::new().id("late").chunk_name("late-chunk"),
        &context,
        &(),
    );
    page.record_usage(&());
    let flushed = context.ledger.flush();
    assert_eq!(flushed.chunk_names, vec!["late-chunk"]);
    assert!(flushed.module_ids.is_empty());

    page.require_async(&()).await.unwrap();
    page.record_usage(&());
    let flushed = context.ledger.flush();
    assert_eq!(flushed.chunk_names, vec!["late-chunk"]);
    assert_eq!(flushed.module_ids, vec!["late"]);
}

#[tokio::test]
async fn instances_share_one_ledger_per_cycle() {
    let host = Arc::new(MemoryHost::server());
    host.register("1", unit());
    host.register("2", unit());
    let context = HostContext::new(host.clone(), Arc::new(UsageLedger::server()));

    for (id, chunk) in [("1", "es6"), ("2", "es5"), ("1", "es6")] {
        let page = Loadable::new(
            host.fetcher(id, Duration::from_millis(1)),
            LoadableOptions::new().id(id).chunk_name(chunk),
            &context,
            &(),
        );
        page.record_usage(&());
    }

    assert_eq!(context.ledger.drain_chunk_names(), vec!["es6", "es5"]);
    assert_eq!(context.ledger.drain_module_ids(), vec!["1", "2"]);
    assert!(context.ledger.drain_chunk_names().is_empty());
}

#[tokio::test]
async fn client_context_records_nothing() {
    let host = Arc::new(MemoryHost::client());
    host.register("1", unit());
    let context = HostContext::new(host.clone(), Arc::new(UsageLedger::client()));

    let page = Loadable::new(
        host.fetcher("1", Duration::from_millis(1)),
        LoadableOptions::new().id("1").chunk_name("home"),
        &context,
        &(),
    );
    assert!(page.eager_value().is_some());
    page.record_usage(&());
    assert!(context.ledger.flush().is_empty());
}

#[tokio::test]
async fn computed_sources_follow_props() {
    let host = Arc::new(MemoryHost::server());
    host.register("./pages/About.js", unit());
    let context = HostContext::new(host.clone(), Arc::new(UsageLedger::server()));

    let page = Loadable::new(
        Acquisition::procedure(|page: &String| {
            let page = page.clone();
            async move { Err(loadable_core::AcquireError::msg(format!("no chunk for {page}"))) }
        }),
        LoadableOptions::new()
            .id(Source::computed(|page: &String| Some(format!("./pages/{page}.js"))))
            .chunk_name(Source::computed(|page: &String| Some(page.to_lowercase()))),
        &context,
        &"About".to_string(),
    );
    assert!(page.eager_value().is_some());
    page.record_usage(&"About".to_string());

    let flushed = context.ledger.flush();
    assert_eq!(flushed.chunk_names, vec!["about"]);
    assert_eq!(flushed.module_ids, vec!["./pages/About.js"]);
}
