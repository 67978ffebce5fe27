use loadable_core::{
    Acquisition, Completion, HostContext, LoadState, Loadable, LoadableOptions, Module, UsageLedger,
};
use loadable_host::MemoryHost;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

fn unit() -> Arc<Module> {
    Module::es_module().with_default("page").into_shared()
}

fn context(host: &Arc<MemoryHost>) -> HostContext {
    HostContext::new(host.clone(), Arc::new(UsageLedger::server()))
}

#[tokio::test]
async fn concurrent_callers_share_one_acquisition() {
    let host = Arc::new(MemoryHost::server());
    host.stage("shared", unit());

    let page = Loadable::new(
        host.fetcher("shared", Duration::from_millis(20)),
        LoadableOptions::new().id("shared"),
        &context(&host),
        &(),
    );

    let first = page.require_async(&());
    let second = page.require_async(&());
    assert_eq!(page.state(), LoadState::Pending);

    let (first, second) = tokio::join!(first, second);
    assert!(Arc::ptr_eq(&first.unwrap(), &second.unwrap()));
    assert_eq!(host.fetch_count(), 1);
    assert_eq!(page.state(), LoadState::Resolved);
}

#[tokio::test]
async fn clones_share_state() {
    let host = Arc::new(MemoryHost::server());
    host.stage("cloned", unit());

    let page = Loadable::new(
        host.fetcher("cloned", Duration::from_millis(5)),
        LoadableOptions::new().id("cloned"),
        &context(&host),
        &(),
    );
    let other = page.clone();

    let (a, b) = tokio::join!(page.require_async(&()), other.require_async(&()));
    assert!(a.is_ok() && b.is_ok());
    assert_eq!(host.fetch_count(), 1);
    assert!(other.is_loaded());
}

#[tokio::test]
async fn slow_acquisition_times_out() {
    let host = Arc::new(MemoryHost::server());
    host.stage("slow", unit());
    let timeouts = Arc::new(std::sync::atomic::AtomicUsize::new(0));
    let seen = timeouts.clone();

    let page = Loadable::new(
        host.fetcher("slow", Duration::from_millis(500)),
        LoadableOptions::new()
            .id("slow")
            .timeout_ms(40)
            .on_error(move |err, _| {
                if err.is_timeout() {
                    seen.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                }
            }),
        &context(&host),
        &(),
    );

    let started = Instant::now();
    let err = page.require_async(&()).await.unwrap_err();
    let elapsed = started.elapsed();

    assert!(err.is_timeout(), "unexpected error: {err}");
    assert!(elapsed >= Duration::from_millis(35), "timed out too early: {elapsed:?}");
    assert!(elapsed < Duration::from_millis(400), "timed out too late: {elapsed:?}");
    assert_eq!(timeouts.load(std::sync::atomic::Ordering::SeqCst), 1);
    assert_eq!(page.state(), LoadState::Failed);

    // The abandoned fetch never lands.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!page.is_loaded());
    assert!(!host.is_resident("slow"));
}

#[tokio::test]
async fn late_joiner_waits_only_the_remaining_time() {
    let host = Arc::new(MemoryHost::server());
    host.stage("slow", unit());

    let page = Loadable::new(
        host.fetcher("slow", Duration::from_secs(5)),
        LoadableOptions::new().id("slow").timeout_ms(200),
        &context(&host),
        &(),
    );

    let first = page.require_async(&());
    tokio::time::sleep(Duration::from_millis(120)).await;

    let joined_at = Instant::now();
    let second = page.require_async(&());
    let (first, second) = tokio::join!(first, second);
    let waited = joined_at.elapsed();

    assert!(first.unwrap_err().is_timeout());
    assert!(second.unwrap_err().is_timeout());
    assert!(waited < Duration::from_millis(180), "joiner waited {waited:?}");
    assert_eq!(host.fetch_count(), 1);
}

#[tokio::test]
async fn acquisition_runs_while_the_caller_is_busy() {
    let host = Arc::new(MemoryHost::server());
    host.stage("busy", unit());

    let page = Loadable::new(
        host.fetcher("busy", Duration::from_millis(50)),
        LoadableOptions::new().id("busy").timeout_ms(100),
        &context(&host),
        &(),
    );

    let pending = page.require_async(&());
    tokio::time::sleep(Duration::from_millis(80)).await;

    assert!(pending.await.is_ok());
    assert_eq!(host.fetch_count(), 1);
}

#[tokio::test]
async fn dropped_caller_does_not_strand_the_attempt() {
    let host = Arc::new(MemoryHost::server());
    host.stage("dropped", unit());

    let page = Loadable::new(
        host.fetcher("dropped", Duration::from_millis(10)),
        LoadableOptions::new().id("dropped").timeout_ms(100),
        &context(&host),
        &(),
    );

    drop(page.require_async(&()));
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(page.state(), LoadState::Resolved);

    assert!(page.require_async(&()).await.is_ok());
    assert_eq!(host.fetch_count(), 1);
}

#[tokio::test]
async fn completion_after_timeout_is_discarded() {
    let slot: Arc<Mutex<Option<Completion>>> = Arc::new(Mutex::new(None));
    let parked = slot.clone();
    let host = Arc::new(MemoryHost::server());

    let page = Loadable::new(
        Acquisition::callback(move |_: &(), done: Completion| {
            *parked.lock().unwrap() = Some(done);
        }),
        LoadableOptions::new().timeout_ms(20),
        &context(&host),
        &(),
    );

    let err = page.require_async(&()).await.unwrap_err();
    assert!(err.is_timeout());

    let done = slot.lock().unwrap().take().expect("callback received its completion");
    done.resolve(unit());
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert!(!page.is_loaded());
    assert_eq!(page.state(), LoadState::Failed);
}

#[tokio::test]
async fn zero_timeout_waits_for_completion() {
    let host = Arc::new(MemoryHost::server());
    host.stage("patient", unit());

    let page = Loadable::new(
        host.fetcher("patient", Duration::from_millis(60)),
        LoadableOptions::new().id("patient").timeout_ms(0),
        &context(&host),
        &(),
    );
    assert!(page.require_async(&()).await.is_ok());
}

#[tokio::test]
async fn preload_is_joined_by_require_async() {
    let host = Arc::new(MemoryHost::server());
    host.stage("pre", unit());

    let page = Loadable::new(
        host.fetcher("pre", Duration::from_millis(10)),
        LoadableOptions::new().id("pre"),
        &context(&host),
        &(),
    );
    page.preload(&());
    assert_eq!(page.state(), LoadState::Pending);

    page.require_async(&()).await.unwrap();
    assert_eq!(host.fetch_count(), 1);

    // Already cached: nothing new starts
    page.preload(&());
    assert_eq!(host.fetch_count(), 1);
}

#[cfg(feature = "metrics")]
#[tokio::test]
async fn metrics_count_attempts_joins_and_hits() {
    use loadable_core::{LoadEvent, LoaderMetrics};

    let host = Arc::new(MemoryHost::server());
    host.stage("m", unit());
    let metrics = Arc::new(LoaderMetrics::new());

    let page = Loadable::new(
        host.fetcher("m", Duration::from_millis(5)),
        LoadableOptions::new().id("m").metrics(metrics.clone()),
        &context(&host),
        &(),
    );
    let (a, b) = tokio::join!(page.require_async(&()), page.require_async(&()));
    a.unwrap();
    b.unwrap();
    page.require_async(&()).await.unwrap();

    assert_eq!(metrics.count(LoadEvent::EagerMiss), 1);
    assert_eq!(metrics.count(LoadEvent::Attempt), 1);
    assert_eq!(metrics.count(LoadEvent::Join), 1);
    assert_eq!(metrics.count(LoadEvent::CacheHit), 1);
}
