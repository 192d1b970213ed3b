//! Behavior tests for the cache engine
//!
//! Every test runs against a scripted transport double; no network.

use std::collections::HashMap;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use storefront_cache::{
    Cache, CacheError, CacheResult, Registry, ShopContext, SlotValue, Transport,
};

/// Transport double: responses scripted per URL, calls recorded
struct MockTransport {
    responses: Mutex<HashMap<String, VecDeque<CacheResult<Value>>>>,
    calls: Mutex<Vec<String>>,
    delay: Option<Duration>,
}

impl MockTransport {
    fn new() -> Self {
        Self {
            responses: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            delay: None,
        }
    }

    fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::new()
        }
    }

    /// Queue a successful JSON response for `url`
    fn respond(&self, url: &str, body: Value) {
        self.responses
            .lock()
            .unwrap()
            .entry(url.to_string())
            .or_default()
            .push_back(Ok(body));
    }

    /// Queue a failing response for `url`
    fn fail(&self, url: &str, status: u16) {
        self.responses
            .lock()
            .unwrap()
            .entry(url.to_string())
            .or_default()
            .push_back(Err(CacheError::Status {
                url: url.to_string(),
                status,
            }));
    }

    fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn calls_for(&self, url: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| *c == url).count()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn get_json(&self, url: &str) -> CacheResult<Value> {
        self.calls.lock().unwrap().push(url.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let scripted = self
            .responses
            .lock()
            .unwrap()
            .get_mut(url)
            .and_then(|queue| queue.pop_front());
        scripted.unwrap_or_else(|| panic!("unexpected request: {url}"))
    }
}

/// Install a subscriber once so `RUST_LOG` surfaces loader activity
/// during test runs; later calls are no-ops
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn context() -> ShopContext {
    ShopContext::new("https://app.example", "ezracelli-dev", "72508506189")
}

fn cache_with(transport: Arc<MockTransport>) -> Cache {
    init_tracing();
    Cache::new(Registry::storefront(), context(), transport)
}

fn flat_url(name: &str) -> String {
    format!("https://app.example/api/{name}?shop=ezracelli-dev.myshopify.com")
}

fn article_url(blog_id: u64) -> String {
    format!("https://app.example/api/blogs/{blog_id}/articles?shop=ezracelli-dev.myshopify.com")
}

const SETTINGS_URL: &str = "https://app.example/api/themes/72508506189/assets\
                            ?asset%5Bkey%5D=config%2Fsettings_data.json\
                            &fields=value\
                            &shop=ezracelli-dev.myshopify.com";

mod flat_collections {
    use super::*;

    #[tokio::test]
    async fn end_to_end_products() {
        let transport = Arc::new(MockTransport::new());
        transport.respond(
            &flat_url("products"),
            json!({"products": [{"id": 7, "title": "Mug"}]}),
        );
        let cache = cache_with(transport);

        assert!(cache.all("products").is_unloaded());

        cache.ensure("products").await.unwrap();

        assert_eq!(
            cache.all("products"),
            SlotValue::Loaded(json!([{"id": 7, "title": "Mug"}]))
        );
        assert_eq!(
            cache.by_id("products", 7),
            SlotValue::Loaded(json!({"id": 7, "title": "Mug"}))
        );
        assert!(cache.by_id("products", 99).is_unloaded());
        assert_eq!(cache.ids("products"), vec![7]);
    }

    #[tokio::test]
    async fn sequential_ensure_fetches_once() {
        let transport = Arc::new(MockTransport::new());
        transport.respond(&flat_url("products"), json!({"products": []}));
        let cache = cache_with(transport.clone());

        cache.ensure("products").await.unwrap();
        cache.ensure("products").await.unwrap();

        assert_eq!(transport.total_calls(), 1);
        // An empty loaded collection is loaded, not unloaded
        assert!(cache.all("products").is_loaded());
    }

    #[tokio::test]
    async fn failed_fetch_commits_nothing_and_retries() {
        let transport = Arc::new(MockTransport::new());
        transport.fail(&flat_url("products"), 502);
        transport.respond(&flat_url("products"), json!({"products": [{"id": 1}]}));
        let cache = cache_with(transport.clone());

        let err = cache.ensure("products").await.unwrap_err();
        assert!(err.is_retryable());
        assert!(cache.all("products").is_unloaded());

        cache.ensure("products").await.unwrap();
        assert_eq!(cache.ids("products"), vec![1]);
        assert_eq!(transport.total_calls(), 2);
    }

    #[tokio::test]
    async fn missing_payload_field_is_an_error_and_retryable() {
        let transport = Arc::new(MockTransport::new());
        transport.respond(&flat_url("products"), json!({"wrong_key": []}));
        transport.respond(&flat_url("products"), json!({"products": []}));
        let cache = cache_with(transport.clone());

        let err = cache.ensure("products").await.unwrap_err();
        assert!(matches!(err, CacheError::MissingField { .. }));
        assert!(cache.all("products").is_unloaded());

        cache.ensure("products").await.unwrap();
        assert!(cache.all("products").is_loaded());
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_ensure_issues_single_fetch() {
        let transport = Arc::new(MockTransport::with_delay(Duration::from_millis(50)));
        transport.respond(&flat_url("products"), json!({"products": [{"id": 7}]}));
        let cache = Arc::new(cache_with(transport.clone()));

        let first = tokio::spawn({
            let cache = cache.clone();
            async move { cache.ensure("products").await }
        });
        let second = tokio::spawn({
            let cache = cache.clone();
            async move { cache.ensure("products").await }
        });

        first.await.unwrap().unwrap();
        second.await.unwrap().unwrap();

        assert_eq!(transport.total_calls(), 1);
        assert_eq!(cache.ids("products"), vec![7]);
    }

    #[tokio::test]
    async fn fresh_cache_reads_unloaded_everywhere() {
        let cache = cache_with(Arc::new(MockTransport::new()));
        for name in ["products", "collects", "blogs", "shop", "settings_data"] {
            assert!(cache.all(name).is_unloaded(), "{name} should be unloaded");
        }
        assert!(cache.child_for("articles", 1).is_unloaded());
        assert!(cache.child_all("articles").is_empty());
    }
}

mod assets {
    use super::*;

    #[tokio::test]
    async fn asset_load_applies_projection() {
        let transport = Arc::new(MockTransport::new());
        transport.respond(
            SETTINGS_URL,
            json!({"asset": {"key": "config/settings_data.json", "value": "{\"color\":\"red\"}"}}),
        );
        let cache = cache_with(transport.clone());

        cache.ensure("settings_data").await.unwrap();

        assert_eq!(
            cache.all("settings_data"),
            SlotValue::Loaded(json!({"color": "red"}))
        );
        assert_eq!(transport.total_calls(), 1);

        // Second ensure short-circuits like any other slot
        cache.ensure("settings_data").await.unwrap();
        assert_eq!(transport.total_calls(), 1);
    }

    #[tokio::test]
    async fn failed_projection_commits_nothing() {
        let transport = Arc::new(MockTransport::new());
        transport.respond(SETTINGS_URL, json!({"asset": {"key": "x"}}));
        let cache = cache_with(transport);

        let err = cache.ensure("settings_data").await.unwrap_err();
        assert!(matches!(err, CacheError::Extract { .. }));
        assert!(cache.all("settings_data").is_unloaded());
    }
}

mod child_collections {
    use super::*;

    async fn load_blogs(cache: &Cache, transport: &MockTransport, ids: &[u64]) {
        let blogs: Vec<Value> = ids.iter().map(|id| json!({"id": id})).collect();
        transport.respond(&flat_url("blogs"), json!({"blogs": blogs}));
        cache.ensure("blogs").await.unwrap();
    }

    #[tokio::test]
    async fn partial_backfill_skips_loaded_parents() {
        let transport = Arc::new(MockTransport::new());
        let cache = cache_with(transport.clone());

        transport.respond(&article_url(2), json!({"articles": [{"id": 20}]}));
        cache.ensure_children("articles", Some(&[2])).await.unwrap();

        transport.respond(&article_url(1), json!({"articles": [{"id": 10}]}));
        transport.respond(&article_url(3), json!({"articles": [{"id": 30}]}));
        cache
            .ensure_children("articles", Some(&[1, 2, 3]))
            .await
            .unwrap();

        assert_eq!(transport.calls_for(&article_url(1)), 1);
        assert_eq!(transport.calls_for(&article_url(2)), 1);
        assert_eq!(transport.calls_for(&article_url(3)), 1);
        assert_eq!(
            cache.child_all("articles"),
            vec![json!({"id": 10}), json!({"id": 20}), json!({"id": 30})]
        );
    }

    #[tokio::test]
    async fn aggregate_failure_preserves_partial_success() {
        let transport = Arc::new(MockTransport::new());
        let cache = cache_with(transport.clone());

        transport.respond(&article_url(1), json!({"articles": [{"id": 10}]}));
        transport.fail(&article_url(2), 500);

        let err = cache
            .ensure_children("articles", Some(&[1, 2]))
            .await
            .unwrap_err();
        assert_eq!(err.failed_parents(), vec![2]);
        match &err {
            CacheError::Partial { attempted, .. } => assert_eq!(*attempted, 2),
            other => panic!("expected Partial, got {other:?}"),
        }

        assert_eq!(
            cache.child_for("articles", 1),
            SlotValue::Loaded(json!([{"id": 10}]))
        );
        assert!(cache.child_for("articles", 2).is_unloaded());

        // Retry fetches only the failed parent
        transport.respond(&article_url(2), json!({"articles": []}));
        cache.ensure_children("articles", Some(&[1, 2])).await.unwrap();
        assert_eq!(transport.calls_for(&article_url(1)), 1);
        assert_eq!(transport.calls_for(&article_url(2)), 2);
    }

    #[tokio::test]
    async fn default_ids_require_loaded_parent() {
        let transport = Arc::new(MockTransport::new());
        let cache = cache_with(transport.clone());

        let err = cache.ensure_children("articles", None).await.unwrap_err();
        assert!(matches!(err, CacheError::ParentNotLoaded { .. }));
        assert_eq!(transport.total_calls(), 0);
    }

    #[tokio::test]
    async fn default_ids_come_from_parent_collection() {
        let transport = Arc::new(MockTransport::new());
        let cache = cache_with(transport.clone());
        load_blogs(&cache, &transport, &[1, 2]).await;

        transport.respond(&article_url(1), json!({"articles": [{"id": 10}]}));
        transport.respond(&article_url(2), json!({"articles": [{"id": 20}]}));
        cache.ensure_children("articles", None).await.unwrap();

        assert!(cache.child_for("articles", 1).is_loaded());
        assert!(cache.child_for("articles", 2).is_loaded());
    }

    #[tokio::test]
    async fn ensure_on_child_name_defaults_parent_ids() {
        let transport = Arc::new(MockTransport::new());
        let cache = cache_with(transport.clone());
        load_blogs(&cache, &transport, &[5]).await;

        transport.respond(&article_url(5), json!({"articles": []}));
        cache.ensure("articles").await.unwrap();
        assert!(cache.child_for("articles", 5).is_loaded());
    }

    #[tokio::test(start_paused = true)]
    async fn parents_fetch_in_parallel() {
        let transport = Arc::new(MockTransport::with_delay(Duration::from_millis(100)));
        let cache = cache_with(transport.clone());

        transport.respond(&article_url(1), json!({"articles": []}));
        transport.respond(&article_url(2), json!({"articles": []}));
        transport.respond(&article_url(3), json!({"articles": []}));

        let started = tokio::time::Instant::now();
        cache
            .ensure_children("articles", Some(&[1, 2, 3]))
            .await
            .unwrap();

        // Serial fetches would take 300ms of virtual time
        assert_eq!(started.elapsed(), Duration::from_millis(100));
        assert_eq!(transport.total_calls(), 3);
    }
}

mod reactivity {
    use super::*;

    #[tokio::test]
    async fn commits_notify_subscribers_by_slot_name() {
        let transport = Arc::new(MockTransport::new());
        transport.respond(&flat_url("products"), json!({"products": []}));
        transport.respond(&article_url(1), json!({"articles": []}));
        let cache = cache_with(transport);
        let mut changes = cache.subscribe();

        cache.ensure("products").await.unwrap();
        cache.ensure_children("articles", Some(&[1])).await.unwrap();

        assert_eq!(changes.recv().await.unwrap(), "products");
        assert_eq!(changes.recv().await.unwrap(), "articles");
    }
}
