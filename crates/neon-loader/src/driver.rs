//! Single-threaded driver connecting the loader to a fetcher.
//!
//! The loader state machine stays on the driving task. Only the fetch
//! futures run concurrently; their completions are fed back one at a time.
//! Every requested fetch starts immediately (there is no admission
//! control), in-flight fetches are never cancelled, and a fetch that
//! outlives the configured timeout is reported as a failure.

use crate::dom::html::HtmlDocument;
use crate::dom::{DocumentAdapter, ElementId};
use crate::error::{LoaderError, Result};
use crate::fetch::{FetchedResource, ResourceFetcher};
use crate::loader::{FetchRequest, LazyLoader};
use futures::future::BoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

type Completion = (ElementId, Result<FetchedResource>);

pub struct Driver<F: ResourceFetcher + ?Sized> {
    fetcher: Arc<F>,
    timeout: Option<Duration>,
}

impl<F: ResourceFetcher + ?Sized + 'static> Driver<F> {
    pub fn new(fetcher: Arc<F>, timeout: Option<Duration>) -> Self {
        Self { fetcher, timeout }
    }

    /// Run queued fetches until none are left, delivering a paint frame
    /// after each completion.
    /// Returns the number of completed fetches.
    pub async fn settle(&self, loader: &mut LazyLoader, doc: &mut dyn DocumentAdapter) -> usize {
        let mut in_flight: FuturesUnordered<BoxFuture<'static, Completion>> =
            FuturesUnordered::new();
        let mut completed = 0;

        loop {
            for request in loader.take_fetch_requests() {
                in_flight.push(self.start(request));
            }
            let Some((id, outcome)) = in_flight.next().await else {
                break;
            };
            loader.complete_fetch(doc, id, outcome);
            completed += 1;
            // Paint before waiting on the remaining fetches.
            if loader.has_pending_frame() {
                loader.on_animation_frame(doc);
            }
        }
        completed
    }

    /// Scroll an initialized page through `scroll_positions`, settling at
    /// the current position first and after every step.
    pub async fn scroll_through(
        &self,
        loader: &mut LazyLoader,
        doc: &mut HtmlDocument,
        scroll_positions: &[f64],
    ) -> usize {
        let mut completed = self.settle(loader, doc).await;

        loader.check_visibility(doc);
        completed += self.settle(loader, doc).await;

        for &y in scroll_positions {
            doc.scroll_to(y);
            let started = loader.check_visibility(doc);
            debug!(scroll_y = y, started, "scroll step");
            completed += self.settle(loader, doc).await;
        }
        completed
    }

    fn start(&self, request: FetchRequest) -> BoxFuture<'static, Completion> {
        let fetcher = Arc::clone(&self.fetcher);
        let timeout = self.timeout;
        async move {
            let FetchRequest { id, url } = request;
            let outcome = match timeout {
                Some(limit) => match tokio::time::timeout(limit, fetcher.fetch(&url)).await {
                    Ok(outcome) => outcome,
                    Err(_) => Err(LoaderError::Timeout {
                        url: url.clone(),
                        timeout_ms: limit.as_millis() as u64,
                    }),
                },
                None => fetcher.fetch(&url).await,
            };
            (id, outcome)
        }
        .boxed()
    }
}

/// Scroll offsets that walk the page one viewport at a time.
pub fn scroll_steps(content_height: f64, viewport_height: f64) -> Vec<f64> {
    if viewport_height <= 0.0 {
        return Vec::new();
    }
    let mut steps = Vec::new();
    let mut y = viewport_height;
    while y < content_height {
        steps.push(y);
        y += viewport_height;
    }
    steps
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LoaderConfig;
    use crate::dom::Rect;
    use crate::loader::DisplayState;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Serves canned outcomes and counts requests per URL.
    struct FakeFetcher {
        missing: Vec<String>,
        stalled: Vec<String>,
        calls: Mutex<HashMap<String, usize>>,
    }

    impl FakeFetcher {
        fn new(missing: &[&str], stalled: &[&str]) -> Self {
            Self {
                missing: missing.iter().map(|s| s.to_string()).collect(),
                stalled: stalled.iter().map(|s| s.to_string()).collect(),
                calls: Mutex::new(HashMap::new()),
            }
        }

        fn calls(&self, url: &str) -> usize {
            self.calls.lock().unwrap().get(url).copied().unwrap_or(0)
        }
    }

    #[async_trait]
    impl ResourceFetcher for FakeFetcher {
        async fn fetch(&self, url: &str) -> Result<FetchedResource> {
            *self.calls.lock().unwrap().entry(url.to_string()).or_default() += 1;
            if self.stalled.iter().any(|u| u == url) {
                std::future::pending::<()>().await;
            }
            if self.missing.iter().any(|u| u == url) {
                return Err(LoaderError::HttpStatus {
                    url: url.to_string(),
                    status: 404,
                });
            }
            Ok(FetchedResource {
                url: url.to_string(),
                content_type: Some("image/jpeg".to_string()),
                bytes: 2048,
            })
        }
    }

    const PAGE: &str = r#"<html><head></head><body>
        <img id="top" data-src="/img/top.jpg" height="300">
        <img id="mid" data-src="/img/missing.jpg" height="300">
        <img id="low" data-src="/img/low.jpg" height="300">
        <img id="slow" data-src="/img/slow.jpg" height="300">
    </body></html>"#;

    fn page() -> HtmlDocument {
        let mut doc = HtmlDocument::parse(PAGE).unwrap();
        doc.set_viewport(Rect::new(0.0, 0.0, 1280.0, 320.0));
        doc
    }

    #[tokio::test]
    async fn test_settle_runs_visible_fetches() {
        let mut doc = page();
        let fetcher = Arc::new(FakeFetcher::new(&[], &[]));
        let driver = Driver::new(Arc::clone(&fetcher), None);
        let mut loader = LazyLoader::new(LoaderConfig::default()).unwrap();

        loader.initialize(&mut doc);
        // #top fully and #mid partly (54px of 300) are in the look-ahead region.
        assert_eq!(loader.check_visibility(&mut doc), 2);
        assert_eq!(driver.settle(&mut loader, &mut doc).await, 2);

        let top = doc.select("#top").unwrap()[0];
        assert_eq!(loader.state(top), Some(DisplayState::Loaded));
        assert_eq!(doc.style_property(top, "opacity").as_deref(), Some("1"));
        assert_eq!(fetcher.calls("/img/low.jpg"), 0);
    }

    #[tokio::test]
    async fn test_fast_image_fades_in_while_another_stalls() {
        let mut doc = HtmlDocument::parse(
            r#"<img id="fast" data-src="/img/fast.jpg"><img id="slow" data-src="/img/slow.jpg">"#,
        )
        .unwrap();
        let fetcher = Arc::new(FakeFetcher::new(&[], &["/img/slow.jpg"]));
        let driver = Driver::new(Arc::clone(&fetcher), None);
        let mut loader = LazyLoader::new(LoaderConfig::default()).unwrap();

        loader.initialize(&mut doc);
        assert_eq!(loader.check_visibility(&mut doc), 2);
        let settled = tokio::time::timeout(
            Duration::from_millis(200),
            driver.settle(&mut loader, &mut doc),
        )
        .await;
        // Without a fetch timeout the stalled request keeps settle waiting.
        assert!(settled.is_err());

        let fast = doc.select("#fast").unwrap()[0];
        let slow = doc.select("#slow").unwrap()[0];
        assert_eq!(loader.state(fast), Some(DisplayState::Loaded));
        assert_eq!(doc.style_property(fast, "opacity").as_deref(), Some("1"));
        assert!(!loader.has_pending_frame());
        assert_eq!(loader.state(slow), Some(DisplayState::Loading));
    }

    #[tokio::test]
    async fn test_simulate_scroll_with_failures_and_timeout() {
        let mut doc = page();
        let fetcher = Arc::new(FakeFetcher::new(&["/img/missing.jpg"], &["/img/slow.jpg"]));
        let driver = Driver::new(Arc::clone(&fetcher), Some(Duration::from_millis(20)));
        let mut loader = LazyLoader::new(LoaderConfig::default()).unwrap();

        let steps = scroll_steps(doc.content_height(), 320.0);
        loader.initialize(&mut doc);
        driver.scroll_through(&mut loader, &mut doc, &steps).await;
        // Scroll back up and re-initialize: nothing is fetched twice.
        loader.initialize(&mut doc);
        driver.scroll_through(&mut loader, &mut doc, &[0.0]).await;

        let state = |sel: &str| loader.state(doc.select(sel).unwrap()[0]);
        assert_eq!(state("#top"), Some(DisplayState::Loaded));
        assert_eq!(state("#mid"), Some(DisplayState::Error));
        assert_eq!(state("#low"), Some(DisplayState::Loaded));
        assert_eq!(state("#slow"), Some(DisplayState::Error));

        let slow = doc.select("#slow").unwrap()[0];
        assert!(doc
            .attribute(slow, "data-load-error")
            .unwrap()
            .contains("timed out"));

        for url in ["/img/top.jpg", "/img/missing.jpg", "/img/low.jpg", "/img/slow.jpg"] {
            assert_eq!(fetcher.calls(url), 1, "{url}");
        }
    }

    #[tokio::test]
    async fn test_fallback_settles_without_visibility_events() {
        let mut doc = page();
        doc.set_observation_supported(false);
        let fetcher = Arc::new(FakeFetcher::new(&["/img/missing.jpg"], &[]));
        let driver = Driver::new(Arc::clone(&fetcher), None);
        let mut loader = LazyLoader::new(LoaderConfig::default()).unwrap();

        loader.initialize(&mut doc);
        // The slow image is served normally here; every element settles.
        assert_eq!(driver.settle(&mut loader, &mut doc).await, 4);
        for status in loader.statuses() {
            assert!(status.state.is_terminal());
        }
    }

    #[test]
    fn test_scroll_steps() {
        assert_eq!(scroll_steps(1000.0, 400.0), vec![400.0, 800.0]);
        assert!(scroll_steps(300.0, 400.0).is_empty());
        assert!(scroll_steps(1000.0, 0.0).is_empty());
    }
}
