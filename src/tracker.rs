//! URL change notification and route discovery
//!
//! The tracker keeps the last URL it reported and the set of internal paths
//! seen so far, seeded with `/`. History operations schedule a URL check
//! after a short settle delay; a changed URL is reported and followed by a
//! scan of the page's root-relative links. DOM insertions under the body
//! reschedule the same scan, so bursts of churn produce a single scan.

use crate::config::BridgeConfig;
use crate::dom::{Document, NodeId};
use crate::error::Result;
use crate::host::{History, MutationCallback, Page, PopStateListener};
use crate::lock;
use crate::protocol::{OutgoingMessage, RoutesDiscovered, SCAN_METHOD_DOM_LINKS, UrlChange};
use crate::publisher::Publisher;
use crate::schedule::{Debouncer, run_after};
use indexmap::IndexSet;
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use tokio::runtime::Handle;

const ROOT_ROUTE: &str = "/";

pub struct NavigationTracker {
    page: Weak<Page>,
    publisher: Arc<Publisher>,
    config: Arc<BridgeConfig>,
    runtime: Handle,
    current_url: Mutex<String>,
    routes: Mutex<IndexSet<String>>,
    url_check: Debouncer,
    link_scan: Debouncer,
}

impl NavigationTracker {
    /// Create a tracker whose delayed work runs on `runtime`
    pub fn new(page: &Arc<Page>, publisher: Arc<Publisher>, config: Arc<BridgeConfig>, runtime: Handle) -> Arc<Self> {
        Arc::new(Self {
            page: Arc::downgrade(page),
            publisher,
            config,
            current_url: Mutex::new(page.href()),
            routes: Mutex::new(IndexSet::from([ROOT_ROUTE.to_string()])),
            url_check: Debouncer::new(runtime.clone()),
            link_scan: Debouncer::new(runtime.clone()),
            runtime,
        })
    }

    /// Discovered routes in insertion order
    pub fn discovered_routes(&self) -> Vec<String> {
        lock(&self.routes).iter().cloned().collect()
    }

    /// Compare the live URL with the stored one after the settle delay
    pub fn schedule_url_check(self: &Arc<Self>) {
        let tracker = Arc::downgrade(self);
        self.url_check.schedule(self.config.url_settle_delay(), async move {
            let Some(tracker) = tracker.upgrade() else { return };
            if tracker.notify_url_change(false) {
                tracker.schedule_scan(tracker.config.scan_after_navigation());
            }
        });
    }

    /// Run a link scan after `delay`, replacing any pending one
    pub fn schedule_scan(self: &Arc<Self>, delay: Duration) {
        let tracker = Arc::downgrade(self);
        self.link_scan.schedule(delay, async move {
            if let Some(tracker) = tracker.upgrade() {
                tracker.scan_links();
            }
        });
    }

    /// Report the current URL if it differs from the last one reported
    ///
    /// With `force` the URL is reported even when unchanged. Returns whether
    /// a message was sent.
    pub fn notify_url_change(&self, force: bool) -> bool {
        let Some(page) = self.page.upgrade() else {
            return false;
        };
        let location = page.location();
        let href = location.href().to_string();

        {
            let mut current = lock(&self.current_url);
            if !force && *current == href {
                return false;
            }
            *current = href.clone();
        }

        let pathname = location.pathname().to_string();
        let discovered_routes = {
            let mut routes = lock(&self.routes);
            routes.insert(pathname.clone());
            routes.iter().cloned().collect()
        };

        log::debug!("URL changed to {}", pathname);
        self.publisher.send(OutgoingMessage::UrlChange(UrlChange {
            full_url: href,
            pathname,
            search: location.search(),
            hash: location.hash(),
            discovered_routes,
        }));
        true
    }

    /// Collect root-relative links and report any route not seen before
    pub fn scan_links(&self) {
        let Some(page) = self.page.upgrade() else { return };
        let candidates = page.read_document(candidate_routes);

        let (all_routes, new_routes) = {
            let mut routes = lock(&self.routes);
            let added: Vec<String> = candidates.into_iter().filter(|r| routes.insert(r.clone())).collect();
            if added.is_empty() {
                return;
            }
            (routes.iter().cloned().collect(), added)
        };

        log::debug!("Found new routes: {:?}", new_routes);
        self.publisher.send(OutgoingMessage::RoutesDiscovered(RoutesDiscovered {
            all_routes,
            new_routes,
            source: page.location().pathname().to_string(),
            scan_method: SCAN_METHOD_DOM_LINKS.to_string(),
        }));
    }

    /// Seed the parent after the startup delay with one URL report and one scan
    pub fn start(self: &Arc<Self>) {
        let tracker = Arc::downgrade(self);
        run_after(&self.runtime, self.config.startup_delay_duration(), async move {
            if let Some(tracker) = tracker.upgrade() {
                tracker.notify_url_change(true);
                tracker.scan_links();
                log::debug!("URL tracker initialized");
            }
        });
    }

    /// Listener for back/forward navigation
    pub fn popstate_listener(self: &Arc<Self>) -> PopStateListener {
        let tracker = Arc::downgrade(self);
        Arc::new(move || {
            if let Some(tracker) = tracker.upgrade() {
                tracker.schedule_url_check();
            }
        })
    }

    /// Observer for insertions and removals under the body
    pub fn mutation_callback(self: &Arc<Self>) -> MutationCallback {
        let tracker = Arc::downgrade(self);
        Arc::new(move |_nodes: &[NodeId]| {
            if let Some(tracker) = tracker.upgrade() {
                tracker.schedule_scan(tracker.config.scan_after_mutation());
            }
        })
    }
}

/// Root-relative anchor targets with the query removed
fn candidate_routes(doc: &Document) -> IndexSet<String> {
    doc.link_hrefs_with_prefix(ROOT_ROUTE)
        .into_iter()
        .filter(|href| href != ROOT_ROUTE && !href.contains('#'))
        .map(|href| match href.split_once('?') {
            Some((path, _)) => path.to_string(),
            None => href,
        })
        .filter(|path| path.len() > 1)
        .collect()
}

/// History that moves the page as before, then asks the tracker to check the URL
pub struct ChainedHistory {
    previous: Arc<dyn History>,
    tracker: Arc<NavigationTracker>,
}

impl ChainedHistory {
    pub fn new(previous: Arc<dyn History>, tracker: Arc<NavigationTracker>) -> Self {
        Self { previous, tracker }
    }
}

impl History for ChainedHistory {
    fn push_state(&self, url: &str) -> Result<()> {
        self.previous.push_state(url)?;
        self.tracker.schedule_url_check();
        Ok(())
    }

    fn replace_state(&self, url: &str) -> Result<()> {
        self.previous.replace_state(url)?;
        self.tracker.schedule_url_check();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::MemoryChannel;
    use crate::dom::ElementNode;

    fn setup(body: ElementNode) -> (Arc<Page>, Arc<NavigationTracker>, MemoryChannel) {
        let page = Arc::new(Page::with_document("http://localhost:3000/", Document::from_body(body)).unwrap());
        let channel = MemoryChannel::new();
        let publisher = Arc::new(Publisher::new(Arc::new(channel.clone()), 1000));
        let tracker = NavigationTracker::new(&page, publisher, Arc::new(BridgeConfig::default()), Handle::current());
        page.set_history(Arc::new(ChainedHistory::new(page.history(), tracker.clone())));
        page.add_popstate_listener(tracker.popstate_listener());
        page.observe_mutations(tracker.mutation_callback());
        (page, tracker, channel)
    }

    fn nav() -> ElementNode {
        ElementNode::new("body").with_child(
            ElementNode::new("nav")
                .with_child(ElementNode::link("/", "Home"))
                .with_child(ElementNode::link("/ships?sort=name", "Ships"))
                .with_child(ElementNode::link("/ports", "Ports"))
                .with_child(ElementNode::link("/ports#map", "Map"))
                .with_child(ElementNode::link("https://example.com/docs", "Docs")),
        )
    }

    #[test]
    fn test_candidate_routes() {
        let doc = Document::from_body(nav());
        let routes: Vec<String> = candidate_routes(&doc).into_iter().collect();
        assert_eq!(routes, vec!["/ships", "/ports"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_push_reports_after_settle() {
        let (page, tracker, channel) = setup(nav());

        page.push_state("/ships/42?view=map#track").unwrap();
        assert!(channel.messages_of("url-change").is_empty());

        tokio::time::sleep(Duration::from_millis(20)).await;

        let changes = channel.messages_of("url-change");
        assert_eq!(changes.len(), 1);
        let payload = &changes[0]["payload"];
        assert_eq!(payload["fullUrl"], "http://localhost:3000/ships/42?view=map#track");
        assert_eq!(payload["pathname"], "/ships/42");
        assert_eq!(payload["search"], "?view=map");
        assert_eq!(payload["hash"], "#track");
        assert_eq!(payload["discoveredRoutes"], serde_json::json!(["/", "/ships/42"]));
        assert!(tracker.link_scan.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn test_scan_follows_navigation() {
        let (page, tracker, channel) = setup(nav());

        page.push_state("/fleet").unwrap();
        tokio::time::sleep(Duration::from_millis(400)).await;
        assert!(channel.messages_of("routes-discovered").is_empty());

        tokio::time::sleep(Duration::from_millis(200)).await;
        let found = channel.messages_of("routes-discovered");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0]["payload"]["newRoutes"], serde_json::json!(["/ships", "/ports"]));
        assert_eq!(found[0]["payload"]["allRoutes"], serde_json::json!(["/", "/fleet", "/ships", "/ports"]));
        assert_eq!(found[0]["payload"]["source"], "/fleet");
        assert_eq!(found[0]["payload"]["scanMethod"], "dom-links");
        assert_eq!(tracker.discovered_routes().len(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rapid_pushes_collapse() {
        let (page, _tracker, channel) = setup(nav());

        page.push_state("/a").unwrap();
        page.push_state("/b").unwrap();
        page.replace_state("/c").unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        let changes = channel.messages_of("url-change");
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0]["payload"]["pathname"], "/c");
    }

    #[tokio::test(start_paused = true)]
    async fn test_unchanged_url_not_reported() {
        let (page, _tracker, channel) = setup(nav());

        page.replace_state("/").unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(channel.messages().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_pop_state_reported() {
        let (page, _tracker, channel) = setup(nav());

        page.pop_state("/ports").unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(channel.messages_of("url-change")[0]["payload"]["pathname"], "/ports");
    }

    #[tokio::test(start_paused = true)]
    async fn test_mutation_burst_collapses_into_one_scan() {
        let (page, _tracker, channel) = setup(ElementNode::new("body"));
        let body = page.read_document(|d| d.body());

        for i in 0..5 {
            page.append_child(body, &ElementNode::link(format!("/cargo/{}", i), "Cargo"))
                .unwrap();
            tokio::time::sleep(Duration::from_millis(300)).await;
        }
        assert!(channel.messages_of("routes-discovered").is_empty());

        tokio::time::sleep(Duration::from_millis(800)).await;
        let found = channel.messages_of("routes-discovered");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0]["payload"]["newRoutes"].as_array().unwrap().len(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_known_routes_not_reported_again() {
        let (_page, tracker, channel) = setup(nav());

        tracker.scan_links();
        tracker.scan_links();

        assert_eq!(channel.messages_of("routes-discovered").len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_startup_forces_baseline() {
        let (_page, tracker, channel) = setup(nav());
        tracker.start();

        tokio::time::sleep(Duration::from_millis(999)).await;
        assert!(channel.messages().is_empty());

        tokio::time::sleep(Duration::from_millis(2)).await;
        let changes = channel.messages_of("url-change");
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0]["payload"]["pathname"], "/");
        assert_eq!(channel.messages_of("routes-discovered").len(), 1);
    }
}
