use sandbox_bridge::host::{
    ConsoleLevel, ConsoleMethod, DomEventKind, ErrorHandler, ErrorReport, Fetch, FetchRequest, NetworkRoute, PerformanceEntry,
    Rejection, ScriptError, ScriptedFetch,
};
use sandbox_bridge::publisher::{TRUNCATION_MARKER, UNSERIALIZABLE_PLACEHOLDER};
use sandbox_bridge::{Arg, Bridge, BridgeConfig, BridgeError, Document, ElementNode, MemoryChannel, Page};
use serde_json::json;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Default)]
struct RecordingConsole {
    calls: Mutex<Vec<Vec<Arg>>>,
}

impl ConsoleMethod for RecordingConsole {
    fn call(&self, args: &[Arg]) {
        self.calls.lock().unwrap().push(args.to_vec());
    }
}

struct AppErrorHandler;

impl ErrorHandler for AppErrorHandler {
    fn on_error(&self, _report: &ErrorReport) -> bool {
        true
    }
}

fn marine_tracker() -> ElementNode {
    ElementNode::new("body").with_child(
        ElementNode::new("main")
            .with_id("app")
            .with_child(
                ElementNode::new("nav")
                    .with_child(ElementNode::link("/", "Home"))
                    .with_child(ElementNode::link("/ships", "Ships"))
                    .with_child(ElementNode::link("/ports?sort=name", "Ports")),
            )
            .with_child(
                ElementNode::new("section")
                    .with_child(ElementNode::new("div").with_id("foo").with_class("card"))
                    .with_child(ElementNode::new("div").with_class("lasy-highlight active").with_text("Active ship")),
            ),
    )
}

fn new_page() -> Arc<Page> {
    let page = Page::with_document("http://localhost:3000/", Document::from_body(marine_tracker()))
        .expect("Failed to create page");
    Arc::new(page)
}

fn install(page: &Arc<Page>) -> (Arc<Bridge>, MemoryChannel) {
    let channel = MemoryChannel::new();
    let bridge = Bridge::install(page, BridgeConfig::default(), Arc::new(channel.clone())).expect("Failed to install bridge");
    channel.clear();
    (bridge, channel)
}

#[tokio::test(start_paused = true)]
async fn test_console_behaviour_preserved_for_every_level() {
    let page = new_page();
    let recorders: Vec<Arc<RecordingConsole>> = ConsoleLevel::ALL
        .iter()
        .map(|level| {
            let recorder = Arc::new(RecordingConsole::default());
            page.set_console_method(*level, recorder.clone());
            recorder
        })
        .collect();
    let (_bridge, channel) = install(&page);

    let args = vec![Arg::from("fleet"), Arg::from(3_i64), Arg::from(json!({"ok": true})), Arg::Undefined];
    for level in ConsoleLevel::ALL {
        page.console(level, &args);
        page.console(level, &[Arg::from("[Fast Refresh] rebuilding")]);
    }

    for recorder in &recorders {
        let calls = recorder.calls.lock().unwrap();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0], args);
    }

    let events = channel.events();
    assert_eq!(events.len(), 4);
    let levels: Vec<&str> = events.iter().map(|e| e["level"].as_str().unwrap()).collect();
    assert_eq!(levels, vec!["log", "info", "warn", "error"]);
    assert_eq!(events[0]["message"], "fleet 3 [object Object] undefined");
}

#[tokio::test(start_paused = true)]
async fn test_noise_never_published() {
    let page = new_page();
    let (_bridge, channel) = install(&page);

    page.console(ConsoleLevel::Log, &[Arg::from("[HMR] connected"), Arg::from("ships")]);
    page.console(ConsoleLevel::Warn, &[Arg::from("Lasy bridge error:"), Arg::from(json!({"a": 1}))]);
    page.console(ConsoleLevel::Error, &[Arg::from("webpack: compiled with 1 error")]);

    assert!(channel.events().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_large_and_unserializable_arguments() {
    let page = new_page();
    let recorder = Arc::new(RecordingConsole::default());
    page.set_console_method(ConsoleLevel::Log, recorder.clone());
    let (_bridge, channel) = install(&page);

    let route = json!({ "waypoints": "N".repeat(5000) });
    let window = Arg::Opaque("[object Window]".to_string());
    page.console(ConsoleLevel::Log, &[Arg::from(route.clone()), window.clone()]);

    let events = channel.events();
    let published = events[0]["args"][0].as_str().unwrap();
    assert_eq!(published.chars().count(), 1000 + TRUNCATION_MARKER.len());
    assert!(published.ends_with(TRUNCATION_MARKER));
    assert_eq!(events[0]["args"][1], UNSERIALIZABLE_PLACEHOLDER);

    let calls = recorder.calls.lock().unwrap();
    assert_eq!(calls[0], vec![Arg::Object(route), window]);
}

#[tokio::test(start_paused = true)]
async fn test_errors_and_rejections_forwarded_and_chained() {
    let page = new_page();
    page.set_error_handler(Some(Arc::new(AppErrorHandler)));
    let (_bridge, channel) = install(&page);

    let report = ErrorReport::new("Uncaught ReferenceError: map is not defined")
        .at("http://localhost:3000/_next/static/chunks/app.js", 12, 4)
        .with_error(ScriptError::new("map is not defined").with_stack("ReferenceError: map is not defined"));
    assert!(page.report_error(&report));

    page.report_rejection(&Rejection::error(ScriptError::new("AIS feed timeout")));

    let kinds: Vec<String> = channel
        .events()
        .iter()
        .map(|e| e["type"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(
        kinds,
        vec!["window-onerror", "javascript-error", "promise-rejection", "promise-rejection-listener"]
    );
}

#[tokio::test(start_paused = true)]
async fn test_http_404_reported_once_and_returned() {
    let page = new_page();
    page.set_fetch(Arc::new(ScriptedFetch::new().route("/api/ships/404", NetworkRoute::status(404))));
    let (_bridge, channel) = install(&page);

    let response = page
        .fetch(FetchRequest::get("/api/ships/404"))
        .await
        .expect("A 404 is still a response");

    assert_eq!(response.status, 404);
    assert_eq!(response.status_text, "Not Found");

    let events = channel.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["status"], 404);
    assert_eq!(events[0]["level"], "network");
}

#[tokio::test(start_paused = true)]
async fn test_connection_error_reported_once_and_rethrown() {
    let page = new_page();
    let inner = ScriptedFetch::new().route("/api/ports", NetworkRoute::fail("ECONNREFUSED"));
    let expected = inner
        .fetch(FetchRequest::get("/api/ports"))
        .await
        .expect_err("route is scripted to fail");
    page.set_fetch(Arc::new(inner));
    let (_bridge, channel) = install(&page);

    let error = page.fetch(FetchRequest::get("/api/ports")).await.unwrap_err();

    assert_eq!(error, expected);
    let events = channel.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["type"], "fetch-failure");
    assert_eq!(events[0]["message"], "ECONNREFUSED");
    assert_eq!(events[0]["stack"].as_str(), expected.stack.as_deref());
}

#[tokio::test(start_paused = true)]
async fn test_picker_activation_is_idempotent() {
    let page = new_page();
    let (_bridge, channel) = install(&page);
    let activate = json!({"type": "lasy-element-selector", "action": "activate"});

    page.receive_message(&activate);
    page.receive_message(&activate);
    assert_eq!(page.listener_count(DomEventKind::PointerOver), 1);
    assert_eq!(page.listener_count(DomEventKind::Click), 1);

    let card = page.read_document(|d| d.find_by_id("foo")).unwrap();
    page.dispatch(DomEventKind::PointerOver, card);
    let class = page.read_document(|d| d.class_name(card).to_string());
    assert_eq!(class, "card lasy-highlight");

    page.receive_message(&json!({"type": "something-else", "action": "activate"}));
    assert!(channel.messages().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_pick_reports_selection_and_deactivates() {
    let page = new_page();
    let (bridge, channel) = install(&page);
    page.receive_message(&json!({"type": "lasy-element-selector", "action": "activate"}));

    let active = page.read_document(|d| d.query_selector(".active")).unwrap();
    let card = page.read_document(|d| d.find_by_id("foo")).unwrap();

    let event = page.dispatch(DomEventKind::Click, active);
    assert!(event.default_prevented());

    let selected = channel.messages_of("element-selected");
    assert_eq!(selected.len(), 1);
    assert_eq!(selected[0]["payload"]["selector"], ".active");
    assert_eq!(selected[0]["payload"]["elementInfo"]["text"], "Active ship");
    assert!(!bridge.picker().is_active());

    page.dispatch(DomEventKind::PointerOver, card);
    assert!(!page.read_document(|d| d.has_class(card, "lasy-highlight")));
    assert!(page.read_document(|d| d.find_by_id("lasy-selector-style")).is_none());
}

#[tokio::test(start_paused = true)]
async fn test_push_state_sequence_discovers_routes() {
    let page = new_page();
    let (bridge, channel) = install(&page);

    page.push_state("/a").expect("push /a");
    tokio::time::sleep(Duration::from_millis(20)).await;
    page.push_state("/b").expect("push /b");
    tokio::time::sleep(Duration::from_millis(20)).await;

    let routes = bridge.tracker().discovered_routes();
    for route in ["/", "/a", "/b"] {
        assert!(routes.iter().any(|r| r == route), "missing {}", route);
    }

    let paths: Vec<String> = channel
        .messages_of("url-change")
        .iter()
        .map(|m| m["payload"]["pathname"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(paths, vec!["/a", "/b"]);

    tokio::time::sleep(Duration::from_millis(600)).await;
    let found = channel.messages_of("routes-discovered");
    assert_eq!(found.len(), 1);
    assert_eq!(found[0]["payload"]["newRoutes"], json!(["/ships", "/ports"]));
    assert_eq!(found[0]["payload"]["source"], "/b");
}

#[tokio::test(start_paused = true)]
async fn test_existing_state_and_startup_baseline() {
    let page = new_page();
    page.set_framework_data(Some(json!({ "props": { "pageProps": { "statusCode": 500 } } })));
    page.add_performance_entry(PerformanceEntry::new("http://localhost:3000/favicon.ico", 0.0));
    let (_bridge, channel) = install(&page);

    tokio::time::sleep(Duration::from_millis(150)).await;
    let kinds: Vec<String> = channel
        .events()
        .iter()
        .map(|e| e["type"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(kinds, vec!["network-performance", "page-error"]);
    assert!(channel.messages_of("url-change").is_empty());

    tokio::time::sleep(Duration::from_millis(900)).await;
    let changes = channel.messages_of("url-change");
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0]["payload"]["fullUrl"], "http://localhost:3000/");
    assert_eq!(channel.messages_of("routes-discovered").len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_dom_churn_collapses_into_one_scan() {
    let page = new_page();
    let (_bridge, channel) = install(&page);
    tokio::time::sleep(Duration::from_millis(1100)).await;
    channel.clear();

    let nav = page.read_document(|d| d.query_selector("nav")).unwrap();
    for berth in 1..=4 {
        page.append_child(nav, &ElementNode::link(format!("/berths/{}", berth), "Berth"))
            .expect("append link");
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    assert!(channel.messages_of("routes-discovered").is_empty());

    tokio::time::sleep(Duration::from_millis(1000)).await;
    let found = channel.messages_of("routes-discovered");
    assert_eq!(found.len(), 1);
    assert_eq!(
        found[0]["payload"]["newRoutes"],
        json!(["/berths/1", "/berths/2", "/berths/3", "/berths/4"])
    );
}

#[tokio::test(start_paused = true)]
async fn test_second_install_rejected() {
    let page = new_page();
    let (_bridge, channel) = install(&page);

    let again = Bridge::install(&page, BridgeConfig::default(), Arc::new(channel.clone()));
    assert!(matches!(again, Err(BridgeError::AlreadyInstalled)));

    page.console(ConsoleLevel::Info, &[Arg::from("one event")]);
    assert_eq!(channel.events().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_page_driven_from_plain_threads() {
    let page = new_page();
    let (_bridge, channel) = install(&page);
    tokio::time::sleep(Duration::from_millis(1100)).await;
    channel.clear();

    let worker = {
        let page = page.clone();
        std::thread::spawn(move || {
            page.push_state("/ships").expect("push state");
            let nav = page.read_document(|d| d.query_selector("nav")).expect("nav present");
            page.append_child(nav, &ElementNode::link("/docks", "Docks")).expect("append link");
        })
    };
    worker.join().expect("page operations must not panic off the runtime");
    assert_eq!(page.location().pathname(), "/ships");

    tokio::time::sleep(Duration::from_millis(20)).await;
    let changes = channel.messages_of("url-change");
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0]["payload"]["pathname"], "/ships");

    tokio::time::sleep(Duration::from_millis(1100)).await;
    let found = channel.messages_of("routes-discovered");
    assert_eq!(found.len(), 1);
    assert_eq!(found[0]["payload"]["newRoutes"], json!(["/docks"]));
}
