//! Bridge replay tool
//!
//! Builds a page from a JSON scenario, installs the bridge into it and plays the
//! scenario's steps against the page. Every message the bridge posts to the
//! parent frame is written to stdout as one JSON document per line.

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use sandbox_bridge::host::{
    ConsoleLevel, DomEventKind, ErrorReport, FetchRequest, NetworkRoute, PerformanceEntry, Rejection, ScriptError,
    ScriptedFetch, ScriptedXhrFactory,
};
use sandbox_bridge::{Arg, Bridge, BridgeConfig, Document, ElementNode, JsonLinesChannel, NodeId, Page};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "bridge-replay")]
#[command(version)]
#[command(about = "Replay a page scenario through the sandbox bridge", long_about = None)]
struct Cli {
    /// Scenario file (JSON)
    #[arg(value_name = "SCENARIO")]
    scenario: PathBuf,

    /// Bridge configuration file (JSON); defaults apply to missing fields
    #[arg(long, short = 'c', value_name = "PATH")]
    config: Option<PathBuf>,

    /// Time to let delayed bridge work finish after the last step (milliseconds)
    #[arg(long, default_value = "2000")]
    settle_ms: u64,
}

#[derive(Debug, Deserialize)]
struct Scenario {
    url: String,
    #[serde(default)]
    document: Option<ElementNode>,
    #[serde(default)]
    framework_data: Option<Value>,
    #[serde(default)]
    performance: Vec<PerformanceEntry>,
    #[serde(default)]
    network: HashMap<String, NetworkRoute>,
    #[serde(default)]
    steps: Vec<Step>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
enum Step {
    Console {
        level: ConsoleLevel,
        #[serde(default)]
        args: Vec<Value>,
    },
    Error(ErrorReport),
    Rejection {
        #[serde(default)]
        error: Option<ScriptError>,
        #[serde(default)]
        value: Option<Value>,
    },
    Fetch(FetchRequest),
    Xhr {
        method: String,
        url: String,
        #[serde(default)]
        body: Option<String>,
    },
    PushState {
        url: String,
    },
    ReplaceState {
        url: String,
    },
    PopState {
        url: String,
    },
    Append {
        #[serde(default)]
        parent: Option<String>,
        node: ElementNode,
    },
    Remove {
        selector: String,
    },
    Hover {
        selector: String,
    },
    Click {
        selector: String,
    },
    Message {
        data: Value,
    },
    Wait {
        ms: u64,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    let scenario: Scenario = read_json(&cli.scenario).context("Failed to load scenario")?;
    let config: BridgeConfig = match &cli.config {
        Some(path) => read_json(path).context("Failed to load bridge config")?,
        None => BridgeConfig::default(),
    };

    let page = Arc::new(build_page(&scenario)?);
    let channel = Arc::new(JsonLinesChannel::new(std::io::stdout()));
    let _bridge = Bridge::install(&page, config, channel).context("Failed to install bridge")?;

    for (index, step) in scenario.steps.into_iter().enumerate() {
        log::debug!("Step {}: {:?}", index, step);
        run_step(&page, step)
            .await
            .with_context(|| format!("Step {} failed", index))?;
    }

    tokio::time::sleep(Duration::from_millis(cli.settle_ms)).await;
    Ok(())
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let text = std::fs::read_to_string(path).with_context(|| format!("Cannot read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("Invalid JSON in {}", path.display()))
}

fn build_page(scenario: &Scenario) -> Result<Page> {
    let document = match &scenario.document {
        Some(body) => Document::from_body(body.clone()),
        None => Document::new(),
    };
    let page = Page::with_document(&scenario.url, document)?;

    page.set_framework_data(scenario.framework_data.clone());
    for entry in &scenario.performance {
        page.add_performance_entry(entry.clone());
    }
    page.set_fetch(Arc::new(ScriptedFetch::with_routes(scenario.network.clone())));
    page.set_xhr_factory(Arc::new(ScriptedXhrFactory::new(scenario.network.clone())));
    Ok(page)
}

/// Console arguments: plain JSON, or `{"$opaque": "..."}` for an object with no JSON form
fn console_arg(value: Value) -> Arg {
    match value.get("$opaque").and_then(Value::as_str) {
        Some(text) => Arg::Opaque(text.to_string()),
        None => Arg::from(value),
    }
}

fn find(page: &Page, selector: &str) -> Result<NodeId> {
    page.read_document(|doc| doc.query_selector(selector))
        .ok_or_else(|| anyhow!("No element matches '{}'", selector))
}

async fn run_step(page: &Page, step: Step) -> Result<()> {
    match step {
        Step::Console { level, args } => {
            let args: Vec<Arg> = args.into_iter().map(console_arg).collect();
            page.console(level, &args);
        }
        Step::Error(report) => {
            let handled = page.report_error(&report);
            log::debug!("Error handled by page: {}", handled);
        }
        Step::Rejection { error, value } => {
            let rejection = match (error, value) {
                (Some(error), _) => Rejection::error(error),
                (None, Some(value)) => Rejection::value(value),
                (None, None) => Rejection::value(Arg::Undefined),
            };
            page.report_rejection(&rejection);
        }
        Step::Fetch(request) => match page.fetch(request).await {
            Ok(response) => log::debug!("Fetch {} -> {}", response.url, response.status),
            Err(e) => log::debug!("Fetch failed: {}", e),
        },
        Step::Xhr { method, url, body } => {
            let mut xhr = page.create_xhr();
            xhr.open(&method, &url);
            xhr.send(body);
            log::debug!("Request {} {} -> {}", method, url, xhr.status());
        }
        Step::PushState { url } => page.push_state(&url)?,
        Step::ReplaceState { url } => page.replace_state(&url)?,
        Step::PopState { url } => page.pop_state(&url)?,
        Step::Append { parent, node } => {
            let parent = match parent {
                Some(selector) => find(page, &selector)?,
                None => page.read_document(|doc| doc.body()),
            };
            page.append_child(parent, &node)?;
        }
        Step::Remove { selector } => page.remove_node(find(page, &selector)?)?,
        Step::Hover { selector } => {
            page.dispatch(DomEventKind::PointerOver, find(page, &selector)?);
        }
        Step::Click { selector } => {
            let event = page.dispatch(DomEventKind::Click, find(page, &selector)?);
            log::debug!("Click default prevented: {}", event.default_prevented());
        }
        Step::Message { data } => page.receive_message(&data),
        Step::Wait { ms } => tokio::time::sleep(Duration::from_millis(ms)).await,
    }
    Ok(())
}
