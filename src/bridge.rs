//! Installing the bridge into a page

use crate::channel::ParentChannel;
use crate::config::BridgeConfig;
use crate::error::{BridgeError, Result};
use crate::event::{Event, EventKind, EventSource, Level};
use crate::host::{ConsoleLevel, Page};
use crate::intercept::{
    ChainedConsole, ChainedErrorHandler, ChainedRejectionHandler, ObservedFetch, ObservedXhrFactory, error_listener,
    rejection_listener,
};
use crate::picker::ElementPicker;
use crate::protocol::{IncomingCommand, OutgoingMessage};
use crate::publisher::Publisher;
use crate::scanner::scan_existing_state;
use crate::schedule::run_after;
use crate::tracker::{ChainedHistory, NavigationTracker};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tokio::runtime::Handle;

const INITIALIZED_MESSAGE: &str = "Lasy console logs connected";

/// One-way initialization flag: uninitialized until claimed, then never reset
#[derive(Debug, Default)]
pub struct InitGuard {
    initialized: AtomicBool,
}

impl InitGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the guard; only the first caller gets `true`
    pub fn try_initialize(&self) -> bool {
        self.initialized
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }
}

/// An installed bridge
///
/// Holds the shared publisher and the two stateful components. The page
/// keeps every decorator and listener alive, so dropping the `Bridge`
/// handle does not uninstall anything.
pub struct Bridge {
    config: Arc<BridgeConfig>,
    publisher: Arc<Publisher>,
    runtime: Handle,
    picker: Arc<ElementPicker>,
    tracker: Arc<NavigationTracker>,
}

impl Bridge {
    /// Install the bridge into `page`, posting to `channel`
    ///
    /// Every capability slot is wrapped around its current occupant, so
    /// anything installed earlier keeps working. Fails with
    /// [`BridgeError::AlreadyInstalled`] on a page that already has a bridge,
    /// without touching any slot.
    ///
    /// Must be called from within a tokio runtime. Delayed work is spawned on
    /// that runtime, so the page may be driven from other threads afterwards.
    pub fn install(page: &Arc<Page>, config: BridgeConfig, channel: Arc<dyn ParentChannel>) -> Result<Arc<Bridge>> {
        config.validate()?;
        let runtime = Handle::try_current()?;
        if !page.bridge_guard().try_initialize() {
            log::debug!("Bridge already installed on {}", page.href());
            return Err(BridgeError::AlreadyInstalled);
        }

        let config = Arc::new(config);
        let publisher = Arc::new(Publisher::new(channel, config.arg_cap));
        publisher.send(OutgoingMessage::BridgeReady);

        install_interceptors(page, &publisher, &config);

        let picker = ElementPicker::new(page, publisher.clone(), config.clone());
        let tracker = NavigationTracker::new(page, publisher.clone(), config.clone(), runtime.clone());
        let bridge = Arc::new(Bridge {
            config,
            publisher,
            runtime,
            picker,
            tracker,
        });

        bridge.install_navigation(page);
        bridge.install_command_listener(page);
        bridge.schedule_state_scan(page);
        bridge.tracker.start();

        bridge.publisher.publish(
            Event::new(EventSource::ClientBridge, Level::Info, EventKind::BridgeInitialized, INITIALIZED_MESSAGE)
                .with_arg(INITIALIZED_MESSAGE),
        );
        log::debug!("Bridge installed on {}", page.href());

        Ok(bridge)
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn picker(&self) -> &Arc<ElementPicker> {
        &self.picker
    }

    pub fn tracker(&self) -> &Arc<NavigationTracker> {
        &self.tracker
    }

    fn install_navigation(&self, page: &Arc<Page>) {
        page.set_history(Arc::new(ChainedHistory::new(page.history(), self.tracker.clone())));
        page.add_popstate_listener(self.tracker.popstate_listener());
        page.observe_mutations(self.tracker.mutation_callback());
    }

    fn install_command_listener(&self, page: &Arc<Page>) {
        let picker = self.picker.clone();
        page.add_message_listener(Arc::new(move |data: &serde_json::Value| {
            if let Some(command) = IncomingCommand::parse(data) {
                picker.handle_command(&command);
            }
        }));
    }

    fn schedule_state_scan(&self, page: &Arc<Page>) {
        let page: Weak<Page> = Arc::downgrade(page);
        let publisher = self.publisher.clone();
        run_after(&self.runtime, self.config.state_scan_delay_duration(), async move {
            if let Some(page) = page.upgrade() {
                scan_existing_state(&page, &publisher);
            }
        });
    }
}

fn install_interceptors(page: &Page, publisher: &Arc<Publisher>, config: &Arc<BridgeConfig>) {
    for level in ConsoleLevel::ALL {
        let previous = page.console_method(level);
        page.set_console_method(
            level,
            Arc::new(ChainedConsole::new(level, previous, publisher.clone(), config.clone())),
        );
    }

    page.set_error_handler(Some(Arc::new(ChainedErrorHandler::new(
        page.error_handler(),
        publisher.clone(),
    ))));
    page.add_error_listener(error_listener(publisher.clone()));

    page.set_rejection_handler(Some(Arc::new(ChainedRejectionHandler::new(
        page.rejection_handler(),
        publisher.clone(),
    ))));
    page.add_rejection_listener(rejection_listener(publisher.clone()));

    page.set_fetch(Arc::new(ObservedFetch::new(page.fetch_primitive(), publisher.clone())));
    page.set_xhr_factory(Arc::new(ObservedXhrFactory::new(page.xhr_factory(), publisher.clone())));
}
