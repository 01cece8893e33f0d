//! Navigation bridge
//!
//! Tracks which page the host shows and turns page changes into loop
//! transitions. In-app link clicks to tracked routes are intercepted: the
//! bridge asks the host to navigate and starts the transition itself.
//! History changes (back/forward) arrive as location reports.

use crate::playback::orchestrator::CrossfadeOrchestrator;
use crate::state::SharedState;
use ambience_common::events::AmbienceEvent;
use ambience_common::PageState;
use reqwest::Url;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

/// Performs navigation on the host
pub trait Navigator: Send + Sync {
    fn navigate(&self, path: &str, page: PageState);
}

/// Asks event stream subscribers to navigate
pub struct EventNavigator {
    state: Arc<SharedState>,
}

impl EventNavigator {
    pub fn new(state: Arc<SharedState>) -> Self {
        Self { state }
    }
}

impl Navigator for EventNavigator {
    fn navigate(&self, path: &str, page: PageState) {
        self.state.broadcast_event(AmbienceEvent::NavigateRequested {
            path: path.to_string(),
            page,
        });
    }
}

/// What the host should do with a clicked link
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum LinkAction {
    /// Intercepted; navigation already requested
    Navigate { path: String, page: PageState },
    /// Not tracked; let the host handle it
    Default,
}

/// Path component of an absolute or relative href
pub fn link_path(href: &str) -> Option<String> {
    let base = Url::parse("http://localhost/").ok()?;
    let url = base.join(href).ok()?;
    Some(url.path().to_string())
}

pub struct NavigationBridge {
    state: Arc<SharedState>,
    orchestrator: CrossfadeOrchestrator,
    navigator: Arc<dyn Navigator>,
}

impl NavigationBridge {
    pub fn new(
        state: Arc<SharedState>,
        orchestrator: CrossfadeOrchestrator,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        Self {
            state,
            orchestrator,
            navigator,
        }
    }

    pub fn current_page(&self) -> PageState {
        self.state.page()
    }

    /// Handle a click on a link to `href`.
    ///
    /// Links with a target, or to untracked routes, fall through to the host.
    pub async fn on_link_click(&self, href: &str, target: Option<&str>) -> LinkAction {
        if target.map(|t| !t.is_empty()).unwrap_or(false) {
            return LinkAction::Default;
        }
        let path = match link_path(href) {
            Some(path) => path,
            None => return LinkAction::Default,
        };
        let page = match PageState::from_link_path(&path) {
            Some(page) => page,
            None => return LinkAction::Default,
        };

        debug!("Intercepted link to {} ({})", path, page);
        self.navigator.navigate(&path, page);
        self.change_page(page).await;
        LinkAction::Navigate { path, page }
    }

    /// The host's location changed (history navigation or a completed load).
    ///
    /// Returns true when the page changed.
    pub async fn on_location_changed(&self, path: &str) -> bool {
        let page = PageState::from_path(path);
        self.change_page(page).await
    }

    async fn change_page(&self, page: PageState) -> bool {
        let old_page = self.state.replace_page(page);
        if old_page == page {
            return false;
        }

        info!("Page changed: {} -> {}", old_page, page);
        self.state.broadcast_event(AmbienceEvent::PageChanged {
            old_page,
            new_page: page,
            timestamp: chrono::Utc::now(),
        });

        // Failures are logged by the orchestrator; the previous loop keeps playing
        if let Err(e) = self.orchestrator.transition(page.loop_name()).await {
            debug!("Transition to '{}' not performed: {}", page.loop_name(), e);
        }
        true
    }
}
