//! Page classification
//!
//! Every location the host application can show maps onto one of three
//! pages. The page decides which background loop plays and which intensity
//! transform the visualizer applies.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::Error;

/// Page currently shown by the host application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageState {
    /// Login and registration screens
    Login,
    /// Creation screen (inverted visual intensity)
    Create,
    /// Everything else
    Main,
}

impl PageState {
    /// All pages, in a stable order
    pub const ALL: [PageState; 3] = [PageState::Login, PageState::Create, PageState::Main];

    /// Classify a location path.
    ///
    /// Unknown paths fall back to [`PageState::Main`].
    pub fn from_path(path: &str) -> Self {
        match normalize(path) {
            "/login" | "/register" => PageState::Login,
            "/create" => PageState::Create,
            _ => PageState::Main,
        }
    }

    /// Classify the destination of an in-app link.
    ///
    /// Only tracked routes are recognized; anything else returns `None` and
    /// should be left to the host's default navigation.
    pub fn from_link_path(path: &str) -> Option<Self> {
        match normalize(path) {
            "/login" | "/register" => Some(PageState::Login),
            "/create" => Some(PageState::Create),
            "/" => Some(PageState::Main),
            _ => None,
        }
    }

    /// Name of the background loop asset for this page
    pub fn loop_name(&self) -> &'static str {
        match self {
            PageState::Login => "login",
            PageState::Create => "create",
            PageState::Main => "main",
        }
    }

    /// Reverse of [`PageState::loop_name`]
    pub fn from_loop_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|page| page.loop_name() == name)
    }
}

/// Strip a query string, fragment and trailing slash (except for root)
fn normalize(path: &str) -> &str {
    let end = path.find(|c| c == '?' || c == '#').unwrap_or(path.len());
    let path = &path[..end];
    if path.len() > 1 {
        path.trim_end_matches('/')
    } else if path.is_empty() {
        "/"
    } else {
        path
    }
}

impl std::fmt::Display for PageState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.loop_name())
    }
}

impl FromStr for PageState {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_loop_name(&s.to_ascii_lowercase())
            .ok_or_else(|| Error::InvalidInput(format!("Unknown page: {}", s)))
    }
}
