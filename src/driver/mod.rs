//! Session driver seam: everything the engine needs from a live UI session.
//!
//! The targeting core is written entirely against these traits. The one
//! production implementation speaks the W3C WebDriver protocol over HTTP
//! (`webdriver` module); tests run against a scriptable in-memory fake.
//! Every operation here is fallible and, where it waits, timeout-bounded.

pub mod webdriver;

#[cfg(test)]
pub mod fake;

use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;
use url::Url;

pub use webdriver::{WebDriverFactory, WebDriverSession};

/// Opaque handle to one located element within a session.
///
/// Handles are only meaningful to the driver that produced them and only
/// for as long as the underlying page state survives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementHandle(pub String);

/// Declarative descriptor of the element an operation targets.
///
/// Descriptors keep the engine free of selector syntax; each driver maps
/// them onto whatever its query mechanism is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// Any element whose text contains the given string.
    Text(String),
    /// Element whose own text matches exactly.
    ExactText(String),
    /// Element by ARIA role and accessible name.
    Role { role: String, name: String },
    /// Button-like element whose text contains the given string.
    ButtonWithText(String),
    /// Tree row with this exact label that is currently collapsed.
    CollapsedTreeItem(String),
    /// Tree row whose text contains the given model name.
    TreeItemContaining(String),
    /// The expand control inside a tree row (scoped find only).
    ExpandToggle,
    /// The checkbox inside a tree row (scoped find only).
    Checkbox,
}

impl Target {
    pub fn text(s: impl Into<String>) -> Self {
        Target::Text(s.into())
    }

    pub fn role(role: impl Into<String>, name: impl Into<String>) -> Self {
        Target::Role {
            role: role.into(),
            name: name.into(),
        }
    }
}

/// One isolated, exclusively-owned UI session.
///
/// A driver is owned by exactly one worker for the worker's whole lifetime
/// and is never shared or handed off.
#[async_trait]
pub trait SessionDriver: Send {
    /// Navigate the session to `url` and wait for the navigation to commit.
    async fn navigate(&mut self, url: &Url) -> Result<()>;

    /// Wait for the current page's load-completion signal.
    async fn wait_loaded(&mut self, timeout: Duration) -> Result<()>;

    /// Wait until `target` is present and visible, or time out.
    async fn wait_for(&mut self, target: &Target, timeout: Duration) -> Result<ElementHandle>;

    /// Locate zero-or-one element matching `target`, scoped under `within`
    /// when given, against the whole page otherwise.
    async fn find(
        &mut self,
        within: Option<&ElementHandle>,
        target: &Target,
    ) -> Result<Option<ElementHandle>>;

    async fn is_visible(&mut self, el: &ElementHandle) -> Result<bool>;

    /// Read an attribute value; `None` when the attribute is absent.
    async fn attr(&mut self, el: &ElementHandle, name: &str) -> Result<Option<String>>;

    async fn click(&mut self, el: &ElementHandle) -> Result<()>;

    async fn scroll_into_view(&mut self, el: &ElementHandle) -> Result<()>;

    /// Tear the session down. The driver is unusable afterwards.
    async fn close(&mut self) -> Result<()>;
}

/// Opens one fresh isolated session per worker.
#[async_trait]
pub trait SessionFactory: Send + Sync + 'static {
    type Driver: SessionDriver + 'static;

    async fn open(&self, worker_id: usize) -> Result<Self::Driver>;
}

/// The neutral page used by scheduled hard resets.
pub fn blank_url() -> Url {
    // about:blank always parses
    Url::parse("about:blank").expect("about:blank is a valid URL")
}
