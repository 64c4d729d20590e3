//! Scriptable in-memory session driver for tests.
//!
//! Models just enough of the campaign settings page and the device-model
//! tree to exercise the selection engine, executor, retry, reset, and
//! orchestrator paths: a navigable "page", a modal that opens when the
//! Device Models button is clicked, and a three-level label tree whose
//! rows become visible as ancestors expand. Failures are injected per
//! campaign by scripting how many times the modal refuses to open.

use super::{ElementHandle, SessionDriver, SessionFactory, Target};
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use url::Url;

#[derive(Debug, Clone)]
pub struct FakeTreeNode {
    pub label: String,
    pub parent: Option<String>,
    pub expanded: bool,
    pub checked: bool,
    pub has_children: bool,
}

#[derive(Debug, Default)]
pub struct FakeState {
    pub nodes: Vec<FakeTreeNode>,
    pub modal_open: bool,
    /// Every URL navigated to, in order.
    pub navigations: Vec<String>,
    /// Campaign ids for which Save was clicked, in order.
    pub saves: Vec<String>,
    /// Remaining times the model dialog refuses to open, per campaign id.
    pub fail_surface_opens: HashMap<String, u32>,
    /// Page texts / labels that lookups should report as absent.
    pub missing: Vec<String>,
    pub current_campaign: Option<String>,
    pub closed: bool,
}

impl FakeState {
    /// A tree node with children (an OS or brand level row).
    pub fn branch(label: &str, parent: Option<&str>) -> FakeTreeNode {
        FakeTreeNode {
            label: label.to_string(),
            parent: parent.map(str::to_string),
            expanded: false,
            checked: false,
            has_children: true,
        }
    }

    /// A leaf model row.
    pub fn leaf(label: &str, parent: &str, checked: bool) -> FakeTreeNode {
        FakeTreeNode {
            label: label.to_string(),
            parent: Some(parent.to_string()),
            expanded: false,
            checked,
            has_children: false,
        }
    }

    /// A small realistic tree: Android → Samsung/Google brands with models,
    /// iOS → Apple with models.
    pub fn standard_tree() -> Vec<FakeTreeNode> {
        vec![
            Self::branch("Android", None),
            Self::branch("iOS", None),
            Self::branch("Samsung", Some("Android")),
            Self::branch("Google", Some("Android")),
            Self::branch("Apple", Some("iOS")),
            Self::leaf("Galaxy S24", "Samsung", false),
            Self::leaf("Galaxy A15", "Samsung", false),
            Self::leaf("Pixel 8", "Google", false),
            Self::leaf("iPhone 15", "Apple", true),
        ]
    }

    pub fn node(&self, label: &str) -> Option<&FakeTreeNode> {
        self.nodes.iter().find(|n| n.label == label)
    }

    fn node_mut(&mut self, label: &str) -> Option<&mut FakeTreeNode> {
        self.nodes.iter_mut().find(|n| n.label == label)
    }

    /// A row is visible once every ancestor is expanded.
    fn is_row_visible(&self, label: &str) -> bool {
        let mut current = match self.node(label) {
            Some(n) => n,
            None => return false,
        };
        while let Some(parent_label) = &current.parent {
            match self.node(parent_label) {
                Some(parent) if parent.expanded => current = parent,
                _ => return false,
            }
        }
        true
    }

    fn is_missing(&self, label: &str) -> bool {
        self.missing.iter().any(|m| m == label)
    }
}

/// Driver over a shared `FakeState`; tests keep the `Arc` for assertions.
pub struct FakeDriver {
    pub state: Arc<Mutex<FakeState>>,
}

impl FakeDriver {
    pub fn new(state: FakeState) -> (Self, Arc<Mutex<FakeState>>) {
        let shared = Arc::new(Mutex::new(state));
        (
            Self {
                state: shared.clone(),
            },
            shared,
        )
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.state.lock().expect("fake state poisoned")
    }
}

#[async_trait]
impl SessionDriver for FakeDriver {
    async fn navigate(&mut self, url: &Url) -> Result<()> {
        let mut st = self.lock();
        st.navigations.push(url.to_string());
        st.modal_open = false;
        st.current_campaign = url
            .query_pairs()
            .find(|(k, _)| k == "campaignId")
            .map(|(_, v)| v.into_owned());
        Ok(())
    }

    async fn wait_loaded(&mut self, _timeout: Duration) -> Result<()> {
        Ok(())
    }

    async fn wait_for(&mut self, target: &Target, timeout: Duration) -> Result<ElementHandle> {
        if let Target::Role { role, name } = target {
            if role == "dialog" {
                let mut st = self.lock();
                let campaign = st.current_campaign.clone().unwrap_or_default();
                if let Some(left) = st.fail_surface_opens.get_mut(&campaign) {
                    if *left > 0 {
                        *left -= 1;
                        return Err(anyhow::anyhow!(
                            "Timed out after {timeout:?} waiting for dialog `{name}`"
                        ));
                    }
                }
                if st.modal_open {
                    return Ok(ElementHandle("modal".into()));
                }
                return Err(anyhow::anyhow!("Dialog `{name}` never opened"));
            }
        }

        match self.find(None, target).await? {
            Some(el) => Ok(el),
            None => Err(anyhow::anyhow!(
                "Timed out after {timeout:?} waiting for {target:?}"
            )),
        }
    }

    async fn find(
        &mut self,
        within: Option<&ElementHandle>,
        target: &Target,
    ) -> Result<Option<ElementHandle>> {
        let st = self.lock();

        let handle = match target {
            Target::Text(t) | Target::ExactText(t) | Target::ButtonWithText(t) => {
                if st.is_missing(t) {
                    None
                } else {
                    Some(ElementHandle(format!("page:{t}")))
                }
            }
            Target::Role { role, name } if role == "button" => {
                if st.is_missing(name) {
                    None
                } else {
                    Some(ElementHandle(format!("btn:{name}")))
                }
            }
            Target::Role { role, name } if role == "dialog" => {
                if st.modal_open && !st.is_missing(name) {
                    Some(ElementHandle("modal".into()))
                } else {
                    None
                }
            }
            Target::Role { .. } => None,
            Target::CollapsedTreeItem(label) => st
                .node(label)
                .filter(|n| n.has_children && !n.expanded && !st.is_missing(label))
                .map(|n| ElementHandle(format!("row:{}", n.label))),
            Target::TreeItemContaining(model) => st
                .nodes
                .iter()
                .find(|n| {
                    n.label.contains(model.as_str())
                        && st.is_row_visible(&n.label)
                        && !st.is_missing(&n.label)
                })
                .map(|n| ElementHandle(format!("row:{}", n.label))),
            Target::ExpandToggle => within
                .and_then(|el| el.0.strip_prefix("row:"))
                .map(|label| ElementHandle(format!("toggle:{label}"))),
            Target::Checkbox => within
                .and_then(|el| el.0.strip_prefix("row:"))
                .map(|label| ElementHandle(format!("cb:{label}"))),
        };

        Ok(handle)
    }

    async fn is_visible(&mut self, el: &ElementHandle) -> Result<bool> {
        let st = self.lock();
        if let Some(label) = el.0.strip_prefix("row:").or(el.0.strip_prefix("toggle:")) {
            return Ok(st.node(label).is_some());
        }
        Ok(true)
    }

    async fn attr(&mut self, el: &ElementHandle, name: &str) -> Result<Option<String>> {
        let st = self.lock();
        if name == "aria-checked" {
            if let Some(label) = el.0.strip_prefix("cb:") {
                return Ok(st
                    .node(label)
                    .map(|n| if n.checked { "true" } else { "false" }.to_string()));
            }
        }
        Ok(None)
    }

    async fn click(&mut self, el: &ElementHandle) -> Result<()> {
        let mut st = self.lock();

        if let Some(label) = el.0.strip_prefix("toggle:") {
            if let Some(node) = st.node_mut(label) {
                node.expanded = true;
            }
        } else if let Some(label) = el.0.strip_prefix("row:") {
            // Clicking a leaf row toggles its checkbox, both directions.
            if let Some(node) = st.node_mut(label) {
                node.checked = !node.checked;
            }
        } else if el.0 == "page:Device Models" {
            st.modal_open = true;
        } else if el.0 == "btn:Done" {
            st.modal_open = false;
        } else if el.0 == "btn:Save" {
            let campaign = st.current_campaign.clone().unwrap_or_default();
            st.saves.push(campaign);
        }

        Ok(())
    }

    async fn scroll_into_view(&mut self, _el: &ElementHandle) -> Result<()> {
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.lock().closed = true;
        Ok(())
    }
}

type StateBuilder = dyn Fn(usize) -> FakeState + Send + Sync;

/// Factory producing one `FakeDriver` per worker; created states are kept
/// so tests can assert on them after the run completes.
pub struct FakeFactory {
    builder: Box<StateBuilder>,
    pub opened: Mutex<Vec<(usize, Arc<Mutex<FakeState>>)>>,
    /// Worker ids whose session open should fail outright.
    pub fail_opens: Mutex<Vec<usize>>,
}

impl FakeFactory {
    pub fn new(builder: impl Fn(usize) -> FakeState + Send + Sync + 'static) -> Self {
        Self {
            builder: Box::new(builder),
            opened: Mutex::new(Vec::new()),
            fail_opens: Mutex::new(Vec::new()),
        }
    }

    /// State of the driver opened for `worker_id`, if any.
    pub fn state_of(&self, worker_id: usize) -> Option<Arc<Mutex<FakeState>>> {
        self.opened
            .lock()
            .expect("opened list poisoned")
            .iter()
            .find(|(id, _)| *id == worker_id)
            .map(|(_, st)| st.clone())
    }
}

#[async_trait]
impl SessionFactory for FakeFactory {
    type Driver = FakeDriver;

    async fn open(&self, worker_id: usize) -> Result<FakeDriver> {
        if self
            .fail_opens
            .lock()
            .expect("fail list poisoned")
            .contains(&worker_id)
        {
            return Err(anyhow::anyhow!("Session open failed for worker {worker_id}"));
        }

        let (driver, state) = FakeDriver::new((self.builder)(worker_id));
        self.opened
            .lock()
            .expect("opened list poisoned")
            .push((worker_id, state));
        Ok(driver)
    }
}
