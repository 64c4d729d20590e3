//! Selection engine: expands the device tree and checks target leaves.
//!
//! The device-model surface is a three-level tree (OS → brand → model)
//! rendered lazily: a branch's children only exist in the DOM once the
//! branch is expanded, and they render asynchronously after the expand
//! click. The engine first walks a fixed list of ancestor labels and
//! expands whichever are present and collapsed, then ensures each target
//! model's leaf is checked. Checking is idempotent: a leaf that is already
//! checked is never clicked, since the click would toggle it back off.

use crate::config::Pacing;
use crate::driver::{ElementHandle, SessionDriver, Target};
use crate::types::{SelectionSummary, TargetModel};
use anyhow::Result;
use tracing::debug;

/// OS-level rows, expanded first so brand rows become visible.
pub const OS_LEVEL: [&str; 5] = ["Android", "iOS", "Windows Phone", "Other/Unknown", "Unknown"];

/// Brand rows, expanded after the OS level so model leaves become visible.
pub const BRANDS: [&str; 15] = [
    "Apple", "Samsung", "Xiaomi", "OPPO", "Realme", "Vivo", "Infinix", "Tecno", "HUAWEI",
    "Google", "Sony", "Nokia", "Motorola", "Lenovo", "LG",
];

/// Outcome of one leaf lookup. Absence and prior satisfaction are ordinary
/// outcomes, not faults; only unexpected driver errors surface as `Err`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupOutcome {
    /// No visible row matched the model for this campaign's data set.
    NotFound,
    /// The row exists and its checkbox is already checked.
    AlreadyChecked,
    /// The row existed unchecked and was toggled on.
    Applied,
}

pub struct SelectionEngine<'a> {
    pacing: &'a Pacing,
}

impl<'a> SelectionEngine<'a> {
    pub fn new(pacing: &'a Pacing) -> Self {
        Self { pacing }
    }

    /// Run one full expansion + selection pass against an open surface.
    ///
    /// Models are independent: a model that cannot be found is counted as
    /// skipped without affecting the rest.
    pub async fn apply<D: SessionDriver>(
        &self,
        driver: &mut D,
        surface: &ElementHandle,
        models: &[TargetModel],
    ) -> Result<SelectionSummary> {
        for label in OS_LEVEL.iter().chain(BRANDS.iter()) {
            self.expand_branch(driver, surface, label).await?;
        }

        let mut summary = SelectionSummary::default();
        for model in models {
            match self.ensure_checked(driver, surface, model).await? {
                LookupOutcome::Applied => summary.applied += 1,
                LookupOutcome::NotFound | LookupOutcome::AlreadyChecked => summary.skipped += 1,
            }
        }

        Ok(summary)
    }

    /// Expand one branch row if it is present and collapsed.
    ///
    /// A label that does not exist, or is already expanded, is skipped
    /// silently: the tree's contents vary per campaign. Returns whether an
    /// expansion actually happened.
    async fn expand_branch<D: SessionDriver>(
        &self,
        driver: &mut D,
        surface: &ElementHandle,
        label: &str,
    ) -> Result<bool> {
        let target = Target::CollapsedTreeItem(label.to_string());
        let Some(row) = driver.find(Some(surface), &target).await? else {
            return Ok(false);
        };

        let Some(toggle) = driver.find(Some(&row), &Target::ExpandToggle).await? else {
            debug!(label, "Collapsed row has no expand control");
            return Ok(false);
        };

        if !driver.is_visible(&toggle).await? {
            return Ok(false);
        }

        driver.scroll_into_view(&row).await?;
        driver.click(&toggle).await?;
        // Children render asynchronously after the expand click; querying
        // them before this settle point sees a stale tree.
        tokio::time::sleep(self.pacing.expand_settle).await;

        Ok(true)
    }

    /// Ensure one model's leaf is checked, without ever toggling a checked
    /// leaf back off.
    async fn ensure_checked<D: SessionDriver>(
        &self,
        driver: &mut D,
        surface: &ElementHandle,
        model: &TargetModel,
    ) -> Result<LookupOutcome> {
        let target = Target::TreeItemContaining(model.as_str().to_string());
        let Some(row) = driver.find(Some(surface), &target).await? else {
            debug!(model = %model, "Model not present in tree");
            return Ok(LookupOutcome::NotFound);
        };

        let Some(checkbox) = driver.find(Some(&row), &Target::Checkbox).await? else {
            debug!(model = %model, "Matched row has no checkbox");
            return Ok(LookupOutcome::NotFound);
        };

        if driver.attr(&checkbox, "aria-checked").await?.as_deref() == Some("true") {
            return Ok(LookupOutcome::AlreadyChecked);
        }

        driver.scroll_into_view(&row).await?;
        driver.click(&row).await?;
        tokio::time::sleep(self.pacing.check_settle).await;

        Ok(LookupOutcome::Applied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::fake::{FakeDriver, FakeState};

    fn fast_pacing() -> Pacing {
        Pacing {
            expand_settle: std::time::Duration::from_millis(1),
            check_settle: std::time::Duration::from_millis(1),
            ..Pacing::default()
        }
    }

    fn surface() -> ElementHandle {
        ElementHandle("modal".into())
    }

    fn models(names: &[&str]) -> Vec<TargetModel> {
        names.iter().map(|n| TargetModel::new(*n)).collect()
    }

    #[tokio::test]
    async fn test_applies_unchecked_models() {
        let (mut driver, state) = FakeDriver::new(FakeState {
            nodes: FakeState::standard_tree(),
            ..Default::default()
        });

        let pacing = fast_pacing();
        let engine = SelectionEngine::new(&pacing);
        let summary = engine
            .apply(&mut driver, &surface(), &models(&["Galaxy S24", "Pixel 8"]))
            .await
            .unwrap();

        assert_eq!(summary.applied, 2);
        assert_eq!(summary.skipped, 0);

        let st = state.lock().unwrap();
        assert!(st.node("Galaxy S24").unwrap().checked);
        assert!(st.node("Pixel 8").unwrap().checked);
    }

    #[tokio::test]
    async fn test_already_checked_leaf_is_never_toggled() {
        let (mut driver, state) = FakeDriver::new(FakeState {
            nodes: FakeState::standard_tree(),
            ..Default::default()
        });

        let pacing = fast_pacing();
        let engine = SelectionEngine::new(&pacing);
        let summary = engine
            .apply(&mut driver, &surface(), &models(&["iPhone 15"]))
            .await
            .unwrap();

        assert_eq!(summary.applied, 0);
        assert_eq!(summary.skipped, 1);
        // Still checked: a click would have un-selected it.
        assert!(state.lock().unwrap().node("iPhone 15").unwrap().checked);
    }

    #[tokio::test]
    async fn test_missing_model_counts_as_skipped() {
        let (mut driver, _state) = FakeDriver::new(FakeState {
            nodes: FakeState::standard_tree(),
            ..Default::default()
        });

        let pacing = fast_pacing();
        let engine = SelectionEngine::new(&pacing);
        let summary = engine
            .apply(
                &mut driver,
                &surface(),
                &models(&["Galaxy S24", "Nokia 3310"]),
            )
            .await
            .unwrap();

        assert_eq!(summary.applied, 1);
        assert_eq!(summary.skipped, 1);
    }

    #[tokio::test]
    async fn test_second_pass_applies_nothing() {
        let (mut driver, _state) = FakeDriver::new(FakeState {
            nodes: FakeState::standard_tree(),
            ..Default::default()
        });

        let pacing = fast_pacing();
        let engine = SelectionEngine::new(&pacing);
        let wanted = models(&["Galaxy S24", "Galaxy A15", "Pixel 8"]);

        let first = engine.apply(&mut driver, &surface(), &wanted).await.unwrap();
        assert_eq!(first.applied, 3);

        let second = engine.apply(&mut driver, &surface(), &wanted).await.unwrap();
        assert_eq!(second.applied, 0);
        assert_eq!(second.skipped, 3);
    }

    #[tokio::test]
    async fn test_duplicate_model_in_one_pass_is_not_retoggled() {
        let (mut driver, state) = FakeDriver::new(FakeState {
            nodes: FakeState::standard_tree(),
            ..Default::default()
        });

        let pacing = fast_pacing();
        let engine = SelectionEngine::new(&pacing);
        let summary = engine
            .apply(&mut driver, &surface(), &models(&["Galaxy S24", "Galaxy S24"]))
            .await
            .unwrap();

        // First occurrence applies; the second sees a checked leaf and must
        // not click it back off.
        assert_eq!(summary.applied, 1);
        assert_eq!(summary.skipped, 1);
        assert!(state.lock().unwrap().node("Galaxy S24").unwrap().checked);
    }

    #[tokio::test]
    async fn test_absent_ancestor_is_skipped_silently() {
        // Tree with no iOS branch at all; expansion must not fail.
        let nodes = vec![
            FakeState::branch("Android", None),
            FakeState::branch("Samsung", Some("Android")),
            FakeState::leaf("Galaxy S24", "Samsung", false),
        ];
        let (mut driver, _state) = FakeDriver::new(FakeState {
            nodes,
            ..Default::default()
        });

        let pacing = fast_pacing();
        let engine = SelectionEngine::new(&pacing);
        let summary = engine
            .apply(&mut driver, &surface(), &models(&["Galaxy S24"]))
            .await
            .unwrap();

        assert_eq!(summary.applied, 1);
    }

    #[tokio::test]
    async fn test_leaf_invisible_without_expansion() {
        // Expansion never happens for a brand whose collapsed row the
        // driver reports missing, so its leaves stay invisible.
        let (mut driver, _state) = FakeDriver::new(FakeState {
            nodes: FakeState::standard_tree(),
            missing: vec!["Samsung".to_string()],
            ..Default::default()
        });

        let pacing = fast_pacing();
        let engine = SelectionEngine::new(&pacing);
        let summary = engine
            .apply(&mut driver, &surface(), &models(&["Galaxy S24"]))
            .await
            .unwrap();

        assert_eq!(summary.applied, 0);
        assert_eq!(summary.skipped, 1);
    }
}
