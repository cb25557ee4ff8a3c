use std::collections::BTreeMap;

use crate::actions::{ButtonId, ButtonStatus, ElementId, Progress, ProgressBarId};
use crate::sink::{ActionSink, ViewProbe};
use crate::state::Family;

/// In-memory model of the dashboard elements. The terminal dashboard renders
/// from it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DashboardView {
    visible: BTreeMap<ElementId, bool>,
    buttons: BTreeMap<ButtonId, (ButtonStatus, bool)>,
    details: BTreeMap<Family, bool>,
    progress: BTreeMap<ProgressBarId, Progress>,
    reloads: u64,
    last_error: Option<String>,
}

impl DashboardView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Buttons that were never touched render as a locked todo.
    pub fn button(&self, button: ButtonId) -> (ButtonStatus, bool) {
        self.buttons
            .get(&button)
            .copied()
            .unwrap_or((ButtonStatus::Todo, true))
    }

    pub fn button_enabled(&self, button: ButtonId) -> bool {
        let row_visible = self.is_visible(ElementId::Row(button.family()));
        row_visible && !self.button(button).1
    }

    pub fn details_open(&self, family: Family) -> bool {
        self.details.get(&family).copied().unwrap_or(false)
    }

    pub fn progress(&self, bar: ProgressBarId) -> Option<&Progress> {
        self.progress.get(&bar)
    }

    /// Progress to draw for a bar, if the bar is currently shown.
    pub fn visible_progress(&self, bar: ProgressBarId) -> Option<&Progress> {
        if self.is_visible(ElementId::ProgressBar(bar)) {
            self.progress.get(&bar)
        } else {
            None
        }
    }

    pub fn visible_rows(&self) -> Vec<Family> {
        Family::ORDER
            .into_iter()
            .filter(|f| self.is_visible(ElementId::Row(*f)))
            .collect()
    }

    pub fn reload_count(&self) -> u64 {
        self.reloads
    }

    /// Errors reported since the user last dismissed them, oldest first.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn clear_error(&mut self) {
        self.last_error = None;
    }
}

impl ViewProbe for DashboardView {
    fn is_visible(&self, element: ElementId) -> bool {
        self.visible.get(&element).copied().unwrap_or(false)
    }
}

impl ActionSink for DashboardView {
    fn set_visible(&mut self, element: ElementId, visible: bool) {
        self.visible.insert(element, visible);
    }

    fn set_button(&mut self, button: ButtonId, status: ButtonStatus, disabled: bool) {
        self.buttons.insert(button, (status, disabled));
    }

    fn set_details_open(&mut self, details: Family, open: bool) {
        self.details.insert(details, open);
    }

    fn set_progress(&mut self, bar: ProgressBarId, progress: &Progress) {
        self.progress.insert(bar, progress.clone());
    }

    /// Back to the freshly-loaded layout: nothing shown, every progress bar
    /// hidden. A pending error stays until dismissed.
    fn reload_view(&mut self) {
        let reloads = self.reloads.saturating_add(1);
        let last_error = self.last_error.take();
        *self = Self::default();
        self.reloads = reloads;
        self.last_error = last_error;
    }

    fn show_error(&mut self, message: &str) {
        tracing::error!(message, "dashboard error");
        self.last_error = Some(match self.last_error.take() {
            Some(shown) if shown.lines().any(|l| l == message) => shown,
            Some(shown) => format!("{shown}\n{message}"),
            None => message.to_string(),
        });
    }
}
