use crate::actions::{
    ButtonId, ButtonStatus, ElementId, Progress, ProgressBarId, UiAction, UiActionPlan,
};
use crate::state::Family;
use crate::view::DashboardView;

/// Read side of the rendering surface.
///
/// The projector only asks whether an element is currently shown; this is what
/// drives the one-shot reload when a job finishes.
pub trait ViewProbe {
    fn is_visible(&self, element: ElementId) -> bool;
}

/// Write side of the rendering surface. Every setter is idempotent.
pub trait ActionSink: ViewProbe {
    fn set_visible(&mut self, element: ElementId, visible: bool);
    fn set_button(&mut self, button: ButtonId, status: ButtonStatus, disabled: bool);
    fn set_details_open(&mut self, details: Family, open: bool);
    fn set_progress(&mut self, bar: ProgressBarId, progress: &Progress);
    fn reload_view(&mut self);

    fn show_error(&mut self, message: &str) {
        tracing::error!(message, "dashboard error");
    }
}

pub fn apply_action(sink: &mut dyn ActionSink, action: &UiAction) {
    match action {
        UiAction::SetVisible { element, visible } => sink.set_visible(*element, *visible),
        UiAction::SetButton {
            button,
            status,
            disabled,
        } => sink.set_button(*button, *status, *disabled),
        UiAction::SetDetailsOpen { details, open } => sink.set_details_open(*details, *open),
        UiAction::SetProgress { bar, progress } => sink.set_progress(*bar, progress),
        UiAction::ReloadView => sink.reload_view(),
    }
}

/// Apply a plan in canonical order. A plan that asks for a reload gets exactly
/// one `reload_view()` and nothing else, since the reload supersedes every
/// incremental update. Returns whether the view was reloaded.
pub fn apply_plan(sink: &mut dyn ActionSink, plan: &UiActionPlan) -> bool {
    if plan.requires_reload() {
        sink.reload_view();
        return true;
    }
    for action in plan.actions() {
        apply_action(sink, action);
    }
    false
}

/// Test double: records every call and keeps a [`DashboardView`] underneath so
/// visibility queries answer like a real surface would.
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub view: DashboardView,
    pub calls: Vec<UiAction>,
    pub errors: Vec<String>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reloads(&self) -> usize {
        self.calls
            .iter()
            .filter(|c| **c == UiAction::ReloadView)
            .count()
    }
}

impl ViewProbe for RecordingSink {
    fn is_visible(&self, element: ElementId) -> bool {
        self.view.is_visible(element)
    }
}

impl ActionSink for RecordingSink {
    fn set_visible(&mut self, element: ElementId, visible: bool) {
        self.calls.push(UiAction::SetVisible { element, visible });
        self.view.set_visible(element, visible);
    }

    fn set_button(&mut self, button: ButtonId, status: ButtonStatus, disabled: bool) {
        self.calls.push(UiAction::SetButton {
            button,
            status,
            disabled,
        });
        self.view.set_button(button, status, disabled);
    }

    fn set_details_open(&mut self, details: Family, open: bool) {
        self.calls.push(UiAction::SetDetailsOpen { details, open });
        self.view.set_details_open(details, open);
    }

    fn set_progress(&mut self, bar: ProgressBarId, progress: &Progress) {
        self.calls.push(UiAction::SetProgress {
            bar,
            progress: progress.clone(),
        });
        self.view.set_progress(bar, progress);
    }

    fn reload_view(&mut self) {
        self.calls.push(UiAction::ReloadView);
        self.view.reload_view();
    }

    fn show_error(&mut self, message: &str) {
        self.errors.push(message.to_string());
    }
}

/// Prints each applied action on stdout; used by the headless `watch` mode.
#[derive(Debug, Default)]
pub struct StdoutSink {
    pub view: DashboardView,
}

impl ViewProbe for StdoutSink {
    fn is_visible(&self, element: ElementId) -> bool {
        self.view.is_visible(element)
    }
}

impl ActionSink for StdoutSink {
    fn set_visible(&mut self, element: ElementId, visible: bool) {
        // Only report changes; the plan repeats the full state every poll.
        if self.view.is_visible(element) != visible {
            println!("{}", UiAction::SetVisible { element, visible });
        }
        self.view.set_visible(element, visible);
    }

    fn set_button(&mut self, button: ButtonId, status: ButtonStatus, disabled: bool) {
        if self.view.button(button) != (status, disabled) {
            println!(
                "{}",
                UiAction::SetButton {
                    button,
                    status,
                    disabled
                }
            );
        }
        self.view.set_button(button, status, disabled);
    }

    fn set_details_open(&mut self, details: Family, open: bool) {
        if self.view.details_open(details) != open {
            println!("{}", UiAction::SetDetailsOpen { details, open });
        }
        self.view.set_details_open(details, open);
    }

    fn set_progress(&mut self, bar: ProgressBarId, progress: &Progress) {
        if self.view.progress(bar) != Some(progress) {
            println!(
                "{}",
                UiAction::SetProgress {
                    bar,
                    progress: progress.clone()
                }
            );
        }
        self.view.set_progress(bar, progress);
    }

    fn reload_view(&mut self) {
        println!("{}", UiAction::ReloadView);
        self.view.reload_view();
    }

    fn show_error(&mut self, message: &str) {
        tracing::error!(message, "status polling stopped");
        eprintln!("ERROR: {message}");
    }
}
