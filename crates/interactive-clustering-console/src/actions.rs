use std::fmt;

use serde::{Serialize, Serializer};

use crate::state::Family;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ProgressBarId {
    InitializeModelization,
    Sampling,
    AnnotationAndModelization,
    Clustering,
}

impl ProgressBarId {
    pub const ALL: [ProgressBarId; 4] = [
        ProgressBarId::InitializeModelization,
        ProgressBarId::Sampling,
        ProgressBarId::AnnotationAndModelization,
        ProgressBarId::Clustering,
    ];

    pub fn dom_id(self) -> &'static str {
        match self {
            ProgressBarId::InitializeModelization => "loadingbar_initialize_modelization",
            ProgressBarId::Sampling => "loadingbar_sampling",
            ProgressBarId::AnnotationAndModelization => "loadingbar_annotation_and_modelization",
            ProgressBarId::Clustering => "loadingbar_clustering",
        }
    }

    pub fn family(self) -> Family {
        match self {
            ProgressBarId::InitializeModelization => Family::Initialization,
            ProgressBarId::Sampling => Family::Sampling,
            ProgressBarId::AnnotationAndModelization => Family::Annotation,
            ProgressBarId::Clustering => Family::Clustering,
        }
    }

    pub fn for_family(family: Family) -> Option<Self> {
        match family {
            Family::Initialization => Some(ProgressBarId::InitializeModelization),
            Family::Sampling => Some(ProgressBarId::Sampling),
            Family::Annotation => Some(ProgressBarId::AnnotationAndModelization),
            Family::Clustering => Some(ProgressBarId::Clustering),
            Family::IterationEnd => None,
        }
    }
}

/// Anything whose visibility can be toggled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ElementId {
    Row(Family),
    ProgressBar(ProgressBarId),
}

impl ElementId {
    pub fn dom_id(self) -> &'static str {
        match self {
            ElementId::Row(Family::Initialization) => "row_step_initialize_modelization",
            ElementId::Row(Family::Sampling) => "row_step_sampling",
            ElementId::Row(Family::Annotation) => "row_step_annotation_and_modelization",
            ElementId::Row(Family::Clustering) => "row_step_clustering",
            ElementId::Row(Family::IterationEnd) => "row_next_iteration",
            ElementId::ProgressBar(bar) => bar.dom_id(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ButtonId {
    RunInitializeModelization,
    RunConstraintsSampling,
    GoToAnnotations,
    RunModelizationUpdate,
    ApproveAnnotations,
    RunConstrainedClustering,
    CreateNextIteration,
}

impl ButtonId {
    pub fn dom_id(self) -> &'static str {
        match self {
            ButtonId::RunInitializeModelization => "button_run_initialize_modelization",
            ButtonId::RunConstraintsSampling => "button_run_constraints_sampling",
            ButtonId::GoToAnnotations => "button_go_to_annotations",
            ButtonId::RunModelizationUpdate => "button_run_modelization_update",
            ButtonId::ApproveAnnotations => "button_approve_annotations",
            ButtonId::RunConstrainedClustering => "button_run_constrained_clustering",
            ButtonId::CreateNextIteration => "button_create_next_iteration",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ButtonId::RunInitializeModelization => "Initialize modelization",
            ButtonId::RunConstraintsSampling => "Sample constraints",
            ButtonId::GoToAnnotations => "Annotate",
            ButtonId::RunModelizationUpdate => "Update modelization",
            ButtonId::ApproveAnnotations => "Approve annotations",
            ButtonId::RunConstrainedClustering => "Run clustering",
            ButtonId::CreateNextIteration => "Next iteration",
        }
    }

    pub fn family(self) -> Family {
        match self {
            ButtonId::RunInitializeModelization => Family::Initialization,
            ButtonId::RunConstraintsSampling => Family::Sampling,
            ButtonId::GoToAnnotations
            | ButtonId::RunModelizationUpdate
            | ButtonId::ApproveAnnotations => Family::Annotation,
            ButtonId::RunConstrainedClustering => Family::Clustering,
            ButtonId::CreateNextIteration => Family::IterationEnd,
        }
    }

    pub fn for_family(family: Family) -> &'static [ButtonId] {
        match family {
            Family::Initialization => &[ButtonId::RunInitializeModelization],
            Family::Sampling => &[ButtonId::RunConstraintsSampling],
            Family::Annotation => &[
                ButtonId::GoToAnnotations,
                ButtonId::RunModelizationUpdate,
                ButtonId::ApproveAnnotations,
            ],
            Family::Clustering => &[ButtonId::RunConstrainedClustering],
            Family::IterationEnd => &[ButtonId::CreateNextIteration],
        }
    }
}

pub fn details_dom_id(family: Family) -> &'static str {
    match family {
        Family::Initialization => "details_step_initialize_modelization",
        Family::Sampling => "details_step_sampling",
        Family::Annotation => "details_annotation_and_modelization",
        Family::Clustering => "details_step_clustering",
        Family::IterationEnd => "details_next_iteration",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ButtonStatus {
    Todo,
    Wip,
    Error,
    Done,
}

impl ButtonStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ButtonStatus::Todo => "todo",
            ButtonStatus::Wip => "wip",
            ButtonStatus::Error => "error",
            ButtonStatus::Done => "done",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressStatus {
    Running,
    Error,
}

impl ProgressStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ProgressStatus::Running => "running",
            ProgressStatus::Error => "error",
        }
    }
}

/// A fully-resolved progress bar fill: defaults are applied before it gets here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Progress {
    pub status: ProgressStatus,
    pub percent: u8,
    pub detail: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum UiAction {
    SetVisible {
        #[serde(serialize_with = "ser_element")]
        element: ElementId,
        visible: bool,
    },
    SetButton {
        #[serde(serialize_with = "ser_button")]
        button: ButtonId,
        status: ButtonStatus,
        disabled: bool,
    },
    SetDetailsOpen {
        #[serde(serialize_with = "ser_details")]
        details: Family,
        open: bool,
    },
    SetProgress {
        #[serde(serialize_with = "ser_bar")]
        bar: ProgressBarId,
        #[serde(flatten)]
        progress: Progress,
    },
    ReloadView,
}

fn ser_element<S: Serializer>(v: &ElementId, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(v.dom_id())
}

fn ser_button<S: Serializer>(v: &ButtonId, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(v.dom_id())
}

fn ser_details<S: Serializer>(v: &Family, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(details_dom_id(*v))
}

fn ser_bar<S: Serializer>(v: &ProgressBarId, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(v.dom_id())
}

impl fmt::Display for UiAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UiAction::SetVisible { element, visible } => {
                let verb = if *visible { "show" } else { "hide" };
                write!(f, "{verb} {}", element.dom_id())
            }
            UiAction::SetButton {
                button,
                status,
                disabled,
            } => {
                let avail = if *disabled { "disabled" } else { "enabled" };
                write!(f, "button {} {} {avail}", button.dom_id(), status.as_str())
            }
            UiAction::SetDetailsOpen { details, open } => {
                let verb = if *open { "open" } else { "close" };
                write!(f, "{verb} {}", details_dom_id(*details))
            }
            UiAction::SetProgress { bar, progress } => write!(
                f,
                "progress {} {} {}% \"{}\"",
                bar.dom_id(),
                progress.status.as_str(),
                progress.percent,
                progress.detail
            ),
            UiAction::ReloadView => f.write_str("reload view"),
        }
    }
}

/// How the projector classified one family for this poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FamilyPhase {
    Hidden,
    /// Visible, but an earlier step has to finish first.
    Locked,
    Todo,
    /// Modelization is outdated and annotations conflict with it.
    Conflicts,
    InProgress,
    Error,
    Done,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FamilyPlan {
    pub family: Family,
    pub phase: FamilyPhase,
    pub actions: Vec<UiAction>,
}

impl FamilyPlan {
    pub fn reloads(&self) -> bool {
        self.actions.iter().any(|a| *a == UiAction::ReloadView)
    }
}

/// The per-poll plan: five sub-plans in canonical family order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UiActionPlan {
    pub families: Vec<FamilyPlan>,
    pub should_reschedule: bool,
}

impl UiActionPlan {
    pub fn actions(&self) -> impl Iterator<Item = &UiAction> {
        self.families.iter().flat_map(|p| p.actions.iter())
    }

    pub fn family(&self, family: Family) -> Option<&FamilyPlan> {
        self.families.iter().find(|p| p.family == family)
    }

    pub fn reload_count(&self) -> usize {
        self.actions().filter(|a| **a == UiAction::ReloadView).count()
    }

    pub fn requires_reload(&self) -> bool {
        self.reload_count() > 0
    }

    pub fn len(&self) -> usize {
        self.actions().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn actions_render_like_the_dashboard_ids() {
        let a = UiAction::SetButton {
            button: ButtonId::RunConstrainedClustering,
            status: ButtonStatus::Wip,
            disabled: true,
        };
        assert_eq!(
            a.to_string(),
            "button button_run_constrained_clustering wip disabled"
        );
        let p = UiAction::SetProgress {
            bar: ProgressBarId::Clustering,
            progress: Progress {
                status: ProgressStatus::Running,
                percent: 40,
                detail: "running".into(),
            },
        };
        assert_eq!(p.to_string(), "progress loadingbar_clustering running 40% \"running\"");
    }

    #[test]
    fn actions_serialize_with_dom_ids() {
        let a = UiAction::SetVisible {
            element: ElementId::Row(Family::IterationEnd),
            visible: false,
        };
        let v = serde_json::to_value(&a).unwrap();
        assert_eq!(
            v,
            serde_json::json!({"action": "set_visible", "element": "row_next_iteration", "visible": false})
        );
        let v = serde_json::to_value(UiAction::ReloadView).unwrap();
        assert_eq!(v, serde_json::json!({"action": "reload_view"}));
    }

    #[test]
    fn every_progress_bar_maps_back_to_its_family() {
        for bar in ProgressBarId::ALL {
            assert_eq!(ProgressBarId::for_family(bar.family()), Some(bar));
        }
        assert_eq!(ProgressBarId::for_family(Family::IterationEnd), None);
    }

    #[test]
    fn buttons_are_grouped_by_family() {
        for family in Family::ORDER {
            for b in ButtonId::for_family(family) {
                assert_eq!(b.family(), family);
            }
        }
    }
}
