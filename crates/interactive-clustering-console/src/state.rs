use std::fmt;

use serde::Serialize;

use crate::error::{Error, Result};

/// One of the five pipeline stages tracked on the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Family {
    Initialization,
    Sampling,
    Annotation,
    Clustering,
    IterationEnd,
}

impl Family {
    /// Canonical application order of the per-family sub-plans.
    pub const ORDER: [Family; 5] = [
        Family::Initialization,
        Family::Sampling,
        Family::Annotation,
        Family::Clustering,
        Family::IterationEnd,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Family::Initialization => "Modelization initialization",
            Family::Sampling => "Constraints sampling",
            Family::Annotation => "Annotation and modelization",
            Family::Clustering => "Constrained clustering",
            Family::IterationEnd => "Next iteration",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProjectState {
    InitializationWithoutModelization,
    InitializationWithPendingModelization,
    InitializationWithWorkingModelization,
    InitializationWithErrors,

    SamplingTodo,
    SamplingPending,
    SamplingWorking,

    ImportAtSamplingStepWithoutModelization,
    ImportAtSamplingStepWithPendingModelization,
    ImportAtSamplingStepWithWorkingModelization,
    ImportAtSamplingStepWithErrors,

    AnnotationWithUptodateModelization,
    AnnotationWithOutdatedModelizationWithoutConflicts,
    AnnotationWithPendingModelizationWithoutConflicts,
    AnnotationWithWorkingModelizationWithoutConflicts,
    AnnotationWithOutdatedModelizationWithConflicts,
    AnnotationWithPendingModelizationWithConflicts,
    AnnotationWithWorkingModelizationWithConflicts,

    ImportAtAnnotationStepWithoutModelization,
    ImportAtAnnotationStepWithPendingModelization,
    ImportAtAnnotationStepWithWorkingModelization,
    ImportAtAnnotationStepWithErrors,

    ClusteringTodo,
    ClusteringPending,
    ClusteringWorking,

    ImportAtClusteringStepWithoutModelization,
    ImportAtClusteringStepWithPendingModelization,
    ImportAtClusteringStepWithWorkingModelization,
    ImportAtClusteringStepWithErrors,

    IterationEnd,

    ImportAtIterationEndWithoutModelization,
    ImportAtIterationEndWithPendingModelization,
    ImportAtIterationEndWithWorkingModelization,
    ImportAtIterationEndWithErrors,
}

impl ProjectState {
    pub const ALL: [ProjectState; 34] = [
        ProjectState::InitializationWithoutModelization,
        ProjectState::InitializationWithPendingModelization,
        ProjectState::InitializationWithWorkingModelization,
        ProjectState::InitializationWithErrors,
        ProjectState::SamplingTodo,
        ProjectState::SamplingPending,
        ProjectState::SamplingWorking,
        ProjectState::ImportAtSamplingStepWithoutModelization,
        ProjectState::ImportAtSamplingStepWithPendingModelization,
        ProjectState::ImportAtSamplingStepWithWorkingModelization,
        ProjectState::ImportAtSamplingStepWithErrors,
        ProjectState::AnnotationWithUptodateModelization,
        ProjectState::AnnotationWithOutdatedModelizationWithoutConflicts,
        ProjectState::AnnotationWithPendingModelizationWithoutConflicts,
        ProjectState::AnnotationWithWorkingModelizationWithoutConflicts,
        ProjectState::AnnotationWithOutdatedModelizationWithConflicts,
        ProjectState::AnnotationWithPendingModelizationWithConflicts,
        ProjectState::AnnotationWithWorkingModelizationWithConflicts,
        ProjectState::ImportAtAnnotationStepWithoutModelization,
        ProjectState::ImportAtAnnotationStepWithPendingModelization,
        ProjectState::ImportAtAnnotationStepWithWorkingModelization,
        ProjectState::ImportAtAnnotationStepWithErrors,
        ProjectState::ClusteringTodo,
        ProjectState::ClusteringPending,
        ProjectState::ClusteringWorking,
        ProjectState::ImportAtClusteringStepWithoutModelization,
        ProjectState::ImportAtClusteringStepWithPendingModelization,
        ProjectState::ImportAtClusteringStepWithWorkingModelization,
        ProjectState::ImportAtClusteringStepWithErrors,
        ProjectState::IterationEnd,
        ProjectState::ImportAtIterationEndWithoutModelization,
        ProjectState::ImportAtIterationEndWithPendingModelization,
        ProjectState::ImportAtIterationEndWithWorkingModelization,
        ProjectState::ImportAtIterationEndWithErrors,
    ];

    /// Wire name as sent by the backend.
    pub fn as_str(self) -> &'static str {
        use ProjectState::*;
        match self {
            InitializationWithoutModelization => "INITIALIZATION_WITHOUT_MODELIZATION",
            InitializationWithPendingModelization => "INITIALIZATION_WITH_PENDING_MODELIZATION",
            InitializationWithWorkingModelization => "INITIALIZATION_WITH_WORKING_MODELIZATION",
            InitializationWithErrors => "INITIALIZATION_WITH_ERRORS",
            SamplingTodo => "SAMPLING_TODO",
            SamplingPending => "SAMPLING_PENDING",
            SamplingWorking => "SAMPLING_WORKING",
            ImportAtSamplingStepWithoutModelization => {
                "IMPORT_AT_SAMPLING_STEP_WITHOUT_MODELIZATION"
            }
            ImportAtSamplingStepWithPendingModelization => {
                "IMPORT_AT_SAMPLING_STEP_WITH_PENDING_MODELIZATION"
            }
            ImportAtSamplingStepWithWorkingModelization => {
                "IMPORT_AT_SAMPLING_STEP_WITH_WORKING_MODELIZATION"
            }
            ImportAtSamplingStepWithErrors => "IMPORT_AT_SAMPLING_STEP_WITH_ERRORS",
            AnnotationWithUptodateModelization => "ANNOTATION_WITH_UPTODATE_MODELIZATION",
            AnnotationWithOutdatedModelizationWithoutConflicts => {
                "ANNOTATION_WITH_OUTDATED_MODELIZATION_WITHOUT_CONFLICTS"
            }
            AnnotationWithPendingModelizationWithoutConflicts => {
                "ANNOTATION_WITH_PENDING_MODELIZATION_WITHOUT_CONFLICTS"
            }
            AnnotationWithWorkingModelizationWithoutConflicts => {
                "ANNOTATION_WITH_WORKING_MODELIZATION_WITHOUT_CONFLICTS"
            }
            AnnotationWithOutdatedModelizationWithConflicts => {
                "ANNOTATION_WITH_OUTDATED_MODELIZATION_WITH_CONFLICTS"
            }
            AnnotationWithPendingModelizationWithConflicts => {
                "ANNOTATION_WITH_PENDING_MODELIZATION_WITH_CONFLICTS"
            }
            AnnotationWithWorkingModelizationWithConflicts => {
                "ANNOTATION_WITH_WORKING_MODELIZATION_WITH_CONFLICTS"
            }
            ImportAtAnnotationStepWithoutModelization => {
                "IMPORT_AT_ANNOTATION_STEP_WITHOUT_MODELIZATION"
            }
            ImportAtAnnotationStepWithPendingModelization => {
                "IMPORT_AT_ANNOTATION_STEP_WITH_PENDING_MODELIZATION"
            }
            ImportAtAnnotationStepWithWorkingModelization => {
                "IMPORT_AT_ANNOTATION_STEP_WITH_WORKING_MODELIZATION"
            }
            ImportAtAnnotationStepWithErrors => "IMPORT_AT_ANNOTATION_STEP_WITH_ERRORS",
            ClusteringTodo => "CLUSTERING_TODO",
            ClusteringPending => "CLUSTERING_PENDING",
            ClusteringWorking => "CLUSTERING_WORKING",
            ImportAtClusteringStepWithoutModelization => {
                "IMPORT_AT_CLUSTERING_STEP_WITHOUT_MODELIZATION"
            }
            ImportAtClusteringStepWithPendingModelization => {
                "IMPORT_AT_CLUSTERING_STEP_WITH_PENDING_MODELIZATION"
            }
            ImportAtClusteringStepWithWorkingModelization => {
                "IMPORT_AT_CLUSTERING_STEP_WITH_WORKING_MODELIZATION"
            }
            ImportAtClusteringStepWithErrors => "IMPORT_AT_CLUSTERING_STEP_WITH_ERRORS",
            IterationEnd => "ITERATION_END",
            ImportAtIterationEndWithoutModelization => {
                "IMPORT_AT_ITERATION_END_WITHOUT_MODELIZATION"
            }
            ImportAtIterationEndWithPendingModelization => {
                "IMPORT_AT_ITERATION_END_WITH_PENDING_MODELIZATION"
            }
            ImportAtIterationEndWithWorkingModelization => {
                "IMPORT_AT_ITERATION_END_WITH_WORKING_MODELIZATION"
            }
            ImportAtIterationEndWithErrors => "IMPORT_AT_ITERATION_END_WITH_ERRORS",
        }
    }

    /// Parse a wire name. Unknown values are a protocol error, never a default.
    pub fn parse(raw: &str) -> Result<Self> {
        if let Some(state) = Self::ALL.iter().copied().find(|s| s.as_str() == raw) {
            return Ok(state);
        }
        // Some backends spell the iteration-end import states with a `_STEP` infix.
        if let Some(rest) = raw.strip_prefix("IMPORT_AT_ITERATION_END_STEP_") {
            let canonical = format!("IMPORT_AT_ITERATION_END_{rest}");
            if let Some(state) = Self::ALL.iter().copied().find(|s| s.as_str() == canonical) {
                return Ok(state);
            }
        }
        Err(Error::protocol(format!("unknown project state '{raw}'")))
    }

    pub fn family(self) -> Family {
        use ProjectState::*;
        match self {
            InitializationWithoutModelization
            | InitializationWithPendingModelization
            | InitializationWithWorkingModelization
            | InitializationWithErrors
            | ImportAtSamplingStepWithoutModelization
            | ImportAtSamplingStepWithPendingModelization
            | ImportAtSamplingStepWithWorkingModelization
            | ImportAtSamplingStepWithErrors
            | ImportAtAnnotationStepWithoutModelization
            | ImportAtAnnotationStepWithPendingModelization
            | ImportAtAnnotationStepWithWorkingModelization
            | ImportAtAnnotationStepWithErrors
            | ImportAtClusteringStepWithoutModelization
            | ImportAtClusteringStepWithPendingModelization
            | ImportAtClusteringStepWithWorkingModelization
            | ImportAtClusteringStepWithErrors
            | ImportAtIterationEndWithoutModelization
            | ImportAtIterationEndWithPendingModelization
            | ImportAtIterationEndWithWorkingModelization
            | ImportAtIterationEndWithErrors => Family::Initialization,
            SamplingTodo | SamplingPending | SamplingWorking => Family::Sampling,
            AnnotationWithUptodateModelization
            | AnnotationWithOutdatedModelizationWithoutConflicts
            | AnnotationWithPendingModelizationWithoutConflicts
            | AnnotationWithWorkingModelizationWithoutConflicts
            | AnnotationWithOutdatedModelizationWithConflicts
            | AnnotationWithPendingModelizationWithConflicts
            | AnnotationWithWorkingModelizationWithConflicts => Family::Annotation,
            ClusteringTodo | ClusteringPending | ClusteringWorking => Family::Clustering,
            IterationEnd => Family::IterationEnd,
        }
    }

    pub fn is_initialization(self) -> bool {
        self.family() == Family::Initialization
    }

    /// Descriptive breakdown of the state, as shown next to the dashboard header.
    pub fn details(self) -> StateDetails {
        use ConflictStatus as C;
        use ModelizationStatus as M;
        use ProjectState::*;
        use Step as S;
        use StepStatus as T;

        let (step, step_status, modelization_status, conflict_status) = match self {
            // The bootstrap iteration goes straight from initialization to clustering.
            InitializationWithoutModelization => (S::Clustering, T::Locked, M::Todo, C::Unknown),
            InitializationWithPendingModelization => {
                (S::Clustering, T::Locked, M::Pending, C::Unknown)
            }
            InitializationWithWorkingModelization => {
                (S::Clustering, T::Locked, M::Working, C::Unknown)
            }
            InitializationWithErrors => (S::Clustering, T::Locked, M::Error, C::Unknown),

            SamplingTodo => (S::Sampling, T::Todo, M::Uptodate, C::False),
            SamplingPending => (S::Sampling, T::Pending, M::Uptodate, C::False),
            SamplingWorking => (S::Sampling, T::Working, M::Uptodate, C::False),
            ImportAtSamplingStepWithoutModelization => {
                (S::Sampling, T::Locked, M::Todo, C::Unknown)
            }
            ImportAtSamplingStepWithPendingModelization => {
                (S::Sampling, T::Locked, M::Pending, C::Unknown)
            }
            ImportAtSamplingStepWithWorkingModelization => {
                (S::Sampling, T::Locked, M::Working, C::Unknown)
            }
            ImportAtSamplingStepWithErrors => (S::Sampling, T::Locked, M::Error, C::Unknown),

            AnnotationWithUptodateModelization => (S::Annotation, T::Todo, M::Uptodate, C::False),
            AnnotationWithOutdatedModelizationWithoutConflicts => {
                (S::Annotation, T::Todo, M::Outdated, C::False)
            }
            AnnotationWithPendingModelizationWithoutConflicts => {
                (S::Annotation, T::Locked, M::Pending, C::False)
            }
            AnnotationWithWorkingModelizationWithoutConflicts => {
                (S::Annotation, T::Locked, M::Working, C::False)
            }
            AnnotationWithOutdatedModelizationWithConflicts => {
                (S::Annotation, T::Todo, M::Outdated, C::True)
            }
            AnnotationWithPendingModelizationWithConflicts => {
                (S::Annotation, T::Locked, M::Pending, C::True)
            }
            AnnotationWithWorkingModelizationWithConflicts => {
                (S::Annotation, T::Locked, M::Working, C::True)
            }
            ImportAtAnnotationStepWithoutModelization => {
                (S::Annotation, T::Locked, M::Todo, C::Unknown)
            }
            ImportAtAnnotationStepWithPendingModelization => {
                (S::Annotation, T::Locked, M::Pending, C::Unknown)
            }
            ImportAtAnnotationStepWithWorkingModelization => {
                (S::Annotation, T::Locked, M::Working, C::Unknown)
            }
            ImportAtAnnotationStepWithErrors => (S::Annotation, T::Locked, M::Error, C::Unknown),

            ClusteringTodo => (S::Clustering, T::Todo, M::Uptodate, C::False),
            ClusteringPending => (S::Clustering, T::Pending, M::Uptodate, C::False),
            ClusteringWorking => (S::Clustering, T::Working, M::Uptodate, C::False),
            ImportAtClusteringStepWithoutModelization => {
                (S::Clustering, T::Locked, M::Todo, C::Unknown)
            }
            ImportAtClusteringStepWithPendingModelization => {
                (S::Clustering, T::Locked, M::Pending, C::Unknown)
            }
            ImportAtClusteringStepWithWorkingModelization => {
                (S::Clustering, T::Locked, M::Working, C::Unknown)
            }
            ImportAtClusteringStepWithErrors => (S::Clustering, T::Locked, M::Error, C::Unknown),

            IterationEnd => (S::IterationEnd, T::Todo, M::Uptodate, C::False),
            ImportAtIterationEndWithoutModelization => {
                (S::IterationEnd, T::Locked, M::Todo, C::Unknown)
            }
            ImportAtIterationEndWithPendingModelization => {
                (S::IterationEnd, T::Locked, M::Pending, C::Unknown)
            }
            ImportAtIterationEndWithWorkingModelization => {
                (S::IterationEnd, T::Locked, M::Working, C::Unknown)
            }
            ImportAtIterationEndWithErrors => (S::IterationEnd, T::Locked, M::Error, C::Unknown),
        };

        StateDetails {
            step,
            step_status,
            modelization_status,
            conflict_status,
        }
    }
}

impl fmt::Display for ProjectState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ProjectState {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Step {
    Sampling,
    Annotation,
    Clustering,
    IterationEnd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepStatus {
    Todo,
    Pending,
    Working,
    Locked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ModelizationStatus {
    Todo,
    Pending,
    Working,
    Uptodate,
    Outdated,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConflictStatus {
    True,
    False,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StateDetails {
    pub step: Step,
    pub step_status: StepStatus,
    pub modelization_status: ModelizationStatus,
    pub conflict_status: ConflictStatus,
}

impl fmt::Display for StateDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let step = match self.step {
            Step::Sampling => "sampling",
            Step::Annotation => "annotation",
            Step::Clustering => "clustering",
            Step::IterationEnd => "iteration end",
        };
        let status = match self.step_status {
            StepStatus::Todo => "todo",
            StepStatus::Pending => "pending",
            StepStatus::Working => "working",
            StepStatus::Locked => "locked",
        };
        let modelization = match self.modelization_status {
            ModelizationStatus::Todo => "todo",
            ModelizationStatus::Pending => "pending",
            ModelizationStatus::Working => "working",
            ModelizationStatus::Uptodate => "up to date",
            ModelizationStatus::Outdated => "outdated",
            ModelizationStatus::Error => "error",
        };
        let conflicts = match self.conflict_status {
            ConflictStatus::True => "yes",
            ConflictStatus::False => "no",
            ConflictStatus::Unknown => "unknown",
        };
        write!(
            f,
            "step={step} ({status}) modelization={modelization} conflicts={conflicts}"
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_state_round_trips_through_its_wire_name() {
        for state in ProjectState::ALL {
            assert_eq!(ProjectState::parse(state.as_str()).unwrap(), state);
        }
    }

    #[test]
    fn wire_names_match_serde_names() {
        for state in ProjectState::ALL {
            let json = serde_json::to_string(&state).unwrap();
            assert_eq!(json, format!("\"{}\"", state.as_str()));
        }
    }

    #[test]
    fn unknown_state_is_a_protocol_error() {
        let err = ProjectState::parse("NOT_A_REAL_STATE").unwrap_err();
        assert!(err.is_protocol());
        assert!(err.to_string().contains("NOT_A_REAL_STATE"));
    }

    #[test]
    fn wire_names_are_matched_exactly() {
        for raw in [" SAMPLING_TODO ", "SAMPLING_TODO\n", "sampling_todo", "Sampling_Todo"] {
            let err = ProjectState::parse(raw).unwrap_err();
            assert!(err.is_protocol(), "{raw:?}: {err}");
        }
    }

    #[test]
    fn iteration_end_import_accepts_step_infix() {
        assert_eq!(
            ProjectState::parse("IMPORT_AT_ITERATION_END_STEP_WITH_ERRORS").unwrap(),
            ProjectState::ImportAtIterationEndWithErrors
        );
        assert!(ProjectState::parse("IMPORT_AT_ITERATION_END_STEP_BOGUS").is_err());
    }

    #[test]
    fn family_sizes_match_vocabulary() {
        let count = |f: Family| {
            ProjectState::ALL
                .iter()
                .filter(|s| s.family() == f)
                .count()
        };
        assert_eq!(count(Family::Initialization), 20);
        assert_eq!(count(Family::Sampling), 3);
        assert_eq!(count(Family::Annotation), 7);
        assert_eq!(count(Family::Clustering), 3);
        assert_eq!(count(Family::IterationEnd), 1);
    }

    #[test]
    fn import_states_are_locked_with_unknown_conflicts() {
        for state in ProjectState::ALL
            .iter()
            .filter(|s| s.as_str().starts_with("IMPORT_AT_"))
        {
            let d = state.details();
            assert_eq!(d.step_status, StepStatus::Locked, "{state}");
            assert_eq!(d.conflict_status, ConflictStatus::Unknown, "{state}");
        }
    }

    #[test]
    fn details_render_compactly() {
        let d = ProjectState::AnnotationWithOutdatedModelizationWithConflicts.details();
        assert_eq!(
            d.to_string(),
            "step=annotation (todo) modelization=outdated conflicts=yes"
        );
    }
}
