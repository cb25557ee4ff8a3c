use crate::state::ProjectState;

/// Where the pipeline stands, reduced to what the dashboard distinguishes.
///
/// `Stage::of` is the single exhaustive match over the state vocabulary: a new
/// backend state does not compile until it is placed here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Init(InitStage),
    Sampling(JobStage),
    Annotation(AnnotationStage),
    Clustering(JobStage),
    IterationEnd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitStage {
    Todo,
    InProgress,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStage {
    Todo,
    InProgress,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnnotationStage {
    UpToDate,
    Outdated { conflicts: bool },
    Modelizing { conflicts: bool },
}

impl Stage {
    pub fn of(state: ProjectState) -> Self {
        use ProjectState::*;
        match state {
            InitializationWithoutModelization
            | ImportAtSamplingStepWithoutModelization
            | ImportAtAnnotationStepWithoutModelization
            | ImportAtClusteringStepWithoutModelization
            | ImportAtIterationEndWithoutModelization => Stage::Init(InitStage::Todo),

            InitializationWithPendingModelization
            | InitializationWithWorkingModelization
            | ImportAtSamplingStepWithPendingModelization
            | ImportAtSamplingStepWithWorkingModelization
            | ImportAtAnnotationStepWithPendingModelization
            | ImportAtAnnotationStepWithWorkingModelization
            | ImportAtClusteringStepWithPendingModelization
            | ImportAtClusteringStepWithWorkingModelization
            | ImportAtIterationEndWithPendingModelization
            | ImportAtIterationEndWithWorkingModelization => Stage::Init(InitStage::InProgress),

            InitializationWithErrors
            | ImportAtSamplingStepWithErrors
            | ImportAtAnnotationStepWithErrors
            | ImportAtClusteringStepWithErrors
            | ImportAtIterationEndWithErrors => Stage::Init(InitStage::Error),

            SamplingTodo => Stage::Sampling(JobStage::Todo),
            SamplingPending | SamplingWorking => Stage::Sampling(JobStage::InProgress),

            AnnotationWithUptodateModelization => Stage::Annotation(AnnotationStage::UpToDate),
            AnnotationWithOutdatedModelizationWithoutConflicts => {
                Stage::Annotation(AnnotationStage::Outdated { conflicts: false })
            }
            AnnotationWithOutdatedModelizationWithConflicts => {
                Stage::Annotation(AnnotationStage::Outdated { conflicts: true })
            }
            AnnotationWithPendingModelizationWithoutConflicts
            | AnnotationWithWorkingModelizationWithoutConflicts => {
                Stage::Annotation(AnnotationStage::Modelizing { conflicts: false })
            }
            AnnotationWithPendingModelizationWithConflicts
            | AnnotationWithWorkingModelizationWithConflicts => {
                Stage::Annotation(AnnotationStage::Modelizing { conflicts: true })
            }

            ClusteringTodo => Stage::Clustering(JobStage::Todo),
            ClusteringPending | ClusteringWorking => Stage::Clustering(JobStage::InProgress),

            IterationEnd => Stage::IterationEnd,
        }
    }
}
