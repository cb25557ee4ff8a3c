mod stage;

pub use stage::{AnnotationStage, InitStage, JobStage, Stage};

use crate::actions::{
    ButtonId, ButtonStatus, ElementId, FamilyPhase, FamilyPlan, Progress, ProgressBarId,
    ProgressStatus, UiAction, UiActionPlan,
};
use crate::error::Result;
use crate::sink::ViewProbe;
use crate::state::Family;
use crate::status::{StatusSnapshot, TaskInfo};
use crate::text_sanitize::sanitize_detail;

const MIN_RUNNING_PERCENT: u8 = 2;
const WAITING_DETAIL: &str = "Waiting for task detail...";
const MODELIZATION_ERROR_DETAIL: &str = "Modelization in error... :(";

/// Compute the plan for one poll.
///
/// Fails with a protocol error when the snapshot's state is not part of the
/// vocabulary; no partial plan is produced in that case.
pub fn project(snapshot: &StatusSnapshot, view: &dyn ViewProbe) -> Result<UiActionPlan> {
    let state = snapshot.project_state()?;
    let stage = Stage::of(state);
    let ctx = Ctx {
        stage,
        iteration_id: snapshot.iteration_id,
        task: snapshot.task.as_ref(),
        view,
    };

    let families = vec![
        project_initialization(&ctx),
        project_sampling(&ctx),
        project_annotation(&ctx),
        project_clustering(&ctx),
        project_iteration_end(&ctx),
    ];
    let should_reschedule = families.iter().any(|p| p.phase == FamilyPhase::InProgress);

    Ok(UiActionPlan {
        families,
        should_reschedule,
    })
}

struct Ctx<'a> {
    stage: Stage,
    iteration_id: u32,
    task: Option<&'a TaskInfo>,
    view: &'a dyn ViewProbe,
}

impl Ctx<'_> {
    /// Sampling and annotation do not exist on the bootstrap iteration.
    fn bootstrap_iteration(&self) -> bool {
        self.iteration_id == 0
    }
}

struct Builder<'a> {
    family: Family,
    bar: Option<ProgressBarId>,
    actions: Vec<UiAction>,
    view: &'a dyn ViewProbe,
}

impl<'a> Builder<'a> {
    fn new(family: Family, view: &'a dyn ViewProbe) -> Self {
        Self {
            family,
            bar: ProgressBarId::for_family(family),
            actions: Vec::new(),
            view,
        }
    }

    fn row(&mut self, visible: bool) -> &mut Self {
        self.actions.push(UiAction::SetVisible {
            element: ElementId::Row(self.family),
            visible,
        });
        self
    }

    fn button(&mut self, button: ButtonId, status: ButtonStatus, disabled: bool) -> &mut Self {
        self.actions.push(UiAction::SetButton {
            button,
            status,
            disabled,
        });
        self
    }

    fn details(&mut self, open: bool) -> &mut Self {
        self.actions.push(UiAction::SetDetailsOpen {
            details: self.family,
            open,
        });
        self
    }

    fn bar(&mut self, visible: bool) -> &mut Self {
        if let Some(bar) = self.bar {
            self.actions.push(UiAction::SetVisible {
                element: ElementId::ProgressBar(bar),
                visible,
            });
        }
        self
    }

    fn progress(&mut self, progress: Progress) -> &mut Self {
        if let Some(bar) = self.bar {
            self.actions.push(UiAction::SetProgress { bar, progress });
        }
        self
    }

    fn running(&mut self, task: Option<&TaskInfo>) -> &mut Self {
        self.bar(true).progress(running_progress(task))
    }

    /// A job of this family just finished while its bar is still on screen:
    /// the data behind the view changed, so ask for a full reload. Once the
    /// view has been reloaded the bar is hidden and this stays quiet.
    fn reload_if_bar_shown(&mut self) -> &mut Self {
        let shown = self
            .bar
            .is_some_and(|bar| self.view.is_visible(ElementId::ProgressBar(bar)));
        if shown {
            self.actions.push(UiAction::ReloadView);
        }
        self
    }

    fn hidden(&mut self) -> &mut Self {
        self.row(false).bar(false)
    }

    fn finish(&mut self, phase: FamilyPhase) -> FamilyPlan {
        FamilyPlan {
            family: self.family,
            phase,
            actions: std::mem::take(&mut self.actions),
        }
    }
}

fn running_progress(task: Option<&TaskInfo>) -> Progress {
    let percent = match task.and_then(|t| t.progression) {
        None | Some(0) => MIN_RUNNING_PERCENT,
        Some(p) => p.min(100),
    };
    let detail = task
        .and_then(|t| t.detail.as_deref())
        .map(sanitize_detail)
        .filter(|d| !d.is_empty())
        .unwrap_or_else(|| WAITING_DETAIL.to_string());
    Progress {
        status: ProgressStatus::Running,
        percent,
        detail,
    }
}

fn project_initialization(ctx: &Ctx<'_>) -> FamilyPlan {
    let mut b = Builder::new(Family::Initialization, ctx.view);
    let button = ButtonId::RunInitializeModelization;
    match ctx.stage {
        Stage::Init(InitStage::Todo) => b
            .row(true)
            .button(button, ButtonStatus::Todo, false)
            .details(true)
            .bar(false)
            .finish(FamilyPhase::Todo),
        Stage::Init(InitStage::InProgress) => b
            .row(true)
            .button(button, ButtonStatus::Wip, true)
            .details(true)
            .running(ctx.task)
            .finish(FamilyPhase::InProgress),
        Stage::Init(InitStage::Error) => b
            .row(true)
            .button(button, ButtonStatus::Error, true)
            .details(true)
            .bar(true)
            .progress(Progress {
                status: ProgressStatus::Error,
                percent: 100,
                detail: MODELIZATION_ERROR_DETAIL.to_string(),
            })
            .finish(FamilyPhase::Error),
        Stage::Sampling(_) | Stage::Annotation(_) | Stage::Clustering(_) | Stage::IterationEnd => {
            b.details(false).reload_if_bar_shown().finish(FamilyPhase::Done)
        }
    }
}

fn project_sampling(ctx: &Ctx<'_>) -> FamilyPlan {
    let mut b = Builder::new(Family::Sampling, ctx.view);
    let button = ButtonId::RunConstraintsSampling;
    if ctx.bootstrap_iteration() {
        return b.hidden().finish(FamilyPhase::Hidden);
    }
    match ctx.stage {
        Stage::Init(_) => b.hidden().finish(FamilyPhase::Hidden),
        Stage::Sampling(JobStage::Todo) => b
            .row(true)
            .button(button, ButtonStatus::Todo, false)
            .details(true)
            .bar(false)
            .finish(FamilyPhase::Todo),
        Stage::Sampling(JobStage::InProgress) => b
            .row(true)
            .button(button, ButtonStatus::Wip, true)
            .details(true)
            .running(ctx.task)
            .finish(FamilyPhase::InProgress),
        Stage::Annotation(_) | Stage::Clustering(_) | Stage::IterationEnd => b
            .row(true)
            .button(button, ButtonStatus::Done, true)
            .details(false)
            .reload_if_bar_shown()
            .finish(FamilyPhase::Done),
    }
}

fn project_annotation(ctx: &Ctx<'_>) -> FamilyPlan {
    let mut b = Builder::new(Family::Annotation, ctx.view);
    let annotate = ButtonId::GoToAnnotations;
    let modelize = ButtonId::RunModelizationUpdate;
    let approve = ButtonId::ApproveAnnotations;
    if ctx.bootstrap_iteration() {
        return b.hidden().finish(FamilyPhase::Hidden);
    }
    match ctx.stage {
        Stage::Init(_) => b.hidden().finish(FamilyPhase::Hidden),
        Stage::Sampling(_) => b
            .row(true)
            .button(annotate, ButtonStatus::Todo, true)
            .button(modelize, ButtonStatus::Done, true)
            .button(approve, ButtonStatus::Todo, true)
            .details(false)
            .bar(false)
            .finish(FamilyPhase::Locked),
        Stage::Annotation(AnnotationStage::UpToDate) => b
            .row(true)
            .button(annotate, ButtonStatus::Wip, false)
            .button(modelize, ButtonStatus::Done, true)
            .button(approve, ButtonStatus::Todo, false)
            .details(true)
            .reload_if_bar_shown()
            .finish(FamilyPhase::Todo),
        Stage::Annotation(AnnotationStage::Outdated { conflicts: false }) => b
            .row(true)
            .button(annotate, ButtonStatus::Wip, false)
            .button(modelize, ButtonStatus::Todo, false)
            .button(approve, ButtonStatus::Todo, true)
            .details(true)
            .bar(false)
            .finish(FamilyPhase::Todo),
        // A modelization update that ends with conflicts also finishes a job.
        Stage::Annotation(AnnotationStage::Outdated { conflicts: true }) => b
            .row(true)
            .button(annotate, ButtonStatus::Wip, false)
            .button(modelize, ButtonStatus::Error, false)
            .button(approve, ButtonStatus::Todo, true)
            .details(true)
            .reload_if_bar_shown()
            .finish(FamilyPhase::Conflicts),
        Stage::Annotation(AnnotationStage::Modelizing { .. }) => b
            .row(true)
            .button(annotate, ButtonStatus::Wip, false)
            .button(modelize, ButtonStatus::Wip, true)
            .button(approve, ButtonStatus::Todo, true)
            .details(true)
            .running(ctx.task)
            .finish(FamilyPhase::InProgress),
        Stage::Clustering(_) | Stage::IterationEnd => b
            .row(true)
            .button(annotate, ButtonStatus::Done, true)
            .button(modelize, ButtonStatus::Done, true)
            .button(approve, ButtonStatus::Done, true)
            .details(false)
            .reload_if_bar_shown()
            .finish(FamilyPhase::Done),
    }
}

fn project_clustering(ctx: &Ctx<'_>) -> FamilyPlan {
    let mut b = Builder::new(Family::Clustering, ctx.view);
    let button = ButtonId::RunConstrainedClustering;
    match ctx.stage {
        Stage::Init(_) => b.hidden().finish(FamilyPhase::Hidden),
        Stage::Sampling(_) | Stage::Annotation(_) => b
            .row(true)
            .button(button, ButtonStatus::Todo, true)
            .details(false)
            .bar(false)
            .finish(FamilyPhase::Locked),
        Stage::Clustering(JobStage::Todo) => b
            .row(true)
            .button(button, ButtonStatus::Todo, false)
            .details(true)
            .bar(false)
            .finish(FamilyPhase::Todo),
        Stage::Clustering(JobStage::InProgress) => b
            .row(true)
            .button(button, ButtonStatus::Wip, true)
            .details(true)
            .running(ctx.task)
            .finish(FamilyPhase::InProgress),
        Stage::IterationEnd => b
            .row(true)
            .button(button, ButtonStatus::Done, true)
            .details(false)
            .reload_if_bar_shown()
            .finish(FamilyPhase::Done),
    }
}

fn project_iteration_end(ctx: &Ctx<'_>) -> FamilyPlan {
    let mut b = Builder::new(Family::IterationEnd, ctx.view);
    let button = ButtonId::CreateNextIteration;
    match ctx.stage {
        Stage::Init(_) => b.row(false).finish(FamilyPhase::Hidden),
        Stage::IterationEnd => b
            .row(true)
            .button(button, ButtonStatus::Todo, false)
            .details(true)
            .finish(FamilyPhase::Todo),
        Stage::Sampling(_) | Stage::Annotation(_) | Stage::Clustering(_) => b
            .row(true)
            .button(button, ButtonStatus::Todo, true)
            .details(false)
            .finish(FamilyPhase::Locked),
    }
}
