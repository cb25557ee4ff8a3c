use interactive_clustering_console::actions::{
    ButtonId, ButtonStatus, ElementId, FamilyPhase, ProgressBarId, UiAction,
};
use interactive_clustering_console::projector::project;
use interactive_clustering_console::sink::{ActionSink, ViewProbe, apply_plan};
use interactive_clustering_console::state::{Family, ProjectState};
use interactive_clustering_console::status::{StatusSnapshot, TaskInfo};
use interactive_clustering_console::view::DashboardView;

const ITERATIONS: [u32; 3] = [0, 1, 7];

fn views() -> Vec<DashboardView> {
    let empty = DashboardView::new();
    let mut bars_shown = DashboardView::new();
    for bar in ProgressBarId::ALL {
        bars_shown.set_visible(ElementId::ProgressBar(bar), true);
    }
    vec![empty, bars_shown]
}

fn snap(iteration_id: u32, state: ProjectState) -> StatusSnapshot {
    StatusSnapshot::new(
        iteration_id,
        state,
        Some(TaskInfo::new(Some(33), Some("vectorizing"))),
    )
}

#[test]
fn projection_is_deterministic() {
    for view in views() {
        for iteration in ITERATIONS {
            for state in ProjectState::ALL {
                let s = snap(iteration, state);
                let a = project(&s, &view).unwrap();
                let b = project(&s, &view).unwrap();
                assert_eq!(a, b, "{state} @ {iteration}");
            }
        }
    }
}

#[test]
fn plans_follow_canonical_family_order() {
    for state in ProjectState::ALL {
        let plan = project(&snap(2, state), &DashboardView::new()).unwrap();
        let order: Vec<Family> = plan.families.iter().map(|p| p.family).collect();
        assert_eq!(order, Family::ORDER.to_vec(), "{state}");
    }
}

#[test]
fn initialization_states_hide_every_later_step() {
    for view in views() {
        for iteration in ITERATIONS {
            for state in ProjectState::ALL.into_iter().filter(|s| s.is_initialization()) {
                let plan = project(&snap(iteration, state), &view).unwrap();
                for family in &Family::ORDER[1..] {
                    let fp = plan.family(*family).unwrap();
                    assert_eq!(fp.phase, FamilyPhase::Hidden, "{state} {family:?}");
                    for action in &fp.actions {
                        match action {
                            UiAction::SetVisible { visible, .. } => {
                                assert!(!visible, "{state} {family:?} shows {action}")
                            }
                            other => panic!("{state} {family:?} emitted {other}"),
                        }
                    }
                }
            }
        }
    }
}

#[test]
fn bootstrap_iteration_hides_sampling_and_annotation() {
    for view in views() {
        for state in ProjectState::ALL.into_iter().filter(|s| !s.is_initialization()) {
            let plan = project(&snap(0, state), &view).unwrap();
            for family in [Family::Sampling, Family::Annotation] {
                assert_eq!(
                    plan.family(family).unwrap().phase,
                    FamilyPhase::Hidden,
                    "{state} {family:?}"
                );
            }
        }
    }
}

#[test]
fn reschedule_iff_some_family_is_in_progress() {
    for view in views() {
        for iteration in ITERATIONS {
            for state in ProjectState::ALL {
                let plan = project(&snap(iteration, state), &view).unwrap();
                let busy = plan
                    .families
                    .iter()
                    .any(|p| p.phase == FamilyPhase::InProgress);
                assert_eq!(plan.should_reschedule, busy, "{state} @ {iteration}");

                // Only the running job's own family can be busy; the guards may
                // hide it on the bootstrap iteration.
                let running = state.as_str().contains("PENDING") || state.as_str().contains("WORKING");
                if !running {
                    assert!(!plan.should_reschedule, "{state} @ {iteration}");
                }
            }
        }
    }
}

#[test]
fn running_jobs_past_bootstrap_always_reschedule() {
    for state in ProjectState::ALL {
        let running = state.as_str().contains("PENDING") || state.as_str().contains("WORKING");
        let plan = project(&snap(4, state), &DashboardView::new()).unwrap();
        assert_eq!(plan.should_reschedule, running, "{state}");
    }
}

#[test]
fn unknown_state_is_rejected_without_a_plan() {
    let s = StatusSnapshot::with_raw_state(1, "NOT_A_REAL_STATE", None);
    let err = project(&s, &DashboardView::new()).unwrap_err();
    assert!(err.is_protocol(), "{err}");
}

#[test]
fn finished_sampling_reloads_exactly_once() {
    let s = StatusSnapshot::new(1, ProjectState::AnnotationWithUptodateModelization, None);

    let mut view = DashboardView::new();
    view.set_visible(ElementId::ProgressBar(ProgressBarId::Sampling), true);
    let plan = project(&s, &view).unwrap();
    assert_eq!(plan.reload_count(), 1);
    assert!(plan.family(Family::Sampling).unwrap().reloads());

    assert!(apply_plan(&mut view, &plan));
    assert!(!view.is_visible(ElementId::ProgressBar(ProgressBarId::Sampling)));

    let plan = project(&s, &view).unwrap();
    assert_eq!(plan.reload_count(), 0);
    assert!(!apply_plan(&mut view, &plan));
    assert_eq!(view.reload_count(), 1);
}

#[test]
fn settled_states_do_not_reload_a_fresh_view() {
    for iteration in ITERATIONS {
        for state in ProjectState::ALL {
            let plan = project(&snap(iteration, state), &DashboardView::new()).unwrap();
            assert_eq!(plan.reload_count(), 0, "{state} @ {iteration}");
        }
    }
}

#[test]
fn applying_a_plan_twice_is_idempotent() {
    for state in ProjectState::ALL {
        let mut view = DashboardView::new();
        let plan = project(&snap(3, state), &view).unwrap();
        apply_plan(&mut view, &plan);
        let once = view.clone();
        apply_plan(&mut view, &plan);
        assert_eq!(view, once, "{state}");
    }
}

#[test]
fn sampling_todo_scenario() {
    let mut view = DashboardView::new();
    let plan = project(
        &StatusSnapshot::new(1, ProjectState::SamplingTodo, None),
        &view,
    )
    .unwrap();
    assert!(!plan.should_reschedule);

    let phases: Vec<FamilyPhase> = plan.families.iter().map(|p| p.phase).collect();
    assert_eq!(
        phases,
        vec![
            FamilyPhase::Done,
            FamilyPhase::Todo,
            FamilyPhase::Locked,
            FamilyPhase::Locked,
            FamilyPhase::Locked,
        ]
    );

    apply_plan(&mut view, &plan);
    assert_eq!(
        view.visible_rows(),
        vec![
            Family::Sampling,
            Family::Annotation,
            Family::Clustering,
            Family::IterationEnd
        ]
    );
    assert!(view.button_enabled(ButtonId::RunConstraintsSampling));
    assert!(view.details_open(Family::Sampling));
    assert!(view.visible_progress(ProgressBarId::Sampling).is_none());

    assert_eq!(
        view.button(ButtonId::GoToAnnotations),
        (ButtonStatus::Todo, true)
    );
    assert_eq!(
        view.button(ButtonId::RunModelizationUpdate),
        (ButtonStatus::Done, true)
    );
    assert!(!view.details_open(Family::Annotation));
    assert_eq!(
        view.button(ButtonId::RunConstrainedClustering),
        (ButtonStatus::Todo, true)
    );
    assert!(!view.details_open(Family::Clustering));
    assert!(!view.button_enabled(ButtonId::CreateNextIteration));
}

#[test]
fn iteration_end_enables_next_iteration() {
    let mut view = DashboardView::new();
    let plan = project(
        &StatusSnapshot::new(2, ProjectState::IterationEnd, None),
        &view,
    )
    .unwrap();
    apply_plan(&mut view, &plan);
    assert!(view.button_enabled(ButtonId::CreateNextIteration));
    assert!(view.details_open(Family::IterationEnd));
    assert_eq!(
        view.button(ButtonId::RunConstrainedClustering),
        (ButtonStatus::Done, true)
    );
}

#[test]
fn finished_jobs_reload_once_in_their_own_family() {
    use ProjectState::*;
    let cases = [
        (ProgressBarId::InitializeModelization, 1, SamplingTodo, Some(Family::Initialization)),
        (ProgressBarId::Sampling, 1, AnnotationWithUptodateModelization, Some(Family::Sampling)),
        (ProgressBarId::Clustering, 1, IterationEnd, Some(Family::Clustering)),
        (
            ProgressBarId::AnnotationAndModelization,
            1,
            AnnotationWithUptodateModelization,
            Some(Family::Annotation),
        ),
        (
            ProgressBarId::AnnotationAndModelization,
            1,
            AnnotationWithOutdatedModelizationWithConflicts,
            Some(Family::Annotation),
        ),
        (ProgressBarId::AnnotationAndModelization, 1, ClusteringTodo, Some(Family::Annotation)),
        (ProgressBarId::AnnotationAndModelization, 2, IterationEnd, Some(Family::Annotation)),
        (
            ProgressBarId::AnnotationAndModelization,
            1,
            AnnotationWithOutdatedModelizationWithoutConflicts,
            None,
        ),
        (ProgressBarId::Clustering, 1, ClusteringWorking, None),
    ];

    for (bar, iteration, state, reloading) in cases {
        let s = StatusSnapshot::new(iteration, state, None);
        let mut view = DashboardView::new();
        view.set_visible(ElementId::ProgressBar(bar), true);

        let plan = project(&s, &view).unwrap();
        assert_eq!(plan.reload_count(), usize::from(reloading.is_some()), "{state}");
        for fp in &plan.families {
            assert_eq!(fp.reloads(), Some(fp.family) == reloading, "{state} {:?}", fp.family);
        }

        apply_plan(&mut view, &plan);
        if reloading.is_some() {
            assert_eq!(view.reload_count(), 1, "{state}");
            assert!(!view.is_visible(ElementId::ProgressBar(bar)), "{state}");
            let again = project(&s, &view).unwrap();
            assert_eq!(again.reload_count(), 0, "{state}");
        } else {
            assert_eq!(view.reload_count(), 0, "{state}");
        }
    }
}

#[test]
fn modelization_update_without_conflicts_hides_its_bar_quietly() {
    let mut view = DashboardView::new();
    view.set_visible(
        ElementId::ProgressBar(ProgressBarId::AnnotationAndModelization),
        true,
    );
    let plan = project(
        &StatusSnapshot::new(
            1,
            ProjectState::AnnotationWithOutdatedModelizationWithoutConflicts,
            None,
        ),
        &view,
    )
    .unwrap();
    assert!(!apply_plan(&mut view, &plan));
    assert!(!view.is_visible(ElementId::ProgressBar(
        ProgressBarId::AnnotationAndModelization
    )));
    assert_eq!(view.reload_count(), 0);
}
