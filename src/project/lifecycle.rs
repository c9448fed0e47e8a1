use serde::{Deserialize, Serialize};
use statig::prelude::*;

use crate::model::{ProjectId, ProjectStatus};

/// Phase at which a project stops being a pre-sale lead
pub const IN_PROGRESS_PHASE: u8 = 2;
/// Phase of the completion stage
pub const COMPLETED_PHASE: u8 = 9;
/// Phase of the technical assistance stages
pub const ASSISTANCE_PHASE: u8 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LifecycleEvent {
    /// A batch of the project entered a stage of this phase
    PhaseReached { phase: u8 },
    /// A batch hit the terminal stage and could not advance further
    WorkflowFinished,
}

/// Project status machine. Only ever moves forward.
#[derive(Debug, Default)]
pub struct ProjectLifecycle {
    pub project_id: ProjectId,
    status: ProjectStatus,
}

impl ProjectLifecycle {
    pub fn new(project_id: ProjectId) -> Self {
        Self {
            project_id,
            status: ProjectStatus::PreSale,
        }
    }

    /// Rebuilds the machine at a stored status by replaying the events that lead there
    pub fn resume(project_id: ProjectId, status: ProjectStatus) -> StateMachine<Self> {
        let mut machine = Self::new(project_id).state_machine();
        let replay: &[LifecycleEvent] = match status {
            ProjectStatus::PreSale => &[],
            ProjectStatus::InProgress => &[LifecycleEvent::PhaseReached {
                phase: IN_PROGRESS_PHASE,
            }],
            ProjectStatus::Completed => &[LifecycleEvent::WorkflowFinished],
            ProjectStatus::Assistance => &[LifecycleEvent::PhaseReached {
                phase: ASSISTANCE_PHASE,
            }],
        };
        for event in replay {
            machine.handle(event);
        }
        machine
    }

    pub fn status(&self) -> ProjectStatus {
        self.status
    }

    fn enter(&mut self, status: ProjectStatus) {
        tracing::info!(
            project_id = %self.project_id,
            status.from = %self.status,
            status.to = %status,
            "Project status changed"
        );
        self.status = status;
    }
}

#[state_machine(initial = "State::pre_sale()")]
impl ProjectLifecycle {
    #[state]
    fn pre_sale(&mut self, event: &LifecycleEvent) -> Outcome<State> {
        match event {
            LifecycleEvent::PhaseReached { phase } if *phase >= ASSISTANCE_PHASE => {
                self.enter(ProjectStatus::Assistance);
                Transition(State::assistance())
            }
            LifecycleEvent::PhaseReached { phase } if *phase >= COMPLETED_PHASE => {
                self.enter(ProjectStatus::Completed);
                Transition(State::completed())
            }
            LifecycleEvent::PhaseReached { phase } if *phase >= IN_PROGRESS_PHASE => {
                self.enter(ProjectStatus::InProgress);
                Transition(State::in_progress())
            }
            LifecycleEvent::WorkflowFinished => {
                self.enter(ProjectStatus::Completed);
                Transition(State::completed())
            }
            _ => Handled,
        }
    }

    #[state]
    fn in_progress(&mut self, event: &LifecycleEvent) -> Outcome<State> {
        match event {
            LifecycleEvent::PhaseReached { phase } if *phase >= ASSISTANCE_PHASE => {
                self.enter(ProjectStatus::Assistance);
                Transition(State::assistance())
            }
            LifecycleEvent::PhaseReached { phase } if *phase >= COMPLETED_PHASE => {
                self.enter(ProjectStatus::Completed);
                Transition(State::completed())
            }
            LifecycleEvent::WorkflowFinished => {
                self.enter(ProjectStatus::Completed);
                Transition(State::completed())
            }
            _ => Handled,
        }
    }

    #[state]
    fn completed(&mut self, event: &LifecycleEvent) -> Outcome<State> {
        match event {
            LifecycleEvent::PhaseReached { phase } if *phase >= ASSISTANCE_PHASE => {
                self.enter(ProjectStatus::Assistance);
                Transition(State::assistance())
            }
            _ => Handled,
        }
    }

    #[state]
    fn assistance(&mut self, event: &LifecycleEvent) -> Outcome<State> {
        tracing::debug!(project_id = %self.project_id, ?event, "Project stays in assistance");
        Handled
    }
}

/// Status the project moves to after `event`, or `None` when it stays put
pub fn next_status(current: ProjectStatus, project_id: ProjectId, event: LifecycleEvent) -> Option<ProjectStatus> {
    let mut machine = ProjectLifecycle::resume(project_id, current);
    machine.handle(&event);
    let status = machine.inner().status();
    (status != current).then_some(status)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle_moves_forward_with_phases() {
        let mut machine = ProjectLifecycle::new(ProjectId::new()).state_machine();
        machine.handle(&LifecycleEvent::PhaseReached { phase: 1 });
        assert_eq!(machine.inner().status(), ProjectStatus::PreSale);

        machine.handle(&LifecycleEvent::PhaseReached { phase: 3 });
        assert_eq!(machine.inner().status(), ProjectStatus::InProgress);

        machine.handle(&LifecycleEvent::PhaseReached { phase: 2 });
        assert_eq!(machine.inner().status(), ProjectStatus::InProgress);

        machine.handle(&LifecycleEvent::WorkflowFinished);
        assert_eq!(machine.inner().status(), ProjectStatus::Completed);

        machine.handle(&LifecycleEvent::PhaseReached { phase: 10 });
        assert_eq!(machine.inner().status(), ProjectStatus::Assistance);
    }

    #[test]
    fn test_never_moves_backward() {
        let id = ProjectId::new();
        assert_eq!(
            next_status(ProjectStatus::Completed, id, LifecycleEvent::PhaseReached { phase: 4 }),
            None
        );
        assert_eq!(
            next_status(ProjectStatus::Assistance, id, LifecycleEvent::WorkflowFinished),
            None
        );
    }

    #[test]
    fn test_resume_restores_each_status() {
        for status in [
            ProjectStatus::PreSale,
            ProjectStatus::InProgress,
            ProjectStatus::Completed,
            ProjectStatus::Assistance,
        ] {
            let machine = ProjectLifecycle::resume(ProjectId::new(), status);
            assert_eq!(machine.inner().status(), status);
        }
    }

    #[test]
    fn test_assistance_absorbs_later_events() {
        let id = ProjectId::new();
        assert_eq!(
            next_status(ProjectStatus::InProgress, id, LifecycleEvent::PhaseReached { phase: 10 }),
            Some(ProjectStatus::Assistance)
        );
        let mut machine = ProjectLifecycle::resume(id, ProjectStatus::Assistance);
        machine.handle(&LifecycleEvent::WorkflowFinished);
        machine.handle(&LifecycleEvent::PhaseReached { phase: 9 });
        assert_eq!(machine.inner().status(), ProjectStatus::Assistance);
    }

    #[test]
    fn test_next_status_reports_only_changes() {
        let id = ProjectId::new();
        assert_eq!(
            next_status(ProjectStatus::PreSale, id, LifecycleEvent::PhaseReached { phase: 2 }),
            Some(ProjectStatus::InProgress)
        );
        assert_eq!(
            next_status(ProjectStatus::InProgress, id, LifecycleEvent::PhaseReached { phase: 5 }),
            None
        );
    }
}
