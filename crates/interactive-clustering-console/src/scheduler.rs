use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use chrono::{DateTime, Local};

use crate::client::StatusClient;
use crate::error::{Error, Result};
use crate::projector::project;
use crate::sink::{ActionSink, apply_plan};
use crate::status::StatusSnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Polling,
}

/// A timer armed by the last poll. Only honoured while its generation is current.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingPoll {
    pub due: Instant,
    pub generation: u64,
}

/// A status fetch the caller must run and hand back to [`PollingScheduler::complete`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub project_id: String,
    pub generation: u64,
}

/// What one completed poll did.
#[derive(Debug, Clone)]
pub struct PollReport {
    pub snapshot: StatusSnapshot,
    pub at: DateTime<Local>,
    pub actions: usize,
    pub reloaded: bool,
    pub rescheduled: bool,
}

#[derive(Debug, Clone)]
pub enum Tick {
    /// Nothing armed.
    Idle,
    NotDue,
    /// The poll belonged to a cancelled generation or a dead view.
    Dropped,
    Polled(PollReport),
}

/// Arms the next poll only once the previous plan is applied; failures stop it.
pub struct PollingScheduler {
    delay: Duration,
    state: SchedulerState,
    generation: u64,
    pending: Option<PendingPoll>,
    in_flight: Option<u64>,
    alive: Arc<AtomicBool>,
    project_id: Option<String>,
    last: Option<PollReport>,
}

impl PollingScheduler {
    /// `alive` is owned by the hosting view; clearing it turns any armed poll
    /// into a no-op.
    pub fn new(delay: Duration, alive: Arc<AtomicBool>) -> Self {
        Self {
            delay,
            state: SchedulerState::Idle,
            generation: 0,
            pending: None,
            in_flight: None,
            alive,
            project_id: None,
            last: None,
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn pending(&self) -> Option<PendingPoll> {
        self.pending
    }

    pub fn is_fetching(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn project_id(&self) -> Option<&str> {
        self.project_id.as_deref()
    }

    pub fn last_report(&self) -> Option<&PollReport> {
        self.last.as_ref()
    }

    pub fn is_view_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    /// Begin polling `project_id` and hand back the first fetch.
    ///
    /// Any armed poll or outstanding fetch from before is cancelled; a reply to
    /// it will be dropped by [`complete`](Self::complete).
    pub fn begin(&mut self, project_id: &str) -> Result<FetchRequest> {
        if !self.is_view_alive() {
            return Err(Error::msg("cannot start polling: the view has been torn down"));
        }
        self.cancel_pending();
        self.project_id = Some(project_id.to_string());
        tracing::info!(project_id, delay_ms = self.delay.as_millis() as u64, "polling started");
        Ok(self.issue(project_id.to_string()))
    }

    /// Claim the armed poll if it is due at `now` and no fetch is outstanding.
    pub fn take_due(&mut self, now: Instant) -> Option<FetchRequest> {
        if self.in_flight.is_some() {
            return None;
        }
        match self.pending {
            Some(p) if p.due <= now => self.claim(p),
            _ => None,
        }
    }

    /// Apply the outcome of a fetch. A reply whose generation was cancelled in
    /// the meantime, or that arrives after teardown, is dropped untouched.
    pub fn complete<S>(
        &mut self,
        request: &FetchRequest,
        now: Instant,
        outcome: Result<StatusSnapshot>,
        sink: &mut S,
    ) -> Result<Tick>
    where
        S: ActionSink,
    {
        if self.in_flight != Some(request.generation) || !self.is_view_alive() {
            tracing::debug!(
                generation = request.generation,
                current = self.generation,
                "dropping late status reply"
            );
            return Ok(Tick::Dropped);
        }
        self.in_flight = None;
        self.settle(&request.project_id, now, outcome, sink)
            .map(Tick::Polled)
    }

    /// Begin polling and run the first cycle on the calling thread.
    pub fn start<C, S>(&mut self, project_id: &str, client: &mut C, sink: &mut S) -> Result<PollReport>
    where
        C: StatusClient + ?Sized,
        S: ActionSink,
    {
        let request = self.begin(project_id)?;
        let outcome = client.fetch(&request.project_id);
        match self.complete(&request, Instant::now(), outcome, sink)? {
            Tick::Polled(report) => Ok(report),
            _ => Err(Error::msg("first poll was cancelled")),
        }
    }

    /// Fire the armed poll if it is due at `now`, fetching on the calling thread.
    pub fn poll_due<C, S>(&mut self, now: Instant, client: &mut C, sink: &mut S) -> Result<Tick>
    where
        C: StatusClient + ?Sized,
        S: ActionSink,
    {
        match self.pending {
            None => Ok(Tick::Idle),
            Some(p) if p.due > now => Ok(Tick::NotDue),
            Some(p) => self.fire(p, now, client, sink),
        }
    }

    /// Run a poll armed earlier. A poll from an older generation, or one whose
    /// view is gone, is dropped without fetching.
    pub fn fire<C, S>(
        &mut self,
        pending: PendingPoll,
        now: Instant,
        client: &mut C,
        sink: &mut S,
    ) -> Result<Tick>
    where
        C: StatusClient + ?Sized,
        S: ActionSink,
    {
        let Some(request) = self.claim(pending) else {
            return Ok(Tick::Dropped);
        };
        let outcome = client.fetch(&request.project_id);
        self.complete(&request, now, outcome, sink)
    }

    /// The hosting view is going away: forget the armed poll and refuse to
    /// run or apply any poll issued before this point.
    pub fn teardown(&mut self) {
        self.alive.store(false, Ordering::SeqCst);
        self.cancel_pending();
        self.state = SchedulerState::Idle;
        tracing::debug!(generation = self.generation, "polling torn down");
    }

    /// Poll until nothing is left to do, sleeping between cycles.
    pub fn run_blocking<C, S>(
        &mut self,
        project_id: &str,
        client: &mut C,
        sink: &mut S,
    ) -> Result<Option<PollReport>>
    where
        C: StatusClient + ?Sized,
        S: ActionSink,
    {
        self.start(project_id, client, sink)?;
        while let Some(p) = self.pending {
            let now = Instant::now();
            if p.due > now {
                std::thread::sleep(p.due - now);
            }
            if let Tick::Dropped = self.poll_due(Instant::now(), client, sink)? {
                break;
            }
        }
        Ok(self.last.clone())
    }

    fn cancel_pending(&mut self) {
        self.pending = None;
        self.in_flight = None;
        self.generation = self.generation.wrapping_add(1);
    }

    fn issue(&mut self, project_id: String) -> FetchRequest {
        self.state = SchedulerState::Polling;
        self.in_flight = Some(self.generation);
        FetchRequest {
            project_id,
            generation: self.generation,
        }
    }

    fn claim(&mut self, pending: PendingPoll) -> Option<FetchRequest> {
        if pending.generation != self.generation || !self.is_view_alive() {
            tracing::debug!(
                generation = pending.generation,
                current = self.generation,
                "dropping stale poll"
            );
            if self.pending == Some(pending) {
                self.pending = None;
                self.state = SchedulerState::Idle;
            }
            return None;
        }
        let project_id = self.project_id.clone()?;
        self.pending = None;
        Some(self.issue(project_id))
    }

    fn settle<S: ActionSink>(
        &mut self,
        project_id: &str,
        now: Instant,
        outcome: Result<StatusSnapshot>,
        sink: &mut S,
    ) -> Result<PollReport> {
        let outcome = outcome.and_then(|snapshot| {
            let plan = project(&snapshot, &*sink)?;
            Ok((snapshot, plan))
        });
        let (snapshot, plan) = match outcome {
            Ok(v) => v,
            Err(err) => return Err(self.halt(sink, err)),
        };

        let reloaded = apply_plan(sink, &plan);
        let rescheduled = reloaded || plan.should_reschedule;
        if rescheduled {
            // A reloaded view performs its own first poll straight away.
            let delay = if reloaded { Duration::ZERO } else { self.delay };
            self.pending = Some(PendingPoll {
                due: now + delay,
                generation: self.generation,
            });
        } else {
            self.state = SchedulerState::Idle;
        }

        tracing::info!(
            project_id,
            iteration = snapshot.iteration_id,
            state = %snapshot.state,
            actions = plan.len(),
            reloaded,
            rescheduled,
            "status applied"
        );

        let report = PollReport {
            snapshot,
            at: Local::now(),
            actions: plan.len(),
            reloaded,
            rescheduled,
        };
        self.last = Some(report.clone());
        Ok(report)
    }

    fn halt<S: ActionSink>(&mut self, sink: &mut S, err: Error) -> Error {
        tracing::error!(error = %err, "status polling halted");
        sink.show_error(&err.to_string());
        self.pending = None;
        self.in_flight = None;
        self.state = SchedulerState::Idle;
        err
    }
}
