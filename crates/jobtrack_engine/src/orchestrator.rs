use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use jobtrack_core::{
    update, update_turn, Effect, JobKind, JobRequest, JobStatus, JobTicket, Msg, Notice,
    NoticeLevel, PollPlan, ProgressEvent, Rejection, StreamKind, TargetId, TargetSnapshot,
    TrackerState, TrackerView,
};
use jobtrack_logging::{track_debug, track_error, track_info, track_warn};
use tokio::sync::mpsc;

use crate::channel::{ChannelSink, ProgressChannel};
use crate::janitor::{ResourceJanitor, Slot, TaskGuard};
use crate::polling::{PollSettings, PollingFallback};
use crate::runner::JobRunner;
use crate::{EngineConfig, RunnerError, TrackError};

/// How a tracked job ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobOutcome {
    pub ticket: JobTicket,
    /// `Idle` when the job was cancelled.
    pub status: JobStatus,
    pub notice: Option<Notice>,
}

/// Drives the pure tracker state against a [`JobRunner`].
///
/// Every background source (push channel, poll loop, final fetch) reports
/// back through one queue as a [`Msg`] tagged with the job's ticket; each
/// call to [`Orchestrator::next_turn`] folds whatever has queued up as one
/// turn and executes the resulting effects.
pub struct Orchestrator<R: JobRunner + 'static> {
    runner: Arc<R>,
    state: TrackerState,
    janitor: ResourceJanitor,
    last_notice: BTreeMap<JobKind, Notice>,
    events_tx: mpsc::UnboundedSender<Msg>,
    events_rx: mpsc::UnboundedReceiver<Msg>,
}

impl<R: JobRunner + 'static> Orchestrator<R> {
    pub fn new(runner: Arc<R>, config: &EngineConfig) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            runner,
            state: TrackerState::with_policies(config.policies.clone()),
            janitor: ResourceJanitor::new(),
            last_notice: BTreeMap::new(),
            events_tx,
            events_rx,
        }
    }

    pub fn state(&self) -> &TrackerState {
        &self.state
    }

    pub fn view(&self) -> TrackerView {
        self.state.view()
    }

    pub fn consume_dirty(&mut self) -> bool {
        self.state.consume_dirty()
    }

    pub fn janitor(&self) -> &ResourceJanitor {
        &self.janitor
    }

    pub fn select_target(&mut self, target: Option<TargetId>) {
        self.dispatch(Msg::TargetSelected(target));
    }

    pub fn load_snapshot(&mut self, snapshot: TargetSnapshot) {
        self.dispatch(Msg::SnapshotLoaded(snapshot));
    }

    /// Cold-loads the selected target from the runner.
    pub async fn refresh(&mut self) -> Result<(), RunnerError> {
        let Some(target) = self.state.target().map(ToOwned::to_owned) else {
            return Ok(());
        };
        let snapshot = self.runner.fetch_snapshot(&target).await?;
        self.dispatch(Msg::SnapshotLoaded(snapshot));
        Ok(())
    }

    /// Starts a job on the selected target and begins tracking it.
    ///
    /// Preconditions are checked before any network call. On success the
    /// job's push channel (or poll loop) is already running.
    pub async fn start(&mut self, request: JobRequest) -> Result<JobTicket, TrackError> {
        self.state.check_start(&request)?;
        let kind = request.kind();
        self.dispatch(Msg::StartRequested(request.clone()));
        let (ticket, target) = self
            .state
            .job(kind)
            .map(|job| (job.ticket(), job.target().to_owned()))
            .ok_or(TrackError::StartRejected(Rejection::NoTarget))?;
        self.last_notice.remove(&kind);
        track_info!("starting {} on {} (epoch {})", kind, target, ticket.epoch);

        match self.runner.start(&target, &request).await {
            Ok(()) => {
                self.dispatch(Msg::StartSucceeded { ticket });
                Ok(ticket)
            }
            Err(err) => {
                track_warn!("{} start failed: {}", kind, err);
                self.dispatch(Msg::StartFailed {
                    ticket,
                    reason: err.to_string(),
                });
                Err(TrackError::StartFailed(err))
            }
        }
    }

    /// Waits for at least one message, then applies everything queued as one turn.
    pub async fn next_turn(&mut self) {
        let Some(first) = self.events_rx.recv().await else {
            return;
        };
        let mut turn = vec![first];
        while let Ok(msg) = self.events_rx.try_recv() {
            turn.push(msg);
        }
        let state = std::mem::take(&mut self.state);
        let (state, effects) = update_turn(state, turn);
        self.state = state;
        self.run_effects(effects);
    }

    /// Processes turns until the job of `kind` is no longer active.
    pub async fn drive(&mut self, kind: JobKind) -> Option<JobOutcome> {
        while self.state.status(kind).is_active() {
            self.next_turn().await;
        }
        self.outcome(kind)
    }

    pub fn outcome(&self, kind: JobKind) -> Option<JobOutcome> {
        self.state.job(kind).map(|job| JobOutcome {
            ticket: job.ticket(),
            status: job.status(),
            notice: self.last_notice.get(&kind).cloned(),
        })
    }

    /// Stops tracking the job of `kind`. Already-delivered data is kept.
    pub fn cancel(&mut self, kind: JobKind) {
        self.dispatch(Msg::CancelRequested { kind });
    }

    /// Abandons every active job and releases all resources.
    pub fn shutdown(&mut self) {
        self.dispatch(Msg::Teardown);
        self.janitor.dispose_all();
    }

    pub fn begin_edit(&mut self, name: impl Into<String>) {
        self.dispatch(Msg::SectionEditStarted { name: name.into() });
    }

    pub fn save_section(&mut self, name: impl Into<String>, content: impl Into<String>) {
        self.dispatch(Msg::SectionSaved {
            name: name.into(),
            content: content.into(),
        });
    }

    pub fn cancel_edit(&mut self, name: impl Into<String>) {
        self.dispatch(Msg::SectionEditCancelled { name: name.into() });
    }

    pub fn toggle_section(&mut self, name: impl Into<String>) {
        self.dispatch(Msg::SectionToggled { name: name.into() });
    }

    pub fn dismiss_notices(&mut self) {
        self.dispatch(Msg::NoticesDismissed);
    }

    fn dispatch(&mut self, msg: Msg) {
        let state = std::mem::take(&mut self.state);
        let (state, effects) = update(state, msg);
        self.state = state;
        self.run_effects(effects);
    }

    fn run_effects(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::OpenChannel {
                    ticket,
                    stream,
                    ceiling,
                } => self.open_channel(ticket, stream, ceiling),
                Effect::CloseChannel { ticket } => {
                    self.janitor.dispose(ticket.kind, Slot::Channel);
                }
                Effect::StartPolling { ticket, plan } => self.start_polling(ticket, plan),
                Effect::StopPolling { ticket } => {
                    self.janitor.dispose(ticket.kind, Slot::Poll);
                }
                Effect::FinalFetch { ticket } => self.final_fetch(ticket),
                Effect::Release { ticket } => {
                    let released = self.janitor.dispose_job(ticket.kind);
                    track_debug!(
                        "released {} job (epoch {}, {} resources)",
                        ticket.kind,
                        ticket.epoch,
                        released
                    );
                }
                Effect::Notify(notice) => {
                    match notice.level {
                        NoticeLevel::Blocking => track_error!("{}", notice.text),
                        NoticeLevel::Soft => track_warn!("{}", notice.text),
                    }
                    self.last_notice.insert(notice.kind, notice);
                }
            }
        }
    }

    fn target_of(&self, ticket: JobTicket) -> Option<String> {
        self.state
            .job(ticket.kind)
            .filter(|job| job.ticket() == ticket)
            .map(|job| job.target().to_owned())
    }

    fn open_channel(&mut self, ticket: JobTicket, stream: StreamKind, ceiling: Duration) {
        let Some(target) = self.target_of(ticket) else {
            return;
        };
        let runner = Arc::clone(&self.runner);
        let connect = async move { runner.open_stream(&target, stream).await };
        let sink = TicketSink {
            ticket,
            tx: self.events_tx.clone(),
        };
        let handle = ProgressChannel::open(connect, stream, ceiling, sink);
        self.janitor
            .register(ticket.kind, Slot::Channel, Box::new(handle));
    }

    fn start_polling(&mut self, ticket: JobTicket, plan: PollPlan) {
        let Some(target) = self.target_of(ticket) else {
            return;
        };
        // At most one live source per job.
        self.janitor.dispose(ticket.kind, Slot::Channel);
        track_info!(
            "polling {} every {:?} ({:?}, up to {} attempts)",
            ticket.kind,
            plan.interval,
            plan.mode,
            plan.max_attempts
        );

        let runner = Arc::clone(&self.runner);
        let tx = self.events_tx.clone();
        let handle = PollingFallback::start(PollSettings::from(plan), move |attempt| {
            let runner = Arc::clone(&runner);
            let tx = tx.clone();
            let target = target.clone();
            async move {
                let result = runner.fetch_snapshot(&target).await.map_err(|err| {
                    track_debug!("poll {} of {} failed: {}", attempt, ticket.kind, err);
                    err.to_string()
                });
                let _ = tx.send(Msg::PollResult {
                    ticket,
                    attempt,
                    result,
                });
            }
        });
        self.janitor
            .register(ticket.kind, Slot::Poll, Box::new(handle));
    }

    fn final_fetch(&mut self, ticket: JobTicket) {
        let Some(target) = self.target_of(ticket) else {
            return;
        };
        if let Some(budget) = self
            .state
            .job(ticket.kind)
            .and_then(|job| job.poll())
            .map(|poll| poll.plan.max_attempts)
        {
            track_info!("{}; {} final fetch", TrackError::PollExhausted(budget), ticket.kind);
        }
        let runner = Arc::clone(&self.runner);
        let tx = self.events_tx.clone();
        let task = tokio::spawn(async move {
            let result = runner
                .fetch_snapshot(&target)
                .await
                .map_err(|err| err.to_string());
            let _ = tx.send(Msg::FinalFetchResult { ticket, result });
        });
        self.janitor
            .register(ticket.kind, Slot::Fetch, Box::new(TaskGuard::new(task)));
    }
}

/// Forwards channel observations into the orchestrator queue.
struct TicketSink {
    ticket: JobTicket,
    tx: mpsc::UnboundedSender<Msg>,
}

impl ChannelSink for TicketSink {
    fn on_message(&self, event: ProgressEvent) {
        let _ = self.tx.send(Msg::Push {
            ticket: self.ticket,
            event,
        });
    }

    fn on_error(&self, reason: String) {
        let _ = self.tx.send(Msg::ChannelError {
            ticket: self.ticket,
            reason,
        });
    }

    fn on_timeout(&self) {
        let _ = self.tx.send(Msg::ChannelTimeout {
            ticket: self.ticket,
        });
    }
}

