use std::collections::HashMap;

use crate::resources::settled;
use crate::{
    Effect, IngestScope, Job, JobKind, JobRequest, JobStatus, JobTicket, Msg, Notice, PollMode,
    PollPlan, PollState, ProgressEvent, ResourceState, ResourceStatus, TargetSnapshot, TaskState,
    TrackerState,
};

/// Pure update function: applies a message to state and returns any effects.
pub fn update(mut state: TrackerState, msg: Msg) -> (TrackerState, Vec<Effect>) {
    let mut effects = Vec::new();
    match msg {
        Msg::TargetSelected(target) => {
            if state.target() != target.as_deref() {
                for ticket in state.active_tickets() {
                    abandon(&mut state, ticket, &mut effects);
                }
                state.set_target(target);
                state.sections = Default::default();
                state.resources = Default::default();
                state.notices.clear();
                state.mark_dirty();
            }
        }
        Msg::SnapshotLoaded(snapshot) => {
            if state.target() == Some(snapshot.id.as_str()) {
                let wholesale = state.status(JobKind::Populate) != JobStatus::Streaming;
                let sections = state.sections.load(&snapshot.sections, wholesale);
                let resources = state.resources.replace_all(&snapshot.references);
                if sections || resources {
                    state.mark_dirty();
                }
            }
        }
        Msg::StartRequested(request) => {
            if state.check_start(&request).is_ok() {
                if let Some(target) = state.target().map(ToOwned::to_owned) {
                    state.open_job(request, target);
                    state.mark_dirty();
                }
            }
        }
        Msg::StartSucceeded { ticket } => start_succeeded(&mut state, ticket, &mut effects),
        Msg::StartFailed { ticket, reason } => {
            start_failed(&mut state, ticket, &reason, &mut effects)
        }
        Msg::Push { ticket, event } => apply_push(&mut state, ticket, &event, &mut effects),
        Msg::ChannelError { ticket, .. } | Msg::ChannelTimeout { ticket } => {
            fall_back_to_polling(&mut state, ticket, &mut effects)
        }
        Msg::PollResult {
            ticket,
            attempt,
            result,
        } => apply_poll(&mut state, ticket, attempt, result, &mut effects),
        Msg::FinalFetchResult { ticket, result } => {
            apply_final_fetch(&mut state, ticket, result, &mut effects)
        }
        Msg::CancelRequested { kind } => {
            if let Some(ticket) = state
                .job(kind)
                .filter(|job| job.status().is_active())
                .map(Job::ticket)
            {
                abandon(&mut state, ticket, &mut effects);
                state.mark_dirty();
            }
        }
        Msg::Teardown => {
            for ticket in state.active_tickets() {
                abandon(&mut state, ticket, &mut effects);
                state.mark_dirty();
            }
        }
        Msg::SectionEditStarted { name } => {
            if state.sections.begin_edit(&name) {
                state.mark_dirty();
            }
        }
        Msg::SectionSaved { name, content } => {
            if state.sections.save_edit(&name, &content) {
                state.mark_dirty();
            }
        }
        Msg::SectionEditCancelled { name } => {
            if state.sections.cancel_edit(&name) {
                state.mark_dirty();
            }
        }
        Msg::SectionToggled { name } => {
            if state.sections.toggle(&name) {
                state.mark_dirty();
            }
        }
        Msg::NoticesDismissed => {
            if !state.notices.is_empty() {
                state.notices.clear();
                state.mark_dirty();
            }
        }
        Msg::NoOp => {}
    }

    (state, effects)
}

/// Applies every message of one processing turn, after [`arbitrate`] has
/// settled push/poll conflicts between them.
pub fn update_turn(state: TrackerState, msgs: Vec<Msg>) -> (TrackerState, Vec<Effect>) {
    let msgs = arbitrate(&state, msgs);
    let mut state = state;
    let mut effects = Vec::new();
    for msg in msgs {
        let (next, more) = update(state, msg);
        state = next;
        effects.extend(more);
    }
    (state, effects)
}

/// Resolves a push frame and a poll snapshot that report different statuses
/// for the same reference within one turn.
///
/// The push frame wins only when it is logically newer: its resource status
/// is terminal, the frame itself is terminal, or it carries a progress value
/// strictly above the job's current one. Otherwise the snapshot wins. The
/// loser's view of that reference is removed so application order no longer
/// matters.
pub fn arbitrate(state: &TrackerState, mut msgs: Vec<Msg>) -> Vec<Msg> {
    let mut pushed: HashMap<(JobKind, String), (ResourceState, bool)> = HashMap::new();
    for msg in &msgs {
        if let Msg::Push { ticket, event } = msg {
            if let Some(resource) = &event.resource {
                let baseline = state.job_for(*ticket).map_or(0, Job::progress);
                let newer = resource.status.is_terminal()
                    || event.is_terminal()
                    || event.progress.is_some_and(|p| p > baseline);
                pushed.insert((ticket.kind, resource.id.clone()), (resource.clone(), newer));
            }
        }
    }
    if pushed.is_empty() {
        return msgs;
    }

    let mut polled: HashMap<(JobKind, String), ResourceStatus> = HashMap::new();
    for msg in &msgs {
        if let Some((ticket, snapshot)) = polled_snapshot(msg) {
            for reference in &snapshot.references {
                polled.insert((ticket.kind, reference.id.clone()), reference.status);
            }
        }
    }
    if polled.is_empty() {
        return msgs;
    }

    for msg in &mut msgs {
        match msg {
            Msg::Push { ticket, event } => {
                let Some(key) = event
                    .resource
                    .as_ref()
                    .map(|resource| (ticket.kind, resource.id.clone()))
                else {
                    continue;
                };
                let poll_wins = match (pushed.get(&key), polled.get(&key)) {
                    (Some((resource, newer)), Some(status)) => {
                        !*newer && resource.status != *status
                    }
                    _ => false,
                };
                if poll_wins {
                    event.resource = None;
                }
            }
            Msg::PollResult {
                ticket,
                result: Ok(snapshot),
                ..
            }
            | Msg::FinalFetchResult {
                ticket,
                result: Ok(snapshot),
            } => {
                for reference in snapshot.references.iter_mut() {
                    if let Some((resource, true)) = pushed.get(&(ticket.kind, reference.id.clone()))
                    {
                        if resource.status != reference.status {
                            *reference = resource.clone();
                        }
                    }
                }
            }
            _ => {}
        }
    }
    msgs
}

fn polled_snapshot(msg: &Msg) -> Option<(JobTicket, &TargetSnapshot)> {
    match msg {
        Msg::PollResult {
            ticket,
            result: Ok(snapshot),
            ..
        }
        | Msg::FinalFetchResult {
            ticket,
            result: Ok(snapshot),
        } => Some((*ticket, snapshot)),
        _ => None,
    }
}

fn start_succeeded(state: &mut TrackerState, ticket: JobTicket, effects: &mut Vec<Effect>) {
    let reingest = match state.job_for(ticket) {
        Some(job) if job.status() == JobStatus::Starting => match job.request() {
            JobRequest::Ingest {
                scope: IngestScope::Single(id),
            } => Some(id.clone()),
            _ => None,
        },
        _ => return,
    };
    if let Some(id) = reingest {
        state.resources.reset(&id);
    }

    let policy = state.policies().get(ticket.kind).clone();
    let Some(job) = state.job_for_mut(ticket) else {
        return;
    };
    match policy.push {
        Some(stream) => {
            job.status = JobStatus::Streaming;
            job.channel_open = true;
            effects.push(Effect::OpenChannel {
                ticket,
                stream,
                ceiling: policy.channel_ceiling,
            });
        }
        None => begin_polling(job, policy.primary, effects),
    }
    state.mark_dirty();
}

fn start_failed(
    state: &mut TrackerState,
    ticket: JobTicket,
    reason: &str,
    effects: &mut Vec<Effect>,
) {
    let Some(job) = state
        .job_for_mut(ticket)
        .filter(|job| job.status == JobStatus::Starting)
    else {
        return;
    };
    job.settle(JobStatus::Failed);
    job.message = reason.to_owned();
    effects.push(Effect::Release { ticket });
    let kind = ticket.kind;
    notify(
        state,
        Notice::blocking(kind, format!("could not start {kind}: {reason}")),
        effects,
    );
    state.mark_dirty();
}

fn apply_push(
    state: &mut TrackerState,
    ticket: JobTicket,
    event: &ProgressEvent,
    effects: &mut Vec<Effect>,
) {
    let (status, request, progress) = match state.job_for(ticket) {
        Some(job) if matches!(job.status(), JobStatus::Streaming | JobStatus::Polling) => {
            (job.status(), job.request().clone(), job.progress())
        }
        _ => return,
    };

    let mut changed = false;
    if let Some(section) = &event.section {
        let revision = event.progress.unwrap_or(progress);
        changed |= state
            .sections
            .apply(&section.name, &section.content, revision);
    }
    if let Some(resource) = &event.resource {
        changed |= state.resources.apply_push(resource);
    }
    if changed {
        state.mark_dirty();
    }
    // Frames queued before the channel closed still carry data, but the
    // poll loop owns the status from here on.
    if status != JobStatus::Streaming {
        return;
    }

    let scope = match &request {
        JobRequest::Ingest { scope } => Some(scope),
        _ => None,
    };
    let settled_now = scope.is_some_and(|scope| state.resources.is_settled(scope));
    let derived = scope
        .filter(|_| state.resources.is_known())
        .map(|scope| state.resources.percent_settled(scope));
    let policy = state.policies().get(ticket.kind).clone();
    let kind = ticket.kind;

    let Some(job) = state.job_for_mut(ticket) else {
        return;
    };
    if event.is_failure() {
        job.settle(JobStatus::Failed);
        job.message = event.message.clone();
        effects.push(Effect::CloseChannel { ticket });
        effects.push(Effect::Release { ticket });
        let text = if event.message.is_empty() {
            format!("{kind} failed")
        } else {
            format!("{kind} failed: {}", event.message)
        };
        notify(state, Notice::blocking(kind, text), effects);
        state.mark_dirty();
        return;
    }

    if let Some(next) = event.progress.or(derived) {
        if next >= job.progress {
            job.progress = next;
            if !event.message.is_empty() {
                job.message = event.message.clone();
            }
        }
    }

    if !(event.is_terminal() || settled_now) {
        state.mark_dirty();
        return;
    }

    job.channel_open = false;
    effects.push(Effect::CloseChannel { ticket });
    if policy.requires_confirmation {
        begin_polling(job, policy.confirmation, effects);
    } else {
        job.settle(JobStatus::Succeeded);
        effects.push(Effect::Release { ticket });
    }
    state.mark_dirty();
}

fn fall_back_to_polling(state: &mut TrackerState, ticket: JobTicket, effects: &mut Vec<Effect>) {
    let plan = state.policies().get(ticket.kind).primary;
    let Some(job) = state
        .job_for_mut(ticket)
        .filter(|job| job.status == JobStatus::Streaming)
    else {
        return;
    };
    job.channel_open = false;
    effects.push(Effect::CloseChannel { ticket });
    begin_polling(job, plan, effects);
    state.mark_dirty();
}

fn begin_polling(job: &mut Job, plan: PollPlan, effects: &mut Vec<Effect>) {
    job.status = JobStatus::Polling;
    job.poll = Some(PollState::new(plan));
    effects.push(Effect::StartPolling {
        ticket: job.ticket(),
        plan,
    });
}

fn apply_poll(
    state: &mut TrackerState,
    ticket: JobTicket,
    attempt: u32,
    result: Result<TargetSnapshot, String>,
    effects: &mut Vec<Effect>,
) {
    let (request, target) = match state.job_for(ticket) {
        Some(job) if job.status() == JobStatus::Polling && !job.final_fetch_pending => {
            (job.request().clone(), job.target().to_owned())
        }
        _ => return,
    };

    let snapshot = result.ok().filter(|snapshot| snapshot.id == target);
    let answered = snapshot.is_some();
    let outcome = snapshot.as_ref().and_then(|snapshot| {
        apply_snapshot(state, snapshot);
        terminal_outcome(&request, snapshot)
    });

    let Some(job) = state.job_for_mut(ticket) else {
        return;
    };
    let Some(poll) = job.poll.as_mut() else {
        return;
    };
    poll.attempts = poll.attempts.max(attempt);
    if answered {
        poll.answered += 1;
    }
    let exhausted = poll.is_exhausted();

    match outcome {
        Some(status) => {
            job.settle(status);
            if status == JobStatus::Succeeded {
                job.progress = 100;
            }
            effects.push(Effect::StopPolling { ticket });
            effects.push(Effect::Release { ticket });
            if status == JobStatus::Failed {
                let kind = ticket.kind;
                notify(
                    state,
                    Notice::blocking(kind, format!("{kind} failed on the server")),
                    effects,
                );
            }
        }
        None if exhausted => {
            job.final_fetch_pending = true;
            effects.push(Effect::StopPolling { ticket });
            effects.push(Effect::FinalFetch { ticket });
        }
        None => {}
    }
    state.mark_dirty();
}

fn apply_final_fetch(
    state: &mut TrackerState,
    ticket: JobTicket,
    result: Result<TargetSnapshot, String>,
    effects: &mut Vec<Effect>,
) {
    let (request, target, answered, mode) = match state.job_for(ticket) {
        Some(job) if job.status() == JobStatus::Polling && job.final_fetch_pending => (
            job.request().clone(),
            job.target().to_owned(),
            job.poll().map_or(0, |poll| poll.answered),
            job.poll().map_or(PollMode::Primary, |poll| poll.plan.mode),
        ),
        _ => return,
    };

    let kind = ticket.kind;
    let (status, notice) = match result {
        Ok(snapshot) if snapshot.id == target => {
            apply_snapshot(state, &snapshot);
            match terminal_outcome(&request, &snapshot) {
                Some(JobStatus::Failed) => (
                    JobStatus::Failed,
                    Some(Notice::blocking(kind, format!("{kind} failed on the server"))),
                ),
                Some(status) => (status, None),
                None => (
                    JobStatus::TimedOut,
                    Some(Notice::soft(
                        kind,
                        format!("{kind} completed, please verify the results"),
                    )),
                ),
            }
        }
        // Confirmation polling follows a push stream that already settled.
        Ok(_) | Err(_) if answered == 0 && mode == PollMode::Primary => (
            JobStatus::Failed,
            Some(Notice::blocking(
                kind,
                format!("{kind}: lost progress updates and could not read the job status"),
            )),
        ),
        Ok(_) | Err(_) => (
            JobStatus::TimedOut,
            Some(Notice::soft(
                kind,
                format!("{kind} completed, please verify the results"),
            )),
        ),
    };

    if let Some(job) = state.job_for_mut(ticket) {
        job.settle(status);
        if status == JobStatus::Succeeded {
            job.progress = 100;
        }
    }
    effects.push(Effect::Release { ticket });
    if let Some(notice) = notice {
        notify(state, notice, effects);
    }
    state.mark_dirty();
}

fn apply_snapshot(state: &mut TrackerState, snapshot: &TargetSnapshot) {
    let sections = state.sections.load(&snapshot.sections, false);
    let resources = state.resources.replace_all(&snapshot.references);
    if sections || resources {
        state.mark_dirty();
    }
}

/// Terminal status a snapshot proves for the job, if any.
fn terminal_outcome(request: &JobRequest, snapshot: &TargetSnapshot) -> Option<JobStatus> {
    match request {
        JobRequest::Ingest { scope } => {
            settled(&snapshot.references, scope).then_some(JobStatus::Succeeded)
        }
        JobRequest::Identify | JobRequest::Populate { .. } => {
            match snapshot.task(request.kind()) {
                TaskState::Completed => Some(JobStatus::Succeeded),
                TaskState::Failed => Some(JobStatus::Failed),
                TaskState::Idle | TaskState::Running => None,
            }
        }
    }
}

/// Cooperative cancellation: the ticket stops being live, so completions
/// still in flight for it are dropped. Applied results stay.
fn abandon(state: &mut TrackerState, ticket: JobTicket, effects: &mut Vec<Effect>) {
    if let Some(job) = state.job_for_mut(ticket) {
        job.settle(JobStatus::Idle);
        effects.push(Effect::Release { ticket });
    }
}

fn notify(state: &mut TrackerState, notice: Notice, effects: &mut Vec<Effect>) {
    state.notices.push(notice.clone());
    effects.push(Effect::Notify(notice));
}
