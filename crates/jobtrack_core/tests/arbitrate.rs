use jobtrack_core::{
    update, update_turn, IngestScope, JobKind, JobRequest, JobTicket, Msg, ProgressEvent,
    ResourceState, ResourceStatus, TargetSnapshot, TrackerState,
};

fn ingest_job_polling(ids: &[&str]) -> (TrackerState, JobTicket) {
    let (state, _) = update(TrackerState::new(), Msg::TargetSelected(Some("T2".into())));
    let mut snapshot = TargetSnapshot::new("T2");
    snapshot.references = ids
        .iter()
        .map(|id| ResourceState::new(*id, ResourceStatus::Pending))
        .collect();
    let (state, _) = update(state, Msg::SnapshotLoaded(snapshot));
    let (state, _) = update(
        state,
        Msg::StartRequested(JobRequest::Ingest {
            scope: IngestScope::All,
        }),
    );
    let ticket = state.job(JobKind::Ingest).unwrap().ticket();
    let (state, _) = update(state, Msg::StartSucceeded { ticket });
    let (state, _) = update(
        state,
        Msg::ChannelError {
            ticket,
            reason: "reset".into(),
        },
    );
    (state, ticket)
}

fn snapshot_with(statuses: &[(&str, ResourceStatus)]) -> TargetSnapshot {
    let mut snapshot = TargetSnapshot::new("T2");
    snapshot.references = statuses
        .iter()
        .map(|(id, status)| ResourceState::new(*id, *status))
        .collect();
    snapshot
}

fn status_of(state: &TrackerState, id: &str) -> ResourceStatus {
    state.resources().get(id).unwrap().status
}

#[test]
fn poll_wins_over_a_non_terminal_push_in_either_order() {
    let (state, ticket) = ingest_job_polling(&["r1", "r2"]);
    let push = Msg::Push {
        ticket,
        event: ProgressEvent::resource(ResourceState::new("r1", ResourceStatus::Processing), ""),
    };
    let poll = Msg::PollResult {
        ticket,
        attempt: 1,
        result: Ok(snapshot_with(&[
            ("r1", ResourceStatus::Pending),
            ("r2", ResourceStatus::Processing),
        ])),
    };

    let (push_first, _) = update_turn(state.clone(), vec![push.clone(), poll.clone()]);
    let (poll_first, _) = update_turn(state, vec![poll, push]);

    assert_eq!(status_of(&push_first, "r1"), ResourceStatus::Pending);
    assert_eq!(status_of(&poll_first, "r1"), ResourceStatus::Pending);
}

#[test]
fn terminal_push_wins_over_the_poll_in_either_order() {
    let (state, ticket) = ingest_job_polling(&["r1", "r2"]);
    let push = Msg::Push {
        ticket,
        event: ProgressEvent::resource(ResourceState::new("r1", ResourceStatus::Ingested), ""),
    };
    let poll = Msg::PollResult {
        ticket,
        attempt: 1,
        result: Ok(snapshot_with(&[
            ("r1", ResourceStatus::Processing),
            ("r2", ResourceStatus::Processing),
        ])),
    };

    let (push_first, _) = update_turn(state.clone(), vec![push.clone(), poll.clone()]);
    let (poll_first, _) = update_turn(state, vec![poll, push]);

    assert_eq!(status_of(&push_first, "r1"), ResourceStatus::Ingested);
    assert_eq!(status_of(&poll_first, "r1"), ResourceStatus::Ingested);
    assert_eq!(status_of(&poll_first, "r2"), ResourceStatus::Processing);
}

#[test]
fn higher_progress_push_is_newer() {
    let (state, ticket) = ingest_job_polling(&["r1"]);
    let mut event =
        ProgressEvent::resource(ResourceState::new("r1", ResourceStatus::Processing), "");
    event.progress = Some(10);
    let msgs = vec![
        Msg::PollResult {
            ticket,
            attempt: 1,
            result: Ok(snapshot_with(&[("r1", ResourceStatus::Pending)])),
        },
        Msg::Push { ticket, event },
    ];

    let arbitrated = jobtrack_core::arbitrate(&state, msgs);
    match &arbitrated[0] {
        Msg::PollResult {
            result: Ok(snapshot),
            ..
        } => assert_eq!(snapshot.references[0].status, ResourceStatus::Processing),
        other => panic!("unexpected message {other:?}"),
    }
    match &arbitrated[1] {
        Msg::Push { event, .. } => assert!(event.resource.is_some()),
        other => panic!("unexpected message {other:?}"),
    }
}

#[test]
fn unrelated_messages_pass_through_untouched() {
    let (state, ticket) = ingest_job_polling(&["r1"]);
    let msgs = vec![
        Msg::Push {
            ticket,
            event: ProgressEvent::resource(ResourceState::new("r9", ResourceStatus::Processing), ""),
        },
        Msg::PollResult {
            ticket,
            attempt: 1,
            result: Ok(snapshot_with(&[("r1", ResourceStatus::Pending)])),
        },
        Msg::NoOp,
    ];

    assert_eq!(jobtrack_core::arbitrate(&state, msgs.clone()), msgs);
}
