//! Integration tests for the presence engine
//!
//! These tests drive the engine through its public surface (server,
//! orchestrator, raw PBX events) against the in-memory PBX and check both
//! local presence and what reached the PBX.

use presence_engine::prelude::*;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

struct Harness {
    server: PresenceServer,
    pbx: Arc<InMemoryTelephony>,
    publisher: Arc<RecordingPublisher>,
}

fn harness() -> Harness {
    let pbx = Arc::new(InMemoryTelephony::new());
    let publisher = Arc::new(RecordingPublisher::new());
    let server = PresenceServerBuilder::new()
        .with_config(PresenceConfig::default())
        .with_telephony(pbx.clone())
        .with_publisher(publisher.clone())
        .build()
        .expect("default configuration builds");
    Harness { server, pbx, publisher }
}

fn all_channels() -> Vec<ChannelId> {
    ["vicidial", "whatsapp", "telegram", "webchat", "email"]
        .into_iter()
        .map(ChannelId::from)
        .collect()
}

/// Enroll, log in and unpause; leaves the agent READY at sequence 2
async fn ready_agent(h: &Harness, id: &str, channels: &[ChannelId]) -> AgentId {
    let agent = AgentId::from(id);
    let actor = ActorId::from(&agent);
    h.server.enroll(&ActorId::from("admin"), agent.clone(), channels).unwrap();
    let state = h.server.orchestrator().login(&agent, "inbound", &[], 0, &actor).await.unwrap();
    let state = h.server.orchestrator().unpause(&agent, state.sequence, &actor).await.unwrap();
    assert_eq!(state.status, PresenceStatus::Ready);
    assert_eq!(state.sequence, 2);
    agent
}

/// READY agent answers `call_id`; leaves the agent INCALL at sequence 4
async fn agent_in_call(h: &Harness, id: &str, call_id: &str) -> AgentId {
    let agent = ready_agent(h, id, &all_channels()).await;
    h.server
        .ingest(&json!({"agentId": id, "callId": call_id, "type": "assigned"}))
        .await
        .unwrap();
    h.server
        .ingest(&json!({"agentId": id, "callId": call_id, "type": "answered"}))
        .await
        .unwrap();
    assert_eq!(h.server.presence(&agent).unwrap().sequence, 4);
    agent
}

fn binding(h: &Harness, agent: &AgentId, channel: &str) -> ChannelBinding {
    h.server
        .snapshot(agent)
        .unwrap()
        .binding(&ChannelId::from(channel))
        .cloned()
        .unwrap()
}

fn pbx_called(h: &Harness, operation: &str) -> bool {
    h.pbx.attempts().iter().any(|op| *op == operation)
}

#[tokio::test]
async fn test_assign_then_answer_projects_channels() {
    let h = harness();
    let agent = ready_agent(&h, "agent-a", &all_channels()).await;

    let applied = h
        .server
        .ingest(&json!({"agentId": "agent-a", "callId": "C1", "type": "assigned"}))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(applied.state().status, PresenceStatus::Queue);

    h.server
        .ingest(&json!({"agentId": "agent-a", "callId": "C1", "type": "answered", "contact": "citizen-7"}))
        .await
        .unwrap();

    let state = h.server.presence(&agent).unwrap();
    assert_eq!(state.status, PresenceStatus::InCall);
    let call = state.call.unwrap();
    assert_eq!(call.call_id, CallId::from("C1"));
    assert_eq!(call.channel, ChannelId::from("vicidial"));
    assert_eq!(call.contact.as_deref(), Some("citizen-7"));

    for chat in ["whatsapp", "telegram", "webchat"] {
        let b = binding(&h, &agent, chat);
        assert!(!b.is_available(), "{} should be unavailable", chat);
        assert_eq!(b.status.code, "away");
    }
    let email = binding(&h, &agent, "email");
    assert!(email.is_available());
    assert_eq!(email.status.code, "accepting");
    assert!(!binding(&h, &agent, "vicidial").is_available());

    assert_eq!(h.server.eligible_agents(&"email".into()).unwrap(), vec![agent.clone()]);
    assert!(h.server.eligible_agents(&"whatsapp".into()).unwrap().is_empty());
}

#[tokio::test]
async fn test_end_then_dispose_returns_to_ready() {
    let h = harness();
    let agent = agent_in_call(&h, "agent-a", "C1").await;
    let actor = ActorId::from(&agent);

    h.server
        .ingest(&json!({"agentId": "agent-a", "callId": "C1", "type": "ended"}))
        .await
        .unwrap();
    let closer = h.server.presence(&agent).unwrap();
    assert_eq!(closer.status, PresenceStatus::Closer);
    assert_eq!(closer.call.as_ref().unwrap().call_id, CallId::from("C1"));

    let state = h
        .server
        .orchestrator()
        .dispose(&agent, "resolved", None, closer.sequence, &actor)
        .await
        .unwrap();
    assert_eq!(state.status, PresenceStatus::Ready);
    assert!(state.call.is_none());

    assert_eq!(
        h.pbx.commands().last(),
        Some(&TelephonyCommand::Disposition(DispositionRequest {
            agent_id: agent.clone(),
            call_id: CallId::from("C1"),
            code: "resolved".to_string(),
            pause_after: None,
        }))
    );
    assert!(binding(&h, &agent, "whatsapp").is_available());
}

#[tokio::test]
async fn test_dispose_and_pause_is_all_or_nothing() {
    let h = harness();
    let agent = agent_in_call(&h, "agent-a", "C1").await;
    let actor = ActorId::from(&agent);
    h.server
        .ingest(&json!({"agentId": "agent-a", "callId": "C1", "type": "ended"}))
        .await
        .unwrap();
    let closer = h.server.presence(&agent).unwrap();
    let published = h.publisher.len();

    // PBX refuses the disposition: nothing recorded, presence untouched
    h.pbx.fail_next("record_disposition", "lead locked");
    let err = h
        .server
        .orchestrator()
        .dispose(&agent, "SALE", Some("break"), closer.sequence, &actor)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RemoteRejected);
    assert_eq!(h.server.presence(&agent).unwrap(), closer);
    assert!(!h
        .pbx
        .commands()
        .iter()
        .any(|c| matches!(c, TelephonyCommand::Disposition(_))));
    assert_eq!(h.publisher.len(), published);

    // Retry records both
    let state = h
        .server
        .orchestrator()
        .dispose(&agent, "SALE", Some("break"), closer.sequence, &actor)
        .await
        .unwrap();
    assert_eq!(state.status, PresenceStatus::Paused(ReasonCode::Break));
    assert!(state.call.is_none());
    match h.pbx.commands().last() {
        Some(TelephonyCommand::Disposition(request)) => {
            assert_eq!(request.code, "SALE");
            assert_eq!(request.pause_after, Some(ReasonCode::Break));
        }
        other => panic!("expected a disposition, got {:?}", other),
    }
}

#[tokio::test]
async fn test_dispose_validation_happens_before_the_pbx() {
    let h = harness();
    let agent = agent_in_call(&h, "agent-a", "C1").await;
    let actor = ActorId::from(&agent);
    let orchestrator = h.server.orchestrator();

    // Still INCALL: nothing to dispose
    let err = orchestrator.dispose(&agent, "SALE", None, 4, &actor).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidTransition);

    h.server
        .ingest(&json!({"agentId": "agent-a", "callId": "C1", "type": "ended"}))
        .await
        .unwrap();

    let err = orchestrator.dispose(&agent, "", None, 5, &actor).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidDisposition);

    let err = orchestrator.dispose(&agent, "SALE", Some("nap"), 5, &actor).await.unwrap_err();
    assert_eq!(err, PresenceError::UnknownReasonCode("nap".to_string()));

    assert!(!pbx_called(&h, "record_disposition"));
    assert_eq!(h.server.presence(&agent).unwrap().status, PresenceStatus::Closer);
}

#[tokio::test]
async fn test_pause_while_in_call_is_rejected() {
    let h = harness();
    let agent = agent_in_call(&h, "agent-a", "C1").await;
    let before = h.server.presence(&agent).unwrap();
    let published = h.publisher.len();

    let err = h
        .server
        .orchestrator()
        .pause(&agent, "lunch", before.sequence, &ActorId::from(&agent))
        .await
        .unwrap_err();
    assert!(matches!(err, PresenceError::InvalidTransition { .. }));
    assert_eq!(h.server.presence(&agent).unwrap(), before);
    assert!(!pbx_called(&h, "pause"));
    assert_eq!(h.publisher.len(), published);
}

#[tokio::test]
async fn test_pause_built_before_a_call_is_a_stale_intent() {
    let h = harness();
    let agent = ready_agent(&h, "agent-a", &all_channels()).await;

    // Desktop read sequence 2; the PBX connects a call meanwhile
    h.server
        .ingest(&json!({"agentId": "agent-a", "callId": "C1", "type": "answered"}))
        .await
        .unwrap();

    let err = h
        .server
        .orchestrator()
        .pause(&agent, "lunch", 2, &ActorId::from(&agent))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::StaleIntent);
    assert!(err.is_retryable());
    assert_eq!(h.server.presence(&agent).unwrap().status, PresenceStatus::InCall);
}

#[tokio::test]
async fn test_pause_while_queued_reaches_the_pbx() {
    let h = harness();
    let agent = ready_agent(&h, "agent-a", &all_channels()).await;
    let applied = h
        .server
        .ingest(&json!({"agentId": "agent-a", "callId": "C1", "type": "assigned"}))
        .await
        .unwrap()
        .unwrap();
    let queued = applied.into_state();
    assert_eq!(queued.status, PresenceStatus::Queue);

    let state = h
        .server
        .orchestrator()
        .pause(&agent, "lunch", queued.sequence, &ActorId::from(&agent))
        .await
        .unwrap();
    assert_eq!(state.status, PresenceStatus::Paused(ReasonCode::Lunch));
    assert!(state.call.is_none());
    assert!(pbx_called(&h, "pause"));
    assert!(!binding(&h, &agent, "whatsapp").is_available());
}

#[tokio::test]
async fn test_unknown_reason_code() {
    let h = harness();
    let agent = ready_agent(&h, "agent-a", &all_channels()).await;
    let err = h
        .server
        .orchestrator()
        .pause(&agent, "siesta", 2, &ActorId::from(&agent))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnknownReasonCode);
    assert!(!pbx_called(&h, "pause"));
}

#[tokio::test]
async fn test_rapid_pauses_with_same_sequence() {
    let h = harness();
    let agent = ready_agent(&h, "agent-a", &all_channels()).await;
    let actor = ActorId::from(&agent);
    let orchestrator = h.server.orchestrator();

    let (first, second) = tokio::join!(
        orchestrator.pause(&agent, "lunch", 2, &actor),
        orchestrator.pause(&agent, "break", 2, &actor),
    );

    let outcomes = [first, second];
    let committed: Vec<&PresenceState> = outcomes.iter().filter_map(|r| r.as_ref().ok()).collect();
    let stale: Vec<&PresenceError> = outcomes.iter().filter_map(|r| r.as_ref().err()).collect();
    assert_eq!(committed.len(), 1);
    assert_eq!(stale.len(), 1);
    assert_eq!(stale[0].kind(), ErrorKind::StaleWrite);

    let state = h.server.presence(&agent).unwrap();
    assert_eq!(state.sequence, 3);
    assert_eq!(&state, committed[0]);
}

#[tokio::test]
async fn test_sequential_stale_pause_is_rejected_before_the_pbx() {
    let h = harness();
    let agent = ready_agent(&h, "agent-a", &all_channels()).await;
    let actor = ActorId::from(&agent);
    let orchestrator = h.server.orchestrator();

    orchestrator.pause(&agent, "lunch", 2, &actor).await.unwrap();
    let err = orchestrator.pause(&agent, "break", 2, &actor).await.unwrap_err();
    assert_eq!(err, PresenceError::stale_write("agent-a", 2, 3));
    assert_eq!(h.pbx.attempts().iter().filter(|op| **op == "pause").count(), 1);
    assert_eq!(h.server.presence(&agent).unwrap().reason(), Some(ReasonCode::Lunch));
}

#[tokio::test(start_paused = true)]
async fn test_park_timeout_then_retry() {
    let h = harness();
    let agent = agent_in_call(&h, "agent-a", "C1").await;
    let actor = ActorId::from(&agent);
    let before = h.server.presence(&agent).unwrap();
    let published = h.publisher.len();

    h.pbx.delay_next("park", Duration::from_secs(30));
    let err = h
        .server
        .orchestrator()
        .park(&agent, true, before.sequence, &actor)
        .await
        .unwrap_err();
    assert!(matches!(err, PresenceError::RemoteTimeout { ref operation, after_ms: 5_000 } if operation == "park"));
    assert_eq!(h.server.presence(&agent).unwrap(), before);
    assert!(!h.pbx.is_parked(&agent));
    assert_eq!(h.publisher.len(), published);

    let state = h
        .server
        .orchestrator()
        .park(&agent, true, before.sequence, &actor)
        .await
        .unwrap();
    assert_eq!(state.status, PresenceStatus::InCall);
    assert!(state.call.as_ref().unwrap().parked);
    assert_eq!(state.sequence, before.sequence + 1);
    assert!(h.pbx.is_parked(&agent));
    assert_eq!(
        h.pbx
            .commands()
            .iter()
            .filter(|c| matches!(c, TelephonyCommand::Park { .. }))
            .count(),
        1
    );
}

#[tokio::test]
async fn test_park_refused_by_pbx_leaves_state() {
    let h = harness();
    let agent = agent_in_call(&h, "agent-a", "C1").await;
    let before = h.server.presence(&agent).unwrap();

    h.pbx.fail_next("park", "channel gone");
    let err = h
        .server
        .orchestrator()
        .park(&agent, true, before.sequence, &ActorId::from(&agent))
        .await
        .unwrap_err();
    assert_eq!(err, PresenceError::remote_rejected("park", "channel gone"));
    assert_eq!(h.server.presence(&agent).unwrap(), before);
}

#[tokio::test]
async fn test_park_twice_keeps_sequence() {
    let h = harness();
    let agent = agent_in_call(&h, "agent-a", "C1").await;
    let actor = ActorId::from(&agent);
    let orchestrator = h.server.orchestrator();

    let parked = orchestrator.park(&agent, true, 4, &actor).await.unwrap();
    let published = h.publisher.len();
    let again = orchestrator.park(&agent, true, parked.sequence, &actor).await.unwrap();
    assert_eq!(again, parked);
    assert_eq!(h.publisher.len(), published + 1);

    let retrieved = orchestrator.park(&agent, false, parked.sequence, &actor).await.unwrap();
    assert!(!retrieved.call.unwrap().parked);
    assert_eq!(retrieved.sequence, parked.sequence + 1);
}

#[tokio::test]
async fn test_transfer_to_unavailable_targets() {
    let h = harness();
    let source = agent_in_call(&h, "agent-a", "C1").await;
    let actor = ActorId::from(&source);

    // Paused target
    let paused = ready_agent(&h, "agent-paused", &all_channels()).await;
    h.server
        .orchestrator()
        .pause(&paused, "meeting", 2, &ActorId::from(&paused))
        .await
        .unwrap();

    // Ready, but only on email
    let email_only = ready_agent(&h, "agent-email", &["email".into()]).await;

    // Ready, then disabled
    let disabled = ready_agent(&h, "agent-disabled", &all_channels()).await;
    h.server.disable(&disabled, &ActorId::from("supervisor")).await.unwrap();

    let ghost = AgentId::from("agent-ghost");

    for target in [&paused, &email_only, &disabled, &ghost, &source] {
        let err = h
            .server
            .orchestrator()
            .transfer(&source, target, 4, &actor)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TargetUnavailable, "target {}", target);
    }

    assert!(!pbx_called(&h, "transfer"));
    assert_eq!(h.server.presence(&source).unwrap().status, PresenceStatus::InCall);
}

#[tokio::test]
async fn test_transfer_moves_source_to_closer() {
    let h = harness();
    let source = agent_in_call(&h, "agent-a", "C1").await;
    let target = ready_agent(&h, "agent-b", &["vicidial".into(), "email".into()]).await;
    let actor = ActorId::from(&source);

    let state = h
        .server
        .orchestrator()
        .transfer(&source, &target, 4, &actor)
        .await
        .unwrap();
    assert_eq!(state.status, PresenceStatus::Closer);
    let call = state.call.as_ref().unwrap();
    assert_eq!(call.transferred_to, Some(target.clone()));
    assert_eq!(call.call_id, CallId::from("C1"));

    // Target presence follows PBX events, not the transfer itself
    assert_eq!(h.server.presence(&target).unwrap().status, PresenceStatus::Ready);
    assert_eq!(
        h.pbx.commands().last(),
        Some(&TelephonyCommand::Transfer {
            agent_id: source.clone(),
            target_agent_id: target.clone(),
        })
    );

    let state = h
        .server
        .orchestrator()
        .dispose(&source, "XFER", None, state.sequence, &actor)
        .await
        .unwrap();
    assert_eq!(state.status, PresenceStatus::Ready);
}

#[tokio::test]
async fn test_transfer_refused_by_pbx() {
    let h = harness();
    let source = agent_in_call(&h, "agent-a", "C1").await;
    let target = ready_agent(&h, "agent-b", &all_channels()).await;

    h.pbx.fail_next("transfer", "target extension busy");
    let err = h
        .server
        .orchestrator()
        .transfer(&source, &target, 4, &ActorId::from(&source))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RemoteRejected);
    let state = h.server.presence(&source).unwrap();
    assert_eq!(state.status, PresenceStatus::InCall);
    assert_eq!(state.call.unwrap().transferred_to, None);
}

#[tokio::test]
async fn test_heartbeat_loss_discards_concurrent_intent() {
    let h = harness();
    let agent = ready_agent(&h, "agent-a", &all_channels()).await;
    let actor = ActorId::from(&agent);

    h.server
        .ingest(&json!({"agentId": "agent-a", "type": "heartbeatLost"}))
        .await
        .unwrap();
    let offline = h.server.presence(&agent).unwrap();
    assert_eq!(offline.status, PresenceStatus::Offline);
    assert_eq!(offline.sequence, 3);
    assert_eq!(offline.audit.as_ref().unwrap().actor, ActorId::telephony());
    assert!(h.server.eligible_agents(&"email".into()).unwrap().is_empty());

    let err = h.server.orchestrator().pause(&agent, "lunch", 2, &actor).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::StaleWrite);

    let state = h
        .server
        .orchestrator()
        .login(&agent, "inbound", &[], offline.sequence, &actor)
        .await
        .unwrap();
    assert_eq!(state.status, PresenceStatus::Paused(ReasonCode::Login));
}

#[tokio::test]
async fn test_sequenced_pbx_event_behind_the_store_is_rejected() {
    let h = harness();
    let agent = ready_agent(&h, "agent-a", &all_channels()).await;
    let before = h.server.presence(&agent).unwrap();
    let published = h.publisher.len();

    // PBX still believes the agent is at sequence 0
    let err = h
        .server
        .ingest(&json!({"agentId": "agent-a", "callId": "C9", "type": "assigned", "sequence": 0}))
        .await
        .unwrap_err();
    assert!(matches!(err, PresenceError::StaleWrite { expected: 0, current: 2, .. }));
    assert!(err.is_retryable());
    assert_eq!(h.server.presence(&agent).unwrap(), before);
    assert_eq!(h.publisher.len(), published);

    // Re-read and resent with the current sequence
    let applied = h
        .server
        .ingest(&json!({"agentId": "agent-a", "callId": "C9", "type": "assigned", "sequence": before.sequence}))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(applied.state().status, PresenceStatus::Queue);
    assert_eq!(applied.state().sequence, before.sequence + 1);
}

#[tokio::test(start_paused = true)]
async fn test_dispose_racing_a_pbx_event_reports_the_recorded_disposition() {
    let h = harness();
    let agent = agent_in_call(&h, "agent-a", "C1").await;
    let actor = ActorId::from(&agent);
    h.server
        .ingest(&json!({"agentId": "agent-a", "callId": "C1", "type": "ended"}))
        .await
        .unwrap();
    let closer = h.server.presence(&agent).unwrap();
    assert_eq!(closer.status, PresenceStatus::Closer);

    h.pbx.delay_next("record_disposition", Duration::from_millis(200));
    let orchestrator = h.server.orchestrator();
    let (disposed, assigned) = tokio::join!(
        orchestrator.dispose(&agent, "SALE", Some("break"), closer.sequence, &actor),
        async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            h.server
                .ingest(&json!({"agentId": "agent-a", "callId": "C2", "type": "assigned"}))
                .await
        }
    );
    assert!(assigned.unwrap().unwrap().is_moved());

    let err = disposed.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RemoteCommittedLocalStale);
    assert!(!err.is_retryable());
    match &err {
        PresenceError::RemoteCommittedLocalStale { operation, recorded, .. } => {
            assert_eq!(operation, "record_disposition");
            assert!(recorded.contains("SALE"));
            assert!(recorded.contains("C1"));
        }
        other => panic!("unexpected error {:?}", other),
    }

    // The PBX kept the disposition; presence follows the PBX event
    assert!(h
        .pbx
        .commands()
        .iter()
        .any(|c| matches!(c, TelephonyCommand::Disposition(r) if r.code == "SALE")));
    let state = h.server.presence(&agent).unwrap();
    assert_eq!(state.status, PresenceStatus::Queue);
    assert_eq!(state.sequence, closer.sequence + 1);
}

#[tokio::test]
async fn test_unrecognized_events_are_dropped() {
    let h = harness();
    let agent = ready_agent(&h, "agent-a", &all_channels()).await;
    let before = h.server.presence(&agent).unwrap();

    for raw in [
        json!({"agentId": "agent-a", "type": "ringing"}),
        json!({"agentId": "agent-a", "type": "answered"}),
        json!({"callId": "C1", "type": "answered"}),
        json!("answered"),
    ] {
        assert!(h.server.ingest(&raw).await.unwrap().is_none());
    }
    assert_eq!(h.server.presence(&agent).unwrap(), before);

    let err = h
        .server
        .ingest(&json!({"agentId": "agent-a", "callId": "C1", "type": "answered", "channel": "fax"}))
        .await
        .unwrap_err();
    assert_eq!(err, PresenceError::UnknownChannel("fax".to_string()));
}

#[tokio::test]
async fn test_event_pump_applies_pbx_stream() {
    let h = harness();
    let mut server = h.server;
    let agent = AgentId::from("agent-a");
    let actor = ActorId::from(&agent);
    server.enroll(&ActorId::from("admin"), agent.clone(), &all_channels()).unwrap();
    let state = server.orchestrator().login(&agent, "inbound", &[], 0, &actor).await.unwrap();
    server.orchestrator().unpause(&agent, state.sequence, &actor).await.unwrap();

    server.start(h.pbx.take_event_stream().unwrap()).unwrap();
    h.pbx.emit(json!({"agentId": "agent-a", "callId": "C1", "type": "assigned"}));
    h.pbx.emit(json!({"agentId": "agent-a", "type": "ringing"}));
    h.pbx.emit(json!({"agentId": "agent-a", "callId": "C1", "type": "answered"}));
    h.pbx.emit(json!({"agentId": "agent-a", "callId": "C1", "type": "ended"}));

    let mut state = server.presence(&agent).unwrap();
    for _ in 0..200 {
        if state.sequence >= 5 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
        state = server.presence(&agent).unwrap();
    }
    assert_eq!(state.status, PresenceStatus::Closer);
    assert_eq!(state.sequence, 5);
    assert!(server.heartbeat().is_tracked(&agent));

    let statuses: Vec<PresenceStatus> = h
        .publisher
        .for_agent(&agent)
        .into_iter()
        .map(|s| s.status)
        .collect();
    assert_eq!(
        statuses,
        vec![
            PresenceStatus::Paused(ReasonCode::Login),
            PresenceStatus::Ready,
            PresenceStatus::Queue,
            PresenceStatus::InCall,
            PresenceStatus::Closer,
        ]
    );

    server.stop().await;
}

#[tokio::test]
async fn test_manual_queue_is_local_only() {
    let h = harness();
    let agent = ready_agent(&h, "agent-a", &all_channels()).await;
    let actor = ActorId::from(&agent);
    let commands = h.pbx.commands().len();

    let state = h.server.orchestrator().enter_manual_queue(&agent, 2, &actor).await.unwrap();
    assert_eq!(state.status, PresenceStatus::ManualQueue);
    assert_eq!(state.interchange_code(), None);
    assert_eq!(h.pbx.commands().len(), commands);

    // Chat stays open, voice ACD does not
    assert!(binding(&h, &agent, "whatsapp").is_available());
    assert!(!binding(&h, &agent, "vicidial").is_available());

    let state = h.server.orchestrator().unpause(&agent, state.sequence, &actor).await.unwrap();
    assert_eq!(state.status, PresenceStatus::Ready);
}

#[tokio::test]
async fn test_logout() {
    let h = harness();
    let agent = ready_agent(&h, "agent-a", &all_channels()).await;
    let state = h
        .server
        .orchestrator()
        .logout(&agent, 2, &ActorId::from(&agent))
        .await
        .unwrap();
    assert_eq!(state.status, PresenceStatus::Offline);
    assert_eq!(state.interchange_code(), Some(16));
    assert!(h
        .pbx
        .commands()
        .contains(&TelephonyCommand::Logout { agent_id: agent.clone() }));
    assert!(h
        .server
        .snapshot(&agent)
        .unwrap()
        .bindings
        .iter()
        .all(|b| !b.is_available()));
}

#[tokio::test]
async fn test_agents_are_independent() {
    let h = harness();
    let ids: Vec<AgentId> = (0..20).map(|n| AgentId(format!("agent-{:02}", n))).collect();
    for id in &ids {
        h.server.enroll(&ActorId::from("admin"), id.clone(), &all_channels()).unwrap();
    }

    let server = &h.server;
    let logins = ids.iter().map(|id| async move {
        let actor = ActorId::from(id);
        let state = server.orchestrator().login(id, "inbound", &[], 0, &actor).await?;
        server.orchestrator().unpause(id, state.sequence, &actor).await
    });
    let results = futures::future::join_all(logins).await;
    assert!(results.iter().all(|r| r.is_ok()));

    assert_eq!(h.server.eligible_agents(&"whatsapp".into()).unwrap(), ids);
}

#[tokio::test]
async fn test_audit_records_the_actor() {
    let h = harness();
    let agent = ready_agent(&h, "agent-a", &all_channels()).await;
    let supervisor = ActorId::from("supervisor-7");

    let state = h.server.orchestrator().pause(&agent, "coaching", 2, &supervisor).await.unwrap();
    let audit = state.audit.unwrap();
    assert_eq!(audit.actor, supervisor);
    assert_eq!(audit.sequence, 3);
}
