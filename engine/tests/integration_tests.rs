//! Two clients over one in-memory store, driven the way two phones would be.

use std::{sync::Arc, time::Duration};

use engine::{
    BarrierPhase, EngineConfig, EngineError, EngineEvent, GameClient, IdentitySources,
    PartnerEvent, RecordingNotifier, TodPhase,
};
use serde_json::{json, Value};
use store::{MemoryStore, SharedStore, StoreConfig, StorePath};
use tokio::sync::broadcast;
use types::{
    ConversationThread, EntryKind, GameSession, GameType, PlayerId, Question, QuestionCatalog,
    SessionStatus, TodKind,
};

fn catalog() -> Arc<QuestionCatalog> {
    Arc::new(QuestionCatalog {
        quiz: (0..5)
            .map(|i| Question::choice(&format!("q{i}"), &format!("Question {i}?"), &["Yes", "No"]))
            .collect(),
        who_is_more: vec![Question::free_text("late", "Who is always late?")],
        would_you_rather: vec![Question::choice(
            "trip",
            "Beach or mountains?",
            &["Beach", "Mountains"],
        )],
        truths: vec!["Biggest fear?".to_string()],
        dares: vec!["Sing a song".to_string()],
    })
}

fn config(questions_per_game: usize) -> EngineConfig {
    EngineConfig {
        store: StoreConfig {
            max_retries: 1,
            initial_delay_ms: 1,
            ..Default::default()
        },
        questions_per_game,
        ..Default::default()
    }
}

fn client(store: &MemoryStore, id: &str, config: EngineConfig) -> GameClient {
    client_with_catalog(store, id, config, catalog())
}

fn client_with_catalog(
    store: &MemoryStore,
    id: &str,
    config: EngineConfig,
    catalog: Arc<QuestionCatalog>,
) -> GameClient {
    GameClient::new(
        PlayerId::new(id),
        id,
        Arc::new(store.clone()),
        config,
        catalog,
    )
    .with_identity(IdentitySources::paired("c1"))
}

fn session_path() -> StorePath {
    StorePath::parse("games/c1/session").unwrap()
}

fn status_writes(store: &MemoryStore, status: &str) -> usize {
    store
        .writes()
        .iter()
        .filter(|r| r.path == session_path().child("status") && r.value == Some(json!(status)))
        .count()
}

fn stored_session(store: &MemoryStore) -> GameSession {
    serde_json::from_value(store.value_at(&session_path()).expect("session stored")).unwrap()
}

fn drain(events: &mut broadcast::Receiver<EngineEvent>) -> Vec<EngineEvent> {
    let mut drained = Vec::new();
    while let Ok(event) = events.try_recv() {
        drained.push(event);
    }
    drained
}

async fn settle(a: &mut GameClient, b: &mut GameClient) {
    for _ in 0..64 {
        let handled = a.pump().await.unwrap() + b.pump().await.unwrap();
        if handled == 0 {
            return;
        }
    }
    panic!("clients never settled");
}

/// Alice creates, Bob joins, both are playing.
async fn start_game(store: &MemoryStore, game_type: GameType, config: EngineConfig) -> (GameClient, GameClient) {
    let mut alice = client(store, "alice", config.clone());
    let mut bob = client(store, "bob", config);
    start_pair(&mut alice, &mut bob, game_type).await;
    (alice, bob)
}

async fn start_pair(alice: &mut GameClient, bob: &mut GameClient, game_type: GameType) {
    alice.connect().await.unwrap();
    bob.connect().await.unwrap();
    alice.create_session(game_type, "Alice").await.unwrap();
    settle(alice, bob).await;
    bob.join_session("Bob").await.unwrap();
    settle(alice, bob).await;
}

async fn answer_both(alice: &mut GameClient, bob: &mut GameClient, a: Value, b: Value) {
    alice.submit_answer(a).await.unwrap();
    bob.submit_answer(b).await.unwrap();
    settle(alice, bob).await;
}

async fn ready_both(alice: &mut GameClient, bob: &mut GameClient) {
    alice.signal_ready_for_next().await.unwrap();
    bob.signal_ready_for_next().await.unwrap();
    settle(alice, bob).await;
}

#[tokio::test]
async fn test_create_join_and_start() {
    let store = MemoryStore::new();
    let mut alice = client(&store, "alice", config(3));
    let mut bob = client(&store, "bob", config(3));
    let mut alice_events = alice.subscribe_events();
    let mut bob_events = bob.subscribe_events();
    let invite_rx = bob.watch_invite();

    alice.connect().await.unwrap();
    bob.connect().await.unwrap();
    alice.create_session(GameType::Quiz, "Alice").await.unwrap();
    settle(&mut alice, &mut bob).await;

    let invite = bob.invite().cloned().expect("bob sees the invite");
    assert_eq!(invite.from, PlayerId::new("alice"));
    assert_eq!(invite.from_name, "Alice");
    assert_eq!(invite.game_type, GameType::Quiz);
    assert_eq!(*invite_rx.borrow(), Some(invite.clone()));

    bob.join_session("Bob").await.unwrap();
    settle(&mut alice, &mut bob).await;

    assert!(bob.invite().is_none());
    for player in [&alice, &bob] {
        assert_eq!(player.session().unwrap().status, SessionStatus::Playing);
        assert_eq!(player.barrier().unwrap().phase(), BarrierPhase::Answering);
    }
    assert_eq!(status_writes(&store, "ready"), 1);
    assert_eq!(status_writes(&store, "playing"), 1);

    let events = drain(&mut alice_events);
    assert!(events.iter().any(
        |e| matches!(e, EngineEvent::PartnerJoined { display_name, .. } if display_name == "Bob")
    ));
    assert_eq!(
        events
            .iter()
            .filter(|e| matches!(e, EngineEvent::Started { .. }))
            .count(),
        1
    );
    let events = drain(&mut bob_events);
    assert!(events
        .iter()
        .any(|e| matches!(e, EngineEvent::InviteReceived(_))));
    assert!(events.iter().any(|e| matches!(e, EngineEvent::InviteWithdrawn)));
}

#[tokio::test]
async fn test_creator_marks_ready_when_joiner_only_wrote_itself() {
    let store = MemoryStore::new();
    let mut alice = client(&store, "alice", config(3));
    alice.connect().await.unwrap();
    alice.create_session(GameType::Quiz, "Alice").await.unwrap();

    store
        .write(
            &session_path().child("players").child("bob"),
            json!({"displayName": "Bob", "ready": true, "joinedAt": "2024-01-01T00:00:00Z"}),
        )
        .await
        .unwrap();
    alice.pump().await.unwrap();
    store.redeliver(&session_path());
    alice.pump().await.unwrap();

    assert_eq!(status_writes(&store, "ready"), 1);
    assert_eq!(status_writes(&store, "playing"), 1);
    assert_eq!(alice.session().unwrap().status, SessionStatus::Playing);
}

#[tokio::test]
async fn test_quiz_plays_to_the_end() {
    let store = MemoryStore::new();
    let (mut alice, mut bob) = start_game(&store, GameType::Quiz, config(3)).await;
    let mut bob_events = bob.subscribe_events();

    for index in 0..3 {
        assert_eq!(alice.barrier().unwrap().index(), index);
        answer_both(&mut alice, &mut bob, json!("Yes"), json!("Yes")).await;
        assert_eq!(bob.barrier().unwrap().phase(), BarrierPhase::Revealed);
        ready_both(&mut alice, &mut bob).await;
    }

    for player in [&alice, &bob] {
        let barrier = player.barrier().unwrap();
        assert!(barrier.is_finished());
        // The guesser scores on every match: Bob on even questions.
        assert_eq!(barrier.score_of(&PlayerId::new("bob")), 2);
        assert_eq!(barrier.score_of(&PlayerId::new("alice")), 1);
        assert_eq!(player.session().unwrap().status, SessionStatus::Finished);
    }
    let indices: Vec<_> = store
        .writes()
        .into_iter()
        .filter(|r| r.path == session_path().child("currentQuestion"))
        .filter_map(|r| r.value.and_then(|v| v.as_u64()))
        .collect();
    assert_eq!(indices, vec![1, 2, 3]);
    assert_eq!(status_writes(&store, "finished"), 1);
    assert_eq!(stored_session(&store).current_question, 3);

    let events = drain(&mut bob_events);
    assert!(events.iter().any(
        |e| matches!(e, EngineEvent::Finished { scores, .. } if scores[&PlayerId::new("bob")] == 2)
    ));
}

#[tokio::test]
async fn test_second_answer_is_ignored() {
    let store = MemoryStore::new();
    let (mut alice, _bob) = start_game(&store, GameType::Quiz, config(3)).await;

    alice.submit_answer(json!("Yes")).await.unwrap();
    alice.submit_answer(json!("No")).await.unwrap();

    let path = session_path().child("answers").child("quiz_0").child("alice");
    assert_eq!(store.writes_to(&path), 1);
    assert_eq!(store.value_at(&path).unwrap()["value"], json!("Yes"));
}

#[tokio::test]
async fn test_redelivered_snapshots_do_not_repeat_effects() {
    let store = MemoryStore::new();
    let (mut alice, mut bob) = start_game(&store, GameType::Quiz, config(3)).await;
    let mut alice_events = alice.subscribe_events();

    answer_both(&mut alice, &mut bob, json!("No"), json!("No")).await;
    for _ in 0..3 {
        store.redeliver(&session_path());
        settle(&mut alice, &mut bob).await;
    }

    let reveals = drain(&mut alice_events)
        .into_iter()
        .filter(|e| matches!(e, EngineEvent::Revealed { .. }))
        .count();
    assert_eq!(reveals, 1);
    assert_eq!(alice.barrier().unwrap().score_of(&PlayerId::new("bob")), 1);
    assert_eq!(bob.barrier().unwrap().score_of(&PlayerId::new("bob")), 1);
    assert_eq!(status_writes(&store, "playing"), 1);
}

#[tokio::test]
async fn test_free_text_guess_is_judged_by_subject() {
    let store = MemoryStore::new();
    let free_text = Arc::new(QuestionCatalog {
        quiz: vec![Question::free_text("trip", "Dream trip?")],
        ..Default::default()
    });
    let mut alice = client_with_catalog(&store, "alice", config(1), free_text.clone());
    let mut bob = client_with_catalog(&store, "bob", config(1), free_text);
    start_pair(&mut alice, &mut bob, GameType::Quiz).await;

    answer_both(&mut alice, &mut bob, json!("Japan"), json!("Tokyo")).await;
    assert_eq!(alice.barrier().unwrap().reveal().unwrap().matched, None);

    bob.signal_ready_for_next().await.unwrap();
    assert!(matches!(
        alice.signal_ready_for_next().await,
        Err(EngineError::InvalidAction(_))
    ));
    assert!(matches!(
        bob.validate_guess(0, true).await,
        Err(EngineError::InvalidAction(_))
    ));
    assert!(matches!(
        alice.validate_guess(4, true).await,
        Err(EngineError::StaleWrite { current: 0, .. })
    ));
    assert!(store
        .value_at(&session_path().child("answers").child("validation_quiz_4"))
        .is_none());

    alice.validate_guess(0, true).await.unwrap();
    settle(&mut alice, &mut bob).await;
    for player in [&alice, &bob] {
        assert_eq!(player.barrier().unwrap().verdict(), Some(true));
        assert_eq!(player.barrier().unwrap().score_of(&PlayerId::new("bob")), 1);
    }

    alice.signal_ready_for_next().await.unwrap();
    settle(&mut alice, &mut bob).await;
    assert!(alice.barrier().unwrap().is_finished());
    assert!(bob.barrier().unwrap().is_finished());
}

#[tokio::test]
async fn test_who_is_more_counts_agreements() {
    let store = MemoryStore::new();
    let (mut alice, mut bob) = start_game(&store, GameType::WhoIsMore, config(1)).await;
    let mut events = alice.subscribe_events();

    assert!(matches!(
        alice.submit_answer(json!("carol")).await,
        Err(EngineError::InvalidAction(_))
    ));
    answer_both(&mut alice, &mut bob, json!("bob"), json!("bob")).await;
    ready_both(&mut alice, &mut bob).await;

    assert_eq!(alice.barrier().unwrap().agreements(), 1);
    assert_eq!(bob.barrier().unwrap().agreements(), 1);
    assert!(drain(&mut events)
        .iter()
        .any(|e| matches!(e, EngineEvent::Finished { agreements: 1, .. })));
}

#[tokio::test]
async fn test_would_you_rather_disagreement() {
    let store = MemoryStore::new();
    let (mut alice, mut bob) = start_game(&store, GameType::WouldYouRather, config(1)).await;

    answer_both(&mut alice, &mut bob, json!("Beach"), json!("Mountains")).await;
    let reveal = bob.barrier().unwrap().reveal().unwrap().clone();
    assert_eq!(reveal.mine, json!("Mountains"));
    assert_eq!(reveal.partner, json!("Beach"));
    assert_eq!(reveal.matched, Some(false));
    assert_eq!(bob.barrier().unwrap().agreements(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_truth_or_dare_rounds_alternate() {
    let store = MemoryStore::new();
    let (mut alice, mut bob) = start_game(&store, GameType::TruthOrDare, config(10)).await;
    let thread_rx = bob.watch_thread();

    assert!(alice.conversation().unwrap().is_my_turn_to_ask());
    assert_eq!(bob.conversation().unwrap().phase(), TodPhase::WaitQuestion);

    alice.choose_type(TodKind::Truth).await.unwrap();
    let prompt = alice.classic_prompt().expect("classic prompt");
    alice.ask_question(&prompt).await.unwrap();
    settle(&mut alice, &mut bob).await;
    assert_eq!(bob.conversation().unwrap().phase(), TodPhase::Answer);
    assert_eq!(bob.conversation().unwrap().question().unwrap().text, "Biggest fear?");

    bob.respond("Spiders").await.unwrap();
    settle(&mut alice, &mut bob).await;
    alice.react("😂").await.unwrap();
    settle(&mut alice, &mut bob).await;

    assert_eq!(alice.conversation().unwrap().round(), 1);
    assert_eq!(bob.conversation().unwrap().round(), 0);
    assert!(bob.next_deadline().is_some());

    tokio::time::advance(Duration::from_millis(1500)).await;
    settle(&mut alice, &mut bob).await;
    let conversation = bob.conversation().unwrap();
    assert_eq!(conversation.round(), 1);
    assert!(conversation.is_my_turn_to_ask());
    assert!(bob.next_deadline().is_none());

    let replayed = ConversationThread::replay(&stored_session(&store));
    assert_eq!(alice.conversation().unwrap().thread(), &replayed);
    assert_eq!(bob.conversation().unwrap().thread(), &replayed);
    assert_eq!(thread_rx.borrow().len(), 4);
    assert!(matches!(
        &replayed.entries()[2].kind,
        EntryKind::Response { reaction: Some(emoji), .. } if emoji == "😂"
    ));
}

#[tokio::test(start_paused = true)]
async fn test_skipped_dare_and_redelivery_keep_thread_stable() {
    let store = MemoryStore::new();
    let (mut alice, mut bob) = start_game(&store, GameType::TruthOrDare, config(10)).await;

    alice.choose_type(TodKind::Dare).await.unwrap();
    alice.ask_question("Sing a song").await.unwrap();
    settle(&mut alice, &mut bob).await;
    bob.skip_dare().await.unwrap();
    settle(&mut alice, &mut bob).await;

    let before = alice.conversation().unwrap().thread().clone();
    assert!(matches!(
        before.last().map(|e| &e.kind),
        Some(EntryKind::Response { skipped: true, .. })
    ));
    store.redeliver(&session_path());
    settle(&mut alice, &mut bob).await;
    assert_eq!(alice.conversation().unwrap().thread(), &before);
    assert!(matches!(
        bob.respond("fine").await,
        Err(EngineError::InvalidAction(_))
    ));
}

#[tokio::test]
async fn test_custom_mode_shares_choice_before_question() {
    let store = MemoryStore::new();
    let (mut alice, mut bob) = start_game(&store, GameType::TruthOrDare, config(10)).await;

    alice.select_mode(types::TodMode::Custom).unwrap();
    alice.choose_type(TodKind::Truth).await.unwrap();
    settle(&mut alice, &mut bob).await;

    assert!(store
        .value_at(&session_path().child("answers").child("tod_choice_0"))
        .is_some());
    assert_eq!(bob.conversation().unwrap().choice(), Some(TodKind::Truth));
    assert_eq!(bob.conversation().unwrap().thread().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_failed_write_is_parked_and_resent() {
    let store = MemoryStore::new();
    let (mut alice, mut bob) = start_game(&store, GameType::Quiz, config(3)).await;

    store.set_offline(true);
    assert!(matches!(
        alice.submit_answer(json!("Yes")).await,
        Err(EngineError::StoreUnavailable(_))
    ));
    assert_eq!(alice.pending_writes(), 1);
    assert_eq!(
        alice.barrier().unwrap().phase(),
        BarrierPhase::WaitingForPartner
    );

    store.set_offline(false);
    settle(&mut alice, &mut bob).await;
    assert_eq!(alice.pending_writes(), 0);
    assert!(store
        .value_at(&session_path().child("answers").child("quiz_0").child("alice"))
        .is_some());
}

#[tokio::test(start_paused = true)]
async fn test_create_while_offline_is_store_unavailable() {
    let store = MemoryStore::new();
    let mut alice = client(&store, "alice", config(3));
    store.set_offline(true);

    let err = alice
        .create_session(GameType::Quiz, "Alice")
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::StoreUnavailable(_)));
    assert_eq!(
        err.user_message(),
        "We couldn't reach the server. Check your connection and try again."
    );
    assert!(alice.session().is_none());
}

#[tokio::test]
async fn test_unpaired_client_cannot_create() {
    let store = MemoryStore::new();
    let mut loner = GameClient::new(
        PlayerId::new("solo"),
        "Solo",
        Arc::new(store.clone()),
        config(3),
        catalog(),
    );
    assert!(matches!(
        loner.create_session(GameType::Quiz, "Solo").await,
        Err(EngineError::NotPaired)
    ));
    assert!(loner.end_session().await.is_ok());
    assert!(store.writes().is_empty());
}

#[tokio::test]
async fn test_join_without_session() {
    let store = MemoryStore::new();
    let mut bob = client(&store, "bob", config(3));
    assert!(matches!(
        bob.join_session("Bob").await,
        Err(EngineError::NoSessionFound)
    ));
}

#[tokio::test]
async fn test_join_is_idempotent_and_third_player_rejected() {
    let store = MemoryStore::new();
    let (_alice, mut bob) = start_game(&store, GameType::Quiz, config(3)).await;

    bob.join_session("Bob").await.unwrap();
    assert_eq!(stored_session(&store).players.len(), 2);
    assert_eq!(
        store.writes_to(&session_path().child("players").child("bob")),
        1
    );

    let mut carol = client(&store, "carol", config(3));
    assert!(matches!(
        carol.join_session("Carol").await,
        Err(EngineError::SessionFull)
    ));
    assert_eq!(stored_session(&store).players.len(), 2);
}

#[tokio::test]
async fn test_end_session_reaches_partner() {
    let store = MemoryStore::new();
    let (mut alice, mut bob) = start_game(&store, GameType::Quiz, config(3)).await;
    let mut bob_events = bob.subscribe_events();

    alice.end_session().await.unwrap();
    settle(&mut alice, &mut bob).await;

    assert!(store.value_at(&session_path()).is_none());
    assert!(bob.session().is_none());
    assert!(bob.engine().is_none());
    assert!(drain(&mut bob_events)
        .iter()
        .any(|e| matches!(e, EngineEvent::SessionEnded)));

    alice.end_session().await.unwrap();
}

#[tokio::test]
async fn test_end_before_joiner_sees_any_snapshot() {
    let store = MemoryStore::new();
    let mut alice = client(&store, "alice", config(3));
    let mut bob = client(&store, "bob", config(3));
    let mut bob_events = bob.subscribe_events();
    alice.connect().await.unwrap();
    bob.connect().await.unwrap();
    alice.create_session(GameType::Quiz, "Alice").await.unwrap();

    bob.join_session("Bob").await.unwrap();
    assert_eq!(bob.session().unwrap().status, SessionStatus::Ready);
    alice.pump().await.unwrap();
    alice.end_session().await.unwrap();
    for _ in 0..5 {
        bob.pump().await.unwrap();
    }
    settle(&mut alice, &mut bob).await;

    assert!(store.value_at(&session_path()).is_none());
    assert!(bob.session().is_none());
    assert!(bob.engine().is_none());
    assert!(drain(&mut bob_events)
        .iter()
        .any(|e| matches!(e, EngineEvent::SessionEnded)));
}

#[tokio::test]
async fn test_answer_landing_after_end_is_ignored() {
    let store = MemoryStore::new();
    let (mut alice, mut bob) = start_game(&store, GameType::Quiz, config(3)).await;
    let mut bob_events = bob.subscribe_events();

    alice.end_session().await.unwrap();
    bob.submit_answer(json!("Yes")).await.unwrap();
    let remnant = store.value_at(&session_path()).expect("answer recreated the node");
    assert!(remnant.get("sessionId").is_none());

    settle(&mut alice, &mut bob).await;
    assert!(alice.session().is_none());
    assert!(bob.session().is_none());
    assert!(bob.engine().is_none());
    assert!(drain(&mut bob_events)
        .iter()
        .any(|e| matches!(e, EngineEvent::SessionEnded)));
    assert!(matches!(
        bob.join_session("Bob").await,
        Err(EngineError::NoSessionFound)
    ));

    let session_id = alice.create_session(GameType::Quiz, "Alice").await.unwrap();
    settle(&mut alice, &mut bob).await;
    assert_eq!(stored_session(&store).session_id, session_id);
    assert!(stored_session(&store).answers.is_empty());
    assert_eq!(bob.invite().unwrap().game_type, GameType::Quiz);
}

#[tokio::test]
async fn test_recreated_session_resets_partner_state() {
    let store = MemoryStore::new();
    let (mut alice, mut bob) = start_game(&store, GameType::Quiz, config(3)).await;
    let first = alice.session().unwrap().session_id;
    answer_both(&mut alice, &mut bob, json!("Yes"), json!("Yes")).await;

    let second = alice
        .create_session(GameType::WhoIsMore, "Alice")
        .await
        .unwrap();
    settle(&mut alice, &mut bob).await;

    assert_ne!(first, second);
    assert_eq!(bob.session().unwrap().session_id, second);
    assert_eq!(bob.invite().unwrap().session_id, second);
    assert!(bob.engine().is_none());
    assert!(bob.ledger().is_empty());

    bob.join_session("Bob").await.unwrap();
    settle(&mut alice, &mut bob).await;
    assert_eq!(bob.barrier().unwrap().game_type(), GameType::WhoIsMore);
    assert_eq!(bob.barrier().unwrap().index(), 0);
}

#[tokio::test]
async fn test_identity_change_replaces_listener() {
    let store = MemoryStore::new();
    let mut alice = client(&store, "alice", config(3));
    alice.create_session(GameType::Quiz, "Alice").await.unwrap();
    assert_eq!(store.subscriber_count(), 1);

    alice
        .set_identity(IdentitySources::paired("c2"))
        .await
        .unwrap();
    assert_eq!(store.subscriber_count(), 1);
    assert_eq!(alice.couple_id().unwrap().as_str(), "c2");
    assert!(alice.session().is_none());

    assert!(matches!(
        alice.set_identity(IdentitySources::default()).await,
        Err(EngineError::NotPaired)
    ));
    assert!(!alice.is_listening());
    assert_eq!(store.subscriber_count(), 0);
}

#[tokio::test]
async fn test_partner_notified_of_new_session_even_if_push_fails() {
    let store = MemoryStore::new();
    let notifier = Arc::new(RecordingNotifier::failing());
    let mut alice = client(&store, "alice", config(3)).with_notifier(notifier.clone());

    alice.create_session(GameType::Quiz, "Alice").await.unwrap();

    let events = notifier.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].0.as_str(), "c1");
    assert!(matches!(
        &events[0].1,
        PartnerEvent::SessionCreated { game_type: GameType::Quiz, from_name, .. } if from_name == "Alice"
    ));
}

#[tokio::test]
async fn test_session_view_is_published() {
    let store = MemoryStore::new();
    let (alice, _bob) = start_game(&store, GameType::Quiz, config(3)).await;
    let session_rx = alice.watch_session();
    let view = session_rx.borrow().clone().expect("published session");
    assert_eq!(view.status, SessionStatus::Playing);
    assert_eq!(view.players.len(), 2);
}

#[tokio::test]
async fn test_reveal_is_independent_of_answer_order() {
    let store = MemoryStore::new();
    let (mut alice, mut bob) = start_game(&store, GameType::Quiz, config(3)).await;
    let mut alice_events = alice.subscribe_events();
    let mut bob_events = bob.subscribe_events();

    bob.submit_answer(json!("No")).await.unwrap();
    settle(&mut alice, &mut bob).await;
    assert_eq!(bob.barrier().unwrap().phase(), BarrierPhase::WaitingForPartner);
    assert_eq!(alice.barrier().unwrap().phase(), BarrierPhase::Answering);

    alice.submit_answer(json!("Yes")).await.unwrap();
    store.redeliver(&session_path());
    settle(&mut alice, &mut bob).await;

    for events in [&mut alice_events, &mut bob_events] {
        let reveals: Vec<_> = drain(events)
            .into_iter()
            .filter_map(|e| match e {
                EngineEvent::Revealed { index, matched, .. } => Some((index, matched)),
                _ => None,
            })
            .collect();
        assert_eq!(reveals, vec![(0, Some(false))]);
    }
    assert_eq!(alice.barrier().unwrap().score_of(&PlayerId::new("bob")), 0);
}

#[tokio::test]
async fn test_incorrect_verdict_awards_nothing() {
    let store = MemoryStore::new();
    let free_text = Arc::new(QuestionCatalog {
        quiz: vec![Question::free_text("food", "Comfort food?")],
        ..Default::default()
    });
    let mut alice = client_with_catalog(&store, "alice", config(1), free_text.clone());
    let mut bob = client_with_catalog(&store, "bob", config(1), free_text);
    start_pair(&mut alice, &mut bob, GameType::Quiz).await;
    let mut bob_events = bob.subscribe_events();

    answer_both(&mut alice, &mut bob, json!("Ramen"), json!("Pizza")).await;
    alice.validate_guess(0, false).await.unwrap();
    settle(&mut alice, &mut bob).await;

    let bob_barrier = bob.barrier().unwrap();
    assert_eq!(bob_barrier.verdict(), Some(false));
    assert_eq!(bob_barrier.reveal().unwrap().matched, Some(false));
    assert_eq!(bob_barrier.score_of(&PlayerId::new("bob")), 0);
    let events = drain(&mut bob_events);
    assert!(events
        .iter()
        .any(|e| matches!(e, EngineEvent::GuessValidated { index: 0, correct: false })));
    assert!(!events
        .iter()
        .any(|e| matches!(e, EngineEvent::PointAwarded { .. })));
}

#[tokio::test]
async fn test_creating_twice_leaves_the_second_session() {
    let store = MemoryStore::new();
    let mut alice = client(&store, "alice", config(3));

    let first = alice.create_session(GameType::Quiz, "Alice").await.unwrap();
    let second = alice.create_session(GameType::Quiz, "Alice").await.unwrap();

    assert_ne!(first, second);
    let stored = stored_session(&store);
    assert_eq!(stored.session_id, second);
    assert_eq!(stored.created_by, PlayerId::new("alice"));
    assert_eq!(stored.players.len(), 1);
    assert_eq!(alice.session().unwrap().session_id, second);
}

#[tokio::test]
async fn test_ending_withdraws_pending_invite() {
    let store = MemoryStore::new();
    let mut alice = client(&store, "alice", config(3));
    let mut bob = client(&store, "bob", config(3));
    alice.connect().await.unwrap();
    bob.connect().await.unwrap();
    alice.create_session(GameType::WouldYouRather, "Alice").await.unwrap();
    settle(&mut alice, &mut bob).await;
    assert!(bob.invite().is_some());
    let mut bob_events = bob.subscribe_events();

    alice.end_session().await.unwrap();
    settle(&mut alice, &mut bob).await;

    assert!(alice.invite().is_none());
    assert!(bob.invite().is_none());
    assert!(bob.watch_invite().borrow().is_none());
    assert!(drain(&mut bob_events)
        .iter()
        .any(|e| matches!(e, EngineEvent::InviteWithdrawn)));
}
