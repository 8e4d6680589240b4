use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use services::{
    DeckProvider, DeckUpdate, OfflineProvider, RemoteError, RemoteSessionId, StatisticsEngine,
    StudyEventKind, StudyLoopService,
};
use storage::PersistentStore;
use study_core::model::{
    Card, CardId, CardKind, Deck, DeckId, Difficulty, SessionData,
};
use study_core::study::StudyState;
use study_core::time::{fixed_clock, fixed_now};

fn deck(cards: usize) -> Deck {
    let cards = (0..cards)
        .map(|i| {
            Card::new(
                CardId::new(format!("card_{i}")),
                CardKind::ShortAnswer,
                format!("Q{i}"),
                Vec::new(),
                None,
                format!("A{i}"),
            )
            .unwrap()
        })
        .collect();
    Deck::new(DeckId::new("deck_smoke"), "Smoke Deck", cards, fixed_now()).unwrap()
}

#[derive(Default)]
struct RecordingProvider {
    calls: Mutex<Vec<String>>,
}

impl RecordingProvider {
    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn push(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl DeckProvider for RecordingProvider {
    async fn fetch_decks(&self) -> Result<Vec<Deck>, RemoteError> {
        Ok(Vec::new())
    }

    async fn fetch_deck(&self, _id: &DeckId) -> Result<Deck, RemoteError> {
        Err(RemoteError::Disabled)
    }

    async fn update_deck(&self, id: &DeckId, update: &DeckUpdate) -> Result<(), RemoteError> {
        self.push(format!("update {id} {}", update.progress));
        Ok(())
    }

    async fn generate_deck(&self, _notes: &str) -> Result<Deck, RemoteError> {
        Err(RemoteError::Disabled)
    }

    async fn start_session(&self, deck_id: &DeckId) -> Result<RemoteSessionId, RemoteError> {
        let mut calls = self.calls.lock().unwrap();
        let started = calls.iter().filter(|call| call.starts_with("start")).count();
        calls.push(format!("start {deck_id}"));
        Ok(RemoteSessionId::new((7 + started).to_string()))
    }

    async fn complete_session(
        &self,
        session: &RemoteSessionId,
        data: &SessionData,
    ) -> Result<(), RemoteError> {
        self.push(format!(
            "complete {session} {} {}",
            data.cards_studied, data.cards_correct
        ));
        Ok(())
    }

    async fn record_card_study(
        &self,
        card_id: &CardId,
        difficulty: Difficulty,
    ) -> Result<(), RemoteError> {
        self.push(format!("study {card_id} {}", difficulty.as_str()));
        Ok(())
    }
}

fn service(store: &PersistentStore, remote: Arc<dyn DeckProvider>) -> StudyLoopService {
    let stats = StatisticsEngine::new(fixed_clock(), store.clone());
    StudyLoopService::new(fixed_clock(), store.clone(), remote, stats)
        .with_advance_delay(Duration::ZERO)
}

#[tokio::test]
async fn rating_every_card_completes_and_records_statistics() {
    let store = PersistentStore::in_memory(fixed_clock());
    let remote = Arc::new(RecordingProvider::default());
    let loop_svc = service(&store, remote.clone());

    let mut ctx = loop_svc.start(deck(3)).await;
    assert_eq!(ctx.state(), StudyState::Showing(0));
    assert_eq!(ctx.remote_session().map(RemoteSessionId::as_str), Some("7"));

    let first = loop_svc.rate(&mut ctx, Difficulty::Easy).await.unwrap();
    assert_eq!(first.state, StudyState::Showing(1));
    loop_svc.rate(&mut ctx, Difficulty::Medium).await.unwrap();
    let last = loop_svc.rate(&mut ctx, Difficulty::Hard).await.unwrap();

    assert_eq!(last.state, StudyState::Completed);
    let report = last.completion.expect("completion report");
    assert_eq!(report.summary.accuracy, 67);
    assert_eq!(report.summary.rated_cards, 3);
    assert!(report.recorded.is_persisted());
    assert_eq!(report.recorded.profile.study_sessions, 1);
    assert_eq!(report.recorded.profile.total_cards, 3);

    let stored = store.deck_by_id(ctx.deck_id()).await.unwrap();
    assert_eq!(stored.progress(), 100.0);
    assert_eq!(stored.completions(), 1);
    assert_eq!(stored.last_studied(), Some(fixed_now()));
    assert_eq!(store.session_history().await.len(), 1);

    assert_eq!(
        remote.calls(),
        vec![
            "start deck_smoke".to_string(),
            "study card_0 easy".to_string(),
            "study card_1 medium".to_string(),
            "study card_2 hard".to_string(),
            "complete 7 3 1".to_string(),
            "update deck_smoke 100".to_string(),
        ]
    );
}

#[tokio::test]
async fn offline_remote_does_not_block_the_loop() {
    let store = PersistentStore::in_memory(fixed_clock());
    let loop_svc = service(&store, Arc::new(OfflineProvider));

    let mut ctx = loop_svc.start(deck(1)).await;
    assert!(ctx.remote_session().is_none());

    let outcome = loop_svc.rate(&mut ctx, Difficulty::Easy).await.unwrap();
    assert_eq!(outcome.state, StudyState::Completed);
    assert_eq!(store.profile().await.study_sessions, 1);
}

#[tokio::test]
async fn navigation_persists_progress() {
    let store = PersistentStore::in_memory(fixed_clock());
    let loop_svc = service(&store, Arc::new(OfflineProvider));

    let mut ctx = loop_svc.start(deck(4)).await;
    let id = ctx.deck_id().clone();
    assert_eq!(store.deck_by_id(&id).await.unwrap().progress(), 25.0);

    loop_svc.toggle_flip(&mut ctx).await.unwrap();
    assert_eq!(ctx.state(), StudyState::Flipped(0));

    loop_svc.next(&mut ctx).await.unwrap();
    loop_svc.next(&mut ctx).await.unwrap();
    assert_eq!(store.deck_by_id(&id).await.unwrap().progress(), 75.0);

    loop_svc.previous(&mut ctx).await.unwrap();
    assert_eq!(ctx.state(), StudyState::Showing(1));
    assert_eq!(store.deck_by_id(&id).await.unwrap().progress(), 50.0);
}

#[tokio::test]
async fn transitions_after_completion_are_rejected_until_restart() {
    let store = PersistentStore::in_memory(fixed_clock());
    let loop_svc = service(&store, Arc::new(OfflineProvider));

    let mut ctx = loop_svc.start(deck(1)).await;
    loop_svc.rate(&mut ctx, Difficulty::Hard).await.unwrap();
    assert!(loop_svc.next(&mut ctx).await.is_err());
    assert!(loop_svc.toggle_flip(&mut ctx).await.is_err());

    let restarted = loop_svc.restart(&mut ctx).await.unwrap();
    assert_eq!(restarted.state, StudyState::Showing(0));
    let stored = store.deck_by_id(ctx.deck_id()).await.unwrap();
    assert_eq!(stored.progress(), 0.0);
    assert!(stored.cards().iter().all(|card| !card.is_rated()));
}

#[tokio::test]
async fn restarting_a_completed_pass_opens_a_new_remote_session() {
    let store = PersistentStore::in_memory(fixed_clock());
    let remote = Arc::new(RecordingProvider::default());
    let loop_svc = service(&store, remote.clone());

    let mut ctx = loop_svc.start(deck(2)).await;
    loop_svc.rate(&mut ctx, Difficulty::Easy).await.unwrap();
    loop_svc.restart(&mut ctx).await.unwrap();
    assert_eq!(ctx.remote_session().map(RemoteSessionId::as_str), Some("7"));

    loop_svc.rate(&mut ctx, Difficulty::Easy).await.unwrap();
    loop_svc.rate(&mut ctx, Difficulty::Hard).await.unwrap();
    loop_svc.restart(&mut ctx).await.unwrap();
    assert_eq!(ctx.remote_session().map(RemoteSessionId::as_str), Some("8"));

    loop_svc.rate(&mut ctx, Difficulty::Medium).await.unwrap();
    loop_svc.rate(&mut ctx, Difficulty::Medium).await.unwrap();

    let closed: Vec<_> = remote
        .calls()
        .into_iter()
        .filter(|call| call.starts_with("start") || call.starts_with("complete"))
        .collect();
    assert_eq!(
        closed,
        vec![
            "start deck_smoke".to_string(),
            "complete 7 2 1".to_string(),
            "start deck_smoke".to_string(),
            "complete 8 2 1".to_string(),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn rating_waits_for_the_advance_delay() {
    let store = PersistentStore::in_memory(fixed_clock());
    let stats = StatisticsEngine::new(fixed_clock(), store.clone());
    let loop_svc = StudyLoopService::new(
        fixed_clock(),
        store.clone(),
        Arc::new(OfflineProvider),
        stats,
    );
    assert_eq!(loop_svc.advance_delay(), Duration::from_millis(500));

    let mut ctx = loop_svc.start(deck(2)).await;
    let before = tokio::time::Instant::now();
    let outcome = loop_svc.rate(&mut ctx, Difficulty::Easy).await.unwrap();
    assert!(before.elapsed() >= Duration::from_millis(500));
    assert_eq!(outcome.state, StudyState::Showing(1));

    let stored = store.deck_by_id(ctx.deck_id()).await.unwrap();
    assert_eq!(stored.card(0).unwrap().difficulty(), Some(Difficulty::Easy));
}

#[tokio::test]
async fn subscribers_see_each_transition() {
    let store = PersistentStore::in_memory(fixed_clock());
    let loop_svc = service(&store, Arc::new(OfflineProvider));
    let mut events = loop_svc.subscribe();

    let mut ctx = loop_svc.start(deck(1)).await;
    loop_svc.toggle_flip(&mut ctx).await.unwrap();
    loop_svc.rate(&mut ctx, Difficulty::Easy).await.unwrap();

    let kinds: Vec<_> = std::iter::from_fn(|| events.try_recv().ok())
        .map(|event| event.kind)
        .collect();
    assert_eq!(kinds.len(), 4);
    assert_eq!(kinds[0], StudyEventKind::Loaded);
    assert_eq!(kinds[1], StudyEventKind::Flipped);
    assert_eq!(kinds[2], StudyEventKind::Rated(Difficulty::Easy));
    assert!(matches!(kinds[3], StudyEventKind::Completed(summary) if summary.accuracy == 100));
}
