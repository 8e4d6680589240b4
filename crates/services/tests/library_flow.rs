use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Duration;
use reqwest::StatusCode;
use services::{
    DeckLibraryService, DeckProvider, DeckUpdate, LibraryError, OfflineProvider, RemoteError,
    RemoteSessionId, StatisticsEngine,
};
use storage::PersistentStore;
use study_core::model::{Card, CardId, CardKind, Deck, DeckId, Difficulty, SessionData};
use study_core::time::{fixed_clock, fixed_now};

fn deck(id: &str, days_old: i64) -> Deck {
    let card = Card::new(
        CardId::new(format!("{id}_card")),
        CardKind::TrueFalse,
        "The sky is blue",
        vec!["True".to_string(), "False".to_string()],
        Some(0),
        "",
    )
    .unwrap();
    Deck::new(
        DeckId::new(id),
        format!("Deck {id}"),
        vec![card],
        fixed_now() - Duration::days(days_old),
    )
    .unwrap()
}

/// Remote that serves a fixed deck list, or fails every call when `down`.
struct FakeRemote {
    decks: Vec<Deck>,
    down: bool,
    notes_seen: Mutex<Vec<String>>,
}

impl FakeRemote {
    fn serving(decks: Vec<Deck>) -> Self {
        Self {
            decks,
            down: false,
            notes_seen: Mutex::new(Vec::new()),
        }
    }

    fn down() -> Self {
        Self {
            down: true,
            ..Self::serving(Vec::new())
        }
    }

    fn check(&self) -> Result<(), RemoteError> {
        if self.down {
            return Err(RemoteError::Status {
                status: StatusCode::BAD_GATEWAY,
                message: "upstream unavailable".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl DeckProvider for FakeRemote {
    async fn fetch_decks(&self) -> Result<Vec<Deck>, RemoteError> {
        self.check()?;
        Ok(self.decks.clone())
    }

    async fn fetch_deck(&self, id: &DeckId) -> Result<Deck, RemoteError> {
        self.check()?;
        self.decks
            .iter()
            .find(|deck| deck.id() == id)
            .cloned()
            .ok_or_else(|| RemoteError::Status {
                status: StatusCode::NOT_FOUND,
                message: "Deck not found".to_string(),
            })
    }

    async fn update_deck(&self, _id: &DeckId, _update: &DeckUpdate) -> Result<(), RemoteError> {
        self.check()
    }

    async fn generate_deck(&self, notes: &str) -> Result<Deck, RemoteError> {
        self.check()?;
        self.notes_seen.lock().unwrap().push(notes.to_string());
        Ok(deck("generated", 0))
    }

    async fn start_session(&self, _deck_id: &DeckId) -> Result<RemoteSessionId, RemoteError> {
        self.check()?;
        Ok(RemoteSessionId::new("1"))
    }

    async fn complete_session(
        &self,
        _session: &RemoteSessionId,
        _data: &SessionData,
    ) -> Result<(), RemoteError> {
        self.check()
    }

    async fn record_card_study(
        &self,
        _card_id: &CardId,
        _difficulty: Difficulty,
    ) -> Result<(), RemoteError> {
        self.check()
    }
}

fn library(store: &PersistentStore, remote: Arc<dyn DeckProvider>) -> DeckLibraryService {
    let stats = StatisticsEngine::new(fixed_clock(), store.clone());
    DeckLibraryService::new(store.clone(), remote, stats)
}

#[tokio::test]
async fn listing_merges_remote_and_local_newest_first() {
    let store = PersistentStore::in_memory(fixed_clock());
    store.save_deck(&deck("local_only", 1)).await.unwrap();
    store.save_deck(&deck("shared", 5)).await.unwrap();

    let remote = FakeRemote::serving(vec![deck("shared", 5), deck("remote_only", 3)]);
    let listing = library(&store, Arc::new(remote)).list_decks().await;

    assert!(listing.remote_available);
    let ids: Vec<_> = listing.decks.iter().map(|deck| deck.id().as_str()).collect();
    assert_eq!(ids, vec!["local_only", "remote_only", "shared"]);
}

#[tokio::test]
async fn failing_remote_falls_back_to_local_decks() {
    let store = PersistentStore::in_memory(fixed_clock());
    store.save_deck(&deck("local_only", 1)).await.unwrap();

    let listing = library(&store, Arc::new(FakeRemote::down())).list_decks().await;

    assert!(!listing.remote_available);
    assert_eq!(listing.decks.len(), 1);
}

#[tokio::test]
async fn opening_a_remote_deck_caches_it_locally() {
    let store = PersistentStore::in_memory(fixed_clock());
    let remote = FakeRemote::serving(vec![deck("remote_only", 2)]);
    let library = library(&store, Arc::new(remote));

    let id = DeckId::new("remote_only");
    let opened = library.open_deck(&id).await.unwrap();
    assert_eq!(opened.title(), "Deck remote_only");
    assert_eq!(store.deck_by_id(&id).await, Some(opened));

    let missing = library.open_deck(&DeckId::new("nope")).await.unwrap_err();
    assert!(matches!(missing, LibraryError::NotFound));
}

#[tokio::test]
async fn opening_prefers_the_remote_copy_on_id_collision() {
    let store = PersistentStore::in_memory(fixed_clock());
    let stale = Deck::from_persisted(
        DeckId::new("a"),
        "stale",
        deck("a", 1).cards().to_vec(),
        fixed_now(),
        None,
        0.0,
        0,
    )
    .unwrap();
    store.save_deck(&stale).await.unwrap();
    let fresh = Deck::from_persisted(
        DeckId::new("a"),
        "remote",
        deck("a", 1).cards().to_vec(),
        fixed_now(),
        None,
        40.0,
        2,
    )
    .unwrap();
    let library = library(&store, Arc::new(FakeRemote::serving(vec![fresh])));

    let listed = library.list_decks().await;
    let opened = library.open_deck(&DeckId::new("a")).await.unwrap();
    assert_eq!(listed.decks[0].title(), "remote");
    assert_eq!(opened.title(), "remote");
    assert_eq!(opened.completions(), 2);
    assert_eq!(store.deck_by_id(&DeckId::new("a")).await.unwrap().title(), "remote");
}

#[tokio::test]
async fn opening_falls_back_to_local_copy_when_remote_fails() {
    let store = PersistentStore::in_memory(fixed_clock());
    store.save_deck(&deck("local_only", 1)).await.unwrap();
    let library = library(&store, Arc::new(FakeRemote::down()));

    let opened = library.open_deck(&DeckId::new("local_only")).await.unwrap();
    assert_eq!(opened.title(), "Deck local_only");

    let err = library.open_deck(&DeckId::new("absent")).await.unwrap_err();
    assert!(matches!(err, LibraryError::Remote(RemoteError::Status { .. })));
}

#[tokio::test]
async fn local_deck_missing_remotely_still_opens() {
    let store = PersistentStore::in_memory(fixed_clock());
    store.save_deck(&deck("mine", 1)).await.unwrap();
    let library = library(&store, Arc::new(FakeRemote::serving(Vec::new())));

    let opened = library.open_deck(&DeckId::new("mine")).await.unwrap();
    assert_eq!(opened.id().as_str(), "mine");
}

#[tokio::test]
async fn opening_without_remote_reports_not_found() {
    let store = PersistentStore::in_memory(fixed_clock());
    let library = library(&store, Arc::new(OfflineProvider));

    let err = library.open_deck(&DeckId::new("absent")).await.unwrap_err();
    assert!(matches!(err, LibraryError::NotFound));
}

#[tokio::test]
async fn generation_saves_deck_and_counts_it() {
    let store = PersistentStore::in_memory(fixed_clock());
    let remote = Arc::new(FakeRemote::serving(Vec::new()));
    let library = library(&store, remote.clone());

    let notes = format!("  {}  ", "photosynthesis ".repeat(10));
    let deck = library.generate_deck(&notes).await.unwrap();

    assert_eq!(deck.id().as_str(), "generated");
    assert!(store.deck_by_id(deck.id()).await.is_some());
    assert_eq!(store.profile().await.total_decks, 1);
    assert_eq!(
        remote.notes_seen.lock().unwrap().as_slice(),
        [notes.trim().to_string()]
    );
}

#[tokio::test]
async fn short_notes_never_reach_the_remote() {
    let store = PersistentStore::in_memory(fixed_clock());
    let remote = Arc::new(FakeRemote::serving(Vec::new()));
    let library = library(&store, remote.clone());

    let err = library.generate_deck("too short").await.unwrap_err();
    assert!(matches!(err, LibraryError::NotesTooShort { .. }));
    assert!(remote.notes_seen.lock().unwrap().is_empty());
}

#[tokio::test]
async fn generation_failure_is_returned() {
    let store = PersistentStore::in_memory(fixed_clock());
    let library = library(&store, Arc::new(FakeRemote::down()));

    let err = library.generate_deck(&"x".repeat(200)).await.unwrap_err();
    assert!(matches!(err, LibraryError::Remote(RemoteError::Status { .. })));
    assert_eq!(store.profile().await.total_decks, 0);
}

#[tokio::test]
async fn deleting_removes_only_the_local_copy() {
    let store = PersistentStore::in_memory(fixed_clock());
    let library = library(&store, Arc::new(OfflineProvider));
    library.save_deck(&deck("temp", 0)).await.unwrap();

    library.delete_deck(&DeckId::new("temp")).await.unwrap();
    assert!(store.all_decks().await.is_empty());
}
