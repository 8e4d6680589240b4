use std::sync::Arc;

use log::{info, warn};
use storage::PersistentStore;
use study_core::merge::merge_decks;
use study_core::model::{Deck, DeckId};

use crate::error::{LibraryError, RemoteError};
use crate::remote::DeckProvider;
use crate::statistics::StatisticsEngine;

/// Minimum length of notes accepted for generation, in characters.
pub const NOTES_MIN_CHARS: usize = 100;
/// Maximum length of notes accepted for generation, in characters.
pub const NOTES_MAX_CHARS: usize = 5000;

/// Check generation input and return it trimmed.
///
/// # Errors
///
/// Returns `LibraryError::NotesTooShort` or `LibraryError::NotesTooLong`
/// when the trimmed length is outside `100..=5000` characters.
pub fn validate_notes(notes: &str) -> Result<&str, LibraryError> {
    let trimmed = notes.trim();
    let len = trimmed.chars().count();
    if len < NOTES_MIN_CHARS {
        return Err(LibraryError::NotesTooShort {
            min: NOTES_MIN_CHARS,
            len,
        });
    }
    if len > NOTES_MAX_CHARS {
        return Err(LibraryError::NotesTooLong {
            max: NOTES_MAX_CHARS,
            len,
        });
    }
    Ok(trimmed)
}

/// Merged deck view plus whether the remote answered.
#[derive(Debug, Clone, PartialEq)]
pub struct DeckListing {
    pub decks: Vec<Deck>,
    /// `false` when the remote list could not be fetched; show a banner.
    pub remote_available: bool,
}

/// Deck listing, opening, generation and deletion across remote and local stores.
#[derive(Clone)]
pub struct DeckLibraryService {
    store: PersistentStore,
    remote: Arc<dyn DeckProvider>,
    stats: StatisticsEngine,
}

impl DeckLibraryService {
    #[must_use]
    pub fn new(
        store: PersistentStore,
        remote: Arc<dyn DeckProvider>,
        stats: StatisticsEngine,
    ) -> Self {
        Self {
            store,
            remote,
            stats,
        }
    }

    /// Remote decks merged with local ones, newest first.
    ///
    /// A failing remote contributes an empty list.
    pub async fn list_decks(&self) -> DeckListing {
        let (remote, remote_available) = match self.remote.fetch_decks().await {
            Ok(decks) => (decks, true),
            Err(RemoteError::Disabled) => (Vec::new(), false),
            Err(err) => {
                warn!("remote deck list unavailable, showing local decks: {err}");
                (Vec::new(), false)
            }
        };
        let local = self.store.all_decks().await;
        DeckListing {
            decks: merge_decks(remote, local),
            remote_available,
        }
    }

    /// Load a deck for study, matching what [`list_decks`](Self::list_decks) shows.
    ///
    /// The remote copy wins and is cached locally. The local copy is used only
    /// when the remote cannot serve the deck.
    ///
    /// # Errors
    ///
    /// Returns `LibraryError::NotFound` if neither store has the deck, or
    /// `LibraryError::Remote` if the remote fails and there is no local copy.
    pub async fn open_deck(&self, id: &DeckId) -> Result<Deck, LibraryError> {
        let err = match self.remote.fetch_deck(id).await {
            Ok(deck) => {
                if let Err(err) = self.store.save_deck(&deck).await {
                    warn!("failed to cache remote deck {id}: {err}");
                }
                return Ok(deck);
            }
            Err(err) => err,
        };

        if let Some(deck) = self.store.deck_by_id(id).await {
            if !matches!(err, RemoteError::Disabled) {
                warn!("remote deck {id} unavailable, using local copy: {err}");
            }
            return Ok(deck);
        }
        match err {
            RemoteError::Disabled => Err(LibraryError::NotFound),
            RemoteError::Status { status, .. } if status == reqwest::StatusCode::NOT_FOUND => {
                Err(LibraryError::NotFound)
            }
            err => Err(err.into()),
        }
    }

    /// Generate a deck from notes on the remote and keep a local copy.
    ///
    /// # Errors
    ///
    /// Returns `LibraryError` for invalid notes or when generation fails.
    /// Local persistence failures are logged, not returned.
    pub async fn generate_deck(&self, notes: &str) -> Result<Deck, LibraryError> {
        let notes = validate_notes(notes)?;
        let deck = self.remote.generate_deck(notes).await?;
        info!("generated deck {} with {} cards", deck.id(), deck.len());

        if let Err(err) = self.store.save_deck(&deck).await {
            warn!("failed to save generated deck {}: {err}", deck.id());
        }
        let counted = match self.stats.load_profile().await {
            Ok(profile) => self.stats.record_deck_created(&profile).await.map(drop),
            Err(err) => Err(err),
        };
        if let Err(err) = counted {
            warn!("failed to count generated deck: {err}");
        }
        Ok(deck)
    }

    /// Store a deck locally.
    ///
    /// # Errors
    ///
    /// Returns `LibraryError::Storage` if the write fails.
    pub async fn save_deck(&self, deck: &Deck) -> Result<(), LibraryError> {
        self.store.save_deck(deck).await?;
        Ok(())
    }

    /// Remove a deck from the local store.
    ///
    /// # Errors
    ///
    /// Returns `LibraryError::Storage` if the write fails.
    pub async fn delete_deck(&self, id: &DeckId) -> Result<(), LibraryError> {
        self.store.delete_deck(id).await?;
        Ok(())
    }
}
