use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use log::{debug, warn};
use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use study_core::Clock;
use study_core::model::{Card, CardId, CardKind, Deck, DeckId, Difficulty, SessionData};
use url::Url;

use crate::error::RemoteError;

/// Device tag sent when a remote study session starts.
pub const DEVICE_TYPE: &str = "cli";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

//
// ─── CONTRACT ──────────────────────────────────────────────────────────────────
//

/// Identifier the remote assigns to a study session.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RemoteSessionId(String);

impl RemoteSessionId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RemoteSessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Fields pushed to the remote when a deck's progress changes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DeckUpdate {
    pub progress: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_studied: Option<DateTime<Utc>>,
}

/// The remote deck store and study tracker.
///
/// Every call may fail; callers fall back to local state.
#[async_trait]
pub trait DeckProvider: Send + Sync {
    /// Decks owned by the current remote user.
    async fn fetch_decks(&self) -> Result<Vec<Deck>, RemoteError>;

    async fn fetch_deck(&self, id: &DeckId) -> Result<Deck, RemoteError>;

    async fn update_deck(&self, id: &DeckId, update: &DeckUpdate) -> Result<(), RemoteError>;

    /// Create a deck from free-text notes.
    async fn generate_deck(&self, notes: &str) -> Result<Deck, RemoteError>;

    async fn start_session(&self, deck_id: &DeckId) -> Result<RemoteSessionId, RemoteError>;

    async fn complete_session(
        &self,
        session: &RemoteSessionId,
        data: &SessionData,
    ) -> Result<(), RemoteError>;

    async fn record_card_study(
        &self,
        card_id: &CardId,
        difficulty: Difficulty,
    ) -> Result<(), RemoteError>;
}

//
// ─── OFFLINE ───────────────────────────────────────────────────────────────────
//

/// Provider used when no remote is configured; every call fails with `Disabled`.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineProvider;

#[async_trait]
impl DeckProvider for OfflineProvider {
    async fn fetch_decks(&self) -> Result<Vec<Deck>, RemoteError> {
        Err(RemoteError::Disabled)
    }

    async fn fetch_deck(&self, _id: &DeckId) -> Result<Deck, RemoteError> {
        Err(RemoteError::Disabled)
    }

    async fn update_deck(&self, _id: &DeckId, _update: &DeckUpdate) -> Result<(), RemoteError> {
        Err(RemoteError::Disabled)
    }

    async fn generate_deck(&self, _notes: &str) -> Result<Deck, RemoteError> {
        Err(RemoteError::Disabled)
    }

    async fn start_session(&self, _deck_id: &DeckId) -> Result<RemoteSessionId, RemoteError> {
        Err(RemoteError::Disabled)
    }

    async fn complete_session(
        &self,
        _session: &RemoteSessionId,
        _data: &SessionData,
    ) -> Result<(), RemoteError> {
        Err(RemoteError::Disabled)
    }

    async fn record_card_study(
        &self,
        _card_id: &CardId,
        _difficulty: Difficulty,
    ) -> Result<(), RemoteError> {
        Err(RemoteError::Disabled)
    }
}

//
// ─── HTTP ──────────────────────────────────────────────────────────────────────
//

/// JSON-over-HTTP client for the flashcard backend.
///
/// The backend tracks its user through a session cookie, so one client (and
/// cookie jar) is kept for the provider's lifetime.
#[derive(Clone)]
pub struct HttpDeckProvider {
    client: Client,
    base: Url,
    clock: Clock,
}

impl HttpDeckProvider {
    /// Build a client for the API rooted at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns `RemoteError::InvalidBaseUrl` if `base_url` cannot hold a path,
    /// or `RemoteError::Http` if the HTTP client cannot be constructed.
    pub fn new(base_url: &Url, clock: Clock) -> Result<Self, RemoteError> {
        if base_url.cannot_be_a_base() {
            return Err(RemoteError::InvalidBaseUrl(base_url.to_string()));
        }
        let client = Client::builder()
            .cookie_store(true)
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            base: base_url.clone(),
            clock,
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        self.base.as_str().trim_end_matches('/')
    }

    /// Register (or resume) the remote user behind the session cookie.
    ///
    /// # Errors
    ///
    /// Returns `RemoteError` if the backend rejects the request.
    pub async fn register_user(&self) -> Result<(), RemoteError> {
        let _: serde_json::Value = self
            .send(self.request(Method::POST, &["users"]).json(&serde_json::json!({})))
            .await?;
        Ok(())
    }

    /// The base URL extended by `segments`, each percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn request(&self, method: Method, segments: &[&str]) -> RequestBuilder {
        self.client.request(method, self.endpoint(segments))
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, RemoteError> {
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<ErrorBody>()
                .await
                .ok()
                .and_then(|body| body.error)
                .unwrap_or_else(|| status.to_string());
            return Err(RemoteError::Status { status, message });
        }
        Ok(response.json().await?)
    }
}

#[async_trait]
impl DeckProvider for HttpDeckProvider {
    async fn fetch_decks(&self) -> Result<Vec<Deck>, RemoteError> {
        let list: WireDeckList = self.send(self.request(Method::GET, &["decks"])).await?;
        let now = self.clock.now();
        let decks: Vec<Deck> = list
            .decks
            .into_iter()
            .filter_map(|wire| {
                let id = wire.id.to_string();
                wire.into_deck(now)
                    .map_err(|err| warn!("skipping remote deck {id}: {err}"))
                    .ok()
            })
            .collect();
        debug!("fetched {} remote decks", decks.len());
        Ok(decks)
    }

    async fn fetch_deck(&self, id: &DeckId) -> Result<Deck, RemoteError> {
        let wire: WireDeck = self
            .send(self.request(Method::GET, &["decks", id.as_str()]))
            .await?;
        wire.into_deck(self.clock.now())
    }

    async fn update_deck(&self, id: &DeckId, update: &DeckUpdate) -> Result<(), RemoteError> {
        let _: serde_json::Value = self
            .send(self.request(Method::PUT, &["decks", id.as_str()]).json(update))
            .await?;
        Ok(())
    }

    async fn generate_deck(&self, notes: &str) -> Result<Deck, RemoteError> {
        let wire: WireDeck = self
            .send(
                self.request(Method::POST, &["generate-flashcards"])
                    .json(&GenerateRequest { notes }),
            )
            .await?;
        wire.into_deck(self.clock.now())
    }

    async fn start_session(&self, deck_id: &DeckId) -> Result<RemoteSessionId, RemoteError> {
        let started: SessionStarted = self
            .send(self.request(Method::POST, &["study-session"]).json(&StartSessionRequest {
                deck_id: deck_id.as_str(),
                device_type: DEVICE_TYPE,
            }))
            .await?;
        Ok(RemoteSessionId(started.session_id.to_string()))
    }

    async fn complete_session(
        &self,
        session: &RemoteSessionId,
        data: &SessionData,
    ) -> Result<(), RemoteError> {
        let body = CompleteSessionRequest {
            cards_studied: data.cards_studied,
            cards_correct: data.cards_correct,
            accuracy: data.accuracy,
            deck_progress: data.deck_progress,
        };
        let _: serde_json::Value = self
            .send(
                self.request(Method::POST, &["study-session", session.as_str(), "complete"])
                    .json(&body),
            )
            .await?;
        Ok(())
    }

    async fn record_card_study(
        &self,
        card_id: &CardId,
        difficulty: Difficulty,
    ) -> Result<(), RemoteError> {
        let body = CardStudyRequest {
            is_correct: difficulty.is_correct(),
            difficulty,
        };
        let _: serde_json::Value = self
            .send(
                self.request(Method::POST, &["cards", card_id.as_str(), "study"])
                    .json(&body),
            )
            .await?;
        Ok(())
    }
}

//
// ─── WIRE FORMAT ───────────────────────────────────────────────────────────────
//

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    notes: &'a str,
}

#[derive(Debug, Serialize)]
struct StartSessionRequest<'a> {
    deck_id: &'a str,
    device_type: &'a str,
}

#[derive(Debug, Serialize)]
struct CompleteSessionRequest {
    cards_studied: u32,
    cards_correct: u32,
    accuracy: u32,
    deck_progress: f64,
}

#[derive(Debug, Serialize)]
struct CardStudyRequest {
    is_correct: bool,
    difficulty: Difficulty,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SessionStarted {
    session_id: WireId,
}

/// Ids arrive as strings or integers depending on the backend version.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum WireId {
    Text(String),
    Number(i64),
}

impl fmt::Display for WireId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WireId::Text(text) => f.write_str(text),
            WireId::Number(n) => write!(f, "{n}"),
        }
    }
}

#[derive(Debug, Deserialize)]
struct WireDeckList {
    #[serde(default)]
    decks: Vec<WireDeck>,
}

#[derive(Debug, Deserialize)]
struct WireDeck {
    #[serde(alias = "deck_id")]
    id: WireId,
    title: String,
    #[serde(default)]
    cards: Vec<WireCard>,
    #[serde(default, alias = "created_at")]
    created: Option<String>,
    #[serde(default, rename = "lastStudied", alias = "last_studied")]
    last_studied: Option<String>,
    #[serde(default)]
    progress: Option<f64>,
    #[serde(default)]
    completions: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct WireCard {
    id: WireId,
    question: String,
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    options: Option<Vec<String>>,
    #[serde(default, rename = "correctAnswer", alias = "correct_answer")]
    correct_answer: Option<WireAnswer>,
    #[serde(default)]
    explanation: Option<String>,
    #[serde(default)]
    times_studied: Option<u32>,
    #[serde(default)]
    times_correct: Option<u32>,
}

/// The correct answer as an option index or as the option's text.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireAnswer {
    Index(usize),
    Text(String),
}

impl WireDeck {
    fn into_deck(self, now: DateTime<Utc>) -> Result<Deck, RemoteError> {
        let cards = self
            .cards
            .into_iter()
            .map(WireCard::into_card)
            .collect::<Result<Vec<_>, _>>()?;
        let created = self
            .created
            .as_deref()
            .and_then(parse_timestamp)
            .unwrap_or(now);
        let last_studied = self.last_studied.as_deref().and_then(parse_timestamp);
        let progress = self.progress.unwrap_or(0.0).clamp(0.0, 100.0);

        Deck::from_persisted(
            DeckId::new(self.id.to_string()),
            self.title,
            cards,
            created,
            last_studied,
            progress,
            self.completions.unwrap_or(0),
        )
        .map_err(|err| RemoteError::InvalidResponse(err.to_string()))
    }
}

impl WireCard {
    fn into_card(self) -> Result<Card, RemoteError> {
        let options = self.options.unwrap_or_default();
        let kind = parse_kind(self.kind.as_deref(), &options);
        let correct_answer = match self.correct_answer {
            Some(WireAnswer::Index(index)) => (index < options.len()).then_some(index),
            Some(WireAnswer::Text(text)) => options.iter().position(|option| *option == text),
            None => None,
        };
        let attempts = self.times_studied.unwrap_or(0);
        let correct = self.times_correct.unwrap_or(0).min(attempts);

        Card::from_persisted(
            CardId::new(self.id.to_string()),
            kind,
            self.question,
            options,
            correct_answer,
            self.explanation.unwrap_or_default(),
            None,
            attempts,
            correct,
        )
        .map_err(|err| RemoteError::InvalidResponse(err.to_string()))
    }
}

fn parse_kind(kind: Option<&str>, options: &[String]) -> CardKind {
    match kind.map(|k| k.trim().to_ascii_lowercase().replace('_', "-")).as_deref() {
        Some("multiple-choice") => CardKind::MultipleChoice,
        Some("true-false") => CardKind::TrueFalse,
        Some("short-answer") => CardKind::ShortAnswer,
        _ if options.is_empty() => CardKind::ShortAnswer,
        _ => CardKind::MultipleChoice,
    }
}

/// RFC 3339, or a naive ISO timestamp read as UTC.
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Some(at.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}
