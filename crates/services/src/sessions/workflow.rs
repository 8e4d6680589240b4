use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};
use storage::PersistentStore;
use study_core::model::{Deck, DeckId, Difficulty};
use study_core::study::{
    CompletionSummary, DEFAULT_ADVANCE_DELAY_MS, Step, StudySession, StudyState,
};
use tokio::sync::broadcast;

use super::events::{StudyEvent, StudyEventKind};
use crate::Clock;
use crate::error::SessionError;
use crate::remote::{DeckProvider, DeckUpdate, RemoteSessionId};
use crate::statistics::{RecordedSession, StatisticsEngine};

const EVENT_CAPACITY: usize = 64;

//
// ─── CONTEXT ───────────────────────────────────────────────────────────────────
//

/// One study pass: the session state machine plus its remote session handle.
///
/// Every transition borrows the context mutably, so two transitions on the
/// same pass cannot interleave.
#[derive(Debug)]
pub struct StudyContext {
    deck_id: DeckId,
    session: StudySession,
    remote_session: Option<RemoteSessionId>,
}

impl StudyContext {
    #[must_use]
    pub fn deck_id(&self) -> &DeckId {
        &self.deck_id
    }

    #[must_use]
    pub fn session(&self) -> &StudySession {
        &self.session
    }

    #[must_use]
    pub fn state(&self) -> StudyState {
        self.session.state()
    }

    /// Remote session id, if the remote accepted the session start.
    #[must_use]
    pub fn remote_session(&self) -> Option<&RemoteSessionId> {
        self.remote_session.as_ref()
    }
}

/// Completion hand-off: the summary plus the statistics it produced.
#[derive(Debug)]
pub struct CompletionReport {
    pub summary: CompletionSummary,
    pub recorded: RecordedSession,
}

/// Result of a study-loop transition.
#[derive(Debug)]
pub struct StepOutcome {
    pub state: StudyState,
    /// Set on the transition that completes the pass.
    pub completion: Option<CompletionReport>,
}

//
// ─── SERVICE ───────────────────────────────────────────────────────────────────
//

/// Drives study contexts against the local store, the remote and statistics.
///
/// Store and remote failures are logged and absorbed; only invalid transitions
/// are returned as errors.
#[derive(Clone)]
pub struct StudyLoopService {
    clock: Clock,
    store: PersistentStore,
    remote: Arc<dyn DeckProvider>,
    stats: StatisticsEngine,
    advance_delay: Duration,
    events: broadcast::Sender<StudyEvent>,
}

impl StudyLoopService {
    #[must_use]
    pub fn new(
        clock: Clock,
        store: PersistentStore,
        remote: Arc<dyn DeckProvider>,
        stats: StatisticsEngine,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            clock,
            store,
            remote,
            stats,
            advance_delay: Duration::from_millis(DEFAULT_ADVANCE_DELAY_MS),
            events,
        }
    }

    /// Pause between a rating and the automatic advance.
    #[must_use]
    pub fn with_advance_delay(mut self, delay: Duration) -> Self {
        self.advance_delay = delay;
        self
    }

    #[must_use]
    pub fn advance_delay(&self) -> Duration {
        self.advance_delay
    }

    /// Subscribe to change notifications for every context this service drives.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<StudyEvent> {
        self.events.subscribe()
    }

    /// Load `deck` into a new context and announce the session to the remote.
    pub async fn start(&self, deck: Deck) -> StudyContext {
        let deck_id = deck.id().clone();
        let mut session = StudySession::new();
        let step = session.load(deck);

        let remote_session = self.open_remote_session(&deck_id).await;
        let ctx = StudyContext {
            deck_id,
            session,
            remote_session,
        };
        self.persist_if_changed(&ctx, step).await;
        self.emit(&ctx, StudyEventKind::Loaded);
        ctx
    }

    /// Flip the current card.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Transition` if no card is on screen.
    pub async fn toggle_flip(&self, ctx: &mut StudyContext) -> Result<StepOutcome, SessionError> {
        let step = ctx.session.toggle_flip()?;
        self.finish(ctx, step, StudyEventKind::Flipped).await
    }

    /// Advance to the next card, completing the pass from the last one.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Transition` if no card is on screen.
    pub async fn next(&self, ctx: &mut StudyContext) -> Result<StepOutcome, SessionError> {
        let step = ctx.session.next(self.clock.now())?;
        self.finish(ctx, step, StudyEventKind::Moved).await
    }

    /// Go back one card.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Transition` if no card is on screen.
    pub async fn previous(&self, ctx: &mut StudyContext) -> Result<StepOutcome, SessionError> {
        let step = ctx.session.previous()?;
        self.finish(ctx, step, StudyEventKind::Moved).await
    }

    /// Rate the current card, wait the advance delay, then move on.
    ///
    /// The rating is persisted before the delay starts.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Transition` if no card is on screen.
    pub async fn rate(
        &self,
        ctx: &mut StudyContext,
        difficulty: Difficulty,
    ) -> Result<StepOutcome, SessionError> {
        let card_id = ctx.session.current_card().map(|card| card.id().clone());
        let step = ctx.session.rate(difficulty)?;
        self.finish(ctx, step, StudyEventKind::Rated(difficulty))
            .await?;

        if let Some(card_id) = card_id {
            if let Err(err) = self.remote.record_card_study(&card_id, difficulty).await {
                warn!("failed to record study of card {card_id}: {err}");
            }
        }

        if !self.advance_delay.is_zero() {
            tokio::time::sleep(self.advance_delay).await;
        }
        self.next(ctx).await
    }

    /// Clear all ratings and start the pass over.
    ///
    /// Restarting a completed pass opens a new remote session, since the
    /// remote has already closed the previous one.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Transition` if the context holds no deck.
    pub async fn restart(&self, ctx: &mut StudyContext) -> Result<StepOutcome, SessionError> {
        let was_completed = ctx.session.is_completed();
        let step = ctx.session.restart()?;
        if was_completed {
            ctx.remote_session = self.open_remote_session(&ctx.deck_id).await;
        }
        self.finish(ctx, step, StudyEventKind::Restarted).await
    }

    async fn open_remote_session(&self, deck_id: &DeckId) -> Option<RemoteSessionId> {
        match self.remote.start_session(deck_id).await {
            Ok(id) => {
                debug!("remote session {id} started for {deck_id}");
                Some(id)
            }
            Err(err) => {
                warn!("failed to start remote session for {deck_id}: {err}");
                None
            }
        }
    }

    async fn finish(
        &self,
        ctx: &StudyContext,
        step: Step,
        kind: StudyEventKind,
    ) -> Result<StepOutcome, SessionError> {
        self.persist_if_changed(ctx, step).await;

        let Some(summary) = step.completion else {
            self.emit(ctx, kind);
            return Ok(StepOutcome {
                state: step.state,
                completion: None,
            });
        };

        let recorded = self.complete(ctx, summary).await;
        self.emit(ctx, StudyEventKind::Completed(summary));
        Ok(StepOutcome {
            state: step.state,
            completion: Some(CompletionReport { summary, recorded }),
        })
    }

    async fn complete(&self, ctx: &StudyContext, summary: CompletionSummary) -> RecordedSession {
        let deck = ctx.session.deck();
        let progress = deck.map_or(100.0, Deck::progress);
        let data = summary.session_data(progress);

        if let Some(remote_session) = &ctx.remote_session {
            if let Err(err) = self.remote.complete_session(remote_session, &data).await {
                warn!("failed to complete remote session {remote_session}: {err}");
            }
            let update = DeckUpdate {
                progress,
                last_studied: deck.and_then(Deck::last_studied),
            };
            if let Err(err) = self.remote.update_deck(&ctx.deck_id, &update).await {
                warn!("failed to push progress for {}: {err}", ctx.deck_id);
            }
        }

        self.stats.record_completion(&ctx.deck_id, data).await
    }

    async fn persist_if_changed(&self, ctx: &StudyContext, step: Step) {
        if !step.deck_changed {
            return;
        }
        let Some(deck) = ctx.session.deck() else {
            return;
        };
        if let Err(err) = self.store.update_deck(deck).await {
            warn!("failed to persist progress for {}: {err}", ctx.deck_id);
        }
    }

    fn emit(&self, ctx: &StudyContext, kind: StudyEventKind) {
        // no subscribers is fine
        let _ = self.events.send(StudyEvent {
            deck_id: ctx.deck_id.clone(),
            state: ctx.session.state(),
            kind,
        });
    }
}
