use study_core::model::{DeckId, Difficulty};
use study_core::study::{CompletionSummary, StudyState};

/// What happened in a study context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StudyEventKind {
    Loaded,
    Flipped,
    Moved,
    Rated(Difficulty),
    Restarted,
    Completed(CompletionSummary),
}

/// Change notification broadcast after every successful transition.
///
/// Subscribers read session state through accessors; they never mutate it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StudyEvent {
    pub deck_id: DeckId,
    pub state: StudyState,
    pub kind: StudyEventKind,
}
