use std::collections::HashSet;

use crate::model::Deck;

/// Combine the remote and local deck lists into one view.
///
/// Remote decks win on id collisions; local-only decks are appended. The
/// result is sorted newest first by creation time, keeping input order for
/// equal timestamps.
#[must_use]
pub fn merge_decks(remote: Vec<Deck>, local: Vec<Deck>) -> Vec<Deck> {
    let remote_ids: HashSet<_> = remote.iter().map(|deck| deck.id().clone()).collect();

    let mut merged = remote;
    merged.extend(
        local
            .into_iter()
            .filter(|deck| !remote_ids.contains(deck.id())),
    );
    merged.sort_by(|a, b| b.created().cmp(&a.created()));
    merged
}
