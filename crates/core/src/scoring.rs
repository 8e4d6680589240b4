use crate::model::{Card, Difficulty};

/// Per-difficulty counts of rated cards.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DifficultyTally {
    pub easy: u32,
    pub medium: u32,
    pub hard: u32,
}

impl DifficultyTally {
    /// Tally the current rating of every rated card.
    #[must_use]
    pub fn from_cards(cards: &[Card]) -> Self {
        cards
            .iter()
            .filter_map(Card::difficulty)
            .fold(Self::default(), |mut tally, difficulty| {
                tally.add(difficulty);
                tally
            })
    }

    pub fn add(&mut self, difficulty: Difficulty) {
        match difficulty {
            Difficulty::Easy => self.easy += 1,
            Difficulty::Medium => self.medium += 1,
            Difficulty::Hard => self.hard += 1,
        }
    }

    #[must_use]
    pub fn total(&self) -> u32 {
        self.easy + self.medium + self.hard
    }

    /// Weighted accuracy `round((100e + 70m + 30h) / total)`, or 0 when nothing is rated.
    #[must_use]
    pub fn accuracy(&self) -> u32 {
        let total = self.total();
        if total == 0 {
            return 0;
        }
        let weighted = self.easy * Difficulty::Easy.weight()
            + self.medium * Difficulty::Medium.weight()
            + self.hard * Difficulty::Hard.weight();
        // round half up in integer arithmetic
        (weighted * 2 + total) / (total * 2)
    }

    /// Cards counted as correct for the remote summary: `easy + floor(0.7 * medium)`.
    #[must_use]
    pub fn cards_correct(&self) -> u32 {
        self.easy + self.medium * 7 / 10
    }
}
