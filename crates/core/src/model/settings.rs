use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::card::Difficulty;

/// Allowed range for `cards_per_session`.
pub const CARDS_PER_SESSION_RANGE: std::ops::RangeInclusive<u32> = 1..=50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransitionSpeed {
    Slow,
    #[default]
    Normal,
    Fast,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SettingsError {
    #[error("language cannot be empty")]
    EmptyLanguage,

    #[error("cards per session must be between 1 and 50, got {0}")]
    InvalidCardsPerSession(u32),
}

/// User preferences.
///
/// Stored documents may be partial; missing keys take the default value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "SettingsDraft")]
#[allow(clippy::struct_excessive_bools)]
pub struct Settings {
    theme: Theme,
    language: String,
    auto_advance_cards: bool,
    show_explanations: bool,
    study_reminders: bool,
    sound_effects: bool,
    keyboard_navigation: bool,
    card_transition_speed: TransitionSpeed,
    default_difficulty: Difficulty,
    cards_per_session: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            theme: Theme::Light,
            language: "en".to_owned(),
            auto_advance_cards: false,
            show_explanations: true,
            study_reminders: false,
            sound_effects: true,
            keyboard_navigation: true,
            card_transition_speed: TransitionSpeed::Normal,
            default_difficulty: Difficulty::Medium,
            cards_per_session: 5,
        }
    }
}

impl Settings {
    #[must_use]
    pub fn theme(&self) -> Theme {
        self.theme
    }

    #[must_use]
    pub fn language(&self) -> &str {
        &self.language
    }

    #[must_use]
    pub fn auto_advance_cards(&self) -> bool {
        self.auto_advance_cards
    }

    #[must_use]
    pub fn show_explanations(&self) -> bool {
        self.show_explanations
    }

    #[must_use]
    pub fn study_reminders(&self) -> bool {
        self.study_reminders
    }

    #[must_use]
    pub fn sound_effects(&self) -> bool {
        self.sound_effects
    }

    #[must_use]
    pub fn keyboard_navigation(&self) -> bool {
        self.keyboard_navigation
    }

    #[must_use]
    pub fn card_transition_speed(&self) -> TransitionSpeed {
        self.card_transition_speed
    }

    #[must_use]
    pub fn default_difficulty(&self) -> Difficulty {
        self.default_difficulty
    }

    #[must_use]
    pub fn cards_per_session(&self) -> u32 {
        self.cards_per_session
    }
}

/// Partial settings update. `None` keeps the current value.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SettingsDraft {
    pub theme: Option<Theme>,
    pub language: Option<String>,
    pub auto_advance_cards: Option<bool>,
    pub show_explanations: Option<bool>,
    pub study_reminders: Option<bool>,
    pub sound_effects: Option<bool>,
    pub keyboard_navigation: Option<bool>,
    pub card_transition_speed: Option<TransitionSpeed>,
    pub default_difficulty: Option<Difficulty>,
    pub cards_per_session: Option<u32>,
}

impl SettingsDraft {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the draft and layer it over `base`.
    ///
    /// # Errors
    ///
    /// Returns `SettingsError` if the language is blank or `cards_per_session`
    /// is outside `1..=50`.
    pub fn apply_to(self, base: &Settings) -> Result<Settings, SettingsError> {
        let language = match self.language {
            Some(language) => {
                let trimmed = language.trim();
                if trimmed.is_empty() {
                    return Err(SettingsError::EmptyLanguage);
                }
                trimmed.to_owned()
            }
            None => base.language.clone(),
        };
        let cards_per_session = self.cards_per_session.unwrap_or(base.cards_per_session);
        if !CARDS_PER_SESSION_RANGE.contains(&cards_per_session) {
            return Err(SettingsError::InvalidCardsPerSession(cards_per_session));
        }

        Ok(Settings {
            theme: self.theme.unwrap_or(base.theme),
            language,
            auto_advance_cards: self.auto_advance_cards.unwrap_or(base.auto_advance_cards),
            show_explanations: self.show_explanations.unwrap_or(base.show_explanations),
            study_reminders: self.study_reminders.unwrap_or(base.study_reminders),
            sound_effects: self.sound_effects.unwrap_or(base.sound_effects),
            keyboard_navigation: self.keyboard_navigation.unwrap_or(base.keyboard_navigation),
            card_transition_speed: self
                .card_transition_speed
                .unwrap_or(base.card_transition_speed),
            default_difficulty: self.default_difficulty.unwrap_or(base.default_difficulty),
            cards_per_session,
        })
    }
}

impl TryFrom<SettingsDraft> for Settings {
    type Error = SettingsError;

    fn try_from(draft: SettingsDraft) -> Result<Self, Self::Error> {
        draft.apply_to(&Settings::default())
    }
}
