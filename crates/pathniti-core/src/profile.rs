use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// State/city pair used for location matching.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
}

/// Snapshot of a student being assessed.
///
/// Score maps are ordered so that prompts and serialized output are stable
/// for identical inputs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_level: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream: Option<String>,
    #[serde(default)]
    pub interests: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
    /// Quiz category -> score
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quiz_scores: Option<BTreeMap<String, f64>>,
    /// Personality trait -> score on a 1-5 scale
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub personality_traits: Option<BTreeMap<String, f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family_income: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_education: Option<String>,
}

impl UserProfile {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            ..Default::default()
        }
    }

    /// Interest tags with blank entries dropped.
    pub fn interest_tags(&self) -> impl Iterator<Item = &str> {
        self.interests
            .iter()
            .map(|i| i.trim())
            .filter(|i| !i.is_empty())
    }

    pub fn state(&self) -> Option<&str> {
        self.location.as_ref().and_then(|l| l.state.as_deref())
    }

    /// Age as the difference between calendar years, matching how profiles
    /// derive it from a stored date of birth.
    pub fn age_on(birth_date: NaiveDate, today: NaiveDate) -> Option<u32> {
        u32::try_from(today.year() - birth_date.year()).ok()
    }
}
