//! Student feedback on recommendations, quizzes and guidance.
//!
//! Entries are appended to a JSON file and summarised on demand. Sentiment
//! is a keyword heuristic blended with the star rating.

use crate::error::{PathNitiError, Result};
use crate::usage_monitor::{Clock, SystemClock};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

const POSITIVE_KEYWORDS: [&str; 8] = [
    "good",
    "great",
    "excellent",
    "helpful",
    "useful",
    "accurate",
    "love",
    "amazing",
];
const NEGATIVE_KEYWORDS: [&str; 8] = [
    "bad",
    "terrible",
    "useless",
    "wrong",
    "inaccurate",
    "hate",
    "awful",
    "confusing",
];

/// Comment themes and the substrings that flag them.
const ISSUE_THEMES: [(&str, &[&str]); 4] = [
    ("Performance Issues", &["slow", "loading"]),
    ("Usability Issues", &["confusing", "unclear"]),
    ("Accuracy Issues", &["wrong", "inaccurate"]),
    ("Missing Information", &["missing", "not found"]),
];

const LOW_RATINGS_ISSUE: &str = "High number of low ratings";
const RECENT_DAYS: i64 = 7;
const MAX_SUGGESTIONS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackType {
    Recommendation,
    Quiz,
    College,
    Career,
    General,
}

impl FeedbackType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeedbackType::Recommendation => "recommendation",
            FeedbackType::Quiz => "quiz",
            FeedbackType::College => "college",
            FeedbackType::Career => "career",
            FeedbackType::General => "general",
        }
    }

    fn suggestions(&self) -> &'static [&'static str] {
        match self {
            FeedbackType::Recommendation => &[
                "Implement more personalized recommendation algorithms",
                "Add more diverse recommendation options",
                "Improve recommendation explanation and reasoning",
            ],
            FeedbackType::Quiz => &[
                "Optimize quiz questions for better user engagement",
                "Improve quiz result explanations",
                "Add more interactive elements to the quiz",
            ],
            FeedbackType::College => &[
                "Enhance college search and filtering capabilities",
                "Add more detailed college information",
                "Improve college comparison features",
            ],
            FeedbackType::Career => &[
                "Expand career information and pathways",
                "Add more interactive career exploration tools",
                "Improve career guidance and counseling features",
            ],
            FeedbackType::General => &[],
        }
    }
}

impl fmt::Display for FeedbackType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FeedbackType {
    type Err = PathNitiError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "recommendation" => Ok(FeedbackType::Recommendation),
            "quiz" => Ok(FeedbackType::Quiz),
            "college" => Ok(FeedbackType::College),
            "career" => Ok(FeedbackType::Career),
            "general" => Ok(FeedbackType::General),
            other => Err(PathNitiError::InvalidInput(format!(
                "unknown feedback type: {}",
                other
            ))),
        }
    }
}

/// A stored feedback entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feedback {
    pub feedback_id: String,
    pub user_id: String,
    pub session_id: String,
    pub feedback_type: FeedbackType,
    pub rating: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub context: BTreeMap<String, serde_json::Value>,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub processed: bool,
}

/// Feedback as submitted, before an id and timestamp are assigned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewFeedback {
    pub user_id: String,
    #[serde(default)]
    pub session_id: String,
    pub feedback_type: FeedbackType,
    pub rating: u8,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub context: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecentTrend {
    pub recent_average: f64,
    pub recent_count: usize,
    pub trend_direction: TrendDirection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Improving,
    Declining,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackSummary {
    pub total_feedback: usize,
    pub average_rating: f64,
    pub rating_distribution: BTreeMap<u8, usize>,
    pub feedback_types: BTreeMap<FeedbackType, usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recent_trends: Option<RecentTrend>,
    pub date_range: DateRange,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackAnalysis {
    pub analysis_id: String,
    pub feedback_type: FeedbackType,
    pub total_feedback: usize,
    pub average_rating: f64,
    /// -1.0 (negative) to 1.0 (positive)
    pub sentiment_score: f64,
    pub common_issues: Vec<String>,
    pub improvement_suggestions: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

/// Append-only feedback log, optionally backed by a JSON file.
pub struct FeedbackStore {
    entries: Vec<Feedback>,
    path: Option<PathBuf>,
    clock: Arc<dyn Clock>,
}

impl Default for FeedbackStore {
    fn default() -> Self {
        Self::in_memory(Arc::new(SystemClock))
    }
}

impl FeedbackStore {
    pub fn in_memory(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Vec::new(),
            path: None,
            clock,
        }
    }

    /// Open the log at `path`; a missing file is an empty log.
    pub fn open(path: impl Into<PathBuf>, clock: Arc<dyn Clock>) -> Result<Self> {
        let path = path.into();
        let entries = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            serde_json::from_str(&content)?
        } else {
            Vec::new()
        };
        debug!("Loaded {} feedback entries", entries.len());

        Ok(Self {
            entries,
            path: Some(path),
            clock,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn entries(&self) -> &[Feedback] {
        &self.entries
    }

    /// Validate and store one entry. Ratings must be 1 to 5.
    pub fn submit(&mut self, feedback: NewFeedback) -> Result<Feedback> {
        if !(1..=5).contains(&feedback.rating) {
            return Err(PathNitiError::InvalidInput(format!(
                "Rating must be between 1 and 5, got {}",
                feedback.rating
            )));
        }
        if feedback.user_id.trim().is_empty() {
            return Err(PathNitiError::InvalidInput(
                "user_id is required".to_string(),
            ));
        }

        let entry = Feedback {
            feedback_id: Uuid::new_v4().to_string(),
            user_id: feedback.user_id,
            session_id: feedback.session_id,
            feedback_type: feedback.feedback_type,
            rating: feedback.rating,
            comment: feedback.comment.filter(|c| !c.trim().is_empty()),
            context: feedback.context,
            timestamp: self.clock.now(),
            processed: false,
        };

        self.entries.push(entry.clone());
        self.save()?;
        info!(
            "Feedback submitted: {} ({} stars)",
            entry.feedback_id, entry.rating
        );
        Ok(entry)
    }

    fn save(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(&self.entries)?)?;
        Ok(())
    }

    /// Counts and averages over the last `days` days, optionally for one type.
    pub fn summary(&self, kind: Option<FeedbackType>, days: u32) -> FeedbackSummary {
        let now = self.clock.now();
        let cutoff = now - Duration::days(i64::from(days));
        let filtered: Vec<&Feedback> = self
            .entries
            .iter()
            .filter(|f| f.timestamp >= cutoff && kind.map_or(true, |k| f.feedback_type == k))
            .collect();

        let date_range = DateRange {
            start: cutoff,
            end: now,
        };

        if filtered.is_empty() {
            return FeedbackSummary {
                total_feedback: 0,
                average_rating: 0.0,
                rating_distribution: BTreeMap::new(),
                feedback_types: BTreeMap::new(),
                recent_trends: None,
                date_range,
            };
        }

        let average_rating = mean_rating(&filtered);

        let mut rating_distribution: BTreeMap<u8, usize> = (1..=5).map(|r| (r, 0)).collect();
        let mut feedback_types = BTreeMap::new();
        for f in &filtered {
            *rating_distribution.entry(f.rating).or_default() += 1;
            *feedback_types.entry(f.feedback_type).or_default() += 1;
        }

        let recent_cutoff = now - Duration::days(RECENT_DAYS);
        let recent: Vec<&Feedback> = filtered
            .iter()
            .copied()
            .filter(|f| f.timestamp >= recent_cutoff)
            .collect();
        let recent_average = mean_rating(&recent);
        let recent_trends = Some(RecentTrend {
            recent_average,
            recent_count: recent.len(),
            trend_direction: if !recent.is_empty() && recent_average > average_rating {
                TrendDirection::Improving
            } else {
                TrendDirection::Declining
            },
        });

        FeedbackSummary {
            total_feedback: filtered.len(),
            average_rating,
            rating_distribution,
            feedback_types,
            recent_trends,
            date_range,
        }
    }

    /// Sentiment, recurring issues and suggestions for one feedback type.
    pub fn analyze(&self, kind: FeedbackType) -> FeedbackAnalysis {
        let matching: Vec<&Feedback> = self
            .entries
            .iter()
            .filter(|f| f.feedback_type == kind)
            .collect();

        let (average_rating, sentiment_score, common_issues, improvement_suggestions) =
            if matching.is_empty() {
                (0.0, 0.0, Vec::new(), Vec::new())
            } else {
                let average = mean_rating(&matching);
                let issues = common_issues(&matching);
                let suggestions = improvement_suggestions(kind, average, &issues);
                (average, sentiment_score(&matching), issues, suggestions)
            };

        FeedbackAnalysis {
            analysis_id: Uuid::new_v4().to_string(),
            feedback_type: kind,
            total_feedback: matching.len(),
            average_rating,
            sentiment_score,
            common_issues,
            improvement_suggestions,
            timestamp: self.clock.now(),
        }
    }
}

fn mean_rating(entries: &[&Feedback]) -> f64 {
    if entries.is_empty() {
        return 0.0;
    }
    entries.iter().map(|f| f64::from(f.rating)).sum::<f64>() / entries.len() as f64
}

/// 70% rating sentiment, 30% keyword sentiment of comments that carry any keyword.
fn sentiment_score(entries: &[&Feedback]) -> f64 {
    if entries.is_empty() {
        return 0.0;
    }

    let rating_sentiment = entries
        .iter()
        .map(|f| (f64::from(f.rating) - 3.0) / 2.0)
        .sum::<f64>()
        / entries.len() as f64;

    let comment_scores: Vec<f64> = entries
        .iter()
        .filter_map(|f| f.comment.as_deref())
        .filter_map(|comment| {
            let lower = comment.to_lowercase();
            let positive = POSITIVE_KEYWORDS.iter().filter(|w| lower.contains(*w)).count();
            let negative = NEGATIVE_KEYWORDS.iter().filter(|w| lower.contains(*w)).count();
            let hits = positive + negative;
            (hits > 0).then(|| (positive as f64 - negative as f64) / hits as f64)
        })
        .collect();

    let comment_sentiment = if comment_scores.is_empty() {
        0.0
    } else {
        comment_scores.iter().sum::<f64>() / comment_scores.len() as f64
    };

    rating_sentiment * 0.7 + comment_sentiment * 0.3
}

fn common_issues(entries: &[&Feedback]) -> Vec<String> {
    let total = entries.len() as f64;
    let mut issues = Vec::new();

    let low = entries.iter().filter(|f| f.rating <= 2).count() as f64;
    if low > total * 0.2 {
        issues.push(LOW_RATINGS_ISSUE.to_string());
    }

    for (theme, markers) in ISSUE_THEMES {
        let count = entries
            .iter()
            .filter_map(|f| f.comment.as_deref())
            .map(str::to_lowercase)
            .filter(|c| markers.iter().any(|m| c.contains(m)))
            .count();
        if count > 0 && count as f64 >= total * 0.1 {
            issues.push(theme.to_string());
        }
    }

    issues
}

fn improvement_suggestions(kind: FeedbackType, average: f64, issues: &[String]) -> Vec<String> {
    let mut suggestions = Vec::new();

    if average < 3.0 {
        suggestions.push("Overall user satisfaction is low - consider major improvements");
    } else if average < 4.0 {
        suggestions.push("User satisfaction is moderate - focus on key pain points");
    }

    let has = |theme: &str| issues.iter().any(|i| i == theme);
    if has("Performance Issues") {
        suggestions.push("Optimize system performance and reduce loading times");
    }
    if has("Usability Issues") {
        suggestions.push("Improve user interface and user experience design");
    }
    if has("Accuracy Issues") {
        suggestions.push("Enhance recommendation accuracy and data quality");
    }
    if has("Missing Information") {
        suggestions.push("Expand content and information coverage");
    }

    suggestions.extend_from_slice(kind.suggestions());
    suggestions
        .into_iter()
        .take(MAX_SUGGESTIONS)
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::usage_monitor::ManualClock;
    use approx::assert_relative_eq;
    use chrono::TimeZone;

    fn clock() -> Arc<ManualClock> {
        Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 9, 1, 12, 0, 0).unwrap(),
        ))
    }

    fn new_feedback(kind: FeedbackType, rating: u8, comment: Option<&str>) -> NewFeedback {
        NewFeedback {
            user_id: "student-1".to_string(),
            session_id: "s1".to_string(),
            feedback_type: kind,
            rating,
            comment: comment.map(String::from),
            context: BTreeMap::new(),
        }
    }

    #[test]
    fn test_rating_out_of_range_rejected() {
        let mut store = FeedbackStore::in_memory(clock());
        for rating in [0, 6] {
            let err = store
                .submit(new_feedback(FeedbackType::Quiz, rating, None))
                .unwrap_err();
            assert!(matches!(err, PathNitiError::InvalidInput(_)));
        }
        assert!(store.entries().is_empty());
    }

    #[test]
    fn test_submit_assigns_id_and_time() {
        let clock = clock();
        let mut store = FeedbackStore::in_memory(clock.clone());
        let entry = store
            .submit(new_feedback(FeedbackType::Career, 4, Some("  ")))
            .unwrap();
        assert_eq!(entry.feedback_id.len(), 36);
        assert_eq!(entry.timestamp, clock.now());
        assert!(entry.comment.is_none());
        assert!(!entry.processed);
    }

    #[test]
    fn test_summary_windows_and_trend() {
        let clock = clock();
        let mut store = FeedbackStore::in_memory(clock.clone());

        store.submit(new_feedback(FeedbackType::Quiz, 2, None)).unwrap();
        store.submit(new_feedback(FeedbackType::Quiz, 3, None)).unwrap();
        clock.advance(Duration::days(10));
        store.submit(new_feedback(FeedbackType::Career, 5, None)).unwrap();

        let summary = store.summary(None, 30);
        assert_eq!(summary.total_feedback, 3);
        assert_relative_eq!(summary.average_rating, 10.0 / 3.0);
        assert_eq!(summary.rating_distribution.len(), 5);
        assert_eq!(summary.rating_distribution[&1], 0);
        assert_eq!(summary.rating_distribution[&5], 1);
        assert_eq!(summary.feedback_types[&FeedbackType::Quiz], 2);

        let trend = summary.recent_trends.unwrap();
        assert_eq!(trend.recent_count, 1);
        assert_relative_eq!(trend.recent_average, 5.0);
        assert_eq!(trend.trend_direction, TrendDirection::Improving);

        let quiz_only = store.summary(Some(FeedbackType::Quiz), 30);
        assert_eq!(quiz_only.total_feedback, 2);
        assert_eq!(
            quiz_only.recent_trends.unwrap().trend_direction,
            TrendDirection::Declining
        );

        let last_week = store.summary(None, 7);
        assert_eq!(last_week.total_feedback, 1);
    }

    #[test]
    fn test_empty_summary() {
        let store = FeedbackStore::in_memory(clock());
        let summary = store.summary(Some(FeedbackType::College), 30);
        assert_eq!(summary.total_feedback, 0);
        assert_eq!(summary.average_rating, 0.0);
        assert!(summary.rating_distribution.is_empty());
        assert!(summary.recent_trends.is_none());
    }

    #[test]
    fn test_analysis_flags_issues_and_suggestions() {
        let mut store = FeedbackStore::in_memory(clock());
        store
            .submit(new_feedback(
                FeedbackType::Recommendation,
                1,
                Some("Wrong stream, very slow"),
            ))
            .unwrap();
        store
            .submit(new_feedback(
                FeedbackType::Recommendation,
                2,
                Some("Confusing and unclear"),
            ))
            .unwrap();
        store
            .submit(new_feedback(
                FeedbackType::Recommendation,
                5,
                Some("Great and helpful"),
            ))
            .unwrap();
        store
            .submit(new_feedback(FeedbackType::Quiz, 5, None))
            .unwrap();

        let analysis = store.analyze(FeedbackType::Recommendation);
        assert_eq!(analysis.total_feedback, 3);
        assert_relative_eq!(analysis.average_rating, 8.0 / 3.0);
        assert_eq!(
            analysis.common_issues,
            vec![
                "High number of low ratings",
                "Performance Issues",
                "Usability Issues",
                "Accuracy Issues",
            ]
        );
        assert_eq!(analysis.improvement_suggestions.len(), 5);
        assert_eq!(
            analysis.improvement_suggestions[0],
            "Overall user satisfaction is low - consider major improvements"
        );
        assert_eq!(
            analysis.improvement_suggestions[4],
            "Implement more personalized recommendation algorithms"
        );

        // ratings: (-1.0, -0.5, 1.0) -> -1/6; comments: (-1.0, -1.0, 1.0) -> -1/3
        let expected = (-1.0 / 6.0) * 0.7 + (-1.0 / 3.0) * 0.3;
        assert_relative_eq!(analysis.sentiment_score, expected, epsilon = 1e-12);
    }

    #[test]
    fn test_analysis_without_feedback() {
        let store = FeedbackStore::in_memory(clock());
        let analysis = store.analyze(FeedbackType::General);
        assert_eq!(analysis.total_feedback, 0);
        assert!(analysis.common_issues.is_empty());
        assert!(analysis.improvement_suggestions.is_empty());
    }

    #[test]
    fn test_feedback_type_parsing() {
        assert_eq!(
            "Career".parse::<FeedbackType>().unwrap(),
            FeedbackType::Career
        );
        assert!("poll".parse::<FeedbackType>().is_err());
    }
}
