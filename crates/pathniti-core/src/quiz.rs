use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizResponse {
    pub question_id: String,
    pub selected_answer: f64,
    /// Seconds spent on the question
    #[serde(default)]
    pub time_taken: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PerformanceLevel {
    High,
    Medium,
    Low,
}

impl PerformanceLevel {
    fn from_average(average: f64) -> Self {
        if average > 3.0 {
            PerformanceLevel::High
        } else if average > 2.0 {
            PerformanceLevel::Medium
        } else {
            PerformanceLevel::Low
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizSummary {
    pub scores: BTreeMap<String, f64>,
    pub average_score: f64,
    pub total_time: u64,
    pub performance_level: PerformanceLevel,
    pub recommendations: Vec<String>,
}

/// Fold a completed quiz into per-question scores and an overall level.
/// A repeated question id keeps its last answer.
pub fn summarize_quiz(responses: &[QuizResponse]) -> QuizSummary {
    let mut scores = BTreeMap::new();
    let mut total_time: u64 = 0;

    for response in responses {
        scores.insert(response.question_id.clone(), response.selected_answer);
        total_time = total_time.saturating_add(response.time_taken.unwrap_or(0));
    }

    let average_score = if scores.is_empty() {
        0.0
    } else {
        scores.values().sum::<f64>() / scores.len() as f64
    };

    QuizSummary {
        scores,
        average_score,
        total_time,
        performance_level: PerformanceLevel::from_average(average_score),
        recommendations: vec![
            "Focus on areas with lower scores".to_string(),
            "Consider additional practice".to_string(),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn answer(id: &str, value: f64, time: Option<u64>) -> QuizResponse {
        QuizResponse {
            question_id: id.to_string(),
            selected_answer: value,
            time_taken: time,
        }
    }

    #[test]
    fn test_empty_quiz() {
        let summary = summarize_quiz(&[]);
        assert_eq!(summary.average_score, 0.0);
        assert_eq!(summary.performance_level, PerformanceLevel::Low);
        assert_eq!(summary.total_time, 0);
    }

    #[test]
    fn test_levels_and_time() {
        let summary = summarize_quiz(&[answer("q1", 4.0, Some(30)), answer("q2", 3.0, None)]);
        assert_eq!(summary.average_score, 3.5);
        assert_eq!(summary.performance_level, PerformanceLevel::High);
        assert_eq!(summary.total_time, 30);

        let medium = summarize_quiz(&[answer("q1", 3.0, None)]);
        assert_eq!(medium.performance_level, PerformanceLevel::Medium);
    }

    #[test]
    fn test_repeated_question_keeps_last_answer() {
        let summary = summarize_quiz(&[answer("q1", 1.0, Some(5)), answer("q1", 5.0, Some(5))]);
        assert_eq!(summary.scores.len(), 1);
        assert_eq!(summary.average_score, 5.0);
        assert_eq!(summary.total_time, 10);
    }

    #[test]
    fn test_total_time_saturates() {
        let summary = summarize_quiz(&[
            answer("q1", 3.0, Some(u64::MAX)),
            answer("q2", 3.0, Some(1)),
        ]);
        assert_eq!(summary.total_time, u64::MAX);
    }
}
