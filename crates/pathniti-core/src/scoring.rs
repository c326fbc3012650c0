//! Heuristic matching of a profile against the reference catalog.
//!
//! Scores are unnormalized weighted sums that only order candidates within a
//! single request. Every weight lives in [`ScoringConfig`]; none of the
//! defaults is statistically calibrated.

use crate::profile::UserProfile;
use crate::recommendation::{
    AiEnhancement, CareerRecommendation, CollegeRecommendation, StreamRecommendation,
};
use crate::reference::{CareerReference, CollegeReference, ReferenceCatalog, StreamReference};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Tuning parameters for the heuristic scorer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Interest found among a stream's subjects
    #[serde(default = "default_interest_subject_weight")]
    pub interest_subject_weight: f64,
    /// Interest found among a stream's careers
    #[serde(default = "default_interest_career_weight")]
    pub interest_career_weight: f64,
    /// Multiplier applied to a matching quiz category score
    #[serde(default = "default_quiz_weight")]
    pub quiz_weight: f64,
    #[serde(default = "default_personality_bonus")]
    pub personality_bonus: f64,
    /// Trait value (1-5 scale) that must be exceeded for a bonus
    #[serde(default = "default_personality_threshold")]
    pub personality_threshold: f64,
    /// Assumed value for a trait the profile does not report
    #[serde(default = "default_neutral_trait_score")]
    pub neutral_trait_score: f64,
    #[serde(default = "default_age_bonus")]
    pub age_bonus: f64,
    /// Students strictly younger than this get the early-track nudge
    #[serde(default = "default_age_cutoff")]
    pub age_cutoff: u32,
    /// Stream confidence = min(score / divisor, 1.0)
    #[serde(default = "default_confidence_divisor")]
    pub confidence_divisor: f64,
    #[serde(default = "default_stream_top_k")]
    pub stream_top_k: usize,

    #[serde(default = "default_college_location_weight")]
    pub college_location_weight: f64,
    #[serde(default = "default_college_stream_weight")]
    pub college_stream_weight: f64,
    #[serde(default = "default_college_interest_weight")]
    pub college_interest_weight: f64,
    #[serde(default = "default_college_academic_weight")]
    pub college_academic_weight: f64,
    /// Fraction of the cut-off the quiz average must reach
    #[serde(default = "default_college_cutoff_ratio")]
    pub college_cutoff_ratio: f64,

    #[serde(default = "default_career_name_weight")]
    pub career_name_weight: f64,
    #[serde(default = "default_career_skill_weight")]
    pub career_skill_weight: f64,
    #[serde(default = "default_career_personality_bonus")]
    pub career_personality_bonus: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            interest_subject_weight: default_interest_subject_weight(),
            interest_career_weight: default_interest_career_weight(),
            quiz_weight: default_quiz_weight(),
            personality_bonus: default_personality_bonus(),
            personality_threshold: default_personality_threshold(),
            neutral_trait_score: default_neutral_trait_score(),
            age_bonus: default_age_bonus(),
            age_cutoff: default_age_cutoff(),
            confidence_divisor: default_confidence_divisor(),
            stream_top_k: default_stream_top_k(),
            college_location_weight: default_college_location_weight(),
            college_stream_weight: default_college_stream_weight(),
            college_interest_weight: default_college_interest_weight(),
            college_academic_weight: default_college_academic_weight(),
            college_cutoff_ratio: default_college_cutoff_ratio(),
            career_name_weight: default_career_name_weight(),
            career_skill_weight: default_career_skill_weight(),
            career_personality_bonus: default_career_personality_bonus(),
        }
    }
}

fn default_interest_subject_weight() -> f64 {
    2.0
}
fn default_interest_career_weight() -> f64 {
    3.0
}
fn default_quiz_weight() -> f64 {
    0.8
}
fn default_personality_bonus() -> f64 {
    2.0
}
fn default_personality_threshold() -> f64 {
    3.5
}
fn default_neutral_trait_score() -> f64 {
    3.0
}
fn default_age_bonus() -> f64 {
    1.0
}
fn default_age_cutoff() -> u32 {
    18
}
fn default_confidence_divisor() -> f64 {
    15.0
}
fn default_stream_top_k() -> usize {
    3
}
fn default_college_location_weight() -> f64 {
    0.4
}
fn default_college_stream_weight() -> f64 {
    0.5
}
fn default_college_interest_weight() -> f64 {
    0.1
}
fn default_college_academic_weight() -> f64 {
    0.3
}
fn default_college_cutoff_ratio() -> f64 {
    0.8
}
fn default_career_name_weight() -> f64 {
    0.3
}
fn default_career_skill_weight() -> f64 {
    0.2
}
fn default_career_personality_bonus() -> f64 {
    0.2
}

/// Case-insensitive "needle appears inside haystack".
fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

fn any_contains(items: &[String], needle: &str) -> bool {
    items.iter().any(|item| contains_ci(item, needle))
}

/// Stable sort, highest score first.
fn sort_descending<T>(items: &mut [T], score: impl Fn(&T) -> f64) {
    items.sort_by(|a, b| score(b).total_cmp(&score(a)));
}

/// Pure scorer over an immutable catalog.
#[derive(Debug, Clone)]
pub struct ScoringEngine {
    catalog: Arc<ReferenceCatalog>,
    config: ScoringConfig,
}

impl Default for ScoringEngine {
    fn default() -> Self {
        Self::new(ReferenceCatalog::builtin(), ScoringConfig::default())
    }
}

impl ScoringEngine {
    pub fn new(catalog: Arc<ReferenceCatalog>, config: ScoringConfig) -> Self {
        Self { catalog, config }
    }

    pub fn catalog(&self) -> &ReferenceCatalog {
        &self.catalog
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    fn trait_exceeds(&self, traits: &BTreeMap<String, f64>, name: &str) -> bool {
        // A zero score counts as unreported, same as a missing key.
        let value = traits
            .get(name)
            .copied()
            .filter(|v| *v != 0.0)
            .unwrap_or(self.config.neutral_trait_score);
        value > self.config.personality_threshold
    }

    /// Raw heuristic score of one stream for `profile`.
    pub fn stream_score(&self, profile: &UserProfile, stream: &StreamReference) -> f64 {
        let cfg = &self.config;
        let mut score = 0.0;

        for interest in profile.interest_tags() {
            if any_contains(&stream.subjects, interest) {
                score += cfg.interest_subject_weight;
            }
            if any_contains(&stream.careers, interest) {
                score += cfg.interest_career_weight;
            }
        }

        if let Some(quiz) = &profile.quiz_scores {
            for (category, value) in quiz {
                if any_contains(&stream.subjects, category) {
                    score += value * cfg.quiz_weight;
                }
            }
        }

        if let (Some(traits), Some(trait_name)) =
            (&profile.personality_traits, stream.boosting_trait.as_deref())
        {
            if self.trait_exceeds(traits, trait_name) {
                score += cfg.personality_bonus;
            }
        }

        if stream.early_track && profile.age.is_some_and(|age| age < cfg.age_cutoff) {
            score += cfg.age_bonus;
        }

        score
    }

    /// Top streams for the profile, at most `stream_top_k` of them.
    pub fn calculate_stream_recommendations(
        &self,
        profile: &UserProfile,
    ) -> Vec<StreamRecommendation> {
        let mut scored: Vec<(&StreamReference, f64)> = self
            .catalog
            .streams
            .iter()
            .map(|s| (s, self.stream_score(profile, s)))
            .collect();
        sort_descending(&mut scored, |(_, score)| *score);

        let highlighted = profile
            .interests
            .iter()
            .take(3)
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(", ");

        scored
            .into_iter()
            .take(self.config.stream_top_k)
            .map(|(stream, score)| StreamRecommendation {
                stream: stream.stream.clone(),
                confidence: (score / self.config.confidence_divisor).min(1.0),
                reasoning: format!(
                    "Based on your interests in {} and academic strengths",
                    highlighted
                ),
                career_paths: stream.careers.clone(),
                required_subjects: stream.subjects.clone(),
                description: stream.description.clone(),
                match_score: score,
                ai: AiEnhancement::default(),
            })
            .collect()
    }

    fn score_college(
        &self,
        profile: &UserProfile,
        college: &CollegeReference,
    ) -> (f64, Vec<String>) {
        let cfg = &self.config;
        let mut score = 0.0;
        let mut reasons = Vec::new();

        if let Some(state) = profile.state() {
            if college.location.state.as_deref() == Some(state) {
                score += cfg.college_location_weight;
                reasons.push("Located in your preferred state".to_string());
            }
        }

        if let Some(stream) = profile.stream.as_deref() {
            if college.streams.iter().any(|s| s == stream) {
                score += cfg.college_stream_weight;
                reasons.push(format!("Offers {} programs", stream));
            }
        }

        for interest in profile.interest_tags() {
            if any_contains(&college.programs, interest) {
                score += cfg.college_interest_weight;
                reasons.push(format!("Programs align with your interest in {}", interest));
            }
        }

        if let Some(quiz) = profile.quiz_scores.as_ref().filter(|q| !q.is_empty()) {
            let average = quiz.values().sum::<f64>() / quiz.len() as f64;
            if average >= college.cut_off * cfg.college_cutoff_ratio {
                score += cfg.college_academic_weight;
                reasons.push("Your academic profile matches the college requirements".to_string());
            }
        }

        (score, reasons)
    }

    /// Colleges with a positive score, best first, at most `limit`.
    pub fn calculate_college_recommendations(
        &self,
        profile: &UserProfile,
        limit: usize,
    ) -> Vec<CollegeRecommendation> {
        let mut recommendations: Vec<CollegeRecommendation> = self
            .catalog
            .colleges
            .iter()
            .filter_map(|college| {
                let (score, reasons) = self.score_college(profile, college);
                (score > 0.0).then(|| CollegeRecommendation {
                    college_id: college.id.clone(),
                    name: college.name.clone(),
                    match_score: score,
                    reasons,
                    programs: college.programs.clone(),
                    location: college.location.clone(),
                    college_type: college.college_type,
                    facilities: college.facilities.clone(),
                    ai: AiEnhancement::default(),
                })
            })
            .collect();

        sort_descending(&mut recommendations, |r| r.match_score);
        recommendations.truncate(limit);
        recommendations
    }

    fn score_career(&self, profile: &UserProfile, career: &CareerReference) -> f64 {
        let cfg = &self.config;
        let mut score = 0.0;

        for interest in profile.interest_tags() {
            if contains_ci(&career.career, interest) {
                score += cfg.career_name_weight;
            }
            if any_contains(&career.skills, interest) {
                score += cfg.career_skill_weight;
            }
        }

        if let (Some(traits), Some(trait_name)) =
            (&profile.personality_traits, career.boosting_trait.as_deref())
        {
            if self.trait_exceeds(traits, trait_name) {
                score += cfg.career_personality_bonus;
            }
        }

        score
    }

    /// Careers for the profile's stream (all careers when no stream is set),
    /// best first, at most `limit`.
    pub fn calculate_career_recommendations(
        &self,
        profile: &UserProfile,
        limit: usize,
    ) -> Vec<CareerRecommendation> {
        let mut recommendations: Vec<CareerRecommendation> = self
            .catalog
            .careers
            .iter()
            .filter(|c| profile.stream.as_deref().map_or(true, |s| c.stream == s))
            .map(|career| CareerRecommendation {
                career: career.career.clone(),
                education_path: career.education_path.clone(),
                skills_required: career.skills.clone(),
                job_opportunities: vec![career.career.clone()],
                salary_range: career.salary_range,
                growth_prospects: career.growth.clone(),
                match_score: self.score_career(profile, career),
                stream: career.stream.clone(),
                ai: AiEnhancement::default(),
            })
            .collect();

        sort_descending(&mut recommendations, |r| r.match_score);
        recommendations.truncate(limit);
        recommendations
    }
}
