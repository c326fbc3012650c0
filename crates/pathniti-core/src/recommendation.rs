use crate::profile::{Location, UserProfile};
use crate::reference::{CollegeType, SalaryRange};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Commentary merged onto a heuristic record by the AI enhancement pass.
/// Every field is omitted from JSON when unset, so an unenhanced record
/// serializes exactly like the heuristic output.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AiEnhancement {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_enhanced_reasoning: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_insights: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_advice: Option<String>,
}

impl AiEnhancement {
    pub fn is_empty(&self) -> bool {
        self.ai_enhanced_reasoning.is_none()
            && self.ai_insights.is_none()
            && self.ai_advice.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamRecommendation {
    pub stream: String,
    /// Match score rescaled to [0, 1]
    pub confidence: f64,
    pub reasoning: String,
    pub career_paths: Vec<String>,
    pub required_subjects: Vec<String>,
    pub description: String,
    pub match_score: f64,
    #[serde(flatten, default)]
    pub ai: AiEnhancement,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollegeRecommendation {
    pub college_id: String,
    pub name: String,
    pub match_score: f64,
    pub reasons: Vec<String>,
    pub programs: Vec<String>,
    pub location: Location,
    #[serde(rename = "type")]
    pub college_type: CollegeType,
    pub facilities: Vec<String>,
    #[serde(flatten, default)]
    pub ai: AiEnhancement,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CareerRecommendation {
    pub career: String,
    pub education_path: Vec<String>,
    pub skills_required: Vec<String>,
    pub job_opportunities: Vec<String>,
    pub salary_range: SalaryRange,
    pub growth_prospects: String,
    pub match_score: f64,
    pub stream: String,
    #[serde(flatten, default)]
    pub ai: AiEnhancement,
}

/// Records that can carry AI commentary.
pub trait Enhanceable: Serialize {
    /// The record's own rationale, used when the model supplies none.
    fn base_reasoning(&self) -> Option<&str>;

    fn enhancement_mut(&mut self) -> &mut AiEnhancement;

    /// Value averaged into a report's overall confidence.
    fn summary_score(&self) -> f64;
}

impl Enhanceable for StreamRecommendation {
    fn base_reasoning(&self) -> Option<&str> {
        Some(&self.reasoning)
    }

    fn enhancement_mut(&mut self) -> &mut AiEnhancement {
        &mut self.ai
    }

    fn summary_score(&self) -> f64 {
        if self.confidence != 0.0 {
            self.confidence
        } else {
            self.match_score
        }
    }
}

impl Enhanceable for CollegeRecommendation {
    fn base_reasoning(&self) -> Option<&str> {
        None
    }

    fn enhancement_mut(&mut self) -> &mut AiEnhancement {
        &mut self.ai
    }

    fn summary_score(&self) -> f64 {
        self.match_score
    }
}

impl Enhanceable for CareerRecommendation {
    fn base_reasoning(&self) -> Option<&str> {
        None
    }

    fn enhancement_mut(&mut self) -> &mut AiEnhancement {
        &mut self.ai
    }

    fn summary_score(&self) -> f64 {
        self.match_score
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RecommendationKind {
    #[default]
    Stream,
    College,
    Career,
}

impl RecommendationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecommendationKind::Stream => "stream",
            RecommendationKind::College => "college",
            RecommendationKind::Career => "career",
        }
    }

    /// Parse a kind selector, treating anything unrecognised as `stream`.
    pub fn parse_lenient(value: &str) -> Self {
        value.parse().unwrap_or_default()
    }
}

impl fmt::Display for RecommendationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecommendationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "stream" => Ok(RecommendationKind::Stream),
            "college" => Ok(RecommendationKind::College),
            "career" => Ok(RecommendationKind::Career),
            other => Err(format!("unknown recommendation kind: {}", other)),
        }
    }
}

/// One ranked record of any kind, discriminated by `kind` in JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Recommendation {
    Stream(StreamRecommendation),
    College(CollegeRecommendation),
    Career(CareerRecommendation),
}

impl Recommendation {
    pub fn kind(&self) -> RecommendationKind {
        match self {
            Recommendation::Stream(_) => RecommendationKind::Stream,
            Recommendation::College(_) => RecommendationKind::College,
            Recommendation::Career(_) => RecommendationKind::Career,
        }
    }

    pub fn match_score(&self) -> f64 {
        match self {
            Recommendation::Stream(r) => r.match_score,
            Recommendation::College(r) => r.match_score,
            Recommendation::Career(r) => r.match_score,
        }
    }

    pub fn summary_score(&self) -> f64 {
        match self {
            Recommendation::Stream(r) => r.summary_score(),
            Recommendation::College(r) => r.summary_score(),
            Recommendation::Career(r) => r.summary_score(),
        }
    }
}

impl From<StreamRecommendation> for Recommendation {
    fn from(value: StreamRecommendation) -> Self {
        Recommendation::Stream(value)
    }
}

impl From<CollegeRecommendation> for Recommendation {
    fn from(value: CollegeRecommendation) -> Self {
        Recommendation::College(value)
    }
}

impl From<CareerRecommendation> for Recommendation {
    fn from(value: CareerRecommendation) -> Self {
        Recommendation::Career(value)
    }
}

pub const REPORT_REASONING: &str =
    "AI-powered recommendations based on your profile, interests, and quiz results.";

/// Response envelope returned to callers asking for one kind of recommendation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationReport {
    pub kind: RecommendationKind,
    pub recommendations: Vec<Recommendation>,
    /// Mean of each record's confidence (streams) or match score
    pub confidence_score: f64,
    pub reasoning: String,
    pub user_profile: UserProfile,
}

impl RecommendationReport {
    pub fn new(
        kind: RecommendationKind,
        recommendations: Vec<Recommendation>,
        user_profile: UserProfile,
    ) -> Self {
        let confidence_score = if recommendations.is_empty() {
            0.0
        } else {
            recommendations.iter().map(|r| r.summary_score()).sum::<f64>()
                / recommendations.len() as f64
        };

        Self {
            kind,
            recommendations,
            confidence_score,
            reasoning: REPORT_REASONING.to_string(),
            user_profile,
        }
    }
}
