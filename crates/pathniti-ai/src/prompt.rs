//! Prompt text sent to the provider.

use pathniti_core::{RecommendationKind, UserProfile};
use serde::Serialize;
use std::fmt::Write;

const NOT_SPECIFIED: &str = "Not specified";
const NO_CONTEXT: &str = "No additional context provided";
const ENHANCE_PREAMBLE: &str = "You are an expert career counselor for Indian students. \
     Based on the user profile and current recommendations, provide enhanced insights.";

fn or_not_specified(value: Option<&str>) -> &str {
    value.filter(|v| !v.is_empty()).unwrap_or(NOT_SPECIFIED)
}

fn profile_section(profile: &UserProfile) -> String {
    let age = profile
        .age
        .filter(|a| *a > 0)
        .map(|a| a.to_string())
        .unwrap_or_else(|| NOT_SPECIFIED.to_string());
    let quiz = serde_json::to_string(&profile.quiz_scores.clone().unwrap_or_default())
        .unwrap_or_else(|_| "{}".to_string());
    let traits = serde_json::to_string(&profile.personality_traits.clone().unwrap_or_default())
        .unwrap_or_else(|_| "{}".to_string());

    let mut out = String::from("User Profile:\n");
    let _ = writeln!(out, "- Age: {}", age);
    let _ = writeln!(
        out,
        "- Class Level: {}",
        or_not_specified(profile.class_level.as_deref())
    );
    let _ = writeln!(out, "- Stream: {}", or_not_specified(profile.stream.as_deref()));
    let _ = writeln!(out, "- Interests: {}", profile.interests.join(", "));
    let _ = writeln!(out, "- Location: {}", or_not_specified(profile.state()));
    let _ = writeln!(out, "- Quiz Scores: {}", quiz);
    let _ = writeln!(out, "- Personality Traits: {}", traits);
    out
}

/// Prompt asking the model to comment on an already-ranked list.
pub fn build_enhancement_prompt<R: Serialize>(
    kind: RecommendationKind,
    profile: &UserProfile,
    recommendations: &[R],
) -> String {
    let listing =
        serde_json::to_string_pretty(recommendations).unwrap_or_else(|_| "[]".to_string());

    format!(
        r#"{preamble}

{profile}
Current {kind} recommendations:
{listing}

Please provide:
1. Enhanced reasoning for each recommendation
2. Additional career paths or opportunities
3. Specific advice for this student
4. Any missing recommendations that would be valuable

Focus on:
- Indian education system context
- Current job market trends
- Practical career advice
- Specific skills to develop

Respond in JSON format as a single object with three arrays of strings,
"reasoning", "insights" and "advice", each holding one entry per
recommendation in the order given above.
"#,
        preamble = ENHANCE_PREAMBLE,
        profile = profile_section(profile),
        kind = kind,
        listing = listing,
    )
}

/// Wraps a counselor question in the template for its topic.
pub fn build_counsel_prompt(
    template: Option<&CounselTemplate>,
    prompt: &str,
    context: Option<&str>,
) -> String {
    let Some(template) = template else {
        return prompt.to_string();
    };
    let context = context.filter(|c| !c.trim().is_empty()).unwrap_or(NO_CONTEXT);

    let mut out = format!(
        "You are an expert {} for Indian students. {}\n\n\
         Context: {}\n\nUser Question: {}\n\nPlease provide:\n",
        template.role, template.lead, context, prompt
    );
    for (i, item) in template.asks.iter().enumerate() {
        let _ = writeln!(out, "{}. {}", i + 1, item);
    }
    let _ = write!(out, "\n{}\n", template.closing);
    out
}

/// Fixed wording for one counselor topic.
#[derive(Debug, Clone, Copy)]
pub struct CounselTemplate {
    pub role: &'static str,
    pub lead: &'static str,
    pub asks: &'static [&'static str],
    pub closing: &'static str,
}

pub const CAREER_ADVICE: CounselTemplate = CounselTemplate {
    role: "career counselor",
    lead: "Provide personalized career advice based on the following context:",
    asks: &[
        "Specific, actionable advice",
        "Consider the Indian education system and job market",
        "Mention relevant skills to develop",
        "Suggest concrete next steps",
        "Be encouraging and realistic",
    ],
    closing: "Format your response in a clear, structured way.",
};

pub const STREAM_SELECTION: CounselTemplate = CounselTemplate {
    role: "academic counselor",
    lead: "Help with stream selection based on:",
    asks: &[
        "Analysis of different stream options",
        "Pros and cons of each stream",
        "Career opportunities for each stream",
        "Required subjects and skills",
        "Future prospects in the Indian context",
    ],
    closing: "Be specific and practical in your advice.",
};

pub const COLLEGE_GUIDANCE: CounselTemplate = CounselTemplate {
    role: "college counselor",
    lead: "Provide college guidance based on:",
    asks: &[
        "College recommendations based on the student's profile",
        "Admission requirements and cut-offs",
        "Course details and specializations",
        "Campus life and facilities",
        "Placement statistics and career prospects",
    ],
    closing: "Focus on Indian colleges and universities.",
};

#[cfg(test)]
mod tests {
    use super::*;
    use pathniti_core::Location;
    use std::collections::BTreeMap;

    #[test]
    fn test_missing_fields_read_not_specified() {
        let mut profile = UserProfile::new("u1");
        profile.interests = vec!["Mathematics".into(), "Physics".into()];

        let prompt = build_enhancement_prompt::<serde_json::Value>(
            RecommendationKind::Stream,
            &profile,
            &[],
        );
        assert!(prompt.contains("- Age: Not specified"));
        assert!(prompt.contains("- Class Level: Not specified"));
        assert!(prompt.contains("- Location: Not specified"));
        assert!(prompt.contains("- Interests: Mathematics, Physics"));
        assert!(prompt.contains("- Quiz Scores: {}"));
        assert!(prompt.contains("Current stream recommendations:"));
    }

    #[test]
    fn test_profile_values_and_listing_included() {
        let mut profile = UserProfile::new("u2");
        profile.age = Some(16);
        profile.location = Some(Location {
            state: Some("Delhi".into()),
            city: None,
        });
        profile.quiz_scores = Some(BTreeMap::from([("math".to_string(), 4.0)]));

        let recs = vec![serde_json::json!({"career": "Teacher"})];
        let prompt = build_enhancement_prompt(RecommendationKind::Career, &profile, &recs);
        assert!(prompt.contains("- Age: 16"));
        assert!(prompt.contains("- Location: Delhi"));
        assert!(prompt.contains(r#"- Quiz Scores: {"math":4.0}"#));
        assert!(prompt.contains(r#""career": "Teacher""#));
        assert!(prompt.contains("\"reasoning\", \"insights\" and \"advice\""));
    }

    #[test]
    fn test_counsel_prompt_templates() {
        assert_eq!(build_counsel_prompt(None, "hello", Some("ctx")), "hello");

        let wrapped = build_counsel_prompt(Some(&STREAM_SELECTION), "Science or arts?", None);
        assert!(wrapped.starts_with("You are an expert academic counselor"));
        assert!(wrapped.contains("Context: No additional context provided"));
        assert!(wrapped.contains("User Question: Science or arts?"));
        assert!(wrapped.contains("5. Future prospects in the Indian context"));
    }
}
