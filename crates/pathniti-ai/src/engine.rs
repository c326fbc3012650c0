use crate::enhancer::{AiEnhancer, EnhancementSkipped};
use crate::llm_factory::LLMProviderFactory;
use pathniti_core::{
    CareerRecommendation, CollegeRecommendation, Enhanceable, PathNitiConfig, PathNitiError,
    Recommendation, RecommendationKind, RecommendationReport, ReferenceCatalog, RequestBudget,
    Result, ScoringEngine, StreamRecommendation, SystemClock, UsageMonitor, UsageStats,
    UserProfile,
};
use std::sync::Arc;
use tracing::{debug, warn};

/// Result size used when a caller does not ask for one.
pub const DEFAULT_LIMIT: usize = 10;

/// Heuristic ranking followed by an optional AI pass.
///
/// Every `get_*` call returns the heuristic list when the AI pass is skipped
/// for any reason, so callers never see a provider error.
#[derive(Clone)]
pub struct RecommendationEngine {
    scoring: ScoringEngine,
    enhancer: AiEnhancer,
}

impl RecommendationEngine {
    pub fn new(scoring: ScoringEngine, enhancer: AiEnhancer) -> Self {
        Self { scoring, enhancer }
    }

    /// Build the engine with its own in-process usage monitor.
    pub fn from_config(config: &PathNitiConfig) -> Result<Self> {
        let budget = Arc::new(UsageMonitor::new(
            config.usage.limits(),
            Arc::new(SystemClock),
        ));
        Self::from_config_with_budget(config, budget)
    }

    /// Build the engine against an existing budget, e.g. one shared with a
    /// [`Counselor`](crate::counselor::Counselor).
    pub fn from_config_with_budget(
        config: &PathNitiConfig,
        budget: Arc<dyn RequestBudget>,
    ) -> Result<Self> {
        let catalog = match &config.catalog.path {
            Some(path) => Arc::new(ReferenceCatalog::from_json_file(path)?),
            None => ReferenceCatalog::builtin(),
        };
        let scoring = ScoringEngine::new(catalog, config.scoring.clone());

        let provider = LLMProviderFactory::create_from_config(&config.llm)
            .map_err(|e| PathNitiError::Config(format!("{:#}", e)))?;
        let enhancer = AiEnhancer::new(
            provider,
            budget,
            LLMProviderFactory::generation_config(&config.llm),
        );

        Ok(Self::new(scoring, enhancer))
    }

    pub fn scoring(&self) -> &ScoringEngine {
        &self.scoring
    }

    pub fn enhancer(&self) -> &AiEnhancer {
        &self.enhancer
    }

    pub fn usage_stats(&self) -> UsageStats {
        self.enhancer.budget().usage_stats()
    }

    async fn enhance_or_fallback<R: Enhanceable + Clone + Send>(
        &self,
        kind: RecommendationKind,
        profile: &UserProfile,
        heuristic: Vec<R>,
    ) -> Vec<R> {
        match self
            .enhancer
            .enhance(kind, profile, heuristic.clone())
            .await
        {
            Ok(enhanced) => enhanced,
            Err(EnhancementSkipped::NotConfigured) => {
                debug!("AI enhancement disabled; returning heuristic {} list", kind);
                heuristic
            }
            Err(reason) => {
                warn!("Using fallback {} recommendations: {}", kind, reason);
                heuristic
            }
        }
    }

    pub async fn get_stream_recommendations(
        &self,
        profile: &UserProfile,
    ) -> Vec<StreamRecommendation> {
        let heuristic = self.scoring.calculate_stream_recommendations(profile);
        self.enhance_or_fallback(RecommendationKind::Stream, profile, heuristic)
            .await
    }

    pub async fn get_college_recommendations(
        &self,
        profile: &UserProfile,
        limit: usize,
    ) -> Vec<CollegeRecommendation> {
        let heuristic = self
            .scoring
            .calculate_college_recommendations(profile, limit);
        self.enhance_or_fallback(RecommendationKind::College, profile, heuristic)
            .await
    }

    pub async fn get_career_recommendations(
        &self,
        profile: &UserProfile,
        limit: usize,
    ) -> Vec<CareerRecommendation> {
        let heuristic = self.scoring.calculate_career_recommendations(profile, limit);
        self.enhance_or_fallback(RecommendationKind::Career, profile, heuristic)
            .await
    }

    /// One kind of recommendation wrapped in a report.
    pub async fn recommend(
        &self,
        kind: RecommendationKind,
        profile: &UserProfile,
        limit: Option<usize>,
    ) -> RecommendationReport {
        let limit = limit.unwrap_or(DEFAULT_LIMIT);
        let recommendations: Vec<Recommendation> = match kind {
            RecommendationKind::Stream => self
                .get_stream_recommendations(profile)
                .await
                .into_iter()
                .map(Recommendation::from)
                .collect(),
            RecommendationKind::College => self
                .get_college_recommendations(profile, limit)
                .await
                .into_iter()
                .map(Recommendation::from)
                .collect(),
            RecommendationKind::Career => self
                .get_career_recommendations(profile, limit)
                .await
                .into_iter()
                .map(Recommendation::from)
                .collect(),
        };

        RecommendationReport::new(kind, recommendations, profile.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_default_config_is_heuristic_only() {
        let engine = RecommendationEngine::from_config(&PathNitiConfig::default()).unwrap();
        assert!(!engine.enhancer().is_enabled());
        assert_eq!(engine.usage_stats().daily_limit, 15);
        assert_eq!(engine.scoring().catalog().streams.len(), 5);
    }

    #[test]
    fn test_missing_catalog_file_is_an_error() {
        let mut config = PathNitiConfig::default();
        config.catalog.path = Some("/nonexistent/pathniti-catalog.json".into());
        assert!(RecommendationEngine::from_config(&config).is_err());
    }

    #[tokio::test]
    async fn test_recommend_defaults_limit() {
        let engine = RecommendationEngine::from_config(&PathNitiConfig::default()).unwrap();
        let profile = UserProfile::new("u1");
        let report = engine
            .recommend(RecommendationKind::Career, &profile, None)
            .await;
        assert_eq!(report.kind, RecommendationKind::Career);
        assert_eq!(report.recommendations.len(), 4);
        assert_eq!(report.user_profile, profile);
    }
}
