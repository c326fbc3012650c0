//! A/B experiments over recommendation variants.
//!
//! Users are bucketed by a SHA-256 of `user_id:test_id`, so the same user
//! lands in the same variant on every host even before the assignment is
//! stored. Tests, results and assignments share one JSON file.

use crate::error::{PathNitiError, Result};
use crate::usage_monitor::{Clock, SystemClock};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

const SPLIT_TOLERANCE: f64 = 0.01;
const DEFAULT_PRIMARY_METRIC: &str = "click_through_rate";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestStatus {
    Draft,
    Running,
    Paused,
    Completed,
}

impl fmt::Display for TestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TestStatus::Draft => "draft",
            TestStatus::Running => "running",
            TestStatus::Paused => "paused",
            TestStatus::Completed => "completed",
        };
        f.write_str(s)
    }
}

/// One arm of an experiment. Extra keys (algorithm, parameters, ...) are kept as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variant {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(flatten)]
    pub settings: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewExperiment {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub variants: Vec<Variant>,
    pub traffic_split: Vec<f64>,
    #[serde(default = "default_duration_days")]
    pub duration_days: u32,
    #[serde(default)]
    pub metrics: Vec<String>,
    #[serde(default)]
    pub success_criteria: BTreeMap<String, f64>,
}

fn default_duration_days() -> u32 {
    30
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Experiment {
    pub test_id: String,
    pub name: String,
    pub description: String,
    pub variants: Vec<Variant>,
    pub traffic_split: Vec<f64>,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub status: TestStatus,
    pub metrics: Vec<String>,
    pub success_criteria: BTreeMap<String, f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Experiment {
    fn primary_metric(&self) -> &str {
        self.metrics
            .first()
            .map(String::as_str)
            .unwrap_or(DEFAULT_PRIMARY_METRIC)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentResult {
    pub result_id: String,
    pub test_id: String,
    pub user_id: String,
    pub variant: String,
    pub timestamp: DateTime<Utc>,
    pub metrics: BTreeMap<String, f64>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub context: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricStats {
    pub mean: f64,
    /// Population standard deviation
    pub std: f64,
    pub count: usize,
    pub min: f64,
    pub max: f64,
}

impl MetricStats {
    fn from_values(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let count = values.len();
        let mean = values.iter().sum::<f64>() / count as f64;
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / count as f64;
        Some(Self {
            mean,
            std: variance.sqrt(),
            count,
            min: values.iter().copied().fold(f64::INFINITY, f64::min),
            max: values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantReport {
    pub name: String,
    pub user_count: usize,
    pub metrics: BTreeMap<String, MetricStats>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentReport {
    pub test_id: String,
    pub status: TestStatus,
    pub total_users: usize,
    pub variants: Vec<VariantReport>,
    pub success_criteria: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisStatus {
    InsufficientData,
    InsufficientVariants,
    Completed,
    Inconclusive,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentAnalysis {
    pub test_id: String,
    pub status: AnalysisStatus,
    pub winner: Option<String>,
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub variant_scores: BTreeMap<String, f64>,
    pub analysis: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct ExperimentData {
    #[serde(default)]
    tests: BTreeMap<String, Experiment>,
    #[serde(default)]
    results: Vec<ExperimentResult>,
    /// `"{user_id}_{test_id}"` -> variant name
    #[serde(default)]
    assignments: BTreeMap<String, String>,
}

/// Position of a user in `[0, 1)` for one test.
fn bucket(user_id: &str, test_id: &str) -> f64 {
    let mut hasher = Sha256::new();
    hasher.update(user_id.as_bytes());
    hasher.update(b":");
    hasher.update(test_id.as_bytes());
    let digest = hasher.finalize();
    let mut arr = [0u8; 8];
    arr.copy_from_slice(&digest[0..8]);
    // 53 high bits map exactly onto an f64 mantissa
    (u64::from_be_bytes(arr) >> 11) as f64 / (1u64 << 53) as f64
}

fn pick_variant(split: &[f64], point: f64) -> usize {
    let mut cumulative = 0.0;
    for (i, share) in split.iter().enumerate() {
        cumulative += share;
        if point < cumulative {
            return i;
        }
    }
    split.len().saturating_sub(1)
}

fn assignment_key(user_id: &str, test_id: &str) -> String {
    format!("{}_{}", user_id, test_id)
}

pub struct ExperimentStore {
    data: ExperimentData,
    path: Option<PathBuf>,
    clock: Arc<dyn Clock>,
}

impl Default for ExperimentStore {
    fn default() -> Self {
        Self::in_memory(Arc::new(SystemClock))
    }
}

impl ExperimentStore {
    pub fn in_memory(clock: Arc<dyn Clock>) -> Self {
        Self {
            data: ExperimentData::default(),
            path: None,
            clock,
        }
    }

    /// Open the experiment file at `path`; a missing file starts empty.
    pub fn open(path: impl Into<PathBuf>, clock: Arc<dyn Clock>) -> Result<Self> {
        let path = path.into();
        let data = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            serde_json::from_str(&content)?
        } else {
            ExperimentData::default()
        };

        Ok(Self {
            data,
            path: Some(path),
            clock,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn save(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(&self.data)?)?;
        Ok(())
    }

    pub fn tests(&self) -> impl Iterator<Item = &Experiment> {
        self.data.tests.values()
    }

    pub fn test(&self, test_id: &str) -> Result<&Experiment> {
        self.data
            .tests
            .get(test_id)
            .ok_or_else(|| PathNitiError::NotFound(format!("Test {} not found", test_id)))
    }

    fn test_mut(&mut self, test_id: &str) -> Result<&mut Experiment> {
        self.data
            .tests
            .get_mut(test_id)
            .ok_or_else(|| PathNitiError::NotFound(format!("Test {} not found", test_id)))
    }

    /// Register a draft experiment.
    pub fn create_test(&mut self, new: NewExperiment) -> Result<Experiment> {
        if new.variants.is_empty() {
            return Err(PathNitiError::InvalidInput(
                "At least one variant is required".to_string(),
            ));
        }
        if new.variants.len() != new.traffic_split.len() {
            return Err(PathNitiError::InvalidInput(
                "Number of variants must match traffic split length".to_string(),
            ));
        }
        if new.traffic_split.iter().any(|s| !s.is_finite() || *s < 0.0) {
            return Err(PathNitiError::InvalidInput(
                "Traffic split shares must be non-negative".to_string(),
            ));
        }
        if (new.traffic_split.iter().sum::<f64>() - 1.0).abs() > SPLIT_TOLERANCE {
            return Err(PathNitiError::InvalidInput(
                "Traffic split must sum to 1.0".to_string(),
            ));
        }
        let mut names = HashSet::new();
        for variant in &new.variants {
            if variant.name.trim().is_empty() || !names.insert(variant.name.as_str()) {
                return Err(PathNitiError::InvalidInput(format!(
                    "Variant names must be unique and non-empty: {:?}",
                    variant.name
                )));
            }
        }

        let now = self.clock.now();
        let test = Experiment {
            test_id: Uuid::new_v4().to_string(),
            name: new.name,
            description: new.description,
            variants: new.variants,
            traffic_split: new.traffic_split,
            start_date: now,
            end_date: now + Duration::days(i64::from(new.duration_days)),
            status: TestStatus::Draft,
            metrics: new.metrics,
            success_criteria: new.success_criteria,
            created_at: now,
            updated_at: now,
        };

        self.data.tests.insert(test.test_id.clone(), test.clone());
        self.save()?;
        info!("Created A/B test {} ({})", test.test_id, test.name);
        Ok(test)
    }

    fn transition(
        &mut self,
        test_id: &str,
        from: &[TestStatus],
        to: TestStatus,
    ) -> Result<Experiment> {
        let now = self.clock.now();
        let test = self.test_mut(test_id)?;
        if !from.contains(&test.status) {
            return Err(PathNitiError::InvalidInput(format!(
                "Test {} is {}, cannot move to {}",
                test_id, test.status, to
            )));
        }

        match to {
            TestStatus::Running if test.status == TestStatus::Draft => test.start_date = now,
            TestStatus::Completed => test.end_date = now,
            _ => {}
        }
        test.status = to;
        test.updated_at = now;
        let snapshot = test.clone();

        self.save()?;
        info!("Test {} is now {}", test_id, to);
        Ok(snapshot)
    }

    /// Draft or paused -> running.
    pub fn start_test(&mut self, test_id: &str) -> Result<Experiment> {
        self.transition(
            test_id,
            &[TestStatus::Draft, TestStatus::Paused],
            TestStatus::Running,
        )
    }

    pub fn pause_test(&mut self, test_id: &str) -> Result<Experiment> {
        self.transition(test_id, &[TestStatus::Running], TestStatus::Paused)
    }

    pub fn stop_test(&mut self, test_id: &str) -> Result<Experiment> {
        self.transition(
            test_id,
            &[TestStatus::Running, TestStatus::Paused],
            TestStatus::Completed,
        )
    }

    /// Variant for `user_id` in a running test. Repeat calls return the same name.
    pub fn assign_user_to_variant(&mut self, user_id: &str, test_id: &str) -> Result<String> {
        let test = self.test(test_id)?;
        if test.status != TestStatus::Running {
            return Err(PathNitiError::InvalidInput(format!(
                "Test {} is not running",
                test_id
            )));
        }

        let key = assignment_key(user_id, test_id);
        if let Some(variant) = self.data.assignments.get(&key) {
            return Ok(variant.clone());
        }

        let index = pick_variant(&test.traffic_split, bucket(user_id, test_id));
        let variant = test.variants[index].name.clone();
        debug!("Assigned {} to {} in test {}", user_id, variant, test_id);

        self.data.assignments.insert(key, variant.clone());
        self.save()?;
        Ok(variant)
    }

    /// Store metrics observed for an assigned user.
    pub fn record_result(
        &mut self,
        test_id: &str,
        user_id: &str,
        metrics: BTreeMap<String, f64>,
        context: BTreeMap<String, serde_json::Value>,
    ) -> Result<ExperimentResult> {
        self.test(test_id)?;
        let variant = self
            .data
            .assignments
            .get(&assignment_key(user_id, test_id))
            .cloned()
            .ok_or_else(|| {
                PathNitiError::InvalidInput(format!(
                    "User {} not assigned to test {}",
                    user_id, test_id
                ))
            })?;

        let result = ExperimentResult {
            result_id: Uuid::new_v4().to_string(),
            test_id: test_id.to_string(),
            user_id: user_id.to_string(),
            variant,
            timestamp: self.clock.now(),
            metrics,
            context,
        };
        self.data.results.push(result.clone());
        self.save()?;
        Ok(result)
    }

    /// Per-variant metric statistics. A metric a result lacks counts as 0.
    pub fn test_results(&self, test_id: &str) -> Result<ExperimentReport> {
        let test = self.test(test_id)?;
        let results: Vec<&ExperimentResult> = self
            .data
            .results
            .iter()
            .filter(|r| r.test_id == test_id)
            .collect();

        let variants = test
            .variants
            .iter()
            .map(|variant| {
                let rows: Vec<&ExperimentResult> = results
                    .iter()
                    .copied()
                    .filter(|r| r.variant == variant.name)
                    .collect();
                let metrics = test
                    .metrics
                    .iter()
                    .filter_map(|metric| {
                        let values: Vec<f64> = rows
                            .iter()
                            .map(|r| r.metrics.get(metric).copied().unwrap_or(0.0))
                            .collect();
                        MetricStats::from_values(&values).map(|stats| (metric.clone(), stats))
                    })
                    .collect();
                VariantReport {
                    name: variant.name.clone(),
                    user_count: rows.len(),
                    metrics,
                }
            })
            .collect();

        Ok(ExperimentReport {
            test_id: test_id.to_string(),
            status: test.status,
            total_users: results.len(),
            variants,
            success_criteria: test.success_criteria.clone(),
        })
    }

    /// Compare variants on the first listed metric.
    ///
    /// Confidence grows with sample size: `min(0.95, 0.5 + users / 1000 * 0.45)`.
    pub fn analyze_test(&self, test_id: &str) -> Result<ExperimentAnalysis> {
        let report = self.test_results(test_id)?;
        let test = self.test(test_id)?;

        if report.total_users == 0 {
            return Ok(ExperimentAnalysis {
                test_id: test_id.to_string(),
                status: AnalysisStatus::InsufficientData,
                winner: None,
                confidence: 0.0,
                variant_scores: BTreeMap::new(),
                analysis: "No data available for analysis".to_string(),
            });
        }

        if report.variants.len() < 2 {
            return Ok(ExperimentAnalysis {
                test_id: test_id.to_string(),
                status: AnalysisStatus::InsufficientVariants,
                winner: None,
                confidence: 0.0,
                variant_scores: BTreeMap::new(),
                analysis: "Need at least 2 variants for comparison".to_string(),
            });
        }

        let primary = test.primary_metric();
        let scores: Vec<(&str, f64)> = report
            .variants
            .iter()
            .map(|v| {
                let score = v.metrics.get(primary).map_or(0.0, |m| m.mean);
                (v.name.as_str(), score)
            })
            .collect();

        // first variant wins ties
        let (winner, winner_score) = scores
            .iter()
            .copied()
            .fold(scores[0], |best, next| if next.1 > best.1 { next } else { best });

        let confidence = (0.5 + report.total_users as f64 / 1000.0 * 0.45).min(0.95);
        let threshold = test.success_criteria.get(primary).copied().unwrap_or(0.0);
        let meets_criteria = winner_score >= threshold;

        let (status, winner_name, analysis) = if meets_criteria {
            (
                AnalysisStatus::Completed,
                Some(winner.to_string()),
                format!("Winner: {} with {}: {:.4}", winner, primary, winner_score),
            )
        } else {
            (
                AnalysisStatus::Inconclusive,
                None,
                format!(
                    "No variant met success criteria. Best: {} with {}: {:.4}",
                    winner, primary, winner_score
                ),
            )
        };

        Ok(ExperimentAnalysis {
            test_id: test_id.to_string(),
            status,
            winner: winner_name,
            confidence,
            variant_scores: scores
                .into_iter()
                .map(|(name, score)| (name.to_string(), score))
                .collect(),
            analysis,
        })
    }
}
