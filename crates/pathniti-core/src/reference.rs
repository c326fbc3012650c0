//! Read-only reference tables the scoring engine ranks against.
//!
//! The built-in catalog is the hand-curated data set shipped with the
//! application. Deployments can point `catalog.path` at a JSON file with the
//! same shape instead; either way the catalog is never mutated after load.

use crate::error::{PathNitiError, Result};
use crate::profile::Location;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamReference {
    pub stream: String,
    pub subjects: Vec<String>,
    pub careers: Vec<String>,
    pub description: String,
    /// Personality trait whose high score favours this stream
    #[serde(default)]
    pub boosting_trait: Option<String>,
    /// Receives the nudge for students under the age cut-off
    #[serde(default)]
    pub early_track: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollegeType {
    Government,
    Private,
    Aided,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollegeReference {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub college_type: CollegeType,
    pub location: Location,
    pub programs: Vec<String>,
    pub streams: Vec<String>,
    pub cut_off: f64,
    pub facilities: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalaryRange {
    pub min: u64,
    pub max: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CareerReference {
    pub career: String,
    pub stream: String,
    pub education_path: Vec<String>,
    pub skills: Vec<String>,
    pub salary_range: SalaryRange,
    pub growth: String,
    #[serde(default)]
    pub boosting_trait: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceCatalog {
    pub streams: Vec<StreamReference>,
    pub colleges: Vec<CollegeReference>,
    pub careers: Vec<CareerReference>,
}

static BUILTIN: Lazy<Arc<ReferenceCatalog>> = Lazy::new(|| Arc::new(ReferenceCatalog::seed()));

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn stream(
    name: &str,
    subjects: &[&str],
    careers: &[&str],
    description: &str,
    boosting_trait: Option<&str>,
    early_track: bool,
) -> StreamReference {
    StreamReference {
        stream: name.to_string(),
        subjects: strings(subjects),
        careers: strings(careers),
        description: description.to_string(),
        boosting_trait: boosting_trait.map(str::to_string),
        early_track,
    }
}

fn delhi() -> Location {
    Location {
        state: Some("Delhi".to_string()),
        city: Some("New Delhi".to_string()),
    }
}

impl ReferenceCatalog {
    /// Shared handle to the built-in tables.
    pub fn builtin() -> Arc<ReferenceCatalog> {
        BUILTIN.clone()
    }

    /// Load a catalog from a JSON file.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let catalog: ReferenceCatalog = serde_json::from_str(&content)?;
        catalog.validate()?;
        info!(
            "Loaded reference catalog from {} ({} streams, {} colleges, {} careers)",
            path.display(),
            catalog.streams.len(),
            catalog.colleges.len(),
            catalog.careers.len()
        );
        Ok(catalog)
    }

    pub fn validate(&self) -> Result<()> {
        if self.streams.is_empty() {
            return Err(PathNitiError::Config(
                "reference catalog must contain at least one stream".to_string(),
            ));
        }
        if let Some(c) = self.colleges.iter().find(|c| c.cut_off < 0.0) {
            return Err(PathNitiError::Config(format!(
                "college {} has a negative cut-off",
                c.id
            )));
        }
        Ok(())
    }

    pub fn stream(&self, name: &str) -> Option<&StreamReference> {
        self.streams.iter().find(|s| s.stream == name)
    }

    fn seed() -> Self {
        let streams = vec![
            stream(
                "science",
                &["Physics", "Chemistry", "Mathematics", "Biology"],
                &["Engineer", "Doctor", "Scientist", "Researcher", "Data Scientist"],
                "Focus on scientific subjects and analytical thinking",
                Some("openness"),
                true,
            ),
            stream(
                "arts",
                &["History", "Geography", "Political Science", "Literature", "Psychology"],
                &["Teacher", "Journalist", "Lawyer", "Social Worker", "Writer"],
                "Focus on humanities and social sciences",
                Some("agreeableness"),
                false,
            ),
            stream(
                "commerce",
                &["Accountancy", "Business Studies", "Economics", "Mathematics"],
                &["CA", "MBA", "Banking", "Finance", "Business Analyst"],
                "Focus on business and financial subjects",
                Some("conscientiousness"),
                true,
            ),
            stream(
                "engineering",
                &["Mathematics", "Physics", "Chemistry", "Computer Science"],
                &["Software Engineer", "Mechanical Engineer", "Civil Engineer", "Data Scientist"],
                "Focus on technical and engineering subjects",
                None,
                false,
            ),
            stream(
                "medical",
                &["Biology", "Chemistry", "Physics", "Mathematics"],
                &["Doctor", "Nurse", "Pharmacist", "Medical Researcher"],
                "Focus on medical and healthcare subjects",
                None,
                false,
            ),
        ];

        let colleges = vec![
            CollegeReference {
                id: "1".to_string(),
                name: "Delhi University".to_string(),
                college_type: CollegeType::Government,
                location: delhi(),
                programs: strings(&["B.A.", "B.Sc.", "B.Com.", "B.Tech"]),
                streams: strings(&["arts", "science", "commerce", "engineering"]),
                cut_off: 85.0,
                facilities: strings(&["hostel", "library", "sports", "labs"]),
            },
            CollegeReference {
                id: "2".to_string(),
                name: "IIT Delhi".to_string(),
                college_type: CollegeType::Government,
                location: delhi(),
                programs: strings(&["B.Tech", "M.Tech", "Ph.D"]),
                streams: strings(&["engineering"]),
                cut_off: 95.0,
                facilities: strings(&["hostel", "library", "sports", "labs", "research_center"]),
            },
            CollegeReference {
                id: "3".to_string(),
                name: "JNU".to_string(),
                college_type: CollegeType::Government,
                location: delhi(),
                programs: strings(&["B.A.", "M.A.", "Ph.D"]),
                streams: strings(&["arts"]),
                cut_off: 80.0,
                facilities: strings(&["hostel", "library", "sports"]),
            },
        ];

        let careers = vec![
            CareerReference {
                career: "Software Engineer".to_string(),
                stream: "engineering".to_string(),
                education_path: strings(&["B.Tech Computer Science", "M.Tech (Optional)"]),
                skills: strings(&["Programming", "Problem Solving", "Mathematics", "Algorithms"]),
                salary_range: SalaryRange {
                    min: 500_000,
                    max: 2_000_000,
                },
                growth: "High".to_string(),
                boosting_trait: Some("openness".to_string()),
            },
            CareerReference {
                career: "Doctor".to_string(),
                stream: "medical".to_string(),
                education_path: strings(&["MBBS", "MD/MS (Specialization)"]),
                skills: strings(&["Biology", "Chemistry", "Empathy", "Communication"]),
                salary_range: SalaryRange {
                    min: 800_000,
                    max: 3_000_000,
                },
                growth: "High".to_string(),
                boosting_trait: Some("agreeableness".to_string()),
            },
            CareerReference {
                career: "Teacher".to_string(),
                stream: "arts".to_string(),
                education_path: strings(&["B.Ed", "M.A. in Subject"]),
                skills: strings(&["Communication", "Patience", "Subject Knowledge"]),
                salary_range: SalaryRange {
                    min: 300_000,
                    max: 800_000,
                },
                growth: "Medium".to_string(),
                boosting_trait: None,
            },
            CareerReference {
                career: "Data Scientist".to_string(),
                stream: "science".to_string(),
                education_path: strings(&[
                    "B.Sc. Mathematics/Statistics",
                    "M.Sc./M.Tech Data Science",
                ]),
                skills: strings(&["Statistics", "Programming", "Machine Learning", "Mathematics"]),
                salary_range: SalaryRange {
                    min: 600_000,
                    max: 2_500_000,
                },
                growth: "Very High".to_string(),
                boosting_trait: None,
            },
        ];

        Self {
            streams,
            colleges,
            careers,
        }
    }
}
