//! Records produced and consumed by the pipeline stages.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// A job posting returned by a job board.
///
/// Identity is the `link`; the serialized field names are the jobs
/// checkpoint column names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobPosting {
    /// The job title.
    #[serde(rename = "job_title")]
    pub title: String,
    /// The hiring company.
    #[serde(default)]
    pub company: String,
    /// Canonical link to the posting.
    #[serde(rename = "job_link")]
    pub link: String,
    /// The posting body.
    #[serde(rename = "job_description", default)]
    pub description: String,
}

impl JobPosting {
    /// Creates a new posting.
    #[must_use]
    pub fn new(
        title: impl Into<String>,
        company: impl Into<String>,
        link: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            company: company.into(),
            link: link.into(),
            description: description.into(),
        }
    }

    /// Title used in prompts and headers, falling back when the board gave none.
    #[must_use]
    pub fn display_title(&self) -> &str {
        if self.title.trim().is_empty() {
            "Job"
        } else {
            &self.title
        }
    }

    /// Company used in prompts and headers, falling back when the board gave none.
    #[must_use]
    pub fn display_company(&self) -> &str {
        if self.company.trim().is_empty() {
            "Company"
        } else {
            &self.company
        }
    }
}

/// Loosely-typed fields extracted from a resume by the language model.
///
/// Every field is optional. List fields accept a single value or `null` in
/// place of an array, and scalar fields accept any JSON value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResumeProfile {
    /// Candidate name.
    #[serde(default, deserialize_with = "loose_string")]
    pub name: Option<String>,
    /// Education entries.
    #[serde(default, deserialize_with = "loose_list")]
    pub education: Vec<Value>,
    /// Skills.
    #[serde(default, deserialize_with = "loose_list")]
    pub skills: Vec<Value>,
    /// Projects.
    #[serde(default, deserialize_with = "loose_list")]
    pub projects: Vec<Value>,
    /// Work experience.
    #[serde(default, deserialize_with = "loose_list")]
    pub experience: Vec<Value>,
    /// Short professional summary.
    #[serde(default, deserialize_with = "loose_string")]
    pub summary: Option<String>,
}

impl ResumeProfile {
    /// Skills flattened to display strings.
    #[must_use]
    pub fn skill_names(&self) -> Vec<String> {
        self.skills
            .iter()
            .map(|skill| match skill {
                Value::String(s) => s.clone(),
                Value::Object(map) => map
                    .get("name")
                    .and_then(Value::as_str)
                    .map_or_else(|| skill.to_string(), str::to_string),
                other => other.to_string(),
            })
            .collect()
    }
}

fn loose_list<'de, D>(deserializer: D) -> Result<Vec<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Array(items) => items,
        Value::Null => Vec::new(),
        other => vec![other],
    })
}

fn loose_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    })
}

/// The model's structured reading of a resume.
///
/// The model is asked for JSON but is not trusted to produce it, so callers
/// must handle both outcomes. Either way `text()` is the fence-stripped
/// model output that downstream prompts embed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StructuredResume {
    /// The output decoded as a JSON object.
    Parsed {
        /// The fence-stripped model output.
        text: String,
        /// The decoded fields.
        profile: ResumeProfile,
    },
    /// The output was not a JSON object.
    Unparsed {
        /// The fence-stripped model output.
        text: String,
    },
}

impl StructuredResume {
    /// Classifies fence-stripped model output.
    #[must_use]
    pub fn classify(text: impl Into<String>) -> Self {
        let text = text.into();
        match serde_json::from_str::<Value>(&text) {
            Ok(value @ Value::Object(_)) => match serde_json::from_value(value) {
                Ok(profile) => Self::Parsed { text, profile },
                Err(_) => Self::Unparsed { text },
            },
            _ => Self::Unparsed { text },
        }
    }

    /// The stored model output.
    #[must_use]
    pub fn text(&self) -> &str {
        match self {
            Self::Parsed { text, .. } | Self::Unparsed { text } => text,
        }
    }

    /// The decoded profile, if the output was clean JSON.
    #[must_use]
    pub const fn profile(&self) -> Option<&ResumeProfile> {
        match self {
            Self::Parsed { profile, .. } => Some(profile),
            Self::Unparsed { .. } => None,
        }
    }

    /// Returns true if the output decoded as JSON.
    #[must_use]
    pub const fn is_parsed(&self) -> bool {
        matches!(self, Self::Parsed { .. })
    }
}

/// Raw and structured resume content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResumeData {
    /// Text extracted from the resume file.
    pub raw_text: String,
    /// The model's structured reading.
    pub structured: StructuredResume,
}

/// A generated cover letter for one posting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverLetter {
    /// The posting the letter answers.
    pub job: JobPosting,
    /// The letter body.
    pub letter_text: String,
}

impl CoverLetter {
    /// Creates a letter for a posting.
    #[must_use]
    pub fn new(job: JobPosting, letter_text: impl Into<String>) -> Self {
        Self {
            job,
            letter_text: letter_text.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_classify_clean_json() {
        let structured = StructuredResume::classify(r#"{"name":"A","skills":["X"]}"#);
        let profile = structured.profile().unwrap();
        assert_eq!(profile.name.as_deref(), Some("A"));
        assert_eq!(profile.skill_names(), vec!["X".to_string()]);
        assert_eq!(structured.text(), r#"{"name":"A","skills":["X"]}"#);
    }

    #[test]
    fn test_classify_prose_is_unparsed() {
        let structured = StructuredResume::classify("Here is the resume: A, skilled in X");
        assert!(!structured.is_parsed());
        assert_eq!(structured.text(), "Here is the resume: A, skilled in X");
    }

    #[test]
    fn test_classify_array_is_unparsed() {
        assert!(!StructuredResume::classify("[1, 2]").is_parsed());
    }

    #[test]
    fn test_profile_accepts_loose_shapes() {
        let structured = StructuredResume::classify(
            r#"{"name": null, "education": "BSc Physics", "skills": [{"name": "SQL"}, 3],
                "projects": null, "summary": ["analyst"]}"#,
        );
        let profile = structured.profile().unwrap();
        assert_eq!(profile.name, None);
        assert_eq!(profile.education, vec![Value::String("BSc Physics".into())]);
        assert_eq!(profile.skill_names(), vec!["SQL".to_string(), "3".to_string()]);
        assert!(profile.projects.is_empty());
        assert_eq!(profile.summary.as_deref(), Some(r#"["analyst"]"#));
    }

    #[test]
    fn test_job_display_fallbacks() {
        let job = JobPosting::new("", " ", "https://x/1", "");
        assert_eq!(job.display_title(), "Job");
        assert_eq!(job.display_company(), "Company");
    }

    #[test]
    fn test_job_serializes_checkpoint_columns() {
        let job = JobPosting::new("Analyst", "Acme", "https://x/1", "desc");
        let json = serde_json::to_value(&job).unwrap();
        assert_eq!(json["job_title"], "Analyst");
        assert_eq!(json["job_link"], "https://x/1");
        assert_eq!(json["job_description"], "desc");
    }
}
