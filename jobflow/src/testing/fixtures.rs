//! Test fixtures for pipeline testing.

use crate::core::{JobPosting, PipelineState};

/// Structured resume reply used across tests.
pub const RESUME_JSON: &str = r#"{"name":"A","skills":["X"]}"#;

/// Keyword of [`sample_state`].
pub const SAMPLE_KEYWORD: &str = "Data Analyst";

/// Location of [`sample_state`].
pub const SAMPLE_LOCATION: &str = "Dubai";

/// Creates a posting whose description names its company.
#[must_use]
pub fn posting(title: &str, company: &str, link: &str) -> JobPosting {
    JobPosting::new(title, company, link, format!("{title} role at {company}"))
}

/// Three postings where the first and last share a link.
#[must_use]
pub fn sample_postings() -> Vec<JobPosting> {
    vec![
        posting("Data Analyst", "Acme", "https://jobs.example/1"),
        posting("BI Analyst", "Globex", "https://jobs.example/2"),
        posting("Senior Data Analyst", "Acme", "https://jobs.example/1"),
    ]
}

/// Wraps model output in a ```` ```json ```` fence.
#[must_use]
pub fn fenced(json: &str) -> String {
    format!("```json\n{json}\n```")
}

/// A fresh state for one keyword and one location.
#[must_use]
pub fn sample_state() -> PipelineState {
    PipelineState::new(
        vec![SAMPLE_KEYWORD.into()],
        vec![SAMPLE_LOCATION.into()],
        "resume.pdf",
        "mistral",
    )
}
