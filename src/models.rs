use serde::{Deserialize, Serialize};

/// Candidate record as issued by the server on lookup-by-email.
/// Read-only on the client; a subset of it goes into the session store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub uuid: String,
    pub candidate_id: i64,
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: i64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub department: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub requirements: Vec<String>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

impl Job {
    /// An absent `isActive` flag counts as active; only an explicit
    /// `false` excludes a job from the listing.
    pub fn is_open(&self) -> bool {
        self.is_active != Some(false)
    }
}

/// Filters a freshly fetched listing down to active postings, preserving
/// server order.
pub fn active_jobs(jobs: Vec<Job>) -> Vec<Job> {
    jobs.into_iter().filter(Job::is_open).collect()
}

/// Per-submit request record. Built for one gateway call, never stored.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationSubmission {
    pub candidate_id: i64,
    pub job_id: i64,
    pub repo_url: String,
}

/// Logical result of an application submit. `ok: false` is a normal
/// outcome here, not a gateway failure.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ApplyReceipt {
    #[serde(default)]
    pub ok: bool,
    #[serde(default)]
    pub message: Option<String>,
}
