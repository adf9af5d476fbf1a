use std::sync::OnceLock;

use regex::Regex;

use crate::api::{ChallengeApi, GatewayError};
use crate::models::{ApplicationSubmission, Candidate, Job, active_jobs};
use crate::session::{SessionIdentity, SessionStore};

pub const EMPTY_LISTING_TEXT: &str = "No active positions available at the moment.";

/// Navigation signal a flow hands back; surfaces honor it, flows never
/// navigate themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Nav {
    Stay,
    ToLogin,
    ToJobs,
}

fn github_url_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^https?://github\.com/.+").unwrap())
}

pub fn is_github_repo_url(input: &str) -> bool {
    github_url_pattern().is_match(input.trim())
}

// --- Login flow ---

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginState {
    Idle,
    Submitting,
    Success(Candidate),
    Failed(String),
}

pub struct LoginFlow {
    state: LoginState,
}

impl Default for LoginFlow {
    fn default() -> Self {
        Self::new()
    }
}

impl LoginFlow {
    pub fn new() -> Self {
        Self {
            state: LoginState::Idle,
        }
    }

    pub fn state(&self) -> &LoginState {
        &self.state
    }

    pub fn is_submitting(&self) -> bool {
        matches!(self.state, LoginState::Submitting)
    }

    /// Marks the flow busy so a surface can draw its spinner frame before
    /// the blocking call runs. An empty email is a no-op precondition
    /// failure, not an error.
    pub fn begin_submit(&mut self, email: &str) -> bool {
        if email.trim().is_empty() {
            return false;
        }
        self.state = LoginState::Submitting;
        true
    }

    pub fn submit(
        &mut self,
        api: &dyn ChallengeApi,
        store: &mut dyn SessionStore,
        email: &str,
    ) -> Nav {
        if !self.is_submitting() && !self.begin_submit(email) {
            return Nav::Stay;
        }
        match api.lookup_candidate_by_email(email.trim()) {
            Ok(candidate) => {
                SessionIdentity::persist(store, &candidate);
                self.state = LoginState::Success(candidate);
                Nav::ToJobs
            }
            Err(err) => {
                self.state = LoginState::Failed(login_failure_text(err));
                Nav::Stay
            }
        }
    }
}

fn login_failure_text(err: GatewayError) -> String {
    match err {
        GatewayError::Api(api) => api.message,
        GatewayError::Malformed => "Invalid response from server".to_string(),
        GatewayError::Connection(msg) if msg.is_empty() => "Connection error".to_string(),
        GatewayError::Connection(msg) => msg,
    }
}

// --- Listing flow ---

#[derive(Debug, Clone, PartialEq)]
pub enum ListingState {
    CheckingIdentity,
    Redirecting,
    Loading,
    Loaded(Vec<Job>),
    Failed(String),
}

pub struct ListingFlow {
    state: ListingState,
    identity: Option<SessionIdentity>,
}

impl Default for ListingFlow {
    fn default() -> Self {
        Self::new()
    }
}

impl ListingFlow {
    pub fn new() -> Self {
        Self {
            state: ListingState::CheckingIdentity,
            identity: None,
        }
    }

    pub fn state(&self) -> &ListingState {
        &self.state
    }

    pub fn identity(&self) -> Option<&SessionIdentity> {
        self.identity.as_ref()
    }

    /// Identity gate: without a stored candidate id the flow redirects
    /// and never fetches.
    pub fn mount(&mut self, store: &dyn SessionStore) -> Nav {
        match SessionIdentity::load(store) {
            Some(identity) => {
                self.identity = Some(identity);
                self.state = ListingState::Loading;
                Nav::Stay
            }
            None => {
                self.state = ListingState::Redirecting;
                Nav::ToLogin
            }
        }
    }

    pub fn fetch(&mut self, api: &dyn ChallengeApi) {
        if self.state != ListingState::Loading {
            return;
        }
        match api.list_jobs() {
            Ok(jobs) => self.state = ListingState::Loaded(active_jobs(jobs)),
            Err(err) => self.state = ListingState::Failed(listing_failure_text(err)),
        }
    }

    /// Retry is a full reset, not a resume.
    pub fn remount(&mut self, store: &dyn SessionStore, api: &dyn ChallengeApi) -> Nav {
        *self = Self::new();
        let nav = self.mount(store);
        if nav == Nav::Stay {
            self.fetch(api);
        }
        nav
    }

    /// Unconditional: clears the whole store, no confirmation step.
    pub fn sign_out(&mut self, store: &mut dyn SessionStore) -> Nav {
        store.clear();
        self.identity = None;
        self.state = ListingState::Redirecting;
        Nav::ToLogin
    }
}

fn listing_failure_text(err: GatewayError) -> String {
    match err {
        GatewayError::Api(api) => api.message,
        GatewayError::Malformed => "Failed to load job listings from server".to_string(),
        GatewayError::Connection(msg) if msg.is_empty() => {
            "An error occurred while fetching jobs".to_string()
        }
        GatewayError::Connection(msg) => msg,
    }
}

// --- Per-job application card ---

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyState {
    Idle,
    Submitting,
    /// Terminal for the card; the form is hidden once shown.
    Success(String),
    Error(String),
}

/// One card per job; each owns its input and state, so submitting on one
/// never affects a sibling.
pub struct ApplyCard {
    job_id: i64,
    repo_url: String,
    state: ApplyState,
}

impl ApplyCard {
    pub fn new(job_id: i64) -> Self {
        Self {
            job_id,
            repo_url: String::new(),
            state: ApplyState::Idle,
        }
    }

    pub fn state(&self) -> &ApplyState {
        &self.state
    }

    pub fn repo_url(&self) -> &str {
        &self.repo_url
    }

    pub fn set_repo_url(&mut self, value: impl Into<String>) {
        self.repo_url = value.into();
    }

    pub fn push_input(&mut self, c: char) {
        self.repo_url.push(c);
    }

    pub fn pop_input(&mut self) {
        self.repo_url.pop();
    }

    pub fn form_hidden(&self) -> bool {
        matches!(self.state, ApplyState::Success(_))
    }

    pub fn can_submit(&self) -> bool {
        !matches!(self.state, ApplyState::Submitting | ApplyState::Success(_))
    }

    /// Validates the input and marks the card busy. An empty input is a
    /// silent no-op; a non-GitHub URL surfaces in the card without a call
    /// being attempted.
    pub fn begin_submit(&mut self) -> bool {
        if !self.can_submit() {
            return false;
        }
        if self.repo_url.trim().is_empty() {
            return false;
        }
        if !is_github_repo_url(&self.repo_url) {
            self.state = ApplyState::Error("Must be a valid GitHub URL".to_string());
            return false;
        }
        self.state = ApplyState::Submitting;
        true
    }

    pub fn submit(&mut self, api: &dyn ChallengeApi, candidate_id: i64) {
        if self.state != ApplyState::Submitting && !self.begin_submit() {
            return;
        }
        let submission = ApplicationSubmission {
            candidate_id,
            job_id: self.job_id,
            repo_url: self.repo_url.trim().to_string(),
        };
        match api.submit_application(&submission) {
            Ok(receipt) if receipt.ok => {
                self.repo_url.clear();
                self.state =
                    ApplyState::Success("Application submitted successfully!".to_string());
            }
            // Content rejection: a normal result, input retained for edit.
            Ok(receipt) => {
                let message = receipt
                    .message
                    .unwrap_or_else(|| "Submission failed".to_string());
                self.state = ApplyState::Error(message);
            }
            Err(err) => self.state = ApplyState::Error(apply_failure_text(err)),
        }
    }
}

fn apply_failure_text(err: GatewayError) -> String {
    match err {
        GatewayError::Api(api) => api.message,
        GatewayError::Malformed => "Submission failed".to_string(),
        GatewayError::Connection(msg) if msg.is_empty() => "Connection error".to_string(),
        GatewayError::Connection(msg) => msg,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ApiError;
    use crate::models::ApplyReceipt;
    use crate::session::{CANDIDATE_ID_KEY, EMAIL_KEY, MemorySession, UUID_KEY};
    use std::cell::RefCell;

    #[derive(Default)]
    struct FakeApi {
        lookup: Option<Result<Candidate, GatewayError>>,
        jobs: Option<Result<Vec<Job>, GatewayError>>,
        receipt: Option<Result<ApplyReceipt, GatewayError>>,
        calls: RefCell<Vec<&'static str>>,
    }

    impl ChallengeApi for FakeApi {
        fn lookup_candidate_by_email(&self, _email: &str) -> Result<Candidate, GatewayError> {
            self.calls.borrow_mut().push("lookup");
            self.lookup.clone().expect("lookup not scripted")
        }

        fn list_jobs(&self) -> Result<Vec<Job>, GatewayError> {
            self.calls.borrow_mut().push("list");
            self.jobs.clone().expect("list not scripted")
        }

        fn submit_application(
            &self,
            _submission: &ApplicationSubmission,
        ) -> Result<ApplyReceipt, GatewayError> {
            self.calls.borrow_mut().push("submit");
            self.receipt.clone().expect("submit not scripted")
        }
    }

    fn candidate() -> Candidate {
        Candidate {
            uuid: "123-abc".to_string(),
            candidate_id: 999,
            email: "test@test.com".to_string(),
            first_name: "Test".to_string(),
            last_name: "User".to_string(),
        }
    }

    fn job(id: i64, is_active: Option<bool>) -> Job {
        Job {
            id,
            title: format!("Job {id}"),
            department: String::new(),
            description: String::new(),
            requirements: Vec::new(),
            is_active,
        }
    }

    fn logged_in_store() -> MemorySession {
        let mut store = MemorySession::new();
        SessionIdentity::persist(&mut store, &candidate());
        store
    }

    // Scenario B: successful lookup persists identity and navigates to
    // the listing.
    #[test]
    fn test_login_success_persists_identity_and_navigates() {
        let api = FakeApi {
            lookup: Some(Ok(candidate())),
            ..FakeApi::default()
        };
        let mut store = MemorySession::new();
        let mut flow = LoginFlow::new();

        let nav = flow.submit(&api, &mut store, "test@test.com");

        assert_eq!(nav, Nav::ToJobs);
        assert!(matches!(flow.state(), LoginState::Success(_)));
        assert_eq!(store.get(CANDIDATE_ID_KEY).as_deref(), Some("999"));
        assert_eq!(store.get(UUID_KEY).as_deref(), Some("123-abc"));
        assert_eq!(store.get(EMAIL_KEY).as_deref(), Some("test@test.com"));
    }

    #[test]
    fn test_login_empty_email_is_a_no_op() {
        let api = FakeApi::default();
        let mut store = MemorySession::new();
        let mut flow = LoginFlow::new();

        let nav = flow.submit(&api, &mut store, "   ");

        assert_eq!(nav, Nav::Stay);
        assert_eq!(*flow.state(), LoginState::Idle);
        assert!(api.calls.borrow().is_empty());
    }

    #[test]
    fn test_login_malformed_payload_uses_fixed_message() {
        let api = FakeApi {
            lookup: Some(Err(GatewayError::Malformed)),
            ..FakeApi::default()
        };
        let mut store = MemorySession::new();
        let mut flow = LoginFlow::new();

        flow.submit(&api, &mut store, "test@test.com");

        assert_eq!(
            *flow.state(),
            LoginState::Failed("Invalid response from server".to_string())
        );
        assert_eq!(store.get(CANDIDATE_ID_KEY), None);
    }

    #[test]
    fn test_login_api_error_shows_its_message_and_allows_retry() {
        let mut api = FakeApi {
            lookup: Some(Err(GatewayError::Api(ApiError {
                message: "Candidate not found".to_string(),
                status: Some(404),
            }))),
            ..FakeApi::default()
        };
        let mut store = MemorySession::new();
        let mut flow = LoginFlow::new();

        flow.submit(&api, &mut store, "test@test.com");
        assert_eq!(
            *flow.state(),
            LoginState::Failed("Candidate not found".to_string())
        );

        // Failure is local and recoverable.
        api.lookup = Some(Ok(candidate()));
        let nav = flow.submit(&api, &mut store, "test@test.com");
        assert_eq!(nav, Nav::ToJobs);
    }

    #[test]
    fn test_login_connection_failure_falls_back_when_messageless() {
        let api = FakeApi {
            lookup: Some(Err(GatewayError::Connection(String::new()))),
            ..FakeApi::default()
        };
        let mut store = MemorySession::new();
        let mut flow = LoginFlow::new();

        flow.submit(&api, &mut store, "test@test.com");
        assert_eq!(
            *flow.state(),
            LoginState::Failed("Connection error".to_string())
        );
    }

    // Scenario A: empty store means redirect, and no fetch happens.
    #[test]
    fn test_listing_mount_without_identity_redirects_without_fetching() {
        let api = FakeApi::default();
        let store = MemorySession::new();
        let mut flow = ListingFlow::new();

        let nav = flow.mount(&store);
        flow.fetch(&api);

        assert_eq!(nav, Nav::ToLogin);
        assert_eq!(*flow.state(), ListingState::Redirecting);
        assert!(api.calls.borrow().is_empty());
    }

    // Scenario C: only jobs not explicitly inactive are loaded.
    #[test]
    fn test_listing_loads_active_jobs_only() {
        let api = FakeApi {
            jobs: Some(Ok(vec![job(1, Some(true)), job(2, Some(false))])),
            ..FakeApi::default()
        };
        let store = logged_in_store();
        let mut flow = ListingFlow::new();

        flow.mount(&store);
        flow.fetch(&api);

        match flow.state() {
            ListingState::Loaded(jobs) => {
                let ids: Vec<i64> = jobs.iter().map(|j| j.id).collect();
                assert_eq!(ids, vec![1]);
            }
            other => panic!("expected Loaded, got {other:?}"),
        }
        assert_eq!(flow.identity().unwrap().candidate_id, 999);
    }

    #[test]
    fn test_listing_fetch_is_idempotent_over_unchanged_server_state() {
        let api = FakeApi {
            jobs: Some(Ok(vec![job(1, None), job(2, Some(false)), job(3, Some(true))])),
            ..FakeApi::default()
        };
        let store = logged_in_store();

        let mut first = ListingFlow::new();
        first.mount(&store);
        first.fetch(&api);

        let mut second = ListingFlow::new();
        second.mount(&store);
        second.fetch(&api);

        assert_eq!(first.state(), second.state());
    }

    // Scenario D: a gateway rejection surfaces its exact message.
    #[test]
    fn test_listing_api_error_shows_exact_message() {
        let api = FakeApi {
            jobs: Some(Err(GatewayError::Api(ApiError {
                message: "API Rate Limit".to_string(),
                status: Some(429),
            }))),
            ..FakeApi::default()
        };
        let store = logged_in_store();
        let mut flow = ListingFlow::new();

        flow.mount(&store);
        flow.fetch(&api);

        assert_eq!(
            *flow.state(),
            ListingState::Failed("API Rate Limit".to_string())
        );
    }

    #[test]
    fn test_listing_malformed_payload_uses_fixed_message() {
        let api = FakeApi {
            jobs: Some(Err(GatewayError::Malformed)),
            ..FakeApi::default()
        };
        let store = logged_in_store();
        let mut flow = ListingFlow::new();

        flow.mount(&store);
        flow.fetch(&api);

        assert_eq!(
            *flow.state(),
            ListingState::Failed("Failed to load job listings from server".to_string())
        );
    }

    #[test]
    fn test_listing_connection_failure_falls_back_when_messageless() {
        let api = FakeApi {
            jobs: Some(Err(GatewayError::Connection(String::new()))),
            ..FakeApi::default()
        };
        let store = logged_in_store();
        let mut flow = ListingFlow::new();

        flow.mount(&store);
        flow.fetch(&api);

        assert_eq!(
            *flow.state(),
            ListingState::Failed("An error occurred while fetching jobs".to_string())
        );
    }

    #[test]
    fn test_listing_remount_resets_a_failed_flow() {
        let mut api = FakeApi {
            jobs: Some(Err(GatewayError::Connection("timed out".to_string()))),
            ..FakeApi::default()
        };
        let store = logged_in_store();
        let mut flow = ListingFlow::new();

        flow.mount(&store);
        flow.fetch(&api);
        assert!(matches!(flow.state(), ListingState::Failed(_)));

        api.jobs = Some(Ok(vec![job(1, None)]));
        let nav = flow.remount(&store, &api);

        assert_eq!(nav, Nav::Stay);
        assert!(matches!(flow.state(), ListingState::Loaded(jobs) if jobs.len() == 1));
    }

    // Scenario F: sign-out clears storage and navigates, from any state.
    #[test]
    fn test_sign_out_clears_store_and_navigates() {
        let api = FakeApi {
            jobs: Some(Ok(vec![job(1, None)])),
            ..FakeApi::default()
        };
        let mut store = logged_in_store();
        let mut flow = ListingFlow::new();
        flow.mount(&store);
        flow.fetch(&api);

        let nav = flow.sign_out(&mut store);

        assert_eq!(nav, Nav::ToLogin);
        assert_eq!(store.get(CANDIDATE_ID_KEY), None);
        assert_eq!(store.get(UUID_KEY), None);
        assert!(flow.identity().is_none());
    }

    #[test]
    fn test_apply_success_clears_input_and_hides_form() {
        let api = FakeApi {
            receipt: Some(Ok(ApplyReceipt {
                ok: true,
                message: None,
            })),
            ..FakeApi::default()
        };
        let mut card = ApplyCard::new(3);
        card.set_repo_url("https://github.com/ada/challenge");
        card.submit(&api, 999);

        assert_eq!(
            *card.state(),
            ApplyState::Success("Application submitted successfully!".to_string())
        );
        assert_eq!(card.repo_url(), "");
        assert!(card.form_hidden());
        assert!(!card.can_submit());
    }

    // Scenario E: content rejection keeps the input and allows resubmit.
    #[test]
    fn test_apply_content_rejection_keeps_input_for_edit() {
        let mut api = FakeApi {
            receipt: Some(Ok(ApplyReceipt {
                ok: false,
                message: Some("repo missing".to_string()),
            })),
            ..FakeApi::default()
        };
        let mut card = ApplyCard::new(3);
        card.set_repo_url("https://github.com/ada/challenge");
        card.submit(&api, 999);

        assert_eq!(*card.state(), ApplyState::Error("repo missing".to_string()));
        assert_eq!(card.repo_url(), "https://github.com/ada/challenge");
        assert!(card.can_submit());

        api.receipt = Some(Ok(ApplyReceipt {
            ok: true,
            message: None,
        }));
        card.submit(&api, 999);
        assert!(card.form_hidden());
    }

    #[test]
    fn test_apply_rejection_without_message_uses_fallback() {
        let api = FakeApi {
            receipt: Some(Ok(ApplyReceipt {
                ok: false,
                message: None,
            })),
            ..FakeApi::default()
        };
        let mut card = ApplyCard::new(3);
        card.set_repo_url("https://github.com/ada/challenge");
        card.submit(&api, 999);

        assert_eq!(
            *card.state(),
            ApplyState::Error("Submission failed".to_string())
        );
    }

    #[test]
    fn test_apply_transport_error_shows_its_message() {
        let api = FakeApi {
            receipt: Some(Err(GatewayError::Api(ApiError {
                message: "Server unavailable".to_string(),
                status: Some(503),
            }))),
            ..FakeApi::default()
        };
        let mut card = ApplyCard::new(3);
        card.set_repo_url("https://github.com/ada/challenge");
        card.submit(&api, 999);

        assert_eq!(
            *card.state(),
            ApplyState::Error("Server unavailable".to_string())
        );
    }

    #[test]
    fn test_apply_validates_url_before_calling_the_gateway() {
        let api = FakeApi::default();
        let mut card = ApplyCard::new(3);

        card.set_repo_url("https://gitlab.com/ada/challenge");
        card.submit(&api, 999);
        assert_eq!(
            *card.state(),
            ApplyState::Error("Must be a valid GitHub URL".to_string())
        );
        assert!(api.calls.borrow().is_empty());

        card.set_repo_url("");
        card.submit(&api, 999);
        assert!(api.calls.borrow().is_empty());
    }

    #[test]
    fn test_apply_cards_are_independent() {
        let api = FakeApi {
            receipt: Some(Ok(ApplyReceipt {
                ok: true,
                message: None,
            })),
            ..FakeApi::default()
        };
        let mut first = ApplyCard::new(1);
        let second = ApplyCard::new(2);

        first.set_repo_url("https://github.com/ada/challenge");
        first.submit(&api, 999);

        assert!(first.form_hidden());
        assert_eq!(*second.state(), ApplyState::Idle);
        assert!(second.can_submit());
    }

    #[test]
    fn test_github_url_pattern() {
        assert!(is_github_repo_url("https://github.com/ada/challenge"));
        assert!(is_github_repo_url("http://github.com/ada"));
        assert!(is_github_repo_url("  https://github.com/ada/challenge  "));
        assert!(!is_github_repo_url("https://github.com/"));
        assert!(!is_github_repo_url("https://example.com/ada"));
        assert!(!is_github_repo_url("github.com/ada/challenge"));
        assert!(!is_github_repo_url(""));
    }
}
