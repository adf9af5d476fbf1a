use anyhow::{Context, Result};
use reqwest::blocking::Client;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::models::{ApplicationSubmission, ApplyReceipt, Candidate, Job};

pub const DEFAULT_BASE_URL: &str =
    "https://botfilter-h5ddh6dye8exb7ha.centralus-01.azurewebsites.net";

const UNKNOWN_API_ERROR: &str = "An unknown API error occurred";

/// The server explicitly rejected the call: non-2xx status, or a 2xx body
/// carrying `"ok": false`. Always has a message; carries the status when a
/// response was received.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ApiError {
    pub message: String,
    pub status: Option<u16>,
}

/// Closed set of gateway failure modes. Flows map each variant to display
/// text exhaustively; nothing else can come out of a gateway call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    #[error(transparent)]
    Api(#[from] ApiError),

    /// The request never produced a usable response.
    #[error("connection failed: {0}")]
    Connection(String),

    /// Transport success, but the payload shape is unusable.
    #[error("malformed response payload")]
    Malformed,
}

/// The single seam between flows and the remote API.
pub trait ChallengeApi {
    fn lookup_candidate_by_email(&self, email: &str) -> Result<Candidate, GatewayError>;
    fn list_jobs(&self) -> Result<Vec<Job>, GatewayError>;
    fn submit_application(
        &self,
        submission: &ApplicationSubmission,
    ) -> Result<ApplyReceipt, GatewayError>;
}

/// Lookup responses arrive wrapped as `{ok, user}`; a transport-success
/// body without `user` is a malformed payload, not a server rejection.
#[derive(Debug, serde::Deserialize)]
struct CandidateEnvelope {
    #[serde(default)]
    user: Option<Candidate>,
}

pub struct HttpGateway {
    base_url: String,
    extra_headers: HeaderMap,
    client: Client,
}

impl HttpGateway {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            base_url,
            extra_headers: HeaderMap::new(),
            client: Client::new(),
        }
    }

    /// Adds a header sent with every request. Extra headers override the
    /// defaults; they are merged, never dropped.
    pub fn with_header(mut self, name: &str, value: &str) -> Result<Self> {
        let name = HeaderName::from_bytes(name.as_bytes())
            .with_context(|| format!("Invalid header name '{name}'"))?;
        let value = HeaderValue::from_str(value)
            .with_context(|| format!("Invalid value for header '{name}'"))?;
        self.extra_headers.insert(name, value);
        Ok(self)
    }

    fn request_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        for (name, value) in self.extra_headers.iter() {
            headers.insert(name, value.clone());
        }
        headers
    }

    fn get(&self, path: &str, query: &[(&str, &str)]) -> Result<(u16, Option<Value>), GatewayError> {
        let sent = self
            .client
            .get(format!("{}{}", self.base_url, path))
            .query(query)
            .headers(self.request_headers())
            .send();
        receive(sent)
    }

    fn post<B: Serialize>(&self, path: &str, body: &B) -> Result<(u16, Option<Value>), GatewayError> {
        let sent = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .json(body)
            .headers(self.request_headers())
            .send();
        receive(sent)
    }
}

fn receive(
    sent: reqwest::Result<reqwest::blocking::Response>,
) -> Result<(u16, Option<Value>), GatewayError> {
    let response = sent.map_err(|err| GatewayError::Connection(err.to_string()))?;
    let status = response.status().as_u16();
    // An unparsable body counts as absent; the parse failure itself never
    // propagates.
    let body = response.json().ok();
    Ok((status, body))
}

/// Builds the `ApiError` for a rejected call, picking the most specific
/// explanation the body offers.
fn rejection(status: u16, body: Option<&Value>) -> ApiError {
    let field = |name: &str| body.and_then(|b| b.get(name)).and_then(Value::as_str);
    let message = field("message")
        .or_else(|| field("details"))
        .unwrap_or(UNKNOWN_API_ERROR)
        .to_string();
    ApiError {
        message,
        status: Some(status),
    }
}

/// Shared normalization for the throwing operations: a non-2xx status or a
/// body with an explicit `"ok": false` flag fails with `ApiError`.
fn evaluate(status: u16, body: Option<Value>) -> Result<Option<Value>, ApiError> {
    let transport_ok = (200..300).contains(&status);
    let logical_failure =
        body.as_ref().and_then(|b| b.get("ok")).and_then(Value::as_bool) == Some(false);
    if !transport_ok || logical_failure {
        return Err(rejection(status, body.as_ref()));
    }
    Ok(body)
}

/// Submit-only normalization: status decides, the logical flag passes
/// through as data. Rejection of content is a normal result; rejection of
/// the call is an error.
fn evaluate_transport(status: u16, body: Option<Value>) -> Result<Option<Value>, ApiError> {
    if !(200..300).contains(&status) {
        return Err(rejection(status, body.as_ref()));
    }
    Ok(body)
}

fn decode<T: DeserializeOwned>(body: Option<Value>) -> Result<T, GatewayError> {
    serde_json::from_value(body.unwrap_or(Value::Null)).map_err(|_| GatewayError::Malformed)
}

impl ChallengeApi for HttpGateway {
    fn lookup_candidate_by_email(&self, email: &str) -> Result<Candidate, GatewayError> {
        let (status, body) = self.get("/api/candidate/get-by-email", &[("email", email)])?;
        let body = evaluate(status, body)?;
        let envelope: CandidateEnvelope = decode(body)?;
        envelope.user.ok_or(GatewayError::Malformed)
    }

    fn list_jobs(&self) -> Result<Vec<Job>, GatewayError> {
        let (status, body) = self.get("/api/jobs/get-list", &[])?;
        let body = evaluate(status, body)?;
        decode(body)
    }

    fn submit_application(
        &self,
        submission: &ApplicationSubmission,
    ) -> Result<ApplyReceipt, GatewayError> {
        let (status, body) = self.post("/api/candidate/apply-to-job", submission)?;
        let body = evaluate_transport(status, body)?;
        decode(body)
    }
}
