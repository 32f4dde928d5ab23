//! GCP API error classification
//!
//! Parses the JSON error envelope returned by Google APIs:
//!
//! ```text
//! {"error": {"errors": [{"domain": .., "reason": .., "message": ..}], "code": 403, "message": ..}}
//! ```

use serde::Deserialize;

/// Message GCP returns when the instance's OAuth scopes do not include Compute Engine.
pub const INSUFFICIENT_PERMISSION_SCOPE: &str =
    "Insufficient Permission: Request had insufficient authentication scopes.";

/// Prefix of the message GCP returns when the service account lacks the IAM permission.
pub const MISSING_INSTANCES_LIST_PERMISSION: &str =
    "Required 'compute.instances.list' permission for";

#[derive(Debug, Deserialize)]
struct Envelope {
    error: Option<ErrorBody>,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    errors: Vec<ErrorEntry>,
    #[serde(default)]
    code: i64,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorEntry {
    domain: Option<String>,
    reason: Option<String>,
    message: Option<String>,
}

fn first_entry(body: &str) -> Option<(ErrorEntry, i64)> {
    let envelope: Envelope = serde_json::from_str(body).ok()?;
    let error = envelope.error?;
    let code = error.code;
    error.errors.into_iter().next().map(|entry| (entry, code))
}

/// Structured error from a GCP API.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GcpApiError {
    pub domain: String,
    pub reason: String,
    pub message: String,
    pub code: i64,
    pub url: Option<String>,
}

impl GcpApiError {
    /// Parse a response body into a structured error.
    ///
    /// Returns `None` for bodies that are not JSON, lack the `error` object or
    /// carry an empty `errors` array.
    pub fn parse(body: &str) -> Option<Self> {
        let (entry, code) = first_entry(body)?;
        Some(Self {
            domain: entry.domain.unwrap_or_default(),
            reason: entry.reason.unwrap_or_default(),
            message: entry.message.unwrap_or_default(),
            code,
            url: None,
        })
    }

    /// Attribute the error to the request that produced it.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn is_insufficient_scope(&self) -> bool {
        self.message == INSUFFICIENT_PERMISSION_SCOPE
    }

    pub fn is_missing_permission(&self) -> bool {
        self.message.starts_with(MISSING_INSTANCES_LIST_PERMISSION)
    }

    /// Operator guidance for this error, suitable for logging.
    pub fn diagnostic(&self) -> String {
        let url = self.url.as_deref().unwrap_or("the Compute Engine API");
        if self.is_insufficient_scope() {
            format!(
                "Your service account does not have permissions to access {}. \
                 Please ensure the API access scope for Compute Engine is at least read-only.",
                url
            )
        } else if self.is_missing_permission() {
            format!(
                "Your service account does not have permissions to access {}. \
                 Please ensure the service account has a role granting \
                 'compute.instances.list', e.g. Compute Viewer (roles/compute.viewer).",
                url
            )
        } else {
            format!(
                "Failure in executing GCP API request at: {} ({} {}: {})",
                url, self.code, self.reason, self.message
            )
        }
    }
}

impl std::fmt::Display for GcpApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.diagnostic())
    }
}

impl std::error::Error for GcpApiError {}

/// Whether a transport error body is a structured GCP error.
///
/// True iff the envelope has a non-empty `errors` array whose first entry
/// carries a `message`.
pub fn is_gcp_structured_error(body: &str) -> bool {
    first_entry(body)
        .map(|(entry, _)| entry.message.is_some())
        .unwrap_or(false)
}
