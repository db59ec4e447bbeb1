//! The outbound client for the backend REST API.
//!
//! All state here is immutable: [`BackendClient`] wraps a shared
//! [`reqwest::Client`] plus the base URL, and the bearer credential is
//! attached per call through [`BackendClient::with_token`]. Concurrent
//! requests under different identities therefore cannot race on a shared
//! credential; there is no process-wide mutable header to set or clear.

use std::time::Duration;

use http::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::config::ProjectConfig;

/// A borrowed bearer credential, valid for the scope of one request.
#[derive(Clone, Copy)]
pub struct AccessToken<'a>(&'a str);

impl<'a> AccessToken<'a> {
    /// Wraps a raw token string.
    #[must_use]
    pub fn new(token: &'a str) -> Self {
        Self(token)
    }

    fn as_str(&self) -> &'a str {
        self.0
    }
}

impl std::fmt::Debug for AccessToken<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AccessToken(\"**********\")")
    }
}

/// The resource collections exposed by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Expenses,
    Invoices,
    ExpenseLogs,
    InvoiceLogs,
}

impl Resource {
    /// The collection's path segment on the backend.
    #[must_use]
    pub fn path(self) -> &'static str {
        match self {
            Resource::Expenses => "expenses",
            Resource::Invoices => "invoices",
            Resource::ExpenseLogs => "expense_logs",
            Resource::InvoiceLogs => "invoice_logs",
        }
    }
}

/// A successful credential exchange.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginOk {
    pub access_token: String,
    pub user_id: String,
}

/// An expense or invoice record (the log collections share the shape).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub amount: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment: Option<String>,
}

/// Fields accepted by create/update calls.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordPayload {
    pub title: String,
    pub description: String,
    pub amount: f64,
    pub attachment: Option<String>,
}

impl RecordPayload {
    fn form_fields(&self) -> Vec<(&'static str, String)> {
        let mut fields = vec![
            ("title", self.title.clone()),
            ("description", self.description.clone()),
            ("amount", self.amount.to_string()),
        ];
        if let Some(attachment) = &self.attachment {
            fields.push(("attachment", attachment.clone()));
        }
        fields
    }
}

/// The backend's pagination envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    #[serde(default)]
    pub total: i64,
    #[serde(default)]
    pub page: i64,
    #[serde(default)]
    pub size: i64,
    #[serde(default)]
    pub pages: i64,
}

/// Parameters for list calls.
#[derive(Debug, Clone, Default)]
pub struct ListQuery {
    pub page: Option<u32>,
    pub size: Option<u32>,
    pub search: Option<String>,
}

impl ListQuery {
    fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(page) = self.page {
            pairs.push(("page", page.to_string()));
        }
        if let Some(size) = self.size {
            pairs.push(("size", size.to_string()));
        }
        if let Some(search) = &self.search {
            pairs.push(("q", search.clone()));
        }
        pairs
    }
}

/// An error from a backend call.
#[derive(Debug, Error)]
pub enum ApiError {
    /// A 4xx business rejection, e.g. `LOGIN_BAD_CREDENTIALS`. Mapped by the
    /// originating form to field-level messages.
    #[error("backend rejected the request: {detail}")]
    Rejected { detail: String },
    /// The bearer credential was not accepted.
    #[error("backend rejected the credentials")]
    Unauthorized,
    #[error("resource not found")]
    NotFound,
    /// A 5xx from the backend.
    #[error("backend failed with status {status}")]
    Server { status: u16 },
    /// The backend could not be reached at all.
    #[error("could not reach the backend")]
    Transport(#[from] reqwest::Error),
    #[error("could not build backend URL")]
    BadUrl(#[from] url::ParseError),
}

impl From<ApiError> for crate::error::Error {
    fn from(err: ApiError) -> Self {
        let status = match &err {
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Rejected { .. } => StatusCode::BAD_REQUEST,
            _ => StatusCode::BAD_GATEWAY,
        };
        crate::error::Error::with_status(err, status)
    }
}

/// A client for the backend REST API, shared by all requests.
#[derive(Debug, Clone)]
pub struct BackendClient {
    http: reqwest::Client,
    base_url: Url,
}

impl BackendClient {
    /// Creates a client for the given base URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be constructed.
    pub fn new(base_url: Url, timeout: Duration) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http, base_url })
    }

    /// Creates a client from the project configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be constructed.
    pub fn from_config(config: &ProjectConfig) -> Result<Self, ApiError> {
        Self::new(config.backend_url.clone(), config.request_timeout)
    }

    /// Returns a view of this client that attaches the given bearer token to
    /// every call. The credential lives only as long as the borrow.
    #[must_use]
    pub fn with_token<'a>(&'a self, token: AccessToken<'a>) -> AuthorizedClient<'a> {
        AuthorizedClient {
            client: self,
            token,
        }
    }

    /// Exchanges credentials for a bearer token.
    ///
    /// # Errors
    ///
    /// `ApiError::Rejected` with `LOGIN_BAD_CREDENTIALS` on wrong
    /// credentials; transport and server errors otherwise.
    pub async fn login(&self, username: &str, password: &str) -> Result<LoginOk, ApiError> {
        let response = self
            .http
            .post(self.endpoint("auth/bearer/login")?)
            .form(&[("username", username), ("password", password)])
            .send()
            .await?;
        Ok(check(response).await?.json().await?)
    }

    /// Registers a new user account.
    ///
    /// # Errors
    ///
    /// `ApiError::Rejected` when the backend refuses the registration (e.g.
    /// the email is already taken).
    pub async fn register(&self, email: &str, password: &str) -> Result<(), ApiError> {
        let response = self
            .http
            .post(self.endpoint("auth/register")?)
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }

    /// Asks the backend to send a verification token to the given address.
    ///
    /// # Errors
    ///
    /// Propagates backend rejections and transport failures.
    pub async fn request_verify_token(&self, email: &str) -> Result<(), ApiError> {
        let response = self
            .http
            .post(self.endpoint("auth/request-verify-token")?)
            .json(&serde_json::json!({ "email": email }))
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }

    /// Confirms an email address with a verification token.
    ///
    /// # Errors
    ///
    /// `ApiError::Rejected` on an invalid or expired token.
    pub async fn verify(&self, token: &str) -> Result<(), ApiError> {
        let response = self
            .http
            .post(self.endpoint("auth/verify")?)
            .json(&serde_json::json!({ "token": token }))
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }

    /// Fetches the Google OAuth authorization URL to redirect the browser to.
    ///
    /// # Errors
    ///
    /// Propagates backend rejections and transport failures.
    pub async fn google_authorize_url(&self) -> Result<String, ApiError> {
        #[derive(Deserialize)]
        struct AuthorizeResponse {
            authorization_url: String,
        }

        let response = self
            .http
            .get(self.endpoint("auth/bearer/google/authorize")?)
            .send()
            .await?;
        let body: AuthorizeResponse = check(response).await?.json().await?;
        Ok(body.authorization_url)
    }

    /// Completes the Google OAuth flow, exchanging the callback parameters
    /// for a bearer token.
    ///
    /// # Errors
    ///
    /// `ApiError::Rejected` if the backend refuses the exchange.
    pub async fn google_callback(&self, code: &str, state: &str) -> Result<LoginOk, ApiError> {
        let response = self
            .http
            .get(self.endpoint("auth/bearer/google/callback")?)
            .query(&[("code", code), ("state", state)])
            .send()
            .await?;
        Ok(check(response).await?.json().await?)
    }

    fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        Ok(self.base_url.join(path)?)
    }
}

/// A borrowed view of the client that sends `Authorization: Bearer` on every
/// call.
#[derive(Debug, Clone, Copy)]
pub struct AuthorizedClient<'a> {
    client: &'a BackendClient,
    token: AccessToken<'a>,
}

impl AuthorizedClient<'_> {
    /// Invalidates the bearer token on the backend.
    ///
    /// # Errors
    ///
    /// Propagates backend rejections and transport failures.
    pub async fn logout(&self) -> Result<(), ApiError> {
        let response = self
            .client
            .http
            .post(self.client.endpoint("auth/bearer/logout")?)
            .bearer_auth(self.token.as_str())
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }

    /// Lists a resource collection with pagination and optional search.
    ///
    /// # Errors
    ///
    /// Propagates backend rejections and transport failures.
    pub async fn list(&self, resource: Resource, query: &ListQuery) -> Result<Page<Record>, ApiError> {
        let response = self
            .client
            .http
            .get(self.client.endpoint(resource.path())?)
            .query(&query.query_pairs())
            .bearer_auth(self.token.as_str())
            .send()
            .await?;
        Ok(check(response).await?.json().await?)
    }

    /// Fetches the user's first record of a collection, if any.
    ///
    /// # Errors
    ///
    /// Propagates backend rejections and transport failures.
    pub async fn first(&self, resource: Resource) -> Result<Option<Record>, ApiError> {
        let response = self
            .client
            .http
            .get(self.client.endpoint(&format!("{}/first", resource.path()))?)
            .bearer_auth(self.token.as_str())
            .send()
            .await?;
        match check(response).await {
            Ok(response) => Ok(Some(response.json().await?)),
            Err(ApiError::NotFound) => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Fetches a single record by identifier.
    ///
    /// # Errors
    ///
    /// `ApiError::NotFound` if the record does not exist or belongs to
    /// another user.
    pub async fn get(&self, resource: Resource, id: i64) -> Result<Record, ApiError> {
        let response = self
            .client
            .http
            .get(self.client.endpoint(&format!("{}/{id}", resource.path()))?)
            .bearer_auth(self.token.as_str())
            .send()
            .await?;
        Ok(check(response).await?.json().await?)
    }

    /// Creates a record.
    ///
    /// # Errors
    ///
    /// Propagates backend rejections and transport failures.
    pub async fn create(
        &self,
        resource: Resource,
        payload: &RecordPayload,
    ) -> Result<Record, ApiError> {
        let response = self
            .client
            .http
            .post(self.client.endpoint(resource.path())?)
            .form(&payload.form_fields())
            .bearer_auth(self.token.as_str())
            .send()
            .await?;
        Ok(check(response).await?.json().await?)
    }

    /// Updates a record.
    ///
    /// # Errors
    ///
    /// `ApiError::NotFound` if the record does not exist.
    pub async fn update(
        &self,
        resource: Resource,
        id: i64,
        payload: &RecordPayload,
    ) -> Result<Record, ApiError> {
        let response = self
            .client
            .http
            .put(self.client.endpoint(&format!("{}/{id}", resource.path()))?)
            .form(&payload.form_fields())
            .bearer_auth(self.token.as_str())
            .send()
            .await?;
        Ok(check(response).await?.json().await?)
    }

    /// Deletes a record.
    ///
    /// # Errors
    ///
    /// `ApiError::NotFound` if the record does not exist.
    pub async fn delete(&self, resource: Resource, id: i64) -> Result<(), ApiError> {
        let response = self
            .client
            .http
            .delete(self.client.endpoint(&format!("{}/{id}", resource.path()))?)
            .bearer_auth(self.token.as_str())
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }
}

async fn check(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == StatusCode::UNAUTHORIZED {
        return Err(ApiError::Unauthorized);
    }
    if status == StatusCode::NOT_FOUND {
        return Err(ApiError::NotFound);
    }
    if status.is_client_error() {
        let body = response.text().await.unwrap_or_default();
        return Err(ApiError::Rejected {
            detail: parse_detail(&body, status.as_u16()),
        });
    }
    Err(ApiError::Server {
        status: status.as_u16(),
    })
}

/// Extracts the `detail` field from a backend error body, falling back to
/// the status code when the body is not the expected JSON shape.
fn parse_detail(body: &str, status: u16) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| {
            let detail = value.get("detail")?;
            Some(match detail.as_str() {
                Some(text) => text.to_owned(),
                None => detail.to_string(),
            })
        })
        .unwrap_or_else(|| format!("HTTP {status}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_paths_match_backend() {
        assert_eq!(Resource::Expenses.path(), "expenses");
        assert_eq!(Resource::Invoices.path(), "invoices");
        assert_eq!(Resource::ExpenseLogs.path(), "expense_logs");
        assert_eq!(Resource::InvoiceLogs.path(), "invoice_logs");
    }

    #[test]
    fn endpoint_joins_relative_paths() {
        let client = BackendClient::new(
            Url::parse("http://127.0.0.1:8000/").unwrap(),
            Duration::from_secs(5),
        )
        .unwrap();
        let url = client.endpoint("auth/bearer/login").unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:8000/auth/bearer/login");
    }

    #[test]
    fn parse_detail_reads_string_and_object_bodies() {
        assert_eq!(
            parse_detail(r#"{"detail": "LOGIN_BAD_CREDENTIALS"}"#, 400),
            "LOGIN_BAD_CREDENTIALS"
        );
        assert_eq!(
            parse_detail(r#"{"detail": {"code": 1}}"#, 400),
            r#"{"code":1}"#
        );
        assert_eq!(parse_detail("not json", 422), "HTTP 422");
    }

    #[test]
    fn page_envelope_deserializes() {
        let page: Page<Record> = serde_json::from_str(
            r#"{"items": [{"id": 1, "title": "Rent", "description": "", "amount": 1200.0}],
                "total": 1, "page": 1, "size": 2, "pages": 1}"#,
        )
        .unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].title, "Rent");
        assert_eq!(page.pages, 1);
    }

    #[test]
    fn access_token_is_redacted_in_debug() {
        let token = AccessToken::new("very-secret-token");
        assert!(!format!("{token:?}").contains("very-secret-token"));
    }

    #[test]
    fn payload_form_fields_include_attachment_only_when_set() {
        let mut payload = RecordPayload {
            title: "Rent".to_owned(),
            description: String::new(),
            amount: 1200.0,
            attachment: None,
        };
        assert_eq!(payload.form_fields().len(), 3);
        payload.attachment = Some("receipt.pdf".to_owned());
        assert_eq!(payload.form_fields().len(), 4);
    }
}
