use crate::tracker::IssueTracker;
use crate::types::{
    Issue, IssueEnvelope, IssueId, IssueList, IssueNotes, IssueQuery, IssueUpdateEnvelope,
    NewIssue, NewIssueEnvelope, Project, ProjectEnvelope,
};
use async_trait::async_trait;
use http::StatusCode;
use reqwest::{Method, RequestBuilder, Response, Url};
use std::fmt;

const API_KEY_HEADER: &str = "X-Redmine-API-Key";

#[derive(thiserror::Error, Debug)]
pub enum TrackerError {
    #[error("HTTP client error: {0}")]
    ReqwestError(#[from] reqwest::Error),
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
    #[error("project not found: {0}")]
    ProjectNotFound(String),
    #[error("unexpected response status {status}: {body}")]
    UnexpectedStatus { status: StatusCode, body: String },
}

/// Authentication sent with every request. Both forms may be set at once:
/// basic auth is typically needed in front of Redmine by an HTTP proxy.
#[derive(Clone, Default, PartialEq)]
pub struct Credentials {
    pub api_key: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Redmine REST API client (JSON format).
#[derive(Clone)]
pub struct RedmineClient {
    client: reqwest::Client,
    base_url: Url,
    credentials: Credentials,
}

impl RedmineClient {
    pub fn new(host: &str, credentials: Credentials) -> Result<Self, TrackerError> {
        Self::with_client(reqwest::Client::new(), host, credentials)
    }

    /// Builds a client on top of an existing connection pool.
    pub fn with_client(
        client: reqwest::Client,
        host: &str,
        credentials: Credentials,
    ) -> Result<Self, TrackerError> {
        let base_url = Url::parse(host).map_err(|e| TrackerError::InvalidUrl(e.to_string()))?;
        if base_url.cannot_be_a_base() {
            return Err(TrackerError::InvalidUrl(host.to_string()));
        }

        Ok(RedmineClient {
            client,
            base_url,
            credentials,
        })
    }

    // Redmine may be mounted under a sub-path, so segments are appended to the host path.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, TrackerError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| TrackerError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let mut builder = self.client.request(method, url);

        if let Some(key) = self.credentials.api_key.as_deref().filter(|k| !k.is_empty()) {
            builder = builder.header(API_KEY_HEADER, key);
        }
        if let Some(username) = self.credentials.username.as_deref().filter(|u| !u.is_empty()) {
            builder = builder.basic_auth(username, self.credentials.password.as_deref());
        }

        builder
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response, TrackerError> {
        let response = builder.send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::debug!(%status, body = %body, "Redmine request failed");
            return Err(TrackerError::UnexpectedStatus { status, body });
        }

        Ok(response)
    }
}

#[async_trait]
impl IssueTracker for RedmineClient {
    async fn find_project(&self, identifier: &str) -> Result<Project, TrackerError> {
        let url = self.endpoint(&["projects", &format!("{identifier}.json")])?;
        tracing::debug!(%url, "Looking up project");

        match self.send(self.request(Method::GET, url)).await {
            Ok(response) => Ok(response.json::<ProjectEnvelope>().await?.project),
            Err(TrackerError::UnexpectedStatus { status, .. }) if status == StatusCode::NOT_FOUND => {
                Err(TrackerError::ProjectNotFound(identifier.to_string()))
            }
            Err(e) => Err(e),
        }
    }

    async fn list_issues(
        &self,
        project_id: u64,
        query: &IssueQuery,
    ) -> Result<Vec<Issue>, TrackerError> {
        let mut url = self.endpoint(&["issues.json"])?;
        url.query_pairs_mut()
            .append_pair("project_id", &project_id.to_string())
            .extend_pairs(query.to_query_pairs());
        tracing::debug!(%url, "Listing issues");

        let response = self.send(self.request(Method::GET, url)).await?;
        Ok(response.json::<IssueList>().await?.issues)
    }

    async fn create_issue(&self, issue: &NewIssue) -> Result<Issue, TrackerError> {
        let url = self.endpoint(&["issues.json"])?;
        tracing::debug!(%url, subject = %issue.subject, "Creating issue");

        let response = self
            .send(
                self.request(Method::POST, url)
                    .json(&NewIssueEnvelope { issue }),
            )
            .await?;
        Ok(response.json::<IssueEnvelope>().await?.issue)
    }

    async fn add_note(&self, issue_id: IssueId, notes: &str) -> Result<(), TrackerError> {
        let url = self.endpoint(&["issues", &format!("{issue_id}.json")])?;
        tracing::debug!(%url, "Adding note");

        self.send(self.request(Method::PUT, url).json(&IssueUpdateEnvelope {
            issue: IssueNotes { notes },
        }))
        .await?;
        Ok(())
    }
}
