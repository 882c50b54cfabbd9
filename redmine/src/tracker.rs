use crate::client::TrackerError;
use crate::types::{Issue, IssueId, IssueQuery, NewIssue, Project};
use async_trait::async_trait;

/// The subset of the Redmine API used to file and deduplicate issues.
#[async_trait]
pub trait IssueTracker: Send + Sync {
    /// Resolves a project by its identifier (or numeric id).
    async fn find_project(&self, identifier: &str) -> Result<Project, TrackerError>;

    async fn list_issues(
        &self,
        project_id: u64,
        query: &IssueQuery,
    ) -> Result<Vec<Issue>, TrackerError>;

    async fn create_issue(&self, issue: &NewIssue) -> Result<Issue, TrackerError>;

    /// Appends a journal note to an existing issue.
    async fn add_note(&self, issue_id: IssueId, notes: &str) -> Result<(), TrackerError>;
}
