//! Turns a new Sentry event into at most one Redmine write.
//!
//! The order of checks is fixed: skip unless the event is new and the project
//! is configured, drop events matching an ignored exception, comment on an
//! already open issue when same-issue patterns are configured, otherwise
//! create a new issue, round robin assigned when enabled.
//!
//! Nothing here serializes concurrent dispatches for the same project. Two
//! events handled at the same time may pick the same round robin assignee or
//! both create an issue.

use crate::errors::DispatchError;
use crate::event::{IncomingEvent, SPIDER_FIELD_ID, notification_body};
use crate::integration::{IntegrationConfig, MergePolicy};
use crate::metrics_defs::{DISPATCH_DURATION, DISPATCH_OUTCOME, TRACKER_ERROR};
use crate::round_robin::next_assignee;
use redmine::{
    IssueId, IssueQuery, IssueTracker, NewIssue, Project, RedmineClient, StatusFilter,
    TrackerError, UserId,
};
use shared::{counter, histogram};
use std::sync::Arc;
use std::time::Instant;
use tracing::Instrument;

const LATEST_FIRST: &str = "created_on:desc";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DispatchResult {
    /// Not a new event, or the project is not configured.
    Skipped,
    /// The message matched an ignored exception pattern.
    Suppressed,
    /// A note was added to this already open issue.
    Merged(IssueId),
    /// A new issue was created.
    Created(IssueId),
}

impl DispatchResult {
    pub const fn as_str(&self) -> &'static str {
        match self {
            DispatchResult::Skipped => "skipped",
            DispatchResult::Suppressed => "suppressed",
            DispatchResult::Merged(_) => "merged",
            DispatchResult::Created(_) => "created",
        }
    }

    pub const fn issue_id(&self) -> Option<IssueId> {
        match self {
            DispatchResult::Merged(id) | DispatchResult::Created(id) => Some(*id),
            DispatchResult::Skipped | DispatchResult::Suppressed => None,
        }
    }
}

/// Builds the tracker client for a project's host and credentials.
pub trait TrackerConnector: Send + Sync {
    fn connect(&self, config: &IntegrationConfig) -> Result<Arc<dyn IssueTracker>, TrackerError>;
}

/// Connects to Redmine over HTTP, sharing one connection pool between projects.
#[derive(Clone, Default)]
pub struct RedmineConnector {
    client: reqwest::Client,
}

impl RedmineConnector {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TrackerConnector for RedmineConnector {
    fn connect(&self, config: &IntegrationConfig) -> Result<Arc<dyn IssueTracker>, TrackerError> {
        let client =
            RedmineClient::with_client(self.client.clone(), config.host.trim(), config.credentials())?;
        Ok(Arc::new(client))
    }
}

#[derive(Clone)]
pub struct Dispatcher {
    url_prefix: String,
    connector: Arc<dyn TrackerConnector>,
}

impl Dispatcher {
    /// `url_prefix` is the public Sentry URL used to link back to events.
    pub fn new<S: Into<String>>(url_prefix: S, connector: Arc<dyn TrackerConnector>) -> Self {
        Dispatcher {
            url_prefix: url_prefix.into(),
            connector,
        }
    }

    pub async fn handle_event(
        &self,
        config: &IntegrationConfig,
        event: &IncomingEvent,
    ) -> Result<DispatchResult, DispatchError> {
        let span = tracing::info_span!(
            "dispatch",
            project = %event.project_slug,
            group_id = %event.group_id
        );
        let start = Instant::now();

        let result = self.dispatch(config, event).instrument(span).await;

        histogram!(DISPATCH_DURATION).record(start.elapsed().as_secs_f64());
        match &result {
            Ok(outcome) => counter!(DISPATCH_OUTCOME, "outcome" => outcome.as_str()).increment(1),
            Err(_) => counter!(TRACKER_ERROR).increment(1),
        }

        result
    }

    async fn dispatch(
        &self,
        config: &IntegrationConfig,
        event: &IncomingEvent,
    ) -> Result<DispatchResult, DispatchError> {
        if !event.is_new || !config.is_configured() {
            tracing::debug!(
                is_new = event.is_new,
                configured = config.is_configured(),
                "Skipping event"
            );
            return Ok(DispatchResult::Skipped);
        }

        let event_url = event.event_url(&self.url_prefix);
        let body = notification_body(&event_url, &event.message);

        if let Some(pattern) = config.ignored_exceptions.find_match(&event.message) {
            tracing::info!(pattern = pattern.as_str(), "Event matches an ignored exception");
            return Ok(DispatchResult::Suppressed);
        }

        let tracker = self.connector.connect(config)?;
        let project = tracker.find_project(&config.project).await?;

        if !config.same_issues.is_empty()
            && let Some(issue_id) =
                merge_into_open_issue(tracker.as_ref(), config, &project, event, &event_url, &body)
                    .await?
        {
            return Ok(DispatchResult::Merged(issue_id));
        }

        let mut new_issue = NewIssue {
            project_id: project.id,
            tracker_id: config.tracker.trim().to_string(),
            subject: event.subject(),
            description: body,
            custom_fields: event.custom_fields(),
            assigned_to_id: None,
        };

        if let Some(ids) = config.round_robin_ids() {
            let last_assignee = latest_assignee(tracker.as_ref(), &project).await?;
            new_issue.assigned_to_id = next_assignee(ids, last_assignee);
        }

        let issue = tracker.create_issue(&new_issue).await?;
        tracing::info!(
            issue_id = issue.id,
            assigned_to = ?new_issue.assigned_to_id,
            "Created issue"
        );

        Ok(DispatchResult::Created(issue.id))
    }
}

/// Searches open issues of the event's spider, or issues without a spider
/// when the event has none, and leaves a note on the merge target, returning
/// its id. `None` means a new issue should be created.
async fn merge_into_open_issue(
    tracker: &dyn IssueTracker,
    config: &IntegrationConfig,
    project: &Project,
    event: &IncomingEvent,
    event_url: &str,
    body: &str,
) -> Result<Option<IssueId>, TrackerError> {
    let query = IssueQuery::new(StatusFilter::Open);
    let query = match event.spider() {
        Some(spider) => query.with_custom_field(SPIDER_FIELD_ID, spider),
        None => query.without_custom_field(SPIDER_FIELD_ID),
    };
    let issues = tracker.list_issues(project.id, &query).await?;

    let (issue, notes) = match config.merge_policy {
        MergePolicy::FirstOpenIssue => {
            let Some(issue) = issues.first() else {
                return Ok(None);
            };
            let notes = if config.same_issues.is_match(&issue.subject) {
                related_event_note(event_url)
            } else {
                // The issue is commented on even though no pattern matched it
                new_event_note(body)
            };
            (issue, notes)
        }
        MergePolicy::PatternMatch => {
            let Some(issue) = issues
                .iter()
                .find(|issue| config.same_issues.is_match(&issue.subject))
            else {
                return Ok(None);
            };
            (issue, related_event_note(event_url))
        }
    };

    tracker.add_note(issue.id, &notes).await?;
    tracing::info!(issue_id = issue.id, subject = %issue.subject, "Added event to open issue");

    Ok(Some(issue.id))
}

/// Assignee of the most recently created issue that has one.
async fn latest_assignee(
    tracker: &dyn IssueTracker,
    project: &Project,
) -> Result<Option<UserId>, TrackerError> {
    let query = IssueQuery::new(StatusFilter::All)
        .sorted_by(LATEST_FIRST)
        .limit(1)
        .assigned_only();

    let issues = tracker.list_issues(project.id, &query).await?;
    Ok(issues.first().and_then(|issue| issue.assignee_id()))
}

fn related_event_note(event_url: &str) -> String {
    format!("Related event: {event_url}")
}

fn new_event_note(body: &str) -> String {
    format!("*New event*\n\n{body}")
}
