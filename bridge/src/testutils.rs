use crate::dispatcher::TrackerConnector;
use crate::event::IncomingEvent;
use crate::integration::IntegrationConfig;
use async_trait::async_trait;
use hyper::StatusCode;
use redmine::{
    Issue, IssueCustomField, IssueId, IssueQuery, IssueTracker, NO_VALUE, NamedRef, NewIssue,
    Project, StatusFilter, TrackerError, UserId,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const API_KEY: &str = "0123456789abcdef0123456789abcdef01234567";

#[derive(Clone, Debug, PartialEq)]
pub enum TrackerCall {
    FindProject(String),
    ListIssues(u64, IssueQuery),
    CreateIssue(NewIssue),
    AddNote(IssueId, String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Step {
    FindProject,
    ListOpenIssues,
    ListAssignedIssues,
    CreateIssue,
    AddNote,
}

/// In-memory tracker recording every call. Open-issue searches return the
/// `open_issues` passing the query's custom field filters and the round robin
/// lookup returns `latest_assigned`.
pub struct RecordingTracker {
    pub project: Project,
    pub open_issues: Vec<Issue>,
    pub latest_assigned: Vec<Issue>,
    pub created_id: IssueId,
    pub fail_at: Option<Step>,
    pub(crate) calls: Mutex<Vec<TrackerCall>>,
}

impl Default for RecordingTracker {
    fn default() -> Self {
        RecordingTracker {
            project: Project {
                id: 7,
                identifier: "scripts".into(),
                name: "Scripts".into(),
            },
            open_issues: vec![],
            latest_assigned: vec![],
            created_id: 100,
            fail_at: None,
            calls: Mutex::new(vec![]),
        }
    }
}

impl RecordingTracker {
    pub fn calls(&self) -> Vec<TrackerCall> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: TrackerCall, step: Step) -> Result<(), TrackerError> {
        self.calls.lock().unwrap().push(call);
        if self.fail_at == Some(step) {
            return Err(TrackerError::UnexpectedStatus {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                body: format!("{step:?} failed"),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl IssueTracker for RecordingTracker {
    async fn find_project(&self, identifier: &str) -> Result<Project, TrackerError> {
        self.record(TrackerCall::FindProject(identifier.into()), Step::FindProject)?;
        Ok(self.project.clone())
    }

    async fn list_issues(
        &self,
        project_id: u64,
        query: &IssueQuery,
    ) -> Result<Vec<Issue>, TrackerError> {
        let step = match query.status {
            StatusFilter::All => Step::ListAssignedIssues,
            StatusFilter::Open => Step::ListOpenIssues,
        };
        self.record(TrackerCall::ListIssues(project_id, query.clone()), step)?;

        Ok(match step {
            Step::ListAssignedIssues => self.latest_assigned.clone(),
            _ => self
                .open_issues
                .iter()
                .filter(|issue| matches_custom_fields(issue, query))
                .cloned()
                .collect(),
        })
    }

    async fn create_issue(&self, issue: &NewIssue) -> Result<Issue, TrackerError> {
        self.record(TrackerCall::CreateIssue(issue.clone()), Step::CreateIssue)?;

        let mut created = self::issue(self.created_id, &issue.subject, issue.assigned_to_id);
        created.description = Some(issue.description.clone());
        Ok(created)
    }

    async fn add_note(&self, issue_id: IssueId, notes: &str) -> Result<(), TrackerError> {
        self.record(TrackerCall::AddNote(issue_id, notes.into()), Step::AddNote)
    }
}

fn matches_custom_fields(issue: &Issue, query: &IssueQuery) -> bool {
    query.custom_fields.iter().all(|filter| {
        let value = issue
            .custom_fields
            .iter()
            .find(|field| field.id == filter.id)
            .and_then(|field| field.value.as_str())
            .filter(|value| !value.is_empty());
        match filter.value.as_str() {
            NO_VALUE => value.is_none(),
            expected => value == Some(expected),
        }
    })
}

/// Hands out the same recording tracker for every project.
pub struct StaticConnector {
    tracker: Arc<RecordingTracker>,
    connections: AtomicUsize,
}

impl StaticConnector {
    pub fn new(tracker: RecordingTracker) -> Self {
        StaticConnector {
            tracker: Arc::new(tracker),
            connections: AtomicUsize::new(0),
        }
    }

    pub fn tracker(&self) -> &RecordingTracker {
        &self.tracker
    }

    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::Relaxed)
    }
}

impl TrackerConnector for StaticConnector {
    fn connect(&self, _config: &IntegrationConfig) -> Result<Arc<dyn IssueTracker>, TrackerError> {
        self.connections.fetch_add(1, Ordering::Relaxed);
        let tracker: Arc<dyn IssueTracker> = self.tracker.clone();
        Ok(tracker)
    }
}

pub fn issue(id: IssueId, subject: &str, assignee: Option<UserId>) -> Issue {
    Issue {
        id,
        subject: subject.into(),
        description: None,
        tracker: None,
        status: None,
        assigned_to: assignee.map(|id| NamedRef { id, name: None }),
        custom_fields: vec![],
        created_on: None,
    }
}

pub fn issue_of_spider(id: IssueId, subject: &str, spider: &str) -> Issue {
    let mut issue = issue(id, subject, None);
    issue.custom_fields.push(IssueCustomField {
        id: crate::event::SPIDER_FIELD_ID,
        name: Some("Spider".into()),
        value: spider.into(),
    });
    issue
}

pub fn configured_project() -> IntegrationConfig {
    IntegrationConfig {
        host: "https://redmine.example.com".into(),
        key: Some(API_KEY.into()),
        project: "scripts".into(),
        tracker: "1".into(),
        ..Default::default()
    }
}

pub fn new_event(message: &str) -> IncomingEvent {
    IncomingEvent {
        is_new: true,
        team_slug: "acme".into(),
        project_slug: "backend".into(),
        group_id: "1234".into(),
        message: message.into(),
        ..Default::default()
    }
}
