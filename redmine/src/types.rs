use serde::{Deserialize, Serialize};

/// Redmine filter operator matching issues where the field has no value.
pub const NO_VALUE: &str = "!*";

pub type IssueId = u64;
pub type UserId = u32;

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Project {
    pub id: u64,
    pub identifier: String,
    #[serde(default)]
    pub name: String,
}

/// `{"id": .., "name": ..}` reference used by Redmine for trackers, statuses and users.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct NamedRef<T = u64> {
    pub id: T,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct CustomField {
    pub id: u32,
    pub value: String,
}

impl CustomField {
    pub fn new<V: Into<String>>(id: u32, value: V) -> Self {
        CustomField {
            id,
            value: value.into(),
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Issue {
    pub id: IssueId,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub tracker: Option<NamedRef>,
    #[serde(default)]
    pub status: Option<NamedRef>,
    #[serde(default)]
    pub assigned_to: Option<NamedRef<UserId>>,
    #[serde(default)]
    pub custom_fields: Vec<IssueCustomField>,
    #[serde(default)]
    pub created_on: Option<String>,
}

impl Issue {
    pub fn assignee_id(&self) -> Option<UserId> {
        self.assigned_to.as_ref().map(|user| user.id)
    }
}

/// Custom field as returned on a fetched issue. Multi-valued fields and
/// fields without a value are possible, so the value is left as raw JSON.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct IssueCustomField {
    pub id: u32,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub value: serde_json::Value,
}

/// Payload for `POST /issues.json`.
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct NewIssue {
    pub project_id: u64,
    pub tracker_id: String,
    pub subject: String,
    pub description: String,
    pub custom_fields: Vec<CustomField>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_to_id: Option<UserId>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum StatusFilter {
    #[default]
    Open,
    All,
}

impl StatusFilter {
    pub const fn as_str(&self) -> &'static str {
        match self {
            StatusFilter::Open => "open",
            StatusFilter::All => "*",
        }
    }
}

/// Filters understood by `GET /issues.json`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct IssueQuery {
    pub status: StatusFilter,
    pub custom_fields: Vec<CustomField>,
    pub sort: Option<String>,
    pub limit: Option<u32>,
    pub assigned_only: bool,
}

impl IssueQuery {
    pub fn new(status: StatusFilter) -> Self {
        IssueQuery {
            status,
            ..Default::default()
        }
    }

    pub fn with_custom_field<V: Into<String>>(mut self, id: u32, value: V) -> Self {
        self.custom_fields.push(CustomField::new(id, value));
        self
    }

    /// Restricts the search to issues that have no value for this field.
    pub fn without_custom_field(self, id: u32) -> Self {
        self.with_custom_field(id, NO_VALUE)
    }

    pub fn sorted_by<S: Into<String>>(mut self, sort: S) -> Self {
        self.sort = Some(sort.into());
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn assigned_only(mut self) -> Self {
        self.assigned_only = true;
        self
    }

    /// Query string pairs, `project_id` excluded.
    pub fn to_query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = vec![("status_id".to_string(), self.status.as_str().to_string())];

        for field in &self.custom_fields {
            pairs.push((format!("cf_{}", field.id), field.value.clone()));
        }
        if let Some(sort) = &self.sort {
            pairs.push(("sort".to_string(), sort.clone()));
        }
        if let Some(limit) = self.limit {
            pairs.push(("limit".to_string(), limit.to_string()));
        }
        if self.assigned_only {
            pairs.push(("assigned_to_id".to_string(), "*".to_string()));
        }

        pairs
    }
}

#[derive(Deserialize)]
pub(crate) struct ProjectEnvelope {
    pub project: Project,
}

#[derive(Deserialize)]
pub(crate) struct IssueEnvelope {
    pub issue: Issue,
}

#[derive(Deserialize)]
pub(crate) struct IssueList {
    #[serde(default)]
    pub issues: Vec<Issue>,
}

#[derive(Serialize)]
pub(crate) struct NewIssueEnvelope<'a> {
    pub issue: &'a NewIssue,
}

#[derive(Serialize)]
pub(crate) struct IssueNotes<'a> {
    pub notes: &'a str,
}

#[derive(Serialize)]
pub(crate) struct IssueUpdateEnvelope<'a> {
    pub issue: IssueNotes<'a>,
}
