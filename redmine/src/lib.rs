//! Minimal client for the Redmine REST API.

pub mod client;
pub mod tracker;
pub mod types;

pub use client::{Credentials, RedmineClient, TrackerError};
pub use tracker::IssueTracker;
pub use types::{
    CustomField, Issue, IssueCustomField, IssueId, IssueQuery, NO_VALUE, NamedRef, NewIssue,
    Project, StatusFilter, UserId,
};
