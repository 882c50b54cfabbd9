use crate::integration::scalar_string;
use redmine::CustomField;
use serde::Deserialize;

/// Subjects longer than this many characters are cut and suffixed with `..`.
pub const SUBJECT_MAX_CHARS: usize = 80;

/// Custom field carrying the spider (crawler) name, also used to narrow the
/// same-issue search.
pub const SPIDER_FIELD_ID: u32 = 1;
/// Custom field carrying the crawled site id taken from `id=<value>` in argv.
pub const SITE_ID_FIELD_ID: u32 = 10;
/// Custom field set to the same value on every created issue.
pub const FIXED_FIELD_ID: u32 = 2;
pub const FIXED_FIELD_VALUE: &str = "17";

const SPIDER_TAG: &str = "spider";
const SITE_ID_ARG_PREFIX: &str = "id=";

/// A new-event notification from Sentry.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct IncomingEvent {
    /// Whether this is the first event of its group.
    #[serde(default)]
    pub is_new: bool,
    pub team_slug: String,
    pub project_slug: String,
    #[serde(deserialize_with = "scalar_string")]
    pub group_id: String,
    pub message: String,
    #[serde(default)]
    pub tags: Vec<(String, String)>,
    #[serde(default)]
    pub extra: EventExtra,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct EventExtra {
    #[serde(rename = "sys.argv", default)]
    pub argv: Vec<String>,
}

impl IncomingEvent {
    pub fn event_url(&self, url_prefix: &str) -> String {
        format!(
            "{}/{}/{}/group/{}/",
            url_prefix.trim_end_matches('/'),
            self.team_slug,
            self.project_slug,
            self.group_id
        )
    }

    pub fn spider(&self) -> Option<&str> {
        self.tags
            .iter()
            .find(|(key, _)| key == SPIDER_TAG)
            .map(|(_, value)| value.as_str())
            .filter(|value| !value.is_empty())
    }

    /// Value of the first `id=<value>` process argument. Only the text after
    /// the last `=` is kept.
    pub fn site_id(&self) -> Option<&str> {
        self.extra
            .argv
            .iter()
            .find(|arg| arg.starts_with(SITE_ID_ARG_PREFIX))
            .and_then(|arg| arg.rsplit('=').next())
            .filter(|value| !value.is_empty())
    }

    pub fn custom_fields(&self) -> Vec<CustomField> {
        let mut fields = vec![CustomField::new(FIXED_FIELD_ID, FIXED_FIELD_VALUE)];

        if let Some(spider) = self.spider() {
            fields.push(CustomField::new(SPIDER_FIELD_ID, spider));
        }
        if let Some(site_id) = self.site_id() {
            fields.push(CustomField::new(SITE_ID_FIELD_ID, site_id));
        }

        fields
    }

    pub fn subject(&self) -> String {
        truncate_subject(&self.message)
    }
}

pub fn truncate_subject(message: &str) -> String {
    match message.char_indices().nth(SUBJECT_MAX_CHARS) {
        Some((cut, _)) => format!("{}..", &message[..cut]),
        None => message.to_string(),
    }
}

/// Issue description / comment body linking back to Sentry.
pub fn notification_body(event_url: &str, message: &str) -> String {
    format!("\"Sentry event url\":{event_url}\n\n<pre>\n{message}\n</pre>\n")
}
