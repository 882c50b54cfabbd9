//! Per-project integration settings and their validation.
//!
//! `is_configured` is the cheap check run for every event. Full validation
//! happens once when settings are loaded, so problems with credentials or
//! round robin settings are reported to whoever edits the configuration
//! instead of surfacing at dispatch time.

use crate::patterns::PatternList;
use redmine::{Credentials, UserId};
use serde::{Deserialize, Deserializer, de};
use url::Url;

/// Minimum length of a Redmine API key.
pub const API_KEY_MIN_LEN: usize = 40;

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum ConfigInvalid {
    #[error("missing required configuration value")]
    MissingRequired,
    #[error("need at least username, password or just API key")]
    MissingCredentials,
    #[error("API key is malformed")]
    MalformedApiKey,
    #[error("need round robin users ids if round robin is activated")]
    MissingRoundRobinIds,
    #[error("host is not a valid URL: {0}")]
    InvalidHost(String),
}

/// What to do with the open issues found by a same-issue search.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MergePolicy {
    /// Comment on the first open issue returned by the search. The comment is
    /// a link to the event when a same-issue pattern matches its subject and
    /// the full report otherwise. A new issue is only created when the search
    /// returns nothing.
    #[default]
    FirstOpenIssue,
    /// Comment on the first open issue whose subject matches a same-issue
    /// pattern. Create a new issue when none does.
    PatternMatch,
}

/// Ordered list of Redmine user ids used for round robin assignment.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RoundRobinIds(Vec<UserId>);

#[derive(Deserialize)]
#[serde(untagged)]
enum RawUserIds {
    Text(String),
    Single(UserId),
    List(Vec<UserId>),
}

impl RoundRobinIds {
    pub fn new(ids: Vec<UserId>) -> Self {
        RoundRobinIds(ids)
    }

    pub fn parse(raw: &str) -> Result<Self, String> {
        raw.split(',')
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(|id| {
                id.parse::<UserId>()
                    .map_err(|e| format!("invalid round robin user id {id:?}: {e}"))
            })
            .collect::<Result<Vec<_>, _>>()
            .map(RoundRobinIds)
    }

    pub fn as_slice(&self) -> &[UserId] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// Accepts the settings form value ("2,3,4") as well as a YAML integer or list.
impl<'de> Deserialize<'de> for RoundRobinIds {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<RawUserIds>::deserialize(deserializer)? {
            None => Ok(RoundRobinIds::default()),
            Some(RawUserIds::Text(text)) => RoundRobinIds::parse(&text).map_err(de::Error::custom),
            Some(RawUserIds::Single(id)) => Ok(RoundRobinIds(vec![id])),
            Some(RawUserIds::List(ids)) => Ok(RoundRobinIds(ids)),
        }
    }
}

/// Settings for one tracked project.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct IntegrationConfig {
    /// Redmine base URL, e.g. `http://bugs.redmine.org`.
    #[serde(default, deserialize_with = "scalar_string")]
    pub host: String,
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    /// Redmine project identifier.
    #[serde(default, deserialize_with = "scalar_string")]
    pub project: String,
    /// Redmine tracker id for created issues.
    #[serde(default, deserialize_with = "scalar_string")]
    pub tracker: String,
    /// Events whose message matches one of these are never sent.
    #[serde(default)]
    pub ignored_exceptions: PatternList,
    /// Open issues whose subject matches one of these receive a comment
    /// instead of a new issue being created.
    #[serde(default)]
    pub same_issues: PatternList,
    #[serde(default)]
    pub round_robin: bool,
    #[serde(default)]
    pub round_robin_ids: RoundRobinIds,
    #[serde(default)]
    pub merge_policy: MergePolicy,
}

impl IntegrationConfig {
    /// True when host, project and tracker are all non-empty. Whitespace
    /// counts as a value.
    pub fn is_configured(&self) -> bool {
        [&self.host, &self.project, &self.tracker]
            .iter()
            .all(|value| !value.is_empty())
    }

    /// Full validation, returning the configuration unchanged when it passes.
    pub fn validate(self) -> Result<Self, ConfigInvalid> {
        self.check()?;
        Ok(self)
    }

    pub fn check(&self) -> Result<(), ConfigInvalid> {
        if !self.is_configured() {
            return Err(ConfigInvalid::MissingRequired);
        }

        let key = present(&self.key);
        let has_login = present(&self.username).is_some() && present(&self.password).is_some();
        if key.is_none() && !has_login {
            return Err(ConfigInvalid::MissingCredentials);
        }

        if let Some(key) = key
            && key.chars().count() < API_KEY_MIN_LEN
        {
            return Err(ConfigInvalid::MalformedApiKey);
        }

        if self.round_robin && self.round_robin_ids.is_empty() {
            return Err(ConfigInvalid::MissingRoundRobinIds);
        }

        match Url::parse(self.host.trim()) {
            Ok(url) if !url.cannot_be_a_base() => Ok(()),
            Ok(_) => Err(ConfigInvalid::InvalidHost(self.host.clone())),
            Err(e) => Err(ConfigInvalid::InvalidHost(format!("{}: {e}", self.host))),
        }
    }

    pub fn credentials(&self) -> Credentials {
        Credentials {
            api_key: present(&self.key).map(String::from),
            username: present(&self.username).map(String::from),
            password: present(&self.password).map(String::from),
        }
    }

    /// Round robin candidates, or `None` when round robin is not in use.
    pub fn round_robin_ids(&self) -> Option<&[UserId]> {
        if self.round_robin && !self.round_robin_ids.is_empty() {
            Some(self.round_robin_ids.as_slice())
        } else {
            None
        }
    }
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Text(String),
    Integer(u64),
}

/// Accepts either a string or an integer, so `tracker: 1` and `tracker: "1"` are equivalent.
pub(crate) fn scalar_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Scalar>::deserialize(deserializer)? {
        Some(Scalar::Text(text)) => text,
        Some(Scalar::Integer(number)) => number.to_string(),
        None => String::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const API_KEY: &str = "0123456789abcdef0123456789abcdef01234567";

    fn base_config() -> IntegrationConfig {
        IntegrationConfig {
            host: "https://redmine.example.com".into(),
            key: Some(API_KEY.into()),
            project: "scripts".into(),
            tracker: "1".into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_is_configured() {
        assert!(base_config().is_configured());

        for clear in [
            (|c: &mut IntegrationConfig| c.host.clear()) as fn(&mut IntegrationConfig),
            |c| c.project.clear(),
            |c| c.tracker.clear(),
        ] {
            let mut config = base_config();
            clear(&mut config);
            assert!(!config.is_configured());
            assert_eq!(config.validate(), Err(ConfigInvalid::MissingRequired));
        }
    }

    #[test]
    fn test_whitespace_value_counts_as_configured() {
        let config = IntegrationConfig {
            tracker: "  ".into(),
            ..base_config()
        };
        assert!(config.is_configured());
        assert_eq!(config.check(), Ok(()));
    }

    #[test]
    fn test_valid_config_is_returned_unchanged() {
        let config = base_config();
        assert_eq!(config.clone().validate(), Ok(config));
    }

    #[test]
    fn test_credentials_required() {
        let mut config = base_config();
        config.key = None;
        assert_eq!(
            config.clone().validate(),
            Err(ConfigInvalid::MissingCredentials)
        );

        // A username alone is not enough
        config.username = Some("bot".into());
        assert_eq!(
            config.clone().validate(),
            Err(ConfigInvalid::MissingCredentials)
        );

        config.password = Some("secret".into());
        assert!(config.validate().is_ok());

        // Empty strings count as missing
        let mut config = base_config();
        config.key = Some(String::new());
        config.username = Some("bot".into());
        config.password = Some(String::new());
        assert_eq!(config.validate(), Err(ConfigInvalid::MissingCredentials));
    }

    #[test]
    fn test_short_api_key() {
        let mut config = base_config();
        config.key = Some("a".repeat(39));
        assert_eq!(config.validate(), Err(ConfigInvalid::MalformedApiKey));

        // Checked even when a username/password pair is also present
        let mut config = base_config();
        config.key = Some("short".into());
        config.username = Some("bot".into());
        config.password = Some("secret".into());
        assert_eq!(config.validate(), Err(ConfigInvalid::MalformedApiKey));
    }

    #[test]
    fn test_round_robin_needs_ids() {
        let mut config = base_config();
        config.round_robin = true;
        assert_eq!(
            config.clone().validate(),
            Err(ConfigInvalid::MissingRoundRobinIds)
        );
        assert_eq!(config.round_robin_ids(), None);

        config.round_robin_ids = RoundRobinIds::new(vec![2, 3, 4]);
        assert_eq!(config.round_robin_ids(), Some(&[2, 3, 4][..]));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_round_robin_ids_ignored_when_disabled() {
        let mut config = base_config();
        config.round_robin_ids = RoundRobinIds::new(vec![2, 3]);
        assert_eq!(config.round_robin_ids(), None);
    }

    #[test]
    fn test_checks_run_in_order() {
        // Missing credentials is reported before the round robin problem
        let mut config = base_config();
        config.key = None;
        config.round_robin = true;
        assert_eq!(config.validate(), Err(ConfigInvalid::MissingCredentials));
    }

    #[test]
    fn test_invalid_host() {
        let mut config = base_config();
        config.host = "redmine.example.com".into();
        assert!(matches!(
            config.validate(),
            Err(ConfigInvalid::InvalidHost(_))
        ));
    }

    #[test]
    fn test_deserialize_form_values() {
        let yaml = r#"
host: https://redmine.example.com
key: 0123456789abcdef0123456789abcdef01234567
project: scripts
tracker: 1
ignored_exceptions: "Connection.*,Timeout"
same_issues: ""
round_robin: true
round_robin_ids: "2, 3,4"
merge_policy: pattern_match
"#;
        let config: IntegrationConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.tracker, "1");
        assert_eq!(config.ignored_exceptions.len(), 2);
        assert!(config.same_issues.is_empty());
        assert_eq!(config.round_robin_ids.as_slice(), &[2, 3, 4]);
        assert_eq!(config.merge_policy, MergePolicy::PatternMatch);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_deserialize_defaults() {
        let config: IntegrationConfig = serde_yaml::from_str("project: scripts").unwrap();
        assert!(!config.is_configured());
        assert!(config.ignored_exceptions.is_empty());
        assert!(!config.round_robin);
        assert!(config.round_robin_ids.is_empty());
        assert_eq!(config.merge_policy, MergePolicy::FirstOpenIssue);

        let config: IntegrationConfig =
            serde_yaml::from_str("same_issues:\nround_robin_ids:\n").unwrap();
        assert!(config.same_issues.is_empty());
        assert!(config.round_robin_ids.is_empty());
    }

    #[test]
    fn test_round_robin_id_forms() {
        let single: IntegrationConfig = serde_yaml::from_str("round_robin_ids: 5").unwrap();
        assert_eq!(single.round_robin_ids.as_slice(), &[5]);

        let list: IntegrationConfig = serde_yaml::from_str("round_robin_ids: [2, 3]").unwrap();
        assert_eq!(list.round_robin_ids.as_slice(), &[2, 3]);

        assert!(serde_yaml::from_str::<IntegrationConfig>("round_robin_ids: \"2,x\"").is_err());
    }

    #[test]
    fn test_invalid_pattern_rejected_at_load() {
        assert!(serde_yaml::from_str::<IntegrationConfig>("ignored_exceptions: \"(oops\"").is_err());
    }

    #[test]
    fn test_credentials() {
        let mut config = base_config();
        config.username = Some(String::new());
        let credentials = config.credentials();
        assert_eq!(credentials.api_key.as_deref(), Some(API_KEY));
        assert_eq!(credentials.username, None);
        assert_eq!(credentials.password, None);
    }
}
