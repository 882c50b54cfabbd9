use regex::{Regex, RegexBuilder};
use serde::Deserialize;

/// Comma separated list of case-insensitive regular expressions, as entered in
/// the project settings. Matching is a substring search, not an anchored match.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(try_from = "Option<String>")]
pub struct PatternList(Vec<Regex>);

impl PatternList {
    pub fn parse(raw: &str) -> Result<Self, regex::Error> {
        raw.split(',')
            .map(str::trim)
            .filter(|pattern| !pattern.is_empty())
            .map(|pattern| RegexBuilder::new(pattern).case_insensitive(true).build())
            .collect::<Result<Vec<_>, _>>()
            .map(PatternList)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns the first pattern found anywhere in `haystack`.
    pub fn find_match(&self, haystack: &str) -> Option<&Regex> {
        self.0.iter().find(|pattern| pattern.is_match(haystack))
    }

    pub fn is_match(&self, haystack: &str) -> bool {
        self.find_match(haystack).is_some()
    }

    pub fn sources(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(Regex::as_str)
    }
}

impl PartialEq for PatternList {
    fn eq(&self, other: &Self) -> bool {
        self.sources().eq(other.sources())
    }
}

impl TryFrom<Option<String>> for PatternList {
    type Error = regex::Error;

    fn try_from(raw: Option<String>) -> Result<Self, Self::Error> {
        match raw {
            Some(raw) => PatternList::parse(&raw),
            None => Ok(PatternList::default()),
        }
    }
}
