//! Group name lists accepted by membership checks.
//!
//! Callers may pass a list, a single name, or a delimited string such as
//! `"editors|staff"` or `"editors,staff"`. The string form is parsed here and
//! never reaches the resolver.

use serde::{Deserialize, Serialize};

/// A parsed, non-empty-entry list of group names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupNames(Vec<String>);

impl GroupNames {
    /// Parse a single name or a pipe/comma-delimited list.
    ///
    /// Commas are treated as pipes. A string wrapped in matching single or
    /// double quotes has the quotes stripped before splitting. Entries are
    /// trimmed and empty entries dropped.
    #[must_use]
    pub fn parse(input: &str) -> Self {
        let normalized = input.trim().replace(',', "|");
        let unquoted = strip_matching_quotes(&normalized);

        Self(
            unquoted
                .split('|')
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(str::to_owned)
                .collect(),
        )
    }

    #[must_use]
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

fn strip_matching_quotes(s: &str) -> &str {
    for quote in ['\'', '"'] {
        if s.len() >= 2 && s.starts_with(quote) && s.ends_with(quote) {
            return &s[1..s.len() - 1];
        }
    }
    s
}

impl From<&str> for GroupNames {
    fn from(input: &str) -> Self {
        Self::parse(input)
    }
}

impl From<String> for GroupNames {
    fn from(input: String) -> Self {
        Self::parse(&input)
    }
}

impl From<Vec<String>> for GroupNames {
    fn from(names: Vec<String>) -> Self {
        Self(
            names
                .into_iter()
                .map(|n| n.trim().to_owned())
                .filter(|n| !n.is_empty())
                .collect(),
        )
    }
}

impl From<&[&str]> for GroupNames {
    fn from(names: &[&str]) -> Self {
        names
            .iter()
            .map(|n| (*n).to_owned())
            .collect::<Vec<_>>()
            .into()
    }
}

impl<const N: usize> From<[&str; N]> for GroupNames {
    fn from(names: [&str; N]) -> Self {
        Self::from(&names[..])
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn single_name_is_one_entry() {
        assert_eq!(GroupNames::parse("editors").as_slice(), ["editors"]);
    }

    #[test]
    fn pipe_and_comma_both_split() {
        assert_eq!(
            GroupNames::parse("editors|staff").as_slice(),
            ["editors", "staff"]
        );
        assert_eq!(
            GroupNames::parse("editors, staff ,admins").as_slice(),
            ["editors", "staff", "admins"]
        );
        assert_eq!(
            GroupNames::parse("editors,staff|admins").as_slice(),
            ["editors", "staff", "admins"]
        );
    }

    #[test]
    fn quoted_list_has_quotes_stripped() {
        assert_eq!(
            GroupNames::parse("'editors|staff'").as_slice(),
            ["editors", "staff"]
        );
        assert_eq!(GroupNames::parse("\"editors\"").as_slice(), ["editors"]);
    }

    #[test]
    fn mismatched_quotes_are_kept() {
        assert_eq!(
            GroupNames::parse("'editors|staff").as_slice(),
            ["'editors", "staff"]
        );
    }

    #[test]
    fn empty_entries_are_dropped() {
        assert!(GroupNames::parse("").is_empty());
        assert!(GroupNames::parse(" | , ").is_empty());
        assert_eq!(GroupNames::parse("a||b").len(), 2);
    }

    #[test]
    fn list_inputs_are_not_split() {
        let names = GroupNames::from(["a|b", "c"]);
        assert_eq!(names.as_slice(), ["a|b", "c"]);
    }
}
