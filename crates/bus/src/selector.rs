use crate::error::BusError;
use crate::message::Message;

use std::fmt;
use std::str::FromStr;

/// A parsed selector of the form `prop IN ('a', 'b')` or `prop = 'a'`.
///
/// Only string-valued properties take part in matching. A message without the
/// property never matches.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Selector {
    property: String,
    values: Vec<String>,
}

impl Selector {
    /// Builds an IN-selector directly.
    pub fn any_of<K, I, V>(property: K, values: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        Self {
            property: property.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// The property this selector tests.
    #[must_use]
    pub fn property(&self) -> &str {
        &self.property
    }

    /// The accepted values.
    #[must_use]
    pub fn values(&self) -> &[String] {
        &self.values
    }

    /// Whether the message passes this selector.
    #[must_use]
    pub fn matches(&self, message: &Message) -> bool {
        message
            .string_property(&self.property)
            .is_some_and(|value| self.values.iter().any(|accepted| accepted == value))
    }
}

fn parse_literal(literal: &str, source: &str) -> Result<String, BusError> {
    let literal = literal.trim();
    literal
        .strip_prefix('\'')
        .and_then(|rest| rest.strip_suffix('\''))
        .filter(|inner| !inner.contains('\''))
        .map(ToString::to_string)
        .ok_or_else(|| BusError::InvalidSelector(source.to_string()))
}

fn is_identifier(candidate: &str) -> bool {
    let mut chars = candidate.chars();
    chars
        .next()
        .is_some_and(|first| first.is_ascii_alphabetic() || first == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

impl FromStr for Selector {
    type Err = BusError;

    fn from_str(source: &str) -> Result<Self, Self::Err> {
        let invalid = || BusError::InvalidSelector(source.to_string());
        let trimmed = source.trim();

        if let Some((property, literal)) = trimmed.split_once('=') {
            let property = property.trim();
            if is_identifier(property) {
                return Ok(Self {
                    property: property.to_string(),
                    values: vec![parse_literal(literal, source)?],
                });
            }
        }

        let mut parts = trimmed.splitn(2, char::is_whitespace);
        let property = parts.next().ok_or_else(invalid)?;
        let rest = parts.next().ok_or_else(invalid)?.trim_start();
        if !is_identifier(property) {
            return Err(invalid());
        }

        let (keyword, list) = rest.split_at(rest.len().min(2));
        if !keyword.eq_ignore_ascii_case("IN") {
            return Err(invalid());
        }
        let list = list
            .trim()
            .strip_prefix('(')
            .and_then(|inner| inner.strip_suffix(')'))
            .ok_or_else(invalid)?;

        let values = list
            .split(',')
            .map(|literal| parse_literal(literal, source))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            property: property.to_string(),
            values,
        })
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let quoted: Vec<String> = self.values.iter().map(|v| format!("'{v}'")).collect();
        write!(f, "{} IN ({})", self.property, quoted.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use assert_matches::assert_matches;

    #[test]
    fn test_parse_in_clause() {
        let selector: Selector = "Activity IN ('PRESET', 'START')".parse().unwrap();

        assert_eq!(selector.property(), "Activity");
        assert_eq!(selector.values(), ["PRESET", "START"]);
        assert_eq!(selector.to_string(), "Activity IN ('PRESET', 'START')");
    }

    #[test]
    fn test_parse_equality() {
        let selector: Selector = "Activity = 'CANCEL'".parse().unwrap();

        assert_eq!(selector.values(), ["CANCEL"]);
    }

    #[test]
    fn test_matching() {
        let selector = Selector::any_of("Activity", ["PRESET", "PRESET_START"]);

        assert!(selector.matches(&Message::empty().with_property("Activity", "PRESET_START")));
        assert!(!selector.matches(&Message::empty().with_property("Activity", "START")));
        assert!(!selector.matches(&Message::empty()));
        assert!(!selector.matches(&Message::empty().with_property("Activity", 1)));
    }

    #[test]
    fn test_rejects_malformed_selectors() {
        for source in [
            "",
            "Activity",
            "Activity LIKE ('A')",
            "Activity IN 'A'",
            "Activity IN ('A', B)",
            "1abc = 'x'",
            "Activity = x",
        ] {
            assert_matches!(
                source.parse::<Selector>(),
                Err(BusError::InvalidSelector(_)),
                "{source}"
            );
        }
    }
}
