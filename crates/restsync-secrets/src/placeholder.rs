//! Secret placeholder tokens
//!
//! A placeholder is a string of the exact form `{{secret <key>}}` where
//! `<key>` is either `.` (use the attribute path as the secret key) or a
//! double-quoted literal key such as `{{secret "db-password"}}`.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use crate::{Error, Result};

/// Placeholder written by masking: key is the attribute's own path.
pub const CANONICAL_PLACEHOLDER: &str = "{{secret .}}";

static PLACEHOLDER_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^\{\{\s*secret\s+(\.|"(?:[^"\\]|\\.)*")\s*\}\}$"#).unwrap()
});

/// Anything that looks like it was meant to be a placeholder
static PLACEHOLDER_LIKE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\{\{\s*secret\b.*\}\}$").unwrap());

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Placeholder {
    /// `{{secret .}}`
    AttributePath,
    /// `{{secret "literal"}}`
    Key(String),
}

impl Placeholder {
    /// Parse a placeholder string.
    ///
    /// Returns `Ok(None)` for ordinary values and
    /// [`Error::InvalidPlaceholder`] for strings that start like a
    /// placeholder but do not match the grammar.
    pub fn parse(text: &str) -> Result<Option<Self>> {
        if let Some(captures) = PLACEHOLDER_PATTERN.captures(text) {
            let expr = &captures[1];
            if expr == "." {
                return Ok(Some(Self::AttributePath));
            }
            let key: String = serde_json::from_str(expr)
                .map_err(|_| Error::InvalidPlaceholder(text.to_string()))?;
            if key.is_empty() {
                return Err(Error::InvalidPlaceholder(text.to_string()));
            }
            return Ok(Some(Self::Key(key)));
        }
        if PLACEHOLDER_LIKE_PATTERN.is_match(text) {
            return Err(Error::InvalidPlaceholder(text.to_string()));
        }
        Ok(None)
    }

    /// True when `text` is a well-formed placeholder.
    pub fn is_placeholder(text: &str) -> bool {
        matches!(Self::parse(text), Ok(Some(_)))
    }

    /// Secret key this placeholder refers to when found at `attribute`.
    pub fn key_for(&self, attribute: &str) -> String {
        match self {
            Self::AttributePath => attribute.to_string(),
            Self::Key(key) => key.clone(),
        }
    }
}

impl fmt::Display for Placeholder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AttributePath => f.write_str(CANONICAL_PLACEHOLDER),
            Self::Key(key) => {
                let quoted = serde_json::to_string(key).map_err(|_| fmt::Error)?;
                write!(f, "{{{{secret {quoted}}}}}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("{{secret .}}", Some(Placeholder::AttributePath))]
    #[case("{{ secret . }}", Some(Placeholder::AttributePath))]
    #[case(r#"{{secret "db-password"}}"#, Some(Placeholder::Key("db-password".into())))]
    #[case(r#"{{secret "a \"quoted\" key"}}"#, Some(Placeholder::Key(r#"a "quoted" key"#.into())))]
    #[case("plain value", None)]
    #[case("{{other .}}", None)]
    #[case("", None)]
    fn test_parse(#[case] input: &str, #[case] expected: Option<Placeholder>) {
        assert_eq!(Placeholder::parse(input).unwrap(), expected);
    }

    #[rstest]
    #[case("{{secret}}")]
    #[case("{{secret db-password}}")]
    #[case(r#"{{secret ""}}"#)]
    fn test_parse_rejects_malformed(#[case] input: &str) {
        assert!(matches!(
            Placeholder::parse(input),
            Err(Error::InvalidPlaceholder(_))
        ));
    }

    #[test]
    fn test_display_round_trips() {
        for placeholder in [
            Placeholder::AttributePath,
            Placeholder::Key("client \"x\"".into()),
        ] {
            let rendered = placeholder.to_string();
            assert_eq!(Placeholder::parse(&rendered).unwrap(), Some(placeholder));
        }
    }

    #[test]
    fn test_key_for() {
        assert_eq!(Placeholder::AttributePath.key_for("credentials.secret"), "credentials.secret");
        assert_eq!(Placeholder::Key("k".into()).key_for("credentials.secret"), "k");
    }
}
