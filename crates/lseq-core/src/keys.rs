//! Opaque identifiers for learning contexts and the content inside them.
//!
//! Course keys come in two textual formats:
//!
//! ```text
//! course-v1:edX+DemoX+2020      current format
//! edX/DemoX/2020                deprecated slash-separated format
//! ```
//!
//! Both parse, but only the current format is accepted by the reader and the
//! reconciler. Usage keys are treated as opaque strings.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Maximum stored length of any key.
pub const MAX_KEY_LEN: usize = 255;

const COURSE_KEY_PREFIX: &str = "course-v1:";

/// Errors produced when parsing key text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyParseError {
    #[error("invalid course key {0:?}")]
    InvalidCourseKey(String),

    #[error("invalid usage key {0:?}")]
    InvalidUsageKey(String),
}

/// Identifier of a course-like learning context.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CourseKey {
    org: String,
    course: String,
    run: String,
    deprecated: bool,
}

impl CourseKey {
    /// Whether this key uses the legacy slash-separated format.
    pub fn is_deprecated(&self) -> bool {
        self.deprecated
    }
}

fn valid_part(part: &str) -> bool {
    !part.is_empty()
        && part
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '~' | '%'))
}

impl fmt::Display for CourseKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.deprecated {
            write!(f, "{}/{}/{}", self.org, self.course, self.run)
        } else {
            write!(f, "{COURSE_KEY_PREFIX}{}+{}+{}", self.org, self.course, self.run)
        }
    }
}

impl FromStr for CourseKey {
    type Err = KeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || KeyParseError::InvalidCourseKey(s.to_owned());
        if s.len() > MAX_KEY_LEN {
            return Err(invalid());
        }

        let (parts, deprecated): (Vec<&str>, bool) = match s.strip_prefix(COURSE_KEY_PREFIX) {
            Some(rest) => (rest.split('+').collect(), false),
            None => (s.split('/').collect(), true),
        };

        match parts.as_slice() {
            [org, course, run] if [org, course, run].iter().all(|p| valid_part(p)) => Ok(Self {
                org: (*org).to_owned(),
                course: (*course).to_owned(),
                run: (*run).to_owned(),
                deprecated,
            }),
            _ => Err(invalid()),
        }
    }
}

impl TryFrom<String> for CourseKey {
    type Error = KeyParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<CourseKey> for String {
    fn from(key: CourseKey) -> Self {
        key.to_string()
    }
}

/// Identifier of one piece of content (section, sequence, ...) within a
/// learning context.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UsageKey(String);

impl UsageKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UsageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for UsageKey {
    type Err = KeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() || s.len() > MAX_KEY_LEN || s.chars().any(char::is_whitespace) {
            return Err(KeyParseError::InvalidUsageKey(s.to_owned()));
        }
        Ok(Self(s.to_owned()))
    }
}

impl TryFrom<String> for UsageKey {
    type Error = KeyParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<UsageKey> for String {
    fn from(key: UsageKey) -> Self {
        key.0
    }
}
