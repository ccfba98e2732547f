use crate::validation::ValidationError;
use chrono::{DateTime, SecondsFormat, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! newtype {
    ($name:ident, $doc:expr, $pattern:expr) => {
        #[doc = $doc]
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Parses a validated identifier from a string.
            pub fn parse(value: impl Into<String>) -> Result<Self, ValidationError> {
                let s = value.into();
                if !Regex::new($pattern).expect("invalid regex").is_match(&s) {
                    return Err(ValidationError::PatternMismatch {
                        field: stringify!($name),
                        value: s,
                    });
                }
                Ok(Self(s))
            }

            /// Borrowed string form.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = ValidationError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::parse(value)
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

newtype!(
    ActorId,
    "Opaque actor identifier (a GitHub login, bots included); no whitespace, at most 128 chars.",
    r"^[^\s\x00-\x1f]{1,128}$"
);
newtype!(
    SourceUrl,
    "Dereferenceable pointer to the originating event (`http(s)://...`).",
    r"^https?://\S+$"
);
newtype!(
    Timestamp,
    "UTC RFC3339 timestamp with `Z` suffix.",
    r"^\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}(\.\d{1,9})?Z$"
);

impl Timestamp {
    /// Formats a UTC instant with second precision and a `Z` suffix.
    pub fn from_datetime(at: DateTime<Utc>) -> Self {
        Self(at.to_rfc3339_opts(SecondsFormat::Secs, true))
    }

    /// Current wall-clock time.
    pub fn now() -> Self {
        Self::from_datetime(Utc::now())
    }

    /// Parses the timestamp into a chrono instant.
    pub fn to_datetime(&self) -> Result<DateTime<Utc>, ValidationError> {
        DateTime::parse_from_rfc3339(&self.0)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|_| ValidationError::PatternMismatch {
                field: "Timestamp",
                value: self.0.clone(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn actor_ids_accept_bots_and_reject_whitespace() {
        assert!(ActorId::parse("dependabot[bot]").is_ok());
        assert!(ActorId::parse("alice").is_ok());
        assert!(ActorId::parse("").is_err());
        assert!(ActorId::parse("al ice").is_err());
    }

    #[test]
    fn timestamps_require_zulu() {
        assert!(Timestamp::parse("2024-01-15T10:30:00Z").is_ok());
        assert!(Timestamp::parse("2024-01-15T10:30:00.123456Z").is_ok());
        assert!(Timestamp::parse("2024-01-15T10:30:00+00:00").is_err());
    }

    #[test]
    fn timestamp_from_datetime_uses_z_suffix() {
        let at = DateTime::parse_from_rfc3339("2024-01-15T10:30:00+02:00")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(Timestamp::from_datetime(at).as_str(), "2024-01-15T08:30:00Z");
    }

    #[test]
    fn source_urls_need_scheme() {
        assert!(SourceUrl::parse("https://github.com/o/r/pull/1").is_ok());
        assert!(SourceUrl::parse("github.com/o/r/pull/1").is_err());
    }

    #[test]
    fn deserialization_validates() {
        assert!(serde_json::from_str::<Timestamp>(r#""yesterday""#).is_err());
        let actor: ActorId = serde_json::from_str(r#""bob""#).unwrap();
        assert_eq!(actor.as_str(), "bob");
    }
}
