//! Serde helpers for human-readable durations in configuration.

use serde::de::{self, Visitor};
use serde::{Deserializer, Serializer};
use std::{fmt, time::Duration};

/// Duration fields accepting whole seconds or humantime strings (`"8s"`, `"1m30s"`).
pub mod duration {
    use super::*;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let duration_str = humantime::format_duration(*duration).to_string();
        serializer.serialize_str(&duration_str)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct DurationVisitor;

        impl<'de> Visitor<'de> for DurationVisitor {
            type Value = Duration;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str(
                    "a duration as seconds (number) or human-readable string (e.g., '8s', '1m30s')",
                )
            }

            fn visit_u64<E>(self, seconds: u64) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                Ok(Duration::from_secs(seconds))
            }

            fn visit_i64<E>(self, seconds: i64) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                u64::try_from(seconds)
                    .map(Duration::from_secs)
                    .map_err(|_| de::Error::custom(format!("Negative duration: {seconds}")))
            }

            fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                humantime::parse_duration(value.trim())
                    .map_err(|e| de::Error::custom(format!("Invalid duration '{value}': {e}")))
            }
        }

        deserializer.deserialize_any(DurationVisitor)
    }
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};
    use std::time::Duration;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Timeouts {
        #[serde(with = "super::duration")]
        handshake: Duration,
    }

    #[test]
    fn accepts_seconds_and_humantime() {
        let from_str: Timeouts = toml::from_str(r#"handshake = "1m30s""#).unwrap();
        assert_eq!(from_str.handshake, Duration::from_secs(90));

        let from_int: Timeouts = toml::from_str("handshake = 8").unwrap();
        assert_eq!(from_int.handshake, Duration::from_secs(8));

        assert!(toml::from_str::<Timeouts>(r#"handshake = "soon""#).is_err());
    }

    #[test]
    fn serializes_as_humantime() {
        let rendered = toml::to_string(&Timeouts {
            handshake: Duration::from_secs(8),
        })
        .unwrap();
        assert_eq!(rendered.trim(), r#"handshake = "8s""#);
    }
}
