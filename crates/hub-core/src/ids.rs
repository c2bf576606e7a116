//! Branded ID newtypes for type safety.
//!
//! Sessions, agents, and correlation chains each get a distinct ID type
//! implemented as a newtype wrapper around `String`, so a correlation id can
//! never be passed where a session id is expected.
//!
//! None of the types validate their contents: ids written by other processes
//! are adopted verbatim.

use std::fmt;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

macro_rules! branded_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create from an existing string value.
            #[must_use]
            pub fn from_string(s: String) -> Self {
                Self(s)
            }

            /// Return the inner string as a slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume self and return the inner `String`.
            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl std::ops::Deref for $name {
            type Target = str;
            fn deref(&self) -> &str {
                &self.0
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

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

branded_id! {
    /// Identifier of a logical multi-agent session.
    ///
    /// Generated ids look like `sess_20260204_123456_9f86d081`.
    SessionId
}

branded_id! {
    /// Agent identity, conventionally `{role}:{domain-or-session}[:{id}]`.
    AgentId
}

branded_id! {
    /// Correlation id tying a causally related run of events together.
    ///
    /// Allocated ids look like `corr_{session}_{seq:03}`.
    CorrelationId
}

impl SessionId {
    /// Generate a fresh session id stamped with the current UTC time.
    #[must_use]
    pub fn generate() -> Self {
        Self::generate_at(Utc::now())
    }

    /// Generate a session id stamped with `now`.
    ///
    /// The random suffix is 32 bits from the thread-local CSPRNG, so two
    /// processes starting in the same second still diverge.
    #[must_use]
    pub fn generate_at(now: DateTime<Utc>) -> Self {
        let suffix: u32 = rand::rng().random();
        Self(format!("sess_{}_{suffix:08x}", now.format("%Y%m%d_%H%M%S")))
    }
}

impl CorrelationId {
    /// Build the correlation id for `sequence` within `session`.
    #[must_use]
    pub fn for_sequence(session: &SessionId, sequence: u64) -> Self {
        Self(format!("corr_{session}_{sequence:03}"))
    }

    /// Trailing sequence number, if the id follows the allocated format.
    #[must_use]
    pub fn sequence(&self) -> Option<u64> {
        let rest = self.0.strip_prefix("corr_")?;
        let (_, seq) = rest.rsplit_once('_')?;
        seq.parse().ok()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn generated_session_has_expected_shape() {
        let now = Utc.with_ymd_and_hms(2026, 2, 4, 12, 34, 56).unwrap();
        let id = SessionId::generate_at(now);
        let parts: Vec<&str> = id.split('_').collect();
        assert_eq!(parts.len(), 4);
        assert_eq!(parts[0], "sess");
        assert_eq!(parts[1], "20260204");
        assert_eq!(parts[2], "123456");
        assert_eq!(parts[3].len(), 8);
        assert!(parts[3].chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn generated_sessions_diverge_within_same_second() {
        let now = Utc.with_ymd_and_hms(2026, 2, 4, 0, 0, 0).unwrap();
        let ids: std::collections::HashSet<_> =
            (0..64).map(|_| SessionId::generate_at(now)).collect();
        assert!(ids.len() > 60);
    }

    #[test]
    fn correlation_id_is_zero_padded() {
        let session = SessionId::from("sess_x");
        assert_eq!(
            CorrelationId::for_sequence(&session, 1).as_str(),
            "corr_sess_x_001"
        );
        assert_eq!(
            CorrelationId::for_sequence(&session, 42).as_str(),
            "corr_sess_x_042"
        );
    }

    #[test]
    fn correlation_id_widens_past_999() {
        let session = SessionId::from("sess_x");
        assert_eq!(
            CorrelationId::for_sequence(&session, 1000).as_str(),
            "corr_sess_x_1000"
        );
    }

    #[test]
    fn correlation_sequence_parses_back() {
        let session = SessionId::from("sess_20260204_123456_abcd1234");
        let cid = CorrelationId::for_sequence(&session, 7);
        assert_eq!(cid.sequence(), Some(7));
        assert_eq!(CorrelationId::from("custom").sequence(), None);
    }

    #[test]
    fn ids_serialize_transparently() {
        let id = AgentId::from("spec:backend:auth01");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"spec:backend:auth01\"");
        let back: AgentId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn deref_and_display() {
        let id = SessionId::from("sess_fixed_0001");
        assert!(id.starts_with("sess_"));
        assert_eq!(format!("{id}"), "sess_fixed_0001");
        let s: String = id.into();
        assert_eq!(s, "sess_fixed_0001");
    }

    proptest::proptest! {
        #[test]
        fn correlation_sequence_roundtrips(seq in 1u64..1_000_000) {
            let session = SessionId::from("sess_prop");
            let cid = CorrelationId::for_sequence(&session, seq);
            proptest::prop_assert_eq!(cid.sequence(), Some(seq));
            proptest::prop_assert!(cid.rsplit('_').next().unwrap().len() >= 3);
        }
    }
}
