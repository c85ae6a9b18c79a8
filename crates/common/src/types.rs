use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Declares a newtype over a database-assigned `i64` key.
///
/// Keeps subject, client and service keys from being mixed up even though
/// they share the same storage representation.
macro_rules! numeric_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Wraps a raw key.
            pub const fn new(value: i64) -> Self {
                Self(value)
            }

            /// Returns the raw key.
            pub const fn as_i64(&self) -> i64 {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(value: i64) -> Self {
                Self(value)
            }
        }

        impl From<$name> for i64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

numeric_id!(
    /// Identifier of a provisioning subject (a domain order or hosting account).
    ///
    /// Assigned by the subject store at creation and never changed.
    SubjectId
);

numeric_id!(
    /// Identifier of the client that owns a subject.
    ClientId
);

numeric_id!(
    /// Identifier of the billed service a subject belongs to.
    ServiceId
);

/// Correlation identifier for one orchestration run.
///
/// Recorded in the `provisioning.started` payload so that every log line and
/// event of a run can be tied together during diagnosis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(Uuid);

impl RunId {
    /// Creates a new random run ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a run ID from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subject_id_preserves_value() {
        let id = SubjectId::new(42);
        assert_eq!(id.as_i64(), 42);
        assert_eq!(i64::from(id), 42);
        assert_eq!(id.to_string(), "42");
    }

    #[test]
    fn subject_id_serializes_as_plain_number() {
        let json = serde_json::to_string(&SubjectId::new(7)).unwrap();
        assert_eq!(json, "7");
        let back: SubjectId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, SubjectId::new(7));
    }

    #[test]
    fn ids_order_by_raw_value() {
        assert!(ClientId::new(1) < ClientId::new(2));
        assert!(ServiceId::from(10) > ServiceId::from(3));
    }

    #[test]
    fn run_id_new_creates_unique_ids() {
        assert_ne!(RunId::new(), RunId::new());
    }

    #[test]
    fn run_id_from_uuid_preserves_value() {
        let uuid = Uuid::new_v4();
        assert_eq!(RunId::from_uuid(uuid).as_uuid(), uuid);
    }
}
