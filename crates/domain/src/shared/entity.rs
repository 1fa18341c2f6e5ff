use serde::{de::Visitor, Deserialize, Serialize};
use std::fmt::Display;

/// Identifier of a stored event object.
///
/// The relational backend addresses events by numeric row id, the document
/// backend by UID string, and virtual occurrences of a recurring master by
/// the synthetic form `<uid>-<instance>`. `parse` only distinguishes numeric
/// from non-numeric input; resolving a `Uid` into a `Virtual` is the
/// document store's job, as only it knows which masters exist.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventObjectId {
    Db(i64),
    Uid(String),
    Virtual { uid: String, instance: u32 },
}

impl EventObjectId {
    pub fn parse(s: &str) -> Self {
        match s.parse::<i64>() {
            Ok(n) => Self::Db(n),
            Err(_) => Self::Uid(s.to_string()),
        }
    }

    pub fn as_db_id(&self) -> Option<i64> {
        match self {
            Self::Db(n) => Some(*n),
            _ => None,
        }
    }

    /// The UID part of a document-backend id, without any instance suffix.
    pub fn as_uid(&self) -> Option<&str> {
        match self {
            Self::Uid(uid) => Some(uid),
            Self::Virtual { uid, .. } => Some(uid),
            Self::Db(_) => None,
        }
    }

    /// Splits a `Uid` of the shape `<uid>-<digits>` into master uid and
    /// instance index. Fallback used when a direct lookup misses.
    pub fn split_instance_suffix(&self) -> Option<(String, u32)> {
        let raw = match self {
            Self::Uid(uid) => uid,
            Self::Virtual { uid, instance } => return Some((uid.clone(), *instance)),
            Self::Db(_) => return None,
        };
        let (master, suffix) = raw.rsplit_once('-')?;
        if master.is_empty() {
            return None;
        }
        let instance = suffix.parse::<u32>().ok()?;
        Some((master.to_string(), instance))
    }
}

impl Display for EventObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(n) => write!(f, "{}", n),
            Self::Uid(uid) => write!(f, "{}", uid),
            Self::Virtual { uid, instance } => write!(f, "{}-{}", uid, instance),
        }
    }
}

impl Serialize for EventObjectId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for EventObjectId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct EventObjectIdVisitor;

        impl<'de> Visitor<'de> for EventObjectIdVisitor {
            type Value = EventObjectId;

            fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
                formatter.write_str("A string event object id")
            }

            fn visit_str<E>(self, value: &str) -> Result<EventObjectId, E>
            where
                E: serde::de::Error,
            {
                Ok(EventObjectId::parse(value))
            }
        }

        deserializer.deserialize_str(EventObjectIdVisitor)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parses_numeric_ids_as_db_ids() {
        assert_eq!(EventObjectId::parse("42"), EventObjectId::Db(42));
        assert_eq!(
            EventObjectId::parse("abc123"),
            EventObjectId::Uid("abc123".into())
        );
    }

    #[test]
    fn splits_instance_suffix() {
        let id = EventObjectId::Uid("deadbeef-7".into());
        assert_eq!(id.split_instance_suffix(), Some(("deadbeef".into(), 7)));

        let id = EventObjectId::Uid("deadbeef".into());
        assert_eq!(id.split_instance_suffix(), None);

        let id = EventObjectId::Uid("dead-beef".into());
        assert_eq!(id.split_instance_suffix(), None);
    }

    #[test]
    fn virtual_ids_render_with_suffix() {
        let id = EventObjectId::Virtual {
            uid: "deadbeef".into(),
            instance: 3,
        };
        assert_eq!(id.to_string(), "deadbeef-3");
    }
}
