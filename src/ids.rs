use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Strongly typed invocation identifier backed by ULID.
///
/// Assigned by the scheduler when a request is submitted and used to correlate
/// a backend's asynchronous completion with the originating request.
#[derive(Clone, Copy, Eq, PartialEq, Hash, Debug)]
pub struct InvokeId(pub ulid::Ulid);

impl InvokeId {
    pub fn new() -> Self {
        Self(ulid::Ulid::new())
    }

    pub fn from_ulid(id: ulid::Ulid) -> Self {
        Self(id)
    }
}

impl Default for InvokeId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for InvokeId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for InvokeId {
    type Err = ulid::DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let id = ulid::Ulid::from_string(s)?;
        Ok(InvokeId(id))
    }
}

impl Serialize for InvokeId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for InvokeId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse::<InvokeId>()
            .map_err(|_| serde::de::Error::custom("invalid invoke id"))
    }
}

/// Per-handler sequence tag.
///
/// Unlike [`InvokeId`], tags are only unique among the in-flight requests of a
/// single handler. They pair a backend's pipelined replies with the commands
/// that produced them, in submission order.
#[derive(Clone, Copy, Eq, PartialEq, Hash, Debug, Serialize, Deserialize)]
pub struct Tag(pub u64);

impl Display for Tag {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}
