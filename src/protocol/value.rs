use std::fmt;

use serde::Serialize;

use super::object::Target;

/// Content type of a cache reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum CacheReplyKind {
    Nil,
    Integer,
    String,
    Array,
    Status,
    Error,
}

impl CacheReplyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheReplyKind::Nil => "nil",
            CacheReplyKind::Integer => "integer",
            CacheReplyKind::String => "string",
            CacheReplyKind::Array => "array",
            CacheReplyKind::Status => "status",
            CacheReplyKind::Error => "error",
        }
    }
}

/// A cache backend reply, decoded by the native client.
///
/// Carries only scalar or owned-buffer state, so copies are independent:
/// releasing one copy's buffers never touches another's.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheReply {
    /// Key absent / empty reply
    Nil,
    Integer(i64),
    /// Bulk data bytes
    Data(Vec<u8>),
    /// Simple status line (e.g. `OK`)
    Status(String),
    /// Multi-element reply; elements may nest
    Array(Vec<CacheReply>),
    /// Protocol-level error reply
    Error(String),
}

impl CacheReply {
    pub fn kind(&self) -> CacheReplyKind {
        match self {
            CacheReply::Nil => CacheReplyKind::Nil,
            CacheReply::Integer(_) => CacheReplyKind::Integer,
            CacheReply::Data(_) => CacheReplyKind::String,
            CacheReply::Status(_) => CacheReplyKind::Status,
            CacheReply::Array(_) => CacheReplyKind::Array,
            CacheReply::Error(_) => CacheReplyKind::Error,
        }
    }
}

/// Single-owner handle over a database client's native result buffer.
///
/// The implementation releases the underlying buffer in its `Drop`; the core
/// never exposes the raw buffer, only row access through this trait. A
/// `DbResult::Rows` therefore releases its buffer exactly once, when the
/// value owning it is dropped or reset.
pub trait RowSet: Send {
    fn columns(&self) -> &[String];
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
    /// Cell bytes at (row, col); `None` for SQL NULL or out-of-range access.
    fn get(&self, row: usize, col: usize) -> Option<&[u8]>;
}

impl fmt::Debug for dyn RowSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RowSet")
            .field("columns", &self.columns().len())
            .field("rows", &self.len())
            .finish()
    }
}

/// Content type of a database result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum DbResultKind {
    Null,
    Rows,
    CommandStatus,
}

impl DbResultKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DbResultKind::Null => "null",
            DbResultKind::Rows => "rows",
            DbResultKind::CommandStatus => "command-status",
        }
    }
}

/// A database backend result.
///
/// `Rows` owns the client's native buffer through a [`RowSet`] handle and is
/// deliberately not clonable.
#[derive(Debug)]
pub enum DbResult {
    /// Statement produced no result
    Null,
    /// Query result set
    Rows(Box<dyn RowSet>),
    /// Command completion tag (e.g. `INSERT 0 1`)
    CommandStatus(String),
}

impl DbResult {
    pub fn kind(&self) -> DbResultKind {
        match self {
            DbResult::Null => DbResultKind::Null,
            DbResult::Rows(_) => DbResultKind::Rows,
            DbResult::CommandStatus(_) => DbResultKind::CommandStatus,
        }
    }
}

/// A tagged result payload from a backend that returns structured data.
///
/// `Value::Null` is the explicit "no value" case: it is constructed fresh
/// wherever needed instead of sharing a mutable sentinel instance. Replacing
/// a value's payload drops the previous one, which releases any owned native
/// buffer exactly once.
#[derive(Debug, Default)]
pub enum Value {
    #[default]
    Null,
    Cache(CacheReply),
    Db(DbResult),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// The backend the payload came from; `None` for the empty value.
    pub fn target(&self) -> Option<Target> {
        match self {
            Value::Null => None,
            Value::Cache(_) => Some(Target::Cache),
            Value::Db(_) => Some(Target::Database),
        }
    }

    /// Content-type tag as a string, for logs and debug representations.
    pub fn content_type(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Cache(reply) => reply.kind().as_str(),
            Value::Db(result) => result.kind().as_str(),
        }
    }

    /// Reset to the empty value, releasing the previous payload.
    ///
    /// Safe to call repeatedly: the old payload (and any native buffer it
    /// owns) is released on the first call only.
    pub fn reset(&mut self) {
        *self = Value::Null;
    }

    /// Take the payload out, leaving the empty value behind.
    pub fn take(&mut self) -> Value {
        std::mem::take(self)
    }

    /// Duplicate the value where its payload permits it.
    ///
    /// Cache replies and command statuses carry owned buffers and copy
    /// independently. `Db(Rows)` owns a native buffer with a single release
    /// point and cannot be duplicated; `None` is returned for it.
    pub fn try_clone(&self) -> Option<Value> {
        match self {
            Value::Null => Some(Value::Null),
            Value::Cache(reply) => Some(Value::Cache(reply.clone())),
            Value::Db(DbResult::Null) => Some(Value::Db(DbResult::Null)),
            Value::Db(DbResult::CommandStatus(tag)) => {
                Some(Value::Db(DbResult::CommandStatus(tag.clone())))
            }
            Value::Db(DbResult::Rows(_)) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    /// RowSet whose buffer release is observable through an Arc refcount.
    struct ProbeRows {
        _probe: Arc<()>,
        columns: Vec<String>,
    }

    impl RowSet for ProbeRows {
        fn columns(&self) -> &[String] {
            &self.columns
        }

        fn len(&self) -> usize {
            0
        }

        fn get(&self, _row: usize, _col: usize) -> Option<&[u8]> {
            None
        }
    }

    #[test]
    fn test_reset_releases_buffer_exactly_once() {
        let probe = Arc::new(());
        let rows = ProbeRows {
            _probe: probe.clone(),
            columns: vec!["id".to_string()],
        };
        let mut value = Value::Db(DbResult::Rows(Box::new(rows)));
        assert_eq!(Arc::strong_count(&probe), 2);

        value.reset();
        assert_eq!(Arc::strong_count(&probe), 1);
        assert!(value.is_null());

        // Resetting the already-empty value must not double-release.
        value.reset();
        assert_eq!(Arc::strong_count(&probe), 1);
        assert!(value.is_null());
    }

    #[test]
    fn test_take_leaves_fresh_empty_value() {
        let mut value = Value::Cache(CacheReply::Integer(42));
        let taken = value.take();
        assert!(value.is_null());
        assert_eq!(value.content_type(), "null");
        match taken {
            Value::Cache(CacheReply::Integer(42)) => {}
            other => panic!("unexpected payload: {:?}", other),
        }
    }

    #[test]
    fn test_cache_array_round_trip_and_independent_copy() {
        let reply = CacheReply::Array(vec![
            CacheReply::Data(b"alpha".to_vec()),
            CacheReply::Data(b"beta".to_vec()),
        ]);
        let value = Value::Cache(reply);
        assert_eq!(value.content_type(), "array");

        let mut copy = value.try_clone().expect("cache values are copyable");
        copy.reset();
        assert!(copy.is_null());

        // The original still holds both elements.
        match &value {
            Value::Cache(CacheReply::Array(items)) => {
                assert_eq!(items.len(), 2);
                assert_eq!(items[0], CacheReply::Data(b"alpha".to_vec()));
            }
            other => panic!("unexpected payload: {:?}", other),
        }
    }

    #[test]
    fn test_rows_value_is_not_clonable() {
        let rows = ProbeRows {
            _probe: Arc::new(()),
            columns: Vec::new(),
        };
        let value = Value::Db(DbResult::Rows(Box::new(rows)));
        assert!(value.try_clone().is_none());
        assert_eq!(value.content_type(), "rows");
    }
}
