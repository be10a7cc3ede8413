use serde::Serialize;
use tracing::debug;

use crate::offload::{Job, JobExecutor, Payload};
use crate::protocol::{BackendError, DbResult, Outcome, RowSet, Target, Value};

/// A parameterised statement, already built by the caller.
///
/// The core does not compose SQL; it only carries the text and its bound
/// parameters to the connection's producer thread.
#[derive(Debug, Clone, Serialize)]
pub struct DbCommand {
    pub sql: String,
    /// Bound parameter values; `None` binds SQL NULL.
    pub params: Vec<Option<Vec<u8>>>,
}

impl DbCommand {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    pub fn bind(mut self, param: Option<Vec<u8>>) -> Self {
        self.params.push(param);
        self
    }
}

/// Native database client contract.
///
/// `execute` blocks until the backend answers, which is why database work
/// always routes through the offloader. The returned [`DbResult`] owns any
/// native result buffer behind its [`RowSet`] handle.
pub trait DatabaseClient: Send {
    fn execute(&mut self, command: &DbCommand) -> Result<DbResult, BackendError>;
}

/// Materialised row set for clients that copy the native result into owned
/// memory before releasing it.
pub struct BufferedRows {
    columns: Vec<String>,
    rows: Vec<Vec<Option<Vec<u8>>>>,
}

impl BufferedRows {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Option<Vec<u8>>>>) -> Self {
        Self { columns, rows }
    }
}

impl RowSet for BufferedRows {
    fn columns(&self) -> &[String] {
        &self.columns
    }

    fn len(&self) -> usize {
        self.rows.len()
    }

    fn get(&self, row: usize, col: usize) -> Option<&[u8]> {
        self.rows
            .get(row)
            .and_then(|cells| cells.get(col))
            .and_then(|cell| cell.as_deref())
    }
}

/// Runs database jobs on a producer thread.
pub struct DbExecutor<C: DatabaseClient> {
    client: C,
}

impl<C: DatabaseClient> DbExecutor<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }
}

impl<C: DatabaseClient> JobExecutor for DbExecutor<C> {
    fn target(&self) -> Target {
        Target::Database
    }

    fn execute(&mut self, job: &Job) -> Outcome {
        let command = match &job.payload {
            Payload::Db(command) => command,
            other => {
                return Outcome::Error(BackendError::protocol(
                    Target::Database,
                    format!("database producer received a {} payload", other.target()),
                ))
            }
        };
        debug!(invoke_id = %job.invoke_id, sql = %command.sql, "Executing statement");
        match self.client.execute(command) {
            Ok(result) => Outcome::Value(Value::Db(result)),
            Err(err) => Outcome::Error(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::InvokeId;
    use crate::protocol::DbResultKind;

    struct OneRowClient;

    impl DatabaseClient for OneRowClient {
        fn execute(&mut self, _command: &DbCommand) -> Result<DbResult, BackendError> {
            Ok(DbResult::Rows(Box::new(BufferedRows::new(
                vec!["id".to_string()],
                vec![vec![Some(b"1".to_vec())]],
            ))))
        }
    }

    fn job(payload: Payload) -> Job {
        Job {
            invoke_id: InvokeId::new(),
            target: payload.target(),
            payload,
            deadline: None,
            ctx: None,
        }
    }

    #[test]
    fn test_rows_translate_to_db_value() {
        let mut executor = DbExecutor::new(OneRowClient);
        let outcome = executor.execute(&job(Payload::Db(DbCommand::new("SELECT id FROM t"))));
        match outcome {
            Outcome::Value(Value::Db(result)) => {
                assert_eq!(result.kind(), DbResultKind::Rows);
                match result {
                    DbResult::Rows(rows) => {
                        assert_eq!(rows.len(), 1);
                        assert_eq!(rows.columns(), ["id".to_string()]);
                        assert_eq!(rows.get(0, 0), Some(b"1".as_slice()));
                        assert_eq!(rows.get(0, 1), None);
                    }
                    _ => unreachable!(),
                }
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn test_mismatched_payload_is_a_protocol_error() {
        let mut executor = DbExecutor::new(OneRowClient);
        let payload = Payload::Transport(crate::backends::transport::TransportCall::get("http://x"));
        let outcome = executor.execute(&job(payload));
        match outcome {
            Outcome::Error(err) => {
                assert_eq!(err.kind(), crate::protocol::ErrorKind::Protocol);
                assert_eq!(err.target(), Target::Database);
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }
}
