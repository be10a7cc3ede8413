#![allow(dead_code)] // shared across test binaries; each uses a subset

use std::io::{self, BufRead, BufReader, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::os::fd::{AsRawFd, RawFd};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use switchyard::backends::cache::CacheClient;
use switchyard::backends::database::{BufferedRows, DatabaseClient, DbCommand};
use switchyard::hub::Interest;
use switchyard::offload::{Job, JobExecutor, Payload};
use switchyard::protocol::{BackendError, CacheReply, DbResult, Outcome, Target, Value};

/// Scripted behavior of the fake cache server, one action per received
/// command line.
pub enum ServerAction {
    /// Write the reply immediately. Multi-line replies (arrays) embed '\n'.
    Reply(&'static str),
    /// Write the reply after a delay
    DelayedReply(u64, &'static str),
    /// Never answer this command
    Ignore,
    /// Close the connection without answering
    Close,
}

/// Line-protocol cache server for hub tests.
///
/// Reply grammar mirrors the client below: `+status`, `:integer`, `$data`,
/// `-error`, `_` for nil, and `*N` followed by N element lines.
pub fn spawn_cache_server(script: Vec<ServerAction>) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind cache server");
    let addr = listener.local_addr().expect("server addr");

    thread::spawn(move || {
        let (stream, _) = match listener.accept() {
            Ok(conn) => conn,
            Err(_) => return,
        };
        let mut reader = BufReader::new(stream.try_clone().expect("clone stream"));
        let mut writer = stream;

        for action in script {
            let mut line = String::new();
            match reader.read_line(&mut line) {
                Ok(0) | Err(_) => return,
                Ok(_) => {}
            }
            match action {
                ServerAction::Reply(reply) => {
                    let _ = writeln!(writer, "{}", reply);
                }
                ServerAction::DelayedReply(delay_ms, reply) => {
                    thread::sleep(Duration::from_millis(delay_ms));
                    let _ = writeln!(writer, "{}", reply);
                }
                ServerAction::Ignore => {}
                ServerAction::Close => {
                    let _ = writer.shutdown(std::net::Shutdown::Both);
                    return;
                }
            }
        }

        // Script exhausted: hold the connection open until the client leaves.
        let mut line = String::new();
        while matches!(reader.read_line(&mut line), Ok(n) if n > 0) {
            line.clear();
        }
    });

    addr
}

/// Non-blocking line-protocol cache client used as the hub-side native
/// client in tests.
pub struct LineCacheClient {
    stream: TcpStream,
    outbox: Vec<u8>,
    inbox: Vec<u8>,
}

impl LineCacheClient {
    pub fn connect(addr: SocketAddr) -> io::Result<Self> {
        let stream = TcpStream::connect(addr)?;
        stream.set_nodelay(true)?;
        stream.set_nonblocking(true)?;
        Ok(Self {
            stream,
            outbox: Vec::new(),
            inbox: Vec::new(),
        })
    }

    fn fill_inbox(&mut self) -> Result<(), BackendError> {
        let mut buf = [0u8; 4096];
        loop {
            match self.stream.read(&mut buf) {
                Ok(0) => {
                    return Err(BackendError::connection(
                        Target::Cache,
                        "connection closed by cache server",
                    ))
                }
                Ok(n) => self.inbox.extend_from_slice(&buf[..n]),
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => break,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(BackendError::connection(Target::Cache, err.to_string())),
            }
        }
        Ok(())
    }

    fn parse_single(line: &str) -> CacheReply {
        match line.as_bytes().first().copied() {
            Some(b'+') => CacheReply::Status(line[1..].to_string()),
            Some(b':') => CacheReply::Integer(line[1..].parse().unwrap_or(0)),
            Some(b'$') => CacheReply::Data(line[1..].as_bytes().to_vec()),
            Some(b'-') => CacheReply::Error(line[1..].to_string()),
            Some(b'_') | None => CacheReply::Nil,
            _ => CacheReply::Data(line.as_bytes().to_vec()),
        }
    }

    fn take_line(&mut self) -> String {
        let end = self
            .inbox
            .iter()
            .position(|&b| b == b'\n')
            .expect("complete line available");
        let raw: Vec<u8> = self.inbox.drain(..=end).collect();
        let mut line = String::from_utf8_lossy(&raw).into_owned();
        while line.ends_with('\n') || line.ends_with('\r') {
            line.pop();
        }
        line
    }

    fn try_parse(&mut self) -> Option<CacheReply> {
        let lines_available = self.inbox.iter().filter(|&&b| b == b'\n').count();
        if lines_available == 0 {
            return None;
        }
        let first_end = self.inbox.iter().position(|&b| b == b'\n')?;
        let first = String::from_utf8_lossy(&self.inbox[..first_end]).into_owned();
        let first = first.trim_end_matches('\r');

        let needed = match first.strip_prefix('*') {
            Some(count) => 1 + count.parse::<usize>().unwrap_or(0),
            None => 1,
        };
        if lines_available < needed {
            return None;
        }

        let header = self.take_line();
        if needed > 1 {
            let elements = (1..needed)
                .map(|_| {
                    let line = self.take_line();
                    Self::parse_single(&line)
                })
                .collect();
            Some(CacheReply::Array(elements))
        } else {
            Some(Self::parse_single(&header))
        }
    }
}

impl CacheClient for LineCacheClient {
    fn raw_fd(&self) -> RawFd {
        self.stream.as_raw_fd()
    }

    fn interest(&self) -> Interest {
        Interest {
            readable: true,
            writable: !self.outbox.is_empty(),
        }
    }

    fn send_command(&mut self, command: &[u8]) -> Result<(), BackendError> {
        self.outbox.extend_from_slice(command);
        self.outbox.push(b'\n');
        self.flush()
    }

    fn flush(&mut self) -> Result<(), BackendError> {
        while !self.outbox.is_empty() {
            match self.stream.write(&self.outbox) {
                Ok(0) => {
                    return Err(BackendError::connection(
                        Target::Cache,
                        "connection closed while writing",
                    ))
                }
                Ok(n) => {
                    self.outbox.drain(..n);
                }
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => break,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(BackendError::connection(Target::Cache, err.to_string())),
            }
        }
        Ok(())
    }

    fn poll_reply(&mut self) -> Result<Option<CacheReply>, BackendError> {
        self.fill_inbox()?;
        Ok(self.try_parse())
    }
}

/// Blocking database client with scripted latency and reachability.
pub struct MockDb {
    pub latency: Duration,
    pub refuse: bool,
}

impl MockDb {
    pub fn with_latency(latency: Duration) -> Self {
        Self {
            latency,
            refuse: false,
        }
    }

    pub fn unreachable() -> Self {
        Self {
            latency: Duration::ZERO,
            refuse: true,
        }
    }
}

impl DatabaseClient for MockDb {
    fn execute(&mut self, command: &DbCommand) -> Result<DbResult, BackendError> {
        if self.refuse {
            return Err(BackendError::connection(
                Target::Database,
                "could not connect to server: connection refused",
            ));
        }
        thread::sleep(self.latency);
        Ok(DbResult::Rows(Box::new(BufferedRows::new(
            vec!["value".to_string()],
            vec![vec![Some(command.sql.clone().into_bytes())]],
        ))))
    }
}

/// Executor that records the statements it ran, optionally stalling while
/// `gate` stays raised (capped so a forgotten gate cannot hang a test).
pub struct RecordingExecutor {
    pub log: Arc<Mutex<Vec<String>>>,
    pub hold: Duration,
    pub gate: Option<Arc<AtomicBool>>,
}

impl RecordingExecutor {
    pub fn new(log: Arc<Mutex<Vec<String>>>) -> Self {
        Self {
            log,
            hold: Duration::ZERO,
            gate: None,
        }
    }

    pub fn with_hold(mut self, hold: Duration) -> Self {
        self.hold = hold;
        self
    }

    pub fn with_gate(mut self, gate: Arc<AtomicBool>) -> Self {
        self.gate = Some(gate);
        self
    }
}

impl JobExecutor for RecordingExecutor {
    fn target(&self) -> Target {
        Target::Database
    }

    fn execute(&mut self, job: &Job) -> Outcome {
        let statement = match &job.payload {
            Payload::Db(command) => command.sql.clone(),
            other => format!("<{}>", other.target()),
        };
        self.log.lock().unwrap().push(statement);

        if let Some(gate) = &self.gate {
            let started = Instant::now();
            while gate.load(Ordering::SeqCst) && started.elapsed() < Duration::from_secs(5) {
                thread::sleep(Duration::from_millis(2));
            }
        }
        if !self.hold.is_zero() {
            thread::sleep(self.hold);
        }
        Outcome::Value(Value::Db(DbResult::CommandStatus("OK".to_string())))
    }
}

/// Wait until `predicate` holds or `max_wait` elapses; returns whether it
/// held.
pub fn eventually(max_wait: Duration, mut predicate: impl FnMut() -> bool) -> bool {
    let give_up = Instant::now() + max_wait;
    while Instant::now() < give_up {
        if predicate() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    predicate()
}
