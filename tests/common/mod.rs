//! In-memory FTP server used in place of a real one.

#![allow(dead_code)]

use ftp_relay::{Credential, FtpConnector, FtpEndpoint, FtpSession, TransferError};
use ftp_relay::{EventBus, TransferEvent};
use std::collections::HashMap;
use std::io::{self, Cursor, Read, Write};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::broadcast::error::TryRecvError;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
pub struct Connection {
    pub endpoint: FtpEndpoint,
    pub credential: Credential,
    pub at: Instant,
}

#[derive(Default)]
struct State {
    files: HashMap<String, Vec<u8>>,
    write_calls: HashMap<String, usize>,
    connections: Vec<Connection>,
    refuse_connections: bool,
    /// Download streams fail after handing out this many bytes
    fail_downloads_after: Option<usize>,
    /// Cancelled as soon as a data stream has moved its first chunk
    cancel_after_first_chunk: Option<CancellationToken>,
}

#[derive(Clone, Default)]
pub struct MemoryFtp {
    state: Arc<Mutex<State>>,
}

impl MemoryFtp {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn refuse_connections(&self) {
        self.state.lock().unwrap().refuse_connections = true;
    }

    pub fn fail_downloads_after(&self, bytes: usize) {
        self.state.lock().unwrap().fail_downloads_after = Some(bytes);
    }

    pub fn cancel_after_first_chunk(&self, token: CancellationToken) {
        self.state.lock().unwrap().cancel_after_first_chunk = Some(token);
    }

    pub fn put(&self, path: &str, data: &[u8]) {
        self.state
            .lock()
            .unwrap()
            .files
            .insert(path.to_string(), data.to_vec());
    }

    pub fn file(&self, path: &str) -> Option<Vec<u8>> {
        self.state.lock().unwrap().files.get(path).cloned()
    }

    pub fn write_calls(&self, path: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .write_calls
            .get(path)
            .copied()
            .unwrap_or(0)
    }

    pub fn connections(&self) -> Vec<Connection> {
        self.state.lock().unwrap().connections.clone()
    }
}

impl FtpConnector for MemoryFtp {
    fn connect(
        &self,
        endpoint: &FtpEndpoint,
        credential: &Credential,
    ) -> Result<Box<dyn FtpSession>, TransferError> {
        let mut state = self.state.lock().unwrap();
        if state.refuse_connections {
            return Err(TransferError::Connection(format!(
                "{}: connection refused",
                endpoint
            )));
        }
        state.connections.push(Connection {
            endpoint: endpoint.clone(),
            credential: credential.clone(),
            at: Instant::now(),
        });
        Ok(Box::new(MemorySession {
            state: Arc::clone(&self.state),
        }))
    }
}

struct MemorySession {
    state: Arc<Mutex<State>>,
}

impl FtpSession for MemorySession {
    fn start_upload(&mut self, remote_path: &str) -> Result<Box<dyn Write + Send>, TransferError> {
        let mut state = self.state.lock().unwrap();
        state.files.insert(remote_path.to_string(), Vec::new());
        state.write_calls.insert(remote_path.to_string(), 0);
        Ok(Box::new(MemoryWriter {
            state: Arc::clone(&self.state),
            path: remote_path.to_string(),
        }))
    }

    fn finish_upload(&mut self, stream: Box<dyn Write + Send>) -> Result<(), TransferError> {
        drop(stream);
        Ok(())
    }

    fn start_download(&mut self, remote_path: &str) -> Result<Box<dyn Read + Send>, TransferError> {
        let state = self.state.lock().unwrap();
        let data = state.files.get(remote_path).cloned().ok_or_else(|| {
            TransferError::Protocol(format!("550 {}: No such file or directory", remote_path))
        })?;
        let reader: Box<dyn Read + Send> = match state.fail_downloads_after {
            Some(limit) => Box::new(FailingReader {
                inner: Cursor::new(data),
                remaining: limit,
            }),
            None => Box::new(Cursor::new(data)),
        };
        match &state.cancel_after_first_chunk {
            Some(token) => Ok(Box::new(CancellingReader {
                inner: reader,
                token: token.clone(),
            })),
            None => Ok(reader),
        }
    }

    fn finish_download(&mut self, stream: Box<dyn Read + Send>) -> Result<(), TransferError> {
        drop(stream);
        Ok(())
    }

    fn quit(&mut self) -> Result<(), TransferError> {
        Ok(())
    }
}

struct MemoryWriter {
    state: Arc<Mutex<State>>,
    path: String,
}

impl Write for MemoryWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut state = self.state.lock().unwrap();
        state
            .files
            .entry(self.path.clone())
            .or_default()
            .extend_from_slice(buf);
        *state.write_calls.entry(self.path.clone()).or_default() += 1;
        if let Some(token) = &state.cancel_after_first_chunk {
            token.cancel();
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

struct FailingReader {
    inner: Cursor<Vec<u8>>,
    remaining: usize,
}

impl Read for FailingReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.remaining == 0 {
            return Err(io::Error::new(io::ErrorKind::ConnectionReset, "connection reset"));
        }
        let limit = self.remaining.min(buf.len());
        let n = self.inner.read(&mut buf[..limit])?;
        self.remaining -= n;
        Ok(n)
    }
}

struct CancellingReader {
    inner: Box<dyn Read + Send>,
    token: CancellationToken,
}

impl Read for CancellingReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        if n > 0 {
            self.token.cancel();
        }
        Ok(n)
    }
}

/// Everything currently queued on a receiver
pub fn drain(rx: &mut tokio::sync::broadcast::Receiver<TransferEvent>) -> Vec<TransferEvent> {
    let mut events = Vec::new();
    loop {
        match rx.try_recv() {
            Ok(event) => events.push(event),
            Err(TryRecvError::Lagged(_)) => continue,
            Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
        }
    }
    events
}

/// Poll `condition` until it holds or `timeout` passes
pub fn wait_for(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(20));
    }
    condition()
}

pub fn test_bus() -> EventBus {
    EventBus::new(4096)
}
