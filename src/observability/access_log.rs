//! Request audit log.
//!
//! One [`LogEntry`] per request, serialised as a single JSON line. Sinks
//! write a whole line per call under their own lock so concurrent entries
//! never interleave. [`PendingEntry`] guarantees the exactly-once rule: it
//! is either finished explicitly or written from `Drop` when the request
//! future is abandoned.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;
use thiserror::Error;

/// Status recorded when the client goes away before a response is produced.
pub const CLIENT_CLOSED_REQUEST: u16 = 499;

#[derive(Debug, Error)]
pub enum AccessLogError {
    #[error("failed to open access log '{path}': {source}")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize log entry: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to write log entry: {0}")]
    Write(#[from] std::io::Error),
}

/// Structured access log entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: String,
    pub request_id: String,
    pub method: String,
    pub path: String,
    pub client_ip: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub api_key: String,
    pub status_code: u16,
    pub response_time_ms: f64,
    pub backend: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error: String,
}

/// Destination for access log entries.
pub trait LogSink: Send + Sync {
    fn write(&self, entry: &LogEntry) -> Result<(), AccessLogError>;
}

/// Appends JSON lines to a file.
#[derive(Debug)]
pub struct FileSink {
    file: Mutex<File>,
}

impl FileSink {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, AccessLogError> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|source| AccessLogError::Open {
                path: path.display().to_string(),
                source,
            })?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }
}

impl LogSink for FileSink {
    fn write(&self, entry: &LogEntry) -> Result<(), AccessLogError> {
        let mut line = serde_json::to_vec(entry)?;
        line.push(b'\n');

        let mut file = self.file.lock().unwrap_or_else(PoisonError::into_inner);
        file.write_all(&line)?;
        Ok(())
    }
}

/// Keeps entries in memory. Used by tests and embedders that ship logs
/// elsewhere.
#[derive(Debug, Default)]
pub struct MemorySink {
    entries: Mutex<Vec<LogEntry>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl LogSink for MemorySink {
    fn write(&self, entry: &LogEntry) -> Result<(), AccessLogError> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(entry.clone());
        Ok(())
    }
}

/// Front end for the configured sink.
#[derive(Clone)]
pub struct RequestLogger {
    sink: Arc<dyn LogSink>,
}

impl RequestLogger {
    pub fn new(sink: Arc<dyn LogSink>) -> Self {
        Self { sink }
    }

    /// Write one entry. Sink failures are reported but never fail the request.
    pub fn log(&self, entry: &LogEntry) {
        tracing::info!(
            request_id = %entry.request_id,
            method = %entry.method,
            path = %entry.path,
            client_ip = %entry.client_ip,
            status = entry.status_code,
            elapsed_ms = entry.response_time_ms,
            backend = %entry.backend,
            error = %entry.error,
            "Request completed"
        );

        if let Err(e) = self.sink.write(entry) {
            tracing::error!(request_id = %entry.request_id, error = %e, "Failed to write access log entry");
        }
    }

    /// Start an entry for a request that has just been received.
    pub fn begin(
        &self,
        request_id: String,
        method: String,
        path: String,
        client_ip: String,
    ) -> PendingEntry {
        let received_at: DateTime<Utc> = Utc::now();
        PendingEntry {
            logger: self.clone(),
            started: Instant::now(),
            entry: Some(LogEntry {
                timestamp: received_at.to_rfc3339_opts(SecondsFormat::Secs, true),
                request_id,
                method,
                path,
                client_ip,
                api_key: String::new(),
                status_code: 0,
                response_time_ms: 0.0,
                backend: String::new(),
                error: String::new(),
            }),
        }
    }
}

/// An entry that will be written exactly once.
pub struct PendingEntry {
    logger: RequestLogger,
    started: Instant,
    entry: Option<LogEntry>,
}

impl PendingEntry {
    pub fn started(&self) -> Instant {
        self.started
    }

    /// Selected backend so far; empty until routing succeeds.
    pub fn backend(&self) -> &str {
        self.entry.as_ref().map_or("", |e| e.backend.as_str())
    }

    pub fn set_api_key(&mut self, key: &str) {
        if let Some(entry) = self.entry.as_mut() {
            entry.api_key = key.to_string();
        }
    }

    pub fn set_backend(&mut self, backend: &str) {
        if let Some(entry) = self.entry.as_mut() {
            entry.backend = backend.to_string();
        }
    }

    /// Write the entry with the final status and optional error reason.
    pub fn finish(mut self, status: u16, error: Option<&str>) {
        self.write(status, error);
    }

    fn write(&mut self, status: u16, error: Option<&str>) {
        if let Some(mut entry) = self.entry.take() {
            entry.status_code = status;
            entry.response_time_ms = self.started.elapsed().as_secs_f64() * 1000.0;
            entry.error = error.unwrap_or_default().to_string();
            self.logger.log(&entry);
        }
    }
}

impl Drop for PendingEntry {
    fn drop(&mut self) {
        self.write(CLIENT_CLOSED_REQUEST, Some("client disconnected"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pending(logger: &RequestLogger) -> PendingEntry {
        logger.begin("req-1".into(), "GET".into(), "/api/data".into(), "127.0.0.1".into())
    }

    #[test]
    fn test_finish_writes_once() {
        let sink = Arc::new(MemorySink::new());
        let logger = RequestLogger::new(sink.clone());

        let mut entry = pending(&logger);
        entry.set_backend("http://127.0.0.1:8081");
        entry.finish(200, None);

        let entries = sink.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].status_code, 200);
        assert_eq!(entries[0].backend, "http://127.0.0.1:8081");
        assert!(entries[0].error.is_empty());
    }

    #[test]
    fn test_dropped_entry_is_logged_as_disconnect() {
        let sink = Arc::new(MemorySink::new());
        let logger = RequestLogger::new(sink.clone());

        drop(pending(&logger));

        let entries = sink.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].status_code, CLIENT_CLOSED_REQUEST);
        assert_eq!(entries[0].error, "client disconnected");
    }

    #[test]
    fn test_empty_optional_fields_are_omitted() {
        let sink = Arc::new(MemorySink::new());
        let logger = RequestLogger::new(sink.clone());
        pending(&logger).finish(503, Some("no healthy backends available"));

        let json = serde_json::to_value(&sink.entries()[0]).unwrap();
        assert!(json.get("api_key").is_none());
        assert_eq!(json["error"], "no healthy backends available");
        assert_eq!(json["backend"], "");
        assert!(json["timestamp"].as_str().unwrap().ends_with('Z'));
    }

    #[test]
    fn test_file_sink_appends_lines() {
        let path = std::env::temp_dir().join(format!("access-{}.log", uuid::Uuid::new_v4()));
        let logger = RequestLogger::new(Arc::new(FileSink::open(&path).unwrap()));

        let mut first = pending(&logger);
        first.set_api_key("key-admin");
        first.finish(200, None);
        pending(&logger).finish(429, Some("rate limit exceeded"));

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<LogEntry> = content
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].api_key, "key-admin");
        assert_eq!(lines[1].status_code, 429);
        assert_eq!(lines[1].error, "rate limit exceeded");

        std::fs::remove_file(&path).unwrap();
    }
}
