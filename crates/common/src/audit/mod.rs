//! Append-only audit log sink
//!
//! Query strings, rewritten queries, answers, and retry events are recorded
//! as one UTC-timestamped line each. Writes are fire-and-forget: callers
//! never await them, overflow drops the new event, and write failures are
//! swallowed (best-effort telemetry, never pipeline-fatal).

use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tracing::warn;

/// Non-blocking audit capability injected into the pipeline
pub trait AuditSink: Send + Sync {
    /// Record one event. Must never block and never fail the caller.
    fn record(&self, event: String);
}

/// File-backed sink: bounded queue plus a dedicated writer task
pub struct FileAuditSink {
    tx: mpsc::Sender<String>,
    path: PathBuf,
}

impl FileAuditSink {
    /// Create the sink and spawn its writer task
    pub fn spawn(path: impl AsRef<Path>, queue_capacity: usize) -> Arc<Self> {
        let path = path.as_ref().to_path_buf();
        let (tx, rx) = mpsc::channel(queue_capacity);

        tokio::spawn(writer_task(path.clone(), rx));

        Arc::new(Self { tx, path })
    }

    /// Whether the writer task is still draining the queue
    pub fn is_alive(&self) -> bool {
        !self.tx.is_closed()
    }

    /// Path of the underlying log file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AuditSink for FileAuditSink {
    fn record(&self, event: String) {
        let line = format!("{} {}", Utc::now().format("%Y-%m-%dT%H:%M:%SZ"), event);
        if self.tx.try_send(line).is_err() {
            // Queue full or writer gone: drop the new event
            metrics::counter!("reportlens_audit_dropped_total").increment(1);
            warn!("audit queue full, dropping event");
        }
    }
}

/// Drains the queue into the log file, one line per event
async fn writer_task(path: PathBuf, mut rx: mpsc::Receiver<String>) {
    if let Some(parent) = path.parent() {
        let _ = tokio::fs::create_dir_all(parent).await;
    }

    let mut file = match tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .await
    {
        Ok(f) => f,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "audit log unavailable, events will be discarded");
            // Keep draining so senders never observe a closed channel
            while rx.recv().await.is_some() {}
            return;
        }
    };

    while let Some(line) = rx.recv().await {
        if let Err(e) = file.write_all(format!("{}\n", line).as_bytes()).await {
            warn!(error = %e, "audit write failed");
        }
    }
}

/// In-memory sink for tests
#[derive(Default)]
pub struct MemoryAuditSink {
    events: std::sync::Mutex<Vec<String>>,
}

impl MemoryAuditSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

impl AuditSink for MemoryAuditSink {
    fn record(&self, event: String) {
        self.events.lock().unwrap().push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_file_sink_appends_timestamped_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.log");

        let sink = FileAuditSink::spawn(&path, 16);
        sink.record("query=\"What was Q3 revenue?\"".to_string());
        sink.record("answer=\"Revenue was $10M.\"".to_string());

        // Give the writer task a moment to drain
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        let content = tokio::fs::read_to_string(&path).await.unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("query="));
        assert!(lines[1].contains("answer="));
        // UTC timestamp prefix
        assert!(lines[0].chars().take(4).all(|c| c.is_ascii_digit()));
        assert!(sink.is_alive());
    }

    #[test]
    fn test_memory_sink_collects_events() {
        let sink = MemoryAuditSink::new();
        sink.record("retry attempt=1".to_string());
        assert_eq!(sink.events(), vec!["retry attempt=1".to_string()]);
    }
}
