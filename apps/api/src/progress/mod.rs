//! Progress Tracker: in-memory status records for polling clients.
//!
//! Records live in a `DashMap` keyed by session id and are dropped by a periodic
//! sweep once older than the retention window, whatever their status. Each session
//! also owns a broadcast channel that push subscribers (the SSE route) listen on;
//! events are published while the record's entry is held, so a subscriber never
//! misses the transition that follows its snapshot.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

pub const TOTAL_STEPS: u8 = 4;

/// Buffered events per session; a subscriber further behind skips ahead.
const CHANNEL_CAPACITY: usize = 16;

/// Default percent per pipeline step: upload, parsing, analysis, done.
pub fn step_percent(step: u8) -> u8 {
    match step {
        0 => 10,
        1 => 50,
        2 => 80,
        _ => 100,
    }
}

pub fn step_name(step: u8) -> &'static str {
    match step {
        0 => "Uploading Resume",
        1 => "Extracting Text",
        2 => "Dual AI Analysis",
        _ => "Complete",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressStatus {
    Started,
    Processing,
    Completed,
    Error,
}

impl ProgressStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Error)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressRecord {
    pub session_id: String,
    pub status: ProgressStatus,
    pub step_index: u8,
    pub total_steps: u8,
    pub message: String,
    pub percent: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub start_time: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip)]
    created: Instant,
}

/// One frame of the push stream, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ProgressEvent {
    Connected {
        message: String,
    },
    #[serde(rename_all = "camelCase")]
    Progress {
        step: u8,
        step_name: &'static str,
        message: String,
        progress: u8,
        timestamp: DateTime<Utc>,
    },
    #[serde(rename_all = "camelCase")]
    Complete {
        step: u8,
        step_name: &'static str,
        message: String,
        progress: u8,
        timestamp: DateTime<Utc>,
        result: Option<Value>,
    },
    #[serde(rename_all = "camelCase")]
    Error {
        step: u8,
        step_name: &'static str,
        message: String,
        progress: u8,
        timestamp: DateTime<Utc>,
        error: Option<String>,
    },
}

impl ProgressEvent {
    pub fn connected() -> Self {
        Self::Connected {
            message: "Connected to progress stream".to_string(),
        }
    }

    /// The event describing a record's current state.
    pub fn from_record(record: &ProgressRecord) -> Self {
        let step = record.step_index;
        match record.status {
            ProgressStatus::Completed => Self::Complete {
                step,
                step_name: step_name(step),
                message: record.message.clone(),
                progress: record.percent,
                timestamp: record.updated_at,
                result: record.result.clone(),
            },
            ProgressStatus::Error => Self::Error {
                step,
                step_name: "Error",
                message: record.message.clone(),
                progress: record.percent,
                timestamp: record.updated_at,
                error: record.error.clone(),
            },
            ProgressStatus::Started | ProgressStatus::Processing => Self::Progress {
                step,
                step_name: step_name(step),
                message: record.message.clone(),
                progress: record.percent,
                timestamp: record.updated_at,
            },
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete { .. } | Self::Error { .. })
    }
}

pub struct ProgressTracker {
    records: DashMap<String, ProgressRecord>,
    channels: DashMap<String, broadcast::Sender<ProgressEvent>>,
    retention: Duration,
}

impl ProgressTracker {
    pub fn new(retention: Duration) -> Self {
        Self {
            records: DashMap::new(),
            channels: DashMap::new(),
            retention,
        }
    }

    /// Current record plus a receiver for every event after it.
    pub fn subscribe(
        &self,
        session_id: &str,
    ) -> Option<(ProgressRecord, broadcast::Receiver<ProgressEvent>)> {
        let record = self.records.get(session_id)?;
        let receiver = self
            .channels
            .entry(session_id.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe();
        Some((record.value().clone(), receiver))
    }

    /// No subscribers is the common case and not an error.
    fn publish(&self, record: &ProgressRecord) {
        if let Some(sender) = self.channels.get(&record.session_id) {
            let _ = sender.send(ProgressEvent::from_record(record));
        }
    }

    /// Starts (or restarts) a session at step 0.
    pub fn init(&self, session_id: &str) {
        let now = Utc::now();
        // a restarted session ends streams attached to the previous run
        self.channels.remove(session_id);
        self.records.insert(
            session_id.to_string(),
            ProgressRecord {
                session_id: session_id.to_string(),
                status: ProgressStatus::Started,
                step_index: 0,
                total_steps: TOTAL_STEPS,
                message: "Starting analysis...".to_string(),
                percent: 0,
                result: None,
                error: None,
                start_time: now,
                updated_at: now,
                created: Instant::now(),
            },
        );
        debug!("Progress initialized for session {session_id}");
    }

    /// Percent never moves backwards; without an explicit value the step table decides.
    pub fn update(&self, session_id: &str, step: u8, message: &str, percent: Option<u8>) {
        let Some(mut record) = self.records.get_mut(session_id) else {
            warn!("Progress update for unknown session {session_id}");
            return;
        };
        if record.status.is_terminal() {
            debug!("Ignoring progress update for finished session {session_id}");
            return;
        }

        let wanted = percent.unwrap_or_else(|| step_percent(step)).min(100);
        record.status = ProgressStatus::Processing;
        record.step_index = step;
        record.message = message.to_string();
        record.percent = record.percent.max(wanted);
        record.updated_at = Utc::now();
        self.publish(&record);
        info!(
            "Progress [{session_id}]: step {step} - {message} ({}%)",
            record.percent
        );
    }

    pub fn complete(&self, session_id: &str, result: Value) {
        let Some(mut record) = self.records.get_mut(session_id) else {
            warn!("Completion for unknown session {session_id}");
            return;
        };
        record.status = ProgressStatus::Completed;
        record.step_index = TOTAL_STEPS - 1;
        record.message = "Analysis completed successfully!".to_string();
        record.percent = 100;
        record.result = Some(result);
        record.updated_at = Utc::now();
        self.publish(&record);
    }

    pub fn fail(&self, session_id: &str, error: &str) {
        let Some(mut record) = self.records.get_mut(session_id) else {
            warn!("Failure for unknown session {session_id}");
            return;
        };
        record.status = ProgressStatus::Error;
        record.message = "Analysis failed".to_string();
        record.error = Some(error.to_string());
        record.updated_at = Utc::now();
        self.publish(&record);
    }

    pub fn get(&self, session_id: &str) -> Option<ProgressRecord> {
        self.records.get(session_id).map(|r| r.value().clone())
    }

    /// Drops every record older than the retention window. Returns how many went.
    pub fn sweep_expired(&self) -> usize {
        let expired: Vec<String> = self
            .records
            .iter()
            .filter(|record| record.created.elapsed() >= self.retention)
            .map(|record| record.key().clone())
            .collect();

        let mut removed = 0;
        for session_id in expired {
            let gone = self
                .records
                .remove_if(&session_id, |_, record| {
                    record.created.elapsed() >= self.retention
                })
                .is_some();
            if gone {
                self.channels.remove(&session_id);
                removed += 1;
            }
        }
        if removed > 0 {
            info!("Swept {removed} expired progress records");
        }
        removed
    }

    /// Runs `sweep_expired` every `every` until the task is aborted.
    pub fn spawn_sweeper(self: Arc<Self>, every: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + every, every);
            loop {
                interval.tick().await;
                self.sweep_expired();
            }
        })
    }
}
