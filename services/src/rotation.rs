//! Timer-driven rotation of session codes.
//!
//! A [`CodeRotator`] spawns a tokio task that hands a fresh code to a
//! [`CodeSink`] every period. The task ends when the sink reports that the
//! session no longer takes codes, when [`RotationHandle::stop`] is called, or
//! when the handle is dropped.

use async_trait::async_trait;
use chrono::Utc;
use common::config::AppConfig;
use db::models::attendance_session::Model as Session;
use sea_orm::DatabaseConnection;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use util::code::generate_code;

use crate::ServiceError;

const MIN_PERIOD: Duration = Duration::from_millis(1);

/// Receives each newly generated code.
#[async_trait]
pub trait CodeSink: Send + Sync + 'static {
    /// Returns `Ok(false)` once the session should stop rotating.
    async fn publish(&self, code: &str) -> Result<bool, ServiceError>;
}

/// Writes rotated codes to a stored session.
#[derive(Debug, Clone)]
pub struct SessionCodeSink {
    db: DatabaseConnection,
    session_id: i64,
}

impl SessionCodeSink {
    pub fn new(db: DatabaseConnection, session_id: i64) -> Self {
        Self { db, session_id }
    }
}

#[async_trait]
impl CodeSink for SessionCodeSink {
    async fn publish(&self, code: &str) -> Result<bool, ServiceError> {
        let updated = Session::set_code(&self.db, self.session_id, code, Utc::now()).await?;
        Ok(updated.is_some())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// `stop()` was called or the handle was dropped.
    Stopped,
    /// The sink reported the session closed, or it no longer exists.
    SessionEnded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RotationSummary {
    pub rotations: u64,
    pub reason: StopReason,
}

#[derive(Debug, Clone, Copy)]
pub struct CodeRotator {
    period: Duration,
}

impl CodeRotator {
    pub fn new(period: Duration) -> Self {
        Self {
            period: period.max(MIN_PERIOD),
        }
    }

    /// Uses `CODE_ROTATION_SECONDS` from the application config.
    pub fn from_config() -> Self {
        let seconds = AppConfig::global().code_rotation_seconds.max(1);
        Self::new(Duration::from_secs(seconds))
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Spawns the rotation task. The first code is published one period from now.
    pub fn start<S: CodeSink>(&self, sink: S) -> RotationHandle {
        let (stop_tx, stop_rx) = oneshot::channel();
        let task = tokio::spawn(rotate(self.period, sink, stop_rx));
        RotationHandle {
            stop_tx: Some(stop_tx),
            task,
        }
    }
}

async fn rotate<S: CodeSink>(
    period: Duration,
    sink: S,
    mut stop_rx: oneshot::Receiver<()>,
) -> RotationSummary {
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut rotations = 0;

    loop {
        tokio::select! {
            // Fires on an explicit stop and when the sender is dropped.
            _ = &mut stop_rx => {
                log::debug!("Code rotation stopped after {rotations} rotations");
                return RotationSummary { rotations, reason: StopReason::Stopped };
            }
            _ = ticker.tick() => {
                let code = generate_code();
                match sink.publish(&code).await {
                    Ok(true) => rotations += 1,
                    Ok(false) | Err(ServiceError::NotFound(_)) => {
                        log::info!("Session closed; code rotation ends after {rotations} rotations");
                        return RotationSummary { rotations, reason: StopReason::SessionEnded };
                    }
                    Err(e) => {
                        log::warn!("Failed to publish rotated code: {e}");
                    }
                }
            }
        }
    }
}

/// Controls a running rotation task. Dropping it stops the rotation.
#[derive(Debug)]
pub struct RotationHandle {
    stop_tx: Option<oneshot::Sender<()>>,
    task: JoinHandle<RotationSummary>,
}

impl RotationHandle {
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stops the rotation and waits for the task to wind down.
    pub async fn stop(mut self) -> Option<RotationSummary> {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        self.join().await
    }

    /// Waits for the rotation to end on its own.
    pub async fn finished(mut self) -> Option<RotationSummary> {
        self.join().await
    }

    async fn join(&mut self) -> Option<RotationSummary> {
        match (&mut self.task).await {
            Ok(summary) => Some(summary),
            Err(e) => {
                log::error!("Code rotation task failed: {e}");
                None
            }
        }
    }
}
