//! Background alert checker

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};

use super::condition::{AlertCondition, CheckError, CheckResult, ConditionType};
use super::grace::in_grace;
use crate::data::MessageSummary;
use crate::search::Searches;

/// Checker settings
#[derive(Debug, Clone)]
pub struct CheckerConfig {
    /// Time between evaluation rounds
    pub check_interval: Duration,
    /// Upper bound on a single evaluation
    pub query_timeout: Duration,
    /// Capacity of the surfaced alert channel
    pub alert_buffer: usize,
}

impl Default for CheckerConfig {
    fn default() -> Self {
        Self {
            check_interval: Duration::from_secs(60),
            query_timeout: Duration::from_secs(30),
            alert_buffer: 256,
        }
    }
}

/// Alert state tracking
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AlertState {
    /// Whether the last evaluation triggered
    pub firing: bool,
    pub last_checked: Option<DateTime<Utc>>,
    /// Last time an alert surfaced; suppressed triggers do not move it
    pub last_triggered: Option<DateTime<Utc>>,
    /// Consecutive triggering evaluations, suppressed ones included
    pub consecutive_fires: u32,
    pub last_error: Option<String>,
}

/// A triggered evaluation that passed the grace gate
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Alert {
    pub condition_id: String,
    pub stream_id: String,
    pub description: String,
    pub triggered_at: DateTime<Utc>,
    pub summaries: Vec<MessageSummary>,
}

impl Alert {
    fn from_result(condition_id: &str, result: CheckResult, triggered_at: DateTime<Utc>) -> Self {
        Self {
            condition_id: condition_id.to_string(),
            stream_id: result.stream_id,
            description: result.description.unwrap_or_default(),
            triggered_at,
            summaries: result.summaries,
        }
    }
}

/// Outcome of one scheduled evaluation
#[derive(Debug, Clone, PartialEq)]
pub enum Evaluation {
    NotTriggered,
    /// Triggered inside the grace period of a previous alert
    Suppressed,
    Surfaced(Alert),
}

/// Registered condition with its view for listings
#[derive(Debug, Clone, Serialize)]
pub struct ConditionStatus {
    pub id: String,
    pub stream_id: String,
    pub condition_type: ConditionType,
    pub description: String,
    pub enabled: bool,
    pub state: AlertState,
}

struct ScheduledCondition {
    condition: Arc<dyn AlertCondition>,
    enabled: AtomicBool,
    in_flight: AtomicBool,
    state: Mutex<AlertState>,
}

/// Clears the in-flight flag once the blocking query has actually finished
struct InFlightGuard(Arc<ScheduledCondition>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.in_flight.store(false, Ordering::Release);
    }
}

type ConditionMap = Arc<RwLock<HashMap<String, Arc<ScheduledCondition>>>>;

/// Background alert checker
pub struct AlertChecker {
    /// Registered conditions by id
    conditions: ConditionMap,
    searches: Arc<dyn Searches>,
    config: CheckerConfig,
    alert_tx: mpsc::Sender<Alert>,
    /// Shutdown signal sender
    shutdown_tx: Option<mpsc::Sender<()>>,
    next_id: AtomicU64,
}

impl AlertChecker {
    /// Create a checker and the receiving end of its alert channel
    pub fn new(searches: Arc<dyn Searches>, config: CheckerConfig) -> (Self, mpsc::Receiver<Alert>) {
        let (alert_tx, alert_rx) = mpsc::channel(config.alert_buffer.max(1));
        let checker = Self {
            conditions: Arc::new(RwLock::new(HashMap::new())),
            searches,
            config,
            alert_tx,
            shutdown_tx: None,
            next_id: AtomicU64::new(1),
        };
        (checker, alert_rx)
    }

    /// Register a condition, returning the id it is scheduled under.
    /// Unpersisted conditions get a generated id.
    pub fn register(&self, condition: Box<dyn AlertCondition>) -> String {
        let id = match condition.id() {
            Some(id) => id.to_string(),
            None => format!("unsaved-{}", self.next_id.fetch_add(1, Ordering::Relaxed)),
        };
        let entry = Arc::new(ScheduledCondition {
            condition: Arc::from(condition),
            enabled: AtomicBool::new(true),
            in_flight: AtomicBool::new(false),
            state: Mutex::new(AlertState::default()),
        });

        tracing::info!(
            condition_id = %id,
            stream_id = %entry.condition.stream_id(),
            condition_type = %entry.condition.condition_type(),
            "Registered alert condition"
        );
        self.conditions.write().insert(id.clone(), entry);
        id
    }

    pub fn unregister(&self, id: &str) -> bool {
        self.conditions.write().remove(id).is_some()
    }

    /// Current state of a condition
    pub fn state(&self, id: &str) -> Option<AlertState> {
        self.conditions.read().get(id).map(|c| c.state.lock().clone())
    }

    pub fn list(&self) -> Vec<ConditionStatus> {
        let conditions = self.conditions.read();
        let mut statuses: Vec<ConditionStatus> = conditions
            .iter()
            .map(|(id, entry)| ConditionStatus {
                id: id.clone(),
                stream_id: entry.condition.stream_id().to_string(),
                condition_type: entry.condition.condition_type(),
                description: entry.condition.description(),
                enabled: entry.enabled.load(Ordering::Acquire),
                state: entry.state.lock().clone(),
            })
            .collect();
        statuses.sort_by(|a, b| a.id.cmp(&b.id));
        statuses
    }

    /// Enable/disable a condition
    pub fn set_enabled(&self, id: &str, enabled: bool) -> bool {
        match self.conditions.read().get(id) {
            Some(entry) => {
                entry.enabled.store(enabled, Ordering::Release);
                true
            }
            None => false,
        }
    }

    /// Start the background checker
    pub fn start(&mut self) -> tokio::task::JoinHandle<()> {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        self.shutdown_tx = Some(shutdown_tx);

        let conditions = Arc::clone(&self.conditions);
        let searches = Arc::clone(&self.searches);
        let alert_tx = self.alert_tx.clone();
        let check_interval = self.config.check_interval;
        let query_timeout = self.config.query_timeout;

        tokio::spawn(async move {
            let mut ticker = interval(check_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        Self::check_conditions(&conditions, &searches, &alert_tx, query_timeout).await;
                    }
                    _ = shutdown_rx.recv() => {
                        tracing::info!("Alert checker shutting down");
                        break;
                    }
                }
            }
        })
    }

    /// Stop the background checker
    pub async fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(()).await;
        }
    }

    /// Evaluate one condition immediately, regardless of its enabled flag
    pub async fn check_now(&self, id: &str) -> Result<Evaluation, CheckerError> {
        let entry = self
            .conditions
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| CheckerError::NotFound(id.to_string()))?;

        Self::evaluate(
            id,
            entry,
            &self.searches,
            &self.alert_tx,
            self.config.query_timeout,
        )
        .await
    }

    /// Evaluate every enabled condition concurrently
    async fn check_conditions(
        conditions: &ConditionMap,
        searches: &Arc<dyn Searches>,
        alert_tx: &mpsc::Sender<Alert>,
        query_timeout: Duration,
    ) {
        let due: Vec<(String, Arc<ScheduledCondition>)> = {
            let conditions = conditions.read();
            conditions
                .iter()
                .filter(|(_, c)| c.enabled.load(Ordering::Acquire))
                .map(|(id, c)| (id.clone(), Arc::clone(c)))
                .collect()
        };

        let checks = due.into_iter().map(|(id, entry)| async move {
            // Failures are logged and recorded in the condition state
            let _ = Self::evaluate(&id, entry, searches, alert_tx, query_timeout).await;
        });
        join_all(checks).await;
    }

    async fn evaluate(
        id: &str,
        entry: Arc<ScheduledCondition>,
        searches: &Arc<dyn Searches>,
        alert_tx: &mpsc::Sender<Alert>,
        query_timeout: Duration,
    ) -> Result<Evaluation, CheckerError> {
        if entry.in_flight.swap(true, Ordering::AcqRel) {
            tracing::debug!(condition_id = %id, "Previous evaluation still running, skipping");
            return Err(CheckerError::InFlight(id.to_string()));
        }
        let guard = InFlightGuard(Arc::clone(&entry));

        let condition = Arc::clone(&entry.condition);
        let searches = Arc::clone(searches);
        let mut task = tokio::task::spawn_blocking(move || condition.run_check(searches.as_ref()));

        let outcome = match tokio::time::timeout(query_timeout, &mut task).await {
            Ok(Ok(Ok(result))) => Ok(result),
            Ok(Ok(Err(e))) => Err(CheckerError::Check(e)),
            Ok(Err(e)) => Err(CheckerError::Join(e.to_string())),
            Err(_) => {
                // Stay in flight until the abandoned query returns
                tokio::spawn(async move {
                    let _ = task.await;
                    drop(guard);
                });
                Err(CheckerError::Timeout(query_timeout))
            }
        };

        let now = Utc::now();
        let result = {
            let mut state = entry.state.lock();
            state.last_checked = Some(now);

            let result = match outcome {
                Ok(result) => result,
                Err(e) => {
                    state.last_error = Some(e.to_string());
                    tracing::error!(condition_id = %id, error = %e, "Alert check failed");
                    return Err(e);
                }
            };
            state.last_error = None;

            if !result.triggered {
                state.firing = false;
                state.consecutive_fires = 0;
                return Ok(Evaluation::NotTriggered);
            }

            state.firing = true;
            state.consecutive_fires += 1;

            let grace = entry.condition.grace();
            if in_grace(state.last_triggered, grace, now) {
                tracing::debug!(condition_id = %id, grace, "Alert suppressed (grace period)");
                return Ok(Evaluation::Suppressed);
            }
            state.last_triggered = Some(now);
            result
        };

        let alert = Alert::from_result(id, result, now);
        tracing::warn!(
            condition_id = %id,
            stream_id = %alert.stream_id,
            backlog = alert.summaries.len(),
            "{}",
            alert.description
        );
        if let Err(e) = alert_tx.try_send(alert.clone()) {
            tracing::warn!(condition_id = %id, error = %e, "Dropping alert, channel unavailable");
        }

        Ok(Evaluation::Surfaced(alert))
    }
}

/// Scheduler errors
#[derive(Debug, thiserror::Error)]
pub enum CheckerError {
    #[error("Condition not found: {0}")]
    NotFound(String),

    #[error("Condition {0} is already being evaluated")]
    InFlight(String),

    #[error("Evaluation timed out after {0:?}")]
    Timeout(Duration),

    #[error(transparent)]
    Check(#[from] CheckError),

    #[error("Evaluation task failed: {0}")]
    Join(String),
}
