//! Completion-rate estimation.
//!
//! Two generations of per-task progress counters are kept: the snapshot
//! written by the latest poll that saw active orders, and the one before
//! it. The linear rate between them projects an ETA per task. Polls that
//! see no active orders never rotate, so a transient "no orders" gap can't
//! corrupt the baseline.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;

use super::error::WatchError;
use super::model::Order;
use super::store::{keys, StateStore};

/// Snapshots closer together than this produce no ETA; the counter deltas
/// are too noisy to divide by.
const MIN_ELAPSED_SECS: f64 = 60.0;

/// Projected completion estimate for one task.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskEta {
    pub label: String,
    pub eta_hours: i64,
    pub rate_per_sec: f64,
    pub percent: f64,
}

pub fn snapshot_key(id32: u64, task_index: usize) -> String {
    format!("{}_{}", id32, task_index)
}

pub struct ProgressProjector {
    store: Arc<StateStore>,
}

impl ProgressProjector {
    pub fn new(store: Arc<StateStore>) -> Self {
        Self { store }
    }

    /// ETA per task of `order`, or empty until two snapshots at least
    /// `MIN_ELAPSED_SECS` apart exist. Tasks whose counter was zero, flat
    /// or regressing are skipped; so are tasks already at (or past) target.
    pub fn compute_eta(&self, order: &Order) -> Result<Vec<TaskEta>, WatchError> {
        let prev: HashMap<String, u64> = self
            .store
            .get_json(keys::PROGRESS_SNAPSHOT_PREV)?
            .unwrap_or_default();
        let curr: HashMap<String, u64> = self
            .store
            .get_json(keys::PROGRESS_SNAPSHOT)?
            .unwrap_or_default();
        let prev_ts = self.store.get_i64(keys::PROGRESS_SNAPSHOT_PREV_TS)?;
        let curr_ts = self.store.get_i64(keys::PROGRESS_SNAPSHOT_TS)?;

        if prev_ts == 0 || curr_ts == 0 || curr_ts <= prev_ts {
            return Ok(Vec::new());
        }
        let elapsed = (curr_ts - prev_ts) as f64 / 1000.0;
        if elapsed < MIN_ELAPSED_SECS {
            return Ok(Vec::new());
        }

        let mut etas = Vec::new();
        for (i, task) in order.task_progress().iter().enumerate() {
            let key = snapshot_key(order.id32, i);
            let prev_val = prev.get(&key).copied().unwrap_or(0);
            let curr_val = curr.get(&key).copied().unwrap_or(0);

            if prev_val > 0 && curr_val > prev_val {
                let rate = (curr_val - prev_val) as f64 / elapsed;
                let remaining = task.target as i64 - task.current as i64;
                if rate > 0.0 && remaining > 0 {
                    etas.push(TaskEta {
                        label: task.label.clone(),
                        eta_hours: (remaining as f64 / rate / 3600.0).round() as i64,
                        rate_per_sec: rate,
                        percent: task.percent,
                    });
                }
            }
        }
        Ok(etas)
    }

    /// Rotate snapshots: the stored current generation (value and original
    /// timestamp) becomes previous, then the fresh map becomes current.
    /// Called once per poll that saw at least one active order; a zero-order
    /// poll leaves both generations untouched.
    pub fn save_snapshot(&self, orders: &[Order]) -> Result<(), WatchError> {
        if orders.is_empty() {
            return Ok(());
        }

        let mut snapshot: HashMap<String, u64> = HashMap::new();
        for order in orders {
            for (i, _) in order.setting.tasks.iter().enumerate() {
                let current = order.progress.get(i).copied().unwrap_or(0);
                snapshot.insert(snapshot_key(order.id32, i), current);
            }
        }

        if let (Some(old), Some(old_ts)) = (
            self.store.get(keys::PROGRESS_SNAPSHOT)?,
            self.store.get(keys::PROGRESS_SNAPSHOT_TS)?,
        ) {
            self.store.set(keys::PROGRESS_SNAPSHOT_PREV, &old)?;
            self.store.set(keys::PROGRESS_SNAPSHOT_PREV_TS, &old_ts)?;
        }

        self.store.set_json(keys::PROGRESS_SNAPSHOT, &snapshot)?;
        self.store.set(
            keys::PROGRESS_SNAPSHOT_TS,
            &Utc::now().timestamp_millis().to_string(),
        )?;
        Ok(())
    }
}
