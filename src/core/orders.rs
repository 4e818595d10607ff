//! Major-order lifecycle detection.
//!
//! Diffs the current order list against the previous poll's list: orders
//! appearing are announced (except on the very first poll, which only
//! establishes a baseline), orders disappearing are classified as
//! success/fail/ended and announced. The current list always becomes the
//! next cycle's baseline, whether or not anything fired.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashSet;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use super::error::WatchError;
use super::model::{Event, EventKind, Order};
use super::store::{keys, StateStore};
use super::text::{fmt_num, strip_tags};

/// Keyword vocabularies for the best-effort news classification of an
/// ended order. Matched as case-insensitive substrings.
const SUCCESS_TERMS: &[&str] = &["success", "completed", "victory", "reward", "liberated"];
const FAIL_TERMS: &[&str] = &["failed", "defeat", "delayed", "lost"];

/// Outcome assigned to an order that disappeared from the active list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderOutcome {
    Success,
    Fail,
    Unknown,
}

/// Content digest of an order list, independent of JSON key ordering
/// (serde_json object maps are key-sorted).
pub fn stable_digest(orders: &[Order]) -> Result<u64, WatchError> {
    let canonical = serde_json::to_string(&serde_json::to_value(orders)?)?;
    let mut hasher = DefaultHasher::new();
    canonical.hash(&mut hasher);
    Ok(hasher.finish())
}

/// Classify an ended order: all tasks complete wins outright, then the news
/// keyword scan, then unknown.
pub fn classify_ended(order: &Order, news_text: Option<&str>) -> OrderOutcome {
    let progress = order.task_progress();
    if !progress.is_empty() && progress.iter().all(|t| t.percent >= 100.0) {
        return OrderOutcome::Success;
    }
    if let Some(text) = news_text {
        let lower = text.to_lowercase();
        if SUCCESS_TERMS.iter().any(|t| lower.contains(t)) {
            return OrderOutcome::Success;
        }
        if FAIL_TERMS.iter().any(|t| lower.contains(t)) {
            return OrderOutcome::Fail;
        }
    }
    OrderOutcome::Unknown
}

pub struct OrderTracker {
    store: Arc<StateStore>,
}

impl OrderTracker {
    pub fn new(store: Arc<StateStore>) -> Self {
        Self { store }
    }

    /// One diff pass. `news_text` is the joined text of recent news items,
    /// when the caller managed to fetch any; classification degrades to
    /// "ended" without it.
    pub fn diff(
        &self,
        current: &[Order],
        news_text: Option<&str>,
    ) -> Result<Vec<Event>, WatchError> {
        let previous: Vec<Order> = self
            .store
            .get_json(keys::LAST_ORDERS)?
            .unwrap_or_default();

        let mut events = Vec::new();
        let had_orders = !previous.is_empty();
        let has_orders = !current.is_empty();
        let changed = stable_digest(current)? != stable_digest(&previous)?;

        // New orders: only after a baseline exists, and only when the
        // content actually changed.
        if has_orders && changed {
            self.store
                .set(keys::LAST_KNOWN_ORDERS, &serde_json::to_string(current)?)?;

            if had_orders {
                let previous_ids: HashSet<u64> = previous.iter().map(|o| o.id32).collect();
                for order in current {
                    if !previous_ids.contains(&order.id32) {
                        events.push(Event::new(EventKind::NewMajorOrder, new_order_message(order)));
                    }
                }
            } else {
                log::info!("first poll: saved order baseline, no new-order alerts");
            }
        }

        // Ended orders: driven by disappearance, independent of the digest.
        if had_orders {
            let current_ids: HashSet<u64> = current.iter().map(|o| o.id32).collect();
            for ended in previous.iter().filter(|o| !current_ids.contains(&o.id32)) {
                let outcome = classify_ended(ended, news_text);
                events.push(ended_order_event(ended, outcome));
            }
        }

        self.store
            .set(keys::LAST_ORDERS, &serde_json::to_string(current)?)?;

        Ok(events)
    }
}

fn deadline_text(order: &Order) -> String {
    match order.expires_in {
        Some(secs) => format!("{}h", (secs as f64 / 3600.0).round() as i64),
        None => "unknown".to_string(),
    }
}

fn new_order_message(order: &Order) -> String {
    let title = strip_tags(order.brief().unwrap_or("New order"));
    let mut msg = format!("NEW {}\n\n{}\n", order.headline(), title);
    if let Some(reward) = &order.setting.reward {
        msg.push_str(&format!("Reward: {} {}\n", reward.amount, reward.kind_name()));
    }
    msg.push_str(&format!("Deadline: {}\n", deadline_text(order)));

    let progress = order.task_progress();
    if !progress.is_empty() {
        msg.push_str("\nObjectives:\n");
        for task in &progress {
            msg.push_str(&format!("  - {}: {}\n", task.label, fmt_num(task.target)));
        }
    }
    msg
}

fn ended_order_event(order: &Order, outcome: OrderOutcome) -> Event {
    let title = match order.brief() {
        Some(brief) => strip_tags(brief),
        None if !order.setting.override_title.is_empty() => order.setting.override_title.clone(),
        None => "Order".to_string(),
    };

    match outcome {
        OrderOutcome::Success => {
            let mut msg = format!("MAJOR ORDER COMPLETED SUCCESSFULLY\n\n{}\n", title);
            match &order.setting.reward {
                Some(reward) => msg.push_str(&format!(
                    "\n{} {} available for collection.\n",
                    reward.amount,
                    reward.kind_name()
                )),
                None => msg.push_str("\nAll objectives met.\n"),
            }
            Event::new(EventKind::MajorOrderSuccess, msg)
        }
        OrderOutcome::Fail => Event::new(
            EventKind::MajorOrderFail,
            format!(
                "MAJOR ORDER FAILED\n\n{}\n\nThe objectives were not completed in time.\n",
                title
            ),
        ),
        OrderOutcome::Unknown => Event::new(
            EventKind::MajorOrderEnded,
            format!("MAJOR ORDER ENDED\n\n{}\n\nAwaiting new orders.\n", title),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::{OrderSetting, TaskSpec, PARAM_TARGET, TASK_MISSIONS};

    fn make_order(id32: u64, title: &str, current: u64, target: i64) -> Order {
        Order {
            id32,
            progress: vec![current],
            expires_in: Some(7_200),
            setting: OrderSetting {
                override_title: title.to_string(),
                override_brief: format!("Brief for {}", title),
                tasks: vec![TaskSpec {
                    kind: TASK_MISSIONS,
                    values: vec![target],
                    value_types: vec![PARAM_TARGET],
                }],
                ..OrderSetting::default()
            },
        }
    }

    fn tracker() -> OrderTracker {
        OrderTracker::new(Arc::new(StateStore::open_in_memory().unwrap()))
    }

    #[test]
    fn test_first_poll_is_silent_baseline() {
        let tracker = tracker();
        let current = vec![make_order(1, "Alpha", 0, 100)];

        let events = tracker.diff(&current, None).unwrap();
        assert!(events.is_empty());

        // baseline persisted for the next cycle
        let saved: Vec<Order> = tracker.store.get_json(keys::LAST_ORDERS).unwrap().unwrap();
        assert_eq!(saved, current);
    }

    #[test]
    fn test_new_orders_equal_id_set_difference() {
        let tracker = tracker();
        tracker.diff(&[make_order(1, "Alpha", 0, 100)], None).unwrap();

        let current = vec![
            make_order(1, "Alpha", 0, 100),
            make_order(2, "Bravo", 0, 100),
            make_order(3, "Charlie", 0, 100),
        ];
        let events = tracker.diff(&current, None).unwrap();

        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| e.kind == EventKind::NewMajorOrder));
        assert!(events[0].message.contains("Bravo"));
        assert!(events[1].message.contains("Charlie"));
    }

    #[test]
    fn test_unchanged_lists_emit_nothing() {
        let tracker = tracker();
        let orders = vec![make_order(1, "Alpha", 10, 100)];
        tracker.diff(&orders, None).unwrap();
        let events = tracker.diff(&orders, None).unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn test_ended_order_all_tasks_complete_is_success() {
        let tracker = tracker();
        tracker.diff(&[make_order(1, "Alpha", 100, 100)], None).unwrap();

        let events = tracker.diff(&[], None).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, EventKind::MajorOrderSuccess);
    }

    #[test]
    fn test_ended_order_news_keywords() {
        let tracker = tracker();
        tracker.diff(&[make_order(1, "Alpha", 10, 100)], None).unwrap();
        let events = tracker
            .diff(&[], Some("The operation was a great VICTORY for the federation"))
            .unwrap();
        assert_eq!(events[0].kind, EventKind::MajorOrderSuccess);

        let tracker = self::tracker();
        tracker.diff(&[make_order(1, "Alpha", 10, 100)], None).unwrap();
        let events = tracker.diff(&[], Some("the front has been lost")).unwrap();
        assert_eq!(events[0].kind, EventKind::MajorOrderFail);
    }

    #[test]
    fn test_ended_order_without_signal_is_unknown() {
        let tracker = tracker();
        tracker.diff(&[make_order(1, "Alpha", 10, 100)], None).unwrap();
        let events = tracker.diff(&[], None).unwrap();
        assert_eq!(events[0].kind, EventKind::MajorOrderEnded);
        assert!(events[0].message.contains("Brief for Alpha"));
    }

    #[test]
    fn test_ended_ids_equal_reverse_set_difference() {
        let tracker = tracker();
        tracker
            .diff(
                &[
                    make_order(1, "Alpha", 0, 100),
                    make_order(2, "Bravo", 0, 100),
                ],
                None,
            )
            .unwrap();

        let events = tracker.diff(&[make_order(2, "Bravo", 0, 100)], None).unwrap();
        assert_eq!(events.len(), 1);
        assert!(events[0].message.contains("Brief for Alpha"));
    }

    #[test]
    fn test_order_without_reward_or_expiry_formats() {
        let mut order = make_order(1, "Alpha", 0, 100);
        order.setting.reward = None;
        order.expires_in = None;
        let msg = new_order_message(&order);
        assert!(!msg.contains("Reward:"));
        assert!(msg.contains("Deadline: unknown"));
    }

    #[test]
    fn test_stable_digest() {
        let a = vec![make_order(1, "Alpha", 5, 100)];
        let b = vec![make_order(1, "Alpha", 5, 100)];
        let c = vec![make_order(1, "Alpha", 6, 100)];
        assert_eq!(stable_digest(&a).unwrap(), stable_digest(&b).unwrap());
        assert_ne!(stable_digest(&a).unwrap(), stable_digest(&c).unwrap());
    }

    #[test]
    fn test_classify_prefers_task_completion_over_news() {
        let order = make_order(1, "Alpha", 100, 100);
        assert_eq!(
            classify_ended(&order, Some("everything failed horribly")),
            OrderOutcome::Success
        );
    }
}
