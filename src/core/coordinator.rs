//! One poll cycle, end to end.
//!
//! The coordinator sequences the trackers in a fixed order and owns the
//! in-flight guard: a trigger while a cycle is already running is a no-op,
//! not a queue. Every stage catches its own failure so one API being down
//! never discards events another stage already derived.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use super::api::WarApi;
use super::error::WatchError;
use super::model::{Event, NewsItem, Order};
use super::orders::OrderTracker;
use super::progress::ProgressProjector;
use super::store::{keys, StateStore};
use super::world::{extract_planet_indices, WorldStateTracker};

/// Read-only view of the persisted baselines, for diagnostics.
#[derive(Debug, Serialize)]
pub struct StateSnapshot {
    pub last_orders: Option<Value>,
    pub last_known_orders: Option<Value>,
    pub last_news_ts: Option<String>,
    pub last_event_ids: Option<Value>,
    pub last_campaign_ids: Option<Value>,
    pub last_planets: Option<Value>,
    pub last_planet_alerts: Option<Value>,
}

pub struct PollCoordinator {
    api: Arc<dyn WarApi>,
    store: Arc<StateStore>,
    orders: OrderTracker,
    projector: ProgressProjector,
    world: WorldStateTracker,
    in_flight: AtomicBool,
}

impl PollCoordinator {
    pub fn new(api: Arc<dyn WarApi>, store: Arc<StateStore>) -> Self {
        Self {
            api,
            orders: OrderTracker::new(store.clone()),
            projector: ProgressProjector::new(store.clone()),
            world: WorldStateTracker::new(store.clone()),
            store,
            in_flight: AtomicBool::new(false),
        }
    }

    /// Run one poll cycle. Returns the derived events, which may be a
    /// partial list when stages failed, or empty when a cycle was already
    /// in flight.
    pub async fn poll(&self) -> Vec<Event> {
        if self.in_flight.swap(true, Ordering::SeqCst) {
            log::debug!("poll already running, skipping");
            return Vec::new();
        }
        let events = self.run_cycle().await;
        self.in_flight.store(false, Ordering::SeqCst);
        events
    }

    async fn run_cycle(&self) -> Vec<Event> {
        let mut events = Vec::new();

        let orders = match self.api.major_orders().await {
            Ok(orders) => Some(orders),
            Err(err) => {
                log::warn!("failed to fetch major orders: {}", err);
                None
            }
        };

        // Recent news, used both for ended-order classification and the
        // watermark. Best-effort: classification degrades without it.
        let last_news_ts = self.store.get_i64(keys::LAST_NEWS_TS).unwrap_or(0);
        let news = match self.api.news(last_news_ts).await {
            Ok(items) => Some(items),
            Err(err) => {
                log::warn!("failed to fetch news: {}", err);
                None
            }
        };
        let news_text = news.as_ref().map(|items| joined_news_text(items));

        if let Some(orders) = &orders {
            match self.orders.diff(orders, news_text.as_deref()) {
                Ok(mut order_events) => events.append(&mut order_events),
                Err(err) => log::warn!("order diff failed: {}", err),
            }
            if let Err(err) = self.projector.save_snapshot(orders) {
                log::warn!("progress snapshot rotation failed: {}", err);
            }
        }

        if let Some(items) = &news {
            if let Err(err) = self.advance_news_watermark(last_news_ts, items) {
                log::warn!("news watermark update failed: {}", err);
            }
        }

        match self.api.war_status().await {
            Ok(status) => {
                let names = self.api.planet_names().await;
                let has_orders = orders.as_ref().map_or(false, |o| !o.is_empty());
                let order_planets = orders
                    .as_ref()
                    .map(|o| extract_planet_indices(o))
                    .unwrap_or_default();

                match self.world.diff_dispatches(&status) {
                    Ok(mut ev) => events.append(&mut ev),
                    Err(err) => log::warn!("dispatch diff failed: {}", err),
                }
                if has_orders {
                    match self.world.diff_campaigns(&status, &order_planets, &names) {
                        Ok(mut ev) => events.append(&mut ev),
                        Err(err) => log::warn!("campaign diff failed: {}", err),
                    }
                }
                match self.world.diff_ownership(&status, &names) {
                    Ok(mut ev) => events.append(&mut ev),
                    Err(err) => log::warn!("ownership diff failed: {}", err),
                }
                if has_orders {
                    match self.world.critical_watch(&status, &order_planets, &names) {
                        Ok(mut ev) => events.append(&mut ev),
                        Err(err) => log::warn!("critical watch failed: {}", err),
                    }
                }
            }
            Err(err) => log::warn!("war status checks failed: {}", err),
        }

        events
    }

    fn advance_news_watermark(
        &self,
        last_news_ts: i64,
        items: &[NewsItem],
    ) -> Result<(), WatchError> {
        let max_ts = items
            .iter()
            .map(NewsItem::published_ts)
            .fold(last_news_ts, i64::max);
        if max_ts > last_news_ts {
            self.store.set(keys::LAST_NEWS_TS, &max_ts.to_string())?;
        }
        Ok(())
    }

    /// Latest persisted baselines; no mutation.
    pub fn state_snapshot(&self) -> Result<StateSnapshot, WatchError> {
        Ok(StateSnapshot {
            last_orders: self.store.get_json(keys::LAST_ORDERS)?,
            last_known_orders: self.store.get_json(keys::LAST_KNOWN_ORDERS)?,
            last_news_ts: self.store.get(keys::LAST_NEWS_TS)?,
            last_event_ids: self.store.get_json(keys::LAST_EVENT_IDS)?,
            last_campaign_ids: self.store.get_json(keys::LAST_CAMPAIGN_IDS)?,
            last_planets: self.store.get_json(keys::LAST_PLANETS)?,
            last_planet_alerts: self.store.get_json(keys::LAST_PLANET_ALERTS)?,
        })
    }

    /// ETA projections for `order`, from the persisted snapshots.
    pub fn compute_eta(
        &self,
        order: &Order,
    ) -> Result<Vec<super::progress::TaskEta>, WatchError> {
        self.projector.compute_eta(order)
    }
}

fn joined_news_text(items: &[NewsItem]) -> String {
    items
        .iter()
        .map(|n| n.message.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}
