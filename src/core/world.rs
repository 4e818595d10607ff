//! War-state diffing: dispatches, campaigns, planet ownership, and the
//! critical-progress watch.
//!
//! Each sub-diff owns its store keys, bootstraps a silent baseline on first
//! observation, and tolerates partial payloads (a missing array decodes as
//! empty, so the diff simply sees nothing).

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use super::error::WatchError;
use super::model::{
    Campaign, Event, EventKind, Faction, Order, PlanetNames, PlanetSummary, WarStatus, SUPER_EARTH,
};
use super::store::{keys, StateStore};
use super::text::{fmt_num, strip_tags, truncate};

/// Dispatch bodies are cut to this many characters.
const DISPATCH_MAX_CHARS: usize = 500;

/// Liberation flips reported with fewer players than this are ignored; the
/// population feed is unreliable around ownership changes.
const LIBERATION_MIN_PLAYERS: u64 = 100;

/// Progress threshold for the critical watch, and the minimum advance
/// before a planet re-alerts.
const CRITICAL_THRESHOLD: f64 = 95.0;
const CRITICAL_REALERT_DELTA: f64 = 2.0;

// Normalizer for remaining-resistance percentages. The API does not expose
// a planet's true max capacity; this is an approximation, nothing more.
const ESTIMATED_MAX_HEALTH: i64 = 1_000_000;

/// An active campaign joined with its planet's status, for reports.
#[derive(Debug, Clone, PartialEq)]
pub struct CampaignView {
    pub index: i32,
    pub name: String,
    pub players: u64,
    pub owner: i32,
    pub health: i64,
    pub race: i32,
}

/// Planet indices referenced by any active order's tasks.
pub fn extract_planet_indices(orders: &[Order]) -> BTreeSet<i32> {
    let mut indices = BTreeSet::new();
    for order in orders {
        for task in &order.setting.tasks {
            indices.extend(task.params().planet_indices());
        }
    }
    indices
}

/// Liberation progress for the given planets. 100 when friendly-owned;
/// otherwise derived from remaining health while a campaign is running.
pub fn planet_progress(
    status: &WarStatus,
    indices: &BTreeSet<i32>,
    names: &PlanetNames,
) -> BTreeMap<i32, PlanetSummary> {
    let campaign_planets: HashSet<i32> = status.campaigns.iter().map(|c| c.planet_index).collect();

    let mut result = BTreeMap::new();
    for ps in &status.planet_status {
        if !indices.contains(&ps.index) {
            continue;
        }
        let has_campaign = campaign_planets.contains(&ps.index);
        let progress = if ps.owner == SUPER_EARTH {
            100.0
        } else if has_campaign {
            let estimated_max = ps.health.max(ESTIMATED_MAX_HEALTH) as f64;
            ((1.0 - ps.health as f64 / estimated_max) * 100.0 * 100.0).round() / 100.0
        } else {
            0.0
        };
        result.insert(
            ps.index,
            PlanetSummary {
                index: ps.index,
                name: names.get(ps.index),
                health: ps.health,
                players: ps.players,
                progress: progress.max(0.0),
                has_campaign,
                owner: ps.owner,
            },
        );
    }
    result
}

/// All active campaigns with planet context, busiest first.
pub fn active_campaigns(status: &WarStatus, names: &PlanetNames) -> Vec<CampaignView> {
    let by_index: HashMap<i32, _> = status.planet_status.iter().map(|p| (p.index, p)).collect();

    let mut views: Vec<CampaignView> = status
        .campaigns
        .iter()
        .filter_map(|c| {
            by_index.get(&c.planet_index).map(|ps| CampaignView {
                index: c.planet_index,
                name: names.get(c.planet_index),
                players: ps.players,
                owner: ps.owner,
                health: ps.health,
                race: c.race,
            })
        })
        .collect();
    views.sort_by(|a, b| b.players.cmp(&a.players));
    views
}

pub fn total_players(status: &WarStatus) -> u64 {
    status.planet_status.iter().map(|p| p.players).sum()
}

pub struct WorldStateTracker {
    store: Arc<StateStore>,
}

impl WorldStateTracker {
    pub fn new(store: Arc<StateStore>) -> Self {
        Self { store }
    }

    /// Dispatches: ids not seen last poll, with usable text. Silent while
    /// the previous id set is empty.
    pub fn diff_dispatches(&self, status: &WarStatus) -> Result<Vec<Event>, WatchError> {
        let prev_ids: Vec<i64> = self
            .store
            .get_json(keys::LAST_EVENT_IDS)?
            .unwrap_or_default();

        let mut events = Vec::new();
        let mut curr_ids = Vec::new();
        for dispatch in &status.global_events {
            if dispatch.event_id == 0 || dispatch.title.is_empty() {
                continue;
            }
            curr_ids.push(dispatch.event_id);

            if !prev_ids.is_empty()
                && !prev_ids.contains(&dispatch.event_id)
                && !dispatch.message.is_empty()
            {
                let clean = strip_tags(&dispatch.message);
                if !clean.trim().is_empty() {
                    events.push(Event::new(
                        EventKind::GlobalEvent,
                        format!(
                            "DISPATCH: {}\n\n{}",
                            dispatch.title,
                            truncate(&clean, DISPATCH_MAX_CHARS)
                        ),
                    ));
                }
            }
        }
        if prev_ids.is_empty() {
            log::info!("first poll: saved dispatch baseline, no alerts");
        }
        self.store.set_json(keys::LAST_EVENT_IDS, &curr_ids)?;
        Ok(events)
    }

    /// New campaigns at order-relevant planets held by a hostile faction.
    pub fn diff_campaigns(
        &self,
        status: &WarStatus,
        order_planets: &BTreeSet<i32>,
        names: &PlanetNames,
    ) -> Result<Vec<Event>, WatchError> {
        let prev_ids: Vec<i64> = self
            .store
            .get_json(keys::LAST_CAMPAIGN_IDS)?
            .unwrap_or_default();
        let owner_by_index: HashMap<i32, i32> = status
            .planet_status
            .iter()
            .map(|p| (p.index, p.owner))
            .collect();

        let mut events = Vec::new();
        let mut curr_ids = Vec::new();
        for campaign in &status.campaigns {
            curr_ids.push(campaign.id);

            if prev_ids.is_empty()
                || prev_ids.contains(&campaign.id)
                || !order_planets.contains(&campaign.planet_index)
            {
                continue;
            }
            let owner = owner_by_index
                .get(&campaign.planet_index)
                .copied()
                .unwrap_or(campaign.race);
            if owner == SUPER_EARTH {
                continue;
            }
            events.push(new_campaign_event(campaign, owner, names));
        }
        if prev_ids.is_empty() {
            log::info!("first poll: saved campaign baseline, no alerts");
        }
        self.store.set_json(keys::LAST_CAMPAIGN_IDS, &curr_ids)?;
        Ok(events)
    }

    /// Ownership flips since the previous poll. A planet with no recorded
    /// previous owner is first-observation and only establishes baseline.
    pub fn diff_ownership(
        &self,
        status: &WarStatus,
        names: &PlanetNames,
    ) -> Result<Vec<Event>, WatchError> {
        let prev_owners: HashMap<i32, i32> = self
            .store
            .get_json(keys::LAST_PLANET_OWNERS)?
            .unwrap_or_default();

        let mut events = Vec::new();
        let mut curr_owners: HashMap<i32, i32> = HashMap::new();
        for ps in &status.planet_status {
            curr_owners.insert(ps.index, ps.owner);

            let Some(&prev_owner) = prev_owners.get(&ps.index) else {
                continue;
            };
            if prev_owner == SUPER_EARTH && ps.owner != SUPER_EARTH {
                events.push(Event::new(
                    EventKind::PlanetLost,
                    format!(
                        "PLANET LOST\n\n{} has been taken by {}.\n\nCounterattack required.",
                        names.get(ps.index),
                        Faction::from_code(ps.owner).name()
                    ),
                ));
            }
            if prev_owner != SUPER_EARTH
                && ps.owner == SUPER_EARTH
                && ps.players > LIBERATION_MIN_PLAYERS
            {
                events.push(Event::new(
                    EventKind::PlanetLiberated,
                    format!(
                        "PLANET LIBERATED\n\n{} has been liberated.",
                        names.get(ps.index)
                    ),
                ));
            }
        }
        if prev_owners.is_empty() {
            log::info!("first poll: saved planet-owner baseline, no alerts");
        }
        self.store.set_json(keys::LAST_PLANET_OWNERS, &curr_owners)?;
        Ok(events)
    }

    /// Critical-progress watch over order-relevant planets. Re-alerts as a
    /// siege advances (≥2 points past the last alert) instead of firing
    /// once and going silent. The last-alerted percentage is refreshed on
    /// every cycle at or above the threshold, alert or not.
    pub fn critical_watch(
        &self,
        status: &WarStatus,
        order_planets: &BTreeSet<i32>,
        names: &PlanetNames,
    ) -> Result<Vec<Event>, WatchError> {
        if order_planets.is_empty() {
            return Ok(Vec::new());
        }

        let progress_map = planet_progress(status, order_planets, names);
        let mut alerts: HashMap<i32, f64> = self
            .store
            .get_json(keys::LAST_PLANET_ALERTS)?
            .unwrap_or_default();

        let mut events = Vec::new();
        for (index, summary) in &progress_map {
            let prev = alerts.get(index).copied().unwrap_or(0.0);
            let curr = summary.progress;

            if curr >= CRITICAL_THRESHOLD
                && (prev < CRITICAL_THRESHOLD || curr - prev >= CRITICAL_REALERT_DELTA)
            {
                events.push(Event::new(
                    EventKind::PlanetCritical,
                    format!(
                        "PLANET AT CRITICAL PHASE\n\n{}\nProgress: {}%\nPlayers: {}",
                        summary.name,
                        curr,
                        fmt_num(summary.players)
                    ),
                ));
                alerts.insert(*index, curr);
            } else if curr >= CRITICAL_THRESHOLD {
                alerts.insert(*index, curr);
            }
        }

        self.store.set_json(keys::LAST_PLANET_ALERTS, &alerts)?;
        self.store.set_json(
            keys::LAST_PLANETS,
            &progress_map.values().collect::<Vec<_>>(),
        )?;
        Ok(events)
    }
}

fn new_campaign_event(campaign: &Campaign, owner: i32, names: &PlanetNames) -> Event {
    Event::new(
        EventKind::NewCampaign,
        format!(
            "COMBAT ON A MAJOR ORDER PLANET\n\n{}\nEnemy: {}\n\nThis planet is an order objective.",
            names.get(campaign.planet_index),
            Faction::from_code(owner).name()
        ),
    )
}
