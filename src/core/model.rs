// Typed views of the war API payloads.
//
// Everything coming off the wire is decoded defensively: missing arrays are
// empty, missing counters are zero. The value/value-type parallel arrays on
// tasks are decoded exactly once (TaskParams); nothing downstream re-scans
// the raw arrays.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Task parameter kind tags used by the API's parallel value arrays.
pub const PARAM_TARGET: i64 = 3;
pub const PARAM_ENEMY: i64 = 4;
pub const PARAM_PLANET: i64 = 12;

/// Task type codes.
pub const TASK_ELIMINATE: i32 = 3;
pub const TASK_MISSIONS: i32 = 7;
pub const TASK_DEFENSE: i32 = 12;

/// Owner/race code for the friendly faction.
pub const SUPER_EARTH: i32 = 1;

/// Faction behind an owner/race code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Faction {
    Unknown,
    SuperEarth,
    Terminids,
    Automaton,
    Illuminate,
}

impl Faction {
    pub fn from_code(code: i32) -> Self {
        match code {
            1 => Self::SuperEarth,
            2 => Self::Terminids,
            3 => Self::Automaton,
            4 => Self::Illuminate,
            _ => Self::Unknown,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Unknown => "Unknown enemy",
            Self::SuperEarth => "Super Earth",
            Self::Terminids => "Terminids",
            Self::Automaton => "Automaton",
            Self::Illuminate => "Illuminate",
        }
    }
}

/// Known enemy target ids appearing in eliminate tasks.
pub fn enemy_name(id: i64) -> Option<&'static str> {
    match id {
        2651633799 => Some("Chargers"),
        1046000873 => Some("Impalers"),
        2514244534 => Some("Bile Titans"),
        4106381389 => Some("Brood Commanders"),
        2281720629 => Some("Stalkers"),
        3618572993 => Some("Hunters"),
        922543337 => Some("Shriekers"),
        3751042098 => Some("Hulks"),
        3471945498 => Some("Devastators"),
        1656588421 => Some("Berserkers"),
        501271428 => Some("Scout Striders"),
        1464964377 => Some("Tanks"),
        3832498375 => Some("Gunships"),
        _ => None,
    }
}

/// A campaign-wide objective ("major order").
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    #[serde(default)]
    pub id32: u64,
    /// Per-task progress counters, positionally aligned with the task list.
    #[serde(default)]
    pub progress: Vec<u64>,
    /// Seconds until expiry, when the API reports one.
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub setting: OrderSetting,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OrderSetting {
    #[serde(default)]
    pub override_title: String,
    #[serde(default)]
    pub override_brief: String,
    #[serde(default)]
    pub task_description: String,
    #[serde(default)]
    pub tasks: Vec<TaskSpec>,
    #[serde(default)]
    pub reward: Option<Reward>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Reward {
    #[serde(rename = "type", default)]
    pub kind: i32,
    #[serde(default)]
    pub amount: u64,
}

impl Reward {
    pub fn kind_name(&self) -> &'static str {
        if self.kind == 1 {
            "Medals"
        } else {
            "Requisition"
        }
    }
}

/// One measurable sub-goal of an order, as it appears on the wire.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TaskSpec {
    #[serde(rename = "type", default)]
    pub kind: i32,
    #[serde(default)]
    pub values: Vec<i64>,
    #[serde(default)]
    pub value_types: Vec<i64>,
}

impl TaskSpec {
    /// Decode the parallel value/value-type arrays into a tagged structure.
    pub fn params(&self) -> TaskParams {
        let mut by_kind: HashMap<i64, Vec<i64>> = HashMap::new();
        for (kind, value) in self.value_types.iter().zip(self.values.iter()) {
            by_kind.entry(*kind).or_default().push(*value);
        }
        TaskParams { by_kind }
    }
}

/// Task parameters keyed by kind tag. Parameter kinds can repeat (a task may
/// reference several planets), so each kind maps to all its values in wire
/// order.
#[derive(Debug, Clone, Default)]
pub struct TaskParams {
    by_kind: HashMap<i64, Vec<i64>>,
}

impl TaskParams {
    pub fn first(&self, kind: i64) -> Option<i64> {
        self.by_kind.get(&kind).and_then(|v| v.first().copied())
    }

    pub fn all(&self, kind: i64) -> &[i64] {
        self.by_kind.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    /// The completion target, when the task declares one.
    pub fn target(&self) -> Option<i64> {
        self.first(PARAM_TARGET)
    }

    pub fn enemy_id(&self) -> Option<i64> {
        self.first(PARAM_ENEMY)
    }

    /// Planet indices referenced by this task (zero entries are padding).
    pub fn planet_indices(&self) -> Vec<i32> {
        self.all(PARAM_PLANET)
            .iter()
            .filter(|v| **v > 0)
            .map(|v| *v as i32)
            .collect()
    }
}

/// Progress of one task: counter, target, completion percentage and a label.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskProgress {
    pub label: String,
    pub current: u64,
    pub target: u64,
    pub percent: f64,
}

impl Order {
    /// Title line for the order ("MAJOR ORDER" when the API gives none).
    pub fn headline(&self) -> &str {
        if self.setting.override_title.is_empty() {
            "MAJOR ORDER"
        } else {
            &self.setting.override_title
        }
    }

    /// Briefing text, preferring the override over the task description.
    pub fn brief(&self) -> Option<&str> {
        if !self.setting.override_brief.is_empty() {
            Some(&self.setting.override_brief)
        } else if !self.setting.task_description.is_empty() {
            Some(&self.setting.task_description)
        } else {
            None
        }
    }

    /// Per-task progress. The task list governs the length; a missing
    /// progress entry defaults to zero and surplus entries are dropped, so
    /// the positional-alignment invariant holds by construction.
    pub fn task_progress(&self) -> Vec<TaskProgress> {
        let mut result = Vec::with_capacity(self.setting.tasks.len());
        for (i, task) in self.setting.tasks.iter().enumerate() {
            let current = self.progress.get(i).copied().unwrap_or(0);
            let params = task.params();
            let target = params.target().filter(|t| *t > 0).unwrap_or(0) as u64;
            let percent = if target > 0 {
                (((current as f64 / target as f64) * 10_000.0).round() / 100.0).min(100.0)
            } else {
                0.0
            };
            result.push(TaskProgress {
                label: task_label(task, &params, i),
                current,
                target,
                percent,
            });
        }
        result
    }
}

fn task_label(task: &TaskSpec, params: &TaskParams, index: usize) -> String {
    match task.kind {
        TASK_MISSIONS => "Missions".to_string(),
        TASK_DEFENSE => "Defense".to_string(),
        TASK_ELIMINATE => match params.enemy_id().and_then(enemy_name) {
            Some(name) => format!("Eliminate {}", name),
            None => format!("Eliminate targets {}", index + 1),
        },
        _ => format!("Task {}", index + 1),
    }
}

/// A broadcast narrative message ("dispatch").
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GlobalEvent {
    #[serde(default)]
    pub event_id: i64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub message: String,
}

/// An active combat engagement at a planet.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Campaign {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub planet_index: i32,
    #[serde(default)]
    pub race: i32,
}

/// Per-planet status from the war-status payload. Lower health means more
/// liberated for planets not owned by Super Earth.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlanetStatus {
    #[serde(default)]
    pub index: i32,
    #[serde(default)]
    pub owner: i32,
    #[serde(default)]
    pub health: i64,
    #[serde(default)]
    pub players: u64,
}

/// One fetched war-status payload. Partial payloads decode to empty arrays
/// so each sub-diff can skip quietly.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WarStatus {
    #[serde(default)]
    pub global_events: Vec<GlobalEvent>,
    #[serde(default)]
    pub campaigns: Vec<Campaign>,
    #[serde(default)]
    pub planet_status: Vec<PlanetStatus>,
}

/// A news feed entry. The feed has carried its timestamp under several
/// names; `published_ts` picks the first one present.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewsItem {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub published: Option<i64>,
    #[serde(rename = "publishedAt", default)]
    pub published_at: Option<i64>,
    #[serde(default)]
    pub timestamp: Option<i64>,
    #[serde(default)]
    pub message: String,
}

impl NewsItem {
    pub fn published_ts(&self) -> i64 {
        self.published
            .or(self.published_at)
            .or(self.timestamp)
            .unwrap_or(0)
    }
}

/// Static planet info from the planets endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlanetInfo {
    #[serde(default)]
    pub name: String,
}

/// Planet index → name lookup with a stable fallback.
#[derive(Debug, Clone, Default)]
pub struct PlanetNames(HashMap<i32, String>);

impl PlanetNames {
    pub fn get(&self, index: i32) -> String {
        self.0
            .get(&index)
            .cloned()
            .unwrap_or_else(|| format!("Planet #{}", index))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<HashMap<i32, String>> for PlanetNames {
    fn from(map: HashMap<i32, String>) -> Self {
        Self(map)
    }
}

/// Tracked summary for a planet referenced by active orders.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlanetSummary {
    pub index: i32,
    pub name: String,
    pub health: i64,
    pub players: u64,
    pub progress: f64,
    pub has_campaign: bool,
    pub owner: i32,
}

/// Notification kinds delivered to the Notifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    NewMajorOrder,
    MajorOrderSuccess,
    MajorOrderFail,
    MajorOrderEnded,
    GlobalEvent,
    NewCampaign,
    PlanetLost,
    PlanetLiberated,
    PlanetCritical,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NewMajorOrder => "new_major_order",
            Self::MajorOrderSuccess => "major_order_success",
            Self::MajorOrderFail => "major_order_fail",
            Self::MajorOrderEnded => "major_order_ended",
            Self::GlobalEvent => "global_event",
            Self::NewCampaign => "new_campaign",
            Self::PlanetLost => "planet_lost",
            Self::PlanetLiberated => "planet_liberated",
            Self::PlanetCritical => "planet_critical",
        }
    }
}

/// One derived notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub message: String,
}

impl Event {
    pub fn new(kind: EventKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eliminate_task(enemy: i64, target: i64) -> TaskSpec {
        TaskSpec {
            kind: TASK_ELIMINATE,
            values: vec![enemy, target],
            value_types: vec![PARAM_ENEMY, PARAM_TARGET],
        }
    }

    #[test]
    fn test_params_decode_once() {
        let task = TaskSpec {
            kind: TASK_MISSIONS,
            values: vec![100, 5, 0, 12],
            value_types: vec![PARAM_TARGET, PARAM_PLANET, PARAM_PLANET, PARAM_PLANET],
        };
        let params = task.params();
        assert_eq!(params.target(), Some(100));
        // Repeated planet tags all survive; zero entries are dropped.
        assert_eq!(params.planet_indices(), vec![5, 12]);
    }

    #[test]
    fn test_params_tolerate_mismatched_arrays() {
        let task = TaskSpec {
            kind: TASK_MISSIONS,
            values: vec![100],
            value_types: vec![PARAM_TARGET, PARAM_PLANET],
        };
        // zip truncates to the shorter array instead of indexing past it
        let params = task.params();
        assert_eq!(params.target(), Some(100));
        assert!(params.planet_indices().is_empty());
    }

    #[test]
    fn test_task_progress_alignment() {
        let order = Order {
            id32: 7,
            progress: vec![50],
            setting: OrderSetting {
                tasks: vec![eliminate_task(0, 100), eliminate_task(0, 200)],
                ..OrderSetting::default()
            },
            ..Order::default()
        };
        let tp = order.task_progress();
        assert_eq!(tp.len(), 2);
        assert_eq!(tp[0].current, 50);
        assert_eq!(tp[0].percent, 50.0);
        // second task has no progress entry: defaults to zero
        assert_eq!(tp[1].current, 0);
        assert_eq!(tp[1].percent, 0.0);
    }

    #[test]
    fn test_task_progress_percent_capped() {
        let order = Order {
            progress: vec![300],
            setting: OrderSetting {
                tasks: vec![eliminate_task(0, 100)],
                ..OrderSetting::default()
            },
            ..Order::default()
        };
        assert_eq!(order.task_progress()[0].percent, 100.0);
    }

    #[test]
    fn test_task_labels() {
        let order = Order {
            setting: OrderSetting {
                tasks: vec![
                    TaskSpec {
                        kind: TASK_MISSIONS,
                        ..TaskSpec::default()
                    },
                    eliminate_task(2514244534, 100),
                    TaskSpec {
                        kind: TASK_DEFENSE,
                        ..TaskSpec::default()
                    },
                    TaskSpec {
                        kind: 99,
                        ..TaskSpec::default()
                    },
                ],
                ..OrderSetting::default()
            },
            ..Order::default()
        };
        let labels: Vec<String> = order.task_progress().into_iter().map(|t| t.label).collect();
        assert_eq!(labels, vec!["Missions", "Eliminate Bile Titans", "Defense", "Task 4"]);
    }

    #[test]
    fn test_wire_decoding_defaults() {
        let order: Order = serde_json::from_str(
            r#"{"id32": 123, "expiresIn": 7200, "setting": {"overrideTitle": "MAJOR ORDER", "tasks": [{"type": 3, "values": [1, 2], "valueTypes": [4, 3]}]}}"#,
        )
        .unwrap();
        assert_eq!(order.id32, 123);
        assert_eq!(order.expires_in, Some(7200));
        assert!(order.progress.is_empty());
        assert_eq!(order.setting.tasks.len(), 1);

        let status: WarStatus = serde_json::from_str(r#"{"campaigns": []}"#).unwrap();
        assert!(status.global_events.is_empty());
        assert!(status.planet_status.is_empty());
    }

    #[test]
    fn test_order_round_trips_through_json() {
        let order = Order {
            id32: 9,
            progress: vec![1, 2],
            expires_in: Some(3600),
            setting: OrderSetting {
                override_title: "T".into(),
                reward: Some(Reward { kind: 1, amount: 45 }),
                tasks: vec![eliminate_task(0, 10)],
                ..OrderSetting::default()
            },
        };
        let json = serde_json::to_string(&order).unwrap();
        let back: Order = serde_json::from_str(&json).unwrap();
        assert_eq!(back, order);
    }

    #[test]
    fn test_news_published_fallbacks() {
        let a: NewsItem = serde_json::from_str(r#"{"published": 10}"#).unwrap();
        let b: NewsItem = serde_json::from_str(r#"{"publishedAt": 20}"#).unwrap();
        let c: NewsItem = serde_json::from_str(r#"{"timestamp": 30}"#).unwrap();
        let d: NewsItem = serde_json::from_str(r#"{}"#).unwrap();
        assert_eq!(a.published_ts(), 10);
        assert_eq!(b.published_ts(), 20);
        assert_eq!(c.published_ts(), 30);
        assert_eq!(d.published_ts(), 0);
    }

    #[test]
    fn test_faction_names() {
        assert_eq!(Faction::from_code(1), Faction::SuperEarth);
        assert_eq!(Faction::from_code(3).name(), "Automaton");
        assert_eq!(Faction::from_code(42), Faction::Unknown);
    }

    #[test]
    fn test_planet_names_fallback() {
        let names: PlanetNames = HashMap::from([(5, "Malevelon Creek".to_string())]).into();
        assert_eq!(names.get(5), "Malevelon Creek");
        assert_eq!(names.get(77), "Planet #77");
    }
}
