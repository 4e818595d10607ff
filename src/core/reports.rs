//! Plain-text report builders.
//!
//! Pure functions over already-fetched data; the app layer decides where
//! the text goes. Wording is transport-neutral: no markup beyond plain
//! lines and the ten-slot progress bar.

use super::model::{Order, PlanetSummary};
use super::progress::TaskEta;
use super::text::{fmt_num, progress_bar, strip_tags};
use super::world::CampaignView;

const PLANETS_REPORT_LIMIT: usize = 15;
const TOP_REPORT_LIMIT: usize = 10;

fn deadline_hm(order: &Order) -> String {
    match order.expires_in {
        Some(secs) => format!(
            "{}h {}m",
            (secs as f64 / 3600.0).round() as i64,
            ((secs % 3600) as f64 / 60.0).round() as i64
        ),
        None => "unknown".to_string(),
    }
}

fn deadline_hours(order: &Order) -> Option<i64> {
    order.expires_in.map(|secs| (secs as f64 / 3600.0).round() as i64)
}

fn rate_per_hour(eta: &TaskEta) -> String {
    fmt_num((eta.rate_per_sec * 3600.0).round().max(0.0) as u64)
}

fn pace_marker(eta: &TaskEta, deadline: Option<i64>) -> &'static str {
    match deadline {
        Some(hours) if eta.eta_hours <= hours => "[on pace]",
        Some(_) => "[behind]",
        None => "[pace]",
    }
}

/// Overall situation: orders with progress and ETA, player count, tracked
/// order planets.
pub fn status_report(
    orders: &[(Order, Vec<TaskEta>)],
    total_players: u64,
    planets: &[PlanetSummary],
) -> String {
    let mut lines: Vec<String> = Vec::new();

    if orders.is_empty() {
        lines.push("Major Order: none active".to_string());
    } else {
        for (order, etas) in orders {
            lines.push(order.headline().to_string());
            lines.push(strip_tags(order.brief().unwrap_or("N/A")));
            if let Some(reward) = &order.setting.reward {
                lines.push(format!("Reward: {} {}", reward.amount, reward.kind_name()));
            }
            lines.push(format!("Deadline: {}", deadline_hm(order)));

            for task in order.task_progress() {
                lines.push(format!(
                    "  {}: {} {}% ({}/{})",
                    task.label,
                    progress_bar(task.percent),
                    task.percent,
                    fmt_num(task.current),
                    fmt_num(task.target)
                ));
            }
            let deadline = deadline_hours(order);
            for eta in etas {
                lines.push(format!(
                    "  {} {}: ~{}h ETA ({}/hour)",
                    pace_marker(eta, deadline),
                    eta.label,
                    eta.eta_hours,
                    rate_per_hour(eta)
                ));
            }
            lines.push(String::new());
        }
    }

    lines.push(format!("Active players: {}", fmt_num(total_players)));

    if !planets.is_empty() {
        lines.push(String::new());
        lines.push("Order planets:".to_string());
        let mut sorted: Vec<&PlanetSummary> = planets.iter().collect();
        sorted.sort_by(|a, b| b.players.cmp(&a.players));
        for planet in sorted.into_iter().take(5) {
            let state = if planet.owner == super::model::SUPER_EARTH {
                "Liberated"
            } else if planet.has_campaign {
                "In combat"
            } else {
                "Enemy held"
            };
            lines.push(format!(
                "  {}: {} | {} players",
                planet.name,
                state,
                fmt_num(planet.players)
            ));
        }
    }

    lines.join("\n")
}

/// Full detail for every active order.
pub fn order_detail_report(orders: &[(Order, Vec<TaskEta>)]) -> String {
    if orders.is_empty() {
        return "No active Major Order.".to_string();
    }

    let mut lines: Vec<String> = Vec::new();
    for (order, etas) in orders {
        lines.push(order.headline().to_string());
        lines.push(strip_tags(order.brief().unwrap_or("N/A")));
        if let Some(reward) = &order.setting.reward {
            lines.push(format!("Reward: {} {}", reward.amount, reward.kind_name()));
        }
        lines.push(format!("Deadline: {}", deadline_hm(order)));
        lines.push(String::new());

        lines.push("Progress:".to_string());
        for task in order.task_progress() {
            lines.push(format!("  {}", task.label));
            lines.push(format!("  {} {}%", progress_bar(task.percent), task.percent));
            lines.push(format!(
                "  {} / {}",
                fmt_num(task.current),
                fmt_num(task.target)
            ));
            lines.push(String::new());
        }

        if !etas.is_empty() {
            lines.push("Estimates:".to_string());
            for eta in etas {
                lines.push(format!(
                    "  {}: ~{}h remaining ({}/hour)",
                    eta.label,
                    eta.eta_hours,
                    rate_per_hour(eta)
                ));
            }
            lines.push(String::new());
        }

        lines.push("-".repeat(30));
        lines.push(String::new());
    }
    lines.join("\n")
}

/// Every planet with an active campaign, busiest first.
pub fn planets_report(campaigns: &[CampaignView]) -> String {
    if campaigns.is_empty() {
        return "No active combat right now.".to_string();
    }

    let mut lines = vec![format!("Planets in combat ({}):", campaigns.len()), String::new()];
    for view in campaigns.iter().take(PLANETS_REPORT_LIMIT) {
        lines.push(format!("{} - {} players", view.name, fmt_num(view.players)));
    }
    if campaigns.len() > PLANETS_REPORT_LIMIT {
        lines.push(String::new());
        lines.push(format!(
            "... and {} more planets",
            campaigns.len() - PLANETS_REPORT_LIMIT
        ));
    }
    lines.join("\n")
}

/// Top planets by player count, with each planet's share.
pub fn top_report(campaigns: &[CampaignView], total_players: u64) -> String {
    if campaigns.is_empty() {
        return "No active combat right now.".to_string();
    }

    let mut lines = vec![
        format!("TOP {} - most active planets", TOP_REPORT_LIMIT),
        format!("Total: {} players", fmt_num(total_players)),
        String::new(),
    ];
    for (i, view) in campaigns.iter().take(TOP_REPORT_LIMIT).enumerate() {
        let share = if total_players > 0 {
            view.players as f64 / total_players as f64 * 100.0
        } else {
            0.0
        };
        lines.push(format!(
            "{}. {} - {} players ({:.1}%) - vs {}",
            i + 1,
            view.name,
            fmt_num(view.players),
            share,
            super::model::Faction::from_code(view.owner).name()
        ));
    }
    lines.join("\n")
}

/// ETA-only view of the active orders.
pub fn eta_report(orders: &[(Order, Vec<TaskEta>)]) -> String {
    if orders.is_empty() {
        return "No active Major Order.".to_string();
    }

    let mut lines: Vec<String> = Vec::new();
    let mut any = false;
    for (order, etas) in orders {
        if etas.is_empty() {
            continue;
        }
        any = true;
        lines.push(format!("ETA - {}", order.headline()));
        let deadline = deadline_hours(order);
        if let Some(hours) = deadline {
            lines.push(format!("Deadline: {}h remaining", hours));
        }
        lines.push(String::new());
        for eta in etas {
            lines.push(format!(
                "{} {}: ~{}h ETA | {}/hour | {}% complete",
                pace_marker(eta, deadline),
                eta.label,
                eta.eta_hours,
                rate_per_hour(eta),
                eta.percent
            ));
        }
        lines.push(String::new());
    }

    if !any {
        return "ETA not available yet.\nAt least two poll cycles with recorded progress are needed."
            .to_string();
    }
    lines.join("\n")
}

/// Compact once-a-day overview.
pub fn daily_summary(
    orders: &[(Order, Vec<TaskEta>)],
    total_players: u64,
    campaigns: &[CampaignView],
) -> String {
    let mut lines = vec!["DAILY SUMMARY - Galactic War".to_string(), String::new()];

    if orders.is_empty() {
        lines.push("No active Major Order".to_string());
        lines.push(String::new());
    } else {
        for (order, etas) in orders {
            lines.push(order.headline().to_string());
            lines.push(strip_tags(order.brief().unwrap_or("N/A")));
            if let Some(reward) = &order.setting.reward {
                lines.push(format!("Reward: {} {}", reward.amount, reward.kind_name()));
            }
            lines.push(format!("{} remaining", deadline_hm(order)));
            for task in order.task_progress() {
                lines.push(format!(
                    "  {}: {} {}%",
                    task.label,
                    progress_bar(task.percent),
                    task.percent
                ));
            }
            for eta in etas {
                lines.push(format!("  {}: ~{}h ETA", eta.label, eta.eta_hours));
            }
            lines.push(String::new());
        }
    }

    lines.push(format!("{} players active", fmt_num(total_players)));
    if !campaigns.is_empty() {
        lines.push(format!("{} planets in combat", campaigns.len()));
        for view in campaigns.iter().take(3) {
            lines.push(format!("  - {}: {} players", view.name, fmt_num(view.players)));
        }
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::{OrderSetting, Reward, TaskSpec, PARAM_TARGET, TASK_MISSIONS};

    fn sample_order() -> Order {
        Order {
            id32: 1,
            progress: vec![250],
            expires_in: Some(7_200),
            setting: OrderSetting {
                override_title: "MAJOR ORDER".to_string(),
                override_brief: "<i=3>Liberate</i> the sector".to_string(),
                reward: Some(Reward { kind: 1, amount: 45 }),
                tasks: vec![TaskSpec {
                    kind: TASK_MISSIONS,
                    values: vec![1000],
                    value_types: vec![PARAM_TARGET],
                }],
                ..OrderSetting::default()
            },
        }
    }

    fn sample_eta() -> TaskEta {
        TaskEta {
            label: "Missions".to_string(),
            eta_hours: 1,
            rate_per_sec: 0.5,
            percent: 25.0,
        }
    }

    fn sample_campaigns() -> Vec<CampaignView> {
        vec![
            CampaignView {
                index: 9,
                name: "Planet #9".to_string(),
                players: 900,
                owner: 3,
                health: 100,
                race: 3,
            },
            CampaignView {
                index: 5,
                name: "Planet #5".to_string(),
                players: 100,
                owner: 2,
                health: 100,
                race: 2,
            },
        ]
    }

    #[test]
    fn test_status_report_contents() {
        let report = status_report(
            &[(sample_order(), vec![sample_eta()])],
            12_345,
            &[PlanetSummary {
                index: 5,
                name: "Planet #5".to_string(),
                health: 100,
                players: 700,
                progress: 40.0,
                has_campaign: true,
                owner: 2,
            }],
        );
        assert!(report.contains("MAJOR ORDER"));
        // markup stripped from the brief
        assert!(report.contains("Liberate the sector"));
        assert!(report.contains("Reward: 45 Medals"));
        assert!(report.contains("Deadline: 2h 0m"));
        assert!(report.contains("Missions"));
        // eta 1h fits within the 2h deadline
        assert!(report.contains("[on pace]"));
        assert!(report.contains("Active players: 12K"));
        assert!(report.contains("Planet #5: In combat"));
    }

    #[test]
    fn test_status_report_without_orders() {
        let report = status_report(&[], 0, &[]);
        assert!(report.contains("Major Order: none active"));
    }

    #[test]
    fn test_eta_report_behind_pace() {
        let mut order = sample_order();
        order.expires_in = Some(3_600); // 1h deadline
        let eta = TaskEta {
            eta_hours: 5,
            ..sample_eta()
        };
        let report = eta_report(&[(order, vec![eta])]);
        assert!(report.contains("[behind]"));
        assert!(report.contains("~5h ETA"));
    }

    #[test]
    fn test_eta_report_unavailable() {
        let report = eta_report(&[(sample_order(), vec![])]);
        assert!(report.contains("ETA not available yet"));
    }

    #[test]
    fn test_planets_report_truncates() {
        let many: Vec<CampaignView> = (0..20)
            .map(|i| CampaignView {
                index: i,
                name: format!("Planet #{}", i),
                players: 10,
                owner: 2,
                health: 0,
                race: 2,
            })
            .collect();
        let report = planets_report(&many);
        assert!(report.contains("Planets in combat (20):"));
        assert!(report.contains("... and 5 more planets"));
    }

    #[test]
    fn test_top_report_shares() {
        let report = top_report(&sample_campaigns(), 1_000);
        assert!(report.contains("1. Planet #9"));
        assert!(report.contains("(90.0%)"));
        assert!(report.contains("vs Automaton"));
    }

    #[test]
    fn test_daily_summary() {
        let report = daily_summary(&[(sample_order(), vec![sample_eta()])], 500, &sample_campaigns());
        assert!(report.contains("DAILY SUMMARY"));
        assert!(report.contains("2 planets in combat"));
        assert!(report.contains("~1h ETA"));
    }
}
