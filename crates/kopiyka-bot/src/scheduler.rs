//! Periodic jobs: interval refresh plus daily/weekly/monthly cron triggers.
//!
//! Users are swept sequentially within one firing — deliberate: it bounds
//! upstream concurrency and keeps the reasoning simple. One user's failure is
//! logged and the sweep continues. Test mode compresses every trigger to
//! minutes for development.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use chrono_tz::Tz;
use cron::Schedule;
use rand::Rng;
use tracing::{info, warn};

use kopiyka_core::Period;

use crate::app::AppState;
use crate::templates;

const SHALLOW_REFRESH_DAYS: i64 = 2;
const DAILY_REFRESH_DAYS: i64 = 8;
const WEEKLY_REFRESH_DAYS: i64 = 8;
const MONTHLY_REFRESH_DAYS: i64 = 32;

#[derive(Debug, Clone)]
pub struct ScheduleConfig {
    pub test_mode: bool,
    pub tz: Tz,
    pub refresh_minutes: u64,
    pub daily_refresh_cron: String,
    pub weekly_cron: String,
    pub monthly_cron: String,
}

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

impl ScheduleConfig {
    pub fn from_env() -> Self {
        let test_mode = std::env::var("SCHED_TEST_MODE").map(|v| v.trim() == "1").unwrap_or(false);

        let tz_name = env_or("SCHED_TZ", "Europe/Kyiv");
        let tz: Tz = tz_name.parse().unwrap_or_else(|_| {
            warn!(tz = %tz_name, "unknown SCHED_TZ, falling back to UTC");
            chrono_tz::UTC
        });

        let mut cfg = Self {
            test_mode,
            tz,
            refresh_minutes: env_or("SCHED_REFRESH_MINUTES", "120").parse().unwrap_or(120),
            daily_refresh_cron: env_or("SCHED_DAILY_REFRESH_CRON", "0 6 * * *"),
            weekly_cron: env_or("SCHED_WEEKLY_CRON", "0 9 * * 1"),
            monthly_cron: env_or("SCHED_MONTHLY_CRON", "0 9 1 * *"),
        };

        if test_mode {
            cfg.refresh_minutes = 1;
            cfg.daily_refresh_cron = "*/2 * * * *".to_string();
            cfg.weekly_cron = "*/2 * * * *".to_string();
            cfg.monthly_cron = "*/3 * * * *".to_string();
        }
        cfg
    }
}

/// Parse a standard 5-field cron expression (minute hour dom month dow,
/// dow 0/7 = Sunday). The cron crate wants a seconds field and counts
/// Sunday as 1, so prepend seconds and shift plain numeric dow tokens.
pub fn parse_cron_5(expr: &str) -> Result<Schedule, cron::error::Error> {
    let fields: Vec<&str> = expr.split_whitespace().collect();
    let converted = if fields.len() == 5 {
        let dow = fields[4];
        let dow = if dow.chars().all(|c| c.is_ascii_digit() || c == ',' || c == '-') {
            dow.split(',')
                .map(|part| {
                    part.split('-')
                        .map(|d| match d.parse::<u8>() {
                            Ok(n) => ((n % 7) + 1).to_string(),
                            Err(_) => d.to_string(),
                        })
                        .collect::<Vec<_>>()
                        .join("-")
                })
                .collect::<Vec<_>>()
                .join(",")
        } else {
            dow.to_string()
        };
        format!(
            "0 {} {} {} {} {}",
            fields[0], fields[1], fields[2], fields[3], dow
        )
    } else {
        expr.to_string()
    };
    Schedule::from_str(&converted)
}

fn jitter_seconds() -> u64 {
    let min: u64 = env_or("AUTO_REFRESH_JITTER_MIN", "0").parse().unwrap_or(0);
    let max: u64 = env_or("AUTO_REFRESH_JITTER_MAX", "0").parse().unwrap_or(0);
    if max <= min {
        return min;
    }
    rand::thread_rng().gen_range(min..=max)
}

/// Sweep all users: eligibility-gated sync + report recompute, optionally
/// posting the report for `post` afterwards.
async fn sweep(state: &Arc<AppState>, days_back: i64, post: Option<Period>) {
    let mut scanned = 0usize;
    let mut refreshed = 0usize;

    for cfg in state.users.iter_all() {
        scanned += 1;
        let user = cfg.telegram_user_id;

        let delay = jitter_seconds();
        if delay > 0 {
            tokio::time::sleep(Duration::from_secs(delay)).await;
        }

        match state.refresh_user(&cfg, days_back).await {
            Ok(false) => continue,
            Ok(true) => refreshed += 1,
            Err(e) => {
                warn!(user, error = %e, "scheduled refresh failed");
                continue;
            }
        }

        if let (Some(period), Some(chat_id)) = (post, cfg.chat_id) {
            let Some(stored) = state.reports.load(user, period) else {
                continue;
            };
            match serde_json::from_value(stored.facts) {
                Ok(facts) => {
                    let text = templates::render_report(period.as_str(), &facts, None);
                    state.telegram.send_quiet(chat_id, &text).await;
                }
                Err(e) => warn!(user, error = %e, "cached facts unreadable, skipping post"),
            }
        }
    }

    info!(scanned, refreshed, days_back, "scheduler sweep done");
}

async fn run_cron_job(state: Arc<AppState>, expr: String, tz: Tz, days_back: i64, post: Option<Period>) {
    let schedule = match parse_cron_5(&expr) {
        Ok(s) => s,
        Err(e) => {
            warn!(cron = %expr, error = %e, "invalid cron expression, job disabled");
            return;
        }
    };

    loop {
        let now = Utc::now().with_timezone(&tz);
        let Some(next) = schedule.after(&now).next() else {
            return;
        };
        let wait = (next - now).to_std().unwrap_or_default();
        tokio::time::sleep(wait).await;
        sweep(&state, days_back, post).await;
    }
}

pub fn spawn_jobs(state: Arc<AppState>) {
    let cfg = ScheduleConfig::from_env();
    info!(
        test_mode = cfg.test_mode,
        refresh_minutes = cfg.refresh_minutes,
        daily = %cfg.daily_refresh_cron,
        weekly = %cfg.weekly_cron,
        monthly = %cfg.monthly_cron,
        tz = %cfg.tz,
        "scheduler starting"
    );

    {
        let state = Arc::clone(&state);
        let minutes = cfg.refresh_minutes.max(1);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(minutes * 60));
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // the first tick fires immediately; skip it so startup stays quiet
            ticker.tick().await;
            loop {
                ticker.tick().await;
                sweep(&state, SHALLOW_REFRESH_DAYS, None).await;
            }
        });
    }

    tokio::spawn(run_cron_job(
        Arc::clone(&state),
        cfg.daily_refresh_cron.clone(),
        cfg.tz,
        DAILY_REFRESH_DAYS,
        None,
    ));
    tokio::spawn(run_cron_job(
        Arc::clone(&state),
        cfg.weekly_cron.clone(),
        cfg.tz,
        WEEKLY_REFRESH_DAYS,
        Some(Period::Week),
    ));
    tokio::spawn(run_cron_job(
        state,
        cfg.monthly_cron.clone(),
        cfg.tz,
        MONTHLY_REFRESH_DAYS,
        Some(Period::Month),
    ));
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, TimeZone, Timelike, Weekday};

    #[test]
    fn five_field_cron_parses() {
        assert!(parse_cron_5("0 9 * * 1").is_ok());
        assert!(parse_cron_5("0 9 1 * *").is_ok());
        assert!(parse_cron_5("*/2 * * * *").is_ok());
        assert!(parse_cron_5("not a cron").is_err());
    }

    #[test]
    fn weekly_default_fires_on_monday() {
        let schedule = parse_cron_5("0 9 * * 1").unwrap();
        let start = chrono_tz::UTC.with_ymd_and_hms(2026, 8, 1, 0, 0, 0).unwrap();
        let next = schedule.after(&start).next().unwrap();
        assert_eq!(next.weekday(), Weekday::Mon);
        assert_eq!(next.hour(), 9);
    }

    #[test]
    fn monthly_default_fires_on_the_first() {
        let schedule = parse_cron_5("0 9 1 * *").unwrap();
        let start = chrono_tz::UTC.with_ymd_and_hms(2026, 8, 2, 0, 0, 0).unwrap();
        let next = schedule.after(&start).next().unwrap();
        assert_eq!(next.day(), 1);
        assert_eq!(next.hour(), 9);
    }

    #[test]
    fn dow_ranges_are_shifted() {
        // standard 1-5 (Mon-Fri) must not include Sunday
        let schedule = parse_cron_5("0 9 * * 1-5").unwrap();
        let start = chrono_tz::UTC.with_ymd_and_hms(2026, 8, 1, 10, 0, 0).unwrap(); // Saturday
        let next = schedule.after(&start).next().unwrap();
        assert_eq!(next.weekday(), Weekday::Mon);
    }
}
