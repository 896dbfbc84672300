//! Period phrase parsing.
//!
//! Recognizes: today / yesterday tokens, "last N days" variants, last week,
//! last (calendar) month, month names in Ukrainian/Russian/English with an
//! optional 4-digit year, and `YYYY-MM` / `YYYY.MM`. All boundaries are UTC
//! days; month ranges span the calendar month.

use chrono::{Datelike, TimeZone, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

use kopiyka_core::{day_floor, SECONDS_PER_DAY};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedPeriod {
    pub start_ts: i64,
    pub end_ts: i64,
    /// Human token for the answer text ("вчора", "січень 2026", …).
    pub label: String,
}

const MONTHS: [(&str, u32); 37] = [
    ("січень", 1),
    ("сiчень", 1),
    ("январь", 1),
    ("january", 1),
    ("лютий", 2),
    ("февраль", 2),
    ("february", 2),
    ("березень", 3),
    ("март", 3),
    ("march", 3),
    ("квітень", 4),
    ("апрель", 4),
    ("april", 4),
    ("травень", 5),
    ("май", 5),
    ("may", 5),
    ("червень", 6),
    ("июнь", 6),
    ("june", 6),
    ("липень", 7),
    ("июль", 7),
    ("july", 7),
    ("серпень", 8),
    ("август", 8),
    ("august", 8),
    ("вересень", 9),
    ("сентябрь", 9),
    ("september", 9),
    ("жовтень", 10),
    ("октябрь", 10),
    ("october", 10),
    ("листопад", 11),
    ("ноябрь", 11),
    ("november", 11),
    ("грудень", 12),
    ("декабрь", 12),
    ("december", 12),
];

static TODAY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(сьогодні|сегодня|today)\b").unwrap());
static YESTERDAY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(вчора|вчера|yesterday)\b").unwrap());
static LAST_N_DAYS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(за\s+останні\s+|за\s+последние\s+|last\s+)(\d{1,3})\s*(дн(і|ів)?|дней|days)\b")
        .unwrap()
});
static LAST_WEEK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(за\s+тиждень|за\s+неделю|last\s+week)\b").unwrap());
static LAST_MONTH_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(за\s+минулий\s+місяць|за\s+прошлый\s+месяц|last\s+month)\b").unwrap()
});
static NUMERIC_MONTH_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\bза\s+(\d{4})[-./](\d{1,2})\b").unwrap());
static MONTH_NAME_RES: Lazy<Vec<(Regex, &'static str, u32)>> = Lazy::new(|| {
    MONTHS
        .iter()
        .map(|&(name, month)| {
            let re = Regex::new(&format!(r"\bза\s+{name}(?:\s+(\d{{4}}))?\b")).unwrap();
            (re, name, month)
        })
        .collect()
});

fn month_range_utc(year: i32, month: u32) -> (i64, i64) {
    let start = Utc.with_ymd_and_hms(year, month, 1, 0, 0, 0).unwrap();
    let (ny, nm) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    let end = Utc.with_ymd_and_hms(ny, nm, 1, 0, 0, 0).unwrap();
    (start.timestamp(), end.timestamp())
}

pub fn parse_period_range(text: &str, now_ts: i64) -> Option<ParsedPeriod> {
    let s = text.trim().to_lowercase();
    if s.is_empty() {
        return None;
    }

    if TODAY_RE.is_match(&s) {
        return Some(ParsedPeriod {
            start_ts: day_floor(now_ts),
            end_ts: now_ts,
            label: "сьогодні".to_string(),
        });
    }

    if YESTERDAY_RE.is_match(&s) {
        let today0 = day_floor(now_ts);
        return Some(ParsedPeriod {
            start_ts: today0 - SECONDS_PER_DAY,
            end_ts: today0,
            label: "вчора".to_string(),
        });
    }

    if let Some(caps) = LAST_N_DAYS_RE.captures(&s) {
        let n: i64 = caps[2].parse().ok()?;
        return Some(ParsedPeriod {
            start_ts: now_ts - n * SECONDS_PER_DAY,
            end_ts: now_ts,
            label: format!("останні {n} днів"),
        });
    }

    if LAST_WEEK_RE.is_match(&s) {
        return Some(ParsedPeriod {
            start_ts: now_ts - 7 * SECONDS_PER_DAY,
            end_ts: now_ts,
            label: "останній тиждень".to_string(),
        });
    }

    if LAST_MONTH_RE.is_match(&s) {
        let now = Utc.timestamp_opt(now_ts, 0).single()?;
        let (y, m) = if now.month() == 1 {
            (now.year() - 1, 12)
        } else {
            (now.year(), now.month() - 1)
        };
        let (start_ts, end_ts) = month_range_utc(y, m);
        return Some(ParsedPeriod {
            start_ts,
            end_ts,
            label: "минулий місяць".to_string(),
        });
    }

    for &(ref re, name, month) in MONTH_NAME_RES.iter() {
        if let Some(caps) = re.captures(&s) {
            let now = Utc.timestamp_opt(now_ts, 0).single()?;
            let year = caps
                .get(1)
                .and_then(|y| y.as_str().parse::<i32>().ok())
                .unwrap_or_else(|| now.year());
            let (start_ts, end_ts) = month_range_utc(year, month);
            let label = match caps.get(1) {
                Some(y) => format!("{name} {}", y.as_str()),
                None => name.to_string(),
            };
            return Some(ParsedPeriod {
                start_ts,
                end_ts,
                label,
            });
        }
    }

    if let Some(caps) = NUMERIC_MONTH_RE.captures(&s) {
        let year: i32 = caps[1].parse().ok()?;
        let month: u32 = caps[2].parse().ok()?;
        if (1..=12).contains(&month) {
            let (start_ts, end_ts) = month_range_utc(year, month);
            return Some(ParsedPeriod {
                start_ts,
                end_ts,
                label: format!("{year}-{month:02}"),
            });
        }
    }

    None
}
