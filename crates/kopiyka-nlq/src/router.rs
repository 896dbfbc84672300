//! Rule-based intent routing.
//!
//! An ordered discriminator over keyword families: income, outgoing
//! transfers, incoming transfers, baseline comparison, then spend count /
//! sum as the catch-all. Slots (days, explicit range, merchant phrase,
//! recipient alias, category) are extracted independently of the family.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::periods::parse_period_range;
use crate::types::{Intent, IntentName};

static DAYS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(\d{1,3})\s*(?:дн|днів|дня|дней|days)\b").unwrap());
static INCOME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(поповнен\w*|зачислен\w*|пополнен\w*|top\s*up|income|депозит)\b").unwrap()
});
static TRANSFER_OUT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(скинув|скинула|скинути|переказ(ав|ала|ати)?|перев(ів|ела)|відправ(ив|ила|ити)?|send|sent)\b",
    )
    .unwrap()
});
static TRANSFER_IN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(отрим(ав|ала|ати)?|прийшл(и|о)|надійшл(и|о)|вхідн\w*|received|got)\b")
        .unwrap()
});
static COUNT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(скільки\s+разів|кількість|count|how\s+many)\b").unwrap());
static RECIPIENT_ALIAS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(дівчин(і|е|у|а)|мам(і|е|у|а)|тат(ові|у|а)|оренд(а|і|у)|квартир(а|і|у))\b")
        .unwrap()
});
static COMPARE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(на\s+скільки|скільки\s+більше|скільки\s+менше|порівнян\w*|compare)\b")
        .unwrap()
});
static BASELINE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(зазвич(ай|но)|звичайн(о|ий)|usual|baseline)\b").unwrap());

static MERCHANT_HEAD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bна\s+").unwrap());
static NUMERIC_ONLY_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+\s*%?$").unwrap());

/// Category keyword table. Substring match over the lowered text; values are
/// the named categories from the MCC table.
const CATEGORY_KEYWORDS: [(&str, &str); 11] = [
    ("бар", "Кафе/Ресторани"),
    ("кав", "Кафе/Ресторани"),
    ("кофе", "Кафе/Ресторани"),
    ("кафе", "Кафе/Ресторани"),
    ("ресторан", "Кафе/Ресторани"),
    ("таксі", "Транспорт"),
    ("такси", "Транспорт"),
    ("транспорт", "Транспорт"),
    ("аптек", "Аптеки/Здоров'я"),
    ("ліки", "Аптеки/Здоров'я"),
    ("продукт", "Маркет/Побут"),
];

const MAX_DAYS: i64 = 31;

fn clamp_days(days: i64) -> i64 {
    days.clamp(1, MAX_DAYS)
}

/// The last `на <phrase>` segment, truncated at period connectors and
/// comparatives, stripped of punctuation. Rejected when empty or purely
/// numeric.
fn extract_merchant(t: &str) -> Option<String> {
    let start = MERCHANT_HEAD_RE.find_iter(t).last()?.end();
    let mut phrase = &t[start..];

    for connector in [" за ", " ніж ", " than "] {
        if let Some(pos) = phrase.find(connector) {
            phrase = &phrase[..pos];
        }
    }

    let candidate = phrase
        .trim_matches(|c: char| c.is_whitespace() || " .,!?:;\"'()[]{}".contains(c))
        .trim()
        .to_string();

    if candidate.is_empty() || NUMERIC_ONLY_RE.is_match(&candidate) {
        return None;
    }
    Some(candidate)
}

fn detect_category(t: &str) -> Option<String> {
    CATEGORY_KEYWORDS
        .iter()
        .find(|(kw, _)| t.contains(kw))
        .map(|(_, cat)| cat.to_string())
}

pub fn parse_intent(user_text: &str, now_ts: i64) -> Intent {
    let text = user_text.trim();
    if text.is_empty() {
        return Intent::default();
    }
    let t = text.to_lowercase();

    // ── Period slots ─────────────────────────────────────────────────────────
    let parsed_period = parse_period_range(&t, now_ts);
    let (start_ts, end_ts, period_label) = match &parsed_period {
        Some(p) => (Some(p.start_ts), Some(p.end_ts), Some(p.label.clone())),
        None => (None, None, None),
    };

    let mut days: Option<i64> = DAYS_RE
        .captures(&t)
        .and_then(|c| c[1].parse::<i64>().ok());
    if days.is_none() {
        if t.contains("тиж") || t.contains("week") {
            days = Some(7);
        } else if t.contains("місяц") || t.contains("месяц") || t.contains("month") {
            days = Some(30);
        } else if t.contains("сьогодні") || t.contains("сегодня") || t.contains("today") {
            days = Some(1);
        } else if t.contains("вчора") || t.contains("вчера") || t.contains("yesterday") {
            days = Some(1);
        }
    }
    let days = days.map(clamp_days);

    // ── Family discriminator ─────────────────────────────────────────────────
    let is_count =
        COUNT_RE.is_match(&t) || (t.contains("скільки") && t.contains("було"));
    let want_compare = COMPARE_RE.is_match(&t) && BASELINE_RE.is_match(&t);

    let mut intent_name: Option<IntentName> = None;
    if INCOME_RE.is_match(&t) {
        intent_name = Some(if is_count {
            IntentName::IncomeCount
        } else {
            IntentName::IncomeSum
        });
    } else if TRANSFER_OUT_RE.is_match(&t) {
        intent_name = Some(if is_count {
            IntentName::TransferOutCount
        } else {
            IntentName::TransferOutSum
        });
    } else if TRANSFER_IN_RE.is_match(&t) {
        intent_name = Some(if is_count {
            IntentName::TransferInCount
        } else {
            IntentName::TransferInSum
        });
    }

    let intent_name = intent_name.unwrap_or_else(|| {
        let count_markers = [
            "транзакц",
            "операц",
            "покуп",
            "скільки було витрат",
            "кількість витрат",
            "скільки витрат було",
        ];
        if want_compare {
            IntentName::CompareToBaseline
        } else if count_markers.iter().any(|m| t.contains(m)) || is_count {
            IntentName::SpendCount
        } else if t.contains("скільки")
            || t.contains("витратив")
            || t.contains("витрати")
            || t.contains("spent")
        {
            IntentName::SpendSum
        } else {
            IntentName::Unsupported
        }
    });

    // ── Merchant / recipient / category slots ────────────────────────────────
    let mut merchant = extract_merchant(&t);
    let category = merchant.as_deref().and_then(detect_category).or_else(|| {
        merchant.is_none().then(|| detect_category(&t)).flatten()
    });
    if category.is_some() {
        merchant = None;
    }

    let recipient_alias = RECIPIENT_ALIAS_RE
        .captures(&t)
        .map(|c| c[1].to_lowercase());

    Intent {
        intent: intent_name,
        days,
        start_ts,
        end_ts,
        merchant_contains: merchant,
        recipient_alias,
        period_label,
        category,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kopiyka_core::SECONDS_PER_DAY;

    const NOW: i64 = 20_000 * SECONDS_PER_DAY + 7_200;

    #[test]
    fn sum_with_days_and_merchant() {
        let i = parse_intent("Скільки я за останні 15 днів витратив на Макдональдс?", NOW);
        assert_eq!(i.intent, IntentName::SpendSum);
        assert_eq!(i.days, Some(15));
        assert!(i.merchant_contains.unwrap().contains("макдональдс"));
    }

    #[test]
    fn count_week() {
        let i = parse_intent("Скільки транзакцій за тиждень?", NOW);
        assert_eq!(i.intent, IntentName::SpendCount);
        assert_eq!(i.days, Some(7));
    }

    #[test]
    fn month_defaults_to_sum() {
        let i = parse_intent("Витрати за місяць", NOW);
        assert_eq!(i.intent, IntentName::SpendSum);
        assert_eq!(i.days, Some(30));
    }

    #[test]
    fn days_are_clamped_to_31() {
        let i = parse_intent("Скільки я витратив за 999 днів на щось", NOW);
        assert_eq!(i.intent, IntentName::SpendSum);
        assert_eq!(i.days, Some(31));
    }

    #[test]
    fn yesterday_income_count() {
        let i = parse_intent("Скільки вчора було поповнень?", NOW);
        assert_eq!(i.intent, IntentName::IncomeCount);
        assert_eq!(i.days, Some(1));
        assert_eq!(i.period_label.as_deref(), Some("вчора"));
    }

    #[test]
    fn yesterday_transfer_in_count() {
        let i = parse_intent("Скільки вчора було вхідних переказів?", NOW);
        assert_eq!(i.intent, IntentName::TransferInCount);
        assert_eq!(i.days, Some(1));
        assert_eq!(i.period_label.as_deref(), Some("вчора"));
    }

    #[test]
    fn category_bars_yesterday() {
        let i = parse_intent("Скільки вчора витратив на бари?", NOW);
        assert_eq!(i.intent, IntentName::SpendSum);
        assert_eq!(i.days, Some(1));
        assert_eq!(i.period_label.as_deref(), Some("вчора"));
        assert_eq!(i.category.as_deref(), Some("Кафе/Ресторани"));
        assert_eq!(i.merchant_contains, None);
    }

    #[test]
    fn merchant_mak_last_5_days() {
        let i = parse_intent("Скільки я за останні 5 днів витратив на мак?", NOW);
        assert_eq!(i.intent, IntentName::SpendSum);
        assert_eq!(i.days, Some(5));
        assert_eq!(i.merchant_contains.as_deref(), Some("мак"));
    }

    #[test]
    fn category_coffee_last_week() {
        let i = parse_intent("Скільки за тиждень витратив на каву?", NOW);
        assert_eq!(i.intent, IntentName::SpendSum);
        assert_eq!(i.days, Some(7));
        assert_eq!(i.category.as_deref(), Some("Кафе/Ресторани"));
    }

    #[test]
    fn category_taxi_yesterday() {
        let i = parse_intent("Скільки вчора витратив на таксі?", NOW);
        assert_eq!(i.intent, IntentName::SpendSum);
        assert_eq!(i.days, Some(1));
        assert_eq!(i.category.as_deref(), Some("Транспорт"));
    }

    #[test]
    fn compare_to_baseline_category() {
        let i = parse_intent("На скільки більше вчора витратив на бари ніж зазвичай?", NOW);
        assert_eq!(i.intent, IntentName::CompareToBaseline);
        assert_eq!(i.days, Some(1));
        assert_eq!(i.category.as_deref(), Some("Кафе/Ресторани"));
    }

    #[test]
    fn compare_to_baseline_merchant() {
        let i = parse_intent("На скільки більше вчора витратив на мак ніж зазвичай?", NOW);
        assert_eq!(i.intent, IntentName::CompareToBaseline);
        assert_eq!(i.days, Some(1));
        assert_eq!(i.merchant_contains.as_deref(), Some("мак"));
    }

    #[test]
    fn recipient_alias_transfer() {
        let i = parse_intent("Скільки я переказав дівчині за місяць?", NOW);
        assert_eq!(i.intent, IntentName::TransferOutSum);
        assert_eq!(i.recipient_alias.as_deref(), Some("дівчині"));
    }

    #[test]
    fn unsupported_text() {
        let i = parse_intent("Привіт, як справи?", NOW);
        assert_eq!(i.intent, IntentName::Unsupported);
        assert_eq!(parse_intent("", NOW).intent, IntentName::Unsupported);
    }

    #[test]
    fn merchant_rejects_pure_numbers() {
        let i = parse_intent("Скільки я витратив на 50%", NOW);
        assert_eq!(i.merchant_contains, None);
    }

    #[test]
    fn explicit_period_slots_are_set() {
        let i = parse_intent("Витрати за січень 2026", NOW);
        assert_eq!(i.intent, IntentName::SpendSum);
        assert!(i.start_ts.is_some() && i.end_ts.is_some());
        assert_eq!(i.period_label.as_deref(), Some("січень 2026"));
    }
}
