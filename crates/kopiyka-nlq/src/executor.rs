//! Deterministic intent execution over the ledger.
//!
//! The service resolves the user's accounts and time window, loads and
//! classifies rows, applies the intent-family and merchant/recipient/category
//! filters, and renders a short localized answer. Transfer questions that
//! name an unmapped recipient pause into a pending clarification; the user's
//! next plain message answers it.

use tracing::debug;

use kopiyka_analytics::{
    compare_yesterday_to_baseline, rows_from_ledger, BaselineFilter, TxRow,
};
use kopiyka_core::{TxKind, UserId, SECONDS_PER_DAY};
use kopiyka_store::{LedgerStore, UserStore};

use crate::memory::MemoryStore;
use crate::router::parse_intent;
use crate::types::{Intent, IntentName};

const DEFAULT_DAYS: i64 = 30;
const MAX_RECIPIENT_OPTIONS: usize = 7;
const BASELINE_LOOKBACK_DAYS: i64 = 28;

const MSG_UNSUPPORTED: &str = "Я можу відповідати лише на питання про твої витрати.";
const MSG_NO_TOKEN: &str = "Спочатку підключи банк через /connect.";
const MSG_NO_ACCOUNTS: &str = "Обери картки для аналізу через /accounts.";
const MSG_CANCELLED: &str = "Ок, скасував. Питання забуто.";

const CANCEL_WORDS: [&str; 4] = ["cancel", "скасувати", "відміна", "отмена"];

pub struct NlqService<'a> {
    pub users: &'a UserStore,
    pub ledger: &'a LedgerStore,
    pub memory: &'a MemoryStore,
}

impl NlqService<'_> {
    /// Entry point for plain chat text: answers a pending clarification if
    /// one exists, otherwise routes and executes.
    pub fn handle_text(&self, user: UserId, text: &str, now_ts: i64) -> String {
        if let Some((pending, options)) = self.memory.pending(user) {
            return self.complete_pending(user, &pending, &options, text, now_ts);
        }
        let intent = parse_intent(text, now_ts);
        debug!(user, ?intent.intent, "routed NLQ intent");
        self.execute(user, &intent, now_ts)
    }

    fn complete_pending(
        &self,
        user: UserId,
        pending: &Intent,
        options: &[String],
        answer: &str,
        now_ts: i64,
    ) -> String {
        let answer = answer.trim();
        if CANCEL_WORDS.contains(&answer.to_lowercase().as_str()) {
            self.memory.clear_pending(user);
            return MSG_CANCELLED.to_string();
        }

        // a number picks an option; anything else is a literal substring
        let value = match answer.parse::<usize>() {
            Ok(n) if n >= 1 && n <= options.len() => options[n - 1].clone(),
            _ => answer.to_string(),
        };

        if let Some(alias) = pending.recipient_alias.as_deref() {
            self.memory.save_recipient_alias(user, alias, &value);
        }
        self.memory.clear_pending(user);
        self.execute(user, pending, now_ts)
    }

    pub fn execute(&self, user: UserId, intent: &Intent, now_ts: i64) -> String {
        if intent.intent == IntentName::Unsupported {
            return MSG_UNSUPPORTED.to_string();
        }

        let Some(cfg) = self.users.load(user) else {
            return MSG_NO_TOKEN.to_string();
        };
        if cfg.mono_token.is_empty() {
            return MSG_NO_TOKEN.to_string();
        }
        if cfg.selected_account_ids.is_empty() {
            return MSG_NO_ACCOUNTS.to_string();
        }

        let days = intent.days.unwrap_or(DEFAULT_DAYS).clamp(1, 31);
        // explicit range wins over the day count
        let (ts_from, ts_to) = match (intent.start_ts, intent.end_ts) {
            (Some(from), Some(to)) => (from, to),
            _ => (now_ts - days * SECONDS_PER_DAY, now_ts),
        };

        if intent.intent == IntentName::CompareToBaseline {
            return self.answer_baseline(user, &cfg.selected_account_ids, intent, now_ts);
        }

        let records = self
            .ledger
            .load_range(user, &cfg.selected_account_ids, ts_from, ts_to);
        let rows = rows_from_ledger(&records);

        let merchant = intent
            .merchant_contains
            .as_deref()
            .and_then(|m| self.memory.resolve_merchant_alias(user, m));

        // transfer intents addressed to a person go through the alias table
        let mut recipient: Option<String> = None;
        if let Some(alias) = intent.recipient_alias.as_deref() {
            if intent.intent.is_transfer_out() {
                match self.memory.recipient_alias(user, alias) {
                    Some(value) => recipient = Some(value),
                    None => return self.ask_recipient(user, intent, alias, &rows),
                }
            }
        }

        let wanted_kind = match intent.intent {
            IntentName::SpendSum | IntentName::SpendCount => TxKind::Spend,
            IntentName::IncomeSum | IntentName::IncomeCount => TxKind::Income,
            IntentName::TransferOutSum | IntentName::TransferOutCount => TxKind::TransferOut,
            IntentName::TransferInSum | IntentName::TransferInCount => TxKind::TransferIn,
            IntentName::CompareToBaseline | IntentName::Unsupported => unreachable!(),
        };

        let filtered: Vec<&TxRow> = rows
            .iter()
            .filter(|r| r.kind == wanted_kind)
            .filter(|r| match merchant.as_deref() {
                Some(m) => r.description.to_lowercase().contains(m),
                None => true,
            })
            .filter(|r| match recipient.as_deref() {
                Some(v) => r.description.to_lowercase().contains(v),
                None => true,
            })
            .filter(|r| match intent.category.as_deref() {
                Some(cat) => {
                    kopiyka_analytics::category_from_mcc(r.mcc).unwrap_or("Інше") == cat
                }
                None => true,
            })
            .collect();

        let total_cents: i64 = filtered.iter().map(|r| r.amount.abs()).sum();
        let count = filtered.len();

        let prefix = period_prefix(intent, days);
        let target = filter_phrase(intent, merchant.as_deref(), recipient.as_deref());
        let uah = format!("{:.2}", total_cents as f64 / 100.0);

        match intent.intent {
            IntentName::SpendSum => format!("{prefix} ти витратив{target} {uah} грн."),
            IntentName::SpendCount => format!("{prefix} було {count} витрат{target}."),
            IntentName::IncomeSum => format!("{prefix} надійшло {uah} грн."),
            IntentName::IncomeCount => format!("{prefix} було {count} поповнень."),
            IntentName::TransferOutSum => format!("{prefix} ти переказав{target} {uah} грн."),
            IntentName::TransferOutCount => {
                format!("{prefix} було {count} вихідних переказів{target}.")
            }
            IntentName::TransferInSum => {
                format!("{prefix} надійшло вхідних переказів на {uah} грн.")
            }
            IntentName::TransferInCount => format!("{prefix} було {count} вхідних переказів."),
            _ => unreachable!(),
        }
    }

    fn answer_baseline(
        &self,
        user: UserId,
        accounts: &[String],
        intent: &Intent,
        now_ts: i64,
    ) -> String {
        let filter = if let Some(m) = intent.merchant_contains.as_deref() {
            match self.memory.resolve_merchant_alias(user, m) {
                Some(resolved) => BaselineFilter::Merchant(resolved),
                None => return MSG_UNSUPPORTED.to_string(),
            }
        } else if let Some(cat) = intent.category.as_deref() {
            BaselineFilter::Category(cat.to_string())
        } else {
            return "Уточни, будь ласка, мерчанта або категорію для порівняння.".to_string();
        };

        let hist_from = now_ts - (BASELINE_LOOKBACK_DAYS + 2) * SECONDS_PER_DAY;
        let records = self.ledger.load_range(user, accounts, hist_from, now_ts);
        let rows = rows_from_ledger(&records);

        let label = match &filter {
            BaselineFilter::Merchant(m) => m.clone(),
            BaselineFilter::Category(c) => c.clone(),
        };
        let r = compare_yesterday_to_baseline(&rows, now_ts, &filter, BASELINE_LOOKBACK_DAYS);

        let yesterday = format!("{:.2}", r.yesterday_cents as f64 / 100.0);
        let baseline = format!("{:.2}", r.baseline_median_cents as f64 / 100.0);
        let delta_uah = format!("{:.2}", (r.delta_cents.abs()) as f64 / 100.0);
        let direction = if r.delta_cents >= 0 { "більше" } else { "менше" };

        format!(
            "Вчора на «{label}»: {yesterday} грн. Зазвичай за день: {baseline} грн. \
             Це на {delta_uah} грн {direction} за звичний рівень."
        )
    }

    /// No mapping for the recipient: collect the biggest outgoing-transfer
    /// descriptions from the current window as options and park the intent.
    fn ask_recipient(
        &self,
        user: UserId,
        intent: &Intent,
        alias: &str,
        rows: &[TxRow],
    ) -> String {
        let mut by_description: Vec<(String, i64)> = Vec::new();
        for row in rows {
            if row.kind != TxKind::TransferOut || row.description.is_empty() {
                continue;
            }
            match by_description.iter_mut().find(|(d, _)| *d == row.description) {
                Some((_, total)) => *total += row.amount.abs(),
                None => by_description.push((row.description.clone(), row.amount.abs())),
            }
        }
        by_description.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

        let options: Vec<String> = by_description
            .into_iter()
            .take(MAX_RECIPIENT_OPTIONS)
            .map(|(d, _)| d)
            .collect();

        self.memory.set_pending(user, intent, "recipient", options.clone());

        let mut lines = vec![format!("Кого саме ти маєш на увазі під «{alias}»?")];
        for (i, option) in options.iter().enumerate() {
            lines.push(format!("{}) {option}", i + 1));
        }
        lines.push("Напиши номер зі списку або текст для пошуку (або «скасувати»).".to_string());
        lines.join("\n")
    }
}

fn period_prefix(intent: &Intent, days: i64) -> String {
    match intent.period_label.as_deref() {
        Some("вчора") => "Вчора".to_string(),
        Some("сьогодні") => "Сьогодні".to_string(),
        Some(label) => format!("За період «{label}»"),
        None => format!("За останні {days} днів"),
    }
}

fn filter_phrase(intent: &Intent, merchant: Option<&str>, recipient: Option<&str>) -> String {
    if let Some(m) = merchant {
        format!(" на «{m}»")
    } else if let Some(r) = recipient {
        format!(" ({r})")
    } else if let Some(c) = intent.category.as_deref() {
        format!(" на «{c}»")
    } else {
        String::new()
    }
}
