//! Chat command dispatch.
//!
//! Long-running work (history bootstrap, refresh) answers immediately and
//! finishes in a background task guarded by the per-user lock. Everything a
//! user sees here is a short advisory message — errors stay in the logs.

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use tracing::{error, warn};

use kopiyka_analytics::Facts;
use kopiyka_core::{now_ts, KopiykaError, Period, UserId};
use kopiyka_store::UserUpdate;

use crate::app::AppState;
use crate::settings::mask_secret;
use crate::telegram::Message;
use crate::templates;

pub async fn handle_message(state: Arc<AppState>, message: Message) {
    let Some(user) = message.from.as_ref().map(|u| u.id) else {
        return;
    };
    let chat_id = message.chat.id;
    let Some(text) = message.text.clone() else {
        return;
    };

    let reply = dispatch(&state, user, chat_id, text.trim()).await;
    if let Some(reply) = reply {
        state.telegram.send_quiet(chat_id, &reply).await;
    }
}

/// Returns the immediate reply, or `None` when the handler already answered.
async fn dispatch(state: &Arc<AppState>, user: UserId, chat_id: i64, text: &str) -> Option<String> {
    if !text.starts_with('/') {
        let answer = state.nlq().handle_text(user, text, now_ts());
        return Some(answer);
    }

    let mut parts = text[1..].split_whitespace();
    let command = parts.next().unwrap_or("");
    // commands in groups arrive as /cmd@botname
    let command = command.split('@').next().unwrap_or("").to_lowercase();
    let args: Vec<&str> = parts.collect();

    match command.as_str() {
        "start" => {
            remember_chat(state, user, chat_id);
            Some(templates::start_message())
        }
        "help" => Some(templates::help_message()),
        "connect" => Some(cmd_connect(state, user, chat_id, &args)),
        "accounts" => Some(cmd_accounts(state, user, &args).await),
        "history" => cmd_history(state, user, chat_id, &args),
        "refresh" => cmd_refresh(state, user, chat_id, &args),
        "status" => Some(cmd_status(state, user)),
        "autojobs" => Some(cmd_autojobs(state, user, &args)),
        "today" => Some(cmd_report(state, user, Period::Today, &args).await),
        "week" => Some(cmd_report(state, user, Period::Week, &args).await),
        "month" => Some(cmd_report(state, user, Period::Month, &args).await),
        _ => Some("Невідома команда. Дивись /help.".to_string()),
    }
}

fn remember_chat(state: &AppState, user: UserId, chat_id: i64) {
    if let Err(e) = state.users.save(
        user,
        UserUpdate {
            chat_id: Some(chat_id),
            ..Default::default()
        },
    ) {
        error!(user, error = %e, "failed to persist chat id");
    }
}

fn cmd_connect(state: &AppState, user: UserId, chat_id: i64, args: &[&str]) -> String {
    let Some(token) = args.first().filter(|t| !t.is_empty()) else {
        return [
            "🔐 Підключення банку",
            "",
            "1) Отримай персональний API-токен у свого банку",
            "2) Надішли його так: /connect YOUR_TOKEN",
            "",
            "Токен зберігається локально в зашифрованому вигляді.",
        ]
        .join("\n");
    };

    match state.users.save(
        user,
        UserUpdate {
            mono_token: Some(token.to_string()),
            selected_account_ids: Some(Vec::new()),
            chat_id: Some(chat_id),
            ..Default::default()
        },
    ) {
        Ok(()) => [
            "✅ Токен збережено.",
            "",
            "Далі: /accounts — вибір карток,",
            "потім /history 30 або /history 90 — завантаження історії.",
        ]
        .join("\n"),
        Err(e) => {
            error!(user, error = %e, "failed to save token");
            "Не вдалося зберегти токен, спробуй ще раз.".to_string()
        }
    }
}

async fn cmd_accounts(state: &Arc<AppState>, user: UserId, args: &[&str]) -> String {
    let Some(cfg) = state.users.load(user) else {
        return "🔐 Спочатку підключи банк: /connect <token>".to_string();
    };
    if cfg.mono_token.is_empty() {
        return "🔐 Спочатку підключи банк: /connect <token>".to_string();
    }

    let client = match state.bank_client(&cfg.mono_token) {
        Ok(c) => c,
        Err(e) => {
            error!(user, error = %e, "failed to build bank client");
            return "Внутрішня помилка, спробуй пізніше.".to_string();
        }
    };
    let info = match client.client_info().await {
        Ok(info) => info,
        Err(e) => return upstream_advice(user, e),
    };

    if info.accounts.is_empty() {
        return "У банку не знайдено жодного рахунку.".to_string();
    }

    // `/accounts select 1,3` replaces the selection with the listed indices
    if args.first() == Some(&"select") {
        let picked: Vec<String> = args
            .get(1)
            .map(|s| s.split(','))
            .into_iter()
            .flatten()
            .filter_map(|idx| idx.trim().parse::<usize>().ok())
            .filter_map(|idx| info.accounts.get(idx.checked_sub(1)?))
            .map(|acc| acc.id.clone())
            .collect();

        if picked.is_empty() {
            return "Вкажи номери зі списку: /accounts select 1,3".to_string();
        }
        let count = picked.len();
        if let Err(e) = state.users.save(
            user,
            UserUpdate {
                selected_account_ids: Some(picked),
                ..Default::default()
            },
        ) {
            error!(user, error = %e, "failed to save account selection");
            return "Не вдалося зберегти вибір.".to_string();
        }
        return format!(
            "✅ Збережено, карток: {count}.\nТепер /history 30 або /history 90, щоб завантажити історію."
        );
    }

    let selected: std::collections::HashSet<&String> = cfg.selected_account_ids.iter().collect();
    let mut lines = vec![
        "🧾 Твої картки (✅ — враховуються у звітах):".to_string(),
        String::new(),
    ];
    for (i, acc) in info.accounts.iter().enumerate() {
        let mark = if selected.contains(&acc.id) { "✅" } else { "⬜" };
        lines.push(format!(
            "{} {}. {} ({})",
            mark,
            i + 1,
            acc.display_label(),
            acc.currency_code
        ));
    }
    lines.push(String::new());
    lines.push("Вибір: /accounts select 1,3".to_string());
    lines.join("\n")
}

fn parse_refresh_days(arg: Option<&&str>) -> Option<i64> {
    match arg.map(|s| s.to_lowercase()).as_deref() {
        None | Some("week") => Some(8),
        Some("today") => Some(2),
        Some("month") => Some(32),
        Some("all") => Some(90),
        _ => None,
    }
}

fn cmd_refresh(state: &Arc<AppState>, user: UserId, chat_id: i64, args: &[&str]) -> Option<String> {
    let Some(days_back) = parse_refresh_days(args.first()) else {
        return Some("Використання: /refresh today|week|month|all".to_string());
    };
    spawn_sync_job(state, user, chat_id, days_back)
}

fn cmd_history(state: &Arc<AppState>, user: UserId, chat_id: i64, args: &[&str]) -> Option<String> {
    let days_back = match args.first().copied() {
        Some("30") | None => 30,
        Some("90") => 90,
        _ => return Some("Використання: /history 30|90".to_string()),
    };
    spawn_sync_job(state, user, chat_id, days_back)
}

/// Shared body of /refresh and /history: validate config, acknowledge, then
/// sync + recompute in the background under the per-user lock.
fn spawn_sync_job(
    state: &Arc<AppState>,
    user: UserId,
    chat_id: i64,
    days_back: i64,
) -> Option<String> {
    let Some(cfg) = state.users.load(user) else {
        return Some("Спочатку підключи банк: /connect YOUR_TOKEN".to_string());
    };
    if cfg.mono_token.is_empty() {
        return Some("Спочатку підключи банк: /connect YOUR_TOKEN".to_string());
    }
    if cfg.selected_account_ids.is_empty() {
        return Some("Спочатку вибери картки для аналізу: /accounts".to_string());
    }

    let state = Arc::clone(state);
    tokio::spawn(async move {
        let lock = state.locks.for_user(user);
        let _guard = lock.lock().await;

        let result = state.sync_user(&cfg, days_back).await;
        let reply = match result {
            Ok(res) => {
                if let Err(e) = state.recompute_reports(user, &cfg.selected_account_ids) {
                    error!(user, error = %e, "report recompute failed");
                }
                format!(
                    "✅ Готово!\nКарток: {}\nЗапитів до API: {}\nДодано транзакцій: {}\n\nДивись: /today /week /month",
                    res.accounts, res.fetched_requests, res.appended
                )
            }
            Err(e) => upstream_advice(user, e),
        };
        state.telegram.send_quiet(chat_id, &reply).await;
    });

    Some(format!(
        "⏳ Запустив оновлення за ~{days_back} днів у фоні… Напишу, коли буде готово ✅"
    ))
}

fn upstream_advice(user: UserId, e: KopiykaError) -> String {
    warn!(user, error = %e, "upstream operation failed");
    match e {
        KopiykaError::Auth { .. } => {
            "❌ Банк відхилив токен. Перепідключись: /connect <новий токен>".to_string()
        }
        KopiykaError::RateLimited { retry_in_secs, .. } => format!(
            "⏳ Ліміт запитів до банку. Спробуй через ~{} с.",
            retry_in_secs.ceil() as i64
        ),
        KopiykaError::RetriesExhausted { .. } | KopiykaError::Transport(_) => {
            "❌ Банк зараз недоступний, спробуй пізніше.".to_string()
        }
        KopiykaError::MissingToken => "Спочатку підключи банк: /connect YOUR_TOKEN".to_string(),
        KopiykaError::NoAccountsSelected => {
            "Спочатку вибери картки для аналізу: /accounts".to_string()
        }
        _ => "❌ Помилка оновлення, спробуй пізніше.".to_string(),
    }
}

fn cmd_status(state: &AppState, user: UserId) -> String {
    let mut lines = vec!["Статус:".to_string()];

    match state.users.load(user) {
        None => {
            lines.push("🔐 Банк: не підключено".to_string());
            lines.push("Підключи: /connect <token>".to_string());
        }
        Some(cfg) => {
            lines.push(format!(
                "🔐 Банк: підключено ({})",
                mask_secret(Some(&cfg.mono_token))
            ));
            lines.push(format!("📌 Вибрані картки: {}", cfg.selected_account_ids.len()));
            lines.push(format!(
                "🤖 Автозвіти: {}",
                if cfg.autojobs_enabled { "ON" } else { "OFF" }
            ));
        }
    }

    lines.push(String::new());
    lines.push("Кеш звітів:".to_string());
    for period in [Period::Today, Period::Week, Period::Month] {
        match state.reports.load(user, period) {
            None => lines.push(format!("• {period}: немає (зроби /refresh {period})")),
            Some(stored) => {
                let when = Utc
                    .timestamp_opt(stored.generated_at as i64, 0)
                    .single()
                    .map(|dt| dt.format("%Y-%m-%d %H:%M UTC").to_string())
                    .unwrap_or_else(|| "?".to_string());
                lines.push(format!("• {period}: {when}"));
            }
        }
    }
    lines.join("\n")
}

fn cmd_autojobs(state: &AppState, user: UserId, args: &[&str]) -> String {
    if state.users.load(user).is_none() {
        return "Спочатку підключи банк: /connect <token>".to_string();
    }

    let action = args.first().map(|s| s.to_lowercase());
    let enabled = match action.as_deref() {
        Some("on") => Some(true),
        Some("off") => Some(false),
        _ => None,
    };

    if let Some(enabled) = enabled {
        if let Err(e) = state.users.save(
            user,
            UserUpdate {
                autojobs_enabled: Some(enabled),
                ..Default::default()
            },
        ) {
            error!(user, error = %e, "failed to flip autojobs");
            return "Не вдалося зберегти налаштування.".to_string();
        }
        return if enabled {
            "✅ Автозвіти увімкнено".to_string()
        } else {
            "✅ Автозвіти вимкнено".to_string()
        };
    }

    let on = state
        .users
        .load(user)
        .map(|c| c.autojobs_enabled)
        .unwrap_or(false);
    format!("Автозвіти: {}", if on { "ON" } else { "OFF" })
}

async fn cmd_report(state: &Arc<AppState>, user: UserId, period: Period, args: &[&str]) -> String {
    let want_ai = args.iter().any(|a| a.eq_ignore_ascii_case("ai"));

    match state.users.load(user) {
        None => return "Спочатку підключи банк: /connect <token>".to_string(),
        Some(cfg) if cfg.mono_token.is_empty() => {
            return "Спочатку підключи банк: /connect <token>".to_string()
        }
        Some(_) => {}
    }

    let Some(stored) = state.reports.load(user, period) else {
        return format!("Немає кешу для {period}. Зроби: /refresh {period}");
    };

    let facts: Facts = match serde_json::from_value(stored.facts.clone()) {
        Ok(f) => f,
        Err(e) => {
            error!(user, %period, error = %e, "unreadable cached facts");
            return format!("Кеш для {period} пошкоджено. Зроби: /refresh {period}");
        }
    };

    let ai_block = if want_ai {
        if !state.settings.ai_enabled() {
            return "OPENAI_API_KEY не задано — AI недоступний.".to_string();
        }
        state.ai_block_for(user, period).await
    } else {
        None
    };

    templates::render_report(period.as_str(), &facts, ai_block.as_deref())
}
