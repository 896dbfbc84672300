//! Plain-text message rendering: report layout, onboarding copy, small
//! status helpers. No chat-markup escaping — everything is sent as plain
//! text.

use kopiyka_analytics::Facts;
use kopiyka_core::money::format_uah;

pub fn divider() -> &'static str {
    "──────────────────"
}

fn period_title(period: &str) -> &str {
    match period {
        "today" => "Сьогодні",
        "week" => "Останні 7 днів",
        "month" => "Останні 30 днів",
        other => other,
    }
}

/// Facts → report text: totals, top categories/merchants, comparison,
/// trends, anomalies, what-if, optional AI block — sections separated by
/// dividers.
pub fn render_report(period: &str, facts: &Facts, ai_block: Option<&str>) -> String {
    let mut parts: Vec<String> = Vec::new();
    let t = &facts.totals;

    let mut head = vec![format!("📊 {}", period_title(period))];
    head.push(String::new());
    head.push(format!(
        "💸 Реальні витрати (без переказів): {}",
        format_uah(t.real_spend_total_uah)
    ));
    head.push(format!("🧾 Всі списання: {}", format_uah(t.spend_total_uah)));
    head.push(format!("💰 Надходження: {}", format_uah(t.income_total_uah)));
    head.push(format!(
        "🔁 Перекази: +{} / -{}",
        format_uah(t.transfer_in_total_uah),
        format_uah(t.transfer_out_total_uah)
    ));
    parts.push(head.join("\n"));

    if !facts.top_categories_named_real_spend.is_empty() {
        let mut block = vec!["Топ категорій:".to_string()];
        for (i, row) in facts.top_categories_named_real_spend.iter().take(5).enumerate() {
            block.push(format!("{}. {}: {}", i + 1, row.category, format_uah(row.amount_uah)));
        }
        parts.push(block.join("\n"));
    }

    if !facts.top_merchants_real_spend.is_empty() {
        let mut block = vec!["Топ мерчантів:".to_string()];
        for (i, row) in facts.top_merchants_real_spend.iter().take(5).enumerate() {
            block.push(format!("{}. {}: {}", i + 1, row.merchant, format_uah(row.amount_uah)));
        }
        parts.push(block.join("\n"));
    }

    if let Some(comparison) = &facts.comparison {
        let delta = comparison.totals.delta.real_spend_total_uah;
        let pct = comparison
            .totals
            .pct_change
            .real_spend_total_uah
            .map(|p| format!("{p:+.2}%"))
            .unwrap_or_else(|| "—".to_string());
        let sign = if delta >= 0.0 { "+" } else { "" };

        let mut block = vec!["Порівняння з попереднім періодом:".to_string()];
        block.push(format!(
            "• Реальні витрати: {sign}{} ({pct})",
            format_uah(delta)
        ));

        let mut changes: Vec<_> = comparison.categories.iter().collect();
        changes.sort_by(|a, b| {
            b.1.delta_uah
                .abs()
                .partial_cmp(&a.1.delta_uah.abs())
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        if !changes.is_empty() {
            block.push("Найбільші зміни по категоріях:".to_string());
            for (name, c) in changes.into_iter().take(5) {
                let pct = c
                    .pct_change
                    .map(|p| format!("{p:+.2}%"))
                    .unwrap_or_else(|| "—".to_string());
                let sign = if c.delta_uah >= 0.0 { "+" } else { "" };
                block.push(format!("• {name}: {sign}{} ({pct})", format_uah(c.delta_uah)));
            }
        }
        parts.push(block.join("\n"));
    }

    if let Some(trends) = &facts.trends {
        if !trends.top_growing.is_empty() || !trends.top_declining.is_empty() {
            let mut block = vec![format!("Тренди за {} днів:", trends.window_days)];
            for item in &trends.top_growing {
                block.push(format!(
                    "📈 {}: {} → {}",
                    item.label,
                    format_uah(item.prev_cents as f64 / 100.0),
                    format_uah(item.last_cents as f64 / 100.0)
                ));
            }
            for item in &trends.top_declining {
                block.push(format!(
                    "📉 {}: {} → {}",
                    item.label,
                    format_uah(item.prev_cents as f64 / 100.0),
                    format_uah(item.last_cents as f64 / 100.0)
                ));
            }
            parts.push(block.join("\n"));
        }
    }

    if let Some(anomalies) = &facts.anomalies {
        if !anomalies.is_empty() {
            let mut block = vec!["Аномалії за останню добу:".to_string()];
            for a in anomalies {
                let what = match a.reason.as_str() {
                    "first_time_large" => "вперше і одразу багато",
                    _ => "сплеск проти звичного рівня",
                };
                block.push(format!(
                    "⚠️ {}: {} ({what}, медіана {})",
                    a.label,
                    format_uah(a.last_day_cents as f64 / 100.0),
                    format_uah(a.baseline_median_cents as f64 / 100.0)
                ));
            }
            parts.push(block.join("\n"));
        }
    }

    if let Some(suggestions) = &facts.whatif_suggestions {
        if !suggestions.is_empty() {
            let mut block = vec!["Що якщо скоротити:".to_string()];
            for s in suggestions {
                let best = s
                    .scenarios
                    .iter()
                    .map(|x| x.monthly_savings_uah)
                    .fold(0.0, f64::max);
                block.push(format!(
                    "💡 {} (~{} на місяць): до {} економії",
                    s.title,
                    format_uah(s.monthly_spend_uah),
                    format_uah(best)
                ));
            }
            parts.push(block.join("\n"));
        }
    }

    if let Some(ai) = ai_block {
        parts.push(format!("🤖 AI інсайти:\n{}", ai.trim()));
    }

    parts.join(&format!("\n\n{}\n\n", divider()))
}

pub fn render_ai_block(report: &kopiyka_llm::InsightReport) -> String {
    let mut lines = vec![format!("• {}", report.summary)];
    if !report.changes.is_empty() {
        lines.push(String::new());
        lines.push("Що змінилось:".to_string());
        for c in &report.changes {
            lines.push(format!("• {c}"));
        }
    }
    if !report.recs.is_empty() {
        lines.push(String::new());
        lines.push("Рекомендації:".to_string());
        for r in &report.recs {
            lines.push(format!("• {r}"));
        }
    }
    lines.push(String::new());
    lines.push("Наступний крок (7 днів):".to_string());
    lines.push(format!("• {}", report.next_step));
    lines.join("\n")
}

pub fn start_message() -> String {
    [
        "👋 kopiyka",
        "",
        "Звіти по витратах: факти → тренди → аномалії → (опційно) AI інсайти.",
        "",
        "Що бот робить:",
        "• /week, /month — звіти з порівнянням з попереднім періодом",
        "• тренди й аномалії по категоріях і мерчантах",
        "• питання звичайним текстом (NLQ)",
        "",
        "Що бот НЕ робить:",
        "• НЕ може створювати, змінювати або видаляти транзакції",
        "• доступ лише до читання виписки (read-only)",
        "• НЕ дає фінансових порад",
        "",
        "Підключення:",
        "/connect <token> — додати токен банку",
        "",
        "Privacy: токен зберігається локально в зашифрованому вигляді;",
        "повний wipe — видалити теку кешу.",
    ]
    .join("\n")
}

pub fn help_message() -> String {
    [
        "📘 Команди:",
        "",
        "🔌 Підключення:",
        "/connect <token> — додати токен банку",
        "/accounts — список карток; /accounts select 1,3 — вибір",
        "/history 30|90 — завантажити історію",
        "/refresh today|week|month|all — синхронізувати ledger",
        "",
        "📊 Звіти:",
        "/today — витрати за сьогодні",
        "/week — останні 7 днів + порівняння",
        "/month — останні 30 днів + порівняння",
        "Додай «ai» (наприклад, /week ai) для AI інсайтів",
        "",
        "⚙️ Інше:",
        "/status — стан підключення і кешу",
        "/autojobs on|off|status — автозвіти",
        "",
        "Будь-який інший текст — питання до твоїх витрат.",
    ]
    .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use kopiyka_analytics::{compute_facts, rows_from_ledger};
    use kopiyka_core::TxRecord;

    fn facts() -> Facts {
        let records = vec![
            TxRecord {
                id: "1".into(),
                time: 10,
                account_id: "acc".into(),
                amount: -15_000,
                description: "McDonalds".into(),
                mcc: Some(5814),
                currency_code: None,
            },
            TxRecord {
                id: "2".into(),
                time: 20,
                account_id: "acc".into(),
                amount: 200_000,
                description: "Salary".into(),
                mcc: None,
                currency_code: None,
            },
        ];
        compute_facts(&rows_from_ledger(&records))
    }

    #[test]
    fn report_contains_totals_and_tops() {
        let text = render_report("week", &facts(), None);
        assert!(text.contains("Останні 7 днів"));
        assert!(text.contains("150.00 ₴"));
        assert!(text.contains("2 000.00 ₴"));
        assert!(text.contains("McDonalds"));
        assert!(!text.contains("AI інсайти"));
    }

    #[test]
    fn ai_block_is_appended() {
        let text = render_report("today", &facts(), Some("порада"));
        assert!(text.contains("AI інсайти"));
        assert!(text.contains("порада"));
    }

    #[test]
    fn trends_and_anomalies_render_when_present() {
        let mut f = facts();
        f.trends = Some(kopiyka_analytics::compute_trends(&[], 100 * 86_400, 7));
        f.anomalies = Some(vec![kopiyka_analytics::AnomalyItem {
            label: "mcd".into(),
            last_day_cents: 30_000,
            baseline_median_cents: 10_000,
            reason: "spike_vs_median".into(),
        }]);
        let text = render_report("week", &f, None);
        // empty trends stay hidden, anomalies show up
        assert!(!text.contains("Тренди"));
        assert!(text.contains("Аномалії"));
        assert!(text.contains("300.00 ₴"));
    }
}
