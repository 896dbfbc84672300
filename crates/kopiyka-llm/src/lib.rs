//! Optional generative-AI enrichment: computed facts in, validated JSON out.
//!
//! The model is held to grounded generation — it may only restate numbers
//! present in the facts payload. Replies must be a bare JSON object; a
//! malformed reply gets exactly one "repair" round-trip before the caller
//! falls back to facts-only rendering.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use kopiyka_core::KopiykaError;

const OPENAI_URL: &str = "https://api.openai.com/v1/chat/completions";
const REQUEST_TIMEOUT_SECS: u64 = 30;

const MAX_CHANGES: usize = 5;
const MAX_RECS: usize = 7;

/// Structured insight over one period's facts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsightReport {
    pub summary: String,
    #[serde(default)]
    pub changes: Vec<String>,
    #[serde(default)]
    pub recs: Vec<String>,
    pub next_step: String,
}

impl InsightReport {
    /// Trim fields, drop empties, enforce the list caps. Returns `None` when
    /// the reply is unusable (empty summary or next step).
    fn clean(mut self) -> Option<Self> {
        self.summary = self.summary.trim().to_string();
        self.next_step = self.next_step.trim().to_string();
        if self.summary.is_empty() || self.next_step.is_empty() {
            return None;
        }
        self.changes = self
            .changes
            .iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .take(MAX_CHANGES)
            .collect();
        self.recs = self
            .recs
            .iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .take(MAX_RECS)
            .collect();
        Some(self)
    }
}

static JSON_OBJECT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)\{.*\}").unwrap());

/// Best-effort extraction of the first `{...}` block from a model reply.
fn extract_json_object(text: &str) -> Option<&str> {
    let s = text.trim();
    if s.starts_with('{') && s.ends_with('}') {
        return Some(s);
    }
    JSON_OBJECT_RE.find(s).map(|m| m.as_str())
}

fn parse_reply(text: &str) -> Option<InsightReport> {
    let body = extract_json_object(text)?;
    serde_json::from_str::<InsightReport>(body)
        .ok()
        .and_then(InsightReport::clean)
}

pub struct OpenAiClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
}

impl OpenAiClient {
    pub fn new(api_key: &str, model: &str) -> Result<Self, KopiykaError> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| KopiykaError::Transport(e.to_string()))?;
        Ok(Self {
            http,
            api_key: api_key.to_string(),
            model: model.to_string(),
        })
    }

    async fn chat(&self, system: &str, user: &str, temperature: f64) -> Result<String, KopiykaError> {
        let payload = serde_json::json!({
            "model": self.model,
            "temperature": temperature,
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": user},
            ],
        });

        let response = self
            .http
            .post(OPENAI_URL)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| KopiykaError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(KopiykaError::Upstream {
                status: status.as_u16(),
                reason: "openai".to_string(),
                body,
            });
        }

        let value: Value = response
            .json()
            .await
            .map_err(|e| KopiykaError::Transport(e.to_string()))?;
        Ok(value["choices"][0]["message"]["content"]
            .as_str()
            .unwrap_or_default()
            .to_string())
    }

    /// Generate a structured insight for one period. `facts` carries both the
    /// period facts and the long-term profile; the prompt pins the model to
    /// those numbers.
    pub async fn generate_report(
        &self,
        facts: &Value,
        period_label: &str,
    ) -> Result<InsightReport, KopiykaError> {
        let system = "Ти — помічник з фінансової грамотності.\n\
            Працюй у режимі grounded: використовуй ТІЛЬКИ дані з facts JSON.\n\
            Не вигадуй дані і не припускай того, чого немає у facts.\n\
            Не давай інвестиційних, кредитних або юридичних порад.\n\
            У facts два блоки: period_facts (поточний період) та user_profile\n\
            (довгострокова норма). Якщо user_profile не порожній — використай\n\
            його щонайменше в одній рекомендації або в summary.\n\
            Поверни ВИКЛЮЧНО валідний JSON без markdown.";

        let user = format!(
            "Період: {period_label}\n\n\
             Вимоги до JSON:\n\
             - summary: 2–4 речення, коротко і по цифрах.\n\
             - changes: 2–5 пунктів про зміни; якщо попередній період нульовий — без відсотків.\n\
             - recs: 3–7 рекомендацій, кожна прив'язана до факту з period_facts.\n\
             - next_step: одна вимірювана дія на 7 днів.\n\
             Правила:\n\
             - Відсотки бери тільки з category_shares_real_spend або top_merchants_shares_real_spend.\n\
             - Не називай перекази витратами; основна метрика — real_spend_total_uah.\n\
             - Поверни ТІЛЬКИ JSON за схемою {{\"summary\": str, \"changes\": [str], \"recs\": [str], \"next_step\": str}}.\n\n\
             facts: {facts}"
        );

        let raw = self.chat(system, &user, 0.2).await?;
        if let Some(report) = parse_reply(&raw) {
            return Ok(report);
        }

        warn!("insight reply failed validation, attempting JSON repair");
        let repair_system = "Ти — JSON-ремонтник. Перетвори текст у ВАЛІДНИЙ JSON \
            за схемою {\"summary\": str, \"changes\": [str], \"recs\": [str], \"next_step\": str}. \
            Поверни ТІЛЬКИ JSON, без markdown.";
        let repair_user = format!(
            "Виправ відповідь так, щоб це був валідний JSON об'єкт за схемою. \
             Ось проблемна відповідь:\n{raw}"
        );
        let repaired = self.chat(repair_system, &repair_user, 0.0).await?;
        parse_reply(&repaired).ok_or_else(|| KopiykaError::Corrupt {
            path: "openai-reply".to_string(),
            detail: "model did not produce a valid insight object".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_json_object() {
        let report = parse_reply(
            r#"{"summary": "Витрати зросли.", "changes": ["+10%"], "recs": ["менше кави"], "next_step": "ліміт 200 грн"}"#,
        )
        .unwrap();
        assert_eq!(report.summary, "Витрати зросли.");
        assert_eq!(report.recs.len(), 1);
    }

    #[test]
    fn extracts_object_from_markdown_noise() {
        let raw = "Ось відповідь:\n```json\n{\"summary\": \"ok\", \"next_step\": \"дія\"}\n```";
        let report = parse_reply(raw).unwrap();
        assert_eq!(report.summary, "ok");
        assert!(report.changes.is_empty());
    }

    #[test]
    fn caps_list_lengths_and_drops_blanks() {
        let raw = serde_json::json!({
            "summary": " s ",
            "changes": ["a", "", "b", "c", "d", "e", "f", "g"],
            "recs": (0..12).map(|i| format!("r{i}")).collect::<Vec<_>>(),
            "next_step": " n ",
        })
        .to_string();
        let report = parse_reply(&raw).unwrap();
        assert_eq!(report.summary, "s");
        assert_eq!(report.changes.len(), MAX_CHANGES);
        assert_eq!(report.recs.len(), MAX_RECS);
    }

    #[test]
    fn empty_summary_is_rejected() {
        assert!(parse_reply(r#"{"summary": " ", "next_step": "x"}"#).is_none());
        assert!(parse_reply("not json at all").is_none());
    }
}
