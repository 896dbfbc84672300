//! Shared application state and the sync/recompute jobs used by both chat
//! handlers and the scheduler.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::{info, warn};

use kopiyka_analytics::{
    build_period_report, build_user_profile, compute_facts, facts_for_cache, rows_from_ledger,
};
use kopiyka_bank::{sync_accounts, BankClient, SyncResult};
use kopiyka_core::{now_ts, range_today, KopiykaError, Period, UserId, SECONDS_PER_DAY};
use kopiyka_crypto::TokenCodec;
use kopiyka_nlq::MemoryStore;
use kopiyka_store::{
    DiskCache, LedgerStore, ProfileStore, RateLimiter, ReportStore, UserConfig, UserStore,
};

use crate::settings::Settings;
use crate::telegram::TelegramClient;

const PROFILE_WINDOW_DAYS: i64 = 90;

/// One mutex per user serializes chat-initiated and scheduled refreshes.
#[derive(Default)]
pub struct UserLocks {
    map: Mutex<HashMap<UserId, Arc<tokio::sync::Mutex<()>>>>,
}

impl UserLocks {
    pub fn for_user(&self, user: UserId) -> Arc<tokio::sync::Mutex<()>> {
        let mut map = self.map.lock().expect("user-lock map poisoned");
        Arc::clone(map.entry(user).or_default())
    }
}

pub struct AppState {
    pub settings: Settings,
    pub users: UserStore,
    pub ledger: LedgerStore,
    pub reports: ReportStore,
    pub profiles: ProfileStore,
    pub memory: MemoryStore,
    pub cache: Arc<DiskCache>,
    pub limiter: Arc<RateLimiter>,
    pub locks: UserLocks,
    pub telegram: TelegramClient,
}

impl AppState {
    pub fn new(settings: Settings) -> Result<Self, KopiykaError> {
        let root = &settings.cache_dir;
        let codec = TokenCodec::new(settings.master_key.as_bytes());

        Ok(Self {
            users: UserStore::open(root.join("users"), codec)?,
            ledger: LedgerStore::open(root.join("tx"))?,
            reports: ReportStore::open(root.join("reports"))?,
            profiles: ProfileStore::open(root.join("profiles"))?,
            memory: MemoryStore::open(root.join("memory"))?,
            cache: Arc::new(DiskCache::open(root.join("http"))?),
            limiter: Arc::new(RateLimiter::open(root.join("rate_limits.json"))?),
            locks: UserLocks::default(),
            telegram: TelegramClient::new(&settings.telegram_bot_token)?,
            settings,
        })
    }

    pub fn bank_client(&self, token: &str) -> Result<BankClient, KopiykaError> {
        BankClient::new(token, Arc::clone(&self.cache), Arc::clone(&self.limiter))
    }

    pub fn nlq(&self) -> kopiyka_nlq::NlqService<'_> {
        kopiyka_nlq::NlqService {
            users: &self.users,
            ledger: &self.ledger,
            memory: &self.memory,
        }
    }

    /// Sync the ledger for a user's selected accounts.
    pub async fn sync_user(
        &self,
        cfg: &UserConfig,
        days_back: i64,
    ) -> Result<SyncResult, KopiykaError> {
        if cfg.mono_token.is_empty() {
            return Err(KopiykaError::MissingToken);
        }
        if cfg.selected_account_ids.is_empty() {
            return Err(KopiykaError::NoAccountsSelected);
        }
        let client = self.bank_client(&cfg.mono_token)?;
        sync_accounts(
            &client,
            &self.ledger,
            cfg.telegram_user_id,
            &cfg.selected_account_ids,
            days_back,
            now_ts(),
        )
        .await
    }

    /// Recompute the today/week/month report caches and the long-term
    /// profile from the ledger. No upstream calls.
    pub fn recompute_reports(
        &self,
        user: UserId,
        account_ids: &[String],
    ) -> Result<(), KopiykaError> {
        let now = now_ts();

        let today = range_today(now);
        let records = self
            .ledger
            .load_range(user, account_ids, today.start_ts, today.end_ts);
        let facts = compute_facts(&rows_from_ledger(&records));
        self.reports.save(user, Period::Today, &facts)?;

        let profile_from = now - PROFILE_WINDOW_DAYS * SECONDS_PER_DAY;
        let profile_records = self.ledger.load_range(user, account_ids, profile_from, now);
        if let Some(profile) = build_user_profile(&profile_records) {
            self.profiles.save(user, &profile)?;
        }

        for period in [Period::Week, Period::Month] {
            let days_back = period.days_back();
            let from = now - (2 * days_back + 1) * SECONDS_PER_DAY;
            let records = self.ledger.load_range(user, account_ids, from, now);
            let report = build_period_report(&records, days_back, now);
            self.reports.save(user, period, &facts_for_cache(report))?;
        }

        info!(user, "report caches recomputed");
        Ok(())
    }

    /// One user's scheduled refresh: eligibility check, sync, recompute.
    /// Returns false when the user is not eligible.
    pub async fn refresh_user(&self, cfg: &UserConfig, days_back: i64) -> Result<bool, KopiykaError> {
        if !cfg.autojobs_enabled
            || cfg.chat_id.is_none()
            || cfg.mono_token.is_empty()
            || cfg.selected_account_ids.is_empty()
        {
            return Ok(false);
        }

        let lock = self.locks.for_user(cfg.telegram_user_id);
        let _guard = lock.lock().await;

        self.sync_user(cfg, days_back).await?;
        self.recompute_reports(cfg.telegram_user_id, &cfg.selected_account_ids)?;
        Ok(true)
    }

    /// Generate the optional AI block for a cached report.
    pub async fn ai_block_for(&self, user: UserId, period: Period) -> Option<String> {
        let api_key = self.settings.openai_api_key.as_deref()?;
        let stored = self.reports.load(user, period)?;
        let profile = self.profiles.load(user).unwrap_or(serde_json::json!({}));

        let payload = serde_json::json!({
            "period_facts": stored.facts,
            "user_profile": profile,
        });

        let client = match kopiyka_llm::OpenAiClient::new(api_key, &self.settings.openai_model) {
            Ok(c) => c,
            Err(e) => {
                warn!(error = %e, "failed to build OpenAI client");
                return None;
            }
        };

        let label = match period {
            Period::Today => "Сьогодні",
            Period::Week => "Останні 7 днів",
            Period::Month => "Останні 30 днів",
        };

        match client.generate_report(&payload, label).await {
            Ok(report) => Some(crate::templates::render_ai_block(&report)),
            Err(e) => {
                warn!(user, error = %e, "LLM unavailable, sending facts-only");
                None
            }
        }
    }
}
