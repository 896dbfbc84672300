//! Authenticated upstream client.
//!
//! Raw GET + serde_json over reqwest rather than a vendor SDK, to keep the
//! dependency surface small. Every endpoint call goes through the persistent
//! rate limiter keyed by token fingerprint (never the token itself), and
//! responses are cached on disk.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tracing::{debug, warn};

use kopiyka_core::{
    KopiykaError, CLIENT_INFO_TTL_SECS, DEFAULT_BANK_BASE_URL, MIN_CALL_INTERVAL_SECS,
    STATEMENT_PAGE_CAP, STATEMENT_TTL_SECS,
};
use kopiyka_crypto::token_fingerprint;
use kopiyka_store::{DiskCache, RateLimiter};

use crate::models::{ClientInfo, StatementItem};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);
const MAX_ATTEMPTS: u32 = 4;
const BACKOFF_BASE_MS: u64 = 500;
const BACKOFF_JITTER_MS: u64 = 250;

/// One page-fetch seam for the pagination walk. The production fetcher
/// throttles and issues HTTP; tests feed synthetic batches.
pub trait StatementFetcher {
    fn fetch(
        &mut self,
        from_ts: i64,
        to_ts: i64,
    ) -> impl std::future::Future<Output = Result<Vec<StatementItem>, KopiykaError>>;
}

/// Walk the statement backwards from `to_ts` until fewer than `page_cap`
/// items come back, deduplicating by id.
///
/// `cur_to` strictly decreases every round — `min(cur_to - 1, t_min - 1)`
/// guarantees progress even when a whole page shares one timestamp — so the
/// walk always terminates, and re-running it over an eventually-consistent
/// upstream only adds unseen ids.
pub async fn paginate_statement<F: StatementFetcher>(
    fetcher: &mut F,
    from_ts: i64,
    to_ts: i64,
    page_cap: usize,
) -> Result<Vec<StatementItem>, KopiykaError> {
    let mut out: Vec<StatementItem> = Vec::new();
    let mut seen_ids: HashSet<String> = HashSet::new();
    let mut cur_to = to_ts;

    while cur_to > from_ts {
        let batch = fetcher.fetch(from_ts, cur_to).await?;
        let batch_len = batch.len();

        let mut t_min: Option<i64> = None;
        for item in batch {
            t_min = Some(t_min.map_or(item.time, |m| m.min(item.time)));
            if seen_ids.insert(item.id.clone()) {
                out.push(item);
            }
        }

        if batch_len < page_cap {
            break;
        }
        let oldest = t_min.unwrap_or(cur_to);
        cur_to = (cur_to - 1).min(oldest - 1);
    }

    Ok(out)
}

pub struct BankClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
    fingerprint: String,
    cache: Arc<DiskCache>,
    limiter: Arc<RateLimiter>,
}

impl BankClient {
    pub fn new(
        token: &str,
        cache: Arc<DiskCache>,
        limiter: Arc<RateLimiter>,
    ) -> Result<Self, KopiykaError> {
        Self::with_base_url(token, DEFAULT_BANK_BASE_URL, cache, limiter)
    }

    pub fn with_base_url(
        token: &str,
        base_url: &str,
        cache: Arc<DiskCache>,
        limiter: Arc<RateLimiter>,
    ) -> Result<Self, KopiykaError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent("kopiyka/0.1")
            .build()
            .map_err(|e| KopiykaError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
            fingerprint: token_fingerprint(token),
            cache,
            limiter,
        })
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// GET `path` with bounded retries. Transient transport faults and 5xx
    /// back off exponentially with jitter; 429 honors Retry-After; auth
    /// failures and other client errors are returned as-is.
    async fn request_json(&self, path: &str) -> Result<serde_json::Value, KopiykaError> {
        let url = format!("{}{}", self.base_url, path);
        let mut last_error = String::new();

        for attempt in 1..=MAX_ATTEMPTS {
            let response = self
                .http
                .get(&url)
                .header("X-Token", &self.token)
                .send()
                .await;

            let response = match response {
                Ok(r) => r,
                Err(e) => {
                    last_error = e.to_string();
                    if attempt < MAX_ATTEMPTS {
                        let delay = backoff_delay(attempt);
                        warn!(path, attempt, error = %last_error, "transport fault, backing off");
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                    break;
                }
            };

            let status = response.status();
            if status.is_success() {
                return response
                    .json()
                    .await
                    .map_err(|e| KopiykaError::Transport(e.to_string()));
            }

            if status.as_u16() == 401 || status.as_u16() == 403 {
                return Err(KopiykaError::Auth {
                    status: status.as_u16(),
                });
            }

            if status.as_u16() == 429 {
                let retry_after = response
                    .headers()
                    .get("Retry-After")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<u64>().ok());
                last_error = format!("429 too many requests (Retry-After: {retry_after:?})");
                if attempt < MAX_ATTEMPTS {
                    let delay = retry_after
                        .map(Duration::from_secs)
                        .unwrap_or_else(|| backoff_delay(attempt));
                    warn!(path, attempt, ?delay, "upstream rate limit, waiting");
                    tokio::time::sleep(delay).await;
                    continue;
                }
                break;
            }

            if status.is_server_error() {
                last_error = format!("{status}");
                if attempt < MAX_ATTEMPTS {
                    let delay = backoff_delay(attempt);
                    warn!(path, attempt, %status, "upstream 5xx, backing off");
                    tokio::time::sleep(delay).await;
                    continue;
                }
                break;
            }

            let reason = status.canonical_reason().unwrap_or("").to_string();
            let body = response.text().await.unwrap_or_default();
            return Err(KopiykaError::Upstream {
                status: status.as_u16(),
                reason,
                body,
            });
        }

        Err(KopiykaError::RetriesExhausted {
            attempts: MAX_ATTEMPTS,
            last: last_error,
        })
    }

    /// `GET /personal/client-info`, cached ~10 minutes, limited to one call
    /// per minute per token.
    pub async fn client_info(&self) -> Result<ClientInfo, KopiykaError> {
        let cache_key = format!("client-info:{}", self.fingerprint);
        if let Some(value) = self.cache.get(&cache_key) {
            if let Ok(info) = serde_json::from_value::<ClientInfo>(value) {
                return Ok(info);
            }
            self.cache.delete(&cache_key);
        }

        self.limiter
            .throttle(&cache_key, MIN_CALL_INTERVAL_SECS, true)
            .await?;

        let value = self.request_json("/personal/client-info").await?;
        let info: ClientInfo = serde_json::from_value(value)?;
        self.cache.set(
            &cache_key,
            &serde_json::to_value(&info)?,
            Some(CLIENT_INFO_TTL_SECS),
        )?;
        Ok(info)
    }

    /// Full statement for `[from_ts, to_ts]`, paginated past the 500-item
    /// response cap and cached under the requested range.
    pub async fn statement(
        &self,
        account: &str,
        from_ts: i64,
        to_ts: i64,
    ) -> Result<Vec<StatementItem>, KopiykaError> {
        let cache_key = format!(
            "statement:{}:{account}:{from_ts}:{to_ts}",
            self.fingerprint
        );
        if let Some(value) = self.cache.get(&cache_key) {
            if let Ok(items) = serde_json::from_value::<Vec<StatementItem>>(value) {
                return Ok(items);
            }
            self.cache.delete(&cache_key);
        }

        let mut fetcher = HttpPageFetcher {
            client: self,
            account,
            limiter_key: format!("statement:{}:{account}", self.fingerprint),
        };
        let items = paginate_statement(&mut fetcher, from_ts, to_ts, STATEMENT_PAGE_CAP).await?;
        debug!(account, from_ts, to_ts, count = items.len(), "statement fetched");

        self.cache.set(
            &cache_key,
            &serde_json::to_value(&items)?,
            Some(STATEMENT_TTL_SECS),
        )?;
        Ok(items)
    }
}

struct HttpPageFetcher<'a> {
    client: &'a BankClient,
    account: &'a str,
    limiter_key: String,
}

impl StatementFetcher for HttpPageFetcher<'_> {
    async fn fetch(&mut self, from_ts: i64, to_ts: i64) -> Result<Vec<StatementItem>, KopiykaError> {
        self.client
            .limiter
            .throttle(&self.limiter_key, MIN_CALL_INTERVAL_SECS, true)
            .await?;
        let path = format!(
            "/personal/statement/{}/{from_ts}/{to_ts}",
            self.account
        );
        let value = self.client.request_json(&path).await?;
        Ok(serde_json::from_value(value)?)
    }
}

fn backoff_delay(attempt: u32) -> Duration {
    let base = BACKOFF_BASE_MS.saturating_mul(1 << (attempt - 1).min(4));
    let jitter = rand::thread_rng().gen_range(0..BACKOFF_JITTER_MS);
    Duration::from_millis(base + jitter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn item(id: &str, time: i64) -> StatementItem {
        StatementItem {
            id: id.to_string(),
            time,
            description: None,
            mcc: None,
            amount: -100,
            currency_code: None,
        }
    }

    /// Batches keyed by the `to_ts` the walk is expected to request.
    struct MockFetcher {
        batches: HashMap<i64, Vec<StatementItem>>,
        calls: u32,
    }

    impl StatementFetcher for MockFetcher {
        async fn fetch(&mut self, _from: i64, to_ts: i64) -> Result<Vec<StatementItem>, KopiykaError> {
            self.calls += 1;
            Ok(self.batches.get(&to_ts).cloned().unwrap_or_default())
        }
    }

    fn batch(start_time: i64, count: usize) -> Vec<StatementItem> {
        (0..count)
            .map(|i| item(&format!("tx_{}", start_time - i as i64), start_time - i as i64))
            .collect()
    }

    #[tokio::test]
    async fn paginates_full_pages_and_dedups_overlap() {
        let batch1 = batch(2000, 500);
        let mut batch2 = batch(1500, 500);
        let batch3 = batch(1000, 120);
        // one id overlaps between page 1 and page 2
        batch2[10].id = batch1[20].id.clone();

        let mut fetcher = MockFetcher {
            batches: HashMap::from([(2000, batch1), (1500, batch2), (1000, batch3)]),
            calls: 0,
        };

        let out = paginate_statement(&mut fetcher, 0, 2000, 500).await.unwrap();
        assert_eq!(out.len(), 500 + 499 + 120);
        assert_eq!(fetcher.calls, 3);

        let unique: HashSet<_> = out.iter().map(|i| i.id.clone()).collect();
        assert_eq!(unique.len(), out.len());
    }

    #[tokio::test]
    async fn same_timestamp_page_terminates_in_two_requests() {
        let stuck: Vec<StatementItem> =
            (0..500).map(|i| item(&format!("tx_{i}"), 1000)).collect();
        let mut fetcher = MockFetcher {
            batches: HashMap::from([(2000, stuck)]),
            calls: 0,
        };

        let out = paginate_statement(&mut fetcher, 0, 2000, 500).await.unwrap();
        assert_eq!(out.len(), 500);
        assert_eq!(fetcher.calls, 2);
    }

    #[tokio::test]
    async fn short_page_stops_after_one_request() {
        let mut fetcher = MockFetcher {
            batches: HashMap::from([(2000, batch(2000, 3))]),
            calls: 0,
        };
        let out = paginate_statement(&mut fetcher, 0, 2000, 500).await.unwrap();
        assert_eq!(out.len(), 3);
        assert_eq!(fetcher.calls, 1);
    }

    #[tokio::test]
    async fn empty_window_makes_no_requests() {
        let mut fetcher = MockFetcher {
            batches: HashMap::new(),
            calls: 0,
        };
        let out = paginate_statement(&mut fetcher, 500, 500, 500).await.unwrap();
        assert!(out.is_empty());
        assert_eq!(fetcher.calls, 0);
    }

    #[tokio::test]
    async fn cached_statement_skips_upstream_entirely() {
        let dir = tempfile::tempdir().unwrap();
        let cache = Arc::new(DiskCache::open(dir.path().join("cache")).unwrap());
        let limiter = Arc::new(RateLimiter::open(dir.path().join("limits.json")).unwrap());

        // base_url points at a closed port: any actual HTTP attempt would fail
        let client = BankClient::with_base_url(
            "tok",
            "http://127.0.0.1:9",
            Arc::clone(&cache),
            Arc::clone(&limiter),
        )
        .unwrap();

        let items = vec![item("a", 10), item("b", 20)];
        let cache_key = format!("statement:{}:acc:0:100", client.fingerprint());
        cache
            .set(&cache_key, &serde_json::to_value(&items).unwrap(), None)
            .unwrap();

        let out = client.statement("acc", 0, 100).await.unwrap();
        assert_eq!(out.len(), 2);
    }
}
