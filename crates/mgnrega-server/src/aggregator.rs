//! Cache lookup, upstream fetch, reconciliation and write-back.

use mgnrega_core::{CacheKey, CanonicalSeries, KeyScope, Reconciler, Record, ScoreWeights, StatsQuery};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::cache::{CacheTier, TieredCache};
use crate::metrics;
use crate::upstream::{UpstreamClient, UpstreamError};

const DEFAULT_TTL: Duration = Duration::from_secs(24 * 60 * 60);
const DEFAULT_MAX_PAGES: u32 = 50;

/// Where an [`AggregateResult`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provenance {
    /// Fetched from upstream on this call.
    Fresh,
    /// Served from cache without contacting upstream.
    Cached { tier: CacheTier },
    /// Upstream failed; served from cache instead.
    StaleCached { tier: CacheTier },
}

impl Provenance {
    /// Wire label: `upstream`, `cache` or `cache-stale`.
    pub fn source(&self) -> &'static str {
        match self {
            Provenance::Fresh => "upstream",
            Provenance::Cached { .. } => "cache",
            Provenance::StaleCached { .. } => "cache-stale",
        }
    }

    /// Tier name for cached results.
    pub fn cache_type(&self) -> Option<&'static str> {
        match self {
            Provenance::Fresh => None,
            Provenance::Cached { tier } | Provenance::StaleCached { tier } => Some(tier.name()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AggregateResult {
    pub records: CanonicalSeries,
    pub total: Option<u64>,
    pub provenance: Provenance,
}

/// Cached form of a reconciled result.
#[derive(Debug, Serialize, Deserialize)]
struct CachedDataset<R = Vec<Record>> {
    records: R,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    total: Option<u64>,
}

pub struct Aggregator {
    cache: Arc<TieredCache>,
    upstream: UpstreamClient,
    weights: ScoreWeights,
    ttl: Duration,
    max_pages: u32,
}

impl Aggregator {
    pub fn new(cache: Arc<TieredCache>, upstream: UpstreamClient) -> Self {
        Self {
            cache,
            upstream,
            weights: ScoreWeights::default(),
            ttl: DEFAULT_TTL,
            max_pages: DEFAULT_MAX_PAGES,
        }
    }

    #[must_use]
    pub fn with_weights(mut self, weights: ScoreWeights) -> Self {
        self.weights = weights;
        self
    }

    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    #[must_use]
    pub fn with_max_pages(mut self, max_pages: u32) -> Self {
        self.max_pages = max_pages.max(1);
        self
    }

    pub fn cache(&self) -> &Arc<TieredCache> {
        &self.cache
    }

    pub fn upstream(&self) -> &UpstreamClient {
        &self.upstream
    }

    /// Serve one page.
    ///
    /// With a sub-region, records are merged per period; without one, rows of
    /// different districts are kept apart.
    #[instrument(skip_all, fields(region = %query.region, sub_region = ?query.sub_region))]
    pub async fn fetch(&self, query: &StatsQuery) -> Result<AggregateResult, UpstreamError> {
        let scope = if query.sub_region.is_some() {
            KeyScope::Period
        } else {
            KeyScope::RegionQualified
        };
        let reconciler = Reconciler::new(self.weights, scope);
        let key = query.cache_key();

        if let Some(hit) = self.cached(&key, &reconciler, false).await {
            return Ok(hit);
        }

        match self.upstream.fetch(query).await {
            Ok(page) => {
                let records = reconciler.reconcile(page.records);
                Ok(self.store(&key, records, page.total).await)
            }
            Err(e) => self.stale_or(&key, &reconciler, e).await,
        }
    }

    /// Serve every page from `query.offset` onwards as one series.
    ///
    /// The first page settles the filter casing (see
    /// [`UpstreamClient::fetch_resolved`]); later pages reuse it verbatim so
    /// one listing never mixes two result sets. Paging stops at a short or
    /// empty page, at the reported total, or after the configured page cap.
    /// A failure on any page discards the partial union and falls back to the
    /// cached union, if any.
    #[instrument(skip_all, fields(region = %query.region, sub_region = ?query.sub_region))]
    pub async fn fetch_all(&self, query: &StatsQuery) -> Result<AggregateResult, UpstreamError> {
        let reconciler = Reconciler::new(self.weights, KeyScope::RegionQualified);
        let key = query.fetch_all_key();

        if let Some(hit) = self.cached(&key, &reconciler, false).await {
            return Ok(hit);
        }

        let step = query.limit.max(1);
        let mut raw: Vec<Record> = Vec::new();
        let mut total = None;
        let mut offset = query.offset;
        // Casing picked by the first page; later pages never retry.
        let mut resolved: Option<StatsQuery> = None;

        for page_no in 0..self.max_pages {
            let fetched = if let Some(matched) = &resolved {
                self.upstream.fetch_exact(&matched.clone().with_offset(offset)).await
            } else {
                let first = query.clone().with_limit(step).with_offset(offset);
                match self.upstream.fetch_resolved(&first).await {
                    Ok((page, matched)) => {
                        resolved = Some(matched);
                        Ok(page)
                    }
                    Err(e) => Err(e),
                }
            };
            let page = match fetched {
                Ok(page) => page,
                Err(e) => {
                    warn!(page = page_no, offset, error = %e, "page fetch failed, abandoning union");
                    return self.stale_or(&key, &reconciler, e).await;
                }
            };

            let received = u32::try_from(page.records.len()).unwrap_or(u32::MAX);
            total = page.total.or(total);
            raw.extend(page.records);
            offset = offset.saturating_add(received);

            let reached_total = total.is_some_and(|t| u64::from(offset) >= t);
            if received < step || reached_total {
                break;
            }
            if page_no + 1 == self.max_pages {
                warn!(max_pages = self.max_pages, "page cap reached, result may be partial");
            }
        }

        debug!(raw = raw.len(), "reconciling union of pages");
        let records = reconciler.reconcile(raw);
        Ok(self.store(&key, records, total).await)
    }

    async fn cached(&self, key: &CacheKey, reconciler: &Reconciler, stale: bool) -> Option<AggregateResult> {
        let dataset: CachedDataset = self.cache.get(key.as_str()).await?;
        let tier = self.cache.active_tier();
        let provenance = if stale {
            Provenance::StaleCached { tier }
        } else {
            Provenance::Cached { tier }
        };
        debug!(key = %key, source = provenance.source(), "serving cached dataset");
        metrics::record_query_response(provenance.source());
        Some(AggregateResult {
            records: reconciler.reconcile(dataset.records),
            total: dataset.total,
            provenance,
        })
    }

    async fn store(&self, key: &CacheKey, records: CanonicalSeries, total: Option<u64>) -> AggregateResult {
        let dataset = CachedDataset {
            records: &records,
            total,
        };
        self.cache.set(key.as_str(), &dataset, self.ttl).await;
        info!(key = %key, records = records.len(), "cached fresh dataset");
        metrics::record_query_response(Provenance::Fresh.source());
        AggregateResult {
            records,
            total,
            provenance: Provenance::Fresh,
        }
    }

    async fn stale_or(
        &self,
        key: &CacheKey,
        reconciler: &Reconciler,
        error: UpstreamError,
    ) -> Result<AggregateResult, UpstreamError> {
        if !error.is_recoverable() {
            return Err(error);
        }
        match self.cached(key, reconciler, true).await {
            Some(stale) => {
                warn!(key = %key, error = %error, "upstream failed, serving stale cache");
                Ok(stale)
            }
            None => Err(error),
        }
    }
}
