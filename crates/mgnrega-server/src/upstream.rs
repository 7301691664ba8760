//! data.gov.in resource client.

use mgnrega_core::{Record, StatsQuery};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::config::UpstreamConfig;
use crate::metrics;

#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    /// Resource id or API key missing. Raised before any network I/O.
    #[error("upstream not configured: {0}")]
    Configuration(String),

    /// Transport failure or timeout.
    #[error("upstream unavailable: {0}")]
    Unavailable(String),

    /// Upstream answered, but not with a usable success body.
    #[error("bad upstream response (status {status})")]
    BadResponse { status: u16, body: String },
}

impl UpstreamError {
    /// Whether a stale cache entry may stand in for the failed fetch.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, UpstreamError::Configuration(_))
    }
}

/// One page of raw upstream records.
#[derive(Debug, Clone, Default)]
pub struct UpstreamPage {
    pub records: Vec<Record>,
    /// Total matching rows, when upstream reports it.
    pub total: Option<u64>,
}

#[derive(Deserialize)]
struct ResourceResponse {
    #[serde(default)]
    records: Vec<Record>,
    #[serde(default)]
    total: Option<Value>,
}

struct Credentials<'a> {
    resource_id: &'a str,
    api_key: &'a str,
}

pub struct UpstreamClient {
    http_client: Client,
    base_url: String,
    resource_id: Option<String>,
    api_key: Option<String>,
}

impl UpstreamClient {
    /// Build the client. Missing credentials are not an error here; every
    /// `fetch` reports them instead.
    pub fn from_config(config: &UpstreamConfig) -> Result<Self, UpstreamError> {
        let http_client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| UpstreamError::Configuration(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http_client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            resource_id: non_empty(config.resource_id.as_deref()),
            api_key: non_empty(config.api_key.as_deref()),
        })
    }

    pub fn is_configured(&self) -> bool {
        self.resource_id.is_some() && self.api_key.is_some()
    }

    /// Fetch one page.
    ///
    /// When the filters as given match nothing, the query is repeated once
    /// with region and sub-region upper-cased. If that also fails or comes
    /// back empty, the (empty) primary result is returned.
    pub async fn fetch(&self, query: &StatsQuery) -> Result<UpstreamPage, UpstreamError> {
        self.fetch_resolved(query).await.map(|(page, _)| page)
    }

    /// Like [`fetch`](Self::fetch), also returning the query whose filters
    /// produced the page. Follow-up pages of the same listing should be
    /// requested with that query through [`fetch_exact`](Self::fetch_exact).
    #[instrument(skip_all, fields(region = %query.region, sub_region = ?query.sub_region, offset = query.offset))]
    pub async fn fetch_resolved(
        &self,
        query: &StatsQuery,
    ) -> Result<(UpstreamPage, StatsQuery), UpstreamError> {
        let credentials = self.credentials()?;

        let primary = self.request(&credentials, query).await?;
        if !primary.records.is_empty() {
            return Ok((primary, query.clone()));
        }

        let retry_query = query.upper_cased();
        debug!(region = %retry_query.region, "no records for given casing, retrying upper-cased");
        match self.request(&credentials, &retry_query).await {
            Ok(retry) if !retry.records.is_empty() => {
                info!(records = retry.records.len(), "upper-cased retry matched");
                metrics::record_case_retry(true);
                Ok((retry, retry_query))
            }
            Ok(_) => {
                metrics::record_case_retry(false);
                Ok((primary, query.clone()))
            }
            Err(e) => {
                warn!(error = %e, "upper-cased retry failed, keeping primary result");
                metrics::record_case_retry(false);
                Ok((primary, query.clone()))
            }
        }
    }

    /// Fetch one page with the filters exactly as given. No casing retry.
    #[instrument(skip_all, fields(region = %query.region, sub_region = ?query.sub_region, offset = query.offset))]
    pub async fn fetch_exact(&self, query: &StatsQuery) -> Result<UpstreamPage, UpstreamError> {
        let credentials = self.credentials()?;
        self.request(&credentials, query).await
    }

    fn credentials(&self) -> Result<Credentials<'_>, UpstreamError> {
        let resource_id = self
            .resource_id
            .as_deref()
            .ok_or_else(|| UpstreamError::Configuration("resource id is not set".into()))?;
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| UpstreamError::Configuration("API key is not set".into()))?;
        Ok(Credentials {
            resource_id,
            api_key,
        })
    }

    async fn request(
        &self,
        credentials: &Credentials<'_>,
        query: &StatsQuery,
    ) -> Result<UpstreamPage, UpstreamError> {
        let url = format!("{}/resource/{}", self.base_url, credentials.resource_id);

        let mut params: Vec<(&str, String)> = vec![
            ("api-key", credentials.api_key.to_string()),
            ("format", "json".to_string()),
            ("limit", query.limit.to_string()),
            ("offset", query.offset.to_string()),
            ("filters[state_name]", query.region.clone()),
        ];
        if let Some(sub_region) = &query.sub_region {
            params.push(("filters[district_name]", sub_region.clone()));
        }
        if let Some(fiscal_year) = &query.fiscal_year {
            params.push(("filters[fin_year]", fiscal_year.clone()));
        }

        // The URL carries the API key; strip it from every error.
        let response = self
            .http_client
            .get(&url)
            .query(&params)
            .send()
            .await
            .map_err(|e| {
                metrics::record_upstream_request("unavailable");
                if e.is_timeout() {
                    UpstreamError::Unavailable(format!("request timed out: {}", e.without_url()))
                } else {
                    UpstreamError::Unavailable(e.without_url().to_string())
                }
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            metrics::record_upstream_request("unavailable");
            UpstreamError::Unavailable(format!("failed to read body: {}", e.without_url()))
        })?;

        if !status.is_success() {
            warn!(status = status.as_u16(), "upstream returned non-success status");
            metrics::record_upstream_request("bad_response");
            return Err(UpstreamError::BadResponse {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ResourceResponse = serde_json::from_str(&body).map_err(|e| {
            warn!(error = %e, "upstream body is not a resource response");
            metrics::record_upstream_request("bad_response");
            UpstreamError::BadResponse {
                status: status.as_u16(),
                body: body.clone(),
            }
        })?;

        let page = UpstreamPage {
            total: parsed.total.as_ref().and_then(parse_total),
            records: parsed.records,
        };
        metrics::record_upstream_request(if page.records.is_empty() { "empty" } else { "ok" });
        debug!(records = page.records.len(), total = ?page.total, "upstream page received");
        Ok(page)
    }
}

/// `total` arrives as a number or a numeric string.
fn parse_total(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn total_accepts_numbers_and_numeric_strings() {
        assert_eq!(parse_total(&json!(42)), Some(42));
        assert_eq!(parse_total(&json!(" 17 ")), Some(17));
        assert_eq!(parse_total(&json!("many")), None);
        assert_eq!(parse_total(&json!(null)), None);
    }

    #[test]
    fn only_configuration_errors_are_unrecoverable() {
        assert!(!UpstreamError::Configuration("x".into()).is_recoverable());
        assert!(UpstreamError::Unavailable("x".into()).is_recoverable());
        assert!(
            UpstreamError::BadResponse {
                status: 500,
                body: String::new()
            }
            .is_recoverable()
        );
    }

    #[test]
    fn blank_credentials_count_as_missing() {
        let client = UpstreamClient::from_config(&UpstreamConfig {
            resource_id: Some("  ".into()),
            api_key: Some("key".into()),
            ..UpstreamConfig::default()
        })
        .unwrap();
        assert!(!client.is_configured());
    }
}
