use axum::{
    Json,
    extract::{Query, State, rejection::QueryRejection},
    http::{StatusCode, header},
    response::IntoResponse,
};
use mgnrega_core::{CanonicalSeries, StatsQuery};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::aggregator::AggregateResult;
use crate::error::ApiError;
use crate::server::AppState;

#[derive(Serialize)]
pub struct HealthResponse<'a> {
    status: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadinessResponse {
    status: &'static str,
    cache_tier: &'static str,
    remote_cache: bool,
    upstream_configured: bool,
}

pub async fn root() -> impl IntoResponse {
    let body = json!({
        "service": "MGNREGA statistics gateway",
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    });
    (StatusCode::OK, Json(body))
}

pub async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, Json(HealthResponse { status: "ok" }))
}

/// Ready once upstream credentials are present. Reports the active cache tier
/// either way.
pub async fn readyz(State(state): State<AppState>) -> impl IntoResponse {
    let cache = state.aggregator.cache();
    let upstream_configured = state.aggregator.upstream().is_configured();
    let (status, label) = if upstream_configured {
        (StatusCode::OK, "ready")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "unconfigured")
    };
    let body = ReadinessResponse {
        status: label,
        cache_tier: cache.active_tier().name(),
        remote_cache: cache.is_remote_configured(),
        upstream_configured,
    };
    (status, Json(body))
}

pub async fn metrics() -> impl IntoResponse {
    match crate::metrics::render_metrics() {
        Some(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        None => (StatusCode::SERVICE_UNAVAILABLE, "metrics recorder not installed").into_response(),
    }
}

/// Raw query string. Everything arrives as text so empty values can be
/// treated as absent.
#[derive(Debug, Default, Deserialize)]
pub struct StatsParams {
    #[serde(alias = "state")]
    pub region: Option<String>,
    #[serde(alias = "district")]
    pub sub_region: Option<String>,
    #[serde(alias = "fin_year")]
    pub fiscal_year: Option<String>,
    pub limit: Option<String>,
    pub offset: Option<String>,
    pub all: Option<String>,
}

#[derive(Serialize)]
pub struct StatsResponse {
    source: &'static str,
    #[serde(rename = "cacheType", skip_serializing_if = "Option::is_none")]
    cache_type: Option<&'static str>,
    records: CanonicalSeries,
    #[serde(skip_serializing_if = "Option::is_none")]
    total: Option<u64>,
}

impl From<AggregateResult> for StatsResponse {
    fn from(result: AggregateResult) -> Self {
        Self {
            source: result.provenance.source(),
            cache_type: result.provenance.cache_type(),
            records: result.records,
            total: result.total,
        }
    }
}

pub async fn mgnrega_stats(
    State(state): State<AppState>,
    params: Result<Query<StatsParams>, QueryRejection>,
) -> Result<Json<StatsResponse>, ApiError> {
    // Duplicate or conflicting parameters (`state` alongside `region`) fail here
    let Query(params) = params.map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;
    let (query, all) = params.into_query(&state.query)?;
    tracing::debug!(region = %query.region, sub_region = ?query.sub_region, fiscal_year = ?query.fiscal_year, all, "stats query");

    let result = if all {
        state.aggregator.fetch_all(&query).await?
    } else {
        state.aggregator.fetch(&query).await?
    };
    Ok(Json(result.into()))
}

impl StatsParams {
    /// Validate and apply defaults.
    pub fn into_query(
        self,
        settings: &crate::config::QuerySettings,
    ) -> Result<(StatsQuery, bool), ApiError> {
        let region = present(self.region).unwrap_or_else(|| settings.default_region.clone());

        let limit = match present(self.limit) {
            Some(raw) => parse_number("limit", &raw)?,
            None => settings.default_limit,
        };
        if limit == 0 || limit > settings.max_limit {
            return Err(ApiError::BadRequest(format!(
                "limit must be between 1 and {}",
                settings.max_limit
            )));
        }
        let offset = match present(self.offset) {
            Some(raw) => parse_number("offset", &raw)?,
            None => 0,
        };
        let all = match present(self.all) {
            Some(raw) => parse_flag(&raw)?,
            None => false,
        };

        let mut query = StatsQuery::new(region).with_limit(limit).with_offset(offset);
        if let Some(sub_region) = present(self.sub_region) {
            query = query.with_sub_region(sub_region);
        }
        if let Some(fiscal_year) = present(self.fiscal_year) {
            query = query.with_fiscal_year(fiscal_year);
        }
        Ok((query, all))
    }
}

fn present(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_number(name: &str, raw: &str) -> Result<u32, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::BadRequest(format!("{name} must be a non-negative integer, got {raw:?}")))
}

fn parse_flag(raw: &str) -> Result<bool, ApiError> {
    match raw.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(ApiError::BadRequest(format!("all must be a boolean, got {raw:?}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::QuerySettings;

    fn params(pairs: &[(&str, &str)]) -> StatsParams {
        let encoded = pairs
            .iter()
            .map(|(k, v)| format!("{k}={}", urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&");
        Query::<StatsParams>::try_from_uri(&format!("/api/mgnrega?{encoded}").parse::<axum::http::Uri>().unwrap())
            .unwrap()
            .0
    }

    #[test]
    fn applies_defaults() {
        let (query, all) = StatsParams::default()
            .into_query(&QuerySettings::default())
            .unwrap();
        assert_eq!(query, StatsQuery::new("Bihar"));
        assert!(!all);
    }

    #[test]
    fn accepts_legacy_parameter_names() {
        let (query, _) = params(&[("state", "Jharkhand"), ("district", "Ranchi"), ("fin_year", "2024-2025")])
            .into_query(&QuerySettings::default())
            .unwrap();
        assert_eq!(
            query,
            StatsQuery::new("Jharkhand")
                .with_sub_region("Ranchi")
                .with_fiscal_year("2024-2025")
        );
    }

    #[test]
    fn empty_values_are_absent() {
        let (query, _) = params(&[("region", ""), ("sub_region", " "), ("limit", ""), ("offset", "")])
            .into_query(&QuerySettings::default())
            .unwrap();
        assert_eq!(query, StatsQuery::new("Bihar"));
    }

    #[test]
    fn rejects_out_of_range_limits() {
        let settings = QuerySettings::default();
        for limit in ["0", "1001", "-5", "ten"] {
            let err = params(&[("limit", limit)]).into_query(&settings).unwrap_err();
            assert_eq!(err.status(), StatusCode::BAD_REQUEST, "limit={limit}");
        }
    }

    #[test]
    fn conflicting_aliases_are_rejected_by_the_extractor() {
        for raw in ["/api/mgnrega?state=Jharkhand&region=Bihar", "/api/mgnrega?state=A&state=B"] {
            let uri = raw.parse::<axum::http::Uri>().unwrap();
            let rejection = Query::<StatsParams>::try_from_uri(&uri).unwrap_err();
            assert!(rejection.body_text().contains("duplicate field"), "{raw}");
        }
    }

    #[test]
    fn parses_all_flag() {
        let settings = QuerySettings::default();
        let (_, all) = params(&[("all", "true")]).into_query(&settings).unwrap();
        assert!(all);
        assert!(params(&[("all", "maybe")]).into_query(&settings).is_err());
    }
}
