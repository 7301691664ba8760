//! Logical queries and their cache keys.

use std::fmt;

/// Page size used when the caller does not specify one.
pub const DEFAULT_LIMIT: u32 = 200;

const KEY_NAMESPACE: &str = "mgnrega";

/// A filtered, paginated request for district statistics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatsQuery {
    pub region: String,
    pub sub_region: Option<String>,
    pub fiscal_year: Option<String>,
    pub limit: u32,
    pub offset: u32,
}

impl StatsQuery {
    pub fn new(region: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            sub_region: None,
            fiscal_year: None,
            limit: DEFAULT_LIMIT,
            offset: 0,
        }
    }

    #[must_use]
    pub fn with_sub_region(mut self, sub_region: impl Into<String>) -> Self {
        self.sub_region = Some(sub_region.into());
        self
    }

    #[must_use]
    pub fn with_fiscal_year(mut self, fiscal_year: impl Into<String>) -> Self {
        self.fiscal_year = Some(fiscal_year.into());
        self
    }

    #[must_use]
    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self
    }

    #[must_use]
    pub fn with_offset(mut self, offset: u32) -> Self {
        self.offset = offset;
        self
    }

    /// Same query with region and sub-region upper-cased. The fiscal year is
    /// left as is.
    #[must_use]
    pub fn upper_cased(&self) -> Self {
        Self {
            region: self.region.to_uppercase(),
            sub_region: self.sub_region.as_deref().map(str::to_uppercase),
            ..self.clone()
        }
    }

    /// Key for this exact page.
    pub fn cache_key(&self) -> CacheKey {
        self.key_with_offset(&self.offset.to_string())
    }

    /// Key for the union of all pages starting at `offset`.
    pub fn fetch_all_key(&self) -> CacheKey {
        self.key_with_offset(&format!("all@{}", self.offset))
    }

    fn key_with_offset(&self, offset: &str) -> CacheKey {
        let segment = |value: &str| urlencoding::encode(value).into_owned();
        CacheKey(format!(
            "{KEY_NAMESPACE}:{}:{}:{}:{}:{}",
            segment(&self.region),
            segment(self.sub_region.as_deref().unwrap_or("")),
            segment(self.fiscal_year.as_deref().unwrap_or("")),
            self.limit,
            offset,
        ))
    }
}

/// Opaque cache key derived from the stable dimensions of a [`StatsQuery`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
