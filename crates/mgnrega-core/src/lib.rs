//! Domain types for MGNREGA district statistics.
//!
//! Everything in this crate is pure: no I/O, no clocks. The server crate owns
//! caching and upstream access and feeds raw [`Record`]s through the
//! [`Reconciler`] to obtain a [`CanonicalSeries`].

pub mod period;
pub mod query;
pub mod record;
pub mod reconcile;

pub use period::{FISCAL_MONTHS, KeyScope, PeriodKey, RegionKey, fiscal_month_index};
pub use query::{CacheKey, DEFAULT_LIMIT, StatsQuery};
pub use reconcile::{CanonicalSeries, Reconciler, ScoreWeights};
pub use record::{FieldValue, Record, fields};
