//! Snapshot de-duplication and fiscal ordering.
//!
//! The upstream resource publishes several revisions of the same month. The
//! cumulative columns only ever grow between revisions, so the revision with
//! the highest weighted sum of those columns is the most recent one.
//!
//! ```text
//! raw pages ──► group by PeriodKey ──► keep max dominance score ──► sort Apr..Mar
//! ```

use indexmap::IndexMap;
use indexmap::map::Entry;
use serde::{Deserialize, Serialize};

use crate::period::{FISCAL_MONTHS, KeyScope, PeriodKey, fiscal_month_index};
use crate::record::{Record, fields};

/// Weights of the dominance score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreWeights {
    #[serde(default = "default_expenditure")]
    pub expenditure: f64,
    #[serde(default = "default_individuals")]
    pub individuals: f64,
    #[serde(default = "default_households")]
    pub households: f64,
    /// Applied to issued-to-date counters (job cards, workers).
    #[serde(default = "default_cumulative")]
    pub cumulative: f64,
}

fn default_expenditure() -> f64 {
    1000.0
}
fn default_individuals() -> f64 {
    10.0
}
fn default_households() -> f64 {
    1.0
}
fn default_cumulative() -> f64 {
    0.01
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            expenditure: default_expenditure(),
            individuals: default_individuals(),
            households: default_households(),
            cumulative: default_cumulative(),
        }
    }
}

impl ScoreWeights {
    pub fn score(&self, record: &Record) -> f64 {
        record.number(fields::TOTAL_EXP) * self.expenditure
            + record.number(fields::TOTAL_INDIVIDUALS_WORKED) * self.individuals
            + record.number(fields::TOTAL_HOUSEHOLDS_WORKED) * self.households
            + (record.number(fields::TOTAL_JOB_CARDS_ISSUED) + record.number(fields::TOTAL_WORKERS))
                * self.cumulative
    }

    pub fn is_valid(&self) -> bool {
        [self.expenditure, self.individuals, self.households, self.cumulative]
            .iter()
            .all(|w| w.is_finite() && *w >= 0.0)
    }
}

/// Records reduced to one snapshot per period, in fiscal-month order.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(transparent)]
pub struct CanonicalSeries(Vec<Record>);

impl CanonicalSeries {
    pub fn records(&self) -> &[Record] {
        &self.0
    }

    pub fn into_records(self) -> Vec<Record> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Record> {
        self.0.iter()
    }
}

impl<'a> IntoIterator for &'a CanonicalSeries {
    type Item = &'a Record;
    type IntoIter = std::slice::Iter<'a, Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Pure reduction of raw records into a [`CanonicalSeries`].
#[derive(Debug, Clone, Copy, Default)]
pub struct Reconciler {
    weights: ScoreWeights,
    scope: KeyScope,
}

impl Reconciler {
    pub fn new(weights: ScoreWeights, scope: KeyScope) -> Self {
        Self { weights, scope }
    }

    #[must_use]
    pub fn with_scope(mut self, scope: KeyScope) -> Self {
        self.scope = scope;
        self
    }

    pub fn scope(&self) -> KeyScope {
        self.scope
    }

    pub fn weights(&self) -> &ScoreWeights {
        &self.weights
    }

    /// Group by period, keep the dominant snapshot, order Apr..Mar.
    ///
    /// A later snapshot only replaces the held one when its score is strictly
    /// greater. Groups keep the position of their first-seen record, and the
    /// final sort is stable, so unrecognised labels trail in arrival order.
    pub fn reconcile<I>(&self, records: I) -> CanonicalSeries
    where
        I: IntoIterator<Item = Record>,
    {
        let mut best: IndexMap<PeriodKey, (f64, Record)> = IndexMap::new();

        for record in records {
            let key = PeriodKey::from_record(&record, self.scope);
            let score = self.weights.score(&record);
            match best.entry(key) {
                Entry::Occupied(mut held) => {
                    if score > held.get().0 {
                        held.insert((score, record));
                    }
                }
                Entry::Vacant(slot) => {
                    slot.insert((score, record));
                }
            }
        }

        let mut selected: Vec<Record> = best.into_values().map(|(_, record)| record).collect();
        selected.sort_by_key(|record| {
            record
                .text(fields::MONTH)
                .and_then(fiscal_month_index)
                .unwrap_or(FISCAL_MONTHS.len())
        });

        CanonicalSeries(selected)
    }
}
