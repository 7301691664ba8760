//! Upstream statistics rows.
//!
//! The data.gov.in MGNREGA resource returns loosely typed JSON objects: the
//! same column may arrive as a number in one row and as a numeric string (or
//! `"NA"`) in the next. [`Record`] keeps every column in arrival order as a
//! [`FieldValue`] and offers accessors that treat absent or non-numeric values
//! as zero, which is what the cumulative counters need.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Number, Value};

/// Column names used by the reconciliation pipeline.
pub mod fields {
    pub const MONTH: &str = "month";
    pub const FIN_YEAR: &str = "fin_year";
    pub const STATE_NAME: &str = "state_name";
    pub const DISTRICT_NAME: &str = "district_name";

    pub const TOTAL_EXP: &str = "Total_Exp";
    pub const TOTAL_INDIVIDUALS_WORKED: &str = "Total_Individuals_Worked";
    pub const TOTAL_HOUSEHOLDS_WORKED: &str = "Total_Households_Worked";
    pub const TOTAL_JOB_CARDS_ISSUED: &str = "Total_No_of_JobCards_issued";
    pub const TOTAL_WORKERS: &str = "Total_No_of_Workers";
}

/// A single column value.
///
/// Booleans, arrays and objects are carried through untouched as `Other` so
/// the served record matches what upstream sent; they never count as numbers.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "Value")]
pub enum FieldValue {
    Number(Number),
    Text(String),
    Missing,
    Other(Value),
}

impl FieldValue {
    /// Numeric view of the value. Numeric strings are parsed; anything
    /// non-finite or unparseable yields `None`.
    pub fn as_f64(&self) -> Option<f64> {
        let n = match self {
            FieldValue::Number(n) => n.as_f64()?,
            FieldValue::Text(s) => s.trim().parse::<f64>().ok()?,
            FieldValue::Missing | FieldValue::Other(_) => return None,
        };
        n.is_finite().then_some(n)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, FieldValue::Missing)
    }
}

impl From<Value> for FieldValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Number(n) => FieldValue::Number(n),
            Value::String(s) => FieldValue::Text(s),
            Value::Null => FieldValue::Missing,
            other => FieldValue::Other(other),
        }
    }
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            FieldValue::Number(n) => n.serialize(serializer),
            FieldValue::Text(s) => serializer.serialize_str(s),
            FieldValue::Missing => serializer.serialize_none(),
            FieldValue::Other(v) => v.serialize(serializer),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Number(value.into())
    }
}

impl From<u64> for FieldValue {
    fn from(value: u64) -> Self {
        FieldValue::Number(value.into())
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        Number::from_f64(value).map_or(FieldValue::Missing, FieldValue::Number)
    }
}

/// One reporting period's statistics for one region at one snapshot in time.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    fields: IndexMap<String, FieldValue>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(mut self, field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.insert(field, value);
        self
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<FieldValue>) {
        self.fields.insert(field.into(), value.into());
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields.get(field)
    }

    /// Text value of a column, if present as a string.
    pub fn text(&self, field: &str) -> Option<&str> {
        self.get(field).and_then(FieldValue::as_str)
    }

    /// Numeric value of a column; missing or non-numeric columns count as zero.
    pub fn number(&self, field: &str) -> f64 {
        self.get(field).and_then(FieldValue::as_f64).unwrap_or(0.0)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn deserializes_mixed_column_types() {
        let record: Record = serde_json::from_value(json!({
            "month": "Apr",
            "Total_Exp": "1234.5",
            "Total_Households_Worked": 42,
            "Wages": null,
            "flag": true
        }))
        .unwrap();

        assert_eq!(record.text("month"), Some("Apr"));
        assert_eq!(record.number("Total_Exp"), 1234.5);
        assert_eq!(record.number("Total_Households_Worked"), 42.0);
        assert!(record.get("Wages").unwrap().is_missing());
        assert_eq!(record.get("flag"), Some(&FieldValue::Other(json!(true))));
        assert_eq!(record.text("flag"), None);
    }

    #[test]
    fn structured_values_survive_a_round_trip() {
        let raw = json!({
            "month": "Jun",
            "active": false,
            "blocks": ["Kanke", "Ormanjhi"],
            "meta": {"source": "nrega", "rev": 2}
        });
        let record: Record = serde_json::from_value(raw.clone()).unwrap();

        assert_eq!(record.number("active"), 0.0);
        assert_eq!(record.number("blocks"), 0.0);
        assert_eq!(serde_json::to_value(&record).unwrap(), raw);
    }

    #[test]
    fn non_numeric_values_count_as_zero() {
        let record = Record::new()
            .with("Total_Exp", "NA")
            .with("Total_No_of_Workers", "NaN");

        assert_eq!(record.number("Total_Exp"), 0.0);
        assert_eq!(record.number("Total_No_of_Workers"), 0.0);
        assert_eq!(record.number("absent"), 0.0);
    }

    #[test]
    fn serialization_preserves_field_order_and_numbers() {
        let record = Record::new()
            .with("month", "May")
            .with("Total_Exp", 500_i64)
            .with("Wages", FieldValue::Missing);

        let encoded = serde_json::to_string(&record).unwrap();
        assert_eq!(encoded, r#"{"month":"May","Total_Exp":500,"Wages":null}"#);
    }
}
