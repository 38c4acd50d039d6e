//! Field conversion for result rows.
//!
//! Some data-agent deployments return numeric columns as strings. A
//! [`FieldConversions`] table maps field names to a [`Conversion`] which is
//! applied to every row of a result that contains the field.

use std::collections::BTreeMap;
use std::str::FromStr;

use serde_json::{Number, Value};

use crate::error::{ConvertError, ParseConversionError};

/// A named value conversion.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Conversion {
    /// Parse the value as an integer.
    ///
    /// Accepts integers, integral strings (surrounding whitespace allowed),
    /// floats (truncated toward zero) and booleans.
    ToInt,
}

impl Conversion {
    /// Get the configuration name of this conversion.
    pub fn as_str(&self) -> &'static str {
        match self {
            Conversion::ToInt => "to_int",
        }
    }

    /// Convert `value`, which was read from `field`.
    pub fn apply(&self, field: &str, value: &Value) -> Result<Value, ConvertError> {
        match self {
            Conversion::ToInt => to_int(value).map_err(|reason| ConvertError {
                field: field.to_string(),
                conversion: self.as_str(),
                value: value.clone(),
                reason,
            }),
        }
    }
}

impl FromStr for Conversion {
    type Err = ParseConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "to_int" => Ok(Conversion::ToInt),
            _ => Err(ParseConversionError(s.to_string())),
        }
    }
}

impl std::fmt::Display for Conversion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn to_int(value: &Value) -> Result<Value, String> {
    match value {
        Value::Number(n) if n.is_i64() || n.is_u64() => Ok(value.clone()),
        Value::Number(n) => {
            let f = n.as_f64().ok_or_else(|| "not a finite number".to_string())?;
            let truncated = f.trunc();
            if !truncated.is_finite() || truncated < i64::MIN as f64 || truncated >= i64::MAX as f64 {
                return Err("out of integer range".to_string());
            }
            Ok(Value::Number(Number::from(truncated as i64)))
        }
        Value::String(s) => {
            let s = s.trim();
            if let Ok(i) = s.parse::<i64>() {
                return Ok(Value::Number(Number::from(i)));
            }
            s.parse::<u64>()
                .map(|u| Value::Number(Number::from(u)))
                .map_err(|e| e.to_string())
        }
        Value::Bool(b) => Ok(Value::Number(Number::from(i64::from(*b)))),
        Value::Null => Err("null is not an integer".to_string()),
        Value::Array(_) | Value::Object(_) => Err("not a scalar".to_string()),
    }
}

/// A table of field name to [`Conversion`].
///
/// # Example
///
/// ```
/// use dbagent_core::FieldConversions;
/// use serde_json::json;
///
/// let conversions = FieldConversions::parse([("foo", "to_int")]).unwrap();
///
/// let mut result = Some(json!({"foo": "1234", "bar": "1234"}));
/// conversions.apply(&mut result).unwrap();
/// assert_eq!(result, Some(json!({"foo": 1234, "bar": "1234"})));
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FieldConversions {
    fields: BTreeMap<String, Conversion>,
}

impl FieldConversions {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from `(field, conversion name)` pairs.
    ///
    /// Fails on the first unknown conversion name.
    pub fn parse<I, K, V>(pairs: I) -> Result<Self, ParseConversionError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: AsRef<str>,
    {
        let mut table = Self::new();
        for (field, name) in pairs {
            table = table.field(field, name.as_ref().parse()?);
        }
        Ok(table)
    }

    /// Add or replace the conversion for `field`.
    pub fn field<S: Into<String>>(mut self, field: S, conversion: Conversion) -> Self {
        self.fields.insert(field.into(), conversion);
        self
    }

    /// Get the conversion configured for `field`.
    pub fn get(&self, field: &str) -> Option<Conversion> {
        self.fields.get(field).copied()
    }

    /// Returns true if no conversion is configured.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Returns the number of configured fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Iterate over `(field, conversion)` pairs in field order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Conversion)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Apply the table to a result in place.
    ///
    /// A single row is converted as-is; a list converts each object row.
    /// An absent result is left alone.
    pub fn apply(&self, result: &mut Option<Value>) -> Result<(), ConvertError> {
        let Some(value) = result else {
            return Ok(());
        };
        if self.is_empty() {
            return Ok(());
        }

        match value {
            Value::Array(rows) => {
                for row in rows.iter_mut() {
                    self.apply_row(row)?;
                }
                Ok(())
            }
            row => self.apply_row(row),
        }
    }

    fn apply_row(&self, row: &mut Value) -> Result<(), ConvertError> {
        let Value::Object(row) = row else {
            return Ok(());
        };
        for (field, conversion) in &self.fields {
            if let Some(value) = row.get_mut(field) {
                *value = conversion.apply(field, value)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn to_int_table(field: &str) -> FieldConversions {
        FieldConversions::new().field(field, Conversion::ToInt)
    }

    #[test]
    fn test_conversion_from_str() {
        assert_eq!("to_int".parse::<Conversion>().unwrap(), Conversion::ToInt);
        assert_eq!(
            "to_float".parse::<Conversion>().unwrap_err(),
            ParseConversionError("to_float".to_string())
        );
    }

    #[test]
    fn test_parse_table() {
        let table = FieldConversions::parse([("foo", "to_int"), ("bar", "to_int")]).unwrap();
        assert_eq!(table.len(), 2);
        assert!(!table.is_empty());
        assert_eq!(
            table.iter().collect::<Vec<_>>(),
            vec![("bar", Conversion::ToInt), ("foo", Conversion::ToInt)]
        );
        assert_eq!(table.get("baz"), None);

        let replaced = table.field("foo", Conversion::ToInt);
        assert_eq!(replaced.len(), 2);
    }

    #[test]
    fn test_parse_table_rejects_unknown_name() {
        let err = FieldConversions::parse([("foo", "to_int"), ("bar", "nope")]).unwrap_err();
        assert_eq!(err.0, "nope");
    }

    #[test]
    fn test_to_int_values() {
        let c = Conversion::ToInt;
        assert_eq!(c.apply("f", &json!("1234")).unwrap(), json!(1234));
        assert_eq!(c.apply("f", &json!(" -7 ")).unwrap(), json!(-7));
        assert_eq!(c.apply("f", &json!(42)).unwrap(), json!(42));
        assert_eq!(c.apply("f", &json!(3.9)).unwrap(), json!(3));
        assert_eq!(c.apply("f", &json!(-3.9)).unwrap(), json!(-3));
        assert_eq!(c.apply("f", &json!(true)).unwrap(), json!(1));
        assert_eq!(
            c.apply("f", &json!("18446744073709551615")).unwrap(),
            json!(18446744073709551615u64)
        );
    }

    #[test]
    fn test_to_int_failures() {
        let c = Conversion::ToInt;
        for value in [json!("12a"), json!("1.5"), json!(""), json!(null), json!([1]), json!({})] {
            let err = c.apply("foo", &value).unwrap_err();
            assert_eq!(err.field, "foo");
            assert_eq!(err.conversion, "to_int");
            assert_eq!(err.value, value);
        }
    }

    #[test]
    fn test_single_row_keeps_shape() {
        let mut result = Some(json!({"foo": "1234", "bar": "1234"}));
        to_int_table("foo").apply(&mut result).unwrap();
        assert_eq!(result, Some(json!({"foo": 1234, "bar": "1234"})));
    }

    #[test]
    fn test_list_of_rows() {
        let mut result = Some(json!([{"foo": "1"}, {"bar": "2"}, {"foo": "3"}]));
        to_int_table("foo").apply(&mut result).unwrap();
        assert_eq!(result, Some(json!([{"foo": 1}, {"bar": "2"}, {"foo": 3}])));
    }

    #[test]
    fn test_absent_result_is_noop() {
        let mut result = None;
        to_int_table("foo").apply(&mut result).unwrap();
        assert_eq!(result, None);
    }

    #[test]
    fn test_failure_propagates() {
        let mut result = Some(json!([{"foo": "1"}, {"foo": "x"}]));
        let err = to_int_table("foo").apply(&mut result).unwrap_err();
        assert_eq!(err.value, json!("x"));
    }

    #[test]
    fn test_empty_table_is_noop() {
        let mut result = Some(json!({"foo": "1"}));
        FieldConversions::new().apply(&mut result).unwrap();
        assert_eq!(result, Some(json!({"foo": "1"})));
    }
}
