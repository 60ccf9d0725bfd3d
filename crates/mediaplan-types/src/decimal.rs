//! Decimal values on the JSON wire.
//!
//! Plan documents carry metrics and coefficients as JSON numbers, sometimes
//! as numeric strings. Both are read exactly. Values are written back as
//! JSON numbers when the number reads back as the same decimal, and as
//! numeric strings otherwise.

use std::str::FromStr;

use rust_decimal::Decimal;
use serde_json::{Number, Value};

/// Read a decimal from a JSON number or numeric string.
pub fn from_json(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                return Some(Decimal::from(i));
            }
            if let Some(u) = n.as_u64() {
                return Some(Decimal::from(u));
            }
            parse(&n.to_string())
        }
        Value::String(s) => parse(s.trim()),
        _ => None,
    }
}

fn parse(s: &str) -> Option<Decimal> {
    Decimal::from_str(s)
        .or_else(|_| Decimal::from_scientific(s))
        .ok()
}

/// Write a decimal as a JSON number, trailing zeros removed.
///
/// `serde_json` holds non-integer numbers as `f64`, so a value with more
/// significant digits than a float keeps is written as a numeric string.
pub fn to_json(value: Decimal) -> Value {
    let text = value.normalize().to_string();
    match Number::from_str(&text) {
        Ok(number) if parse(&number.to_string()) == Some(value) => Value::Number(number),
        _ => Value::String(text),
    }
}

/// `#[serde(with = "...")]` adapter for `Option<Decimal>` fields.
pub mod option {
    use rust_decimal::Decimal;
    use serde::{de::Error, Deserialize, Deserializer, Serialize, Serializer};
    use serde_json::Value;

    pub fn serialize<S: Serializer>(value: &Option<Decimal>, s: S) -> Result<S::Ok, S::Error> {
        value.map(super::to_json).serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Decimal>, D::Error> {
        match Option::<Value>::deserialize(d)? {
            None | Some(Value::Null) => Ok(None),
            Some(v) => super::from_json(&v)
                .map(Some)
                .ok_or_else(|| D::Error::custom(format!("not a decimal: {v}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reads_numbers_and_strings() {
        assert_eq!(from_json(&json!(10000)), Some(Decimal::from(10000)));
        assert_eq!(from_json(&json!(0.008)), Decimal::from_str("0.008").ok());
        assert_eq!(from_json(&json!(" 2.5 ")), Decimal::from_str("2.5").ok());
        assert_eq!(from_json(&json!("1e3")), Some(Decimal::from(1000)));
        assert_eq!(from_json(&json!("USD")), None);
        assert_eq!(from_json(&json!(true)), None);
    }

    #[test]
    fn writes_numbers() {
        assert_eq!(to_json(Decimal::from_str("1250000.000").unwrap()), json!(1250000));
        assert_eq!(to_json(Decimal::from_str("0.008").unwrap()), json!(0.008));
        assert_eq!(to_json(Decimal::from_str("-2.50").unwrap()), json!(-2.5));
    }

    #[test]
    fn keeps_digits_a_float_would_drop() {
        let third = Decimal::from(10000) / Decimal::from(3);
        let written = to_json(third);
        assert_eq!(written, json!("3333.3333333333333333333333333"));
        assert_eq!(from_json(&written), Some(third));

        let precise = Decimal::from_str("0.1234567890123456789").unwrap();
        assert_eq!(from_json(&to_json(precise)), Some(precise));
    }

    #[test]
    fn option_adapter_round_trips_exactly() {
        #[derive(serde::Serialize, serde::Deserialize)]
        struct Row {
            #[serde(with = "super::option", default)]
            value: Option<Decimal>,
        }

        let third = Decimal::from(10000) / Decimal::from(3);
        let text = serde_json::to_string(&Row { value: Some(third) }).unwrap();
        let back: Row = serde_json::from_str(&text).unwrap();
        assert_eq!(back.value, Some(third));
    }
}
