//! Feature records: the structured description of one car to be priced.
//!
//! A [`FeatureRecord`] is deserialized from the `/predict` request body and
//! never mutated afterwards. Its fields are always visited in the fixed
//! order given by [`FIELD_NAMES`]; both the cache key and the model input
//! depend on that order.

mod key;

pub use key::{CacheKey, KeyDeriver};

use std::fmt;

use serde::Deserialize;

/// Field names in contract order.
pub const FIELD_NAMES: [&str; 12] = [
    "company",
    "year",
    "owner",
    "fuel",
    "seller_type",
    "transmission",
    "km_driven",
    "mileage_mpg",
    "engine_cc",
    "max_power_bhp",
    "torque",
    "seats",
];

/// A single scalar feature value.
///
/// `Display` is the canonical text form used for cache keys: integers in
/// plain decimal, floats the way Python's `repr` prints them (`50000.0`,
/// `18.5`, `1e-05`, `1e+16`).
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Integer(i64),
    Float(f64),
}

impl FieldValue {
    /// Returns the value as a number, if it is one.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Text(_) => None,
            Self::Integer(v) => Some(*v as f64),
            Self::Float(v) => Some(*v),
        }
    }

    /// Returns the value as text, if it is text.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => f.write_str(s),
            Self::Integer(v) => write!(f, "{v}"),
            Self::Float(v) => write_float(f, *v),
        }
    }
}

// Same text as Python's `repr(float)`: shortest round-trip digits,
// positional for decimal exponents in -4..16 (with a trailing `.0` when
// integral), otherwise `<digits>e<sign><at least two exponent digits>`.
fn write_float(f: &mut fmt::Formatter<'_>, v: f64) -> fmt::Result {
    if v.is_nan() {
        return f.write_str("nan");
    }
    if v.is_infinite() {
        return f.write_str(if v > 0.0 { "inf" } else { "-inf" });
    }

    let scientific = format!("{v:e}");
    let (mantissa, exponent) = scientific
        .split_once('e')
        .map(|(m, e)| (m, e.parse::<i32>().unwrap_or(0)))
        .unwrap_or((scientific.as_str(), 0));

    if (-4..16).contains(&exponent) {
        let plain = v.to_string();
        if plain.contains('.') {
            f.write_str(&plain)
        } else {
            write!(f, "{plain}.0")
        }
    } else {
        let sign = if exponent < 0 { '-' } else { '+' };
        write!(f, "{mantissa}e{sign}{:02}", exponent.unsigned_abs())
    }
}

/// The request body of `POST /predict`.
///
/// Every field is required and none may be `null`; unknown extra fields are
/// ignored.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FeatureRecord {
    pub company: String,
    pub year: i64,
    pub owner: String,
    pub fuel: String,
    pub seller_type: String,
    pub transmission: String,
    pub km_driven: f64,
    pub mileage_mpg: f64,
    pub engine_cc: f64,
    pub max_power_bhp: f64,
    pub torque: f64,
    pub seats: f64,
}

impl FeatureRecord {
    /// Returns `(name, value)` pairs in [`FIELD_NAMES`] order.
    pub fn fields(&self) -> [(&'static str, FieldValue); 12] {
        [
            ("company", FieldValue::Text(self.company.clone())),
            ("year", FieldValue::Integer(self.year)),
            ("owner", FieldValue::Text(self.owner.clone())),
            ("fuel", FieldValue::Text(self.fuel.clone())),
            ("seller_type", FieldValue::Text(self.seller_type.clone())),
            ("transmission", FieldValue::Text(self.transmission.clone())),
            ("km_driven", FieldValue::Float(self.km_driven)),
            ("mileage_mpg", FieldValue::Float(self.mileage_mpg)),
            ("engine_cc", FieldValue::Float(self.engine_cc)),
            ("max_power_bhp", FieldValue::Float(self.max_power_bhp)),
            ("torque", FieldValue::Float(self.torque)),
            ("seats", FieldValue::Float(self.seats)),
        ]
    }
}
