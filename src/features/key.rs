//! Cache key derivation.

use std::fmt;

use super::FeatureRecord;

/// A cache address derived from a [`FeatureRecord`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Turns feature records into cache keys.
///
/// The default key is every field value's canonical text concatenated in
/// contract order with no delimiter, which matches keys already written by
/// earlier deployments. That form is not injective (`"1","23"` and
/// `"12","3"` collide); [`KeyDeriver::with_separator`] opts into a
/// delimited form instead.
///
/// # Examples
///
/// ```
/// use carprice::features::{FeatureRecord, KeyDeriver};
///
/// let record: FeatureRecord = serde_json::from_value(serde_json::json!({
///     "company": "Toyota", "year": 2015, "owner": "First", "fuel": "Petrol",
///     "seller_type": "Individual", "transmission": "Manual", "km_driven": 50000,
///     "mileage_mpg": 18.5, "engine_cc": 1200, "max_power_bhp": 85, "torque": 113,
///     "seats": 5
/// })).unwrap();
///
/// let key = KeyDeriver::new().derive(&record);
/// assert_eq!(
///     key.as_str(),
///     "Toyota2015FirstPetrolIndividualManual50000.018.51200.085.0113.05.0"
/// );
/// ```
#[derive(Debug, Clone, Default)]
pub struct KeyDeriver {
    separator: Option<String>,
}

impl KeyDeriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Joins field values with `separator` instead of concatenating them.
    #[must_use]
    pub fn with_separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = Some(separator.into());
        self
    }

    pub fn derive(&self, record: &FeatureRecord) -> CacheKey {
        let separator = self.separator.as_deref().unwrap_or("");
        let mut key = String::with_capacity(96);
        for (i, (_, value)) in record.fields().iter().enumerate() {
            if i > 0 {
                key.push_str(separator);
            }
            key.push_str(&value.to_string());
        }
        CacheKey(key)
    }
}
