//! Fitted regression pipeline stored as JSON.
//!
//! The artifact mirrors the usual tabular preprocessing: numeric columns
//! are standardized and weighted, categorical columns are one-hot encoded
//! with unseen categories ignored, and the contributions are summed onto
//! an intercept.
//!
//! ```json
//! {
//!   "intercept": 512000.0,
//!   "numeric": [
//!     { "name": "year", "mean": 2013.8, "scale": 4.0, "weight": 91000.0 }
//!   ],
//!   "categorical": [
//!     { "name": "fuel", "weights": { "Diesel": 64000.0, "Petrol": -21000.0 } }
//!   ]
//! }
//! ```

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::{InferenceError, ModelInput};
use crate::features::FieldValue;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumericFeature {
    pub name: String,
    pub mean: f64,
    pub scale: f64,
    pub weight: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoricalFeature {
    pub name: String,
    pub weights: HashMap<String, f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub intercept: f64,
    #[serde(default)]
    pub numeric: Vec<NumericFeature>,
    #[serde(default)]
    pub categorical: Vec<CategoricalFeature>,
}

impl ModelArtifact {
    pub async fn load(path: &Path) -> Result<Self, InferenceError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| InferenceError::Read {
                path: path.to_owned(),
                source,
            })?;
        serde_json::from_slice(&bytes).map_err(|source| InferenceError::Malformed {
            path: path.to_owned(),
            source,
        })
    }

    pub fn predict(&self, input: &ModelInput) -> Result<f64, InferenceError> {
        let mut total = self.intercept;

        for feature in &self.numeric {
            let x = lookup(input, &feature.name)?
                .as_f64()
                .ok_or_else(|| InferenceError::InvalidFeature {
                    feature: feature.name.clone(),
                    expected: "numeric",
                })?;
            // Zero-variance columns were left unscaled at fit time.
            let scale = if feature.scale == 0.0 { 1.0 } else { feature.scale };
            total += feature.weight * (x - feature.mean) / scale;
        }

        for feature in &self.categorical {
            let category = lookup(input, &feature.name)?
                .as_text()
                .ok_or_else(|| InferenceError::InvalidFeature {
                    feature: feature.name.clone(),
                    expected: "a string",
                })?;
            total += feature.weights.get(category).copied().unwrap_or(0.0);
        }

        if !total.is_finite() {
            return Err(InferenceError::NonFinite(total));
        }
        Ok(total)
    }
}

fn lookup<'a>(
    input: &'a ModelInput,
    name: &str,
) -> Result<&'a FieldValue, InferenceError> {
    input
        .get(name)
        .ok_or_else(|| InferenceError::MissingFeature(name.to_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model() -> ModelArtifact {
        serde_json::from_str(
            r#"{
                "intercept": 1000.0,
                "numeric": [
                    { "name": "year", "mean": 2010.0, "scale": 5.0, "weight": 50.0 },
                    { "name": "seats", "mean": 5.0, "scale": 0.0, "weight": 10.0 }
                ],
                "categorical": [
                    { "name": "fuel", "weights": { "Diesel": 200.0, "Petrol": -100.0 } }
                ]
            }"#,
        )
        .unwrap()
    }

    fn input(year: i64, seats: f64, fuel: &str) -> ModelInput {
        let mut input = ModelInput::new();
        input.insert("year", FieldValue::Integer(year));
        input.insert("seats", FieldValue::Float(seats));
        input.insert("fuel", FieldValue::Text(fuel.into()));
        input
    }

    #[test]
    fn sums_standardized_and_one_hot_contributions() {
        // 1000 + 50 * (2015 - 2010) / 5 + 10 * (7 - 5) / 1 - 100
        assert_eq!(model().predict(&input(2015, 7.0, "Petrol")).unwrap(), 970.0);
    }

    #[test]
    fn unknown_category_contributes_nothing() {
        assert_eq!(model().predict(&input(2010, 5.0, "Hydrogen")).unwrap(), 1000.0);
    }

    #[test]
    fn missing_feature_is_rejected() {
        let mut partial = ModelInput::new();
        partial.insert("year", FieldValue::Integer(2015));
        assert!(matches!(
            model().predict(&partial),
            Err(InferenceError::MissingFeature(name)) if name == "seats"
        ));
    }

    #[test]
    fn wrong_kind_is_rejected() {
        let mut bad = ModelInput::new();
        bad.insert("year", FieldValue::Integer(2015));
        bad.insert("seats", FieldValue::Float(5.0));
        bad.insert("fuel", FieldValue::Float(1.0));
        assert!(matches!(
            model().predict(&bad),
            Err(InferenceError::InvalidFeature { feature, .. }) if feature == "fuel"
        ));
    }

    #[test]
    fn non_finite_output_is_rejected() {
        let mut overflowing = model();
        overflowing.intercept = f64::MAX;
        overflowing.numeric[0].weight = f64::MAX;
        assert!(matches!(
            overflowing.predict(&input(2020, 5.0, "Petrol")),
            Err(InferenceError::NonFinite(_))
        ));
    }
}
