use std::collections::BTreeSet;
use std::ops::RangeInclusive;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{Axis, EngineError};
use crate::model::CoefficientModel;

pub const XP_PENALTY_DOMAIN: RangeInclusive<f64> = 0.0..=100.0;

/// Per-request scoring input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionAttributes {
    pub position: String,
    pub year: String,
    pub dev_trait: String,
    #[serde(default)]
    pub xp_penalty: f64,
    /// Enabled ability ids. Ids outside the model's vocabulary are ignored.
    #[serde(default)]
    pub abilities: BTreeSet<String>,
}

impl PredictionAttributes {
    pub fn new(position: &str, year: &str, dev_trait: &str) -> Self {
        Self {
            position: position.to_string(),
            year: year.to_string(),
            dev_trait: dev_trait.to_string(),
            xp_penalty: 0.0,
            abilities: BTreeSet::new(),
        }
    }

    /// Every axis at its reference category, no penalty, no abilities.
    pub fn reference(model: &CoefficientModel) -> Self {
        Self::new(
            model.positions().reference(),
            model.years().reference(),
            model.dev_traits().reference(),
        )
    }

    pub fn with_xp_penalty(mut self, xp_penalty: f64) -> Self {
        self.xp_penalty = xp_penalty;
        self
    }

    pub fn with_ability(mut self, id: &str) -> Self {
        self.abilities.insert(id.to_string());
        self
    }

    pub fn has_ability(&self, id: &str) -> bool {
        self.abilities.contains(id)
    }
}

/// Term-by-term view of one prediction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreBreakdown {
    pub intercept: f64,
    pub position: f64,
    pub year: f64,
    pub dev_trait: f64,
    pub xp_penalty: f64,
    pub abilities: Vec<(String, f64)>,
    pub raw: f64,
    pub value: f64,
}

impl ScoreBreakdown {
    pub fn floored(&self) -> bool {
        self.value != self.raw
    }
}

pub fn score_breakdown(
    attrs: &PredictionAttributes,
    model: &CoefficientModel,
) -> Result<ScoreBreakdown, EngineError> {
    if !attrs.xp_penalty.is_finite() || !XP_PENALTY_DOMAIN.contains(&attrs.xp_penalty) {
        return Err(EngineError::InvalidAttribute {
            field: "xp_penalty",
            reason: format!("{} is outside 0-100", attrs.xp_penalty),
        });
    }

    let position = model.category_weight(Axis::Position, &attrs.position)?;
    let year = model.category_weight(Axis::Year, &attrs.year)?;
    let dev_trait = model.category_weight(Axis::DevTrait, &attrs.dev_trait)?;
    let xp_penalty = model.xp_penalty_weight() * attrs.xp_penalty;

    // Canonical order keeps the float sum independent of caller set order.
    let abilities: Vec<(String, f64)> = model
        .abilities()
        .iter()
        .filter(|a| attrs.has_ability(&a.id))
        .map(|a| (a.id.clone(), a.weight))
        .collect();

    let mut raw = model.intercept() + position + year + dev_trait + xp_penalty;
    for (_, weight) in &abilities {
        raw += weight;
    }
    let value = if model.floor_at_zero() { raw.max(0.0) } else { raw };

    Ok(ScoreBreakdown {
        intercept: model.intercept(),
        position,
        year,
        dev_trait,
        xp_penalty,
        abilities,
        raw,
        value,
    })
}

/// Predicted skill points for `attrs` under `model`.
pub fn score(attrs: &PredictionAttributes, model: &CoefficientModel) -> Result<f64, EngineError> {
    score_breakdown(attrs, model).map(|b| b.value)
}

/// Scores many inputs in parallel; results keep input order.
pub fn score_many(
    items: &[PredictionAttributes],
    model: &CoefficientModel,
) -> Vec<Result<f64, EngineError>> {
    items.par_iter().map(|attrs| score(attrs, model)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AbilityWeight, CategoryLevel, CoefficientModelArtifact, DevTraitLevel, FitStats};

    fn model(floor: bool) -> CoefficientModel {
        CoefficientModel::from_artifact(CoefficientModelArtifact {
            version: "t".into(),
            label: String::new(),
            description: String::new(),
            stats: FitStats::default(),
            floor_at_zero: floor,
            intercept: 10.0,
            xp_penalty_weight: -1.0,
            positions: vec![CategoryLevel {
                name: "QB".into(),
                weight: 0.0,
            }],
            years: vec![CategoryLevel {
                name: "FR".into(),
                weight: 0.0,
            }],
            dev_traits: vec![DevTraitLevel {
                name: "Elite".into(),
                weight: 0.0,
                rank: 4,
            }],
            abilities: vec![AbilityWeight {
                id: "A".into(),
                label: String::new(),
                weight: 2.5,
            }],
        })
        .unwrap()
    }

    #[test]
    fn unknown_abilities_are_ignored() {
        let m = model(true);
        let attrs = PredictionAttributes::reference(&m)
            .with_ability("A")
            .with_ability("NOT_IN_MODEL");
        assert!((score(&attrs, &m).unwrap() - 12.5).abs() < 1e-12);
    }

    #[test]
    fn floor_is_a_model_property() {
        let attrs = PredictionAttributes::reference(&model(true)).with_xp_penalty(40.0);
        let floored = score_breakdown(&attrs, &model(true)).unwrap();
        assert_eq!(floored.value, 0.0);
        assert!(floored.floored());
        assert!((score(&attrs, &model(false)).unwrap() + 30.0).abs() < 1e-12);
    }

    #[test]
    fn penalty_outside_domain_is_rejected() {
        let m = model(true);
        let attrs = PredictionAttributes::reference(&m).with_xp_penalty(101.0);
        assert!(matches!(
            score(&attrs, &m),
            Err(EngineError::InvalidAttribute { field: "xp_penalty", .. })
        ));
        let attrs = PredictionAttributes::reference(&m).with_xp_penalty(f64::NAN);
        assert!(score(&attrs, &m).is_err());
    }

    #[test]
    fn score_many_keeps_order() {
        let m = model(false);
        let items = vec![
            PredictionAttributes::reference(&m),
            PredictionAttributes::new("WR", "FR", "Elite"),
            PredictionAttributes::reference(&m).with_ability("A"),
        ];
        let out = score_many(&items, &m);
        assert!((out[0].clone().unwrap() - 10.0).abs() < 1e-12);
        assert!(out[1].is_err());
        assert!((out[2].clone().unwrap() - 12.5).abs() < 1e-12);
    }
}
