use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{Axis, EngineError};

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct FitStats {
    pub r_squared: f64,
    pub adj_r_squared: f64,
    pub mae: f64,
    pub rmse: f64,
    pub n: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryLevel {
    pub name: String,
    pub weight: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DevTraitLevel {
    pub name: String,
    pub weight: f64,
    pub rank: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AbilityWeight {
    pub id: String,
    #[serde(default)]
    pub label: String,
    pub weight: f64,
}

/// On-disk shape of one fitted coefficient table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoefficientModelArtifact {
    pub version: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub stats: FitStats,
    #[serde(default)]
    pub floor_at_zero: bool,
    pub intercept: f64,
    pub xp_penalty_weight: f64,
    pub positions: Vec<CategoryLevel>,
    pub years: Vec<CategoryLevel>,
    pub dev_traits: Vec<DevTraitLevel>,
    #[serde(default)]
    pub abilities: Vec<AbilityWeight>,
}

/// One categorical axis of a model. Levels keep their authored order; exactly
/// one level carries weight 0 and every other weight is a delta from it.
#[derive(Debug, Clone)]
pub struct CategoryAxis {
    axis: Axis,
    levels: Vec<CategoryLevel>,
    by_name: HashMap<String, usize>,
    reference: usize,
}

impl CategoryAxis {
    fn build(version: &str, axis: Axis, levels: Vec<CategoryLevel>) -> Result<Self, EngineError> {
        if levels.is_empty() {
            return Err(EngineError::invalid_model(
                version,
                format!("{axis} axis has no categories"),
            ));
        }

        let mut by_name = HashMap::with_capacity(levels.len());
        let mut zeros = Vec::new();
        for (idx, level) in levels.iter().enumerate() {
            if level.name.trim().is_empty() {
                return Err(EngineError::invalid_model(
                    version,
                    format!("{axis} axis has an unnamed category"),
                ));
            }
            if !level.weight.is_finite() {
                return Err(EngineError::invalid_model(
                    version,
                    format!("{axis} '{}' has a non-finite weight", level.name),
                ));
            }
            if by_name.insert(level.name.clone(), idx).is_some() {
                return Err(EngineError::invalid_model(
                    version,
                    format!("{axis} '{}' is listed twice", level.name),
                ));
            }
            if level.weight == 0.0 {
                zeros.push(idx);
            }
        }

        let &[reference] = zeros.as_slice() else {
            return Err(EngineError::invalid_model(
                version,
                format!(
                    "{axis} axis needs exactly one zero-valued reference category, found {}",
                    zeros.len()
                ),
            ));
        };

        Ok(Self {
            axis,
            levels,
            by_name,
            reference,
        })
    }

    pub fn axis(&self) -> Axis {
        self.axis
    }

    pub fn weight(&self, name: &str) -> Option<f64> {
        self.by_name.get(name).map(|&idx| self.levels[idx].weight)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Name of the zero-valued reference category.
    pub fn reference(&self) -> &str {
        &self.levels[self.reference].name
    }

    pub fn levels(&self) -> &[CategoryLevel] {
        &self.levels
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.levels.iter().map(|l| l.name.as_str())
    }
}

/// Immutable, validated coefficient table for one model version.
#[derive(Debug, Clone)]
pub struct CoefficientModel {
    version: String,
    label: String,
    description: String,
    stats: FitStats,
    floor_at_zero: bool,
    intercept: f64,
    xp_penalty_weight: f64,
    positions: CategoryAxis,
    years: CategoryAxis,
    dev_traits: CategoryAxis,
    dev_trait_ranks: HashMap<String, u8>,
    abilities: Vec<AbilityWeight>,
    ability_index: HashMap<String, usize>,
}

impl CoefficientModel {
    pub fn from_artifact(artifact: CoefficientModelArtifact) -> Result<Self, EngineError> {
        let version = artifact.version.trim().to_string();
        if version.is_empty() {
            return Err(EngineError::invalid_model("<unnamed>", "missing version id"));
        }
        if !artifact.intercept.is_finite() || !artifact.xp_penalty_weight.is_finite() {
            return Err(EngineError::invalid_model(
                &version,
                "intercept and xp penalty weight must be finite",
            ));
        }

        let positions = CategoryAxis::build(&version, Axis::Position, artifact.positions)?;
        let years = CategoryAxis::build(&version, Axis::Year, artifact.years)?;

        let dev_trait_ranks: HashMap<String, u8> = artifact
            .dev_traits
            .iter()
            .map(|d| (d.name.clone(), d.rank))
            .collect();
        validate_dev_trait_ranks(&version, &artifact.dev_traits)?;
        let dev_traits = CategoryAxis::build(
            &version,
            Axis::DevTrait,
            artifact
                .dev_traits
                .into_iter()
                .map(|d| CategoryLevel {
                    name: d.name,
                    weight: d.weight,
                })
                .collect(),
        )?;

        let mut ability_index = HashMap::with_capacity(artifact.abilities.len());
        for (idx, ability) in artifact.abilities.iter().enumerate() {
            if ability.id.trim().is_empty() {
                return Err(EngineError::invalid_model(&version, "ability with empty id"));
            }
            if !ability.weight.is_finite() {
                return Err(EngineError::invalid_model(
                    &version,
                    format!("ability '{}' has a non-finite weight", ability.id),
                ));
            }
            if ability_index.insert(ability.id.clone(), idx).is_some() {
                return Err(EngineError::invalid_model(
                    &version,
                    format!("ability '{}' is listed twice", ability.id),
                ));
            }
        }

        Ok(Self {
            version,
            label: artifact.label,
            description: artifact.description,
            stats: artifact.stats,
            floor_at_zero: artifact.floor_at_zero,
            intercept: artifact.intercept,
            xp_penalty_weight: artifact.xp_penalty_weight,
            positions,
            years,
            dev_traits,
            dev_trait_ranks,
            abilities: artifact.abilities,
            ability_index,
        })
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn label(&self) -> &str {
        if self.label.is_empty() {
            &self.version
        } else {
            &self.label
        }
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn stats(&self) -> FitStats {
        self.stats
    }

    /// Whether predictions are clamped to a minimum of zero.
    pub fn floor_at_zero(&self) -> bool {
        self.floor_at_zero
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }

    pub fn xp_penalty_weight(&self) -> f64 {
        self.xp_penalty_weight
    }

    pub fn positions(&self) -> &CategoryAxis {
        &self.positions
    }

    pub fn years(&self) -> &CategoryAxis {
        &self.years
    }

    pub fn dev_traits(&self) -> &CategoryAxis {
        &self.dev_traits
    }

    pub fn axis(&self, axis: Axis) -> &CategoryAxis {
        match axis {
            Axis::Position => &self.positions,
            Axis::Year => &self.years,
            Axis::DevTrait => &self.dev_traits,
        }
    }

    /// Weight of `value` on `axis`, rejecting values outside this version's vocabulary.
    pub fn category_weight(&self, axis: Axis, value: &str) -> Result<f64, EngineError> {
        self.axis(axis)
            .weight(value)
            .ok_or_else(|| EngineError::UnknownCategory {
                axis,
                value: value.to_string(),
                version: self.version.clone(),
            })
    }

    pub fn dev_trait_rank(&self, dev_trait: &str) -> Option<u8> {
        self.dev_trait_ranks.get(dev_trait).copied()
    }

    /// Abilities in canonical order (the feedback row order).
    pub fn abilities(&self) -> &[AbilityWeight] {
        &self.abilities
    }

    pub fn ability_weight(&self, id: &str) -> Option<f64> {
        self.ability_index
            .get(id)
            .map(|&idx| self.abilities[idx].weight)
    }
}

fn validate_dev_trait_ranks(version: &str, levels: &[DevTraitLevel]) -> Result<(), EngineError> {
    let mut by_rank: Vec<&DevTraitLevel> = levels.iter().collect();
    by_rank.sort_by(|a, b| b.rank.cmp(&a.rank));
    for pair in by_rank.windows(2) {
        let (hi, lo) = (pair[0], pair[1]);
        if hi.rank == lo.rank {
            return Err(EngineError::invalid_model(
                version,
                format!("dev traits '{}' and '{}' share rank {}", hi.name, lo.name, hi.rank),
            ));
        }
        // Higher tiers sit closer to the reference level.
        if hi.weight <= lo.weight {
            return Err(EngineError::invalid_model(
                version,
                format!(
                    "dev trait '{}' (rank {}) does not outscore '{}' (rank {})",
                    hi.name, hi.rank, lo.name, lo.rank
                ),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn artifact() -> CoefficientModelArtifact {
        CoefficientModelArtifact {
            version: "t1".into(),
            label: String::new(),
            description: String::new(),
            stats: FitStats::default(),
            floor_at_zero: true,
            intercept: 50.0,
            xp_penalty_weight: -0.5,
            positions: vec![
                CategoryLevel {
                    name: "QB".into(),
                    weight: 0.0,
                },
                CategoryLevel {
                    name: "WR".into(),
                    weight: -1.0,
                },
            ],
            years: vec![CategoryLevel {
                name: "FR".into(),
                weight: 0.0,
            }],
            dev_traits: vec![
                DevTraitLevel {
                    name: "Elite".into(),
                    weight: 0.0,
                    rank: 2,
                },
                DevTraitLevel {
                    name: "Normal".into(),
                    weight: -20.0,
                    rank: 1,
                },
            ],
            abilities: vec![AbilityWeight {
                id: "HC_TD1".into(),
                label: "HC Talent Developer Tier 1".into(),
                weight: 5.0,
            }],
        }
    }

    #[test]
    fn reference_level_is_the_zero_weight() {
        let model = CoefficientModel::from_artifact(artifact()).unwrap();
        assert_eq!(model.positions().reference(), "QB");
        assert_eq!(model.dev_traits().reference(), "Elite");
        assert_eq!(model.label(), "t1");
        assert_eq!(model.dev_trait_rank("Normal"), Some(1));
    }

    #[test]
    fn two_zero_levels_are_rejected() {
        let mut a = artifact();
        a.positions[1].weight = 0.0;
        let err = CoefficientModel::from_artifact(a).unwrap_err();
        assert!(matches!(err, EngineError::InvalidModel { .. }));
        assert!(err.to_string().contains("found 2"));
    }

    #[test]
    fn missing_zero_level_is_rejected() {
        let mut a = artifact();
        a.years[0].weight = -0.1;
        assert!(CoefficientModel::from_artifact(a).is_err());
    }

    #[test]
    fn duplicate_category_is_rejected() {
        let mut a = artifact();
        a.positions[1].name = "QB".into();
        a.positions[1].weight = -2.0;
        let err = CoefficientModel::from_artifact(a).unwrap_err();
        assert!(err.to_string().contains("listed twice"));
    }

    #[test]
    fn dev_trait_rank_must_follow_weight() {
        let mut a = artifact();
        a.dev_traits[1].rank = 3;
        assert!(CoefficientModel::from_artifact(a).is_err());
    }

    #[test]
    fn unknown_category_names_the_axis_and_version() {
        let model = CoefficientModel::from_artifact(artifact()).unwrap();
        let err = model.category_weight(Axis::Position, "DT").unwrap_err();
        assert_eq!(
            err,
            EngineError::UnknownCategory {
                axis: Axis::Position,
                value: "DT".into(),
                version: "t1".into(),
            }
        );
    }
}
