use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceRange {
    pub radius: f64,
    pub hit_rate_percent: f64,
}

/// Historical error statistics for one development tier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TierAccuracy {
    pub tier: String,
    #[serde(rename = "n")]
    pub sample_count: u32,
    #[serde(rename = "mae")]
    pub mean_absolute_error: f64,
    pub ranges: Vec<ConfidenceRange>,
}

impl TierAccuracy {
    fn validate(&self, version: &str) -> Result<(), EngineError> {
        let fail = |reason: String| EngineError::invalid_model(version, reason);
        if !self.mean_absolute_error.is_finite() || self.mean_absolute_error < 0.0 {
            return Err(fail(format!("tier '{}' has an invalid mae", self.tier)));
        }
        if self.ranges.is_empty() {
            return Err(fail(format!("tier '{}' has no confidence ranges", self.tier)));
        }
        for range in &self.ranges {
            if !range.radius.is_finite() || range.radius <= 0.0 {
                return Err(fail(format!(
                    "tier '{}' has a non-positive radius {}",
                    self.tier, range.radius
                )));
            }
            if !(0.0..=100.0).contains(&range.hit_rate_percent) {
                return Err(fail(format!(
                    "tier '{}' hit rate {} is outside 0-100",
                    self.tier, range.hit_rate_percent
                )));
            }
        }
        for pair in self.ranges.windows(2) {
            if pair[1].radius <= pair[0].radius {
                return Err(fail(format!(
                    "tier '{}' radii are not strictly increasing ({} then {})",
                    self.tier, pair[0].radius, pair[1].radius
                )));
            }
            if pair[1].hit_rate_percent <= pair[0].hit_rate_percent {
                return Err(fail(format!(
                    "tier '{}' hit rates are not strictly increasing ({} then {})",
                    self.tier, pair[0].hit_rate_percent, pair[1].hit_rate_percent
                )));
            }
        }
        Ok(())
    }
}

/// Per-tier accuracy paired with one coefficient model version.
#[derive(Debug, Clone)]
pub struct AccuracyProfile {
    version: String,
    tiers: Vec<TierAccuracy>,
    by_tier: HashMap<String, usize>,
}

impl AccuracyProfile {
    pub fn new(version: &str, tiers: Vec<TierAccuracy>) -> Result<Self, EngineError> {
        let mut by_tier = HashMap::with_capacity(tiers.len());
        for (idx, tier) in tiers.iter().enumerate() {
            tier.validate(version)?;
            if by_tier.insert(tier.tier.clone(), idx).is_some() {
                return Err(EngineError::invalid_model(
                    version,
                    format!("accuracy tier '{}' is listed twice", tier.tier),
                ));
            }
        }
        Ok(Self {
            version: version.to_string(),
            tiers,
            by_tier,
        })
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn tier(&self, dev_trait: &str) -> Result<&TierAccuracy, EngineError> {
        self.by_tier
            .get(dev_trait)
            .map(|&idx| &self.tiers[idx])
            .ok_or_else(|| EngineError::UnknownTier {
                tier: dev_trait.to_string(),
                version: self.version.clone(),
            })
    }

    pub fn tiers(&self) -> &[TierAccuracy] {
        &self.tiers
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Band {
    pub radius: f64,
    pub hit_rate_percent: f64,
    pub lower: f64,
    pub upper: f64,
}

/// Bands around `prediction` in the tier's authored radius order.
/// Lower bounds never drop below zero.
pub fn confidence_bands(
    prediction: f64,
    dev_trait: &str,
    profile: &AccuracyProfile,
) -> Result<Vec<Band>, EngineError> {
    let tier = profile.tier(dev_trait)?;
    Ok(tier
        .ranges
        .iter()
        .map(|r| Band {
            radius: r.radius,
            hit_rate_percent: r.hit_rate_percent,
            lower: (prediction - r.radius).max(0.0),
            upper: prediction + r.radius,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tier(name: &str, ranges: &[(f64, f64)]) -> TierAccuracy {
        TierAccuracy {
            tier: name.to_string(),
            sample_count: 10,
            mean_absolute_error: 4.0,
            ranges: ranges
                .iter()
                .map(|&(radius, hit_rate_percent)| ConfidenceRange {
                    radius,
                    hit_rate_percent,
                })
                .collect(),
        }
    }

    #[test]
    fn bands_clamp_lower_bound_only() {
        let profile =
            AccuracyProfile::new("t", vec![tier("Impact", &[(5.0, 80.0), (10.0, 95.0)])]).unwrap();
        let bands = confidence_bands(7.0, "Impact", &profile).unwrap();
        assert_eq!(bands.len(), 2);
        assert!((bands[0].lower - 2.0).abs() < 1e-12);
        assert!((bands[0].upper - 12.0).abs() < 1e-12);
        assert_eq!(bands[1].lower, 0.0);
        assert!((bands[1].upper - 17.0).abs() < 1e-12);
    }

    #[test]
    fn missing_tier_is_unknown_tier() {
        let profile = AccuracyProfile::new("t", vec![tier("Impact", &[(5.0, 80.0)])]).unwrap();
        let err = confidence_bands(40.0, "Elite", &profile).unwrap_err();
        assert!(matches!(err, EngineError::UnknownTier { .. }));
    }

    #[test]
    fn unordered_radii_fail_validation() {
        let res = AccuracyProfile::new("t", vec![tier("Star", &[(10.0, 50.0), (5.0, 80.0)])]);
        assert!(res.is_err());
    }

    #[test]
    fn flat_hit_rates_fail_validation() {
        let res = AccuracyProfile::new("t", vec![tier("Star", &[(5.0, 50.0), (10.0, 50.0)])]);
        assert!(res.is_err());
    }
}
