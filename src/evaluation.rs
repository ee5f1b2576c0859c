use rayon::prelude::*;
use serde::Serialize;

use crate::feedback::FeedbackRecord;
use crate::registry::ModelVersion;
use crate::scoring::score;
use crate::sink::StoredFeedback;

#[derive(Debug, Clone, Serialize)]
pub struct TierEvaluation {
    pub tier: String,
    pub samples: usize,
    pub mae: f64,
    /// `(radius, percent of samples within radius)` for the tier's configured radii.
    pub hit_rates: Vec<(f64, f64)>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EvaluationReport {
    pub version: String,
    pub samples: usize,
    pub skipped: usize,
    pub mae: f64,
    pub tiers: Vec<TierEvaluation>,
}

/// Re-scores collected feedback with `entry` and measures how far actual
/// outcomes fell from the predictions. Rows that no longer parse or score
/// against this version are counted as skipped.
pub fn evaluate_feedback(entry: &ModelVersion, rows: &[StoredFeedback]) -> EvaluationReport {
    let scored: Vec<Option<(String, f64)>> = rows
        .par_iter()
        .map(|row| {
            if row.version != entry.version() {
                return None;
            }
            let record = FeedbackRecord::from_row(&entry.model, &row.cells)?;
            let predicted = score(&record.attributes(), &entry.model).ok()?;
            Some((record.dev_trait, (record.actual - predicted).abs()))
        })
        .collect();

    let skipped = scored.iter().filter(|s| s.is_none()).count();
    let errors: Vec<(String, f64)> = scored.into_iter().flatten().collect();

    let tiers = entry
        .model
        .dev_traits()
        .names()
        .filter_map(|tier| {
            let tier_errors: Vec<f64> = errors
                .iter()
                .filter(|(t, _)| t == tier)
                .map(|(_, e)| *e)
                .collect();
            if tier_errors.is_empty() {
                return None;
            }
            let radii = entry
                .accuracy
                .tier(tier)
                .map(|t| t.ranges.iter().map(|r| r.radius).collect::<Vec<_>>())
                .unwrap_or_default();
            Some(TierEvaluation {
                tier: tier.to_string(),
                samples: tier_errors.len(),
                mae: mean(&tier_errors),
                hit_rates: radii
                    .into_iter()
                    .map(|radius| (radius, hit_rate_percent(&tier_errors, radius)))
                    .collect(),
            })
        })
        .collect();

    let all_errors: Vec<f64> = errors.iter().map(|(_, e)| *e).collect();
    EvaluationReport {
        version: entry.version().to_string(),
        samples: all_errors.len(),
        skipped,
        mae: mean(&all_errors),
        tiers,
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn hit_rate_percent(errors: &[f64], radius: f64) -> f64 {
    if errors.is_empty() {
        return 0.0;
    }
    let hits = errors.iter().filter(|e| **e <= radius).count();
    100.0 * hits as f64 / errors.len() as f64
}
