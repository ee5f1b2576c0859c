use std::fmt::Write as _;

use crate::accuracy::Band;
use crate::feedback::PredictionSession;
use crate::model::CoefficientModel;
use crate::registry::ModelVersion;
use crate::scoring::ScoreBreakdown;

pub fn model_caption(model: &CoefficientModel) -> String {
    let stats = model.stats();
    format!(
        "{} | {} (R² = {:.5}, MAE = {:.2})",
        model.version(),
        model.label(),
        stats.r_squared,
        stats.mae
    )
}

pub fn band_line(band: &Band) -> String {
    format!(
        "±{} points ({:.1}% of the time): {:.1} - {:.1}",
        format_radius(band.radius),
        band.hit_rate_percent,
        band.lower,
        band.upper
    )
}

/// Prediction headline, tier accuracy and one line per confidence band.
pub fn render_prediction(entry: &ModelVersion, session: &PredictionSession) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", model_caption(&entry.model));
    let _ = writeln!(out, "Predicted: {:.1} skill points", session.prediction);

    let tier = &session.attributes.dev_trait;
    if let Ok(acc) = entry.accuracy.tier(tier) {
        let _ = writeln!(
            out,
            "Accuracy for {tier} players (based on {} players)",
            acc.sample_count
        );
        let _ = writeln!(out, "Typical error: ±{:.2} points", acc.mean_absolute_error);
    }
    for band in &session.bands {
        let _ = writeln!(out, "{}", band_line(band));
    }
    out
}

pub fn render_breakdown(breakdown: &ScoreBreakdown) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "  intercept   {:+.4}", breakdown.intercept);
    let _ = writeln!(out, "  position    {:+.4}", breakdown.position);
    let _ = writeln!(out, "  year        {:+.4}", breakdown.year);
    let _ = writeln!(out, "  dev trait   {:+.4}", breakdown.dev_trait);
    let _ = writeln!(out, "  xp penalty  {:+.4}", breakdown.xp_penalty);
    for (id, weight) in &breakdown.abilities {
        let _ = writeln!(out, "  {id:<11} {weight:+.4}");
    }
    if breakdown.floored() {
        let _ = writeln!(out, "  raw {:.4} floored to 0", breakdown.raw);
    }
    out
}

pub fn submission_message(absolute_error: f64) -> String {
    format!("Thank you! Data saved. Prediction error was {absolute_error:.1} points")
}

fn format_radius(radius: f64) -> String {
    if radius.fract() == 0.0 {
        format!("{}", radius as i64)
    } else {
        format!("{radius:.1}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn band_line_matches_display_format() {
        let band = Band {
            radius: 5.0,
            hit_rate_percent: 82.7,
            lower: 42.4356,
            upper: 52.4356,
        };
        assert_eq!(band_line(&band), "±5 points (82.7% of the time): 42.4 - 52.4");
    }

    #[test]
    fn fractional_radius_keeps_one_decimal() {
        assert_eq!(format_radius(2.5), "2.5");
        assert_eq!(format_radius(15.0), "15");
    }

    #[test]
    fn submission_message_rounds_error() {
        assert_eq!(
            submission_message(3.04),
            "Thank you! Data saved. Prediction error was 3.0 points"
        );
    }
}
