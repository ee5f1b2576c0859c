use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::accuracy::{Band, confidence_bands};
use crate::error::{Axis, EngineError};
use crate::model::CoefficientModel;
use crate::registry::ModelVersion;
use crate::scoring::{PredictionAttributes, ScoreBreakdown, score_breakdown};

/// Observed range of real outcomes. Values outside it are flagged, not dropped.
pub const ACTUAL_DOMAIN: RangeInclusive<f64> = 0.0..=200.0;
pub const SNAPS_DOMAIN: RangeInclusive<u32> = 0..=2000;

/// Columns that precede the ability flags in every feedback row.
pub const LEADING_COLUMNS: [&str; 8] = [
    "team",
    "player",
    "actual_points",
    "position",
    "year",
    "dev_trait",
    "dev_trait_num",
    "snaps",
];
pub const TRAILING_COLUMNS: [&str; 1] = ["xp_penalty"];

/// What to do with an actual outcome outside [`ACTUAL_DOMAIN`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ActualPolicy {
    /// Store the value verbatim and flag it.
    #[default]
    Accept,
    /// Store the value clamped into the domain and flag it.
    Clamp,
    Reject,
}

impl FromStr for ActualPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "accept" => Ok(ActualPolicy::Accept),
            "clamp" => Ok(ActualPolicy::Clamp),
            "reject" => Ok(ActualPolicy::Reject),
            other => Err(format!("unknown actual-outcome policy '{other}'")),
        }
    }
}

impl fmt::Display for ActualPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ActualPolicy::Accept => "accept",
            ActualPolicy::Clamp => "clamp",
            ActualPolicy::Reject => "reject",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerInfo {
    pub team: String,
    pub player_name: String,
    pub snaps: u32,
}

/// Everything shown to the user after one prediction. Owned by the caller and
/// handed back when the actual outcome is submitted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionSession {
    pub version: String,
    pub player: PlayerInfo,
    pub attributes: PredictionAttributes,
    pub breakdown: ScoreBreakdown,
    pub prediction: f64,
    pub bands: Vec<Band>,
}

impl PredictionSession {
    pub fn predict(
        entry: &ModelVersion,
        player: PlayerInfo,
        attributes: PredictionAttributes,
    ) -> Result<Self, EngineError> {
        let breakdown = score_breakdown(&attributes, &entry.model)?;
        let prediction = breakdown.value;
        let bands = confidence_bands(prediction, &attributes.dev_trait, &entry.accuracy)?;
        Ok(Self {
            version: entry.version().to_string(),
            player,
            attributes,
            breakdown,
            prediction,
            bands,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RecordFlag {
    ActualOutOfRange,
    ActualClamped,
    SnapsOutOfRange,
}

/// One scalar in a feedback row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    Text(String),
    Int(i64),
    Number(f64),
}

impl Cell {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Cell::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Int(n) => Some(*n as f64),
            Cell::Number(x) => Some(*x),
            Cell::Text(_) => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Cell::Int(n) => Some(*n),
            _ => None,
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Text(s) => f.write_str(s),
            Cell::Int(n) => write!(f, "{n}"),
            Cell::Number(x) => write!(f, "{x}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeedbackRecord {
    pub version: String,
    pub team: String,
    pub player_name: String,
    pub actual: f64,
    pub position: String,
    pub year: String,
    pub dev_trait: String,
    pub dev_trait_rank: u8,
    pub snaps: u32,
    /// Every ability of the model, in canonical order.
    pub abilities: Vec<(String, bool)>,
    pub xp_penalty: f64,
}

impl FeedbackRecord {
    /// Row in the fixed column order consumed by the feedback corpus.
    pub fn to_row(&self) -> Vec<Cell> {
        let mut row = Vec::with_capacity(LEADING_COLUMNS.len() + self.abilities.len() + 1);
        row.push(Cell::Text(self.team.clone()));
        row.push(Cell::Text(self.player_name.clone()));
        row.push(Cell::Number(self.actual));
        row.push(Cell::Text(self.position.clone()));
        row.push(Cell::Text(self.year.clone()));
        row.push(Cell::Text(self.dev_trait.clone()));
        row.push(Cell::Int(i64::from(self.dev_trait_rank)));
        row.push(Cell::Int(i64::from(self.snaps)));
        for (_, enabled) in &self.abilities {
            row.push(Cell::Int(i64::from(*enabled)));
        }
        row.push(Cell::Number(self.xp_penalty));
        row
    }

    /// Parses a stored row back, using `model` for the ability layout.
    pub fn from_row(model: &CoefficientModel, cells: &[Cell]) -> Option<Self> {
        let n_abilities = model.abilities().len();
        if cells.len() != LEADING_COLUMNS.len() + n_abilities + TRAILING_COLUMNS.len() {
            return None;
        }
        let text = |idx: usize| cells[idx].as_text().map(str::to_string);

        let mut abilities = Vec::with_capacity(n_abilities);
        for (offset, ability) in model.abilities().iter().enumerate() {
            let flag = cells[LEADING_COLUMNS.len() + offset].as_i64()?;
            abilities.push((ability.id.clone(), flag != 0));
        }

        Some(Self {
            version: model.version().to_string(),
            team: text(0)?,
            player_name: text(1)?,
            actual: cells[2].as_f64()?,
            position: text(3)?,
            year: text(4)?,
            dev_trait: text(5)?,
            dev_trait_rank: u8::try_from(cells[6].as_i64()?).ok()?,
            snaps: u32::try_from(cells[7].as_i64()?).ok()?,
            abilities,
            xp_penalty: cells[cells.len() - 1].as_f64()?,
        })
    }

    pub fn attributes(&self) -> PredictionAttributes {
        PredictionAttributes {
            position: self.position.clone(),
            year: self.year.clone(),
            dev_trait: self.dev_trait.clone(),
            xp_penalty: self.xp_penalty,
            abilities: self
                .abilities
                .iter()
                .filter(|(_, enabled)| *enabled)
                .map(|(id, _)| id.clone())
                .collect(),
        }
    }
}

/// Column names for `model`'s feedback rows.
pub fn feedback_header(model: &CoefficientModel) -> Vec<String> {
    LEADING_COLUMNS
        .iter()
        .map(|c| c.to_string())
        .chain(model.abilities().iter().map(|a| a.id.clone()))
        .chain(TRAILING_COLUMNS.iter().map(|c| c.to_string()))
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct BuiltRecord {
    pub record: FeedbackRecord,
    /// For display only; never part of the stored row.
    pub absolute_error: f64,
    pub flags: Vec<RecordFlag>,
}

impl BuiltRecord {
    pub fn is_flagged(&self) -> bool {
        !self.flags.is_empty()
    }
}

/// Combines a prediction session with the user's actual outcome. Does not write.
pub fn build_record(
    session: &PredictionSession,
    entry: &ModelVersion,
    actual: f64,
    policy: ActualPolicy,
) -> Result<BuiltRecord, EngineError> {
    if session.version != entry.version() {
        return Err(EngineError::VersionMismatch {
            expected: session.version.clone(),
            found: entry.version().to_string(),
        });
    }
    if !actual.is_finite() {
        return Err(EngineError::InvalidAttribute {
            field: "actual",
            reason: "not a finite number".to_string(),
        });
    }

    let model = &entry.model;
    let attrs = &session.attributes;
    // The session may have been edited since it was scored.
    for (axis, value) in [
        (Axis::Position, &attrs.position),
        (Axis::Year, &attrs.year),
        (Axis::DevTrait, &attrs.dev_trait),
    ] {
        model.category_weight(axis, value)?;
    }
    let dev_trait_rank =
        model
            .dev_trait_rank(&attrs.dev_trait)
            .ok_or_else(|| EngineError::UnknownCategory {
                axis: Axis::DevTrait,
                value: attrs.dev_trait.clone(),
                version: model.version().to_string(),
            })?;

    let mut flags = Vec::new();
    let mut stored_actual = actual;
    if !ACTUAL_DOMAIN.contains(&actual) {
        match policy {
            ActualPolicy::Reject => {
                return Err(EngineError::InvalidAttribute {
                    field: "actual",
                    reason: format!(
                        "{actual} is outside {}-{}",
                        ACTUAL_DOMAIN.start(),
                        ACTUAL_DOMAIN.end()
                    ),
                });
            }
            ActualPolicy::Clamp => {
                stored_actual = actual.clamp(*ACTUAL_DOMAIN.start(), *ACTUAL_DOMAIN.end());
                flags.push(RecordFlag::ActualClamped);
            }
            ActualPolicy::Accept => flags.push(RecordFlag::ActualOutOfRange),
        }
        warn!(
            "actual outcome {actual} for {} is outside the observed range (policy {policy})",
            session.player.player_name
        );
    }
    if !SNAPS_DOMAIN.contains(&session.player.snaps) {
        warn!("snap count {} is outside the observed range", session.player.snaps);
        flags.push(RecordFlag::SnapsOutOfRange);
    }

    let record = FeedbackRecord {
        version: session.version.clone(),
        team: session.player.team.clone(),
        player_name: session.player.player_name.clone(),
        actual: stored_actual,
        position: attrs.position.clone(),
        year: attrs.year.clone(),
        dev_trait: attrs.dev_trait.clone(),
        dev_trait_rank,
        snaps: session.player.snaps,
        abilities: model
            .abilities()
            .iter()
            .map(|a| (a.id.clone(), attrs.has_ability(&a.id)))
            .collect(),
        xp_penalty: attrs.xp_penalty,
    };

    Ok(BuiltRecord {
        record,
        // Measured against what the user entered, even when the stored value is clamped.
        absolute_error: (actual - session.prediction).abs(),
        flags,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_parses_case_insensitively() {
        assert_eq!("Clamp".parse::<ActualPolicy>(), Ok(ActualPolicy::Clamp));
        assert_eq!(" reject ".parse::<ActualPolicy>(), Ok(ActualPolicy::Reject));
        assert!("drop".parse::<ActualPolicy>().is_err());
        assert_eq!(ActualPolicy::default().to_string(), "accept");
    }

    #[test]
    fn cells_keep_integer_and_float_apart_in_json() {
        let row = vec![
            Cell::Text("A".into()),
            Cell::Int(3),
            Cell::Number(47.5),
            Cell::Number(200.0),
        ];
        let json = serde_json::to_string(&row).unwrap();
        let back: Vec<Cell> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, row);
    }
}
