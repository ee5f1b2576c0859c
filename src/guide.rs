use std::fmt::Write as _;

use serde::Serialize;

use crate::model::{CategoryAxis, CoefficientModel};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AbilityRanking {
    pub rank: usize,
    pub id: String,
    pub label: String,
    pub weight: f64,
}

impl AbilityRanking {
    pub fn points(&self) -> i64 {
        self.weight.round() as i64
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryDelta {
    pub name: String,
    pub delta: f64,
}

/// Abilities that add skill points, strongest first. Ties keep canonical order.
pub fn ability_rankings(model: &CoefficientModel) -> Vec<AbilityRanking> {
    let mut positive: Vec<_> = model
        .abilities()
        .iter()
        .filter(|a| a.weight > 0.0)
        .collect();
    positive.sort_by(|a, b| b.weight.total_cmp(&a.weight));
    positive
        .into_iter()
        .enumerate()
        .map(|(idx, a)| AbilityRanking {
            rank: idx + 1,
            id: a.id.clone(),
            label: if a.label.is_empty() {
                a.id.clone()
            } else {
                a.label.clone()
            },
            weight: a.weight,
        })
        .collect()
}

/// Non-reference categories of `axis` with their delta, in authored order.
pub fn category_deltas(axis: &CategoryAxis) -> Vec<CategoryDelta> {
    axis.levels()
        .iter()
        .filter(|l| l.name != axis.reference())
        .map(|l| CategoryDelta {
            name: l.name.clone(),
            delta: l.weight,
        })
        .collect()
}

pub fn render_guide(model: &CoefficientModel) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Best coaching abilities for player development ({} players analyzed)",
        model.stats().n
    );
    let _ = writeln!(out);
    for r in ability_rankings(model) {
        let _ = writeln!(out, "{}. {} -> {:+} skill points", r.rank, r.label, r.points());
    }

    for axis in [model.dev_traits(), model.years()] {
        let _ = writeln!(out);
        let _ = writeln!(out, "{} (vs {}):", axis.axis(), axis.reference());
        for d in category_deltas(axis) {
            let _ = writeln!(out, "  {:<8} {:+.0} skill points", d.name, d.delta);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ModelRegistry;

    #[test]
    fn clean_model_ranks_coordinator_talent_developers_first() {
        let reg = ModelRegistry::builtin().unwrap();
        let model = &reg.active("v2").unwrap().model;
        let ranks = ability_rankings(model);
        let ids: Vec<_> = ranks.iter().take(3).map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["DC_TD2", "DC_TD3", "HC_TD1"]);
        assert_eq!(ranks[0].points(), 14);
        assert!(ranks.iter().all(|r| r.weight > 0.0));
    }

    #[test]
    fn deltas_skip_the_reference_level() {
        let reg = ModelRegistry::builtin().unwrap();
        let model = &reg.active("v1").unwrap().model;
        let deltas = category_deltas(model.dev_traits());
        let names: Vec<_> = deltas.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["Star", "Impact", "Normal"]);
    }
}
