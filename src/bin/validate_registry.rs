use std::path::PathBuf;

use anyhow::{Context, Result};
use env_logger::Env;

use sp_predictor::registry::{ModelRegistry, load_registry_file};
use sp_predictor::report;

// Checks a registry artifact before it is pointed at by SP_REGISTRY_PATH.
// With no argument it validates the built-in models.
fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let registry = match std::env::args().nth(1).map(PathBuf::from) {
        Some(path) => load_registry_file(&path)
            .with_context(|| format!("registry {} is invalid", path.display()))?,
        None => ModelRegistry::builtin()?,
    };

    println!("Registry OK: {} versions", registry.versions().len());
    for v in registry.versions() {
        println!("  {}", report::model_caption(&v.model));
        println!(
            "    positions={} years={} dev_traits={} abilities={} floor={}",
            v.model.positions().levels().len(),
            v.model.years().levels().len(),
            v.model.dev_traits().levels().len(),
            v.model.abilities().len(),
            v.model.floor_at_zero()
        );
        for tier in v.accuracy.tiers() {
            let radii = tier
                .ranges
                .iter()
                .map(|r| format!("±{}={:.1}%", r.radius, r.hit_rate_percent))
                .collect::<Vec<_>>()
                .join(" ");
            println!(
                "    {:<8} n={:<4} mae={:.2} {}",
                tier.tier, tier.sample_count, tier.mean_absolute_error, radii
            );
        }
    }
    println!("Default: {}", registry.default_version().version());
    Ok(())
}
