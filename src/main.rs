use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use env_logger::Env;
use log::info;

use sp_predictor::config::Settings;
use sp_predictor::feedback::{PlayerInfo, PredictionSession, build_record};
use sp_predictor::registry::{ModelVersion, global_registry};
use sp_predictor::scoring::PredictionAttributes;
use sp_predictor::sink::{SqliteSink, open_sink, submit};
use sp_predictor::{evaluation, export, guide, report};

#[derive(Parser)]
#[command(
    name = "sp_predictor",
    about = "Skill point predictions with tier-calibrated confidence ranges"
)]
struct Cli {
    /// Model version id; defaults to SP_MODEL_VERSION, then the registry default.
    #[arg(long, global = true)]
    model: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List loaded model versions.
    Versions,
    /// Predict skill points and show confidence ranges.
    Predict(PredictArgs),
    /// Predict, then record the actual outcome from the training results screen.
    Submit {
        #[command(flatten)]
        predict: PredictArgs,
        #[arg(long)]
        actual: f64,
    },
    /// Coaching abilities and player factors ranked by the model.
    Guide,
    /// Write the collected feedback to an xlsx workbook.
    Export {
        #[arg(long)]
        out: PathBuf,
    },
    /// Compare collected feedback against the selected model.
    Evaluate,
}

#[derive(Args)]
struct PredictArgs {
    #[arg(long)]
    position: String,
    #[arg(long)]
    year: String,
    #[arg(long)]
    dev_trait: String,
    #[arg(long, default_value_t = 0.0)]
    xp_penalty: f64,
    /// Enabled coaching ability id, e.g. HC_TD1. Repeatable.
    #[arg(long = "ability")]
    abilities: Vec<String>,
    #[arg(long, default_value = "")]
    team: String,
    #[arg(long, default_value = "")]
    player: String,
    #[arg(long, default_value_t = 0)]
    snaps: u32,
    /// Print the per-term contributions.
    #[arg(long)]
    explain: bool,
}

impl PredictArgs {
    fn split(&self) -> (PlayerInfo, PredictionAttributes) {
        let player = PlayerInfo {
            team: self.team.trim().to_string(),
            player_name: self.player.trim().to_string(),
            snaps: self.snaps,
        };
        let attrs = PredictionAttributes {
            position: self.position.trim().to_string(),
            year: self.year.trim().to_string(),
            dev_trait: self.dev_trait.trim().to_string(),
            xp_penalty: self.xp_penalty,
            abilities: self.abilities.iter().map(|a| a.trim().to_string()).collect(),
        };
        (player, attrs)
    }
}

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let settings = Settings::from_env();
    let registry = global_registry()?;
    let entry = match cli.model.as_deref() {
        Some(version) => registry.active(version)?,
        None => registry.default_version(),
    };

    match cli.command {
        Command::Versions => {
            for v in registry.versions() {
                let marker = if v.version() == entry.version() { "*" } else { " " };
                println!("{marker} {}", report::model_caption(&v.model));
                println!(
                    "    {} | n={} | floor at zero: {}",
                    v.model.description(),
                    v.model.stats().n,
                    v.model.floor_at_zero()
                );
            }
        }
        Command::Predict(args) => {
            predict(entry, &args)?;
        }
        Command::Submit { predict: args, actual } => {
            let session = predict(entry, &args)?;
            let built = build_record(&session, entry, actual, settings.actual_policy)?;
            if built.is_flagged() {
                println!("Note: submission flagged {:?}", built.flags);
            }
            // The prediction above stays valid whatever happens to the append.
            let outcome = open_sink(&settings)
                .map_err(|err| format!("{err:#}"))
                .and_then(|sink| {
                    submit(sink.as_ref(), &built.record).map_err(|err| err.to_string())
                });
            match outcome {
                Ok(()) => println!("{}", report::submission_message(built.absolute_error)),
                Err(err) => eprintln!("Could not save feedback: {err}"),
            }
        }
        Command::Guide => {
            print!("{}", guide::render_guide(&entry.model));
        }
        Command::Export { out } => {
            let sink = open_corpus(&settings)?;
            let rows = sink.rows(None)?;
            let summary = export::export_feedback(&out, registry, &rows)?;
            println!(
                "Exported {} rows across {} sheets to {}",
                summary.rows,
                summary.sheets,
                out.display()
            );
            if summary.orphaned > 0 {
                println!("Skipped {} rows from unknown model versions", summary.orphaned);
            }
        }
        Command::Evaluate => {
            let sink = open_corpus(&settings)?;
            let rows = sink.rows(Some(entry.version()))?;
            let eval = evaluation::evaluate_feedback(entry, &rows);
            println!(
                "{}: {} samples (skipped {}), MAE {:.2}",
                eval.version, eval.samples, eval.skipped, eval.mae
            );
            for tier in &eval.tiers {
                let hits = tier
                    .hit_rates
                    .iter()
                    .map(|(r, pct)| format!("±{r}: {pct:.1}%"))
                    .collect::<Vec<_>>()
                    .join(", ");
                println!(
                    "  {:<8} n={:<4} MAE {:.2}  {}",
                    tier.tier, tier.samples, tier.mae, hits
                );
            }
        }
    }

    Ok(())
}

fn predict(entry: &ModelVersion, args: &PredictArgs) -> Result<PredictionSession> {
    let (player, attrs) = args.split();
    let session = PredictionSession::predict(entry, player, attrs)?;
    info!(
        "predicted {:.4} with {} for {}",
        session.prediction,
        session.version,
        session.attributes.dev_trait
    );
    print!("{}", report::render_prediction(entry, &session));
    if args.explain {
        print!("{}", report::render_breakdown(&session.breakdown));
    }
    Ok(session)
}

fn open_corpus(settings: &Settings) -> Result<SqliteSink> {
    let path = settings
        .feedback_db
        .as_deref()
        .context("unable to resolve feedback database path")?;
    SqliteSink::open(path)
}
