//! Starsand - headless star sand in a bottle

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use starsand::scenario::{
    ScenarioAction, ScenarioDefinition, ScenarioExecutor, ScenarioExecutorConfig,
    VerificationCondition,
};
use starsand::{AppConfig, ExecutionReport, report_path};
use starsand_core::GrainSimulation;

/// Grain-grain overlap tolerated after any frame of a generated pour
const PAIR_EPSILON: f32 = 0.01;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Config file (RON); defaults to ./starsand.ron when present
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log every action as it runs
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a scenario file
    Run {
        /// Scenario file (RON)
        scenario: PathBuf,

        /// Write a JSON report into the configured report directory
        #[arg(long)]
        report: bool,
    },

    /// Pour grains into the bottle and check the pile
    Pour {
        /// Grains to pour
        #[arg(long, default_value = "500")]
        grains: u32,

        /// Seconds of simulated time to run
        #[arg(long, default_value = "5")]
        seconds: f32,

        /// Override the configured seed
        #[arg(long)]
        seed: Option<u64>,

        /// Override the configured pool capacity
        #[arg(long)]
        capacity: Option<usize>,

        /// Shake the settled pile with this strength and let it resettle
        #[arg(long)]
        shake: Option<f32>,

        /// Write a JSON report into the configured report directory
        #[arg(long)]
        report: bool,
    },

    /// Print the effective configuration as RON
    Config,
}

fn main() -> Result<()> {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let app_config = AppConfig::load(args.config.as_deref())?;
    let verbose = args.verbose || app_config.run.verbose;

    match args.command {
        Command::Run { scenario, report } => {
            let definition = ScenarioDefinition::from_file(&scenario)?;
            run_scenario(&app_config, &definition, verbose, report)
        }
        Command::Pour {
            grains,
            seconds,
            seed,
            capacity,
            shake,
            report,
        } => {
            let mut simulation = app_config.simulation.clone();
            if let Some(seed) = seed {
                simulation.seed = seed;
            }
            if let Some(capacity) = capacity {
                simulation.capacity = capacity;
            }
            let definition = pour_scenario(grains, seconds, shake, simulation);
            run_scenario(&app_config, &definition, verbose, report)
        }
        Command::Config => {
            println!("{}", app_config.to_ron()?);
            Ok(())
        }
    }
}

fn run_scenario(
    app_config: &AppConfig,
    definition: &ScenarioDefinition,
    verbose: bool,
    write_report: bool,
) -> Result<()> {
    let sim_config = definition.simulation_config(&app_config.simulation);
    let mut sim = GrainSimulation::with_config(sim_config)
        .with_context(|| format!("Failed to build simulation for '{}'", definition.name))?;

    let mut executor = ScenarioExecutor::with_config(ScenarioExecutorConfig {
        frame_dt: app_config.run.frame_dt,
        verbose,
    });
    let report = executor.execute_scenario(definition, &mut sim)?;

    if write_report {
        let path = report_path(&app_config.run.report_dir, &definition.name);
        report.save_json(&path)?;
        log::info!("Report written to {}", path.display());
    }

    print_summary(&report);
    if !report.passed {
        bail!(
            "Scenario '{}' failed {} check(s)",
            report.scenario_name,
            report.failures.len()
        );
    }
    Ok(())
}

fn pour_scenario(
    grains: u32,
    seconds: f32,
    shake: Option<f32>,
    simulation: starsand_core::SimConfig,
) -> ScenarioDefinition {
    let mut actions = vec![
        ScenarioAction::Pour { grains },
        ScenarioAction::AdvanceSeconds { seconds },
    ];
    if let Some(strength) = shake {
        actions.push(ScenarioAction::Shake { strength });
        actions.push(ScenarioAction::AdvanceSeconds { seconds });
    }
    let expected = (grains as usize).min(simulation.capacity);

    ScenarioDefinition {
        name: format!("pour {}", grains),
        description: format!("Pour {} grains and run {}s", grains, seconds),
        simulation: Some(simulation),
        setup: vec![],
        actions,
        verify: vec![
            VerificationCondition::AliveCount {
                expected,
                tolerance: None,
            },
            VerificationCondition::GrainsInsideBottle,
            VerificationCondition::DivergenceResets { max: 0 },
        ],
        invariants: vec![
            VerificationCondition::NoWallPenetration { epsilon: 1e-3 },
            VerificationCondition::InstanceCountMatchesAlive,
            VerificationCondition::NoPairOverlap {
                epsilon: PAIR_EPSILON,
            },
        ],
    }
}

fn print_summary(report: &ExecutionReport) {
    println!(
        "{}: {} ({} frames, {} grains alive)",
        report.scenario_name,
        if report.passed { "PASSED" } else { "FAILED" },
        report.frames_executed,
        report.alive_grains
    );
    println!(
        "  emitted {} | recycled {} | swept {} | freezes {} | wakes {}",
        report.stats.emitted,
        report.stats.recycled,
        report.stats.swept,
        report.stats.freezes,
        report.stats.wakes
    );
    println!("  {}", report.timing.summary());
    for failure in &report.failures {
        println!("  ✗ {}", failure.message);
    }
}
