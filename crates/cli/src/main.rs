mod io;
mod provenance;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::Level;
use tracing_subscriber::fmt::SubscriberBuilder;

use io::{read_json, write_json, InstanceFile, SolutionFile};
use nonobtuse::api::{
    optimize, optimize_validated, Config, InstanceFeatures, Method, ReferenceValidator,
    StrategySelector, Validator,
};
use provenance::{write_sidecar, Payload};

#[derive(Parser)]
#[command(name = "nonobtuse")]
#[command(about = "Non-obtuse Steiner triangulation of planar regions")]
struct Cmd {
    /// Log search progress (debug level)
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    action: Action,
}

#[derive(Subcommand)]
enum Action {
    /// Optimize an instance and write the solution (plus provenance sidecar)
    Solve {
        #[arg(long)]
        input: PathBuf,
        /// Defaults to `<input stem>.solution.json` next to the input
        #[arg(long)]
        out: Option<PathBuf>,
        /// Base configuration (JSON); settings embedded in the instance and flags override it
        #[arg(long)]
        config: Option<PathBuf>,
        /// local | sa | ant | auto
        #[arg(long)]
        method: Option<Method>,
        /// Iteration budget L
        #[arg(long)]
        budget: Option<usize>,
        #[arg(long)]
        seed: Option<u64>,
        #[arg(long)]
        time_limit_ms: Option<u64>,
        /// Skip the reference validator
        #[arg(long)]
        no_validate: bool,
    },
    /// Check a solution file against its instance
    Validate {
        #[arg(long)]
        instance: PathBuf,
        #[arg(long)]
        solution: PathBuf,
    },
    /// Print instance features and the strategy `auto` would pick
    Classify {
        #[arg(long)]
        input: PathBuf,
    },
    /// Print a small provenance JSON block
    Report,
}

fn main() -> Result<()> {
    let cmd = Cmd::parse();
    let level = if cmd.verbose { Level::DEBUG } else { Level::INFO };
    SubscriberBuilder::default()
        .with_target(false)
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
    match cmd.action {
        Action::Solve { input, out, config, method, budget, seed, time_limit_ms, no_validate } => {
            let mut cfg = match config {
                Some(path) => read_json::<Config>(&path)?,
                None => Config::default(),
            };
            let file: InstanceFile = read_json(&input)?;
            file.apply_to(&mut cfg);
            if let Some(m) = method {
                cfg.method = m;
            }
            if let Some(l) = budget {
                cfg.parameters.l = l;
            }
            if let Some(s) = seed {
                cfg.seed = s;
            }
            if time_limit_ms.is_some() {
                cfg.time_limit_ms = time_limit_ms;
            }
            let out = out.unwrap_or_else(|| default_out(&input));
            solve(file, cfg, &out, !no_validate)
        }
        Action::Validate { instance, solution } => validate(&instance, &solution),
        Action::Classify { input } => classify(&input),
        Action::Report => report(),
    }
}

fn default_out(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "instance".into());
    input.with_file_name(format!("{stem}.solution.json"))
}

fn solve(file: InstanceFile, cfg: Config, out: &Path, validate: bool) -> Result<()> {
    let instance = &file.instance;
    tracing::info!(
        instance = %instance.instance_uid,
        method = cfg.method.as_str(),
        out = %out.display(),
        "solve"
    );
    let solution = if validate {
        optimize_validated(instance, &cfg, &ReferenceValidator::new(cfg.geom))
    } else {
        optimize(instance, &cfg)
    }
    .with_context(|| format!("optimizing {}", instance.instance_uid))?;

    write_json(out, &SolutionFile::from(&solution))?;
    let summary = serde_json::json!({
        "obtuse_count": solution.score.obtuse,
        "steiner_count": solution.score.steiner,
        "method": solution.method,
        "stop": solution.report.stop,
        "steps": solution.report.steps,
        "elapsed_ms": solution.report.elapsed_ms,
    });
    let payload =
        Payload::new(&instance.instance_uid, serde_json::to_value(&cfg)?).with_summary(summary);
    let sidecar = write_sidecar(out, payload)?;
    tracing::info!(
        obtuse = solution.score.obtuse,
        steiner = solution.score.steiner,
        sidecar = %sidecar.display(),
        "solution written"
    );
    Ok(())
}

fn validate(instance: &Path, solution: &Path) -> Result<()> {
    let file: InstanceFile = read_json(instance)?;
    let sol_file: SolutionFile = read_json(solution)?;
    if sol_file.instance_uid != file.instance.instance_uid {
        tracing::warn!(
            instance = %file.instance.instance_uid,
            solution = %sol_file.instance_uid,
            "instance_uid mismatch"
        );
    }
    let mut validator = ReferenceValidator::default();
    if sol_file.obtuse_count.is_none() {
        validator = validator.without_score_check();
    }
    match validator.validate(&file.instance, &sol_file.to_solution()?) {
        Ok(report) => {
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
        Err(issues) => {
            println!("{}", serde_json::to_string_pretty(&issues)?);
            bail!("{} validation issue(s), first: {}", issues.len(), issues[0]);
        }
    }
}

fn classify(input: &Path) -> Result<()> {
    let file: InstanceFile = read_json(input)?;
    let mut cfg = Config::default();
    file.apply_to(&mut cfg);
    let features = InstanceFeatures::of(&file.instance, &cfg.geom)
        .with_context(|| format!("classifying {}", input.display()))?;
    let selection =
        StrategySelector::new(cfg.auto).resolve(cfg.method, &features, cfg.parameters.l);
    let obj = serde_json::json!({
        "instance_uid": file.instance.instance_uid,
        "points": features.points,
        "constraints": features.constraints,
        "holes": file.instance.holes.len(),
        "boundary_class": features.class,
        "method": selection.method,
        "steps": selection.steps,
    });
    println!("{}", serde_json::to_string_pretty(&obj)?);
    Ok(())
}

fn report() -> Result<()> {
    let obj = serde_json::json!({
        "code_rev": provenance::current_git_rev(),
        "engine_version": nonobtuse::VERSION,
        "defaults": Config::default(),
    });
    println!("{}", serde_json::to_string_pretty(&obj)?);
    Ok(())
}
