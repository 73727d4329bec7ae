use anyhow::{Context, Result};
use mise::atom::AtomRegistry;
use mise::cli::commands::{AtomsCommand, RunCommand, ValidateCommand};
use mise::cli::output::*;
use mise::cli::{Cli, Command};
use mise::core::config::{DataStrategyConfig, PipelineConfig};
use mise::execution::{ExecutionEngine, Pipeline};
use mise::storage::StrategyRegistry;
use tracing::{error, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::from_args();

    // Initialize logging
    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set logging subscriber")?;

    let atoms = AtomRegistry::with_builtin();

    // Execute command
    match &cli.command {
        Command::Run(cmd) => run_pipeline(cmd, &atoms).await?,
        Command::Validate(cmd) => validate_pipeline(cmd, &atoms)?,
        Command::Atoms(cmd) => describe_atoms(cmd, &atoms)?,
    }

    Ok(())
}

async fn run_pipeline(cmd: &RunCommand, atoms: &AtomRegistry) -> Result<()> {
    let mut config =
        PipelineConfig::from_file(&cmd.file).context("Failed to load pipeline config")?;

    println!("{} Loaded pipeline: {}", INFO, style(&config.name).bold());

    if let Some(location) = &cmd.data_location {
        match config.data_strategy.as_mut() {
            Some(strategy) => strategy.data_location = location.clone(),
            None => {
                config.data_strategy =
                    Some(DataStrategyConfig::new("PandasStrategy", location.clone()))
            }
        }
    }

    let strategies = StrategyRegistry::with_builtin();
    let mut pipeline = match Pipeline::assemble(config, atoms, &strategies) {
        Ok(pipeline) => pipeline,
        Err(e) => {
            println!("{} Pipeline failed validation:", CROSS);
            println!("  {}", style(e).red());
            std::process::exit(1);
        }
    };

    if let Some(directory) = &pipeline.run_directory {
        println!("{} Run directory: {}", INFO, style(directory.display()).dim());
    }
    for step in &pipeline.steps {
        let directive = format_cache_directive(step.cache);
        if !directive.is_empty() {
            println!("  [{}] {} {}", step.index, style(&step.task_name).cyan(), directive);
        }
    }

    let engine = ExecutionEngine::new();
    engine
        .add_event_handler(|event| {
            println!("{}", format_execution_event(&event));
        })
        .await;

    println!();
    let result = engine.execute(&mut pipeline).await;

    match result {
        Ok(outcome) => {
            if cmd.json {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            } else if !outcome.returns.is_empty() {
                println!("\n{} Returned values:", INFO);
                for (name, value) in &outcome.returns {
                    println!("{}", format_return(name, value, 10));
                }
            }
            if outcome.restricted {
                println!("{} Output contains restricted data", WARN);
            }
            println!("\nSteps:");
            for step in &pipeline.steps {
                println!(
                    "  [{}] {} {}",
                    step.index,
                    style(&step.task_name).bold(),
                    format_step_state(&step.state)
                );
            }
            println!(
                "\n{} {} {}",
                CHECK,
                style(&pipeline.name).bold(),
                format_status(outcome.status)
            );
        }
        Err(e) => {
            println!(
                "\n{} {} {}",
                CROSS,
                style(&pipeline.name).bold(),
                style("failed").red()
            );
            error!("{}", e);
            std::process::exit(1);
        }
    }

    Ok(())
}

fn validate_pipeline(cmd: &ValidateCommand, atoms: &AtomRegistry) -> Result<()> {
    println!("{} Validating pipeline...", INFO);

    let result = PipelineConfig::from_file(&cmd.file).and_then(|config| {
        let pipeline = Pipeline::check(&config, atoms)?;
        Ok((config, pipeline))
    });

    match result {
        Ok((config, pipeline)) => {
            println!("{} Pipeline configuration is valid!", CHECK);
            println!("  Name: {}", style(&config.name).bold());
            println!("  Steps: {}", style(pipeline.len()).cyan());
            for step in &pipeline.steps {
                println!("    [{}] {} ({})", step.index, style(&step.atom).bold(), step.task_name);
            }

            if cmd.json {
                let json = serde_json::to_string_pretty(&config)?;
                println!("\n{}", json);
            }
            Ok(())
        }
        Err(e) => {
            println!("{} Validation failed:", CROSS);
            println!("  {}", style(format!("{:#}", e)).red());
            std::process::exit(1);
        }
    }
}

fn describe_atoms(cmd: &AtomsCommand, atoms: &AtomRegistry) -> Result<()> {
    let mut docs = atoms.documentation();
    if let Some(name) = &cmd.name {
        docs.retain(|atom, _| atom == name);
        if docs.is_empty() {
            println!("{} No atom named {}", WARN, style(name).bold());
            std::process::exit(1);
        }
    }

    let rendered = if cmd.json {
        serde_json::to_string_pretty(&docs)?
    } else {
        serde_yaml::to_string(&docs)?
    };
    println!("{}", rendered);
    Ok(())
}
