use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser as ClapParser, Subcommand};
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;

use livedoc::engine::ActionRequest;
use livedoc::expr::{ParseFailure, parse_expression, parse_template};
use livedoc::{ChildSpec, ComponentSpec, CycleReport, Engine, EngineConfig, Interaction, Value};

#[derive(ClapParser)]
#[command(name = "livedoc")]
#[command(about = "Run live interactive documents")]
struct Cli {
    /// Engine settings (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Reject external action requests
    #[arg(long, global = true)]
    read_only: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Settle a document, replay a script and print the snapshot
    Run {
        /// Path to the document (JSON)
        file: PathBuf,
        /// Commands to replay, one JSON object per line
        #[arg(long)]
        script: Option<PathBuf>,
    },
    /// Check that every expression parses and the document settles
    Check {
        /// Path to the document (JSON)
        file: PathBuf,
    },
    /// Answer JSON line commands on stdin
    Serve {
        /// Path to the document (JSON)
        file: PathBuf,
    },
}

/// One line of a script or of `serve` input.
#[derive(Debug, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
enum Command {
    Action {
        target: String,
        action: String,
        #[serde(default)]
        args: BTreeMap<String, serde_json::Value>,
    },
    Click {
        target: String,
    },
    Focus {
        target: String,
    },
    Value {
        target: String,
        state: String,
    },
    Snapshot,
}

/// Attributes whose values are expressions rather than plain text.
const EXPRESSION_ATTRIBUTES: &[&str] = &[
    "condition",
    "coords",
    "credit",
    "data",
    "disabled",
    "fixed",
    "from",
    "hide",
    "initialPage",
    "length",
    "maxNumber",
    "newValue",
    "prefill",
    "sources",
    "step",
    "to",
    "triggerWhen",
    "value",
    "x",
    "y",
];

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref(), cli.read_only)?;

    match cli.command {
        Commands::Run { file, script } => run(&file, script.as_deref(), config),
        Commands::Check { file } => check(&file, config),
        Commands::Serve { file } => {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .context("starting runtime")?;
            runtime.block_on(serve(&file, config))
        }
    }
}

fn load_config(path: Option<&Path>, read_only: bool) -> Result<EngineConfig> {
    let config = match path {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            EngineConfig::from_toml_str(&text)
                .with_context(|| format!("loading config {}", path.display()))?
        }
        None => EngineConfig::default(),
    };
    Ok(if read_only { config.read_only(true) } else { config })
}

fn load_document(file: &Path) -> Result<ComponentSpec> {
    let text =
        fs::read_to_string(file).with_context(|| format!("reading document {}", file.display()))?;
    ComponentSpec::from_json(&text).with_context(|| format!("parsing document {}", file.display()))
}

fn start(file: &Path, config: EngineConfig) -> Result<Engine> {
    let spec = load_document(file)?;
    Engine::new(spec, config).with_context(|| format!("building {}", file.display()))
}

fn run(file: &Path, script: Option<&Path>, config: EngineConfig) -> Result<()> {
    let mut engine = start(file, config)?;
    if let Some(script) = script {
        let text = fs::read_to_string(script)
            .with_context(|| format!("reading script {}", script.display()))?;
        for (number, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let command: Command = serde_json::from_str(line)
                .with_context(|| format!("{}:{}: bad command", script.display(), number + 1))?;
            let answer = execute(&mut engine, command)?;
            eprintln!("{answer}");
        }
    }
    println!("{}", engine.snapshot()?.to_json()?);
    Ok(())
}

fn check(file: &Path, config: EngineConfig) -> Result<()> {
    let spec = load_document(file)?;
    let filename = file.display().to_string();
    let mut failures = Vec::new();
    collect_failures(&spec, &mut failures);
    for failure in &failures {
        eprint!("{}", failure.render(&filename));
    }
    if !failures.is_empty() {
        bail!("{} expression(s) failed to parse", failures.len());
    }

    let mut engine = Engine::new(spec, config).with_context(|| format!("building {filename}"))?;
    let report = engine.settle()?;
    for issue in &report.issues {
        eprintln!("warning: {issue}");
    }
    let components = engine.snapshot()?.components.len();
    eprintln!("{filename}: {components} components, {} issues", report.issues.len());
    Ok(())
}

fn collect_failures(spec: &ComponentSpec, failures: &mut Vec<ParseFailure>) {
    for (key, source) in &spec.attributes {
        let is_expression = EXPRESSION_ATTRIBUTES.contains(&key.as_str()) || key.starts_with("arg:");
        if !is_expression {
            continue;
        }
        if let Err(failure) = parse_expression(source) {
            failures.push(failure);
        }
    }
    for child in &spec.children {
        match child {
            ChildSpec::Text(text) => {
                if let Err(failure) = parse_template(text) {
                    failures.push(failure);
                }
            }
            ChildSpec::Component(child) => collect_failures(child, failures),
        }
    }
}

fn execute(engine: &mut Engine, command: Command) -> Result<serde_json::Value> {
    let report = match command {
        Command::Action { target, action, args } => {
            let mut request = ActionRequest::new(target, action);
            for (name, value) in &args {
                request = request.with_arg(name.as_str(), Value::from_json(value));
            }
            engine.dispatch(request)?
        }
        Command::Click { target } => interact(engine, Interaction::click(target))?,
        Command::Focus { target } => interact(engine, Interaction::focus(target))?,
        Command::Value { target, state } => {
            let value = engine.value(&target, &state).unwrap_or_default();
            return Ok(serde_json::json!({ "value": value }));
        }
        Command::Snapshot => return Ok(serde_json::to_value(engine.snapshot()?)?),
    };
    Ok(serde_json::to_value(report)?)
}

fn interact(engine: &mut Engine, interaction: Interaction) -> Result<CycleReport> {
    engine.interact(interaction);
    let mut reports = engine.process_pending()?;
    reports.pop().context("interaction produced no cycle")
}

async fn serve(file: &Path, config: EngineConfig) -> Result<()> {
    let mut engine = start(file, config)?;
    let (tx, mut rx) = mpsc::channel::<String>(64);
    let reader = tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            if tx.send(line).await.is_err() {
                break;
            }
        }
        Ok::<_, std::io::Error>(())
    });
    let mut stdout = tokio::io::stdout();
    log::info!("serving {}", file.display());

    // One command at a time; the engine never sees a second event mid-cycle
    while let Some(line) = rx.recv().await {
        let answer = match serde_json::from_str::<Command>(&line) {
            Ok(command) => execute(&mut engine, command)
                .unwrap_or_else(|error| serde_json::json!({ "error": format!("{error:#}") })),
            Err(error) => serde_json::json!({ "error": format!("bad command: {error}") }),
        };
        let mut out = serde_json::to_string(&answer)?;
        out.push('\n');
        stdout.write_all(out.as_bytes()).await?;
        stdout.flush().await?;
    }
    reader.await.context("stdin reader stopped")?.context("reading stdin")?;
    Ok(())
}
