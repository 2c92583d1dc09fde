use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing::debug;

use command_router_complete::{
    ActiveHelpConfig, COMPLETE_CMD, COMPLETE_NO_DESC_CMD, Dispatcher, serve,
};
use command_router_core::{
    CommandTree, RouterConfig, TreeDefinition, effective_flags, validate_definition,
};
use command_router_shells::{Shell, generate};

/// Output format for routing reports.
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum CliOutputFormat {
    Json,
    Yaml,
}

#[derive(Debug, Parser)]
#[command(name = "cmdroute")]
#[command(about = "Route and complete command lines against a declarative command tree")]
struct Cli {
    /// Log filter used when RUST_LOG is unset (e.g. debug, command_router_core=trace).
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Lint a tree definition and check that it builds.
    Check(CheckArgs),
    /// Resolve a command line and report the target, arguments and flags.
    Resolve(ResolveArgs),
    /// Answer a completion request the way a generated script would ask it.
    Complete(CompleteArgs),
    /// Print a shell completion script for the tree.
    Script(ScriptArgs),
}

#[derive(Debug, Args)]
struct TreeArgs {
    /// Tree definition file (.yaml, .yml or .json).
    #[arg(long)]
    tree: PathBuf,
    /// Router configuration file overriding the definition's `config` block.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct CheckArgs {
    /// Tree definition file (.yaml, .yml or .json).
    tree: PathBuf,
}

#[derive(Debug, Args)]
struct ResolveArgs {
    #[command(flatten)]
    tree: TreeArgs,
    /// Report format.
    #[arg(long, value_enum, default_value = "json")]
    format: CliOutputFormat,
    /// The command line to route, without the program name.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<String>,
}

#[derive(Debug, Args)]
struct CompleteArgs {
    #[command(flatten)]
    tree: TreeArgs,
    /// Answer without descriptions, as `__completeNoDesc` does.
    #[arg(long)]
    no_descriptions: bool,
    /// Words typed so far; the last one is the word being completed.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<String>,
}

#[derive(Debug, Args)]
struct ScriptArgs {
    /// Tree definition file (.yaml, .yml or .json).
    #[arg(long)]
    tree: PathBuf,
    #[arg(long, value_enum)]
    shell: Shell,
    /// Leave descriptions out of the script and its completion requests.
    #[arg(long)]
    no_descriptions: bool,
    /// Write the script here instead of stdout.
    #[arg(long)]
    output: Option<PathBuf>,
}

/// What `resolve` prints.
#[derive(Debug, Serialize)]
struct RouteReport {
    command_path: String,
    called_as: String,
    args: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    dash_at: Option<usize>,
    /// Flags set on the command line, by name.
    flags: BTreeMap<String, String>,
}

fn main() {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    let result = match cli.command {
        Command::Check(args) => run_check(args),
        Command::Resolve(args) => run_resolve(args),
        Command::Complete(args) => run_complete(args),
        Command::Script(args) => run_script(args),
    };

    if let Err(err) = result {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn init_logging(level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn run_check(args: CheckArgs) -> Result<(), String> {
    let definition = load_definition(&args.tree)?;
    let problems = validate_definition(&definition);
    if !problems.is_empty() {
        for problem in &problems {
            eprintln!("  {problem}");
        }
        return Err(format!(
            "'{}' has {} problem(s)",
            args.tree.display(),
            problems.len()
        ));
    }

    let tree = definition
        .build()
        .map_err(|err| format!("Failed to build '{}': {err}", args.tree.display()))?;
    println!(
        "'{}' is valid: {} command(s).",
        args.tree.display(),
        tree.walk(tree.root()).len()
    );
    Ok(())
}

fn run_resolve(args: ResolveArgs) -> Result<(), String> {
    let (mut tree, config) = load_tree(&args.tree)?;
    let invocation = tree.prepare(&config, &args.args).map_err(|e| e.to_string())?;

    let flags = effective_flags(&tree, invocation.command)
        .sorted_ids(tree.flag_arena())
        .into_iter()
        .map(|id| tree.flag(id))
        .filter(|flag| flag.changed())
        .map(|flag| (flag.name().to_string(), flag.value().to_string()))
        .collect();
    let report = RouteReport {
        command_path: tree.command_path(invocation.command),
        called_as: invocation.called_as,
        args: invocation.args,
        dash_at: invocation.dash_at,
        flags,
    };

    let rendered = match args.format {
        CliOutputFormat::Json => serde_json::to_string_pretty(&report)
            .map_err(|e| format!("JSON serialization failed: {e}"))?,
        CliOutputFormat::Yaml => {
            serde_yaml::to_string(&report).map_err(|e| format!("YAML serialization failed: {e}"))?
        }
    };
    println!("{}", rendered.trim_end());
    Ok(())
}

fn run_complete(args: CompleteArgs) -> Result<(), String> {
    let (mut tree, config) = load_tree(&args.tree)?;
    let program = tree.name(tree.root()).to_string();
    let dispatcher = Dispatcher::new(config, ActiveHelpConfig::from_env(&program));

    let request = if args.no_descriptions {
        COMPLETE_NO_DESC_CMD
    } else {
        COMPLETE_CMD
    };
    let mut argv = Vec::with_capacity(args.args.len() + 2);
    argv.push(request.to_string());
    argv.extend(args.args);
    // A request always names the word being completed, even when empty.
    if argv.len() == 1 {
        argv.push(String::new());
    }
    debug!(?argv, "serving completion request");

    let stdout = io::stdout();
    let stderr = io::stderr();
    serve(
        &dispatcher,
        &mut tree,
        &argv,
        &mut stdout.lock(),
        &mut stderr.lock(),
    )
    .map_err(|err| format!("Failed to write completions: {err}"))?;
    Ok(())
}

fn run_script(args: ScriptArgs) -> Result<(), String> {
    let tree = load_definition(&args.tree)?
        .build()
        .map_err(|err| format!("Failed to build '{}': {err}", args.tree.display()))?;

    let mut script = Vec::new();
    generate(args.shell, &tree, !args.no_descriptions, &mut script).map_err(|e| e.to_string())?;

    match &args.output {
        Some(path) => {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    fs::create_dir_all(parent).map_err(|err| {
                        format!(
                            "Failed to create output directory '{}': {err}",
                            parent.display()
                        )
                    })?;
                }
            }
            fs::write(path, &script)
                .map_err(|err| format!("Failed to write '{}': {err}", path.display()))?;
            eprintln!("Wrote {} script to '{}'.", args.shell, path.display());
        }
        None => io::stdout()
            .write_all(&script)
            .map_err(|err| format!("Failed to write script: {err}"))?,
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn load_definition(path: &Path) -> Result<TreeDefinition, String> {
    TreeDefinition::load(path).map_err(|err| format!("Failed to load '{}': {err}", path.display()))
}

/// Builds the tree and picks the routing configuration: `--config` when
/// given, otherwise the definition's own.
fn load_tree(args: &TreeArgs) -> Result<(CommandTree, RouterConfig), String> {
    let definition = load_definition(&args.tree)?;
    let tree = definition
        .build()
        .map_err(|err| format!("Failed to build '{}': {err}", args.tree.display()))?;
    let config = match &args.config {
        Some(path) => RouterConfig::load(path)
            .map_err(|err| format!("Failed to load config '{}': {err}", path.display()))?,
        None => definition.config,
    };
    Ok((tree, config))
}
