/*!
 * Samantha CLI
 *
 * Previews, confirms and runs file-management plans, either from a JSON plan
 * file or from a plain-language request handled by the offline planner.
 */

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::Read;
use std::path::PathBuf;

use samantha_core::planner::{KeywordPlanner, Planner};
use samantha_core::structured_log;
use samantha_core::suggestions::{self, DEFAULT_SCREENSHOT_THRESHOLD};
use samantha_core::{
    summarize, EngineConfig, ExecutionLoop, ExecutionResult, Memory, Plan, RunReport, SessionState, StdTerminal,
    Terminal,
};

#[derive(Parser)]
#[command(name = "samantha")]
#[command(about = "Samantha - plan-based file assistant", long_about = None)]
struct Cli {
    /// Config file (default: $SAMANTHA_CONFIG or ~/.samantha/config.yaml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Starting directory for the session (default: current directory)
    #[arg(long, global = true)]
    cwd: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a JSON plan file ("-" reads the plan from stdin)
    Run {
        plan: String,
    },

    /// Plan and run a plain-language request
    Ask {
        #[arg(required = true, trailing_var_arg = true)]
        request: Vec<String>,
    },

    /// Look for something worth tidying up and offer a plan
    Suggest {
        /// Desktop directory to inspect
        #[arg(long)]
        desktop: Option<PathBuf>,

        /// Minimum number of screenshots before suggesting a cleanup
        #[arg(long, default_value_t = DEFAULT_SCREENSHOT_THRESHOLD)]
        threshold: usize,
    },

    /// Interactive request loop; state carries over between requests
    Repl,

    /// Show recent entries from the configured log file, newest first
    Logs {
        #[arg(short = 'n', long, default_value_t = 20)]
        count: usize,
    },

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let code = match execute(cli).await {
        Ok(true) => 0,
        Ok(false) => 1,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            2
        }
    };
    std::process::exit(code);
}

/// Ok(false) means a plan ran and one of its steps failed
async fn execute(cli: Cli) -> Result<bool> {
    if let Commands::Version = cli.command {
        println!("samantha v{}", env!("CARGO_PKG_VERSION"));
        println!("Plan execution engine for the Samantha file assistant");
        return Ok(true);
    }

    let config = EngineConfig::load_with(cli.config.as_deref()).context("Failed to load configuration")?;
    structured_log::init_logger(config.log_config());

    let mut engine = ExecutionLoop::from_config(&config);
    let mut terminal = StdTerminal;

    match cli.command {
        Commands::Run { plan } => {
            let plan = read_plan(&plan)?;
            let mut session = SessionState::new(cli.cwd);
            let report = engine.run(&plan, &mut session, &mut terminal).await;
            print_summary(&mut terminal, &report);
            Ok(report.succeeded() || report.cancelled)
        }
        Commands::Ask { request } => {
            let plan = KeywordPlanner::new()
                .plan(&request.join(" "))
                .context("Could not plan the request")?;
            let mut session = SessionState::new(cli.cwd);
            let report = engine.run(&plan, &mut session, &mut terminal).await;
            print_summary(&mut terminal, &report);
            Ok(report.succeeded() || report.cancelled)
        }
        Commands::Suggest { desktop, threshold } => {
            let desktop = desktop
                .map(|d| PathBuf::from(shellexpand::tilde(&d.to_string_lossy()).to_string()))
                .unwrap_or_else(suggestions::default_desktop);
            let Some(suggestion) = suggestions::suggest_desktop_cleanup(&desktop, threshold) else {
                terminal.say("No suggestions right now.");
                return Ok(true);
            };

            terminal.say(&format!("{}\n{}\n", suggestion.title, suggestion.message));
            let mut session = SessionState::new(cli.cwd.or(Some(desktop)));
            let report = engine.run(&suggestion.plan, &mut session, &mut terminal).await;
            print_summary(&mut terminal, &report);
            Ok(report.succeeded() || report.cancelled)
        }
        Commands::Repl => {
            repl(&mut engine, &mut terminal, cli.cwd).await;
            Ok(true)
        }
        Commands::Logs { count } => {
            if config.log_file.is_none() {
                terminal.say("No log file configured (set log_file in the config).");
                return Ok(true);
            }
            for entry in structured_log::read_recent_logs(count) {
                terminal.say(&serde_json::to_string(&entry).context("Failed to render log entry")?);
            }
            Ok(true)
        }
        Commands::Version => Ok(true),
    }
}

fn read_plan(source: &str) -> Result<Plan> {
    let text = if source == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read plan from stdin")?;
        buf
    } else {
        std::fs::read_to_string(source).with_context(|| format!("Failed to read plan file {}", source))?
    };
    Plan::from_json(&text).context("Invalid plan")
}

fn print_summary(terminal: &mut dyn Terminal, report: &RunReport) {
    terminal.say(&format!("\n{}", summarize(report)));
}

async fn repl(engine: &mut ExecutionLoop, terminal: &mut dyn Terminal, cwd: Option<PathBuf>) {
    let planner = KeywordPlanner::new();
    let start = SessionState::new(cwd).working_directory().to_path_buf();
    let mut memory = Memory::new(start);

    terminal.say("Samantha is listening. Type 'exit' to quit.");
    loop {
        let line = terminal.ask("\n> ");
        let request = line.trim();
        if request.is_empty() || request.eq_ignore_ascii_case("exit") || request.eq_ignore_ascii_case("quit") {
            break;
        }

        // "them" on its own lists what the last request found
        if let Some(files) = memory.resolve_pronoun(request) {
            if files.is_empty() {
                terminal.say("The last request did not find any files.");
            } else {
                terminal.say(&files.join("\n"));
            }
            continue;
        }

        let plan = match request.to_ascii_lowercase().as_str() {
            "again" | "repeat" => match memory.last_plan() {
                Some(plan) => plan.clone(),
                None => {
                    terminal.say("Nothing to repeat yet.");
                    continue;
                }
            },
            "status" | "what happened" => {
                say_last_results(terminal, memory.last_results());
                continue;
            }
            _ => match planner.plan(request) {
                Ok(plan) => plan,
                Err(e) => {
                    terminal.say(&e.to_string());
                    continue;
                }
            },
        };

        let mut session = memory.session();
        let report = engine.run(&plan, &mut session, terminal).await;
        print_summary(terminal, &report);
        memory.remember(&plan, &report);
    }
}

fn say_last_results(terminal: &mut dyn Terminal, results: &[ExecutionResult]) {
    if results.is_empty() {
        terminal.say("No steps have run yet.");
        return;
    }
    for (i, result) in results.iter().enumerate() {
        terminal.say(&format!(
            "Step {} [{}]: {}",
            i + 1,
            result.status.as_str().to_uppercase(),
            result.output
        ));
    }
}
