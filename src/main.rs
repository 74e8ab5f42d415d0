use acustack::compose::UserDataTemplate;
use acustack::config::{self, GlobalConfig};
use acustack::formatters::OutputFormatter;
use acustack::shared::logging;
use acustack::{AcustackError, CloudAssembly, Deployment};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const APP_VERSION: &str = env!("CARGO_PKG_VERSION");
const DEFAULT_OUT_DIR: &str = "cdk.out";
const TENANT_CONTEXT_KEY: &str = "tenant";

#[derive(Parser)]
#[command(
    name = "acustack",
    about = "Synthesize CloudFormation stacks for the shared VPC and per-tenant Acumatica ERP deployments.",
    version = APP_VERSION,
    disable_version_flag(true)
)]
pub struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[arg(
        long,
        short = 'c',
        value_name = "PATH",
        global = true,
        help = "Path to the configuration file"
    )]
    pub config: Option<String>,

    #[arg(
        long,
        short = 't',
        value_name = "NAME",
        env = "ACUSTACK_TENANT",
        global = true,
        help = "Tenant to deploy; without it only the network stack is synthesized"
    )]
    pub tenant: Option<String>,

    #[arg(
        long = "context",
        value_name = "KEY=VALUE",
        value_parser = parse_key_val,
        global = true,
        help = "Context value, e.g. --context tenant=acme"
    )]
    pub context: Vec<(String, String)>,

    #[arg(
        long,
        value_name = "PATH",
        global = true,
        help = "User data script template (defaults to the bundled script)"
    )]
    pub user_data: Option<PathBuf>,

    #[arg(long, short = 'V', help = "Print version")]
    pub version: bool,
}

#[derive(Subcommand, Clone)]
enum Commands {
    #[command(name = "synth", about = "Write CloudFormation templates and a manifest")]
    Synth {
        #[arg(long, short = 'o', value_name = "DIR", default_value = DEFAULT_OUT_DIR)]
        out: PathBuf,
    },

    #[command(name = "list", about = "List the stacks this invocation would deploy")]
    List,

    #[command(name = "graph", about = "Print the resource graph of a stack in DOT format")]
    Graph {
        #[arg(long, value_name = "NAME", help = "Stack to render (defaults to the last one)")]
        stack: Option<String>,

        #[arg(long, help = "Print graph statistics as JSON instead of DOT")]
        stats: bool,
    },

    #[command(name = "schema", about = "Print the JSON Schema of the configuration file")]
    Schema,
}

impl Cli {
    /// `--tenant` wins over `--context tenant=...`; empty values count as absent
    fn selector(&self) -> Option<&str> {
        let tenant = self.tenant.as_deref().filter(|name| !name.is_empty());
        tenant.or_else(|| {
            self.context
                .iter()
                .rev()
                .find(|(key, _)| key == TENANT_CONTEXT_KEY)
                .map(|(_, value)| value.as_str())
        })
    }
}

fn parse_key_val(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("invalid KEY=VALUE: no `=` found in `{}`", s)),
    }
}

fn main() {
    // Initialize tracing/logging
    init_logging();

    let cli = Cli::parse();

    if cli.version {
        println!("{}", APP_VERSION);
        std::process::exit(0);
    }

    if let Err(err) = run(&cli) {
        match err.downcast_ref::<AcustackError>() {
            Some(acustack_err) => {
                logging::error(&acustack_err.to_string());
                let report = OutputFormatter::format_error_with_suggestions(acustack_err);
                eprintln!(
                    "{}",
                    serde_json::to_string_pretty(&report).unwrap_or_else(|_| report.to_string())
                );
            }
            None => logging::error(&format!("{:#}", err)),
        }
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let command = cli.command.clone().unwrap_or(Commands::Synth {
        out: PathBuf::from(DEFAULT_OUT_DIR),
    });

    match command {
        Commands::Schema => {
            let schema = schemars::schema_for!(GlobalConfig);
            println!("{}", serde_json::to_string_pretty(&schema)?);
        }
        Commands::Synth { out } => {
            let assembly = synthesize(cli)?;
            let out_dir = if out.is_absolute() {
                out
            } else {
                std::env::current_dir()?.join(out)
            };
            let written = assembly.write_to(&out_dir)?;
            println!(
                "{}",
                serde_json::to_string_pretty(&OutputFormatter::format_synth_result(
                    &assembly, &written
                ))?
            );
        }
        Commands::List => {
            let assembly = synthesize(cli)?;
            println!(
                "{}",
                serde_json::to_string_pretty(&OutputFormatter::format_stack_list(&assembly))?
            );
        }
        Commands::Graph { stack, stats } => {
            let assembly = synthesize(cli)?;
            let target = match &stack {
                Some(name) => assembly
                    .stack(name)
                    .ok_or_else(|| anyhow::anyhow!("Unknown stack: {}", name))?,
                None => assembly
                    .stacks()
                    .last()
                    .ok_or_else(|| anyhow::anyhow!("No stacks were synthesized"))?,
            };
            let graph = target.graph();
            if stats {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&OutputFormatter::format_graph_statistics(
                        target.name(),
                        &graph.statistics()
                    ))?
                );
            } else {
                print!("{}", graph.to_dot(target.name()));
            }
        }
    }

    Ok(())
}

/// Load the configuration and build the assembly for the selected deployment.
fn synthesize(cli: &Cli) -> anyhow::Result<CloudAssembly> {
    let config_path = config::resolve_config_path(cli.config.as_deref())?;
    logging::info(&format!("Loading configuration from {}", config_path.display()));
    let config = GlobalConfig::load(&config_path)?;

    // Unknown tenants abort here, before anything is composed
    let deployment = Deployment::plan(&config, cli.selector())?;
    let user_data = UserDataTemplate::load_or_bundled(cli.user_data.as_deref())?;
    Ok(deployment.synthesize(&config, &user_data)?)
}

fn init_logging() {
    let log_level = std::env::var("ACUSTACK_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
    let filter = logging::filter_directive(&log_level);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("acustack={}", filter).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
