mod commands;
mod config;
mod openai;

use std::path::PathBuf;
use std::process;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::commands::{
    BrewParamArgs, cmd_bean_add, cmd_bean_delete, cmd_bean_list, cmd_bean_show, cmd_bean_update,
    cmd_brew_delete, cmd_brew_list, cmd_brew_log, cmd_methods, cmd_migrate, cmd_onboarding,
    cmd_pending, cmd_ratio, cmd_suggest, cmd_sync, parse_roast,
};
use crate::config::Config;
use crate::openai::OpenAiClient;
use brewlog_core::BrewService;
use brewlog_core::models::{NewBean, UpdateBean};

#[derive(Parser)]
#[command(
    name = "brewlog",
    version,
    about = "A coffee brewing journal with next-brew suggestions"
)]
struct Cli {
    /// Path to the database file (default: platform data dir)
    #[arg(long, global = true, value_name = "PATH")]
    db: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage coffee beans
    Bean {
        #[command(subcommand)]
        command: BeanCommands,
    },
    /// Log and review brews
    Brew {
        #[command(subcommand)]
        command: BrewCommands,
    },
    /// Suggest parameters for the next brew of a bean
    Suggest {
        /// Bean name or ID
        bean: String,
        /// Brew method: espresso, pourover, frenchpress, mokapot
        #[arg(short, long)]
        method: String,
        /// Skip the remote suggester and use the cached or rule-based suggestion
        #[arg(long)]
        offline: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Calculate the brew ratio for a method
    Ratio {
        /// Brew method: espresso, pourover, frenchpress, mokapot
        method: String,
        /// Coffee dose in grams
        #[arg(long)]
        dose: Option<f64>,
        /// Espresso yield in grams
        #[arg(long = "yield")]
        yield_g: Option<f64>,
        /// Water in ml
        #[arg(long)]
        water: Option<f64>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List supported brew methods and their recommended ranges
    Methods {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Convert brews saved in the legacy format
    Migrate {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show brews recorded offline and waiting to sync
    Pending {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Move offline brews into the log
    Sync {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show or set onboarding status
    Onboarding {
        /// New status: not-started, skipped, completed
        status: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum BeanCommands {
    /// Add a bean
    Add {
        /// Bean name
        name: String,
        /// Origin (country, region, farm)
        #[arg(long)]
        origin: Option<String>,
        /// Roast level: light, medium-light, medium, medium-dark, dark
        #[arg(long, default_value = "medium")]
        roast: String,
        /// Free-form notes
        #[arg(long)]
        notes: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List beans
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show a bean with its brews and cached suggestions
    Show {
        /// Bean name or ID
        bean: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Update a bean (pass an empty string to clear origin or notes)
    Update {
        /// Bean name or ID
        bean: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        origin: Option<String>,
        #[arg(long)]
        roast: Option<String>,
        #[arg(long)]
        notes: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete a bean and all of its brews
    Delete {
        /// Bean name or ID
        bean: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum BrewCommands {
    /// Record a brew and refresh the suggestion for its bean
    Log {
        /// Bean name or ID
        bean: String,
        #[command(flatten)]
        params: BrewParamArgs,
        /// Taste feedback, comma separated: too-bitter, too-sour, balanced, weak, strong
        #[arg(short, long)]
        taste: String,
        /// Free-form notes
        #[arg(long)]
        notes: Option<String>,
        /// Queue the brew as if the device were offline
        #[arg(long)]
        offline: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List brews, newest first
    List {
        /// Only brews of this bean (name or ID)
        #[arg(long)]
        bean: Option<String>,
        /// Maximum number of brews to show
        #[arg(short = 'n', long, default_value = "20")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete a brew by ID (a unique prefix is enough)
    Delete {
        /// Brew ID
        id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("brewlog=warn,brewlog_core=warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

#[allow(clippy::too_many_lines)]
async fn run(cli: Cli) -> Result<()> {
    let config = Config::load(cli.db)?;
    let svc = BrewService::open(&config.db_path, config.settle_delay)?;
    let remote = OpenAiClient::new(config.openai)?;

    match cli.command {
        Commands::Bean { command } => match command {
            BeanCommands::Add {
                name,
                origin,
                roast,
                notes,
                json,
            } => {
                let roast_level = parse_roast(Some(&roast))?.unwrap_or_default();
                cmd_bean_add(
                    &svc,
                    NewBean {
                        name,
                        origin,
                        roast_level,
                        notes,
                    },
                    json,
                )
            }
            BeanCommands::List { json } => cmd_bean_list(&svc, json),
            BeanCommands::Show { bean, json } => cmd_bean_show(&svc, &bean, json),
            BeanCommands::Update {
                bean,
                name,
                origin,
                roast,
                notes,
                json,
            } => {
                let update = UpdateBean {
                    name,
                    origin,
                    roast_level: parse_roast(roast.as_deref())?,
                    notes,
                };
                cmd_bean_update(&svc, &bean, update, json)
            }
            BeanCommands::Delete { bean, json } => cmd_bean_delete(&svc, &bean, json),
        },
        Commands::Brew { command } => match command {
            BrewCommands::Log {
                bean,
                params,
                taste,
                notes,
                offline,
                json,
            } => cmd_brew_log(&svc, &remote, &bean, params, &taste, notes, offline, json).await,
            BrewCommands::List { bean, limit, json } => {
                cmd_brew_list(&svc, bean.as_deref(), limit, json)
            }
            BrewCommands::Delete { id, json } => cmd_brew_delete(&svc, &id, json),
        },
        Commands::Suggest {
            bean,
            method,
            offline,
            json,
        } => cmd_suggest(&svc, &remote, &bean, &method, offline, json).await,
        Commands::Ratio {
            method,
            dose,
            yield_g,
            water,
            json,
        } => cmd_ratio(&method, dose, yield_g, water, json),
        Commands::Methods { json } => cmd_methods(json),
        Commands::Migrate { json } => cmd_migrate(&svc, json),
        Commands::Pending { json } => cmd_pending(&svc, json),
        Commands::Sync { json } => cmd_sync(&svc, json).await,
        Commands::Onboarding { status, json } => cmd_onboarding(&svc, status.as_deref(), json),
    }
}
