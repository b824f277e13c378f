use std::io::Read;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use keymapper::config::RuleSet;
use keymapper::mcp::Session;
use keymapper::{CrossModelConverter, Record};

#[derive(Parser)]
#[command(name = "keymapper", about = "Property <-> JSON key mapping server")]
struct Cli {
    /// Rules file (defaults to ~/.keymapper/rules.json when present)
    #[arg(short, long, global = true)]
    rules: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the MCP stdio server
    Serve,

    /// Print the JSON key a property resolves to
    Resolve {
        /// Model type name
        #[arg(short, long = "type")]
        type_name: String,

        property: String,
    },

    /// Print the property a JSON key belongs to
    Reverse {
        /// Model type name
        #[arg(short, long = "type")]
        type_name: String,

        json_key: String,
    },

    /// Re-key a JSON record from one model type to another
    Convert {
        #[arg(long)]
        from: String,

        #[arg(long)]
        to: String,

        /// Input file; reads stdin when omitted
        file: Option<PathBuf>,
    },

    /// Validate the rules and report key collisions between declared properties
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let Some(command) = cli.command else {
        eprintln!("Usage: keymapper [--rules <file>] serve");
        eprintln!("       keymapper [--rules <file>] resolve --type <type> <property>");
        eprintln!("       keymapper [--rules <file>] reverse --type <type> <json_key>");
        eprintln!("       keymapper [--rules <file>] convert --from <type> --to <type> [file]");
        eprintln!("       keymapper [--rules <file>] check");
        std::process::exit(1);
    };

    let rules = RuleSet::load_or_default(cli.rules.as_deref())?;
    let session = Session::from_rules(&rules)?;

    match command {
        Commands::Serve => {
            tracing::info!(
                types = session.registry.mapped_types().len(),
                snake_case = session.registry.snake_case_types().len(),
                "keymapper server starting"
            );
            keymapper::server::stdio::run(session).await?;
        }

        Commands::Resolve { type_name, property } => {
            let entry = session.registry.mapping_entry(&type_name, &property);
            println!("{}\t({})", entry.json_key, entry.source);
        }

        Commands::Reverse { type_name, json_key } => {
            println!("{}", session.registry.property_name(&type_name, &json_key));
        }

        Commands::Convert { from, to, file } => {
            let input = match &file {
                Some(path) => std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read {}", path.display()))?,
                None => {
                    let mut buf = String::new();
                    std::io::stdin()
                        .read_to_string(&mut buf)
                        .context("Failed to read stdin")?;
                    buf
                }
            };
            let record: Record =
                serde_json::from_str(&input).context("Input must be a JSON object")?;
            let converter = CrossModelConverter::new(&session.registry).with_filter(&session.filter);
            let output = converter.convert_record(&record, &from, &to);
            println!("{}", serde_json::to_string_pretty(&output)?);
        }

        Commands::Check => {
            let registry = &session.registry;
            eprintln!(
                "{} global entries, {} typed tables, {} snake_case types, {} models",
                registry.global_mapping().len(),
                registry.mapped_types().len(),
                registry.snake_case_types().len(),
                rules.models.len()
            );

            let mut problems = 0;
            for model in &rules.models {
                for collision in registry.key_collisions(&model.name) {
                    eprintln!("  {collision}");
                    problems += 1;
                }
            }
            if problems > 0 {
                eprintln!("\n{problems} collision(s) found");
                std::process::exit(1);
            }
            eprintln!("OK");
        }
    }

    Ok(())
}
