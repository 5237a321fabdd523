//! entity-cli - Inspect and edit managed entity documents
//!
//! Loads an entity from a JSON document into the native runtime, applies
//! one facade operation, and reports the resulting error state.

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use mgmt_core::foreign::NativeMap;
use mgmt_core::{CoreConfig, Entity, ErrorContext, ErrorKind, NativeRuntime};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "entity-cli")]
#[command(about = "Read and write attributes of a managed entity document", long_about = None)]
struct Cli {
    /// Entity document (JSON object)
    #[arg(short, long)]
    entity: PathBuf,

    /// Error reporting configuration (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Shape {
    String,
    Integer,
    Bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Check whether an attribute is present
    Has {
        /// Attribute name
        name: String,
    },

    /// Read an attribute
    Get {
        /// Attribute name
        name: String,

        /// Shape to read the value as
        #[arg(long, value_enum, default_value = "string")]
        shape: Shape,

        /// Value to report when the attribute is absent
        #[arg(long)]
        default: Option<String>,
    },

    /// Set an attribute, appending if it currently holds a list
    Set {
        /// Attribute name
        name: String,

        /// New value
        value: String,

        /// Shape to store the value as
        #[arg(long, value_enum, default_value = "string")]
        shape: Shape,
    },

    /// Replace an attribute with an empty list
    List {
        /// Attribute name
        name: String,
    },

    /// Remove an attribute
    Clear {
        /// Attribute name
        name: String,
    },

    /// Print the whole entity
    Dump,
}

fn load_entity(runtime: &Arc<NativeRuntime>, path: &Path) -> Result<(Entity, Arc<NativeMap>)> {
    let data = fs::read(path).with_context(|| format!("Failed to read entity: {:?}", path))?;
    let document: serde_json::Value =
        serde_json::from_slice(&data).context("Failed to parse entity document")?;
    let map = Arc::new(NativeMap::from_json(Arc::clone(runtime), &document)?);
    Ok((Entity::new(map.clone()), map))
}

fn save_entity(map: &NativeMap, path: &Path) -> Result<()> {
    let json = serde_json::to_vec_pretty(&map.to_json()).context("Failed to serialize entity")?;
    fs::write(path, json).with_context(|| format!("Failed to write entity: {:?}", path))
}

fn report(ctx: &ErrorContext) -> Result<()> {
    if ctx.is_error() {
        bail!("[{}] {}", ctx.code().value(), ctx.message());
    }
    Ok(())
}

fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => match CoreConfig::load(path) {
            Ok(config) => config,
            Err(err) => {
                let mut ctx = ErrorContext::new();
                ctx.raise(ErrorKind::Configuration, format_args!("{:#}", err));
                return report(&ctx);
            }
        },
        None => CoreConfig::default(),
    };

    let mut ctx = ErrorContext::with_config(&config);
    let runtime = NativeRuntime::new();
    let (entity, map) = load_entity(&runtime, &cli.entity)?;

    match cli.command {
        Commands::Has { name } => {
            println!("{}", entity.has(&name));
        }

        Commands::Get {
            name,
            shape,
            default,
        } => {
            let rendered = match (shape, default) {
                (Shape::String, None) => entity.get_string(&mut ctx, &name),
                (Shape::String, Some(default)) => {
                    entity.get_opt_string(&mut ctx, &name, Some(default.as_str()))
                }
                (Shape::Integer, None) => Some(entity.get_integer(&mut ctx, &name).to_string()),
                (Shape::Integer, Some(default)) => {
                    let default = default.parse().context("default is not an integer")?;
                    Some(entity.get_opt_integer(&mut ctx, &name, default).to_string())
                }
                (Shape::Bool, None) => Some(entity.get_bool(&mut ctx, &name).to_string()),
                (Shape::Bool, Some(default)) => {
                    let default = default.parse().context("default is not a boolean")?;
                    Some(entity.get_opt_bool(&mut ctx, &name, default).to_string())
                }
            };
            report(&ctx)?;
            if let Some(text) = rendered {
                println!("{}", text);
            }
        }

        Commands::Set { name, value, shape } => {
            match shape {
                Shape::String => entity.set_string(&mut ctx, &name, Some(value.as_str())),
                Shape::Integer => {
                    let num = value.parse().context("value is not an integer")?;
                    entity.set_integer(&mut ctx, &name, Some(num))
                }
                Shape::Bool => {
                    let flag = value.parse().context("value is not a boolean")?;
                    entity.set_bool(&mut ctx, &name, Some(flag))
                }
            };
            report(&ctx)?;
            save_entity(&map, &cli.entity)?;
        }

        Commands::List { name } => {
            entity.set_list(&mut ctx, &name);
            report(&ctx)?;
            save_entity(&map, &cli.entity)?;
        }

        Commands::Clear { name } => {
            entity.clear(&mut ctx, &name);
            report(&ctx)?;
            save_entity(&map, &cli.entity)?;
        }

        Commands::Dump => {
            for (key, value) in map.snapshot() {
                println!("{} = {}", key, value.to_json());
            }
        }
    }

    entity.free();
    Ok(())
}
