use crate::config::EngineConfig;
use crate::engine::ValidationEngine;
use crate::route::{load_routes, RouteKey};
use crate::surface::Surface;
use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use http::Method;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use tracing::info;

pub const EXIT_OK: u8 = 0;
pub const EXIT_CONFIG_ERROR: u8 = 1;
pub const EXIT_INVALID: u8 = 2;

/// Command-line interface for the route schema validation engine
#[derive(Parser)]
#[command(name = "brrtschema")]
#[command(about = "Route schema validation engine CLI", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Compile every schema in a route table
    Check {
        /// Route table file (YAML or JSON)
        #[arg(short, long)]
        routes: PathBuf,

        /// Engine configuration file (YAML)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Validate one surface of one route against a JSON value
    Validate {
        /// Route table file (YAML or JSON)
        #[arg(short, long)]
        routes: PathBuf,

        /// HTTP method of the route
        #[arg(short, long)]
        method: String,

        /// Path template of the route, e.g. /users/{id}
        #[arg(short, long)]
        path: String,

        /// Surface to validate: path, query, headers, payload or response
        #[arg(short, long)]
        surface: Surface,

        /// JSON value to validate
        #[arg(long)]
        value: String,

        /// Content type of a payload value
        #[arg(long)]
        content_type: Option<String>,

        /// Engine configuration file (YAML)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

fn engine_config(path: Option<&Path>) -> anyhow::Result<EngineConfig> {
    match path {
        Some(path) => EngineConfig::from_file(path),
        None => Ok(EngineConfig::from_env()),
    }
}

/// Build an engine and register the route table at `routes`.
///
/// Returns `Ok(None)` after reporting a registration error on stderr.
fn registered_engine(routes: &Path, config: Option<&Path>) -> anyhow::Result<Option<ValidationEngine>> {
    let table = load_routes(routes)?;
    let engine = ValidationEngine::new(engine_config(config)?);
    match engine.register_routes(&table) {
        Ok(summary) => {
            info!(
                routes = summary.routes_registered,
                schemas = summary.schemas_compiled + summary.file_schemas,
                "Route table registered"
            );
            Ok(Some(engine))
        }
        Err(e) => {
            eprintln!("error: {e}");
            Ok(None)
        }
    }
}

/// Execute a parsed command and return the process exit code.
///
/// Command output goes to stdout; diagnostics go to stderr.
pub fn run(cli: Cli) -> anyhow::Result<u8> {
    match cli.command {
        Commands::Check { routes, config } => {
            let Some(engine) = registered_engine(&routes, config.as_deref())? else {
                return Ok(EXIT_CONFIG_ERROR);
            };
            let cache = engine.cache();
            let keys: Vec<String> = cache.keys().iter().map(|k| k.to_string()).collect();
            let out = json!({
                "routes": cache.route_count(),
                "schemas": cache.size(),
                "keys": keys,
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
            Ok(EXIT_OK)
        }
        Commands::Validate {
            routes,
            method,
            path,
            surface,
            value,
            content_type,
            config,
        } => {
            let method = Method::from_bytes(method.trim().to_ascii_uppercase().as_bytes())
                .with_context(|| format!("invalid HTTP method '{method}'"))?;
            let value: Value = serde_json::from_str(&value).context("--value is not valid JSON")?;

            let Some(engine) = registered_engine(&routes, config.as_deref())? else {
                return Ok(EXIT_CONFIG_ERROR);
            };
            let key = RouteKey::new(method, path);
            if !engine.cache().contains_route(&key) {
                return Err(anyhow!("route {key} is not in {}", routes.display()));
            }

            let (report, _) = engine.validate_value(surface, &key, value, content_type.as_deref());
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(if report.valid { EXIT_OK } else { EXIT_INVALID })
        }
    }
}
