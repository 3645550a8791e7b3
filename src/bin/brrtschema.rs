use brrtschema::cli::{run, Cli, EXIT_CONFIG_ERROR};
use brrtschema::telemetry::{init_logging_with_config, LogConfig};
use clap::Parser;
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut log_config = LogConfig::from_env();
    if std::env::var("BRRTS_LOG_LEVEL").is_err() {
        log_config.log_level = "warn".to_string();
    }
    let _guard = match init_logging_with_config(&log_config) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Warning: {e:#}");
            None
        }
    };

    match run(cli) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::from(EXIT_CONFIG_ERROR)
        }
    }
}
