mod branch;
mod commands;
mod handlers;

use clap::Parser;
use commands::{CliArgs, Commands};
use std::env;
use std::process;
use tracing::{debug, Level};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() {
    let args = CliArgs::parse();
    init_logging_from_args(&args);

    debug!("engen v{} starting", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    let exit_code = match &args.command {
        Commands::Run(run_args) => handlers::handle_run(run_args, args.quiet).await,
        Commands::Decide(decide_args) => handlers::handle_decide(decide_args),
        Commands::Branch(branch_args) => handlers::handle_branch(branch_args),
    };

    process::exit(exit_code);
}

fn init_logging_from_args(args: &CliArgs) {
    use std::sync::Once;
    static INIT: Once = Once::new();

    INIT.call_once(|| {
        let level = if let Some(level_str) = &args.log_level {
            parse_level(level_str)
        } else if args.verbose {
            Level::DEBUG
        } else if args.quiet {
            Level::ERROR
        } else {
            let level_str = env::var("ENGEN_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
            parse_level(&level_str)
        };

        let mut filter = EnvFilter::from_default_env();

        if env::var("RUST_LOG").is_err() {
            if let Ok(directive) = format!("engen={level}").parse() {
                filter = filter.add_directive(directive);
            }
        }

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init();
    });
}

fn parse_level(level_str: &str) -> Level {
    match level_str.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => {
            eprintln!(
                "Invalid log level '{level_str}', defaulting to INFO. \
                 Valid levels: trace, debug, info, warn, error"
            );
            Level::INFO
        }
    }
}
