use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Stage-gated diagram-to-deployment workflow runner
#[derive(Parser, Debug)]
#[command(
    name = "engen",
    about = "Stage-gated diagram-to-deployment workflow runner",
    version,
    long_about = "engen runs the five-stage EnGen workflow (diagram validation, document \
                  generation, component specification, artifact generation, human \
                  verification). Each stage is gated on its score: passing scores advance \
                  automatically, the rest go to a reviewer."
)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(long, global = true, value_name = "LEVEL", help = "Set logging level")]
    pub log_level: Option<String>,

    #[arg(short = 'v', long, global = true, help = "Enable debug logging")]
    pub verbose: bool,

    #[arg(
        short = 'q',
        long,
        global = true,
        conflicts_with = "verbose",
        help = "Quiet mode - suppress non-error output"
    )]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(
        about = "Run the workflow against in-memory services",
        long_about = "Runs all five stages against in-memory services and prints a summary.\n\n\
                      Examples:\n  \
                      engen run\n  \
                      engen run --diagram shop.png --threshold 90\n  \
                      engen run --reject-stage 5 --always-review 5"
    )]
    Run(RunArgs),

    #[command(
        about = "Evaluate one score against a threshold",
        long_about = "Prints auto_approve when the score meets the threshold, \
                      escalate otherwise.\n\n\
                      Examples:\n  \
                      engen decide 85\n  \
                      engen decide 79 --threshold 80"
    )]
    Decide(DecideArgs),

    #[command(
        about = "Check the current git branch",
        long_about = "Prints the current branch, switches to the target branch when they differ \
                      and prints common git commands. Always exits with status 0."
    )]
    Branch(BranchArgs),
}

#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    #[arg(long, default_value = "architecture.png", help = "Diagram name to upload and process")]
    pub diagram: String,

    #[arg(long, help = "Default gate threshold (0-100), overrides config and environment")]
    pub threshold: Option<f64>,

    #[arg(
        short = 'c',
        long,
        value_name = "PATH",
        env = "ENGEN_CONFIG",
        help = "TOML configuration file"
    )]
    pub config: Option<PathBuf>,

    #[arg(
        long,
        value_name = "STAGE",
        help = "Reject the given stage (1-5 or name) when it is reviewed"
    )]
    pub reject_stage: Option<String>,

    #[arg(long, value_name = "STAGE", help = "Always send the given stage to review")]
    pub always_review: Vec<String>,

    #[arg(long, help = "Print the report as JSON")]
    pub json: bool,
}

#[derive(Parser, Debug, Clone)]
pub struct DecideArgs {
    #[arg(value_name = "SCORE", help = "Stage score (0-100)")]
    pub score: f64,

    #[arg(long, default_value_t = engen::gate::DEFAULT_THRESHOLD, help = "Gate threshold (0-100)")]
    pub threshold: f64,
}

#[derive(Parser, Debug, Clone)]
pub struct BranchArgs {
    #[arg(long, default_value = "main", help = "Branch to switch to")]
    pub target: String,
}
