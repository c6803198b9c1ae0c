use crate::branch::{check_branch, SystemGit};
use crate::commands::{BranchArgs, DecideArgs, RunArgs};
use anyhow::{Context, Result};
use engen::prelude::*;
use engen::services::memory::MemoryObjectStore;
use std::io::Write;
use std::sync::Weak;
use tracing::{debug, error, info, warn};

const UPLOAD_BUCKET: &str = "engen-uploads";
const CLI_REVIEWER: &str = "cli-reviewer";

/// Exit code for a run that ended in a rejection.
pub const EXIT_REJECTED: i32 = 2;

pub async fn handle_run(args: &RunArgs, quiet: bool) -> i32 {
    match run_workflow(args).await {
        Ok(report) => {
            if args.json {
                match serde_json::to_string_pretty(&report) {
                    Ok(json) => println!("{json}"),
                    Err(e) => {
                        error!("Failed to serialize report: {}", e);
                        return 1;
                    }
                }
            } else if !quiet {
                print_summary(&report);
            }
            if report.is_completed() {
                0
            } else {
                EXIT_REJECTED
            }
        }
        Err(e) => {
            error!("Workflow failed: {:#}", e);
            eprintln!("Error: {e:#}");
            1
        }
    }
}

fn build_config(args: &RunArgs) -> Result<EngenConfig> {
    let mut config = EngenConfig::load(args.config.as_deref()).context("loading configuration")?;
    if let Some(threshold) = args.threshold {
        config.gate.default_threshold = threshold;
    }
    config.gate.always_review.extend(args.always_review.iter().cloned());
    config.validate()?;
    Ok(config)
}

async fn run_workflow(args: &RunArgs) -> Result<WorkflowReport> {
    let (report, _) = run_with_ledger(args).await?;
    Ok(report)
}

async fn run_with_ledger(args: &RunArgs) -> Result<(WorkflowReport, Arc<ReviewLedger>)> {
    let config = build_config(args)?;
    let policy = config.to_policy()?;
    debug!(?policy, timeout = ?config.review_timeout(), "Gate policy");

    let reject = args
        .reject_stage
        .as_deref()
        .map(str::parse::<StageId>)
        .transpose()
        .context("invalid --reject-stage")?;
    let desk = Arc::new(ReviewDesk::from_config(&config.review)?);
    spawn_responder(&desk, reject);

    let store = Arc::new(MemoryObjectStore::new().with_object(
        UPLOAD_BUCKET,
        &args.diagram,
        b"diagram".to_vec(),
    ));
    let services = Services::in_memory().with_store(store.clone());
    let mut ledger = ReviewLedger::new();
    if config.review.audit_trail {
        ledger = ledger.with_store(store);
    }
    let ledger = Arc::new(ledger);

    let workflow = WorkflowBuilder::new()
        .processors(standard_processors(&services, Arc::new(PayloadFieldScorer::default())))
        .with_policy(policy)
        .with_reviewer(desk)
        .with_ledger(ledger.clone())
        .with_event_sink(Arc::new(LoggingEventSink::debug()))
        .build()?;

    info!(diagram = %args.diagram, "Running workflow");
    let report = workflow
        .run(serde_json::json!({"bucket": UPLOAD_BUCKET, "name": args.diagram}))
        .await?;
    Ok((report, ledger))
}

/// Answers every session the desk opens: rejects `reject`, approves the rest.
fn spawn_responder(desk: &Arc<ReviewDesk>, reject: Option<StageId>) {
    let mut opened = desk.subscribe();
    let desk: Weak<ReviewDesk> = Arc::downgrade(desk);
    tokio::spawn(async move {
        while let Some(request) = opened.recv().await {
            let Some(desk) = desk.upgrade() else { break };
            let outcome = if reject == Some(request.stage_id) {
                desk.reject(request.session_id, CLI_REVIEWER, "rejected from the command line")
            } else {
                desk.approve(request.session_id, CLI_REVIEWER, "")
            };
            if let Err(e) = outcome {
                warn!(session = %request.session_id, error = %e, "Could not answer review");
            }
        }
    });
}

fn print_summary(report: &WorkflowReport) {
    println!("Run {}", report.run_id);
    for stage in StageId::ALL {
        match report.state.slot(stage) {
            Some(result) => {
                let reviewer = result
                    .review()
                    .map(|note| format!(" by {}", note.reviewer_id))
                    .unwrap_or_default();
                println!(
                    "  {}. {:<24} score {:>5.1}  {}{}",
                    stage.ordinal(),
                    stage.as_str(),
                    result.score.value(),
                    result.status(),
                    reviewer
                );
            }
            None => println!("  {}. {:<24} not run", stage.ordinal(), stage.as_str()),
        }
    }
    match report.outcome {
        WorkflowOutcome::Completed => println!("Completed in {:.1} ms", report.duration_ms),
        WorkflowOutcome::Rejected { stage } => println!("Rejected at {stage}"),
    }
    for (stage, record) in &report.follow_ups {
        println!("  {stage}: {record}");
    }
}

pub fn handle_decide(args: &DecideArgs) -> i32 {
    match engen::gate::decide_raw(args.score, args.threshold) {
        Ok(decision) => {
            println!("{decision}");
            0
        }
        Err(e) => {
            eprintln!("Error: {e}");
            1
        }
    }
}

pub fn handle_branch(args: &BranchArgs) -> i32 {
    let mut stdout = std::io::stdout().lock();
    if let Err(e) = check_branch(&SystemGit, &args.target, &mut stdout) {
        error!("Failed to write output: {}", e);
    }
    if let Err(e) = stdout.flush() {
        error!("Failed to flush output: {}", e);
    }
    0
}
