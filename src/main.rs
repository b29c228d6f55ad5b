mod cli;
mod config;
mod controller;
mod error;
mod gateway;
mod ledger;
mod simulator;
mod state_machine;
mod ui;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;

use cli::{Cli, Command};
use config::PaysimConfig;
use controller::SubmissionController;
use error::PaysimError;
use gateway::{HttpChannel, LocalChannel, StatusResponse, SubmitChannel};
use ledger::IdempotencyLedger;
use simulator::{Outcome, OutcomeDecider, RandomOutcome, ScriptedOutcomes};
use state_machine::{Phase, RetryConfig};
use ui::SubmissionProgress;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = PaysimConfig::load()?;

    // CLI flags take precedence over the config file.
    if cli.endpoint.is_some() {
        config.endpoint = cli.endpoint.clone();
    }
    if cli.seed.is_some() {
        config.seed = cli.seed;
    }
    if let Some(max_retries) = cli.max_retries {
        config.max_retries = max_retries;
    }

    match cli.command {
        Command::Submit { email, amount } => run_submit(&config, &email, amount).await,
        Command::Status { request_id } => run_status(&config, &request_id).await,
        Command::Demo => run_demo(&config).await,
    }
}

/// Submit one payment, either against a remote gateway or the in-process
/// simulation, and follow it to a terminal phase.
async fn run_submit(config: &PaysimConfig, email: &str, amount: f64) -> Result<()> {
    let retry = config.retry_config();
    match &config.endpoint {
        Some(endpoint) => {
            let controller = SubmissionController::new(HttpChannel::new(endpoint.clone()), retry);
            drive(&controller, email, amount).await
        }
        None => {
            let controller = SubmissionController::new(local_channel(config), retry);
            drive(&controller, email, amount).await
        }
    }
}

/// In-process channel backed by a fresh ledger and the configured decider.
fn local_channel(config: &PaysimConfig) -> LocalChannel {
    let decider: Box<dyn OutcomeDecider> = match config.seed {
        Some(seed) => Box::new(RandomOutcome::seeded(
            config.outcome,
            config.delayed_min_ms,
            config.delayed_max_ms,
            seed,
        )),
        None => Box::new(RandomOutcome::new(
            config.outcome,
            config.delayed_min_ms,
            config.delayed_max_ms,
        )),
    };
    LocalChannel::new(IdempotencyLedger::new(decider))
}

async fn drive<C: SubmitChannel>(
    controller: &SubmissionController<C>,
    email: &str,
    amount: f64,
) -> Result<()> {
    let progress = SubmissionProgress::start(email, amount);
    match controller.submit(email, amount).await {
        Ok(Some(receipt)) => {
            progress.complete(Phase::Success, None);
            progress.print_receipt(&receipt);
            Ok(())
        }
        Ok(None) => {
            let state = controller.snapshot();
            progress.complete(state.phase, state.last_error.as_deref());
            Ok(())
        }
        Err(err) => {
            progress.complete(Phase::Error, Some(&err.to_string()));
            Err(err.into())
        }
    }
}

/// Query a remote gateway for the record behind a request id.
async fn run_status(config: &PaysimConfig, request_id: &str) -> Result<()> {
    let Some(endpoint) = &config.endpoint else {
        return Err(PaysimError::Config(
            "status queries need a gateway endpoint (--endpoint or paysim.toml)".into(),
        )
        .into());
    };
    let channel = HttpChannel::new(endpoint.clone());
    match channel.status(request_id).await? {
        StatusResponse::Found(body) => {
            println!("{}", serde_json::to_string_pretty(&body)?);
            Ok(())
        }
        StatusResponse::NotFound { request_id } => {
            Err(PaysimError::UnknownRequestId(request_id).into())
        }
    }
}

/// Walk the three simulated outcomes with forced scripts, then one draw
/// from the configured random decider.
async fn run_demo(config: &PaysimConfig) -> Result<()> {
    println!("paysim demo — three forced outcomes plus one random draw");
    println!();
    let retry = config.retry_config();

    demo_case(
        "immediate success",
        Box::new(ScriptedOutcomes::new([Outcome::ImmediateSuccess])),
        &retry,
        "ada@example.com",
        100.50,
    )
    .await;

    demo_case(
        "transient failure storm",
        Box::new(ScriptedOutcomes::new([Outcome::TransientFailure {
            retry_after_seconds: 1,
        }])),
        &retry,
        "bob@example.com",
        42.00,
    )
    .await;

    demo_case(
        "delayed success",
        Box::new(ScriptedOutcomes::new([Outcome::DelayedSuccess {
            delay_ms: 3000,
        }])),
        &retry,
        "carol@example.com",
        7.77,
    )
    .await;

    let decider: Box<dyn OutcomeDecider> = match config.seed {
        Some(seed) => Box::new(RandomOutcome::seeded(
            config.outcome,
            config.delayed_min_ms,
            config.delayed_max_ms,
            seed,
        )),
        None => Box::new(RandomOutcome::new(
            config.outcome,
            config.delayed_min_ms,
            config.delayed_max_ms,
        )),
    };
    demo_case("random draw", decider, &retry, "dan@example.com", 19.99).await;

    demo_cancellation(&retry).await?;

    Ok(())
}

async fn demo_case(
    title: &str,
    decider: Box<dyn OutcomeDecider>,
    retry: &RetryConfig,
    email: &str,
    amount: f64,
) {
    println!("▸ {title}");
    let ledger = IdempotencyLedger::new(decider);
    let controller =
        SubmissionController::new(LocalChannel::new(ledger.clone()), retry.clone());
    let progress = SubmissionProgress::start(email, amount);
    match controller.submit(email, amount).await {
        Ok(Some(receipt)) => {
            progress.complete(Phase::Success, None);
            progress.print_receipt(&receipt);
        }
        Ok(None) => progress.complete(Phase::Pending, None),
        Err(err) => {
            progress.complete(Phase::Error, Some(&err.to_string()));
            // The explicit path back to idle after a terminal failure.
            controller.reset();
            println!("    controller reset, phase {}", controller.snapshot().phase);
        }
    }
    println!("    ledger holds {} record(s)", ledger.record_count());
    println!();
}

/// Cancel a delayed submission mid-wait: the abandoned poll timer wakes to a
/// stale request id and leaves the controller untouched.
async fn demo_cancellation(retry: &RetryConfig) -> Result<()> {
    println!("▸ cancellation mid-flight");
    let ledger = IdempotencyLedger::new(Box::new(ScriptedOutcomes::new([
        Outcome::DelayedSuccess { delay_ms: 3000 },
    ])));
    let controller = Arc::new(SubmissionController::new(
        LocalChannel::new(ledger),
        retry.clone(),
    ));

    let running = {
        let controller = Arc::clone(&controller);
        tokio::spawn(async move { controller.submit("eve@example.com", 3.33).await })
    };
    tokio::time::sleep(Duration::from_millis(500)).await;
    controller.cancel();

    if matches!(running.await?, Ok(None)) {
        println!("  cancelled; the stale timer fired without effect");
        println!("    controller back to {}", controller.snapshot().phase);
    }
    println!();
    Ok(())
}
