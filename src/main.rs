//! # Azurite Benchmark - Main Entry Point
//!
//! The driver compares blob-storage emulator implementations by running an
//! identical workload matrix against each one in turn:
//!
//! 1. **Start**: allocate an ephemeral port, spawn the server-under-test,
//!    wait for its listener.
//! 2. **Verify** (optional): run the protocol compatibility checks.
//! 3. **Sweep**: for every payload size × concurrency cell, run one timed
//!    write batch and one timed read batch.
//! 4. **Stop**: terminate the server — on success, on failure, and on
//!    Ctrl-C alike.
//! 5. **Report**: render the combined comparison table to stdout.
//!
//! A failed pass prints its diagnostics and the run proceeds to the other
//! implementation; the process exit status is non-zero if any pass failed.

use anyhow::Result;
use clap::Parser;
use std::process::ExitCode;
use tracing::{debug, error, info};

use azurite_bench::{
    checks,
    cli::{Args, Implementation},
    credentials::EndpointCredential,
    defaults,
    error::HarnessError,
    logging,
    metrics::{BenchmarkResult, Operation},
    report, server, workload,
};

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    logging::init(args.verbose);

    if let Err(err) = args.validate() {
        error!("invalid arguments: {err:#}");
        return ExitCode::FAILURE;
    }

    info!("azurite-bench {}", azurite_bench::VERSION);

    let implementations: Vec<Implementation> = match args.only {
        Some(only) => vec![only],
        None => Implementation::all().to_vec(),
    };

    let mut results: Vec<BenchmarkResult> = Vec::new();
    let mut any_failed = false;

    for implementation in implementations {
        info!("starting {} benchmark...", implementation);
        match run_pass(implementation, &args).await {
            Ok(mut pass_results) => {
                info!("{} pass completed", implementation);
                results.append(&mut pass_results);
            }
            Err(err) => {
                any_failed = true;
                report_pass_failure(implementation, &err);
                if matches!(
                    err.downcast_ref::<HarnessError>(),
                    Some(HarnessError::Interrupted)
                ) {
                    break;
                }
            }
        }
    }

    if !results.is_empty() {
        print!(
            "{}",
            report::render(
                &results,
                Implementation::Azurite.label(),
                Implementation::AzuriteRs.label(),
            )
        );
    }

    if any_failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

/// Run one implementation's full pass.
///
/// The server handle never escapes this function: it is created here and
/// stopped here on every exit path, including a Ctrl-C delivered while the
/// matrix is running.
async fn run_pass(implementation: Implementation, args: &Args) -> Result<Vec<BenchmarkResult>> {
    let spec = implementation.launch_spec(args);
    let port = server::allocate_port()?;
    let handle = server::start(&spec, port, defaults::READY_TIMEOUT).await?;
    let credential = EndpointCredential::from_handle(&handle);
    debug!("connection string: {}", credential.connection_string());

    let outcome = tokio::select! {
        outcome = run_matrix(implementation, &credential, args) => outcome,
        _ = tokio::signal::ctrl_c() => Err(HarnessError::Interrupted.into()),
    };

    server::stop(handle).await;
    outcome
}

/// Sweep the workload matrix against one running server.
async fn run_matrix(
    implementation: Implementation,
    credential: &EndpointCredential,
    args: &Args,
) -> Result<Vec<BenchmarkResult>> {
    if args.verify {
        info!("[{implementation}] running compatibility checks");
        let outcomes = checks::run_all(credential).await;
        let failed = checks::failures(&outcomes);
        if failed > 0 {
            anyhow::bail!(
                "{failed} of {} compatibility checks failed",
                outcomes.len()
            );
        }
        info!(
            "[{implementation}] all {} compatibility checks passed",
            outcomes.len()
        );
    }

    let mut results = Vec::new();
    for &blob_size in &args.blob_sizes {
        for &clients in &args.clients {
            let container =
                credential.container_client(&workload::container_name(blob_size, clients));

            info!(
                "[{implementation}] write: size={}, clients={clients}",
                report::format_size(blob_size)
            );
            let elapsed =
                workload::run_write(&container, blob_size, args.operations, clients).await?;
            results.push(BenchmarkResult::new(
                Operation::Write,
                implementation.label(),
                blob_size,
                clients,
                args.operations,
                elapsed,
            )?);

            info!(
                "[{implementation}] read: size={}, clients={clients}",
                report::format_size(blob_size)
            );
            let elapsed =
                workload::run_read(&container, blob_size, args.operations, clients).await?;
            results.push(BenchmarkResult::new(
                Operation::Read,
                implementation.label(),
                blob_size,
                clients,
                args.operations,
                elapsed,
            )?);
        }
    }
    Ok(results)
}

/// Print why a pass failed, including the server's captured output when the
/// failure was a startup timeout.
fn report_pass_failure(implementation: Implementation, err: &anyhow::Error) {
    error!("benchmark pass failed for {implementation}: {err:#}");
    if let Some(HarnessError::Startup { stdout, stderr, .. }) =
        err.downcast_ref::<HarnessError>()
    {
        if !stdout.is_empty() {
            error!("--- captured stdout ---\n{}", stdout.trim_end());
        }
        if !stderr.is_empty() {
            error!("--- captured stderr ---\n{}", stderr.trim_end());
        }
    }
}
