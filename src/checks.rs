//! Protocol compatibility checks.
//!
//! Call/assert sequences run against a freshly started server before its
//! benchmark pass (`--verify`). Each check uses its own uniquely named
//! container and cleans it up, so checks cannot interfere with each other or
//! with the benchmark sweep. A failing check fails the implementation's
//! pass; it never aborts the other implementation.

use anyhow::{ensure, Context, Result};
use std::future::Future;
use tracing::{error, info};
use uuid::Uuid;

use crate::client::{self, ListEntry};
use crate::credentials::EndpointCredential;
use crate::workload;

/// Result of one named check.
pub struct CheckOutcome {
    pub name: &'static str,
    pub result: Result<()>,
}

/// Run the full check suite against one server. Always runs every check;
/// the caller decides what a failure means for the pass.
pub async fn run_all(credential: &EndpointCredential) -> Vec<CheckOutcome> {
    vec![
        run_check("blob round-trip", round_trip(credential)).await,
        run_check("ranged read", ranged_read(credential)).await,
        run_check("idempotent container create", idempotent_create(credential)).await,
        run_check("concurrency-invariant writes", concurrency_invariance(credential)).await,
        run_check("missing blob yields not-found", not_found(credential)).await,
        run_check("server-side copy", server_side_copy(credential)).await,
    ]
}

/// Number of failed outcomes in a suite run.
pub fn failures(outcomes: &[CheckOutcome]) -> usize {
    outcomes.iter().filter(|o| o.result.is_err()).count()
}

async fn run_check<F>(name: &'static str, check: F) -> CheckOutcome
where
    F: Future<Output = Result<()>>,
{
    let result = check.await;
    match &result {
        Ok(()) => info!("check passed: {name}"),
        Err(err) => error!("check FAILED: {name}: {err:#}"),
    }
    CheckOutcome { name, result }
}

/// Unique container name for one check invocation.
fn check_container(kind: &str) -> String {
    let id = Uuid::new_v4().simple().to_string();
    format!("verify-{kind}-{}", &id[..8])
}

fn patterned_payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 256) as u8).collect()
}

/// Upload, download, compare; then confirm repeated reads each return the
/// full object.
async fn round_trip(credential: &EndpointCredential) -> Result<()> {
    let container = credential.container_client(&check_container("roundtrip"));
    client::ensure_container(&container).await?;

    let blob = container.blob_client("round-trip.bin");
    let payload = patterned_payload(2048);
    blob.put_block_blob(payload.clone()).await?;

    let data = client::download_blob(&blob).await?;
    ensure!(
        data == payload,
        "downloaded content differs from uploaded content"
    );

    for _ in 0..3 {
        let data = client::download_blob(&blob).await?;
        ensure!(
            data.len() == payload.len(),
            "repeated read returned {} bytes, expected {}",
            data.len(),
            payload.len()
        );
    }

    container.delete().await?;
    Ok(())
}

/// A ranged read must return exactly the requested window.
async fn ranged_read(credential: &EndpointCredential) -> Result<()> {
    let container = credential.container_client(&check_container("range"));
    client::ensure_container(&container).await?;

    let blob = container.blob_client("range.txt");
    blob.put_block_blob("0123456789ABCDEFGHIJ").await?;

    let data = client::download_blob_range(&blob, 5..15).await?;
    ensure!(
        data == b"56789ABCDE",
        "ranged read returned {:?}",
        String::from_utf8_lossy(&data)
    );

    container.delete().await?;
    Ok(())
}

/// Creating the same container twice never yields two live containers: the
/// second create is a no-op or the designated conflict, and the listing
/// shows the name exactly once.
async fn idempotent_create(credential: &EndpointCredential) -> Result<()> {
    let name = check_container("idempotent");
    let container = credential.container_client(&name);
    container.create().await?;

    match container.create().await {
        Ok(_) => {}
        Err(err) if client::is_already_exists(&err) => {}
        Err(err) => {
            return Err(err).context("second create neither succeeded nor raised the conflict")
        }
    }

    let listed = client::list_container_names(&credential.service_client(), &name).await?;
    let occurrences = listed.iter().filter(|n| *n == &name).count();
    ensure!(occurrences == 1, "container listed {occurrences} times");

    container.delete().await?;
    Ok(())
}

/// The same logical key set written at concurrency 1 and 16 must leave an
/// identical set of blob names behind.
async fn concurrency_invariance(credential: &EndpointCredential) -> Result<()> {
    let sequential = credential.container_client(&check_container("seq"));
    let concurrent = credential.container_client(&check_container("conc"));

    workload::run_write(&sequential, 256, 32, 1).await?;
    workload::run_write(&concurrent, 256, 32, 16).await?;

    let mut left = client::list_blob_names(&sequential).await?;
    let mut right = client::list_blob_names(&concurrent).await?;
    left.sort();
    right.sort();

    ensure!(left.len() == 32, "expected 32 blobs, found {}", left.len());
    ensure!(
        left == right,
        "blob name sets differ between concurrency 1 and 16"
    );

    // Hierarchical listing of the flat namespace still reports plain blobs.
    let entries = client::list_entries(&sequential, Some("/".to_string())).await?;
    ensure!(
        entries.iter().all(|e| matches!(e, ListEntry::Blob { .. })),
        "flat keys unexpectedly produced prefix entries"
    );

    sequential.delete().await?;
    concurrent.delete().await?;
    Ok(())
}

/// Reading a blob that was never written must yield the designated
/// not-found condition, not some other failure.
async fn not_found(credential: &EndpointCredential) -> Result<()> {
    let container = credential.container_client(&check_container("missing"));
    client::ensure_container(&container).await?;

    match client::download_blob(&container.blob_client("does-not-exist")).await {
        Ok(_) => anyhow::bail!("reading a missing blob unexpectedly succeeded"),
        Err(err) => ensure!(
            client::is_not_found(&err),
            "expected a not-found error, got: {err}"
        ),
    }

    container.delete().await?;
    Ok(())
}

/// Server-side copy must produce a byte-identical destination, and a
/// delimiter listing must discriminate the copied tree as a prefix entry.
async fn server_side_copy(credential: &EndpointCredential) -> Result<()> {
    let name = check_container("copy");
    let container = credential.container_client(&name);
    client::ensure_container(&container).await?;

    let payload = patterned_payload(4096);
    container
        .blob_client("source.bin")
        .put_block_blob(payload.clone())
        .await?;

    let source_url = url::Url::parse(&format!("{}/{}/source.bin", credential.blob_endpoint(), name))
        .context("source blob URL was not parseable")?;
    let destination = container.blob_client("copies/copy.bin");
    destination.copy(source_url).await?;

    let data = client::download_blob(&destination).await?;
    ensure!(data == payload, "copied content differs from the source");

    let entries = client::list_entries(&container, Some("/".to_string())).await?;
    ensure!(
        entries.contains(&ListEntry::Prefix {
            prefix: "copies/".to_string()
        }),
        "delimiter listing did not report the copies/ prefix"
    );
    ensure!(
        entries.contains(&ListEntry::Blob {
            name: "source.bin".to_string()
        }),
        "delimiter listing did not report the source blob"
    );

    container.delete().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_container_names_are_unique_and_valid() {
        let a = check_container("roundtrip");
        let b = check_container("roundtrip");
        assert_ne!(a, b);
        assert!(a.len() <= 63);
        assert!(a
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-'));
    }

    #[test]
    fn test_patterned_payload_is_deterministic() {
        assert_eq!(patterned_payload(4), vec![0, 1, 2, 3]);
        assert_eq!(patterned_payload(300)[256], 0);
    }
}
