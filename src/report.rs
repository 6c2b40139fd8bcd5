//! Comparison-table rendering.
//!
//! The reporter is a pure function from the accumulated result sequence to
//! text: one section per operation kind, one row per (payload size,
//! concurrency) combination with a column pair per implementation, and a
//! speedup ratio wherever both the baseline and the candidate measured the
//! same cell. Rendering to a `String` keeps it testable; the driver prints
//! it to stdout in one piece.

use std::collections::BTreeSet;
use std::fmt::Write as _;

use crate::metrics::{BenchmarkResult, Operation};

const TABLE_WIDTH: usize = 100;

/// Render a payload size with a magnitude-chosen unit suffix.
///
/// Integer truncation is deliberate: `1536` renders as `1KB`, matching how
/// the sweep sizes are conventionally spoken of.
pub fn format_size(size: usize) -> String {
    if size >= 1024 * 1024 {
        format!("{}MB", size / (1024 * 1024))
    } else if size >= 1024 {
        format!("{}KB", size / 1024)
    } else {
        format!("{}B", size)
    }
}

/// Render the full comparison table.
///
/// `baseline` and `candidate` designate the two labels the speedup ratio is
/// defined over: `candidate ops/s ÷ baseline ops/s`. A row that has results
/// for only one of them simply has no speedup cell.
pub fn render(results: &[BenchmarkResult], baseline: &str, candidate: &str) -> String {
    let labels = label_order(results);
    let show_speedup = labels.len() == 2;

    let mut out = String::new();
    let _ = writeln!(out);
    let _ = writeln!(out, "{}", "=".repeat(TABLE_WIDTH));
    let _ = writeln!(out, "BENCHMARK RESULTS");
    let _ = writeln!(
        out,
        "Generated {} on {}/{} ({} cores)",
        chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC"),
        std::env::consts::OS,
        std::env::consts::ARCH,
        num_cpus::get()
    );
    let _ = writeln!(out, "{}", "=".repeat(TABLE_WIDTH));

    for operation in Operation::all() {
        let section: Vec<&BenchmarkResult> = results
            .iter()
            .filter(|r| r.operation == operation)
            .collect();
        if section.is_empty() {
            continue;
        }

        let _ = writeln!(out);
        let _ = writeln!(out, "{} Operations", operation.to_string().to_uppercase());
        let _ = writeln!(out, "{}", "-".repeat(TABLE_WIDTH));

        let mut header = format!("{:<12} {:<10}", "Blob Size", "Clients");
        for label in &labels {
            let _ = write!(
                header,
                " {:<18} {:<15}",
                format!("{label} ops/s"),
                format!("{label} MB/s")
            );
        }
        if show_speedup {
            let _ = write!(header, " {:<10}", "Speedup");
        }
        let _ = writeln!(out, "{}", header.trim_end());
        let _ = writeln!(out, "{}", "-".repeat(TABLE_WIDTH));

        // Distinct combinations, ascending by size then concurrency.
        let combinations: BTreeSet<(usize, usize)> = section
            .iter()
            .map(|r| (r.blob_size, r.concurrency))
            .collect();

        for (size, clients) in combinations {
            let mut row = format!("{:<12} {:<10}", format_size(size), clients);

            let cell = |label: &str| {
                section.iter().find(|r| {
                    r.blob_size == size && r.concurrency == clients && r.implementation == label
                })
            };

            for label in &labels {
                if let Some(result) = cell(label) {
                    let _ = write!(
                        row,
                        " {:>14.1}     {:>11.2}    ",
                        result.ops_per_sec, result.mb_per_sec
                    );
                }
            }

            if let (Some(base), Some(cand)) = (cell(baseline), cell(candidate)) {
                let _ = write!(row, " {:>6.2}x", cand.ops_per_sec / base.ops_per_sec);
            }

            let _ = writeln!(out, "{}", row.trim_end());
        }
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "{}", "=".repeat(TABLE_WIDTH));
    out
}

/// Implementation labels in order of first appearance in the result
/// sequence.
fn label_order(results: &[BenchmarkResult]) -> Vec<String> {
    let mut labels = Vec::new();
    for result in results {
        if !labels.contains(&result.implementation) {
            labels.push(result.implementation.clone());
        }
    }
    labels
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn result(
        operation: Operation,
        implementation: &str,
        blob_size: usize,
        concurrency: usize,
        elapsed_ms: u64,
    ) -> BenchmarkResult {
        BenchmarkResult::new(
            operation,
            implementation,
            blob_size,
            concurrency,
            1000,
            Duration::from_millis(elapsed_ms),
        )
        .unwrap()
    }

    #[test]
    fn test_format_size_thresholds() {
        assert_eq!(format_size(0), "0B");
        assert_eq!(format_size(512), "512B");
        assert_eq!(format_size(1023), "1023B");
        assert_eq!(format_size(1024), "1KB");
        assert_eq!(format_size(10240), "10KB");
        assert_eq!(format_size(1048575), "1023KB");
        assert_eq!(format_size(1048576), "1MB");
    }

    #[test]
    fn test_format_size_truncates() {
        assert_eq!(format_size(1536), "1KB");
        assert_eq!(format_size(2621440), "2MB");
    }

    #[test]
    fn test_sections_write_then_read() {
        let results = vec![
            result(Operation::Read, "azurite-rs", 1024, 1, 100),
            result(Operation::Write, "azurite-rs", 1024, 1, 100),
        ];
        let table = render(&results, "azurite", "azurite-rs");
        let write_at = table.find("WRITE Operations").unwrap();
        let read_at = table.find("READ Operations").unwrap();
        assert!(write_at < read_at);
    }

    #[test]
    fn test_rows_sorted_by_size_then_concurrency() {
        let results = vec![
            result(Operation::Write, "azurite-rs", 10240, 4, 100),
            result(Operation::Write, "azurite-rs", 1024, 16, 100),
            result(Operation::Write, "azurite-rs", 1024, 1, 100),
        ];
        let table = render(&results, "azurite", "azurite-rs");
        let rows: Vec<&str> = table
            .lines()
            .filter(|l| l.starts_with("1KB") || l.starts_with("10KB"))
            .collect();
        assert_eq!(rows.len(), 3);
        assert!(rows[0].starts_with("1KB          1 "));
        assert!(rows[1].starts_with("1KB          16"));
        assert!(rows[2].starts_with("10KB         4"));
    }

    #[test]
    fn test_speedup_is_candidate_over_baseline() {
        // Candidate finishes in half the time: speedup 2.00x.
        let results = vec![
            result(Operation::Write, "azurite-rs", 10240, 4, 500),
            result(Operation::Write, "azurite", 10240, 4, 1000),
        ];
        let table = render(&results, "azurite", "azurite-rs");
        let row = table
            .lines()
            .find(|l| l.starts_with("10KB"))
            .unwrap();
        assert!(row.ends_with("2.00x"), "row was: {row}");
    }

    #[test]
    fn test_speedup_omitted_when_only_one_implementation_has_the_cell() {
        let results = vec![
            result(Operation::Write, "azurite-rs", 1024, 1, 100),
            result(Operation::Write, "azurite", 1024, 4, 100),
        ];
        let table = render(&results, "azurite", "azurite-rs");
        for row in table.lines().filter(|l| l.starts_with("1KB")) {
            assert!(!row.ends_with('x'), "unexpected speedup in: {row}");
        }
    }

    #[test]
    fn test_label_columns_follow_first_appearance() {
        let results = vec![
            result(Operation::Write, "azurite", 1024, 1, 100),
            result(Operation::Write, "azurite-rs", 1024, 1, 100),
        ];
        let table = render(&results, "azurite", "azurite-rs");
        let header = table
            .lines()
            .find(|l| l.contains("ops/s"))
            .unwrap();
        let azurite_at = header.find("azurite ops/s").unwrap();
        let rs_at = header.find("azurite-rs ops/s").unwrap();
        assert!(azurite_at < rs_at);
    }

    #[test]
    fn test_empty_sections_are_skipped() {
        let results = vec![result(Operation::Write, "azurite-rs", 1024, 1, 100)];
        let table = render(&results, "azurite", "azurite-rs");
        assert!(table.contains("WRITE Operations"));
        assert!(!table.contains("READ Operations"));
    }
}
