//! Markdown rendering of benchmark reports.

use crate::report::BenchmarkReport;
use std::fmt::Write;

/// Render a report as a markdown document.
pub fn generate_summary(report: &BenchmarkReport) -> String {
    let mut md = String::new();

    let _ = writeln!(md, "# Heart-rate Policy Benchmark\n");
    let _ = writeln!(
        md,
        "**Run:** `{}`  \n**Finished:** {}\n",
        report.run_id,
        report.timestamp.format("%Y-%m-%d %H:%M:%S UTC")
    );
    if report.cancelled {
        let _ = writeln!(
            md,
            "> Run was cancelled; columns without a completed pass show N/A.\n"
        );
    }

    let _ = writeln!(md, "## Anomalies per 1000 evaluated readings\n");
    let header = report.matrix.header();
    let _ = writeln!(md, "| {} |", header.join(" | "));
    let _ = writeln!(
        md,
        "|{}",
        header
            .iter()
            .enumerate()
            .map(|(i, _)| if i < header.len() - report.matrix.frequencies.len() {
                "---|"
            } else {
                "---:|"
            })
            .collect::<String>()
    );
    for row in &report.matrix.rows {
        let mut fields = report.matrix.row_labels(row);
        fields.extend(row.cells.iter().map(|c| c.to_string()));
        let _ = writeln!(md, "| {} |", fields.join(" | "));
    }

    let _ = writeln!(md, "\n## Evaluated readings\n");
    let _ = writeln!(
        md,
        "Rates are normalised by the **{}** count.\n",
        report.tally_policy.label()
    );
    let _ = writeln!(md, "| Sampling | Series | Tally |");
    let _ = writeln!(md, "|---:|---:|---:|");
    for tally in &report.tallies {
        let _ = writeln!(
            md,
            "| {} | {} | {} |",
            tally.frequency, tally.series, tally.tally
        );
    }

    let _ = writeln!(md, "\n## Configuration\n");
    let _ = writeln!(md, "| Parameter | Value |");
    let _ = writeln!(md, "|---|---|");
    for entry in &report.configuration {
        let _ = writeln!(md, "| {} | {} |", entry.parameter, entry.value);
    }

    md
}
