use colored::Colorize;

use crate::export::ExportSummary;
use crate::import::{ImportReport, ServiceStatus};

/// Render an export summary for terminal output.
pub fn render_export(summary: &ExportSummary) -> String {
    let mut out = vec![format!(
        "exported edge={} schema={}",
        summary.edge, summary.schema
    )
    .cyan()
    .to_string()];
    out.push(format!(
        "nat_rules={} firewall_rules={} static_routes={} default_route={}",
        summary.nat_rules,
        summary.firewall_rules,
        summary.static_routes,
        if summary.default_route { "yes" } else { "no" }
    ));
    for file in &summary.files {
        out.push(format!("  {}", file.display()));
    }
    out.join("\n")
}

/// Render per-service import outcomes.
pub fn render_import(report: &ImportReport) -> String {
    let mut out = vec![format!("import {} -> {}", report.source, report.target)
        .cyan()
        .to_string()];

    for outcome in &report.outcomes {
        let line = match &outcome.status {
            ServiceStatus::Applied => {
                format!("APPLIED   {} ({} records)", outcome.service, outcome.records)
                    .green()
                    .to_string()
            }
            ServiceStatus::Failed { reason } => format!("FAILED    {}: {reason}", outcome.service)
                .red()
                .to_string(),
            ServiceStatus::TimedOut { attempts } => format!(
                "TIMED OUT {} (still busy after {attempts} checks)",
                outcome.service
            )
            .yellow()
            .to_string(),
            ServiceStatus::Skipped => format!("SKIPPED   {} (no records file)", outcome.service)
                .dimmed()
                .to_string(),
        };
        out.push(line);
    }
    out.join("\n")
}
