use crate::cli::OutputFormat;
use comfy_table::{presets::UTF8_FULL_CONDENSED, Cell, ContentArrangement, Table};
use owo_colors::OwoColorize;
use tubescope_core::detect::{DetectionReport, SemanticOutcome};
use tubescope_core::{DetectionMethod, PerformanceTrend, SeriesResult};

pub fn render(report: &DetectionReport, format: OutputFormat) -> Result<(), serde_json::Error> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(report)?),
        OutputFormat::Pretty => print_pretty(report),
    }
    Ok(())
}

fn trend_label(trend: PerformanceTrend) -> String {
    match trend {
        PerformanceTrend::Growing => "growing".green().to_string(),
        PerformanceTrend::Declining => "declining".red().to_string(),
        PerformanceTrend::Stable => "stable".to_string(),
        PerformanceTrend::New => "new".cyan().to_string(),
    }
}

fn method_label(series: &SeriesResult) -> &'static str {
    match series.detection_method {
        DetectionMethod::Pattern => "pattern",
        DetectionMethod::Semantic => "semantic",
    }
}

fn print_pretty(report: &DetectionReport) {
    if report.series.is_empty() {
        println!("{}", "No recurring series detected.".yellow());
    } else {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL_CONDENSED)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(vec![
                "Series", "Videos", "Total views", "Avg views", "Engagement", "Cadence", "Trend",
                "Method",
            ]);
        for series in &report.series {
            let cadence = series
                .cadence_days
                .map(|d| format!("{:.1}d", d))
                .unwrap_or_else(|| "-".to_string());
            table.add_row(vec![
                Cell::new(&series.name),
                Cell::new(series.video_count),
                Cell::new(series.total_views),
                Cell::new(format!("{:.0}", series.avg_views)),
                Cell::new(format!("{:.2}%", series.avg_engagement_rate * 100.0)),
                Cell::new(cadence),
                Cell::new(trend_label(series.performance_trend)),
                Cell::new(method_label(series)),
            ]);
        }
        println!("{table}");
    }

    println!(
        "\n{} series, {} uncategorized videos",
        report.series.len().to_string().bold(),
        report.uncategorized.len()
    );

    match &report.semantic {
        SemanticOutcome::Completed { clusters_found } => {
            if *clusters_found > 0 {
                println!("Semantic clustering found {} additional series", clusters_found);
            }
        }
        SemanticOutcome::Skipped { reason } => {
            println!("{} {}", "Semantic clustering skipped:".yellow(), reason);
        }
    }

    if report.usage.requests > 0 {
        let cost = report
            .usage
            .cost_usd
            .map(|c| format!(" (~${:.4})", c))
            .unwrap_or_default();
        println!(
            "API usage: {} request(s), {} in / {} out tokens{}",
            report.usage.requests, report.usage.input_tokens, report.usage.output_tokens, cost
        );
    }
}
