use anyhow::Result;
use clap::ValueEnum;
use colored::Colorize;
use serde::Serialize;
use std::io::Write;

use towerstats_analytics::{
    Aggregation, CategoryDefinition, CategoryId, CategoryRegistry, FieldStats, RunFilters,
    SourceAnalysisData, SourceAnalysisFilters, SourceValue, TierStats, TierTrendsAnalysis,
    TrendDirection, TrendFilters, cell_value,
};
use towerstats_analytics::numbers::whole_seconds;

/// Output report format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ReportFormat {
    /// Colored text for a terminal
    #[default]
    Console,
    /// Pretty-printed JSON
    Json,
    /// Markdown tables
    Markdown,
}

const SUFFIXES: [(f64, &str); 11] = [
    (1e33, "D"),
    (1e30, "N"),
    (1e27, "O"),
    (1e24, "S"),
    (1e21, "s"),
    (1e18, "Q"),
    (1e15, "q"),
    (1e12, "T"),
    (1e9, "B"),
    (1e6, "M"),
    (1e3, "K"),
];

/// Game-style compact number: `1.50M`, `12.00K`, `950`.
pub fn compact(value: f64) -> String {
    if !value.is_finite() {
        return "-".to_string();
    }
    let magnitude = value.abs();
    for (factor, suffix) in SUFFIXES {
        if magnitude >= factor {
            return format!("{:.2}{suffix}", value / factor);
        }
    }
    if value.fract() == 0.0 {
        format!("{value:.0}")
    } else {
        format!("{value:.2}")
    }
}

/// `H:MM:SS` for a duration in seconds.
pub fn clock(seconds: f64) -> String {
    let total = whole_seconds(seconds);
    format!("{}:{:02}:{:02}", total / 3600, (total % 3600) / 60, total % 60)
}

fn signed_percent(percent: f64) -> String {
    format!("{percent:+.1}%")
}

fn optional(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), compact)
}

fn source_line(source: &SourceValue) -> String {
    format!(
        "   {:<24} {:>10} {:>6.1}%",
        source.display_name,
        compact(source.value),
        source.percentage
    )
}

// ----- sources -----

/// Source breakdown of one category
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourcesReport<'a> {
    pub category: CategoryId,
    pub definition: &'a CategoryDefinition,
    pub filters: &'a SourceAnalysisFilters,
    #[serde(flatten)]
    pub data: &'a SourceAnalysisData,
}

/// Render a source breakdown
///
/// # Errors
///
/// Returns an error if writing or JSON encoding fails.
pub fn write_sources_report(
    out: &mut dyn Write,
    format: ReportFormat,
    report: &SourcesReport<'_>,
) -> Result<()> {
    match format {
        ReportFormat::Json => write_json(out, report),
        ReportFormat::Markdown => sources_markdown(out, report),
        ReportFormat::Console => sources_console(out, report),
    }
}

fn sources_console(out: &mut dyn Write, report: &SourcesReport<'_>) -> Result<()> {
    let filters = report.filters;
    writeln!(
        out,
        "{}",
        format!("📊 {} by source", report.definition.name).bright_cyan().bold()
    )?;
    writeln!(
        out,
        "Run type: {} | Tier: {} | Period: {} | Last {}",
        filters.run_type, filters.tier, filters.duration, filters.quantity
    )?;
    writeln!(out)?;

    if report.data.periods.is_empty() {
        writeln!(out, "No runs match these filters.")?;
        return Ok(());
    }

    for period in &report.data.periods {
        writeln!(
            out,
            "{} {} total across {} run(s)",
            period.period_label.bold(),
            compact(period.total),
            period.run_count
        )?;
        for source in period.tracked_sources().filter(|s| s.value != 0.0) {
            writeln!(out, "{}", source_line(source))?;
        }
        if let Some(gap) = period.discrepancy() {
            writeln!(out, "{}", source_line(gap).yellow())?;
        }
        writeln!(out)?;
    }

    let summary = &report.data.summary;
    writeln!(out, "{}", "Summary".bright_yellow().bold())?;
    writeln!(
        out,
        "Total {} over {} period(s)",
        compact(summary.total_value),
        summary.period_count
    )?;
    for source in &summary.sources {
        writeln!(out, "{}", source_line(source))?;
    }
    for gap in &summary.discrepancies {
        writeln!(out, "{}", source_line(gap).yellow())?;
    }
    Ok(())
}

fn sources_markdown(out: &mut dyn Write, report: &SourcesReport<'_>) -> Result<()> {
    let filters = report.filters;
    writeln!(out, "# {} by Source\n", report.definition.name)?;
    writeln!(
        out,
        "- **Run type**: {}\n- **Tier**: {}\n- **Period**: {}\n- **Periods shown**: {}\n",
        filters.run_type,
        filters.tier,
        filters.duration,
        report.data.periods.len()
    )?;

    if report.data.periods.is_empty() {
        writeln!(out, "_No runs match these filters._")?;
        return Ok(());
    }

    writeln!(out, "## Periods\n")?;
    writeln!(out, "| Period | Runs | Total | Top source | Discrepancy |")?;
    writeln!(out, "|---|---:|---:|---|---|")?;
    for period in &report.data.periods {
        let top = period
            .tracked_sources()
            .filter(|s| s.value > 0.0)
            .max_by(|a, b| a.value.total_cmp(&b.value))
            .map_or_else(
                || "-".to_string(),
                |s| format!("{} ({:.1}%)", s.display_name, s.percentage),
            );
        let gap = period.discrepancy().map_or_else(
            || "-".to_string(),
            |g| format!("{} {} ({:.1}%)", g.display_name, compact(g.value), g.percentage),
        );
        writeln!(
            out,
            "| {} | {} | {} | {top} | {gap} |",
            period.period_label,
            period.run_count,
            compact(period.total)
        )?;
    }

    let summary = &report.data.summary;
    writeln!(out, "\n## Summary\n")?;
    writeln!(out, "Total **{}**\n", compact(summary.total_value))?;
    writeln!(out, "| Source | Value | Share |")?;
    writeln!(out, "|---|---:|---:|")?;
    for source in summary.sources.iter().chain(&summary.discrepancies) {
        writeln!(
            out,
            "| {} | {} | {:.1}% |",
            source.display_name,
            compact(source.value),
            source.percentage
        )?;
    }
    Ok(())
}

// ----- tiers -----

/// Per-tier statistics, optionally narrowed to one field
#[derive(Debug)]
pub struct TiersReport<'a> {
    pub filters: &'a RunFilters,
    pub field: Option<&'a str>,
    pub aggregation: Aggregation,
    pub hourly: bool,
    pub tiers: &'a [TierStats],
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TierCell<'a> {
    tier: u32,
    run_count: usize,
    field: &'a str,
    aggregation: Aggregation,
    hourly: bool,
    value: Option<f64>,
}

impl TiersReport<'_> {
    fn cells<'b>(&'b self, field: &'b str) -> impl Iterator<Item = TierCell<'b>> {
        self.tiers.iter().map(move |tier| TierCell {
            tier: tier.tier,
            run_count: tier.run_count,
            field,
            aggregation: self.aggregation,
            hourly: self.hourly,
            value: cell_value(tier, field, self.hourly, self.aggregation),
        })
    }

    fn value_heading(&self) -> String {
        if self.hourly {
            format!("{} / hour", self.aggregation)
        } else {
            self.aggregation.to_string()
        }
    }
}

/// Render per-tier statistics
///
/// # Errors
///
/// Returns an error if writing or JSON encoding fails.
pub fn write_tiers_report(
    out: &mut dyn Write,
    format: ReportFormat,
    report: &TiersReport<'_>,
) -> Result<()> {
    match (format, report.field) {
        (ReportFormat::Json, Some(field)) => {
            let cells: Vec<TierCell<'_>> = report.cells(field).collect();
            write_json(out, &cells)
        }
        (ReportFormat::Json, None) => write_json(out, &report.tiers),
        (ReportFormat::Markdown, _) => tiers_markdown(out, report),
        (ReportFormat::Console, _) => tiers_console(out, report),
    }
}

fn field_summary(stats: &FieldStats, hourly: bool, aggregation: Aggregation) -> String {
    let chosen = optional(stats.value(aggregation, hourly));
    let best_rate = optional(stats.hourly_rate);
    format!(
        "{chosen:>10}  (max {} in {}, {best_rate}/h)",
        compact(stats.max_value),
        clock(stats.max_run_duration)
    )
}

fn tiers_console(out: &mut dyn Write, report: &TiersReport<'_>) -> Result<()> {
    writeln!(out, "{}", "🏆 Tier statistics".bright_cyan().bold())?;
    writeln!(
        out,
        "Run type: {} | Aggregation: {}",
        report.filters.run_type,
        report.value_heading()
    )?;
    writeln!(out)?;

    if report.tiers.is_empty() {
        writeln!(out, "No tiered runs match these filters.")?;
        return Ok(());
    }

    if let Some(field) = report.field {
        writeln!(out, "{:<6} {:>5} {:>12}", "Tier", "Runs", field)?;
        for cell in report.cells(field) {
            writeln!(
                out,
                "{:<6} {:>5} {:>12}",
                cell.tier,
                cell.run_count,
                optional(cell.value)
            )?;
        }
        return Ok(());
    }

    for tier in report.tiers {
        writeln!(
            out,
            "{} ({} run(s))",
            format!("Tier {}", tier.tier).bold(),
            tier.run_count
        )?;
        for (name, stats) in &tier.fields {
            writeln!(
                out,
                "   {name:<28} {}",
                field_summary(stats, report.hourly, report.aggregation)
            )?;
        }
        writeln!(out)?;
    }
    Ok(())
}

fn tiers_markdown(out: &mut dyn Write, report: &TiersReport<'_>) -> Result<()> {
    writeln!(out, "# Tier Statistics\n")?;
    writeln!(
        out,
        "- **Run type**: {}\n- **Aggregation**: {}\n",
        report.filters.run_type,
        report.value_heading()
    )?;

    if report.tiers.is_empty() {
        writeln!(out, "_No tiered runs match these filters._")?;
        return Ok(());
    }

    if let Some(field) = report.field {
        writeln!(out, "| Tier | Runs | {field} |")?;
        writeln!(out, "|---:|---:|---:|")?;
        for cell in report.cells(field) {
            writeln!(
                out,
                "| {} | {} | {} |",
                cell.tier,
                cell.run_count,
                optional(cell.value)
            )?;
        }
        return Ok(());
    }

    for tier in report.tiers {
        writeln!(out, "## Tier {} ({} runs)\n", tier.tier, tier.run_count)?;
        writeln!(
            out,
            "| Field | {} | Max | Max run time | Best /h |",
            report.value_heading()
        )?;
        writeln!(out, "|---|---:|---:|---:|---:|")?;
        for (name, stats) in &tier.fields {
            writeln!(
                out,
                "| {name} | {} | {} | {} | {} |",
                optional(stats.value(report.aggregation, report.hourly)),
                compact(stats.max_value),
                clock(stats.max_run_duration),
                optional(stats.hourly_rate)
            )?;
        }
        writeln!(out)?;
    }
    Ok(())
}

// ----- trends -----

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendsReport<'a> {
    pub filters: &'a TrendFilters,
    #[serde(flatten)]
    pub analysis: &'a TierTrendsAnalysis,
}

/// Render a tier trend analysis
///
/// # Errors
///
/// Returns an error if writing or JSON encoding fails.
pub fn write_trends_report(
    out: &mut dyn Write,
    format: ReportFormat,
    report: &TrendsReport<'_>,
) -> Result<()> {
    match format {
        ReportFormat::Json => write_json(out, report),
        ReportFormat::Markdown => trends_markdown(out, report),
        ReportFormat::Console => trends_console(out, report),
    }
}

const fn arrow(direction: TrendDirection) -> &'static str {
    match direction {
        TrendDirection::Up => "▲",
        TrendDirection::Down => "▼",
        TrendDirection::Stable => "■",
    }
}

fn trends_console(out: &mut dyn Write, report: &TrendsReport<'_>) -> Result<()> {
    let analysis = report.analysis;
    let filters = report.filters;
    writeln!(
        out,
        "{}",
        format!("📈 Tier {} trends", analysis.tier).bright_cyan().bold()
    )?;
    writeln!(
        out,
        "Run type: {} | Period: {} ({}) | Threshold: {}%",
        filters.run_type, filters.duration, filters.aggregation, filters.change_threshold
    )?;
    writeln!(
        out,
        "Window: {} ({} run(s))",
        analysis.period_labels.join(" → "),
        analysis.run_count
    )?;
    writeln!(out)?;

    if analysis.period_keys.len() < 2 {
        writeln!(out, "Not enough periods to compare.")?;
        return Ok(());
    }
    if analysis.trends.is_empty() {
        writeln!(out, "No field moved by at least {}%.", filters.change_threshold)?;
        return Ok(());
    }

    for trend in &analysis.trends {
        let change = format!(
            "{} {:>9}",
            arrow(trend.direction),
            signed_percent(trend.percent_change)
        );
        let change = match trend.direction {
            TrendDirection::Up => change.green(),
            TrendDirection::Down => change.red(),
            TrendDirection::Stable => change.normal(),
        };
        writeln!(
            out,
            "   {:<28} {change}  {:>10}  {}",
            trend.field_name,
            compact(trend.absolute_change),
            trend.shape
        )?;
    }

    let summary = &analysis.summary;
    writeln!(out)?;
    writeln!(out, "{}", "Summary".bright_yellow().bold())?;
    writeln!(
        out,
        "{} of {} field(s) significant: {} up, {} down, {} stable",
        summary.significant_changes,
        summary.fields_analyzed,
        summary.up_count,
        summary.down_count,
        summary.stable_count
    )?;
    if let Some(top) = &summary.top_gainer {
        writeln!(
            out,
            "Top gainer: {} ({})",
            top.field_name.green(),
            signed_percent(top.percent_change)
        )?;
    }
    if let Some(top) = &summary.top_decliner {
        writeln!(
            out,
            "Top decliner: {} ({})",
            top.field_name.red(),
            signed_percent(top.percent_change)
        )?;
    }
    Ok(())
}

fn trends_markdown(out: &mut dyn Write, report: &TrendsReport<'_>) -> Result<()> {
    let analysis = report.analysis;
    writeln!(out, "# Tier {} Trends\n", analysis.tier)?;
    writeln!(
        out,
        "- **Window**: {}\n- **Runs**: {}\n- **Threshold**: {}%\n",
        analysis.period_labels.join(", "),
        analysis.run_count,
        report.filters.change_threshold
    )?;

    if analysis.trends.is_empty() {
        writeln!(out, "_No significant changes._")?;
        return Ok(());
    }

    writeln!(out, "| Field | Change | Absolute | Direction | Shape |")?;
    writeln!(out, "|---|---:|---:|---|---|")?;
    for trend in &analysis.trends {
        writeln!(
            out,
            "| {} | {} | {} | {} | {} |",
            trend.field_name,
            signed_percent(trend.percent_change),
            compact(trend.absolute_change),
            trend.direction,
            trend.shape
        )?;
    }
    let summary = &analysis.summary;
    writeln!(
        out,
        "\n**{}** of {} fields changed: {} up, {} down.",
        summary.significant_changes, summary.fields_analyzed, summary.up_count, summary.down_count
    )?;
    Ok(())
}

// ----- categories -----

/// Render the active category table
///
/// # Errors
///
/// Returns an error if writing or JSON encoding fails.
pub fn write_categories_report(
    out: &mut dyn Write,
    format: ReportFormat,
    registry: &CategoryRegistry,
) -> Result<()> {
    match format {
        ReportFormat::Json => write_json(out, registry),
        ReportFormat::Markdown => {
            writeln!(out, "# Categories\n")?;
            for (id, definition) in registry.iter() {
                writeln!(
                    out,
                    "## {} (`{id}`)\n\nTotal field: `{}`\n",
                    definition.name, definition.total_field
                )?;
                writeln!(out, "| Source | Field | Color |")?;
                writeln!(out, "|---|---|---|")?;
                for source in &definition.sources {
                    writeln!(
                        out,
                        "| {} | `{}` | {} |",
                        source.display_name, source.field_name, source.color
                    )?;
                }
                writeln!(out)?;
            }
            Ok(())
        }
        ReportFormat::Console => {
            writeln!(out, "{}", "Available categories:".bright_cyan().bold())?;
            for (id, definition) in registry.iter() {
                writeln!(
                    out,
                    "  {:20} - {} (total: {}, {} sources)",
                    id.to_string(),
                    definition.name,
                    definition.total_field,
                    definition.sources.len()
                )?;
            }
            Ok(())
        }
    }
}

fn write_json<T: Serialize + ?Sized>(out: &mut dyn Write, value: &T) -> Result<()> {
    serde_json::to_writer_pretty(&mut *out, value)?;
    writeln!(out)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use towerstats_analytics::{
        Run, RunType, calculate_source_analysis, calculate_tier_stats, calculate_tier_trends,
    };

    fn runs() -> Vec<Run> {
        (1..=4_u32)
            .map(|day| {
                let ts = NaiveDate::from_ymd_opt(2024, 2, day)
                    .and_then(|d| d.and_hms_opt(18, 0, 0))
                    .unwrap();
                let coins = f64::from(day) * 1_000_000.0;
                Run::new(format!("r{day}"), ts, RunType::Farm)
                    .with_tier(6)
                    .with_real_time(7200.0)
                    .with_number("coinsEarned", coins)
                    .with_number("coinsFromGoldenTower", coins * 0.5)
                    .with_number("coinsFromDeathWave", coins * 0.2)
            })
            .collect()
    }

    fn render(f: impl FnOnce(&mut Vec<u8>) -> Result<()>) -> String {
        let mut buffer = Vec::new();
        f(&mut buffer).unwrap();
        String::from_utf8(buffer).unwrap()
    }

    #[test]
    fn compact_numbers_use_game_suffixes() {
        assert_eq!(compact(950.0), "950");
        assert_eq!(compact(12.5), "12.50");
        assert_eq!(compact(1_500_000.0), "1.50M");
        assert_eq!(compact(-2_000.0), "-2.00K");
        assert_eq!(compact(3.1e15), "3.10q");
        assert_eq!(compact(f64::NAN), "-");
        assert_eq!(clock(9_045.0), "2:30:45");
        assert_eq!(clock(-30.0), "0:00:00");
        assert_eq!(clock(f64::NAN), "0:00:00");
    }

    #[test]
    fn sources_report_renders_in_every_format() {
        let runs = runs();
        let registry = CategoryRegistry::builtin();
        let filters = SourceAnalysisFilters::default();
        let definition = registry.get(CategoryId::CoinsEarned);
        let data = calculate_source_analysis(&runs, definition, &filters);
        let report = SourcesReport {
            category: CategoryId::CoinsEarned,
            definition,
            filters: &filters,
            data: &data,
        };

        let console = render(|out| write_sources_report(out, ReportFormat::Console, &report));
        assert!(console.contains("Coins Earned by source"));
        assert!(console.contains("Golden Tower"));
        assert!(console.contains("Unknown"));

        let markdown = render(|out| write_sources_report(out, ReportFormat::Markdown, &report));
        assert!(markdown.contains("| Run #4 | 1 | 4.00M | Golden Tower (50.0%) | Unknown 1.20M (30.0%) |"));

        let json = render(|out| write_sources_report(out, ReportFormat::Json, &report));
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["category"], "coinsEarned");
        assert_eq!(value["periods"].as_array().map(Vec::len), Some(4));
        assert_eq!(value["summary"]["periodCount"], 4);
    }

    #[test]
    fn tiers_report_narrows_to_one_field() {
        let runs = runs();
        let filters = RunFilters::default();
        let tiers = calculate_tier_stats(&runs, &filters);
        let report = TiersReport {
            filters: &filters,
            field: Some("coinsEarned"),
            aggregation: Aggregation::Max,
            hourly: true,
            tiers: &tiers,
        };
        let json = render(|out| write_tiers_report(out, ReportFormat::Json, &report));
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value[0]["tier"], 6);
        assert_eq!(value[0]["value"], 2_000_000.0);

        let markdown = render(|out| write_tiers_report(out, ReportFormat::Markdown, &report));
        assert!(markdown.contains("| 6 | 4 | 2.00M |"));
    }

    #[test]
    fn trends_report_lists_significant_fields() {
        let runs = runs();
        let filters = TrendFilters::for_tier(6);
        let analysis = calculate_tier_trends(&runs, &filters);
        let report = TrendsReport {
            filters: &filters,
            analysis: &analysis,
        };
        let console = render(|out| write_trends_report(out, ReportFormat::Console, &report));
        assert!(console.contains("Tier 6 trends"));
        assert!(console.contains("coinsEarned"));
        assert!(console.contains("+300.0%"));

        let markdown = render(|out| write_trends_report(out, ReportFormat::Markdown, &report));
        assert!(markdown.contains("| coinsEarned | +300.0% | 3.00M | up | upward |"));
    }

    #[test]
    fn categories_report_lists_builtin_table() {
        let registry = CategoryRegistry::builtin();
        let console =
            render(|out| write_categories_report(out, ReportFormat::Console, &registry));
        assert!(console.contains("damage-dealt"));
        assert!(console.contains("Enemies Destroyed"));
        let json = render(|out| write_categories_report(out, ReportFormat::Json, &registry));
        assert!(json.contains("\"totalField\": \"coinsEarned\""));
    }
}
