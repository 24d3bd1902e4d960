//! Output formatters for comparator reports

use crate::config::OutputFormat;
use crate::error::{RelativityError, Result};
use crate::output::report::ComparisonReport;
use crate::processing::comparator::{ComparisonResult, Interpretation};
use crate::processing::element::EcElement;
use crate::processing::match_quality::MatchQuality;
use askama::Template;
use colored::{Color, Colorize};
use std::path::Path;

pub trait OutputFormatter {
    fn format_report(&self, report: &ComparisonReport) -> Result<String>;
    fn supports_format(&self) -> OutputFormat;
}

/// Colored table for the terminal
pub struct ConsoleFormatter {
    use_colors: bool,
    detailed: bool,
}

pub struct JsonFormatter {
    pretty: bool,
}

pub struct MarkdownFormatter {
    include_metadata: bool,
}

pub struct HtmlFormatter {
    include_styles: bool,
}

/// Picks the formatter for a requested format
pub struct ReportGenerator {
    console_formatter: ConsoleFormatter,
    json_formatter: JsonFormatter,
    markdown_formatter: MarkdownFormatter,
    html_formatter: HtmlFormatter,
}

#[derive(Template)]
#[template(source = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>EC Relativity Search Results</title>
    {% if include_styles %}
    <style>
        body {
            font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif;
            line-height: 1.5;
            color: #333;
            max-width: 1100px;
            margin: 0 auto;
            padding: 20px;
            background: #f8f9fa;
        }
        .container { background: white; padding: 30px; border-radius: 8px; box-shadow: 0 2px 10px rgba(0,0,0,0.1); }
        h1 { color: #007acc; border-bottom: 3px solid #007acc; padding-bottom: 10px; }
        table { border-collapse: collapse; width: 100%; margin: 20px 0; }
        th, td { border: 1px solid #dee2e6; padding: 8px 10px; text-align: left; vertical-align: top; }
        th { background: #e9ecef; }
        .match { display: inline-block; padding: 2px 10px; border-radius: 12px; font-weight: bold; color: white; white-space: nowrap; }
        .very-strong { background: #28a745; }
        .strong { background: #17a2b8; }
        .ok { background: #ffc107; color: #000; }
        .weak { background: #fd7e14; }
        .very-weak { background: #dc3545; }
        .interpretation { padding: 12px 16px; background: #eef6fb; border-left: 4px solid #007acc; }
        .metadata { font-size: 0.9em; color: #6c757d; margin-top: 30px; }
    </style>
    {% endif %}
</head>
<body>
    <div class="container">
        <h1>EC Classification Relativity Search</h1>
        <p class="interpretation">{{ interpretation }}</p>
        <table>
            <thead>
                <tr><th>#</th><th>Job Title</th><th>EC Level</th><th>Department</th><th>Score</th><th>Match</th><th>Why it's a Match</th></tr>
            </thead>
            <tbody>
            {% for row in rows %}
                <tr>
                    <td>{{ row.rank }}</td>
                    <td>{{ row.job_title }}</td>
                    <td>{{ row.ec_level }}</td>
                    <td>{{ row.department }}</td>
                    <td>{{ row.score }}</td>
                    <td><span class="match {{ row.quality_class }}">{{ row.label }}</span></td>
                    <td>{{ row.explanation }}</td>
                </tr>
            {% endfor %}
            </tbody>
        </table>
        <div class="metadata">
            <p><strong>Generated by EC Relativity v{{ version }}</strong> on {{ generated_at }}</p>
            <p><strong>Input:</strong> {{ input_file }} | <strong>Embeddings:</strong> {{ embedding_model }} | <strong>Corpus:</strong> {{ corpus_size }} positions</p>
        </div>
    </div>
</body>
</html>"#, ext = "html")]
struct HtmlTemplate {
    include_styles: bool,
    interpretation: String,
    rows: Vec<HtmlRow>,
    version: String,
    generated_at: String,
    input_file: String,
    embedding_model: String,
    corpus_size: usize,
}

struct HtmlRow {
    rank: usize,
    job_title: String,
    ec_level: String,
    department: String,
    score: String,
    label: &'static str,
    quality_class: &'static str,
    explanation: String,
}

fn quality_color(quality: MatchQuality) -> Color {
    match quality {
        MatchQuality::VeryStrong => Color::Green,
        MatchQuality::Strong => Color::BrightGreen,
        MatchQuality::Ok => Color::Yellow,
        MatchQuality::Weak => Color::BrightRed,
        MatchQuality::VeryWeak => Color::Red,
    }
}

fn quality_icon(quality: MatchQuality) -> &'static str {
    match quality {
        MatchQuality::VeryStrong => "🟢",
        MatchQuality::Strong => "✅",
        MatchQuality::Ok => "🟡",
        MatchQuality::Weak => "🟠",
        MatchQuality::VeryWeak => "🔴",
    }
}

fn interpretation_line(interpretation: &Interpretation) -> String {
    match interpretation {
        Interpretation::Strong { .. } => format!("✅ {}", interpretation.message()),
        Interpretation::Advisory => format!("⚠️ {}", interpretation.message()),
        Interpretation::AdvisoryOnly => format!("ℹ️ {}", interpretation.message()),
    }
}

fn file_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string())
}

impl ConsoleFormatter {
    pub fn new(use_colors: bool, detailed: bool) -> Self {
        Self { use_colors, detailed }
    }

    fn colorize(&self, text: &str, color: Color) -> String {
        if self.use_colors {
            text.color(color).to_string()
        } else {
            text.to_string()
        }
    }

    fn format_header(&self, title: &str) -> String {
        if self.use_colors {
            format!("\n{} {}\n", "█".blue().bold(), title.blue().bold())
        } else {
            format!("\n█ {}\n", title)
        }
    }

    fn format_match(&self, quality: MatchQuality) -> String {
        let label = if self.use_colors {
            quality.label().color(quality_color(quality)).bold().to_string()
        } else {
            quality.label().to_string()
        };
        format!("{} {}", quality_icon(quality), label)
    }

    fn format_result(&self, result: &ComparisonResult) -> String {
        let mut output = format!(
            "{:>2}. {} | {} | {}\n    Score: {:.4}  {}\n    {}\n",
            result.rank,
            self.colorize(&result.job_title, Color::Cyan),
            result.ec_level,
            result.department,
            result.final_score,
            self.format_match(result.match_quality),
            result.explanation
        );

        if self.detailed {
            for (element, score) in result.element_scores.iter() {
                output.push_str(&format!("      {:<40} {:>7.4}\n", element.name(), score));
            }
        }
        output
    }
}

impl OutputFormatter for ConsoleFormatter {
    fn format_report(&self, report: &ComparisonReport) -> Result<String> {
        let mut output = String::new();

        output.push_str(&self.format_header("📊 EC RELATIVITY SEARCH"));
        output.push_str(&format!(
            "Generated: {} | Input: {} | Corpus: {} positions\n",
            report.metadata.generated_at.format("%Y-%m-%d %H:%M:%S UTC"),
            file_name(&report.metadata.input_file),
            report.metadata.corpus_size
        ));

        if self.detailed {
            if let Some(elements) = &report.elements {
                output.push_str(&self.format_header("Extracted Elements"));
                for element in EcElement::ALL {
                    let text = elements.non_empty(element).unwrap_or("(none)");
                    output.push_str(&format!("• {}: {}\n", self.colorize(element.name(), Color::Yellow), text));
                }
            }
        }

        output.push_str(&self.format_header("Top Comparators"));
        if report.results.is_empty() {
            output.push_str("No comparators found.\n");
        }
        for result in &report.results {
            output.push_str(&self.format_result(result));
            output.push('\n');
        }

        output.push_str(&interpretation_line(&report.interpretation));
        output.push('\n');
        Ok(output)
    }

    fn supports_format(&self) -> OutputFormat {
        OutputFormat::Console
    }
}

impl JsonFormatter {
    pub fn new(pretty: bool) -> Self {
        Self { pretty }
    }
}

impl OutputFormatter for JsonFormatter {
    fn format_report(&self, report: &ComparisonReport) -> Result<String> {
        if self.pretty {
            Ok(serde_json::to_string_pretty(report)?)
        } else {
            Ok(serde_json::to_string(report)?)
        }
    }

    fn supports_format(&self) -> OutputFormat {
        OutputFormat::Json
    }
}

impl MarkdownFormatter {
    pub fn new(include_metadata: bool) -> Self {
        Self { include_metadata }
    }

    /// Pipes would break the table
    fn escape_cell(text: &str) -> String {
        text.replace('|', "\\|").replace('\n', " ")
    }
}

impl OutputFormatter for MarkdownFormatter {
    fn format_report(&self, report: &ComparisonReport) -> Result<String> {
        let mut output = String::new();

        output.push_str("# EC Classification Relativity Search\n\n");

        if self.include_metadata {
            output.push_str(&format!(
                "**Generated:** {} | **Input:** `{}` | **Embeddings:** {} | **Corpus:** {} positions\n\n",
                report.metadata.generated_at.format("%Y-%m-%d %H:%M:%S UTC"),
                file_name(&report.metadata.input_file),
                report.metadata.embedding_model,
                report.metadata.corpus_size
            ));
        }

        if let Some(elements) = &report.elements {
            output.push_str("## Extracted Elements\n\n");
            for element in elements.populated() {
                output.push_str(&format!(
                    "- **{}:** {}\n",
                    element.name(),
                    Self::escape_cell(elements.get(element).trim())
                ));
            }
            output.push('\n');
        }

        output.push_str("## Top Comparators\n\n");
        output.push_str("| # | Job Title | EC Level | Department | Score | Match | Why it's a Match |\n");
        output.push_str("|---|---|---|---|---|---|---|\n");
        for result in &report.results {
            output.push_str(&format!(
                "| {} | {} | {} | {} | {:.4} | {} | {} |\n",
                result.rank,
                Self::escape_cell(&result.job_title),
                Self::escape_cell(&result.ec_level),
                Self::escape_cell(&result.department),
                result.final_score,
                result.match_quality.label(),
                Self::escape_cell(&result.explanation)
            ));
        }

        output.push_str(&format!("\n{}\n", interpretation_line(&report.interpretation)));
        Ok(output)
    }

    fn supports_format(&self) -> OutputFormat {
        OutputFormat::Markdown
    }
}

impl HtmlFormatter {
    pub fn new(include_styles: bool) -> Self {
        Self { include_styles }
    }

    fn create_template_data(&self, report: &ComparisonReport) -> HtmlTemplate {
        let rows = report
            .results
            .iter()
            .map(|result| HtmlRow {
                rank: result.rank,
                job_title: result.job_title.clone(),
                ec_level: result.ec_level.clone(),
                department: result.department.clone(),
                score: format!("{:.4}", result.final_score),
                label: result.match_quality.label(),
                quality_class: match result.match_quality {
                    MatchQuality::VeryStrong => "very-strong",
                    MatchQuality::Strong => "strong",
                    MatchQuality::Ok => "ok",
                    MatchQuality::Weak => "weak",
                    MatchQuality::VeryWeak => "very-weak",
                },
                explanation: result.explanation.clone(),
            })
            .collect();

        HtmlTemplate {
            include_styles: self.include_styles,
            interpretation: report.interpretation.message(),
            rows,
            version: report.metadata.tool_version.clone(),
            generated_at: report
                .metadata
                .generated_at
                .format("%Y-%m-%d %H:%M:%S UTC")
                .to_string(),
            input_file: file_name(&report.metadata.input_file),
            embedding_model: report.metadata.embedding_model.clone(),
            corpus_size: report.metadata.corpus_size,
        }
    }
}

impl OutputFormatter for HtmlFormatter {
    fn format_report(&self, report: &ComparisonReport) -> Result<String> {
        self.create_template_data(report)
            .render()
            .map_err(|e| RelativityError::OutputFormatting(e.to_string()))
    }

    fn supports_format(&self) -> OutputFormat {
        OutputFormat::Html
    }
}

impl ReportGenerator {
    pub fn new() -> Self {
        Self::with_options(true, false)
    }

    pub fn with_options(use_colors: bool, detailed: bool) -> Self {
        Self {
            console_formatter: ConsoleFormatter::new(use_colors, detailed),
            json_formatter: JsonFormatter::new(true),
            markdown_formatter: MarkdownFormatter::new(true),
            html_formatter: HtmlFormatter::new(true),
        }
    }

    pub fn generate_report(&self, report: &ComparisonReport, format: OutputFormat) -> Result<String> {
        match format {
            OutputFormat::Console => self.console_formatter.format_report(report),
            OutputFormat::Json => self.json_formatter.format_report(report),
            OutputFormat::Markdown => self.markdown_formatter.format_report(report),
            OutputFormat::Html => self.html_formatter.format_report(report),
        }
    }
}

impl Default for ReportGenerator {
    fn default() -> Self {
        Self::new()
    }
}

pub fn save_report_to_file(content: &str, file_path: &Path) -> Result<()> {
    if let Some(parent) = file_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(file_path, content)?;
    Ok(())
}

pub fn suggest_filename(format: OutputFormat, input_name: &str, timestamp: bool) -> String {
    let base_name = Path::new(input_name)
        .file_stem()
        .unwrap_or_default()
        .to_string_lossy();

    let timestamp_suffix = if timestamp {
        format!("_{}", chrono::Utc::now().format("%Y%m%d_%H%M%S"))
    } else {
        String::new()
    };

    let extension = match format {
        OutputFormat::Console => "txt",
        OutputFormat::Json => "json",
        OutputFormat::Markdown => "md",
        OutputFormat::Html => "html",
    };
    format!("{}_comparators{}.{}", base_name, timestamp_suffix, extension)
}

/// Parse a user-supplied format name
pub fn parse_output_format(format: &str) -> Result<OutputFormat> {
    match format.to_lowercase().as_str() {
        "console" => Ok(OutputFormat::Console),
        "json" => Ok(OutputFormat::Json),
        "markdown" | "md" => Ok(OutputFormat::Markdown),
        "html" => Ok(OutputFormat::Html),
        _ => Err(RelativityError::InvalidInput(format!(
            "Invalid output format: {}. Supported: console, json, markdown, html",
            format
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::report::ReportMetadata;
    use crate::processing::element::{ElementTextMap, PerElement};

    fn sample_report() -> ComparisonReport {
        let results = vec![
            ComparisonResult {
                rank: 1,
                job_title: "Senior Policy Analyst".to_string(),
                ec_level: "EC-06".to_string(),
                department: "Finance | Treasury".to_string(),
                final_score: 0.8712,
                match_quality: MatchQuality::Strong,
                explanation: "Aligned: Communication. Missing: none.".to_string(),
                element_scores: PerElement::from_fn(|_| 0.5),
            },
            ComparisonResult {
                rank: 2,
                job_title: "Economist <Trade>".to_string(),
                ec_level: "EC-05".to_string(),
                department: "Global Affairs".to_string(),
                final_score: 0.8,
                match_quality: MatchQuality::Ok,
                explanation: "Aligned: none. Missing: none.".to_string(),
                element_scores: PerElement::from_fn(|_| 0.3),
            },
        ];
        ComparisonReport::new(
            ReportMetadata::new("/tmp/jd.txt", "text-embedding-3-small", 120),
            results,
        )
    }

    #[test]
    fn test_markdown_table() {
        let output = MarkdownFormatter::new(false).format_report(&sample_report()).unwrap();
        assert!(output.contains("| # | Job Title | EC Level | Department | Score | Match | Why it's a Match |"));
        assert!(output.contains("| 1 | Senior Policy Analyst | EC-06 | Finance \\| Treasury | 0.8712 | Strong Match |"));
        assert!(output.contains("| 2 | Economist <Trade> | EC-05 | Global Affairs | 0.8000 | OK Match |"));
        assert!(output.contains("1 comparators scored ≥ 0.85"));
    }

    #[test]
    fn test_console_without_colors() {
        let report = sample_report().with_elements(
            ElementTextMap::new().with(EcElement::Communication, "Briefs the minister"),
        );
        let output = ConsoleFormatter::new(false, true).format_report(&report).unwrap();
        assert!(output.contains("Senior Policy Analyst | EC-06"));
        assert!(output.contains("Score: 0.8712"));
        assert!(output.contains("Briefs the minister"));
        assert!(output.contains("Decision Making"));
    }

    #[test]
    fn test_html_escapes_titles() {
        let output = HtmlFormatter::new(false).format_report(&sample_report()).unwrap();
        assert!(output.contains("Economist &#60;Trade&#62;") || output.contains("Economist &lt;Trade&gt;"));
        assert!(output.contains("class=\"match strong\""));
        assert!(!output.contains("<style>"));
    }

    #[test]
    fn test_json_round_trip_keeps_scores() {
        let output = JsonFormatter::new(true).format_report(&sample_report()).unwrap();
        let parsed: ComparisonReport = serde_json::from_str(&output).unwrap();
        assert_eq!(parsed.results.len(), 2);
        assert_eq!(parsed.results[0].final_score, 0.8712);
        assert_eq!(parsed.interpretation, Interpretation::Strong { count: 1 });
    }

    #[test]
    fn test_suggest_filename() {
        assert_eq!(
            suggest_filename(OutputFormat::Markdown, "/docs/policy_analyst.pdf", false),
            "policy_analyst_comparators.md"
        );
    }

    #[test]
    fn test_parse_output_format() {
        assert_eq!(parse_output_format("MD").unwrap(), OutputFormat::Markdown);
        assert!(parse_output_format("pdf").is_err());
    }
}
