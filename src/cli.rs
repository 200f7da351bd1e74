//! Command-line front end.
//!
//! Every subcommand loads the file into a fresh session, does one job and
//! prints the result; tables are shown with Polars' own formatting.

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use polars::prelude::{DataFrame, NamedFrom as _, Series};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tablescope::config::ExplorerSettings;
use tablescope::explorer::chart::{ChartKind, ChartRequest, build_chart};
use tablescope::explorer::correlation::{CorrelationMethod, correlation_matrix, strongest_pairs};
use tablescope::explorer::filter::{CategoryFilter, apply_filters, filter_options, paginate};
use tablescope::explorer::oplog::OperationStatus;
use tablescope::explorer::stats::{Description, describe, format_number, missing_report};
use tablescope::explorer::transforms::TransformPipeline;
use tablescope::explorer::{Session, Table, UploadOutcome};

#[derive(Parser)]
#[command(name = "tablescope", about = "Interactive tabular data exploration")]
pub struct Cli {
    /// Settings file (JSON). Defaults to the platform config directory.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Dataset overview, column classes and descriptive statistics
    Summary {
        /// Delimited text file with a header row
        file: PathBuf,
    },
    /// Missing values per column and the rows that contain them
    Missing { file: PathBuf },
    /// Correlation matrix and the strongest pairs
    Correlate {
        file: PathBuf,

        #[arg(long, value_enum, default_value_t = CorrelationMethod::Pearson)]
        method: CorrelationMethod,

        /// Columns to correlate. Defaults to the first five numeric columns.
        #[arg(long, value_delimiter = ',')]
        columns: Vec<String>,
    },
    /// Apply a JSON transform pipeline and show the result
    Process {
        file: PathBuf,

        /// Pipeline file: a list of {"transform_type", "parameters"} steps
        #[arg(long)]
        pipeline: PathBuf,

        /// Page of the result to print
        #[arg(long, default_value_t = 1)]
        page: usize,
    },
    /// Filtered, paginated view of the table
    Preview {
        file: PathBuf,

        /// Category filter, e.g. `city=Oslo,Rome`. Repeat for more columns.
        #[arg(long = "filter")]
        filters: Vec<String>,

        #[arg(long, default_value_t = 1)]
        page: usize,
    },
    /// Build a chart and write it as a standalone HTML page
    Chart {
        file: PathBuf,

        #[arg(long, value_enum)]
        kind: ChartKind,

        #[arg(long)]
        x: Option<String>,

        /// Value column(s); repeat for line charts with several series
        #[arg(long)]
        y: Vec<String>,

        #[arg(long)]
        color: Option<String>,

        #[arg(long)]
        size: Option<String>,

        /// Histogram bins (10-100)
        #[arg(long)]
        bins: Option<usize>,

        #[arg(short, long)]
        output: PathBuf,
    },
}

pub fn run_command(command: Commands, settings: &ExplorerSettings) -> Result<()> {
    match command {
        Commands::Summary { file } => handle_summary(&file, settings),
        Commands::Missing { file } => handle_missing(&file, settings),
        Commands::Correlate {
            file,
            method,
            columns,
        } => handle_correlate(&file, method, columns, settings),
        Commands::Process {
            file,
            pipeline,
            page,
        } => handle_process(&file, &pipeline, page, settings),
        Commands::Preview {
            file,
            filters,
            page,
        } => handle_preview(&file, &filters, page, settings),
        Commands::Chart {
            file,
            kind,
            x,
            y,
            color,
            size,
            bins,
            output,
        } => {
            let request = ChartRequest {
                kind,
                x,
                y,
                color,
                size,
                bins,
            };
            handle_chart(&file, &request, &output, settings)
        }
    }
}

fn open_session(file: &Path, settings: &ExplorerSettings) -> Result<Session> {
    let bytes =
        std::fs::read(file).with_context(|| format!("Failed to read {}", file.display()))?;
    let name = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let mut session = Session::new(settings.clone());
    let outcome = session
        .upload(&name, &bytes)
        .with_context(|| format!("Failed to load {}", file.display()))?;
    if let UploadOutcome::Loaded {
        rows,
        columns,
        converted,
    } = outcome
    {
        println!("Loaded {name}: {rows} rows, {columns} columns");
        if !converted.is_empty() {
            println!("Converted to numeric: {}", converted.join(", "));
        }
    }
    Ok(session)
}

/// Plain-text grid with the row label in the first column.
/// The frame with the row labels as its first column.
fn labelled_frame(table: &Table) -> Result<DataFrame> {
    let taken: HashSet<String> = table.column_names().into_iter().collect();
    let label = Table::unique_name("row", &taken);
    let ids: Vec<u64> = table.row_ids().iter().map(|&id| id as u64).collect();
    let mut frame = table.frame().clone();
    frame.insert_column(0, Series::new(label.as_str().into(), ids))?;
    Ok(frame)
}

fn print_description(description: &Description) {
    let overview = &description.overview;
    println!(
        "\n{} rows, {} columns, {} missing cells, {} duplicate rows",
        overview.rows, overview.columns, overview.missing_cells, overview.duplicate_rows
    );

    println!("\nColumns:");
    for (name, class) in &description.classification.columns {
        println!("  {name}: {}", class.as_str());
    }

    if !description.numeric.is_empty() {
        println!("\nNumeric:");
        for s in &description.numeric {
            println!(
                "  {}: count={} min={} max={} mean={} median={} std={} mode={}",
                s.column,
                s.count,
                format_number(Some(s.min)),
                format_number(Some(s.max)),
                format_number(Some(s.mean)),
                format_number(Some(s.median)),
                format_number(s.std),
                format_number(Some(s.mode)),
            );
        }
    }

    if !description.categorical.is_empty() {
        println!("\nCategorical:");
        for s in &description.categorical {
            println!(
                "  {}: count={} unique={} top={} ({}) mode={}",
                s.column, s.count, s.unique, s.most_frequent, s.frequency, s.mode
            );
        }
    }
}

fn handle_summary(file: &Path, settings: &ExplorerSettings) -> Result<()> {
    let session = open_session(file, settings)?;
    let description = describe(session.current()?, &settings.classifier)?;
    print_description(&description);
    Ok(())
}

fn handle_missing(file: &Path, settings: &ExplorerSettings) -> Result<()> {
    let session = open_session(file, settings)?;
    let report = missing_report(session.current()?, settings.missing_preview_limit)?;
    if report.is_clean() {
        println!("No missing values.");
        return Ok(());
    }

    println!("{} missing cells", report.total_missing);
    for column in &report.columns {
        let labels: Vec<String> = column.rows.iter().map(ToString::to_string).collect();
        let more = match column.hidden() {
            0 => String::new(),
            n => format!(" (+{n} more)"),
        };
        println!(
            "  {} [{}]: {} ({:.1}%) rows {}{more}",
            column.column,
            column.dtype,
            column.missing,
            column.percent,
            labels.join(", ")
        );
    }
    println!("{} rows with missing values", report.rows_with_missing.len());
    Ok(())
}

fn handle_correlate(
    file: &Path,
    method: CorrelationMethod,
    columns: Vec<String>,
    settings: &ExplorerSettings,
) -> Result<()> {
    let session = open_session(file, settings)?;
    let columns = if columns.is_empty() {
        session.classification()?.numeric().into_iter().take(5).collect()
    } else {
        columns
    };

    let matrix = correlation_matrix(session.current()?, &columns, method)?;
    println!("\n{method:?} correlation");
    println!("{:>12} {}", "", columns.iter().map(|c| format!("{c:>12}")).collect::<String>());
    for (name, row) in matrix.columns.iter().zip(&matrix.data) {
        let cells: String = row
            .iter()
            .map(|v| format!("{:>12}", format_number(Some(*v))))
            .collect();
        println!("{name:>12} {cells}");
    }

    println!("\nStrongest pairs:");
    for pair in strongest_pairs(&matrix, settings.strongest_pairs_limit) {
        println!(
            "  {} / {}: {}",
            pair.first,
            pair.second,
            format_number(Some(pair.coefficient))
        );
    }
    Ok(())
}

fn handle_process(
    file: &Path,
    pipeline_path: &Path,
    page: usize,
    settings: &ExplorerSettings,
) -> Result<()> {
    let json = std::fs::read_to_string(pipeline_path)
        .with_context(|| format!("Failed to read pipeline {}", pipeline_path.display()))?;
    let pipeline = TransformPipeline::from_json(&json).context("Failed to parse pipeline")?;

    let mut session = open_session(file, settings)?;
    let run = session.apply_pipeline(&pipeline)?;

    println!();
    for applied in &run.applied {
        println!("[{}] {}: {}", applied.name, applied.description, applied.message);
        for warning in &applied.warnings {
            println!("  warning: {warning}");
        }
        for encoding in &applied.encodings {
            println!("  {} classes: {}", encoding.column, encoding.classes.join(", "));
        }
    }
    if let Some(rejected) = &run.rejected {
        println!(
            "Step {} ({}) rejected: {}",
            rejected.index + 1,
            rejected.transform_type,
            rejected.error
        );
    }

    let comparison = session.compare_with_original()?;
    println!(
        "\nChanges vs original: rows {:+}, columns {:+}, missing {:+}, duplicates {:+}",
        comparison.rows_delta(),
        comparison.columns_delta(),
        comparison.missing_delta(),
        comparison.duplicates_delta()
    );

    println!("\nOperation log:");
    for entry in session.log().entries() {
        let status = match entry.status {
            OperationStatus::Applied => "ok",
            OperationStatus::Rejected => "rejected",
        };
        println!(
            "  {} {:<18} {:<8} {} -> {}  {}",
            entry.timestamp.format("%H:%M:%S"),
            entry.operation,
            status,
            entry.before,
            entry.after,
            entry.details
        );
    }

    let view = paginate(session.current()?, page, settings.page_size)?;
    println!("\n{} (page {}/{})", view.range_label(), view.number, view.page_count);
    println!("{}", labelled_frame(&view.rows)?);
    Ok(())
}

fn handle_preview(
    file: &Path,
    filters: &[String],
    page: usize,
    settings: &ExplorerSettings,
) -> Result<()> {
    let session = open_session(file, settings)?;
    let current = session.current()?;

    let filters = filters
        .iter()
        .map(|f| CategoryFilter::parse(f))
        .collect::<Result<Vec<_>, _>>()?;
    let view = apply_filters(current, &filters)?;

    let options = filter_options(current, &settings.classifier, settings.filter_max_unique)?;
    for option in &options.available {
        println!("  filter {}: {}", option.column, option.values.join(", "));
    }
    for (column, count) in &options.too_many_values {
        println!("  filter {column}: too many values ({count})");
    }

    let page = paginate(&view, page, settings.page_size)?;
    println!("\n{} (page {}/{})", page.range_label(), page.number, page.page_count);
    println!("{}", labelled_frame(&page.rows)?);
    Ok(())
}

fn handle_chart(
    file: &Path,
    request: &ChartRequest,
    output: &Path,
    settings: &ExplorerSettings,
) -> Result<()> {
    let session = open_session(file, settings)?;
    let chart = build_chart(session.current()?, request, settings)?;
    std::fs::write(output, chart.to_html())
        .with_context(|| format!("Failed to write {}", output.display()))?;
    println!("{} written to {}", chart.title, output.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory as _;
    use polars::prelude::*;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_correlate_columns() {
        let cli = Cli::parse_from([
            "tablescope",
            "correlate",
            "data.csv",
            "--method",
            "spearman",
            "--columns",
            "a,b",
        ]);
        match cli.command {
            Commands::Correlate {
                method, columns, ..
            } => {
                assert_eq!(method, CorrelationMethod::Spearman);
                assert_eq!(columns, vec!["a", "b"]);
            }
            _ => panic!("expected correlate"),
        }
    }

    #[test]
    fn test_labelled_frame_puts_labels_first() -> Result<()> {
        let table = Table::with_row_ids(
            df!("name" => &[Some("ann"), None], "n" => &[1, 22])?,
            vec![0, 3],
        )?;
        let frame = labelled_frame(&table)?;
        assert_eq!(frame.get_column_names_str(), vec!["row", "name", "n"]);
        let labels = frame.column("row")?.as_materialized_series().u64()?.clone();
        assert_eq!(labels.into_no_null_iter().collect::<Vec<_>>(), vec![0, 3]);
        assert_eq!(frame.column("name")?.null_count(), 1);

        let shown = frame.to_string();
        assert!(shown.contains("ann"));
        assert!(shown.contains("null"));
        Ok(())
    }

    #[test]
    fn test_labelled_frame_avoids_existing_row_column() -> Result<()> {
        let table = Table::new(df!("row" => &["a", "b"])?);
        let frame = labelled_frame(&table)?;
        assert_eq!(frame.get_column_names_str(), vec!["row_1", "row"]);
        Ok(())
    }
}
