//! Chart builder: maps a chart kind and column selection to a Plotly figure.
//!
//! Traces are kept as Plotly JSON so every chart kind, violin included, shares
//! one representation; the layout is typed. Export goes through the `plotly`
//! crate with plotly.js embedded, so written pages work offline.

use super::classify::{ColumnClassification, classify};
use super::correlation::{CorrelationMethod, correlation_matrix};
use super::table::Table;
use crate::config::ExplorerSettings;
use crate::error::{OperationError, Result};
use plotly::common::Title;
use plotly::layout::{Axis, BarMode};
use plotly::{Layout, Plot, Trace};
use polars::prelude::{ChunkAgg as _, Float64Chunked};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ChartKind {
    Bar,
    Line,
    Scatter,
    Pie,
    Histogram,
    Box,
    Heatmap,
    Violin,
}

/// Columns chosen for a chart. Which fields a kind reads:
///
/// | kind | x | y | color | size |
/// |---|---|---|---|---|
/// | bar | categorical | optional numeric (mean per category) | optional categorical | |
/// | line | optional numeric (row labels otherwise) | one or more numeric | | |
/// | scatter | numeric | numeric | optional categorical | optional numeric |
/// | pie | categorical | | | |
/// | histogram | numeric | | optional categorical | |
/// | box, violin | optional categorical grouping | numeric | | |
/// | heatmap | | two or more numeric (all numeric when empty) | | |
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartRequest {
    pub kind: ChartKind,
    #[serde(default)]
    pub x: Option<String>,
    #[serde(default)]
    pub y: Vec<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub size: Option<String>,
    /// Histogram bins; defaults to the configured bin count
    #[serde(default)]
    pub bins: Option<usize>,
}

impl ChartRequest {
    pub fn new(kind: ChartKind) -> Self {
        Self {
            kind,
            x: None,
            y: Vec::new(),
            color: None,
            size: None,
            bins: None,
        }
    }
}

/// How several bar-like traces share the x axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BarLayout {
    Group,
    Overlay,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartLayout {
    pub title: String,
    pub x_title: Option<String>,
    pub y_title: Option<String>,
    pub bar_layout: Option<BarLayout>,
}

impl ChartLayout {
    fn new(title: &str, x_title: Option<&str>, y_title: Option<&str>) -> Self {
        Self {
            title: title.to_owned(),
            x_title: x_title.map(str::to_owned),
            y_title: y_title.map(str::to_owned),
            bar_layout: None,
        }
    }

    fn to_plotly(&self) -> Layout {
        let mut layout = Layout::new().title(Title::with_text(self.title.as_str()));
        if let Some(x) = &self.x_title {
            layout = layout.x_axis(Axis::new().title(Title::with_text(x.as_str())));
        }
        if let Some(y) = &self.y_title {
            layout = layout.y_axis(Axis::new().title(Title::with_text(y.as_str())));
        }
        match self.bar_layout {
            Some(BarLayout::Group) => layout.bar_mode(BarMode::Group),
            Some(BarLayout::Overlay) => layout.bar_mode(BarMode::Overlay),
            None => layout,
        }
    }
}

/// One trace as Plotly JSON.
#[derive(Debug, Clone, Serialize)]
#[serde(transparent)]
struct FigureTrace(Value);

impl Trace for FigureTrace {
    fn to_json(&self) -> String {
        self.0.to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Chart {
    pub kind: ChartKind,
    pub title: String,
    pub data: Vec<Value>,
    pub layout: ChartLayout,
}

impl Chart {
    fn plot(&self) -> Plot {
        let mut plot = Plot::new();
        for trace in &self.data {
            plot.add_trace(Box::new(FigureTrace(trace.clone())));
        }
        plot.set_layout(self.layout.to_plotly());
        // plotly.js is inlined by default via the `plotly_embed_js` feature.
        plot
    }

    /// Plotly figure JSON: `{"data": [...], "layout": {...}, ...}`.
    pub fn to_json(&self) -> String {
        self.plot().to_json()
    }

    /// A standalone HTML page with plotly.js inlined.
    pub fn to_html(&self) -> String {
        self.plot().to_html()
    }
}

/// Column checks against the current classification.
struct Columns<'a> {
    table: &'a Table,
    classes: ColumnClassification,
}

impl Columns<'_> {
    fn required<'r>(&self, column: Option<&'r String>, role: &str) -> Result<&'r String> {
        column.ok_or_else(|| {
            OperationError::InvalidParameter(format!("a {role} column is required")).into()
        })
    }

    fn numeric(&self, column: &str) -> Result<Vec<Option<f64>>> {
        self.table.numeric_values(column)
    }

    fn categorical(&self, column: &str) -> Result<Vec<Option<String>>> {
        let values = self.table.text_values(column)?;
        if !self.classes.is_categorical(column) {
            return Err(OperationError::InvalidParameter(format!(
                "column '{column}' is not categorical"
            ))
            .into());
        }
        Ok(values)
    }
}

/// Row positions per distinct value, in sorted value order; missing cells are left out.
fn groups(cells: &[Option<String>]) -> BTreeMap<&str, Vec<usize>> {
    let mut groups: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    for (pos, cell) in cells.iter().enumerate() {
        if let Some(v) = cell {
            groups.entry(v.as_str()).or_default().push(pos);
        }
    }
    groups
}

fn pick<T: Clone>(values: &[T], positions: &[usize]) -> Vec<T> {
    positions.iter().map(|&p| values[p].clone()).collect()
}

/// Build the figure for `request`.
///
/// # Errors
///
/// [`OperationError`] when a required column is missing, unknown, or of the
/// wrong kind, or when the histogram bin count is outside 10..=100.
pub fn build_chart(
    table: &Table,
    request: &ChartRequest,
    settings: &ExplorerSettings,
) -> Result<Chart> {
    let columns = Columns {
        table,
        classes: classify(table, &settings.classifier)?,
    };
    let chart = match request.kind {
        ChartKind::Bar => bar(&columns, request)?,
        ChartKind::Line => line(&columns, request)?,
        ChartKind::Scatter => scatter(&columns, request)?,
        ChartKind::Pie => pie(&columns, request)?,
        ChartKind::Histogram => histogram(&columns, request, settings.histogram_bins)?,
        ChartKind::Box | ChartKind::Violin => distribution(&columns, request)?,
        ChartKind::Heatmap => heatmap(&columns, request)?,
    };
    tracing::info!(kind = ?request.kind, traces = chart.data.len(), "Built chart");
    Ok(chart)
}

fn bar(columns: &Columns<'_>, request: &ChartRequest) -> Result<Chart> {
    let x = columns.required(request.x.as_ref(), "categorical x")?;
    let categories = columns.categorical(x)?;
    let y = request.y.first();
    let y_values = y.map(|c| columns.numeric(c)).transpose()?;
    let colors = request
        .color
        .as_ref()
        .map(|c| columns.categorical(c))
        .transpose()?;

    // One trace per color group, or a single trace over all rows.
    let all_rows: Vec<usize> = (0..categories.len()).collect();
    let trace_groups: Vec<(Option<&str>, Vec<usize>)> = match &colors {
        Some(colors) => groups(colors)
            .into_iter()
            .map(|(name, rows)| (Some(name), rows))
            .collect(),
        None => vec![(None, all_rows)],
    };

    let mut data = Vec::new();
    for (name, rows) in trace_groups {
        let subset = pick(&categories, &rows);
        let by_category = groups(&subset);
        let labels: Vec<&str> = by_category.keys().copied().collect();
        let heights: Vec<Option<f64>> = match &y_values {
            Some(values) => by_category
                .values()
                .map(|positions| {
                    positions
                        .iter()
                        .map(|&p| values[rows[p]])
                        .collect::<Float64Chunked>()
                        .mean()
                })
                .collect(),
            None => by_category
                .values()
                .map(|positions| Some(positions.len() as f64))
                .collect(),
        };
        let mut trace = json!({ "type": "bar", "x": labels, "y": heights });
        if let Some(name) = name {
            trace["name"] = json!(name);
        }
        data.push(trace);
    }

    let (title, y_title) = match y {
        Some(y) => (format!("Bar chart: {y} by {x}"), y.as_str()),
        None => (format!("Counts: {x}"), "count"),
    };
    let mut layout = ChartLayout::new(&title, Some(x.as_str()), Some(y_title));
    if colors.is_some() {
        layout.bar_layout = Some(BarLayout::Group);
    }
    Ok(Chart {
        kind: ChartKind::Bar,
        title,
        data,
        layout,
    })
}

fn line(columns: &Columns<'_>, request: &ChartRequest) -> Result<Chart> {
    if request.y.is_empty() {
        return Err(
            OperationError::InvalidParameter("a line chart needs at least one y column".to_owned())
                .into(),
        );
    }
    let (x_values, x_title) = match &request.x {
        Some(x) => (json!(columns.numeric(x)?), x.as_str()),
        None => (json!(columns.table.row_ids()), "row"),
    };

    let mut data = Vec::new();
    for y in &request.y {
        data.push(json!({
            "type": "scatter",
            "mode": "lines",
            "name": y,
            "x": x_values,
            "y": columns.numeric(y)?,
        }));
    }
    let title = format!("Line chart: {}", request.y.join(", "));
    Ok(Chart {
        kind: ChartKind::Line,
        layout: ChartLayout::new(&title, Some(x_title), Some("value")),
        title,
        data,
    })
}

fn scatter(columns: &Columns<'_>, request: &ChartRequest) -> Result<Chart> {
    let x = columns.required(request.x.as_ref(), "numeric x")?;
    let y = columns.required(request.y.first(), "numeric y")?;
    let xs = columns.numeric(x)?;
    let ys = columns.numeric(y)?;
    let sizes = request
        .size
        .as_ref()
        .map(|c| columns.numeric(c))
        .transpose()?;
    let colors = request
        .color
        .as_ref()
        .map(|c| columns.categorical(c))
        .transpose()?;

    let all_rows: Vec<usize> = (0..xs.len()).collect();
    let trace_groups: Vec<(Option<&str>, Vec<usize>)> = match &colors {
        Some(colors) => groups(colors)
            .into_iter()
            .map(|(name, rows)| (Some(name), rows))
            .collect(),
        None => vec![(None, all_rows)],
    };

    let mut data = Vec::new();
    for (name, rows) in trace_groups {
        let mut trace = json!({
            "type": "scatter",
            "mode": "markers",
            "x": pick(&xs, &rows),
            "y": pick(&ys, &rows),
        });
        if let Some(name) = name {
            trace["name"] = json!(name);
        }
        if let Some(sizes) = &sizes {
            trace["marker"] = json!({ "size": pick(sizes, &rows), "sizemode": "area" });
        }
        data.push(trace);
    }

    let title = format!("Scatter: {y} vs {x}");
    Ok(Chart {
        kind: ChartKind::Scatter,
        layout: ChartLayout::new(&title, Some(x.as_str()), Some(y.as_str())),
        title,
        data,
    })
}

fn pie(columns: &Columns<'_>, request: &ChartRequest) -> Result<Chart> {
    let names = columns.required(request.x.as_ref(), "categorical names")?;
    let values = columns.categorical(names)?;

    // value counts: highest first, first seen first among equal counts
    let mut order: Vec<&str> = Vec::new();
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for v in values.iter().flatten() {
        let count = counts.entry(v.as_str()).or_default();
        if *count == 0 {
            order.push(v.as_str());
        }
        *count += 1;
    }
    order.sort_by(|a, b| counts[b].cmp(&counts[a]));
    let sizes: Vec<usize> = order.iter().map(|v| counts[v]).collect();

    let title = format!("Distribution: {names}");
    Ok(Chart {
        kind: ChartKind::Pie,
        layout: ChartLayout::new(&title, None, None),
        title,
        data: vec![json!({ "type": "pie", "labels": order, "values": sizes })],
    })
}

fn histogram(columns: &Columns<'_>, request: &ChartRequest, default_bins: usize) -> Result<Chart> {
    let x = columns.required(request.x.as_ref(), "numeric x")?;
    let bins = request.bins.unwrap_or(default_bins);
    if !(10..=100).contains(&bins) {
        return Err(OperationError::InvalidParameter(format!(
            "histogram bins must be between 10 and 100, got {bins}"
        ))
        .into());
    }
    let xs = columns.numeric(x)?;
    let colors = request
        .color
        .as_ref()
        .map(|c| columns.categorical(c))
        .transpose()?;

    let data = match &colors {
        Some(colors) => groups(colors)
            .into_iter()
            .map(|(name, rows)| {
                json!({ "type": "histogram", "name": name, "x": pick(&xs, &rows), "nbinsx": bins })
            })
            .collect(),
        None => vec![json!({ "type": "histogram", "x": xs, "nbinsx": bins })],
    };

    let title = format!("Histogram: {x}");
    let mut layout = ChartLayout::new(&title, Some(x.as_str()), Some("count"));
    if colors.is_some() {
        layout.bar_layout = Some(BarLayout::Overlay);
    }
    Ok(Chart {
        kind: ChartKind::Histogram,
        title,
        data,
        layout,
    })
}

fn distribution(columns: &Columns<'_>, request: &ChartRequest) -> Result<Chart> {
    let y = columns.required(request.y.first(), "numeric y")?;
    let ys = columns.numeric(y)?;
    let (trace_type, label, kind) = match request.kind {
        ChartKind::Violin => ("violin", "Violin plot", ChartKind::Violin),
        _ => ("box", "Box plot", ChartKind::Box),
    };

    let (data, title) = match &request.x {
        Some(x) => {
            let categories = columns.categorical(x)?;
            let data = groups(&categories)
                .into_iter()
                .map(|(name, rows)| {
                    json!({ "type": trace_type, "name": name, "y": pick(&ys, &rows) })
                })
                .collect();
            (data, format!("{label}: {y} by {x}"))
        }
        None => (
            vec![json!({ "type": trace_type, "name": y, "y": ys })],
            format!("{label}: {y}"),
        ),
    };
    Ok(Chart {
        kind,
        layout: ChartLayout::new(&title, request.x.as_deref(), Some(y.as_str())),
        title,
        data,
    })
}

fn heatmap(columns: &Columns<'_>, request: &ChartRequest) -> Result<Chart> {
    let selected = if request.y.is_empty() {
        columns.classes.numeric()
    } else {
        request.y.clone()
    };
    let matrix = correlation_matrix(columns.table, &selected, CorrelationMethod::Pearson)?;
    let title = "Correlation heatmap".to_owned();
    Ok(Chart {
        kind: ChartKind::Heatmap,
        layout: ChartLayout::new(&title, None, None),
        title,
        data: vec![json!({
            "type": "heatmap",
            "x": matrix.columns,
            "y": matrix.columns,
            "z": matrix.data,
            "zmin": -1.0,
            "zmax": 1.0,
            "colorscale": "RdBu",
        })],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use polars::prelude::*;

    fn sample() -> Result<Table> {
        Ok(Table::new(df!(
            "city" => &["Oslo", "Rome", "Oslo", "Rome", "Lima"],
            "kind" => &["a", "b", "a", "a", "b"],
            "n" => &[Some(1.0), Some(3.0), Some(5.0), None, Some(2.0)],
            "m" => &[2.0, 4.0, 6.0, 8.0, 1.0]
        )?))
    }

    fn request(kind: ChartKind, x: Option<&str>, y: &[&str]) -> ChartRequest {
        ChartRequest {
            x: x.map(str::to_owned),
            y: y.iter().map(|s| (*s).to_owned()).collect(),
            ..ChartRequest::new(kind)
        }
    }

    #[test]
    fn test_bar_means_per_category() -> Result<()> {
        let chart = build_chart(
            &sample()?,
            &request(ChartKind::Bar, Some("city"), &["n"]),
            &ExplorerSettings::default(),
        )?;
        let trace = &chart.data[0];
        assert_eq!(trace["x"], json!(["Lima", "Oslo", "Rome"]));
        assert_eq!(trace["y"], json!([2.0, 3.0, 3.0]));
        assert_eq!(chart.title, "Bar chart: n by city");
        Ok(())
    }

    #[test]
    fn test_bar_counts_with_color_groups() -> Result<()> {
        let mut req = request(ChartKind::Bar, Some("city"), &[]);
        req.color = Some("kind".to_owned());
        let chart = build_chart(&sample()?, &req, &ExplorerSettings::default())?;
        assert_eq!(chart.data.len(), 2);
        assert_eq!(chart.data[0]["name"], json!("a"));
        assert_eq!(chart.data[0]["x"], json!(["Oslo", "Rome"]));
        assert_eq!(chart.data[0]["y"], json!([2.0, 1.0]));
        Ok(())
    }

    #[test]
    fn test_pie_value_counts() -> Result<()> {
        let chart = build_chart(
            &sample()?,
            &request(ChartKind::Pie, Some("city"), &[]),
            &ExplorerSettings::default(),
        )?;
        assert_eq!(chart.data[0]["labels"], json!(["Oslo", "Rome", "Lima"]));
        assert_eq!(chart.data[0]["values"], json!([2, 2, 1]));
        Ok(())
    }

    #[test]
    fn test_wrong_column_kinds_rejected() -> Result<()> {
        let t = sample()?;
        let settings = ExplorerSettings::default();
        assert!(build_chart(&t, &request(ChartKind::Bar, Some("n"), &[]), &settings).is_err());
        let scatter = request(ChartKind::Scatter, Some("city"), &["n"]);
        assert!(build_chart(&t, &scatter, &settings).is_err());
        assert!(build_chart(&t, &request(ChartKind::Line, None, &[]), &settings).is_err());

        let mut hist = request(ChartKind::Histogram, Some("n"), &[]);
        hist.bins = Some(5);
        assert!(build_chart(&t, &hist, &settings).is_err());
        Ok(())
    }

    #[test]
    fn test_heatmap_defaults_to_numeric_columns() -> Result<()> {
        let chart = build_chart(
            &sample()?,
            &request(ChartKind::Heatmap, None, &[]),
            &ExplorerSettings::default(),
        )?;
        assert_eq!(chart.data[0]["x"], json!(["n", "m"]));
        assert_eq!(chart.data[0]["z"][0][0], json!(1.0));
        Ok(())
    }

    #[test]
    fn test_box_groups_and_figure_json() -> Result<()> {
        let chart = build_chart(
            &sample()?,
            &request(ChartKind::Box, Some("kind"), &["m"]),
            &ExplorerSettings::default(),
        )?;
        assert_eq!(chart.data.len(), 2);
        assert_eq!(chart.data[1]["y"], json!([4.0, 1.0]));

        let figure: Value = serde_json::from_str(&chart.to_json())?;
        assert_eq!(figure["data"][1]["type"], json!("box"));
        assert_eq!(figure["layout"]["title"]["text"], json!("Box plot: m by kind"));
        assert_eq!(figure["layout"]["xaxis"]["title"]["text"], json!("kind"));
        Ok(())
    }

    #[test]
    fn test_html_embeds_plotly() -> Result<()> {
        let mut req = request(ChartKind::Histogram, Some("m"), &[]);
        req.color = Some("kind".to_owned());
        let chart = build_chart(&sample()?, &req, &ExplorerSettings::default())?;
        assert_eq!(chart.layout.bar_layout, Some(BarLayout::Overlay));

        let html = chart.to_html();
        assert!(html.contains("Plotly.newPlot"));
        assert!(!html.contains("<script src="));
        Ok(())
    }
}
