//! End-to-end session tests on fixture files
//!
//! Each test uploads a file from `testdata/` into a fresh session and drives
//! it the way the command-line shell does.

use anyhow::Result;
use std::path::Path;
use tablescope::config::ExplorerSettings;
use tablescope::explorer::chart::{ChartKind, ChartRequest, build_chart};
use tablescope::explorer::correlation::{CorrelationMethod, correlation_matrix, strongest_pairs};
use tablescope::explorer::filter::{CategoryFilter, apply_filters, paginate};
use tablescope::explorer::oplog::OperationStatus;
use tablescope::explorer::stats::{describe, missing_report, overview};
use tablescope::explorer::transforms::{
    DropDuplicatesTransform, FillMethod, FillMissingTransform, OneHotTransform, RowAction,
    SelectRowsTransform, TransformPipeline,
};
use tablescope::explorer::{Session, UploadOutcome};

fn open(file: &str) -> Result<Session> {
    let path = Path::new("testdata").join(file);
    let mut session = Session::new(ExplorerSettings::default());
    session.upload(file, &std::fs::read(path)?)?;
    Ok(session)
}

fn names(v: &[&str]) -> Vec<String> {
    v.iter().map(|s| (*s).to_owned()).collect()
}

#[test]
fn test_fill_dedup_one_hot_walkthrough() -> Result<()> {
    let mut session = open("scenario.csv")?;

    let classes = session.classification()?;
    assert!(classes.is_numeric("A"));
    assert!(classes.is_categorical("B"));

    session.apply(&FillMissingTransform::new("A".to_owned(), FillMethod::Mean))?;
    let a = session.current()?.numeric_values("A")?;
    assert_eq!(a[0], Some(1.0));
    assert_eq!(a[1], Some(2.0));
    assert!((a[2].unwrap_or_default() - 7.0 / 3.0).abs() < 1e-9);
    assert_eq!(a[3], Some(4.0));

    let dedup = session.apply(&DropDuplicatesTransform::default())?;
    assert_eq!(dedup.after.height(), 4, "no full-row duplicates");

    let encoded = session.apply(&OneHotTransform::new(names(&["B"])))?;
    let table = &encoded.after;
    assert!(!table.has_column("B"));
    assert_eq!(table.height(), 4);
    assert_eq!(
        table.numeric_values("B_x")?,
        vec![Some(1.0), Some(0.0), Some(1.0), Some(0.0)]
    );
    assert_eq!(
        table.numeric_values("B_y")?,
        vec![Some(0.0), Some(1.0), Some(0.0), Some(1.0)]
    );
    assert_eq!(encoded.comparison.columns_delta(), 1);
    Ok(())
}

#[test]
fn test_upload_reports_conversions_and_missing_tokens() -> Result<()> {
    let mut session = Session::new(ExplorerSettings::default());
    let bytes = std::fs::read("testdata/people.csv")?;
    let outcome = session.upload("people.csv", &bytes)?;
    match outcome {
        UploadOutcome::Loaded {
            rows,
            columns,
            converted,
        } => {
            assert_eq!((rows, columns), (10, 6));
            assert_eq!(converted, names(&["id", "age", "salary", "score"]));
        }
        UploadOutcome::Unchanged => panic!("first upload must load"),
    }

    let current = session.current()?;
    let summary = overview(current)?;
    assert_eq!(summary.missing_cells, 5);
    assert_eq!(summary.duplicate_rows, 1);

    let report = missing_report(current, 20)?;
    assert_eq!(report.rows_with_missing, vec![1, 2, 3, 7, 9]);
    let age = report.columns.iter().find(|c| c.column == "age");
    assert_eq!(age.map(|c| c.rows.clone()), Some(vec![1, 7]));
    Ok(())
}

#[test]
fn test_describe_people() -> Result<()> {
    let session = open("people.csv")?;
    let description = describe(session.current()?, &session.settings().classifier)?;

    assert_eq!(description.classification.categorical(), names(&["name", "city"]));
    let age = description
        .numeric
        .iter()
        .find(|s| s.column == "age")
        .ok_or_else(|| anyhow::anyhow!("age summary missing"))?;
    assert_eq!(age.count, 8);
    assert!((age.min - 29.0).abs() < f64::EPSILON);
    assert!((age.max - 45.0).abs() < f64::EPSILON);
    assert!((age.mode - 29.0).abs() < f64::EPSILON);

    let city = description
        .categorical
        .iter()
        .find(|s| s.column == "city")
        .ok_or_else(|| anyhow::anyhow!("city summary missing"))?;
    assert_eq!(city.unique, 3);
    assert_eq!(city.most_frequent, "Oslo");
    assert_eq!(city.frequency, 4);
    Ok(())
}

#[test]
fn test_pipeline_file_then_reset() -> Result<()> {
    let mut session = open("people.csv")?;
    let json = std::fs::read_to_string("testdata/cleanup_pipeline.json")?;
    let run = session.apply_pipeline(&TransformPipeline::from_json(&json)?)?;

    assert!(run.is_complete());
    assert_eq!(run.applied.len(), 4);
    let current = session.current()?;
    assert_eq!(current.row_ids(), &[0, 4, 6, 8]);
    assert_eq!(
        current.numeric_values("city")?,
        vec![Some(0.0), Some(1.0), Some(0.0), Some(1.0)]
    );
    let encoding = &run.applied[3].encodings[0];
    assert_eq!(encoding.classes, names(&["Oslo", "Rome"]));

    let comparison = session.compare_with_original()?;
    assert_eq!(comparison.rows_delta(), -6);
    assert_eq!(comparison.missing_delta(), -5);

    session.reset()?;
    let restored = session.current()?;
    assert_eq!(restored.height(), 10);
    assert_eq!(restored.row_ids(), (0..10).collect::<Vec<_>>().as_slice());
    assert!(session.original().is_some_and(|o| o.same_content(restored)));
    Ok(())
}

#[test]
fn test_drop_rows_removes_exactly_the_selection() -> Result<()> {
    let mut session = open("people.csv")?;
    let applied = session.apply(&SelectRowsTransform::new("1,3-4", RowAction::Drop))?;
    assert_eq!(applied.after.height(), 7);
    assert_eq!(applied.after.row_ids(), &[0, 2, 5, 6, 7, 8, 9]);
    Ok(())
}

#[test]
fn test_rejected_operations_leave_table_alone() -> Result<()> {
    let mut session = open("people.csv")?;
    let before = session.current()?.clone();

    let err = session
        .apply(&SelectRowsTransform::new("1,a", RowAction::Keep))
        .unwrap_err();
    assert!(err.is_operation());
    let err = session
        .apply(&FillMissingTransform::new("nope".to_owned(), FillMethod::Median))
        .unwrap_err();
    assert!(err.is_operation());

    assert!(session.current()?.same_content(&before));
    let rejected = session
        .log()
        .entries()
        .iter()
        .filter(|e| e.status == OperationStatus::Rejected)
        .count();
    assert_eq!(rejected, 2);
    Ok(())
}

#[test]
fn test_empty_upload_is_a_parse_error() -> Result<()> {
    let mut session = Session::new(ExplorerSettings::default());
    let err = session.upload("empty.csv", b"  \n").unwrap_err();
    assert!(err.is_parse());
    assert!(!session.has_dataset());
    Ok(())
}

#[test]
fn test_correlation_on_people() -> Result<()> {
    let session = open("people.csv")?;
    let columns = names(&["age", "salary", "score"]);
    for method in [CorrelationMethod::Pearson, CorrelationMethod::Spearman] {
        let matrix = correlation_matrix(session.current()?, &columns, method)?;
        for i in 0..3 {
            assert!((matrix.data[i][i] - 1.0).abs() < f64::EPSILON);
            for j in 0..3 {
                assert!((matrix.data[i][j] - matrix.data[j][i]).abs() < 1e-12);
            }
        }
        let pairs = strongest_pairs(&matrix, 10);
        assert_eq!(pairs.len(), 3);
        assert!(pairs[0].coefficient.abs() >= pairs[2].coefficient.abs());
    }
    Ok(())
}

#[test]
fn test_filtered_pages_do_not_touch_session() -> Result<()> {
    let session = open("people.csv")?;
    let filters = vec![CategoryFilter::parse("city=Oslo")?];
    let view = apply_filters(session.current()?, &filters)?;
    assert_eq!(view.row_ids(), &[0, 2, 6, 9]);

    let page = paginate(&view, 2, 3)?;
    assert_eq!(page.rows.row_ids(), &[9]);
    assert_eq!(page.range_label(), "rows 4-4 of 4");
    assert_eq!(session.current()?.height(), 10);
    Ok(())
}

#[test]
fn test_bar_chart_html_export() -> Result<()> {
    let session = open("people.csv")?;
    let mut request = ChartRequest::new(ChartKind::Bar);
    request.x = Some("city".to_owned());
    request.y = names(&["salary"]);
    let chart = build_chart(session.current()?, &request, session.settings())?;
    assert_eq!(chart.data.len(), 1);

    let html = chart.to_html();
    assert!(html.contains("<html"));
    assert!(html.contains("Oslo"));
    assert!(!html.contains("<script src="), "plotly.js is inlined");

    request.x = Some("salary".to_owned());
    assert!(build_chart(session.current()?, &request, session.settings()).is_err());
    Ok(())
}
