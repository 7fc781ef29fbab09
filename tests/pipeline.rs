//! End-to-end pipeline tests.
//!
//! Every test writes its own workbook with `rust_xlsxwriter` into a
//! `TempDir` and runs the full read → encode → compose pipeline on small
//! pages so the suite stays fast.

use rust_xlsxwriter::Workbook;
use sheet2qr::pipeline::raster::read_dpi;
use sheet2qr::{
    generate, generate_sync, CancelFlag, MemoryLogger, OutputFormat, PageCapacity, PageSettings,
    PipelineConfig, PipelineProgressCallback, Processor, RunRequest, Sheet2QrError, Stage,
};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

// ── Test helpers ─────────────────────────────────────────────────────────────

/// Write `values` into column A below a `Data` header.
fn workbook(dir: &Path, values: &[String]) -> PathBuf {
    let path = dir.join("serials.xlsx");
    let mut wb = Workbook::new();
    let ws = wb.add_worksheet();
    ws.write_string(0, 0, "Data").unwrap();
    for (i, v) in values.iter().enumerate() {
        ws.write_string(i as u32 + 1, 0, v.as_str()).unwrap();
    }
    wb.save(&path).unwrap();
    path
}

fn serials(n: usize) -> Vec<String> {
    (1..=n).map(|i| format!("SN{i:016}")).collect()
}

/// Small untitled pages holding a fixed `rows × cols` grid.
fn small_config(rows: u32, cols: u32) -> PipelineConfig {
    PipelineConfig::builder()
        .title(None::<String>)
        .page(PageSettings {
            width_px: 420,
            height_px: 320,
            margin_px: 10,
            capacity: PageCapacity::Fixed { rows, cols },
        })
        .encode_workers(4)
        .compose_workers(2)
        .build()
        .unwrap()
}

fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.path().is_file())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

// ── Partitioning ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn twenty_three_records_on_pages_of_two_codes() {
    let dir = TempDir::new().unwrap();
    let input = workbook(dir.path(), &serials(23));
    let out_dir = dir.path().join("out");

    let output = generate(&RunRequest::new(&input, &out_dir), small_config(1, 2))
        .await
        .unwrap();

    let codes: Vec<String> = output.codes.iter().map(|c| c.range_label()).collect();
    assert_eq!(codes, vec!["1-10", "11-20", "21-23"]);
    let pages: Vec<String> = output.pages.iter().map(|p| p.range_label()).collect();
    assert_eq!(pages, vec!["1-20", "21-23"]);
    assert_eq!(output.pages[1].codes, 1);

    assert_eq!(file_names(&out_dir), vec!["1-20.png", "21-23.png"]);
    assert_eq!(
        file_names(&out_dir.join("temp_qr")),
        vec!["qr_row_11_20.png", "qr_row_1_10.png", "qr_row_21_23.png"]
    );

    assert_eq!(read_dpi(&out_dir.join("1-20.png")).unwrap(), Some(600));
    assert_eq!(read_dpi(&output.codes[0].path).unwrap(), Some(600));
    assert_eq!(output.stats.records, 23);
    assert_eq!(output.stats.groups, 3);
    assert_eq!(output.stats.pages_planned, 2);
    assert!(output.unit_errors.is_empty());
    assert!(!output.cancelled);
}

#[tokio::test]
async fn fifteen_code_page_holds_everything() {
    let dir = TempDir::new().unwrap();
    let input = workbook(dir.path(), &serials(23));
    let out_dir = dir.path().join("out");

    let output = generate(&RunRequest::new(&input, &out_dir), small_config(5, 3))
        .await
        .unwrap();

    assert_eq!(output.pages.len(), 1);
    assert_eq!(output.pages[0].range_label(), "1-23");
    assert!(out_dir.join("1-23.png").exists());
}

#[tokio::test]
async fn start_row_counts_values_below_header() {
    let dir = TempDir::new().unwrap();
    let input = workbook(dir.path(), &serials(5));
    let out_dir = dir.path().join("out");

    let request = RunRequest::new(&input, &out_dir).start_row(3);
    let output = generate(&request, small_config(2, 2)).await.unwrap();

    assert_eq!(output.records, 3);
    assert_eq!(output.codes.len(), 1);
    assert_eq!(output.codes[0].range_label(), "1-3");
}

#[cfg(feature = "sample")]
#[tokio::test]
async fn default_run_on_sample_workbook_leaves_header_out() {
    use sheet2qr::sample::{write_sample_workbook, SAMPLE_HEADER};

    let dir = TempDir::new().unwrap();
    let input = dir.path().join("sample.xlsx");
    write_sample_workbook(&input, 12, Some(7)).unwrap();
    let out_dir = dir.path().join("out");
    let request = RunRequest::new(&input, &out_dir);

    let processor = Processor::new(small_config(2, 2)).unwrap();
    let records = processor
        .read_records(&input, request.start_row)
        .await
        .unwrap();
    assert_eq!(records.len(), 12);
    assert!(records.iter().all(|r| r.value != SAMPLE_HEADER));

    let output = processor.run(&request, &CancelFlag::new()).await.unwrap();
    processor.shutdown().await;

    assert_eq!(output.records, 12);
    assert_eq!(output.codes[0].range_label(), "1-10");
    assert_eq!(output.codes[1].range_label(), "11-12");
}

#[tokio::test]
async fn rerun_produces_identical_files() {
    let dir = TempDir::new().unwrap();
    let input = workbook(dir.path(), &serials(17));
    let out_dir = dir.path().join("out");
    let request = RunRequest::new(&input, &out_dir);

    let first = generate(&request, small_config(1, 1)).await.unwrap();
    let first_bytes = std::fs::read(&first.pages[1].path).unwrap();
    let second = generate(&request, small_config(1, 1)).await.unwrap();

    assert_eq!(first.pages, second.pages);
    assert_eq!(first.codes, second.codes);
    assert_eq!(std::fs::read(&second.pages[1].path).unwrap(), first_bytes);
    assert_eq!(file_names(&out_dir), vec!["1-10.png", "11-17.png"]);
}

// ── Empty and failing inputs ─────────────────────────────────────────────────

#[tokio::test]
async fn empty_column_is_not_an_error() {
    let dir = TempDir::new().unwrap();
    let input = workbook(dir.path(), &[]);
    let out_dir = dir.path().join("out");
    let log = MemoryLogger::new();

    let processor = Processor::new(small_config(2, 2))
        .unwrap()
        .with_logger(log.clone());
    let output = processor
        .run(&RunRequest::new(&input, &out_dir), &CancelFlag::new())
        .await
        .unwrap();
    processor.shutdown().await;

    assert!(output.is_empty());
    assert!(output.codes.is_empty() && output.pages.is_empty());
    assert!(!out_dir.join("temp_qr").exists());
    assert!(log
        .entries()
        .iter()
        .any(|(_, m)| m.to_lowercase().contains("no data")));
}

#[tokio::test]
async fn unreadable_workbook_is_fatal() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("broken.xlsx");
    std::fs::write(&input, b"not a workbook").unwrap();

    let err = generate(&RunRequest::new(&input, dir.path()), small_config(1, 1))
        .await
        .unwrap_err();

    assert!(matches!(err, Sheet2QrError::SourceRead { .. }), "got {err:?}");
}

#[tokio::test]
async fn oversized_title_is_rejected_before_any_work() {
    let dir = TempDir::new().unwrap();
    let input = workbook(dir.path(), &serials(3));
    let out_dir = dir.path().join("out");
    let mut config = small_config(1, 1);
    config.title = Some("Lot".into());
    config.title_px = 4_294_967_000;

    let err = generate(&RunRequest::new(&input, &out_dir), config)
        .await
        .unwrap_err();

    assert!(matches!(err, Sheet2QrError::InvalidConfig(_)), "got {err:?}");
    assert!(!out_dir.exists());
}

#[tokio::test]
async fn output_dir_blocked_by_file_is_fatal() {
    let dir = TempDir::new().unwrap();
    let input = workbook(dir.path(), &serials(3));
    let blocker = dir.path().join("out");
    std::fs::write(&blocker, b"a file, not a directory").unwrap();

    let err = generate(&RunRequest::new(&input, &blocker), small_config(1, 1))
        .await
        .unwrap_err();

    assert!(matches!(err, Sheet2QrError::OutputDirFailed { .. }), "got {err:?}");
}

// ── Options ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn clean_temp_removes_working_directory() {
    let dir = TempDir::new().unwrap();
    let input = workbook(dir.path(), &serials(12));
    let out_dir = dir.path().join("out");
    let config = PipelineConfig {
        keep_intermediate: false,
        ..small_config(2, 2)
    };

    let output = generate(&RunRequest::new(&input, &out_dir), config).await.unwrap();

    assert_eq!(output.pages.len(), 1);
    assert!(out_dir.join("1-12.png").exists());
    assert!(!out_dir.join("temp_qr").exists());
}

#[tokio::test]
async fn titled_pages_are_composed() {
    let dir = TempDir::new().unwrap();
    let input = workbook(dir.path(), &serials(4));
    let out_dir = dir.path().join("out");
    let config = PipelineConfig::builder()
        .title(Some("Material S/N List"))
        .title_px(30)
        .page(PageSettings {
            width_px: 600,
            height_px: 900,
            margin_px: 20,
            capacity: PageCapacity::Fixed { rows: 1, cols: 2 },
        })
        .build()
        .unwrap();

    let output = generate(&RunRequest::new(&input, &out_dir), config).await.unwrap();

    assert_eq!(output.pages.len(), 1);
    let page = image::open(&output.pages[0].path).unwrap().to_rgb8();
    assert_eq!(page.dimensions(), (600, 900));

    // margin 20, title block 30 + 100 + 250: nothing is drawn between the
    // title line and the grid, and the codes sit below the block.
    let grid_top = 20 + 30 + 100 + 250;
    let is_dark = |x: u32, y: u32| page.get_pixel(x, y)[0] < 128;
    assert!((20 + 100 + 2 * 30..grid_top).all(|y| (0..600).all(|x| !is_dark(x, y))));
    assert!((grid_top..900).any(|y| (0..600).any(|x| is_dark(x, y))));
}

#[cfg(feature = "docx")]
#[tokio::test]
async fn document_format_writes_docx_instead_of_pages() {
    let dir = TempDir::new().unwrap();
    let input = workbook(dir.path(), &serials(23));
    let out_dir = dir.path().join("out");
    let config = PipelineConfig {
        output_format: OutputFormat::Docx,
        ..small_config(1, 2)
    };

    let output = generate(&RunRequest::new(&input, &out_dir), config).await.unwrap();

    assert_eq!(output.format, OutputFormat::Docx);
    assert_eq!(output.document, Some(out_dir.join("code_listing.docx")));
    assert!(output.pages.is_empty());
    assert_eq!(file_names(&out_dir), vec!["code_listing.docx"]);
}

#[cfg(not(feature = "docx"))]
#[tokio::test]
async fn document_format_falls_back_to_pages_without_feature() {
    let dir = TempDir::new().unwrap();
    let input = workbook(dir.path(), &serials(23));
    let out_dir = dir.path().join("out");
    let config = PipelineConfig {
        output_format: OutputFormat::Docx,
        ..small_config(1, 2)
    };
    let log = MemoryLogger::new();

    let processor = Processor::new(config).unwrap().with_logger(log.clone());
    let output = processor
        .run(&RunRequest::new(&input, &out_dir), &CancelFlag::new())
        .await
        .unwrap();
    processor.shutdown().await;

    assert_eq!(output.format, OutputFormat::Image);
    assert_eq!(output.pages.len(), 2);
    assert!(output.document.is_none());
    assert_eq!(log.errors().len(), 1);
}

// ── Cancellation and progress ────────────────────────────────────────────────

#[tokio::test]
async fn cancelled_run_composes_nothing() {
    let dir = TempDir::new().unwrap();
    let input = workbook(dir.path(), &serials(40));
    let out_dir = dir.path().join("out");
    let cancel = CancelFlag::new();
    cancel.cancel();

    let processor = Processor::new(small_config(1, 2)).unwrap();
    let output = processor
        .run(&RunRequest::new(&input, &out_dir), &cancel)
        .await
        .unwrap();
    processor.shutdown().await;

    assert!(output.cancelled);
    assert!(output.codes.is_empty());
    assert!(output.pages.is_empty());
    assert!(file_names(&out_dir).is_empty());
}

#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<(Stage, &'static str, usize)>>,
}

impl PipelineProgressCallback for Recorder {
    fn on_stage_start(&self, stage: Stage, total: usize) {
        self.events.lock().unwrap().push((stage, "start", total));
    }

    fn on_unit_complete(&self, stage: Stage, index: usize, _total: usize) {
        self.events.lock().unwrap().push((stage, "unit", index));
    }

    fn on_stage_complete(&self, stage: Stage, _total: usize, success_count: usize) {
        self.events.lock().unwrap().push((stage, "done", success_count));
    }
}

#[tokio::test]
async fn progress_reports_every_unit() {
    let dir = TempDir::new().unwrap();
    let input = workbook(dir.path(), &serials(23));
    let recorder = Arc::new(Recorder::default());

    let processor = Processor::new(small_config(1, 2))
        .unwrap()
        .with_progress(recorder.clone());
    processor
        .run(&RunRequest::new(&input, dir.path().join("out")), &CancelFlag::new())
        .await
        .unwrap();
    processor.shutdown().await;

    let events = recorder.events.lock().unwrap().clone();
    let count = |stage: Stage, kind: &str| {
        events
            .iter()
            .filter(|(s, k, _)| *s == stage && *k == kind)
            .count()
    };
    assert_eq!(count(Stage::Encode, "unit"), 3);
    assert_eq!(count(Stage::Compose, "unit"), 2);
    assert!(events.contains(&(Stage::Encode, "start", 3)));
    assert!(events.contains(&(Stage::Compose, "done", 2)));
    assert!(events.contains(&(Stage::Read, "done", 23)));
}

#[test]
fn sync_wrapper_runs_pipeline() {
    let dir = TempDir::new().unwrap();
    let input = workbook(dir.path(), &serials(3));
    let out_dir = dir.path().join("out");

    let output = generate_sync(&RunRequest::new(&input, &out_dir), small_config(1, 1)).unwrap();

    assert_eq!(output.pages.len(), 1);
    assert!(out_dir.join("1-3.png").exists());
}
