//! Integration tests for the dispatcher: strategy chains, fallback and
//! input/output file handling.
//!
//! Tests that read PDFs need the native pdfium library. They bind it from
//! `PDFIUM_LIB_PATH` or the system path and print a SKIP line when neither
//! is available.

use async_trait::async_trait;
use fileshift::strategies::docx::{self, DocxBuilder};
use fileshift::strategies::layout::PageLayout;
use fileshift::strategies::{plain_text_pages, run_blocking, LocalRequest, LocalStrategy};
use fileshift::{
    ConversionJob, ConversionObserver, ConversionOutcome, ConverterConfig, Dispatcher,
    RemoteConverter, SourceFile, StrategyError, TargetFormat,
};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

// ── Test helpers ─────────────────────────────────────────────────────────────

const DOCX: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn new() -> Self {
        // Route library logs through the test harness; ignore "already set".
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    fn out_dir(&self) -> PathBuf {
        self.dir.path().join("out")
    }

    fn config(&self) -> ConverterConfig {
        let mut b = ConverterConfig::builder().output_dir(self.out_dir());
        if let Some(lib) = std::env::var_os("PDFIUM_LIB_PATH") {
            b = b.pdfium_lib_path(lib);
        }
        b.build().unwrap()
    }

    fn config_with(&self, observer: Arc<Recorder>) -> ConverterConfig {
        let mut c = self.config();
        c.progress = Some(observer as Arc<dyn ConversionObserver>);
        c
    }

    fn job(
        &self,
        name: &str,
        bytes: &[u8],
        content_type: &str,
        target: TargetFormat,
    ) -> (ConversionJob, PathBuf) {
        let path = self.dir.path().join(name);
        std::fs::write(&path, bytes).unwrap();
        let source = SourceFile::from_path(&path).unwrap();
        let job = ConversionJob::new(source, content_type, target, name);
        (job, path)
    }

    fn outputs(&self) -> Vec<PathBuf> {
        match std::fs::read_dir(self.out_dir()) {
            Ok(rd) => rd.map(|e| e.unwrap().path()).collect(),
            Err(_) => Vec::new(),
        }
    }
}

fn png_bytes(w: u32, h: u32) -> Vec<u8> {
    let img = DynamicImage::ImageRgb8(RgbImage::from_fn(w, h, |x, y| {
        Rgb([(x * 7) as u8, (y * 5) as u8, 128])
    }));
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png).unwrap();
    buf
}

fn docx_bytes(lines: &[&str]) -> Vec<u8> {
    let mut b = DocxBuilder::new();
    b.lines(lines.iter().map(|s| s.to_string()).collect());
    b.build().unwrap()
}

const ZERO_PAGE_PDF: &[u8] = b"%PDF-1.4\n\
1 0 obj\n<< /Type /Catalog /Pages 2 0 R >>\nendobj\n\
2 0 obj\n<< /Type /Pages /Kids [] /Count 0 >>\nendobj\n\
trailer\n<< /Root 1 0 R >>\n%%EOF\n";

fn assert_unambiguous(o: &ConversionOutcome) {
    assert_ne!(o.filename.is_some(), o.error.is_some(), "ambiguous outcome: {o:?}");
    assert_eq!(o.success, o.filename.is_some());
    if let Some(e) = &o.error {
        assert!(!e.trim().is_empty());
    }
}

fn pdfium_available() -> bool {
    let lib = std::env::var_os("PDFIUM_LIB_PATH").map(PathBuf::from);
    fileshift::strategies::pdf::bind(lib.as_deref()).is_ok()
}

macro_rules! skip_unless_pdfium {
    () => {
        if !pdfium_available() {
            println!("SKIP — pdfium library not available (set PDFIUM_LIB_PATH)");
            return;
        }
    };
}

/// Records observer events as `event:strategy` strings.
#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<String>>,
}

impl Recorder {
    fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

impl ConversionObserver for Recorder {
    fn on_strategy_start(&self, _filename: &str, strategy: &str) {
        self.events.lock().unwrap().push(format!("start:{strategy}"));
    }
    fn on_strategy_skipped(&self, _filename: &str, strategy: &str) {
        self.events.lock().unwrap().push(format!("skip:{strategy}"));
    }
    fn on_strategy_failed(&self, _filename: &str, strategy: &str, _error: &str) {
        self.events.lock().unwrap().push(format!("fail:{strategy}"));
    }
    fn on_job_complete(&self, _filename: &str, outcome: &ConversionOutcome) {
        self.events
            .lock()
            .unwrap()
            .push(format!("done:{}", outcome.success));
    }
}

/// A configured remote service with a scripted answer.
struct FakeRemote {
    calls: AtomicUsize,
    answer: Result<Vec<u8>, StrategyError>,
}

impl FakeRemote {
    fn failing() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            answer: Err(StrategyError::RemoteJob("conversion task failed".into())),
        })
    }

    fn returning(bytes: &[u8]) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            answer: Ok(bytes.to_vec()),
        })
    }
}

#[async_trait]
impl RemoteConverter for FakeRemote {
    fn is_configured(&self) -> bool {
        true
    }

    async fn convert(
        &self,
        input: &Path,
        _source: &str,
        _target: &str,
    ) -> Result<Vec<u8>, StrategyError> {
        assert!(input.exists(), "remote must see the input file");
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.answer.clone()
    }
}

// ── Scenarios ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn png_to_jpg_recodes() {
    let ws = Workspace::new();
    let dispatcher = Dispatcher::new(ws.config()).unwrap();
    let (job, input) = ws.job("photo.png", &png_bytes(64, 48), "image/png", TargetFormat::Jpg);

    let outcome = dispatcher.dispatch(job).await;
    assert_unambiguous(&outcome);
    assert!(outcome.success, "{:?}", outcome.error);
    assert_eq!(outcome.original_format.as_deref(), Some("PNG"));
    assert_eq!(outcome.target_format.as_deref(), Some("JPG"));

    let out = outcome.output_path.unwrap();
    assert_eq!(out.extension().unwrap(), "jpg");
    assert!(out.file_name().unwrap().to_string_lossy().starts_with("photo-"));
    let bytes = std::fs::read(&out).unwrap();
    assert_eq!(image::guess_format(&bytes).unwrap(), ImageFormat::Jpeg);
    let decoded = image::load_from_memory(&bytes).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (64, 48));
    assert!(!input.exists());
}

#[tokio::test]
async fn text_to_pdf_lays_out_lines() {
    let ws = Workspace::new();
    let dispatcher = Dispatcher::new(ws.config()).unwrap();
    let (job, input) = ws.job("hello.txt", b"Hello\nWorld", "text/plain", TargetFormat::Pdf);

    let outcome = dispatcher.dispatch(job).await;
    assert!(outcome.success, "{:?}", outcome.error);
    let pdf = std::fs::read(outcome.output_path.unwrap()).unwrap();
    assert!(pdf.starts_with(b"%PDF"));
    assert!(!input.exists());

    let layout = PageLayout::plain_text();
    assert_eq!(
        plain_text_pages(b"Hello\nWorld", &layout),
        vec![vec!["Hello", "World"]]
    );
    let (x0, y0) = layout.line_origin(0);
    let (x1, y1) = layout.line_origin(1);
    assert_eq!(x0, x1);
    assert!((y0 - y1 - layout.line_height).abs() < 1e-3);

    if pdfium_available() {
        let lib = std::env::var_os("PDFIUM_LIB_PATH").map(PathBuf::from);
        let text = fileshift::strategies::pdf::extract_text(&pdf, lib.as_deref()).unwrap();
        let lines: Vec<&str> = text.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
        assert_eq!(lines, vec!["Hello", "World"], "got: {text:?}");
    }
}

#[tokio::test]
async fn zero_page_pdf_to_word_fails_cleanly() {
    let ws = Workspace::new();
    let dispatcher = Dispatcher::new(ws.config()).unwrap();
    let (job, input) = ws.job("empty.pdf", ZERO_PAGE_PDF, "application/pdf", TargetFormat::Word);

    let outcome = dispatcher.dispatch(job).await;
    assert_unambiguous(&outcome);
    assert!(!outcome.success);
    assert!(!input.exists());
    assert!(ws.outputs().is_empty(), "no partial output may remain");

    if pdfium_available() {
        let err = outcome.error.unwrap().to_lowercase();
        assert!(
            err.contains("no pages") || err.contains("corrupted"),
            "unexpected error: {err}"
        );
    }
}

#[tokio::test]
async fn unknown_kind_is_unsupported() {
    let ws = Workspace::new();
    let recorder = Arc::new(Recorder::default());
    let dispatcher = Dispatcher::new(ws.config_with(recorder.clone())).unwrap();
    let (job, input) = ws.job("song.mp3", b"ID3\x03\x00", "audio/mpeg", TargetFormat::Png);

    let outcome = dispatcher.dispatch(job).await;
    assert!(!outcome.success);
    assert!(outcome.error.as_deref().unwrap().contains("audio"));
    assert!(!input.exists());
    // Rejected before any strategy runs.
    assert_eq!(recorder.events(), vec!["done:false".to_string()]);
}

#[tokio::test]
async fn legacy_doc_without_remote_explains_why() {
    let ws = Workspace::new();
    let recorder = Arc::new(Recorder::default());
    let dispatcher = Dispatcher::new(ws.config_with(recorder.clone())).unwrap();
    let ole = [0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1, 0, 0, 0, 0];
    let (job, input) = ws.job("old.doc", &ole, "application/msword", TargetFormat::Pdf);

    let outcome = dispatcher.dispatch(job).await;
    assert!(!outcome.success);
    assert_eq!(outcome.original_format.as_deref(), Some("DOC"));
    let err = outcome.error.unwrap();
    assert!(err.to_lowercase().contains("legacy .doc"), "got: {err}");
    assert!(!input.exists());

    // The unconfigured remote was skipped, not counted as a failure.
    assert_eq!(
        recorder.events(),
        vec![
            "skip:remote".to_string(),
            "start:word-text-to-pdf".to_string(),
            "fail:word-text-to-pdf".to_string(),
            "done:false".to_string(),
        ]
    );
}

// ── Chain behaviour ──────────────────────────────────────────────────────────

#[tokio::test]
async fn failing_remote_falls_back_to_local() {
    let ws = Workspace::new();
    let recorder = Arc::new(Recorder::default());
    let remote = FakeRemote::failing();
    let dispatcher = Dispatcher::new(ws.config_with(recorder.clone()))
        .unwrap()
        .with_remote(remote.clone());
    let (job, input) = ws.job(
        "memo.docx",
        &docx_bytes(&["Quarterly memo", "Second paragraph"]),
        DOCX,
        TargetFormat::Pdf,
    );

    let outcome = dispatcher.dispatch(job).await;
    assert!(outcome.success, "{:?}", outcome.error);
    assert_eq!(remote.calls.load(Ordering::SeqCst), 1);
    assert_eq!(
        recorder.events(),
        vec![
            "start:remote".to_string(),
            "fail:remote".to_string(),
            "start:word-text-to-pdf".to_string(),
            "done:true".to_string(),
        ]
    );
    assert!(std::fs::read(outcome.output_path.unwrap()).unwrap().starts_with(b"%PDF"));
    assert!(!input.exists());
}

#[tokio::test]
async fn successful_remote_wins() {
    let ws = Workspace::new();
    let remote = FakeRemote::returning(b"%PDF-from-remote");
    let dispatcher = Dispatcher::new(ws.config()).unwrap().with_remote(remote.clone());
    let (job, _) = ws.job("pic.png", &png_bytes(4, 4), "image/png", TargetFormat::Pdf);

    let outcome = dispatcher.dispatch(job).await;
    assert!(outcome.success);
    assert_eq!(std::fs::read(outcome.output_path.unwrap()).unwrap(), b"%PDF-from-remote");
    assert_eq!(remote.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn remote_is_never_used_for_local_only_rows() {
    let ws = Workspace::new();
    let remote = FakeRemote::failing();
    let dispatcher = Dispatcher::new(ws.config()).unwrap().with_remote(remote.clone());
    let (job, _) = ws.job("a.png", &png_bytes(4, 4), "image/png", TargetFormat::Webp);

    let outcome = dispatcher.dispatch(job).await;
    assert!(outcome.success, "{:?}", outcome.error);
    assert_eq!(remote.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn last_failure_is_surfaced() {
    let ws = Workspace::new();
    let remote = FakeRemote::failing();
    let dispatcher = Dispatcher::new(ws.config()).unwrap().with_remote(remote);
    let (job, _) = ws.job("broken.png", b"not really a png", "image/png", TargetFormat::Pdf);

    let outcome = dispatcher.dispatch(job).await;
    let err = outcome.error.unwrap();
    assert!(!err.contains("conversion task failed"), "remote error leaked: {err}");
    assert!(err.contains("decoded"), "got: {err}");
}

#[tokio::test]
async fn passthrough_is_byte_identical() {
    let ws = Workspace::new();
    let dispatcher = Dispatcher::new(ws.config()).unwrap();
    let original = "plain text\r\nwith \u{2014} unicode\n".as_bytes().to_vec();
    let content_type = "text/plain; charset=utf-8";
    let (job, input) = ws.job("notes.txt", &original, content_type, TargetFormat::Txt);

    let outcome = dispatcher.dispatch(job).await;
    let out = outcome.output_path.unwrap();
    assert_eq!(std::fs::read(out).unwrap(), original);
    assert!(!input.exists());

    let docx = docx_bytes(&["keep me"]);
    let (job, _) = ws.job("keep.docx", &docx, DOCX, TargetFormat::Word);
    let outcome = dispatcher.dispatch(job).await;
    let out = outcome.output_path.unwrap();
    assert_eq!(out.extension().unwrap(), "docx");
    assert_eq!(std::fs::read(out).unwrap(), docx);
}

#[tokio::test]
async fn invalid_target_still_removes_input() {
    let ws = Workspace::new();
    let dispatcher = Dispatcher::new(ws.config()).unwrap();
    let path = ws.dir.path().join("a.txt");
    std::fs::write(&path, "x").unwrap();

    let outcome = dispatcher
        .dispatch_request(SourceFile::from_path(&path).unwrap(), "text/plain", "gif", "a.txt")
        .await;
    assert!(!outcome.success);
    let err = outcome.error.unwrap();
    assert!(err.contains("'gif'"), "got: {err}");
    assert!(err.contains("PNG, JPG, WEBP, TIFF, PDF, TXT, WORD"), "got: {err}");
    assert!(!path.exists());

    std::fs::write(&path, "x").unwrap();
    let outcome = dispatcher
        .dispatch_request(SourceFile::from_path(&path).unwrap(), "text/plain", "pdf", "a.txt")
        .await;
    assert!(outcome.success);
}

#[tokio::test]
async fn every_pair_has_an_unambiguous_outcome() {
    let ws = Workspace::new();
    let dispatcher = Dispatcher::new(ws.config()).unwrap();
    let samples: Vec<(&str, &str, Vec<u8>)> = vec![
        ("img.png", "image/png", png_bytes(8, 8)),
        ("doc.pdf", "application/pdf", ZERO_PAGE_PDF.to_vec()),
        ("t.txt", "text/plain", b"some text".to_vec()),
        ("w.docx", DOCX, docx_bytes(&["word"])),
        ("x.bin", "application/octet-stream", vec![1, 2, 3]),
        ("y.bin", "", vec![1, 2, 3]),
    ];

    for (name, ct, bytes) in &samples {
        for target in TargetFormat::ALL {
            let (job, input) = ws.job(name, bytes, ct, target);
            let outcome = dispatcher.dispatch(job).await;
            assert_unambiguous(&outcome);
            assert!(!input.exists(), "{name} → {target}: input left behind");
        }
    }
}

// ── pdfium-backed strategies ─────────────────────────────────────────────────

async fn text_pdf(ws: &Workspace, dispatcher: &Dispatcher, text: &str) -> Vec<u8> {
    let (job, _) = ws.job("source.txt", text.as_bytes(), "text/plain", TargetFormat::Pdf);
    let outcome = dispatcher.dispatch(job).await;
    std::fs::read(outcome.output_path.unwrap()).unwrap()
}

#[tokio::test]
async fn pdf_to_txt_extracts_text() {
    skip_unless_pdfium!();
    let ws = Workspace::new();
    let dispatcher = Dispatcher::new(ws.config()).unwrap();
    let pdf = text_pdf(&ws, &dispatcher, "Hello\nWorld").await;

    let (job, _) = ws.job("hello.pdf", &pdf, "application/pdf", TargetFormat::Txt);
    let outcome = dispatcher.dispatch(job).await;
    assert!(outcome.success, "{:?}", outcome.error);
    let text = std::fs::read_to_string(outcome.output_path.unwrap()).unwrap();
    assert!(text.contains("Hello"), "got: {text:?}");
    assert!(text.contains("World"), "got: {text:?}");
}

#[tokio::test]
async fn pdf_to_png_renders_first_page_within_bounds() {
    skip_unless_pdfium!();
    let ws = Workspace::new();
    let dispatcher = Dispatcher::new(ws.config()).unwrap();
    let pdf = text_pdf(&ws, &dispatcher, &"line\n".repeat(200)).await;

    let (job, _) = ws.job("long.pdf", &pdf, "application/pdf", TargetFormat::Png);
    let outcome = dispatcher.dispatch(job).await;
    assert!(outcome.success, "{:?}", outcome.error);
    let img = image::open(outcome.output_path.unwrap()).unwrap();
    assert!(img.width() <= 1200 && img.height() <= 1600);
    assert!(img.width() > 0 && img.height() > 0);
}

#[tokio::test]
async fn pdf_to_word_snapshots_pages() {
    skip_unless_pdfium!();
    let ws = Workspace::new();
    let recorder = Arc::new(Recorder::default());
    let dispatcher = Dispatcher::new(ws.config_with(recorder.clone())).unwrap();
    let pdf = text_pdf(&ws, &dispatcher, &"row\n".repeat(60)).await;

    let (job, _) = ws.job("two.pdf", &pdf, "application/pdf", TargetFormat::Word);
    let outcome = dispatcher.dispatch(job).await;
    assert!(outcome.success, "{:?}", outcome.error);

    let bytes = std::fs::read(outcome.output_path.unwrap()).unwrap();
    let mut zip = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
    assert!(zip.by_name("word/media/image1.png").is_ok());
    assert!(zip.by_name("word/media/image2.png").is_ok());
    assert!(recorder.events().contains(&"start:pdf-snapshot-to-word".to_string()));
}

#[tokio::test]
async fn pdf_text_fallback_keeps_lines_in_courier() {
    skip_unless_pdfium!();
    let ws = Workspace::new();
    let dispatcher = Dispatcher::new(ws.config()).unwrap();
    let pdf = text_pdf(&ws, &dispatcher, "Hello\nWorld").await;

    let req = LocalRequest::new(dispatcher.config(), TargetFormat::Word, "hello", false);
    let word = run_blocking(LocalStrategy::PdfTextToWord, &pdf, &req).unwrap();

    let text = docx::extract_raw_text(&word).unwrap();
    let lines: Vec<&str> = text.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
    assert_eq!(lines, vec!["Hello", "World"], "got: {text:?}");

    let mut zip = zip::ZipArchive::new(Cursor::new(word)).unwrap();
    let mut xml = String::new();
    std::io::Read::read_to_string(&mut zip.by_name("word/document.xml").unwrap(), &mut xml)
        .unwrap();
    assert!(xml.contains(r#"w:ascii="Courier New""#));
}
