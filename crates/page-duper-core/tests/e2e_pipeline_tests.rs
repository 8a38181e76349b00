use std::fs;
use std::path::{Path, PathBuf};
use tempfile::{tempdir, TempDir};

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use page_duper_core::config::{ClusterMode, ConcurrencyMode};
use page_duper_core::raster::{PageImage, RasterizationError, Rasterizer};
use page_duper_core::storage::Database;
use page_duper_core::{AppConfig, DedupeEngine, Error, SilentReporter};

/// Write a PDF with one text line per page. Resources and MediaBox live on
/// the page tree root and are inherited by every page.
fn write_pdf(path: &Path, pages: &[&str]) {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids = Vec::new();
    for text in pages {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 24.into()]),
                Operation::new("Td", vec![72.into(), 720.into()]),
                Operation::new("Tj", vec![Object::string_literal(*text)]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(Object::Reference(page_id));
    }

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Count" => kids.len() as i64,
            "Kids" => kids,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.save(path).unwrap();
}

/// Stands in for a real renderer: each page's content stream seeds a
/// deterministic noise image, so identical pages render identically and
/// different pages share nothing.
struct ContentRasterizer;

fn render(content: &[u8]) -> Vec<u8> {
    let mut state = content.iter().fold(0xcbf29ce484222325u64, |h, b| {
        (h ^ *b as u64).wrapping_mul(0x100000001b3)
    }) | 1;
    (0..8192)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            (state >> 24) as u8
        })
        .collect()
}

impl Rasterizer for ContentRasterizer {
    fn rasterize(&self, pdf_path: &Path) -> Result<Vec<PageImage>, RasterizationError> {
        let unreadable = |e: lopdf::Error| RasterizationError::Unreadable {
            path: pdf_path.to_path_buf(),
            reason: e.to_string(),
        };
        let doc = Document::load(pdf_path).map_err(unreadable)?;
        doc.get_pages()
            .into_iter()
            .map(|(page_number, page_id)| {
                let content = doc.get_page_content(page_id).map_err(unreadable)?;
                Ok(PageImage {
                    page_number,
                    bytes: render(&content),
                })
            })
            .collect()
    }
}

struct Workspace {
    _dir: TempDir,
    input: PathBuf,
    output: PathBuf,
    config: AppConfig,
}

fn workspace(threshold: u32, concurrency: ConcurrencyMode) -> Workspace {
    let dir = tempdir().unwrap();
    let input = dir.path().join("pdfs");
    let output = dir.path().join("clusters");
    fs::create_dir_all(&input).unwrap();
    let config = AppConfig {
        input_dir: input.to_string_lossy().into_owned(),
        output_dir: output.to_string_lossy().into_owned(),
        db_path: dir.path().join("pages.db").to_string_lossy().into_owned(),
        threshold,
        jobs: 2,
        concurrency,
        cluster_mode: ClusterMode::Transitive,
        ..AppConfig::default()
    };
    Workspace {
        _dir: dir,
        input,
        output,
        config,
    }
}

fn engine(ws: &Workspace) -> DedupeEngine {
    DedupeEngine::new(ws.config.clone()).with_rasterizer(Box::new(ContentRasterizer))
}

/// Layout:
///   pdfs/
///     a.pdf  alpha one | shared page | alpha three
///     b.pdf  beta one | beta two
///     nested/c.pdf  gamma one | shared page
fn create_corpus(input: &Path) {
    write_pdf(
        &input.join("a.pdf"),
        &["alpha one", "shared page", "alpha three"],
    );
    write_pdf(&input.join("b.pdf"), &["beta one", "beta two"]);
    fs::create_dir_all(input.join("nested")).unwrap();
    write_pdf(&input.join("nested").join("c.pdf"), &["gamma one", "shared page"]);
}

fn output_files(dir: &Path) -> Vec<PathBuf> {
    match fs::read_dir(dir) {
        Ok(entries) => entries.flatten().map(|e| e.path()).collect(),
        Err(_) => Vec::new(),
    }
}

#[test]
fn test_full_pipeline_exports_shared_page() {
    let ws = workspace(95, ConcurrencyMode::Parallel);
    create_corpus(&ws.input);

    let result = engine(&ws).run(&SilentReporter).unwrap();

    assert_eq!(result.hashing.documents_found, 3);
    assert_eq!(result.hashing.documents_hashed, 3);
    assert_eq!(result.hashing.documents_failed, 0);
    assert_eq!(result.hashing.pages_stored, 7);
    assert_eq!(result.clustering.distinct_hashes, 6);
    assert_eq!(result.clustering.clusters, 1);
    assert_eq!(result.clustering.export.files_written, 1);
    assert_eq!(result.clustering.export.pages_written, 2);

    let files = output_files(&ws.output);
    assert_eq!(files.len(), 1);
    let exported = Document::load(&files[0]).unwrap();
    assert_eq!(exported.get_pages().len(), 2);
}

#[test]
fn test_page_records_match_document() {
    let ws = workspace(95, ConcurrencyMode::Sequential);
    create_corpus(&ws.input);
    engine(&ws).hash_documents(&SilentReporter).unwrap();

    let db = Database::open(&ws.config.db_path).unwrap();
    let a = ws.input.join("a.pdf");
    let records = db.records_for_document(&a.to_string_lossy()).unwrap();

    let numbers: Vec<u32> = records.iter().map(|r| r.page_number).collect();
    assert_eq!(numbers, vec![1, 2, 3]);
    let checksum = page_duper_core::hasher::document_checksum(&a).unwrap();
    assert!(records.iter().all(|r| r.document_checksum == checksum));
    assert_eq!(db.hashed_document(&a.to_string_lossy()).unwrap().unwrap().page_count, 3);
}

#[test]
fn test_sequential_and_parallel_store_the_same_pages() {
    let sequential = workspace(95, ConcurrencyMode::Sequential);
    let parallel = workspace(95, ConcurrencyMode::Parallel);
    create_corpus(&sequential.input);
    create_corpus(&parallel.input);

    let s = engine(&sequential).hash_documents(&SilentReporter).unwrap();
    let p = engine(&parallel).hash_documents(&SilentReporter).unwrap();
    assert_eq!(s.pages_stored, p.pages_stored);

    let mut s_hashes = Database::open(&sequential.config.db_path)
        .unwrap()
        .distinct_hashes()
        .unwrap();
    let mut p_hashes = Database::open(&parallel.config.db_path)
        .unwrap()
        .distinct_hashes()
        .unwrap();
    s_hashes.sort();
    p_hashes.sort();
    assert_eq!(s_hashes, p_hashes);
}

#[test]
fn test_rerun_adds_no_rows() {
    let ws = workspace(95, ConcurrencyMode::Parallel);
    create_corpus(&ws.input);
    let engine = engine(&ws);

    engine.hash_documents(&SilentReporter).unwrap();
    let before = Database::open(&ws.config.db_path).unwrap().page_count().unwrap();

    let second = engine.hash_documents(&SilentReporter).unwrap();
    assert_eq!(second.documents_skipped, 3);
    assert_eq!(second.pages_stored, 0);
    let after = Database::open(&ws.config.db_path).unwrap().page_count().unwrap();
    assert_eq!(before, after);
}

#[test]
fn test_changed_document_is_rehashed() {
    let ws = workspace(95, ConcurrencyMode::Sequential);
    create_corpus(&ws.input);
    let engine = engine(&ws);
    engine.hash_documents(&SilentReporter).unwrap();

    write_pdf(&ws.input.join("b.pdf"), &["beta rewritten"]);
    let summary = engine.hash_documents(&SilentReporter).unwrap();
    assert_eq!(summary.documents_hashed, 1);
    assert_eq!(summary.documents_skipped, 2);

    let db = Database::open(&ws.config.db_path).unwrap();
    let b = ws.input.join("b.pdf");
    assert_eq!(db.records_for_document(&b.to_string_lossy()).unwrap().len(), 1);
    assert_eq!(db.page_count().unwrap(), 6);
}

#[test]
fn test_unreadable_document_does_not_abort() {
    let ws = workspace(95, ConcurrencyMode::Parallel);
    create_corpus(&ws.input);
    fs::write(ws.input.join("broken.pdf"), b"not a pdf at all").unwrap();

    let result = engine(&ws).run(&SilentReporter).unwrap();
    assert_eq!(result.hashing.documents_found, 4);
    assert_eq!(result.hashing.documents_hashed, 3);
    assert_eq!(result.hashing.documents_failed, 1);
    assert_eq!(result.clustering.export.files_written, 1);

    let db = Database::open(&ws.config.db_path).unwrap();
    let broken = ws.input.join("broken.pdf");
    assert!(db.hashed_document(&broken.to_string_lossy()).unwrap().is_none());
}

#[test]
fn test_identical_pages_threshold_boundary() {
    let at_max = workspace(100, ConcurrencyMode::Sequential);
    write_pdf(&at_max.input.join("x.pdf"), &["same"]);
    write_pdf(&at_max.input.join("y.pdf"), &["same"]);
    let result = engine(&at_max).run(&SilentReporter).unwrap();
    assert_eq!(result.clustering.clusters, 1);
    assert_eq!(result.clustering.export.pages_written, 2);

    let above_max = workspace(101, ConcurrencyMode::Sequential);
    write_pdf(&above_max.input.join("x.pdf"), &["same"]);
    write_pdf(&above_max.input.join("y.pdf"), &["same"]);
    let result = engine(&above_max).run(&SilentReporter).unwrap();
    assert_eq!(result.clustering.clusters, 0);
    assert!(output_files(&above_max.output).is_empty());
}

#[test]
fn test_no_pdfs_returns_early() {
    let ws = workspace(95, ConcurrencyMode::Parallel);
    fs::write(ws.input.join("notes.txt"), "not a pdf").unwrap();

    let result = engine(&ws).run(&SilentReporter).unwrap();
    assert_eq!(result.hashing.documents_found, 0);
    assert_eq!(result.clustering.clusters, 0);
    assert!(output_files(&ws.output).is_empty());
}

#[test]
fn test_missing_input_dir_is_reported() {
    let ws = workspace(95, ConcurrencyMode::Parallel);
    let config = AppConfig {
        input_dir: ws.input.join("missing").to_string_lossy().into_owned(),
        ..ws.config.clone()
    };
    let err = DedupeEngine::new(config)
        .with_rasterizer(Box::new(ContentRasterizer))
        .run(&SilentReporter)
        .unwrap_err();
    assert!(matches!(err, Error::InvalidConfig(_)));
}

#[test]
fn test_cluster_only_uses_existing_store() {
    let ws = workspace(95, ConcurrencyMode::Parallel);
    create_corpus(&ws.input);
    let engine = engine(&ws);
    engine.hash_documents(&SilentReporter).unwrap();
    assert!(output_files(&ws.output).is_empty());

    let summary = engine.cluster_and_export(&SilentReporter).unwrap();
    assert_eq!(summary.clusters, 1);
    assert_eq!(output_files(&ws.output).len(), 1);
}

#[test]
fn test_export_skips_missing_member() {
    let ws = workspace(95, ConcurrencyMode::Sequential);
    create_corpus(&ws.input);
    let engine = engine(&ws);
    engine.hash_documents(&SilentReporter).unwrap();

    fs::remove_file(ws.input.join("nested").join("c.pdf")).unwrap();
    let summary = engine.cluster_and_export(&SilentReporter).unwrap();

    assert_eq!(summary.clusters, 1);
    assert_eq!(summary.export.members_skipped, 1);
    assert_eq!(summary.export.files_written, 1);
    assert_eq!(summary.export.pages_written, 1);
}

#[test]
fn test_cluster_requires_output_dir() {
    let ws = workspace(95, ConcurrencyMode::Sequential);
    create_corpus(&ws.input);
    engine(&ws).hash_documents(&SilentReporter).unwrap();

    let config = AppConfig {
        output_dir: String::new(),
        ..ws.config.clone()
    };
    let err = DedupeEngine::new(config)
        .with_rasterizer(Box::new(ContentRasterizer))
        .cluster_and_export(&SilentReporter)
        .unwrap_err();
    assert!(matches!(err, Error::InvalidConfig(_)));
}
