//! End-to-end archive runs against a real repository, media tree and index
//! using the built-in parsers.

mod common;

use common::{ConfigBuilder, DocumentBuilder, TestHarness};
use serial_test::serial;

use docarchive::pipeline::DocumentOutcome;
use docarchive::storage::filesystem::checksum_file;

fn outcome_of(outcomes: &[(i64, DocumentOutcome)], id: i64) -> &DocumentOutcome {
    &outcomes
        .iter()
        .find(|(doc_id, _)| *doc_id == id)
        .unwrap_or_else(|| panic!("No outcome for document {}", id))
        .1
}

#[cfg(unix)]
#[test]
#[serial]
fn test_mixed_repository() {
    let harness = TestHarness::with_fake_pdftoppm(ConfigBuilder::new());
    let pdf = harness.add_document(DocumentBuilder::pdf("invoice.pdf", "Invoice 42").title("Invoice"));
    let text = harness.add_document(DocumentBuilder::text("notes.txt", "call the bank"));
    let unknown = harness.add_document(
        DocumentBuilder::new("data.bin", "application/x-unknown").content(vec![0, 1, 2]),
    );

    let archiver = harness.archiver();
    let outcomes = harness.run(&archiver, false, None);

    // Newest first; equal timestamps fall back to id.
    let order: Vec<i64> = outcomes.iter().map(|(id, _)| *id).collect();
    assert_eq!(order, vec![unknown, text, pdf]);

    assert_eq!(
        outcome_of(&outcomes, pdf),
        &DocumentOutcome::Archived {
            archive_filename: "0000001.pdf".to_string()
        }
    );
    assert_eq!(outcome_of(&outcomes, text), &DocumentOutcome::NoArchiveProduced);
    assert_eq!(
        outcome_of(&outcomes, unknown),
        &DocumentOutcome::NoParser {
            mime_type: "application/x-unknown".to_string()
        }
    );

    // Archived PDF: all three fields set, file checksum matches the record.
    let archived = harness.document(pdf);
    assert!(archived.content.is_some());
    let archive_file = harness.archive_file(&archived).unwrap();
    assert_eq!(
        archived.archive_checksum.as_deref(),
        Some(checksum_file(&archive_file).unwrap().as_str())
    );
    assert!(std::fs::read(&archive_file).unwrap().starts_with(b"%PDF"));
    assert!(harness.thumbnail_file(&archived).exists());

    // Text and unknown documents untouched.
    for id in [text, unknown] {
        let doc = harness.document(id);
        assert_eq!(doc.archive_filename, None);
        assert_eq!(doc.archive_checksum, None);
        assert_eq!(doc.content, None);
    }

    let index = harness.index();
    assert!(index.contains(pdf).unwrap());
    assert!(!index.contains(text).unwrap());
    let hits = index.search("Invoice", 10).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].id, pdf);

    assert!(harness.scratch_entries().is_empty());

    // Re-run without overwrite only picks up what still lacks an archive.
    assert_eq!(harness.candidates(false, None), vec![unknown, text]);
}

#[cfg(unix)]
#[test]
#[serial]
fn test_rerun_leaves_archived_documents_alone() {
    let harness = TestHarness::with_fake_pdftoppm(ConfigBuilder::new());
    let pdf = harness.add_document(DocumentBuilder::pdf("a.pdf", "First"));
    let archiver = harness.archiver();

    harness.run(&archiver, false, None);
    let before = harness.document(pdf);
    let archive_bytes = std::fs::read(harness.archive_file(&before).unwrap()).unwrap();

    let outcomes = harness.run(&archiver, false, None);
    assert!(outcomes.is_empty());
    assert_eq!(harness.document(pdf), before);
    assert_eq!(
        std::fs::read(harness.archive_file(&before).unwrap()).unwrap(),
        archive_bytes
    );
}

#[cfg(unix)]
#[test]
#[serial]
fn test_explicit_document_overrides_archive_state() {
    let harness = TestHarness::with_fake_pdftoppm(ConfigBuilder::new());
    let first = harness.add_document(DocumentBuilder::pdf("a.pdf", "First"));
    let second = harness.add_document(DocumentBuilder::pdf("b.pdf", "Second"));
    let archiver = harness.archiver();

    harness.run(&archiver, false, None);
    let archived = harness.document(first);

    let outcomes = harness.run(&archiver, false, Some(first));
    assert_eq!(outcomes.len(), 1);
    assert_eq!(
        outcomes[0],
        (
            first,
            DocumentOutcome::Archived {
                archive_filename: archived.archive_filename.clone().unwrap()
            }
        )
    );
    // The other document was not touched by the targeted run.
    assert!(harness.document(second).has_archive_version());
    assert_eq!(harness.candidates(false, Some(999)), Vec::<i64>::new());
}

#[cfg(unix)]
#[test]
#[serial]
fn test_overwrite_reprocesses_everything() {
    let harness = TestHarness::with_fake_pdftoppm(ConfigBuilder::new());
    let pdf = harness.add_document(DocumentBuilder::pdf("a.pdf", "Report"));
    let text = harness.add_document(DocumentBuilder::text("b.txt", "memo"));
    let archiver = harness.archiver();

    harness.run(&archiver, false, None);
    let first_name = harness.document(pdf).archive_filename;

    let outcomes = harness.run(&archiver, true, None);
    assert_eq!(outcomes.len(), 2);
    assert_eq!(
        outcome_of(&outcomes, pdf),
        &DocumentOutcome::Archived {
            archive_filename: first_name.clone().unwrap()
        }
    );
    assert_eq!(outcome_of(&outcomes, text), &DocumentOutcome::NoArchiveProduced);
    assert_eq!(harness.document(pdf).archive_filename, first_name);
    assert_eq!(harness.index().document_count().unwrap(), 1);
}

#[test]
fn test_image_becomes_pdf_archive() {
    let harness = TestHarness::new();
    let id = harness.add_document(DocumentBuilder::png("scan.png", 600, 300).title("Scan"));
    let archiver = harness.archiver();

    let outcomes = harness.run(&archiver, false, None);
    assert_eq!(
        outcomes,
        vec![(
            id,
            DocumentOutcome::Archived {
                archive_filename: "0000001.pdf".to_string()
            }
        )]
    );

    let doc = harness.document(id);
    let archive = std::fs::read(harness.archive_file(&doc).unwrap()).unwrap();
    assert!(archive.starts_with(b"%PDF"));
    assert_eq!(doc.content.as_deref(), Some(""));

    let thumb = image::open(harness.thumbnail_file(&doc)).unwrap();
    assert!(thumb.width() <= harness.config().parsers.thumbnail_width);
}

#[test]
fn test_pdf_without_renderer_fails_and_stays_candidate() {
    let harness =
        TestHarness::with_config(ConfigBuilder::new().pdftoppm("/nonexistent/pdftoppm"));
    let id = harness.add_document(DocumentBuilder::pdf("a.pdf", "Lonely"));
    let archiver = harness.archiver();

    let outcomes = harness.run(&archiver, false, None);
    assert!(outcomes[0].1.is_failure());

    let doc = harness.document(id);
    assert!(!doc.has_archive_version());
    assert_eq!(doc.archive_checksum, None);
    assert_eq!(harness.candidates(false, None), vec![id]);
    assert!(harness.scratch_entries().is_empty());
}
