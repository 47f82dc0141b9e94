//! Test harness for isolated archive runs.
//!
//! Each `TestHarness` owns a temp directory holding the media root, the data
//! directory (repository and search index) and the scratch directory. Runs
//! go through the same selection and per-document pipeline the worker
//! processes use, sequentially in this process.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use tempfile::TempDir;

use docarchive::config::Config;
use docarchive::db::{document_repo, Database};
use docarchive::document::{Document, MediaPaths, NewDocument};
use docarchive::index::SearchIndex;
use docarchive::parsers::ParserRegistry;
use docarchive::pipeline::{Archiver, DocumentHandler, DocumentOutcome};
use docarchive::storage::filesystem::checksum_file;
use docarchive::storage::MediaStore;
use docarchive::worker::{select_candidates, Job};

use super::builders::{ConfigBuilder, DocumentBuilder};

pub struct TestHarness {
    temp_dir: TempDir,
    config: Config,
    db: Database,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_config(ConfigBuilder::new())
    }

    pub fn with_config(builder: ConfigBuilder) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        Self::setup(temp_dir, builder)
    }

    /// Harness whose `pdftoppm` is a shell script writing `<last arg>.png`.
    #[cfg(unix)]
    pub fn with_fake_pdftoppm(builder: ConfigBuilder) -> Self {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let tool = temp_dir.path().join("fake-pdftoppm");
        let script = "#!/bin/sh\nfor last; do :; done\nprintf 'fake png' > \"$last.png\"\n";
        std::fs::write(&tool, script).expect("Failed to write fake pdftoppm");
        std::fs::set_permissions(&tool, std::fs::Permissions::from_mode(0o755))
            .expect("Failed to mark fake pdftoppm executable");

        Self::setup(temp_dir, builder.pdftoppm(&tool))
    }

    fn setup(temp_dir: TempDir, builder: ConfigBuilder) -> Self {
        let config = builder.build(temp_dir.path());

        std::fs::create_dir_all(config.media_root().join("originals"))
            .expect("Failed to create originals dir");
        std::fs::create_dir_all(config.scratch_directory()).expect("Failed to create scratch dir");
        let db = Database::open(&config.database_path()).expect("Failed to open repository");

        Self {
            temp_dir,
            config,
            db,
        }
    }

    pub fn temp_path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn paths(&self) -> MediaPaths {
        MediaPaths::new(self.config.media_root())
    }

    /// Writes the original into `originals/` and inserts its row.
    pub fn add_document(&self, builder: DocumentBuilder) -> i64 {
        let original = self.paths().originals_dir().join(&builder.filename);
        std::fs::write(&original, &builder.content).expect("Failed to write original");
        let checksum = checksum_file(&original).expect("Failed to checksum original");

        document_repo::insert(
            &self.db,
            &NewDocument {
                title: builder.title,
                mime_type: builder.mime_type,
                filename: builder.filename,
                checksum,
                created: builder.created,
            },
        )
        .expect("Failed to insert document")
    }

    pub fn document(&self, id: i64) -> Document {
        document_repo::find_by_id(&self.db, id)
            .expect("Failed to load document")
            .expect("Document not found")
    }

    /// Archiver with the built-in parsers, wired exactly as a worker's.
    pub fn archiver(&self) -> Archiver {
        Archiver::from_config(&self.config).expect("Failed to create archiver")
    }

    /// Archiver with a custom parser registry.
    pub fn archiver_with(&self, registry: ParserRegistry) -> Archiver {
        let db = Database::open(&self.config.database_path()).expect("Failed to open repository");
        let index = SearchIndex::open(&self.config.index_path()).expect("Failed to open index");
        Archiver::new(
            db,
            index,
            registry,
            MediaStore::from_config(&self.config),
            self.config.scratch_directory(),
            self.config.parsers.clone(),
        )
    }

    pub fn index(&self) -> SearchIndex {
        SearchIndex::open(&self.config.index_path()).expect("Failed to open index")
    }

    pub fn candidates(&self, overwrite: bool, document_id: Option<i64>) -> Vec<i64> {
        select_candidates(&self.db, overwrite, document_id).expect("Selection failed")
    }

    /// Selects and archives sequentially. Returns outcomes in selection order.
    pub fn run(
        &self,
        archiver: &Archiver,
        overwrite: bool,
        document_id: Option<i64>,
    ) -> Vec<(i64, DocumentOutcome)> {
        self.candidates(overwrite, document_id)
            .into_iter()
            .map(|id| (id, archiver.handle(&Job::new(id, overwrite))))
            .collect()
    }

    pub fn archive_file(&self, document: &Document) -> Option<PathBuf> {
        self.paths().archive_path(document)
    }

    pub fn thumbnail_file(&self, document: &Document) -> PathBuf {
        self.paths().thumbnail_path(document)
    }

    /// Files left behind in the scratch directory.
    pub fn scratch_entries(&self) -> Vec<PathBuf> {
        std::fs::read_dir(self.config.scratch_directory())
            .map(|entries| entries.filter_map(|e| e.ok()).map(|e| e.path()).collect())
            .unwrap_or_default()
    }
}
