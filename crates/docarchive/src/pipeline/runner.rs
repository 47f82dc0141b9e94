use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;

use tracing::{debug, error, info, info_span, warn};
use uuid::Uuid;

use crate::config::{Config, ParsersConfig};
use crate::db::{document_repo, Database};
use crate::error::ArchiverError;
use crate::index::SearchIndex;
use crate::parsers::{DocumentLog, DocumentParser, ParserContext, ParserRegistry};
use crate::sanitize;
use crate::storage::MediaStore;
use crate::worker::job::Job;

use super::commit::commit_archive;
use super::context::{ArchiveContext, ArchiveStage};
use super::error::PipelineError;
use super::outcome::DocumentOutcome;
use super::DocumentHandler;

/// Runs the archive pipeline for single documents.
///
/// Each worker process owns one `Archiver` with its own repository and
/// index connections.
pub struct Archiver {
    db: Database,
    index: SearchIndex,
    registry: ParserRegistry,
    media: MediaStore,
    scratch_dir: PathBuf,
    parser_options: ParsersConfig,
}

/// Calls the parser's cleanup when dropped, on every exit path.
struct ParserGuard {
    parser: Box<dyn DocumentParser>,
}

impl ParserGuard {
    fn parser(&mut self) -> &mut dyn DocumentParser {
        self.parser.as_mut()
    }
}

impl Drop for ParserGuard {
    fn drop(&mut self) {
        self.parser.cleanup();
    }
}

impl Archiver {
    /// Production constructor: opens the repository and index named by the
    /// config and registers the built-in parsers.
    pub fn from_config(config: &Config) -> Result<Self, ArchiverError> {
        let db = Database::open(&config.database_path())?;
        let index = SearchIndex::open(&config.index_path())?;

        Ok(Self::new(
            db,
            index,
            ParserRegistry::with_defaults(),
            MediaStore::from_config(config),
            config.scratch_directory(),
            config.parsers.clone(),
        ))
    }

    pub fn new(
        db: Database,
        index: SearchIndex,
        registry: ParserRegistry,
        media: MediaStore,
        scratch_dir: PathBuf,
        parser_options: ParsersConfig,
    ) -> Self {
        Self {
            db,
            index,
            registry,
            media,
            scratch_dir,
            parser_options,
        }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn index(&self) -> &SearchIndex {
        &self.index
    }

    pub fn media(&self) -> &MediaStore {
        &self.media
    }

    /// Archives one document. Never returns an error: every failure is
    /// logged with the document's identity and reported as an outcome.
    pub fn handle_document(&self, job: &Job) -> DocumentOutcome {
        let logging_group = Uuid::new_v4();
        let _span = info_span!(
            "archive_document",
            document_id = job.document_id,
            logging_group = %logging_group,
            overwrite = job.overwrite,
        )
        .entered();

        let document = match document_repo::find_by_id(&self.db, job.document_id) {
            Ok(Some(document)) => document,
            Ok(None) => {
                warn!("Document no longer exists, skipping");
                if let Err(e) = self.index.with_writer(|writer| writer.remove(job.document_id)) {
                    warn!(error = %e, "Failed to drop stale index entry");
                }
                return DocumentOutcome::NotFound;
            }
            Err(e) => {
                error!(error = %e, "Failed to load document");
                return DocumentOutcome::Failed {
                    stage: ArchiveStage::Selected,
                    error: e.to_string(),
                };
            }
        };

        let Some(entry) = self.registry.lookup(&document.mime_type) else {
            error!(
                title = %document.title,
                mime_type = %document.mime_type,
                "No parser found for mime type, skipping document"
            );
            return DocumentOutcome::NoParser {
                mime_type: document.mime_type,
            };
        };

        debug!(parser = entry.name(), "Selected parser");

        let log = DocumentLog::new(document.id, &document.title, logging_group);
        let mut guard = ParserGuard {
            parser: entry.create(ParserContext {
                logging_group,
                scratch_dir: self.scratch_dir.clone(),
                log,
                options: self.parser_options.clone(),
            }),
        };

        let mut ctx = ArchiveContext::new(*job, logging_group, document);

        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            self.run_stages(&mut ctx, guard.parser())
        }))
        .unwrap_or_else(|payload| {
            Err(PipelineError::Panic {
                stage: ctx.stage,
                message: panic_message(payload.as_ref()),
            })
        });

        let outcome = match result {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(
                    title = %ctx.document.title,
                    stage = %ctx.stage,
                    error = %e,
                    details = ?e,
                    "Error while processing document"
                );
                DocumentOutcome::Failed {
                    stage: ctx.stage,
                    error: e.to_string(),
                }
            }
        };

        drop(guard);
        outcome
    }

    fn run_stages(
        &self,
        ctx: &mut ArchiveContext,
        parser: &mut dyn DocumentParser,
    ) -> Result<DocumentOutcome, PipelineError> {
        let source = self.media.paths().source_path(&ctx.document);
        let display_name = ctx.document.public_filename();
        let mime_type = ctx.document.mime_type.clone();

        debug!(source = %sanitize::redact_path(&source), "Archiving document");

        // Selected -> Parsed
        let parsed = {
            let _step = info_span!("parse").entered();
            let parsed = parser
                .parse(&source, &mime_type, &display_name)
                .map_err(PipelineError::Parse)?;
            ctx.advance(ArchiveStage::Parsed);
            parsed
        };

        // Parsed -> Thumbnailed
        let thumbnail = {
            let _step = info_span!("thumbnail").entered();
            let thumbnail = parser
                .thumbnail(&source, &mime_type, &display_name)
                .map_err(PipelineError::Thumbnail)?;
            ctx.advance(ArchiveStage::Thumbnailed);
            thumbnail
        };

        let Some(archive_path) = parsed.archive_path else {
            debug!("Parser produced no archive version, document left unchanged");
            ctx.advance(ArchiveStage::Done);
            return Ok(DocumentOutcome::NoArchiveProduced);
        };

        // Thumbnailed -> Committed
        let archived = {
            let _step = info_span!("commit").entered();
            let archived = commit_archive(
                &self.db,
                &self.media,
                &ctx.document,
                &parsed.text,
                &archive_path,
                &thumbnail,
            )?;
            ctx.advance(ArchiveStage::Committed);
            archived
        };

        // Committed -> Indexed. Runs after the commit so the index never
        // holds state the repository rolled back.
        {
            let _step = info_span!("index").entered();
            self.index.with_writer(|writer| writer.upsert(&archived))?;
            ctx.advance(ArchiveStage::Indexed);
        }

        let archive_filename = archived.archive_filename.unwrap_or_default();
        ctx.advance(ArchiveStage::Done);
        info!(archive_filename = %archive_filename, "Document archived");

        Ok(DocumentOutcome::Archived { archive_filename })
    }
}

impl DocumentHandler for Archiver {
    fn handle(&self, job: &Job) -> DocumentOutcome {
        self.handle_document(job)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
