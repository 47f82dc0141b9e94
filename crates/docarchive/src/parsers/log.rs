use uuid::Uuid;

/// Per-document log sink.
///
/// Every diagnostic emitted while a parser works on a document goes through
/// this sink, so the output carries the document id, title and the parser's
/// logging group no matter which thread or tool produced it.
#[derive(Debug, Clone)]
pub struct DocumentLog {
    document_id: i64,
    title: String,
    logging_group: Uuid,
}

impl DocumentLog {
    pub fn new(document_id: i64, title: impl Into<String>, logging_group: Uuid) -> Self {
        Self {
            document_id,
            title: title.into(),
            logging_group,
        }
    }

    pub fn document_id(&self) -> i64 {
        self.document_id
    }

    pub fn logging_group(&self) -> Uuid {
        self.logging_group
    }

    pub fn debug(&self, message: &str) {
        tracing::debug!(
            document_id = self.document_id,
            logging_group = %self.logging_group,
            "{}",
            message
        );
    }

    pub fn info(&self, message: &str) {
        tracing::info!(
            document_id = self.document_id,
            logging_group = %self.logging_group,
            "{}",
            message
        );
    }

    pub fn warn(&self, message: &str) {
        tracing::warn!(
            document_id = self.document_id,
            logging_group = %self.logging_group,
            "{}",
            message
        );
    }

    /// Attributes an external tool's stderr to this document, one event per
    /// non-empty line. Returns the number of lines forwarded.
    pub fn forward_stderr(&self, tool: &str, stderr: &[u8]) -> usize {
        let mut forwarded = 0;
        for line in String::from_utf8_lossy(stderr).lines() {
            let line = line.trim_end();
            if line.is_empty() {
                continue;
            }
            tracing::error!(
                document_id = self.document_id,
                logging_group = %self.logging_group,
                tool,
                "Error while processing document {}: {}",
                self.title,
                line
            );
            forwarded += 1;
        }
        forwarded
    }
}
