//! Import driver: parse → map → submit → dispose, strictly one file at a time.

use bankfeed_core::{ImportConfig, ImportError, RowError, SourceError, SubmissionBatch};
use bankfeed_ingest::{CsvParser, Deleter, FileHandle, FileSource, SourceFile, TransactionMapper};

use crate::http::HttpClient;
use crate::submitter::{BatchSubmitter, Confirmation};

/// A file's batch before anything touches the network
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedBatch {
    pub batch: SubmissionBatch,
    pub skipped: Vec<RowError>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    /// The service accepted the batch. `disposed` is false if the deleter failed.
    Imported {
        confirmation: Confirmation,
        skipped: Vec<RowError>,
        disposed: bool,
    },
    /// No transactions survived mapping; nothing was sent and the file stays put
    NothingToSubmit { skipped: Vec<RowError> },
}

#[derive(Debug)]
pub struct FileReport {
    pub name: String,
    pub handle: FileHandle,
    pub result: Result<FileOutcome, ImportError>,
}

#[derive(Debug, Default)]
pub struct RunReport {
    pub files: Vec<FileReport>,
}

impl RunReport {
    pub fn imported(&self) -> usize {
        self.files
            .iter()
            .filter(|f| matches!(f.result, Ok(FileOutcome::Imported { .. })))
            .count()
    }

    pub fn failed(&self) -> usize {
        self.files.iter().filter(|f| f.result.is_err()).count()
    }

    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }
}

/// Parse and map one file into its submission batch. Never touches the network.
pub fn prepare_batch(config: &ImportConfig, file: &SourceFile) -> Result<PreparedBatch, ImportError> {
    let rows = CsvParser::new(&file.content, &config.layout).rows()?;
    let mapped = TransactionMapper::new(config).map_rows(rows)?;

    Ok(PreparedBatch {
        batch: SubmissionBatch::new(&config.budget_id, &file.name, mapped.records),
        skipped: mapped.skipped,
    })
}

pub struct Importer<'a, C: HttpClient + ?Sized> {
    config: &'a ImportConfig,
    client: &'a C,
}

impl<'a, C: HttpClient + ?Sized> Importer<'a, C> {
    pub fn new(config: &'a ImportConfig, client: &'a C) -> Self {
        Self { config, client }
    }

    pub fn prepare(&self, file: &SourceFile) -> Result<PreparedBatch, ImportError> {
        prepare_batch(self.config, file)
    }

    /// Import one file. The deleter is only called after the service accepted the batch.
    pub fn import_file<D: Deleter + ?Sized>(
        &self,
        file: &SourceFile,
        deleter: &D,
    ) -> Result<FileOutcome, ImportError> {
        let PreparedBatch { batch, skipped } = self.prepare(file)?;

        if batch.is_empty() {
            tracing::info!(skipped = skipped.len(), "no transactions to submit; keeping file");
            return Ok(FileOutcome::NothingToSubmit { skipped });
        }

        let confirmation = BatchSubmitter::new(self.client, self.config).submit(&batch)?;

        let disposed = match deleter.delete(&file.handle) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(error = %e, "batch imported but the file could not be disposed of");
                false
            }
        };

        Ok(FileOutcome::Imported {
            confirmation,
            skipped,
            disposed,
        })
    }

    /// Import every file the source lists, in order. A failing file is
    /// recorded in the report and the run moves on to the next one.
    pub fn run<S, D>(&self, source: &S, deleter: &D) -> Result<RunReport, SourceError>
    where
        S: FileSource + ?Sized,
        D: Deleter + ?Sized,
    {
        let files = source.list_files()?;
        tracing::info!(count = files.len(), "starting import run");

        let mut report = RunReport::default();
        for file in &files {
            let _span = tracing::info_span!("file", name = %file.name).entered();

            let result = self.import_file(file, deleter);
            if let Err(e) = &result {
                tracing::error!(error = %e, "import failed; file kept");
            }

            report.files.push(FileReport {
                name: file.name.clone(),
                handle: file.handle.clone(),
                result,
            });
        }

        tracing::info!(
            files = report.files.len(),
            imported = report.imported(),
            failed = report.failed(),
            "import run finished"
        );
        Ok(report)
    }
}
