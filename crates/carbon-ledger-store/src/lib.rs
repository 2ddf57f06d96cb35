use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use carbon_ledger_core::{
    coerce_rows, decode_document_row, EmissionEntry, EmissionRecord, ImportRow, LedgerError,
};
use serde_json::Value;
use tempfile::NamedTempFile;
use time::OffsetDateTime;

pub const LEDGER_FILE: &str = "emissions.json";
pub const ROLLING_BACKUP_FILE: &str = "emissions_backup.json";

const EMPTY_DOCUMENT: &str = "[]";

/// Flat JSON document holding the whole ledger, rewritten after every mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonLedgerStore {
    data_dir: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct LoadOutcome {
    pub records: Vec<EmissionRecord>,
    /// Where an unreadable document was copied before starting empty.
    pub quarantined: Option<PathBuf>,
}

impl JsonLedgerStore {
    /// Open the store rooted at `data_dir`, creating the directory when needed.
    ///
    /// # Errors
    /// Returns an error when the data directory cannot be created.
    pub fn open(data_dir: &Path) -> Result<Self> {
        fs::create_dir_all(data_dir)
            .with_context(|| format!("failed to create data directory {}", data_dir.display()))?;
        Ok(Self { data_dir: data_dir.to_path_buf() })
    }

    #[must_use]
    pub fn document_path(&self) -> PathBuf {
        self.data_dir.join(LEDGER_FILE)
    }

    #[must_use]
    pub fn rolling_backup_path(&self) -> PathBuf {
        self.data_dir.join(ROLLING_BACKUP_FILE)
    }

    /// Read the persisted ledger. Never fails: a missing or blank document yields an
    /// empty ledger, and a document that is not a JSON array is copied aside verbatim
    /// before an empty ledger is returned. Entries are decoded leniently; an entry that
    /// still cannot be used is skipped and the document is copied aside as well.
    #[must_use]
    pub fn load(&self) -> LoadOutcome {
        let path = self.document_path();
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => return LoadOutcome::default(),
            Err(err) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read ledger document, starting with an empty ledger"
                );
                return LoadOutcome::default();
            }
        };

        if bytes.iter().all(u8::is_ascii_whitespace) {
            return LoadOutcome::default();
        }

        let entries = match serde_json::from_slice::<Vec<Value>>(&bytes) {
            Ok(entries) => entries,
            Err(parse_err) => {
                let quarantined = self.quarantine_logged(&bytes);
                tracing::warn!(
                    path = %path.display(),
                    quarantined = ?quarantined,
                    error = %parse_err,
                    "ledger document is corrupt, starting with an empty ledger"
                );
                return LoadOutcome { records: Vec::new(), quarantined };
            }
        };

        let mut records = Vec::with_capacity(entries.len());
        let mut skipped = 0_usize;
        for (index, entry) in entries.into_iter().enumerate() {
            match decode_document_row(entry) {
                Ok((record, notes)) => {
                    for note in notes {
                        tracing::warn!(entry = index + 1, note = %note, "repaired ledger entry");
                    }
                    records.push(record);
                }
                Err(err) => {
                    skipped += 1;
                    tracing::warn!(
                        entry = index + 1,
                        error = %err,
                        "skipping unusable ledger entry"
                    );
                }
            }
        }

        let quarantined = if skipped == 0 { None } else { self.quarantine_logged(&bytes) };
        tracing::debug!(path = %path.display(), records = records.len(), skipped, "loaded ledger");
        LoadOutcome { records, quarantined }
    }

    /// Replace the document with `records` as pretty JSON, or `[]` when empty.
    /// The previous document is copied to the rolling backup first; a failed
    /// backup is only logged. The new content goes to a temporary sibling that is
    /// renamed over the document, so a failed write leaves the old document whole.
    ///
    /// # Errors
    /// Returns an error when the records cannot be serialized or the document
    /// cannot be written.
    pub fn persist(&self, records: &[EmissionRecord]) -> Result<()> {
        let path = self.document_path();
        let body = if records.is_empty() {
            EMPTY_DOCUMENT.to_string()
        } else {
            serde_json::to_string_pretty(records).context("failed to serialize ledger records")?
        };

        self.refresh_rolling_backup(&path);

        replace_document(&path, |file| file.write_all(body.as_bytes()))?;
        tracing::info!(path = %path.display(), records = records.len(), "persisted ledger");
        Ok(())
    }

    fn refresh_rolling_backup(&self, document: &Path) {
        let previous = match fs::read(document) {
            Ok(previous) => previous,
            Err(err) if err.kind() == ErrorKind::NotFound => return,
            Err(err) => {
                tracing::warn!(path = %document.display(), error = %err, "skipping rolling backup");
                return;
            }
        };

        let backup = self.rolling_backup_path();
        if let Err(err) = fs::write(&backup, previous) {
            tracing::warn!(
                path = %backup.display(),
                error = %err,
                "failed to write rolling backup"
            );
        }
    }

    fn quarantine(&self, original: &[u8]) -> Result<PathBuf> {
        let stamp = OffsetDateTime::now_utc().unix_timestamp();
        let mut target = self.data_dir.join(format!("emissions_backup_{stamp}.json"));
        let mut attempt = 1_u32;
        while target.exists() {
            target = self.data_dir.join(format!("emissions_backup_{stamp}_{attempt}.json"));
            attempt += 1;
        }

        fs::write(&target, original)
            .with_context(|| format!("failed to write quarantine copy {}", target.display()))?;
        Ok(target)
    }

    fn quarantine_logged(&self, original: &[u8]) -> Option<PathBuf> {
        match self.quarantine(original) {
            Ok(copy) => Some(copy),
            Err(err) => {
                tracing::warn!(error = %format!("{err:#}"), "failed to quarantine ledger document");
                None
            }
        }
    }
}

/// Write a temporary sibling of `path` with `write`, sync it, then rename it over
/// `path`. Nothing at `path` changes unless every step succeeds.
fn replace_document<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(&mut NamedTempFile) -> std::io::Result<()>,
{
    let parent = path
        .parent()
        .with_context(|| format!("ledger document {} has no parent directory", path.display()))?;

    let mut temp = NamedTempFile::new_in(parent)
        .with_context(|| format!("failed to create temporary file in {}", parent.display()))?;
    write(&mut temp)
        .with_context(|| format!("failed to write ledger document {}", path.display()))?;
    temp.as_file()
        .sync_all()
        .with_context(|| format!("failed to sync ledger document {}", path.display()))?;
    temp.persist(path)
        .map_err(|err| err.error)
        .with_context(|| format!("failed to replace ledger document {}", path.display()))?;
    Ok(())
}

/// Ordered, persisted sequence of emission records.
///
/// Every mutation builds the new record list, persists it, and only then installs
/// it in memory, so a failed write leaves the ledger exactly as it was.
#[derive(Debug)]
pub struct Ledger {
    store: JsonLedgerStore,
    records: Vec<EmissionRecord>,
    quarantined: Option<PathBuf>,
}

impl Ledger {
    /// Open the ledger stored under `data_dir`.
    ///
    /// # Errors
    /// Returns an error when the data directory cannot be created.
    pub fn open(data_dir: &Path) -> Result<Self> {
        Ok(Self::from_store(JsonLedgerStore::open(data_dir)?))
    }

    #[must_use]
    pub fn from_store(store: JsonLedgerStore) -> Self {
        let outcome = store.load();
        Self { store, records: outcome.records, quarantined: outcome.quarantined }
    }

    #[must_use]
    pub fn store(&self) -> &JsonLedgerStore {
        &self.store
    }

    #[must_use]
    pub fn document_path(&self) -> PathBuf {
        self.store.document_path()
    }

    /// Quarantine copy written when the ledger was last loaded, if any.
    #[must_use]
    pub fn quarantined(&self) -> Option<&Path> {
        self.quarantined.as_deref()
    }

    #[must_use]
    pub fn records(&self) -> &[EmissionRecord] {
        &self.records
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&EmissionRecord> {
        self.records.get(index)
    }

    /// Validate and derive `entry`, then append it.
    ///
    /// # Errors
    /// Returns [`LedgerError::Validation`] for an invalid entry and
    /// [`LedgerError::Persistence`] when the document cannot be written.
    pub fn append(&mut self, entry: EmissionEntry) -> Result<(), LedgerError> {
        let record = entry.into_record()?;
        let mut staged = self.records.clone();
        staged.push(record);
        self.commit(staged)?;
        tracing::info!(len = self.records.len(), "appended ledger record");
        Ok(())
    }

    /// Remove the record at `index`; later records shift down by one.
    ///
    /// # Errors
    /// Returns [`LedgerError::Index`] when `index` is out of range and
    /// [`LedgerError::Persistence`] when the document cannot be written.
    pub fn delete_at(&mut self, index: usize) -> Result<EmissionRecord, LedgerError> {
        if index >= self.records.len() {
            return Err(LedgerError::Index { index, len: self.records.len() });
        }

        let mut staged = self.records.clone();
        let removed = staged.remove(index);
        self.commit(staged)?;
        tracing::info!(index, len = self.records.len(), "deleted ledger record");
        Ok(removed)
    }

    /// Coerce and append all `rows` with a single persist. Empty input is a no-op.
    ///
    /// # Errors
    /// Returns [`LedgerError::Schema`] or [`LedgerError::Validation`] before any row is
    /// appended, and [`LedgerError::Persistence`] when the document cannot be written.
    pub fn bulk_import(&mut self, rows: &[ImportRow]) -> Result<usize, LedgerError> {
        let imported = coerce_rows(rows)?;
        if imported.is_empty() {
            return Ok(0);
        }

        let count = imported.len();
        let mut staged = self.records.clone();
        staged.extend(imported);
        self.commit(staged)?;
        tracing::info!(imported = count, len = self.records.len(), "imported ledger rows");
        Ok(count)
    }

    /// Write the current records to the document.
    ///
    /// # Errors
    /// Returns [`LedgerError::Persistence`] when the document cannot be written.
    pub fn persist(&self) -> Result<(), LedgerError> {
        self.store.persist(&self.records).map_err(persistence_error)
    }

    fn commit(&mut self, staged: Vec<EmissionRecord>) -> Result<(), LedgerError> {
        self.store.persist(&staged).map_err(persistence_error)?;
        self.records = staged;
        Ok(())
    }
}

fn persistence_error(err: anyhow::Error) -> LedgerError {
    LedgerError::Persistence(format!("{err:#}"))
}
