use serde::{Deserialize, Serialize};
use std::{
    fs::{self, File, OpenOptions},
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
};
use tracing::{info, warn};

use crate::{error::SubmissionError, listing::ListingDraft};

pub const SUCCESS_MESSAGE: &str =
    "Property listing submitted successfully! Our team will contact you within 24 hours.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionReceipt {
    pub sequence: u64,
}

/// Where finished listings are handed off.
pub trait SubmissionSink {
    fn submit_listing(&mut self, draft: &ListingDraft) -> Result<SubmissionReceipt, SubmissionError>;
}

#[derive(Serialize)]
struct OutboxRecord<'a> {
    sequence: u64,
    listing: &'a ListingDraft,
}

/// Appends each listing as one JSON document per line.
#[derive(Debug)]
pub struct OutboxSink {
    path: PathBuf,
    next_sequence: u64,
}

impl OutboxSink {
    /// Opens (or prepares) the outbox, continuing the sequence after any
    /// listings already in the file. A trailing line without its newline
    /// is an interrupted write and is cut off.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, SubmissionError> {
        let path = path.into();
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => Vec::new(),
            Err(err) => return Err(err.into()),
        };

        let complete = bytes
            .iter()
            .rposition(|b| *b == b'\n')
            .map_or(0, |last| last + 1);
        if complete < bytes.len() {
            warn!(
                path = %path.display(),
                dropped = bytes.len() - complete,
                "truncating partial record at end of outbox"
            );
            OpenOptions::new()
                .write(true)
                .open(&path)?
                .set_len(complete as u64)?;
        }

        let existing = String::from_utf8_lossy(&bytes[..complete])
            .lines()
            .filter(|line| !line.trim().is_empty())
            .count() as u64;

        Ok(Self {
            path,
            next_sequence: existing + 1,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SubmissionSink for OutboxSink {
    fn submit_listing(&mut self, draft: &ListingDraft) -> Result<SubmissionReceipt, SubmissionError> {
        let record = OutboxRecord {
            sequence: self.next_sequence,
            listing: draft,
        };
        let mut line = serde_json::to_vec(&record)?;
        line.push(b'\n');

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let before = file.metadata()?.len();
        if let Err(err) = write_record(&file, &line) {
            // Never leave half a record behind for the next append.
            if let Err(rollback) = file.set_len(before) {
                warn!(%rollback, path = %self.path.display(), "could not roll back partial outbox write");
            }
            return Err(err.into());
        }

        let receipt = SubmissionReceipt {
            sequence: self.next_sequence,
        };
        self.next_sequence += 1;
        info!(sequence = receipt.sequence, path = %self.path.display(), "listing written to outbox");
        Ok(receipt)
    }
}

fn write_record(file: &File, line: &[u8]) -> io::Result<()> {
    let mut writer = BufWriter::new(file);
    writer.write_all(line)?;
    writer.flush()?;
    file.sync_data()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listing::ListingDraft;

    #[test]
    fn outbox_appends_and_continues_sequence() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("outbox.jsonl");

        let mut draft = ListingDraft::default();
        draft.title = "Townhouse near the park".to_string();

        let mut sink = OutboxSink::open(&path).unwrap();
        assert_eq!(sink.submit_listing(&draft).unwrap().sequence, 1);
        assert_eq!(sink.submit_listing(&draft).unwrap().sequence, 2);

        let mut reopened = OutboxSink::open(&path).unwrap();
        assert_eq!(reopened.submit_listing(&draft).unwrap().sequence, 3);

        let text = fs::read_to_string(&path).unwrap();
        let lines: Vec<serde_json::Value> = text
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[2]["sequence"], 3);
        assert_eq!(lines[0]["listing"]["title"], "Townhouse near the park");
    }

    #[test]
    fn interrupted_record_is_cut_before_next_append() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("outbox.jsonl");

        let mut draft = ListingDraft::default();
        draft.title = "Cluster home".to_string();
        OutboxSink::open(&path).unwrap().submit_listing(&draft).unwrap();

        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(br#"{"sequence":2,"listing":{"title":"Clu"#).unwrap();
        drop(file);

        let mut sink = OutboxSink::open(&path).unwrap();
        assert_eq!(sink.submit_listing(&draft).unwrap().sequence, 2);

        let text = fs::read_to_string(&path).unwrap();
        let records: Vec<serde_json::Value> = text
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1]["sequence"], 2);
        assert_eq!(records[1]["listing"]["title"], "Cluster home");
    }

    #[test]
    fn unwritable_outbox_reports_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = OutboxSink::open(dir.path()).unwrap_or(OutboxSink {
            path: dir.path().to_path_buf(),
            next_sequence: 1,
        });
        let err = sink.submit_listing(&ListingDraft::default()).unwrap_err();
        assert!(matches!(err, SubmissionError::Io(_)));
    }
}
