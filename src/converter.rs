//! Conversion of raw source records into documents

use std::collections::BTreeMap;
use std::path::Path;

use chrono::Utc;
use tracing::debug;
use tracing::warn;

use crate::errors::RaglineError;
use crate::errors::Result;
use crate::models::Document;
use crate::models::MetaValue;
use crate::models::SourceRecord;

/// Metadata key stamped on every converted document
pub const DATE_ADDED_KEY: &str = "date_added";

/// Converts source records into documents, pulling content from one
/// designated text-bearing field.
#[derive(Debug, Clone)]
pub struct RecordConverter {
    text_field: String,
}

impl RecordConverter {
    pub fn new(text_field: impl Into<String>) -> Self {
        Self {
            text_field: text_field.into(),
        }
    }

    /// Convert a single record into exactly one document.
    ///
    /// The document content comes from the designated text field; `extra_meta`
    /// is merged in along with a `date_added` provenance stamp. Remaining
    /// record fields are carried over as metadata.
    ///
    /// # Errors
    /// `MalformedRecord` when the text field is absent or empty.
    pub fn convert(
        &self,
        record: &SourceRecord,
        extra_meta: &BTreeMap<String, MetaValue>,
    ) -> Result<Document> {
        let content = record
            .get(&self.text_field)
            .filter(|text| !text.trim().is_empty())
            .ok_or_else(|| {
                RaglineError::malformed_record(format!(
                    "text field '{}' is missing or empty",
                    self.text_field
                ))
            })?;

        let mut doc = Document::new(content);
        for (key, value) in &record.fields {
            if key != &self.text_field {
                doc.meta.insert(key.clone(), MetaValue::from(value.clone()));
            }
        }
        for (key, value) in extra_meta {
            doc.meta.insert(key.clone(), value.clone());
        }
        doc.meta.entry(DATE_ADDED_KEY.to_string()).or_insert_with(|| {
            MetaValue::String(Utc::now().to_rfc3339())
        });

        Ok(doc)
    }

    /// Convert a batch of records.
    ///
    /// Malformed records are skipped and the rest of the batch continues;
    /// every skip is logged and returned so the caller sees the failures.
    pub fn convert_all(
        &self,
        records: &[SourceRecord],
        extra_meta: &BTreeMap<String, MetaValue>,
    ) -> (Vec<Document>, Vec<RaglineError>) {
        let mut documents = Vec::with_capacity(records.len());
        let mut failures = Vec::new();

        for (idx, record) in records.iter().enumerate() {
            match self.convert(record, extra_meta) {
                Ok(doc) => documents.push(doc),
                Err(err) => {
                    warn!("Skipping record {}: {}", idx, err);
                    failures.push(err);
                }
            }
        }

        debug!(
            "Converted {} of {} records ({} skipped)",
            documents.len(),
            records.len(),
            failures.len()
        );
        (documents, failures)
    }
}

/// Read a CSV file with a header row into source records
pub fn read_csv_records<P: AsRef<Path>>(path: P) -> Result<Vec<SourceRecord>> {
    let mut reader = csv::Reader::from_path(path.as_ref())?;
    let headers = reader.headers()?.clone();

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row?;
        let mut record = SourceRecord::new();
        for (header, value) in headers.iter().zip(row.iter()) {
            record.fields.insert(header.to_string(), value.to_string());
        }
        records.push(record);
    }

    debug!(
        "Read {} records from {}",
        records.len(),
        path.as_ref().display()
    );
    Ok(records)
}
