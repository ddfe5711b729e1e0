//! Detailed billing report loading
//!
//! The DBR export is a CSV file, normally delivered zip-compressed. The
//! compression is detected from the file's magic bytes so renamed files still
//! load. Header names are validated up front so a truncated or foreign file
//! fails with the missing column named instead of a per-row decode error.

use crate::error::CoverageError;
use crate::models::BillingRow;
use flate2::read::GzDecoder;
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;
use tracing::{debug, info, warn};

/// Columns the usage extractor cannot work without.
pub const REQUIRED_COLUMNS: &[&str] = &[
    "ProductName",
    "UsageType",
    "Operation",
    "UsageStartDate",
    "UsageEndDate",
    "ItemDescription",
    "ReservedInstance",
    "UsageQuantity",
];

const ZIP_MAGIC: [u8; 4] = [0x50, 0x4b, 0x03, 0x04];
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    Zip,
    Gzip,
    None,
}

/// Counters from one pass over the billing file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadStats {
    pub rows_read: usize,
    pub rows_kept: usize,
    pub rows_malformed: usize,
}

pub struct BillingLoader<'a> {
    path: &'a Path,
}

impl<'a> BillingLoader<'a> {
    pub fn new(path: &'a Path) -> Self {
        Self { path }
    }

    fn err(&self, message: impl Into<String>) -> CoverageError {
        CoverageError::billing(self.path, message)
    }

    pub fn detect_compression(&self, file: &mut File) -> Result<Compression, CoverageError> {
        let mut magic = [0u8; 4];
        let read = file
            .read(&mut magic)
            .map_err(|e| self.err(format!("cannot read file header: {}", e)))?;
        file.seek(SeekFrom::Start(0))
            .map_err(|e| self.err(format!("cannot rewind file: {}", e)))?;

        let compression = if read >= 4 && magic == ZIP_MAGIC {
            Compression::Zip
        } else if read >= 2 && magic[..2] == GZIP_MAGIC {
            Compression::Gzip
        } else {
            Compression::None
        };
        Ok(compression)
    }

    /// Read every row for which `keep` returns true.
    ///
    /// Filtering while streaming keeps memory bounded by the rows that matter
    /// rather than by the size of the whole export.
    pub fn load<F>(&self, keep: F) -> Result<(Vec<BillingRow>, LoadStats), CoverageError>
    where
        F: Fn(&BillingRow) -> bool,
    {
        let mut file = File::open(self.path).map_err(|e| self.err(format!("cannot open: {}", e)))?;
        let compression = self.detect_compression(&mut file)?;
        debug!(path = %self.path.display(), ?compression, "Opening billing file");

        let result = match compression {
            Compression::Zip => {
                let mut archive = zip::ZipArchive::new(BufReader::new(file))
                    .map_err(|e| self.err(format!("invalid zip archive: {}", e)))?;
                let index = Self::csv_entry_index(&mut archive)
                    .ok_or_else(|| self.err("zip archive contains no CSV file"))?;
                let entry = archive
                    .by_index(index)
                    .map_err(|e| self.err(format!("cannot read zip entry: {}", e)))?;
                debug!(entry = entry.name(), "Reading billing CSV from archive");
                self.read_csv(entry, keep)
            }
            Compression::Gzip => self.read_csv(GzDecoder::new(BufReader::new(file)), keep),
            Compression::None => self.read_csv(BufReader::new(file), keep),
        }?;

        info!(
            path = %self.path.display(),
            rows_read = result.1.rows_read,
            rows_kept = result.1.rows_kept,
            "Loaded billing rows"
        );
        Ok(result)
    }

    fn csv_entry_index<R: Read + Seek>(archive: &mut zip::ZipArchive<R>) -> Option<usize> {
        let mut first_file = None;
        for index in 0..archive.len() {
            let Ok(entry) = archive.by_index(index) else {
                continue;
            };
            if entry.is_dir() {
                continue;
            }
            if entry.name().to_ascii_lowercase().ends_with(".csv") {
                return Some(index);
            }
            first_file.get_or_insert(index);
        }
        first_file
    }

    fn read_csv<R, F>(&self, reader: R, keep: F) -> Result<(Vec<BillingRow>, LoadStats), CoverageError>
    where
        R: Read,
        F: Fn(&BillingRow) -> bool,
    {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);

        let headers = csv_reader
            .headers()
            .map_err(|e| self.err(format!("cannot read CSV header: {}", e)))?
            .clone();
        let missing = missing_columns(&headers);
        if !missing.is_empty() {
            return Err(self.err(format!("missing required columns: {}", missing.join(", "))));
        }

        let mut rows = Vec::new();
        let mut stats = LoadStats::default();
        for record in csv_reader.deserialize::<BillingRow>() {
            stats.rows_read += 1;
            match record {
                Ok(row) => {
                    if keep(&row) {
                        rows.push(row);
                        stats.rows_kept += 1;
                    }
                }
                Err(e) => {
                    if e.is_io_error() {
                        return Err(self.err(format!("read failed: {}", e)));
                    }
                    // Invoice total rows and the like carry blank or odd fields
                    stats.rows_malformed += 1;
                    debug!(error = %e, "Skipping undecodable billing row");
                }
            }
        }

        if stats.rows_malformed > 0 {
            warn!(
                path = %self.path.display(),
                rows_malformed = stats.rows_malformed,
                "Some billing rows could not be decoded and were skipped"
            );
        }

        Ok((rows, stats))
    }
}

fn missing_columns(headers: &csv::StringRecord) -> Vec<&'static str> {
    REQUIRED_COLUMNS
        .iter()
        .copied()
        .filter(|column| !headers.iter().any(|h| h.trim() == *column))
        .collect()
}

/// Load the billing rows at `path` that pass `keep`.
pub fn load_billing_rows<F>(path: &Path, keep: F) -> Result<(Vec<BillingRow>, LoadStats), CoverageError>
where
    F: Fn(&BillingRow) -> bool,
{
    BillingLoader::new(path).load(keep)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use std::io::Write;
    use tempfile::TempDir;

    const CSV: &str = "\
InvoiceID,PayerAccountId,LinkedAccountId,RecordType,ProductName,UsageType,Operation,AvailabilityZone,ReservedInstance,ItemDescription,UsageStartDate,UsageEndDate,UsageQuantity,ResourceId
123,111,222,LineItem,Amazon Elastic Compute Cloud,CNN1-BoxUsage:c4.xlarge,RunInstances,cn-north-1a,Y,\"CNY 0.0 per Linux/UNIX (Amazon VPC), c4.xlarge reserved instance applied\",2018-12-24 08:00:00,2018-12-24 09:00:00,1.00000000,i-0001
123,111,222,LineItem,Amazon Simple Storage Service,CNN1-Requests-Tier1,PutObject,,N,CNY 0.00405 per 1000 PUT requests,2018-12-24 08:00:00,2018-12-24 09:00:00,12.0,
123,111,,InvoiceTotal,,,,,,Total amount,,,,
";

    #[test]
    fn test_load_plain_csv() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("dbr.csv");
        std::fs::write(&path, CSV).unwrap();

        let (rows, stats) = load_billing_rows(&path, |_| true).unwrap();
        assert_eq!(stats.rows_read, 3);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].usage_type, "CNN1-BoxUsage:c4.xlarge");
        assert_eq!(rows[0].usage_quantity, Some(1.0));
        assert_eq!(rows[0].resource_id.as_deref(), Some("i-0001"));
        assert_eq!(rows[2].usage_quantity, None);
    }

    #[test]
    fn test_load_gzip_with_filter() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("dbr.csv.gz");
        let mut encoder = GzEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(CSV.as_bytes()).unwrap();
        std::fs::write(&path, encoder.finish().unwrap()).unwrap();

        let (rows, stats) =
            load_billing_rows(&path, |row| row.product_name == "Amazon Elastic Compute Cloud").unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(stats.rows_kept, 1);
        assert!(rows[0].is_reserved());
    }

    #[test]
    fn test_missing_columns_are_named() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("dbr.csv");
        std::fs::write(&path, "ProductName,UsageType\nAmazon Elastic Compute Cloud,BoxUsage:m4.large\n").unwrap();

        let err = load_billing_rows(&path, |_| true).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("Operation"), "{}", message);
        assert!(message.contains("UsageQuantity"), "{}", message);
        assert!(message.contains("dbr.csv"), "{}", message);
    }

    #[test]
    fn test_missing_file() {
        let err = load_billing_rows(Path::new("/nonexistent/dbr.csv.zip"), |_| true).unwrap_err();
        assert!(matches!(err, CoverageError::Billing { .. }));
    }
}
