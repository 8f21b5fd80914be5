//! CSV series source: one file per patient.

use crate::provider::{SeriesIter, SeriesProvider};
use hr_pulse_core::{
    config::IngestionConfig,
    types::{PatientId, Reading, Series},
    Error, Result,
};
use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Names of the columns read from each file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvColumns {
    pub offset: String,
    pub value: String,
}

impl Default for CsvColumns {
    fn default() -> Self {
        Self::from(&IngestionConfig::default())
    }
}

impl From<&IngestionConfig> for CsvColumns {
    fn from(config: &IngestionConfig) -> Self {
        Self {
            offset: config.offset_column.clone(),
            value: config.value_column.clone(),
        }
    }
}

/// Patient id from a file name: the stem, e.g. `heart_rate-17.csv` → `heart_rate-17`.
pub fn patient_id_from_path(path: &Path) -> Result<PatientId> {
    path.file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .map(PatientId::new)
        .ok_or_else(|| Error::validation(format!("Cannot derive patient id from {:?}", path)))
}

/// Load and validate one patient file.
///
/// Rejects missing columns, non-numeric or non-finite values, empty files and
/// offsets that are not contiguous, ascending and zero-based.
pub fn load_series(path: &Path, columns: &CsvColumns) -> Result<Series> {
    let patient = patient_id_from_path(path)?;
    let file = File::open(path)?;
    let mut reader = csv::Reader::from_reader(BufReader::new(file));

    let headers = reader
        .headers()
        .map_err(|e| Error::validation(format!("{:?}: failed to read headers: {}", path, e)))?
        .clone();

    let column_index = |name: &str| {
        headers
            .iter()
            .position(|h| h.trim() == name)
            .ok_or_else(|| Error::validation(format!("{:?}: column '{}' not found", path, name)))
    };
    let offset_idx = column_index(&columns.offset)?;
    let value_idx = column_index(&columns.value)?;

    let mut readings = Vec::new();
    for (row, record) in reader.records().enumerate() {
        let record = record
            .map_err(|e| Error::validation(format!("{:?}: row {}: {}", path, row + 1, e)))?;

        let offset = parse_offset(record.get(offset_idx)).ok_or_else(|| {
            Error::validation(format!(
                "{:?}: row {}: invalid {} {:?}",
                path,
                row + 1,
                columns.offset,
                record.get(offset_idx).unwrap_or_default()
            ))
        })?;
        if offset != row as u64 {
            return Err(Error::validation(format!(
                "{:?}: row {}: expected {} {}, found {}",
                path,
                row + 1,
                columns.offset,
                row,
                offset
            )));
        }

        let value = record
            .get(value_idx)
            .and_then(|v| v.trim().parse::<f64>().ok())
            .filter(|v| v.is_finite())
            .ok_or_else(|| {
                Error::validation(format!(
                    "{:?}: row {}: {} is not a finite number: {:?}",
                    path,
                    row + 1,
                    columns.value,
                    record.get(value_idx).unwrap_or_default()
                ))
            })?;

        readings.push(Reading::new(offset, value));
    }

    if readings.is_empty() {
        return Err(Error::validation(format!("{:?}: no readings", path)));
    }

    debug!(patient = %patient, readings = readings.len(), "Loaded series");
    Ok(Series::new(patient, readings))
}

fn parse_offset(raw: Option<&str>) -> Option<u64> {
    let raw = raw?.trim();
    if let Ok(offset) = raw.parse::<u64>() {
        return Some(offset);
    }
    // Offsets exported as floats, e.g. "12.0"
    let value = raw.parse::<f64>().ok()?;
    if value.is_finite() && value >= 0.0 && value.fract() == 0.0 {
        Some(value as u64)
    } else {
        None
    }
}

/// All `*.csv` files of a directory, in file-name order.
#[derive(Debug, Clone)]
pub struct CsvDirectoryProvider {
    dir: PathBuf,
    files: Vec<PathBuf>,
    columns: CsvColumns,
}

impl CsvDirectoryProvider {
    /// List the directory once; the file set is fixed afterwards.
    pub fn open(dir: impl AsRef<Path>, columns: CsvColumns) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        let entries = fs::read_dir(&dir).map_err(|e| {
            Error::config(format!("Failed to read data directory {:?}: {}", dir, e))
        })?;

        let mut files = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.is_file() && path.extension().map_or(false, |ext| ext == "csv") {
                files.push(path);
            }
        }
        files.sort();

        info!(dir = ?dir, files = files.len(), "Discovered patient files");
        Ok(Self {
            dir,
            files,
            columns,
        })
    }

    pub fn from_config(config: &IngestionConfig) -> Result<Self> {
        Self::open(&config.data_dir, CsvColumns::from(config))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }
}

impl SeriesProvider for CsvDirectoryProvider {
    fn name(&self) -> &str {
        "csv-directory"
    }

    fn source_count(&self) -> Option<usize> {
        Some(self.files.len())
    }

    fn series(&self) -> SeriesIter<'_> {
        Box::new(
            self.files
                .iter()
                .map(move |path| load_series(path, &self.columns)),
        )
    }
}
