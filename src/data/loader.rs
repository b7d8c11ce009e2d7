use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use arrow::array::{Array, Float32Array, Float64Array};
use chrono::{DateTime, Local};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

use super::model::SampleGrid;
use crate::pipeline::baseline::BaselineKind;

pub const WAVELENGTH_COLUMN: &str = "wavelength";
pub const INTENSITY_COLUMN: &str = "intensity";

// ---------------------------------------------------------------------------
// Public entry-points
// ---------------------------------------------------------------------------

/// Load one spectrum from a file.  Dispatch by extension.
///
/// Supported formats:
/// * `.csv`     – header row with `wavelength` and `intensity` columns; any
///   other column (e.g. a leading row index) is ignored
/// * `.parquet` – flat Float64/Float32 `wavelength` and `intensity` columns
pub fn load_spectrum(path: &Path) -> Result<SampleGrid> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let (x, y) = match ext.as_str() {
        "csv" => read_csv_columns(path)?,
        "parquet" | "pq" => read_parquet_columns(path)?,
        other => bail!("Unsupported file extension: .{other}"),
    };
    SampleGrid::new(x, y).with_context(|| format!("invalid spectrum in {}", path.display()))
}

/// Write a spectrum as two-column `wavelength,intensity` CSV.
pub fn save_spectrum_csv(path: &Path, wavelengths: &[f64], intensities: &[f64]) -> Result<()> {
    if wavelengths.len() != intensities.len() {
        bail!(
            "wavelengths has {} values but intensities has {}",
            wavelengths.len(),
            intensities.len()
        );
    }
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("creating {}", path.display()))?;
    writer.write_record([WAVELENGTH_COLUMN, INTENSITY_COLUMN])?;
    for (x, y) in wavelengths.iter().zip(intensities) {
        writer.write_record([x.to_string(), y.to_string()])?;
    }
    writer.flush().context("flushing CSV")?;
    Ok(())
}

// ---------------------------------------------------------------------------
// File naming and folder listing
// ---------------------------------------------------------------------------

/// File-name prefix used when capturing a baseline of the given kind.
pub fn capture_prefix(kind: BaselineKind) -> &'static str {
    match kind {
        BaselineKind::Dark => "dark",
        BaselineKind::Reference => "bright",
    }
}

/// `dark-YYMMDD-HHMMSS.csv` / `bright-YYMMDD-HHMMSS.csv`.
pub fn capture_file_name(kind: BaselineKind, at: DateTime<Local>) -> String {
    format!("{}-{}.csv", capture_prefix(kind), at.format("%y%m%d-%H%M%S"))
}

/// `result-YYMMDD-HHMMSS`, the stem of an exported results set.
pub fn results_name(at: DateTime<Local>) -> String {
    format!("result-{}", at.format("%y%m%d-%H%M%S"))
}

/// Spectrum files (`.csv`, `.parquet`, `.pq`) directly inside `folder`,
/// sorted by name. A missing folder yields an empty list.
pub fn list_spectrum_files(folder: &Path) -> Result<Vec<PathBuf>> {
    if !folder.is_dir() {
        return Ok(Vec::new());
    }
    let mut files = Vec::new();
    for entry in std::fs::read_dir(folder).with_context(|| format!("listing {}", folder.display()))? {
        let path = entry?.path();
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        if path.is_file() && matches!(ext.as_deref(), Some("csv" | "parquet" | "pq")) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

fn read_csv_columns(path: &Path) -> Result<(Vec<f64>, Vec<f64>)> {
    let mut reader = csv::Reader::from_path(path).context("opening CSV")?;
    let headers: Vec<String> = reader
        .headers()
        .context("reading CSV headers")?
        .iter()
        .map(|h| h.trim().to_ascii_lowercase())
        .collect();

    let x_idx = headers
        .iter()
        .position(|h| h == WAVELENGTH_COLUMN)
        .context("CSV missing 'wavelength' column")?;
    let y_idx = headers
        .iter()
        .position(|h| h == INTENSITY_COLUMN)
        .context("CSV missing 'intensity' column")?;

    let mut x = Vec::new();
    let mut y = Vec::new();
    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("CSV row {row_no}"))?;
        x.push(parse_cell(record.get(x_idx), row_no, WAVELENGTH_COLUMN)?);
        y.push(parse_cell(record.get(y_idx), row_no, INTENSITY_COLUMN)?);
    }
    Ok((x, y))
}

fn parse_cell(cell: Option<&str>, row: usize, col: &str) -> Result<f64> {
    let tok = cell.unwrap_or("").trim();
    tok.parse::<f64>()
        .with_context(|| format!("Row {row}, {col}: '{tok}' is not a number"))
}

// ---------------------------------------------------------------------------
// Parquet loader
// ---------------------------------------------------------------------------

fn read_parquet_columns(path: &Path) -> Result<(Vec<f64>, Vec<f64>)> {
    let file = std::fs::File::open(path).context("opening parquet file")?;
    let builder =
        ParquetRecordBatchReaderBuilder::try_new(file).context("reading parquet metadata")?;
    let reader = builder.build().context("building parquet reader")?;

    let mut x = Vec::new();
    let mut y = Vec::new();
    for batch_result in reader {
        let batch = batch_result.context("reading parquet record batch")?;
        let schema = batch.schema();
        let x_idx = schema
            .index_of(WAVELENGTH_COLUMN)
            .map_err(|_| anyhow::anyhow!("Parquet file missing 'wavelength' column"))?;
        let y_idx = schema
            .index_of(INTENSITY_COLUMN)
            .map_err(|_| anyhow::anyhow!("Parquet file missing 'intensity' column"))?;

        append_f64_column(batch.column(x_idx).as_ref(), &mut x)
            .context("reading 'wavelength'")?;
        append_f64_column(batch.column(y_idx).as_ref(), &mut y)
            .context("reading 'intensity'")?;
    }
    Ok((x, y))
}

/// Append a Float64 or Float32 column; nulls become NaN.
fn append_f64_column(col: &dyn Array, out: &mut Vec<f64>) -> Result<()> {
    if let Some(arr) = col.as_any().downcast_ref::<Float64Array>() {
        out.extend(arr.iter().map(|v| v.unwrap_or(f64::NAN)));
    } else if let Some(arr) = col.as_any().downcast_ref::<Float32Array>() {
        out.extend(arr.iter().map(|v| v.map_or(f64::NAN, f64::from)));
    } else {
        bail!("column type is {:?}, expected Float64 or Float32", col.data_type());
    }
    Ok(())
}
