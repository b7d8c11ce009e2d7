use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use arrow::array::{ArrayRef, Float64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use rust_xlsxwriter::Workbook as XlsxWorkbook;

/// File name of the single-file xlsx export.
pub const XLSX_FILE_NAME: &str = "results.xlsx";

// ---------------------------------------------------------------------------
// Workbook model
// ---------------------------------------------------------------------------

/// One named column of a sheet. Columns of a sheet may differ in length;
/// shorter columns are padded with empty cells on output.
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    Float { header: String, values: Vec<f64> },
    Text { header: String, values: Vec<String> },
}

impl Column {
    pub fn float(header: &str, values: impl Into<Vec<f64>>) -> Self {
        Column::Float {
            header: header.to_string(),
            values: values.into(),
        }
    }

    pub fn text(header: &str, values: Vec<String>) -> Self {
        Column::Text {
            header: header.to_string(),
            values,
        }
    }

    pub fn header(&self) -> &str {
        match self {
            Column::Float { header, .. } | Column::Text { header, .. } => header,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Column::Float { values, .. } => values.len(),
            Column::Text { values, .. } => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn cell(&self, row: usize) -> String {
        match self {
            Column::Float { values, .. } => values.get(row).map(f64::to_string).unwrap_or_default(),
            Column::Text { values, .. } => values.get(row).cloned().unwrap_or_default(),
        }
    }
}

/// A named table.
#[derive(Debug, Clone, PartialEq)]
pub struct Sheet {
    pub name: String,
    pub columns: Vec<Column>,
}

impl Sheet {
    pub fn new(name: &str, columns: Vec<Column>) -> Self {
        Self {
            name: name.to_string(),
            columns,
        }
    }

    /// A two-column `key,value` sheet.
    pub fn key_value(name: &str, entries: &[(String, String)]) -> Self {
        let (keys, values): (Vec<String>, Vec<String>) = entries.iter().cloned().unzip();
        Self::new(
            name,
            vec![Column::text("key", keys), Column::text("value", values)],
        )
    }

    pub fn row_count(&self) -> usize {
        self.columns.iter().map(Column::len).max().unwrap_or(0)
    }
}

/// An ordered collection of sheets, written as one file per sheet.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Workbook {
    pub sheets: Vec<Sheet>,
}

impl Workbook {
    pub fn push(&mut self, sheet: Sheet) {
        self.sheets.push(sheet);
    }

    pub fn sheet(&self, name: &str) -> Option<&Sheet> {
        self.sheets.iter().find(|s| s.name == name)
    }
}

// ---------------------------------------------------------------------------
// Results workbook
// ---------------------------------------------------------------------------

/// Everything a results export contains, borrowed from the live session.
#[derive(Debug, Clone, Default)]
pub struct ResultsInput<'a> {
    pub wavelengths: &'a [f64],
    pub dark: &'a [f64],
    pub dark_smoothed: &'a [f64],
    pub reference: &'a [f64],
    pub reference_smoothed: &'a [f64],
    pub transmission_wavelengths: &'a [f64],
    pub transmission: &'a [f64],
    pub centroids: &'a [f64],
    pub centroids_smoothed: &'a [f64],
    pub intensities: &'a [f64],
    pub intensities_smoothed: &'a [f64],
    pub minima: &'a [f64],
    pub area_ratios: &'a [f64],
    /// NaN where a tick had no band comparison.
    pub band_intensity_ratios: &'a [f64],
    pub band_area_ratios: &'a [f64],
    /// Tick period; run sheets get a leading `time` column in seconds.
    pub sample_period_ms: u32,
    pub parameters: Vec<(String, String)>,
}

/// A run sheet with a leading `time` column covering its longest column.
fn timed_sheet(name: &str, columns: Vec<Column>, sample_period_ms: u32) -> Sheet {
    let rows = columns.iter().map(Column::len).max().unwrap_or(0);
    let period = f64::from(sample_period_ms) / 1000.0;
    let time: Vec<f64> = (0..rows).map(|i| i as f64 * period).collect();
    let mut all = Vec::with_capacity(columns.len() + 1);
    all.push(Column::float("time", time));
    all.extend(columns);
    Sheet::new(name, all)
}

/// The results layout: spectrum, transmission, centroid, intensity, minimum,
/// area ratio, band ratio (only when the run has band values) and run
/// parameters.
pub fn results_workbook(input: &ResultsInput<'_>) -> Workbook {
    let mut wb = Workbook::default();
    wb.push(Sheet::new(
        "spectrum",
        vec![
            Column::float("Wave Length", input.wavelengths),
            Column::float("Dark Intensity", input.dark),
            Column::float("Dark Intensity(smooth)", input.dark_smoothed),
            Column::float("Reference Intensity", input.reference),
            Column::float("Reference Intensity(smooth)", input.reference_smoothed),
        ],
    ));
    wb.push(Sheet::new(
        "transmission",
        vec![
            Column::float("Wave Length", input.transmission_wavelengths),
            Column::float("Ratio", input.transmission),
        ],
    ));
    let period = input.sample_period_ms;
    wb.push(timed_sheet(
        "centroid",
        vec![
            Column::float("Centroid", input.centroids),
            Column::float("Centroid(smooth)", input.centroids_smoothed),
        ],
        period,
    ));
    wb.push(timed_sheet(
        "intensity",
        vec![
            Column::float("Intensity", input.intensities),
            Column::float("Intensity(smooth)", input.intensities_smoothed),
        ],
        period,
    ));
    wb.push(timed_sheet(
        "minimum",
        vec![Column::float("Minimal", input.minima)],
        period,
    ));
    wb.push(timed_sheet(
        "area_ratio",
        vec![Column::float("Ratio of area", input.area_ratios)],
        period,
    ));
    let has_bands = input
        .band_intensity_ratios
        .iter()
        .chain(input.band_area_ratios)
        .any(|v| !v.is_nan());
    if has_bands {
        wb.push(timed_sheet(
            "band_ratio",
            vec![
                Column::float("Intensity Ratio", input.band_intensity_ratios),
                Column::float("Area Ratio", input.band_area_ratios),
            ],
            period,
        ));
    }
    wb.push(Sheet::key_value("parameters", &input.parameters));
    wb
}

// ---------------------------------------------------------------------------
// Writers
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Parquet,
    /// One workbook file, one worksheet per sheet.
    Xlsx,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Parquet => "parquet",
            ExportFormat::Xlsx => "xlsx",
        }
    }
}

/// Write `workbook` into directory `dir` (created if needed): one
/// `<sheet>.<ext>` file per sheet, or a single [`XLSX_FILE_NAME`] for
/// [`ExportFormat::Xlsx`]. Returns the written file paths.
pub fn write_workbook(dir: &Path, workbook: &Workbook, format: ExportFormat) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    let written = match format {
        ExportFormat::Xlsx => {
            let path = dir.join(XLSX_FILE_NAME);
            write_xlsx(&path, workbook).with_context(|| format!("writing {}", path.display()))?;
            vec![path]
        }
        ExportFormat::Csv | ExportFormat::Parquet => {
            let mut written = Vec::with_capacity(workbook.sheets.len());
            for sheet in &workbook.sheets {
                let path = dir.join(format!("{}.{}", sheet.name, format.extension()));
                if format == ExportFormat::Csv {
                    write_sheet_csv(&path, sheet)
                } else {
                    write_sheet_parquet(&path, sheet)
                }
                .with_context(|| format!("writing sheet '{}'", sheet.name))?;
                written.push(path);
            }
            written
        }
    };
    log::info!(
        "Exported {} sheets to {} ({:?})",
        workbook.sheets.len(),
        dir.display(),
        format
    );
    Ok(written)
}

fn write_sheet_csv(path: &Path, sheet: &Sheet) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(sheet.columns.iter().map(Column::header))?;
    for row in 0..sheet.row_count() {
        writer.write_record(sheet.columns.iter().map(|c| c.cell(row)))?;
    }
    writer.flush()?;
    Ok(())
}

fn write_sheet_parquet(path: &Path, sheet: &Sheet) -> Result<()> {
    if sheet.columns.is_empty() {
        bail!("sheet has no columns");
    }
    let rows = sheet.row_count();
    let mut fields = Vec::with_capacity(sheet.columns.len());
    let mut arrays: Vec<ArrayRef> = Vec::with_capacity(sheet.columns.len());

    for col in &sheet.columns {
        match col {
            Column::Float { header, values } => {
                fields.push(Field::new(header, DataType::Float64, true));
                let padded: Float64Array =
                    (0..rows).map(|i| values.get(i).copied()).collect();
                arrays.push(Arc::new(padded));
            }
            Column::Text { header, values } => {
                fields.push(Field::new(header, DataType::Utf8, true));
                let padded: StringArray =
                    (0..rows).map(|i| values.get(i).map(String::as_str)).collect();
                arrays.push(Arc::new(padded));
            }
        }
    }

    let schema = Arc::new(Schema::new(fields));
    let batch = RecordBatch::try_new(schema.clone(), arrays).context("building record batch")?;
    let file = std::fs::File::create(path)?;
    let mut writer = ArrowWriter::try_new(file, schema, None)?;
    writer.write(&batch)?;
    writer.close()?;
    Ok(())
}

fn write_xlsx(path: &Path, workbook: &Workbook) -> Result<()> {
    let mut book = XlsxWorkbook::new();
    for sheet in &workbook.sheets {
        let ws = book.add_worksheet();
        ws.set_name(&sheet.name)?;
        for (c, column) in sheet.columns.iter().enumerate() {
            let col = u16::try_from(c).context("too many columns for xlsx")?;
            ws.write_string(0, col, column.header())?;
            match column {
                Column::Float { values, .. } => {
                    for (r, &v) in values.iter().enumerate() {
                        // Non-finite values stay empty cells.
                        if v.is_finite() {
                            ws.write_number(xlsx_row(r)?, col, v)?;
                        }
                    }
                }
                Column::Text { values, .. } => {
                    for (r, v) in values.iter().enumerate() {
                        ws.write_string(xlsx_row(r)?, col, v)?;
                    }
                }
            }
        }
    }
    book.save(path)?;
    Ok(())
}

/// Worksheet row of data row `r`, below the header.
fn xlsx_row(r: usize) -> Result<u32> {
    u32::try_from(r + 1).context("too many rows for xlsx")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("fiberx-export-{}-{name}", std::process::id()))
    }

    fn sample_workbook() -> Workbook {
        let mut wb = Workbook::default();
        wb.push(Sheet::new(
            "centroid",
            vec![
                Column::float("Centroid", vec![700.1, 700.2, 700.3]),
                Column::float("Centroid(smooth)", vec![700.15, 700.2]),
            ],
        ));
        wb.push(Sheet::key_value(
            "parameters",
            &[("Sample period (ms)".to_string(), "1000".to_string())],
        ));
        wb
    }

    #[test]
    fn test_csv_pads_short_columns() {
        let dir = temp_dir("csv");
        let files = write_workbook(&dir, &sample_workbook(), ExportFormat::Csv).unwrap();
        assert_eq!(files.len(), 2);
        let text = std::fs::read_to_string(dir.join("centroid.csv")).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Centroid,Centroid(smooth)");
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[3], "700.3,");
        let params = std::fs::read_to_string(dir.join("parameters.csv")).unwrap();
        assert!(params.contains("Sample period (ms),1000"));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_parquet_sheets_readable() {
        use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

        let dir = temp_dir("parquet");
        write_workbook(&dir, &sample_workbook(), ExportFormat::Parquet).unwrap();
        let file = std::fs::File::open(dir.join("centroid.parquet")).unwrap();
        let reader = ParquetRecordBatchReaderBuilder::try_new(file)
            .unwrap()
            .build()
            .unwrap();
        let rows: usize = reader.map(|b| b.unwrap().num_rows()).sum();
        assert_eq!(rows, 3);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_xlsx_single_file() {
        use std::io::Read;

        let dir = temp_dir("xlsx");
        let mut wb = sample_workbook();
        wb.push(Sheet::new(
            "gaps",
            vec![Column::float("Ratio", vec![1.0, f64::NAN, f64::INFINITY])],
        ));
        let files = write_workbook(&dir, &wb, ExportFormat::Xlsx).unwrap();
        assert_eq!(files, vec![dir.join(XLSX_FILE_NAME)]);
        assert!(!dir.join("centroid.csv").exists());

        // xlsx is a zip archive.
        let mut magic = [0u8; 2];
        std::fs::File::open(&files[0])
            .unwrap()
            .read_exact(&mut magic)
            .unwrap();
        assert_eq!(&magic, b"PK");
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_results_workbook_layout() {
        let input = ResultsInput {
            centroids: &[1.0, 2.0],
            centroids_smoothed: &[1.0, 2.0],
            minima: &[700.0, 701.0, 702.0],
            area_ratios: &[100.0],
            band_intensity_ratios: &[f64::NAN],
            band_area_ratios: &[f64::NAN],
            sample_period_ms: 500,
            parameters: vec![("Centroid half-window (nm)".into(), "25".into())],
            ..Default::default()
        };
        let wb = results_workbook(&input);
        let names: Vec<&str> = wb.sheets.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(
            names,
            [
                "spectrum",
                "transmission",
                "centroid",
                "intensity",
                "minimum",
                "area_ratio",
                "parameters"
            ]
        );
        assert_eq!(wb.sheet("centroid").unwrap().row_count(), 2);
        assert_eq!(wb.sheet("spectrum").unwrap().row_count(), 0);

        for name in ["centroid", "intensity", "minimum", "area_ratio"] {
            assert_eq!(wb.sheet(name).unwrap().columns[0].header(), "time", "{name}");
        }
        assert_eq!(
            wb.sheet("minimum").unwrap().columns[0],
            Column::float("time", vec![0.0, 0.5, 1.0])
        );
        assert_eq!(wb.sheet("centroid").unwrap().columns[1].header(), "Centroid");
        assert_eq!(wb.sheet("spectrum").unwrap().columns[0].header(), "Wave Length");

        let banded = results_workbook(&ResultsInput {
            band_intensity_ratios: &[f64::NAN, 50.0],
            band_area_ratios: &[f64::NAN, 48.0],
            sample_period_ms: 1000,
            ..Default::default()
        });
        let sheet = banded.sheet("band_ratio").unwrap();
        let headers: Vec<&str> = sheet.columns.iter().map(Column::header).collect();
        assert_eq!(headers, ["time", "Intensity Ratio", "Area Ratio"]);
        assert_eq!(sheet.columns[0], Column::float("time", vec![0.0, 1.0]));
    }

    #[test]
    fn test_sheet_lookup() {
        let wb = sample_workbook();
        assert_eq!(wb.sheet("parameters").unwrap().row_count(), 1);
        assert!(wb.sheet("missing").is_none());
    }
}
