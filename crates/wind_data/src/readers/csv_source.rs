use crate::error::ProviderError;
use crate::provider::ColumnLayout;
use anyhow::{Context, Result};
use csv::{ReaderBuilder, StringRecord, Trim};
use std::path::{Path, PathBuf};

/// The numeric fields extracted from one data row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldRow {
    pub value: f32,
    /// Present only when the layout names an hour column.
    pub hour: Option<f32>,
}

/// Streams a comma-separated file row by row, skipping the header, and
/// extracts the fields named by a [`ColumnLayout`].
///
/// Columns are addressed from the end of each row, so rows may carry any
/// number of leading fields.
///
/// # Example
/// ```ignore
/// let source = CsvColumnSource::new("forecast.csv", ColumnLayout::FEATURES);
/// for row in source.stream()? {
///     let row = row?;
/// }
/// ```
pub struct CsvColumnSource {
    path: PathBuf,
    columns: ColumnLayout,
}

impl CsvColumnSource {
    pub fn new(path: impl Into<PathBuf>, columns: ColumnLayout) -> Self {
        Self {
            path: path.into(),
            columns,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Opens the file and returns a lazy iterator over parsed rows.
    ///
    /// The first malformed row yields an error carrying a
    /// [`ProviderError::MalformedRow`]; callers are expected to stop there.
    pub fn stream(&self) -> Result<Box<dyn Iterator<Item = Result<FieldRow>> + Send>> {
        let reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(Trim::All)
            .from_path(&self.path)
            .with_context(|| format!("Failed to open CSV file: {}", self.path.display()))?;

        let columns = self.columns;
        let path = self.path.clone();
        let iter = reader.into_records().map(move |record| {
            let record = record
                .with_context(|| format!("Failed to read CSV record from {}", path.display()))?;
            parse_row(&record, &columns)
                .with_context(|| format!("Invalid row in {}", path.display()))
        });
        Ok(Box::new(iter))
    }
}

fn parse_row(record: &StringRecord, columns: &ColumnLayout) -> Result<FieldRow> {
    let line = record.position().map(|p| p.line()).unwrap_or(0);
    let value = parse_from_end(record, columns.value_from_end, line, "value")?;
    let hour = match columns.hour_from_end {
        Some(offset) => Some(parse_from_end(record, offset, line, "hour")?),
        None => None,
    };
    Ok(FieldRow { value, hour })
}

/// Reads the field `offset` positions from the end (1 = last field).
fn parse_from_end(
    record: &StringRecord,
    offset: usize,
    line: u64,
    field: &'static str,
) -> Result<f32, ProviderError> {
    let raw = offset
        .checked_sub(1)
        .and_then(|back| record.len().checked_sub(back + 1))
        .and_then(|idx| record.get(idx))
        .ok_or_else(|| ProviderError::MalformedRow {
            line,
            field,
            reason: format!(
                "is missing ({} columns, need at least {})",
                record.len(),
                offset
            ),
        })?;

    raw.parse::<f32>().map_err(|e| ProviderError::MalformedRow {
        line,
        field,
        reason: format!("'{}' is not a number: {}", raw, e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_csv(lines: &[&str]) -> Result<NamedTempFile> {
        let mut file = NamedTempFile::new()?;
        for line in lines {
            writeln!(file, "{}", line)?;
        }
        Ok(file)
    }

    #[test]
    fn streams_fields_from_the_end() -> Result<()> {
        let file = write_csv(&[
            "xid,yid,date_id,hour,model,wind",
            "1,1,3,5,1,12.5",
            "1,2,3,6,2, 7.25",
        ])?;

        let source = CsvColumnSource::new(file.path(), ColumnLayout::FEATURES);
        let rows: Vec<FieldRow> = source.stream()?.collect::<Result<_>>()?;
        assert_eq!(
            rows,
            vec![
                FieldRow {
                    value: 12.5,
                    hour: Some(5.0)
                },
                FieldRow {
                    value: 7.25,
                    hour: Some(6.0)
                },
            ]
        );
        Ok(())
    }

    #[test]
    fn header_only_file_yields_nothing() -> Result<()> {
        let file = write_csv(&["xid,yid,date_id,hour,wind"])?;
        let source = CsvColumnSource::new(file.path(), ColumnLayout::LABELS);
        assert_eq!(source.stream()?.count(), 0);
        Ok(())
    }

    #[test]
    fn unparseable_value_is_a_malformed_row() -> Result<()> {
        let file = write_csv(&["a,wind", "1,3.0", "2,windy"])?;
        let source = CsvColumnSource::new(file.path(), ColumnLayout::LABELS);
        let results: Vec<Result<FieldRow>> = source.stream()?.collect();

        assert!(results[0].is_ok());
        let err = results[1].as_ref().unwrap_err();
        match err.downcast_ref::<ProviderError>() {
            Some(ProviderError::MalformedRow { line, field, .. }) => {
                assert_eq!(*line, 3);
                assert_eq!(*field, "value");
            }
            other => panic!("expected MalformedRow, got {:?}", other),
        }
        Ok(())
    }

    #[test]
    fn short_row_is_a_malformed_row() -> Result<()> {
        let file = write_csv(&["hour,x,wind", "4,2,1.0", "9.0"])?;
        let source = CsvColumnSource::new(file.path(), ColumnLayout::FEATURES);
        let results: Vec<Result<FieldRow>> = source.stream()?.collect();

        assert!(results[0].is_ok());
        let err = results[1].as_ref().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ProviderError>(),
            Some(ProviderError::MalformedRow { field: "hour", .. })
        ));
        Ok(())
    }

    #[test]
    fn missing_file_reports_path() {
        let source = CsvColumnSource::new("/definitely/not/here.csv", ColumnLayout::LABELS);
        let err = source.stream().err().expect("missing file must fail");
        assert!(format!("{:#}", err).contains("/definitely/not/here.csv"));
    }
}
