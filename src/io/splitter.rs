//! Location splitter - rewrites a CSV with latitude/longitude columns
//!
//! The combined "lat,lon" column is kept as-is and two numeric columns are
//! appended. Any value that does not parse fails the conversion.

use crate::domain::LoadError;
use crate::infra::config::Columns;
use crate::io::loader::{find_column, parse_location};
use std::io::{Read, Write};
use std::path::Path;
use tracing::info;

/// Split the location column of `reader` into `writer`. Returns rows written.
pub fn split_location_columns<R: Read, W: Write>(
    reader: R,
    writer: W,
    columns: &Columns,
) -> Result<u64, LoadError> {
    let mut csv_reader = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
    let mut csv_writer = csv::WriterBuilder::new().flexible(true).from_writer(writer);

    let mut headers = csv_reader.headers()?.clone();
    let location = find_column(&headers, &columns.location)
        .ok_or_else(|| LoadError::MissingColumn { column: columns.location.clone() })?;

    headers.push_field(&columns.latitude);
    headers.push_field(&columns.longitude);
    csv_writer.write_record(&headers)?;

    let mut rows = 0u64;
    for (i, record) in csv_reader.records().enumerate() {
        let mut record = record?;
        let row = i as u64 + 1;
        let raw = record.get(location).unwrap_or("").to_string();
        let point = parse_location(&raw)
            .map_err(|reason| LoadError::MalformedCoordinate { row, value: raw.clone(), reason })?;

        record.push_field(&point.latitude.to_string());
        record.push_field(&point.longitude.to_string());
        csv_writer.write_record(&record)?;
        rows += 1;
    }

    csv_writer.flush()?;
    Ok(rows)
}

/// File-to-file variant of `split_location_columns`
pub fn split_file<P: AsRef<Path>, Q: AsRef<Path>>(
    input: P,
    output: Q,
    columns: &Columns,
) -> Result<u64, LoadError> {
    let (input, output) = (input.as_ref(), output.as_ref());
    let reader = std::fs::File::open(input)?;
    if let Some(parent) = output.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let writer = std::fs::File::create(output)?;

    let rows = split_location_columns(reader, writer, columns)?;
    info!(
        input = %input.display(),
        output = %output.display(),
        rows = %rows,
        "location_columns_split"
    );
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_appends_columns() {
        let input = "\
IP ADDRESS,REQ. TIME,LOCATION
10.0.0.1,2024-05-01 10:00:00,\"32.8678,74.2564\"
10.0.0.2,2024-05-01 10:01:00,\"31.5, 74.35\"
";
        let mut out = Vec::new();
        let rows = split_location_columns(input.as_bytes(), &mut out, &Columns::default()).unwrap();
        assert_eq!(rows, 2);

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "IP ADDRESS,REQ. TIME,LOCATION,latitude,longitude");
        assert_eq!(lines[1], "10.0.0.1,2024-05-01 10:00:00,\"32.8678,74.2564\",32.8678,74.2564");
        assert_eq!(lines[2], "10.0.0.2,2024-05-01 10:01:00,\"31.5, 74.35\",31.5,74.35");
    }

    #[test]
    fn test_split_missing_location_column() {
        let input = "IP ADDRESS,REQ. TIME\n10.0.0.1,2024-05-01 10:00:00\n";
        let err =
            split_location_columns(input.as_bytes(), Vec::new(), &Columns::default()).unwrap_err();
        assert!(matches!(err, LoadError::MissingColumn { .. }));
    }

    #[test]
    fn test_split_fails_on_bad_value() {
        let input = "LOCATION\n\"1.0,2.0\"\nnowhere\n";
        let err =
            split_location_columns(input.as_bytes(), Vec::new(), &Columns::default()).unwrap_err();
        assert!(matches!(err, LoadError::MalformedCoordinate { row: 2, .. }));
    }

    #[test]
    fn test_split_output_loads() {
        use crate::infra::config::MalformedPolicy;
        use crate::infra::metrics::RunStats;
        use crate::io::loader::Loader;

        let input = "IP ADDRESS,REQ. TIME,LOCATION\n10.0.0.1,2024-05-01 10:00:00,\"1.5,2.5\"\n";
        let mut out = Vec::new();
        split_location_columns(input.as_bytes(), &mut out, &Columns::default()).unwrap();

        let devices = Loader::new(Columns::default(), MalformedPolicy::Abort)
            .load_from_reader(out.as_slice(), &RunStats::new())
            .unwrap();
        assert_eq!(devices.len(), 1);
    }
}
