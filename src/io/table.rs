//! Category table export
//!
//! One column per category. Columns have different lengths, so shorter ones
//! are padded with empty cells up to the longest.

use crate::domain::{Category, ClassificationReport};
use std::path::Path;
use tracing::info;

/// Column headers in output order
pub const TABLE_HEADERS: [&str; 3] = ["Inbound IPs", "Outbound IPs", "Stayed-In IPs"];

fn id_column(report: &ClassificationReport, category: Category) -> Vec<&str> {
    report.ids(category).into_iter().map(|id| id.as_str()).collect()
}

/// Three category columns padded to equal height
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryTable {
    rows: Vec<[Option<String>; 3]>,
}

impl CategoryTable {
    /// Build from three columns of ids. Row count is the longest column.
    pub fn from_columns(inbound: &[&str], outbound: &[&str], stayed_in: &[&str]) -> Self {
        let height = inbound.len().max(outbound.len()).max(stayed_in.len());
        let cell = |column: &[&str], i: usize| column.get(i).map(|s| s.to_string());

        let rows = (0..height)
            .map(|i| [cell(inbound, i), cell(outbound, i), cell(stayed_in, i)])
            .collect();

        Self { rows }
    }

    pub fn from_report(report: &ClassificationReport) -> Self {
        Self::from_columns(
            &id_column(report, Category::Inbound),
            &id_column(report, Category::Outbound),
            &id_column(report, Category::StayedIn),
        )
    }

    pub fn rows(&self) -> &[[Option<String>; 3]] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Write the table as CSV. Padding cells are written empty.
    pub fn write_csv<W: std::io::Write>(&self, writer: W) -> Result<(), csv::Error> {
        let mut w = csv::Writer::from_writer(writer);
        w.write_record(TABLE_HEADERS)?;
        for row in &self.rows {
            w.write_record(row.iter().map(|c| c.as_deref().unwrap_or("")))?;
        }
        w.flush()?;
        Ok(())
    }

    /// Write the table to a CSV file, creating parent directories
    pub fn write_file<P: AsRef<Path>>(&self, path: P) -> Result<(), csv::Error> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let file = std::fs::File::create(path)?;
        self.write_csv(file)?;
        info!(path = %path.display(), rows = %self.rows.len(), "category_table_written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_padding_sizes_3_1_0() {
        let table = CategoryTable::from_columns(&["a", "b", "c"], &["d"], &[]);
        assert_eq!(table.len(), 3);

        let rows = table.rows();
        assert_eq!(rows[0], [Some("a".to_string()), Some("d".to_string()), None]);
        assert_eq!(rows[1], [Some("b".to_string()), None, None]);
        assert_eq!(rows[2], [Some("c".to_string()), None, None]);
    }

    #[test]
    fn test_all_empty() {
        let table = CategoryTable::from_columns(&[], &[], &[]);
        assert!(table.is_empty());

        let mut out = Vec::new();
        table.write_csv(&mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "Inbound IPs,Outbound IPs,Stayed-In IPs\n");
    }

    #[test]
    fn test_write_csv_empty_cells() {
        let table = CategoryTable::from_columns(&["a", "b"], &[], &["c"]);
        let mut out = Vec::new();
        table.write_csv(&mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "Inbound IPs,Outbound IPs,Stayed-In IPs\na,,c\nb,,\n"
        );
    }
}
