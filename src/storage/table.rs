//! Whole-file CSV tables
//!
//! Post-processing steps rewrite individual cells of a finished CSV, keeping
//! its header and column order intact.

use crate::storage::csv_sink::UTF8_BOM;
use crate::storage::traits::StorageResult;
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

/// A CSV file held in memory
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CsvTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl CsvTable {
    /// Reads a CSV with a header row; a leading byte-order mark is ignored
    pub fn read(path: &Path) -> StorageResult<Self> {
        let mut reader = csv::ReaderBuilder::new().flexible(true).from_path(path)?;

        let mut headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
        if let Some(first) = headers.first_mut() {
            *first = first.trim_start_matches('\u{feff}').to_string();
        }

        let width = headers.len();
        let mut rows = Vec::new();
        for record in reader.records() {
            let mut row: Vec<String> = record?.iter().map(str::to_string).collect();
            row.resize(width, String::new());
            rows.push(row);
        }

        Ok(Self { headers, rows })
    }

    /// Writes the table with a byte-order mark, replacing any existing file
    pub fn write(&self, path: &Path) -> StorageResult<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut file = File::create(path)?;
        file.write_all(UTF8_BOM)?;
        let mut writer = csv::Writer::from_writer(file);
        writer.write_record(&self.headers)?;
        for row in &self.rows {
            writer.write_record(row)?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Index of the column named `name`
    pub fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::{DetailFields, Item, ProductFields};
    use crate::storage::{BatchSink, ColumnSchema, CsvBatchSink};
    use tempfile::TempDir;

    #[test]
    fn test_reads_what_the_batch_sink_writes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("complete.csv");
        let mut item = Item::stub(ProductFields {
            name: "Magnesium, 100 Tablets".to_string(),
            url: "https://shop.test/p/magnesium".to_string(),
            ..Default::default()
        });
        item.merge_details(DetailFields {
            ingredients: "Magnesium oxide\nBulking agent".to_string(),
            ..Default::default()
        });
        let mut sink = CsvBatchSink::new(&path, ColumnSchema::Complete);
        sink.write_batch(&[item], 1, true).unwrap();

        let table = CsvTable::read(&path).unwrap();
        assert_eq!(table.headers, ColumnSchema::Complete.headers());
        assert_eq!(table.len(), 1);

        let name = table.column("产品名称").unwrap();
        let ingredients = table.column("配料表").unwrap();
        assert_eq!(table.rows[0][name], "Magnesium, 100 Tablets");
        assert_eq!(table.rows[0][ingredients], "Magnesium oxide\nBulking agent");
    }

    #[test]
    fn test_write_keeps_bom_and_columns() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/table.csv");
        let table = CsvTable {
            headers: vec!["a".to_string(), "b".to_string()],
            rows: vec![vec!["1".to_string(), "x, y".to_string()]],
        };

        table.write(&path).unwrap();

        assert!(fs::read(&path).unwrap().starts_with(UTF8_BOM));
        assert_eq!(CsvTable::read(&path).unwrap(), table);
        assert_eq!(table.column("b"), Some(1));
        assert_eq!(table.column("c"), None);
    }
}
