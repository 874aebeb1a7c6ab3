//! Batched CSV output
//!
//! Files start with a UTF-8 byte-order mark so spreadsheet tools detect the
//! encoding and non-ASCII product text survives a round trip.

use crate::item::Item;
use crate::storage::traits::{BatchSink, StorageResult};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

pub(crate) const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Column layouts for product CSVs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnSchema {
    /// Listing fields only
    Basic,
    /// Listing and detail fields under the localized headers
    Complete,
}

impl ColumnSchema {
    pub fn headers(&self) -> &'static [&'static str] {
        match self {
            Self::Basic => &["brand", "name", "price", "image", "url"],
            Self::Complete => &[
                "产品名称",
                "产品亮点",
                "产品价格",
                "产品品牌",
                "产品图",
                "产品描述",
                "产品类型",
                "作用部位",
                "用法说明",
                "营养成分",
                "配料表",
                "URL",
            ],
        }
    }

    /// One CSV row for `item`; detail columns are empty for stub items
    pub fn row(&self, item: &Item) -> Vec<String> {
        let p = item.product.clone();
        match self {
            Self::Basic => vec![p.brand, p.name, p.price, p.image, p.url],
            Self::Complete => {
                let d = item.details.clone().unwrap_or_default();
                vec![
                    p.name,
                    d.highlights,
                    p.price,
                    p.brand,
                    p.image,
                    d.description,
                    d.product_type,
                    d.target_area,
                    d.directions,
                    d.nutritional_info,
                    d.ingredients,
                    p.url,
                ]
            }
        }
    }
}

/// Writes item batches to a CSV file
#[derive(Debug)]
pub struct CsvBatchSink {
    path: PathBuf,
    schema: ColumnSchema,
    rows_written: usize,
}

impl CsvBatchSink {
    pub fn new(path: impl Into<PathBuf>, schema: ColumnSchema) -> Self {
        Self {
            path: path.into(),
            schema,
            rows_written: 0,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rows written by this sink since it was created
    pub fn rows_written(&self) -> usize {
        self.rows_written
    }

    /// Writes `items` as the whole file
    pub fn write_all(&mut self, items: &[Item]) -> StorageResult<()> {
        self.write_batch(items, 1, true)
    }

    fn open(&self, fresh: bool) -> StorageResult<File> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let file = if fresh {
            let mut file = File::create(&self.path)?;
            file.write_all(UTF8_BOM)?;
            file
        } else {
            OpenOptions::new().append(true).open(&self.path)?
        };
        Ok(file)
    }
}

impl BatchSink for CsvBatchSink {
    fn write_batch(
        &mut self,
        items: &[Item],
        batch_number: usize,
        is_first: bool,
    ) -> StorageResult<()> {
        // An append with no file behind it starts the file instead
        let fresh = is_first || !self.path.exists();
        let file = self.open(fresh)?;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        if fresh {
            writer.write_record(self.schema.headers())?;
        }
        for item in items {
            writer.write_record(self.schema.row(item))?;
        }
        writer.flush()?;

        self.rows_written += items.len();
        tracing::info!(
            "Batch {}: wrote {} rows to {}",
            batch_number,
            items.len(),
            self.path.display()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::{DetailFields, ProductFields};
    use tempfile::TempDir;

    fn item(name: &str, enriched: bool) -> Item {
        let mut item = Item::stub(ProductFields {
            brand: "Holland & Barrett".to_string(),
            name: name.to_string(),
            price: "£4.99".to_string(),
            image: String::new(),
            url: format!("https://shop.test/p/{}", name.replace(' ', "-")),
        });
        if enriched {
            item.merge_details(DetailFields {
                highlights: "Vegan; Gluten free".to_string(),
                nutritional_info: "Vitamin D: 25µg".to_string(),
                ..Default::default()
            });
        }
        item
    }

    fn read(path: &Path) -> Vec<u8> {
        fs::read(path).unwrap()
    }

    #[test]
    fn test_first_batch_writes_bom_and_header() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out/basic.csv");
        let mut sink = CsvBatchSink::new(&path, ColumnSchema::Basic);

        sink.write_all(&[item("Vitamin D", false)]).unwrap();

        let bytes = read(&path);
        assert!(bytes.starts_with(UTF8_BOM));
        let text = String::from_utf8(bytes[UTF8_BOM.len()..].to_vec()).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("brand,name,price,image,url"));
        assert_eq!(
            lines.next(),
            Some("Holland & Barrett,Vitamin D,£4.99,,https://shop.test/p/Vitamin-D")
        );
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn test_later_batches_append_rows_only() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("complete.csv");
        let mut sink = CsvBatchSink::new(&path, ColumnSchema::Complete);

        sink.write_batch(&[item("A", true), item("B", false)], 1, true).unwrap();
        sink.write_batch(&[item("C", true)], 2, false).unwrap();

        let bytes = read(&path);
        let mut reader = csv::Reader::from_reader(&bytes[UTF8_BOM.len()..]);
        let headers = reader.headers().unwrap().clone();
        assert_eq!(headers.len(), 12);
        assert_eq!(&headers[0], "产品名称");
        assert_eq!(&headers[11], "URL");

        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 3);
        assert_eq!(&rows[0][0], "A");
        assert_eq!(&rows[0][1], "Vegan; Gluten free");
        assert_eq!(&rows[0][9], "Vitamin D: 25µg");
        assert_eq!(&rows[1][1], "");
        assert_eq!(&rows[2][0], "C");
        assert_eq!(sink.rows_written(), 3);
    }

    #[test]
    fn test_first_batch_truncates_previous_run() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("basic.csv");

        CsvBatchSink::new(&path, ColumnSchema::Basic)
            .write_all(&[item("Old", false), item("Older", false)])
            .unwrap();
        CsvBatchSink::new(&path, ColumnSchema::Basic)
            .write_all(&[item("New", false)])
            .unwrap();

        let text = String::from_utf8(read(&path)).unwrap();
        assert_eq!(text.lines().count(), 2);
        assert!(!text.contains("Old"));
    }

    #[test]
    fn test_append_without_file_writes_header() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("late.csv");
        let mut sink = CsvBatchSink::new(&path, ColumnSchema::Basic);

        sink.write_batch(&[item("X", false)], 3, false).unwrap();

        let text = String::from_utf8(read(&path)).unwrap();
        assert!(text.contains("brand,name,price,image,url"));
    }
}
