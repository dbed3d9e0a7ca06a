//! CSV source reader.
//!
//! Reads the tourism CSV with the `csv` crate. A UTF-8 byte-order mark on
//! the first header is stripped, records may be shorter than the header
//! (their trailing columns read as absent), and each record is turned into
//! a [`SourceRow`] by header name.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};

use travel_search_core::models::SourceRow;

/// An opened CSV source: its header plus a lazy row iterator.
pub struct CsvSource<R: Read> {
    headers: Vec<String>,
    reader: csv::Reader<R>,
}

impl CsvSource<File> {
    /// Open the CSV at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("Failed to open source CSV: {}", path.display()))?;
        Self::from_reader(file)
    }
}

impl<R: Read> CsvSource<R> {
    /// Read the header from `reader`.
    pub fn from_reader(reader: R) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .has_headers(true)
            .from_reader(reader);

        let headers = reader
            .headers()
            .context("Failed to read CSV header")?
            .iter()
            .map(|h| h.trim_start_matches('\u{feff}').trim().to_string())
            .collect();

        Ok(Self { headers, reader })
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Consume the source, yielding one [`SourceRow`] per record.
    pub fn into_rows(self) -> impl Iterator<Item = Result<SourceRow>> {
        let headers = self.headers;
        self.reader.into_records().map(move |record| -> Result<SourceRow> {
            let record = record.context("Failed to read CSV record")?;
            Ok(SourceRow::from_fields(
                headers.iter().map(String::as_str),
                record.iter(),
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "Name,Type,Address,Tel,City,Town,CreateDate,HostWords";

    #[test]
    fn test_strips_bom_and_reads_rows() {
        let data = format!(
            "\u{feff}{}\n茶香小館,美食,宜蘭縣礁溪鄉,03-1234567,宜蘭縣,礁溪鄉,2024-04-10,手工茶點\n",
            HEADER
        );
        let source = CsvSource::from_reader(data.as_bytes()).unwrap();
        assert_eq!(source.headers()[0], "Name");
        let rows: Vec<SourceRow> = source.into_rows().collect::<Result<_>>().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].name.as_deref(), Some("茶香小館"));
        assert_eq!(rows[0].host_words.as_deref(), Some("手工茶點"));
    }

    #[test]
    fn test_short_record_has_absent_trailing_columns() {
        let data = format!("{}\n茶香小館,美食,,\n", HEADER);
        let source = CsvSource::from_reader(data.as_bytes()).unwrap();
        let rows: Vec<SourceRow> = source.into_rows().collect::<Result<_>>().unwrap();
        assert_eq!(rows[0].tel.as_deref(), Some(""));
        assert!(rows[0].city.is_none());
        assert!(rows[0].host_words.is_none());
    }

    #[test]
    fn test_quoted_fields_with_commas() {
        let data = format!(
            "{}\n\"茶,館\",美食,\"地址, 一段\",,宜蘭縣,礁溪鄉,2024-04-10,\"茶, 點心\"\n",
            HEADER
        );
        let source = CsvSource::from_reader(data.as_bytes()).unwrap();
        let rows: Vec<SourceRow> = source.into_rows().collect::<Result<_>>().unwrap();
        assert_eq!(rows[0].name.as_deref(), Some("茶,館"));
        assert_eq!(rows[0].host_words.as_deref(), Some("茶, 點心"));
    }
}
