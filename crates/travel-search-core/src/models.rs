//! Core data models for the ingestion and query pipeline.
//!
//! These types represent the rows read from the source CSV, the normalized
//! records stored in a collection, and the hits returned by a search.

use serde::{Deserialize, Serialize};

/// Column names every source file must provide.
pub const REQUIRED_COLUMNS: [&str; 5] = ["Name", "Type", "City", "Town", "HostWords"];

/// Columns that fall back to an empty string when absent.
pub const OPTIONAL_COLUMNS: [&str; 3] = ["Address", "Tel", "CreateDate"];

/// One row of the source CSV.
///
/// Every field is `None` when the row has no value for that column at all
/// (a short record), and `Some("")` when the column is present but empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceRow {
    pub name: Option<String>,
    pub store_type: Option<String>,
    pub address: Option<String>,
    pub tel: Option<String>,
    pub city: Option<String>,
    pub town: Option<String>,
    pub create_date: Option<String>,
    pub host_words: Option<String>,
}

impl SourceRow {
    /// Build a row from header names and the matching record fields.
    ///
    /// Header names are trimmed and a leading byte-order mark is ignored.
    /// Unknown headers are ignored. Fields past the end of `values` stay
    /// `None`.
    pub fn from_fields<'a, H, V>(headers: H, values: V) -> Self
    where
        H: IntoIterator<Item = &'a str>,
        V: IntoIterator<Item = &'a str>,
    {
        let mut row = SourceRow::default();
        for (header, value) in headers.into_iter().zip(values) {
            let slot = match header.trim_start_matches('\u{feff}').trim() {
                "Name" => &mut row.name,
                "Type" => &mut row.store_type,
                "Address" => &mut row.address,
                "Tel" => &mut row.tel,
                "City" => &mut row.city,
                "Town" => &mut row.town,
                "CreateDate" => &mut row.create_date,
                "HostWords" => &mut row.host_words,
                _ => continue,
            };
            *slot = Some(value.to_string());
        }
        row
    }
}

/// Metadata attached to every stored record.
///
/// `date` is epoch seconds at 00:00 UTC of the source `CreateDate`, or `0`
/// when that date could not be parsed. `new_store_name` only exists after a
/// rename; the original `name` is never removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    pub file_name: String,
    pub name: String,
    #[serde(rename = "type")]
    pub store_type: String,
    pub address: String,
    pub tel: String,
    pub city: String,
    pub town: String,
    pub date: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_store_name: Option<String>,
}

impl Metadata {
    /// Name shown to users: the renamed value when present, else `name`.
    pub fn display_name(&self) -> &str {
        self.new_store_name.as_deref().unwrap_or(&self.name)
    }
}

/// A normalized record ready for submission to a collection.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedRecord {
    /// Stable id derived from the row position (`travel_<index>`).
    pub id: String,
    /// Free text that gets embedded.
    pub body: String,
    pub metadata: Metadata,
}

/// Id for the row at zero-based `index` of the source file.
pub fn record_id(index: usize) -> String {
    format!("travel_{}", index)
}

/// A single entry of a search result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    /// Display name (`new_store_name` if set, else `name`).
    pub name: String,
    /// Similarity in `[0, 1]` for cosine collections.
    pub score: f64,
    /// The stored `name`, used for deduplication.
    pub original_name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_metadata() -> Metadata {
        Metadata {
            file_name: "COA_OpenData.csv".into(),
            name: "耄饕客棧".into(),
            store_type: "美食".into(),
            address: String::new(),
            tel: String::new(),
            city: "南投縣".into(),
            town: "埔里鎮".into(),
            date: 0,
            new_store_name: None,
        }
    }

    #[test]
    fn test_record_id_is_positional() {
        assert_eq!(record_id(0), "travel_0");
        assert_eq!(record_id(41), "travel_41");
    }

    #[test]
    fn test_short_record_leaves_trailing_fields_unset() {
        let headers = ["Name", "Type", "City", "Town", "HostWords"];
        let row = SourceRow::from_fields(headers, ["A", "美食"]);
        assert_eq!(row.name.as_deref(), Some("A"));
        assert_eq!(row.store_type.as_deref(), Some("美食"));
        assert!(row.city.is_none());
        assert!(row.host_words.is_none());
    }

    #[test]
    fn test_bom_on_first_header_is_ignored() {
        let headers = ["\u{feff}Name", "Type", "City", "Town", "HostWords"];
        let row = SourceRow::from_fields(headers, ["耄饕客棧", "美食", "南投縣", "埔里鎮", "蕎麥麵"]);
        assert_eq!(row.name.as_deref(), Some("耄饕客棧"));
        assert!(crate::normalize::validate_headers(headers).is_ok());
        assert!(crate::normalize::normalize_row(0, &row, "f.csv").is_ok());
    }

    #[test]
    fn test_metadata_serializes_type_key() {
        let json = serde_json::to_value(sample_metadata()).unwrap();
        assert_eq!(json["type"], "美食");
        assert!(json.get("new_store_name").is_none());
    }

    #[test]
    fn test_display_name_prefers_rename() {
        let mut meta = sample_metadata();
        assert_eq!(meta.display_name(), "耄饕客棧");
        meta.new_store_name = Some("田媽媽（耄饕客棧）".into());
        assert_eq!(meta.display_name(), "田媽媽（耄饕客棧）");
        assert_eq!(meta.name, "耄饕客棧");
    }
}
