//! Record normalization.
//!
//! Turns a [`SourceRow`] into a [`NormalizedRecord`]: the `HostWords` text
//! becomes the embedded body and the remaining columns become
//! [`Metadata`]. Required columns are checked once against the header with
//! [`validate_headers`] and again per row, since a short record can still
//! lack trailing values.

use chrono::NaiveDate;

use crate::error::{PipelineError, RowParseError};
use crate::models::{record_id, Metadata, NormalizedRecord, SourceRow, REQUIRED_COLUMNS};

/// Format of the `CreateDate` column.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Output of [`normalize_row`].
#[derive(Debug, Clone)]
pub struct Normalized {
    pub record: NormalizedRecord,
    /// Set when `CreateDate` was malformed and `date` fell back to `0`.
    pub date_error: Option<RowParseError>,
}

/// Check that every required column appears in the header.
///
/// Header names are trimmed and a leading byte-order mark is ignored.
pub fn validate_headers<'a, I>(headers: I) -> Result<(), PipelineError>
where
    I: IntoIterator<Item = &'a str>,
{
    let present: Vec<&str> = headers
        .into_iter()
        .map(|h| h.trim_start_matches('\u{feff}').trim())
        .collect();

    let missing: Vec<String> = REQUIRED_COLUMNS
        .iter()
        .filter(|col| !present.contains(*col))
        .map(|col| col.to_string())
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(PipelineError::Schema { missing })
    }
}

/// Parse a `YYYY-MM-DD` date into epoch seconds at 00:00 UTC.
pub fn parse_date(value: &str) -> Result<i64, chrono::ParseError> {
    let date = NaiveDate::parse_from_str(value.trim(), DATE_FORMAT)?;
    Ok(date_to_timestamp(date))
}

/// Epoch seconds of `date` at 00:00 UTC.
pub fn date_to_timestamp(date: NaiveDate) -> i64 {
    date.and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc().timestamp())
        .unwrap_or_default()
}

/// Normalize the row at zero-based position `index`.
///
/// `file_name` is copied into every record's metadata.
pub fn normalize_row(
    index: usize,
    row: &SourceRow,
    file_name: &str,
) -> Result<Normalized, PipelineError> {
    let required = |value: &Option<String>, column: &str| {
        value.clone().ok_or_else(|| PipelineError::MissingField {
            row: index,
            column: column.to_string(),
        })
    };

    let name = required(&row.name, "Name")?;
    let store_type = required(&row.store_type, "Type")?;
    let city = required(&row.city, "City")?;
    let town = required(&row.town, "Town")?;
    let body = required(&row.host_words, "HostWords")?;

    let raw_date = row.create_date.clone().unwrap_or_default();
    let (date, date_error) = match parse_date(&raw_date) {
        Ok(ts) => (ts, None),
        Err(e) => {
            let err = RowParseError {
                row: index,
                field: "CreateDate",
                value: raw_date,
                reason: e.to_string(),
            };
            tracing::warn!(row = index, error = %err, "date parse failed, using 0");
            (0, Some(err))
        }
    };

    let metadata = Metadata {
        file_name: file_name.to_string(),
        name,
        store_type,
        address: row.address.clone().unwrap_or_default(),
        tel: row.tel.clone().unwrap_or_default(),
        city,
        town,
        date,
        new_store_name: None,
    };

    Ok(Normalized {
        record: NormalizedRecord {
            id: record_id(index),
            body,
            metadata,
        },
        date_error,
    })
}
