//! Recipient address sources.

use crate::error::{Error, Result};
use std::io;
use std::path::PathBuf;

/// Column holding the email address in the exported member list
/// (`surname,name,email`).
pub const DEFAULT_EMAIL_COLUMN: usize = 2;

/// Where the recipients of a broadcast come from.
#[derive(Debug, Clone)]
pub enum AddressSource {
    /// Fixed list, used in debug mode instead of the real mailing list.
    Static(Vec<String>),
    /// Comma-separated file with a header row; addresses are read from `column`.
    Csv { path: PathBuf, column: usize },
}

impl AddressSource {
    /// Load the ordered recipient list.
    ///
    /// Rows are returned in file order with the header excluded. Duplicates are
    /// kept. A data row that lacks the email column fails the whole load: no
    /// partial list is ever returned.
    pub fn load(&self) -> Result<Vec<String>> {
        match self {
            Self::Static(addrs) => Ok(addrs.clone()),
            Self::Csv { path, column } => {
                let file = std::fs::File::open(path).map_err(|e| {
                    Error::Source(format!("could not open {}: {e}", path.display()))
                })?;
                Self::from_reader(file, *column).map_err(|e| match e {
                    Error::Source(msg) => Error::Source(format!("{}: {msg}", path.display())),
                    other => other,
                })
            }
        }
    }

    /// Parse addresses out of CSV data, skipping the header row.
    pub fn from_reader<R: io::Read>(reader: R, column: usize) -> Result<Vec<String>> {
        let mut rdr = csv::ReaderBuilder::new()
            .delimiter(b',')
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::Fields)
            .from_reader(reader);

        let mut addrs = Vec::new();
        for record in rdr.records() {
            let record = record?;
            let Some(addr) = record.get(column) else {
                let line = record.position().map_or(0, csv::Position::line);
                return Err(Error::Source(format!(
                    "line {line} has {} column(s), expected an address in column {column}",
                    record.len()
                )));
            };
            addrs.push(addr.to_string());
        }
        Ok(addrs)
    }

    /// Short human-readable description for logs.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Static(addrs) => format!("debug list ({} addresses)", addrs.len()),
            Self::Csv { path, column } => format!("{} (column {column})", path.display()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skips_header_and_keeps_row_order() {
        let data = "surname,name,email\nDoe,John,john@example.com\nRoe,Jane,jane@example.com\n";
        let addrs = AddressSource::from_reader(data.as_bytes(), 2).unwrap();
        assert_eq!(addrs, vec!["john@example.com", "jane@example.com"]);
    }

    #[test]
    fn missing_column_is_an_error() {
        let data = "surname,name,email\nDoe,John,john@example.com\nRoe,Jane\n";
        let err = AddressSource::from_reader(data.as_bytes(), 2).unwrap_err();
        assert!(matches!(err, Error::Source(ref msg) if msg.contains("line 3")), "{err}");
    }

    #[test]
    fn header_only_yields_no_addresses() {
        let addrs = AddressSource::from_reader("surname,name,email\n".as_bytes(), 2).unwrap();
        assert!(addrs.is_empty());
    }

    #[test]
    fn static_list_is_returned_verbatim() {
        let src = AddressSource::Static(vec!["a@x.org".into(), "a@x.org".into()]);
        assert_eq!(src.load().unwrap(), vec!["a@x.org", "a@x.org"]);
    }
}
