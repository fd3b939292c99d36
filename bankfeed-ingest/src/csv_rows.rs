//! Header-driven CSV parser for bank exports.
//!
//! Expected shape (column order is free, names go through `ColumnAliases`):
//!   date,payee,amount,account,memo
//!   2024-01-05,Coffee Shop,-4.50,Checking,latte

use bankfeed_core::{Column, ColumnAliases, CsvLayout, ParseError};
use csv::{ReaderBuilder, StringRecord, StringRecordsIntoIter, Trim};
use std::collections::BTreeMap;

/// One data row, keyed by canonical column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    /// 1-based line the record starts on
    pub line: u64,
    values: BTreeMap<Column, String>,
}

impl Row {
    pub fn new(line: u64, values: impl IntoIterator<Item = (Column, String)>) -> Self {
        Self {
            line,
            values: values.into_iter().collect(),
        }
    }

    /// Trimmed value of `column`; `None` only for columns the header lacks
    pub fn get(&self, column: Column) -> Option<&str> {
        self.values.get(&column).map(String::as_str)
    }
}

/// Parses one file's text. Cheap to build; every `rows()` call starts over.
#[derive(Debug, Clone, Copy)]
pub struct CsvParser<'a> {
    text: &'a str,
    layout: &'a CsvLayout,
}

impl<'a> CsvParser<'a> {
    pub fn new(text: &'a str, layout: &'a CsvLayout) -> Self {
        Self {
            text: text.strip_prefix('\u{feff}').unwrap_or(text),
            layout,
        }
    }

    /// Validate the header and return a lazy iterator over the data rows
    pub fn rows(&self) -> Result<Rows<'a>, ParseError> {
        let delimiter = delimiter_byte(self.layout.delimiter)?;

        let mut records = ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(false)
            .flexible(true)
            .trim(Trim::All)
            .from_reader(self.text.as_bytes())
            .into_records();

        let header = loop {
            match records.next() {
                None => return Err(ParseError::MissingHeader),
                Some(Err(e)) => return Err(malformed(e)),
                Some(Ok(record)) if is_blank(&record) => continue,
                Some(Ok(record)) => break record,
            }
        };

        let columns = resolve_header(&header, &self.layout.columns)?;
        tracing::debug!(width = header.len(), ?columns, "resolved CSV header");

        Ok(Rows {
            records,
            columns,
            width: header.len(),
        })
    }
}

/// Parse everything eagerly. Stops at the first structural error.
pub fn parse_rows(text: &str, layout: &CsvLayout) -> Result<Vec<Row>, ParseError> {
    CsvParser::new(text, layout).rows()?.collect()
}

/// Lazy row stream produced by [`CsvParser::rows`]
pub struct Rows<'a> {
    records: StringRecordsIntoIter<&'a [u8]>,
    columns: Vec<(Column, usize)>,
    width: usize,
}

impl Iterator for Rows<'_> {
    type Item = Result<Row, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let record = match self.records.next()? {
                Ok(record) => record,
                Err(e) => return Some(Err(malformed(e))),
            };

            // Blank and all-empty rows are padding, not data
            if is_blank(&record) {
                continue;
            }

            let line = record.position().map(|p| p.line()).unwrap_or_default();
            if record.len() != self.width {
                return Some(Err(ParseError::ColumnCount {
                    line,
                    expected: self.width,
                    found: record.len(),
                }));
            }

            let values = self
                .columns
                .iter()
                .map(|&(column, idx)| (column, record.get(idx).unwrap_or("").to_string()));

            return Some(Ok(Row::new(line, values)));
        }
    }
}

fn resolve_header(
    header: &StringRecord,
    aliases: &ColumnAliases,
) -> Result<Vec<(Column, usize)>, ParseError> {
    let mut columns: Vec<(Column, usize)> = Vec::new();

    for (idx, cell) in header.iter().enumerate() {
        let Some(column) = aliases.identify(cell) else {
            continue;
        };
        if columns.iter().any(|(c, _)| *c == column) {
            tracing::debug!(%column, header = cell, "ignoring duplicate header column");
            continue;
        }
        columns.push((column, idx));
    }

    let missing: Vec<Column> = Column::ALL
        .into_iter()
        .filter(|c| c.is_required() && !columns.iter().any(|(found, _)| found == c))
        .collect();

    if !missing.is_empty() {
        return Err(ParseError::MissingColumns { missing });
    }

    Ok(columns)
}

fn delimiter_byte(c: char) -> Result<u8, ParseError> {
    if c.is_ascii() {
        Ok(c as u8)
    } else {
        Err(ParseError::UnsupportedDelimiter(c))
    }
}

fn is_blank(record: &StringRecord) -> bool {
    record.iter().all(|field| field.is_empty())
}

fn malformed(e: csv::Error) -> ParseError {
    ParseError::Malformed {
        line: e.position().map(|p| p.line()),
        message: e.to_string(),
    }
}
