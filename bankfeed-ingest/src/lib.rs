//! bankfeed-ingest: CSV bank-export parsing, row → transaction mapping, and
//! the file source/disposal capabilities the import driver runs against.

pub mod csv_rows;
pub mod mapper;
pub mod source;

pub use csv_rows::{parse_rows, CsvParser, Row, Rows};
pub use mapper::{parse_amount, MappedRows, TransactionMapper};
pub use source::{
    Deleter, DirectorySource, Disposal, FileHandle, FileSource, FsDeleter, InlineSource,
    KeepFiles, SourceFile,
};
