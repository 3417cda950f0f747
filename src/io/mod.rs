pub mod csv_reader;
pub mod discovery;
pub mod error;
pub mod json_writer;
pub mod parse;

// Re-export commonly used types
pub use csv_reader::CsvRecordStream;
pub use discovery::DataFiles;
pub use error::IoError;
pub use json_writer::{write_json, write_json_line};
pub use parse::{RawCardRow, RawRow, RawTransactionRow, RawUserRow};
