// Adapters layer: concrete implementations for external systems (record sources, etc.)

pub mod csv_source;

pub use csv_source::CsvRecordSource;
