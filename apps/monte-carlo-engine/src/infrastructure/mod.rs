//! Infrastructure adapters: file-backed price source and CSV loaders.

mod file_price_source;
mod loaders;

pub use file_price_source::FilePriceSource;
pub use loaders::{LoadError, load_comparison_table_csv, load_ledger_csv, save_comparison_table_csv};
