pub mod package;

pub use package::{FileRecord, Package, Rows, StoreSummary};
