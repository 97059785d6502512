pub mod cell;
pub mod table;
pub mod workbook;

pub use cell::Cell;
pub use table::{Record, Sheet};
pub use workbook::Workbook;
