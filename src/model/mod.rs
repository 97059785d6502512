pub mod history;
pub mod issue;
