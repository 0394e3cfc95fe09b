pub mod category;
pub mod date;
pub mod exec;
pub mod url;
