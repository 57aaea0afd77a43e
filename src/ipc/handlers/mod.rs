pub mod core;
pub mod records;
pub mod schools;
pub mod setup;
pub mod students;
pub mod views;
