pub mod cli;
pub mod collectors;
pub mod database;
pub mod exporter;
