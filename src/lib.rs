pub mod config;
pub mod countries;
pub mod key_numbers;
pub mod pipelines;
pub mod table;
