pub mod format;
pub mod store;

pub use format::{grouped, millions, percent};
pub use store::{merge, render, KeyNumberStore, KeyNumbers};
