//! Event catalog and change-point/event correlation.

pub mod catalog;
pub mod correlate;

pub use catalog::{CatalogStats, EventCatalog};
pub use correlate::correlate;
