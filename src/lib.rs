//! Keeps an editable list of time-tracking entries in step with a REST
//! backend, one row at a time.
pub mod api;
pub mod config;
pub mod error;
pub mod model;
pub mod registry;
pub mod report;
pub mod row;
pub mod sync;
