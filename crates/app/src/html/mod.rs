//! Embedded static HTML served by the report form server.
//!
//! Kept as `&'static str` so the page ships inside the binary without
//! filesystem lookups.

pub mod report;
