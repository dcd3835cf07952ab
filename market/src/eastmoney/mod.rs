//! Eastmoney public quote endpoints.
//!
//! Both endpoints are plain HTTP GETs; the snapshot endpoint answers in JSONP.
//! Raw payloads are parsed in [`wire`] and converted into the typed records of
//! [`crate::types`] before anything else in the workspace sees them.

pub mod client;
pub mod wire;

pub use client::EastmoneyClient;
