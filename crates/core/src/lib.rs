//! Domain types for the TMF720 digital identity service.
//!
//! This crate holds everything that is pure data or pure logic:
//!
//! - [`error::CoreError`]: the domain error taxonomy.
//! - [`digital_identity`]: the digital identity record and its parts.
//! - [`validation`]: create/patch validation rules for records.
//! - [`listing`]: list filters and field projection.
//! - [`mutation`]: lifecycle event types and the observer seam the
//!   resource store reports committed mutations through.

pub mod digital_identity;
pub mod error;
pub mod listing;
pub mod mutation;
pub mod types;
pub mod validation;
