//! Resource store for digital identities.
//!
//! Records live in memory; durability of the resource schema is out of
//! scope for this service. Every committed mutation is reported to the
//! store's [`MutationObserver`](tmf720_core::mutation::MutationObserver).

pub mod store;

pub use store::DigitalIdentityStore;
