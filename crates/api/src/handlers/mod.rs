pub mod digital_identity;
pub mod hub;
