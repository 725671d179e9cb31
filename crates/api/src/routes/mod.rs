pub mod digital_identity;
pub mod health;
pub mod hub;
