// marketplace/src/services/mod.rs

pub mod auth_service;
pub mod payments;
pub mod payouts;
pub mod pricing;
pub mod webhook;
