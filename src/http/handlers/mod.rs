//! Route handlers.

pub mod config;
pub mod customers;
pub mod health;
pub mod lookup;
