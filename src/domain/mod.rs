//! Business data of the sample customers service.

pub mod customers;
pub mod orders;

pub use customers::{Customer, CustomerStore, NewCustomer};
pub use orders::{OrderRequest, OrderResponse};
