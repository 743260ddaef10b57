//! Order payloads exchanged with the orders service.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRequest {
    pub customer_id: i64,
    pub title: String,
    pub description: String,
}

impl OrderRequest {
    /// The order placed by the `neworder` endpoint.
    pub fn sample(customer_id: i64) -> Self {
        Self {
            customer_id,
            title: "New order".to_string(),
            description: "This is a new order.".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderResponse {
    pub id: i64,
    pub customer_id: i64,
    pub title: String,
    pub description: String,
}

/// Path listing the orders of one customer.
pub fn orders_for_customer_path(customer_id: i64) -> String {
    format!("/v1/orders?where=customerId:EQ:{}", customer_id)
}

pub const ORDERS_PATH: &str = "/v1/orders";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_format() {
        let json = serde_json::to_value(OrderRequest::sample(100)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "customerId": 100,
                "title": "New order",
                "description": "This is a new order."
            })
        );
        assert_eq!(orders_for_customer_path(101), "/v1/orders?where=customerId:EQ:101");
    }
}
