//! In-memory customer store.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicI64, Ordering};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub id: i64,
    pub name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
}

/// Body of a create request; the id is assigned by the store.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCustomer {
    pub name: String,
    pub last_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
}

#[derive(Debug)]
pub struct CustomerStore {
    customers: DashMap<i64, Customer>,
    next_id: AtomicI64,
}

impl CustomerStore {
    pub fn new() -> Self {
        Self {
            customers: DashMap::new(),
            next_id: AtomicI64::new(1),
        }
    }

    /// Store preloaded with the demo customers 100 to 105.
    pub fn seeded() -> Self {
        let store = Self::new();
        let seed = [
            (100, "John", "Carlile", "john.ca@mail.com", "053347863"),
            (101, "Ann", "Lockwood", "lockwood_ann@mail.com", "023773123"),
            (102, "Elizabeth", "Mathews", "eli23@mail.com", "043343403"),
            (103, "Isaac", "Anderson", "isaac.anderson@mail.com", "018743831"),
            (104, "Barret", "Peyton", "barretp@mail.com", "063343148"),
            (105, "Terry", "Cokes", "terry_cokes@mail.com", "053339123"),
        ];
        for (id, name, last_name, email, phone) in seed {
            store.customers.insert(
                id,
                Customer {
                    id,
                    name: name.to_string(),
                    last_name: last_name.to_string(),
                    email: email.to_string(),
                    phone: phone.to_string(),
                },
            );
        }
        store.next_id.store(106, Ordering::SeqCst);
        store
    }

    /// All customers ordered by id.
    pub fn list(&self) -> Vec<Customer> {
        let mut all: Vec<Customer> = self.customers.iter().map(|c| c.value().clone()).collect();
        all.sort_by_key(|c| c.id);
        all
    }

    pub fn get(&self, id: i64) -> Option<Customer> {
        self.customers.get(&id).map(|c| c.clone())
    }

    pub fn create(&self, new: NewCustomer) -> Customer {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let customer = Customer {
            id,
            name: new.name,
            last_name: new.last_name,
            email: new.email,
            phone: new.phone,
        };
        self.customers.insert(id, customer.clone());
        customer
    }

    pub fn len(&self) -> usize {
        self.customers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.customers.is_empty()
    }
}

impl Default for CustomerStore {
    fn default() -> Self {
        Self::seeded()
    }
}
