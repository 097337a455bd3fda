//! Owner rows: customers, vendors and suppliers.

use serde::{Deserialize, Serialize};

use tristore_core::{CustomerId, SupplierId, VendorId};

/// A customer account row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub id: CustomerId,
    pub first_name: String,
    pub last_name: String,
    pub user_name: String,
    pub email: String,
}

/// Input for creating a customer.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCustomer {
    pub first_name: String,
    pub last_name: String,
    pub user_name: String,
    pub email: String,
}

/// A vendor account row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vendor {
    pub id: VendorId,
    pub name: String,
    pub user_name: String,
    pub email: String,
    pub phone_number: Option<String>,
}

/// Input for creating a vendor.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewVendor {
    pub name: String,
    pub user_name: String,
    pub email: String,
    pub phone_number: Option<String>,
}

/// A supplier (delivery company) row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Supplier {
    pub id: SupplierId,
    pub name: String,
    pub email: String,
    pub phone_number: Option<String>,
}

/// Input for creating a supplier.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSupplier {
    pub name: String,
    pub email: String,
    pub phone_number: Option<String>,
}
