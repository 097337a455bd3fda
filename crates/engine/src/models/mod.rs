//! Domain models shared by the store adapters and the engine services.
//!
//! These are the row, node and document shapes as the engine sees them. The
//! relational adapter maps them to tables, the graph adapter to labelled
//! nodes and edges, the document adapter to collection entries.

pub mod account;
pub mod address;
pub mod cart;
pub mod catalog;
pub mod document;

pub use account::{Customer, NewCustomer, NewSupplier, NewVendor, Supplier, Vendor};
pub use address::{Address, AddressCandidate, Owner, OwnerAddressReference};
pub use cart::{CustomerOrder, OrderPosition, PlacedOrder, Reservation, ShoppingCart};
pub use catalog::{Category, ListedProduct, Listing, Product, ProductInformation};
pub use document::{Document, DocumentCollection, DocumentFilter};
