//! `PostgreSQL` relational store and id allocator.
//!
//! # Tables (schema `tristore`)
//!
//! - `customer`, `vendor`, `supplier` - owner rows
//! - `address` - unique on (street, city, postal_code, country)
//! - `customer_address`, `vendor_address`, `supplier_address` - junction rows
//! - `product`, `category`, `vendor_to_product` - catalog
//! - `shopping_cart`, `product_to_cart` - carts and the reservation mirror
//! - `customer_order`, `order_position` - orders
//! - `id_sequence` - one counter row per [`IdSequence`]
//!
//! # Migrations
//!
//! Migrations are stored in `crates/engine/migrations/` and run via:
//! ```bash
//! cargo run -p tristore-cli -- migrate
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use tristore_core::{
    AddressId, AddressReferenceId, CartId, CategoryId, CustomerId, ListingId, OrderId,
    OrderPositionId, OwnerKind, PriceEuro, ProductId, SupplierId, VendorId,
};

use super::{IdAllocator, IdSequence, RelationalStore, StoreError, StoreKind, StoreResult};
use crate::config::{DatabaseConfig, EngineConfig};
use crate::models::{
    Address, AddressCandidate, Category, Customer, CustomerOrder, ListedProduct, Listing,
    OrderPosition, Owner, OwnerAddressReference, Product, Reservation, ShoppingCart, Supplier,
    Vendor,
};

/// Create a `PostgreSQL` connection pool from engine configuration.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(
    database: &DatabaseConfig,
    config: &EngineConfig,
) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(database.max_connections)
        .min_connections(database.min_connections)
        .acquire_timeout(config.store_timeout)
        .connect(database.url.expose_secret())
        .await
}

/// Classify a sqlx error: connectivity problems become
/// [`StoreError::Unavailable`], unique violations [`StoreError::Conflict`].
fn classify(error: sqlx::Error) -> StoreError {
    match error {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            StoreError::unavailable(StoreKind::Relational, error.to_string())
        }
        sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
            StoreError::Conflict(db_err.message().to_owned())
        }
        other => StoreError::Database(other),
    }
}

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct CustomerRow {
    id: i32,
    first_name: String,
    last_name: String,
    user_name: String,
    email: String,
}

impl From<CustomerRow> for Customer {
    fn from(row: CustomerRow) -> Self {
        Self {
            id: CustomerId::new(row.id),
            first_name: row.first_name,
            last_name: row.last_name,
            user_name: row.user_name,
            email: row.email,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct VendorRow {
    id: i32,
    name: String,
    user_name: String,
    email: String,
    phone_number: Option<String>,
}

impl From<VendorRow> for Vendor {
    fn from(row: VendorRow) -> Self {
        Self {
            id: VendorId::new(row.id),
            name: row.name,
            user_name: row.user_name,
            email: row.email,
            phone_number: row.phone_number,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SupplierRow {
    id: i32,
    name: String,
    email: String,
    phone_number: Option<String>,
}

impl From<SupplierRow> for Supplier {
    fn from(row: SupplierRow) -> Self {
        Self {
            id: SupplierId::new(row.id),
            name: row.name,
            email: row.email,
            phone_number: row.phone_number,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct AddressRow {
    id: i32,
    street: String,
    city: String,
    postal_code: String,
    country: String,
}

impl From<AddressRow> for Address {
    fn from(row: AddressRow) -> Self {
        Self {
            id: AddressId::new(row.id),
            street: row.street,
            city: row.city,
            postal_code: row.postal_code,
            country: row.country,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct OwnerReferenceRow {
    id: i32,
    address_id: i32,
}

#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: i32,
    name: String,
    description: String,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Self {
            id: ProductId::new(row.id),
            name: row.name,
            description: row.description,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ListingRow {
    id: i32,
    vendor_id: i32,
    product_id: i32,
    unit_price_euro: Decimal,
    inventory_level: i32,
}

impl TryFrom<ListingRow> for Listing {
    type Error = StoreError;

    fn try_from(row: ListingRow) -> Result<Self, Self::Error> {
        let unit_price = PriceEuro::new(row.unit_price_euro).map_err(|e| {
            StoreError::DataCorruption(format!("invalid price on listing {}: {e}", row.id))
        })?;

        Ok(Self {
            id: ListingId::new(row.id),
            vendor_id: VendorId::new(row.vendor_id),
            product_id: ProductId::new(row.product_id),
            unit_price,
            inventory_level: row.inventory_level,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ListedProductRow {
    id: i32,
    vendor_id: i32,
    product_id: i32,
    unit_price_euro: Decimal,
    inventory_level: i32,
    name: String,
    description: String,
}

impl TryFrom<ListedProductRow> for ListedProduct {
    type Error = StoreError;

    fn try_from(row: ListedProductRow) -> Result<Self, Self::Error> {
        let product = Product {
            id: ProductId::new(row.product_id),
            name: row.name,
            description: row.description,
        };
        let listing = Listing::try_from(ListingRow {
            id: row.id,
            vendor_id: row.vendor_id,
            product_id: row.product_id,
            unit_price_euro: row.unit_price_euro,
            inventory_level: row.inventory_level,
        })?;
        Ok(Self { listing, product })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CategoryRow {
    id: i32,
    name: String,
}

impl From<CategoryRow> for Category {
    fn from(row: CategoryRow) -> Self {
        Self {
            id: CategoryId::new(row.id),
            name: row.name,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CartRow {
    id: i32,
    customer_id: i32,
    date_created: DateTime<Utc>,
}

impl From<CartRow> for ShoppingCart {
    fn from(row: CartRow) -> Self {
        Self {
            id: CartId::new(row.id),
            customer_id: CustomerId::new(row.customer_id),
            date_created: row.date_created,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: i32,
    customer_id: i32,
    billing_address_id: i32,
    order_date: DateTime<Utc>,
    is_paid: bool,
}

impl From<OrderRow> for CustomerOrder {
    fn from(row: OrderRow) -> Self {
        Self {
            id: OrderId::new(row.id),
            customer_id: CustomerId::new(row.customer_id),
            billing_address_id: AddressId::new(row.billing_address_id),
            order_date: row.order_date,
            is_paid: row.is_paid,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct OrderPositionRow {
    id: i32,
    order_id: i32,
    vendor_to_product_id: i32,
    amount: i32,
    delivery_address_id: i32,
    delivery_date: DateTime<Utc>,
    supplier_id: i32,
}

impl From<OrderPositionRow> for OrderPosition {
    fn from(row: OrderPositionRow) -> Self {
        Self {
            id: OrderPositionId::new(row.id),
            order_id: OrderId::new(row.order_id),
            listing_id: ListingId::new(row.vendor_to_product_id),
            amount: row.amount,
            delivery_address_id: AddressId::new(row.delivery_address_id),
            delivery_date: row.delivery_date,
            supplier_id: SupplierId::new(row.supplier_id),
        }
    }
}

// =============================================================================
// Id Allocator
// =============================================================================

/// Id allocator backed by the `id_sequence` table.
///
/// Each allocation is a single upsert, so concurrent callers never observe
/// the same value.
#[derive(Debug, Clone)]
pub struct PgIdAllocator {
    pool: PgPool,
}

impl PgIdAllocator {
    /// Create a new allocator.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Raise a sequence to at least `last`, so the next id is above every
    /// existing row. Used when seeding sequences for pre-existing data.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Database` if the query fails.
    pub async fn advance_to(&self, sequence: IdSequence, last: i32) -> StoreResult<i32> {
        let value: i32 = sqlx::query_scalar(
            r"
            INSERT INTO tristore.id_sequence (name, value)
            VALUES ($1, $2)
            ON CONFLICT (name) DO UPDATE
                SET value = GREATEST(tristore.id_sequence.value, EXCLUDED.value)
            RETURNING value
            ",
        )
        .bind(sequence.name())
        .bind(last)
        .fetch_one(&self.pool)
        .await
        .map_err(classify)?;

        Ok(value)
    }

    /// Last value handed out by a sequence, or 0 if it was never used.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Database` if the query fails.
    pub async fn current(&self, sequence: IdSequence) -> StoreResult<i32> {
        let value: Option<i32> =
            sqlx::query_scalar("SELECT value FROM tristore.id_sequence WHERE name = $1")
                .bind(sequence.name())
                .fetch_optional(&self.pool)
                .await
                .map_err(classify)?;
        Ok(value.unwrap_or(0))
    }
}

#[async_trait]
impl IdAllocator for PgIdAllocator {
    async fn next_id(&self, sequence: IdSequence) -> StoreResult<i32> {
        let value: i32 = sqlx::query_scalar(
            r"
            INSERT INTO tristore.id_sequence (name, value)
            VALUES ($1, 1)
            ON CONFLICT (name) DO UPDATE
                SET value = tristore.id_sequence.value + 1
            RETURNING value
            ",
        )
        .bind(sequence.name())
        .fetch_one(&self.pool)
        .await
        .map_err(classify)?;

        Ok(value)
    }

    async fn advance_to(&self, sequence: IdSequence, last: i32) -> StoreResult<()> {
        Self::advance_to(self, sequence, last).await.map(|_| ())
    }
}

// =============================================================================
// Relational Store
// =============================================================================

/// Relational store backed by `PostgreSQL`.
#[derive(Debug, Clone)]
pub struct PgRelationalStore {
    pool: PgPool,
}

impl PgRelationalStore {
    /// Create a new store over an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Highest id currently stored for a sequence's table, or 0.
    ///
    /// Document sequences have no relational table and return 0.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Database` if the query fails.
    pub async fn max_id(&self, sequence: IdSequence) -> StoreResult<i32> {
        if matches!(sequence, IdSequence::Document(_)) {
            return Ok(0);
        }
        // Table names come from a closed set of static strings.
        let sql = format!(
            "SELECT COALESCE(MAX(id), 0) FROM tristore.{}",
            sequence.name()
        );
        let value: i32 = sqlx::query_scalar(&sql)
            .fetch_one(&self.pool)
            .await
            .map_err(classify)?;
        Ok(value)
    }

    async fn delete_by_id(&self, table: &str, id: i32) -> StoreResult<bool> {
        let sql = format!("DELETE FROM tristore.{table} WHERE id = $1");
        let result = sqlx::query(&sql)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(classify)?;
        Ok(result.rows_affected() > 0)
    }

    async fn exists(&self, sql: &str, id: i32) -> StoreResult<bool> {
        let found: bool = sqlx::query_scalar(sql)
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(classify)?;
        Ok(found)
    }
}

const LISTING_COLUMNS: &str = "id, vendor_id, product_id, unit_price_euro, inventory_level";
const POSITION_COLUMNS: &str = "id, order_id, vendor_to_product_id, amount, \
     delivery_address_id, delivery_date, supplier_id";

#[async_trait]
impl RelationalStore for PgRelationalStore {
    // =========================================================================
    // Owners
    // =========================================================================

    async fn customer(&self, id: CustomerId) -> StoreResult<Option<Customer>> {
        let row = sqlx::query_as::<_, CustomerRow>(
            "SELECT id, first_name, last_name, user_name, email FROM tristore.customer WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(classify)?;
        Ok(row.map(Into::into))
    }

    async fn insert_customer(&self, customer: &Customer) -> StoreResult<()> {
        sqlx::query(
            r"
            INSERT INTO tristore.customer (id, first_name, last_name, user_name, email)
            VALUES ($1, $2, $3, $4, $5)
            ",
        )
        .bind(customer.id)
        .bind(&customer.first_name)
        .bind(&customer.last_name)
        .bind(&customer.user_name)
        .bind(&customer.email)
        .execute(&self.pool)
        .await
        .map_err(classify)?;
        Ok(())
    }

    async fn update_customer(&self, customer: &Customer) -> StoreResult<bool> {
        let result = sqlx::query(
            r"
            UPDATE tristore.customer
            SET first_name = $2, last_name = $3, user_name = $4, email = $5
            WHERE id = $1
            ",
        )
        .bind(customer.id)
        .bind(&customer.first_name)
        .bind(&customer.last_name)
        .bind(&customer.user_name)
        .bind(&customer.email)
        .execute(&self.pool)
        .await
        .map_err(classify)?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_customer(&self, id: CustomerId) -> StoreResult<bool> {
        self.delete_by_id("customer", id.as_i32()).await
    }

    async fn vendor(&self, id: VendorId) -> StoreResult<Option<Vendor>> {
        let row = sqlx::query_as::<_, VendorRow>(
            "SELECT id, name, user_name, email, phone_number FROM tristore.vendor WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(classify)?;
        Ok(row.map(Into::into))
    }

    async fn insert_vendor(&self, vendor: &Vendor) -> StoreResult<()> {
        sqlx::query(
            r"
            INSERT INTO tristore.vendor (id, name, user_name, email, phone_number)
            VALUES ($1, $2, $3, $4, $5)
            ",
        )
        .bind(vendor.id)
        .bind(&vendor.name)
        .bind(&vendor.user_name)
        .bind(&vendor.email)
        .bind(&vendor.phone_number)
        .execute(&self.pool)
        .await
        .map_err(classify)?;
        Ok(())
    }

    async fn update_vendor(&self, vendor: &Vendor) -> StoreResult<bool> {
        let result = sqlx::query(
            r"
            UPDATE tristore.vendor
            SET name = $2, user_name = $3, email = $4, phone_number = $5
            WHERE id = $1
            ",
        )
        .bind(vendor.id)
        .bind(&vendor.name)
        .bind(&vendor.user_name)
        .bind(&vendor.email)
        .bind(&vendor.phone_number)
        .execute(&self.pool)
        .await
        .map_err(classify)?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_vendor(&self, id: VendorId) -> StoreResult<bool> {
        self.delete_by_id("vendor", id.as_i32()).await
    }

    async fn supplier(&self, id: SupplierId) -> StoreResult<Option<Supplier>> {
        let row = sqlx::query_as::<_, SupplierRow>(
            "SELECT id, name, email, phone_number FROM tristore.supplier WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(classify)?;
        Ok(row.map(Into::into))
    }

    async fn insert_supplier(&self, supplier: &Supplier) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO tristore.supplier (id, name, email, phone_number) VALUES ($1, $2, $3, $4)",
        )
        .bind(supplier.id)
        .bind(&supplier.name)
        .bind(&supplier.email)
        .bind(&supplier.phone_number)
        .execute(&self.pool)
        .await
        .map_err(classify)?;
        Ok(())
    }

    async fn update_supplier(&self, supplier: &Supplier) -> StoreResult<bool> {
        let result = sqlx::query(
            "UPDATE tristore.supplier SET name = $2, email = $3, phone_number = $4 WHERE id = $1",
        )
        .bind(supplier.id)
        .bind(&supplier.name)
        .bind(&supplier.email)
        .bind(&supplier.phone_number)
        .execute(&self.pool)
        .await
        .map_err(classify)?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_supplier(&self, id: SupplierId) -> StoreResult<bool> {
        self.delete_by_id("supplier", id.as_i32()).await
    }

    // =========================================================================
    // Addresses
    // =========================================================================

    async fn address(&self, id: AddressId) -> StoreResult<Option<Address>> {
        let row = sqlx::query_as::<_, AddressRow>(
            "SELECT id, street, city, postal_code, country FROM tristore.address WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(classify)?;
        Ok(row.map(Into::into))
    }

    async fn find_address(&self, candidate: &AddressCandidate) -> StoreResult<Option<Address>> {
        let row = sqlx::query_as::<_, AddressRow>(
            r"
            SELECT id, street, city, postal_code, country
            FROM tristore.address
            WHERE street = $1 AND city = $2 AND postal_code = $3 AND country = $4
            ",
        )
        .bind(&candidate.street)
        .bind(&candidate.city)
        .bind(&candidate.postal_code)
        .bind(&candidate.country)
        .fetch_optional(&self.pool)
        .await
        .map_err(classify)?;
        Ok(row.map(Into::into))
    }

    async fn insert_address(&self, address: &Address) -> StoreResult<()> {
        sqlx::query(
            r"
            INSERT INTO tristore.address (id, street, city, postal_code, country)
            VALUES ($1, $2, $3, $4, $5)
            ",
        )
        .bind(address.id)
        .bind(&address.street)
        .bind(&address.city)
        .bind(&address.postal_code)
        .bind(&address.country)
        .execute(&self.pool)
        .await
        .map_err(classify)?;
        Ok(())
    }

    async fn delete_address(&self, id: AddressId) -> StoreResult<bool> {
        self.delete_by_id("address", id.as_i32()).await
    }

    async fn owner_reference(
        &self,
        owner: Owner,
        address_id: AddressId,
    ) -> StoreResult<Option<OwnerAddressReference>> {
        let sql = format!(
            "SELECT id, address_id FROM tristore.{} WHERE owner_id = $1 AND address_id = $2",
            owner.kind().junction_table()
        );
        let row = sqlx::query_as::<_, OwnerReferenceRow>(&sql)
            .bind(owner.raw_id())
            .bind(address_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(classify)?;

        Ok(row.map(|row| OwnerAddressReference {
            id: AddressReferenceId::new(row.id),
            owner,
            address_id: AddressId::new(row.address_id),
        }))
    }

    async fn insert_owner_reference(&self, reference: &OwnerAddressReference) -> StoreResult<()> {
        let sql = format!(
            "INSERT INTO tristore.{} (id, owner_id, address_id) VALUES ($1, $2, $3)",
            reference.owner.kind().junction_table()
        );
        sqlx::query(&sql)
            .bind(reference.id)
            .bind(reference.owner.raw_id())
            .bind(reference.address_id)
            .execute(&self.pool)
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn delete_owner_reference(
        &self,
        owner: Owner,
        address_id: AddressId,
    ) -> StoreResult<u64> {
        let sql = format!(
            "DELETE FROM tristore.{} WHERE owner_id = $1 AND address_id = $2",
            owner.kind().junction_table()
        );
        let result = sqlx::query(&sql)
            .bind(owner.raw_id())
            .bind(address_id)
            .execute(&self.pool)
            .await
            .map_err(classify)?;
        Ok(result.rows_affected())
    }

    async fn has_owner_reference(
        &self,
        kind: OwnerKind,
        address_id: AddressId,
    ) -> StoreResult<bool> {
        let sql = format!(
            "SELECT EXISTS (SELECT 1 FROM tristore.{} WHERE address_id = $1)",
            kind.junction_table()
        );
        self.exists(&sql, address_id.as_i32()).await
    }

    async fn owner_addresses(&self, owner: Owner) -> StoreResult<Vec<Address>> {
        let sql = format!(
            r"
            SELECT a.id, a.street, a.city, a.postal_code, a.country
            FROM tristore.address a
            JOIN tristore.{} j ON j.address_id = a.id
            WHERE j.owner_id = $1
            ORDER BY a.id
            ",
            owner.kind().junction_table()
        );
        let rows = sqlx::query_as::<_, AddressRow>(&sql)
            .bind(owner.raw_id())
            .fetch_all(&self.pool)
            .await
            .map_err(classify)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn has_delivery_reference(&self, address_id: AddressId) -> StoreResult<bool> {
        self.exists(
            "SELECT EXISTS (SELECT 1 FROM tristore.order_position WHERE delivery_address_id = $1)",
            address_id.as_i32(),
        )
        .await
    }

    async fn has_billing_reference(&self, address_id: AddressId) -> StoreResult<bool> {
        self.exists(
            "SELECT EXISTS (SELECT 1 FROM tristore.customer_order WHERE billing_address_id = $1)",
            address_id.as_i32(),
        )
        .await
    }

    // =========================================================================
    // Catalog
    // =========================================================================

    async fn product(&self, id: ProductId) -> StoreResult<Option<Product>> {
        let row = sqlx::query_as::<_, ProductRow>(
            "SELECT id, name, description FROM tristore.product WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(classify)?;
        Ok(row.map(Into::into))
    }

    async fn insert_product(&self, product: &Product) -> StoreResult<()> {
        sqlx::query("INSERT INTO tristore.product (id, name, description) VALUES ($1, $2, $3)")
            .bind(product.id)
            .bind(&product.name)
            .bind(&product.description)
            .execute(&self.pool)
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn delete_product(&self, id: ProductId) -> StoreResult<bool> {
        self.delete_by_id("product", id.as_i32()).await
    }

    async fn find_product_listed_elsewhere(
        &self,
        name: &str,
        vendor_id: VendorId,
    ) -> StoreResult<Option<Product>> {
        let row = sqlx::query_as::<_, ProductRow>(
            r"
            SELECT p.id, p.name, p.description
            FROM tristore.vendor_to_product vp
            JOIN tristore.product p ON p.id = vp.product_id
            WHERE vp.vendor_id <> $1 AND p.name = $2
            ORDER BY p.id
            LIMIT 1
            ",
        )
        .bind(vendor_id)
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(classify)?;
        Ok(row.map(Into::into))
    }

    async fn find_product(&self, name: &str, description: &str) -> StoreResult<Option<Product>> {
        let row = sqlx::query_as::<_, ProductRow>(
            r"
            SELECT id, name, description
            FROM tristore.product
            WHERE name = $1 AND description = $2
            ORDER BY id
            LIMIT 1
            ",
        )
        .bind(name)
        .bind(description)
        .fetch_optional(&self.pool)
        .await
        .map_err(classify)?;
        Ok(row.map(Into::into))
    }

    async fn listing(&self, id: ListingId) -> StoreResult<Option<Listing>> {
        let sql = format!("SELECT {LISTING_COLUMNS} FROM tristore.vendor_to_product WHERE id = $1");
        let row = sqlx::query_as::<_, ListingRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(classify)?;
        row.map(TryInto::try_into).transpose()
    }

    async fn insert_listing(&self, listing: &Listing) -> StoreResult<()> {
        sqlx::query(
            r"
            INSERT INTO tristore.vendor_to_product
                (id, vendor_id, product_id, unit_price_euro, inventory_level)
            VALUES ($1, $2, $3, $4, $5)
            ",
        )
        .bind(listing.id)
        .bind(listing.vendor_id)
        .bind(listing.product_id)
        .bind(listing.unit_price.amount())
        .bind(listing.inventory_level)
        .execute(&self.pool)
        .await
        .map_err(classify)?;
        Ok(())
    }

    async fn update_listing(&self, listing: &Listing) -> StoreResult<bool> {
        let result = sqlx::query(
            r"
            UPDATE tristore.vendor_to_product
            SET vendor_id = $2, product_id = $3, unit_price_euro = $4, inventory_level = $5
            WHERE id = $1
            ",
        )
        .bind(listing.id)
        .bind(listing.vendor_id)
        .bind(listing.product_id)
        .bind(listing.unit_price.amount())
        .bind(listing.inventory_level)
        .execute(&self.pool)
        .await
        .map_err(classify)?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_listing(&self, id: ListingId) -> StoreResult<bool> {
        self.delete_by_id("vendor_to_product", id.as_i32()).await
    }

    async fn vendor_catalog(&self, vendor_id: VendorId) -> StoreResult<Vec<ListedProduct>> {
        let rows = sqlx::query_as::<_, ListedProductRow>(
            r"
            SELECT vp.id, vp.vendor_id, vp.product_id, vp.unit_price_euro, vp.inventory_level,
                   p.name, p.description
            FROM tristore.vendor_to_product vp
            JOIN tristore.product p ON p.id = vp.product_id
            WHERE vp.vendor_id = $1
            ORDER BY vp.id
            ",
        )
        .bind(vendor_id)
        .fetch_all(&self.pool)
        .await
        .map_err(classify)?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn has_listing_for_product(&self, product_id: ProductId) -> StoreResult<bool> {
        self.exists(
            "SELECT EXISTS (SELECT 1 FROM tristore.vendor_to_product WHERE product_id = $1)",
            product_id.as_i32(),
        )
        .await
    }

    async fn decrement_inventory(&self, id: ListingId, amount: i32) -> StoreResult<Option<i32>> {
        let level: Option<i32> = sqlx::query_scalar(
            r"
            UPDATE tristore.vendor_to_product
            SET inventory_level = inventory_level - $2
            WHERE id = $1 AND inventory_level >= $2
            RETURNING inventory_level
            ",
        )
        .bind(id)
        .bind(amount)
        .fetch_optional(&self.pool)
        .await
        .map_err(classify)?;
        Ok(level)
    }

    async fn category(&self, id: CategoryId) -> StoreResult<Option<Category>> {
        let row =
            sqlx::query_as::<_, CategoryRow>("SELECT id, name FROM tristore.category WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(classify)?;
        Ok(row.map(Into::into))
    }

    async fn category_by_name(&self, name: &str) -> StoreResult<Option<Category>> {
        let row = sqlx::query_as::<_, CategoryRow>(
            "SELECT id, name FROM tristore.category WHERE name = $1",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(classify)?;
        Ok(row.map(Into::into))
    }

    async fn insert_category(&self, category: &Category) -> StoreResult<()> {
        sqlx::query("INSERT INTO tristore.category (id, name) VALUES ($1, $2)")
            .bind(category.id)
            .bind(&category.name)
            .execute(&self.pool)
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn update_category(&self, category: &Category) -> StoreResult<bool> {
        let result = sqlx::query("UPDATE tristore.category SET name = $2 WHERE id = $1")
            .bind(category.id)
            .bind(&category.name)
            .execute(&self.pool)
            .await
            .map_err(classify)?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_category(&self, id: CategoryId) -> StoreResult<bool> {
        self.delete_by_id("category", id.as_i32()).await
    }

    // =========================================================================
    // Carts
    // =========================================================================

    async fn cart(&self, id: CartId) -> StoreResult<Option<ShoppingCart>> {
        let row = sqlx::query_as::<_, CartRow>(
            "SELECT id, customer_id, date_created FROM tristore.shopping_cart WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(classify)?;
        Ok(row.map(Into::into))
    }

    async fn insert_cart(&self, cart: &ShoppingCart) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO tristore.shopping_cart (id, customer_id, date_created) VALUES ($1, $2, $3)",
        )
        .bind(cart.id)
        .bind(cart.customer_id)
        .bind(cart.date_created)
        .execute(&self.pool)
        .await
        .map_err(classify)?;
        Ok(())
    }

    async fn delete_cart(&self, id: CartId) -> StoreResult<bool> {
        self.delete_by_id("shopping_cart", id.as_i32()).await
    }

    async fn customer_carts(&self, customer_id: CustomerId) -> StoreResult<Vec<ShoppingCart>> {
        let rows = sqlx::query_as::<_, CartRow>(
            r"
            SELECT id, customer_id, date_created
            FROM tristore.shopping_cart
            WHERE customer_id = $1
            ORDER BY id
            ",
        )
        .bind(customer_id)
        .fetch_all(&self.pool)
        .await
        .map_err(classify)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn upsert_cart_item(&self, reservation: &Reservation) -> StoreResult<()> {
        sqlx::query(
            r"
            INSERT INTO tristore.product_to_cart (cart_id, vendor_to_product_id, amount)
            VALUES ($1, $2, $3)
            ON CONFLICT (cart_id, vendor_to_product_id) DO UPDATE SET amount = EXCLUDED.amount
            ",
        )
        .bind(reservation.cart_id)
        .bind(reservation.listing_id)
        .bind(reservation.amount)
        .execute(&self.pool)
        .await
        .map_err(classify)?;
        Ok(())
    }

    async fn delete_cart_item(&self, cart_id: CartId, listing_id: ListingId) -> StoreResult<bool> {
        let result = sqlx::query(
            "DELETE FROM tristore.product_to_cart WHERE cart_id = $1 AND vendor_to_product_id = $2",
        )
        .bind(cart_id)
        .bind(listing_id)
        .execute(&self.pool)
        .await
        .map_err(classify)?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_cart_items_for_listing(&self, listing_id: ListingId) -> StoreResult<u64> {
        let result =
            sqlx::query("DELETE FROM tristore.product_to_cart WHERE vendor_to_product_id = $1")
                .bind(listing_id)
                .execute(&self.pool)
                .await
                .map_err(classify)?;
        Ok(result.rows_affected())
    }

    async fn delete_cart_items_for_customer(&self, customer_id: CustomerId) -> StoreResult<u64> {
        let result = sqlx::query(
            r"
            DELETE FROM tristore.product_to_cart
            WHERE cart_id IN (SELECT id FROM tristore.shopping_cart WHERE customer_id = $1)
            ",
        )
        .bind(customer_id)
        .execute(&self.pool)
        .await
        .map_err(classify)?;
        Ok(result.rows_affected())
    }

    // =========================================================================
    // Orders
    // =========================================================================

    async fn insert_order(&self, order: &CustomerOrder) -> StoreResult<()> {
        sqlx::query(
            r"
            INSERT INTO tristore.customer_order
                (id, customer_id, billing_address_id, order_date, is_paid)
            VALUES ($1, $2, $3, $4, $5)
            ",
        )
        .bind(order.id)
        .bind(order.customer_id)
        .bind(order.billing_address_id)
        .bind(order.order_date)
        .bind(order.is_paid)
        .execute(&self.pool)
        .await
        .map_err(classify)?;
        Ok(())
    }

    async fn customer_orders(&self, customer_id: CustomerId) -> StoreResult<Vec<CustomerOrder>> {
        let rows = sqlx::query_as::<_, OrderRow>(
            r"
            SELECT id, customer_id, billing_address_id, order_date, is_paid
            FROM tristore.customer_order
            WHERE customer_id = $1
            ORDER BY id
            ",
        )
        .bind(customer_id)
        .fetch_all(&self.pool)
        .await
        .map_err(classify)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn delete_order(&self, id: OrderId) -> StoreResult<bool> {
        self.delete_by_id("customer_order", id.as_i32()).await
    }

    async fn insert_order_position(&self, position: &OrderPosition) -> StoreResult<()> {
        let sql =
            format!("INSERT INTO tristore.order_position ({POSITION_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7)");
        sqlx::query(&sql)
            .bind(position.id)
            .bind(position.order_id)
            .bind(position.listing_id)
            .bind(position.amount)
            .bind(position.delivery_address_id)
            .bind(position.delivery_date)
            .bind(position.supplier_id)
            .execute(&self.pool)
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn order_positions(&self, order_id: OrderId) -> StoreResult<Vec<OrderPosition>> {
        let sql = format!(
            "SELECT {POSITION_COLUMNS} FROM tristore.order_position WHERE order_id = $1 ORDER BY id"
        );
        let rows = sqlx::query_as::<_, OrderPositionRow>(&sql)
            .bind(order_id)
            .fetch_all(&self.pool)
            .await
            .map_err(classify)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn delete_order_positions(&self, order_id: OrderId) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM tristore.order_position WHERE order_id = $1")
            .bind(order_id)
            .execute(&self.pool)
            .await
            .map_err(classify)?;
        Ok(result.rows_affected())
    }

    async fn has_position_for_listing(&self, listing_id: ListingId) -> StoreResult<bool> {
        self.exists(
            "SELECT EXISTS (SELECT 1 FROM tristore.order_position WHERE vendor_to_product_id = $1)",
            listing_id.as_i32(),
        )
        .await
    }

    async fn positions_for_listing(&self, listing_id: ListingId) -> StoreResult<Vec<OrderPosition>> {
        let sql = format!(
            "SELECT {POSITION_COLUMNS} FROM tristore.order_position \
             WHERE vendor_to_product_id = $1 ORDER BY id"
        );
        let rows = sqlx::query_as::<_, OrderPositionRow>(&sql)
            .bind(listing_id)
            .fetch_all(&self.pool)
            .await
            .map_err(classify)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn delete_positions_for_listing(&self, listing_id: ListingId) -> StoreResult<u64> {
        let result =
            sqlx::query("DELETE FROM tristore.order_position WHERE vendor_to_product_id = $1")
                .bind(listing_id)
                .execute(&self.pool)
                .await
                .map_err(classify)?;
        Ok(result.rows_affected())
    }

    async fn has_position_for_supplier(&self, supplier_id: SupplierId) -> StoreResult<bool> {
        self.exists(
            "SELECT EXISTS (SELECT 1 FROM tristore.order_position WHERE supplier_id = $1)",
            supplier_id.as_i32(),
        )
        .await
    }
}
