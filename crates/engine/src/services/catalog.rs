//! Catalog consistency across the relational and graph stores.
//!
//! Products, categories and listings each exist as a relational row and a
//! graph node. `HAS_CATEGORY` edges exist only in the graph. One product row
//! is shared by every vendor listing a product of that exact name; the row is
//! collected together with its node and category edges when its last listing
//! goes away.

use tracing::{debug, info, instrument, warn};

use tristore_core::{CategoryId, ListingId, ProductId, VendorId};

use super::follow_up;
use crate::engine::Engine;
use crate::error::{ConsistencyError, Entity, Result};
use crate::models::{
    Category, DocumentCollection, DocumentFilter, Listing, Product, ProductInformation,
};
use crate::scan::{ListingProbe, first_holder};
use crate::store::{IdSequence, StoreError};

/// Catalog operations.
pub struct CatalogService<'a> {
    engine: &'a Engine,
}

impl<'a> CatalogService<'a> {
    pub(crate) const fn new(engine: &'a Engine) -> Self {
        Self { engine }
    }

    // =========================================================================
    // Categories
    // =========================================================================

    /// Create a category under a caller-chosen id.
    ///
    /// # Errors
    ///
    /// Returns `ConsistencyError::DuplicateCategory` if the id or the name is
    /// taken in either store.
    #[instrument(skip(self), fields(category_id = %category.id, name = %category.name))]
    pub async fn create_category(&self, category: Category) -> Result<Category> {
        let stores = self.engine.stores();
        let duplicate = || ConsistencyError::DuplicateCategory {
            name: category.name.clone(),
        };

        if stores.relational.category(category.id).await?.is_some()
            || stores.graph.category_node(category.id).await?.is_some()
            || stores
                .relational
                .category_by_name(&category.name)
                .await?
                .is_some()
            || stores
                .graph
                .category_node_by_name(&category.name)
                .await?
                .is_some()
        {
            return Err(duplicate());
        }

        match stores.relational.insert_category(&category).await {
            Ok(()) => {}
            Err(StoreError::Conflict(_)) => return Err(duplicate()),
            Err(e) => return Err(e.into()),
        }
        // Caller ids must never be handed out again by the category sequence.
        stores
            .ids
            .advance_to(IdSequence::Category, category.id.as_i32())
            .await?;
        follow_up(
            stores.graph.insert_category_node(&category).await,
            "category node",
        )?;
        info!("Created category");
        Ok(category)
    }

    /// Create a category under a freshly allocated id.
    ///
    /// # Errors
    ///
    /// Same as [`Self::create_category`].
    pub async fn create_named_category(&self, name: &str) -> Result<Category> {
        let stores = self.engine.stores();
        if stores.relational.category_by_name(name).await?.is_some() {
            return Err(ConsistencyError::DuplicateCategory {
                name: name.to_owned(),
            });
        }
        let id = CategoryId::new(stores.ids.next_id(IdSequence::Category).await?);
        self.create_category(Category {
            id,
            name: name.to_owned(),
        })
        .await
    }

    /// Rename a category.
    ///
    /// # Errors
    ///
    /// Returns `ConsistencyError::IdMismatch` if `category.id != category_id`.
    /// Returns `ConsistencyError::NotFound` unless the category exists in both
    /// stores.
    /// Returns `ConsistencyError::DuplicateCategory` if another category
    /// already holds the name in either store.
    #[instrument(skip(self, category), fields(category_id = %category_id, name = %category.name))]
    pub async fn update_category(
        &self,
        category_id: CategoryId,
        category: Category,
    ) -> Result<Category> {
        if category.id != category_id {
            return Err(ConsistencyError::IdMismatch {
                path: category_id.to_string(),
                body: category.id.to_string(),
            });
        }

        let stores = self.engine.stores();
        if stores.relational.category(category_id).await?.is_none()
            || stores.graph.category_node(category_id).await?.is_none()
        {
            return Err(ConsistencyError::not_found(Entity::Category, category_id));
        }

        let by_name_relational = stores.relational.category_by_name(&category.name).await?;
        let by_name_graph = stores.graph.category_node_by_name(&category.name).await?;
        if by_name_relational.into_iter().chain(by_name_graph).any(|c| c.id != category_id) {
            return Err(ConsistencyError::DuplicateCategory {
                name: category.name,
            });
        }

        stores.relational.update_category(&category).await?;
        follow_up(
            stores.graph.update_category_node(&category).await,
            "category node",
        )?;
        info!("Updated category");
        Ok(category)
    }

    /// Delete a category no product is assigned to.
    ///
    /// # Errors
    ///
    /// Returns `ConsistencyError::CategoryInUse` if any `HAS_CATEGORY` edge
    /// points at it.
    /// Returns `ConsistencyError::NotFound` if neither store has it.
    #[instrument(skip(self), fields(category_id = %category_id))]
    pub async fn delete_category(&self, category_id: CategoryId) -> Result<()> {
        let stores = self.engine.stores();
        if stores.graph.category_has_products(category_id).await? {
            return Err(ConsistencyError::CategoryInUse(category_id));
        }

        let in_relational = stores.relational.category(category_id).await?.is_some();
        let in_graph = stores.graph.category_node(category_id).await?.is_some();
        if !in_relational && !in_graph {
            return Err(ConsistencyError::not_found(Entity::Category, category_id));
        }

        stores.relational.delete_category(category_id).await?;
        follow_up(
            stores.graph.delete_category_node(category_id).await,
            "category node",
        )?;
        info!("Deleted category");
        Ok(())
    }

    /// Link a product to a category. No-op if already linked.
    ///
    /// # Errors
    ///
    /// Returns `ConsistencyError::NotFound` unless both the product and the
    /// category exist in both stores.
    #[instrument(skip(self), fields(product_id = %product_id, category_id = %category_id))]
    pub async fn attach_category(
        &self,
        product_id: ProductId,
        category_id: CategoryId,
    ) -> Result<()> {
        self.require_product(product_id).await?;
        self.require_category(category_id).await?;
        self.link_category(product_id, category_id).await
    }

    /// Unlink a product from a category. No-op if not linked.
    ///
    /// # Errors
    ///
    /// Returns `ConsistencyError::Store` if the graph write fails.
    #[instrument(skip(self), fields(product_id = %product_id, category_id = %category_id))]
    pub async fn detach_category(
        &self,
        product_id: ProductId,
        category_id: CategoryId,
    ) -> Result<()> {
        let removed = self
            .engine
            .stores()
            .graph
            .delete_category_edge(product_id, category_id)
            .await?;
        debug!(removed, "Detached category");
        Ok(())
    }

    // =========================================================================
    // Listings
    // =========================================================================

    /// List a product for a vendor. Reuses another vendor's product of the
    /// same name, otherwise creates it.
    ///
    /// # Errors
    ///
    /// Returns `ConsistencyError::NotFound` if the vendor or a requested
    /// category does not exist.
    /// Returns `ConsistencyError::DuplicateListing` if the vendor already lists
    /// a product with this name.
    /// Returns `ConsistencyError::InvalidAmount` for a negative inventory level.
    #[instrument(skip(self, info), fields(vendor_id = %vendor_id, name = %info.name))]
    pub async fn create_vendor_product(
        &self,
        vendor_id: VendorId,
        info: ProductInformation,
    ) -> Result<ListingId> {
        let stores = self.engine.stores();
        let _catalog = self.engine.lock_catalog().await;

        self.engine.accounts().vendor(vendor_id).await?;
        check_inventory(info.inventory_level)?;

        let catalog = stores.relational.vendor_catalog(vendor_id).await?;
        if catalog.iter().any(|listed| listed.product.name == info.name) {
            return Err(ConsistencyError::DuplicateListing {
                vendor: vendor_id.to_string(),
                name: info.name,
            });
        }
        for &category_id in &info.categories {
            self.require_category(category_id).await?;
        }

        let product = match stores
            .relational
            .find_product_listed_elsewhere(&info.name, vendor_id)
            .await?
        {
            Some(shared) => {
                debug!(product_id = %shared.id, "Reusing product listed by another vendor");
                shared
            }
            None => self.insert_product(&info.name, &info.description).await?,
        };

        let listing = Listing {
            id: ListingId::new(stores.ids.next_id(IdSequence::Listing).await?),
            vendor_id,
            product_id: product.id,
            unit_price: info.unit_price,
            inventory_level: info.inventory_level,
        };
        stores.relational.insert_listing(&listing).await?;
        follow_up(
            stores.graph.insert_listing_node(&listing).await,
            "listing node",
        )?;
        info!(listing_id = %listing.id, product_id = %product.id, "Created listing");

        for category_id in info.categories {
            self.link_category(product.id, category_id).await?;
        }
        Ok(listing.id)
    }

    /// Change a listing's product content and terms.
    ///
    /// The listing is repointed to a product with the same name and
    /// description, or to a new one. The previous product is collected if no
    /// listing uses it anymore.
    ///
    /// # Errors
    ///
    /// Returns `ConsistencyError::NotFound` if the vendor does not own the
    /// listing in both stores, or a requested category is missing.
    /// Returns `ConsistencyError::ListingLocked` if an order position or a
    /// reservation references the listing.
    #[instrument(skip(self, info), fields(vendor_id = %vendor_id, listing_id = %listing_id))]
    pub async fn update_vendor_product(
        &self,
        vendor_id: VendorId,
        listing_id: ListingId,
        info: ProductInformation,
    ) -> Result<ProductInformation> {
        let stores = self.engine.stores();
        let _listing = self.engine.listing_locks().lock(listing_id).await;
        let _catalog = self.engine.lock_catalog().await;

        self.engine.accounts().vendor(vendor_id).await?;
        let current = stores
            .relational
            .listing(listing_id)
            .await?
            .filter(|l| l.vendor_id == vendor_id)
            .ok_or_else(|| ConsistencyError::not_found(Entity::Listing, listing_id))?;
        let owned_in_graph = stores
            .graph
            .listing_node(listing_id)
            .await?
            .is_some_and(|node| node.vendor_id == vendor_id);
        if !owned_in_graph {
            return Err(ConsistencyError::not_found(Entity::Listing, listing_id));
        }

        if let Some(holder) = first_holder(stores, &ListingProbe::UPDATE, listing_id).await? {
            return Err(ConsistencyError::ListingLocked {
                listing: listing_id,
                holder: holder.to_string(),
            });
        }
        check_inventory(info.inventory_level)?;
        for &category_id in &info.categories {
            self.require_category(category_id).await?;
        }

        let product = match stores
            .relational
            .find_product(&info.name, &info.description)
            .await?
        {
            Some(existing) => existing,
            None => self.insert_product(&info.name, &info.description).await?,
        };

        let updated = Listing {
            product_id: product.id,
            unit_price: info.unit_price,
            inventory_level: info.inventory_level,
            ..current
        };
        stores.relational.update_listing(&updated).await?;
        follow_up(
            stores.graph.update_listing_node(&updated).await,
            "listing node",
        )?;
        info!(product_id = %product.id, "Updated listing");

        for &category_id in &info.categories {
            self.link_category(product.id, category_id).await?;
        }
        if current.product_id != product.id {
            self.collect_product(current.product_id).await?;
        }

        self.listing_information(listing_id).await
    }

    /// Remove a listing and everything that references it.
    ///
    /// Order: reservations, order positions, documents, the listing itself,
    /// then the product if it is no longer listed. A missing listing is a
    /// no-op.
    ///
    /// # Errors
    ///
    /// Returns `ConsistencyError::Store` if a store call fails; earlier steps
    /// are not undone.
    #[instrument(skip(self), fields(listing_id = %listing_id))]
    pub async fn remove_vendor_product(&self, listing_id: ListingId) -> Result<()> {
        let stores = self.engine.stores();
        let _listing = self.engine.listing_locks().lock(listing_id).await;
        let _catalog = self.engine.lock_catalog().await;

        let Some(listing) = stores.relational.listing(listing_id).await? else {
            debug!("Listing already removed");
            return Ok(());
        };

        let mirrored = stores
            .relational
            .delete_cart_items_for_listing(listing_id)
            .await?;
        let reservations = follow_up(
            stores.graph.delete_listing_reservations(listing_id).await,
            "reservations",
        )?;

        let mut delivery_addresses: Vec<_> = stores
            .relational
            .positions_for_listing(listing_id)
            .await?
            .into_iter()
            .map(|p| p.delivery_address_id)
            .collect();
        delivery_addresses.sort_unstable();
        delivery_addresses.dedup();
        let positions = stores
            .relational
            .delete_positions_for_listing(listing_id)
            .await?;
        for address_id in delivery_addresses {
            self.engine.addresses().collect(address_id).await?;
        }

        let mut documents = 0;
        for collection in DocumentCollection::ALL {
            documents += follow_up(
                stores
                    .documents
                    .delete_many(collection, DocumentFilter::Listing(listing_id))
                    .await,
                "listing documents",
            )?;
        }
        info!(
            mirrored,
            reservations, positions, documents, "Cleared listing references"
        );

        self.remove_entry(listing_id).await?;
        self.collect_product(listing.product_id).await?;
        Ok(())
    }

    /// Delete a listing row and node only if nothing references it.
    ///
    /// # Errors
    ///
    /// Returns `ConsistencyError::ListingReferenced` naming the first holder
    /// found; nothing is deleted in that case.
    #[instrument(skip(self), fields(listing_id = %listing_id))]
    pub async fn remove_vendor_to_product_entry(&self, listing_id: ListingId) -> Result<()> {
        let _listing = self.engine.listing_locks().lock(listing_id).await;
        self.remove_entry(listing_id).await
    }

    /// Read view of one listing.
    ///
    /// # Errors
    ///
    /// Returns `ConsistencyError::NotFound` if the listing or its product is
    /// missing.
    pub async fn listing_information(&self, listing_id: ListingId) -> Result<ProductInformation> {
        let stores = self.engine.stores();
        let listing = stores
            .relational
            .listing(listing_id)
            .await?
            .ok_or_else(|| ConsistencyError::not_found(Entity::Listing, listing_id))?;
        let product = stores
            .relational
            .product(listing.product_id)
            .await?
            .ok_or_else(|| ConsistencyError::not_found(Entity::Product, listing.product_id))?;
        self.information(listing, product).await
    }

    /// Read views of every listing of a vendor, in listing id order.
    ///
    /// # Errors
    ///
    /// Returns `ConsistencyError::NotFound` if the vendor does not exist.
    pub async fn vendor_listings(&self, vendor_id: VendorId) -> Result<Vec<ProductInformation>> {
        self.engine.accounts().vendor(vendor_id).await?;
        let catalog = self
            .engine
            .stores()
            .relational
            .vendor_catalog(vendor_id)
            .await?;

        let mut views = Vec::with_capacity(catalog.len());
        for listed in catalog {
            views.push(self.information(listed.listing, listed.product).await?);
        }
        Ok(views)
    }

    // =========================================================================
    // Internals
    // =========================================================================

    async fn information(&self, listing: Listing, product: Product) -> Result<ProductInformation> {
        let mut categories = self
            .engine
            .stores()
            .graph
            .product_categories(product.id)
            .await?;
        categories.sort_unstable();
        Ok(ProductInformation {
            listing_id: Some(listing.id),
            name: product.name,
            description: product.description,
            unit_price: listing.unit_price,
            inventory_level: listing.inventory_level,
            categories,
        })
    }

    /// Guarded delete of a listing; the caller holds the listing lock.
    async fn remove_entry(&self, listing_id: ListingId) -> Result<()> {
        let stores = self.engine.stores();
        if let Some(holder) = first_holder(stores, &ListingProbe::REMOVAL, listing_id).await? {
            return Err(ConsistencyError::ListingReferenced {
                listing: listing_id,
                holder: holder.to_string(),
            });
        }

        stores
            .relational
            .delete_cart_items_for_listing(listing_id)
            .await?;
        let deleted = stores.relational.delete_listing(listing_id).await?;
        follow_up(
            stores.graph.delete_listing_node(listing_id).await,
            "listing node",
        )?;
        info!(deleted, "Deleted listing");
        Ok(())
    }

    async fn insert_product(&self, name: &str, description: &str) -> Result<Product> {
        let stores = self.engine.stores();
        let product = Product {
            id: ProductId::new(stores.ids.next_id(IdSequence::Product).await?),
            name: name.to_owned(),
            description: description.to_owned(),
        };
        stores.relational.insert_product(&product).await?;
        follow_up(
            stores.graph.insert_product_node(&product).await,
            "product node",
        )?;
        info!(product_id = %product.id, "Created product");
        Ok(product)
    }

    /// Delete a product that no listing points at anymore.
    async fn collect_product(&self, product_id: ProductId) -> Result<()> {
        let stores = self.engine.stores();
        if stores.relational.has_listing_for_product(product_id).await? {
            debug!(%product_id, "Product still listed");
            return Ok(());
        }

        let edges = follow_up(
            stores.graph.delete_category_edges(product_id).await,
            "category edges",
        )?;
        stores.relational.delete_product(product_id).await?;
        if !follow_up(
            stores.graph.delete_product_node(product_id).await,
            "product node",
        )? {
            warn!(%product_id, "Product node was already missing");
        }
        info!(%product_id, edges, "Collected unlisted product");
        Ok(())
    }

    async fn link_category(&self, product_id: ProductId, category_id: CategoryId) -> Result<()> {
        let graph = &self.engine.stores().graph;
        if graph.has_category_edge(product_id, category_id).await? {
            return Ok(());
        }
        follow_up(
            graph.insert_category_edge(product_id, category_id).await,
            "category edge",
        )?;
        debug!(%product_id, %category_id, "Linked category");
        Ok(())
    }

    async fn require_product(&self, product_id: ProductId) -> Result<()> {
        let stores = self.engine.stores();
        if stores.relational.product(product_id).await?.is_none()
            || !stores.graph.product_node_exists(product_id).await?
        {
            return Err(ConsistencyError::not_found(Entity::Product, product_id));
        }
        Ok(())
    }

    async fn require_category(&self, category_id: CategoryId) -> Result<()> {
        let stores = self.engine.stores();
        if stores.relational.category(category_id).await?.is_none()
            || stores.graph.category_node(category_id).await?.is_none()
        {
            return Err(ConsistencyError::not_found(Entity::Category, category_id));
        }
        Ok(())
    }
}

fn check_inventory(level: i32) -> Result<()> {
    if level < 0 {
        return Err(ConsistencyError::InvalidAmount {
            amount: level,
            reason: "inventory level cannot be negative",
        });
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use serde_json::json;
    use tristore_core::{DocumentId, PriceEuro};

    use super::*;
    use crate::EngineConfig;
    use crate::error::ErrorKind;
    use crate::models::{Document, NewVendor};
    use crate::store::memory::InMemoryStores;

    fn info(name: &str, cents: i64, inventory: i32) -> ProductInformation {
        ProductInformation {
            listing_id: None,
            name: name.to_owned(),
            description: format!("{name} description"),
            unit_price: PriceEuro::from_cents(cents).unwrap(),
            inventory_level: inventory,
            categories: Vec::new(),
        }
    }

    async fn setup() -> (InMemoryStores, Engine, VendorId, VendorId) {
        let handles = InMemoryStores::new();
        let engine = Engine::new(handles.stores(), &EngineConfig::default());
        let mut vendors = Vec::new();
        for name in ["Acme", "Globex"] {
            let vendor = engine
                .accounts()
                .create_vendor(NewVendor {
                    name: name.into(),
                    user_name: name.to_lowercase(),
                    email: format!("sales@{}.test", name.to_lowercase()),
                    phone_number: None,
                })
                .await
                .unwrap();
            vendors.push(vendor.id);
        }
        (handles, engine, vendors[0], vendors[1])
    }

    #[tokio::test]
    async fn test_create_category_rejects_duplicate_name() {
        let (_, engine, _, _) = setup().await;
        let catalog = engine.catalog();
        catalog.create_named_category("Tools").await.unwrap();

        let err = catalog
            .create_category(Category {
                id: CategoryId::new(50),
                name: "Tools".into(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ConsistencyError::DuplicateCategory { .. }));
    }

    #[tokio::test]
    async fn test_named_categories_skip_caller_ids() {
        let (_, engine, _, _) = setup().await;
        let catalog = engine.catalog();
        catalog
            .create_category(Category {
                id: CategoryId::new(5),
                name: "Tools".into(),
            })
            .await
            .unwrap();

        let named = catalog.create_named_category("Garden").await.unwrap();
        assert_eq!(named.id, CategoryId::new(6));

        // A lower caller id leaves the sequence where it is.
        catalog
            .create_category(Category {
                id: CategoryId::new(2),
                name: "Kitchen".into(),
            })
            .await
            .unwrap();
        let next = catalog.create_named_category("Paint").await.unwrap();
        assert_eq!(next.id, CategoryId::new(7));
    }

    #[tokio::test]
    async fn test_create_category_surfaces_graph_failure() {
        let (handles, engine, _, _) = setup().await;
        handles.graph.set_fail_writes(true);

        let err = engine
            .catalog()
            .create_named_category("Garden")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StoreUnavailable);

        // Relational row stays; the category is not usable until both exist.
        let stores = engine.stores();
        assert!(
            stores
                .relational
                .category_by_name("Garden")
                .await
                .unwrap()
                .is_some()
        );
        handles.graph.set_fail_writes(false);
        let id = stores
            .relational
            .category_by_name("Garden")
            .await
            .unwrap()
            .unwrap()
            .id;
        let err = engine
            .catalog()
            .update_category(
                id,
                Category {
                    id,
                    name: "Yard".into(),
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_update_category_checks_ids_and_names() {
        let (_, engine, _, _) = setup().await;
        let catalog = engine.catalog();
        let tools = catalog.create_named_category("Tools").await.unwrap();
        catalog.create_named_category("Garden").await.unwrap();

        let mismatch = catalog
            .update_category(
                tools.id,
                Category {
                    id: CategoryId::new(99),
                    name: "Hardware".into(),
                },
            )
            .await
            .unwrap_err();
        assert_eq!(mismatch.kind(), ErrorKind::IdMismatch);

        let taken = catalog
            .update_category(
                tools.id,
                Category {
                    id: tools.id,
                    name: "Garden".into(),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(taken, ConsistencyError::DuplicateCategory { .. }));

        let renamed = catalog
            .update_category(
                tools.id,
                Category {
                    id: tools.id,
                    name: "Hardware".into(),
                },
            )
            .await
            .unwrap();
        assert_eq!(renamed.name, "Hardware");
    }

    #[tokio::test]
    async fn test_delete_category_in_use() {
        let (_, engine, acme, _) = setup().await;
        let catalog = engine.catalog();
        let tools = catalog.create_named_category("Tools").await.unwrap();
        let mut widget = info("Widget", 500, 10);
        widget.categories = vec![tools.id];
        catalog.create_vendor_product(acme, widget).await.unwrap();

        let err = catalog.delete_category(tools.id).await.unwrap_err();
        assert!(matches!(err, ConsistencyError::CategoryInUse(_)));
    }

    #[tokio::test]
    async fn test_products_are_shared_by_name() {
        let (handles, engine, acme, globex) = setup().await;
        let catalog = engine.catalog();

        let l1 = catalog
            .create_vendor_product(acme, info("Widget", 500, 10))
            .await
            .unwrap();
        let l2 = catalog
            .create_vendor_product(globex, info("Widget", 600, 4))
            .await
            .unwrap();

        let first = engine.stores().relational.listing(l1).await.unwrap().unwrap();
        let second = engine.stores().relational.listing(l2).await.unwrap().unwrap();
        assert_eq!(first.product_id, second.product_id);
        assert_eq!(handles.relational.product_count(), 1);
        assert_eq!(handles.graph.product_node_count(), 1);

        let err = catalog
            .create_vendor_product(acme, info("Widget", 450, 1))
            .await
            .unwrap_err();
        assert!(matches!(err, ConsistencyError::DuplicateListing { .. }));
    }

    #[tokio::test]
    async fn test_unknown_category_rejected_before_writes() {
        let (handles, engine, acme, _) = setup().await;
        let mut widget = info("Widget", 500, 10);
        widget.categories = vec![CategoryId::new(77)];

        let err = engine
            .catalog()
            .create_vendor_product(acme, widget)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(handles.relational.product_count(), 0);
    }

    #[tokio::test]
    async fn test_update_repoints_and_collects_old_product() {
        let (handles, engine, acme, _) = setup().await;
        let catalog = engine.catalog();
        let tools = catalog.create_named_category("Tools").await.unwrap();
        let mut widget = info("Widget", 500, 10);
        widget.categories = vec![tools.id];
        let listing = catalog.create_vendor_product(acme, widget).await.unwrap();

        let updated = catalog
            .update_vendor_product(acme, listing, info("Gadget", 750, 3))
            .await
            .unwrap();

        assert_eq!(updated.name, "Gadget");
        assert_eq!(updated.inventory_level, 3);
        assert!(updated.categories.is_empty());
        assert_eq!(handles.relational.product_count(), 1);
        assert_eq!(handles.graph.product_node_count(), 1);
        assert_eq!(handles.graph.category_edge_count(), 0);
    }

    #[tokio::test]
    async fn test_update_of_foreign_listing_is_not_found() {
        let (_, engine, acme, globex) = setup().await;
        let catalog = engine.catalog();
        let listing = catalog
            .create_vendor_product(acme, info("Widget", 500, 10))
            .await
            .unwrap();

        let err = catalog
            .update_vendor_product(globex, listing, info("Widget", 1, 1))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_remove_vendor_product_keeps_shared_product() {
        let (handles, engine, acme, globex) = setup().await;
        let catalog = engine.catalog();
        let l1 = catalog
            .create_vendor_product(acme, info("Widget", 500, 10))
            .await
            .unwrap();
        catalog
            .create_vendor_product(globex, info("Widget", 600, 4))
            .await
            .unwrap();

        catalog.remove_vendor_product(l1).await.unwrap();
        assert_eq!(handles.relational.product_count(), 1);

        // Already gone: no-op.
        catalog.remove_vendor_product(l1).await.unwrap();
    }

    #[tokio::test]
    async fn test_remove_vendor_product_clears_documents() {
        let (handles, engine, acme, _) = setup().await;
        let catalog = engine.catalog();
        let listing = catalog
            .create_vendor_product(acme, info("Widget", 500, 10))
            .await
            .unwrap();
        engine
            .stores()
            .documents
            .insert(&Document {
                id: DocumentId::new(1),
                collection: DocumentCollection::ProductImage,
                customer_id: None,
                listing_id: Some(listing),
                body: json!({ "fileName": "widget.png" }),
                created_at: Utc::now(),
            })
            .await
            .unwrap();

        let guarded = catalog
            .remove_vendor_to_product_entry(listing)
            .await
            .unwrap_err();
        assert!(matches!(
            guarded,
            ConsistencyError::ListingReferenced { .. }
        ));

        catalog.remove_vendor_product(listing).await.unwrap();
        assert!(handles.documents.is_empty(DocumentCollection::ProductImage));
        assert_eq!(handles.relational.product_count(), 0);
        assert_eq!(handles.graph.product_node_count(), 0);
    }
}
