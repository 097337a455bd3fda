//! In-memory graph store.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;

use tristore_core::{CartId, CategoryId, CustomerId, ListingId, ProductId};

use crate::models::{Category, Listing, Product, Reservation, ShoppingCart};
use crate::store::{GraphStore, StoreError, StoreKind, StoreResult};

#[derive(Debug, Default)]
struct Graph {
    products: BTreeMap<ProductId, Product>,
    categories: BTreeMap<CategoryId, Category>,
    listings: BTreeMap<ListingId, Listing>,
    carts: BTreeMap<CartId, ShoppingCart>,
    has_category: BTreeSet<(ProductId, CategoryId)>,
    is_in: BTreeMap<(CartId, ListingId), i32>,
}

/// Graph store held in process memory.
///
/// Node and edge deletes are detaching: removing a node drops its edges.
#[derive(Debug, Default)]
pub struct InMemoryGraphStore {
    graph: RwLock<Graph>,
    fail_writes: AtomicBool,
}

impl InMemoryGraphStore {
    /// Create an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write fail with [`StoreError::Unavailable`].
    /// Reads keep working.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of `Product` nodes.
    #[must_use]
    pub fn product_node_count(&self) -> usize {
        self.graph.read().products.len()
    }

    /// Number of `HAS_CATEGORY` edges.
    #[must_use]
    pub fn category_edge_count(&self) -> usize {
        self.graph.read().has_category.len()
    }

    fn writable(&self) -> StoreResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::unavailable(
                StoreKind::Graph,
                "write rejected by failure injection",
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl GraphStore for InMemoryGraphStore {
    async fn insert_product_node(&self, product: &Product) -> StoreResult<()> {
        self.writable()?;
        self.graph
            .write()
            .products
            .insert(product.id, product.clone());
        Ok(())
    }

    async fn product_node_exists(&self, id: ProductId) -> StoreResult<bool> {
        Ok(self.graph.read().products.contains_key(&id))
    }

    async fn delete_product_node(&self, id: ProductId) -> StoreResult<bool> {
        self.writable()?;
        let mut graph = self.graph.write();
        graph.has_category.retain(|(p, _)| *p != id);
        Ok(graph.products.remove(&id).is_some())
    }

    async fn insert_category_node(&self, category: &Category) -> StoreResult<()> {
        self.writable()?;
        self.graph
            .write()
            .categories
            .insert(category.id, category.clone());
        Ok(())
    }

    async fn category_node(&self, id: CategoryId) -> StoreResult<Option<Category>> {
        Ok(self.graph.read().categories.get(&id).cloned())
    }

    async fn category_node_by_name(&self, name: &str) -> StoreResult<Option<Category>> {
        Ok(self
            .graph
            .read()
            .categories
            .values()
            .find(|c| c.name == name)
            .cloned())
    }

    async fn update_category_node(&self, category: &Category) -> StoreResult<bool> {
        self.writable()?;
        let mut graph = self.graph.write();
        match graph.categories.get_mut(&category.id) {
            Some(node) => {
                node.name.clone_from(&category.name);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_category_node(&self, id: CategoryId) -> StoreResult<bool> {
        self.writable()?;
        let mut graph = self.graph.write();
        graph.has_category.retain(|(_, c)| *c != id);
        Ok(graph.categories.remove(&id).is_some())
    }

    async fn insert_listing_node(&self, listing: &Listing) -> StoreResult<()> {
        self.writable()?;
        self.graph
            .write()
            .listings
            .insert(listing.id, listing.clone());
        Ok(())
    }

    async fn listing_node(&self, id: ListingId) -> StoreResult<Option<Listing>> {
        Ok(self.graph.read().listings.get(&id).cloned())
    }

    async fn update_listing_node(&self, listing: &Listing) -> StoreResult<bool> {
        self.writable()?;
        let mut graph = self.graph.write();
        match graph.listings.get_mut(&listing.id) {
            Some(node) => {
                *node = listing.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_listing_node(&self, id: ListingId) -> StoreResult<bool> {
        self.writable()?;
        let mut graph = self.graph.write();
        graph.is_in.retain(|(_, l), _| *l != id);
        Ok(graph.listings.remove(&id).is_some())
    }

    async fn insert_cart_node(&self, cart: &ShoppingCart) -> StoreResult<()> {
        self.writable()?;
        self.graph.write().carts.insert(cart.id, cart.clone());
        Ok(())
    }

    async fn cart_node_exists(&self, id: CartId) -> StoreResult<bool> {
        Ok(self.graph.read().carts.contains_key(&id))
    }

    async fn customer_has_cart_node(&self, customer_id: CustomerId) -> StoreResult<bool> {
        Ok(self
            .graph
            .read()
            .carts
            .values()
            .any(|c| c.customer_id == customer_id))
    }

    async fn delete_cart_node(&self, id: CartId) -> StoreResult<bool> {
        self.writable()?;
        let mut graph = self.graph.write();
        graph.is_in.retain(|(c, _), _| *c != id);
        Ok(graph.carts.remove(&id).is_some())
    }

    async fn has_category_edge(
        &self,
        product_id: ProductId,
        category_id: CategoryId,
    ) -> StoreResult<bool> {
        Ok(self
            .graph
            .read()
            .has_category
            .contains(&(product_id, category_id)))
    }

    async fn insert_category_edge(
        &self,
        product_id: ProductId,
        category_id: CategoryId,
    ) -> StoreResult<()> {
        self.writable()?;
        let mut graph = self.graph.write();
        if !graph.products.contains_key(&product_id) || !graph.categories.contains_key(&category_id)
        {
            return Err(StoreError::DataCorruption(format!(
                "HAS_CATEGORY endpoints missing: product {product_id}, category {category_id}"
            )));
        }
        graph.has_category.insert((product_id, category_id));
        Ok(())
    }

    async fn delete_category_edge(
        &self,
        product_id: ProductId,
        category_id: CategoryId,
    ) -> StoreResult<bool> {
        self.writable()?;
        Ok(self
            .graph
            .write()
            .has_category
            .remove(&(product_id, category_id)))
    }

    async fn delete_category_edges(&self, product_id: ProductId) -> StoreResult<u64> {
        self.writable()?;
        let mut graph = self.graph.write();
        let before = graph.has_category.len();
        graph.has_category.retain(|(p, _)| *p != product_id);
        Ok((before - graph.has_category.len()) as u64)
    }

    async fn product_categories(&self, product_id: ProductId) -> StoreResult<Vec<CategoryId>> {
        Ok(self
            .graph
            .read()
            .has_category
            .iter()
            .filter(|(p, _)| *p == product_id)
            .map(|(_, c)| *c)
            .collect())
    }

    async fn category_has_products(&self, category_id: CategoryId) -> StoreResult<bool> {
        Ok(self
            .graph
            .read()
            .has_category
            .iter()
            .any(|(_, c)| *c == category_id))
    }

    async fn reservation(
        &self,
        cart_id: CartId,
        listing_id: ListingId,
    ) -> StoreResult<Option<Reservation>> {
        Ok(self
            .graph
            .read()
            .is_in
            .get(&(cart_id, listing_id))
            .map(|&amount| Reservation {
                cart_id,
                listing_id,
                amount,
            }))
    }

    async fn put_reservation(&self, reservation: &Reservation) -> StoreResult<()> {
        self.writable()?;
        let mut graph = self.graph.write();
        if !graph.carts.contains_key(&reservation.cart_id)
            || !graph.listings.contains_key(&reservation.listing_id)
        {
            return Err(StoreError::DataCorruption(format!(
                "IS_IN endpoints missing: listing {}, cart {}",
                reservation.listing_id, reservation.cart_id
            )));
        }
        graph.is_in.insert(
            (reservation.cart_id, reservation.listing_id),
            reservation.amount,
        );
        Ok(())
    }

    async fn delete_reservation(
        &self,
        cart_id: CartId,
        listing_id: ListingId,
    ) -> StoreResult<bool> {
        self.writable()?;
        Ok(self
            .graph
            .write()
            .is_in
            .remove(&(cart_id, listing_id))
            .is_some())
    }

    async fn cart_reservations(&self, cart_id: CartId) -> StoreResult<Vec<Reservation>> {
        Ok(self
            .graph
            .read()
            .is_in
            .iter()
            .filter(|((c, _), _)| *c == cart_id)
            .map(|(&(cart_id, listing_id), &amount)| Reservation {
                cart_id,
                listing_id,
                amount,
            })
            .collect())
    }

    async fn listing_has_reservations(&self, listing_id: ListingId) -> StoreResult<bool> {
        Ok(self
            .graph
            .read()
            .is_in
            .keys()
            .any(|(_, l)| *l == listing_id))
    }

    async fn delete_listing_reservations(&self, listing_id: ListingId) -> StoreResult<u64> {
        self.writable()?;
        let mut graph = self.graph.write();
        let before = graph.is_in.len();
        graph.is_in.retain(|(_, l), _| *l != listing_id);
        Ok((before - graph.is_in.len()) as u64)
    }

    async fn delete_customer_reservations(&self, customer_id: CustomerId) -> StoreResult<u64> {
        self.writable()?;
        let mut guard = self.graph.write();
        let graph = &mut *guard;
        let before = graph.is_in.len();
        let carts = &graph.carts;
        graph.is_in.retain(|(cart_id, _), _| {
            carts
                .get(cart_id)
                .is_none_or(|cart| cart.customer_id != customer_id)
        });
        Ok((before - graph.is_in.len()) as u64)
    }
}
