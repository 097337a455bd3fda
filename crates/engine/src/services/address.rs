//! Address deduplication and reference counting.
//!
//! One `address` row exists per distinct (street, city, postal code, country).
//! Owners point at it through their kind's junction table. An address with
//! no junction row, no delivering order position and no billed order is
//! garbage and gets deleted when its last owner reference goes away.

use tracing::{debug, info, instrument, warn};

use tristore_core::{AddressId, AddressReferenceId};

use crate::engine::Engine;
use crate::error::{ConsistencyError, Entity, Result};
use crate::models::{Address, AddressCandidate, Owner, OwnerAddressReference};
use crate::scan::{AddressProbe, first_holder};
use crate::store::{IdSequence, StoreError};

/// Address operations.
pub struct AddressService<'a> {
    engine: &'a Engine,
}

impl<'a> AddressService<'a> {
    pub(crate) const fn new(engine: &'a Engine) -> Self {
        Self { engine }
    }

    /// Attach an address to an owner, reusing an identical stored address.
    ///
    /// # Errors
    ///
    /// Returns `ConsistencyError::NotFound` if the owner does not exist.
    /// Returns `ConsistencyError::ReferenceAlreadyExists` if the owner
    /// already references the matching address.
    #[instrument(skip(self, candidate), fields(owner = %owner))]
    pub async fn create_or_reuse(
        &self,
        owner: Owner,
        candidate: AddressCandidate,
    ) -> Result<Address> {
        self.engine.accounts().require_owner(owner).await?;
        self.attach(owner, candidate).await
    }

    /// Move an owner from one address to another.
    ///
    /// The old address is deleted if nothing references it afterwards. A
    /// missing junction row for the old address is tolerated.
    ///
    /// # Errors
    ///
    /// Returns `ConsistencyError::NotFound` if the owner does not exist.
    /// Returns `ConsistencyError::ReferenceAlreadyExists` if the owner
    /// already references a different address with the new content.
    #[instrument(skip(self, candidate), fields(owner = %owner, old_address_id = %old_address_id))]
    pub async fn update(
        &self,
        owner: Owner,
        old_address_id: AddressId,
        candidate: AddressCandidate,
    ) -> Result<Address> {
        let relational = &self.engine.stores().relational;
        self.engine.accounts().require_owner(owner).await?;

        if let Some(existing) = relational.find_address(&candidate).await?
            && existing.id != old_address_id
            && relational.owner_reference(owner, existing.id).await?.is_some()
        {
            return Err(reference_exists(owner, existing.id));
        }

        let removed = relational
            .delete_owner_reference(owner, old_address_id)
            .await?;
        debug!(removed, "Removed old owner reference");

        let address = self.attach(owner, candidate).await?;
        if address.id != old_address_id {
            self.collect(old_address_id).await?;
        }
        Ok(address)
    }

    /// Detach an address from an owner and delete it if now unreferenced.
    ///
    /// Idempotent: a missing junction row is not an error.
    ///
    /// # Errors
    ///
    /// Returns `ConsistencyError::Store` if a store call fails.
    #[instrument(skip(self), fields(owner = %owner, address_id = %address_id))]
    pub async fn delete_owner_address(&self, owner: Owner, address_id: AddressId) -> Result<()> {
        let removed = self
            .engine
            .stores()
            .relational
            .delete_owner_reference(owner, address_id)
            .await?;
        debug!(removed, "Removed owner reference");
        self.collect(address_id).await.map(drop)
    }

    /// Detach every address of an owner.
    ///
    /// # Errors
    ///
    /// Returns `ConsistencyError::Store` if a store call fails.
    #[instrument(skip(self), fields(owner = %owner))]
    pub async fn delete_owner_addresses(&self, owner: Owner) -> Result<()> {
        for address in self.owner_addresses(owner).await? {
            self.delete_owner_address(owner, address.id).await?;
        }
        Ok(())
    }

    /// Addresses referenced by an owner, in id order.
    ///
    /// # Errors
    ///
    /// Returns `ConsistencyError::Store` if the query fails.
    pub async fn owner_addresses(&self, owner: Owner) -> Result<Vec<Address>> {
        Ok(self
            .engine
            .stores()
            .relational
            .owner_addresses(owner)
            .await?)
    }

    /// Fetch an address.
    ///
    /// # Errors
    ///
    /// Returns `ConsistencyError::NotFound` if the address does not exist.
    pub async fn address(&self, id: AddressId) -> Result<Address> {
        self.engine
            .stores()
            .relational
            .address(id)
            .await?
            .ok_or_else(|| ConsistencyError::not_found(Entity::Address, id))
    }

    /// Find or create the address, then write the junction row under the
    /// address lock. Retries if the address was collected before the lock
    /// was taken.
    async fn attach(&self, owner: Owner, candidate: AddressCandidate) -> Result<Address> {
        let stores = self.engine.stores();

        loop {
            let address = match stores.relational.find_address(&candidate).await? {
                Some(existing) => {
                    debug!(address_id = %existing.id, "Reusing address");
                    existing
                }
                None => self.insert_address(candidate.clone()).await?,
            };

            let _guard = self.engine.address_locks().lock(address.id).await;
            if stores.relational.address(address.id).await?.is_none() {
                debug!(address_id = %address.id, "Address collected before attach, retrying");
                continue;
            }
            if stores
                .relational
                .owner_reference(owner, address.id)
                .await?
                .is_some()
            {
                return Err(reference_exists(owner, address.id));
            }

            let reference = OwnerAddressReference {
                id: AddressReferenceId::new(
                    stores
                        .ids
                        .next_id(IdSequence::owner_reference(owner.kind()))
                        .await?,
                ),
                owner,
                address_id: address.id,
            };
            match stores.relational.insert_owner_reference(&reference).await {
                Ok(()) => {}
                Err(StoreError::Conflict(_)) => return Err(reference_exists(owner, address.id)),
                Err(e) => return Err(e.into()),
            }
            info!(address_id = %address.id, reference_id = %reference.id, "Attached address");
            return Ok(address);
        }
    }

    /// Insert a new address row. If a concurrent writer stored the same
    /// content first, reuse theirs.
    async fn insert_address(&self, candidate: AddressCandidate) -> Result<Address> {
        let stores = self.engine.stores();
        let id = AddressId::new(stores.ids.next_id(IdSequence::Address).await?);
        let address = Address::from_candidate(id, candidate);

        match stores.relational.insert_address(&address).await {
            Ok(()) => {
                info!(address_id = %id, "Created address");
                Ok(address)
            }
            Err(StoreError::Conflict(message)) => {
                let candidate = AddressCandidate {
                    street: address.street,
                    city: address.city,
                    postal_code: address.postal_code,
                    country: address.country,
                };
                match stores.relational.find_address(&candidate).await? {
                    Some(winner) => {
                        debug!(address_id = %winner.id, "Lost address insert race, reusing");
                        Ok(winner)
                    }
                    None => Err(StoreError::Conflict(message).into()),
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Delete the address if no probe finds a holder. Returns whether it
    /// was deleted.
    pub(crate) async fn collect(&self, address_id: AddressId) -> Result<bool> {
        let stores = self.engine.stores();
        let _guard = self.engine.address_locks().lock(address_id).await;
        if let Some(holder) = first_holder(stores, &AddressProbe::ORDER, address_id).await? {
            debug!(%address_id, %holder, "Address still referenced");
            return Ok(false);
        }

        let deleted = stores.relational.delete_address(address_id).await?;
        if deleted {
            info!(%address_id, "Deleted unreferenced address");
        } else {
            warn!(%address_id, "Unreferenced address already gone");
        }
        Ok(deleted)
    }
}

fn reference_exists(owner: Owner, address_id: AddressId) -> ConsistencyError {
    ConsistencyError::ReferenceAlreadyExists {
        owner: owner.to_string(),
        address: address_id.to_string(),
    }
}
