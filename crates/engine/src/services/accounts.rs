//! Owner accounts: customers, vendors and suppliers.
//!
//! Only the relational store holds owner rows. Deletion lives in the cascade
//! service because it has to clean up the other stores first.

use tracing::{info, instrument};

use tristore_core::{CustomerId, SupplierId, VendorId};

use crate::engine::Engine;
use crate::error::{ConsistencyError, Entity, Result};
use crate::models::{
    Customer, NewCustomer, NewSupplier, NewVendor, Owner, Supplier, Vendor,
};
use crate::store::{IdSequence, StoreError};

/// Account operations.
pub struct AccountService<'a> {
    engine: &'a Engine,
}

impl<'a> AccountService<'a> {
    pub(crate) const fn new(engine: &'a Engine) -> Self {
        Self { engine }
    }

    /// Register a customer under a freshly allocated id.
    ///
    /// # Errors
    ///
    /// Returns `ConsistencyError::AlreadyExists` if the user name is taken.
    /// Returns `ConsistencyError::Store` if id allocation or the insert fails.
    #[instrument(skip(self, input), fields(user_name = %input.user_name))]
    pub async fn create_customer(&self, input: NewCustomer) -> Result<Customer> {
        let stores = self.engine.stores();
        let id = CustomerId::new(stores.ids.next_id(IdSequence::Customer).await?);
        let customer = Customer {
            id,
            first_name: input.first_name,
            last_name: input.last_name,
            user_name: input.user_name,
            email: input.email,
        };
        stores
            .relational
            .insert_customer(&customer)
            .await
            .map_err(|e| user_name_taken(e, Entity::Customer, &customer.user_name))?;
        info!(customer_id = %id, "Created customer");
        Ok(customer)
    }

    /// Register a vendor under a freshly allocated id.
    ///
    /// # Errors
    ///
    /// Returns `ConsistencyError::AlreadyExists` if the user name is taken.
    /// Returns `ConsistencyError::Store` if id allocation or the insert fails.
    #[instrument(skip(self, input), fields(user_name = %input.user_name))]
    pub async fn create_vendor(&self, input: NewVendor) -> Result<Vendor> {
        let stores = self.engine.stores();
        let id = VendorId::new(stores.ids.next_id(IdSequence::Vendor).await?);
        let vendor = Vendor {
            id,
            name: input.name,
            user_name: input.user_name,
            email: input.email,
            phone_number: input.phone_number,
        };
        stores
            .relational
            .insert_vendor(&vendor)
            .await
            .map_err(|e| user_name_taken(e, Entity::Vendor, &vendor.user_name))?;
        info!(vendor_id = %id, "Created vendor");
        Ok(vendor)
    }

    /// Register a supplier under a freshly allocated id.
    ///
    /// # Errors
    ///
    /// Returns `ConsistencyError::Store` if id allocation or the insert fails.
    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create_supplier(&self, input: NewSupplier) -> Result<Supplier> {
        let stores = self.engine.stores();
        let id = SupplierId::new(stores.ids.next_id(IdSequence::Supplier).await?);
        let supplier = Supplier {
            id,
            name: input.name,
            email: input.email,
            phone_number: input.phone_number,
        };
        stores.relational.insert_supplier(&supplier).await?;
        info!(supplier_id = %id, "Created supplier");
        Ok(supplier)
    }

    /// Replace a customer's account data.
    ///
    /// # Errors
    ///
    /// Returns `ConsistencyError::IdMismatch` if `customer.id != customer_id`.
    /// Returns `ConsistencyError::NotFound` if the customer does not exist.
    /// Returns `ConsistencyError::AlreadyExists` if another customer holds the
    /// user name.
    #[instrument(skip(self, customer), fields(customer_id = %customer_id))]
    pub async fn update_customer(
        &self,
        customer_id: CustomerId,
        customer: Customer,
    ) -> Result<Customer> {
        check_id(customer_id, customer.id)?;
        self.customer(customer_id).await?;

        let updated = self
            .engine
            .stores()
            .relational
            .update_customer(&customer)
            .await
            .map_err(|e| user_name_taken(e, Entity::Customer, &customer.user_name))?;
        if !updated {
            return Err(ConsistencyError::not_found(Entity::Customer, customer_id));
        }
        info!("Updated customer");
        Ok(customer)
    }

    /// Replace a vendor's account data.
    ///
    /// # Errors
    ///
    /// Returns `ConsistencyError::IdMismatch` if `vendor.id != vendor_id`.
    /// Returns `ConsistencyError::NotFound` if the vendor does not exist.
    /// Returns `ConsistencyError::AlreadyExists` if another vendor holds the
    /// user name.
    #[instrument(skip(self, vendor), fields(vendor_id = %vendor_id))]
    pub async fn update_vendor(&self, vendor_id: VendorId, vendor: Vendor) -> Result<Vendor> {
        check_id(vendor_id, vendor.id)?;
        self.vendor(vendor_id).await?;

        let updated = self
            .engine
            .stores()
            .relational
            .update_vendor(&vendor)
            .await
            .map_err(|e| user_name_taken(e, Entity::Vendor, &vendor.user_name))?;
        if !updated {
            return Err(ConsistencyError::not_found(Entity::Vendor, vendor_id));
        }
        info!("Updated vendor");
        Ok(vendor)
    }

    /// Replace a supplier's data.
    ///
    /// # Errors
    ///
    /// Returns `ConsistencyError::IdMismatch` if `supplier.id != supplier_id`.
    /// Returns `ConsistencyError::NotFound` if the supplier does not exist.
    #[instrument(skip(self, supplier), fields(supplier_id = %supplier_id))]
    pub async fn update_supplier(
        &self,
        supplier_id: SupplierId,
        supplier: Supplier,
    ) -> Result<Supplier> {
        check_id(supplier_id, supplier.id)?;
        self.supplier(supplier_id).await?;

        if !self
            .engine
            .stores()
            .relational
            .update_supplier(&supplier)
            .await?
        {
            return Err(ConsistencyError::not_found(Entity::Supplier, supplier_id));
        }
        info!("Updated supplier");
        Ok(supplier)
    }

    /// Fetch a customer.
    ///
    /// # Errors
    ///
    /// Returns `ConsistencyError::NotFound` if the customer does not exist.
    pub async fn customer(&self, id: CustomerId) -> Result<Customer> {
        self.engine
            .stores()
            .relational
            .customer(id)
            .await?
            .ok_or_else(|| ConsistencyError::not_found(Entity::Customer, id))
    }

    /// Fetch a vendor.
    ///
    /// # Errors
    ///
    /// Returns `ConsistencyError::NotFound` if the vendor does not exist.
    pub async fn vendor(&self, id: VendorId) -> Result<Vendor> {
        self.engine
            .stores()
            .relational
            .vendor(id)
            .await?
            .ok_or_else(|| ConsistencyError::not_found(Entity::Vendor, id))
    }

    /// Fetch a supplier.
    ///
    /// # Errors
    ///
    /// Returns `ConsistencyError::NotFound` if the supplier does not exist.
    pub async fn supplier(&self, id: SupplierId) -> Result<Supplier> {
        self.engine
            .stores()
            .relational
            .supplier(id)
            .await?
            .ok_or_else(|| ConsistencyError::not_found(Entity::Supplier, id))
    }

    /// Fail with `NotFound` unless the owner row exists.
    pub(crate) async fn require_owner(&self, owner: Owner) -> Result<()> {
        match owner {
            Owner::Customer(id) => self.customer(id).await.map(drop),
            Owner::Vendor(id) => self.vendor(id).await.map(drop),
            Owner::Supplier(id) => self.supplier(id).await.map(drop),
        }
    }
}

fn check_id<I: PartialEq + std::fmt::Display>(path: I, body: I) -> Result<()> {
    if path != body {
        return Err(ConsistencyError::IdMismatch {
            path: path.to_string(),
            body: body.to_string(),
        });
    }
    Ok(())
}

fn user_name_taken(err: StoreError, entity: Entity, user_name: &str) -> ConsistencyError {
    match err {
        StoreError::Conflict(_) => ConsistencyError::AlreadyExists {
            entity,
            id: user_name.to_owned(),
        },
        other => other.into(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn new_customer(user_name: &str) -> NewCustomer {
        NewCustomer {
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            user_name: user_name.into(),
            email: format!("{user_name}@example.test"),
        }
    }

    fn new_vendor(user_name: &str) -> NewVendor {
        NewVendor {
            name: "Acme".into(),
            user_name: user_name.into(),
            email: format!("{user_name}@acme.test"),
            phone_number: None,
        }
    }

    #[tokio::test]
    async fn test_user_names_are_unique_per_kind() {
        let engine = Engine::in_memory();
        let accounts = engine.accounts();

        accounts.create_customer(new_customer("ada")).await.unwrap();
        let err = accounts
            .create_customer(new_customer("ada"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DuplicateEntity);
        assert!(matches!(
            err,
            ConsistencyError::AlreadyExists { entity: Entity::Customer, ref id } if id == "ada"
        ));

        // Vendors have their own namespace.
        accounts.create_vendor(new_vendor("ada")).await.unwrap();
        let err = accounts.create_vendor(new_vendor("ada")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DuplicateEntity);
    }

    #[tokio::test]
    async fn test_update_customer() {
        let engine = Engine::in_memory();
        let accounts = engine.accounts();
        let ada = accounts.create_customer(new_customer("ada")).await.unwrap();
        let bob = accounts.create_customer(new_customer("bob")).await.unwrap();

        let renamed = Customer {
            email: "ada@lovelace.test".into(),
            ..ada.clone()
        };
        let updated = accounts.update_customer(ada.id, renamed.clone()).await.unwrap();
        assert_eq!(updated, renamed);
        assert_eq!(accounts.customer(ada.id).await.unwrap(), renamed);

        let mismatch = accounts
            .update_customer(bob.id, renamed.clone())
            .await
            .unwrap_err();
        assert_eq!(mismatch.kind(), ErrorKind::IdMismatch);

        let taken = accounts
            .update_customer(
                bob.id,
                Customer {
                    user_name: "ada".into(),
                    ..bob.clone()
                },
            )
            .await
            .unwrap_err();
        assert_eq!(taken.kind(), ErrorKind::DuplicateEntity);
        assert_eq!(accounts.customer(bob.id).await.unwrap(), bob);

        let missing = Customer {
            id: CustomerId::new(99),
            ..renamed
        };
        let err = accounts
            .update_customer(missing.id, missing)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_update_vendor_and_supplier() {
        let engine = Engine::in_memory();
        let accounts = engine.accounts();
        let acme = accounts.create_vendor(new_vendor("acme")).await.unwrap();
        let parcel = accounts
            .create_supplier(NewSupplier {
                name: "Parcel Co".into(),
                email: "ops@parcel.test".into(),
                phone_number: None,
            })
            .await
            .unwrap();

        let vendor = Vendor {
            phone_number: Some("+43 1 234".into()),
            ..acme.clone()
        };
        assert_eq!(
            accounts.update_vendor(acme.id, vendor.clone()).await.unwrap(),
            vendor
        );
        let err = accounts
            .update_vendor(VendorId::new(acme.id.as_i32() + 1), vendor)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IdMismatch);

        let supplier = Supplier {
            name: "Parcel Company".into(),
            ..parcel.clone()
        };
        accounts
            .update_supplier(parcel.id, supplier.clone())
            .await
            .unwrap();
        assert_eq!(accounts.supplier(parcel.id).await.unwrap(), supplier);

        let ghost = Supplier {
            id: SupplierId::new(42),
            ..supplier
        };
        let err = accounts.update_supplier(ghost.id, ghost).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_ids_are_allocated_per_kind() {
        let engine = Engine::in_memory();
        let accounts = engine.accounts();

        let customer = accounts
            .create_customer(NewCustomer {
                first_name: "Ada".into(),
                last_name: "Lovelace".into(),
                user_name: "ada".into(),
                email: "ada@example.test".into(),
            })
            .await
            .unwrap();
        let supplier = accounts
            .create_supplier(NewSupplier {
                name: "Parcel Co".into(),
                email: "ops@parcel.test".into(),
                phone_number: Some("+49 30 1234".into()),
            })
            .await
            .unwrap();

        assert_eq!(customer.id, CustomerId::new(1));
        assert_eq!(supplier.id, SupplierId::new(1));
        assert_eq!(accounts.customer(customer.id).await.unwrap(), customer);
    }

    #[tokio::test]
    async fn test_require_owner_missing() {
        let engine = Engine::in_memory();
        let err = engine
            .accounts()
            .require_owner(Owner::Vendor(VendorId::new(8)))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}
