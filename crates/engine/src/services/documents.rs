//! Document store entries: reviews, recommendations, customer actions and
//! media metadata.
//!
//! Every document points at a listing, and reviews, recommendations and
//! actions also point at a customer. Both references are checked against the
//! relational store before insert. Binary media payloads are not stored here,
//! only their metadata.

use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, instrument};

use tristore_core::{ActionType, CustomerId, DocumentId, ListingId};

use super::follow_up;
use crate::engine::Engine;
use crate::error::{ConsistencyError, Entity, Result};
use crate::models::{Document, DocumentCollection, DocumentFilter};
use crate::store::IdSequence;

/// Review text and star rating.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewContent {
    pub review_text: String,
    /// 1 to 5.
    pub rating: i32,
}

/// Metadata describing an uploaded image or video.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaMetadata {
    pub file_name: String,
    pub content_type: String,
    pub size_bytes: u64,
}

/// Document operations.
pub struct DocumentService<'a> {
    engine: &'a Engine,
}

impl<'a> DocumentService<'a> {
    pub(crate) const fn new(engine: &'a Engine) -> Self {
        Self { engine }
    }

    // =========================================================================
    // Customer documents
    // =========================================================================

    /// Store a customer's review of a listing.
    ///
    /// # Errors
    ///
    /// Returns `ConsistencyError::InvalidAmount` for a rating outside 1..=5.
    /// Returns `ConsistencyError::NotFound` if the customer or the listing is
    /// missing.
    #[instrument(skip(self, content), fields(customer_id = %customer_id, listing_id = %listing_id))]
    pub async fn create_review(
        &self,
        customer_id: CustomerId,
        listing_id: ListingId,
        content: ReviewContent,
    ) -> Result<Document> {
        check_rating(content.rating)?;
        self.require_references(Some(customer_id), listing_id).await?;
        self.insert(
            DocumentCollection::Review,
            Some(customer_id),
            listing_id,
            review_body(&content),
        )
        .await
    }

    /// Replace the text and rating of a review.
    ///
    /// # Errors
    ///
    /// Returns `ConsistencyError::InvalidAmount` for a rating outside 1..=5.
    /// Returns `ConsistencyError::NotFound` if the review does not exist.
    #[instrument(skip(self, content), fields(review_id = %review_id))]
    pub async fn update_review(
        &self,
        review_id: DocumentId,
        content: ReviewContent,
    ) -> Result<Document> {
        check_rating(content.rating)?;
        self.replace_body(DocumentCollection::Review, review_id, review_body(&content))
            .await
    }

    /// Delete a review and return it.
    ///
    /// # Errors
    ///
    /// Returns `ConsistencyError::NotFound` if the review does not exist.
    #[instrument(skip(self), fields(review_id = %review_id))]
    pub async fn delete_review(&self, review_id: DocumentId) -> Result<Document> {
        self.remove(DocumentCollection::Review, review_id).await
    }

    /// Store a purchase probability for a customer and listing.
    ///
    /// # Errors
    ///
    /// Returns `ConsistencyError::InvalidField` unless the probability lies in
    /// `0.0..=1.0`.
    /// Returns `ConsistencyError::NotFound` if the customer or the listing is
    /// missing.
    #[instrument(skip(self), fields(customer_id = %customer_id, listing_id = %listing_id))]
    pub async fn create_recommendation(
        &self,
        customer_id: CustomerId,
        listing_id: ListingId,
        purchase_probability: f64,
    ) -> Result<Document> {
        check_probability(purchase_probability)?;
        self.require_references(Some(customer_id), listing_id).await?;
        self.insert(
            DocumentCollection::ProductRecommendation,
            Some(customer_id),
            listing_id,
            json!({ "purchaseProbability": purchase_probability }),
        )
        .await
    }

    /// Replace the purchase probability of a recommendation.
    ///
    /// # Errors
    ///
    /// Returns `ConsistencyError::InvalidField` unless the probability lies in
    /// `0.0..=1.0`.
    /// Returns `ConsistencyError::NotFound` if the recommendation does not
    /// exist.
    #[instrument(skip(self), fields(recommendation_id = %recommendation_id))]
    pub async fn update_recommendation(
        &self,
        recommendation_id: DocumentId,
        purchase_probability: f64,
    ) -> Result<Document> {
        check_probability(purchase_probability)?;
        self.replace_body(
            DocumentCollection::ProductRecommendation,
            recommendation_id,
            json!({ "purchaseProbability": purchase_probability }),
        )
        .await
    }

    /// Record something a customer did with a listing.
    ///
    /// # Errors
    ///
    /// Returns `ConsistencyError::NotFound` if the customer or the listing is
    /// missing.
    #[instrument(skip(self), fields(customer_id = %customer_id, listing_id = %listing_id, %action))]
    pub async fn record_action(
        &self,
        customer_id: CustomerId,
        listing_id: ListingId,
        action: ActionType,
    ) -> Result<Document> {
        self.require_references(Some(customer_id), listing_id).await?;
        self.log_action(customer_id, listing_id, action).await
    }

    /// Insert an action document without checking references. Checkout
    /// already holds both.
    pub(crate) async fn log_action(
        &self,
        customer_id: CustomerId,
        listing_id: ListingId,
        action: ActionType,
    ) -> Result<Document> {
        let stores = self.engine.stores();
        let document = Document {
            id: DocumentId::new(
                stores
                    .ids
                    .next_id(IdSequence::Document(DocumentCollection::CustomerAction))
                    .await?,
            ),
            collection: DocumentCollection::CustomerAction,
            customer_id: Some(customer_id),
            listing_id: Some(listing_id),
            body: json!({ "actionType": action }),
            created_at: Utc::now(),
        };
        follow_up(stores.documents.insert(&document).await, "customer action")?;
        Ok(document)
    }

    // =========================================================================
    // Listing media
    // =========================================================================

    /// Record image metadata for a listing.
    ///
    /// # Errors
    ///
    /// Returns `ConsistencyError::NotFound` if the listing is missing.
    #[instrument(skip(self, media), fields(listing_id = %listing_id, file_name = %media.file_name))]
    pub async fn attach_image(&self, listing_id: ListingId, media: MediaMetadata) -> Result<Document> {
        self.attach_media(DocumentCollection::ProductImage, listing_id, &media)
            .await
    }

    /// Record video metadata for a listing.
    ///
    /// # Errors
    ///
    /// Returns `ConsistencyError::NotFound` if the listing is missing.
    #[instrument(skip(self, media), fields(listing_id = %listing_id, file_name = %media.file_name))]
    pub async fn attach_video(&self, listing_id: ListingId, media: MediaMetadata) -> Result<Document> {
        self.attach_media(DocumentCollection::ProductVideo, listing_id, &media)
            .await
    }

    /// Replace the metadata of an image.
    ///
    /// # Errors
    ///
    /// Returns `ConsistencyError::NotFound` if the image does not exist.
    #[instrument(skip(self, media), fields(image_id = %image_id, file_name = %media.file_name))]
    pub async fn update_image(&self, image_id: DocumentId, media: MediaMetadata) -> Result<Document> {
        self.replace_body(DocumentCollection::ProductImage, image_id, media_body(&media))
            .await
    }

    /// Replace the metadata of a video.
    ///
    /// # Errors
    ///
    /// Returns `ConsistencyError::NotFound` if the video does not exist.
    #[instrument(skip(self, media), fields(video_id = %video_id, file_name = %media.file_name))]
    pub async fn update_video(&self, video_id: DocumentId, media: MediaMetadata) -> Result<Document> {
        self.replace_body(DocumentCollection::ProductVideo, video_id, media_body(&media))
            .await
    }

    /// Delete an image and return it.
    ///
    /// # Errors
    ///
    /// Returns `ConsistencyError::NotFound` if the image does not exist.
    #[instrument(skip(self), fields(image_id = %image_id))]
    pub async fn remove_image(&self, image_id: DocumentId) -> Result<Document> {
        self.remove(DocumentCollection::ProductImage, image_id).await
    }

    /// Delete a video and return it.
    ///
    /// # Errors
    ///
    /// Returns `ConsistencyError::NotFound` if the video does not exist.
    #[instrument(skip(self), fields(video_id = %video_id))]
    pub async fn remove_video(&self, video_id: DocumentId) -> Result<Document> {
        self.remove(DocumentCollection::ProductVideo, video_id).await
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Reviews of a listing.
    ///
    /// # Errors
    ///
    /// Returns `ConsistencyError::Store` if the document store fails.
    pub async fn reviews_for_listing(&self, listing_id: ListingId) -> Result<Vec<Document>> {
        self.listing_documents(DocumentCollection::Review, listing_id)
            .await
    }

    /// Documents in one collection that point at a listing.
    ///
    /// # Errors
    ///
    /// Returns `ConsistencyError::Store` if the document store fails.
    pub async fn listing_documents(
        &self,
        collection: DocumentCollection,
        listing_id: ListingId,
    ) -> Result<Vec<Document>> {
        Ok(self
            .engine
            .stores()
            .documents
            .find(collection, DocumentFilter::Listing(listing_id))
            .await?)
    }

    /// Documents in one collection that point at a customer.
    ///
    /// # Errors
    ///
    /// Returns `ConsistencyError::Store` if the document store fails.
    pub async fn customer_documents(
        &self,
        collection: DocumentCollection,
        customer_id: CustomerId,
    ) -> Result<Vec<Document>> {
        Ok(self
            .engine
            .stores()
            .documents
            .find(collection, DocumentFilter::Customer(customer_id))
            .await?)
    }

    // =========================================================================
    // Internals
    // =========================================================================

    async fn attach_media(
        &self,
        collection: DocumentCollection,
        listing_id: ListingId,
        media: &MediaMetadata,
    ) -> Result<Document> {
        self.require_references(None, listing_id).await?;
        self.insert(collection, None, listing_id, media_body(media))
            .await
    }

    async fn replace_body(
        &self,
        collection: DocumentCollection,
        id: DocumentId,
        body: serde_json::Value,
    ) -> Result<Document> {
        let updated = self
            .engine
            .stores()
            .documents
            .find_one_and_update(collection, DocumentFilter::Id(id), body)
            .await?
            .ok_or_else(|| ConsistencyError::not_found(Entity::Document, id))?;
        info!(document_id = %id, %collection, "Updated document");
        Ok(updated)
    }

    async fn remove(&self, collection: DocumentCollection, id: DocumentId) -> Result<Document> {
        let deleted = self
            .engine
            .stores()
            .documents
            .find_one_and_delete(collection, DocumentFilter::Id(id))
            .await?
            .ok_or_else(|| ConsistencyError::not_found(Entity::Document, id))?;
        info!(document_id = %id, %collection, "Deleted document");
        Ok(deleted)
    }

    async fn require_references(
        &self,
        customer_id: Option<CustomerId>,
        listing_id: ListingId,
    ) -> Result<()> {
        if let Some(customer_id) = customer_id {
            self.engine.accounts().customer(customer_id).await?;
        }
        if self
            .engine
            .stores()
            .relational
            .listing(listing_id)
            .await?
            .is_none()
        {
            return Err(ConsistencyError::not_found(Entity::Listing, listing_id));
        }
        Ok(())
    }

    async fn insert(
        &self,
        collection: DocumentCollection,
        customer_id: Option<CustomerId>,
        listing_id: ListingId,
        body: serde_json::Value,
    ) -> Result<Document> {
        let stores = self.engine.stores();
        let document = Document {
            id: DocumentId::new(stores.ids.next_id(IdSequence::Document(collection)).await?),
            collection,
            customer_id,
            listing_id: Some(listing_id),
            body,
            created_at: Utc::now(),
        };
        stores.documents.insert(&document).await?;
        info!(document_id = %document.id, %collection, "Stored document");
        Ok(document)
    }
}

fn review_body(content: &ReviewContent) -> serde_json::Value {
    json!({
        "reviewText": content.review_text,
        "rating": content.rating,
    })
}

fn media_body(media: &MediaMetadata) -> serde_json::Value {
    json!({
        "fileName": media.file_name,
        "contentType": media.content_type,
        "sizeBytes": media.size_bytes,
    })
}

fn check_probability(probability: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&probability) {
        return Err(ConsistencyError::InvalidField {
            field: "purchase probability",
            reason: "must be between 0 and 1",
        });
    }
    Ok(())
}

fn check_rating(rating: i32) -> Result<()> {
    if !(1..=5).contains(&rating) {
        return Err(ConsistencyError::InvalidAmount {
            amount: rating,
            reason: "rating must be between 1 and 5",
        });
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tristore_core::PriceEuro;

    use super::*;
    use crate::error::ErrorKind;
    use crate::models::{NewCustomer, NewVendor, ProductInformation};

    async fn setup() -> (Engine, CustomerId, ListingId) {
        let engine = Engine::in_memory();
        let customer = engine
            .accounts()
            .create_customer(NewCustomer {
                first_name: "Grace".into(),
                last_name: "Hopper".into(),
                user_name: "grace".into(),
                email: "grace@example.test".into(),
            })
            .await
            .unwrap();
        let vendor = engine
            .accounts()
            .create_vendor(NewVendor {
                name: "Acme".into(),
                user_name: "acme".into(),
                email: "sales@acme.test".into(),
                phone_number: None,
            })
            .await
            .unwrap();
        let listing = engine
            .catalog()
            .create_vendor_product(
                vendor.id,
                ProductInformation {
                    listing_id: None,
                    name: "Widget".into(),
                    description: "A widget".into(),
                    unit_price: PriceEuro::from_cents(500).unwrap(),
                    inventory_level: 3,
                    categories: Vec::new(),
                },
            )
            .await
            .unwrap();
        (engine, customer.id, listing)
    }

    fn content(rating: i32) -> ReviewContent {
        ReviewContent {
            review_text: "Does what it says".into(),
            rating,
        }
    }

    #[tokio::test]
    async fn test_review_lifecycle() {
        let (engine, customer, listing) = setup().await;
        let documents = engine.documents();

        let review = documents
            .create_review(customer, listing, content(4))
            .await
            .unwrap();
        assert_eq!(review.body["rating"], 4);

        let updated = documents.update_review(review.id, content(2)).await.unwrap();
        assert_eq!(updated.body["rating"], 2);
        assert_eq!(documents.reviews_for_listing(listing).await.unwrap().len(), 1);

        documents.delete_review(review.id).await.unwrap();
        let err = documents.delete_review(review.id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_invalid_inputs_are_rejected() {
        let (engine, customer, listing) = setup().await;
        let documents = engine.documents();

        let rating = documents
            .create_review(customer, listing, content(6))
            .await
            .unwrap_err();
        assert_eq!(rating.kind(), ErrorKind::InvalidInput);

        let probability = documents
            .create_recommendation(customer, listing, 1.5)
            .await
            .unwrap_err();
        assert_eq!(probability.kind(), ErrorKind::InvalidInput);

        let missing = documents
            .record_action(customer, ListingId::new(999), ActionType::View)
            .await
            .unwrap_err();
        assert_eq!(missing.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_documents_block_customer_and_listing_removal() {
        let (engine, customer, listing) = setup().await;
        let documents = engine.documents();
        documents
            .record_action(customer, listing, ActionType::View)
            .await
            .unwrap();
        documents
            .attach_image(
                listing,
                MediaMetadata {
                    file_name: "widget.png".into(),
                    content_type: "image/png".into(),
                    size_bytes: 2048,
                },
            )
            .await
            .unwrap();

        let customer_err = engine.cascade().delete_customer(customer).await.unwrap_err();
        assert_eq!(customer_err.kind(), ErrorKind::ReferencedEntity);

        let listing_err = engine
            .catalog()
            .remove_vendor_to_product_entry(listing)
            .await
            .unwrap_err();
        assert_eq!(listing_err.kind(), ErrorKind::ReferencedEntity);

        let actions = documents
            .customer_documents(DocumentCollection::CustomerAction, customer)
            .await
            .unwrap();
        assert_eq!(actions[0].body["actionType"], "view");
    }

    fn clip(file_name: &str, size_bytes: u64) -> MediaMetadata {
        MediaMetadata {
            file_name: file_name.into(),
            content_type: "video/mp4".into(),
            size_bytes,
        }
    }

    #[tokio::test]
    async fn test_update_recommendation() {
        let (engine, customer, listing) = setup().await;
        let documents = engine.documents();
        let recommendation = documents
            .create_recommendation(customer, listing, 0.25)
            .await
            .unwrap();

        let updated = documents
            .update_recommendation(recommendation.id, 0.75)
            .await
            .unwrap();
        assert_eq!(updated.body["purchaseProbability"], 0.75);
        assert_eq!(updated.customer_id, Some(customer));
        assert_eq!(updated.listing_id, Some(listing));

        let invalid = documents
            .update_recommendation(recommendation.id, -0.1)
            .await
            .unwrap_err();
        assert_eq!(invalid.kind(), ErrorKind::InvalidInput);

        let missing = documents
            .update_recommendation(DocumentId::new(99), 0.5)
            .await
            .unwrap_err();
        assert_eq!(missing.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_media_update_and_removal() {
        let (engine, _, listing) = setup().await;
        let documents = engine.documents();
        let video = documents
            .attach_video(listing, clip("demo.mp4", 1024))
            .await
            .unwrap();
        let image = documents
            .attach_image(
                listing,
                MediaMetadata {
                    file_name: "widget.png".into(),
                    content_type: "image/png".into(),
                    size_bytes: 512,
                },
            )
            .await
            .unwrap();

        let updated = documents
            .update_video(video.id, clip("demo-v2.mp4", 4096))
            .await
            .unwrap();
        assert_eq!(updated.body["fileName"], "demo-v2.mp4");
        assert_eq!(updated.body["sizeBytes"], 4096);

        let wrong = documents
            .update_image(DocumentId::new(7), clip("x.png", 1))
            .await
            .unwrap_err();
        assert_eq!(wrong.kind(), ErrorKind::NotFound);

        assert_eq!(documents.remove_video(video.id).await.unwrap().id, video.id);
        documents.remove_image(image.id).await.unwrap();
        assert!(
            documents
                .listing_documents(DocumentCollection::ProductVideo, listing)
                .await
                .unwrap()
                .is_empty()
        );
        let again = documents.remove_image(image.id).await.unwrap_err();
        assert_eq!(again.kind(), ErrorKind::NotFound);

        // With its media gone the listing entry can be removed.
        engine
            .catalog()
            .remove_vendor_to_product_entry(listing)
            .await
            .unwrap();
    }
}
