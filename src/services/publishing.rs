use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use ring::digest;
use rust_decimal::Decimal;
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{
    AuditEntry, AuditEvent, CreateTicketData, CreateUploadData, Event, Profile, Ticket,
    TicketUpload,
};
use crate::services::notifications::Notifier;
use crate::services::rut;

/// Trust-score penalty for publishing with a RUT that fails its checksum.
pub const INVALID_RUT_PENALTY: i32 = 15;

/// Trust-score penalty for re-publishing an already-known document.
pub const DUPLICATE_DOCUMENT_PENALTY: i32 = 25;

#[derive(thiserror::Error, Debug)]
pub enum PublishError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Seller not found")]
    SellerNotFound,

    #[error("Seller account is blocked")]
    SellerBlocked,

    #[error("Event not found")]
    EventNotFound,

    #[error("Price must be greater than zero")]
    InvalidPrice,

    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    #[error("RUT failed validation: {rut}")]
    InvalidRut { rut: String },

    #[error("Document already published as upload {existing_upload_id}")]
    DuplicateDocument { existing_upload_id: Uuid },
}

/// Request to publish a ticket for resale. The document bytes arrive after
/// the external validation step has already read the QR and stored the PDF.
pub struct PublishTicketRequest {
    pub seller_id: Uuid,
    pub event_id: Uuid,
    pub price: Decimal,
    pub original_price: Option<Decimal>,
    pub sector: Option<String>,
    pub row_label: Option<String>,
    pub seat: Option<String>,
    pub is_nominated: bool,
    pub holder_rut: Option<String>,
    pub document_base64: String,
    pub storage_path: String,
}

/// Publishes a ticket.
///
/// 1. Validates the seller and the event
/// 2. Runs the fraud gates (RUT checksum, duplicate document hash)
/// 3. Records the upload and the active listing in one transaction
/// 4. Notifies the seller (best effort)
///
/// The duplicate check is nothing but the unique index on the document
/// hash; a violation is reported as fraud suspicion with the first
/// upload's id so an admin can review both accounts.
#[tracing::instrument(skip(pool, notifier, request), fields(seller_id = %request.seller_id, event_id = %request.event_id))]
pub async fn publish_ticket(
    pool: &PgPool,
    notifier: &Notifier,
    request: PublishTicketRequest,
) -> Result<Ticket, PublishError> {
    // 1. Load and validate seller
    let seller = Profile::find_by_id(pool, request.seller_id)
        .await?
        .ok_or(PublishError::SellerNotFound)?;

    if seller.is_blocked {
        return Err(PublishError::SellerBlocked);
    }

    // 2. Event must exist
    let _event = Event::find_by_id(pool, request.event_id)
        .await?
        .ok_or(PublishError::EventNotFound)?;

    if request.price <= Decimal::ZERO {
        return Err(PublishError::InvalidPrice);
    }

    // 3. RUT gate. Nominated tickets need the holder's RUT; a checksum
    //    failure is treated as a fraud signal, not a typo.
    let holder_rut = request.holder_rut.clone().or_else(|| seller.rut.clone());
    if request.is_nominated && holder_rut.is_none() {
        return Err(PublishError::InvalidDocument(
            "A nominated ticket requires the holder's RUT".to_string(),
        ));
    }
    if let Some(rut_value) = holder_rut {
        if !rut::is_valid(&rut_value) {
            tracing::warn!(seller_id = %seller.id, "Publish rejected: RUT failed checksum");
            Profile::penalize_trust(pool, seller.id, INVALID_RUT_PENALTY).await?;
            AuditEvent::append(
                pool,
                AuditEntry::new("fraud_suspicion").user(seller.id).metadata(json!({
                    "reason": "invalid_rut",
                    "rut": rut_value,
                })),
            )
            .await?;
            return Err(PublishError::InvalidRut { rut: rut_value });
        }
    }

    // 4. Fingerprint the document
    let sha256 = document_fingerprint(&request.document_base64)?;

    // 5. Upload + listing, atomically
    let mut tx = pool.begin().await?;

    let upload = match TicketUpload::insert(
        &mut *tx,
        CreateUploadData {
            seller_id: seller.id,
            sha256: sha256.clone(),
            storage_path: request.storage_path.clone(),
            is_nominated: request.is_nominated,
        },
    )
    .await
    {
        Ok(upload) => upload,
        Err(sqlx::Error::Database(db)) if db.constraint() == Some("ticket_uploads_sha256_key") => {
            tx.rollback().await?;
            return Err(report_duplicate(pool, &seller, &sha256).await?);
        }
        Err(e) => return Err(e.into()),
    };

    let ticket = Ticket::create(
        &mut *tx,
        CreateTicketData {
            event_id: request.event_id,
            seller_id: seller.id,
            ticket_upload_id: upload.id,
            price: request.price,
            original_price: request.original_price,
            sector: request.sector,
            row_label: request.row_label,
            seat: request.seat,
            is_nominated: request.is_nominated,
        },
    )
    .await?;

    AuditEvent::append(
        &mut *tx,
        AuditEntry::new("ticket_published").user(seller.id).metadata(json!({
            "ticket_id": ticket.id,
            "upload_id": upload.id,
            "price": ticket.price,
        })),
    )
    .await?;

    tx.commit().await?;

    tracing::info!(ticket_id = %ticket.id, "Ticket published");

    // 6. Best-effort notification
    notifier.ticket_published(&seller, &ticket).await;

    Ok(ticket)
}

/// Decodes and sanity-checks the uploaded document, returning its SHA-256
/// fingerprint as lowercase hex. The fingerprint is what the duplicate
/// detection keys on, so it has to be stable across re-uploads of the same
/// bytes.
fn document_fingerprint(document_base64: &str) -> Result<String, PublishError> {
    let bytes = BASE64
        .decode(document_base64)
        .map_err(|_| PublishError::InvalidDocument("Document is not valid base64".to_string()))?;

    if bytes.is_empty() {
        return Err(PublishError::InvalidDocument("Document is empty".to_string()));
    }
    if !bytes.starts_with(b"%PDF") {
        return Err(PublishError::InvalidDocument(
            "Document does not look like a PDF".to_string(),
        ));
    }

    Ok(hex::encode(digest::digest(&digest::SHA256, &bytes).as_ref()))
}

/// Fraud path for a duplicate document hash: penalize, audit and surface
/// the first upload so both accounts can be reviewed together.
async fn report_duplicate(
    pool: &PgPool,
    seller: &Profile,
    sha256: &str,
) -> Result<PublishError, sqlx::Error> {
    let existing = TicketUpload::find_by_sha256(pool, sha256).await?;
    let existing_upload_id = existing.map(|u| u.id).unwrap_or_else(Uuid::nil);

    tracing::warn!(
        seller_id = %seller.id,
        existing_upload_id = %existing_upload_id,
        "Publish rejected: duplicate document hash"
    );

    Profile::penalize_trust(pool, seller.id, DUPLICATE_DOCUMENT_PENALTY).await?;
    AuditEvent::append(
        pool,
        AuditEntry::new("fraud_suspicion").user(seller.id).metadata(json!({
            "reason": "duplicate_document",
            "sha256": sha256,
            "existing_upload_id": existing_upload_id,
        })),
    )
    .await?;

    Ok(PublishError::DuplicateDocument { existing_upload_id })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_matches_known_vector() {
        let encoded = BASE64.encode(b"%PDF-1.4 ticket body");
        let sha256 = document_fingerprint(&encoded).unwrap();
        assert_eq!(
            sha256,
            "fc52b1a01085de9fab55055b4eff2fe3e06ec8fb54854d6e8889680eb806171c"
        );
    }

    #[test]
    fn test_identical_bytes_share_a_fingerprint() {
        let encoded = BASE64.encode(b"%PDF-1.4 ticket body");
        let first = document_fingerprint(&encoded).unwrap();
        let second = document_fingerprint(&encoded).unwrap();
        assert_eq!(first, second);

        let other = BASE64.encode(b"%PDF-1.4 another ticket");
        assert_ne!(first, document_fingerprint(&other).unwrap());
    }

    #[test]
    fn test_rejects_documents_that_are_not_pdfs() {
        let not_base64 = document_fingerprint("not base64 at all!");
        assert!(matches!(not_base64, Err(PublishError::InvalidDocument(_))));

        let empty = document_fingerprint(&BASE64.encode(b""));
        assert!(matches!(empty, Err(PublishError::InvalidDocument(_))));

        let wrong_magic = document_fingerprint(&BASE64.encode(b"GIF89a not a ticket"));
        assert!(matches!(wrong_magic, Err(PublishError::InvalidDocument(_))));
    }
}
