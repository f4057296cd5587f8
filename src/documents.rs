use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::sync::Arc;
use uuid::Uuid;

use crate::blob::BlobStore;
use crate::emergency::is_participant;
use crate::error::ApiError;
use crate::models::{DocumentType, MedicalDocument, Role};
use crate::store::Store;

type HmacSha256 = Hmac<Sha256>;

/// View tokens grant a short window to start a view; they are deliberately
/// much shorter-lived than the document itself.
pub const VIEW_TOKEN_TTL_MINUTES: i64 = 5;

/// Capability claims bound into a view token: one document, one identity,
/// one expiry. Access is decided from these claims, not re-derived from
/// the live request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewClaims {
    pub document_id: Uuid,
    pub user_id: Uuid,
    pub role: Role,
    /// Unix seconds.
    pub exp: i64,
}

/// Signs and verifies `{payload}.{signature}` capability tokens with
/// HMAC-SHA-256 over the base64url payload.
#[derive(Clone)]
pub struct TokenSigner {
    key: Arc<Vec<u8>>,
}

impl TokenSigner {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self {
            key: Arc::new(secret.as_ref().to_vec()),
        }
    }

    pub fn issue(&self, document_id: Uuid, user_id: Uuid, role: Role) -> String {
        let claims = ViewClaims {
            document_id,
            user_id,
            role,
            exp: (Utc::now() + Duration::minutes(VIEW_TOKEN_TTL_MINUTES)).timestamp(),
        };
        self.sign(&claims)
    }

    pub fn sign(&self, claims: &ViewClaims) -> String {
        let payload =
            URL_SAFE_NO_PAD.encode(serde_json::to_vec(claims).expect("claims serialize"));
        let mut mac =
            HmacSha256::new_from_slice(&self.key).expect("hmac accepts any key length");
        mac.update(payload.as_bytes());
        let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());
        format!("{payload}.{signature}")
    }

    /// Verifies signature (constant-time) and expiry, in that order.
    pub fn verify(&self, token: &str) -> Result<ViewClaims, ApiError> {
        let (payload, signature) = token
            .split_once('.')
            .ok_or_else(|| ApiError::unauthorized("malformed view token"))?;
        let signature = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| ApiError::unauthorized("malformed view token"))?;

        let mut mac =
            HmacSha256::new_from_slice(&self.key).expect("hmac accepts any key length");
        mac.update(payload.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| ApiError::unauthorized("invalid view token signature"))?;

        let payload = URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|_| ApiError::unauthorized("malformed view token"))?;
        let claims: ViewClaims = serde_json::from_slice(&payload)
            .map_err(|_| ApiError::unauthorized("malformed view token"))?;
        if claims.exp <= Utc::now().timestamp() {
            return Err(ApiError::unauthorized("view token expired"));
        }
        Ok(claims)
    }
}

/// Stores the bytes and attaches the metadata record. Only the owning
/// patient may upload to an emergency.
pub async fn upload(
    store: &Store,
    blobs: &dyn BlobStore,
    patient_id: Uuid,
    emergency_id: Uuid,
    file_name: &str,
    content_type: &str,
    document_type: DocumentType,
    bytes: Vec<u8>,
) -> Result<MedicalDocument, ApiError> {
    if bytes.is_empty() {
        return Err(ApiError::validation("empty document"));
    }
    let emergency = store
        .emergency(emergency_id)
        .await?
        .ok_or_else(|| ApiError::not_found("emergency not found"))?;
    if emergency.patient_id != patient_id {
        return Err(ApiError::forbidden("not your emergency"));
    }

    let mut document =
        MedicalDocument::new(emergency_id, "", file_name, content_type, document_type);
    document.blob_key = format!("{emergency_id}/{}", document.id);
    blobs.put(&document.blob_key, bytes, content_type)?;
    store.create_document(&document).await?;
    Ok(document)
}

/// Generated companion document summarizing the reported symptoms, so the
/// receiving hospital has a readable intake sheet. Best-effort at trigger
/// time; the caller logs and continues on failure.
pub async fn attach_symptom_report(
    store: &Store,
    blobs: &dyn BlobStore,
    emergency: &crate::models::Emergency,
) -> Result<MedicalDocument, ApiError> {
    let symptoms = emergency.symptoms.as_deref().unwrap_or("none reported");
    let body = format!(
        "Emergency intake report\n\nTriggered: {}\nSeverity score: {}\nReported symptoms: {}\nAdvisory: {}\n",
        emergency.triggered_at.to_rfc3339(),
        emergency.severity_score,
        symptoms,
        emergency.ai_assessment.as_deref().unwrap_or("-"),
    );
    let mut document = MedicalDocument::new(
        emergency.id,
        "",
        "symptom-report.txt",
        "text/plain",
        DocumentType::Report,
    );
    document.blob_key = format!("{}/{}", emergency.id, document.id);
    blobs.put(&document.blob_key, body.into_bytes(), "text/plain")?;
    store.create_document(&document).await?;
    Ok(document)
}

/// Token-gated retrieval. A document past its expiry is deleted on the
/// spot and reported expired — never served, even on a valid token.
pub async fn view(
    store: &Store,
    blobs: &dyn BlobStore,
    signer: &TokenSigner,
    token: &str,
) -> Result<(Vec<u8>, String), ApiError> {
    let claims = signer.verify(token)?;
    let document = store
        .document(claims.document_id)
        .await?
        .ok_or_else(|| ApiError::not_found("document not found"))?;

    if document.is_expired(Utc::now()) {
        remove(store, blobs, &document).await;
        return Err(ApiError::expired("document has expired"));
    }

    let emergency = store
        .emergency(document.emergency_id)
        .await?
        .ok_or_else(|| ApiError::not_found("emergency not found"))?;
    if !is_participant(&emergency, claims.user_id, claims.role) {
        return Err(ApiError::forbidden("not a participant in this emergency"));
    }

    match blobs.fetch(&document.blob_key)? {
        Some((bytes, content_type)) => Ok((bytes, content_type)),
        None => Err(ApiError::not_found("document content no longer available")),
    }
}

/// Unexpired documents for an emergency, visible to participants only.
pub async fn list(
    store: &Store,
    user_id: Uuid,
    role: Role,
    emergency_id: Uuid,
) -> Result<Vec<MedicalDocument>, ApiError> {
    let emergency = store
        .emergency(emergency_id)
        .await?
        .ok_or_else(|| ApiError::not_found("emergency not found"))?;
    if !is_participant(&emergency, user_id, role) {
        return Err(ApiError::forbidden("not a participant in this emergency"));
    }
    let now = Utc::now();
    Ok(store
        .emergency_documents(emergency_id)
        .await?
        .into_iter()
        .filter(|d| !d.is_expired(now))
        .collect())
}

async fn remove(store: &Store, blobs: &dyn BlobStore, document: &MedicalDocument) {
    if let Err(err) = blobs.delete(&document.blob_key) {
        tracing::warn!(document = %document.id, "failed to delete blob: {err:#}");
    }
    if let Err(err) = store.delete_document(document.id).await {
        tracing::warn!(document = %document.id, "failed to delete document record: {err:#}");
    }
}

/// Deletes every expired document. Idempotent, safe to run concurrently
/// with lazy deletion on the access path. Returns how many were removed.
pub async fn sweep_expired(store: &Store, blobs: &dyn BlobStore) -> Result<usize, ApiError> {
    let expired = store.expired_documents(Utc::now()).await?;
    let count = expired.len();
    for document in &expired {
        remove(store, blobs, document).await;
    }
    if count > 0 {
        tracing::info!(count, "swept expired documents");
    }
    Ok(count)
}
