use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::documents;
use crate::error::ApiError;
use crate::identity::Identity;
use crate::models::{DocumentType, Role};
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadDocumentRequest {
    pub file_name: String,
    pub content_type: String,
    #[serde(rename = "type")]
    pub document_type: DocumentType,
    /// Standard base64 of the file bytes.
    pub data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentEntry {
    pub id: Uuid,
    pub file_name: String,
    pub content_type: String,
    #[serde(rename = "type")]
    pub document_type: DocumentType,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub expires_at: chrono::DateTime<chrono::Utc>,
    /// Short-lived capability for GET /api/documents/view, minted for the
    /// requester who listed the documents.
    pub view_token: String,
}

/// POST /api/emergencies/:id/documents
/// Patient attaches a medical document to their emergency.
pub async fn upload_document(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<Uuid>,
    Json(request): Json<UploadDocumentRequest>,
) -> Result<(StatusCode, Json<DocumentEntry>), ApiError> {
    identity.require_role(Role::Patient)?;
    let bytes = STANDARD
        .decode(&request.data)
        .map_err(|_| ApiError::validation("data is not valid base64"))?;
    let document = documents::upload(
        &state.store,
        state.blobs.as_ref(),
        identity.id,
        id,
        &request.file_name,
        &request.content_type,
        request.document_type,
        bytes,
    )
    .await?;

    let view_token = state.tokens.issue(document.id, identity.id, identity.role);
    Ok((
        StatusCode::CREATED,
        Json(DocumentEntry {
            id: document.id,
            file_name: document.file_name,
            content_type: document.content_type,
            document_type: document.document_type,
            created_at: document.created_at,
            expires_at: document.expires_at,
            view_token,
        }),
    ))
}

/// GET /api/emergencies/:id/documents
/// Unexpired documents for an emergency, each with a view token minted
/// for the requester.
pub async fn list_documents(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<DocumentEntry>>, ApiError> {
    let listed = documents::list(&state.store, identity.id, identity.role, id).await?;
    let entries = listed
        .into_iter()
        .map(|document| {
            let view_token = state.tokens.issue(document.id, identity.id, identity.role);
            DocumentEntry {
                id: document.id,
                file_name: document.file_name,
                content_type: document.content_type,
                document_type: document.document_type,
                created_at: document.created_at,
                expires_at: document.expires_at,
                view_token,
            }
        })
        .collect();
    Ok(Json(entries))
}

#[derive(Debug, Deserialize)]
pub struct ViewQuery {
    pub token: String,
}

/// GET /api/documents/view?token=...
/// Serves the document bytes for a valid, unexpired capability token.
/// Authorization comes entirely from the token; no identity headers are
/// required here.
pub async fn view_document(
    State(state): State<AppState>,
    Query(query): Query<ViewQuery>,
) -> Result<Response, ApiError> {
    let (bytes, content_type) = documents::view(
        &state.store,
        state.blobs.as_ref(),
        &state.tokens,
        &query.token,
    )
    .await?;
    Ok(([(header::CONTENT_TYPE, content_type)], bytes).into_response())
}
