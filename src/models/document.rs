use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How long an uploaded document stays retrievable.
pub const DOCUMENT_TTL_MINUTES: i64 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    Report,
    Prescription,
    Scan,
    Other,
}

/// Metadata for an uploaded medical document. The bytes live in the blob
/// store under `blob_key`. Records are created once and deleted on expiry,
/// never updated in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MedicalDocument {
    pub id: Uuid,
    pub emergency_id: Uuid,
    pub blob_key: String,
    pub file_name: String,
    pub content_type: String,
    #[serde(rename = "type")]
    pub document_type: DocumentType,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl MedicalDocument {
    pub fn new(
        emergency_id: Uuid,
        blob_key: impl Into<String>,
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        document_type: DocumentType,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            emergency_id,
            blob_key: blob_key.into(),
            file_name: file_name.into(),
            content_type: content_type.into(),
            document_type,
            created_at: now,
            expires_at: now + Duration::minutes(DOCUMENT_TTL_MINUTES),
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_document_expires_in_an_hour() {
        let doc = MedicalDocument::new(
            Uuid::new_v4(),
            "k",
            "scan.png",
            "image/png",
            DocumentType::Scan,
        );
        let ttl = doc.expires_at - doc.created_at;
        assert_eq!(ttl.num_minutes(), DOCUMENT_TTL_MINUTES);
        assert!(!doc.is_expired(doc.created_at));
        assert!(doc.is_expired(doc.expires_at));
    }

    #[test]
    fn test_document_type_wire_name() {
        let doc = MedicalDocument::new(
            Uuid::new_v4(),
            "k",
            "rx.txt",
            "text/plain",
            DocumentType::Prescription,
        );
        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(json["type"], "prescription");
        assert!(json["expiresAt"].is_string());
    }
}
