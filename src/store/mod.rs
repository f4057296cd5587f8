mod memory;
mod postgres;

pub use memory::MemStore;
pub use postgres::PgStore;

use anyhow::Result;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{Emergency, MedicalDocument, User};

/// Storage backend. Postgres in production, memory in tests and local
/// development. All access is simple key/range queries; the store never
/// interprets domain rules.
pub enum Store {
    Memory(MemStore),
    Postgres(PgStore),
}

macro_rules! delegate {
    ($self:ident, $inner:ident => $body:expr) => {
        match $self {
            Store::Memory($inner) => $body,
            Store::Postgres($inner) => $body,
        }
    };
}

impl Store {
    pub fn memory() -> Self {
        Store::Memory(MemStore::new())
    }

    pub fn postgres(pool: sqlx::PgPool) -> Self {
        Store::Postgres(PgStore::new(pool))
    }

    pub async fn create_user(&self, user: &User) -> Result<()> {
        delegate!(self, s => s.create_user(user).await)
    }

    pub async fn user(&self, id: Uuid) -> Result<Option<User>> {
        delegate!(self, s => s.user(id).await)
    }

    pub async fn update_user(&self, user: &User) -> Result<()> {
        delegate!(self, s => s.update_user(user).await)
    }

    /// Active hospitals in registration order, earliest first.
    pub async fn active_hospitals(&self) -> Result<Vec<User>> {
        delegate!(self, s => s.active_hospitals().await)
    }

    pub async fn active_drivers_with_license(&self, license: &str) -> Result<Vec<User>> {
        delegate!(self, s => s.active_drivers_with_license(license).await)
    }

    pub async fn create_emergency(&self, emergency: &Emergency) -> Result<()> {
        delegate!(self, s => s.create_emergency(emergency).await)
    }

    pub async fn emergency(&self, id: Uuid) -> Result<Option<Emergency>> {
        delegate!(self, s => s.emergency(id).await)
    }

    pub async fn update_emergency(&self, emergency: &Emergency) -> Result<()> {
        delegate!(self, s => s.update_emergency(emergency).await)
    }

    /// The hospital's emergencies, most recently triggered first, bounded
    /// by `max`. Visibility-window filtering happens in the domain layer.
    pub async fn hospital_emergencies(&self, hospital_id: Uuid, max: u32) -> Result<Vec<Emergency>> {
        delegate!(self, s => s.hospital_emergencies(hospital_id, max).await)
    }

    /// The driver's most recent non-completed assignment, if any.
    pub async fn driver_active_emergency(&self, driver_id: Uuid) -> Result<Option<Emergency>> {
        delegate!(self, s => s.driver_active_emergency(driver_id).await)
    }

    pub async fn create_document(&self, document: &MedicalDocument) -> Result<()> {
        delegate!(self, s => s.create_document(document).await)
    }

    pub async fn document(&self, id: Uuid) -> Result<Option<MedicalDocument>> {
        delegate!(self, s => s.document(id).await)
    }

    pub async fn delete_document(&self, id: Uuid) -> Result<()> {
        delegate!(self, s => s.delete_document(id).await)
    }

    /// All documents attached to an emergency, expired or not. Callers
    /// apply the expiry filter they need.
    pub async fn emergency_documents(&self, emergency_id: Uuid) -> Result<Vec<MedicalDocument>> {
        delegate!(self, s => s.emergency_documents(emergency_id).await)
    }

    pub async fn expired_documents(&self, now: DateTime<Utc>) -> Result<Vec<MedicalDocument>> {
        delegate!(self, s => s.expired_documents(now).await)
    }
}
