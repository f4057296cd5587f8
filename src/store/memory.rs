use anyhow::Result;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::{Emergency, MedicalDocument, Role, User};

/// In-memory backend. Drives the test suite and local development; also
/// the reference semantics the Postgres queries must match.
#[derive(Default)]
pub struct MemStore {
    users: RwLock<HashMap<Uuid, User>>,
    emergencies: RwLock<HashMap<Uuid, Emergency>>,
    documents: RwLock<HashMap<Uuid, MedicalDocument>>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn create_user(&self, user: &User) -> Result<()> {
        self.users.write().await.insert(user.id, user.clone());
        Ok(())
    }

    pub async fn user(&self, id: Uuid) -> Result<Option<User>> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    pub async fn update_user(&self, user: &User) -> Result<()> {
        self.users.write().await.insert(user.id, user.clone());
        Ok(())
    }

    pub async fn active_hospitals(&self) -> Result<Vec<User>> {
        let users = self.users.read().await;
        let mut hospitals: Vec<User> = users
            .values()
            .filter(|u| u.active && u.role() == Role::Hospital)
            .cloned()
            .collect();
        hospitals.sort_by_key(|u| u.registered_at);
        Ok(hospitals)
    }

    pub async fn active_drivers_with_license(&self, license: &str) -> Result<Vec<User>> {
        let users = self.users.read().await;
        let mut drivers: Vec<User> = users
            .values()
            .filter(|u| {
                u.active && u.role() == Role::Driver && u.license_number() == Some(license)
            })
            .cloned()
            .collect();
        drivers.sort_by_key(|u| u.registered_at);
        Ok(drivers)
    }

    pub async fn create_emergency(&self, emergency: &Emergency) -> Result<()> {
        self.emergencies
            .write()
            .await
            .insert(emergency.id, emergency.clone());
        Ok(())
    }

    pub async fn emergency(&self, id: Uuid) -> Result<Option<Emergency>> {
        Ok(self.emergencies.read().await.get(&id).cloned())
    }

    pub async fn update_emergency(&self, emergency: &Emergency) -> Result<()> {
        self.emergencies
            .write()
            .await
            .insert(emergency.id, emergency.clone());
        Ok(())
    }

    pub async fn hospital_emergencies(&self, hospital_id: Uuid, max: u32) -> Result<Vec<Emergency>> {
        let emergencies = self.emergencies.read().await;
        let mut list: Vec<Emergency> = emergencies
            .values()
            .filter(|e| e.assigned_hospital_id == Some(hospital_id))
            .cloned()
            .collect();
        list.sort_by(|a, b| b.triggered_at.cmp(&a.triggered_at));
        list.truncate(max as usize);
        Ok(list)
    }

    pub async fn driver_active_emergency(&self, driver_id: Uuid) -> Result<Option<Emergency>> {
        let emergencies = self.emergencies.read().await;
        Ok(emergencies
            .values()
            .filter(|e| e.assigned_driver_id == Some(driver_id) && !e.status.is_terminal())
            .max_by_key(|e| e.triggered_at)
            .cloned())
    }

    pub async fn create_document(&self, document: &MedicalDocument) -> Result<()> {
        self.documents
            .write()
            .await
            .insert(document.id, document.clone());
        Ok(())
    }

    pub async fn document(&self, id: Uuid) -> Result<Option<MedicalDocument>> {
        Ok(self.documents.read().await.get(&id).cloned())
    }

    pub async fn delete_document(&self, id: Uuid) -> Result<()> {
        self.documents.write().await.remove(&id);
        Ok(())
    }

    pub async fn emergency_documents(&self, emergency_id: Uuid) -> Result<Vec<MedicalDocument>> {
        let documents = self.documents.read().await;
        let mut list: Vec<MedicalDocument> = documents
            .values()
            .filter(|d| d.emergency_id == emergency_id)
            .cloned()
            .collect();
        list.sort_by_key(|d| d.created_at);
        Ok(list)
    }

    pub async fn expired_documents(&self, now: DateTime<Utc>) -> Result<Vec<MedicalDocument>> {
        let documents = self.documents.read().await;
        Ok(documents
            .values()
            .filter(|d| d.is_expired(now))
            .cloned()
            .collect())
    }
}
