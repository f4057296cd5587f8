mod document;
mod emergency;
mod user;

pub use document::{DocumentType, MedicalDocument};
pub use emergency::{
    DriverAction, Emergency, EmergencyStatus, PatientLocation, TransitPhase,
};
pub use user::{BedCounts, Role, RoleProfile, User};
