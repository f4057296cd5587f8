mod documents;
mod driver;
mod emergency;
mod hospital;
mod users;

pub use documents::{
    list_documents, upload_document, view_document, DocumentEntry, UploadDocumentRequest,
};
pub use driver::{
    driver_action, driver_assignment, driver_location, DriverActionRequest, DriverLocationRequest,
};
pub use emergency::{
    get_tracking, trigger_emergency, update_patient_location, TriggerRequest, TriggerResponse,
};
pub use hospital::{accept_case, hospital_feed, update_beds, FeedQuery};
pub use users::{create_user, get_user, CreateUserRequest};

use axum::http::StatusCode;

/// Health check endpoint
pub async fn health_check() -> StatusCode {
    StatusCode::OK
}
