use axum::{extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

use crate::error::ApiError;
use crate::models::Role;

/// Pre-verified requester identity. Authentication itself is the external
/// identity provider's job; it fronts this service and forwards the
/// verified pair as trusted headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity {
    pub id: Uuid,
    pub role: Role,
}

impl Identity {
    pub fn new(id: Uuid, role: Role) -> Self {
        Self { id, role }
    }

    pub fn require_role(&self, role: Role) -> Result<(), ApiError> {
        if self.role == role {
            Ok(())
        } else {
            Err(ApiError::forbidden(format!(
                "this operation requires the {role} role"
            )))
        }
    }
}

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";

#[axum::async_trait]
impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .ok_or_else(|| ApiError::unauthorized(format!("missing {name} header")))
        };

        let id: Uuid = header(USER_ID_HEADER)?
            .parse()
            .map_err(|_| ApiError::unauthorized("malformed user id"))?;
        let role: Role = header(USER_ROLE_HEADER)?
            .parse()
            .map_err(|_| ApiError::unauthorized("unknown role"))?;

        Ok(Identity { id, role })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn extract(id: &str, role: &str) -> Result<Identity, ApiError> {
        let request = Request::builder()
            .header(USER_ID_HEADER, id)
            .header(USER_ROLE_HEADER, role)
            .body(())
            .unwrap();
        let (mut parts, _) = request.into_parts();
        Identity::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn test_extracts_verified_pair() {
        let id = Uuid::new_v4();
        let identity = extract(&id.to_string(), "driver").await.unwrap();
        assert_eq!(identity.id, id);
        assert_eq!(identity.role, Role::Driver);
    }

    #[tokio::test]
    async fn test_rejects_unknown_role() {
        let err = extract(&Uuid::new_v4().to_string(), "root").await.unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn test_rejects_missing_headers() {
        let request = Request::builder().body(()).unwrap();
        let (mut parts, _) = request.into_parts();
        let err = Identity::from_request_parts(&mut parts, &()).await.unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized(_)));
    }

    #[test]
    fn test_role_gate() {
        let identity = Identity::new(Uuid::new_v4(), Role::Patient);
        assert!(identity.require_role(Role::Patient).is_ok());
        assert!(identity.require_role(Role::Hospital).is_err());
    }
}
