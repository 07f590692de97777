//! Role context resolution.
//!
//! Turns the `X-Role` / `X-User-ID` request headers into an [`Actor`] once,
//! at the edge, so that downstream code receives a typed value instead of
//! looking things up in request state.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};

use crate::error::ApiError;
use crate::models::Role;

pub const ROLE_HEADER: &str = "x-role";
pub const USER_ID_HEADER: &str = "x-user-id";

/// The caller of a request: a role plus, for physicians and patients, the
/// identity they claim. The identity is kept as received; it is parsed by
/// whichever operation needs it as a number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    role: Role,
    identity: Option<String>,
}

impl Actor {
    /// Resolve an actor from raw header values.
    pub fn resolve(role: Option<&str>, identity: Option<&str>) -> Result<Self, ApiError> {
        let role = match role {
            None | Some("") => return Err(ApiError::missing_identity("missing X-Role header")),
            Some("physician") => Role::Physician,
            Some("patient") => Role::Patient,
            Some("admin") => Role::Admin,
            Some(_) => {
                return Err(ApiError::invalid_role(
                    "invalid role, must be one of: physician, patient, admin",
                ))
            }
        };

        let identity = identity.filter(|s| !s.is_empty()).map(str::to_string);
        if identity.is_none() && role.requires_identity() {
            return Err(ApiError::missing_identity("missing X-User-ID header"));
        }

        Ok(Self { role, identity })
    }

    pub fn admin() -> Self {
        Self {
            role: Role::Admin,
            identity: None,
        }
    }

    pub fn physician(id: impl Into<String>) -> Self {
        Self {
            role: Role::Physician,
            identity: Some(id.into()),
        }
    }

    pub fn patient(id: impl Into<String>) -> Self {
        Self {
            role: Role::Patient,
            identity: Some(id.into()),
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn identity(&self) -> Option<&str> {
        self.identity.as_deref()
    }

    /// The identity as a positive integer id.
    ///
    /// `what` names the id in the error message, e.g. "physician".
    pub fn numeric_identity(&self, what: &str) -> Result<i32, ApiError> {
        self.identity
            .as_deref()
            .and_then(|s| s.parse::<i32>().ok())
            .filter(|id| *id > 0)
            .ok_or_else(|| ApiError::invalid_argument(format!("invalid {} ID", what)))
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let actor = Actor::resolve(
            header_value(parts, ROLE_HEADER),
            header_value(parts, USER_ID_HEADER),
        );
        if let Err(e) = &actor {
            tracing::debug!(
                path = %parts.uri.path(),
                error = %e,
                "rejected request role context"
            );
        }
        actor
    }
}

fn header_value<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts.headers.get(name).and_then(|v| v.to_str().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolves_each_role() {
        let physician = Actor::resolve(Some("physician"), Some("7")).unwrap();
        assert_eq!(physician.role(), Role::Physician);
        assert_eq!(physician.identity(), Some("7"));

        let patient = Actor::resolve(Some("patient"), Some("3")).unwrap();
        assert_eq!(patient.role(), Role::Patient);

        let admin = Actor::resolve(Some("admin"), None).unwrap();
        assert_eq!(admin.role(), Role::Admin);
        assert_eq!(admin.identity(), None);
    }

    #[test]
    fn test_missing_role_header() {
        let err = Actor::resolve(None, Some("1")).unwrap_err();
        assert!(matches!(err, ApiError::MissingIdentity(_)));
    }

    #[test]
    fn test_role_is_case_sensitive() {
        for role in ["Physician", "ADMIN", "nurse", " admin"] {
            let err = Actor::resolve(Some(role), Some("1")).unwrap_err();
            assert!(matches!(err, ApiError::InvalidRole(_)), "role {:?}", role);
        }
    }

    #[test]
    fn test_identity_required_for_physician_and_patient() {
        for role in ["physician", "patient"] {
            let err = Actor::resolve(Some(role), None).unwrap_err();
            assert!(matches!(err, ApiError::MissingIdentity(_)));

            let err = Actor::resolve(Some(role), Some("")).unwrap_err();
            assert!(matches!(err, ApiError::MissingIdentity(_)));
        }
    }

    #[test]
    fn test_identity_shape_not_checked_at_resolution() {
        let actor = Actor::resolve(Some("physician"), Some("abc")).unwrap();
        assert_eq!(actor.identity(), Some("abc"));
        assert!(matches!(
            actor.numeric_identity("physician"),
            Err(ApiError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_numeric_identity_must_be_positive() {
        assert_eq!(Actor::patient("12").numeric_identity("patient").unwrap(), 12);
        assert!(Actor::patient("0").numeric_identity("patient").is_err());
        assert!(Actor::patient("-4").numeric_identity("patient").is_err());
        assert!(Actor::admin().numeric_identity("admin").is_err());
    }
}
