use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::{debug, error};

use mirumir_types::api::ErrorResponse;

use crate::access::{AccessError, GrantRuleViolation};

/// Everything a handler can fail with, mapped onto an HTTP status at the edge.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Could not validate credentials")]
    Unauthorized,

    #[error("{message}")]
    NotFound {
        code: &'static str,
        message: &'static str,
    },

    /// Both access failures surface as 403; the inner error keeps them apart.
    #[error(transparent)]
    Forbidden(AccessError),

    #[error("{message}")]
    InvalidRequest { code: &'static str, message: String },

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn board_not_found() -> Self {
        Self::NotFound { code: "BOARD_NOT_FOUND", message: "Board not found" }
    }

    pub fn user_not_found() -> Self {
        Self::NotFound { code: "USER_NOT_FOUND", message: "User not found" }
    }

    pub fn sticker_not_found() -> Self {
        Self::NotFound { code: "STICKER_NOT_FOUND", message: "Sticker not found" }
    }

    pub fn grant_not_found() -> Self {
        Self::NotFound { code: "ACCESS_NOT_FOUND", message: "Access not found" }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest { code: "INVALID_REQUEST", message: message.into() }
    }

    pub fn invalid_permission(message: impl Into<String>) -> Self {
        Self::InvalidRequest { code: "INVALID_PERMISSION", message: message.into() }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::InvalidRequest { .. } => StatusCode::BAD_REQUEST,
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            Self::Unauthorized => "UNAUTHORIZED",
            Self::NotFound { code, .. } | Self::InvalidRequest { code, .. } => *code,
            Self::Forbidden(_) => "FORBIDDEN",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Conflict(_) => "CONFLICT",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<AccessError> for ApiError {
    fn from(err: AccessError) -> Self {
        match err {
            AccessError::Store(e) => Self::Internal(e),
            denied => Self::Forbidden(denied),
        }
    }
}

impl From<GrantRuleViolation> for ApiError {
    fn from(err: GrantRuleViolation) -> Self {
        match err {
            GrantRuleViolation::OwnerNotGrantable => Self::invalid_permission(err.to_string()),
            GrantRuleViolation::TargetIsOwner => Self::invalid_request(err.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            Self::Internal(e) => {
                error!("Internal error: {:#}", e);
                "Internal server error".to_string()
            }
            Self::Forbidden(e) => {
                debug!("Access denied: {}", e);
                e.to_string()
            }
            other => other.to_string(),
        };

        let body = ErrorResponse {
            error: self.code().to_string(),
            message,
        };
        let mut response = (status, Json(body)).into_response();
        if status == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mirumir_types::Permission;

    #[test]
    fn both_access_failures_are_forbidden() {
        let no_access: ApiError = AccessError::NoAccess { board_id: 1 }.into();
        let too_low: ApiError = AccessError::InsufficientPermission {
            have: Permission::View,
            required: Permission::Edit,
        }
        .into();

        assert_eq!(no_access.status(), StatusCode::FORBIDDEN);
        assert_eq!(too_low.status(), StatusCode::FORBIDDEN);
        assert!(matches!(no_access, ApiError::Forbidden(AccessError::NoAccess { .. })));
        assert!(matches!(
            too_low,
            ApiError::Forbidden(AccessError::InsufficientPermission { .. })
        ));
    }

    #[test]
    fn store_failure_is_internal() {
        let err: ApiError = AccessError::Store(anyhow::anyhow!("disk gone")).into();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn grant_rules_are_bad_requests() {
        let owner: ApiError = GrantRuleViolation::OwnerNotGrantable.into();
        let target: ApiError = GrantRuleViolation::TargetIsOwner.into();
        assert_eq!(owner.status(), StatusCode::BAD_REQUEST);
        assert_eq!(owner.code(), "INVALID_PERMISSION");
        assert_eq!(target.code(), "INVALID_REQUEST");
    }

    #[test]
    fn unauthorized_sets_challenge_header() {
        let response = ApiError::Unauthorized.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.headers()[header::WWW_AUTHENTICATE], "Bearer");
    }
}
