//! Account-flag access control extractors.
//!
//! Each extractor wraps [`AuthUser`] and rejects requests whose account
//! flags do not meet the minimum requirement. Project-scoped checks go
//! through `rcalloc_core::policy` in the handler instead.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use rcalloc_core::error::CoreError;

use super::auth::AuthUser;
use crate::error::AppError;
use crate::state::AppState;

/// Requires a staff or superuser account. Rejects with 403 Forbidden otherwise.
pub struct RequireStaff(pub AuthUser);

impl FromRequestParts<AppState> for RequireStaff {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        if !user.is_staff && !user.is_superuser {
            return Err(AppError::Core(CoreError::Forbidden(
                "Staff access required".into(),
            )));
        }
        Ok(RequireStaff(user))
    }
}

/// Requires a superuser account. Rejects with 403 Forbidden otherwise.
pub struct RequireSuperuser(pub AuthUser);

impl FromRequestParts<AppState> for RequireSuperuser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        if !user.is_superuser {
            return Err(AppError::Core(CoreError::Forbidden(
                "Superuser access required".into(),
            )));
        }
        Ok(RequireSuperuser(user))
    }
}
