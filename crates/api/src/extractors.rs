//! Request extractors.

use axum::{extract::FromRequestParts, http::request::Parts};
use clubhub_common::AppError;
use clubhub_core::ClubContext;
use clubhub_core::models::Role;

use crate::middleware::Session;

/// Authenticated session extractor.
#[derive(Debug, Clone)]
pub struct AuthSession(pub Session);

impl<S> FromRequestParts<S> for AuthSession
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // Set by the session middleware
        parts
            .extensions
            .get::<Session>()
            .cloned()
            .map(AuthSession)
            .ok_or(AppError::Unauthorized)
    }
}

/// A session allowed onto the club administration screens.
///
/// Club administrators act on their own club. Super administrators must name
/// the club explicitly.
#[derive(Debug, Clone)]
pub struct ClubAdmin {
    /// The caller's session.
    pub session: Session,
    /// The club being administered.
    pub context: ClubContext,
}

impl<S> FromRequestParts<S> for ClubAdmin
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let AuthSession(session) = AuthSession::from_request_parts(parts, state).await?;

        let context = match session.role {
            Role::Student => {
                return Err(AppError::Forbidden(
                    "Club administration requires a club admin".to_string(),
                ));
            }
            Role::ClubAdmin => ClubContext {
                user_id: session.user_id,
                club_id: session.club_id,
            },
            Role::SuperAdmin => {
                let club_id = session.club_id.ok_or_else(|| {
                    AppError::BadRequest("Super admins must select a club".to_string())
                })?;
                ClubContext::for_club(session.user_id, club_id)
            }
        };

        Ok(Self { session, context })
    }
}

/// A super administrator session.
#[derive(Debug, Clone)]
pub struct SuperAdmin(pub Session);

impl<S> FromRequestParts<S> for SuperAdmin
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let AuthSession(session) = AuthSession::from_request_parts(parts, state).await?;
        if session.role != Role::SuperAdmin {
            return Err(AppError::Forbidden(
                "Only super admins can view all clubs".to_string(),
            ));
        }
        Ok(Self(session))
    }
}
