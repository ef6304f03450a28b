//! API middleware.

use std::sync::Arc;

use axum::{body::Body, http::Request, middleware::Next, response::Response};
use clubhub_common::config::EnforcementConfig;
use clubhub_core::models::{ClubId, Role, UserId};
use clubhub_core::{BackendConnector, Clock, EnforcementDataProvider};
use tracing::debug;

/// Header carrying the authenticated user's id.
pub const USER_ID_HEADER: &str = "x-user-id";
/// Header carrying the authenticated user's role.
pub const USER_ROLE_HEADER: &str = "x-user-role";
/// Header carrying the club the session is bound to, if any.
pub const CLUB_ID_HEADER: &str = "x-club-id";

/// Application state.
#[derive(Clone)]
pub struct AppState {
    /// Binds backend clients to a caller's credentials.
    pub connector: Arc<dyn BackendConnector>,
    /// Source of "now" for every evaluation.
    pub clock: Arc<dyn Clock>,
    /// Live view settings.
    pub enforcement: EnforcementConfig,
}

impl AppState {
    /// Create application state.
    #[must_use]
    pub fn new(
        connector: Arc<dyn BackendConnector>,
        clock: Arc<dyn Clock>,
        enforcement: EnforcementConfig,
    ) -> Self {
        Self {
            connector,
            clock,
            enforcement,
        }
    }

    /// A provider that talks to the backend with the session's credentials.
    #[must_use]
    pub fn provider_for(&self, session: &Session) -> EnforcementDataProvider {
        EnforcementDataProvider::new(
            self.connector.connect(session.bearer_token.as_deref()),
            Arc::clone(&self.clock),
        )
    }
}

/// Session established by the authentication gateway in front of this service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Authenticated user.
    pub user_id: UserId,
    /// Role granted by the gateway.
    pub role: Role,
    /// Club the session is bound to, if the gateway knows it.
    pub club_id: Option<ClubId>,
    /// Token forwarded to the backend.
    pub bearer_token: Option<String>,
}

impl Session {
    /// Read a session from request headers.
    ///
    /// Returns `None` unless both a valid user id and a known role are present.
    #[must_use]
    pub fn from_headers(headers: &axum::http::HeaderMap) -> Option<Self> {
        let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());

        let user_id = header(USER_ID_HEADER)?.parse().ok()?;
        let role = header(USER_ROLE_HEADER)?.parse().ok()?;
        let club_id = header(CLUB_ID_HEADER).and_then(|v| v.parse().ok());
        let bearer_token = header("authorization")
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());

        Some(Self {
            user_id,
            role,
            club_id,
            bearer_token,
        })
    }
}

/// Session middleware.
pub async fn session_middleware(mut req: Request<Body>, next: Next) -> Response {
    if let Some(session) = Session::from_headers(req.headers()) {
        debug!(user_id = %session.user_id, role = ?session.role, "Session attached");
        req.extensions_mut().insert(session);
    }

    next.run(req).await
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use axum::http::{HeaderMap, HeaderValue};

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for (name, value) in pairs {
            headers.insert(*name, HeaderValue::from_static(value));
        }
        headers
    }

    #[test]
    fn test_session_from_headers() {
        let session = Session::from_headers(&headers(&[
            ("x-user-id", "42"),
            ("x-user-role", "club_admin"),
            ("x-club-id", "7"),
            ("authorization", "Bearer tok"),
        ]))
        .unwrap();

        assert_eq!(session.user_id, UserId(42));
        assert_eq!(session.role, Role::ClubAdmin);
        assert_eq!(session.club_id, Some(ClubId(7)));
        assert_eq!(session.bearer_token.as_deref(), Some("tok"));
    }

    #[test]
    fn test_session_requires_user_and_role() {
        assert!(Session::from_headers(&headers(&[("x-user-role", "student")])).is_none());
        assert!(
            Session::from_headers(&headers(&[("x-user-id", "1"), ("x-user-role", "dean")]))
                .is_none()
        );
    }

    #[test]
    fn test_bad_club_header_is_ignored() {
        let session = Session::from_headers(&headers(&[
            ("x-user-id", "1"),
            ("x-user-role", "club_admin"),
            ("x-club-id", "seven"),
        ]))
        .unwrap();
        assert_eq!(session.club_id, None);
        assert_eq!(session.bearer_token, None);
    }
}
