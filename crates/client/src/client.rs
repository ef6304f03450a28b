//! Club backend HTTP client.

use std::sync::Arc;

use async_trait::async_trait;
use clubhub_common::{AppResult, config::BackendConfig};
use clubhub_core::models::{
    Club, ClubId, Escalation, EscalationId, Event, EventId, MemberId, Membership, NewEvent,
    UserId, UserProfile, decode_escalations,
};
use clubhub_core::{BackendConnector, ClubBackend};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use url::Url;

use crate::error::{BackendError, extract_message};

/// Bodies may come bare or wrapped in `{"data": ...}`.
#[derive(Deserialize)]
#[serde(untagged)]
enum Envelope<T> {
    Wrapped { data: T },
    Bare(T),
}

impl<T> Envelope<T> {
    fn into_inner(self) -> T {
        match self {
            Self::Wrapped { data } | Self::Bare(data) => data,
        }
    }
}

#[derive(Serialize)]
struct ResolveBody<'a> {
    notes: &'a str,
}

/// HTTP client for the club REST backend.
///
/// Cheap to clone; clones share the connection pool.
#[derive(Clone)]
pub struct BackendClient {
    client: Client,
    base_url: Url,
    user_agent: String,
    bearer_token: Option<Arc<str>>,
}

impl BackendClient {
    /// Create a client from configuration.
    pub fn new(config: &BackendConfig) -> Result<Self, BackendError> {
        let client = Client::builder()
            .timeout(config.timeout())
            .connect_timeout(config.connect_timeout())
            .build()?;

        // A trailing slash makes relative joins append instead of replace.
        let mut base = config.base_url.trim_end_matches('/').to_string();
        base.push('/');
        let base_url =
            Url::parse(&base).map_err(|e| BackendError::InvalidUrl(format!("{base}: {e}")))?;

        let user_agent = config
            .user_agent
            .clone()
            .unwrap_or_else(|| format!("clubhub/{}", env!("CARGO_PKG_VERSION")));

        Ok(Self {
            client,
            base_url,
            user_agent,
            bearer_token: None,
        })
    }

    /// A client that authenticates as `token`.
    #[must_use]
    pub fn with_token(&self, token: Option<&str>) -> Self {
        Self {
            bearer_token: token.map(Arc::from),
            ..self.clone()
        }
    }

    /// The backend base URL.
    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn url(&self, path: &str) -> Result<Url, BackendError> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| BackendError::InvalidUrl(format!("{path}: {e}")))
    }

    fn prepare(&self, request: RequestBuilder) -> RequestBuilder {
        let request = request
            .header("User-Agent", &self.user_agent)
            .header("Accept", "application/json");
        match &self.bearer_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(&self, method: &str, request: RequestBuilder) -> Result<Response, BackendError> {
        let response = self.prepare(request).send().await?;
        let status = response.status();

        if status.is_success() {
            return Ok(response);
        }

        let url = response.url().to_string();
        let body = response.text().await.unwrap_or_default();
        let message = extract_message(&body, status);
        if status.is_server_error() {
            warn!(method, url = %url, status = %status, message = %message, "Backend request failed");
        } else {
            debug!(method, url = %url, status = %status, message = %message, "Backend rejected request");
        }
        Err(BackendError::Status { status, message })
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, BackendError> {
        let bytes = response.bytes().await?;
        serde_json::from_slice::<Envelope<T>>(&bytes)
            .map(Envelope::into_inner)
            .map_err(|e| BackendError::Decode(e.to_string()))
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, BackendError> {
        let url = self.url(path)?;
        debug!(url = %url, "GET");
        let response = self.send("GET", self.client.get(url)).await?;
        Self::decode(response).await
    }

    async fn post<B: Serialize + Sync, T: DeserializeOwned>(
        &self,
        path: &str,
        body: Option<&B>,
    ) -> Result<T, BackendError> {
        let response = self.post_raw(path, body).await?;
        Self::decode(response).await
    }

    async fn post_raw<B: Serialize + Sync>(
        &self,
        path: &str,
        body: Option<&B>,
    ) -> Result<Response, BackendError> {
        let url = self.url(path)?;
        debug!(url = %url, "POST");
        let request = match body {
            Some(body) => self.client.post(url).json(body),
            None => self.client.post(url),
        };
        self.send("POST", request).await
    }
}

#[async_trait]
impl ClubBackend for BackendClient {
    async fn list_escalations(&self) -> AppResult<Vec<Escalation>> {
        let records: Vec<serde_json::Value> = self.get("intelligence/escalations").await?;
        Ok(decode_escalations(records))
    }

    async fn resolve_escalation(&self, id: EscalationId, notes: &str) -> AppResult<()> {
        // The response body is not needed; the caller re-fetches.
        self.post_raw(
            &format!("intelligence/escalations/{id}/resolve"),
            Some(&ResolveBody { notes }),
        )
        .await?;
        Ok(())
    }

    async fn get_club(&self, id: ClubId) -> AppResult<Club> {
        Ok(self.get(&format!("clubs/{id}")).await?)
    }

    async fn list_members(&self, club_id: ClubId) -> AppResult<Vec<Membership>> {
        Ok(self.get(&format!("clubs/{club_id}/members")).await?)
    }

    async fn get_user(&self, id: UserId) -> AppResult<UserProfile> {
        Ok(self.get(&format!("users/{id}")).await?)
    }

    async fn create_event(&self, club_id: ClubId, event: &NewEvent) -> AppResult<Event> {
        Ok(self
            .post(&format!("clubs/{club_id}/events"), Some(event))
            .await?)
    }

    async fn publish_event(&self, event_id: EventId) -> AppResult<Event> {
        Ok(self
            .post::<(), _>(&format!("events/{event_id}/publish"), None)
            .await?)
    }

    async fn approve_member(&self, club_id: ClubId, member_id: MemberId) -> AppResult<Membership> {
        Ok(self
            .post::<(), _>(
                &format!("clubs/{club_id}/members/{member_id}/approve"),
                None,
            )
            .await?)
    }
}

impl BackendConnector for BackendClient {
    fn connect(&self, bearer_token: Option<&str>) -> Arc<dyn ClubBackend> {
        Arc::new(self.with_token(bearer_token))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn config(base_url: &str) -> BackendConfig {
        BackendConfig {
            base_url: base_url.to_string(),
            timeout_secs: 5,
            connect_timeout_secs: 1,
            user_agent: None,
        }
    }

    #[test]
    fn test_paths_join_under_base_path() {
        let client = BackendClient::new(&config("http://backend.local/api")).unwrap();
        assert_eq!(
            client.url("/clubs/7/members").unwrap().as_str(),
            "http://backend.local/api/clubs/7/members"
        );

        let client = BackendClient::new(&config("http://backend.local/api/")).unwrap();
        assert_eq!(
            client.url("intelligence/escalations").unwrap().as_str(),
            "http://backend.local/api/intelligence/escalations"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(matches!(
            BackendClient::new(&config("not a url")),
            Err(BackendError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_with_token_keeps_base() {
        let client = BackendClient::new(&config("http://backend.local/api")).unwrap();
        let scoped = client.with_token(Some("abc"));
        assert_eq!(scoped.base_url(), client.base_url());
        assert_eq!(scoped.bearer_token.as_deref(), Some("abc"));
        assert!(client.bearer_token.is_none());
    }

    #[test]
    fn test_envelope_accepts_both_shapes() {
        let bare: Envelope<Vec<i64>> = serde_json::from_str("[1,2]").unwrap();
        let wrapped: Envelope<Vec<i64>> = serde_json::from_str(r#"{"data":[1,2]}"#).unwrap();
        assert_eq!(bare.into_inner(), vec![1, 2]);
        assert_eq!(wrapped.into_inner(), vec![1, 2]);
    }
}
