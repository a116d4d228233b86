use std::time::Duration;

use bytes::Bytes;
use rangebench_http::{HttpClient, HttpRequest, HttpResponse};
use serde::{Deserialize, Serialize};

use crate::format::truncate_chars;

pub const DEFAULT_IDENTITY_URL: &str =
    "https://identitytoolkit.googleapis.com/v1/accounts:signInWithPassword";
pub const DEFAULT_EXCHANGE_PATH: &str = "/auth/firebase/exchange";

const AUTH_TIMEOUT: Duration = Duration::from_secs(30);
const BODY_SNIPPET_CHARS: usize = 300;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("sign-in request failed: {0}")]
    Transport(#[from] rangebench_http::Error),

    #[error("sign-in failed (HTTP {status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("sign-in response is missing `idToken`")]
    MissingIdToken,

    #[error("failed to encode sign-in request: {0}")]
    Encode(#[from] serde_json::Error),

    #[error(transparent)]
    Exchange(#[from] ExchangeError),
}

#[derive(Debug, thiserror::Error)]
pub enum ExchangeError {
    #[error("token exchange request failed: {0}")]
    Transport(#[source] rangebench_http::Error),

    #[error("token exchange failed (HTTP {status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("token exchange response is invalid: {0}")]
    Malformed(String),
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SignInRequest<'a> {
    email: &'a str,
    password: &'a str,
    return_secure_token: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignInResponse {
    id_token: Option<String>,
    local_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IdentityErrorBody {
    error: IdentityErrorDetail,
}

#[derive(Debug, Deserialize)]
struct IdentityErrorDetail {
    message: String,
}

/// A short-lived stream token. `expires_at` is in epoch seconds.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ExchangeResponse {
    pub stream_token: String,
    pub expires_at: Option<i64>,
}

impl ExchangeResponse {
    /// Seconds left before expiry, relative to `now_epoch_s`. Negative once expired.
    pub fn ttl_secs(&self, now_epoch_s: i64) -> Option<i64> {
        self.expires_at.map(|at| at - now_epoch_s)
    }
}

fn body_snippet(res: &HttpResponse) -> String {
    truncate_chars(&String::from_utf8_lossy(&res.body), BODY_SNIPPET_CHARS)
}

/// Signs in with email and password and returns the identity provider's ID token.
pub async fn sign_in(
    client: &HttpClient,
    identity_url: &str,
    api_key: &str,
    email: &str,
    password: &str,
) -> Result<String, AuthError> {
    let mut url = url::Url::parse(identity_url)
        .map_err(|_| rangebench_http::Error::InvalidUrl(identity_url.to_string()))?;
    url.query_pairs_mut().append_pair("key", api_key);

    let payload = SignInRequest {
        email,
        password,
        return_secure_token: true,
    };
    let body = serde_json::to_vec(&payload)?;

    tracing::info!(%email, "signing in");
    let res = client
        .request(
            HttpRequest::post(url.as_str(), Bytes::from(body))
                .with_header("content-type", "application/json")
                .with_timeout(AUTH_TIMEOUT),
        )
        .await?;

    if res.status != 200 {
        let message = serde_json::from_slice::<IdentityErrorBody>(&res.body)
            .map(|b| b.error.message)
            .unwrap_or_else(|_| body_snippet(&res));
        return Err(AuthError::Rejected {
            status: res.status,
            message,
        });
    }

    let parsed: SignInResponse =
        serde_json::from_slice(&res.body).map_err(|_| AuthError::MissingIdToken)?;
    let token = parsed
        .id_token
        .filter(|t| !t.is_empty())
        .ok_or(AuthError::MissingIdToken)?;
    tracing::info!(uid = parsed.local_id.as_deref().unwrap_or("?"), "sign-in ok");
    Ok(token)
}

/// Trades an ID token for a stream token at `<base_url><exchange_path>`.
pub async fn exchange(
    client: &HttpClient,
    base_url: &str,
    exchange_path: &str,
    id_token: &str,
) -> Result<ExchangeResponse, ExchangeError> {
    let url = format!("{base_url}{exchange_path}");
    tracing::info!(%url, "exchanging id token");

    let res = client
        .request(
            HttpRequest::get_owned(url)
                .with_header("authorization", format!("Bearer {id_token}"))
                .with_timeout(AUTH_TIMEOUT),
        )
        .await
        .map_err(ExchangeError::Transport)?;

    if res.status != 200 {
        return Err(ExchangeError::Rejected {
            status: res.status,
            message: body_snippet(&res),
        });
    }

    let parsed: ExchangeResponse =
        serde_json::from_slice(&res.body).map_err(|e| ExchangeError::Malformed(e.to_string()))?;
    if parsed.stream_token.is_empty() {
        return Err(ExchangeError::Malformed("empty `stream_token`".to_string()));
    }
    Ok(parsed)
}
