//! HTTP handlers for the web interface

use axum::{
    async_trait,
    extract::{FromRequestParts, Path, Query, State},
    http::{header::AUTHORIZATION, request::Parts, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::Display;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::auth::{
    bearer_token, AuthError, Identity, PasswordScheme, SessionRegistry, TokenVerifier,
};
use crate::social::{AccountSummary, Page, Social, DEFAULT_PAGE_SIZE};
use crate::store::{
    CreateAccountParams, CreateTweetParams, UpdateEmailParams, UpdateNameParams,
    UpdatePasswordParams,
};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub social: Social,
    pub sessions: Arc<SessionRegistry>,
    pub passwords: Arc<dyn PasswordScheme>,
    /// Parent of every request's cancellation token
    pub shutdown: CancellationToken,
}

impl AppState {
    fn cancel_token(&self) -> CancellationToken {
        self.shutdown.child_token()
    }
}

/// Envelope for every response body
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse {
    /// Whether the operation succeeded
    pub success: bool,
    /// The result, or the error message
    pub result: Value,
}

impl ApiResponse {
    fn ok<T: Serialize>(value: T) -> Self {
        match serde_json::to_value(value) {
            Ok(result) => ApiResponse {
                success: true,
                result,
            },
            Err(e) => ApiResponse::error(e),
        }
    }

    fn error<E: Display>(err: E) -> Self {
        ApiResponse {
            success: false,
            result: Value::String(err.to_string()),
        }
    }
}

fn respond<T: Serialize, E: Display>(result: Result<T, E>) -> Json<ApiResponse> {
    Json(match result {
        Ok(value) => ApiResponse::ok(value),
        Err(e) => {
            debug!("Request failed: {}", e);
            ApiResponse::error(e)
        }
    })
}

#[async_trait]
impl FromRequestParts<AppState> for Identity {
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default();

        bearer_token(header)
            .and_then(|token| state.sessions.verify(token))
            .map_err(reject)
    }
}

fn reject(err: AuthError) -> Response {
    warn!("Rejected request: {}", err);
    (StatusCode::UNAUTHORIZED, Json(ApiResponse::error(err))).into_response()
}

#[derive(Debug, Deserialize)]
pub struct SignUpRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub name: String,
}

impl SignUpRequest {
    fn validate(&self) -> Result<(), String> {
        check_username(&self.username)?;
        check_email(&self.email)?;
        check_password(&self.password)?;
        check_name(&self.name)
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub username: String,
    pub token: String,
    pub expires_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Deserialize)]
pub struct PasswordRequest {
    pub new_password: String,
}

#[derive(Debug, Deserialize)]
pub struct EmailRequest {
    pub new_email: String,
}

#[derive(Debug, Deserialize)]
pub struct NameRequest {
    pub new_name: String,
}

fn check_len(field: &str, value: &str, min: usize, max: usize) -> Result<(), String> {
    let len = value.chars().count();
    if len < min || len > max {
        return Err(format!("{} must be {} to {} characters", field, min, max));
    }
    Ok(())
}

fn check_username(username: &str) -> Result<(), String> {
    check_len("username", username, 1, 15)?;
    if !username.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err("username may only contain letters, digits and '_'".to_string());
    }
    Ok(())
}

fn check_password(password: &str) -> Result<(), String> {
    check_len("password", password, 8, 30)
}

fn check_name(name: &str) -> Result<(), String> {
    check_len("name", name, 1, 50)
}

fn check_email(email: &str) -> Result<(), String> {
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(()),
        _ => Err(format!("invalid email address '{}'", email)),
    }
}

/// Hash off the async workers; argon2 is deliberately slow
async fn hash_password(
    passwords: Arc<dyn PasswordScheme>,
    password: String,
) -> Result<String, AuthError> {
    tokio::task::spawn_blocking(move || passwords.hash(&password))
        .await
        .map_err(|e| AuthError::Hashing(e.to_string()))?
}

/// Request body naming another account
#[derive(Debug, Deserialize)]
pub struct FollowRequest {
    pub follow_user: String,
}

#[derive(Debug, Deserialize)]
pub struct TweetRequest {
    pub tweet: String,
}

/// Request body naming a tweet
#[derive(Debug, Deserialize)]
pub struct TweetIdRequest {
    pub id: i64,
}

/// Paging query for follower listings
#[derive(Debug, Deserialize)]
pub struct PageQuery {
    #[serde(default = "first_page")]
    pub page_id: usize,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

fn first_page() -> usize {
    1
}

fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

impl From<PageQuery> for Page {
    fn from(query: PageQuery) -> Self {
        Page::new(query.page_id, query.page_size)
    }
}

pub async fn sign_up(
    State(state): State<AppState>,
    Json(req): Json<SignUpRequest>,
) -> Json<ApiResponse> {
    if let Err(e) = req.validate() {
        return respond::<(), _>(Err(e));
    }
    let hashed_password = match hash_password(state.passwords.clone(), req.password).await {
        Ok(hashed) => hashed,
        Err(e) => return respond::<(), _>(Err(e)),
    };

    let params = CreateAccountParams {
        username: req.username,
        email: req.email,
        hashed_password,
        name: req.name,
    };
    let cancel = state.cancel_token();
    let account = state.social.sign_up(params, &cancel).await;
    respond(account.map(|a| AccountSummary::from(&a)))
}

/// Unknown users and wrong passwords get the same answer
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Json<ApiResponse> {
    let account = match state.social.profile(&req.username).await {
        Ok(account) => account,
        Err(e) if e.is_not_found() => return respond::<(), _>(Err(AuthError::BadCredentials)),
        Err(e) => return respond::<(), _>(Err(e)),
    };

    let passwords = state.passwords.clone();
    let hashed = account.hashed_password;
    let verified = tokio::task::spawn_blocking(move || passwords.verify(&req.password, &hashed))
        .await
        .unwrap_or(false);
    if !verified {
        warn!("Failed login for {}", account.username);
        return respond::<(), _>(Err(AuthError::BadCredentials));
    }

    let (token, identity) = state.sessions.issue(&account.username);
    respond::<_, AuthError>(Ok(LoginResponse {
        username: identity.username,
        token,
        expires_at: identity.expires_at,
    }))
}

pub async fn update_password(
    State(state): State<AppState>,
    identity: Identity,
    Json(req): Json<PasswordRequest>,
) -> Json<ApiResponse> {
    if let Err(e) = check_password(&req.new_password) {
        return respond::<(), _>(Err(e));
    }
    let hashed_password = match hash_password(state.passwords.clone(), req.new_password).await {
        Ok(hashed) => hashed,
        Err(e) => return respond::<(), _>(Err(e)),
    };

    let params = UpdatePasswordParams {
        username: identity.username,
        hashed_password,
    };
    let cancel = state.cancel_token();
    let account = state.social.update_password(params, &cancel).await;
    respond(account.map(|a| AccountSummary::from(&a)))
}

pub async fn update_email(
    State(state): State<AppState>,
    identity: Identity,
    Json(req): Json<EmailRequest>,
) -> Json<ApiResponse> {
    if let Err(e) = check_email(&req.new_email) {
        return respond::<(), _>(Err(e));
    }
    let params = UpdateEmailParams {
        username: identity.username,
        email: req.new_email,
    };
    let cancel = state.cancel_token();
    let account = state.social.update_email(params, &cancel).await;
    respond(account.map(|a| AccountSummary::from(&a)))
}

pub async fn update_name(
    State(state): State<AppState>,
    identity: Identity,
    Json(req): Json<NameRequest>,
) -> Json<ApiResponse> {
    if let Err(e) = check_name(&req.new_name) {
        return respond::<(), _>(Err(e));
    }
    let params = UpdateNameParams {
        username: identity.username,
        name: req.new_name,
    };
    let cancel = state.cancel_token();
    let account = state.social.update_name(params, &cancel).await;
    respond(account.map(|a| AccountSummary::from(&a)))
}

pub async fn profile(State(state): State<AppState>, identity: Identity) -> Json<ApiResponse> {
    let account = state.social.profile(&identity.username).await;
    respond(account.map(|a| AccountSummary::from(&a)))
}

pub async fn followers(
    State(state): State<AppState>,
    identity: Identity,
    Query(page): Query<PageQuery>,
) -> Json<ApiResponse> {
    let accounts = state.social.followers(&identity.username, page.into()).await;
    respond(accounts.map(|list| list.iter().map(AccountSummary::from).collect::<Vec<_>>()))
}

pub async fn following(
    State(state): State<AppState>,
    identity: Identity,
    Query(page): Query<PageQuery>,
) -> Json<ApiResponse> {
    let accounts = state.social.following(&identity.username, page.into()).await;
    respond(accounts.map(|list| list.iter().map(AccountSummary::from).collect::<Vec<_>>()))
}

pub async fn follow(
    State(state): State<AppState>,
    identity: Identity,
    Json(req): Json<FollowRequest>,
) -> Json<ApiResponse> {
    let cancel = state.cancel_token();
    respond(state.social.follow(&identity.username, &req.follow_user, &cancel).await)
}

pub async fn unfollow(
    State(state): State<AppState>,
    identity: Identity,
    Json(req): Json<FollowRequest>,
) -> Json<ApiResponse> {
    let cancel = state.cancel_token();
    let result = state.social.unfollow(&identity.username, &req.follow_user, &cancel).await;
    respond(result.map(|()| format!("{} unfollowed {}", identity.username, req.follow_user)))
}

pub async fn create_tweet(
    State(state): State<AppState>,
    identity: Identity,
    Json(req): Json<TweetRequest>,
) -> Json<ApiResponse> {
    let params = CreateTweetParams {
        username: identity.username,
        body: req.tweet,
    };
    let cancel = state.cancel_token();
    respond(state.social.create_tweet(params, &cancel).await)
}

pub async fn get_tweet(
    State(state): State<AppState>,
    _identity: Identity,
    Path(id): Path<i64>,
) -> Json<ApiResponse> {
    respond(state.social.get_tweet(id).await)
}

pub async fn delete_tweet(
    State(state): State<AppState>,
    _identity: Identity,
    Path(id): Path<i64>,
) -> Json<ApiResponse> {
    let cancel = state.cancel_token();
    respond(state.social.delete_tweet(id, &cancel).await)
}

pub async fn like(
    State(state): State<AppState>,
    identity: Identity,
    Json(req): Json<TweetIdRequest>,
) -> Json<ApiResponse> {
    let cancel = state.cancel_token();
    respond(state.social.like_tweet(&identity.username, req.id, &cancel).await)
}

pub async fn unlike(
    State(state): State<AppState>,
    identity: Identity,
    Json(req): Json<TweetIdRequest>,
) -> Json<ApiResponse> {
    let cancel = state.cancel_token();
    let result = state.social.unlike_tweet(&identity.username, req.id, &cancel).await;
    respond(result.map(|()| format!("{} unliked tweet {}", identity.username, req.id)))
}

pub async fn feed(State(state): State<AppState>, identity: Identity) -> Json<ApiResponse> {
    respond(state.social.feed(&identity.username).await)
}

/// Row counts per table
pub async fn stats(State(state): State<AppState>) -> Json<ApiResponse> {
    Json(ApiResponse::ok(state.social.database().stats().await))
}
