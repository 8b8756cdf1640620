use std::sync::{Arc, Mutex};

use axum::{
    body::Bytes,
    extract::{
        multipart::MultipartRejection, DefaultBodyLimit, FromRequest, FromRequestParts, Multipart,
        Path, Query, State,
    },
    http::Method,
    routing::{get, post},
    Json, Router,
};
use chirp_engine::{accounts, engagement, feed, posting};
use chirp_store::Database;
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::{AuthUser, MaybeAuthUser, TokenService};
use crate::config::ServerConfig;
use crate::error::ApiError;
use crate::images::{self, ImageKind, ImageStore, AVATAR_PREFIX, TWEET_IMAGE_PREFIX};
use crate::password::{hash_password, verify_password};

/// Slack on top of the upload cap for multipart framing and text fields.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Mutex<Database>>,
    pub images: Arc<ImageStore>,
    pub tokens: Arc<TokenService>,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    pub fn new(db: Database, images: ImageStore, config: ServerConfig) -> Self {
        Self {
            db: Arc::new(Mutex::new(db)),
            images: Arc::new(images),
            tokens: Arc::new(TokenService::new(&config.jwt_secret, config.token_ttl_secs)),
            config: Arc::new(config),
        }
    }

    /// Run `f` against the database on the blocking pool.
    async fn with_db<T, E, F>(&self, f: F) -> Result<T, ApiError>
    where
        F: FnOnce(&mut Database) -> Result<T, E> + Send + 'static,
        T: Send + 'static,
        E: Into<ApiError> + Send + 'static,
    {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || {
            let mut guard = db
                .lock()
                .map_err(|_| ApiError::Internal("database lock poisoned".into()))?;
            f(&mut *guard).map_err(Into::into)
        })
        .await
        .map_err(|e| ApiError::Internal(format!("database task failed: {e}")))?
    }
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    let body_limit = state.config.max_upload_size + MULTIPART_OVERHEAD;

    Router::new()
        .route("/", post(login))
        .route("/signup", post(signup))
        .route("/feed", get(get_feed).post(post_tweet))
        .route("/feed/comments/:tweet_id", get(get_comments))
        .route("/feed/comment/:tweet_id", post(post_comment))
        .route("/post/:user/retweet/:tweet_id", post(retweet))
        .route("/post/:user/like/:tweet_id", post(like_tweet))
        .route("/comment/:user/like/:comment_id", post(like_comment))
        .route("/deleteTweet/:tweet_id", post(delete_tweet))
        .route("/deleteComment/:comment_id", post(delete_comment))
        .route("/editTweet/:tweet_id", post(edit_tweet))
        .route("/editComment/:comment_id", post(edit_comment))
        .route("/avatar/:user", post(update_avatar))
        .route("/profile/:user", get(get_profile))
        .route("/user/:user/follow/:target", post(follow))
        .route("/search/:fragment", get(search))
        .nest_service(
            TWEET_IMAGE_PREFIX,
            ServeDir::new(state.images.dir(ImageKind::Tweet)),
        )
        .nest_service(AVATAR_PREFIX, ServeDir::new(state.images.dir(ImageKind::Avatar)))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Success envelope: `{"status":"ok", ...body}`.
#[derive(Serialize)]
struct Envelope<T> {
    status: &'static str,
    #[serde(flatten)]
    body: T,
}

fn ok<T: Serialize>(body: T) -> Json<Envelope<T>> {
    Json(Envelope { status: "ok", body })
}

fn ok_empty() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// `Json` whose rejections render as the error envelope.
#[derive(FromRequest)]
#[from_request(via(Json), rejection(ApiError))]
struct ApiJson<T>(T);

#[derive(FromRequestParts)]
#[from_request(via(Query), rejection(ApiError))]
struct ApiQuery<T>(T);

#[derive(FromRequestParts)]
#[from_request(via(Path), rejection(ApiError))]
struct ApiPath<T>(T);

fn parse_id(raw: &str, what: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::NotFound(what.to_string()))
}

/// Remove an image whose record write failed.  If the file cannot be removed
/// either, the request is reported as a partial write.
async fn discard_image(images: &ImageStore, kind: ImageKind, file: &str, cause: ApiError) -> ApiError {
    match images.delete(kind, file).await {
        Ok(()) => {
            warn!(file = %file, error = %cause, "record write failed, upload discarded");
            cause
        }
        Err(cleanup) => ApiError::PartialWrite(format!(
            "stored {file} but the record write failed ({cause}); cleanup failed: {cleanup}"
        )),
    }
}

// ─── Accounts ───

#[derive(Deserialize)]
struct Credentials {
    username: String,
    password: String,
}

#[derive(Serialize)]
struct LoginResponse {
    user: String,
}

async fn login(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<Credentials>,
) -> Result<Json<Envelope<LoginResponse>>, ApiError> {
    let username = req.username;
    let user = state
        .with_db(move |db| match accounts::find_for_login(db, &username) {
            Err(chirp_engine::EngineError::NotFound(_)) => Err(ApiError::InvalidLogin),
            other => other.map_err(ApiError::from),
        })
        .await?;

    let hash = user.password_hash.clone();
    let password = req.password;
    let valid = tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .map_err(|e| ApiError::Internal(format!("password check failed: {e}")))?;
    if !valid {
        return Err(ApiError::InvalidLogin);
    }

    let token = state.tokens.issue(&user.username)?;
    info!(user = %user.username, "login");
    Ok(ok(LoginResponse { user: token }))
}

#[derive(Serialize)]
struct SignupResponse {
    user: chirp_engine::AuthorView,
}

async fn signup(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<Credentials>,
) -> Result<Json<Envelope<SignupResponse>>, ApiError> {
    if req.password.is_empty() {
        return Err(ApiError::Validation("password must not be empty".into()));
    }
    let username = accounts::normalize_username(&req.username)?;

    let password = req.password;
    let hash = tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| ApiError::Internal(format!("password hashing failed: {e}")))??;

    let user = state
        .with_db(move |db| accounts::register(db, &username, &hash))
        .await?;
    Ok(ok(SignupResponse { user }))
}

// ─── Feed and comments ───

#[derive(Deserialize)]
struct FeedQuery {
    #[serde(default)]
    t: u32,
}

async fn get_feed(
    auth: AuthUser,
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<FeedQuery>,
) -> Result<Json<Envelope<feed::FeedPage>>, ApiError> {
    let limit = state.config.feed_page_size;
    let page = state
        .with_db(move |db| feed::build_feed(db, &auth.username, query.t, limit))
        .await?;
    Ok(ok(page))
}

#[derive(Serialize)]
struct TweetResponse {
    tweet: chirp_engine::TweetView,
}

async fn get_comments(
    MaybeAuthUser(viewer): MaybeAuthUser,
    State(state): State<AppState>,
    ApiPath(tweet_id): ApiPath<String>,
) -> Result<Json<Envelope<TweetResponse>>, ApiError> {
    let tweet_id = parse_id(&tweet_id, "tweet")?;
    let tweet = state
        .with_db(move |db| {
            feed::fetch_comments(db, tweet_id, viewer.as_ref().map(|u| u.username.as_str()))
        })
        .await?;
    Ok(ok(TweetResponse { tweet }))
}

#[derive(Deserialize, Default)]
struct ContentBody {
    #[serde(default)]
    content: String,
}

struct Upload {
    file_name: String,
    data: Bytes,
}

async fn post_tweet(
    auth: AuthUser,
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<Envelope<TweetResponse>>, ApiError> {
    let mut multipart = multipart?;
    let mut body = ContentBody::default();
    let mut upload = None;
    let mut image_url = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "tweet" => {
                let text = field.text().await?;
                body = serde_json::from_str(&text)
                    .map_err(|e| ApiError::Validation(format!("Invalid tweet payload: {e}")))?;
            }
            "image" => {
                let file_name = field.file_name().unwrap_or("").to_string();
                let data = field.bytes().await?;
                upload = Some(Upload { file_name, data });
            }
            "imageUrl" => {
                let url = field.text().await?;
                image_url = Some(url).filter(|u| !u.trim().is_empty());
            }
            other => warn!(field = %other, "ignoring unknown multipart field"),
        }
    }

    let stored = match upload {
        Some(upload) => Some(
            state
                .images
                .store(ImageKind::Tweet, &upload.file_name, &upload.data)
                .await?,
        ),
        None => None,
    };
    let image = stored.as_deref().map(images::tweet_image_path).or(image_url);

    let author = auth.username;
    let result = state
        .with_db(move |db| posting::compose_tweet(db, &author, &body.content, image))
        .await;

    match (result, stored) {
        (Ok(tweet), _) => Ok(ok(TweetResponse { tweet })),
        (Err(e), Some(file)) => Err(discard_image(&state.images, ImageKind::Tweet, &file, e).await),
        (Err(e), None) => Err(e),
    }
}

async fn post_comment(
    auth: AuthUser,
    State(state): State<AppState>,
    ApiPath(tweet_id): ApiPath<String>,
    ApiJson(body): ApiJson<ContentBody>,
) -> Result<Json<Envelope<posting::CommentPosted>>, ApiError> {
    let tweet_id = parse_id(&tweet_id, "tweet")?;
    let posted = state
        .with_db(move |db| posting::compose_comment(db, &auth.username, tweet_id, &body.content))
        .await?;
    Ok(ok(posted))
}

// ─── Engagement toggles ───

async fn retweet(
    auth: AuthUser,
    State(state): State<AppState>,
    ApiPath((user, tweet_id)): ApiPath<(String, String)>,
) -> Result<Json<Envelope<engagement::RetweetToggle>>, ApiError> {
    auth.ensure_is(&user)?;
    let tweet_id = parse_id(&tweet_id, "tweet")?;
    let toggle = state
        .with_db(move |db| engagement::toggle_retweet(db, &auth.username, tweet_id))
        .await?;
    Ok(ok(toggle))
}

async fn like_tweet(
    auth: AuthUser,
    State(state): State<AppState>,
    ApiPath((user, tweet_id)): ApiPath<(String, String)>,
) -> Result<Json<Envelope<engagement::LikeToggle>>, ApiError> {
    auth.ensure_is(&user)?;
    let tweet_id = parse_id(&tweet_id, "tweet")?;
    let toggle = state
        .with_db(move |db| engagement::toggle_like(db, &auth.username, tweet_id))
        .await?;
    Ok(ok(toggle))
}

async fn like_comment(
    auth: AuthUser,
    State(state): State<AppState>,
    ApiPath((user, comment_id)): ApiPath<(String, String)>,
) -> Result<Json<Envelope<engagement::LikeToggle>>, ApiError> {
    auth.ensure_is(&user)?;
    let comment_id = parse_id(&comment_id, "comment")?;
    let toggle = state
        .with_db(move |db| engagement::toggle_comment_like(db, &auth.username, comment_id))
        .await?;
    Ok(ok(toggle))
}

async fn follow(
    auth: AuthUser,
    State(state): State<AppState>,
    ApiPath((user, target)): ApiPath<(String, String)>,
) -> Result<Json<Envelope<engagement::FollowToggle>>, ApiError> {
    auth.ensure_is(&user)?;
    let target = target.to_lowercase();
    let toggle = state
        .with_db(move |db| engagement::toggle_follow(db, &auth.username, &target))
        .await?;
    Ok(ok(toggle))
}

// ─── Edit and delete ───

async fn delete_tweet(
    auth: AuthUser,
    State(state): State<AppState>,
    ApiPath(tweet_id): ApiPath<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let tweet_id = parse_id(&tweet_id, "tweet")?;
    state
        .with_db(move |db| posting::delete_tweet(db, &auth.username, tweet_id))
        .await?;
    Ok(ok_empty())
}

async fn delete_comment(
    auth: AuthUser,
    State(state): State<AppState>,
    ApiPath(comment_id): ApiPath<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let comment_id = parse_id(&comment_id, "comment")?;
    state
        .with_db(move |db| posting::delete_comment(db, &auth.username, comment_id))
        .await?;
    Ok(ok_empty())
}

async fn edit_tweet(
    auth: AuthUser,
    State(state): State<AppState>,
    ApiPath(tweet_id): ApiPath<String>,
    ApiJson(body): ApiJson<ContentBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let tweet_id = parse_id(&tweet_id, "tweet")?;
    state
        .with_db(move |db| posting::edit_tweet(db, &auth.username, tweet_id, &body.content))
        .await?;
    Ok(ok_empty())
}

async fn edit_comment(
    auth: AuthUser,
    State(state): State<AppState>,
    ApiPath(comment_id): ApiPath<String>,
    ApiJson(body): ApiJson<ContentBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let comment_id = parse_id(&comment_id, "comment")?;
    state
        .with_db(move |db| posting::edit_comment(db, &auth.username, comment_id, &body.content))
        .await?;
    Ok(ok_empty())
}

// ─── Profiles, avatars and search ───

#[derive(Serialize)]
struct AvatarResponse {
    avatar: String,
}

/// Accepts an `avatar` field holding either an uploaded image or a URL.
async fn update_avatar(
    auth: AuthUser,
    State(state): State<AppState>,
    ApiPath(user): ApiPath<String>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<Envelope<AvatarResponse>>, ApiError> {
    auth.ensure_is(&user)?;
    let mut multipart = multipart?;

    let mut avatar = None;
    let mut stored = None;
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("avatar") {
            continue;
        }
        match field.file_name().map(str::to_string) {
            Some(file_name) => {
                let data = field.bytes().await?;
                let name = state.images.store(ImageKind::Avatar, &file_name, &data).await?;
                avatar = Some(name.clone());
                stored = Some(name);
            }
            None => avatar = Some(field.text().await?),
        }
        break;
    }
    let avatar = avatar.ok_or_else(|| ApiError::Validation("Missing 'avatar' field".into()))?;

    let username = auth.username;
    let value = avatar.clone();
    let result = state
        .with_db(move |db| accounts::update_avatar(db, &username, &value))
        .await;

    match (result, stored) {
        (Ok(()), _) => Ok(ok(AvatarResponse {
            avatar: avatar.trim().to_string(),
        })),
        (Err(e), Some(file)) => Err(discard_image(&state.images, ImageKind::Avatar, &file, e).await),
        (Err(e), None) => Err(e),
    }
}

async fn get_profile(
    auth: AuthUser,
    State(state): State<AppState>,
    ApiPath(user): ApiPath<String>,
) -> Result<Json<Envelope<feed::ProfilePage>>, ApiError> {
    let user = user.to_lowercase();
    let profile = state
        .with_db(move |db| feed::build_profile(db, &auth.username, &user))
        .await?;
    Ok(ok(profile))
}

#[derive(Serialize)]
struct SearchResponse {
    users: Vec<chirp_engine::AuthorView>,
}

async fn search(
    _auth: AuthUser,
    State(state): State<AppState>,
    ApiPath(fragment): ApiPath<String>,
) -> Result<Json<Envelope<SearchResponse>>, ApiError> {
    let users = state
        .with_db(move |db| accounts::search(db, &fragment))
        .await?;
    Ok(ok(SearchResponse { users }))
}

pub async fn serve(state: AppState, addr: std::net::SocketAddr) -> anyhow::Result<()> {
    let app = build_router(state);

    info!(addr = %addr, "Starting HTTP API server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
