use std::sync::Arc;

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use rocket::http::Status;
use rocket::response::status::Created;
use rocket::serde::json::Json;
use rocket::{delete, get, post, put, routes, Build, Rocket, State};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use common::Config;

use crate::coordinator::PostSummaryCoordinator;
use crate::storage::{
    self, Category, CategoryChanges, CategoryDeletion, NewPost, PostChanges, PostDetail, PostQuery,
    PostStatus,
};
use crate::summary::SummaryRecord;

const MAX_TITLE_CHARS: usize = 255;
const MAX_IMAGE_URL_CHARS: usize = 500;
const DEFAULT_PAGE_SIZE: i64 = 20;
const MAX_PAGE_SIZE: i64 = 100;

/// Application state stored inside Rocket managed state.
#[derive(Clone)]
pub struct AppState {
    pub started_at: DateTime<Utc>,
    pub db: SqlitePool,
    pub coordinator: Arc<PostSummaryCoordinator>,
}

/// Response structure for `/health`.
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp: DateTime<Utc>,
    uptime_seconds: i64,
    database: &'static str,
    llm: &'static str,
}

/// Request body for creating a post.
#[derive(Deserialize)]
struct PostCreateRequest {
    #[serde(flatten)]
    post: NewPost,
    #[serde(default = "default_true")]
    auto_summarize: bool,
}

fn default_true() -> bool {
    true
}

/// Request body for updating a post. Only present fields are changed.
#[derive(Deserialize)]
struct PostUpdateRequest {
    #[serde(flatten)]
    changes: PostChanges,
    #[serde(default)]
    regenerate_summary: bool,
}

#[derive(Serialize)]
struct PostList {
    posts: Vec<PostDetail>,
    total: i64,
    page: i64,
    size: usize,
}

/// Request body for a summary preview (nothing is stored).
#[derive(Deserialize)]
struct PreviewRequest {
    title: String,
    content: String,
    category: String,
}

#[derive(Deserialize)]
struct CategoryCreate {
    name: String,
    description: Option<String>,
}

/// Response for deletions that report back a message
#[derive(Serialize)]
struct DeleteResponse {
    success: bool,
    message: String,
}

/// Response structure for `/`.
#[derive(Serialize)]
struct ApiInfo {
    name: &'static str,
    version: &'static str,
    features: [&'static str; 6],
    health: &'static str,
}

#[derive(Deserialize)]
struct AskRequest {
    prompt: String,
}

#[derive(Serialize)]
struct AskResponse {
    answer: String,
}

fn internal_error(e: anyhow::Error) -> Status {
    tracing::error!("request failed: {:#}", e);
    Status::InternalServerError
}

fn validate_post_fields(title: Option<&str>, image_url: Option<&str>) -> Result<(), Status> {
    if let Some(title) = title {
        if title.trim().is_empty() || title.chars().count() > MAX_TITLE_CHARS {
            return Err(Status::BadRequest);
        }
    }
    if let Some(image_url) = image_url {
        if image_url.chars().count() > MAX_IMAGE_URL_CHARS || url::Url::parse(image_url).is_err() {
            return Err(Status::BadRequest);
        }
    }
    Ok(())
}

async fn require_category(pool: &SqlitePool, category_id: i64) -> Result<Category, Status> {
    storage::get_category(pool, category_id)
        .await
        .map_err(internal_error)?
        .ok_or_else(|| {
            tracing::warn!(category_id, "unknown category");
            Status::BadRequest
        })
}

#[get("/")]
fn index() -> Json<ApiInfo> {
    Json(ApiInfo {
        name: "postlens blog API",
        version: env!("CARGO_PKG_VERSION"),
        features: [
            "post CRUD",
            "automatic LLM summaries",
            "highlight extraction",
            "keyword extraction",
            "category management",
            "search and filtering",
        ],
        health: "/health",
    })
}

#[get("/health")]
async fn health(state: &State<AppState>) -> Result<Json<HealthResponse>, Status> {
    if let Err(e) = sqlx::query("SELECT 1").execute(&state.db).await {
        tracing::error!("health check: database unreachable: {}", e);
        return Err(Status::ServiceUnavailable);
    }

    let now = Utc::now();
    let llm = if state.coordinator.summarizer().is_configured() {
        "configured"
    } else {
        "not_configured"
    };

    Ok(Json(HealthResponse {
        status: "healthy",
        timestamp: now,
        uptime_seconds: (now - state.started_at).num_seconds(),
        database: "connected",
        llm,
    }))
}

/// List posts with summaries (filtering and paging).
#[get("/api/v1/posts?<skip>&<limit>&<category_id>&<search>&<status>")]
async fn list_posts(
    state: &State<AppState>,
    skip: Option<i64>,
    limit: Option<i64>,
    category_id: Option<i64>,
    search: Option<String>,
    status: Option<String>,
) -> Result<Json<PostList>, Status> {
    let status = match status.as_deref() {
        Some(s) => Some(PostStatus::parse(s).ok_or(Status::BadRequest)?),
        None => None,
    };
    let skip = skip.unwrap_or(0).max(0);
    let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);

    let query = PostQuery {
        skip,
        limit,
        category_id,
        search,
        status,
    };
    let (posts, total) = storage::list_posts(&state.db, &query)
        .await
        .map_err(internal_error)?;

    Ok(Json(PostList {
        size: posts.len(),
        posts,
        total,
        page: skip / limit + 1,
    }))
}

#[get("/api/v1/posts/<post_id>")]
async fn get_post(state: &State<AppState>, post_id: i64) -> Result<Json<PostDetail>, Status> {
    storage::get_post_detail(&state.db, post_id)
        .await
        .map_err(internal_error)?
        .map(Json)
        .ok_or(Status::NotFound)
}

/// Create a post. With `auto_summarize` (default true) a summary is attached;
/// a failing model only lowers its confidence, it never fails the request.
#[post("/api/v1/posts", data = "<body>")]
async fn create_post(
    state: &State<AppState>,
    body: Json<PostCreateRequest>,
) -> Result<Created<Json<PostDetail>>, Status> {
    let PostCreateRequest {
        post,
        auto_summarize,
    } = body.into_inner();
    validate_post_fields(Some(&post.title), post.image_url.as_deref())?;
    require_category(&state.db, post.category_id).await?;

    let detail = state
        .coordinator
        .create_post(post, auto_summarize)
        .await
        .map_err(internal_error)?;

    let location = format!("/api/v1/posts/{}", detail.post.id);
    Ok(Created::new(location).body(Json(detail)))
}

/// Update a post; changing `content` or setting `regenerate_summary` regenerates the summary.
#[put("/api/v1/posts/<post_id>", data = "<body>")]
async fn update_post(
    state: &State<AppState>,
    post_id: i64,
    body: Json<PostUpdateRequest>,
) -> Result<Json<PostDetail>, Status> {
    let PostUpdateRequest {
        changes,
        regenerate_summary,
    } = body.into_inner();
    validate_post_fields(changes.title.as_deref(), changes.image_url.as_deref())?;
    if let Some(category_id) = changes.category_id {
        require_category(&state.db, category_id).await?;
    }

    state
        .coordinator
        .update_post(post_id, changes, regenerate_summary)
        .await
        .map_err(internal_error)?
        .map(Json)
        .ok_or(Status::NotFound)
}

#[delete("/api/v1/posts/<post_id>")]
async fn delete_post(state: &State<AppState>, post_id: i64) -> Status {
    match state.coordinator.delete_post(post_id).await {
        Ok(true) => Status::NoContent,
        Ok(false) => Status::NotFound,
        Err(e) => internal_error(e),
    }
}

/// Force a new summary for an existing post.
#[post("/api/v1/posts/<post_id>/regenerate-summary")]
async fn regenerate_summary(
    state: &State<AppState>,
    post_id: i64,
) -> Result<Json<SummaryRecord>, Status> {
    state
        .coordinator
        .regenerate_summary(post_id)
        .await
        .map_err(internal_error)?
        .map(|stored| Json(stored.record))
        .ok_or(Status::NotFound)
}

/// Summarize text without storing anything.
#[post("/api/v1/posts/preview-summary", data = "<body>")]
async fn preview_summary(
    state: &State<AppState>,
    body: Json<PreviewRequest>,
) -> Json<SummaryRecord> {
    let outcome = state
        .coordinator
        .preview_summary(&body.title, &body.content, &body.category)
        .await;
    Json(outcome.into_record())
}

#[get("/api/v1/categories")]
async fn list_categories(state: &State<AppState>) -> Result<Json<Vec<Category>>, Status> {
    storage::list_categories(&state.db)
        .await
        .map(Json)
        .map_err(internal_error)
}

#[get("/api/v1/categories/<category_id>")]
async fn get_category(
    state: &State<AppState>,
    category_id: i64,
) -> Result<Json<Category>, Status> {
    storage::get_category(&state.db, category_id)
        .await
        .map_err(internal_error)?
        .map(Json)
        .ok_or(Status::NotFound)
}

#[post("/api/v1/categories", data = "<body>")]
async fn create_category(
    state: &State<AppState>,
    body: Json<CategoryCreate>,
) -> Result<Created<Json<Category>>, Status> {
    let name = body.name.trim();
    if name.is_empty() {
        return Err(Status::BadRequest);
    }
    let category = storage::create_category(&state.db, name, body.description.as_deref())
        .await
        .map_err(|e| {
            tracing::warn!("failed to create category {}: {:#}", name, e);
            Status::Conflict
        })?;
    let location = format!("/api/v1/categories/{}", category.id);
    Ok(Created::new(location).body(Json(category)))
}

#[put("/api/v1/categories/<category_id>", data = "<body>")]
async fn update_category(
    state: &State<AppState>,
    category_id: i64,
    body: Json<CategoryChanges>,
) -> Result<Json<Category>, Status> {
    let mut changes = body.into_inner();
    if let Some(name) = changes.name.as_mut() {
        *name = name.trim().to_string();
        if name.is_empty() {
            return Err(Status::BadRequest);
        }
    }
    storage::update_category(&state.db, category_id, &changes)
        .await
        .map_err(|e| {
            tracing::warn!(category_id, "failed to update category: {:#}", e);
            Status::Conflict
        })?
        .map(Json)
        .ok_or(Status::NotFound)
}

/// Categories still used by posts are refused with 400.
#[delete("/api/v1/categories/<category_id>")]
async fn delete_category(
    state: &State<AppState>,
    category_id: i64,
) -> Result<Json<DeleteResponse>, Status> {
    match storage::delete_category(&state.db, category_id)
        .await
        .map_err(internal_error)?
    {
        CategoryDeletion::Deleted => Ok(Json(DeleteResponse {
            success: true,
            message: format!("category {} deleted", category_id),
        })),
        CategoryDeletion::NotFound => Err(Status::NotFound),
        CategoryDeletion::InUse(posts) => {
            tracing::warn!(category_id, posts, "refusing to delete category in use");
            Err(Status::BadRequest)
        }
    }
}

/// Free-form question to the model.
#[post("/api/v1/ask-llm", data = "<body>")]
async fn ask_llm(state: &State<AppState>, body: Json<AskRequest>) -> Result<Json<AskResponse>, Status> {
    state
        .coordinator
        .summarizer()
        .ask(&body.prompt)
        .await
        .map(|answer| Json(AskResponse { answer }))
        .map_err(|e| {
            tracing::error!("ask-llm failed: {}", e);
            Status::BadGateway
        })
}

/// Mount all routes on a Rocket instance built from `figment`.
pub fn build_rocket(state: AppState, figment: rocket::figment::Figment) -> Rocket<Build> {
    rocket::custom(figment).manage(state).mount(
        "/",
        routes![
            index,
            health,
            list_posts,
            get_post,
            create_post,
            update_post,
            delete_post,
            regenerate_summary,
            preview_summary,
            list_categories,
            get_category,
            create_category,
            update_category,
            delete_category,
            ask_llm,
        ],
    )
}

pub async fn launch_rocket(state: AppState, config: Arc<Config>) -> Result<()> {
    // Apply [server] bind/port from the application config on top of Rocket's defaults.
    let mut fig = rocket::Config::figment();
    if let Some(server) = &config.server {
        if let Some(bind) = &server.bind {
            fig = fig.merge(("address", bind.clone()));
        }
        if let Some(port) = server.port {
            fig = fig.merge(("port", port));
        }
    }

    tracing::info!("Starting Rocket HTTP server");
    build_rocket(state, fig)
        .launch()
        .await
        .map_err(|e| anyhow!("Rocket failed: {}", e))?;

    tracing::info!("Rocket HTTP server has shut down");
    Ok(())
}
