use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Row, SqlitePool};
use tracing::{debug, info};

use crate::summary::SummaryRecord;

/// Categories created on first start
pub const DEFAULT_CATEGORIES: [(&str, &str); 4] = [
    ("reading", "Books and reading notes"),
    ("study", "Courses, lectures and study material"),
    ("daily", "Everyday life, meetings and memos"),
    ("other", "Anything that does not fit elsewhere"),
];

/// Category used for prompt framing when a post's category row is gone
pub const FALLBACK_CATEGORY: &str = "other";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    Draft,
    #[default]
    Published,
    Archived,
}

impl PostStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostStatus::Draft => "draft",
            PostStatus::Published => "published",
            PostStatus::Archived => "archived",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(PostStatus::Draft),
            "published" => Some(PostStatus::Published),
            "archived" => Some(PostStatus::Archived),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub category_id: i64,
    pub image_url: Option<String>,
    pub status: PostStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Persisted summary row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredSummary {
    pub id: i64,
    pub post_id: i64,
    #[serde(flatten)]
    pub record: SummaryRecord,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Post together with its category and summary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostDetail {
    #[serde(flatten)]
    pub post: Post,
    pub category: Option<Category>,
    pub summary: Option<StoredSummary>,
}

/// Fields for a new post
#[derive(Debug, Clone, Deserialize)]
pub struct NewPost {
    pub title: String,
    pub content: String,
    pub category_id: i64,
    pub image_url: Option<String>,
    #[serde(default)]
    pub status: PostStatus,
}

/// Partial category update; `None` leaves the column untouched
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CategoryChanges {
    pub name: Option<String>,
    pub description: Option<String>,
}

/// Result of a category deletion attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CategoryDeletion {
    Deleted,
    NotFound,
    /// Still referenced by this many posts; nothing was removed
    InUse(i64),
}

/// Partial post update; `None` leaves the column untouched
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PostChanges {
    pub title: Option<String>,
    pub content: Option<String>,
    pub category_id: Option<i64>,
    pub image_url: Option<String>,
    pub status: Option<PostStatus>,
}

/// Listing filters and paging
#[derive(Debug, Clone, Default)]
pub struct PostQuery {
    pub skip: i64,
    pub limit: i64,
    pub category_id: Option<i64>,
    pub search: Option<String>,
    pub status: Option<PostStatus>,
}

/// Ensure the schema exists and default categories are seeded.
/// Idempotent and safe to call at startup.
pub async fn ensure_schema(pool: &SqlitePool) -> Result<()> {
    info!("storage: ensuring DB schema (CREATE TABLE IF NOT EXISTS ...)");

    let stmts = [
        r#"
        CREATE TABLE IF NOT EXISTS categories (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            description TEXT,
            created_at TIMESTAMP NOT NULL,
            updated_at TIMESTAMP NOT NULL
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS posts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT NOT NULL,
            content TEXT NOT NULL,
            category_id INTEGER NOT NULL REFERENCES categories(id),
            image_url TEXT,
            status TEXT NOT NULL DEFAULT 'published',
            created_at TIMESTAMP NOT NULL,
            updated_at TIMESTAMP NOT NULL
        )
        "#,
        "CREATE INDEX IF NOT EXISTS idx_posts_created_at ON posts(created_at)",
        r#"
        CREATE TABLE IF NOT EXISTS summaries (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            post_id INTEGER NOT NULL UNIQUE REFERENCES posts(id) ON DELETE CASCADE,
            summary TEXT NOT NULL,
            highlights_json TEXT NOT NULL DEFAULT '[]',
            keywords_json TEXT NOT NULL DEFAULT '[]',
            model_version TEXT NOT NULL,
            confidence_score REAL NOT NULL CHECK (confidence_score BETWEEN 0 AND 100),
            regenerated BOOLEAN NOT NULL DEFAULT 0,
            created_at TIMESTAMP NOT NULL,
            updated_at TIMESTAMP NOT NULL
        )
        "#,
    ];

    for stmt in stmts {
        sqlx::query(stmt)
            .execute(pool)
            .await
            .with_context(|| format!("failed to apply schema statement: {}", stmt.trim()))?;
    }

    let now = Utc::now();
    for (name, description) in DEFAULT_CATEGORIES {
        sqlx::query(
            "INSERT OR IGNORE INTO categories (name, description, created_at, updated_at) VALUES (?, ?, ?, ?)",
        )
        .bind(name)
        .bind(description)
        .bind(now)
        .bind(now)
        .execute(pool)
        .await
        .with_context(|| format!("failed to seed category {}", name))?;
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Categories
// ---------------------------------------------------------------------------

fn category_from_row(row: &sqlx::sqlite::SqliteRow) -> Category {
    Category {
        id: row.get("id"),
        name: row.get("name"),
        description: row.get("description"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

pub async fn list_categories(pool: &SqlitePool) -> Result<Vec<Category>> {
    let rows = sqlx::query("SELECT * FROM categories ORDER BY name")
        .fetch_all(pool)
        .await
        .context("failed to list categories")?;
    Ok(rows.iter().map(category_from_row).collect())
}

pub async fn get_category(pool: &SqlitePool, category_id: i64) -> Result<Option<Category>> {
    let row = sqlx::query("SELECT * FROM categories WHERE id = ?")
        .bind(category_id)
        .fetch_optional(pool)
        .await
        .context("failed to fetch category")?;
    Ok(row.as_ref().map(category_from_row))
}

pub async fn create_category(
    pool: &SqlitePool,
    name: &str,
    description: Option<&str>,
) -> Result<Category> {
    let now = Utc::now();
    let row = sqlx::query(
        "INSERT INTO categories (name, description, created_at, updated_at) VALUES (?, ?, ?, ?) RETURNING *",
    )
    .bind(name)
    .bind(description)
    .bind(now)
    .bind(now)
    .fetch_one(pool)
    .await
    .with_context(|| format!("failed to insert category {}", name))?;
    Ok(category_from_row(&row))
}

/// Apply a partial update. Returns `None` if the category does not exist.
pub async fn update_category(
    pool: &SqlitePool,
    category_id: i64,
    changes: &CategoryChanges,
) -> Result<Option<Category>> {
    let row = sqlx::query(
        r#"
        UPDATE categories SET
            name = COALESCE(?, name),
            description = COALESCE(?, description),
            updated_at = ?
        WHERE id = ?
        RETURNING *
        "#,
    )
    .bind(&changes.name)
    .bind(&changes.description)
    .bind(Utc::now())
    .bind(category_id)
    .fetch_optional(pool)
    .await
    .with_context(|| format!("failed to update category {}", category_id))?;
    Ok(row.as_ref().map(category_from_row))
}

/// Delete a category that no post references.
pub async fn delete_category(pool: &SqlitePool, category_id: i64) -> Result<CategoryDeletion> {
    if get_category(pool, category_id).await?.is_none() {
        return Ok(CategoryDeletion::NotFound);
    }

    let post_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM posts WHERE category_id = ?")
        .bind(category_id)
        .fetch_one(pool)
        .await
        .context("failed to count posts in category")?;
    if post_count > 0 {
        return Ok(CategoryDeletion::InUse(post_count));
    }

    let result = sqlx::query("DELETE FROM categories WHERE id = ?")
        .bind(category_id)
        .execute(pool)
        .await
        .with_context(|| format!("failed to delete category {}", category_id))?;
    if result.rows_affected() == 0 {
        return Ok(CategoryDeletion::NotFound);
    }
    info!(category_id, "storage: deleted category");
    Ok(CategoryDeletion::Deleted)
}

/// Name used to frame the summarization prompt for a post.
pub async fn category_name(pool: &SqlitePool, category_id: i64) -> Result<String> {
    let name = sqlx::query_scalar::<_, String>("SELECT name FROM categories WHERE id = ?")
        .bind(category_id)
        .fetch_optional(pool)
        .await
        .context("failed to fetch category name")?;
    Ok(name.unwrap_or_else(|| FALLBACK_CATEGORY.to_string()))
}

// ---------------------------------------------------------------------------
// Posts
// ---------------------------------------------------------------------------

fn post_from_row(row: &sqlx::sqlite::SqliteRow) -> Post {
    let status: String = row.get("status");
    Post {
        id: row.get("id"),
        title: row.get("title"),
        content: row.get("content"),
        category_id: row.get("category_id"),
        image_url: row.get("image_url"),
        status: PostStatus::parse(&status).unwrap_or_default(),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

pub async fn insert_post(pool: &SqlitePool, post: &NewPost) -> Result<Post> {
    let now = Utc::now();
    let row = sqlx::query(
        r#"
        INSERT INTO posts (title, content, category_id, image_url, status, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        RETURNING *
        "#,
    )
    .bind(&post.title)
    .bind(&post.content)
    .bind(post.category_id)
    .bind(&post.image_url)
    .bind(post.status.as_str())
    .bind(now)
    .bind(now)
    .fetch_one(pool)
    .await
    .context("failed to insert post")?;

    let post = post_from_row(&row);
    debug!(post_id = post.id, "storage: inserted post");
    Ok(post)
}

pub async fn get_post(pool: &SqlitePool, post_id: i64) -> Result<Option<Post>> {
    let row = sqlx::query("SELECT * FROM posts WHERE id = ?")
        .bind(post_id)
        .fetch_optional(pool)
        .await
        .context("failed to fetch post")?;
    Ok(row.as_ref().map(post_from_row))
}

/// Apply a partial update. Returns `None` if the post does not exist.
pub async fn update_post(
    pool: &SqlitePool,
    post_id: i64,
    changes: &PostChanges,
) -> Result<Option<Post>> {
    let row = sqlx::query(
        r#"
        UPDATE posts SET
            title = COALESCE(?, title),
            content = COALESCE(?, content),
            category_id = COALESCE(?, category_id),
            image_url = COALESCE(?, image_url),
            status = COALESCE(?, status),
            updated_at = ?
        WHERE id = ?
        RETURNING *
        "#,
    )
    .bind(&changes.title)
    .bind(&changes.content)
    .bind(changes.category_id)
    .bind(&changes.image_url)
    .bind(changes.status.map(|s| s.as_str()))
    .bind(Utc::now())
    .bind(post_id)
    .fetch_optional(pool)
    .await
    .with_context(|| format!("failed to update post {}", post_id))?;

    Ok(row.as_ref().map(post_from_row))
}

/// Delete a post; its summary row goes with it through the FK cascade.
pub async fn delete_post(pool: &SqlitePool, post_id: i64) -> Result<bool> {
    let result = sqlx::query("DELETE FROM posts WHERE id = ?")
        .bind(post_id)
        .execute(pool)
        .await
        .with_context(|| format!("failed to delete post {}", post_id))?;
    Ok(result.rows_affected() > 0)
}

pub async fn get_post_detail(pool: &SqlitePool, post_id: i64) -> Result<Option<PostDetail>> {
    let Some(post) = get_post(pool, post_id).await? else {
        return Ok(None);
    };
    Ok(Some(attach_relations(pool, post).await?))
}

async fn attach_relations(pool: &SqlitePool, post: Post) -> Result<PostDetail> {
    let category = get_category(pool, post.category_id).await?;
    let summary = get_summary(pool, post.id).await?;
    Ok(PostDetail {
        post,
        category,
        summary,
    })
}

/// Posts newest first with their relations, plus the total matching count.
pub async fn list_posts(pool: &SqlitePool, query: &PostQuery) -> Result<(Vec<PostDetail>, i64)> {
    let search = query
        .search
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| format!("%{}%", s.to_lowercase()));
    let status = query.status.map(|s| s.as_str());

    let filter = r#"
        WHERE (?1 IS NULL OR category_id = ?1)
        AND (?2 IS NULL OR status = ?2)
        AND (?3 IS NULL OR lower(title) LIKE ?3 OR lower(content) LIKE ?3)
    "#;

    let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM posts {}", filter))
        .bind(query.category_id)
        .bind(status)
        .bind(&search)
        .fetch_one(pool)
        .await
        .context("failed to count posts")?;

    let rows = sqlx::query(&format!(
        "SELECT * FROM posts {} ORDER BY created_at DESC, id DESC LIMIT ?4 OFFSET ?5",
        filter
    ))
    .bind(query.category_id)
    .bind(status)
    .bind(&search)
    .bind(query.limit)
    .bind(query.skip)
    .fetch_all(pool)
    .await
    .context("failed to list posts")?;

    let mut posts = Vec::with_capacity(rows.len());
    for row in &rows {
        posts.push(attach_relations(pool, post_from_row(row)).await?);
    }
    Ok((posts, total))
}

// ---------------------------------------------------------------------------
// Summaries
// ---------------------------------------------------------------------------

pub async fn get_summary(pool: &SqlitePool, post_id: i64) -> Result<Option<StoredSummary>> {
    let row = sqlx::query("SELECT * FROM summaries WHERE post_id = ?")
        .bind(post_id)
        .fetch_optional(pool)
        .await
        .context("failed to fetch summary")?;

    let Some(row) = row else {
        return Ok(None);
    };

    let highlights_json: String = row.get("highlights_json");
    let keywords_json: String = row.get("keywords_json");

    Ok(Some(StoredSummary {
        id: row.get("id"),
        post_id: row.get("post_id"),
        record: SummaryRecord {
            summary: row.get("summary"),
            highlights: serde_json::from_str(&highlights_json)
                .context("failed to parse stored highlights")?,
            keywords: serde_json::from_str(&keywords_json)
                .context("failed to parse stored keywords")?,
            model_version: row.get("model_version"),
            confidence_score: row.get("confidence_score"),
            regenerated: row.get("regenerated"),
        },
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }))
}

/// Insert the post's summary, or overwrite the existing row in place
/// (same row id). The UNIQUE(post_id) constraint keeps it to one per post.
pub async fn upsert_summary(
    pool: &SqlitePool,
    post_id: i64,
    record: &SummaryRecord,
) -> Result<StoredSummary> {
    let highlights_json =
        serde_json::to_string(&record.highlights).context("failed to serialize highlights")?;
    let keywords_json =
        serde_json::to_string(&record.keywords).context("failed to serialize keywords")?;
    let now = Utc::now();

    sqlx::query(
        r#"
        INSERT INTO summaries
            (post_id, summary, highlights_json, keywords_json, model_version,
             confidence_score, regenerated, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(post_id) DO UPDATE SET
            summary = excluded.summary,
            highlights_json = excluded.highlights_json,
            keywords_json = excluded.keywords_json,
            model_version = excluded.model_version,
            confidence_score = excluded.confidence_score,
            regenerated = excluded.regenerated,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(post_id)
    .bind(&record.summary)
    .bind(&highlights_json)
    .bind(&keywords_json)
    .bind(&record.model_version)
    .bind(record.confidence_score)
    .bind(record.regenerated)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .with_context(|| format!("failed to store summary for post {}", post_id))?;

    info!(post_id, confidence = record.confidence_score, "Stored summary for post");

    get_summary(pool, post_id)
        .await?
        .with_context(|| format!("summary for post {} missing after upsert", post_id))
}

pub async fn count_summaries_for_post(pool: &SqlitePool, post_id: i64) -> Result<i64> {
    sqlx::query_scalar("SELECT COUNT(*) FROM summaries WHERE post_id = ?")
        .bind(post_id)
        .fetch_one(pool)
        .await
        .context("failed to count summaries")
}
