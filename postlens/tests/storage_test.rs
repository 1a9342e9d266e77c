use postlens::storage::{
    self, CategoryChanges, CategoryDeletion, NewPost, PostChanges, PostQuery, PostStatus,
    DEFAULT_CATEGORIES,
};
use postlens::summary::SummaryRecord;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::str::FromStr;

async fn setup_test_db() -> sqlx::SqlitePool {
    // One connection: every pooled connection to :memory: is a separate database
    let options = SqliteConnectOptions::from_str("sqlite::memory:")
        .unwrap()
        .foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .expect("Failed to create test pool");

    storage::ensure_schema(&pool).await.unwrap();
    pool
}

fn new_post(title: &str, content: &str, category_id: i64) -> NewPost {
    NewPost {
        title: title.to_string(),
        content: content.to_string(),
        category_id,
        image_url: None,
        status: PostStatus::Published,
    }
}

fn record(summary: &str) -> SummaryRecord {
    SummaryRecord {
        summary: summary.to_string(),
        highlights: vec!["first".to_string()],
        keywords: vec!["k".to_string()],
        model_version: "test-model".to_string(),
        confidence_score: 88.0,
        regenerated: false,
    }
}

#[tokio::test]
async fn test_schema_seeds_default_categories_once() {
    let pool = setup_test_db().await;
    // Second run must not duplicate anything
    storage::ensure_schema(&pool).await.unwrap();

    let categories = storage::list_categories(&pool).await.unwrap();
    let names: Vec<&str> = categories.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(categories.len(), DEFAULT_CATEGORIES.len());
    for (name, _) in DEFAULT_CATEGORIES {
        assert!(names.contains(&name), "missing category {}", name);
    }
}

#[tokio::test]
async fn test_create_category_rejects_duplicates() {
    let pool = setup_test_db().await;

    let travel = storage::create_category(&pool, "travel", Some("Trips"))
        .await
        .unwrap();
    assert_eq!(travel.name, "travel");
    assert_eq!(travel.description.as_deref(), Some("Trips"));

    assert!(storage::create_category(&pool, "travel", None).await.is_err());
}

#[tokio::test]
async fn test_category_update_and_guarded_delete() {
    let pool = setup_test_db().await;
    let notes = storage::create_category(&pool, "notes", None).await.unwrap();

    let changes = CategoryChanges {
        description: Some("Loose notes".to_string()),
        ..Default::default()
    };
    let updated = storage::update_category(&pool, notes.id, &changes)
        .await
        .unwrap()
        .expect("category exists");
    assert_eq!(updated.name, "notes");
    assert_eq!(updated.description.as_deref(), Some("Loose notes"));
    assert!(storage::update_category(&pool, 4242, &changes).await.unwrap().is_none());

    let post = storage::insert_post(&pool, &new_post("Memo", "Body", notes.id))
        .await
        .unwrap();
    assert_eq!(
        storage::delete_category(&pool, notes.id).await.unwrap(),
        CategoryDeletion::InUse(1)
    );
    assert!(storage::get_category(&pool, notes.id).await.unwrap().is_some());

    storage::delete_post(&pool, post.id).await.unwrap();
    assert_eq!(
        storage::delete_category(&pool, notes.id).await.unwrap(),
        CategoryDeletion::Deleted
    );
    assert_eq!(
        storage::delete_category(&pool, notes.id).await.unwrap(),
        CategoryDeletion::NotFound
    );
}

#[tokio::test]
async fn test_category_name_falls_back_for_missing_row() {
    let pool = setup_test_db().await;
    let name = storage::category_name(&pool, 9999).await.unwrap();
    assert_eq!(name, storage::FALLBACK_CATEGORY);
}

#[tokio::test]
async fn test_update_post_keeps_untouched_columns() {
    let pool = setup_test_db().await;
    let post = storage::insert_post(&pool, &new_post("Old title", "Body", 1))
        .await
        .unwrap();

    let changes = PostChanges {
        title: Some("New title".to_string()),
        ..Default::default()
    };
    let updated = storage::update_post(&pool, post.id, &changes)
        .await
        .unwrap()
        .expect("post exists");

    assert_eq!(updated.title, "New title");
    assert_eq!(updated.content, "Body");
    assert_eq!(updated.category_id, 1);
    assert_eq!(updated.status, PostStatus::Published);

    let missing = storage::update_post(&pool, 4242, &changes).await.unwrap();
    assert!(missing.is_none());
}

#[tokio::test]
async fn test_upsert_summary_overwrites_in_place() {
    let pool = setup_test_db().await;
    let post = storage::insert_post(&pool, &new_post("Title", "Body", 2))
        .await
        .unwrap();

    let first = storage::upsert_summary(&pool, post.id, &record("first"))
        .await
        .unwrap();
    let mut second_record = record("second");
    second_record.regenerated = true;
    let second = storage::upsert_summary(&pool, post.id, &second_record)
        .await
        .unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(second.record.summary, "second");
    assert!(second.record.regenerated);
    assert_eq!(second.record.highlights, vec!["first"]);
    assert_eq!(storage::count_summaries_for_post(&pool, post.id).await.unwrap(), 1);
}

#[tokio::test]
async fn test_summary_requires_existing_post() {
    let pool = setup_test_db().await;
    assert!(storage::upsert_summary(&pool, 777, &record("orphan")).await.is_err());
}

#[tokio::test]
async fn test_delete_post_cascades_to_summary() {
    let pool = setup_test_db().await;
    let post = storage::insert_post(&pool, &new_post("Title", "Body", 3))
        .await
        .unwrap();
    storage::upsert_summary(&pool, post.id, &record("gone soon"))
        .await
        .unwrap();

    assert!(storage::delete_post(&pool, post.id).await.unwrap());
    assert_eq!(storage::count_summaries_for_post(&pool, post.id).await.unwrap(), 0);
    assert!(storage::get_post_detail(&pool, post.id).await.unwrap().is_none());

    // Deleting again reports nothing removed
    assert!(!storage::delete_post(&pool, post.id).await.unwrap());
}

#[tokio::test]
async fn test_list_posts_filters_and_pages() {
    let pool = setup_test_db().await;
    storage::insert_post(&pool, &new_post("Reading Dune", "Spice and sand", 1))
        .await
        .unwrap();
    storage::insert_post(&pool, &new_post("Linear algebra", "Eigenvalues explained", 2))
        .await
        .unwrap();
    let mut draft = new_post("Grocery list", "Milk, bread and SPICE", 3);
    draft.status = PostStatus::Draft;
    storage::insert_post(&pool, &draft).await.unwrap();

    let all = PostQuery {
        skip: 0,
        limit: 20,
        ..Default::default()
    };
    let (posts, total) = storage::list_posts(&pool, &all).await.unwrap();
    assert_eq!(total, 3);
    // Newest first
    assert_eq!(posts[0].post.title, "Grocery list");
    assert_eq!(posts[0].category.as_ref().map(|c| c.name.as_str()), Some("daily"));

    let search = PostQuery {
        search: Some("spice".to_string()),
        ..all.clone()
    };
    let (posts, total) = storage::list_posts(&pool, &search).await.unwrap();
    assert_eq!(total, 2);
    assert_eq!(posts.len(), 2);

    let published = PostQuery {
        search: Some("spice".to_string()),
        status: Some(PostStatus::Published),
        ..all.clone()
    };
    let (posts, total) = storage::list_posts(&pool, &published).await.unwrap();
    assert_eq!(total, 1);
    assert_eq!(posts[0].post.title, "Reading Dune");

    let study = PostQuery {
        category_id: Some(2),
        ..all.clone()
    };
    let (posts, _) = storage::list_posts(&pool, &study).await.unwrap();
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].post.title, "Linear algebra");

    let page = PostQuery {
        skip: 1,
        limit: 1,
        ..Default::default()
    };
    let (posts, total) = storage::list_posts(&pool, &page).await.unwrap();
    assert_eq!(total, 3);
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].post.title, "Linear algebra");
}
