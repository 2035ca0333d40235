//! Integration tests for the output repository against an in-memory database.
//!
//! Covers:
//! - Progress and seed writes return the updated row
//! - The startup purge removes unfinished rows and keeps finished ones
//! - Project scoping of output lookups

use varnava_db::models::output::CreateOutput;
use varnava_db::models::project::CreateProject;
use varnava_db::models::prompt::CreatePrompt;
use varnava_db::repositories::{OutputRepo, ProjectRepo, PromptRepo};
use varnava_db::DbPool;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn setup() -> DbPool {
    let pool = varnava_db::create_memory_pool().await.unwrap();
    varnava_db::run_migrations(&pool).await.unwrap();
    pool
}

async fn seed_prompt(pool: &DbPool) -> (uuid::Uuid, uuid::Uuid) {
    let project = ProjectRepo::create(
        pool,
        &CreateProject {
            title: "Test project".to_string(),
        },
    )
    .await
    .unwrap();
    let prompt = PromptRepo::create(
        pool,
        &CreatePrompt {
            project_id: project.id,
            value: "a lighthouse at dusk".to_string(),
        },
    )
    .await
    .unwrap();
    (project.id, prompt.id)
}

fn new_output(prompt_id: uuid::Uuid) -> CreateOutput {
    let id = uuid::Uuid::new_v4();
    CreateOutput {
        id,
        prompt_id,
        parent_id: None,
        seed: -1,
        kind: "preview".to_string(),
        settings: serde_json::json!({ "type": "preview", "batch": 1 }),
        url: format!("{prompt_id}/{id}.jpg"),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn created_output_starts_at_zero_progress() {
    let pool = setup().await;
    let (_, prompt_id) = seed_prompt(&pool).await;

    let output = OutputRepo::create(&pool, &new_output(prompt_id)).await.unwrap();

    assert_eq!(output.progress, 0.0);
    assert_eq!(output.seed, -1);
    assert_eq!(output.settings.0["type"], "preview");
    assert!(!output.is_complete());
}

#[tokio::test]
async fn update_progress_writes_seed_and_progress() {
    let pool = setup().await;
    let (_, prompt_id) = seed_prompt(&pool).await;
    let output = OutputRepo::create(&pool, &new_output(prompt_id)).await.unwrap();

    let updated = OutputRepo::update_progress(&pool, output.id, 0.4, 1234)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.progress, 0.4);
    assert_eq!(updated.seed, 1234);

    let missing = OutputRepo::update_progress(&pool, uuid::Uuid::new_v4(), 0.5, 1)
        .await
        .unwrap();
    assert!(missing.is_none());
}

#[tokio::test]
async fn delete_unfinished_purges_only_incomplete_rows() {
    let pool = setup().await;
    let (_, prompt_id) = seed_prompt(&pool).await;

    let abandoned = OutputRepo::create(&pool, &new_output(prompt_id)).await.unwrap();
    OutputRepo::update_progress(&pool, abandoned.id, 0.4, 7).await.unwrap();
    let finished = OutputRepo::create(&pool, &new_output(prompt_id)).await.unwrap();
    OutputRepo::update_progress(&pool, finished.id, 1.0, 7).await.unwrap();

    let removed = OutputRepo::delete_unfinished(&pool).await.unwrap();

    assert_eq!(removed, 1);
    assert!(OutputRepo::find_by_id(&pool, abandoned.id).await.unwrap().is_none());
    assert!(OutputRepo::find_by_id(&pool, finished.id).await.unwrap().is_some());
}

#[tokio::test]
async fn find_in_project_respects_ownership() {
    let pool = setup().await;
    let (project_id, prompt_id) = seed_prompt(&pool).await;
    let (other_project, _) = seed_prompt(&pool).await;
    let output = OutputRepo::create(&pool, &new_output(prompt_id)).await.unwrap();

    let found = OutputRepo::find_in_project(&pool, project_id, output.id)
        .await
        .unwrap();
    assert_eq!(found.map(|o| o.id), Some(output.id));

    let foreign = OutputRepo::find_in_project(&pool, other_project, output.id)
        .await
        .unwrap();
    assert!(foreign.is_none());
}

#[tokio::test]
async fn list_by_prompt_returns_every_row() {
    let pool = setup().await;
    let (_, prompt_id) = seed_prompt(&pool).await;
    for _ in 0..3 {
        OutputRepo::create(&pool, &new_output(prompt_id)).await.unwrap();
    }

    let outputs = OutputRepo::list_by_prompt(&pool, prompt_id).await.unwrap();
    assert_eq!(outputs.len(), 3);
    assert!(outputs.iter().all(|o| o.prompt_id == prompt_id));
}
