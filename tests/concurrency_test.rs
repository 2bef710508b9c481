//! Concurrency tests.
//!
//! These tests verify that concurrent writes to one board stay consistent:
//! post IDs stay unique, and deletes never leave replies pointing at a
//! removed post.

mod common;

use std::collections::HashSet;
use std::sync::Arc;

use bbs_forum::board::{BoardService, NewBoard, PostDraft, PostRepository};
use bbs_forum::Database;

use common::{create_board, create_post, member};

/// Setup a shared in-memory test database.
async fn setup_test_db() -> Arc<Database> {
    Arc::new(Database::open_in_memory().await.unwrap())
}

/// Setup a shared on-disk test database with several pooled connections.
async fn setup_file_db(dir: &tempfile::TempDir) -> Arc<Database> {
    Arc::new(
        Database::open_with_pool_size(dir.path().join("forum.db"), 4)
            .await
            .unwrap(),
    )
}

async fn run_concurrent_posts(db: Arc<Database>) {
    let board = create_board(&db, NewBoard::new("Busy")).await;

    const NUM_POSTS: usize = 20;

    let mut handles = Vec::new();
    for i in 0..NUM_POSTS {
        let db_clone = Arc::clone(&db);
        let board_id = board.id;
        let handle = tokio::spawn(async move {
            let service = BoardService::new(&db_clone);
            let draft = PostDraft::new(format!("Post {i}"), "content", "Poster");
            service.create_post(&member(100 + i as i64), board_id, &draft).await
        });
        handles.push(handle);
    }

    let mut ids = HashSet::new();
    for handle in handles {
        let posted = handle.await.unwrap().unwrap();
        assert!(ids.insert(posted.post.id), "post IDs must be unique");
    }

    assert_eq!(ids.len(), NUM_POSTS);
    let posts = PostRepository::new(db.pool())
        .list_by_board(board.id)
        .await
        .unwrap();
    assert_eq!(posts.len(), NUM_POSTS);
}

/// Test concurrent post creation on one board.
#[tokio::test]
async fn test_concurrent_post_creation() {
    run_concurrent_posts(setup_test_db().await).await;
}

/// Test concurrent post creation against a pooled on-disk database.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_post_creation_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let db = setup_file_db(&dir).await;
    run_concurrent_posts(Arc::clone(&db)).await;
    db.close().await;
}

/// Test replies racing with deletion of their chain.
///
/// A chain root <- a <- b <- c is built, then every middle post is deleted
/// concurrently while new replies are posted. Whatever the interleaving,
/// every surviving post must point at an existing post or at nothing.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_delete_and_reply() {
    let dir = tempfile::tempdir().unwrap();
    let db = setup_file_db(&dir).await;
    let board = create_board(&db, NewBoard::new("Chain")).await;
    let author = member(7);

    let root = create_post(&db, &author, board.id, "Root", "start", "Seven").await;
    let repo = PostRepository::new(db.pool());
    let mut chain = vec![root.id];
    for label in ["a", "b", "c"] {
        let parent = *chain.last().unwrap();
        let post = repo
            .create(
                &bbs_forum::NewPost::new(board.id, label, "link", bbs_forum::board::Author::named("Seven"))
                    .with_parent(parent),
            )
            .await
            .unwrap();
        chain.push(post.id);
    }

    let mut handles = Vec::new();
    for &post_id in &chain[1..3] {
        let db_clone = Arc::clone(&db);
        handles.push(tokio::spawn(async move {
            let service = BoardService::new(&db_clone);
            service.delete_post(&member(7), post_id).await.map(|_| ())
        }));
    }
    for i in 0..5 {
        let db_clone = Arc::clone(&db);
        let target = chain[3];
        handles.push(tokio::spawn(async move {
            let service = BoardService::new(&db_clone);
            service
                .reply(&member(20 + i), target, "racing reply", "Racer")
                .await
                .map(|_| ())
        }));
    }

    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let posts = repo.list_by_board(board.id).await.unwrap();
    let ids: HashSet<i64> = posts.iter().map(|p| p.id).collect();
    for post in &posts {
        if let Some(parent) = post.parent_id {
            assert!(ids.contains(&parent), "post {} has a dangling parent", post.id);
        }
    }

    // Deleted middles are gone; c now hangs from the root.
    assert!(!ids.contains(&chain[1]));
    assert!(!ids.contains(&chain[2]));
    let c = posts.iter().find(|p| p.id == chain[3]).unwrap();
    assert_eq!(c.parent_id, Some(root.id));

    // Racing replies attach to the thread root.
    let racers: Vec<_> = posts.iter().filter(|p| p.text == "racing reply").collect();
    assert_eq!(racers.len(), 5);
    assert!(racers.iter().all(|p| p.parent_id == Some(root.id)));

    db.close().await;
}

/// Test concurrent deletion of the same post.
///
/// Exactly one delete succeeds; the others see the post as gone.
#[tokio::test]
async fn test_concurrent_delete_same_post() {
    let db = setup_test_db().await;
    let board = create_board(&db, NewBoard::new("General")).await;
    let post = create_post(&db, &member(7), board.id, "Doomed", "bye", "Seven").await;

    let mut handles = Vec::new();
    for _ in 0..4 {
        let db_clone = Arc::clone(&db);
        let post_id = post.id;
        handles.push(tokio::spawn(async move {
            BoardService::new(&db_clone)
                .delete_post(&member(7), post_id)
                .await
        }));
    }

    let mut deleted = 0;
    for handle in handles {
        if handle.await.unwrap().is_ok() {
            deleted += 1;
        }
    }
    assert_eq!(deleted, 1);
}
