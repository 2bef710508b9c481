//! Retention filtering.
//!
//! Expiry is computed lazily at read time: nothing is ever deleted because
//! it expired, it just stops being part of the active set.

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use super::{Board, Post};

/// Order of an active post listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PostOrder {
    /// Ascending by creation time.
    Chronological,
    /// Pinned posts first, each group ascending by creation time.
    #[default]
    PinnedFirst,
}

/// Compute the active subset of a board's posts at `now`.
///
/// 1. With `max_age_days`, unpinned posts older than the cutoff are dropped.
/// 2. With `max_posts`, every pinned post is kept plus the most recent
///    unpinned posts that fit in the remaining room. If pinned posts alone
///    reach the limit, only they survive.
/// 3. The result is sorted per `order`; ties on creation time fall back to ID.
pub fn active_posts(
    board: &Board,
    mut posts: Vec<Post>,
    now: DateTime<Utc>,
    order: PostOrder,
) -> Vec<Post> {
    let cutoff = board
        .max_age_days
        .and_then(Duration::try_days)
        .and_then(|age| now.checked_sub_signed(age));
    if let Some(cutoff) = cutoff {
        posts.retain(|p| p.pinned || p.created_at >= cutoff);
    }

    if let Some(limit) = board.max_posts {
        let limit = usize::try_from(limit).unwrap_or(0);
        if posts.len() > limit {
            let (pinned, mut normal): (Vec<Post>, Vec<Post>) =
                posts.into_iter().partition(|p| p.pinned);
            let room = limit.saturating_sub(pinned.len());

            debug!(
                board = %board.name,
                limit,
                pinned = pinned.len(),
                dropped = normal.len().saturating_sub(room),
                "applying post count limit"
            );

            normal.sort_by_key(|p| std::cmp::Reverse(p.chrono_key()));
            normal.truncate(room);
            posts = pinned;
            posts.extend(normal);
        }
    }

    posts.sort_by_key(Post::chrono_key);
    if order == PostOrder::PinnedFirst {
        posts.sort_by_key(|p| !p.pinned);
    }
    posts
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::auth::LockSet;
    use crate::board::Author;

    fn board(max_posts: Option<i64>, max_age_days: Option<i64>) -> Board {
        Board {
            id: 1,
            name: "General".to_string(),
            max_posts,
            max_age_days,
            locks: LockSet::new(),
            subscribers: BTreeSet::new(),
        }
    }

    fn post(id: i64, days_ago: i64, pinned: bool, now: DateTime<Utc>) -> Post {
        Post {
            id,
            board_id: 1,
            parent_id: None,
            author: Author::named("Alice"),
            subject: format!("post {id}"),
            text: "text".to_string(),
            created_at: now - Duration::days(days_ago),
            pinned,
            readers: BTreeSet::new(),
        }
    }

    fn ids(posts: &[Post]) -> Vec<i64> {
        posts.iter().map(|p| p.id).collect()
    }

    #[test]
    fn test_empty_board() {
        let now = Utc::now();
        let result = active_posts(&board(Some(5), Some(7)), vec![], now, PostOrder::PinnedFirst);
        assert!(result.is_empty());
    }

    #[test]
    fn test_no_limits_keeps_everything() {
        let now = Utc::now();
        let posts = vec![post(2, 1, false, now), post(1, 400, false, now)];
        let result = active_posts(&board(None, None), posts, now, PostOrder::Chronological);
        assert_eq!(ids(&result), vec![1, 2]);
    }

    #[test]
    fn test_max_age_keeps_pinned() {
        let now = Utc::now();
        let posts = vec![
            post(1, 30, true, now),
            post(2, 30, false, now),
            post(3, 1, false, now),
        ];
        let result = active_posts(&board(None, Some(7)), posts, now, PostOrder::Chronological);
        assert_eq!(ids(&result), vec![1, 3]);
    }

    #[test]
    fn test_max_posts_keeps_most_recent() {
        let now = Utc::now();
        let posts = (1..=6).map(|i| post(i, 10 - i, false, now)).collect();
        let result = active_posts(&board(Some(3), None), posts, now, PostOrder::Chronological);
        assert_eq!(ids(&result), vec![4, 5, 6]);
    }

    #[test]
    fn test_max_posts_counts_pinned() {
        let now = Utc::now();
        let posts = vec![
            post(1, 9, true, now),
            post(2, 8, false, now),
            post(3, 7, false, now),
            post(4, 6, false, now),
        ];
        let result = active_posts(&board(Some(3), None), posts, now, PostOrder::Chronological);
        assert_eq!(ids(&result), vec![1, 3, 4]);
    }

    #[test]
    fn test_max_posts_at_or_below_pinned_count() {
        let now = Utc::now();
        let mut posts: Vec<Post> = (1..=5).map(|i| post(i, 20 - i, true, now)).collect();
        posts.extend((6..=8).map(|i| post(i, 20 - i, false, now)));

        let result = active_posts(&board(Some(5), None), posts, now, PostOrder::Chronological);
        assert_eq!(ids(&result), vec![1, 2, 3, 4, 5]);
        assert!(result.iter().all(|p| p.pinned));
    }

    #[test]
    fn test_pinned_exceeding_limit_all_survive() {
        let now = Utc::now();
        let posts = vec![
            post(1, 3, true, now),
            post(2, 2, true, now),
            post(3, 1, false, now),
        ];
        let result = active_posts(&board(Some(1), None), posts, now, PostOrder::Chronological);
        assert_eq!(ids(&result), vec![1, 2]);
    }

    #[test]
    fn test_age_applies_before_count() {
        let now = Utc::now();
        let posts = vec![
            post(1, 40, false, now),
            post(2, 3, false, now),
            post(3, 2, false, now),
        ];
        let result = active_posts(&board(Some(2), Some(7)), posts, now, PostOrder::Chronological);
        assert_eq!(ids(&result), vec![2, 3]);
    }

    #[test]
    fn test_pinned_first_order() {
        let now = Utc::now();
        let posts = vec![
            post(1, 5, false, now),
            post(2, 4, true, now),
            post(3, 3, false, now),
            post(4, 6, true, now),
        ];
        let result = active_posts(&board(None, None), posts, now, PostOrder::PinnedFirst);
        assert_eq!(ids(&result), vec![4, 2, 1, 3]);
    }

    #[test]
    fn test_same_timestamp_orders_by_id() {
        let now = Utc::now();
        let posts = vec![post(3, 1, false, now), post(2, 1, false, now)];
        let result = active_posts(&board(None, None), posts, now, PostOrder::Chronological);
        assert_eq!(ids(&result), vec![2, 3]);
    }
}
