//! Thread index.
//!
//! Threads are derived from parent links, never stored. A thread is a root
//! post plus every post whose parent chain leads back to it.

use std::cmp::Reverse;
use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};

use super::unread::AnnotatedPost;
use super::Post;

/// One thread as seen by a viewer.
#[derive(Debug, Clone)]
pub struct ThreadSummary {
    /// The thread's root post.
    pub root: Post,
    /// Number of posts in the thread, root included.
    pub post_count: usize,
    /// Display name of whoever posted last.
    pub last_poster: String,
    /// Creation time of the most recent post.
    pub last_activity: DateTime<Utc>,
    /// True if the root or any reply is unread.
    pub unread: bool,
}

impl ThreadSummary {
    /// Number of replies.
    pub fn reply_count(&self) -> usize {
        self.post_count - 1
    }
}

/// Parent links of every stored post on a board, expired ones included.
///
/// Thread membership is decided over these links, so a reply still counts
/// toward its root when a post between them has expired.
#[derive(Debug, Clone, Default)]
pub struct ThreadLinks {
    parents: HashMap<i64, Option<i64>>,
}

impl ThreadLinks {
    /// Collect the parent links of a set of posts.
    pub fn new<'p>(posts: impl IntoIterator<Item = &'p Post>) -> Self {
        Self {
            parents: posts.into_iter().map(|p| (p.id, p.parent_id)).collect(),
        }
    }

    /// Topmost ancestor of `post_id`, `post_id` included, that is in
    /// `active`. None if `post_id` itself is not active.
    fn top_active(&self, post_id: i64, active: &HashSet<i64>) -> Option<i64> {
        if !active.contains(&post_id) {
            return None;
        }
        let mut top = post_id;
        let mut current = post_id;
        let mut steps = 0;
        while let Some(Some(next)) = self.parents.get(&current) {
            if steps >= self.parents.len() {
                break;
            }
            current = *next;
            steps += 1;
            if active.contains(&current) {
                top = current;
            }
        }
        Some(top)
    }
}

fn active_ids(posts: &[AnnotatedPost]) -> HashSet<i64> {
    posts.iter().map(|a| a.post.id).collect()
}

/// Find the post a thread view for `post_id` starts from.
///
/// This is the thread root when it is active, otherwise the highest active
/// ancestor. Returns None if `post_id` itself is not in the active set.
pub fn root_of(post_id: i64, posts: &[AnnotatedPost], links: &ThreadLinks) -> Option<i64> {
    links.top_active(post_id, &active_ids(posts))
}

/// Group an active, annotated post set into threads.
///
/// Only posts with no parent start a thread. Sorted pinned first, then by
/// most recent activity, newest first.
pub fn threads(posts: &[AnnotatedPost], links: &ThreadLinks) -> Vec<ThreadSummary> {
    let active = active_ids(posts);

    let mut members: HashMap<i64, Vec<&AnnotatedPost>> = HashMap::new();
    for annotated in posts {
        if let Some(root) = links.top_active(annotated.post.id, &active) {
            members.entry(root).or_default().push(annotated);
        }
    }

    let mut summaries: Vec<ThreadSummary> = posts
        .iter()
        .filter(|a| a.post.is_root())
        .map(|root| {
            let thread = members.get(&root.post.id).map(Vec::as_slice).unwrap_or(&[]);
            let last = thread
                .iter()
                .max_by_key(|a| a.post.chrono_key())
                .map(|a| &a.post)
                .unwrap_or(&root.post);

            ThreadSummary {
                root: root.post.clone(),
                post_count: thread.len().max(1),
                last_poster: last.author.name.clone(),
                last_activity: last.created_at,
                unread: root.unread || thread.iter().any(|a| a.unread),
            }
        })
        .collect();

    summaries.sort_by_key(|t| (!t.root.pinned, Reverse((t.last_activity, t.root.id))));
    summaries
}

/// Active replies under a root, ascending by creation time.
pub fn replies_of(root_id: i64, posts: &[AnnotatedPost], links: &ThreadLinks) -> Vec<AnnotatedPost> {
    let active = active_ids(posts);

    let mut replies: Vec<AnnotatedPost> = posts
        .iter()
        .filter(|a| a.post.id != root_id && links.top_active(a.post.id, &active) == Some(root_id))
        .cloned()
        .collect();
    replies.sort_by_key(|a| a.post.chrono_key());
    replies
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use chrono::Duration;

    use super::*;
    use crate::board::Author;

    fn post(id: i64, parent: Option<i64>, minutes: i64, unread: bool) -> AnnotatedPost {
        let base = DateTime::parse_from_rfc3339("2024-05-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        AnnotatedPost {
            post: Post {
                id,
                board_id: 1,
                parent_id: parent,
                author: Author::named(format!("user{id}")),
                subject: format!("subject {id}"),
                text: "text".to_string(),
                created_at: base + Duration::minutes(minutes),
                pinned: false,
                readers: BTreeSet::new(),
            },
            unread,
        }
    }

    fn links(posts: &[AnnotatedPost]) -> ThreadLinks {
        ThreadLinks::new(posts.iter().map(|a| &a.post))
    }

    #[test]
    fn test_threads_empty() {
        assert!(threads(&[], &ThreadLinks::default()).is_empty());
    }

    #[test]
    fn test_thread_without_replies() {
        let posts = vec![post(1, None, 0, false)];
        let summary = &threads(&posts, &links(&posts))[0];

        assert_eq!(summary.post_count, 1);
        assert_eq!(summary.reply_count(), 0);
        assert_eq!(summary.last_poster, "user1");
        assert_eq!(summary.last_activity, posts[0].post.created_at);
        assert!(!summary.unread);
    }

    #[test]
    fn test_thread_aggregates() {
        let posts = vec![
            post(1, None, 0, false),
            post(2, Some(1), 10, false),
            post(3, Some(1), 5, true),
        ];
        let summary = &threads(&posts, &links(&posts))[0];

        assert_eq!(summary.post_count, 3);
        assert_eq!(summary.last_poster, "user2");
        assert_eq!(summary.last_activity, posts[1].post.created_at);
        assert!(summary.unread);
    }

    #[test]
    fn test_nested_replies_count_toward_root() {
        let posts = vec![
            post(1, None, 0, false),
            post(2, Some(1), 1, false),
            post(3, Some(2), 2, false),
        ];
        let result = threads(&posts, &links(&posts));

        assert_eq!(result.len(), 1);
        assert_eq!(result[0].post_count, 3);
        assert_eq!(result[0].last_poster, "user3");
    }

    #[test]
    fn test_threads_sorted_by_activity_pinned_first() {
        let mut pinned = post(1, None, 0, false);
        pinned.post.pinned = true;
        let posts = vec![
            pinned,
            post(2, None, 10, false),
            post(3, None, 20, false),
            post(4, Some(2), 30, false),
        ];
        let order: Vec<i64> = threads(&posts, &links(&posts)).iter().map(|t| t.root.id).collect();

        assert_eq!(order, vec![1, 2, 3]);
    }

    #[test]
    fn test_replies_of_ascending() {
        let posts = vec![
            post(1, None, 0, false),
            post(2, Some(1), 20, false),
            post(3, Some(1), 10, false),
            post(4, None, 5, false),
        ];
        let ids: Vec<i64> = replies_of(1, &posts, &links(&posts)).iter().map(|a| a.post.id).collect();

        assert_eq!(ids, vec![3, 2]);
        assert!(replies_of(4, &posts, &links(&posts)).is_empty());
    }

    #[test]
    fn test_root_of() {
        let posts = vec![
            post(1, None, 0, false),
            post(2, Some(1), 1, false),
            post(3, Some(2), 2, false),
            post(5, Some(99), 3, false),
        ];

        assert_eq!(root_of(3, &posts, &links(&posts)), Some(1));
        assert_eq!(root_of(1, &posts, &links(&posts)), Some(1));
        assert_eq!(root_of(5, &posts, &links(&posts)), Some(5));
        assert_eq!(root_of(42, &posts, &links(&posts)), None);
    }

    #[test]
    fn test_reply_under_expired_middle_counts_toward_root() {
        let stored = vec![
            post(1, None, 0, false),
            post(2, Some(1), 1, false),
            post(3, Some(2), 2, true),
        ];
        let stored_links = links(&stored);
        let active = vec![stored[0].clone(), stored[2].clone()];

        let result = threads(&active, &stored_links);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].post_count, 2);
        assert_eq!(result[0].last_poster, "user3");
        assert!(result[0].unread);

        let ids: Vec<i64> = replies_of(1, &active, &stored_links).iter().map(|a| a.post.id).collect();
        assert_eq!(ids, vec![3]);
        assert_eq!(root_of(3, &active, &stored_links), Some(1));
    }

    #[test]
    fn test_reply_under_expired_root_has_no_thread() {
        let stored = vec![post(1, None, 0, false), post(2, Some(1), 1, true)];
        let stored_links = links(&stored);
        let active = vec![stored[1].clone()];

        assert!(threads(&active, &stored_links).is_empty());
        assert_eq!(root_of(2, &active, &stored_links), Some(2));
        assert_eq!(root_of(1, &active, &stored_links), None);
    }
}
