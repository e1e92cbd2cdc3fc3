use std::collections::HashSet;

use crate::model::{Comment, Highlighted};

/// Optimistic entries followed by fetched ones, with ids owned by the
/// highlight filtered out. The caller pins the highlight separately.
pub fn merge(
    fetched: &[Comment],
    optimistic: &[Comment],
    highlighted: Option<&Highlighted>,
) -> Vec<Comment> {
    let mut seen: HashSet<&str> = HashSet::with_capacity(fetched.len() + optimistic.len());
    optimistic
        .iter()
        .chain(fetched.iter())
        .filter(|&comment| !highlighted.is_some_and(|h| h.covers(&comment.id)))
        .filter(|&comment| seen.insert(comment.id.as_str()))
        .cloned()
        .collect()
}

pub fn with_highlight(merged: Vec<Comment>, highlighted: Option<&Highlighted>) -> Vec<Comment> {
    match highlighted {
        Some(h) => {
            let mut out = Vec::with_capacity(merged.len() + 1);
            out.push(h.pinned().clone());
            out.extend(merged);
            out
        }
        None => merged,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedDisplay {
    Skeleton,
    Empty,
    Comments,
}

impl FeedDisplay {
    pub fn derive(loading: bool, merged_len: usize, has_highlight: bool) -> Self {
        if merged_len > 0 || has_highlight {
            FeedDisplay::Comments
        } else if loading {
            FeedDisplay::Skeleton
        } else {
            FeedDisplay::Empty
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct FeedState {
    fetched: Vec<Comment>,
    optimistic: Vec<Comment>,
    highlighted: Option<Highlighted>,
    pub loading: bool,
    pub has_more: bool,
    pub page: usize,
}

impl FeedState {
    pub fn new() -> Self {
        Self {
            has_more: true,
            ..Self::default()
        }
    }

    pub fn fetched(&self) -> &[Comment] {
        &self.fetched
    }

    pub fn optimistic(&self) -> &[Comment] {
        &self.optimistic
    }

    pub fn highlighted(&self) -> Option<&Highlighted> {
        self.highlighted.as_ref()
    }

    pub fn set_highlighted(&mut self, highlighted: Option<Highlighted>) {
        self.highlighted = highlighted;
    }

    pub fn replace_page(&mut self, comments: Vec<Comment>, page: usize) {
        self.fetched = comments;
        self.page = page;
    }

    /// Appends a later page, skipping ids an earlier page already delivered.
    pub fn append_page(&mut self, comments: Vec<Comment>, page: usize) {
        let known: HashSet<String> = self.fetched.iter().map(|c| c.id.clone()).collect();
        self.fetched
            .extend(comments.into_iter().filter(|c| !known.contains(&c.id)));
        self.page = page;
    }

    pub fn push_optimistic(&mut self, comment: Comment) {
        self.optimistic.retain(|existing| existing.id != comment.id);
        self.optimistic.insert(0, comment);
    }

    /// Drops `id` from every source. Returns whether anything was removed.
    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.fetched.len() + self.optimistic.len();
        self.fetched.retain(|c| c.id != id);
        self.optimistic.retain(|c| c.id != id);
        let mut removed = before != self.fetched.len() + self.optimistic.len();
        if self.highlighted.as_ref().is_some_and(|h| h.covers(id)) {
            self.highlighted = None;
            removed = true;
        }
        removed
    }

    pub fn clear(&mut self) {
        self.fetched.clear();
        self.optimistic.clear();
        self.page = 0;
        self.has_more = true;
        self.loading = false;
    }

    pub fn merged(&self) -> Vec<Comment> {
        merge(&self.fetched, &self.optimistic, self.highlighted.as_ref())
    }

    pub fn display_list(&self) -> Vec<Comment> {
        with_highlight(self.merged(), self.highlighted.as_ref())
    }

    pub fn display(&self) -> FeedDisplay {
        FeedDisplay::derive(
            self.loading,
            self.merged().len(),
            self.highlighted.is_some(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn comment(id: &str) -> Comment {
        Comment {
            id: id.into(),
            entity_id: "e1".into(),
            user_id: "u1".into(),
            user: None,
            content: format!("comment {id}"),
            gif: None,
            mentions: Vec::new(),
            parent_id: None,
            created_at: Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap(),
            deleted_at: None,
        }
    }

    fn ids(comments: &[Comment]) -> Vec<&str> {
        comments.iter().map(|c| c.id.as_str()).collect()
    }

    #[test]
    fn optimistic_first_then_fetched_in_order() {
        let fetched = vec![comment("f1"), comment("f2"), comment("f3")];
        let optimistic = vec![comment("o2"), comment("o1")];
        let merged = merge(&fetched, &optimistic, None);
        assert_eq!(ids(&merged), vec!["o2", "o1", "f1", "f2", "f3"]);
    }

    #[test]
    fn empty_inputs_yield_fetched_only() {
        let fetched = vec![comment("f1"), comment("f2")];
        assert_eq!(ids(&merge(&fetched, &[], None)), vec!["f1", "f2"]);
        assert!(merge(&[], &[], None).is_empty());
    }

    #[test]
    fn highlight_and_parent_appear_once() {
        let fetched = vec![comment("f1"), comment("c"), comment("p"), comment("f2")];
        let highlighted = Highlighted {
            comment: comment("c"),
            parent_comment: Some(comment("p")),
        };
        let merged = merge(&fetched, &[], Some(&highlighted));
        assert_eq!(ids(&merged), vec!["f1", "f2"]);
        let shown = with_highlight(merged, Some(&highlighted));
        assert_eq!(ids(&shown), vec!["p", "f1", "f2"]);
    }

    #[test]
    fn highlight_without_parent_is_pinned_itself() {
        let fetched = vec![comment("f1"), comment("c")];
        let optimistic = vec![comment("c")];
        let highlighted = Highlighted {
            comment: comment("c"),
            parent_comment: None,
        };
        let shown = with_highlight(
            merge(&fetched, &optimistic, Some(&highlighted)),
            Some(&highlighted),
        );
        assert_eq!(ids(&shown), vec!["c", "f1"]);
    }

    #[test]
    fn overlapping_sources_never_duplicate() {
        let fetched = vec![comment("a"), comment("b"), comment("c")];
        let optimistic = vec![comment("b")];
        let merged = merge(&fetched, &optimistic, None);
        assert_eq!(ids(&merged), vec!["b", "a", "c"]);
    }

    #[test]
    fn display_states() {
        assert_eq!(FeedDisplay::derive(true, 0, false), FeedDisplay::Skeleton);
        assert_eq!(FeedDisplay::derive(false, 0, false), FeedDisplay::Empty);
        assert_eq!(FeedDisplay::derive(true, 0, true), FeedDisplay::Comments);
        assert_eq!(FeedDisplay::derive(false, 0, true), FeedDisplay::Comments);
        assert_eq!(FeedDisplay::derive(true, 3, false), FeedDisplay::Comments);
    }

    #[test]
    fn state_append_skips_known_ids() {
        let mut state = FeedState::new();
        state.replace_page(vec![comment("a"), comment("b")], 1);
        state.append_page(vec![comment("b"), comment("c")], 2);
        assert_eq!(ids(state.fetched()), vec!["a", "b", "c"]);
        assert_eq!(state.page, 2);
    }

    #[test]
    fn state_remove_clears_matching_highlight() {
        let mut state = FeedState::new();
        state.replace_page(vec![comment("a")], 1);
        state.push_optimistic(comment("o"));
        state.set_highlighted(Some(Highlighted {
            comment: comment("h"),
            parent_comment: None,
        }));
        assert!(state.remove("o"));
        assert!(state.remove("h"));
        assert!(state.highlighted().is_none());
        assert!(!state.remove("missing"));
        assert_eq!(ids(&state.display_list()), vec!["a"]);
    }

    #[test]
    fn push_optimistic_is_newest_first() {
        let mut state = FeedState::new();
        state.push_optimistic(comment("o1"));
        state.push_optimistic(comment("o2"));
        assert_eq!(ids(state.optimistic()), vec!["o2", "o1"]);
        assert_eq!(state.display(), FeedDisplay::Comments);
    }
}
