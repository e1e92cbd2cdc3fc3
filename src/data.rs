use std::sync::Arc;

use anyhow::{Context, Result};

use crate::api;
use crate::giphy;
use crate::model::{Comment, GifPage, NewComment, SortBy, User};

pub trait CommentService: Send + Sync {
    fn load_page(&self, entity_id: &str, page: usize, limit: usize, sort: SortBy)
        -> Result<Vec<Comment>>;
    fn create_comment(&self, comment: NewComment) -> Result<Comment>;
    fn delete_comment(&self, comment_id: &str) -> Result<()>;
}

pub trait UserSearch: Send + Sync {
    fn search_users(&self, query: &str, limit: usize) -> Result<Vec<User>>;
}

pub trait GifProvider: Send + Sync {
    fn trending(&self, offset: usize, limit: usize) -> Result<GifPage>;
    fn search(&self, query: &str, offset: usize, limit: usize) -> Result<GifPage>;
}

pub struct ApiCommentService {
    client: Arc<api::Client>,
}

impl ApiCommentService {
    pub fn new(client: Arc<api::Client>) -> Self {
        Self { client }
    }
}

impl CommentService for ApiCommentService {
    fn load_page(
        &self,
        entity_id: &str,
        page: usize,
        limit: usize,
        sort: SortBy,
    ) -> Result<Vec<Comment>> {
        self.client
            .comments(entity_id, page, limit, sort)
            .context("fetch comments page")
    }

    fn create_comment(&self, comment: NewComment) -> Result<Comment> {
        self.client
            .create_comment(&comment)
            .context("create comment")
    }

    fn delete_comment(&self, comment_id: &str) -> Result<()> {
        self.client
            .delete_comment(comment_id)
            .context("delete comment")
    }
}

pub struct ApiUserSearch {
    client: Arc<api::Client>,
}

impl ApiUserSearch {
    pub fn new(client: Arc<api::Client>) -> Self {
        Self { client }
    }
}

impl UserSearch for ApiUserSearch {
    fn search_users(&self, query: &str, limit: usize) -> Result<Vec<User>> {
        self.client
            .mention_suggestions(query, limit)
            .context("fetch mention suggestions")
    }
}

pub struct GiphyProvider {
    client: Arc<giphy::Client>,
}

impl GiphyProvider {
    pub fn new(client: Arc<giphy::Client>) -> Self {
        Self { client }
    }
}

impl GifProvider for GiphyProvider {
    fn trending(&self, offset: usize, limit: usize) -> Result<GifPage> {
        self.client
            .trending(offset, limit)
            .context("fetch trending gifs")
    }

    fn search(&self, query: &str, offset: usize, limit: usize) -> Result<GifPage> {
        self.client
            .search(query, offset, limit)
            .context("search gifs")
    }
}

/// Offline stand-in returning no data and echoing created comments.
#[derive(Default)]
pub struct MockCommentService;

impl CommentService for MockCommentService {
    fn load_page(
        &self,
        _entity_id: &str,
        _page: usize,
        _limit: usize,
        _sort: SortBy,
    ) -> Result<Vec<Comment>> {
        Ok(Vec::new())
    }

    fn create_comment(&self, comment: NewComment) -> Result<Comment> {
        let created_at = chrono::Utc::now();
        Ok(Comment {
            id: format!("local-{}", created_at.timestamp_nanos_opt().unwrap_or_default()),
            entity_id: comment.entity_id,
            user_id: String::new(),
            user: None,
            content: comment.content,
            gif: comment.gif,
            mentions: comment.mentions,
            parent_id: comment.parent_id,
            created_at,
            deleted_at: None,
        })
    }

    fn delete_comment(&self, _comment_id: &str) -> Result<()> {
        Ok(())
    }
}

#[derive(Default)]
pub struct MockUserSearch;

impl UserSearch for MockUserSearch {
    fn search_users(&self, _query: &str, _limit: usize) -> Result<Vec<User>> {
        Ok(Vec::new())
    }
}

#[derive(Default)]
pub struct MockGifProvider;

impl GifProvider for MockGifProvider {
    fn trending(&self, offset: usize, _limit: usize) -> Result<GifPage> {
        Ok(GifPage {
            items: Vec::new(),
            pagination: crate::model::Pagination {
                total_count: 0,
                count: 0,
                offset,
            },
        })
    }

    fn search(&self, _query: &str, offset: usize, limit: usize) -> Result<GifPage> {
        self.trending(offset, limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_comment_service_echoes_draft() {
        let service = MockCommentService;
        let created = service
            .create_comment(NewComment {
                entity_id: "e1".into(),
                content: "hello".into(),
                mentions: Vec::new(),
                gif: None,
                parent_id: Some("c0".into()),
            })
            .unwrap();
        assert!(created.id.starts_with("local-"));
        assert_eq!(created.content, "hello");
        assert_eq!(created.parent_id.as_deref(), Some("c0"));
        assert!(service.load_page("e1", 1, 10, SortBy::Top).unwrap().is_empty());
    }

    #[test]
    fn mock_gif_provider_reports_empty_pages() {
        let page = MockGifProvider.search("cat", 20, 10).unwrap();
        assert!(page.items.is_empty());
        assert_eq!(page.pagination.offset, 20);
    }
}
