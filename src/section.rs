use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Result;
use crossbeam_channel::{unbounded, Receiver, Sender};

use crate::callbacks::Callbacks;
use crate::composer::Draft;
use crate::config::{ComposerConfig, FeedConfig};
use crate::data::CommentService;
use crate::feed::FeedState;
use crate::model::{Comment, Highlighted, NewComment, SortBy, User};
use crate::task::Spawner;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum LoadMode {
    Replace,
    Append,
}

struct PendingPage {
    request_id: u64,
    cancel_flag: Arc<AtomicBool>,
    mode: LoadMode,
}

enum SectionResponse {
    Page {
        request_id: u64,
        page: usize,
        result: Result<Vec<Comment>>,
    },
    Created {
        draft: Draft,
        result: Result<Comment>,
    },
    Deleted {
        comment_id: String,
        result: Result<()>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum SectionEvent {
    PageLoaded { page: usize, count: usize },
    CommentCreated(Comment),
    /// The create call failed; hand the draft back to the composer.
    DraftRestored { draft: Draft, error: String },
    CommentDeleted(String),
    Failed(String),
}

pub struct CommentSection {
    entity_id: String,
    service: Arc<dyn CommentService>,
    spawner: Arc<dyn Spawner>,
    callbacks: Arc<Callbacks>,
    user: Option<User>,
    sort: SortBy,
    page_size: usize,
    min_comment_length: usize,
    feed: FeedState,
    next_request_id: u64,
    pending_page: Option<PendingPage>,
    response_tx: Sender<SectionResponse>,
    response_rx: Receiver<SectionResponse>,
}

impl CommentSection {
    pub fn new(
        entity_id: impl Into<String>,
        service: Arc<dyn CommentService>,
        spawner: Arc<dyn Spawner>,
        callbacks: Arc<Callbacks>,
        feed: &FeedConfig,
        composer: &ComposerConfig,
    ) -> Self {
        let (response_tx, response_rx) = unbounded();
        Self {
            entity_id: entity_id.into(),
            service,
            spawner,
            callbacks,
            user: None,
            sort: feed.default_sort,
            page_size: feed.page_size.max(1),
            min_comment_length: composer.min_comment_length,
            feed: FeedState::new(),
            next_request_id: 1,
            pending_page: None,
            response_tx,
            response_rx,
        }
    }

    pub fn entity_id(&self) -> &str {
        &self.entity_id
    }

    pub fn feed(&self) -> &FeedState {
        &self.feed
    }

    pub fn sort(&self) -> SortBy {
        self.sort
    }

    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    pub fn set_user(&mut self, user: Option<User>) {
        self.user = user;
    }

    pub fn set_highlighted(&mut self, highlighted: Option<Highlighted>) {
        self.feed.set_highlighted(highlighted);
    }

    pub fn display_list(&self) -> Vec<Comment> {
        self.feed.display_list()
    }

    /// Fetches page 1. The current comments stay visible until it lands.
    pub fn reload(&mut self) {
        self.request_page(1, LoadMode::Replace);
    }

    pub fn load_more(&mut self) -> bool {
        if self.pending_page.is_some() || !self.feed.has_more {
            return false;
        }
        let page = self.feed.page + 1;
        self.request_page(page, LoadMode::Append);
        true
    }

    pub fn set_sort(&mut self, sort: SortBy) {
        if sort == self.sort {
            return;
        }
        self.sort = sort;
        self.feed.replace_page(Vec::new(), 0);
        self.feed.has_more = true;
        self.reload();
    }

    fn request_page(&mut self, page: usize, mode: LoadMode) {
        if let Some(pending) = self.pending_page.take() {
            pending.cancel_flag.store(true, Ordering::SeqCst);
        }
        let request_id = self.next_request_id;
        self.next_request_id = self.next_request_id.wrapping_add(1);
        let cancel_flag = Arc::new(AtomicBool::new(false));
        self.pending_page = Some(PendingPage {
            request_id,
            cancel_flag: cancel_flag.clone(),
            mode,
        });
        self.feed.loading = true;
        log::debug!(
            "section {}: loading page {page} ({})",
            self.entity_id,
            self.sort.as_str()
        );

        let tx = self.response_tx.clone();
        let service = self.service.clone();
        let entity_id = self.entity_id.clone();
        let limit = self.page_size;
        let sort = self.sort;
        self.spawner.spawn(Box::new(move || {
            if cancel_flag.load(Ordering::SeqCst) {
                return;
            }
            let result = service.load_page(&entity_id, page, limit, sort);
            if cancel_flag.load(Ordering::SeqCst) {
                return;
            }
            let _ = tx.send(SectionResponse::Page {
                request_id,
                page,
                result,
            });
        }));
    }

    /// Validates and sends `draft`. When a precondition fails the matching
    /// callback fires and the draft comes back in `Err`.
    pub fn submit(&mut self, draft: Draft) -> Result<(), Draft> {
        self.submit_inner(draft, None)
    }

    pub fn reply(&mut self, parent_id: impl Into<String>, draft: Draft) -> Result<(), Draft> {
        self.submit_inner(draft, Some(parent_id.into()))
    }

    fn submit_inner(&mut self, draft: Draft, parent_id: Option<String>) -> Result<(), Draft> {
        let Some(user) = &self.user else {
            self.callbacks.login_required();
            return Err(draft);
        };
        if user
            .username
            .as_deref()
            .map_or(true, |name| name.trim().is_empty())
        {
            self.callbacks.username_required();
            return Err(draft);
        }
        if draft.gif.is_none() && draft.content.trim().chars().count() < self.min_comment_length {
            self.callbacks.comment_too_short();
            return Err(draft);
        }

        let comment = NewComment {
            entity_id: self.entity_id.clone(),
            content: draft.content.trim().to_string(),
            mentions: draft.mentions.clone(),
            gif: draft.gif.clone(),
            parent_id,
        };
        let tx = self.response_tx.clone();
        let service = self.service.clone();
        self.spawner.spawn(Box::new(move || {
            let result = service.create_comment(comment);
            let _ = tx.send(SectionResponse::Created { draft, result });
        }));
        Ok(())
    }

    pub fn delete(&mut self, comment_id: impl Into<String>) {
        let comment_id = comment_id.into();
        let tx = self.response_tx.clone();
        let service = self.service.clone();
        self.spawner.spawn(Box::new(move || {
            let result = service.delete_comment(&comment_id);
            let _ = tx.send(SectionResponse::Deleted { comment_id, result });
        }));
    }

    pub fn poll(&mut self) -> Vec<SectionEvent> {
        let mut events = Vec::new();
        while let Ok(message) = self.response_rx.try_recv() {
            if let Some(event) = self.handle_response(message) {
                events.push(event);
            }
        }
        events
    }

    fn handle_response(&mut self, message: SectionResponse) -> Option<SectionEvent> {
        match message {
            SectionResponse::Page {
                request_id,
                page,
                result,
            } => {
                let pending = self.pending_page.as_ref()?;
                if pending.request_id != request_id || pending.cancel_flag.load(Ordering::SeqCst) {
                    log::debug!("section {}: dropping superseded page {page}", self.entity_id);
                    return None;
                }
                let mode = pending.mode;
                self.pending_page = None;
                self.feed.loading = false;

                match result {
                    Ok(comments) => {
                        let count = comments.len();
                        self.feed.has_more = count >= self.page_size;
                        match mode {
                            LoadMode::Replace => self.feed.replace_page(comments, page),
                            LoadMode::Append => self.feed.append_page(comments, page),
                        }
                        Some(SectionEvent::PageLoaded { page, count })
                    }
                    Err(err) => {
                        log::warn!("section {}: page {page} failed: {err:#}", self.entity_id);
                        Some(SectionEvent::Failed(format!("{err:#}")))
                    }
                }
            }
            SectionResponse::Created { draft, result } => match result {
                Ok(comment) => {
                    self.feed.push_optimistic(comment.clone());
                    Some(SectionEvent::CommentCreated(comment))
                }
                Err(err) => {
                    log::warn!("section {}: create failed: {err:#}", self.entity_id);
                    Some(SectionEvent::DraftRestored {
                        draft,
                        error: format!("{err:#}"),
                    })
                }
            },
            SectionResponse::Deleted { comment_id, result } => match result {
                Ok(()) => {
                    self.feed.remove(&comment_id);
                    Some(SectionEvent::CommentDeleted(comment_id))
                }
                Err(err) => {
                    log::warn!("section {}: delete {comment_id} failed: {err:#}", self.entity_id);
                    Some(SectionEvent::Failed(format!("{err:#}")))
                }
            },
        }
    }
}
