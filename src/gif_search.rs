use std::sync::Arc;
use std::time::Instant;

use crossbeam_channel::{unbounded, Receiver, Sender};

use crate::config::MediaConfig;
use crate::data::GifProvider;
use crate::model::{Gif, GifPage};
use crate::task::{Debouncer, Spawner};

struct FetchResult {
    generation: u64,
    offset: usize,
    result: anyhow::Result<GifPage>,
}

pub struct GifSearch {
    provider: Arc<dyn GifProvider>,
    spawner: Arc<dyn Spawner>,
    page_size: usize,
    max_items: usize,
    debounce: Debouncer<String>,
    visible: bool,
    query: String,
    debounced_query: String,
    items: Vec<Gif>,
    offset: usize,
    total_available: usize,
    generation: u64,
    in_flight: bool,
    loaded: bool,
    last_error: Option<String>,
    response_tx: Sender<FetchResult>,
    response_rx: Receiver<FetchResult>,
}

impl GifSearch {
    pub fn new(
        provider: Arc<dyn GifProvider>,
        spawner: Arc<dyn Spawner>,
        config: &MediaConfig,
    ) -> Self {
        let (response_tx, response_rx) = unbounded();
        Self {
            provider,
            spawner,
            page_size: config.page_size.max(1),
            max_items: config.max_items,
            debounce: Debouncer::new(config.debounce),
            visible: false,
            query: String::new(),
            debounced_query: String::new(),
            items: Vec::new(),
            offset: 0,
            total_available: 0,
            generation: 0,
            in_flight: false,
            loaded: false,
            last_error: None,
            response_tx,
            response_rx,
        }
    }

    pub fn items(&self) -> &[Gif] {
        &self.items
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn debounced_query(&self) -> &str {
        &self.debounced_query
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn total_available(&self) -> usize {
        self.total_available
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn set_visible(&mut self, visible: bool) {
        if visible == self.visible {
            return;
        }
        self.visible = visible;
        self.reset();
        self.query.clear();
        self.debounced_query.clear();
        self.debounce.cancel();
        self.generation += 1;
        if visible {
            log::debug!("gif search: opened, generation {}", self.generation);
            self.fetch_page(0);
        } else {
            self.in_flight = false;
        }
    }

    pub fn on_query_change(&mut self, query: impl Into<String>, now: Instant) {
        self.query = query.into();
        self.debounce.schedule(self.query.clone(), now);
    }

    /// Returns whether visible state changed.
    pub fn tick(&mut self, now: Instant) -> bool {
        let mut changed = false;
        if let Some(query) = self.debounce.poll(now) {
            changed |= self.apply_debounced(query);
        }
        changed |= self.poll();
        changed
    }

    fn apply_debounced(&mut self, query: String) -> bool {
        if !self.visible || query == self.debounced_query {
            return false;
        }
        self.debounced_query = query;
        self.reset();
        self.generation += 1;
        log::debug!(
            "gif search: query {:?}, generation {}",
            self.debounced_query,
            self.generation
        );
        self.fetch_page(0);
        true
    }

    fn reset(&mut self) {
        self.items.clear();
        self.offset = 0;
        self.total_available = 0;
        self.loaded = false;
        self.last_error = None;
    }

    pub fn fetch_page(&mut self, offset: usize) {
        let limit = self
            .page_size
            .min(self.max_items.saturating_sub(offset));
        if limit == 0 {
            return;
        }
        self.in_flight = true;

        let generation = self.generation;
        let query = self.debounced_query.trim().to_string();
        let provider = self.provider.clone();
        let tx = self.response_tx.clone();
        self.spawner.spawn(Box::new(move || {
            let result = if query.is_empty() {
                provider.trending(offset, limit)
            } else {
                provider.search(&query, offset, limit)
            };
            let _ = tx.send(FetchResult {
                generation,
                offset,
                result,
            });
        }));
    }

    /// Until a page has landed, the total is unknown and this retries offset 0.
    pub fn fetch_more(&mut self) -> bool {
        if !self.visible || self.in_flight || self.items.len() >= self.max_items {
            return false;
        }
        if self.loaded && self.items.len() >= self.total_available {
            return false;
        }
        self.fetch_page(self.offset);
        self.in_flight
    }

    pub fn poll(&mut self) -> bool {
        let mut changed = false;
        while let Ok(message) = self.response_rx.try_recv() {
            changed |= self.apply(message);
        }
        changed
    }

    fn apply(&mut self, message: FetchResult) -> bool {
        if message.generation != self.generation {
            log::debug!(
                "gif search: dropping generation {} result (current {})",
                message.generation,
                self.generation
            );
            return false;
        }
        self.in_flight = false;

        match message.result {
            Ok(page) => {
                if message.offset == 0 {
                    self.items = page.items;
                } else {
                    self.items.extend(page.items);
                }
                self.items.truncate(self.max_items);
                self.offset = self.items.len();
                self.total_available = page.pagination.total_count;
                self.loaded = true;
                self.last_error = None;
            }
            Err(err) => {
                log::warn!("gif search: fetch at offset {} failed: {err:#}", message.offset);
                self.last_error = Some(format!("{err:#}"));
            }
        }
        true
    }
}
