use std::sync::Arc;
use std::time::Instant;

use crossbeam_channel::{unbounded, Receiver, Sender};

use crate::callbacks::Callbacks;
use crate::config::ComposerConfig;
use crate::data::UserSearch;
use crate::model::{Gif, Mention, User};
use crate::render::{self, Segment};
use crate::task::{Debouncer, Spawner};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Caret {
    pub position: usize,
    pub selection_active: bool,
}

impl Caret {
    pub fn at(position: usize) -> Self {
        Self {
            position,
            selection_active: false,
        }
    }
}

/// The editable text surface a composer view exposes to the engine.
pub trait ComposerSurface {
    fn text(&self) -> &str;
    fn caret(&self) -> Caret;
    fn set_text(&mut self, text: String, caret: usize);
    fn set_caret(&mut self, caret: Caret);
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextBuffer {
    text: String,
    caret: Caret,
}

impl TextBuffer {
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let caret = Caret::at(text.len());
        Self { text, caret }
    }
}

impl ComposerSurface for TextBuffer {
    fn text(&self) -> &str {
        &self.text
    }

    fn caret(&self) -> Caret {
        self.caret
    }

    fn set_text(&mut self, text: String, caret: usize) {
        self.caret = Caret::at(clamp_to_char_boundary(&text, caret));
        self.text = text;
    }

    fn set_caret(&mut self, caret: Caret) {
        self.caret = Caret {
            position: clamp_to_char_boundary(&self.text, caret.position),
            selection_active: caret.selection_active,
        };
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ComposerError {
    #[error("composer has no editable surface attached")]
    SurfaceDetached,
    #[error("no mention trigger is active at the caret")]
    NoTrigger,
    #[error("no mention suggestion at index {0}")]
    NoSuchSuggestion(usize),
}

/// An `@token` under the caret. `start` is the `@`, `end` the end of the
/// surrounding non-whitespace run, `query` the text between `@` and caret.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trigger {
    pub start: usize,
    pub end: usize,
    pub query: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MentionState {
    Idle,
    Triggered(Trigger),
    Suggesting {
        trigger: Trigger,
        candidates: Vec<User>,
        loading: bool,
    },
    Committed,
}

impl MentionState {
    pub fn trigger(&self) -> Option<&Trigger> {
        match self {
            MentionState::Triggered(trigger) => Some(trigger),
            MentionState::Suggesting { trigger, .. } => Some(trigger),
            MentionState::Idle | MentionState::Committed => None,
        }
    }
}

/// What a submit hands to the comment section; restored as-is on failure.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Draft {
    pub content: String,
    pub mentions: Vec<Mention>,
    pub gif: Option<Gif>,
}

struct Lookup {
    seq: u64,
    query: String,
    result: anyhow::Result<Vec<User>>,
}

pub struct MentionEngine {
    surface: Option<Box<dyn ComposerSurface>>,
    users: Arc<dyn UserSearch>,
    spawner: Arc<dyn Spawner>,
    callbacks: Arc<Callbacks>,
    debounce: Debouncer<String>,
    suggestion_limit: usize,
    state: MentionState,
    mentions: Vec<Mention>,
    gif: Option<Gif>,
    next_lookup: u64,
    active_lookup: Option<u64>,
    response_tx: Sender<Lookup>,
    response_rx: Receiver<Lookup>,
}

impl MentionEngine {
    pub fn new(
        users: Arc<dyn UserSearch>,
        spawner: Arc<dyn Spawner>,
        callbacks: Arc<Callbacks>,
        config: &ComposerConfig,
    ) -> Self {
        let (response_tx, response_rx) = unbounded();
        Self {
            surface: None,
            users,
            spawner,
            callbacks,
            debounce: Debouncer::new(config.mention_debounce),
            suggestion_limit: config.suggestion_limit.max(1),
            state: MentionState::Idle,
            mentions: Vec::new(),
            gif: None,
            next_lookup: 1,
            active_lookup: None,
            response_tx,
            response_rx,
        }
    }

    pub fn with_surface(mut self, surface: Box<dyn ComposerSurface>) -> Self {
        self.surface = Some(surface);
        self
    }

    pub fn attach_surface(&mut self, surface: Box<dyn ComposerSurface>) {
        self.surface = Some(surface);
        self.reset_trigger();
    }

    pub fn detach_surface(&mut self) -> Option<Box<dyn ComposerSurface>> {
        self.reset_trigger();
        self.surface.take()
    }

    pub fn state(&self) -> &MentionState {
        &self.state
    }

    pub fn mentions(&self) -> &[Mention] {
        &self.mentions
    }

    pub fn gif(&self) -> Option<&Gif> {
        self.gif.as_ref()
    }

    pub fn attach_gif(&mut self, gif: Gif) {
        self.gif = Some(gif);
    }

    pub fn clear_gif(&mut self) {
        self.gif = None;
    }

    pub fn suggestions(&self) -> &[User] {
        match &self.state {
            MentionState::Suggesting { candidates, .. } => candidates,
            _ => &[],
        }
    }

    pub fn is_loading_suggestions(&self) -> bool {
        matches!(self.state, MentionState::Suggesting { loading: true, .. })
    }

    pub fn text(&self) -> Result<&str, ComposerError> {
        Ok(self.surface()?.text())
    }

    fn surface(&self) -> Result<&dyn ComposerSurface, ComposerError> {
        self.surface
            .as_deref()
            .ok_or(ComposerError::SurfaceDetached)
    }

    fn surface_mut(&mut self) -> Result<&mut (dyn ComposerSurface + 'static), ComposerError> {
        self.surface
            .as_deref_mut()
            .ok_or(ComposerError::SurfaceDetached)
    }

    pub fn set_text(
        &mut self,
        text: impl Into<String>,
        caret: usize,
        now: Instant,
    ) -> Result<(), ComposerError> {
        self.surface_mut()?.set_text(text.into(), caret);
        self.evaluate(now)
    }

    pub fn set_caret(&mut self, caret: Caret, now: Instant) -> Result<(), ComposerError> {
        self.surface_mut()?.set_caret(caret);
        self.evaluate(now)
    }

    fn evaluate(&mut self, now: Instant) -> Result<(), ComposerError> {
        let surface = self.surface()?;
        let detected = detect_trigger(surface.text(), surface.caret());

        let Some(trigger) = detected else {
            self.reset_trigger();
            return Ok(());
        };

        let same_query = self
            .state
            .trigger()
            .is_some_and(|current| current.query == trigger.query);
        if same_query {
            match &mut self.state {
                MentionState::Triggered(current) => *current = trigger,
                MentionState::Suggesting { trigger: current, .. } => *current = trigger,
                MentionState::Idle | MentionState::Committed => {}
            }
            return Ok(());
        }

        self.active_lookup = None;
        if trigger.query.is_empty() {
            self.debounce.cancel();
        } else {
            self.debounce.schedule(trigger.query.clone(), now);
        }
        self.state = MentionState::Triggered(trigger);
        Ok(())
    }

    fn reset_trigger(&mut self) {
        self.debounce.cancel();
        self.active_lookup = None;
        self.state = MentionState::Idle;
    }

    /// Fires due lookups and applies finished ones. Returns whether state changed.
    pub fn tick(&mut self, now: Instant) -> bool {
        let mut changed = false;
        if let Some(query) = self.debounce.poll(now) {
            changed |= self.start_lookup(query);
        }
        changed |= self.poll_lookups();
        changed
    }

    fn start_lookup(&mut self, query: String) -> bool {
        let Some(trigger) = self.state.trigger().cloned() else {
            return false;
        };
        if trigger.query != query {
            return false;
        }

        let seq = self.next_lookup;
        self.next_lookup += 1;
        self.active_lookup = Some(seq);
        let candidates = match std::mem::replace(&mut self.state, MentionState::Idle) {
            MentionState::Suggesting { candidates, .. } => candidates,
            _ => Vec::new(),
        };
        self.state = MentionState::Suggesting {
            trigger,
            candidates,
            loading: true,
        };

        log::debug!("composer: mention lookup #{seq} for {query:?}");
        let users = self.users.clone();
        let tx = self.response_tx.clone();
        let limit = self.suggestion_limit;
        self.spawner.spawn(Box::new(move || {
            let result = users.search_users(&query, limit);
            let _ = tx.send(Lookup { seq, query, result });
        }));
        true
    }

    fn poll_lookups(&mut self) -> bool {
        let mut changed = false;
        while let Ok(lookup) = self.response_rx.try_recv() {
            changed |= self.apply_lookup(lookup);
        }
        changed
    }

    fn apply_lookup(&mut self, lookup: Lookup) -> bool {
        if self.active_lookup != Some(lookup.seq) {
            log::debug!(
                "composer: discarding stale mention lookup #{} for {:?}",
                lookup.seq,
                lookup.query
            );
            return false;
        }
        self.active_lookup = None;

        let MentionState::Suggesting {
            trigger,
            candidates,
            loading,
        } = &mut self.state
        else {
            return false;
        };
        if trigger.query != lookup.query {
            return false;
        }
        *loading = false;
        match lookup.result {
            Ok(users) => *candidates = users,
            Err(err) => {
                log::warn!("composer: mention lookup failed: {err:#}");
                candidates.clear();
            }
        }
        true
    }

    pub fn select_suggestion(&mut self, index: usize) -> Result<bool, ComposerError> {
        let user = self
            .suggestions()
            .get(index)
            .cloned()
            .ok_or(ComposerError::NoSuchSuggestion(index))?;
        self.commit(&user)
    }

    /// Replaces the active trigger token with `@username `.
    ///
    /// Returns `Ok(false)` without touching the text when the user has no
    /// username; the `user_cant_be_mentioned` hook fires instead.
    pub fn commit(&mut self, user: &User) -> Result<bool, ComposerError> {
        let Some(mention) = user.as_mention() else {
            self.callbacks.user_cant_be_mentioned();
            return Ok(false);
        };
        let surface = self.surface()?;
        let text = surface.text();
        let trigger =
            detect_trigger(text, surface.caret()).ok_or(ComposerError::NoTrigger)?;

        let inserted = format!("{} ", mention.token());
        let mut next = String::with_capacity(
            text.len() - (trigger.end - trigger.start) + inserted.len(),
        );
        next.push_str(&text[..trigger.start]);
        next.push_str(&inserted);
        next.push_str(&text[trigger.end..]);
        let caret = trigger.start + inserted.len();

        self.surface_mut()?.set_text(next, caret);
        self.remember(mention);
        self.debounce.cancel();
        self.active_lookup = None;
        self.state = MentionState::Committed;
        Ok(true)
    }

    /// Programmatic mention, e.g. replying to a user: prefixes `@username `.
    pub fn push_mention(&mut self, user: &User) -> Result<bool, ComposerError> {
        let Some(mention) = user.as_mention() else {
            self.callbacks.user_cant_be_mentioned();
            return Ok(false);
        };
        let surface = self.surface()?;
        let prefix = format!("{} ", mention.token());
        let text = surface.text();
        if !text.starts_with(&prefix) {
            let caret = surface.caret().position + prefix.len();
            let next = format!("{prefix}{text}");
            self.surface_mut()?.set_text(next, caret);
        }
        self.remember(mention);
        self.debounce.cancel();
        self.active_lookup = None;
        self.state = MentionState::Committed;
        Ok(true)
    }

    fn remember(&mut self, mention: Mention) {
        if !self.mentions.iter().any(|known| known.id == mention.id) {
            self.mentions.push(mention);
        }
    }

    /// Confirmed mentions still present in the text, in first-seen order.
    pub fn mentions_in_text(&self) -> Vec<Mention> {
        let Ok(text) = self.text() else {
            return Vec::new();
        };
        let mut found: Vec<Mention> = Vec::new();
        for segment in render::render(text, &self.mentions) {
            if let Segment::Mention(mention) = segment {
                if !found.iter().any(|known| known.id == mention.id) {
                    found.push(mention.clone());
                }
            }
        }
        found
    }

    /// Hands the current input over for submission and clears the composer.
    pub fn take_draft(&mut self) -> Result<Draft, ComposerError> {
        let content = self.text()?.to_string();
        let draft = Draft {
            content,
            mentions: self.mentions_in_text(),
            gif: self.gif.take(),
        };
        self.surface_mut()?.set_text(String::new(), 0);
        self.mentions.clear();
        self.reset_trigger();
        Ok(draft)
    }

    pub fn restore(&mut self, draft: Draft) -> Result<(), ComposerError> {
        let caret = draft.content.len();
        self.surface_mut()?.set_text(draft.content, caret);
        self.mentions = draft.mentions;
        self.gif = draft.gif;
        self.reset_trigger();
        Ok(())
    }

    pub fn clear(&mut self) -> Result<(), ComposerError> {
        self.surface_mut()?.set_text(String::new(), 0);
        self.mentions.clear();
        self.gif = None;
        self.reset_trigger();
        Ok(())
    }
}

/// The `@token` ending at the caret, if one is being typed.
pub fn detect_trigger(text: &str, caret: Caret) -> Option<Trigger> {
    if caret.selection_active {
        return None;
    }
    let cursor = clamp_to_char_boundary(text, caret.position);
    let before = &text[..cursor];
    let after = &text[cursor..];

    let start = before
        .char_indices()
        .rfind(|(_, c)| c.is_whitespace())
        .map(|(idx, c)| idx + c.len_utf8())
        .unwrap_or(0);
    let query = before[start..].strip_prefix('@')?;
    if query.contains('@') {
        return None;
    }

    let end_rel = after
        .char_indices()
        .find(|(_, c)| c.is_whitespace())
        .map(|(idx, _)| idx)
        .unwrap_or(after.len());

    Some(Trigger {
        start,
        end: cursor + end_rel,
        query: query.to_string(),
    })
}

fn clamp_to_char_boundary(text: &str, position: usize) -> usize {
    let mut position = position.min(text.len());
    while position > 0 && !text.is_char_boundary(position) {
        position -= 1;
    }
    position
}
