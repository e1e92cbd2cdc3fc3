use std::fmt;
use std::sync::Arc;

/// Host-visible alert surface used when a hook is not configured.
pub trait AlertSink: Send + Sync {
    fn alert(&self, title: &str, message: &str);
}

/// Fallback sink that reports alerts through the log.
#[derive(Debug, Default)]
pub struct LogAlert;

impl AlertSink for LogAlert {
    fn alert(&self, title: &str, message: &str) {
        log::warn!("{title}: {message}");
    }
}

type Hook = Box<dyn Fn() + Send + Sync>;
type UserHook = Box<dyn Fn(&str, Option<&str>) + Send + Sync>;

/// Optional host hooks. Every unset hook falls back to an alert.
pub struct Callbacks {
    pub login_required: Option<Hook>,
    pub username_required: Option<Hook>,
    pub comment_too_short: Option<Hook>,
    pub current_user_click: Option<Hook>,
    pub other_user_click: Option<UserHook>,
    pub user_cant_be_mentioned: Option<Hook>,
    alert: Arc<dyn AlertSink>,
}

impl Default for Callbacks {
    fn default() -> Self {
        Self::with_alert(Arc::new(LogAlert))
    }
}

impl fmt::Debug for Callbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callbacks")
            .field("login_required", &self.login_required.is_some())
            .field("username_required", &self.username_required.is_some())
            .field("comment_too_short", &self.comment_too_short.is_some())
            .field("current_user_click", &self.current_user_click.is_some())
            .field("other_user_click", &self.other_user_click.is_some())
            .field("user_cant_be_mentioned", &self.user_cant_be_mentioned.is_some())
            .finish()
    }
}

impl Callbacks {
    pub fn with_alert(alert: Arc<dyn AlertSink>) -> Self {
        Self {
            login_required: None,
            username_required: None,
            comment_too_short: None,
            current_user_click: None,
            other_user_click: None,
            user_cant_be_mentioned: None,
            alert,
        }
    }

    pub fn login_required(&self) {
        match &self.login_required {
            Some(hook) => hook(),
            None => self
                .alert
                .alert("Oops! Login Required", "Please sign in or create an account to continue."),
        }
    }

    pub fn username_required(&self) {
        match &self.username_required {
            Some(hook) => hook(),
            None => self.alert.alert(
                "Username Required",
                "Please set a username on your profile before commenting.",
            ),
        }
    }

    pub fn comment_too_short(&self) {
        match &self.comment_too_short {
            Some(hook) => hook(),
            None => self
                .alert
                .alert("Comment too short", "Please write something before submitting."),
        }
    }

    pub fn current_user_click(&self) {
        match &self.current_user_click {
            Some(hook) => hook(),
            None => self.alert.alert("Profile", "This is you."),
        }
    }

    pub fn other_user_click(&self, user_id: &str, foreign_id: Option<&str>) {
        match &self.other_user_click {
            Some(hook) => hook(user_id, foreign_id),
            None => self
                .alert
                .alert("Profile", &format!("Selected user {user_id}.")),
        }
    }

    pub fn user_cant_be_mentioned(&self) {
        match &self.user_cant_be_mentioned {
            Some(hook) => hook(),
            None => self.alert.alert(
                "Can't mention user",
                "This user has no username and can't be mentioned.",
            ),
        }
    }

    /// Dispatches a click on a rendered mention to the self/other hook.
    pub fn mention_click(&self, mention: &crate::model::Mention, viewer_id: Option<&str>) {
        if viewer_id == Some(mention.id.as_str()) {
            self.current_user_click();
        } else {
            self.other_user_click(&mention.id, mention.foreign_id.as_deref());
        }
    }
}
