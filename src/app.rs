use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{anyhow, bail, Context, Result};

use crate::api;
use crate::callbacks::Callbacks;
use crate::config;
use crate::data::{ApiCommentService, CommentService};
use crate::model::{Comment, SortBy};
use crate::render;
use crate::section::{CommentSection, SectionEvent};
use crate::task::WorkerPool;

const POLL_INTERVAL: Duration = Duration::from_millis(25);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Feed {
        entity_id: String,
        sort: Option<SortBy>,
    },
}

/// Parses everything after the program name. `Ok(None)` means no command.
pub fn parse_args<I, S>(args: I) -> Result<Option<Command>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let args: Vec<String> = args.into_iter().map(|a| a.as_ref().to_string()).collect();
    let Some(command) = args.first() else {
        return Ok(None);
    };
    match command.as_str() {
        "feed" => {
            let mut entity_id = None;
            let mut sort = None;
            let mut rest = args[1..].iter();
            while let Some(arg) = rest.next() {
                match arg.as_str() {
                    "--sort" => {
                        let value = rest.next().ok_or_else(|| anyhow!("--sort needs a value"))?;
                        sort = Some(
                            SortBy::from_key(value)
                                .ok_or_else(|| anyhow!("unknown sort {value:?}; use top, new or old"))?,
                        );
                    }
                    other if other.starts_with('-') => bail!("unknown option {other}"),
                    other => {
                        if entity_id.replace(other.to_string()).is_some() {
                            bail!("feed takes a single entity id");
                        }
                    }
                }
            }
            let entity_id = entity_id.ok_or_else(|| anyhow!("feed needs an entity id"))?;
            Ok(Some(Command::Feed { entity_id, sort }))
        }
        other => bail!("unknown command {other}"),
    }
}

pub fn run(command: Command) -> Result<()> {
    let cfg = config::load(config::LoadOptions::default()).context("load config")?;
    match command {
        Command::Feed { entity_id, sort } => print_feed(&cfg, entity_id, sort),
    }
}

fn print_feed(cfg: &config::Config, entity_id: String, sort: Option<SortBy>) -> Result<()> {
    let client = api::Client::new(api::ClientConfig::from(&cfg.api)).context("create api client")?;
    let service: Arc<dyn CommentService> = Arc::new(ApiCommentService::new(Arc::new(client)));
    let pool = Arc::new(WorkerPool::new(1).context("start worker pool")?);

    let mut feed_cfg = cfg.feed.clone();
    if let Some(sort) = sort {
        feed_cfg.default_sort = sort;
    }
    let mut section = CommentSection::new(
        entity_id,
        service,
        pool,
        Arc::new(Callbacks::default()),
        &feed_cfg,
        &cfg.composer,
    );
    log::info!(
        "loading comments for {} ({})",
        section.entity_id(),
        section.sort().as_str()
    );
    section.reload();

    let deadline = Instant::now() + cfg.api.timeout + Duration::from_secs(5);
    loop {
        for event in section.poll() {
            if let SectionEvent::Failed(message) = event {
                bail!("load comments: {message}");
            }
        }
        if !section.feed().loading {
            break;
        }
        if Instant::now() >= deadline {
            bail!("timed out waiting for comments");
        }
        thread::sleep(POLL_INTERVAL);
    }

    let comments = section.display_list();
    if comments.is_empty() {
        println!("No comments yet.");
        return Ok(());
    }
    for comment in &comments {
        println!("{}", format_comment(comment));
    }
    Ok(())
}

fn format_comment(comment: &Comment) -> String {
    let author = comment
        .user
        .as_ref()
        .and_then(|user| user.username.clone().or_else(|| user.name.clone()))
        .unwrap_or_else(|| comment.user_id.clone());
    let body = if comment.is_deleted() {
        "[deleted]".to_string()
    } else {
        render::to_plain_string(&comment.content, &comment.mentions, |mention| {
            format!("[@{}]", mention.username)
        })
    };
    let mut out = format!(
        "{author} · {}\n  {body}",
        comment.created_at.format("%Y-%m-%d %H:%M")
    );
    if let Some(gif) = &comment.gif {
        out.push_str(&format!("\n  [gif: {}]", gif.gif_url));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Mention, User};
    use chrono::{TimeZone, Utc};

    #[test]
    fn parses_feed_command() {
        assert_eq!(parse_args(Vec::<String>::new()).unwrap(), None);
        assert_eq!(
            parse_args(["feed", "post-1", "--sort", "new"]).unwrap(),
            Some(Command::Feed {
                entity_id: "post-1".into(),
                sort: Some(SortBy::New)
            })
        );
        assert!(parse_args(["feed"]).is_err());
        assert!(parse_args(["feed", "a", "b"]).is_err());
        assert!(parse_args(["feed", "a", "--sort", "best"]).is_err());
        assert!(parse_args(["publish"]).is_err());
    }

    #[test]
    fn formats_comment_with_mentions() {
        let comment = Comment {
            id: "c1".into(),
            entity_id: "e1".into(),
            user_id: "u1".into(),
            user: Some(User {
                id: "u1".into(),
                username: Some("alice".into()),
                ..User::default()
            }),
            content: "thanks @bob".into(),
            gif: None,
            mentions: vec![Mention {
                id: "u2".into(),
                username: "bob".into(),
                foreign_id: None,
                name: None,
            }],
            parent_id: None,
            created_at: Utc.with_ymd_and_hms(2024, 5, 1, 10, 30, 0).unwrap(),
            deleted_at: None,
        };
        assert_eq!(
            format_comment(&comment),
            "alice · 2024-05-01 10:30\n  thanks [@bob]"
        );
    }
}
