use std::collections::HashMap;

use regex::Regex;

use crate::model::Mention;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment<'a> {
    Literal(&'a str),
    Mention(&'a Mention),
}

struct Matcher<'a> {
    regex: Regex,
    by_username: HashMap<&'a str, &'a Mention>,
}

impl<'a> Matcher<'a> {
    fn build(mentions: &'a [Mention]) -> Option<Self> {
        let mut by_username: HashMap<&'a str, &'a Mention> = HashMap::new();
        for mention in mentions.iter().filter(|m| m.is_valid()) {
            by_username.entry(mention.username.as_str()).or_insert(mention);
        }
        if by_username.is_empty() {
            return None;
        }

        // Longest first so `@bobby` is not consumed as `@bob` + "by".
        let mut usernames: Vec<&str> = by_username.keys().copied().collect();
        usernames.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        let pattern = usernames
            .iter()
            .map(|name| format!("@{}", regex::escape(name)))
            .collect::<Vec<_>>()
            .join("|");

        match Regex::new(&pattern) {
            Ok(regex) => Some(Self { regex, by_username }),
            Err(err) => {
                log::warn!("render: mention pattern rejected, rendering plain text: {err}");
                None
            }
        }
    }
}

/// Lazy left-to-right segmentation of a comment body.
pub struct Segments<'a> {
    text: &'a str,
    pos: usize,
    matcher: Option<Matcher<'a>>,
    queued: Option<Segment<'a>>,
}

impl<'a> Iterator for Segments<'a> {
    type Item = Segment<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(segment) = self.queued.take() {
            return Some(segment);
        }
        let text = self.text;
        if self.pos >= text.len() {
            return None;
        }
        let rest = &text[self.pos..];
        let Some(matcher) = &self.matcher else {
            self.pos = text.len();
            return Some(Segment::Literal(rest));
        };
        let Some(found) = matcher.regex.find_at(text, self.pos) else {
            self.pos = text.len();
            return Some(Segment::Literal(rest));
        };

        let token = &text[found.start()..found.end()];
        let reference = matcher
            .by_username
            .get(&token[1..])
            .copied()
            .map(Segment::Mention)
            .unwrap_or(Segment::Literal(token));
        let literal = &text[self.pos..found.start()];
        self.pos = found.end();

        if literal.is_empty() {
            Some(reference)
        } else {
            self.queued = Some(reference);
            Some(Segment::Literal(literal))
        }
    }
}

/// Segments `text` against `mentions`. Usernames match literally and
/// mentions absent from the text yield nothing. Without usable mentions the
/// whole text comes back as one literal, even when empty; otherwise empty
/// literals are skipped.
pub fn render<'a>(text: &'a str, mentions: &'a [Mention]) -> Segments<'a> {
    let matcher = if mentions.is_empty() || text.is_empty() {
        None
    } else {
        Matcher::build(mentions)
    };
    match matcher {
        Some(matcher) => Segments {
            text,
            pos: 0,
            matcher: Some(matcher),
            queued: None,
        },
        None => Segments {
            text,
            pos: text.len(),
            matcher: None,
            queued: Some(Segment::Literal(text)),
        },
    }
}

/// Flattens segments back to text, decorating mentions with `decorate`.
pub fn to_plain_string<F>(text: &str, mentions: &[Mention], decorate: F) -> String
where
    F: Fn(&Mention) -> String,
{
    render(text, mentions)
        .map(|segment| match segment {
            Segment::Literal(literal) => literal.to_string(),
            Segment::Mention(mention) => decorate(mention),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mention(id: &str, username: &str) -> Mention {
        Mention {
            id: id.into(),
            username: username.into(),
            foreign_id: None,
            name: None,
        }
    }

    #[test]
    fn splits_text_around_mentions() {
        let bob = mention("u1", "bob");
        let alice = mention("u2", "alice");
        let mentions = vec![bob.clone(), alice.clone()];
        let segments: Vec<_> = render("hello @bob and @alice", &mentions).collect();
        assert_eq!(
            segments,
            vec![
                Segment::Literal("hello "),
                Segment::Mention(&bob),
                Segment::Literal(" and "),
                Segment::Mention(&alice),
            ]
        );
    }

    #[test]
    fn no_mentions_is_single_literal() {
        let segments: Vec<_> = render("no mentions here", &[]).collect();
        assert_eq!(segments, vec![Segment::Literal("no mentions here")]);
    }

    #[test]
    fn empty_text_is_single_empty_literal() {
        let mentions = vec![mention("u1", "bob")];
        assert_eq!(render("", &mentions).collect::<Vec<_>>(), vec![Segment::Literal("")]);
        assert_eq!(render("", &[]).collect::<Vec<_>>(), vec![Segment::Literal("")]);
    }

    #[test]
    fn only_invalid_mentions_take_fast_path() {
        let mentions = vec![mention("u0", "")];
        let segments: Vec<_> = render("hi @", &mentions).collect();
        assert_eq!(segments, vec![Segment::Literal("hi @")]);
    }

    #[test]
    fn metacharacters_match_literally() {
        let odd = mention("u3", "a.b+c");
        let mentions = vec![odd.clone()];
        let segments: Vec<_> = render("hi @a.b+c", &mentions).collect();
        assert_eq!(segments, vec![Segment::Literal("hi "), Segment::Mention(&odd)]);

        let segments: Vec<_> = render("hi @aXbbc", &mentions).collect();
        assert_eq!(segments, vec![Segment::Literal("hi @aXbbc")]);
    }

    #[test]
    fn adjacent_mentions_skip_empty_literals() {
        let bob = mention("u1", "bob");
        let alice = mention("u2", "alice");
        let mentions = vec![bob.clone(), alice.clone()];
        let segments: Vec<_> = render("@bob@alice", &mentions).collect();
        assert_eq!(segments, vec![Segment::Mention(&bob), Segment::Mention(&alice)]);
    }

    #[test]
    fn unmatched_and_invalid_mentions_are_ignored() {
        let bob = mention("u1", "bob");
        let mentions = vec![bob.clone(), mention("u9", "carol"), mention("u0", "")];
        let segments: Vec<_> = render("thanks @bob!", &mentions).collect();
        assert_eq!(
            segments,
            vec![
                Segment::Literal("thanks "),
                Segment::Mention(&bob),
                Segment::Literal("!"),
            ]
        );
    }

    #[test]
    fn longer_username_wins_over_prefix() {
        let bob = mention("u1", "bob");
        let bobby = mention("u2", "bobby");
        let mentions = vec![bob.clone(), bobby.clone()];
        let segments: Vec<_> = render("@bobby and @bob", &mentions).collect();
        assert_eq!(
            segments,
            vec![
                Segment::Mention(&bobby),
                Segment::Literal(" and "),
                Segment::Mention(&bob),
            ]
        );
    }

    #[test]
    fn repeated_mentions_resolve_each_time() {
        let bob = mention("u1", "bob");
        let mentions = vec![bob.clone()];
        let count = render("@bob @bob @bob", &mentions)
            .filter(|segment| matches!(segment, Segment::Mention(_)))
            .count();
        assert_eq!(count, 3);
    }

    #[test]
    fn plain_string_decorates_mentions() {
        let mentions = vec![mention("u1", "bob")];
        let out = to_plain_string("hey @bob.", &mentions, |m| format!("[@{}]", m.username));
        assert_eq!(out, "hey [@bob].");
    }
}
