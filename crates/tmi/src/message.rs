//! Server line parsing.
//!
//! The chat service speaks IRC with the v3 message-tags extension over a
//! WebSocket. One text frame may carry several `\r\n`-separated lines; each
//! line parses independently into a [`ServerMessage`].

use std::collections::HashMap;

use chrono::{DateTime, TimeZone, Utc};

use crate::error::{Result, TmiError};

/// A single chat message from a channel.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatMessage {
    /// Channel login the message was sent to (lowercase, no `#`).
    pub channel: String,
    /// Sender login name.
    pub login: String,
    /// Sender display name, falling back to the login.
    pub display_name: String,
    /// Message body.
    pub text: String,
    /// Sender owns the channel.
    pub is_broadcaster: bool,
    /// Sender holds the moderator badge.
    pub is_moderator: bool,
    /// Sender is a subscriber (or founder).
    pub is_subscriber: bool,
    /// Server-side send time, falling back to receive time.
    pub sent_at: DateTime<Utc>,
}

/// A parsed line from the server.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerMessage {
    /// Chat message in a joined channel.
    Privmsg(ChatMessage),
    /// Keepalive probe carrying a payload to echo back.
    Ping(String),
    /// A user joined a channel.
    Join { channel: String, user: String },
    /// A user left a channel.
    Part { channel: String, user: String },
    /// Server notice, including login failures before the welcome.
    Notice { channel: Option<String>, text: String },
    /// Server asks the client to reconnect.
    Reconnect,
    /// Numeric 001, login accepted.
    Welcome,
    /// Anything else, kept raw for logging.
    Unknown(String),
}

/// Parse one IRC line. Empty lines are a protocol error; unknown commands
/// are not.
pub fn parse_line(line: &str) -> Result<ServerMessage> {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.is_empty() {
        return Err(TmiError::protocol("empty line"));
    }

    let mut rest = line;

    let tags = if let Some(tagged) = rest.strip_prefix('@') {
        let (raw_tags, remainder) = tagged
            .split_once(' ')
            .ok_or_else(|| TmiError::protocol(format!("tags without command: {line}")))?;
        rest = remainder;
        parse_tags(raw_tags)
    } else {
        HashMap::new()
    };

    let prefix = if let Some(prefixed) = rest.strip_prefix(':') {
        let (prefix, remainder) = prefixed
            .split_once(' ')
            .ok_or_else(|| TmiError::protocol(format!("prefix without command: {line}")))?;
        rest = remainder;
        Some(prefix)
    } else {
        None
    };

    let (command, params) = match rest.split_once(' ') {
        Some((command, params)) => (command, params),
        None => (rest, ""),
    };

    Ok(match command {
        "PRIVMSG" => ServerMessage::Privmsg(parse_privmsg(&tags, prefix, params)?),
        "PING" => ServerMessage::Ping(trailing(params).unwrap_or(params).to_string()),
        "JOIN" => ServerMessage::Join {
            channel: normalize_channel(params),
            user: prefix_nick(prefix).to_string(),
        },
        "PART" => ServerMessage::Part {
            channel: normalize_channel(params),
            user: prefix_nick(prefix).to_string(),
        },
        "NOTICE" => {
            let (target, _) = params.split_once(' ').unwrap_or((params, ""));
            let channel = target
                .starts_with('#')
                .then(|| normalize_channel(target));
            ServerMessage::Notice {
                channel,
                text: trailing(params).unwrap_or_default().to_string(),
            }
        }
        "RECONNECT" => ServerMessage::Reconnect,
        "001" => ServerMessage::Welcome,
        _ => ServerMessage::Unknown(line.to_string()),
    })
}

fn parse_privmsg(
    tags: &HashMap<String, String>,
    prefix: Option<&str>,
    params: &str,
) -> Result<ChatMessage> {
    let (target, _) = params
        .split_once(' ')
        .ok_or_else(|| TmiError::protocol(format!("PRIVMSG without body: {params}")))?;
    let text = trailing(params)
        .ok_or_else(|| TmiError::protocol(format!("PRIVMSG without body: {params}")))?;

    let login = prefix_nick(prefix).to_lowercase();
    if login.is_empty() {
        return Err(TmiError::protocol("PRIVMSG without sender prefix"));
    }

    let display_name = tags
        .get("display-name")
        .filter(|name| !name.is_empty())
        .cloned()
        .unwrap_or_else(|| login.clone());

    let sent_at = tags
        .get("tmi-sent-ts")
        .and_then(|ts| ts.parse::<i64>().ok())
        .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
        .unwrap_or_else(Utc::now);

    Ok(ChatMessage {
        channel: normalize_channel(target),
        login,
        display_name,
        text: text.to_string(),
        is_broadcaster: has_badge(tags, "broadcaster"),
        is_moderator: tags.get("mod").is_some_and(|v| v == "1") || has_badge(tags, "moderator"),
        is_subscriber: tags.get("subscriber").is_some_and(|v| v == "1")
            || has_badge(tags, "subscriber")
            || has_badge(tags, "founder"),
        sent_at,
    })
}

/// Split `key=value;key=value` tags, unescaping values.
fn parse_tags(raw: &str) -> HashMap<String, String> {
    raw.split(';')
        .filter(|entry| !entry.is_empty())
        .map(|entry| match entry.split_once('=') {
            Some((key, value)) => (key.to_string(), unescape_tag_value(value)),
            None => (entry.to_string(), String::new()),
        })
        .collect()
}

/// IRCv3 message-tags value unescaping: `\:` `\s` `\\` `\r` `\n`.
/// A dangling backslash at the end of the value is dropped.
fn unescape_tag_value(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some(':') => out.push(';'),
            Some('s') => out.push(' '),
            Some('\\') => out.push('\\'),
            Some('r') => out.push('\r'),
            Some('n') => out.push('\n'),
            Some(other) => out.push(other),
            None => {}
        }
    }
    out
}

fn has_badge(tags: &HashMap<String, String>, name: &str) -> bool {
    tags.get("badges").is_some_and(|badges| {
        badges
            .split(',')
            .any(|badge| badge.split('/').next() == Some(name))
    })
}

fn prefix_nick(prefix: Option<&str>) -> &str {
    let prefix = prefix.unwrap_or("");
    prefix.split('!').next().unwrap_or("")
}

/// Lowercase a channel target and strip the leading `#`.
pub fn normalize_channel(target: &str) -> String {
    target
        .trim()
        .trim_start_matches('#')
        .to_lowercase()
}

fn trailing(params: &str) -> Option<&str> {
    if let Some(stripped) = params.strip_prefix(':') {
        return Some(stripped);
    }
    params.split_once(" :").map(|(_, t)| t)
}
