//! Display labels attached to log lines.
//!
//! Every log line emitted by a bot subsystem carries a `tag` field so the
//! output can be grepped per subsystem:
//!
//! ```ignore
//! info!(tag = %Tag::Redis, "connected");
//! ```

use std::fmt;

/// A subsystem label for structured log output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tag {
    Redis,
    Mysql,
    Commands,
    Events,
    Gateway,
}

impl Tag {
    /// The bracketed label rendered into log lines.
    pub const fn label(self) -> &'static str {
        match self {
            Tag::Redis => "[Redis]",
            Tag::Mysql => "[MySQL]",
            Tag::Commands => "[Commands]",
            Tag::Events => "[Events]",
            Tag::Gateway => "[Gateway]",
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_matches_label() {
        for tag in [Tag::Redis, Tag::Mysql, Tag::Commands, Tag::Events, Tag::Gateway] {
            assert_eq!(tag.to_string(), tag.label());
        }
    }

    #[test]
    fn labels_are_bracketed_and_distinct() {
        let labels = [
            Tag::Redis.label(),
            Tag::Mysql.label(),
            Tag::Commands.label(),
            Tag::Events.label(),
            Tag::Gateway.label(),
        ];
        for label in labels {
            assert!(label.starts_with('[') && label.ends_with(']'), "{label}");
        }
        let mut sorted = labels.to_vec();
        sorted.sort();
        sorted.dedup();
        assert_eq!(sorted.len(), labels.len());
    }
}
