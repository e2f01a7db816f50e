use anyhow::Result;
use chirp::models::{Notification, NotificationKind, Pages, Tweet, User};
use clap::ValueEnum;
use colored::Colorize;
use comfy_table::{Attribute, Cell, Color as TableColor, Table};
use serde::Serialize;

use crate::theme::{ICONS, THEME};

/// Output format options for CLI commands
#[derive(Clone, Debug, ValueEnum, Default, PartialEq)]
pub enum OutputFormat {
    /// Formatted table output (default)
    #[default]
    Table,
    /// JSON output for scripting
    Json,
    /// Compact single-line output
    Compact,
}

/// Global CLI options that affect output and behavior
#[derive(Clone, Debug, Default)]
pub struct GlobalOptions {
    pub output_format: OutputFormat,
    pub quiet: bool,
    pub verbose: bool,
    pub no_color: bool,
}

/// Trait for data that can be displayed as a table
pub trait TableDisplay {
    fn to_table(&self, options: &GlobalOptions) -> Table;
    fn to_compact(&self) -> String;
}

/// Output manager handles formatting and display
pub struct OutputManager {
    pub options: GlobalOptions,
}

impl OutputManager {
    pub fn new(options: GlobalOptions) -> Self {
        Self { options }
    }

    /// Display data according to the configured output format
    pub fn display<T>(&self, data: &T) -> Result<()>
    where
        T: Serialize + TableDisplay,
    {
        if self.options.quiet {
            return Ok(());
        }

        match self.options.output_format {
            OutputFormat::Json => {
                let json = serde_json::to_string_pretty(data)?;
                println!("{json}");
            }
            OutputFormat::Table => {
                let table = data.to_table(&self.options);
                println!("{table}");
            }
            OutputFormat::Compact => {
                println!("{}", data.to_compact());
            }
        }
        Ok(())
    }

    fn line(&self, icon: &str, message: &str, color: colored::Color) -> String {
        if self.options.no_color {
            format!("{icon} {message}")
        } else {
            format!("{} {}", icon.color(color), message.color(color))
        }
    }

    pub fn success(&self, message: &str) {
        if !self.options.quiet {
            println!("{}", self.line(ICONS.success, message, THEME.success));
        }
    }

    pub fn error(&self, message: &str) {
        eprintln!("{}", self.line(ICONS.error, message, THEME.error));
    }

    pub fn warning(&self, message: &str) {
        if !self.options.quiet {
            println!("{}", self.line(ICONS.warning, message, THEME.warning));
        }
    }

    pub fn info(&self, message: &str) {
        if !self.options.quiet {
            println!("{}", self.line(ICONS.info, message, THEME.info));
        }
    }

    /// Display verbose information (only if verbose mode is enabled)
    pub fn verbose(&self, message: &str) {
        if self.options.verbose && !self.options.quiet {
            eprintln!("{}", self.line(ICONS.arrow, message, THEME.muted));
        }
    }

    pub fn heading(&self, text: &str) {
        if !self.options.quiet {
            let output = if self.options.no_color {
                format!("\n{text}\n{}", "=".repeat(text.chars().count()))
            } else {
                format!("\n{}", text.color(THEME.primary).bold())
            };
            println!("{output}");
        }
    }

    pub fn key_value(&self, key: &str, value: &str) {
        if !self.options.quiet {
            let output = if self.options.no_color {
                format!("{key}: {value}")
            } else {
                format!("{}: {}", key.color(THEME.key).bold(), value.color(THEME.value))
            };
            println!("{output}");
        }
    }

    pub fn bullet(&self, text: &str) {
        if !self.options.quiet {
            let output = if self.options.no_color {
                format!("  {} {text}", ICONS.bullet)
            } else {
                format!("  {} {text}", ICONS.bullet.color(THEME.muted))
            };
            println!("{output}");
        }
    }
}

fn themed_table(options: &GlobalOptions, headers: &[&str]) -> Table {
    let mut table = Table::new();
    if options.no_color {
        table.load_preset(comfy_table::presets::ASCII_FULL);
    } else {
        table.load_preset(comfy_table::presets::UTF8_FULL_CONDENSED);
    }
    let header_cells: Vec<Cell> = headers
        .iter()
        .map(|h| {
            let cell = Cell::new(h).add_attribute(Attribute::Bold);
            if options.no_color { cell } else { cell.fg(TableColor::Cyan) }
        })
        .collect();
    table.set_header(header_cells);
    table
}

fn flag_cell(on: bool, icon: &str, color: TableColor, options: &GlobalOptions) -> Cell {
    if !on {
        return Cell::new("");
    }
    let cell = Cell::new(icon);
    if options.no_color { cell } else { cell.fg(color) }
}

fn tweet_text(tweet: &Tweet) -> String {
    let mut text = tweet.content.clone().unwrap_or_default();
    for media in &tweet.media {
        if !text.is_empty() {
            text.push('\n');
        }
        text.push_str(&format!("[{}] {}", media.kind(), media.best_url().unwrap_or("-")));
    }
    text
}

fn byline(tweet: &Tweet) -> String {
    match &tweet.repost {
        Some(meta) => format!("@{} (reposted by @{})", tweet.author.username, meta.reposted_by.username),
        None => format!("@{}", tweet.author.username),
    }
}

fn tweet_row(tweet: &Tweet, options: &GlobalOptions) -> Vec<Cell> {
    vec![
        Cell::new(&tweet.id),
        Cell::new(byline(tweet)),
        Cell::new(tweet_text(tweet)),
        Cell::new(format!(
            "{} {}  {} {}  {} {}",
            ICONS.reply, tweet.counts.replies, ICONS.repost, tweet.counts.reposts, ICONS.heart, tweet.counts.likes
        )),
        flag_cell(tweet.liked, ICONS.heart, TableColor::Red, options),
        flag_cell(tweet.reposted, ICONS.repost, TableColor::Green, options),
        Cell::new(tweet.created_at.format("%Y-%m-%d %H:%M").to_string()),
    ]
}

const TWEET_HEADERS: &[&str] = &["ID", "Author", "Text", "Counts", "Liked", "Reposted", "Posted"];

impl TableDisplay for Tweet {
    fn to_table(&self, options: &GlobalOptions) -> Table {
        let mut table = themed_table(options, TWEET_HEADERS);
        table.add_row(tweet_row(self, options));
        table
    }

    fn to_compact(&self) -> String {
        format!("{} {}: {}", self.id, byline(self), tweet_text(self).replace('\n', " "))
    }
}

impl TableDisplay for Pages<Tweet> {
    fn to_table(&self, options: &GlobalOptions) -> Table {
        let mut table = themed_table(options, TWEET_HEADERS);
        if self.is_empty() {
            table.add_row(vec![Cell::new("No tweets found")]);
        }
        for tweet in self.iter() {
            table.add_row(tweet_row(tweet, options));
        }
        table
    }

    fn to_compact(&self) -> String {
        self.iter().map(TableDisplay::to_compact).collect::<Vec<_>>().join("\n")
    }
}

fn user_row(user: &User, options: &GlobalOptions) -> Vec<Cell> {
    vec![
        Cell::new(format!("@{}", user.username)),
        Cell::new(&user.name),
        Cell::new(user.bio.as_deref().unwrap_or("")),
        Cell::new(user.counts.followed_by),
        Cell::new(user.counts.following),
        Cell::new(user.counts.tweets),
        flag_cell(user.followed, ICONS.success, TableColor::Green, options),
    ]
}

const USER_HEADERS: &[&str] = &["User", "Name", "Bio", "Followers", "Following", "Tweets", "Followed"];

impl TableDisplay for User {
    fn to_table(&self, options: &GlobalOptions) -> Table {
        let mut table = themed_table(options, USER_HEADERS);
        table.add_row(user_row(self, options));
        table
    }

    fn to_compact(&self) -> String {
        format!(
            "@{} ({}) followers={} following={}",
            self.username, self.name, self.counts.followed_by, self.counts.following
        )
    }
}

impl TableDisplay for Pages<User> {
    fn to_table(&self, options: &GlobalOptions) -> Table {
        let mut table = themed_table(options, USER_HEADERS);
        if self.is_empty() {
            table.add_row(vec![Cell::new("No users found")]);
        }
        for user in self.iter() {
            table.add_row(user_row(user, options));
        }
        table
    }

    fn to_compact(&self) -> String {
        self.iter().map(TableDisplay::to_compact).collect::<Vec<_>>().join("\n")
    }
}

fn notification_summary(notification: &Notification) -> String {
    let who = format!("@{}", notification.sender.username);
    let tweet = notification
        .tweet
        .as_ref()
        .and_then(|tweet| tweet.content.as_deref())
        .unwrap_or("");
    match notification.kind {
        NotificationKind::Follow => format!("{who} followed you"),
        NotificationKind::Like => format!("{who} liked: {tweet}"),
        NotificationKind::Reply => format!("{who} replied: {tweet}"),
        NotificationKind::Repost => format!("{who} reposted: {tweet}"),
        NotificationKind::Mention => format!("{who} mentioned you: {tweet}"),
    }
}

impl TableDisplay for Pages<Notification> {
    fn to_table(&self, options: &GlobalOptions) -> Table {
        let mut table = themed_table(options, &["", "Kind", "Summary", "When"]);
        if self.is_empty() {
            table.add_row(vec![Cell::new(""), Cell::new("No notifications")]);
        }
        for notification in self.iter() {
            table.add_row(vec![
                flag_cell(!notification.read, ICONS.unread, TableColor::Blue, options),
                Cell::new(notification.kind.as_str()),
                Cell::new(notification_summary(notification)),
                Cell::new(notification.created_at.format("%Y-%m-%d %H:%M").to_string()),
            ]);
        }
        table
    }

    fn to_compact(&self) -> String {
        self.iter()
            .map(|n| format!("{} {}", if n.read { " " } else { ICONS.unread }, notification_summary(n)))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chirp::models::{Author, Page, TweetCounts};

    fn tweet(id: &str) -> Tweet {
        Tweet {
            id: id.to_string(),
            author: Author {
                id: "u1".into(),
                username: "alice".into(),
                name: "Alice".into(),
                profile_image: None,
            },
            content: Some("hello world".into()),
            media: vec![],
            parent_id: None,
            counts: TweetCounts::default(),
            liked: true,
            reposted: false,
            is_repost: false,
            repost: None,
            created_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn test_output_manager_json() {
        let manager = OutputManager::new(GlobalOptions {
            output_format: OutputFormat::Json,
            ..Default::default()
        });
        assert!(manager.display(&tweet("t1")).is_ok());
    }

    #[test]
    fn test_output_manager_quiet() {
        let manager = OutputManager::new(GlobalOptions {
            quiet: true,
            ..Default::default()
        });
        assert!(manager.display(&Pages::first(Page::new(vec![tweet("t1")], None))).is_ok());
    }

    #[test]
    fn test_compact_tweet_list() {
        let pages = Pages::first(Page::new(vec![tweet("t1"), tweet("t2")], None));
        assert_eq!(pages.to_compact(), "t1 @alice: hello world\nt2 @alice: hello world");
    }
}
