use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chirp::{TweetList, UserList};
use chirp::models::{ComposeTweet, Upload};
use clap::Args;

use crate::context::SessionContext;
use crate::examples::ExampleGroup;
use crate::output::OutputManager;

pub const FEED_EXAMPLES: &[ExampleGroup] = &[
    ExampleGroup {
        title: "Timelines",
        commands: &[
            "chirp feed                      # Home timeline",
            "chirp feed --user bob           # Tweets by @bob",
            "chirp feed --user bob --likes   # Tweets @bob liked",
            "chirp feed --pages 3            # Load three pages",
        ],
    },
    ExampleGroup {
        title: "Scripting",
        commands: &["chirp --output json feed | jq '.pages[].items[].id'"],
    },
];

pub const POST_EXAMPLES: &[ExampleGroup] = &[ExampleGroup {
    title: "Compose",
    commands: &[
        "chirp post \"hello world\"",
        "chirp post \"look\" --media cat.png --media dog.jpg",
        "chirp post \"agreed\" --reply-to t_123",
    ],
}];

#[derive(Args)]
pub struct FeedArgs {
    /// Show one user's tweets instead of the home timeline
    #[arg(long)]
    pub user: Option<String>,

    /// With --user, the tweets they liked
    #[arg(long, requires = "user")]
    pub likes: bool,

    /// Number of pages to load
    #[arg(long, default_value_t = 1)]
    pub pages: usize,
}

#[derive(Args)]
pub struct TweetArgs {
    pub id: String,
}

#[derive(Args)]
pub struct PostArgs {
    /// Tweet text
    pub text: Option<String>,

    /// Post as a reply to this tweet
    #[arg(long)]
    pub reply_to: Option<String>,

    /// Attach a file (repeatable)
    #[arg(long)]
    pub media: Vec<PathBuf>,
}

#[derive(Args)]
pub struct SearchArgs {
    pub query: String,

    /// Search users instead of tweets
    #[arg(long)]
    pub users: bool,
}

pub async fn handle_feed(args: FeedArgs, ctx: &SessionContext, output: &OutputManager) -> Result<()> {
    let list = match (args.user, args.likes) {
        (Some(user), true) => TweetList::LikedBy(user),
        (Some(user), false) => TweetList::ByUser(user),
        (None, _) => TweetList::Home,
    };
    let queries = ctx.chirp.queries();
    let mut pages = queries.tweets(&list).await?;
    while pages.pages.len() < args.pages && pages.has_more() {
        pages = queries.more_tweets(&list).await?;
    }
    output.display(&pages)?;
    if pages.has_more() {
        output.verbose("more tweets available, pass --pages to load them");
    }
    Ok(())
}

pub async fn handle_tweet(args: TweetArgs, ctx: &SessionContext, output: &OutputManager) -> Result<()> {
    let queries = ctx.chirp.queries();
    let tweet = queries.tweet(&args.id).await?;
    output.display(&tweet)?;

    let replies = queries.tweets(&TweetList::Replies(args.id)).await?;
    if !replies.is_empty() {
        output.heading(&format!("Replies ({})", tweet.counts.replies));
        output.display(&replies)?;
    }
    Ok(())
}

fn guess_mime(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);
    match extension.as_deref() {
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("mp4") => "video/mp4",
        Some("mov") => "video/quicktime",
        _ => "application/octet-stream",
    }
}

async fn read_upload(path: &Path) -> Result<Upload> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "upload".to_string());
    Ok(Upload {
        file_name,
        mime: guess_mime(path).to_string(),
        bytes,
    })
}

pub async fn handle_post(args: PostArgs, ctx: &SessionContext, output: &OutputManager) -> Result<()> {
    let mut media = Vec::with_capacity(args.media.len());
    for path in &args.media {
        media.push(read_upload(path).await?);
    }
    let compose = ComposeTweet {
        content: args.text,
        media,
        parent_id: None,
    };

    let mutations = ctx.chirp.mutations();
    let tweet = match &args.reply_to {
        Some(parent_id) => mutations.reply(parent_id, compose).await?,
        None => mutations.create_tweet(compose).await?,
    };
    output.success(&format!("Posted {}", tweet.id));
    output.display(&tweet)?;
    Ok(())
}

pub async fn handle_delete(args: TweetArgs, ctx: &SessionContext, output: &OutputManager) -> Result<()> {
    ctx.chirp.mutations().delete_tweet(&args.id).await?;
    output.success(&format!("Deleted {}", args.id));
    Ok(())
}

pub async fn handle_search(args: SearchArgs, ctx: &SessionContext, output: &OutputManager) -> Result<()> {
    let queries = ctx.chirp.queries();
    if args.users {
        let users = queries.users(&UserList::Search(args.query)).await?;
        output.display(&users)?;
    } else {
        let tweets = queries.tweets(&TweetList::Search(args.query)).await?;
        output.display(&tweets)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guess_mime() {
        assert_eq!(guess_mime(Path::new("cat.PNG")), "image/png");
        assert_eq!(guess_mime(Path::new("clip.mp4")), "video/mp4");
        assert_eq!(guess_mime(Path::new("notes")), "application/octet-stream");
    }
}
