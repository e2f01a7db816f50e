use anyhow::Result;
use chirp::{CacheEvent, Domain};
use clap::Args;
use tokio::sync::broadcast::error::RecvError;

use crate::context::SessionContext;
use crate::examples::ExampleGroup;
use crate::output::OutputManager;

pub const NOTIFICATIONS_EXAMPLES: &[ExampleGroup] = &[ExampleGroup {
    title: "Notifications",
    commands: &[
        "chirp notifications              # List with unread markers",
        "chirp notifications --mark-read  # List, then mark the shown ones read",
    ],
}];

pub const WATCH_EXAMPLES: &[ExampleGroup] = &[ExampleGroup {
    title: "Live Invalidation",
    commands: &[
        "chirp watch                      # Print every invalidated key",
        "RUST_LOG=chirp=debug chirp watch # Include reconnect details",
    ],
}];

#[derive(Args)]
pub struct NotificationsArgs {
    /// Mark the listed notifications as read
    #[arg(long)]
    pub mark_read: bool,
}

pub async fn handle_notifications(
    args: NotificationsArgs,
    ctx: &SessionContext,
    output: &OutputManager,
) -> Result<()> {
    let queries = ctx.chirp.queries();
    let notifications = queries.notifications().await?;
    let unread = queries.unread_count().await?;
    output.display(&notifications)?;
    output.key_value("Unread", &unread.to_string());

    if args.mark_read {
        let ids: Vec<String> = notifications
            .iter()
            .filter(|notification| !notification.read)
            .map(|notification| notification.id.clone())
            .collect();
        if ids.is_empty() {
            output.info("Nothing to mark");
        } else {
            ctx.chirp.mutations().mark_notifications_read(&ids).await?;
            output.success(&format!("Marked {} notification(s) read", ids.len()));
        }
    }
    Ok(())
}

/// Runs the push channel and prints each invalidation until interrupted.
pub async fn handle_watch(ctx: &SessionContext, output: &OutputManager) -> Result<()> {
    let mut events = ctx.chirp.cache().subscribe();
    let channel = ctx.chirp.http_push_channel()?;
    let task = channel.spawn();
    output.info(&format!(
        "Watching {} (Ctrl-C to stop)",
        Domain::ALL.map(Domain::as_str).join(", ")
    ));

    loop {
        match events.recv().await {
            Ok(CacheEvent::Invalidated { filter, keys }) => {
                let noun = if keys.len() == 1 { "entry" } else { "entries" };
                output.bullet(&format!("{filter} ({} cached {noun})", keys.len()));
            }
            Ok(_) => {}
            Err(RecvError::Lagged(skipped)) => output.warning(&format!("skipped {skipped} event(s)")),
            Err(RecvError::Closed) => break,
        }
        if task.is_finished() {
            break;
        }
    }
    Ok(())
}
