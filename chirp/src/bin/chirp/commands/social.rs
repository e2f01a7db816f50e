use anyhow::Result;
use chirp::UserList;
use chirp::models::ProfileUpdate;
use clap::Args;

use crate::context::SessionContext;
use crate::examples::ExampleGroup;
use crate::output::OutputManager;

pub const PROFILE_EXAMPLES: &[ExampleGroup] = &[ExampleGroup {
    title: "Profiles",
    commands: &[
        "chirp profile bob               # Profile card",
        "chirp profile bob --followers   # Who follows @bob",
        "chirp profile bob --following   # Who @bob follows",
    ],
}];

pub const EDIT_PROFILE_EXAMPLES: &[ExampleGroup] = &[ExampleGroup {
    title: "Edit Your Profile",
    commands: &[
        "chirp edit-profile --bio \"rustacean\" --website https://example.com",
        "chirp edit-profile --website \"\"   # Clear the website",
    ],
}];

/// Which side of an interaction to apply.
#[derive(Clone, Copy)]
pub enum Toggle {
    On,
    Off,
}

#[derive(Args)]
pub struct TargetTweet {
    pub id: String,
}

#[derive(Args)]
pub struct TargetUser {
    pub username: String,
}

#[derive(Args)]
pub struct ProfileArgs {
    pub username: String,

    /// List followers
    #[arg(long, conflicts_with = "following")]
    pub followers: bool,

    /// List followed accounts
    #[arg(long)]
    pub following: bool,
}

#[derive(Args)]
pub struct EditProfileArgs {
    #[arg(long)]
    pub name: Option<String>,

    #[arg(long)]
    pub bio: Option<String>,

    #[arg(long)]
    pub location: Option<String>,

    /// Empty string clears it
    #[arg(long)]
    pub website: Option<String>,
}

pub async fn handle_like(
    args: TargetTweet,
    toggle: Toggle,
    ctx: &SessionContext,
    output: &OutputManager,
) -> Result<()> {
    let mutations = ctx.chirp.mutations();
    match toggle {
        Toggle::On => {
            mutations.like(&args.id).await?;
            output.success(&format!("Liked {}", args.id));
        }
        Toggle::Off => {
            mutations.unlike(&args.id).await?;
            output.success(&format!("Unliked {}", args.id));
        }
    }
    Ok(())
}

pub async fn handle_repost(
    args: TargetTweet,
    toggle: Toggle,
    ctx: &SessionContext,
    output: &OutputManager,
) -> Result<()> {
    let mutations = ctx.chirp.mutations();
    match toggle {
        Toggle::On => {
            mutations.repost(&args.id).await?;
            output.success(&format!("Reposted {}", args.id));
        }
        Toggle::Off => {
            mutations.unrepost(&args.id).await?;
            output.success(&format!("Removed repost of {}", args.id));
        }
    }
    Ok(())
}

pub async fn handle_follow(
    args: TargetUser,
    toggle: Toggle,
    ctx: &SessionContext,
    output: &OutputManager,
) -> Result<()> {
    let mutations = ctx.chirp.mutations();
    match toggle {
        Toggle::On => {
            mutations.follow(&args.username).await?;
            output.success(&format!("Following @{}", args.username));
        }
        Toggle::Off => {
            mutations.unfollow(&args.username).await?;
            output.success(&format!("Unfollowed @{}", args.username));
        }
    }
    Ok(())
}

pub async fn handle_profile(args: ProfileArgs, ctx: &SessionContext, output: &OutputManager) -> Result<()> {
    let queries = ctx.chirp.queries();
    if args.followers || args.following {
        let list = if args.followers {
            UserList::Followers(args.username)
        } else {
            UserList::Following(args.username)
        };
        output.display(&queries.users(&list).await?)?;
        return Ok(());
    }

    let user = queries.user(&args.username).await?;
    output.display(&user)?;
    for (label, value) in [
        ("Location", &user.location),
        ("Website", &user.website),
    ] {
        if let Some(value) = value {
            output.key_value(label, value);
        }
    }
    Ok(())
}

pub async fn handle_edit_profile(
    args: EditProfileArgs,
    ctx: &SessionContext,
    output: &OutputManager,
) -> Result<()> {
    let update = ProfileUpdate {
        name: args.name,
        bio: args.bio,
        location: args.location,
        website: args.website,
    };
    let user = ctx.chirp.mutations().update_profile(&update).await?;
    output.success("Profile updated");
    output.display(&user)?;
    Ok(())
}
