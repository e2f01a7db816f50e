use anyhow::Result;
use chirp::models::{Credentials, SignupForm};
use clap::Args;

use crate::context::SessionContext;
use crate::examples::ExampleGroup;
use crate::output::OutputManager;

pub const LOGIN_EXAMPLES: &[ExampleGroup] = &[ExampleGroup {
    title: "Log In",
    commands: &[
        "chirp login alice@example.com                # Password from CHIRP_PASSWORD",
        "chirp login alice@example.com --password pw  # Inline password",
    ],
}];

pub const SIGNUP_EXAMPLES: &[ExampleGroup] = &[ExampleGroup {
    title: "Create an Account",
    commands: &["chirp signup alice \"Alice Liddell\" alice@example.com --password hunter22"],
}];

#[derive(Args)]
pub struct LoginArgs {
    /// Account email
    pub email: String,

    /// Account password
    #[arg(long, env = "CHIRP_PASSWORD", hide_env_values = true)]
    pub password: String,
}

#[derive(Args)]
pub struct SignupArgs {
    /// Handle, 3-15 letters, digits or underscores
    pub username: String,

    /// Display name
    pub name: String,

    pub email: String,

    #[arg(long, env = "CHIRP_PASSWORD", hide_env_values = true)]
    pub password: String,
}

pub async fn handle_login(args: LoginArgs, ctx: &SessionContext, output: &OutputManager) -> Result<()> {
    let credentials = Credentials {
        email: args.email,
        password: args.password,
    };
    let user = ctx.chirp.login(&credentials).await?;
    output.success(&format!("Logged in as @{}", user.username));
    output.verbose(&format!("session stored in {}", ctx.session_path.display()));
    Ok(())
}

pub async fn handle_signup(args: SignupArgs, ctx: &SessionContext, output: &OutputManager) -> Result<()> {
    let form = SignupForm {
        username: args.username,
        name: args.name,
        email: args.email,
        password: args.password,
    };
    let user = ctx.chirp.signup(&form).await?;
    output.success(&format!("Welcome, @{}", user.username));
    Ok(())
}

pub async fn handle_logout(ctx: &SessionContext, output: &OutputManager) -> Result<()> {
    let outcome = ctx.chirp.logout().await;
    ctx.clear()?;
    match outcome {
        Ok(()) => output.success("Logged out"),
        Err(err) => output.warning(&format!("Local session removed; server logout failed: {err}")),
    }
    Ok(())
}

pub async fn handle_whoami(ctx: &SessionContext, output: &OutputManager) -> Result<()> {
    let user = ctx.chirp.queries().me().await?;
    output.display(&user)?;
    output.verbose(&format!("config: {}", ctx.config_path.display()));
    output.verbose(&format!("api: {}", ctx.chirp.api().endpoint()));
    Ok(())
}
