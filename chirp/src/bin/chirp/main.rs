mod commands;
mod context;
mod examples;
mod output;
mod theme;

use std::fmt::Write;
use std::io::{self, Write as IoWrite};
use std::path::PathBuf;

use anyhow::Result;
use chirp::ApiError;
use clap::{
    ColorChoice, Command, CommandFactory, FromArgMatches, Parser, Subcommand,
    builder::{
        Styles,
        styling::{AnsiColor, Color as ClapColor, RgbColor, Style},
    },
    error::ErrorKind,
};
use colored::{Color as ThemeColor, Colorize, control::ShouldColorize};

use commands::{
    auth::{LoginArgs, SignupArgs, handle_login, handle_logout, handle_signup, handle_whoami},
    feed::{FeedArgs, PostArgs, SearchArgs, TweetArgs, handle_delete, handle_feed, handle_post, handle_search, handle_tweet},
    notifications::{NotificationsArgs, handle_notifications, handle_watch},
    social::{
        EditProfileArgs, ProfileArgs, TargetTweet, TargetUser, Toggle, handle_edit_profile, handle_follow,
        handle_like, handle_profile, handle_repost,
    },
};
use context::SessionContext;
use examples::{ExampleGroup, command_examples};
use output::{GlobalOptions, OutputFormat, OutputManager};
use theme::{ICONS, THEME};

const ENVIRONMENT_VARIABLES: &[(&str, &str)] = &[
    ("CHIRP_API_URL", "API host, used when config.toml sets no base_url"),
    ("CHIRP_CONFIG", "Path to config.toml (default ~/.chirp/config.toml)"),
    ("CHIRP_PASSWORD", "Password for login and signup"),
    ("RUST_LOG", "Log filter, e.g. chirp=debug"),
];

#[derive(Parser)]
#[command(name = "chirp")]
#[command(version = "0.1.0")]
#[command(
    about = "Terminal client for the chirp social network",
    long_about = r#"Terminal client for the chirp social network:

• Timelines, threads, profiles and search
• Posting, replies and media uploads
• Likes, reposts and follows
• Notifications and a live invalidation stream

The session (access token and refresh cookie) is kept in session.toml
next to config.toml and refreshed transparently.
"#
)]
#[command(subcommand_required = true, arg_required_else_help = true)]
struct Cli {
    /// Output format
    #[arg(long, value_enum, default_value = "table")]
    output: OutputFormat,

    /// Suppress output (only errors will be shown)
    #[arg(short = 'q', long)]
    quiet: bool,

    /// Enable verbose output
    #[arg(short = 'v', long)]
    verbose: bool,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,

    /// Path to config.toml
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    fn parse_with_styles() -> Self {
        let command = build_cli_command();
        let parsed = command
            .styles(help_styles())
            .try_get_matches()
            .and_then(|matches| Cli::from_arg_matches(&matches));
        match parsed {
            Ok(cli) => cli,
            Err(err) => match err.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                    let _ = print_blank_line_stdout();
                    if let Err(print_err) = err.print()
                        && print_err.kind() != io::ErrorKind::BrokenPipe
                    {
                        eprintln!("Failed to display help: {print_err}");
                    }
                    let _ = print_blank_line_stdout();
                    std::process::exit(0);
                }
                ErrorKind::MissingSubcommand | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
                    handle_missing_subcommand(err);
                }
                _ => {
                    let exit_code = err.exit_code();
                    let _ = print_blank_line_stderr();
                    if let Err(print_err) = err.print()
                        && print_err.kind() != io::ErrorKind::BrokenPipe
                    {
                        eprintln!("Failed to display error: {print_err}");
                    }
                    let _ = print_blank_line_stderr();
                    std::process::exit(exit_code);
                }
            },
        }
    }
}

fn handle_missing_subcommand(error: clap::error::Error) -> ! {
    let mut command = build_cli_command().styles(help_styles());

    let _ = print_blank_line_stderr();
    let mut stderr = io::stderr();
    if command.write_long_help(&mut stderr).is_ok() {
        let _ = IoWrite::write_all(&mut stderr, b"\n");
        let _ = IoWrite::flush(&mut stderr);
    }

    let _ = print_blank_line_stderr();
    std::process::exit(error.exit_code());
}

fn build_cli_command() -> Command {
    let use_color = detect_color_support();
    let appendix = render_top_level_appendix(use_color);
    let mut command = Cli::command().after_long_help(appendix);
    command = command.color(if use_color {
        ColorChoice::Auto
    } else {
        ColorChoice::Never
    });
    for example in command_examples() {
        if let Some(subcommand) = command.find_subcommand_mut(example.name) {
            let help_text = render_examples(example.groups, use_color);
            *subcommand = subcommand.clone().after_long_help(help_text);
        }
    }
    command
}

fn render_examples(groups: &[ExampleGroup], use_color: bool) -> String {
    let theme = &THEME;
    let mut buffer = String::new();

    let heading = stylize("Examples:", theme.highlight, true, use_color);
    let _ = writeln!(buffer, "{heading}");

    for (index, group) in groups.iter().enumerate() {
        let title = stylize(group.title, theme.primary, true, use_color);
        let _ = writeln!(buffer, "  {title}");

        for command in group.commands {
            let arrow = stylize(ICONS.arrow, theme.secondary, false, use_color);
            let command_text = stylize(command, theme.secondary, false, use_color);
            let _ = writeln!(buffer, "    {arrow} {command_text}");
        }

        if index + 1 < groups.len() {
            buffer.push('\n');
        }
    }

    buffer
}

fn render_top_level_appendix(use_color: bool) -> String {
    let theme = &THEME;
    let mut buffer = String::new();

    let env_heading = stylize("Environment Variables:", theme.highlight, true, use_color);
    let _ = writeln!(buffer, "{env_heading}");
    for (key, description) in ENVIRONMENT_VARIABLES {
        let key_text = stylize(key, theme.key, true, use_color);
        let value_text = stylize(description, theme.value, false, use_color);
        let _ = writeln!(buffer, "  {key_text}  {value_text}");
    }

    buffer.push('\n');

    let tip_heading = stylize("Tip:", theme.highlight, true, use_color);
    let tip_text = stylize(
        "Use 'chirp <command> --help' to view examples for each command.",
        theme.secondary,
        false,
        use_color,
    );
    let _ = writeln!(buffer, "{tip_heading} {tip_text}");

    buffer
}

fn print_blank_line_stdout() -> io::Result<()> {
    let mut stdout = io::stdout();
    IoWrite::write_all(&mut stdout, b"\n")?;
    IoWrite::flush(&mut stdout)
}

fn print_blank_line_stderr() -> io::Result<()> {
    let mut stderr = io::stderr();
    IoWrite::write_all(&mut stderr, b"\n")?;
    IoWrite::flush(&mut stderr)
}

fn stylize(text: &str, color: ThemeColor, bold: bool, use_color: bool) -> String {
    if use_color {
        let styled = text.color(color);
        if bold { styled.bold().to_string() } else { styled.to_string() }
    } else {
        text.to_string()
    }
}

fn detect_color_support() -> bool {
    ShouldColorize::from_env().should_colorize()
}

fn help_styles() -> Styles {
    let theme = &THEME;
    Styles::styled()
        .usage(style_from_color(theme.primary).bold())
        .header(style_from_color(theme.highlight).bold())
        .literal(style_from_color(theme.secondary))
        .placeholder(style_from_color(theme.muted))
        .valid(style_from_color(theme.success))
        .invalid(style_from_color(theme.warning))
        .error(style_from_color(theme.error).bold())
}

fn style_from_color(color: ThemeColor) -> Style {
    Style::new().fg_color(Some(color_to_clap_color(color)))
}

fn color_to_clap_color(color: ThemeColor) -> ClapColor {
    match color {
        ThemeColor::Black => ClapColor::Ansi(AnsiColor::Black),
        ThemeColor::Red => ClapColor::Ansi(AnsiColor::Red),
        ThemeColor::Green => ClapColor::Ansi(AnsiColor::Green),
        ThemeColor::Yellow => ClapColor::Ansi(AnsiColor::Yellow),
        ThemeColor::Blue => ClapColor::Ansi(AnsiColor::Blue),
        ThemeColor::Magenta => ClapColor::Ansi(AnsiColor::Magenta),
        ThemeColor::Cyan => ClapColor::Ansi(AnsiColor::Cyan),
        ThemeColor::White => ClapColor::Ansi(AnsiColor::White),
        ThemeColor::BrightBlack => ClapColor::Ansi(AnsiColor::BrightBlack),
        ThemeColor::BrightRed => ClapColor::Ansi(AnsiColor::BrightRed),
        ThemeColor::BrightGreen => ClapColor::Ansi(AnsiColor::BrightGreen),
        ThemeColor::BrightYellow => ClapColor::Ansi(AnsiColor::BrightYellow),
        ThemeColor::BrightBlue => ClapColor::Ansi(AnsiColor::BrightBlue),
        ThemeColor::BrightMagenta => ClapColor::Ansi(AnsiColor::BrightMagenta),
        ThemeColor::BrightCyan => ClapColor::Ansi(AnsiColor::BrightCyan),
        ThemeColor::BrightWhite => ClapColor::Ansi(AnsiColor::BrightWhite),
        ThemeColor::TrueColor { r, g, b } => ClapColor::Rgb(RgbColor(r, g, b)),
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Log in and store the session
    Login(LoginArgs),

    /// End the session on the server and locally
    Logout,

    /// Create an account and log in
    Signup(SignupArgs),

    /// Show the logged-in account
    Whoami,

    /// Show a timeline
    Feed(FeedArgs),

    /// Show a tweet and its replies
    Tweet(TweetArgs),

    /// Post a tweet or a reply
    Post(PostArgs),

    /// Delete one of your tweets
    Delete(TweetArgs),

    Like(TargetTweet),
    Unlike(TargetTweet),
    Repost(TargetTweet),
    Unrepost(TargetTweet),
    Follow(TargetUser),
    Unfollow(TargetUser),

    /// Show a profile, its followers, or who it follows
    Profile(ProfileArgs),

    /// Update your name, bio, location or website
    EditProfile(EditProfileArgs),

    /// Search tweets or users
    Search(SearchArgs),

    /// List notifications
    Notifications(NotificationsArgs),

    /// Stream live cache invalidations
    Watch,
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "chirp=debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter)).init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse_with_styles();
    init_logging(cli.verbose);

    let output = OutputManager::new(GlobalOptions {
        output_format: cli.output.clone(),
        quiet: cli.quiet,
        verbose: cli.verbose,
        no_color: cli.no_color,
    });
    if cli.no_color {
        colored::control::set_override(false);
    }

    let _ = print_blank_line_stdout();

    match execute(cli, &output).await {
        Ok(()) => {
            let _ = print_blank_line_stdout();
        }
        Err(err) => {
            report(&output, &err);
            let _ = print_blank_line_stdout();
            std::process::exit(1);
        }
    }
}

fn report(output: &OutputManager, err: &anyhow::Error) {
    match err.downcast_ref::<ApiError>() {
        Some(ApiError::Redirect { .. }) => {
            output.error("Not logged in");
            output.info("Run 'chirp login <email>' first.");
        }
        Some(ApiError::Authentication { .. }) => {
            output.error("Session expired");
            output.info("Run 'chirp login <email>' to start a new one.");
        }
        Some(ApiError::Validation(validation)) => {
            output.error("Validation failed");
            for issue in &validation.issues {
                output.bullet(&format!("{}: {}", issue.field, issue.message));
            }
        }
        Some(api) if api.is_operational() => output.error(&api.to_string()),
        _ => output.error(&format!("Error: {err:#}")),
    }
}

async fn execute(cli: Cli, output: &OutputManager) -> Result<()> {
    let ctx = SessionContext::open(cli.config.as_deref())?;

    let outcome = match cli.command {
        Commands::Logout => return handle_logout(&ctx, output).await,
        Commands::Login(args) => handle_login(args, &ctx, output).await,
        Commands::Signup(args) => handle_signup(args, &ctx, output).await,
        Commands::Whoami => handle_whoami(&ctx, output).await,
        Commands::Feed(args) => handle_feed(args, &ctx, output).await,
        Commands::Tweet(args) => handle_tweet(args, &ctx, output).await,
        Commands::Post(args) => handle_post(args, &ctx, output).await,
        Commands::Delete(args) => handle_delete(args, &ctx, output).await,
        Commands::Like(args) => handle_like(args, Toggle::On, &ctx, output).await,
        Commands::Unlike(args) => handle_like(args, Toggle::Off, &ctx, output).await,
        Commands::Repost(args) => handle_repost(args, Toggle::On, &ctx, output).await,
        Commands::Unrepost(args) => handle_repost(args, Toggle::Off, &ctx, output).await,
        Commands::Follow(args) => handle_follow(args, Toggle::On, &ctx, output).await,
        Commands::Unfollow(args) => handle_follow(args, Toggle::Off, &ctx, output).await,
        Commands::Profile(args) => handle_profile(args, &ctx, output).await,
        Commands::EditProfile(args) => handle_edit_profile(args, &ctx, output).await,
        Commands::Search(args) => handle_search(args, &ctx, output).await,
        Commands::Notifications(args) => handle_notifications(args, &ctx, output).await,
        Commands::Watch => handle_watch(&ctx, output).await,
    };

    // A refresh may have rotated the token, or a terminal 401 cleared it.
    ctx.save()?;
    outcome
}
