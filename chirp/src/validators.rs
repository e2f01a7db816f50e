//! Local checks run before signup, profile, and compose requests are sent.

use email_address::EmailAddress;
use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

use crate::errors::{ValidationError, ValidationIssue, ValidationResult};
use crate::models::{ComposeTweet, ProfileUpdate, SignupForm};

pub const MAX_TWEET_LENGTH: usize = 280;
pub const MAX_BIO_LENGTH: usize = 160;
pub const MAX_NAME_LENGTH: usize = 50;
pub const MAX_MEDIA: usize = 4;
pub const MIN_PASSWORD_LENGTH: usize = 8;

static USERNAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9_]{3,15}$").expect("valid username regex"));

/// Returns `true` if the provided string is a syntactically valid email address.
pub fn is_valid_email(value: &str) -> bool {
    EmailAddress::is_valid(value)
}

/// Returns `true` if the provided string parses as an http(s) URL.
pub fn is_valid_url(value: &str) -> bool {
    Url::parse(value).is_ok_and(|url| matches!(url.scheme(), "http" | "https"))
}

pub fn is_valid_username(value: &str) -> bool {
    USERNAME.is_match(value)
}

fn finish(issues: Vec<ValidationIssue>) -> ValidationResult<()> {
    if issues.is_empty() {
        Ok(())
    } else {
        Err(ValidationError::new(issues))
    }
}

fn check_name(name: &str, issues: &mut Vec<ValidationIssue>) {
    let len = name.trim().chars().count();
    if len == 0 {
        issues.push(ValidationIssue::new("name", "required", "name is required"));
    } else if len > MAX_NAME_LENGTH {
        issues.push(ValidationIssue::new(
            "name",
            "too_long",
            format!("name must be at most {MAX_NAME_LENGTH} characters"),
        ));
    }
}

pub fn validate_signup(form: &SignupForm) -> ValidationResult<()> {
    let mut issues = Vec::new();
    if !is_valid_username(&form.username) {
        issues.push(ValidationIssue::new(
            "username",
            "pattern",
            "username must be 3-15 letters, digits, or underscores",
        ));
    }
    check_name(&form.name, &mut issues);
    if !is_valid_email(&form.email) {
        issues.push(ValidationIssue::new("email", "email", "email address is invalid"));
    }
    if form.password.chars().count() < MIN_PASSWORD_LENGTH {
        issues.push(ValidationIssue::new(
            "password",
            "too_short",
            format!("password must be at least {MIN_PASSWORD_LENGTH} characters"),
        ));
    }
    finish(issues)
}

pub fn validate_profile(update: &ProfileUpdate) -> ValidationResult<()> {
    let mut issues = Vec::new();
    if let Some(name) = &update.name {
        check_name(name, &mut issues);
    }
    if let Some(bio) = &update.bio
        && bio.chars().count() > MAX_BIO_LENGTH
    {
        issues.push(ValidationIssue::new(
            "bio",
            "too_long",
            format!("bio must be at most {MAX_BIO_LENGTH} characters"),
        ));
    }
    if let Some(website) = &update.website
        && !website.is_empty()
        && !is_valid_url(website)
    {
        issues.push(ValidationIssue::new("website", "url", "website must be an http(s) URL"));
    }
    finish(issues)
}

pub fn validate_compose(tweet: &ComposeTweet) -> ValidationResult<()> {
    let mut issues = Vec::new();
    let content = tweet.content.as_deref().map(str::trim).unwrap_or_default();
    if content.is_empty() && tweet.media.is_empty() {
        issues.push(ValidationIssue::new("content", "required", "a tweet needs text or media"));
    }
    if content.chars().count() > MAX_TWEET_LENGTH {
        issues.push(ValidationIssue::new(
            "content",
            "too_long",
            format!("tweets are limited to {MAX_TWEET_LENGTH} characters"),
        ));
    }
    if tweet.media.len() > MAX_MEDIA {
        issues.push(ValidationIssue::new(
            "media",
            "too_many",
            format!("at most {MAX_MEDIA} attachments"),
        ));
    }
    finish(issues)
}
