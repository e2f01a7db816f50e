pub mod auth;
pub mod feed;
pub mod notifications;
pub mod social;
