//! YouTube Data API v3 client for the authenticated user's liked videos.

pub mod auth;
pub mod error;
mod likes;
mod responses;

pub use auth::{Authenticator, TokenFile};
pub use likes::{build_client, YouTubeLikes};
