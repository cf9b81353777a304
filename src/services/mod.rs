pub mod auth;
pub mod cache;
pub mod documents;
pub mod google_auth;
pub mod health;
pub mod idp;
