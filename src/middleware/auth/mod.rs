//! Authentication and authorization middleware.
//!
//! `access` runs the authentication pipeline and stores the `Identity` in
//! request extensions; `require` enforces a route's declared `Requirement`.
//! Handlers only ever see an identity that passed both.
pub mod access;
pub mod require;
