pub mod client;
pub mod firebase;

pub use client::{DecodedClaims, IdentityProvider, ProviderError, UserLookup, UserRecord};
pub use firebase::FirebaseAuth;
