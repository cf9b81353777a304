pub mod firestore;
pub mod store;
pub mod valkey;

pub use firestore::FirestoreStore;
pub use store::{Document, DocumentStore, StoreError};
pub use valkey::ValkeyDocumentStore;
