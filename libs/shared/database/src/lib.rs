pub mod context;
pub mod error;
pub mod memory;
pub mod store;
pub mod supabase;

pub use context::{collections, AppContext, RELEASED_STATUSES};
pub use error::DatabaseError;
pub use store::{DocumentStore, Filter, UniqueIndex};
