pub mod cache_store;
pub mod collection_repo;
pub mod event_repo;
pub mod repository_repo;
pub mod schema;
pub mod skillet_repo;
pub mod store;
pub mod util;

pub use cache_store::SqliteCache;
pub use store::DbStore;
