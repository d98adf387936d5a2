pub mod kv_store;
pub mod store_error;

pub use kv_store::Store;
pub use store_error::StoreError;
