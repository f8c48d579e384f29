//! `tasker-store`: SQLite persistence for tasks and execution history.

pub mod db;
pub mod error;
pub mod store;
pub mod types;

pub use error::{Result, StoreError};
pub use store::TaskStore;
pub use types::{ExecutionFilter, ExecutionPage, ExecutionRecord, Pagination};
