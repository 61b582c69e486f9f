pub mod api;
pub mod carousel;
pub mod config;
pub mod dashboard;
pub mod diary;
pub mod error;
pub mod forms;
pub mod models;
pub mod session;
pub mod storage;
pub mod validation;

pub use api::{ApiClient, DiaryBackend};
pub use config::Config;
pub use error::{ClientError, ClientResult};
pub use session::{Session, UserUpdate};
pub use storage::{FileStore, KeyValueStore, MemoryStore};
