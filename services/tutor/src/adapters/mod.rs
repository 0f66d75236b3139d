pub mod auth;
pub mod db;
pub mod kv_store;
pub mod llm;

pub use auth::PgAuthService;
pub use db::PgContentStore;
pub use kv_store::FileStore;
pub use llm::{OpenAiChatAdapter, UnconfiguredModel};
