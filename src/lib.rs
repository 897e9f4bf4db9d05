pub mod cli;
pub mod config;
pub mod embeddings;
pub mod errors;
pub mod llm;
pub mod logging;
pub mod models;
pub mod rag;
pub mod storage;


pub use config::AppConfig;
pub use errors::*;
pub use models::Document;
pub use models::DocumentIdentity;
pub use models::FusionResult;
pub use models::RankedList;
pub use rag::fuse;
pub use rag::RagService;
pub use rag::RankFusion;
