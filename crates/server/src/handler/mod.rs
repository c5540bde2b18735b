pub mod chat;
pub mod embeddings;
pub mod images;
pub mod models;
pub mod native;
