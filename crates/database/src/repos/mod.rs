//! Repository implementations backed by SQLite

pub mod message_repository;

pub use message_repository::MessageRepository;
