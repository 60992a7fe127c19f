//! Entity definitions for the database layer

pub mod message;

pub use message::{format_timestamp, Message, MessageContent, NewMessage};
