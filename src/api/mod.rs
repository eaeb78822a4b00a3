pub mod chat;
pub mod map;
