pub mod chat;
pub mod proxy;
