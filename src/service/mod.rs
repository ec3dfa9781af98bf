pub mod chat_service;
pub mod key_service;
