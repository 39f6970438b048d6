pub mod chat;
pub mod price;
pub mod stream;
