pub mod chat;
pub mod presence;
pub mod rooms;
