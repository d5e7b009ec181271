pub mod connection;
pub mod sender;
pub mod server;
