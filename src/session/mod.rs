pub mod ack;
pub mod lifecycle;
pub mod offline;
pub mod recorder;
pub mod registrar;
pub mod rooms;
