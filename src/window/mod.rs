pub mod cursors;
pub mod draw;
pub mod error;
pub mod frame;
pub mod manager;
pub mod registry;
