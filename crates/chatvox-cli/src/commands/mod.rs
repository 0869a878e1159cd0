pub mod config;
pub mod devices;
pub mod list;
pub mod play;
pub mod record;
