pub mod config;
pub mod crossing;
pub mod frame;
pub mod physics;
pub mod placement;
pub mod portal;
pub mod projection;
