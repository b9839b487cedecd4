pub mod app;
pub mod input;
pub mod level;
pub mod player;
pub mod renderer;
pub mod sandbox;
pub mod settings;
