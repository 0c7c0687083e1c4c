//! Umbra bridge: render_api backends on top of umbra-renderer.

mod plugin;
mod window_backend;

pub use plugin::UmbraPlugin;
pub use window_backend::UmbraWindowBackend;
