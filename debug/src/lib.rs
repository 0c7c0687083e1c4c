//! Shared pieces of the debug programs: logger setup and the demo scene.

pub mod logging;
pub mod scene;

pub use logging::{init_logging, LoggingConfig};
pub use scene::{DemoScene, SceneObject};
