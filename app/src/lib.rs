//! # Vireo App
//!
//! Frame loop driver for the Vireo headset renderer.
//!
//! ## Overview
//!
//! - [`AppHandler`] - Trait for building the scene and updating it per frame
//! - [`AppArgs`] - Command line arguments
//! - [`App`] - Owns the headset and renderer and runs the frame loop
//! - [`DemoScene`] - The scene the `vireo` binary shows
//!
//! ## Example
//!
//! ```ignore
//! use vireo_app::{App, AppArgs, AppContext, AppError, AppHandler, Scene};
//!
//! struct MyScene;
//!
//! impl AppHandler for MyScene {
//!     fn on_init(&mut self, ctx: &mut AppContext) -> Result<Scene, AppError> {
//!         Ok(build_scene())
//!     }
//! }
//!
//! fn main() {
//!     App::run(MyScene, AppArgs::parse()).unwrap();
//! }
//! ```

mod app;
mod args;
mod context;
mod error;
mod handler;
mod scene;

pub use app::{App, RunSummary};
pub use args::AppArgs;
pub use context::{AppContext, LightState, UpdateContext};
pub use error::AppError;
pub use handler::AppHandler;
pub use scene::{DemoScene, Scene};

/// App library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the app subsystem.
pub fn init() {
    log::info!("Vireo App v{} initialized", VERSION);
}
