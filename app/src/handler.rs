//! Application handler trait.

use crate::context::{AppContext, UpdateContext};
use crate::error::AppError;
use crate::scene::Scene;

/// Application logic driven by [`App`](crate::App).
///
/// # Lifecycle
///
/// 1. `on_init` - Called once after the headset is created; returns the
///    scene the renderer is built for
/// 2. `on_update` - Called on every frame that will be rendered
/// 3. `on_shutdown` - Called after the device is idle, before teardown
pub trait AppHandler {
    fn on_init(&mut self, ctx: &mut AppContext) -> Result<Scene, AppError>;

    /// Move objects and the viewer for the coming frame.
    ///
    /// HUD objects are re-anchored to the headset after this returns.
    /// Returns `true` to continue running, `false` to exit.
    fn on_update(&mut self, _ctx: &mut UpdateContext<'_>) -> bool {
        true
    }

    fn on_shutdown(&mut self, _ctx: &AppContext) {}
}
