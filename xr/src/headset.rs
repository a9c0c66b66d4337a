//! Head-mounted display session and frame state machine.
//!
//! The session state only changes through events read from the runtime.
//! Each frame is bracketed by [`Headset::begin_frame`] and
//! [`Headset::end_frame`]:
//!
//! ```ignore
//! match headset.begin_frame() {
//!     BeginFrameResult::RenderFully { swapchain_image_index } => {
//!         renderer.render(&headset, &objects, headset.camera_matrix, swapchain_image_index, time, light);
//!         renderer.submit(false);
//!         headset.end_frame();
//!     }
//!     BeginFrameResult::SkipRender => headset.end_frame(),
//!     BeginFrameResult::SkipFully => {}
//!     BeginFrameResult::Error(e) => return Err(e),
//! }
//! ```

use std::sync::Arc;

use ash::vk;
use glam::{Mat4, Quat, Vec3};
use vireo_core::math::{projection_from_fov, view_from_pose};
use vireo_core::Pose;
use vireo_graphics::{
    GpuImage, GraphicsDevice, GraphicsError, ImageDescriptor, RenderPass, RenderTarget,
    StereoTarget,
};

use crate::runtime::{
    FrameTiming, ProjectionLayer, SessionEvent, SessionState, ViewLocation, XrRuntime,
};

/// Number of eyes the multiview render pass draws.
pub const EYE_COUNT: usize = 2;

/// Headset configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeadsetConfig {
    pub near_clip: f32,
    pub far_clip: f32,
    /// Swapchain and multisampled color format.
    pub color_format: vk::Format,
    pub depth_format: vk::Format,
}

impl Default for HeadsetConfig {
    fn default() -> Self {
        Self {
            near_clip: 0.01,
            far_clip: 250.0,
            color_format: vk::Format::R8G8B8A8_SRGB,
            depth_format: vk::Format::D32_SFLOAT,
        }
    }
}

/// What the caller should do with the current loop iteration.
#[derive(Debug, Clone, PartialEq)]
pub enum BeginFrameResult {
    /// A runtime call failed. The headset cannot continue.
    Error(GraphicsError),
    /// Render into the given swapchain image, then call `end_frame`.
    RenderFully { swapchain_image_index: usize },
    /// Do not render, but call `end_frame`.
    SkipRender,
    /// Do not render and do not call `end_frame`.
    SkipFully,
}

/// The headset: XR session, swapchain render targets and eye matrices.
pub struct Headset {
    render_targets: Vec<RenderTarget>,
    color_buffer: GpuImage,
    depth_buffer: GpuImage,
    render_pass: RenderPass,
    runtime: XrRuntime,
    config: HeadsetConfig,

    session_state: SessionState,
    session_running: bool,
    exit_requested: bool,
    frame_timing: Option<FrameTiming>,
    image_acquired: bool,
    tracked: bool,
    dropped_frames: u64,

    eye_extent: vk::Extent2D,
    eye_resolutions: Vec<vk::Extent2D>,
    eye_views: Vec<ViewLocation>,
    eye_view_matrices: Vec<Mat4>,
    eye_projection_matrices: Vec<Mat4>,

    viewer_position: Vec3,
    viewer_position_offset: Vec3,
    viewer_orientation: Quat,
    /// Extra transform applied on top of the eye views, e.g. by a camera
    /// controller.
    pub camera_matrix: Mat4,
    /// Transform of the viewer in the reference space.
    pub world_matrix: Mat4,

    device: Arc<GraphicsDevice>,
}

impl Headset {
    /// Create the render pass, the multisampled color and depth buffers and
    /// the swapchain with one render target per image.
    pub fn new(
        device: &Arc<GraphicsDevice>,
        mut runtime: XrRuntime,
        config: HeadsetConfig,
    ) -> Result<Self, GraphicsError> {
        let samples = device.limits().multisample_count;
        let render_pass =
            RenderPass::multiview(device, config.color_format, config.depth_format, samples)?;

        let eye_resolutions = runtime.eye_resolutions()?;
        if eye_resolutions.len() != EYE_COUNT {
            return Err(GraphicsError::FeatureNotSupported(format!(
                "stereo view configuration with {} eyes",
                eye_resolutions.len()
            )));
        }
        let eye_extent = eye_resolutions[0];

        if !runtime.swapchain_formats()?.contains(&config.color_format) {
            return Err(GraphicsError::FeatureNotSupported(format!(
                "swapchain color format {:?}",
                config.color_format
            )));
        }

        let color_buffer = GpuImage::new(
            device,
            ImageDescriptor {
                extent: eye_extent,
                format: config.color_format,
                samples,
                usage: vk::ImageUsageFlags::COLOR_ATTACHMENT,
                aspect: vk::ImageAspectFlags::COLOR,
                layer_count: EYE_COUNT as u32,
            },
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        )?;
        let depth_buffer = GpuImage::new(
            device,
            ImageDescriptor {
                extent: eye_extent,
                format: config.depth_format,
                samples,
                usage: vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT,
                aspect: vk::ImageAspectFlags::DEPTH,
                layer_count: EYE_COUNT as u32,
            },
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        )?;

        let images =
            runtime.create_swapchain(eye_extent, config.color_format, EYE_COUNT as u32)?;
        let render_targets = images
            .into_iter()
            .map(|image| {
                RenderTarget::new(device, image, &render_pass, &color_buffer, &depth_buffer)
            })
            .collect::<Result<Vec<_>, _>>()?;

        log::info!(
            "Headset created: {} runtime, {}x{} per eye, {} swapchain images, {:?}",
            runtime.name(),
            eye_extent.width,
            eye_extent.height,
            render_targets.len(),
            samples
        );

        Ok(Self {
            render_targets,
            color_buffer,
            depth_buffer,
            render_pass,
            runtime,
            config,
            session_state: SessionState::Unknown,
            session_running: false,
            exit_requested: false,
            frame_timing: None,
            image_acquired: false,
            tracked: false,
            dropped_frames: 0,
            eye_extent,
            eye_resolutions,
            eye_views: vec![ViewLocation::default(); EYE_COUNT],
            eye_view_matrices: vec![Mat4::IDENTITY; EYE_COUNT],
            eye_projection_matrices: vec![Mat4::IDENTITY; EYE_COUNT],
            viewer_position: Vec3::ZERO,
            viewer_position_offset: Vec3::ZERO,
            viewer_orientation: Quat::IDENTITY,
            camera_matrix: Mat4::IDENTITY,
            world_matrix: Mat4::IDENTITY,
            device: Arc::clone(device),
        })
    }

    /// Process pending runtime events and start the next frame.
    pub fn begin_frame(&mut self) -> BeginFrameResult {
        match self.try_begin_frame() {
            Ok(result) => result,
            Err(e) => BeginFrameResult::Error(e),
        }
    }

    fn try_begin_frame(&mut self) -> Result<BeginFrameResult, GraphicsError> {
        while let Some(event) = self.runtime.poll_event()? {
            match event {
                SessionEvent::InstanceLossPending => {
                    log::warn!("XR instance loss pending");
                    self.exit_requested = true;
                    return Ok(BeginFrameResult::SkipFully);
                }
                SessionEvent::EventsLost(count) => {
                    log::warn!("XR runtime lost {} events", count);
                }
                SessionEvent::StateChanged(state) => {
                    log::debug!("Session state: {:?} -> {:?}", self.session_state, state);
                    self.session_state = state;

                    match state {
                        SessionState::Ready => {
                            self.runtime.begin_session()?;
                            self.session_running = true;
                        }
                        SessionState::Stopping => {
                            self.session_running = false;
                            self.runtime.end_session()?;
                        }
                        SessionState::LossPending | SessionState::Exiting => {
                            self.exit_requested = true;
                            return Ok(BeginFrameResult::SkipFully);
                        }
                        _ => {}
                    }
                }
            }
        }

        if !self.session_state.is_running() {
            return Ok(BeginFrameResult::SkipFully);
        }

        let timing = self.runtime.wait_frame()?;
        self.runtime.begin_frame()?;
        self.frame_timing = Some(timing);
        self.tracked = false;

        if !timing.should_render {
            return Ok(BeginFrameResult::SkipRender);
        }

        let located = self.runtime.locate_views(timing.predicted_display_time)?;
        if located.views.len() != EYE_COUNT {
            return Err(GraphicsError::GenericOpenXr(format!(
                "runtime located {} views for {} eyes",
                located.views.len(),
                EYE_COUNT
            )));
        }
        self.tracked = located.is_tracked();
        self.update_eyes(&located.views);

        let swapchain_image_index = self.runtime.acquire_swapchain_image()?;
        self.image_acquired = true;
        if swapchain_image_index >= self.render_targets.len() {
            return Err(GraphicsError::GenericOpenXr(format!(
                "swapchain image {} out of {}",
                swapchain_image_index,
                self.render_targets.len()
            )));
        }

        Ok(BeginFrameResult::RenderFully {
            swapchain_image_index,
        })
    }

    /// Store the eye matrices and move the viewer to the midpoint between
    /// the eyes, oriented like eye 0.
    fn update_eyes(&mut self, views: &[ViewLocation]) {
        for (eye, view) in views.iter().enumerate() {
            self.eye_views[eye] = *view;
            self.eye_view_matrices[eye] = view_from_pose(&view.pose);
            self.eye_projection_matrices[eye] =
                projection_from_fov(&view.fov, self.config.near_clip, self.config.far_clip);
        }

        let center = views.iter().map(|view| view.pose.position).sum::<Vec3>() / views.len() as f32;
        self.viewer_position = center - self.viewer_position_offset;
        self.viewer_orientation = views[0].pose.orientation;
        self.world_matrix = Mat4::from_translation(self.viewer_position)
            * Mat4::from_quat(self.viewer_orientation);
    }

    /// Release the swapchain image and hand the frame to the compositor.
    ///
    /// The projection layer is only submitted when the runtime asked for
    /// rendering and the eyes were tracked; otherwise the frame ends with
    /// no layers. Failures drop the frame.
    pub fn end_frame(&mut self) {
        let Some(timing) = self.frame_timing.take() else {
            log::warn!("end_frame called without a begun frame");
            return;
        };

        if std::mem::take(&mut self.image_acquired) {
            if let Err(e) = self.runtime.release_swapchain_image() {
                self.drop_frame(&e);
                return;
            }
        }

        let layer = (timing.should_render && self.tracked).then_some(ProjectionLayer {
            views: &self.eye_views,
            eye_extent: self.eye_extent,
        });
        if let Err(e) = self.runtime.end_frame(timing.predicted_display_time, layer) {
            self.drop_frame(&e);
        }
    }

    fn drop_frame(&mut self, error: &GraphicsError) {
        self.dropped_frames += 1;
        log::warn!(
            "Dropped headset frame ({} so far): {}",
            self.dropped_frames,
            error
        );
    }

    pub fn is_exit_requested(&self) -> bool {
        self.exit_requested
    }

    pub fn session_state(&self) -> SessionState {
        self.session_state
    }

    /// Number of frames `end_frame` failed to hand to the compositor.
    pub fn dropped_frames(&self) -> u64 {
        self.dropped_frames
    }

    pub fn eye_count(&self) -> usize {
        self.eye_resolutions.len()
    }

    /// # Panics
    ///
    /// Panics if `eye` is not below [`eye_count`](Self::eye_count).
    pub fn eye_resolution(&self, eye: usize) -> vk::Extent2D {
        self.eye_resolutions[eye]
    }

    pub fn eye_view_matrix(&self, eye: usize) -> Mat4 {
        self.eye_view_matrices[eye]
    }

    pub fn eye_projection_matrix(&self, eye: usize) -> Mat4 {
        self.eye_projection_matrices[eye]
    }

    /// Pose of `eye` at the last located frame.
    pub fn eye_pose(&self, eye: usize) -> Pose {
        self.eye_views[eye].pose
    }

    pub fn render_target(&self, swapchain_image_index: usize) -> Option<&RenderTarget> {
        self.render_targets.get(swapchain_image_index)
    }

    pub fn swapchain_image_count(&self) -> usize {
        self.render_targets.len()
    }

    pub fn render_pass(&self) -> &RenderPass {
        &self.render_pass
    }

    pub fn color_buffer(&self) -> &GpuImage {
        &self.color_buffer
    }

    pub fn depth_buffer(&self) -> &GpuImage {
        &self.depth_buffer
    }

    pub fn viewer_position(&self) -> Vec3 {
        self.viewer_position
    }

    pub fn viewer_orientation(&self) -> Quat {
        self.viewer_orientation
    }

    /// Move the viewer by `offset`, for fly-style locomotion.
    pub fn add_to_viewer_position(&mut self, offset: Vec3) {
        self.viewer_position_offset += offset;
    }

    pub fn config(&self) -> &HeadsetConfig {
        &self.config
    }

    pub fn runtime(&self) -> &XrRuntime {
        &self.runtime
    }

    pub fn device(&self) -> &Arc<GraphicsDevice> {
        &self.device
    }
}

impl StereoTarget for Headset {
    fn eye_count(&self) -> usize {
        Headset::eye_count(self)
    }

    fn eye_resolution(&self, eye: usize) -> vk::Extent2D {
        Headset::eye_resolution(self, eye)
    }

    fn eye_view_matrix(&self, eye: usize) -> Mat4 {
        Headset::eye_view_matrix(self, eye)
    }

    fn eye_projection_matrix(&self, eye: usize) -> Mat4 {
        Headset::eye_projection_matrix(self, eye)
    }

    fn render_pass(&self) -> vk::RenderPass {
        self.render_pass.handle()
    }

    fn framebuffer(&self, swapchain_image_index: usize) -> Option<vk::Framebuffer> {
        self.render_target(swapchain_image_index)
            .map(RenderTarget::framebuffer)
    }
}

impl Drop for Headset {
    fn drop(&mut self) {
        if self.session_running {
            if let Err(e) = self.runtime.end_session() {
                log::warn!("Failed to end XR session at teardown: {}", e);
            }
        }
    }
}

impl std::fmt::Debug for Headset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Headset")
            .field("runtime", &self.runtime)
            .field("session_state", &self.session_state)
            .field("eye_extent", &self.eye_extent)
            .field("swapchain_images", &self.render_targets.len())
            .field("dropped_frames", &self.dropped_frames)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{DummyRuntime, RuntimeCall};

    fn headset(runtime: DummyRuntime) -> Result<Headset, GraphicsError> {
        let device = Arc::new(GraphicsDevice::dummy());
        Headset::new(&device, XrRuntime::Dummy(runtime), HeadsetConfig::default())
    }

    #[test]
    fn creates_layered_buffers_and_swapchain() {
        let runtime = DummyRuntime::new().with_swapchain_image_count(4);
        let handle = runtime.handle();
        let headset = headset(runtime).unwrap();

        assert_eq!(headset.swapchain_image_count(), 4);
        assert_eq!(headset.color_buffer().layer_count(), 2);
        assert_eq!(
            headset.depth_buffer().descriptor().samples,
            vk::SampleCountFlags::TYPE_4
        );
        assert_eq!(
            handle.calls(),
            vec![RuntimeCall::CreateSwapchain {
                extent: vk::Extent2D {
                    width: 1440,
                    height: 1600
                },
                format: vk::Format::R8G8B8A8_SRGB,
                layer_count: 2,
            }]
        );
    }

    #[test]
    fn rejects_mono_view_configuration() {
        let runtime = DummyRuntime::new().with_eye_resolutions(vec![vk::Extent2D {
            width: 1024,
            height: 1024,
        }]);
        assert!(matches!(
            headset(runtime),
            Err(GraphicsError::FeatureNotSupported(_))
        ));
    }

    #[test]
    fn rejects_unsupported_color_format() {
        let runtime = DummyRuntime::new().with_swapchain_formats(vec![vk::Format::B8G8R8A8_UNORM]);
        assert!(matches!(
            headset(runtime),
            Err(GraphicsError::FeatureNotSupported(_))
        ));
    }

    #[test]
    fn viewer_position_subtracts_offset() {
        let mut headset = headset(DummyRuntime::started()).unwrap();
        headset.add_to_viewer_position(Vec3::new(0.0, 0.0, 2.0));

        assert!(matches!(
            headset.begin_frame(),
            BeginFrameResult::RenderFully { .. }
        ));
        let position = headset.viewer_position();
        assert!(position.x.abs() < 1e-6);
        assert!((position.y - 1.6).abs() < 1e-6);
        assert!((position.z + 2.0).abs() < 1e-6);
        assert_eq!(headset.world_matrix.w_axis.truncate(), position);
        headset.end_frame();
    }

    #[test]
    fn teardown_ends_running_session() {
        let runtime = DummyRuntime::started();
        let handle = runtime.handle();
        let mut headset = headset(runtime).unwrap();
        assert_eq!(headset.begin_frame(), BeginFrameResult::RenderFully {
            swapchain_image_index: 0
        });
        headset.end_frame();
        assert!(handle.session_running());

        drop(headset);
        assert!(!handle.session_running());
        assert_eq!(handle.count(&RuntimeCall::EndSession), 1);
    }
}
