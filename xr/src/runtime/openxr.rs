//! OpenXR runtime bound to the Vulkan device.

use ::openxr as xr;
use ash::vk::{self, Handle};
use vireo_core::math::{Quat, Vec3};
use vireo_core::{Fov, Pose};
use vireo_graphics::{GraphicsDevice, GraphicsError};

use super::{FrameTiming, LocatedViews, ProjectionLayer, SessionEvent, SessionState, ViewLocation};

/// Stereo view configuration with one view per eye.
pub const VIEW_CONFIGURATION: xr::ViewConfigurationType =
    xr::ViewConfigurationType::PRIMARY_STEREO;

/// The compositor replaces what is behind the rendered image.
pub const BLEND_MODE: xr::EnvironmentBlendMode = xr::EnvironmentBlendMode::OPAQUE;

pub(crate) fn xr_error(what: &'static str) -> impl Fn(xr::sys::Result) -> GraphicsError {
    move |e| GraphicsError::GenericOpenXr(format!("{what}: {e}"))
}

/// Session, frame stream, reference space and swapchain of one OpenXR
/// instance.
pub struct OpenXrRuntime {
    // Destroyed before the session that owns it.
    swapchain: Option<xr::Swapchain<xr::Vulkan>>,
    space: xr::Space,
    frame_stream: xr::FrameStream<xr::Vulkan>,
    frame_waiter: xr::FrameWaiter,
    session: xr::Session<xr::Vulkan>,
    event_storage: xr::EventDataBuffer,
    system: xr::SystemId,
    instance: xr::Instance,
}

impl std::fmt::Debug for OpenXrRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenXrRuntime")
            .field("system", &self.system)
            .field("has_swapchain", &self.swapchain.is_some())
            .finish_non_exhaustive()
    }
}

impl OpenXrRuntime {
    /// Create a session on `device` and a reference space of type
    /// `reference_space`.
    ///
    /// The graphics requirements of `system` must have been queried before.
    pub fn new(
        instance: xr::Instance,
        system: xr::SystemId,
        device: &GraphicsDevice,
        reference_space: xr::ReferenceSpaceType,
    ) -> Result<Self, GraphicsError> {
        let context = device.as_vulkan().ok_or_else(|| {
            GraphicsError::InvalidParameter("OpenXR sessions need a Vulkan device".to_string())
        })?;

        let (session, frame_waiter, frame_stream) = unsafe {
            instance.create_session::<xr::Vulkan>(
                system,
                &xr::vulkan::SessionCreateInfo {
                    instance: context.instance().handle().as_raw() as _,
                    physical_device: context.physical_device().as_raw() as _,
                    device: context.device().handle().as_raw() as _,
                    queue_family_index: context.draw_queue_family_index(),
                    queue_index: 0,
                },
            )
        }
        .map_err(xr_error("Failed to create session"))?;

        let space = session
            .create_reference_space(reference_space, xr::Posef::IDENTITY)
            .map_err(xr_error("Failed to create reference space"))?;

        log::debug!("OpenXR session created ({:?} space)", reference_space);

        Ok(Self {
            swapchain: None,
            space,
            frame_stream,
            frame_waiter,
            session,
            event_storage: xr::EventDataBuffer::new(),
            system,
            instance,
        })
    }

    pub(crate) fn eye_resolutions(&self) -> Result<Vec<vk::Extent2D>, GraphicsError> {
        let views = self
            .instance
            .enumerate_view_configuration_views(self.system, VIEW_CONFIGURATION)
            .map_err(xr_error("Failed to enumerate view configuration views"))?;

        Ok(views
            .iter()
            .map(|view| vk::Extent2D {
                width: view.recommended_image_rect_width,
                height: view.recommended_image_rect_height,
            })
            .collect())
    }

    pub(crate) fn swapchain_formats(&self) -> Result<Vec<vk::Format>, GraphicsError> {
        let formats = self
            .session
            .enumerate_swapchain_formats()
            .map_err(xr_error("Failed to enumerate swapchain formats"))?;
        Ok(formats
            .into_iter()
            .map(|format| vk::Format::from_raw(format as i32))
            .collect())
    }

    pub(crate) fn create_swapchain(
        &mut self,
        extent: vk::Extent2D,
        format: vk::Format,
        layer_count: u32,
    ) -> Result<Vec<vk::Image>, GraphicsError> {
        let swapchain = self
            .session
            .create_swapchain(&xr::SwapchainCreateInfo {
                create_flags: xr::SwapchainCreateFlags::EMPTY,
                usage_flags: xr::SwapchainUsageFlags::COLOR_ATTACHMENT
                    | xr::SwapchainUsageFlags::SAMPLED,
                format: format.as_raw() as u32,
                sample_count: 1,
                width: extent.width,
                height: extent.height,
                face_count: 1,
                array_size: layer_count,
                mip_count: 1,
            })
            .map_err(xr_error("Failed to create swapchain"))?;

        let images = swapchain
            .enumerate_images()
            .map_err(xr_error("Failed to enumerate swapchain images"))?;
        self.swapchain = Some(swapchain);

        Ok(images.into_iter().map(vk::Image::from_raw).collect())
    }

    /// Next event the headset cares about. Other events are skipped.
    pub(crate) fn poll_event(&mut self) -> Result<Option<SessionEvent>, GraphicsError> {
        loop {
            let Some(event) = self
                .instance
                .poll_event(&mut self.event_storage)
                .map_err(xr_error("Failed to poll events"))?
            else {
                return Ok(None);
            };

            let event = match event {
                xr::Event::SessionStateChanged(e) => {
                    Some(SessionEvent::StateChanged(session_state(e.state())))
                }
                xr::Event::InstanceLossPending(_) => Some(SessionEvent::InstanceLossPending),
                xr::Event::EventsLost(e) => Some(SessionEvent::EventsLost(e.lost_event_count())),
                _ => None,
            };
            if event.is_some() {
                return Ok(event);
            }
        }
    }

    pub(crate) fn begin_session(&mut self) -> Result<(), GraphicsError> {
        self.session
            .begin(VIEW_CONFIGURATION)
            .map(|_| ())
            .map_err(xr_error("Failed to begin session"))
    }

    pub(crate) fn end_session(&mut self) -> Result<(), GraphicsError> {
        self.session
            .end()
            .map(|_| ())
            .map_err(xr_error("Failed to end session"))
    }

    pub(crate) fn wait_frame(&mut self) -> Result<FrameTiming, GraphicsError> {
        let state = self
            .frame_waiter
            .wait()
            .map_err(xr_error("Failed to wait for frame"))?;
        Ok(FrameTiming {
            predicted_display_time: state.predicted_display_time.as_nanos(),
            should_render: state.should_render,
        })
    }

    pub(crate) fn begin_frame(&mut self) -> Result<(), GraphicsError> {
        self.frame_stream
            .begin()
            .map(|_| ())
            .map_err(xr_error("Failed to begin frame"))
    }

    pub(crate) fn locate_views(&mut self, display_time: i64) -> Result<LocatedViews, GraphicsError> {
        let (flags, views) = self
            .session
            .locate_views(
                VIEW_CONFIGURATION,
                xr::Time::from_nanos(display_time),
                &self.space,
            )
            .map_err(xr_error("Failed to locate views"))?;

        Ok(LocatedViews {
            position_valid: flags.contains(xr::ViewStateFlags::POSITION_VALID),
            orientation_valid: flags.contains(xr::ViewStateFlags::ORIENTATION_VALID),
            views: views
                .iter()
                .map(|view| ViewLocation {
                    pose: pose_from_xr(&view.pose),
                    fov: fov_from_xr(&view.fov),
                })
                .collect(),
        })
    }

    pub(crate) fn acquire_swapchain_image(&mut self) -> Result<usize, GraphicsError> {
        let swapchain = self
            .swapchain
            .as_mut()
            .ok_or_else(|| GraphicsError::GenericOpenXr("no swapchain".to_string()))?;

        let index = swapchain
            .acquire_image()
            .map_err(xr_error("Failed to acquire swapchain image"))?;
        swapchain
            .wait_image(xr::Duration::INFINITE)
            .map_err(xr_error("Failed to wait for swapchain image"))?;
        Ok(index as usize)
    }

    pub(crate) fn release_swapchain_image(&mut self) -> Result<(), GraphicsError> {
        let swapchain = self
            .swapchain
            .as_mut()
            .ok_or_else(|| GraphicsError::GenericOpenXr("no swapchain".to_string()))?;
        swapchain
            .release_image()
            .map_err(xr_error("Failed to release swapchain image"))
    }

    pub(crate) fn end_frame(
        &mut self,
        display_time: i64,
        layer: Option<ProjectionLayer<'_>>,
    ) -> Result<(), GraphicsError> {
        let time = xr::Time::from_nanos(display_time);

        let result = match (layer, self.swapchain.as_ref()) {
            (Some(layer), Some(swapchain)) => {
                let rect = xr::Rect2Di {
                    offset: xr::Offset2Di { x: 0, y: 0 },
                    extent: xr::Extent2Di {
                        width: layer.eye_extent.width as i32,
                        height: layer.eye_extent.height as i32,
                    },
                };
                let views: Vec<_> = layer
                    .views
                    .iter()
                    .enumerate()
                    .map(|(eye, view)| {
                        xr::CompositionLayerProjectionView::new()
                            .pose(pose_to_xr(&view.pose))
                            .fov(fov_to_xr(&view.fov))
                            .sub_image(
                                xr::SwapchainSubImage::new()
                                    .swapchain(swapchain)
                                    .image_array_index(eye as u32)
                                    .image_rect(rect),
                            )
                    })
                    .collect();
                let projection = xr::CompositionLayerProjection::new()
                    .space(&self.space)
                    .views(&views);

                self.frame_stream.end(time, BLEND_MODE, &[&projection])
            }
            _ => self.frame_stream.end(time, BLEND_MODE, &[]),
        };
        result.map_err(xr_error("Failed to end frame"))
    }
}

fn session_state(state: xr::SessionState) -> SessionState {
    match state {
        xr::SessionState::IDLE => SessionState::Idle,
        xr::SessionState::READY => SessionState::Ready,
        xr::SessionState::SYNCHRONIZED => SessionState::Synchronized,
        xr::SessionState::VISIBLE => SessionState::Visible,
        xr::SessionState::FOCUSED => SessionState::Focused,
        xr::SessionState::STOPPING => SessionState::Stopping,
        xr::SessionState::LOSS_PENDING => SessionState::LossPending,
        xr::SessionState::EXITING => SessionState::Exiting,
        _ => SessionState::Unknown,
    }
}

fn pose_from_xr(pose: &xr::Posef) -> Pose {
    let position = &pose.position;
    let orientation = &pose.orientation;
    Pose::new(
        Vec3::new(position.x, position.y, position.z),
        Quat::from_xyzw(orientation.x, orientation.y, orientation.z, orientation.w),
    )
}

fn pose_to_xr(pose: &Pose) -> xr::Posef {
    xr::Posef {
        orientation: xr::Quaternionf {
            x: pose.orientation.x,
            y: pose.orientation.y,
            z: pose.orientation.z,
            w: pose.orientation.w,
        },
        position: xr::Vector3f {
            x: pose.position.x,
            y: pose.position.y,
            z: pose.position.z,
        },
    }
}

fn fov_from_xr(fov: &xr::Fovf) -> Fov {
    Fov {
        angle_left: fov.angle_left,
        angle_right: fov.angle_right,
        angle_up: fov.angle_up,
        angle_down: fov.angle_down,
    }
}

fn fov_to_xr(fov: &Fov) -> xr::Fovf {
    xr::Fovf {
        angle_left: fov.angle_left,
        angle_right: fov.angle_right,
        angle_up: fov.angle_up,
        angle_down: fov.angle_down,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_states_map_one_to_one() {
        assert_eq!(session_state(xr::SessionState::READY), SessionState::Ready);
        assert_eq!(
            session_state(xr::SessionState::LOSS_PENDING),
            SessionState::LossPending
        );
        assert_eq!(session_state(xr::SessionState::UNKNOWN), SessionState::Unknown);
    }

    #[test]
    fn pose_conversion_keeps_components() {
        let pose = Pose::new(Vec3::new(0.1, 1.7, -0.3), Quat::from_rotation_y(0.4));
        assert_eq!(pose_from_xr(&pose_to_xr(&pose)), pose);
    }
}
