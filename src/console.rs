//! Everything the console window does that is not GPUI: the active camera's
//! stream, the render tick, pointer routing and toasts.

use std::{
    collections::VecDeque,
    sync::Arc,
    time::Instant,
};

use anyhow::Result;
use crossbeam_channel::Receiver;
use serde_json::Value;

use crate::config::ConsoleConfig;
use crate::interaction::{ClickOutcome, InteractionController, InteractionState, MenuAction};
use crate::render::{CompositeRenderer, Letterbox, OverlayFrame, raster::Surface};
use crate::stream::{CameraStream, LatestFrame, StreamSettings, start_camera_stream};
use crate::telemetry::{
    CameraInfo, CommandSink, ConnectionStatus, FrameResult, SYSTEM_MONITOR_SLOT,
    SharedFrameBuffers, TelemetryStore, cameras_from_monitor,
};
use crate::types::{CameraId, GeometryTool, Notification, OverlayPoint};

#[derive(Clone, Debug, PartialEq)]
pub struct Toast {
    pub notification: Notification,
    pub expires_at: Instant,
}

/// Visible toasts, oldest first. Each stays up for its notification's duration.
#[derive(Debug, Default)]
pub struct ToastQueue {
    toasts: VecDeque<Toast>,
}

impl ToastQueue {
    pub fn push(&mut self, notification: Notification, now: Instant) {
        let expires_at = now + notification.duration();
        self.toasts.push_back(Toast {
            notification,
            expires_at,
        });
    }

    /// Drops expired toasts; returns whether any were removed.
    pub fn expire(&mut self, now: Instant) -> bool {
        let before = self.toasts.len();
        self.toasts.retain(|toast| toast.expires_at > now);
        self.toasts.len() != before
    }

    pub fn dismiss(&mut self, id: &str) {
        self.toasts.retain(|toast| toast.notification.id != id);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Toast> {
        self.toasts.iter()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.toasts.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.toasts.is_empty()
    }
}

/// What the context menu shows for the point it was opened on.
#[derive(Clone, Debug, PartialEq)]
pub struct MenuView {
    pub anchor: (f32, f32),
    pub point: OverlayPoint,
    pub tools: Vec<GeometryTool>,
}

pub struct ConsoleSession {
    settings: StreamSettings,
    camera_id: CameraId,
    stream: Option<CameraStream>,
    latest: LatestFrame,
    buffers: SharedFrameBuffers,
    commands: Box<dyn CommandSink>,
    renderer: CompositeRenderer,
    controller: InteractionController,
    toasts: ToastQueue,
    notifications: Receiver<Notification>,
    status_rx: Receiver<ConnectionStatus>,
    status: ConnectionStatus,
    monitor_rx: Receiver<Value>,
    cameras: Vec<CameraInfo>,
    // Frame version and joined result behind the current surface contents.
    drawn: Option<(u64, Option<Arc<FrameResult>>)>,
    surface_version: u64,
}

impl ConsoleSession {
    pub fn new(
        config: &ConsoleConfig,
        store: Arc<TelemetryStore>,
        buffers: SharedFrameBuffers,
        notifications: Receiver<Notification>,
        commands: Box<dyn CommandSink>,
    ) -> Result<Self> {
        let mut renderer = CompositeRenderer::new(config.surface_width, config.surface_height)?;
        renderer.set_follow_frame_size(!config.fixed_surface);
        let status_rx = store.subscribe_status();
        let status = store.status();
        let monitor_rx = store.subscribe_plugin(SYSTEM_MONITOR_SLOT);
        Ok(Self {
            settings: config.stream_settings(),
            camera_id: config.camera,
            stream: None,
            latest: LatestFrame::new(),
            buffers,
            commands,
            renderer,
            controller: InteractionController::new(),
            toasts: ToastQueue::default(),
            notifications,
            status_rx,
            status,
            monitor_rx,
            cameras: cameras_from_monitor(None),
            drawn: None,
            surface_version: 0,
        })
    }

    /// Opens the frame stream for the current camera.
    pub fn start(&mut self) -> Result<()> {
        self.stop_stream();
        let stream = start_camera_stream(self.camera_id, &self.settings, self.latest.clone())?;
        self.stream = Some(stream);
        Ok(())
    }

    pub fn camera_id(&self) -> CameraId {
        self.camera_id
    }

    /// Cameras from the latest system monitor snapshot.
    pub fn cameras(&self) -> &[CameraInfo] {
        &self.cameras
    }

    pub fn camera_label(&self) -> String {
        self.cameras
            .iter()
            .find(|camera| camera.id == self.camera_id)
            .map(CameraInfo::label)
            .unwrap_or_else(|| format!("CAM {}", self.camera_id))
    }

    /// Aborts the current stream, drops other cameras' buffered results and
    /// starts streaming `camera_id`.
    pub fn switch_camera(&mut self, camera_id: CameraId) -> Result<()> {
        if camera_id == self.camera_id && self.stream.is_some() {
            return Ok(());
        }
        log::info!("switching camera {} -> {camera_id}", self.camera_id);
        self.stop_stream();
        self.camera_id = camera_id;
        self.buffers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .retain_only(camera_id);
        self.controller.cancel();
        self.controller.dismiss_menu();
        self.drawn = None;
        self.start()
    }

    fn stop_stream(&mut self) {
        if let Some(stream) = self.stream.take() {
            log::debug!("stopping stream for camera {}", stream.camera_id());
            stream.stop();
        }
    }

    #[cfg(test)]
    pub fn latest(&self) -> &LatestFrame {
        &self.latest
    }

    pub fn is_paused(&self) -> bool {
        self.latest.is_paused()
    }

    pub fn set_paused(&mut self, paused: bool) {
        self.latest.set_paused(paused);
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    /// One render tick. Never blocks; returns whether anything visible changed.
    pub fn tick(&mut self, now: Instant) -> bool {
        let mut changed = false;

        for notification in self.notifications.try_iter() {
            self.toasts.push(notification, now);
            changed = true;
        }
        changed |= self.toasts.expire(now);

        for status in self.status_rx.try_iter() {
            if status != self.status {
                log::info!("telemetry {}", status.label());
                self.status = status;
                changed = true;
            }
        }

        if let Some(monitor) = self.monitor_rx.try_iter().last() {
            let cameras = cameras_from_monitor(Some(&monitor));
            if cameras != self.cameras {
                self.cameras = cameras;
                changed = true;
            }
        }

        if self.latest.is_paused() && self.drawn.is_some() {
            return changed;
        }

        changed | self.redraw_if_stale()
    }

    fn redraw_if_stale(&mut self) -> bool {
        let version = self.latest.version();
        let frame = self.latest.current();
        let result = {
            let buffers = self
                .buffers
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            buffers.join(self.camera_id, frame.as_ref().map(|f| f.frame_id))
        };

        if let Some((drawn_version, drawn_result)) = &self.drawn {
            let same_result = match (drawn_result, &result) {
                (Some(a), Some(b)) => Arc::ptr_eq(a, b),
                (None, None) => true,
                _ => false,
            };
            if *drawn_version == version && same_result {
                return false;
            }
        }

        let overlay = result
            .as_deref()
            .map(OverlayFrame::from_result)
            .unwrap_or_default();
        self.renderer.draw(frame.as_deref(), overlay);
        self.drawn = Some((version, result));
        self.surface_version += 1;
        true
    }

    pub fn surface(&self) -> &Surface {
        self.renderer.surface()
    }

    /// Bumped whenever the surface is redrawn.
    pub fn surface_version(&self) -> u64 {
        self.surface_version
    }

    pub fn has_frame(&self) -> bool {
        self.latest.current().is_some()
    }

    pub fn letterbox(&self, container: (f32, f32)) -> Option<Letterbox> {
        let (w, h) = self.renderer.native_size();
        Letterbox::fit(container.0, container.1, w as f32, h as f32)
    }

    /// Routes a primary click at `pointer`, relative to a `container`-sized video element.
    pub fn click(&mut self, pointer: (f32, f32), container: (f32, f32)) -> ClickOutcome {
        let letterbox = self.letterbox(container);
        let outcome = self.controller.handle_click(
            pointer,
            letterbox.as_ref(),
            &self.renderer,
            self.commands.as_ref(),
        );
        log::debug!("click at {pointer:?}: {outcome:?}");
        outcome
    }

    pub fn select_action(&mut self, action: MenuAction) {
        self.controller
            .select_action(action, self.commands.as_ref());
    }

    pub fn remove_tool(&mut self, tool_id: &str) {
        self.controller.remove_tool(tool_id, self.commands.as_ref());
    }

    pub fn cancel_tool(&mut self) -> bool {
        self.controller.cancel()
    }

    pub fn menu(&self) -> Option<MenuView> {
        let InteractionState::MenuOpen { anchor, point } = self.controller.state() else {
            return None;
        };
        let tools = self
            .renderer
            .last_tools()
            .iter()
            .filter(|tool| tool.references(&point.id))
            .cloned()
            .collect();
        Some(MenuView {
            anchor: *anchor,
            point: point.clone(),
            tools,
        })
    }

    pub fn instruction(&self) -> Option<&'static str> {
        self.controller.instruction()
    }

    pub fn toasts(&self) -> &ToastQueue {
        &self.toasts
    }

    pub fn dismiss_toast(&mut self, id: &str) {
        self.toasts.dismiss(id);
    }
}

impl Drop for ConsoleSession {
    fn drop(&mut self) {
        self.stop_stream();
    }
}
