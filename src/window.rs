// Window Surface Provider
//
// The engine's only view of the windowing library: create, poll, ask
// whether to close, hand out raw handles for surface creation, destroy.
// `WinitWindow` drives winit in poll mode via `pump_app_events`, so the
// engine owns the frame loop instead of the other way round.

use ash::vk;
use raw_window_handle::{
    HandleError, HasDisplayHandle, HasWindowHandle, RawDisplayHandle, RawWindowHandle,
};
use std::time::Duration;
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, WindowEvent};
use winit::event_loop::{ActiveEventLoop, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::platform::pump_events::{EventLoopExtPumpEvents, PumpStatus};
use winit::window::{Window, WindowAttributes, WindowId};

use crate::config::WindowConfig;
use crate::error::WindowCreationError;

/// What a key callback wants the window to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    Ignore,
    RequestClose,
}

pub type KeyCallback = fn(KeyCode, ElementState) -> KeyAction;

/// The engine's key callback: Escape pressed requests shutdown.
pub fn close_on_escape(key: KeyCode, state: ElementState) -> KeyAction {
    if key == KeyCode::Escape && state == ElementState::Pressed {
        KeyAction::RequestClose
    } else {
        KeyAction::Ignore
    }
}

pub trait WindowSurfaceProvider {
    /// Open the window. Starts the windowing library on first use.
    fn create(&mut self, config: &WindowConfig) -> Result<(), WindowCreationError>;

    fn set_key_callback(&mut self, callback: KeyCallback);

    /// Display and window handles for instance/surface creation.
    fn raw_handles(&self) -> Result<(RawDisplayHandle, RawWindowHandle), HandleError>;

    /// Current drawable size in pixels.
    fn extent(&self) -> vk::Extent2D;

    /// Dispatch pending events; key callbacks run in here.
    fn poll_events(&mut self);

    fn should_close(&self) -> bool;

    /// Latest size reported since the last call, if the window was resized.
    fn take_resize(&mut self) -> Option<vk::Extent2D>;

    /// Close the window. The windowing library stays up.
    fn destroy(&mut self);

    /// Tear down the windowing library's process-wide state.
    fn shutdown(&mut self);
}

// Enough pumps for the platform to deliver `resumed` on every desktop backend
const RESUME_PUMP_LIMIT: usize = 64;
const RESUME_PUMP_TIMEOUT: Duration = Duration::from_millis(5);

#[derive(Default)]
struct WindowState {
    pending_attributes: Option<WindowAttributes>,
    window: Option<Window>,
    create_error: Option<String>,
    key_callback: Option<KeyCallback>,
    close_requested: bool,
    pending_resize: Option<PhysicalSize<u32>>,
}

impl ApplicationHandler for WindowState {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        let Some(attributes) = self.pending_attributes.take() else {
            return;
        };
        match event_loop.create_window(attributes) {
            Ok(window) => self.window = Some(window),
            Err(e) => {
                log::error!("winit error: failed to create window: {}", e);
                self.create_error = Some(e.to_string());
            }
        }
    }

    fn window_event(&mut self, _event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                log::info!("Close requested");
                self.close_requested = true;
            }
            WindowEvent::Resized(size) => {
                log::debug!("Window resized to {}x{}", size.width, size.height);
                self.pending_resize = Some(size);
            }
            WindowEvent::KeyboardInput { event, .. } => {
                let (PhysicalKey::Code(key), Some(callback)) = (event.physical_key, self.key_callback)
                else {
                    return;
                };
                if callback(key, event.state) == KeyAction::RequestClose {
                    log::info!("{:?} pressed, exiting...", key);
                    self.close_requested = true;
                }
            }
            _ => {}
        }
    }
}

/// winit-backed window. Construct with `new`, then let the engine `create` it.
#[derive(Default)]
pub struct WinitWindow {
    event_loop: Option<EventLoop<()>>,
    state: WindowState,
    fallback_extent: vk::Extent2D,
}

impl WinitWindow {
    pub fn new() -> Self {
        Self::default()
    }

    fn pump(&mut self, timeout: Duration) -> PumpStatus {
        match self.event_loop.as_mut() {
            Some(event_loop) => event_loop.pump_app_events(Some(timeout), &mut self.state),
            None => PumpStatus::Exit(0),
        }
    }
}

impl WindowSurfaceProvider for WinitWindow {
    fn create(&mut self, config: &WindowConfig) -> Result<(), WindowCreationError> {
        if self.state.window.is_some() {
            return Err(WindowCreationError::AlreadyCreated);
        }
        if self.event_loop.is_none() {
            let event_loop = EventLoop::new().map_err(|e| {
                log::error!("winit error: {}", e);
                WindowCreationError::EventLoop(e.to_string())
            })?;
            self.event_loop = Some(event_loop);
        }

        self.fallback_extent = vk::Extent2D {
            width: config.width,
            height: config.height,
        };
        self.state.create_error = None;
        self.state.pending_attributes = Some(
            Window::default_attributes()
                .with_title(config.title.as_str())
                .with_inner_size(PhysicalSize::new(config.width, config.height))
                .with_resizable(config.resizable),
        );

        for _ in 0..RESUME_PUMP_LIMIT {
            if let PumpStatus::Exit(code) = self.pump(RESUME_PUMP_TIMEOUT) {
                log::error!("winit error: event loop exited with code {} during startup", code);
                break;
            }
            if self.state.window.is_some() || self.state.create_error.is_some() {
                break;
            }
        }
        self.state.pending_attributes = None;

        if let Some(error) = self.state.create_error.take() {
            return Err(WindowCreationError::Os(error));
        }
        if self.state.window.is_none() {
            return Err(WindowCreationError::NotResumed);
        }

        // Creation-time resizes are not resizes
        self.state.pending_resize = None;
        log::info!(
            "Window created: '{}' {}x{}",
            config.title,
            config.width,
            config.height
        );
        Ok(())
    }

    fn set_key_callback(&mut self, callback: KeyCallback) {
        self.state.key_callback = Some(callback);
    }

    fn raw_handles(&self) -> Result<(RawDisplayHandle, RawWindowHandle), HandleError> {
        let window = self.state.window.as_ref().ok_or(HandleError::Unavailable)?;
        Ok((
            window.display_handle()?.as_raw(),
            window.window_handle()?.as_raw(),
        ))
    }

    fn extent(&self) -> vk::Extent2D {
        match &self.state.window {
            Some(window) => {
                let size = window.inner_size();
                vk::Extent2D {
                    width: size.width,
                    height: size.height,
                }
            }
            None => self.fallback_extent,
        }
    }

    fn poll_events(&mut self) {
        if let PumpStatus::Exit(code) = self.pump(Duration::ZERO) {
            log::warn!("Event loop exited with code {}", code);
            self.state.close_requested = true;
        }
    }

    fn should_close(&self) -> bool {
        self.state.close_requested || self.state.window.is_none()
    }

    fn take_resize(&mut self) -> Option<vk::Extent2D> {
        self.state.pending_resize.take().map(|size| vk::Extent2D {
            width: size.width,
            height: size.height,
        })
    }

    fn destroy(&mut self) {
        if self.state.window.take().is_some() {
            log::debug!("Window destroyed");
        }
    }

    fn shutdown(&mut self) {
        self.state = WindowState::default();
        if self.event_loop.take().is_some() {
            log::debug!("Windowing event loop shut down");
        }
    }
}
