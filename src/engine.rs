// =============================================================================
// ENGINE LIFECYCLE
// =============================================================================
//
// Brings the GPU context up in dependency order and tears it down in exact
// reverse:
//
//   window -> instance (+ debug messenger) -> surface -> physical device
//          -> logical device -> swapchain -> commands -> sync structures
//
// Every resource is held in an `Option` owned by the engine. On a failed
// step whatever is `Some` gets released before the error is returned, so a
// failed `init` never leaks handles.

use ash::vk;

use crate::backend::device::{self, DeviceCandidate, DeviceRequirements};
use crate::backend::instance;
use crate::backend::swapchain;
use crate::backend::{BackendSwapchain, GraphicsBackend};
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::window::{close_on_escape, WindowSurfaceProvider};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Uninitialized,
    Initializing,
    Running,
    Terminated,
    Failed,
}

/// Initialization steps, in the order `init` runs them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitPhase {
    Window,
    Instance,
    Surface,
    PhysicalDevice,
    LogicalDevice,
    Swapchain,
    Commands,
    SyncStructures,
}

impl InitPhase {
    pub const ORDER: [InitPhase; 8] = [
        InitPhase::Window,
        InitPhase::Instance,
        InitPhase::Surface,
        InitPhase::PhysicalDevice,
        InitPhase::LogicalDevice,
        InitPhase::Swapchain,
        InitPhase::Commands,
        InitPhase::SyncStructures,
    ];
}

pub struct Engine<W: WindowSurfaceProvider, B: GraphicsBackend> {
    config: EngineConfig,
    state: EngineState,
    completed: Vec<InitPhase>,

    window: W,
    window_open: bool,
    backend: B,

    // Declared in creation order; teardown walks them backwards
    instance: Option<B::Instance>,
    debug_messenger: Option<B::DebugMessenger>,
    surface: Option<B::Surface>,
    physical_device: Option<DeviceCandidate<B::PhysicalDevice>>,
    device: Option<B::Device>,
    swapchain: Option<BackendSwapchain<B>>,

    frame_count: u64,
    minimized: bool,
}

impl<W: WindowSurfaceProvider, B: GraphicsBackend> Engine<W, B> {
    pub fn new(config: EngineConfig, window: W, backend: B) -> Self {
        Self {
            config,
            state: EngineState::Uninitialized,
            completed: Vec::with_capacity(InitPhase::ORDER.len()),
            window,
            window_open: false,
            backend,
            instance: None,
            debug_messenger: None,
            surface: None,
            physical_device: None,
            device: None,
            swapchain: None,
            frame_count: 0,
            minimized: false,
        }
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    /// True once every init phase has succeeded and until `terminate`.
    pub fn is_init(&self) -> bool {
        self.state == EngineState::Running
    }

    pub fn completed_phases(&self) -> &[InitPhase] {
        &self.completed
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn physical_device(&self) -> Option<&DeviceCandidate<B::PhysicalDevice>> {
        self.physical_device.as_ref()
    }

    pub fn swapchain(&self) -> Option<&BackendSwapchain<B>> {
        self.swapchain.as_ref()
    }

    pub fn window(&self) -> &W {
        &self.window
    }

    pub fn window_mut(&mut self) -> &mut W {
        &mut self.window
    }

    // =========================================================================
    // INITIALIZATION
    // =========================================================================

    /// Run every init phase in order. Any failure releases what was built so
    /// far and leaves the engine `Failed`; there is no retry.
    pub fn init(&mut self) -> Result<(), EngineError> {
        if self.state != EngineState::Uninitialized {
            return Err(EngineError::InvalidState(self.state));
        }
        self.state = EngineState::Initializing;
        log::info!("Initializing engine...");

        for phase in InitPhase::ORDER {
            if let Err(e) = self.run_phase(phase) {
                log::error!("Initialization failed during {:?}: {}", phase, e);
                self.teardown();
                self.state = EngineState::Failed;
                return Err(e);
            }
            self.completed.push(phase);
        }

        self.state = EngineState::Running;
        log::info!("Engine initialized");
        Ok(())
    }

    fn run_phase(&mut self, phase: InitPhase) -> Result<(), EngineError> {
        match phase {
            InitPhase::Window => self.init_window(),
            InitPhase::Instance => self.init_instance(),
            InitPhase::Surface => self.init_surface(),
            InitPhase::PhysicalDevice => self.init_physical_device(),
            InitPhase::LogicalDevice => self.init_logical_device(),
            InitPhase::Swapchain => self.init_swapchain(),
            InitPhase::Commands => self.init_commands(),
            InitPhase::SyncStructures => self.init_sync_structures(),
        }
    }

    fn missing(&self) -> EngineError {
        EngineError::InvalidState(self.state)
    }

    fn init_window(&mut self) -> Result<(), EngineError> {
        self.window.create(&self.config.window)?;
        self.window_open = true;
        self.window.set_key_callback(close_on_escape);
        Ok(())
    }

    fn init_instance(&mut self) -> Result<(), EngineError> {
        let (instance, debug_messenger) = instance::create_instance(
            &mut self.backend,
            &self.window,
            &self.config.app_name,
            self.config.enable_validation,
            self.config.min_api_version,
        )?;
        self.instance = Some(instance);
        self.debug_messenger = debug_messenger;
        Ok(())
    }

    fn init_surface(&mut self) -> Result<(), EngineError> {
        let instance = self.instance.as_ref().ok_or_else(|| self.missing())?;
        let surface = self.backend.create_surface(instance, &self.window)?;
        log::info!("Created window surface");
        self.surface = Some(surface);
        Ok(())
    }

    fn init_physical_device(&mut self) -> Result<(), EngineError> {
        let (Some(instance), Some(surface)) = (self.instance.as_ref(), self.surface.as_ref()) else {
            return Err(self.missing());
        };
        let requirements = DeviceRequirements::new(self.config.min_api_version);
        let selected =
            device::select_physical_device(&mut self.backend, instance, surface, &requirements)?;
        self.physical_device = Some(selected);
        Ok(())
    }

    fn init_logical_device(&mut self) -> Result<(), EngineError> {
        let (Some(instance), Some(physical_device)) =
            (self.instance.as_ref(), self.physical_device.as_ref())
        else {
            return Err(self.missing());
        };
        let device = device::create_logical_device(&mut self.backend, instance, physical_device)?;
        self.device = Some(device);
        Ok(())
    }

    fn init_swapchain(&mut self) -> Result<(), EngineError> {
        let extent = self.window.extent();
        let (Some(instance), Some(physical_device), Some(device), Some(surface)) = (
            self.instance.as_ref(),
            self.physical_device.as_ref(),
            self.device.as_ref(),
            self.surface.as_ref(),
        ) else {
            return Err(self.missing());
        };
        let bundle = swapchain::create_swapchain(
            &mut self.backend,
            instance,
            physical_device.handle,
            device,
            surface,
            extent,
        )?;
        self.swapchain = Some(bundle);
        Ok(())
    }

    /// Command pools and buffers. Nothing is recorded yet.
    fn init_commands(&mut self) -> Result<(), EngineError> {
        log::debug!("Command infrastructure: nothing to set up yet");
        Ok(())
    }

    /// Fences and semaphores for frame pacing. Nothing is submitted yet.
    fn init_sync_structures(&mut self) -> Result<(), EngineError> {
        log::debug!("Sync structures: nothing to set up yet");
        Ok(())
    }

    // =========================================================================
    // FRAME LOOP
    // =========================================================================

    /// Poll and draw until the window asks to close. Blocking,
    /// single-threaded; does not tear anything down itself.
    pub fn run(&mut self) -> Result<(), EngineError> {
        if self.state != EngineState::Running {
            return Err(EngineError::InvalidState(self.state));
        }

        while !self.window.should_close() {
            self.window.poll_events();

            if let Some(extent) = self.window.take_resize() {
                self.handle_resize(extent)?;
            }

            if !self.minimized {
                self.draw();
            }
        }

        log::info!("Frame loop finished after {} frames", self.frame_count);
        Ok(())
    }

    fn handle_resize(&mut self, extent: vk::Extent2D) -> Result<(), EngineError> {
        if extent.width == 0 || extent.height == 0 {
            self.minimized = true;
            return Ok(());
        }
        self.minimized = false;

        let unchanged = self
            .swapchain
            .as_ref()
            .is_some_and(|bundle| bundle.extent == extent);
        if unchanged {
            return Ok(());
        }
        self.recreate_swapchain(extent)
    }

    /// Replace the swapchain with one of `extent`. The device is idled
    /// first so no image is in flight. On failure the engine is left without
    /// a swapchain; `terminate` still releases everything else.
    pub fn recreate_swapchain(&mut self, extent: vk::Extent2D) -> Result<(), EngineError> {
        if self.state != EngineState::Running {
            return Err(EngineError::InvalidState(self.state));
        }
        let (Some(instance), Some(physical_device), Some(device), Some(surface)) = (
            self.instance.as_ref(),
            self.physical_device.as_ref(),
            self.device.as_ref(),
            self.surface.as_ref(),
        ) else {
            return Err(self.missing());
        };

        let bundle = match self.swapchain.take() {
            Some(old) => swapchain::recreate_swapchain(
                &mut self.backend,
                instance,
                physical_device.handle,
                device,
                surface,
                old,
                extent,
            )?,
            None => swapchain::create_swapchain(
                &mut self.backend,
                instance,
                physical_device.handle,
                device,
                surface,
                extent,
            )?,
        };
        self.swapchain = Some(bundle);
        Ok(())
    }

    /// Frame work goes here. No rendering or presentation yet.
    fn draw(&mut self) {
        self.frame_count += 1;
    }

    // =========================================================================
    // CLEANUP
    // =========================================================================

    /// Release everything in reverse creation order. No-op unless `init`
    /// completed; clears the init state, so calling it twice is safe.
    pub fn terminate(&mut self) {
        if self.state != EngineState::Running {
            log::debug!("terminate() ignored in state {:?}", self.state);
            return;
        }
        log::info!("Cleaning up engine resources...");
        self.teardown();
        self.state = EngineState::Terminated;
        log::info!("Cleanup complete");
    }

    /// Destroy whatever exists, newest first.
    fn teardown(&mut self) {
        if let Some(device) = self.device.as_ref() {
            self.backend.wait_idle(device);
            if let Some(bundle) = self.swapchain.take() {
                swapchain::destroy_swapchain(&mut self.backend, device, bundle);
            }
        }
        if let Some(device) = self.device.take() {
            self.backend.destroy_device(device);
        }
        self.physical_device = None;

        if let Some(instance) = self.instance.as_ref() {
            if let Some(surface) = self.surface.take() {
                self.backend.destroy_surface(instance, surface);
            }
            if let Some(messenger) = self.debug_messenger.take() {
                self.backend.destroy_debug_messenger(instance, messenger);
            }
        }
        if let Some(instance) = self.instance.take() {
            self.backend.destroy_instance(instance);
        }

        if self.window_open {
            self.window.destroy();
            self.window_open = false;
        }
        self.window.shutdown();
    }
}

impl<W: WindowSurfaceProvider, B: GraphicsBackend> Drop for Engine<W, B> {
    fn drop(&mut self) {
        self.terminate();
    }
}
