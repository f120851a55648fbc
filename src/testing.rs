// Test doubles for the window provider and the graphics backend.
//
// Both write into one shared `Journal`, so tests can assert the exact
// create/destroy sequence across the two collaborators.

use ash::vk;
use raw_window_handle::{HandleError, RawDisplayHandle, RawWindowHandle};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use winit::event::ElementState;
use winit::keyboard::KeyCode;

use crate::backend::{
    ApiVersion, DeviceCandidate, DeviceFeatures, DeviceKind, GraphicsBackend, InstanceDesc,
    RawSwapchain, SwapchainDesc,
};
use crate::config::WindowConfig;
use crate::error::{
    DeviceCreationError, InstanceCreationError, NoSuitableDeviceError, SurfaceCreationError,
    SwapchainCreationError, WindowCreationError,
};
use crate::window::{KeyAction, KeyCallback, WindowSurfaceProvider};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Window,
    WindowSystem,
    Instance,
    DebugMessenger,
    Surface,
    PhysicalDevice,
    LogicalDevice,
    Swapchain,
    ImageView(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Call {
    Created(Resource),
    Destroyed(Resource),
    WaitIdle,
}

#[derive(Debug, Clone, Default)]
pub struct Journal(Rc<RefCell<Vec<Call>>>);

impl Journal {
    pub fn record(&self, call: Call) {
        self.0.borrow_mut().push(call);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.0.borrow().clone()
    }

    /// Calls on top-level resources only (no image views, no idle waits).
    pub fn lifecycle(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|call| {
                matches!(call, Call::Created(r) | Call::Destroyed(r) if !matches!(r, Resource::ImageView(_)))
            })
            .collect()
    }

    pub fn destroyed(&self) -> Vec<Resource> {
        self.lifecycle()
            .into_iter()
            .filter_map(|call| match call {
                Call::Destroyed(r) => Some(r),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.0.borrow_mut().clear();
    }
}

#[derive(Debug, Clone, Copy)]
pub enum ScriptedEvent {
    Idle,
    Key(KeyCode, ElementState),
    Resize(u32, u32),
    Close,
}

pub struct MockWindow {
    journal: Journal,
    fail_create: bool,
    open: bool,
    extent: vk::Extent2D,
    key_callback: Option<KeyCallback>,
    close_requested: bool,
    pending_resize: Option<vk::Extent2D>,
    script: VecDeque<ScriptedEvent>,
    pub polls: usize,
}

impl MockWindow {
    pub fn new(journal: Journal) -> Self {
        Self {
            journal,
            fail_create: false,
            open: false,
            extent: vk::Extent2D::default(),
            key_callback: None,
            close_requested: false,
            pending_resize: None,
            script: VecDeque::new(),
            polls: 0,
        }
    }

    pub fn failing(mut self) -> Self {
        self.fail_create = true;
        self
    }

    /// Events delivered one per `poll_events` call. Once the script runs
    /// out the window asks to close, so loops under test always end.
    pub fn script(mut self, events: impl IntoIterator<Item = ScriptedEvent>) -> Self {
        self.script.extend(events);
        self
    }

    /// Deliver a key event through the registered callback, as the
    /// windowing library would during event dispatch.
    pub fn press(&mut self, key: KeyCode, state: ElementState) {
        if let Some(callback) = self.key_callback {
            if callback(key, state) == KeyAction::RequestClose {
                self.close_requested = true;
            }
        }
    }
}

impl WindowSurfaceProvider for MockWindow {
    fn create(&mut self, config: &WindowConfig) -> Result<(), WindowCreationError> {
        if self.fail_create {
            return Err(WindowCreationError::Os("mock refused".to_string()));
        }
        self.open = true;
        self.extent = vk::Extent2D {
            width: config.width,
            height: config.height,
        };
        self.journal.record(Call::Created(Resource::Window));
        Ok(())
    }

    fn set_key_callback(&mut self, callback: KeyCallback) {
        self.key_callback = Some(callback);
    }

    fn raw_handles(&self) -> Result<(RawDisplayHandle, RawWindowHandle), HandleError> {
        Err(HandleError::NotSupported)
    }

    fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    fn poll_events(&mut self) {
        self.polls += 1;
        match self.script.pop_front() {
            Some(ScriptedEvent::Idle) => {}
            Some(ScriptedEvent::Key(key, state)) => self.press(key, state),
            Some(ScriptedEvent::Resize(width, height)) => {
                self.extent = vk::Extent2D { width, height };
                self.pending_resize = Some(self.extent);
            }
            Some(ScriptedEvent::Close) | None => self.close_requested = true,
        }
    }

    fn should_close(&self) -> bool {
        self.close_requested || !self.open
    }

    fn take_resize(&mut self) -> Option<vk::Extent2D> {
        self.pending_resize.take()
    }

    fn destroy(&mut self) {
        if self.open {
            self.open = false;
            self.journal.record(Call::Destroyed(Resource::Window));
        }
    }

    fn shutdown(&mut self) {
        self.journal.record(Call::Destroyed(Resource::WindowSystem));
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailAt {
    Instance,
    DebugMessenger,
    Surface,
    Enumerate,
    Device,
    Swapchain,
    ImageView(usize),
}

#[derive(Debug)]
pub struct MockDevice;

pub struct MockBackend {
    journal: Journal,
    devices: Vec<DeviceCandidate<usize>>,
    fail_at: Option<FailAt>,
    image_count: usize,
    pub last_desc: Option<SwapchainDesc>,
}

pub fn mock_gpu(name: &str, kind: DeviceKind, features: DeviceFeatures) -> DeviceCandidate<usize> {
    DeviceCandidate {
        handle: 0,
        name: name.to_string(),
        kind,
        api_version: ApiVersion::new(1, 3, 0),
        features,
        can_present: true,
    }
}

impl MockBackend {
    /// One qualifying discrete GPU, three swapchain images.
    pub fn new() -> Self {
        Self {
            journal: Journal::default(),
            devices: vec![mock_gpu("mock dGPU", DeviceKind::Discrete, DeviceFeatures::REQUIRED)],
            fail_at: None,
            image_count: 3,
            last_desc: None,
        }
    }

    pub fn journal(&self) -> Journal {
        self.journal.clone()
    }

    pub fn fail_at(mut self, step: FailAt) -> Self {
        self.fail_at = Some(step);
        self
    }

    pub fn with_devices(mut self, devices: Vec<DeviceCandidate<usize>>) -> Self {
        self.devices = devices
            .into_iter()
            .enumerate()
            .map(|(index, mut device)| {
                device.handle = index;
                device
            })
            .collect();
        self
    }

    /// A device handle that did not go through `create_device`.
    pub fn live_device(&mut self) -> MockDevice {
        MockDevice
    }

    fn fails(&self, step: FailAt) -> bool {
        self.fail_at == Some(step)
    }
}

impl GraphicsBackend for MockBackend {
    type Instance = ();
    type DebugMessenger = ();
    type Surface = ();
    type PhysicalDevice = usize;
    type Device = MockDevice;
    type Swapchain = ();
    type Image = usize;
    type ImageView = usize;

    fn create_instance<W: WindowSurfaceProvider>(
        &mut self,
        _window: &W,
        desc: &InstanceDesc<'_>,
    ) -> Result<(), InstanceCreationError> {
        if self.fails(FailAt::Instance) {
            return Err(InstanceCreationError::UnsupportedApiVersion {
                required: desc.min_api_version,
                available: ApiVersion::new(1, 1, 0),
            });
        }
        self.journal.record(Call::Created(Resource::Instance));
        Ok(())
    }

    fn create_debug_messenger(&mut self, _instance: &()) -> Result<(), InstanceCreationError> {
        if self.fails(FailAt::DebugMessenger) {
            return Err(InstanceCreationError::MissingValidationLayer);
        }
        self.journal.record(Call::Created(Resource::DebugMessenger));
        Ok(())
    }

    fn create_surface<W: WindowSurfaceProvider>(
        &mut self,
        _instance: &(),
        _window: &W,
    ) -> Result<(), SurfaceCreationError> {
        if self.fails(FailAt::Surface) {
            return Err(SurfaceCreationError::Vulkan(vk::Result::ERROR_NATIVE_WINDOW_IN_USE_KHR));
        }
        self.journal.record(Call::Created(Resource::Surface));
        Ok(())
    }

    fn enumerate_physical_devices(
        &mut self,
        _instance: &(),
        _surface: &(),
    ) -> Result<Vec<DeviceCandidate<usize>>, NoSuitableDeviceError> {
        if self.fails(FailAt::Enumerate) {
            return Err(NoSuitableDeviceError::Vulkan(vk::Result::ERROR_INITIALIZATION_FAILED));
        }
        self.journal.record(Call::Created(Resource::PhysicalDevice));
        Ok(self.devices.clone())
    }

    fn create_device(
        &mut self,
        _instance: &(),
        _physical_device: usize,
        _features: &DeviceFeatures,
    ) -> Result<MockDevice, DeviceCreationError> {
        if self.fails(FailAt::Device) {
            return Err(DeviceCreationError::Vulkan(vk::Result::ERROR_DEVICE_LOST));
        }
        self.journal.record(Call::Created(Resource::LogicalDevice));
        Ok(MockDevice)
    }

    fn create_swapchain_handle(
        &mut self,
        _instance: &(),
        _device: &MockDevice,
        _surface: &(),
        _physical_device: usize,
        desc: &SwapchainDesc,
    ) -> Result<RawSwapchain<(), usize>, SwapchainCreationError> {
        if self.fails(FailAt::Swapchain) {
            return Err(SwapchainCreationError::FormatUnsupported(desc.format));
        }
        if desc.extent.width == 0 || desc.extent.height == 0 {
            return Err(SwapchainCreationError::ZeroExtent);
        }
        self.last_desc = Some(*desc);
        self.journal.record(Call::Created(Resource::Swapchain));
        Ok(RawSwapchain {
            handle: (),
            format: desc.format,
            present_mode: desc.present_mode,
            extent: desc.extent,
            images: (0..self.image_count).collect(),
        })
    }

    fn create_image_view(
        &mut self,
        _device: &MockDevice,
        image: usize,
        _format: vk::Format,
    ) -> Result<usize, SwapchainCreationError> {
        if self.fails(FailAt::ImageView(image)) {
            return Err(SwapchainCreationError::Vulkan(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY));
        }
        self.journal.record(Call::Created(Resource::ImageView(image)));
        Ok(image)
    }

    fn wait_idle(&mut self, _device: &MockDevice) {
        self.journal.record(Call::WaitIdle);
    }

    fn destroy_image_view(&mut self, _device: &MockDevice, view: usize) {
        self.journal.record(Call::Destroyed(Resource::ImageView(view)));
    }

    fn destroy_swapchain_handle(&mut self, _device: &MockDevice, _swapchain: ()) {
        self.journal.record(Call::Destroyed(Resource::Swapchain));
    }

    fn destroy_device(&mut self, _device: MockDevice) {
        self.journal.record(Call::Destroyed(Resource::LogicalDevice));
    }

    fn destroy_surface(&mut self, _instance: &(), _surface: ()) {
        self.journal.record(Call::Destroyed(Resource::Surface));
    }

    fn destroy_debug_messenger(&mut self, _instance: &(), _messenger: ()) {
        self.journal.record(Call::Destroyed(Resource::DebugMessenger));
    }

    fn destroy_instance(&mut self, _instance: ()) {
        self.journal.record(Call::Destroyed(Resource::Instance));
    }
}
