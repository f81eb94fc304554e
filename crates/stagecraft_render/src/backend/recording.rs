//! Headless backend that records calls.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;

use super::{BackendHandle, Capability, DrawCommand, GraphicsBackend, RendererDesc, TextureData};
use crate::error::{BackendError, BackendResult};
use crate::instruction::LightItem;

/// A call received by [`RecordingBackend`].
#[derive(Clone, Debug, PartialEq)]
pub enum BackendCall {
    /// `create_renderer`
    CreateRenderer(BackendHandle),
    /// `destroy_renderer`
    DestroyRenderer(BackendHandle),
    /// `upload_texture`
    UploadTexture(BackendHandle),
    /// `destroy_texture`
    DestroyTexture(BackendHandle),
    /// `set_capability`
    SetCapability(Capability, bool),
    /// `set_lights`, with the light count
    SetLights(usize),
    /// `draw`
    Draw(DrawCommand),
    /// `present`
    Present(u64),
}

#[derive(Default)]
struct Recording {
    calls: Vec<BackendCall>,
    live: HashSet<BackendHandle>,
    next_handle: u64,
    fail_uploads: bool,
    device_lost: bool,
}

impl Recording {
    fn issue(&mut self) -> BackendHandle {
        self.next_handle += 1;
        let handle = BackendHandle(self.next_handle);
        self.live.insert(handle);
        handle
    }

    fn check(&self) -> BackendResult<()> {
        if self.device_lost {
            Err(BackendError::DeviceLost)
        } else {
            Ok(())
        }
    }

    fn release(&mut self, handle: BackendHandle) -> BackendResult<()> {
        if self.live.remove(&handle) {
            Ok(())
        } else {
            Err(BackendError::InvalidHandle(handle.0))
        }
    }
}

/// Records every backend call in order. Clones share one recording, so a
/// test can keep a clone while the original runs on the render thread.
///
/// Destroying an unknown handle fails with [`BackendError::InvalidHandle`]
/// and texture uploads validate their size, so the recording doubles as a
/// strict headless device.
#[derive(Clone, Default)]
pub struct RecordingBackend {
    recording: Arc<Mutex<Recording>>,
}

impl RecordingBackend {
    /// Creates an empty recording.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Calls received so far.
    #[must_use]
    pub fn calls(&self) -> Vec<BackendCall> {
        self.recording.lock().calls.clone()
    }

    /// Number of `draw` calls received so far.
    #[must_use]
    pub fn draw_count(&self) -> usize {
        self.recording
            .lock()
            .calls
            .iter()
            .filter(|call| matches!(call, BackendCall::Draw(_)))
            .count()
    }

    /// Number of handles created and not yet destroyed.
    #[must_use]
    pub fn live_handles(&self) -> usize {
        self.recording.lock().live.len()
    }

    /// Makes every texture upload fail while `fail` is set.
    pub fn set_fail_uploads(&self, fail: bool) {
        self.recording.lock().fail_uploads = fail;
    }

    /// Makes every call fail with [`BackendError::DeviceLost`] while set.
    pub fn set_device_lost(&self, lost: bool) {
        self.recording.lock().device_lost = lost;
    }
}

impl GraphicsBackend for RecordingBackend {
    fn create_renderer(&mut self, _desc: &RendererDesc) -> BackendResult<BackendHandle> {
        let mut recording = self.recording.lock();
        recording.check()?;
        let handle = recording.issue();
        recording.calls.push(BackendCall::CreateRenderer(handle));
        Ok(handle)
    }

    fn destroy_renderer(&mut self, handle: BackendHandle) -> BackendResult<()> {
        let mut recording = self.recording.lock();
        recording.check()?;
        recording.release(handle)?;
        recording.calls.push(BackendCall::DestroyRenderer(handle));
        Ok(())
    }

    fn upload_texture(&mut self, data: &TextureData) -> BackendResult<BackendHandle> {
        let mut recording = self.recording.lock();
        recording.check()?;
        if recording.fail_uploads {
            return Err(BackendError::OutOfMemory {
                requested: data.pixels.len(),
            });
        }
        if data.pixels.len() != data.expected_len() {
            return Err(BackendError::TextureSize {
                expected: data.expected_len(),
                actual: data.pixels.len(),
            });
        }
        let handle = recording.issue();
        recording.calls.push(BackendCall::UploadTexture(handle));
        Ok(handle)
    }

    fn destroy_texture(&mut self, handle: BackendHandle) -> BackendResult<()> {
        let mut recording = self.recording.lock();
        recording.check()?;
        recording.release(handle)?;
        recording.calls.push(BackendCall::DestroyTexture(handle));
        Ok(())
    }

    fn set_capability(&mut self, capability: Capability, enabled: bool) -> BackendResult<()> {
        let mut recording = self.recording.lock();
        recording.check()?;
        recording
            .calls
            .push(BackendCall::SetCapability(capability, enabled));
        Ok(())
    }

    fn set_lights(&mut self, lights: &[LightItem]) -> BackendResult<()> {
        let mut recording = self.recording.lock();
        recording.check()?;
        recording.calls.push(BackendCall::SetLights(lights.len()));
        Ok(())
    }

    fn draw(&mut self, command: &DrawCommand) -> BackendResult<()> {
        let mut recording = self.recording.lock();
        recording.check()?;
        if !recording.live.contains(&command.renderer) {
            return Err(BackendError::InvalidHandle(command.renderer.0));
        }
        recording.calls.push(BackendCall::Draw(*command));
        Ok(())
    }

    fn present(&mut self, frame: u64) -> BackendResult<()> {
        let mut recording = self.recording.lock();
        recording.check()?;
        recording.calls.push(BackendCall::Present(frame));
        Ok(())
    }
}
