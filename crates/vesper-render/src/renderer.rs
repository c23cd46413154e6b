// SPDX-License-Identifier: CEPL-1.0
use crate::{RenderSettings, WindowHost};
use anyhow::Result;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RenderError {
    #[error("render backend is already initialized")]
    AlreadyInitialized,
    #[error("render backend is not initialized")]
    NotInitialized,
}

/// A GPU backend driven once per tick by [`crate::RenderLoop`].
pub trait Renderer {
    /// Creates every device object. Fails with
    /// [`RenderError::AlreadyInitialized`] when called twice.
    fn init(&mut self, host: &dyn WindowHost, settings: &RenderSettings) -> Result<()>;

    /// Marks the swapchain for rebuild on the next frame.
    fn notify_resized(&mut self);

    fn draw_frame(&mut self, host: &mut dyn WindowHost) -> Result<()>;

    /// Releases every device object. A no-op when not initialized.
    fn shutdown(&mut self);
}

/// Single-instance holder for a backend. Replaces a process-wide singleton:
/// whoever owns the slot owns the backend, and a second `init` is reported
/// instead of silently replacing the first.
#[derive(Debug)]
pub struct BackendSlot<B> {
    inner: Option<B>,
}

impl<B> Default for BackendSlot<B> {
    fn default() -> Self {
        Self { inner: None }
    }
}

impl<B> BackendSlot<B> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_initialized(&self) -> bool {
        self.inner.is_some()
    }

    /// Runs `create` only when the slot is empty.
    pub fn init_with<F>(&mut self, create: F) -> Result<&mut B>
    where
        F: FnOnce() -> Result<B>,
    {
        if self.inner.is_some() {
            return Err(RenderError::AlreadyInitialized.into());
        }
        Ok(self.inner.insert(create()?))
    }

    pub fn get_mut(&mut self) -> Result<&mut B, RenderError> {
        self.inner.as_mut().ok_or(RenderError::NotInitialized)
    }

    /// Empties the slot, dropping the backend.
    pub fn take(&mut self) -> Option<B> {
        self.inner.take()
    }
}
