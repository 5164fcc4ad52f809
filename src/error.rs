//! Error types shared across the crate.
//!
//! Builders and `init` paths return `anyhow::Result`; the enums here exist for
//! the places where a caller needs to tell failures apart.

use crate::shaders::{Placeholder, ShaderKind};

/// Failure to obtain a usable graphics device.
#[derive(Debug, thiserror::Error)]
pub enum GpuError {
    #[error("WebGPU is not supported: {0}")]
    Unsupported(String),

    #[error("Failed to get WebGPU adapter: {0}")]
    NoAdapter(#[from] wgpu::RequestAdapterError),

    #[error("Failed to request GPU device: {0}")]
    DeviceRequest(#[from] wgpu::RequestDeviceError),

    #[error("Failed to create drawing surface: {0}")]
    Surface(#[from] wgpu::CreateSurfaceError),
}

/// Failure to produce shader source from a template.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ShaderError {
    #[error("{kind:?} uses {placeholder:?} but no value was provided")]
    Unbound {
        kind: ShaderKind,
        placeholder: Placeholder,
    },

    #[error("{placeholder:?} was given a non-finite value")]
    NonFinite { placeholder: Placeholder },
}

/// A single tracked resource refused to release.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("failed to release `{label}`: {reason}")]
pub struct ReleaseError {
    pub label: String,
    pub reason: String,
}

/// Lifecycle misuse of a [`crate::sim::Simulation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SimulationError {
    #[error("simulation was already started")]
    AlreadyStarted,

    #[error("simulation was destroyed")]
    Destroyed,
}
