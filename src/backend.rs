//! Backend selection
//!
//! Training runs on the CPU ndarray backend. Swapping in a GPU backend only
//! requires changing the aliases here.

use burn::backend::{ndarray::NdArrayDevice, Autodiff, NdArray};

/// The default inference backend
pub type DefaultBackend = NdArray<f32>;

/// The default autodiff backend for training
pub type TrainingBackend = Autodiff<DefaultBackend>;

/// Get the default device
pub fn default_device() -> NdArrayDevice {
    NdArrayDevice::default()
}

/// Get a human-readable name for the current backend
pub fn backend_name() -> &'static str {
    "ndarray (CPU)"
}
