//! Backend selection
//!
//! The compute backend is chosen at build time through cargo features:
//! `cuda` for the GPU, otherwise `ndarray` on the CPU.

use burn::backend::Autodiff;
use burn::tensor::backend::Backend;

#[cfg(feature = "cuda")]
pub type DefaultBackend = burn_cuda::Cuda;

#[cfg(all(not(feature = "cuda"), feature = "ndarray"))]
pub type DefaultBackend = burn_ndarray::NdArray;

#[cfg(all(not(feature = "cuda"), not(feature = "ndarray")))]
compile_error!("Enable the `ndarray` or `cuda` feature to select a backend");

/// Backend used for evaluation and inference
pub type InferenceBackend = DefaultBackend;

/// Backend with gradient tracking, used by the training loop
pub type TrainingBackend = Autodiff<DefaultBackend>;

/// Device of the selected backend
pub type Device = <DefaultBackend as Backend>::Device;

pub fn default_device() -> Device {
    Device::default()
}

pub fn backend_name() -> &'static str {
    if cfg!(feature = "cuda") {
        "CUDA (GPU)"
    } else {
        "NdArray (CPU)"
    }
}
