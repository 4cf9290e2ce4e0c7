//! Model module for the CNN architecture using the Burn framework
//!
//! This module provides:
//! - The four-stage convolutional classifier
//! - Its configuration and the spatial-size inference that sizes the head
//!
//! ## Architecture
//!
//! ```text
//! [N, 3, 256, 256]
//!   conv 3x3 (f)  + ReLU + maxpool 2  -> [N,  f, 127, 127]
//!   conv 3x3 (2f) + ReLU + maxpool 2  -> [N, 2f,  62,  62]
//!   conv 3x3 (4f) + ReLU + maxpool 2  -> [N, 4f,  30,  30]
//!   conv 3x3 (8f) + ReLU + maxpool 2  -> [N, 8f,  14,  14]
//!   flatten -> fc1 + ReLU + dropout -> fc2 -> log_softmax
//! ```

pub mod cnn;

// Re-export main types for convenience
pub use cnn::{conv_output_shape, StageShape, TumorClassifier, TumorClassifierConfig};
