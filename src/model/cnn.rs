//! CNN Model Architecture for Brain Tumor Classification
//!
//! Four convolution stages (3×3 kernel, no padding, ReLU, 2×2 max-pool) with
//! doubling widths f, 2f, 4f, 8f, then a two-layer classifier head with
//! dropout. The head is sized from the input shape at construction time.

use burn::{
    config::Config,
    module::Module,
    nn::{
        conv::{Conv2d, Conv2dConfig},
        pool::{MaxPool2d, MaxPool2dConfig},
        Dropout, DropoutConfig, Linear, LinearConfig, PaddingConfig2d, Relu,
    },
    tensor::{activation::log_softmax, backend::Backend, Tensor},
};

use crate::dataset::DEFAULT_IMAGE_SIZE;
use crate::utils::error::{self, TumorError};

/// Kernel size shared by every convolution
const KERNEL_SIZE: usize = 3;

/// Max-pool window and stride
const POOL_FACTOR: usize = 2;

/// Configuration for the TumorClassifier CNN
///
/// Every field is required.
#[derive(Config, Debug)]
pub struct TumorClassifierConfig {
    /// Input shape as (channels, height, width)
    pub input_shape: [usize; 3],
    /// Filters of the first convolution; later stages double it
    pub initial_filters: usize,
    /// Width of the hidden fully connected layer
    pub num_fc1: usize,
    /// Dropout probability after the hidden layer, in [0, 1)
    pub dropout: f64,
    /// Number of output classes
    pub num_classes: usize,
}

/// Spatial size after one stage, for diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageShape {
    pub channels: usize,
    pub height: usize,
    pub width: usize,
}

impl TumorClassifierConfig {
    /// The configuration used for the MRI dataset: 3×256×256 input, 8
    /// initial filters, 100 hidden units, dropout 0.25, two classes
    pub fn brain_tumor() -> Self {
        Self::new([3, DEFAULT_IMAGE_SIZE, DEFAULT_IMAGE_SIZE], 8, 100, 0.25, 2)
    }

    /// Same network for a different square input size
    pub fn with_image_size(mut self, size: usize) -> Self {
        self.input_shape = [self.input_shape[0], size, size];
        self
    }

    pub fn validate(&self) -> error::Result<()> {
        if !(0.0..1.0).contains(&self.dropout) {
            return Err(TumorError::Config(format!(
                "dropout must be in [0, 1), got {}",
                self.dropout
            )));
        }
        if self.initial_filters == 0 || self.num_fc1 == 0 || self.num_classes == 0 {
            return Err(TumorError::Config(
                "filters, hidden units and classes must be positive".to_string(),
            ));
        }
        if self.input_shape.iter().any(|&d| d == 0) {
            return Err(TumorError::Config(format!(
                "input shape must be positive, got {:?}",
                self.input_shape
            )));
        }
        Ok(())
    }

    /// Convolution configs of the four stages
    pub fn stage_configs(&self) -> [Conv2dConfig; 4] {
        let f = self.initial_filters;
        let conv = |in_channels: usize, out_channels: usize| {
            Conv2dConfig::new([in_channels, out_channels], [KERNEL_SIZE, KERNEL_SIZE])
                .with_padding(PaddingConfig2d::Valid)
        };

        [
            conv(self.input_shape[0], f),
            conv(f, f * 2),
            conv(f * 2, f * 4),
            conv(f * 4, f * 8),
        ]
    }

    /// Output shape after each conv + pool stage
    pub fn shape_summary(&self) -> error::Result<Vec<StageShape>> {
        let mut height = self.input_shape[1];
        let mut width = self.input_shape[2];
        let mut shapes = Vec::with_capacity(4);

        for conv in self.stage_configs() {
            let (h, w) = conv_output_shape(height, width, &conv, POOL_FACTOR)?;
            height = h;
            width = w;
            shapes.push(StageShape {
                channels: conv.channels[1],
                height,
                width,
            });
        }

        Ok(shapes)
    }

    /// Number of features entering the first fully connected layer
    pub fn flatten_size(&self) -> error::Result<usize> {
        let shapes = self.shape_summary()?;
        let last = shapes
            .last()
            .ok_or_else(|| TumorError::Model("network has no stages".to_string()))?;
        Ok(last.channels * last.height * last.width)
    }

    /// Initialize the model
    pub fn init<B: Backend>(&self, device: &B::Device) -> error::Result<TumorClassifier<B>> {
        self.validate()?;
        let num_flatten = self.flatten_size()?;
        let [c1, c2, c3, c4] = self.stage_configs();

        Ok(TumorClassifier {
            conv1: ConvStage::new(&c1, device),
            conv2: ConvStage::new(&c2, device),
            conv3: ConvStage::new(&c3, device),
            conv4: ConvStage::new(&c4, device),
            fc1: LinearConfig::new(num_flatten, self.num_fc1).init(device),
            relu: Relu::new(),
            dropout: DropoutConfig::new(self.dropout).init(),
            fc2: LinearConfig::new(self.num_fc1, self.num_classes).init(device),
            num_flatten,
            num_classes: self.num_classes,
        })
    }
}

/// Spatial size after a convolution followed by a `pool`×`pool` max-pool
///
/// `out = floor((in + 2·padding − dilation·(kernel − 1) − 1) / stride + 1)`,
/// then divided by `pool`. Fails when the input is smaller than the
/// receptive field or the result collapses to zero.
pub fn conv_output_shape(
    height: usize,
    width: usize,
    conv: &Conv2dConfig,
    pool: usize,
) -> error::Result<(usize, usize)> {
    let (pad_h, pad_w) = match &conv.padding {
        PaddingConfig2d::Valid => (0, 0),
        PaddingConfig2d::Explicit(h, w) => (*h, *w),
        PaddingConfig2d::Same => {
            // stride 1 "same" keeps the spatial size
            return checked_pool(height, pool)
                .and_then(|h| checked_pool(width, pool).map(|w| (h, w)));
        }
    };

    let out_h = conv_dim(height, pad_h, conv.dilation[0], conv.kernel_size[0], conv.stride[0])?;
    let out_w = conv_dim(width, pad_w, conv.dilation[1], conv.kernel_size[1], conv.stride[1])?;

    Ok((checked_pool(out_h, pool)?, checked_pool(out_w, pool)?))
}

fn conv_dim(input: usize, padding: usize, dilation: usize, kernel: usize, stride: usize) -> error::Result<usize> {
    let padded = input + 2 * padding;
    let receptive = dilation * kernel.saturating_sub(1) + 1;
    if padded < receptive || stride == 0 {
        return Err(TumorError::Model(format!(
            "input dimension {} (padding {}) is smaller than the {}-pixel receptive field",
            input, padding, receptive
        )));
    }
    Ok((padded - receptive) / stride + 1)
}

fn checked_pool(dim: usize, pool: usize) -> error::Result<usize> {
    let out = dim / pool.max(1);
    if out == 0 {
        return Err(TumorError::Model(format!(
            "feature map of size {} vanishes under {}x pooling",
            dim, pool
        )));
    }
    Ok(out)
}

/// Conv2d, ReLU, 2×2 max-pool
#[derive(Module, Debug)]
pub struct ConvStage<B: Backend> {
    pub conv: Conv2d<B>,
    pub relu: Relu,
    pub pool: MaxPool2d,
}

impl<B: Backend> ConvStage<B> {
    pub fn new(config: &Conv2dConfig, device: &B::Device) -> Self {
        Self {
            conv: config.init(device),
            relu: Relu::new(),
            pool: MaxPool2dConfig::new([POOL_FACTOR, POOL_FACTOR])
                .with_strides([POOL_FACTOR, POOL_FACTOR])
                .init(),
        }
    }

    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = self.conv.forward(x);
        let x = self.relu.forward(x);
        self.pool.forward(x)
    }
}

/// Brain tumor classifier CNN
///
/// Architecture:
/// - 4 conv stages: f, 2f, 4f, 8f filters
/// - Flatten
/// - fc1 + ReLU + dropout
/// - fc2 + log-softmax
#[derive(Module, Debug)]
pub struct TumorClassifier<B: Backend> {
    pub conv1: ConvStage<B>,
    pub conv2: ConvStage<B>,
    pub conv3: ConvStage<B>,
    pub conv4: ConvStage<B>,

    pub fc1: Linear<B>,
    pub relu: Relu,
    pub dropout: Dropout,
    pub fc2: Linear<B>,

    num_flatten: usize,
    num_classes: usize,
}

impl<B: Backend> TumorClassifier<B> {
    /// Forward pass through the network
    ///
    /// # Arguments
    /// * `x` - Input tensor of shape [batch_size, channels, height, width]
    ///
    /// # Returns
    /// * Log-probabilities of shape [batch_size, num_classes]
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 2> {
        let x = self.conv1.forward(x);
        let x = self.conv2.forward(x);
        let x = self.conv3.forward(x);
        let x = self.conv4.forward(x);

        let [batch_size, _, _, _] = x.dims();
        let x = x.reshape([batch_size, self.num_flatten]);

        let x = self.fc1.forward(x);
        let x = self.relu.forward(x);
        let x = self.dropout.forward(x);
        let x = self.fc2.forward(x);

        log_softmax(x, 1)
    }

    /// Get the number of output classes
    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    /// Features fed into `fc1`
    pub fn num_flatten(&self) -> usize {
        self.num_flatten
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::module::AutodiffModule;
    use burn::backend::Autodiff;
    use burn_ndarray::NdArray;

    type TestBackend = NdArray;
    type TestAutodiffBackend = Autodiff<NdArray>;

    fn small_config() -> TumorClassifierConfig {
        TumorClassifierConfig::new([3, 64, 64], 2, 16, 0.5, 2)
    }

    #[test]
    fn test_flatten_size_for_256_input() {
        let config = TumorClassifierConfig::brain_tumor();
        let shapes = config.shape_summary().unwrap();

        let sizes: Vec<usize> = shapes.iter().map(|s| s.height).collect();
        assert_eq!(sizes, vec![127, 62, 30, 14]);
        assert_eq!(shapes[3].channels, 64);
        assert_eq!(config.flatten_size().unwrap(), 12544);
        // repeated computation is identical
        assert_eq!(config.flatten_size().unwrap(), config.flatten_size().unwrap());
    }

    #[test]
    fn test_conv_output_shape_formula() {
        let base = Conv2dConfig::new([3, 8], [3, 3]);
        assert_eq!(conv_output_shape(256, 256, &base, 2).unwrap(), (127, 127));

        let padded = base.clone().with_padding(PaddingConfig2d::Explicit(1, 1));
        assert_eq!(conv_output_shape(256, 256, &padded, 2).unwrap(), (128, 128));

        let dilated = base.clone().with_dilation([2, 2]);
        assert_eq!(conv_output_shape(256, 200, &dilated, 2).unwrap(), (126, 98));

        let strided = base.with_stride([2, 2]);
        assert_eq!(conv_output_shape(255, 255, &strided, 1).unwrap(), (127, 127));
    }

    #[test]
    fn test_too_small_input_is_error() {
        let config = TumorClassifierConfig::new([3, 16, 16], 2, 8, 0.0, 2);
        assert!(config.flatten_size().is_err());
        assert!(config.init::<TestBackend>(&Default::default()).is_err());
    }

    #[test]
    fn test_invalid_dropout_rejected() {
        let config = TumorClassifierConfig::new([3, 64, 64], 2, 8, 1.0, 2);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_output_is_log_probabilities() {
        let device = Default::default();
        let model = small_config().init::<TestBackend>(&device).unwrap();
        assert_eq!(model.num_flatten(), 16 * 2 * 2);

        let input = Tensor::<TestBackend, 4>::random(
            [3, 3, 64, 64],
            burn::tensor::Distribution::Normal(0.0, 1.0),
            &device,
        );
        let output = model.forward(input);
        assert_eq!(output.dims(), [3, 2]);

        let values: Vec<f32> = output.clone().into_data().convert::<f32>().to_vec().unwrap();
        assert!(values.iter().all(|&v| v <= 0.0));

        let row_sums: Vec<f32> = output.exp().sum_dim(1).into_data().convert::<f32>().to_vec().unwrap();
        for s in row_sums {
            assert!((s - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn test_dropout_active_only_in_training() {
        let device = Default::default();
        let model = TumorClassifierConfig::new([3, 64, 64], 2, 64, 0.5, 2)
            .init::<TestAutodiffBackend>(&device)
            .unwrap();
        let input = Tensor::<TestAutodiffBackend, 4>::ones([1, 3, 64, 64], &device);

        // the hidden activations reveal the dropout mask
        let hidden = |m: &TumorClassifier<TestAutodiffBackend>| {
            let x = m.conv4.forward(m.conv3.forward(m.conv2.forward(m.conv1.forward(input.clone()))));
            let x = x.reshape([1, m.num_flatten()]);
            let x = m.dropout.forward(m.relu.forward(m.fc1.forward(x)));
            x.into_data().convert::<f32>().to_vec::<f32>().unwrap()
        };
        let samples: Vec<Vec<f32>> = (0..10).map(|_| hidden(&model)).collect();
        assert!(samples.windows(2).any(|w| w[0] != w[1]));

        let eval_model = model.valid();
        let eval_input = Tensor::<TestBackend, 4>::ones([1, 3, 64, 64], &device);
        let a: Vec<f32> = eval_model.forward(eval_input.clone()).into_data().convert::<f32>().to_vec().unwrap();
        let b: Vec<f32> = eval_model.forward(eval_input).into_data().convert::<f32>().to_vec().unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_config_round_trip_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        let config = TumorClassifierConfig::brain_tumor();

        config.save(&path).unwrap();
        let loaded = TumorClassifierConfig::load(&path).unwrap();
        assert_eq!(loaded.input_shape, [3, 256, 256]);
        assert_eq!(loaded.num_fc1, 100);
        assert_eq!(loaded.dropout, 0.25);
    }
}
