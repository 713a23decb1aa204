//! CNN Model Architecture for Crop Classification
//!
//! A small convolutional network built with the Burn framework: three
//! (convolution -> ReLU -> 2x2 max-pool) stages, a hidden fully connected
//! layer, and a final linear layer producing log-softmax outputs over the
//! crop classes.
//!
//! The flatten dimension between the convolutional stack and the classifier
//! head is measured at construction time by pushing a dummy zero batch
//! through the convolutions, so channel widths and input resolution can vary
//! freely without hardcoded sizes.

use burn::{
    module::Module,
    nn::{
        conv::{Conv2d, Conv2dConfig},
        pool::{MaxPool2d, MaxPool2dConfig},
        Linear, LinearConfig,
    },
    tensor::{
        activation::{log_softmax, relu},
        backend::Backend,
        Int, Tensor,
    },
};

use super::config::ClassifierConfig;

/// Crop image classifier
#[derive(Module, Debug)]
pub struct CropClassifier<B: Backend> {
    conv1: Conv2d<B>,
    conv2: Conv2d<B>,
    conv3: Conv2d<B>,
    pool1: MaxPool2d,
    pool2: MaxPool2d,
    pool3: MaxPool2d,
    fc1: Linear<B>,
    fc2: Linear<B>,
    flatten_dim: usize,
    num_classes: usize,
}

impl<B: Backend> CropClassifier<B> {
    /// Create a new classifier from configuration
    pub fn new(config: &ClassifierConfig, device: &B::Device) -> Self {
        let conv1 = Conv2dConfig::new([3, config.conv_size1], [3, 3]).init(device);
        let conv2 = Conv2dConfig::new([config.conv_size1, config.conv_size2], [3, 3]).init(device);
        let conv3 = Conv2dConfig::new([config.conv_size2, config.conv_size3], [3, 3]).init(device);

        let pool1 = MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init();
        let pool2 = MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init();
        let pool3 = MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init();

        // Measure the flatten dimension with a dummy zero batch instead of
        // hardcoding it for one input size
        let probe = Tensor::<B, 4>::zeros([1, 3, config.img_size, config.img_size], device);
        let probe = conv_features(
            &conv1, &conv2, &conv3, &pool1, &pool2, &pool3, probe,
        );
        let [_, channels, height, width] = probe.dims();
        let flatten_dim = channels * height * width;

        let fc1 = LinearConfig::new(flatten_dim, config.hidden_size).init(device);
        let fc2 = LinearConfig::new(config.hidden_size, config.num_classes).init(device);

        Self {
            conv1,
            conv2,
            conv3,
            pool1,
            pool2,
            pool3,
            fc1,
            fc2,
            flatten_dim,
            num_classes: config.num_classes,
        }
    }

    /// Run the convolutional stack: [B, 3, H, W] -> [B, C, H', W']
    fn features(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        conv_features(
            &self.conv1,
            &self.conv2,
            &self.conv3,
            &self.pool1,
            &self.pool2,
            &self.pool3,
            x,
        )
    }

    /// Forward pass.
    ///
    /// # Arguments
    /// * `x` - Input tensor of shape [batch_size, 3, height, width]
    ///
    /// # Returns
    /// * Log-probabilities of shape [batch_size, num_classes]
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 2> {
        let x = self.features(x);

        let [batch_size, _, _, _] = x.dims();
        let x = x.reshape([batch_size, self.flatten_dim]);

        let x = relu(self.fc1.forward(x));
        let x = self.fc2.forward(x);

        log_softmax(x, 1)
    }

    /// The measured flatten dimension between convolutions and classifier
    pub fn flatten_dim(&self) -> usize {
        self.flatten_dim
    }

    /// Get the number of output classes
    pub fn num_classes(&self) -> usize {
        self.num_classes
    }
}

fn conv_features<B: Backend>(
    conv1: &Conv2d<B>,
    conv2: &Conv2d<B>,
    conv3: &Conv2d<B>,
    pool1: &MaxPool2d,
    pool2: &MaxPool2d,
    pool3: &MaxPool2d,
    x: Tensor<B, 4>,
) -> Tensor<B, 4> {
    let x = pool1.forward(relu(conv1.forward(x)));
    let x = pool2.forward(relu(conv2.forward(x)));
    pool3.forward(relu(conv3.forward(x)))
}

/// Negative log-likelihood loss over log-softmax outputs.
///
/// Equivalent to cross-entropy against the raw logits.
pub fn nll_loss<B: Backend>(log_probs: Tensor<B, 2>, targets: Tensor<B, 1, Int>) -> Tensor<B, 1> {
    let [batch_size, _num_classes] = log_probs.dims();

    let targets_2d = targets.reshape([batch_size, 1]);
    let gathered = log_probs.gather(1, targets_2d);

    gathered.squeeze::<1>(1).neg().mean()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::DefaultBackend;
    use burn::tensor::TensorData;

    type TestBackend = DefaultBackend;

    #[test]
    fn test_output_shape_single_image() {
        let device = Default::default();
        let config = ClassifierConfig {
            img_size: 32,
            conv_size1: 4,
            conv_size2: 8,
            conv_size3: 8,
            hidden_size: 16,
            ..Default::default()
        };
        let model = CropClassifier::<TestBackend>::new(&config, &device);

        let input = Tensor::<TestBackend, 4>::zeros([1, 3, 32, 32], &device);
        let output = model.forward(input);

        assert_eq!(output.dims(), [1, 5]);
    }

    #[test]
    fn test_log_softmax_rows_sum_to_one() {
        let device = Default::default();
        let config = ClassifierConfig {
            img_size: 32,
            conv_size1: 4,
            conv_size2: 8,
            conv_size3: 8,
            hidden_size: 16,
            ..Default::default()
        };
        let model = CropClassifier::<TestBackend>::new(&config, &device);

        let input = Tensor::<TestBackend, 4>::random(
            [2, 3, 32, 32],
            burn::tensor::Distribution::Default,
            &device,
        );
        let output = model.forward(input);

        let probs: Vec<f32> = output.exp().into_data().to_vec().unwrap();
        for row in probs.chunks(5) {
            let sum: f32 = row.iter().sum();
            assert!((sum - 1.0).abs() < 1e-4, "row sums to {}", sum);
        }
    }

    #[test]
    fn test_flatten_dim_matches_real_batch() {
        let device = Default::default();

        for img_size in [32usize, 64] {
            let config = ClassifierConfig {
                img_size,
                conv_size1: 4,
                conv_size2: 6,
                conv_size3: 8,
                hidden_size: 16,
                ..Default::default()
            };
            let model = CropClassifier::<TestBackend>::new(&config, &device);

            let batch = Tensor::<TestBackend, 4>::zeros([3, 3, img_size, img_size], &device);
            let features = model.features(batch);
            let [_, c, h, w] = features.dims();

            assert_eq!(model.flatten_dim(), c * h * w);
            assert_eq!(model.flatten_dim(), config.conv_output_size());
        }
    }

    #[test]
    fn test_flatten_dim_at_full_resolution() {
        let device = Default::default();
        let config = ClassifierConfig {
            img_size: 224,
            conv_size1: 1,
            conv_size2: 1,
            conv_size3: 1,
            hidden_size: 4,
            ..Default::default()
        };
        let model = CropClassifier::<TestBackend>::new(&config, &device);

        // 224 -> 111 -> 54 -> 26
        assert_eq!(model.flatten_dim(), 26 * 26);
        assert_eq!(model.flatten_dim(), config.conv_output_size());
    }

    #[test]
    fn test_nll_loss_against_manual() {
        let device = Default::default();

        // Two samples, three classes, already log-probabilities
        let log_probs = Tensor::<TestBackend, 2>::from_floats(
            TensorData::new(
                vec![-0.1f32, -2.0, -3.0, -1.5, -0.3, -2.5],
                [2, 3],
            ),
            &device,
        );
        let targets = Tensor::<TestBackend, 1, Int>::from_data(
            TensorData::new(vec![0i64, 1], [2]),
            &device,
        );

        let loss: f32 = nll_loss(log_probs, targets).into_scalar();
        let expected = (0.1 + 0.3) / 2.0;
        assert!((loss - expected).abs() < 1e-6);
    }
}
