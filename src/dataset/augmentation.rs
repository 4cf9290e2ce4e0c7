//! Data Augmentation Module for MRI Classification
//!
//! Geometric augmentations applied on the fly, in this order:
//!
//! 1. Resize to `image_size`×`image_size` (always)
//! 2. Horizontal flip with probability `horizontal_flip_prob`
//! 3. Vertical flip with probability `vertical_flip_prob`
//! 4. Rotation by an angle drawn uniformly from ±`rotation_degrees`
//!    (nearest-neighbour, uncovered pixels filled with black)
//!
//! The result is converted to CHW `f32` data in [0, 1]. Per-channel
//! normalization happens on the batch tensor in the batcher.

use image::{imageops, Rgb, RgbImage};
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use super::DEFAULT_IMAGE_SIZE;

/// Configuration for data augmentation
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AugmentationConfig {
    /// Square output size in pixels
    pub image_size: u32,
    /// Probability of applying horizontal flip (0.0 - 1.0)
    pub horizontal_flip_prob: f32,
    /// Probability of applying vertical flip (0.0 - 1.0)
    pub vertical_flip_prob: f32,
    /// Maximum rotation angle in degrees (applies ±rotation_degrees, 0 = disabled)
    pub rotation_degrees: f32,
}

impl Default for AugmentationConfig {
    fn default() -> Self {
        Self {
            image_size: DEFAULT_IMAGE_SIZE as u32,
            horizontal_flip_prob: 0.5,
            vertical_flip_prob: 0.5,
            rotation_degrees: 30.0,
        }
    }
}

impl AugmentationConfig {
    /// Resize only (for clean validation/evaluation)
    pub fn none(image_size: u32) -> Self {
        Self {
            image_size,
            horizontal_flip_prob: 0.0,
            vertical_flip_prob: 0.0,
            rotation_degrees: 0.0,
        }
    }

    /// Whether any random transform is configured
    pub fn is_random(&self) -> bool {
        self.horizontal_flip_prob > 0.0 || self.vertical_flip_prob > 0.0 || self.rotation_degrees > 0.0
    }
}

/// Image augmenter that applies random transformations
#[derive(Clone, Debug)]
pub struct Augmenter {
    config: AugmentationConfig,
}

impl Augmenter {
    /// Create a new augmenter with the given configuration
    pub fn new(config: AugmentationConfig) -> Self {
        Self { config }
    }

    /// Create an augmenter that only resizes
    pub fn no_augmentation(image_size: u32) -> Self {
        Self::new(AugmentationConfig::none(image_size))
    }

    pub fn config(&self) -> &AugmentationConfig {
        &self.config
    }

    pub fn image_size(&self) -> u32 {
        self.config.image_size
    }

    /// Apply the configured flips and rotation
    ///
    /// Always consumes the same number of random draws for a given config,
    /// so a seeded RNG gives the same result for the same image.
    pub fn augment(&self, img: RgbImage, rng: &mut ChaCha8Rng) -> RgbImage {
        let mut result = img;

        if rng.gen::<f32>() < self.config.horizontal_flip_prob {
            result = imageops::flip_horizontal(&result);
        }

        if rng.gen::<f32>() < self.config.vertical_flip_prob {
            result = imageops::flip_vertical(&result);
        }

        if self.config.rotation_degrees > 0.0 {
            let angle = rng.gen_range(-self.config.rotation_degrees..=self.config.rotation_degrees);
            result = rotate(&result, angle);
        }

        result
    }

    /// Resize image to target size (always applied, not random)
    pub fn resize(&self, img: &RgbImage) -> RgbImage {
        let size = self.config.image_size;
        if img.dimensions() == (size, size) {
            return img.clone();
        }
        imageops::resize(img, size, size, imageops::FilterType::Triangle)
    }

    /// Convert image to CHW float tensor data in [0, 1]
    pub fn to_tensor_data(&self, img: &RgbImage) -> Vec<f32> {
        let (width, height) = img.dimensions();
        let mut data = Vec::with_capacity(3 * height as usize * width as usize);

        for c in 0..3 {
            for y in 0..height {
                for x in 0..width {
                    data.push(img.get_pixel(x, y)[c] as f32 / 255.0);
                }
            }
        }

        data
    }

    /// Full preprocessing pipeline: resize, augment (when an RNG is given), convert
    pub fn preprocess(&self, img: &RgbImage, rng: Option<&mut ChaCha8Rng>) -> Vec<f32> {
        let mut result = self.resize(img);

        if let Some(rng) = rng {
            result = self.augment(result, rng);
        }

        self.to_tensor_data(&result)
    }
}

/// Rotate counter-clockwise by `angle_degrees` about the image centre
///
/// Nearest-neighbour sampling; pixels mapping outside the source are black.
pub fn rotate(img: &RgbImage, angle_degrees: f32) -> RgbImage {
    if angle_degrees == 0.0 {
        return img.clone();
    }

    let (width, height) = img.dimensions();
    let angle = angle_degrees.to_radians();
    let (sin_a, cos_a) = angle.sin_cos();
    let cx = (width as f32 - 1.0) / 2.0;
    let cy = (height as f32 - 1.0) / 2.0;

    RgbImage::from_fn(width, height, |x, y| {
        let dx = x as f32 - cx;
        let dy = y as f32 - cy;

        // inverse mapping from output to source
        let src_x = (cx + dx * cos_a - dy * sin_a).round();
        let src_y = (cy + dx * sin_a + dy * cos_a).round();

        if src_x < 0.0 || src_y < 0.0 || src_x >= width as f32 || src_y >= height as f32 {
            Rgb([0, 0, 0])
        } else {
            *img.get_pixel(src_x as u32, src_y as u32)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn create_test_image() -> RgbImage {
        RgbImage::from_fn(64, 64, |x, y| Rgb([(x * 4) as u8, (y * 4) as u8, 128]))
    }

    #[test]
    fn test_default_config() {
        let config = AugmentationConfig::default();
        assert_eq!(config.image_size, 256);
        assert_eq!(config.horizontal_flip_prob, 0.5);
        assert_eq!(config.vertical_flip_prob, 0.5);
        assert_eq!(config.rotation_degrees, 30.0);
        assert!(config.is_random());
        assert!(!AugmentationConfig::none(256).is_random());
    }

    #[test]
    fn test_augment_keeps_dimensions() {
        let aug = Augmenter::new(AugmentationConfig { image_size: 64, ..Default::default() });
        let mut rng = ChaCha8Rng::seed_from_u64(42);

        let result = aug.augment(create_test_image(), &mut rng);
        assert_eq!(result.dimensions(), (64, 64));
    }

    #[test]
    fn test_augment_is_deterministic_per_seed() {
        let aug = Augmenter::new(AugmentationConfig { image_size: 64, ..Default::default() });
        let img = create_test_image();

        let a = aug.augment(img.clone(), &mut ChaCha8Rng::seed_from_u64(7));
        let b = aug.augment(img, &mut ChaCha8Rng::seed_from_u64(7));
        assert_eq!(a, b);
    }

    #[test]
    fn test_certain_horizontal_flip() {
        let aug = Augmenter::new(AugmentationConfig {
            image_size: 64,
            horizontal_flip_prob: 1.0,
            vertical_flip_prob: 0.0,
            rotation_degrees: 0.0,
        });
        let img = create_test_image();
        let mut rng = ChaCha8Rng::seed_from_u64(1);

        let flipped = aug.augment(img.clone(), &mut rng);
        assert_eq!(flipped.get_pixel(0, 10), img.get_pixel(63, 10));
    }

    #[test]
    fn test_rotate_quarter_turn() {
        let mut img = RgbImage::new(5, 5);
        img.put_pixel(4, 2, Rgb([255, 0, 0]));

        let rotated = rotate(&img, 90.0);
        assert_eq!(*rotated.get_pixel(2, 0), Rgb([255, 0, 0]));
        assert_eq!(*rotated.get_pixel(4, 2), Rgb([0, 0, 0]));
    }

    #[test]
    fn test_rotate_fills_corners_with_black() {
        let img = RgbImage::from_pixel(32, 32, Rgb([200, 200, 200]));
        let rotated = rotate(&img, 30.0);

        assert_eq!(*rotated.get_pixel(0, 0), Rgb([0, 0, 0]));
        assert_eq!(*rotated.get_pixel(16, 16), Rgb([200, 200, 200]));
    }

    #[test]
    fn test_resize() {
        let aug = Augmenter::no_augmentation(32);
        let result = aug.resize(&create_test_image());
        assert_eq!(result.dimensions(), (32, 32));
    }

    #[test]
    fn test_to_tensor_data() {
        let aug = Augmenter::no_augmentation(64);
        let data = aug.to_tensor_data(&create_test_image());

        // CHW layout: 3 * 64 * 64
        assert_eq!(data.len(), 3 * 64 * 64);
        assert!(data.iter().all(|v| (0.0..=1.0).contains(v)));
        // blue channel is constant 128
        assert!((data[2 * 64 * 64] - 128.0 / 255.0).abs() < 1e-6);
    }

    #[test]
    fn test_preprocess_with_and_without_rng() {
        let aug = Augmenter::new(AugmentationConfig { image_size: 32, ..Default::default() });
        let img = create_test_image();
        let mut rng = ChaCha8Rng::seed_from_u64(42);

        assert_eq!(aug.preprocess(&img, Some(&mut rng)).len(), 3 * 32 * 32);
        assert_eq!(aug.preprocess(&img, None).len(), 3 * 32 * 32);
    }
}
