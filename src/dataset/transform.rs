//! Per-sample transforms
//!
//! Training samples get light augmentation (random horizontal flip, small
//! random rotation) before tensor conversion; validation samples are only
//! converted and normalized. Both paths share the same per-channel
//! normalization (mean 0.5, std 0.5), mapping pixels into [-1, 1].

use image::{imageops, ImageBuffer, Rgb, RgbImage};
use rand::Rng;

/// Augmentation applied to training samples
#[derive(Debug, Clone)]
pub struct Augmenter {
    /// Probability of a horizontal flip
    pub flip_prob: f32,
    /// Maximum rotation angle in degrees (a rotation in ±rotation_degrees is always applied)
    pub rotation_degrees: f32,
}

impl Augmenter {
    pub fn new(flip_prob: f32, rotation_degrees: f32) -> Self {
        Self {
            flip_prob,
            rotation_degrees,
        }
    }

    /// Apply the configured augmentations to an image
    pub fn augment<R: Rng>(&self, img: &RgbImage, rng: &mut R) -> RgbImage {
        let mut result = if rng.gen::<f32>() < self.flip_prob {
            imageops::flip_horizontal(img)
        } else {
            img.clone()
        };

        if self.rotation_degrees > 0.0 {
            let angle = rng.gen_range(-self.rotation_degrees..=self.rotation_degrees);
            result = rotate(&result, angle);
        }

        result
    }
}

/// Rotate an image around its center by the given angle in degrees
fn rotate(img: &RgbImage, angle_degrees: f32) -> RgbImage {
    if angle_degrees.abs() < 0.1 {
        return img.clone();
    }

    let angle_rad = angle_degrees.to_radians();
    let (width, height) = img.dimensions();

    let cx = width as f32 / 2.0;
    let cy = height as f32 / 2.0;

    let cos_a = angle_rad.cos();
    let sin_a = angle_rad.sin();

    let mut output = ImageBuffer::new(width, height);

    for y in 0..height {
        for x in 0..width {
            // Rotate around center
            let dx = x as f32 - cx;
            let dy = y as f32 - cy;

            let src_x = cx + dx * cos_a + dy * sin_a;
            let src_y = cy - dx * sin_a + dy * cos_a;

            let pixel = bilinear_sample(img, src_x, src_y);
            output.put_pixel(x, y, pixel);
        }
    }

    output
}

/// Sample a pixel using bilinear interpolation; out-of-bounds reads are black
fn bilinear_sample(img: &RgbImage, x: f32, y: f32) -> Rgb<u8> {
    let (width, height) = img.dimensions();

    if x < 0.0 || y < 0.0 || x >= width as f32 - 1.0 || y >= height as f32 - 1.0 {
        return Rgb([0, 0, 0]);
    }

    let x0 = x.floor() as u32;
    let y0 = y.floor() as u32;
    let x1 = (x0 + 1).min(width - 1);
    let y1 = (y0 + 1).min(height - 1);

    let fx = x - x0 as f32;
    let fy = y - y0 as f32;

    let p00 = img.get_pixel(x0, y0);
    let p10 = img.get_pixel(x1, y0);
    let p01 = img.get_pixel(x0, y1);
    let p11 = img.get_pixel(x1, y1);

    let mut result = [0u8; 3];
    for c in 0..3 {
        let v = p00[c] as f32 * (1.0 - fx) * (1.0 - fy)
            + p10[c] as f32 * fx * (1.0 - fy)
            + p01[c] as f32 * (1.0 - fx) * fy
            + p11[c] as f32 * fx * fy;

        result[c] = v.round().clamp(0.0, 255.0) as u8;
    }

    Rgb(result)
}

/// A complete per-sample transform: optional augmentation, then CHW float
/// conversion with per-channel normalization
#[derive(Debug, Clone)]
pub struct Transform {
    augmenter: Option<Augmenter>,
    mean: [f32; 3],
    std: [f32; 3],
}

impl Transform {
    /// Training transform: horizontal flip (p = 0.5), rotation in ±10°, normalize
    pub fn train() -> Self {
        Self {
            augmenter: Some(Augmenter::new(0.5, 10.0)),
            mean: [0.5; 3],
            std: [0.5; 3],
        }
    }

    /// Validation transform: normalize only, fully deterministic
    pub fn eval() -> Self {
        Self {
            augmenter: None,
            mean: [0.5; 3],
            std: [0.5; 3],
        }
    }

    /// Whether this transform draws random numbers per access
    pub fn is_stochastic(&self) -> bool {
        self.augmenter.is_some()
    }

    /// Apply the transform, producing CHW float data of length 3 * H * W
    pub fn apply<R: Rng>(&self, img: &RgbImage, rng: &mut R) -> Vec<f32> {
        match &self.augmenter {
            Some(augmenter) => {
                let augmented = augmenter.augment(img, rng);
                self.to_chw(&augmented)
            }
            None => self.to_chw(img),
        }
    }

    /// Convert to CHW format, normalizing each channel as (x/255 - mean) / std
    fn to_chw(&self, img: &RgbImage) -> Vec<f32> {
        let (width, height) = img.dimensions();
        let mut data = Vec::with_capacity(3 * height as usize * width as usize);

        for c in 0..3 {
            for y in 0..height {
                for x in 0..width {
                    let pixel = img.get_pixel(x, y);
                    let value = pixel[c as usize] as f32 / 255.0;
                    data.push((value - self.mean[c as usize]) / self.std[c as usize]);
                }
            }
        }

        data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn create_test_image() -> RgbImage {
        let mut img = ImageBuffer::new(32, 32);
        for (x, y, pixel) in img.enumerate_pixels_mut() {
            *pixel = Rgb([(x * 8) as u8, (y * 8) as u8, 128]);
        }
        img
    }

    #[test]
    fn test_augment_preserves_dimensions() {
        let aug = Augmenter::new(0.5, 10.0);
        let img = create_test_image();
        let mut rng = ChaCha8Rng::seed_from_u64(42);

        let result = aug.augment(&img, &mut rng);
        assert_eq!(result.dimensions(), (32, 32));
    }

    #[test]
    fn test_flip_always_applies_with_unit_probability() {
        let aug = Augmenter::new(1.0, 0.0);
        let img = create_test_image();
        let mut rng = ChaCha8Rng::seed_from_u64(42);

        let result = aug.augment(&img, &mut rng);
        assert_eq!(result, imageops::flip_horizontal(&img));
    }

    #[test]
    fn test_rotation_preserves_dimensions() {
        let img = create_test_image();
        let rotated = rotate(&img, 10.0);
        assert_eq!(rotated.dimensions(), (32, 32));
    }

    #[test]
    fn test_eval_transform_is_deterministic() {
        let transform = Transform::eval();
        let img = create_test_image();
        let mut rng_a = ChaCha8Rng::seed_from_u64(1);
        let mut rng_b = ChaCha8Rng::seed_from_u64(2);

        assert!(!transform.is_stochastic());
        assert_eq!(
            transform.apply(&img, &mut rng_a),
            transform.apply(&img, &mut rng_b)
        );
    }

    #[test]
    fn test_chw_layout_and_normalization() {
        let transform = Transform::eval();
        let img = RgbImage::from_pixel(4, 4, Rgb([0, 255, 128]));
        let mut rng = ChaCha8Rng::seed_from_u64(0);

        let data = transform.apply(&img, &mut rng);
        assert_eq!(data.len(), 3 * 4 * 4);

        // Channel 0 is all zeros -> -1.0, channel 1 all 255 -> 1.0
        assert!((data[0] - (-1.0)).abs() < 1e-6);
        assert!((data[16] - 1.0).abs() < 1e-6);
        // Channel 2 is 128 -> roughly 0
        assert!(data[32].abs() < 0.01);
    }
}
