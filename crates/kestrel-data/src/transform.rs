// Transforms — per-image preprocessing and augmentation
//
// Augmentations operate on `Image::pixels` in [C, H, W] layout
// (channel-first, row-major). Robustness-style checks prepend these to a
// source's pipeline through `VisionData::add_augmentation`.

use rand::thread_rng;
use rand::Rng;

use crate::source::Image;

/// A transform applied to each image at access time.
pub trait Transform: Send + Sync {
    /// Apply the transform, returning the modified image.
    fn apply(&self, image: Image) -> Image;
}

/// Normalize pixels to [0, 1] by dividing by a scale factor.
///
/// Commonly `Normalize::new(255.0)` for 8-bit images.
#[derive(Debug, Clone)]
pub struct Normalize {
    scale: f64,
}

impl Normalize {
    pub fn new(scale: f64) -> Self {
        Self { scale }
    }
}

impl Transform for Normalize {
    fn apply(&self, mut image: Image) -> Image {
        for v in &mut image.pixels {
            *v /= self.scale;
        }
        image
    }
}

/// Flip an image horizontally with probability `p`.
///
/// Expects `shape = [C, H, W]`; other ranks pass through unchanged.
#[derive(Debug, Clone)]
pub struct HorizontalFlip {
    pub p: f64,
}

impl HorizontalFlip {
    pub fn new(p: f64) -> Self {
        Self { p }
    }
}

impl Transform for HorizontalFlip {
    fn apply(&self, mut image: Image) -> Image {
        let mut rng = thread_rng();
        if rng.gen::<f64>() >= self.p {
            return image;
        }
        if image.shape.len() != 3 {
            return image;
        }
        let (c, h, w) = (image.shape[0], image.shape[1], image.shape[2]);
        let mut flipped = vec![0.0; c * h * w];
        for ch in 0..c {
            for row in 0..h {
                for col in 0..w {
                    let src = ch * h * w + row * w + col;
                    let dst = ch * h * w + row * w + (w - 1 - col);
                    flipped[dst] = image.pixels[src];
                }
            }
        }
        image.pixels = flipped;
        image
    }
}

/// Add Gaussian noise to pixels: `x' = x + N(0, std)`.
#[derive(Debug, Clone)]
pub struct GaussianNoise {
    pub std_dev: f64,
}

impl GaussianNoise {
    pub fn new(std_dev: f64) -> Self {
        Self { std_dev }
    }
}

impl Transform for GaussianNoise {
    fn apply(&self, mut image: Image) -> Image {
        use rand_distr::{Distribution, Normal};
        let normal = Normal::new(0.0, self.std_dev).unwrap();
        let mut rng = thread_rng();
        for v in &mut image.pixels {
            *v += normal.sample(&mut rng);
        }
        image
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_image(c: usize, h: usize, w: usize) -> Image {
        let n = c * h * w;
        Image {
            pixels: (0..n).map(|i| i as f64).collect(),
            shape: vec![c, h, w],
        }
    }

    #[test]
    fn normalize_scales() {
        let t = Normalize::new(255.0);
        let out = t.apply(Image {
            pixels: vec![0.0, 127.5, 255.0],
            shape: vec![1, 1, 3],
        });
        assert!((out.pixels[1] - 0.5).abs() < 1e-9);
        assert!((out.pixels[2] - 1.0).abs() < 1e-9);
    }

    #[test]
    fn horizontal_flip_deterministic() {
        // p=1.0 always flips
        let flip = HorizontalFlip::new(1.0);
        let out = flip.apply(make_image(1, 2, 3));
        // Original: [0,1,2, 3,4,5] → [2,1,0, 5,4,3]
        assert_eq!(out.pixels, vec![2.0, 1.0, 0.0, 5.0, 4.0, 3.0]);
    }

    #[test]
    fn gaussian_noise_changes_values() {
        let noise = GaussianNoise::new(1.0);
        let original = make_image(1, 2, 2);
        let out = noise.apply(original.clone());
        let changed = out
            .pixels
            .iter()
            .zip(original.pixels.iter())
            .any(|(a, b)| (a - b).abs() > 1e-10);
        assert!(changed);
    }
}
