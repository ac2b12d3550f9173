use anyhow::{Context, Result};

use crate::data::cifar10::{Image, BLUE, GREEN, IMG_CHANNELS, IMG_HEIGHT, IMG_WIDTH, RED};

pub fn get_env(key: &str) -> Result<String> {
    std::env::var(key).context(format!("getting env varaible `{key}`"))
}

pub fn show_image_terminal_color(img: &Image) {
    for row in img.iter() {
        for p in row.iter() {
            let color = termion::color::Rgb(p[RED], p[GREEN], p[BLUE]);
            print!("{} ", termion::color::Bg(color));
        }
        println!("{}", termion::color::Bg(termion::color::Reset));
    }
}

/// Converts a BGR image into an RGB image that can be saved to disk.
pub fn buffer_to_image(img: &Image) -> image::DynamicImage {
    let mut imgbuf = image::ImageBuffer::new(IMG_WIDTH, IMG_HEIGHT);
    for (x, y, pixel) in imgbuf.enumerate_pixels_mut() {
        let p = &img[y as usize][x as usize];
        *pixel = image::Rgb([p[RED], p[GREEN], p[BLUE]]);
    }
    image::DynamicImage::ImageRgb8(imgbuf)
}

/// Per channel statistics of pixel values scaled to `[0, 1]`, channels in
/// image order (blue, green, red).
#[derive(Debug, Clone, Copy)]
pub struct Stats {
    pub count: usize,
    pub dim: [usize; 3],
    pub value_range: [u8; 2],
    pub mean: [f32; IMG_CHANNELS as _],
    pub stddev: [f32; IMG_CHANNELS as _],
}

impl Stats {
    pub fn from_iter<'a>(iter: impl Iterator<Item = &'a Image>) -> Self {
        let mut s = [0.0f64; IMG_CHANNELS as _];
        let mut s2 = [0.0f64; IMG_CHANNELS as _];
        let mut count = 0;
        let mut value_range = [u8::MAX, u8::MIN];
        for img in iter {
            for pixel in img.iter().flatten() {
                for (c, x) in pixel.iter().enumerate() {
                    value_range[0] = value_range[0].min(*x);
                    value_range[1] = value_range[1].max(*x);

                    let x = *x as f64 / 255.0;
                    s[c] += x;
                    s2[c] += x * x;
                }
            }
            count += 1;
        }

        let n = (count * (IMG_WIDTH * IMG_HEIGHT) as usize).max(1) as f64;
        let mean = s.map(|s| s / n);
        let mut stddev = [0.0f32; IMG_CHANNELS as _];
        for c in 0..IMG_CHANNELS as usize {
            stddev[c] = (s2[c] / n - mean[c] * mean[c]).max(0.0).sqrt() as f32;
        }

        Self {
            count,
            dim: [IMG_HEIGHT as _, IMG_WIDTH as _, IMG_CHANNELS as _],
            value_range,
            mean: mean.map(|m| m as f32),
            stddev,
        }
    }
}
