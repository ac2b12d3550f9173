use crate::error::{DataError, Result};

pub const IMG_WIDTH: u32 = 32;
pub const IMG_HEIGHT: u32 = 32;
pub const IMG_CHANNELS: u32 = 3;
pub const NUM_CLASSES: u32 = 10;

/// Bytes in one colour plane of a raw record.
pub const PLANE_SIZE: usize = (IMG_WIDTH * IMG_HEIGHT) as usize;
/// Bytes in one raw record: three planes stored red, green, blue.
pub const RECORD_SIZE: usize = PLANE_SIZE * IMG_CHANNELS as usize;

// Channel indices of a decoded `Image`.
pub const BLUE: usize = 0;
pub const GREEN: usize = 1;
pub const RED: usize = 2;

pub const CLASSES: [&'static str; 10] = [
    "airplane",
    "automobile",
    "bird",
    "cat",
    "deer",
    "dog",
    "frog",
    "horse",
    "ship",
    "truck",
];

/// H x W x C, channels in blue, green, red order.
pub type Image = [[[u8; IMG_CHANNELS as _]; IMG_WIDTH as _]; IMG_HEIGHT as _];

/// One record as it is stored in a batch file.
#[derive(Debug, Clone, Copy)]
pub struct RawRecord<'a> {
    pub label: usize,
    pub pixels: &'a [u8],
    pub filename: &'a str,
}

impl RawRecord<'_> {
    pub fn decode(&self) -> Result<Image> {
        decode_image(self.pixels)
    }

    pub fn decode_labeled(&self, classes: usize) -> Result<LabeledExample> {
        Ok(LabeledExample {
            img: self.decode()?,
            label: dl_utils::one_hot(self.label, classes)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LabeledExample {
    pub img: Image,
    /// One-hot encoded class.
    pub label: Vec<f32>,
}

impl LabeledExample {
    /// `None` when `label` is empty.
    pub fn class(&self) -> Option<usize> {
        dl_utils::argmax(&self.label)
    }
}

/// Decodes a planar RGB record into an interleaved BGR image.
pub fn decode_image(pixels: &[u8]) -> Result<Image> {
    if pixels.len() != RECORD_SIZE {
        return Err(DataError::Shape {
            expected: RECORD_SIZE,
            actual: pixels.len(),
        });
    }

    let (r, rest) = pixels.split_at(PLANE_SIZE);
    let (g, b) = rest.split_at(PLANE_SIZE);

    let mut img = [[[0u8; IMG_CHANNELS as _]; IMG_WIDTH as _]; IMG_HEIGHT as _];
    for (k, ((r, g), b)) in r.iter().zip(g).zip(b).enumerate() {
        let i = k / IMG_WIDTH as usize;
        let j = k % IMG_WIDTH as usize;

        img[i][j][BLUE] = *b;
        img[i][j][GREEN] = *g;
        img[i][j][RED] = *r;
    }

    Ok(img)
}
