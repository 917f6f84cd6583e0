use crate::ml::error::{MlError, MlResult};

pub const KEYPOINT_COUNT: usize = 5;

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Point2D {
    pub x: f32,
    pub y: f32,
}

impl Point2D {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Point2D) -> f32 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    pub fn midpoint(&self, other: &Point2D) -> Point2D {
        Point2D::new((self.x + other.x) / 2.0, (self.y + other.y) / 2.0)
    }
}

/// Axis-aligned box in source-image pixels, `(x1, y1)` top-left and `(x2, y2)` bottom-right.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BoundingBox {
    pub const fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }

    pub fn corners(&self) -> [Point2D; 4] {
        [
            Point2D::new(self.x1, self.y1),
            Point2D::new(self.x2, self.y1),
            Point2D::new(self.x1, self.y2),
            Point2D::new(self.x2, self.y2),
        ]
    }
}

/// The five facial landmarks in canonical detector order.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Keypoints {
    pub left_eye: Point2D,
    pub right_eye: Point2D,
    pub nose: Point2D,
    pub left_mouth: Point2D,
    pub right_mouth: Point2D,
}

impl Keypoints {
    pub fn to_array(&self) -> [Point2D; KEYPOINT_COUNT] {
        [
            self.left_eye,
            self.right_eye,
            self.nose,
            self.left_mouth,
            self.right_mouth,
        ]
    }

    pub fn map(&self, f: impl Fn(Point2D) -> Point2D) -> Keypoints {
        Keypoints::from(self.to_array().map(f))
    }
}

impl From<[Point2D; KEYPOINT_COUNT]> for Keypoints {
    fn from(points: [Point2D; KEYPOINT_COUNT]) -> Self {
        let [left_eye, right_eye, nose, left_mouth, right_mouth] = points;
        Self {
            left_eye,
            right_eye,
            nose,
            left_mouth,
            right_mouth,
        }
    }
}

impl TryFrom<&[Point2D]> for Keypoints {
    type Error = MlError;

    fn try_from(points: &[Point2D]) -> MlResult<Self> {
        let array: [Point2D; KEYPOINT_COUNT] = points
            .try_into()
            .map_err(|_| MlError::InvalidKeypointCount(points.len()))?;
        Ok(Keypoints::from(array))
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Detection {
    pub bbox: BoundingBox,
    pub score: f32,
    pub keypoints: Keypoints,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// Clamp target for decoded geometry, in `(height, width)` order like the detector shape.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ImageBounds {
    pub height: f32,
    pub width: f32,
}

impl From<Dimensions> for ImageBounds {
    fn from(value: Dimensions) -> Self {
        Self {
            height: value.height as f32,
            width: value.width as f32,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelLayout {
    Rgb,
    Rgba,
}

impl PixelLayout {
    pub const fn channels(self) -> usize {
        match self {
            PixelLayout::Rgb => 3,
            PixelLayout::Rgba => 4,
        }
    }
}

/// Row-major interleaved 8-bit raster. The buffer always holds
/// `width * height * channels` bytes.
#[derive(Clone, Debug, PartialEq)]
pub struct RasterImage {
    dimensions: Dimensions,
    layout: PixelLayout,
    pixels: Vec<u8>,
}

impl RasterImage {
    pub fn new(width: u32, height: u32, layout: PixelLayout, pixels: Vec<u8>) -> MlResult<Self> {
        let expected_len = width as usize * height as usize * layout.channels();
        if pixels.len() != expected_len {
            return Err(MlError::ShapeMismatch(format!(
                "pixel buffer length {} does not match {}x{} with {} channels",
                pixels.len(),
                width,
                height,
                layout.channels()
            )));
        }
        Ok(Self {
            dimensions: Dimensions { width, height },
            layout,
            pixels,
        })
    }

    pub fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    pub fn width(&self) -> u32 {
        self.dimensions.width
    }

    pub fn height(&self) -> u32 {
        self.dimensions.height
    }

    pub fn layout(&self) -> PixelLayout {
        self.layout
    }

    pub fn channels(&self) -> usize {
        self.layout.channels()
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn into_pixels(self) -> Vec<u8> {
        self.pixels
    }

    pub fn rgb_at(&self, x: u32, y: u32) -> [u8; 3] {
        let idx = (y as usize * self.dimensions.width as usize + x as usize) * self.channels();
        [self.pixels[idx], self.pixels[idx + 1], self.pixels[idx + 2]]
    }
}
