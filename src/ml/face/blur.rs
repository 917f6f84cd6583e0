use ndarray::Array2;

use crate::ml::types::RasterImage;

/// Variance of the 4-neighbour Laplacian over the interior pixels of the luma plane.
///
/// Returns 0 for images without interior pixels (narrower or shorter than 3).
pub fn estimate_sharpness(image: &RasterImage) -> f64 {
    let width = image.width() as usize;
    let height = image.height() as usize;
    if width < 3 || height < 3 {
        return 0.0;
    }

    let gray = to_luma_plane(image);
    let mut sum = 0.0f64;
    let mut sum_sq = 0.0f64;
    for y in 1..height - 1 {
        for x in 1..width - 1 {
            let center = gray[[y, x]];
            // Differences first, so flat regions give exactly zero.
            let lap = (gray[[y - 1, x]] - center)
                + (gray[[y + 1, x]] - center)
                + (gray[[y, x - 1]] - center)
                + (gray[[y, x + 1]] - center);
            sum += lap;
            sum_sq += lap * lap;
        }
    }

    let count = ((width - 2) * (height - 2)) as f64;
    let mean = sum / count;
    (sum_sq / count - mean * mean).max(0.0)
}

fn to_luma_plane(image: &RasterImage) -> Array2<f64> {
    let width = image.width() as usize;
    let channels = image.channels();
    Array2::from_shape_fn((image.height() as usize, width), |(y, x)| {
        let idx = (y * width + x) * channels;
        let px = &image.pixels()[idx..idx + 3];
        0.299 * px[0] as f64 + 0.587 * px[1] as f64 + 0.114 * px[2] as f64
    })
}
