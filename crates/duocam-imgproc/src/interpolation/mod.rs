//! Pixel interpolation methods for resampling images.
//!
//! - **Nearest**: uses the nearest pixel value (no interpolation)
//! - **Bilinear**: linear interpolation between the four adjacent pixels
//!
//! Samples falling outside of the source image read as zero, which leaves the
//! invalid region of an undistorted frame black.

mod bilinear;
mod interpolate;
mod remap;

pub use bilinear::bilinear_sample;
pub use interpolate::{interpolate_pixel, InterpolationMode};
pub use remap::{remap, remap_u8};
