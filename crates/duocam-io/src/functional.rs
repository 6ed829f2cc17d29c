use std::path::Path;

use duocam_image::{Image, ImageSize};

use crate::error::IoError;

/// Reads an image file of any format supported by the `image` crate as RGB.
///
/// # Arguments
///
/// * `file_path` - The path to the image.
///
/// # Returns
///
/// An RGB image, grayscale files are expanded to three channels.
pub fn read_image_rgb8(file_path: impl AsRef<Path>) -> Result<Image<u8, 3>, IoError> {
    let file_path = file_path.as_ref();
    if !file_path.exists() {
        return Err(IoError::FileDoesNotExist(file_path.to_path_buf()));
    }

    let img = image::ImageReader::open(file_path)?.with_guessed_format()?.decode()?;
    let size = ImageSize {
        width: img.width() as usize,
        height: img.height() as usize,
    };

    Ok(Image::new(size, img.into_rgb8().into_raw())?)
}

/// Writes an 8 bit image, the format follows the file extension.
///
/// # Arguments
///
/// * `file_path` - The destination file.
/// * `image` - A grayscale or RGB image.
pub fn write_image<const C: usize>(file_path: impl AsRef<Path>, image: &Image<u8, C>) -> Result<(), IoError> {
    let color = match C {
        1 => image::ColorType::L8,
        3 => image::ColorType::Rgb8,
        _ => return Err(IoError::UnsupportedImageFormat),
    };
    image::save_buffer(
        file_path.as_ref(),
        image.as_slice(),
        image.width() as u32,
        image.height() as u32,
        color,
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_read_png() -> Result<(), IoError> {
        let tmp_dir = tempfile::tempdir()?;
        let file_path = tmp_dir.path().join("gray.png");

        let gray = Image::<u8, 1>::from_fn([8, 4].into(), |x, y, _| (x * 10 + y) as u8);
        write_image(&file_path, &gray)?;

        let back = read_image_rgb8(&file_path)?;
        assert_eq!(back.width(), 8);
        assert_eq!(back.height(), 4);
        assert_eq!(*back.get_pixel(3, 2, 0)?, 32);
        assert_eq!(*back.get_pixel(3, 2, 2)?, 32);
        Ok(())
    }

    #[test]
    fn test_read_missing() {
        assert!(matches!(
            read_image_rgb8("/nonexistent/frame.png"),
            Err(IoError::FileDoesNotExist(_))
        ));
    }
}
