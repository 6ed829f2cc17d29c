use duocam_image::Image;

/// Write a pixel if it lies inside the image, otherwise do nothing.
#[inline]
fn put_pixel<const C: usize>(img: &mut Image<u8, C>, x: i64, y: i64, color: [u8; C]) {
    if x < 0 || y < 0 || x >= img.cols() as i64 || y >= img.rows() as i64 {
        return;
    }
    let start = (y as usize * img.cols() + x as usize) * C;
    img.as_slice_mut()[start..start + C].copy_from_slice(&color);
}

/// Draws a line on an image inplace using Bresenham's line algorithm.
///
/// # Arguments
///
/// * `img` - The image to draw on.
/// * `p0` - The start point of the line as a tuple of (x, y).
/// * `p1` - The end point of the line as a tuple of (x, y).
/// * `color` - The color of the line as an array of `C` elements.
/// * `thickness` - The thickness of the line, drawn as a square brush.
pub fn draw_line<const C: usize>(
    img: &mut Image<u8, C>,
    p0: (i64, i64),
    p1: (i64, i64),
    color: [u8; C],
    thickness: usize,
) {
    let (mut x0, mut y0) = p0;
    let (x1, y1) = p1;

    let dx = (x1 - x0).abs();
    let dy = (y1 - y0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx - dy;

    let half = (thickness.max(1) as i64 - 1) / 2;

    loop {
        for i in -half..=half {
            for j in -half..=half {
                put_pixel(img, x0 + i, y0 + j, color);
            }
        }

        if x0 == x1 && y0 == y1 {
            break;
        }

        let e2 = 2 * err;
        if e2 > -dy {
            err -= dy;
            x0 += sx;
        }
        if e2 < dx {
            err += dx;
            y0 += sy;
        }
    }
}

/// Draws a rectangle outline on an image inplace.
///
/// # Arguments
///
/// * `img` - The image to draw on.
/// * `top_left` - The top-left corner coordinates (x, y).
/// * `bottom_right` - The bottom-right corner coordinates (x, y).
/// * `color` - The color of the rectangle outline.
/// * `thickness` - The thickness of the lines.
pub fn draw_rect<const C: usize>(
    img: &mut Image<u8, C>,
    top_left: (i64, i64),
    bottom_right: (i64, i64),
    color: [u8; C],
    thickness: usize,
) {
    let (lx0, lx1) = (top_left.0.min(bottom_right.0), top_left.0.max(bottom_right.0));
    let (ly0, ly1) = (top_left.1.min(bottom_right.1), top_left.1.max(bottom_right.1));

    draw_line(img, (lx0, ly0), (lx1, ly0), color, thickness);
    draw_line(img, (lx0, ly1), (lx1, ly1), color, thickness);
    draw_line(img, (lx0, ly0), (lx0, ly1), color, thickness);
    draw_line(img, (lx1, ly0), (lx1, ly1), color, thickness);
}

/// Draws a filled rectangle on an image inplace.
///
/// The bottom-right corner is exclusive and the area is clipped to the image.
pub fn draw_filled_rect<const C: usize>(
    img: &mut Image<u8, C>,
    top_left: (i64, i64),
    bottom_right: (i64, i64),
    color: [u8; C],
) {
    let x_min = top_left.0.min(bottom_right.0).max(0);
    let y_min = top_left.1.min(bottom_right.1).max(0);
    let x_max = top_left.0.max(bottom_right.0).min(img.cols() as i64);
    let y_max = top_left.1.max(bottom_right.1).min(img.rows() as i64);

    for y in y_min..y_max {
        for x in x_min..x_max {
            put_pixel(img, x, y, color);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use duocam_image::{Image, ImageError, ImageSize};

    #[rustfmt::skip]
    #[test]
    fn test_draw_line() -> Result<(), ImageError> {
        let mut img = Image::new(
            ImageSize { width: 5, height: 5 }, vec![0u8; 25],
        )?;
        draw_line(&mut img, (0, 0), (4, 4), [255], 1);
        assert_eq!(
            img.as_slice(),
            &[
                255,   0,   0,   0,   0,
                  0, 255,   0,   0,   0,
                  0,   0, 255,   0,   0,
                  0,   0,   0, 255,   0,
                  0,   0,   0,   0, 255,
            ]
        );
        Ok(())
    }

    #[rustfmt::skip]
    #[test]
    fn test_draw_rect() -> Result<(), ImageError> {
        let mut img = Image::new(
            ImageSize { width: 5, height: 5 }, vec![0u8; 25],
        )?;
        draw_rect(&mut img, (3, 3), (1, 1), [128], 1);
        assert_eq!(
            img.as_slice(),
            &[
                  0,   0,   0,   0,   0,
                  0, 128, 128, 128,   0,
                  0, 128,   0, 128,   0,
                  0, 128, 128, 128,   0,
                  0,   0,   0,   0,   0,
            ]
        );
        Ok(())
    }

    #[test]
    fn test_draw_filled_rect_clipped() -> Result<(), ImageError> {
        let mut img = Image::<u8, 1>::from_size_val([4, 4].into(), 0)?;
        draw_filled_rect(&mut img, (-2, 2), (10, 10), [9]);
        assert_eq!(img.as_slice().iter().filter(|&&v| v == 9).count(), 8);
        assert_eq!(*img.get_pixel(0, 1, 0)?, 0);
        Ok(())
    }
}
