use std::collections::{HashMap, VecDeque};

use duocam_image::Image;
use duocam_imgproc::{
    color::gray_u8_to_f32,
    filter::{gaussian_blur, spatial_gradient},
    interpolation::bilinear_sample,
};

use crate::error::CalibError;
use crate::pattern::PatternSize;

/// Termination criteria and window of the sub-pixel corner refinement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SubPixParams {
    /// Half size of the search window, `5` gives an 11x11 window.
    pub half_window: usize,
    /// Maximum number of iterations per corner.
    pub max_iters: usize,
    /// Stop when the corner moves less than this many pixels.
    pub eps: f64,
}

impl Default for SubPixParams {
    fn default() -> Self {
        Self {
            half_window: 5,
            max_iters: 30,
            eps: 0.001,
        }
    }
}

/// Parameters of the saddle point corner detector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChessboardDetectorParams {
    /// Sigma of the gaussian blur applied before computing the response.
    pub blur_sigma: f32,
    /// Radius of the non maximum suppression window.
    pub nms_radius: usize,
    /// Candidates below this fraction of the strongest response are dropped.
    pub response_ratio: f32,
    /// Radius of the circle sampled to verify the X junction.
    pub ring_radius: f32,
}

impl Default for ChessboardDetectorParams {
    fn default() -> Self {
        Self {
            blur_sigma: 1.5,
            nms_radius: 3,
            response_ratio: 0.1,
            ring_radius: 5.0,
        }
    }
}

type Point = [f64; 2];

/// Saddle point response `Ixy^2 - Ixx * Iyy` of a blurred image.
///
/// It is positive at X junctions where two dark and two bright quadrants meet.
fn saddle_response(blurred: &Image<f32, 1>) -> Result<Image<f32, 1>, CalibError> {
    let size = blurred.size();
    let mut dx = Image::<f32, 1>::from_size_val(size, 0.0)?;
    let mut dy = Image::<f32, 1>::from_size_val(size, 0.0)?;
    spatial_gradient(blurred, &mut dx, &mut dy)?;

    let mut dxx = Image::<f32, 1>::from_size_val(size, 0.0)?;
    let mut dxy = Image::<f32, 1>::from_size_val(size, 0.0)?;
    spatial_gradient(&dx, &mut dxx, &mut dxy)?;

    let mut dyx = Image::<f32, 1>::from_size_val(size, 0.0)?;
    let mut dyy = Image::<f32, 1>::from_size_val(size, 0.0)?;
    spatial_gradient(&dy, &mut dyx, &mut dyy)?;

    let data = dxx
        .as_slice()
        .iter()
        .zip(dxy.as_slice())
        .zip(dyy.as_slice())
        .map(|((xx, xy), yy)| xy * xy - xx * yy)
        .collect();
    Ok(Image::new(size, data)?)
}

/// Count the dark/bright alternations on a circle around a candidate.
fn ring_transitions(blurred: &Image<f32, 1>, p: Point, radius: f32) -> (usize, f32) {
    const SAMPLES: usize = 16;
    let samples = (0..SAMPLES)
        .map(|k| {
            let a = k as f32 * std::f32::consts::TAU / SAMPLES as f32;
            bilinear_sample(
                blurred,
                p[0] as f32 + radius * a.cos(),
                p[1] as f32 + radius * a.sin(),
            )
        })
        .collect::<Vec<_>>();

    let max = samples.iter().cloned().fold(f32::MIN, f32::max);
    let min = samples.iter().cloned().fold(f32::MAX, f32::min);
    let (mid, band) = ((max + min) * 0.5, (max - min) * 0.1);

    // ignore samples sitting on an edge to avoid counting flicker
    let labels = samples
        .iter()
        .filter_map(|&s| {
            if s > mid + band {
                Some(1)
            } else if s < mid - band {
                Some(-1)
            } else {
                None
            }
        })
        .collect::<Vec<i32>>();

    let transitions = if labels.is_empty() {
        0
    } else {
        (0..labels.len())
            .filter(|&i| labels[i] != labels[(i + 1) % labels.len()])
            .count()
    };
    (transitions, max - min)
}

/// Find X junction candidates with a saddle response and a ring test.
fn detect_candidates(
    blurred: &Image<f32, 1>,
    params: &ChessboardDetectorParams,
) -> Result<Vec<Point>, CalibError> {
    let response = saddle_response(blurred)?;
    let (cols, rows) = (response.cols(), response.rows());
    let data = response.as_slice();

    let max_response = data.iter().cloned().fold(0.0f32, f32::max);
    if max_response <= 1e-9 {
        return Ok(Vec::new());
    }
    let threshold = params.response_ratio * max_response;

    let r = params.nms_radius as isize;
    let margin = (params.ring_radius.ceil() as usize + 2).max(params.nms_radius);
    if cols <= 2 * margin || rows <= 2 * margin {
        return Ok(Vec::new());
    }

    let mut candidates = Vec::new();
    for y in margin..rows - margin {
        for x in margin..cols - margin {
            let s = data[y * cols + x];
            if s <= threshold {
                continue;
            }
            let mut is_max = true;
            'nms: for dy in -r..=r {
                for dx in -r..=r {
                    if dx == 0 && dy == 0 {
                        continue;
                    }
                    let (nx, ny) = (x as isize + dx, y as isize + dy);
                    if nx < 0 || ny < 0 || nx >= cols as isize || ny >= rows as isize {
                        continue;
                    }
                    let n = data[ny as usize * cols + nx as usize];
                    // ties go to the first pixel in raster order
                    let earlier = dy < 0 || (dy == 0 && dx < 0);
                    if n > s || (earlier && n == s) {
                        is_max = false;
                        break 'nms;
                    }
                }
            }
            if !is_max {
                continue;
            }

            let p = [x as f64, y as f64];
            let (transitions, contrast) = ring_transitions(blurred, p, params.ring_radius);
            if transitions == 4 && contrast > 0.15 {
                candidates.push(p);
            }
        }
    }

    Ok(candidates)
}

fn sub(a: Point, b: Point) -> Point {
    [a[0] - b[0], a[1] - b[1]]
}

fn norm(a: Point) -> f64 {
    (a[0] * a[0] + a[1] * a[1]).sqrt()
}

/// Pick two non collinear neighbour steps around a seed.
fn seed_steps(points: &[Point], seed: usize) -> Option<(Point, Point)> {
    let mut neighbours = (0..points.len())
        .filter(|&i| i != seed)
        .map(|i| (norm(sub(points[i], points[seed])), i))
        .collect::<Vec<_>>();
    neighbours.sort_by(|a, b| a.0.total_cmp(&b.0));
    neighbours.truncate(4);
    if neighbours.len() < 2 {
        return None;
    }

    let (len_u, iu) = neighbours[0];
    let u = sub(points[iu], points[seed]);
    neighbours[1..]
        .iter()
        .filter_map(|&(len_v, iv)| {
            let v = sub(points[iv], points[seed]);
            let cos = (u[0] * v[0] + u[1] * v[1]).abs() / (len_u * len_v);
            (cos < 0.5 && len_v < 2.0 * len_u).then_some((cos, v))
        })
        .min_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, v)| (u, v))
}

/// Grow a lattice from a seed by predicting neighbour positions.
///
/// Returns the lattice coordinates of every reached candidate.
fn grow_lattice(points: &[Point], seed: usize, u: Point, v: Point) -> HashMap<(i32, i32), usize> {
    let mut lattice = HashMap::new();
    let mut used = vec![false; points.len()];
    let mut queue = VecDeque::new();

    lattice.insert((0, 0), seed);
    used[seed] = true;
    queue.push_back(((0i32, 0i32), u, v));

    while let Some(((i, j), su, sv)) = queue.pop_front() {
        let p = points[lattice[&(i, j)]];
        let tolerance = 0.35 * norm(su).min(norm(sv));
        for (di, dj) in [(1i32, 0i32), (-1, 0), (0, 1), (0, -1)] {
            let key = (i + di, j + dj);
            if lattice.contains_key(&key) {
                continue;
            }
            let (fi, fj) = (di as f64, dj as f64);
            let pred = [
                p[0] + fi * su[0] + fj * sv[0],
                p[1] + fi * su[1] + fj * sv[1],
            ];
            let best = (0..points.len())
                .filter(|&k| !used[k])
                .map(|k| (norm(sub(points[k], pred)), k))
                .min_by(|a, b| a.0.total_cmp(&b.0));
            let Some((dist, k)) = best else {
                continue;
            };
            if dist > tolerance {
                continue;
            }

            // follow the perspective by updating the step along the walked axis
            let step = sub(points[k], p);
            let (nsu, nsv) = if di != 0 {
                ([step[0] * fi, step[1] * fi], sv)
            } else {
                (su, [step[0] * fj, step[1] * fj])
            };
            used[k] = true;
            lattice.insert(key, k);
            queue.push_back((key, nsu, nsv));
        }
    }

    lattice
}

/// Arrange a complete lattice as `rows` rows of `cols` corners.
fn lattice_to_grid(
    points: &[Point],
    lattice: &HashMap<(i32, i32), usize>,
    pattern: &PatternSize,
) -> Option<Vec<Vec<Point>>> {
    if lattice.len() != pattern.num_corners() {
        return None;
    }
    let imin = lattice.keys().map(|k| k.0).min()?;
    let imax = lattice.keys().map(|k| k.0).max()?;
    let jmin = lattice.keys().map(|k| k.1).min()?;
    let jmax = lattice.keys().map(|k| k.1).max()?;
    let (w, h) = ((imax - imin + 1) as usize, (jmax - jmin + 1) as usize);

    let at = |i: i32, j: i32| lattice.get(&(i, j)).map(|&k| points[k]);
    let mut grid = Vec::with_capacity(pattern.rows);
    if (w, h) == (pattern.cols, pattern.rows) {
        for r in 0..pattern.rows {
            let row = (0..pattern.cols)
                .map(|c| at(imin + c as i32, jmin + r as i32))
                .collect::<Option<Vec<_>>>()?;
            grid.push(row);
        }
    } else if (w, h) == (pattern.rows, pattern.cols) {
        for r in 0..pattern.rows {
            let row = (0..pattern.cols)
                .map(|c| at(imin + r as i32, jmin + c as i32))
                .collect::<Option<Vec<_>>>()?;
            grid.push(row);
        }
    } else {
        return None;
    }
    Some(grid)
}

/// Order the grid so rows run left to right and follow each other downwards.
fn canonicalize(mut grid: Vec<Vec<Point>>) -> Vec<Point> {
    let rows = grid.len();
    let cols = grid[0].len();

    let axis = |g: &Vec<Vec<Point>>, along_row: bool| -> Point {
        let mut d = [0.0, 0.0];
        if along_row {
            for row in g {
                let s = sub(row[cols - 1], row[0]);
                d = [d[0] + s[0], d[1] + s[1]];
            }
        } else {
            for c in 0..cols {
                let s = sub(g[rows - 1][c], g[0][c]);
                d = [d[0] + s[0], d[1] + s[1]];
            }
        }
        d
    };

    // square boards are ambiguous, prefer rows along the image x axis
    if rows == cols {
        let d_row = axis(&grid, true);
        if d_row[1].abs() > d_row[0].abs() {
            grid = (0..rows)
                .map(|r| (0..cols).map(|c| grid[c][r]).collect())
                .collect();
        }
    }

    let d_row = axis(&grid, true);
    let flip_cols = if d_row[0].abs() >= d_row[1].abs() {
        d_row[0] < 0.0
    } else {
        d_row[1] < 0.0
    };
    if flip_cols {
        grid.iter_mut().for_each(|row| row.reverse());
    }

    let d_col = axis(&grid, false);
    let flip_rows = if d_col[1].abs() >= d_col[0].abs() {
        d_col[1] < 0.0
    } else {
        d_col[0] < 0.0
    };
    if flip_rows {
        grid.reverse();
    }

    grid.into_iter().flatten().collect()
}

/// Refine corner locations to sub-pixel accuracy.
///
/// Each corner is moved to the point where the image gradients inside the
/// window are orthogonal to the vectors joining it, weighted by a gaussian.
/// Corners that drift out of the window keep their initial position.
///
/// # Arguments
///
/// * `image` - The grayscale image.
/// * `corners` - The corners to refine in place.
/// * `params` - The window size and termination criteria.
pub fn corner_sub_pix(
    image: &Image<f32, 1>,
    corners: &mut [[f64; 2]],
    params: &SubPixParams,
) -> Result<(), CalibError> {
    let size = image.size();
    let mut gx = Image::<f32, 1>::from_size_val(size, 0.0)?;
    let mut gy = Image::<f32, 1>::from_size_val(size, 0.0)?;
    spatial_gradient(image, &mut gx, &mut gy)?;

    let win = params.half_window as i32;
    let eps_sq = params.eps * params.eps;
    let (cols, rows) = (image.cols() as f64, image.rows() as f64);

    for corner in corners.iter_mut() {
        let initial = *corner;
        let mut current = initial;

        for _ in 0..params.max_iters {
            let (mut a, mut b, mut c, mut bb1, mut bb2) = (0.0, 0.0, 0.0, 0.0, 0.0);
            for i in -win..=win {
                for j in -win..=win {
                    let (px, py) = (j as f64, i as f64);
                    let weight = (-(px * px + py * py) / (win * win) as f64).exp();
                    let (sx, sy) = ((current[0] + px) as f32, (current[1] + py) as f32);
                    let dx = bilinear_sample(&gx, sx, sy) as f64;
                    let dy = bilinear_sample(&gy, sx, sy) as f64;
                    let (gxx, gxy, gyy) = (dx * dx * weight, dx * dy * weight, dy * dy * weight);
                    a += gxx;
                    b += gxy;
                    c += gyy;
                    bb1 += gxx * px + gxy * py;
                    bb2 += gxy * px + gyy * py;
                }
            }

            let det = a * c - b * b;
            if det.abs() <= f64::EPSILON {
                break;
            }
            let scale = 1.0 / det;
            let next = [
                current[0] + c * scale * bb1 - b * scale * bb2,
                current[1] - b * scale * bb1 + a * scale * bb2,
            ];
            let err = (next[0] - current[0]).powi(2) + (next[1] - current[1]).powi(2);
            current = next;
            if current[0] < 0.0 || current[0] >= cols || current[1] < 0.0 || current[1] >= rows {
                break;
            }
            if err <= eps_sq {
                break;
            }
        }

        if (current[0] - initial[0]).abs() > win as f64 || (current[1] - initial[1]).abs() > win as f64 {
            current = initial;
        }
        *corner = current;
    }

    Ok(())
}

/// Find the inner corners of a chessboard.
///
/// The corners are returned row by row, `pattern.cols` corners per row, with
/// the first row at the top of the image running left to right. Returns
/// `Ok(None)` when the complete board is not visible.
///
/// # Arguments
///
/// * `gray` - The grayscale image.
/// * `pattern` - The number of inner corners of the board.
/// * `detector` - The corner detector parameters.
/// * `subpix` - The sub-pixel refinement parameters.
pub fn find_chessboard_corners(
    gray: &Image<u8, 1>,
    pattern: &PatternSize,
    detector: &ChessboardDetectorParams,
    subpix: &SubPixParams,
) -> Result<Option<Vec<[f64; 2]>>, CalibError> {
    let image = gray_u8_to_f32(gray).map(|v| v / 255.0);
    let kernel = 2 * (3.0 * detector.blur_sigma).ceil() as usize + 1;
    let mut blurred = Image::<f32, 1>::from_size_val(image.size(), 0.0)?;
    gaussian_blur(
        &image,
        &mut blurred,
        (kernel, kernel),
        (detector.blur_sigma, detector.blur_sigma),
    )?;

    let candidates = detect_candidates(&blurred, detector)?;
    log::trace!("chessboard candidates: {}", candidates.len());
    if candidates.len() < pattern.num_corners() {
        return Ok(None);
    }

    // seeds close to the centroid are most likely interior corners
    let n = candidates.len() as f64;
    let centroid = candidates
        .iter()
        .fold([0.0, 0.0], |acc, p| [acc[0] + p[0] / n, acc[1] + p[1] / n]);
    let mut seeds = (0..candidates.len()).collect::<Vec<_>>();
    seeds.sort_by(|&a, &b| {
        norm(sub(candidates[a], centroid)).total_cmp(&norm(sub(candidates[b], centroid)))
    });

    for &seed in seeds.iter().take(8) {
        let Some((u, v)) = seed_steps(&candidates, seed) else {
            continue;
        };
        let lattice = grow_lattice(&candidates, seed, u, v);
        let Some(grid) = lattice_to_grid(&candidates, &lattice, pattern) else {
            continue;
        };
        let mut corners = canonicalize(grid);
        corner_sub_pix(&image, &mut corners, subpix)?;
        return Ok(Some(corners));
    }

    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::{project_point, CameraMatrix, Distortion};
    use crate::linalg::rodrigues;
    use crate::pattern::render_chessboard_view;
    use duocam_image::ImageSize;

    fn camera() -> CameraMatrix {
        CameraMatrix {
            fx: 500.0,
            fy: 500.0,
            cx: 320.0,
            cy: 240.0,
        }
    }

    #[test]
    fn test_find_chessboard_tilted() -> Result<(), CalibError> {
        let pattern = PatternSize::new(9, 6)?;
        let square = 25.0;
        let k = camera();
        let dist = Distortion::default();
        let r = rodrigues(&[0.2, -0.25, 0.05]);
        let t = [-100.0, -60.0, 600.0];
        let size = ImageSize {
            width: 640,
            height: 480,
        };
        let image = render_chessboard_view(&pattern, square, &k, &dist, &r, &t, size)?;

        let corners = find_chessboard_corners(
            &image,
            &pattern,
            &ChessboardDetectorParams::default(),
            &SubPixParams::default(),
        )?
        .expect("board should be found");
        assert_eq!(corners.len(), 54);

        let expected = pattern
            .object_points(square)
            .iter()
            .map(|p| project_point(&k, &dist, &r, &t, p))
            .collect::<Vec<_>>();
        let max_err = corners
            .iter()
            .zip(expected.iter())
            .map(|(c, e)| norm(sub(*c, *e)))
            .fold(0.0, f64::max);
        assert!(max_err < 0.2, "max corner error {max_err}");
        Ok(())
    }

    #[test]
    fn test_find_chessboard_missing() -> Result<(), CalibError> {
        let pattern = PatternSize::new(9, 6)?;
        let blank = Image::<u8, 1>::from_size_val([320, 240].into(), 200)?;
        let res = find_chessboard_corners(
            &blank,
            &pattern,
            &ChessboardDetectorParams::default(),
            &SubPixParams::default(),
        )?;
        assert!(res.is_none());
        Ok(())
    }

    #[test]
    fn test_find_chessboard_partially_visible() -> Result<(), CalibError> {
        let pattern = PatternSize::new(9, 6)?;
        let k = camera();
        // shifted so the right part of the board leaves the image
        let image = render_chessboard_view(
            &pattern,
            25.0,
            &k,
            &Distortion::default(),
            &rodrigues(&[0.0, 0.0, 0.0]),
            &[250.0, -60.0, 500.0],
            [640, 480].into(),
        )?;
        let res = find_chessboard_corners(
            &image,
            &pattern,
            &ChessboardDetectorParams::default(),
            &SubPixParams::default(),
        )?;
        assert!(res.is_none());
        Ok(())
    }

    #[test]
    fn test_corner_sub_pix_converges() -> Result<(), CalibError> {
        let pattern = PatternSize::new(3, 3)?;
        let k = camera();
        let image = render_chessboard_view(
            &pattern,
            40.0,
            &k,
            &Distortion::default(),
            &rodrigues(&[0.0, 0.0, 0.1]),
            &[-37.3, -41.7, 500.0],
            [640, 480].into(),
        )?;
        let truth = project_point(
            &k,
            &Distortion::default(),
            &rodrigues(&[0.0, 0.0, 0.1]),
            &[-37.3, -41.7, 500.0],
            &[40.0, 40.0, 0.0],
        );
        let mut corners = [[truth[0].round() + 1.0, truth[1].round() - 1.0]];
        let image_f32 = gray_u8_to_f32(&image);
        corner_sub_pix(&image_f32, &mut corners, &SubPixParams::default())?;
        assert!(norm(sub(corners[0], truth)) < 0.1);
        Ok(())
    }
}
