//! Dual-output Lorenzo predictor/quantizer (spec.md §4.1).
//!
//! The array is tiled (1D: 256-wide, 2D: 16x16, 3D: 32x8x8); each tile
//! predicts only from samples inside itself, treating an out-of-tile
//! neighbor as zero. That makes tiles independent in both directions
//! (forward quantization and inverse reconstruction), so `rayon` computes
//! all tiles of a stage concurrently and the host just scatters their
//! results into the shared dense buffers — the CPU analogue of spec.md's
//! "blocks are independent because a Lorenzo tile's prediction references
//! only intra-tile samples."

use rayon::prelude::*;

use crate::float::Float;
use crate::shape::Shape;

const TILE_1D: usize = 256;
const TILE_2D: (usize, usize) = (16, 16);
const TILE_3D: (usize, usize, usize) = (32, 8, 8);

/// One tile's quantized output: `(global_index, quant_code, outlier)` for
/// every sample in the tile, in tile-local scan order.
type TileResult<T> = Vec<(usize, u32, T)>;

fn prequantize<T: Float>(x: T, inv_two_eb: f64) -> i64 {
  (x.to_f64() * inv_two_eb).round() as i64
}

fn quantize_delta<T: Float>(delta: i64, radius: i32) -> (u32, T) {
  if delta.unsigned_abs() < radius as u64 {
    ((delta + radius as i64) as u32, T::ZERO)
  } else {
    // The carrier stores the unbiased delta, not `delta + radius`: an
    // outlier always has `|delta| >= radius > 0`, so this can never be
    // zero, keeping `Q[i] == 0` and `O[i] == 0` mutually exclusive even
    // at the `delta == -radius` boundary (testable property #2).
    (0, T::from_f64(delta as f64))
  }
}

/// Runs the forward predictor: fills dense quant-code and outlier arrays
/// for an array of the given shape. `Q[i] == 0` iff `O[i] != 0`
/// (testable property #2) for every sample, with no degenerate overlap:
/// the outlier carrier stores the unbiased delta, which is always
/// nonzero whenever it's used.
pub fn predict<T: Float>(data: &[T], shape: Shape, eb: f64, radius: i32) -> (Vec<u32>, Vec<T>) {
  assert_eq!(data.len(), shape.len());
  let inv_two_eb = 1.0 / (2.0 * eb);

  let tiles = tile_results(data, shape, inv_two_eb, radius);

  let mut quant = vec![0u32; data.len()];
  let mut outlier = vec![T::ZERO; data.len()];
  for tile in tiles {
    for (idx, q, o) in tile {
      quant[idx] = q;
      outlier[idx] = o;
    }
  }
  (quant, outlier)
}

fn tile_results<T: Float>(
  data: &[T],
  shape: Shape,
  inv_two_eb: f64,
  radius: i32,
) -> Vec<TileResult<T>> {
  match shape {
    Shape::Dim1(nx) => tile_coords_1d(nx)
      .into_par_iter()
      .map(|t0| predict_tile_1d(data, t0, nx, inv_two_eb, radius))
      .collect(),
    Shape::Dim2(nx, ny) => tile_coords_2d(nx, ny)
      .into_par_iter()
      .map(|(i0, j0)| predict_tile_2d(data, i0, j0, nx, ny, inv_two_eb, radius))
      .collect(),
    Shape::Dim3(nx, ny, nz) => tile_coords_3d(nx, ny, nz)
      .into_par_iter()
      .map(|(i0, j0, k0)| predict_tile_3d(data, i0, j0, k0, nx, ny, nz, inv_two_eb, radius))
      .collect(),
  }
}

fn tile_coords_1d(nx: usize) -> Vec<usize> {
  (0..nx).step_by(TILE_1D).collect()
}

fn tile_coords_2d(nx: usize, ny: usize) -> Vec<(usize, usize)> {
  let mut v = Vec::new();
  for i0 in (0..nx).step_by(TILE_2D.0) {
    for j0 in (0..ny).step_by(TILE_2D.1) {
      v.push((i0, j0));
    }
  }
  v
}

fn tile_coords_3d(nx: usize, ny: usize, nz: usize) -> Vec<(usize, usize, usize)> {
  let mut v = Vec::new();
  for i0 in (0..nx).step_by(TILE_3D.0) {
    for j0 in (0..ny).step_by(TILE_3D.1) {
      for k0 in (0..nz).step_by(TILE_3D.2) {
        v.push((i0, j0, k0));
      }
    }
  }
  v
}

fn predict_tile_1d<T: Float>(
  data: &[T],
  i0: usize,
  nx: usize,
  inv_two_eb: f64,
  radius: i32,
) -> TileResult<T> {
  let len = TILE_1D.min(nx - i0);
  // `prop` carries the value future predictions see for this slot: the
  // true prequantized sample when quantizable, or just the prediction
  // itself when the sample is an outlier. Without that clamp a single
  // spike's residual would cascade into its neighbor too (the decoder
  // would have to reconstruct the same clamp to match, see
  // `reconstruct_tile_1d`).
  let mut prop = vec![0i64; len];
  let mut out = Vec::with_capacity(len);
  for li in 0..len {
    let idx = i0 + li;
    let s = prequantize(data[idx], inv_two_eb);
    let p = if li > 0 { prop[li - 1] } else { 0 };
    let delta = s - p;
    let (q, o) = quantize_delta::<T>(delta, radius);
    prop[li] = if q != 0 { s } else { p };
    out.push((idx, q, o));
  }
  out
}

fn predict_tile_2d<T: Float>(
  data: &[T],
  i0: usize,
  j0: usize,
  nx: usize,
  ny: usize,
  inv_two_eb: f64,
  radius: i32,
) -> TileResult<T> {
  let li_len = TILE_2D.0.min(nx - i0);
  let lj_len = TILE_2D.1.min(ny - j0);
  let mut prop = vec![0i64; li_len * lj_len];
  let at = |li: usize, lj: usize| li * lj_len + lj;
  let mut out = Vec::with_capacity(li_len * lj_len);
  for li in 0..li_len {
    for lj in 0..lj_len {
      let idx = (i0 + li) * ny + (j0 + lj);
      let s = prequantize(data[idx], inv_two_eb);
      let up = if li > 0 { prop[at(li - 1, lj)] } else { 0 };
      let left = if lj > 0 { prop[at(li, lj - 1)] } else { 0 };
      let diag = if li > 0 && lj > 0 {
        prop[at(li - 1, lj - 1)]
      } else {
        0
      };
      let p = up + left - diag;
      let delta = s - p;
      let (q, o) = quantize_delta::<T>(delta, radius);
      prop[at(li, lj)] = if q != 0 { s } else { p };
      out.push((idx, q, o));
    }
  }
  out
}

#[allow(clippy::too_many_arguments)]
fn predict_tile_3d<T: Float>(
  data: &[T],
  i0: usize,
  j0: usize,
  k0: usize,
  nx: usize,
  ny: usize,
  nz: usize,
  inv_two_eb: f64,
  radius: i32,
) -> TileResult<T> {
  let li_len = TILE_3D.0.min(nx - i0);
  let lj_len = TILE_3D.1.min(ny - j0);
  let lk_len = TILE_3D.2.min(nz - k0);
  let mut prop = vec![0i64; li_len * lj_len * lk_len];
  let at = |li: usize, lj: usize, lk: usize| (li * lj_len + lj) * lk_len + lk;
  let mut out = Vec::with_capacity(li_len * lj_len * lk_len);
  for li in 0..li_len {
    for lj in 0..lj_len {
      for lk in 0..lk_len {
        let idx = ((i0 + li) * ny + (j0 + lj)) * nz + (k0 + lk);
        let s = prequantize(data[idx], inv_two_eb);

        let n100 = if li > 0 { prop[at(li - 1, lj, lk)] } else { 0 };
        let n010 = if lj > 0 { prop[at(li, lj - 1, lk)] } else { 0 };
        let n001 = if lk > 0 { prop[at(li, lj, lk - 1)] } else { 0 };
        let n110 = if li > 0 && lj > 0 {
          prop[at(li - 1, lj - 1, lk)]
        } else {
          0
        };
        let n101 = if li > 0 && lk > 0 {
          prop[at(li - 1, lj, lk - 1)]
        } else {
          0
        };
        let n011 = if lj > 0 && lk > 0 {
          prop[at(li, lj - 1, lk - 1)]
        } else {
          0
        };
        let n111 = if li > 0 && lj > 0 && lk > 0 {
          prop[at(li - 1, lj - 1, lk - 1)]
        } else {
          0
        };

        let p = n100 + n010 + n001 - n110 - n101 - n011 + n111;
        let delta = s - p;
        let (q, o) = quantize_delta::<T>(delta, radius);
        prop[at(li, lj, lk)] = if q != 0 { s } else { p };
        out.push((idx, q, o));
      }
    }
  }
  out
}

/// Inverse kernel: reconstructs the array from `(Q, O)`. Tile boundaries
/// and neighbor formulas mirror `predict` exactly so the same implicit
/// zero assumption at tile edges is reproduced on both sides.
pub fn reconstruct<T: Float>(
  quant: &[u32],
  outlier: &[T],
  shape: Shape,
  eb: f64,
  radius: i32,
) -> Vec<T> {
  assert_eq!(quant.len(), shape.len());
  assert_eq!(outlier.len(), shape.len());
  let two_eb = 2.0 * eb;

  let tiles: Vec<Vec<(usize, i64)>> = match shape {
    Shape::Dim1(nx) => tile_coords_1d(nx)
      .into_par_iter()
      .map(|t0| reconstruct_tile_1d(quant, outlier, t0, nx, radius))
      .collect(),
    Shape::Dim2(nx, ny) => tile_coords_2d(nx, ny)
      .into_par_iter()
      .map(|(i0, j0)| reconstruct_tile_2d(quant, outlier, i0, j0, nx, ny, radius))
      .collect(),
    Shape::Dim3(nx, ny, nz) => tile_coords_3d(nx, ny, nz)
      .into_par_iter()
      .map(|(i0, j0, k0)| reconstruct_tile_3d(quant, outlier, i0, j0, k0, nx, ny, nz, radius))
      .collect(),
  };

  let mut sprime = vec![0i64; shape.len()];
  for tile in tiles {
    for (idx, s) in tile {
      sprime[idx] = s;
    }
  }
  sprime
    .into_iter()
    .map(|s| T::from_f64(s as f64 * two_eb))
    .collect()
}

fn delta_of<T: Float>(quant: u32, outlier: T, radius: i32) -> i64 {
  if quant == 0 {
    outlier.to_f64().round() as i64
  } else {
    quant as i64 - radius as i64
  }
}

fn reconstruct_tile_1d<T: Float>(
  quant: &[u32],
  outlier: &[T],
  i0: usize,
  nx: usize,
  radius: i32,
) -> Vec<(usize, i64)> {
  let len = TILE_1D.min(nx - i0);
  let mut prop = vec![0i64; len];
  let mut out = Vec::with_capacity(len);
  for li in 0..len {
    let idx = i0 + li;
    let delta = delta_of(quant[idx], outlier[idx], radius);
    let p = if li > 0 { prop[li - 1] } else { 0 };
    let s = delta + p;
    prop[li] = if quant[idx] != 0 { s } else { p };
    out.push((idx, s));
  }
  out
}

fn reconstruct_tile_2d<T: Float>(
  quant: &[u32],
  outlier: &[T],
  i0: usize,
  j0: usize,
  nx: usize,
  ny: usize,
  radius: i32,
) -> Vec<(usize, i64)> {
  let li_len = TILE_2D.0.min(nx - i0);
  let lj_len = TILE_2D.1.min(ny - j0);
  let mut prop = vec![0i64; li_len * lj_len];
  let at = |li: usize, lj: usize| li * lj_len + lj;
  let mut out = Vec::with_capacity(li_len * lj_len);
  for li in 0..li_len {
    for lj in 0..lj_len {
      let idx = (i0 + li) * ny + (j0 + lj);
      let delta = delta_of(quant[idx], outlier[idx], radius);
      let up = if li > 0 { prop[at(li - 1, lj)] } else { 0 };
      let left = if lj > 0 { prop[at(li, lj - 1)] } else { 0 };
      let diag = if li > 0 && lj > 0 {
        prop[at(li - 1, lj - 1)]
      } else {
        0
      };
      let p = up + left - diag;
      let s = delta + p;
      prop[at(li, lj)] = if quant[idx] != 0 { s } else { p };
      out.push((idx, s));
    }
  }
  out
}

#[allow(clippy::too_many_arguments)]
fn reconstruct_tile_3d<T: Float>(
  quant: &[u32],
  outlier: &[T],
  i0: usize,
  j0: usize,
  k0: usize,
  nx: usize,
  ny: usize,
  nz: usize,
  radius: i32,
) -> Vec<(usize, i64)> {
  let li_len = TILE_3D.0.min(nx - i0);
  let lj_len = TILE_3D.1.min(ny - j0);
  let lk_len = TILE_3D.2.min(nz - k0);
  let mut prop = vec![0i64; li_len * lj_len * lk_len];
  let at = |li: usize, lj: usize, lk: usize| (li * lj_len + lj) * lk_len + lk;
  let mut out = Vec::with_capacity(li_len * lj_len * lk_len);
  for li in 0..li_len {
    for lj in 0..lj_len {
      for lk in 0..lk_len {
        let idx = ((i0 + li) * ny + (j0 + lj)) * nz + (k0 + lk);
        let delta = delta_of(quant[idx], outlier[idx], radius);

        let n100 = if li > 0 { prop[at(li - 1, lj, lk)] } else { 0 };
        let n010 = if lj > 0 { prop[at(li, lj - 1, lk)] } else { 0 };
        let n001 = if lk > 0 { prop[at(li, lj, lk - 1)] } else { 0 };
        let n110 = if li > 0 && lj > 0 {
          prop[at(li - 1, lj - 1, lk)]
        } else {
          0
        };
        let n101 = if li > 0 && lk > 0 {
          prop[at(li - 1, lj, lk - 1)]
        } else {
          0
        };
        let n011 = if lj > 0 && lk > 0 {
          prop[at(li, lj - 1, lk - 1)]
        } else {
          0
        };
        let n111 = if li > 0 && lj > 0 && lk > 0 {
          prop[at(li - 1, lj - 1, lk - 1)]
        } else {
          0
        };

        let p = n100 + n010 + n001 - n110 - n101 - n011 + n111;
        let s = delta + p;
        prop[at(li, lj, lk)] = if quant[idx] != 0 { s } else { p };
        out.push((idx, s));
      }
    }
  }
  out
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn exactly_one_of_quant_or_outlier_is_zero() {
    let data: Vec<f64> = (0..1000).map(|i| (i as f64 * 0.013).sin() * 50.0).collect();
    let (quant, outlier) = predict(&data, Shape::Dim1(data.len()), 0.05, 16);
    for i in 0..data.len() {
      assert_ne!(quant[i] == 0, outlier[i] == 0.0, "sample {}", i);
    }
  }

  #[test]
  fn round_trips_within_bound_1d() {
    let eb = 0.02;
    let data: Vec<f64> = vec![1.0, 1.01, 1.02, 1.03];
    let shape = Shape::Dim1(data.len());
    let (quant, outlier) = predict(&data, shape, eb, 4);
    let recon = reconstruct(&quant, &outlier, shape, eb, 4);
    for (orig, got) in data.iter().zip(recon.iter()) {
      assert!((orig - got).abs() <= eb + 1e-9, "{} vs {}", orig, got);
    }
  }

  #[test]
  fn outlier_detected_for_spike() {
    let eb = 0.1;
    let data: Vec<f64> = vec![0.0, 0.0, 10000.0, 0.0, 0.0];
    let shape = Shape::Dim1(data.len());
    let (quant, outlier) = predict(&data, shape, eb, 8);
    assert_eq!(quant[2], 0);
    assert_ne!(outlier[2], 0.0);
    let n_outliers = quant.iter().filter(|&&q| q == 0).count();
    assert_eq!(n_outliers, 1);
    let recon = reconstruct(&quant, &outlier, shape, eb, 8);
    for (orig, got) in data.iter().zip(recon.iter()) {
      assert!((orig - got).abs() <= eb + 1e-6);
    }
  }

  #[test]
  fn constant_input_has_uniform_codes() {
    let eb = 1e-6;
    let data = vec![3.0_f64; 32 * 32];
    let shape = Shape::Dim2(32, 32);
    let (quant, outlier) = predict(&data, shape, eb, 512);
    assert!(quant.iter().all(|&q| q == 512));
    assert!(outlier.iter().all(|&o| o == 0.0));
    let recon = reconstruct(&quant, &outlier, shape, eb, 512);
    for got in recon {
      assert!((got - 3.0).abs() <= eb + 1e-9);
    }
  }

  #[test]
  fn ramp_3d_has_zero_residual_everywhere() {
    let eb = 0.25;
    let (nx, ny, nz) = (8usize, 8, 8);
    let mut data = vec![0.0_f64; nx * ny * nz];
    for i in 0..nx {
      for j in 0..ny {
        for k in 0..nz {
          data[(i * ny + j) * nz + k] = (i + j + k) as f64;
        }
      }
    }
    let shape = Shape::Dim3(nx, ny, nz);
    let (quant, outlier) = predict(&data, shape, eb, 512);
    assert!(quant.iter().all(|&q| q == 512));
    assert!(outlier.iter().all(|&o| o == 0.0));
    let recon = reconstruct(&quant, &outlier, shape, eb, 512);
    for (orig, got) in data.iter().zip(recon.iter()) {
      assert!((orig - got).abs() <= eb + 1e-9);
    }
  }

  #[test]
  fn boundary_size_not_multiple_of_tile_still_within_bound() {
    let eb = 0.01;
    let n = 257; // one full 256-tile plus a 1-sample tile
    let data: Vec<f64> = (0..n).map(|i| (i as f64).sqrt()).collect();
    let shape = Shape::Dim1(n);
    let (quant, outlier) = predict(&data, shape, eb, 64);
    let recon = reconstruct(&quant, &outlier, shape, eb, 64);
    for (orig, got) in data.iter().zip(recon.iter()) {
      assert!((orig - got).abs() <= eb + 1e-9);
    }
  }
}
