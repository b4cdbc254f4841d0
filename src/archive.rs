//! Archive orchestrator (spec.md §4.4): drives predictor, gatherer, and
//! Huffman codec on a single coordinating `Stream`, stitching their
//! outputs into one archive blob and inverting that on decompress.
//!
//! Compress state machine (unchanged from spec.md):
//! `IDLE -> ALLOC -> PREDICT -> GATHER -> ENCODE -> HEADER_FILL -> CONCAT -> IDLE`,
//! with `ENCODE` retrying once at the 8-byte Huffman width on code-length
//! overflow.

use crate::config::{CompressorConfig, Mode};
use crate::errors::{QszError, QszResult};
use crate::float::Float;
use crate::header::{Header, Subfile, CODEC_HUFFMAN, CODEC_SPARSE_OUTLIER, HEADER_NBYTE};
use crate::huffman::codebook::CodeWidth;
use crate::huffman::{decode_symbols, encode_symbols, VleSubfile};
use crate::outlier::{gather, scatter, SparseOutliers};
use crate::predictor::{predict, reconstruct};
use crate::shape::Shape;
use crate::stats::CompressedStats;
use crate::stream::Stream;

fn data_range<T: Float>(data: &[T]) -> f64 {
  let mut lo = f64::INFINITY;
  let mut hi = f64::NEG_INFINITY;
  for &x in data {
    let v = x.to_f64();
    lo = lo.min(v);
    hi = hi.max(v);
  }
  if data.is_empty() {
    0.0
  } else {
    hi - lo
  }
}

/// Compresses `data` (shape `shape`) per `config`, returning the archive
/// bytes and informational stats (spec.md §4.4 compress flow).
pub fn compress<T: Float>(data: &[T], shape: Shape, config: &CompressorConfig) -> QszResult<(Vec<u8>, CompressedStats)> {
  config.validate(data.len())?;
  if shape.len() != data.len() {
    return Err(QszError::dimension(format!(
      "shape describes {} samples but data has {}",
      shape.len(),
      data.len()
    )));
  }

  let eb = match config.mode {
    Mode::Abs(_) => config.mode.resolve(0.0),
    Mode::R2r(_) => config.mode.resolve(data_range(data)),
  };

  let stream = Stream::new()?;
  let (quant, outlier) = stream.run(|| predict(data, shape, eb, config.radius));

  let sparse = gather(&outlier, config.density_factor)?;

  let pardeg = if config.pardeg == 0 {
    config.resolve_pardeg(data.len())
  } else {
    config.pardeg
  };
  let forced_width = match config.huff_nbyte {
    Some(b) => Some(CodeWidth::from_byte_vle(b)?),
    None => None,
  };
  let vle = stream.run(|| encode_symbols(&quant, pardeg, forced_width))?;

  let anchor_bytes: Vec<u8> = Vec::new();
  let vle_bytes = vle.to_bytes();
  let sparse_bytes = sparse.to_bytes();

  let entry_anchor = HEADER_NBYTE as u32;
  let entry_vle = entry_anchor + anchor_bytes.len() as u32;
  let entry_spfmt = entry_vle + vle_bytes.len() as u32;
  let entry_end = entry_spfmt + sparse_bytes.len() as u32;

  let mut entry = [0u32; 5];
  entry[Subfile::Header as usize] = 0;
  entry[Subfile::Anchor as usize] = entry_anchor;
  entry[Subfile::Vle as usize] = entry_vle;
  entry[Subfile::Spfmt as usize] = entry_spfmt;
  entry[Subfile::End as usize] = entry_end;

  let (x, y, z) = shape.to_xyz();
  let header = Header {
    dtype_byte: T::DTYPE_BYTE,
    rank: shape.rank() as u8,
    x,
    y,
    z,
    radius: config.radius,
    vle_pardeg: pardeg as u32,
    eb,
    byte_vle: vle.book.width.byte_vle(),
    codecs_in_use: CODEC_HUFFMAN | CODEC_SPARSE_OUTLIER,
    nz_density_factor: config.density_factor as u32,
    entry,
  };

  let mut blob = Vec::with_capacity(entry_end as usize);
  blob.extend_from_slice(&header.to_bytes());
  blob.extend_from_slice(&anchor_bytes);
  blob.extend_from_slice(&vle_bytes);
  blob.extend_from_slice(&sparse_bytes);

  // A literal N*sizeof(T)/2 budget is unsatisfiable for small arrays: the
  // fixed 128-byte header plus a sparse-outlier/codebook subfile's own
  // fixed overhead can exceed that budget before a single sample has been
  // counted. The floor keeps the check meaningful for realistic arrays
  // (where fixed overhead is negligible) without rejecting every small one.
  let budget = (data.len() * std::mem::size_of::<T>() / 2).max(HEADER_NBYTE + 512);
  if blob.len() > budget {
    return Err(QszError::output_inflation(format!(
      "compressed size {} exceeds budget {} (N*sizeof(T)/2, floored)",
      blob.len(),
      budget
    )));
  }

  let stats = CompressedStats {
    n: data.len(),
    n_outliers: sparse.nnz(),
    huff_byte_width: header.byte_vle,
    compression_ratio: (data.len() * std::mem::size_of::<T>()) as f64 / blob.len() as f64,
  };
  Ok((blob, stats))
}

/// Decompresses an archive produced by `compress`, returning the
/// reconstructed array and its shape (spec.md §4.4 decompress flow).
pub fn decompress<T: Float>(archive: &[u8]) -> QszResult<(Vec<T>, Shape)> {
  let header = Header::parse_from(archive)?;
  header.validate_total_len(archive.len())?;
  if header.dtype_byte != T::DTYPE_BYTE {
    return Err(QszError::config_invalid(format!(
      "archive dtype byte {} does not match requested type",
      header.dtype_byte
    )));
  }
  let shape = header.shape()?;
  let n = shape.len();

  let entry = &header.entry;
  let vle_bytes = &archive[entry[Subfile::Vle as usize] as usize..entry[Subfile::Spfmt as usize] as usize];
  let sparse_bytes = &archive[entry[Subfile::Spfmt as usize] as usize..entry[Subfile::End as usize] as usize];

  let vle = VleSubfile::parse_from(vle_bytes)?;
  let sparse = SparseOutliers::<T>::parse_from(sparse_bytes)?;

  let stream = Stream::new()?;
  let (quant, outlier) = stream.run(|| -> QszResult<(Vec<u32>, Vec<T>)> {
    let quant = decode_symbols(&vle)?;
    let outlier = scatter(&sparse, n)?;
    Ok((quant, outlier))
  })?;

  if quant.len() != n {
    return Err(QszError::dimension(format!(
      "decoded {} quant codes but header shape expects {}",
      quant.len(),
      n
    )));
  }

  let data = reconstruct(&quant, &outlier, shape, header.eb, header.radius);
  Ok((data, shape))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn round_trips_simple_ramp_1d() {
    // scenario 1: all quantizable, sparse blob empty.
    let data = vec![1.0_f64, 1.01, 1.02, 1.03];
    let config = CompressorConfig {
      mode: Mode::Abs(0.02),
      radius: 4,
      pardeg: 1,
      density_factor: 4,
      huff_nbyte: None,
    };
    let (archive, stats) = compress(&data, Shape::Dim1(data.len()), &config).unwrap();
    assert_eq!(stats.n_outliers, 0);
    let (decoded, shape) = decompress::<f64>(&archive).unwrap();
    assert_eq!(shape, Shape::Dim1(4));
    for (a, b) in decoded.iter().zip(data.iter()) {
      assert!((a - b).abs() <= 0.02 + 1e-9, "{} vs {}", a, b);
    }
  }

  #[test]
  fn round_trips_with_single_outlier() {
    // scenario 2: one outlier out of five samples.
    let data = vec![0.0_f64, 0.0, 10000.0, 0.0, 0.0];
    let config = CompressorConfig {
      mode: Mode::Abs(0.1),
      radius: 8,
      pardeg: 1,
      density_factor: 2,
      huff_nbyte: None,
    };
    let (archive, stats) = compress(&data, Shape::Dim1(data.len()), &config).unwrap();
    assert_eq!(stats.n_outliers, 1);
    let (decoded, _) = decompress::<f64>(&archive).unwrap();
    for (a, b) in decoded.iter().zip(data.iter()) {
      assert!((a - b).abs() <= 0.1 + 1e-6);
    }
  }

  #[test]
  fn round_trips_constant_2d_block() {
    // scenario 3: 32x32 zeros, tiny archive, exact reconstruction.
    let data = vec![0.0_f64; 32 * 32];
    let config = CompressorConfig {
      mode: Mode::Abs(1e-6),
      radius: 512,
      pardeg: 0,
      density_factor: 4,
      huff_nbyte: None,
    };
    let (archive, _) = compress(&data, Shape::Dim2(32, 32), &config).unwrap();
    assert!(archive.len() <= HEADER_NBYTE + 512);
    let (decoded, _) = decompress::<f64>(&archive).unwrap();
    assert_eq!(decoded, data);
  }

  #[test]
  fn round_trips_linear_ramp_3d() {
    // scenario 4: linear ramp, zero residual everywhere, no outliers.
    let (nx, ny, nz) = (8, 8, 8);
    let mut data = vec![0.0_f64; nx * ny * nz];
    for i in 0..nx {
      for j in 0..ny {
        for k in 0..nz {
          data[i * ny * nz + j * nz + k] = (i + j + k) as f64;
        }
      }
    }
    let config = CompressorConfig {
      mode: Mode::Abs(0.25),
      radius: 512,
      pardeg: 2,
      density_factor: 4,
      huff_nbyte: None,
    };
    let (archive, stats) = compress(&data, Shape::Dim3(nx, ny, nz), &config).unwrap();
    assert_eq!(stats.n_outliers, 0);
    let (decoded, _) = decompress::<f64>(&archive).unwrap();
    for (a, b) in decoded.iter().zip(data.iter()) {
      assert!((a - b).abs() <= 0.25 + 1e-9);
    }
  }

  #[test]
  fn capacity_exceeded_when_too_many_outliers() {
    // scenario 6: 40% outliers at density_factor=4 exceeds N/4 capacity.
    let n = 1000;
    let mut data = vec![0.0_f64; n];
    for (i, v) in data.iter_mut().enumerate() {
      if i % 5 < 2 {
        *v = 10_000.0 * (1 + i) as f64;
      }
    }
    let config = CompressorConfig {
      mode: Mode::Abs(0.1),
      radius: 8,
      pardeg: 1,
      density_factor: 4,
      huff_nbyte: None,
    };
    let err = compress(&data, Shape::Dim1(n), &config).unwrap_err();
    assert_eq!(err.kind, crate::errors::ErrorKind::CapacityExceeded);
  }

  #[test]
  fn rejects_shape_mismatch() {
    let data = vec![0.0_f64; 10];
    let config = CompressorConfig::default();
    let err = compress(&data, Shape::Dim1(11), &config).unwrap_err();
    assert_eq!(err.kind, crate::errors::ErrorKind::Dimension);
  }

  #[test]
  fn header_byte_vle_reflects_fallback() {
    let mut fib = vec![1u64, 1u64];
    while fib.len() < 40 {
      let next = fib[fib.len() - 1] + fib[fib.len() - 2];
      fib.push(next);
    }
    // Skewed residual magnitudes (power-of-two-ish run lengths) chosen
    // to push the quant-code histogram toward the fallback threshold;
    // we just assert archive round-trips with whatever width is picked.
    let data: Vec<f64> = (0..fib.len())
      .flat_map(|i| std::iter::repeat((i as f64) * 1000.0).take((fib[i] % 37 + 1) as usize))
      .collect();
    let config = CompressorConfig {
      mode: Mode::Abs(0.5),
      radius: 512,
      pardeg: 2,
      density_factor: 4,
      huff_nbyte: None,
    };
    let (archive, stats) = compress(&data, Shape::Dim1(data.len()), &config).unwrap();
    assert!(stats.huff_byte_width == 4 || stats.huff_byte_width == 8);
    let (decoded, _) = decompress::<f64>(&archive).unwrap();
    for (a, b) in decoded.iter().zip(data.iter()) {
      assert!((a - b).abs() <= 0.5 + 1e-6);
    }
  }
}
