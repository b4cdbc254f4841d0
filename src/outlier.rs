//! Outlier gatherer / scatterer (spec.md §4.2): compacts the dense,
//! mostly-zero outlier plane into a compressed-sparse-row triple, and
//! inverts that back into a dense plane during decompression.

use crate::errors::{QszError, QszResult};
use crate::float::Float;

/// Compressed-sparse-row compaction of the dense outlier array, viewed
/// as an `m x m` grid where `m = ceil(sqrt(n))`.
#[derive(Clone, Debug, PartialEq)]
pub struct SparseOutliers<T> {
  pub m: usize,
  pub rowptr: Vec<u32>,
  pub colidx: Vec<u32>,
  pub values: Vec<T>,
}

impl<T: Float> SparseOutliers<T> {
  pub fn nnz(&self) -> usize {
    self.values.len()
  }

  /// Total byte footprint of the serialized subfile: `(nnz, m, rowptr,
  /// colidx, values)`, matching spec.md §4.2's layout. Values are always
  /// serialized as 8-byte doubles (see `to_bytes`), independent of `T`'s
  /// own width.
  pub fn byte_len(&self) -> usize {
    8 // nnz: u32, m: u32
      + self.rowptr.len() * 4
      + self.colidx.len() * 4
      + self.values.len() * std::mem::size_of::<f64>()
  }

  pub fn to_bytes(&self) -> Vec<u8> {
    let mut buf = Vec::with_capacity(self.byte_len());
    buf.extend_from_slice(&(self.nnz() as u32).to_le_bytes());
    buf.extend_from_slice(&(self.m as u32).to_le_bytes());
    for r in &self.rowptr {
      buf.extend_from_slice(&r.to_le_bytes());
    }
    for c in &self.colidx {
      buf.extend_from_slice(&c.to_le_bytes());
    }
    for v in &self.values {
      buf.extend_from_slice(&v.to_f64().to_le_bytes());
    }
    buf
  }

  pub fn parse_from(bytes: &[u8]) -> QszResult<Self> {
    let truncated = || QszError::header_invalid("sparse outlier subfile truncated");
    if bytes.len() < 8 {
      return Err(truncated());
    }
    let nnz = u32::from_le_bytes(bytes[0..4].try_into().unwrap()) as usize;
    let m = u32::from_le_bytes(bytes[4..8].try_into().unwrap()) as usize;
    let mut off = 8;

    let rowptr_len = m + 1;
    let read_u32 = |bytes: &[u8], off: &mut usize, len: usize| -> QszResult<Vec<u32>> {
      if *off + len * 4 > bytes.len() {
        return Err(truncated());
      }
      let v = bytes[*off..*off + len * 4]
        .chunks_exact(4)
        .map(|c| u32::from_le_bytes(c.try_into().unwrap()))
        .collect();
      *off += len * 4;
      Ok(v)
    };

    let rowptr = read_u32(bytes, &mut off, rowptr_len)?;
    let colidx = read_u32(bytes, &mut off, nnz)?;

    let val_size = std::mem::size_of::<f64>();
    if off + nnz * val_size > bytes.len() {
      return Err(truncated());
    }
    let values = bytes[off..off + nnz * val_size]
      .chunks_exact(val_size)
      .map(|c| T::from_f64(f64::from_le_bytes(c.try_into().unwrap())))
      .collect();

    Ok(SparseOutliers {
      m,
      rowptr,
      colidx,
      values,
    })
  }
}

fn grid_side(n: usize) -> usize {
  (n as f64).sqrt().ceil() as usize
}

/// Compacts a dense outlier plane (logically reshaped to `m x m`, `m =
/// ceil(sqrt(n))`, row-major, zero-padded past `n`) into CSR form.
/// Returns `CapacityExceeded` if the true nonzero count exceeds
/// `n / density_factor`.
pub fn gather<T: Float>(dense: &[T], density_factor: usize) -> QszResult<SparseOutliers<T>> {
  let n = dense.len();
  let m = grid_side(n);
  let capacity = n / density_factor;

  let mut rowptr = Vec::with_capacity(m + 1);
  let mut colidx = Vec::new();
  let mut values = Vec::new();
  rowptr.push(0u32);

  for row in 0..m {
    for col in 0..m {
      let idx = row * m + col;
      if idx >= n {
        break;
      }
      let v = dense[idx];
      if v != T::ZERO {
        if values.len() >= capacity {
          return Err(QszError::capacity_exceeded(format!(
            "outlier count exceeds capacity {} (n/density_factor, density_factor={})",
            capacity, density_factor
          )));
        }
        colidx.push(col as u32);
        values.push(v);
      }
    }
    rowptr.push(values.len() as u32);
  }

  Ok(SparseOutliers {
    m,
    rowptr,
    colidx,
    values,
  })
}

/// Inverts `gather`: reconstructs the dense `n`-element outlier plane.
pub fn scatter<T: Float>(sparse: &SparseOutliers<T>, n: usize) -> QszResult<Vec<T>> {
  let expected_m = grid_side(n);
  if sparse.m != expected_m {
    return Err(QszError::dimension(format!(
      "sparse outlier grid side {} does not match expected {} for n={}",
      sparse.m, expected_m, n
    )));
  }
  if sparse.rowptr.len() != sparse.m + 1 {
    return Err(QszError::header_invalid("rowptr length mismatch"));
  }

  let mut dense = vec![T::ZERO; n];
  for row in 0..sparse.m {
    let start = sparse.rowptr[row] as usize;
    let end = sparse.rowptr[row + 1] as usize;
    if end > sparse.colidx.len() || end > sparse.values.len() || start > end {
      return Err(QszError::header_invalid("rowptr out of bounds"));
    }
    for k in start..end {
      let col = sparse.colidx[k] as usize;
      let idx = row * sparse.m + col;
      if idx >= n {
        return Err(QszError::header_invalid(
          "sparse outlier column index out of bounds",
        ));
      }
      dense[idx] = sparse.values[k];
    }
  }
  Ok(dense)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn gather_scatter_round_trips() {
    let mut dense = vec![0.0_f64; 100];
    dense[3] = 1.5;
    dense[40] = -2.25;
    dense[99] = 7.0;
    let sparse = gather(&dense, 4).unwrap();
    assert_eq!(sparse.nnz(), 3);
    let back = scatter(&sparse, dense.len()).unwrap();
    assert_eq!(back, dense);
  }

  #[test]
  fn empty_outliers_is_empty_blob() {
    let dense = vec![0.0_f64; 64];
    let sparse = gather(&dense, 4).unwrap();
    assert_eq!(sparse.nnz(), 0);
    let back = scatter(&sparse, dense.len()).unwrap();
    assert_eq!(back, dense);
  }

  #[test]
  fn capacity_exceeded_is_reported() {
    let mut dense = vec![0.0_f64; 100];
    // 40% nonzero, far above n/4
    for (i, v) in dense.iter_mut().enumerate() {
      if i % 5 != 0 {
        *v = (i + 1) as f64;
      }
    }
    let err = gather(&dense, 4).unwrap_err();
    assert_eq!(err.kind, crate::errors::ErrorKind::CapacityExceeded);
  }

  #[test]
  fn serialization_round_trips() {
    let mut dense = vec![0.0_f32; 50];
    dense[7] = 3.0;
    let sparse = gather(&dense, 4).unwrap();
    let bytes = sparse.to_bytes();
    assert_eq!(bytes.len(), sparse.byte_len());
    let parsed = SparseOutliers::<f32>::parse_from(&bytes).unwrap();
    assert_eq!(parsed, sparse);
  }
}
