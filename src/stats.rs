//! Compression-time statistics returned alongside the archive bytes.
//! Not part of the archive's bit-exact layout — a convenience for a
//! caller to log, grounded in `pco`'s `Progress`/summary types that
//! report compression-time facts back without affecting the wire
//! format.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CompressedStats {
  pub n: usize,
  pub n_outliers: usize,
  pub huff_byte_width: u8,
  pub compression_ratio: f64,
}
