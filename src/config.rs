use crate::errors::QszResult;

/// How the caller's error bound is interpreted. `r2r` (range-relative)
/// mode is resolved to an absolute bound by the core itself once the
/// data's range is known, rather than requiring every caller to run the
/// (out-of-scope) data-range analyzer by hand first.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Mode {
  Abs(f64),
  R2r(f64),
}

impl Mode {
  /// Resolves to an absolute error bound. `range` is `max - min` of the
  /// input array; only consulted in `R2r` mode.
  pub fn resolve(self, range: f64) -> f64 {
    match self {
      Mode::Abs(eb) => eb,
      Mode::R2r(fraction) => fraction * range,
    }
  }
}

/// Per-call tunables, separate from the bits the archive's header must
/// persist for decompression (radius, byte_vle, pardeg — those live on
/// the header itself once compression has happened, mirroring
/// `q_compress`'s split between `CompressorConfig` and `Flags`).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CompressorConfig {
  pub mode: Mode,
  pub radius: i32,
  pub pardeg: usize,
  pub density_factor: usize,
  /// Force the 8-byte Huffman code width instead of attempting 4 first.
  /// `None` means "try 4, fall back to 8 on overflow", matching spec.md
  /// §4.3's runtime fallback.
  pub huff_nbyte: Option<u8>,
}

impl Default for CompressorConfig {
  fn default() -> Self {
    CompressorConfig {
      mode: Mode::Abs(1e-3),
      radius: 512,
      pardeg: 0, // 0 means "choose from chunks of 32Ki symbols", see resolve_pardeg
      density_factor: 4,
      huff_nbyte: None,
    }
  }
}

/// Symbols per Huffman chunk the spec's CLI defaults to when `pardeg`
/// isn't given explicitly.
const DEFAULT_CHUNK_SYMBOLS: usize = 1 << 15;

impl CompressorConfig {
  pub fn validate(&self, n: usize) -> QszResult<()> {
    if self.radius <= 0 {
      return Err(crate::errors::QszError::config_invalid(
        "radius must be positive",
      ));
    }
    if self.density_factor == 0 {
      return Err(crate::errors::QszError::config_invalid(
        "density_factor must be positive",
      ));
    }
    if n == 0 {
      return Err(crate::errors::QszError::config_invalid(
        "dimensions must be nonzero",
      ));
    }
    let eb = self.mode.resolve(1.0);
    if eb <= 0.0 || !eb.is_finite() {
      return Err(crate::errors::QszError::config_invalid(
        "error bound must be a positive finite number",
      ));
    }
    if let Some(w) = self.huff_nbyte {
      if w != 4 && w != 8 {
        return Err(crate::errors::QszError::config_invalid(
          "huff_nbyte must be 4 or 8",
        ));
      }
    }
    Ok(())
  }

  /// Resolves `pardeg` to a concrete chunk count for an array of `n`
  /// samples, honoring an explicit override.
  pub fn resolve_pardeg(&self, n: usize) -> usize {
    if self.pardeg > 0 {
      self.pardeg
    } else {
      n.div_ceil(DEFAULT_CHUNK_SYMBOLS).max(1)
    }
  }
}
