/// Numeric operations the predictor and outlier channel need on a sample
/// type. Slimmed down from `pco`'s `FloatLike` trait: this core only ever
/// rounds, divides, and round-trips bits, so it doesn't need `pco`'s latent
/// machinery for ordering floats as unsigned integers.
pub trait Float:
  Copy + Clone + Send + Sync + PartialEq + PartialOrd + std::fmt::Debug + Default + 'static
{
  const ZERO: Self;
  const DTYPE_BYTE: u8;

  fn from_f64(x: f64) -> Self;
  fn to_f64(self) -> f64;
  fn round(self) -> Self;
  fn abs(self) -> Self;
}

impl Float for f32 {
  const ZERO: Self = 0.0;
  const DTYPE_BYTE: u8 = 1;

  #[inline]
  fn from_f64(x: f64) -> Self {
    x as Self
  }

  #[inline]
  fn to_f64(self) -> f64 {
    self as f64
  }

  #[inline]
  fn round(self) -> Self {
    f32::round(self)
  }

  #[inline]
  fn abs(self) -> Self {
    f32::abs(self)
  }
}

impl Float for f64 {
  const ZERO: Self = 0.0;
  const DTYPE_BYTE: u8 = 2;

  #[inline]
  fn from_f64(x: f64) -> Self {
    x
  }

  #[inline]
  fn to_f64(self) -> f64 {
    self
  }

  #[inline]
  fn round(self) -> Self {
    f64::round(self)
  }

  #[inline]
  fn abs(self) -> Self {
    f64::abs(self)
  }
}
