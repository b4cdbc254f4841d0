use crate::errors::QszResult;

/// Rank-polymorphic array shape. Unused trailing dims serialize to `1` in
/// the header, matching spec.md's `{x, y, z}` header triple.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Shape {
  Dim1(usize),
  Dim2(usize, usize),
  Dim3(usize, usize, usize),
}

impl Shape {
  pub fn len(&self) -> usize {
    match *self {
      Shape::Dim1(x) => x,
      Shape::Dim2(x, y) => x * y,
      Shape::Dim3(x, y, z) => x * y * z,
    }
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  pub fn rank(&self) -> u32 {
    match self {
      Shape::Dim1(..) => 1,
      Shape::Dim2(..) => 2,
      Shape::Dim3(..) => 3,
    }
  }

  /// `(x, y, z)` triple as written into the fixed header, `1` in unused
  /// trailing slots.
  pub fn to_xyz(&self) -> (u32, u32, u32) {
    match *self {
      Shape::Dim1(x) => (x as u32, 1, 1),
      Shape::Dim2(x, y) => (x as u32, y as u32, 1),
      Shape::Dim3(x, y, z) => (x as u32, y as u32, z as u32),
    }
  }

  /// Recover a shape from a header's `(x, y, z, rank)` fields.
  pub fn from_xyz(x: u32, y: u32, z: u32, rank: u32) -> QszResult<Self> {
    let shape = match rank {
      1 => Shape::Dim1(x as usize),
      2 => Shape::Dim2(x as usize, y as usize),
      3 => Shape::Dim3(x as usize, y as usize, z as usize),
      other => {
        return Err(crate::errors::QszError::header_invalid(format!(
          "unsupported rank {} in header",
          other
        )))
      }
    };
    if shape.is_empty() {
      return Err(crate::errors::QszError::dimension(
        "header describes a zero-length array",
      ));
    }
    Ok(shape)
  }
}
