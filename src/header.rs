use crate::errors::{QszError, QszResult};
use crate::shape::Shape;

pub const HEADER_NBYTE: usize = 128;
const MAGIC: [u8; 4] = *b"LSZ1";

/// Subfile slots in the cumulative `entry[]` offset table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(usize)]
pub enum Subfile {
  Header = 0,
  Anchor = 1,
  Vle = 2,
  Spfmt = 3,
  End = 4,
}

pub const CODEC_HUFFMAN: u32 = 1 << 0;
pub const CODEC_SPARSE_OUTLIER: u32 = 1 << 1;

/// The archive's fixed 128-byte prefix. Every multi-byte field is
/// little-endian; the first four bytes are a magic number (spec.md §9's
/// open question on endianness/magic is resolved here).
#[derive(Clone, Debug, PartialEq)]
pub struct Header {
  pub dtype_byte: u8,
  pub rank: u8,
  pub x: u32,
  pub y: u32,
  pub z: u32,
  pub radius: i32,
  pub vle_pardeg: u32,
  pub eb: f64,
  pub byte_vle: u8,
  pub codecs_in_use: u32,
  pub nz_density_factor: u32,
  /// entry[HEADER=0, ANCHOR=1, VLE=2, SPFMT=3, END=4]
  pub entry: [u32; 5],
}

impl Header {
  pub fn shape(&self) -> QszResult<Shape> {
    Shape::from_xyz(self.x, self.y, self.z, self.rank as u32)
  }

  pub fn to_bytes(&self) -> [u8; HEADER_NBYTE] {
    let mut buf = [0u8; HEADER_NBYTE];
    let mut w = 0usize;
    macro_rules! put {
      ($bytes:expr) => {{
        let b = $bytes;
        buf[w..w + b.len()].copy_from_slice(&b);
        w += b.len();
      }};
    }
    put!(MAGIC);
    put!([self.dtype_byte]);
    put!([self.rank]);
    put!(self.x.to_le_bytes());
    put!(self.y.to_le_bytes());
    put!(self.z.to_le_bytes());
    put!(self.radius.to_le_bytes());
    put!(self.vle_pardeg.to_le_bytes());
    put!(self.eb.to_le_bytes());
    put!([self.byte_vle]);
    put!(self.codecs_in_use.to_le_bytes());
    put!(self.nz_density_factor.to_le_bytes());
    put!((HEADER_NBYTE as u32).to_le_bytes());
    for e in &self.entry {
      put!(e.to_le_bytes());
    }
    buf
  }

  pub fn parse_from(bytes: &[u8]) -> QszResult<Self> {
    if bytes.len() < HEADER_NBYTE {
      return Err(QszError::header_invalid("archive shorter than the fixed header"));
    }
    let mut r = 0usize;
    macro_rules! take {
      ($n:expr) => {{
        let slice = &bytes[r..r + $n];
        r += $n;
        slice
      }};
    }
    if take!(4) != MAGIC {
      return Err(QszError::header_invalid("bad magic number"));
    }
    let dtype_byte = take!(1)[0];
    let rank = take!(1)[0];
    let x = u32::from_le_bytes(take!(4).try_into().unwrap());
    let y = u32::from_le_bytes(take!(4).try_into().unwrap());
    let z = u32::from_le_bytes(take!(4).try_into().unwrap());
    let radius = i32::from_le_bytes(take!(4).try_into().unwrap());
    let vle_pardeg = u32::from_le_bytes(take!(4).try_into().unwrap());
    let eb = f64::from_le_bytes(take!(8).try_into().unwrap());
    let byte_vle = take!(1)[0];
    let codecs_in_use = u32::from_le_bytes(take!(4).try_into().unwrap());
    let nz_density_factor = u32::from_le_bytes(take!(4).try_into().unwrap());
    let header_nbyte = u32::from_le_bytes(take!(4).try_into().unwrap());
    if header_nbyte as usize != HEADER_NBYTE {
      return Err(QszError::header_invalid("unexpected header_nbyte field"));
    }
    let mut entry = [0u32; 5];
    for e in entry.iter_mut() {
      *e = u32::from_le_bytes(take!(4).try_into().unwrap());
    }

    let header = Header {
      dtype_byte,
      rank,
      x,
      y,
      z,
      radius,
      vle_pardeg,
      eb,
      byte_vle,
      codecs_in_use,
      nz_density_factor,
      entry,
    };
    header.validate_entry_table()?;
    Ok(header)
  }

  /// Testable property #3: `entry[k] <= entry[k+1]` for all adjacent slots.
  fn validate_entry_table(&self) -> QszResult<()> {
    for w in self.entry.windows(2) {
      if w[0] > w[1] {
        return Err(QszError::header_invalid(
          "entry[] offset table is not monotonically nondecreasing",
        ));
      }
    }
    Ok(())
  }

  pub fn validate_total_len(&self, blob_len: usize) -> QszResult<()> {
    self.validate_entry_table()?;
    if self.entry[Subfile::End as usize] as usize != blob_len {
      return Err(QszError::header_invalid(
        "entry[END] does not match archive length",
      ));
    }
    Ok(())
  }
}
