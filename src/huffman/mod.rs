//! Coarse-grained canonical Huffman codec (spec.md §4.3): histogram,
//! canonical code-book construction, chunked parallel encode/decode, and
//! the runtime 4-byte/8-byte code-width fallback are split across
//! `histogram`, `codebook`, and `coding`; this module assembles them
//! into the self-contained VLE subfile the archive stores.

pub mod codebook;
pub mod coding;
pub mod histogram;

use codebook::{build_codebook, CodeBook, CodeWidth};
use coding::{decode, encode, ChunkMeta};
use histogram::histogram;

use crate::errors::QszResult;

/// The fully encoded VLE subfile: a self-describing code-book, a
/// per-chunk metadata table, and the encoded bitstream.
pub struct VleSubfile {
  pub book: CodeBook,
  pub metas: Vec<ChunkMeta>,
  pub bitstream: Vec<u8>,
}

impl VleSubfile {
  pub fn to_bytes(&self) -> Vec<u8> {
    let book_bytes = self.book.to_bytes();
    let mut buf = Vec::with_capacity(book_bytes.len() + 4 + self.metas.len() * 12 + self.bitstream.len());
    buf.extend_from_slice(&book_bytes);
    buf.extend_from_slice(&(self.metas.len() as u32).to_le_bytes());
    for meta in &self.metas {
      buf.extend_from_slice(&meta.n_symbols.to_le_bytes());
      buf.extend_from_slice(&meta.byte_offset.to_le_bytes());
      buf.extend_from_slice(&meta.byte_len.to_le_bytes());
    }
    buf.extend_from_slice(&self.bitstream);
    buf
  }

  pub fn parse_from(bytes: &[u8]) -> QszResult<Self> {
    let (book, used) = CodeBook::parse_from(bytes)?;
    let mut off = used;
    let truncated = || crate::errors::QszError::header_invalid("VLE subfile truncated");
    if off + 4 > bytes.len() {
      return Err(truncated());
    }
    let n_chunks = u32::from_le_bytes(bytes[off..off + 4].try_into().unwrap()) as usize;
    off += 4;
    let mut metas = Vec::with_capacity(n_chunks);
    for _ in 0..n_chunks {
      if off + 12 > bytes.len() {
        return Err(truncated());
      }
      let n_symbols = u32::from_le_bytes(bytes[off..off + 4].try_into().unwrap());
      let byte_offset = u32::from_le_bytes(bytes[off + 4..off + 8].try_into().unwrap());
      let byte_len = u32::from_le_bytes(bytes[off + 8..off + 12].try_into().unwrap());
      metas.push(ChunkMeta {
        n_symbols,
        byte_offset,
        byte_len,
      });
      off += 12;
    }
    let bitstream = bytes[off..].to_vec();
    Ok(VleSubfile {
      book,
      metas,
      bitstream,
    })
  }
}

/// Encodes `symbols` into a VLE subfile. Tries a 4-byte code width
/// first (or whichever width `forced_width` requests) and falls back to
/// 8 bytes exactly once if the code length overflows, per spec.md
/// §4.3's runtime fallback.
pub fn encode_symbols(symbols: &[u32], pardeg: usize, forced_width: Option<CodeWidth>) -> QszResult<VleSubfile> {
  let counts = histogram(symbols);

  let first_width = forced_width.unwrap_or(CodeWidth::Four);
  let book = match build_codebook(&counts, first_width) {
    Ok(book) => book,
    Err(e) if forced_width.is_none() && e.is_code_length_overflow() => build_codebook(&counts, CodeWidth::Eight)?,
    Err(e) => return Err(e),
  };

  let encoded = encode(symbols, &book, pardeg)?;
  Ok(VleSubfile {
    book,
    metas: encoded.metas,
    bitstream: encoded.bytes,
  })
}

pub fn decode_symbols(subfile: &VleSubfile) -> QszResult<Vec<u32>> {
  decode(&subfile.bitstream, &subfile.metas, &subfile.book)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn encode_decode_round_trips_through_bytes() {
    let symbols: Vec<u32> = (0..5000u32).map(|i| 512 + (i % 7).min(3)).collect();
    let subfile = encode_symbols(&symbols, 4, None).unwrap();
    let bytes = subfile.to_bytes();
    let reparsed = VleSubfile::parse_from(&bytes).unwrap();
    let decoded = decode_symbols(&reparsed).unwrap();
    assert_eq!(decoded, symbols);
  }

  #[test]
  fn forced_eight_byte_width_round_trips() {
    let symbols: Vec<u32> = vec![1, 2, 3, 4, 5, 6, 7, 8];
    let subfile = encode_symbols(&symbols, 2, Some(CodeWidth::Eight)).unwrap();
    assert_eq!(subfile.book.width, CodeWidth::Eight);
    let decoded = decode_symbols(&subfile).unwrap();
    assert_eq!(decoded, symbols);
  }

  #[test]
  fn unforced_width_picks_four_bytes_for_ordinary_data() {
    let symbols: Vec<u32> = (0..3000u32).map(|i| 500 + i % 30).collect();
    let subfile = encode_symbols(&symbols, 3, None).unwrap();
    assert_eq!(subfile.book.width, CodeWidth::Four);
    let decoded = decode_symbols(&subfile).unwrap();
    assert_eq!(decoded, symbols);
  }
}
