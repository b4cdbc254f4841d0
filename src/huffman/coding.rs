//! Coarse-grained, chunked Huffman encode/decode (spec.md §4.3): the
//! symbol stream is split into `pardeg` byte-aligned chunks that are
//! encoded and decoded independently and in parallel, each chunk
//! recording its own bit offset and bit length.

use std::collections::HashMap;

use rayon::prelude::*;

use crate::bit_reader::BitReader;
use crate::bit_writer::BitWriter;
use crate::errors::{QszError, QszResult};
use crate::huffman::codebook::CodeBook;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChunkMeta {
  pub n_symbols: u32,
  pub byte_offset: u32,
  pub byte_len: u32,
}

pub struct EncodedChunks {
  pub metas: Vec<ChunkMeta>,
  pub bytes: Vec<u8>,
}

fn chunk_bounds(n: usize, pardeg: usize) -> Vec<(usize, usize)> {
  if n == 0 {
    return Vec::new();
  }
  let pardeg = pardeg.max(1).min(n);
  let base = n / pardeg;
  let remainder = n % pardeg;
  let mut bounds = Vec::with_capacity(pardeg);
  let mut start = 0;
  for i in 0..pardeg {
    let len = base + if i < remainder { 1 } else { 0 };
    bounds.push((start, start + len));
    start += len;
  }
  bounds
}

/// Encodes `symbols` against `book` in `pardeg` independent chunks,
/// each padded to a byte boundary so chunks can later be decoded (or
/// re-encoded) in parallel without bit-level cross-chunk dependencies.
pub fn encode(symbols: &[u32], book: &CodeBook, pardeg: usize) -> QszResult<EncodedChunks> {
  let bounds = chunk_bounds(symbols.len(), pardeg);

  let encoded: Vec<QszResult<Vec<u8>>> = bounds
    .par_iter()
    .map(|&(start, end)| encode_chunk(&symbols[start..end], book))
    .collect();

  let mut bytes = Vec::new();
  let mut metas = Vec::with_capacity(encoded.len());
  for (chunk, &(start, end)) in encoded.into_iter().zip(bounds.iter()) {
    let chunk = chunk?;
    metas.push(ChunkMeta {
      n_symbols: (end - start) as u32,
      byte_offset: bytes.len() as u32,
      byte_len: chunk.len() as u32,
    });
    bytes.extend(chunk);
  }
  Ok(EncodedChunks { metas, bytes })
}

fn encode_chunk(symbols: &[u32], book: &CodeBook) -> QszResult<Vec<u8>> {
  let mut writer = BitWriter::default();
  for &sym in symbols {
    let code = book.code_of(sym).ok_or_else(|| {
      QszError::device_failure(format!("symbol {} has no entry in the huffman code-book", sym))
    })?;
    if code.length > 0 {
      writer.write_bits(code.bits, code.length as usize);
    }
  }
  writer.align_to_byte();
  Ok(writer.into_bytes())
}

/// Decodes chunks independently and in parallel, then concatenates
/// their symbol runs back into the original order.
pub fn decode(bytes: &[u8], metas: &[ChunkMeta], book: &CodeBook) -> QszResult<Vec<u32>> {
  let table = DecodeTable::build(book);
  let decoded: Vec<QszResult<Vec<u32>>> = metas
    .par_iter()
    .map(|meta| {
      let start = meta.byte_offset as usize;
      let end = start + meta.byte_len as usize;
      let chunk_bytes = bytes
        .get(start..end)
        .ok_or_else(|| QszError::header_invalid("huffman chunk byte range out of bounds"))?;
      decode_chunk(chunk_bytes, meta.n_symbols as usize, &table)
    })
    .collect();

  let mut out = Vec::with_capacity(metas.iter().map(|m| m.n_symbols as usize).sum());
  for chunk in decoded {
    out.extend(chunk?);
  }
  Ok(out)
}

fn decode_chunk(bytes: &[u8], n_symbols: usize, table: &DecodeTable) -> QszResult<Vec<u32>> {
  let mut reader = BitReader::new(bytes);
  let mut out = Vec::with_capacity(n_symbols);
  for _ in 0..n_symbols {
    out.push(table.read_one(&mut reader)?);
  }
  Ok(out)
}

/// Inverse lookup from `(length, bits)` to symbol, used by the decoder
/// to walk the bitstream one bit at a time until a known code matches.
struct DecodeTable {
  by_len_bits: HashMap<(u8, u64), u32>,
  zero_length_symbol: Option<u32>,
  max_len: u8,
}

impl DecodeTable {
  fn build(book: &CodeBook) -> Self {
    let mut by_len_bits = HashMap::with_capacity(book.codes.len());
    let mut zero_length_symbol = None;
    let mut max_len = 0u8;
    for (&sym, &code) in &book.codes {
      if code.length == 0 {
        zero_length_symbol = Some(sym);
      } else {
        by_len_bits.insert((code.length, code.bits), sym);
        max_len = max_len.max(code.length);
      }
    }
    DecodeTable {
      by_len_bits,
      zero_length_symbol,
      max_len,
    }
  }

  fn read_one(&self, reader: &mut BitReader) -> QszResult<u32> {
    if self.max_len == 0 {
      return self
        .zero_length_symbol
        .ok_or_else(|| QszError::header_invalid("huffman decode table is empty"));
    }
    let mut bits: u64 = 0;
    for len in 1..=self.max_len {
      bits = (bits << 1) | (reader.read_bit()? as u64);
      if let Some(&sym) = self.by_len_bits.get(&(len, bits)) {
        return Ok(sym);
      }
    }
    Err(QszError::header_invalid(
      "bitstream did not match any known huffman code",
    ))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::huffman::codebook::{build_codebook, CodeWidth};
  use crate::huffman::histogram::histogram;

  fn sample_symbols() -> Vec<u32> {
    let mut v = Vec::new();
    for i in 0..2000u32 {
      v.push(match i % 11 {
        0..=5 => 512,
        6..=8 => 513,
        9 => 500,
        _ => 700,
      });
    }
    v
  }

  #[test]
  fn chunked_encode_decode_round_trips() {
    let symbols = sample_symbols();
    let counts = histogram(&symbols);
    let book = build_codebook(&counts, CodeWidth::Four).unwrap();
    let encoded = encode(&symbols, &book, 6).unwrap();
    assert_eq!(encoded.metas.len(), 6);
    let decoded = decode(&encoded.bytes, &encoded.metas, &book).unwrap();
    assert_eq!(decoded, symbols);
  }

  #[test]
  fn single_chunk_matches_multi_chunk_symbols() {
    let symbols = sample_symbols();
    let counts = histogram(&symbols);
    let book = build_codebook(&counts, CodeWidth::Four).unwrap();
    let one = encode(&symbols, &book, 1).unwrap();
    let many = encode(&symbols, &book, 8).unwrap();
    assert_eq!(decode(&one.bytes, &one.metas, &book).unwrap(), symbols);
    assert_eq!(decode(&many.bytes, &many.metas, &book).unwrap(), symbols);
  }

  #[test]
  fn constant_symbol_stream_round_trips() {
    let symbols = vec![42u32; 500];
    let counts = histogram(&symbols);
    let book = build_codebook(&counts, CodeWidth::Four).unwrap();
    let encoded = encode(&symbols, &book, 4).unwrap();
    let decoded = decode(&encoded.bytes, &encoded.metas, &book).unwrap();
    assert_eq!(decoded, symbols);
  }

  #[test]
  fn chunk_bounds_cover_every_symbol_exactly_once() {
    let bounds = chunk_bounds(17, 5);
    let mut covered = 0;
    for (i, &(start, end)) in bounds.iter().enumerate() {
      assert_eq!(start, covered);
      covered = end;
      if i > 0 {
        assert!(end - start >= 1);
      }
    }
    assert_eq!(covered, 17);
  }
}
