//! Canonical Huffman code-book construction (spec.md §4.3): a weighted
//! binary tree gives every symbol a code length, then codes are
//! reassigned canonically (ordered by length, ties broken by ascending
//! symbol id) so the book can be persisted as a lengths table alone.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};

use crate::errors::{QszError, QszResult};

/// Huffman code words are stored as either 4-byte or 8-byte integers.
/// The coarse-grained codec tries `Four` first and only pays for `Eight`
/// when a skewed histogram produces a code longer than 32 bits.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CodeWidth {
  Four,
  Eight,
}

impl CodeWidth {
  pub fn byte_vle(self) -> u8 {
    match self {
      CodeWidth::Four => 4,
      CodeWidth::Eight => 8,
    }
  }

  pub fn from_byte_vle(byte_vle: u8) -> QszResult<Self> {
    match byte_vle {
      4 => Ok(CodeWidth::Four),
      8 => Ok(CodeWidth::Eight),
      other => Err(QszError::header_invalid(format!(
        "unsupported huffman code width {} bytes",
        other
      ))),
    }
  }

  /// Longest code length this width can hold. spec.md §4.3: fallback
  /// triggers when the maximum code length would exceed `8*W - 1`, so a
  /// code of length exactly `8*W` bits is already one bit too many.
  fn max_len(self) -> usize {
    match self {
      CodeWidth::Four => 31,
      CodeWidth::Eight => 63,
    }
  }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct Code {
  pub length: u8,
  pub bits: u64,
}

#[derive(Clone, Debug)]
pub struct CodeBook {
  pub width: CodeWidth,
  /// Code length per symbol, dense over `0..=max_symbol`. Zero means the
  /// symbol never occurred and has no code.
  pub lengths: Vec<u8>,
  pub codes: HashMap<u32, Code>,
}

impl CodeBook {
  pub fn code_of(&self, symbol: u32) -> Option<Code> {
    self.codes.get(&symbol).copied()
  }

  /// Serializes as a sparse `(symbol, length)` list rather than a dense
  /// table over the whole alphabet: quant codes can range over
  /// `[0, 2*radius)` but a chunk typically touches only a handful of
  /// them, so a dense table would dwarf the archive for small inputs.
  pub fn to_bytes(&self) -> Vec<u8> {
    let present: Vec<(u32, u8)> = self
      .lengths
      .iter()
      .enumerate()
      .filter(|&(_, &len)| len > 0)
      .map(|(sym, &len)| (sym as u32, len))
      .collect();

    let mut buf = Vec::with_capacity(9 + present.len() * 5);
    buf.push(self.width.byte_vle());
    buf.extend_from_slice(&(self.lengths.len() as u32).to_le_bytes());
    buf.extend_from_slice(&(present.len() as u32).to_le_bytes());
    for (sym, len) in present {
      buf.extend_from_slice(&sym.to_le_bytes());
      buf.push(len);
    }
    buf
  }

  pub fn parse_from(bytes: &[u8]) -> QszResult<(Self, usize)> {
    let truncated = || QszError::header_invalid("huffman code-book truncated");
    if bytes.len() < 9 {
      return Err(truncated());
    }
    let width = CodeWidth::from_byte_vle(bytes[0])?;
    let alphabet = u32::from_le_bytes(bytes[1..5].try_into().unwrap()) as usize;
    let n_present = u32::from_le_bytes(bytes[5..9].try_into().unwrap()) as usize;

    let mut lengths = vec![0u8; alphabet];
    let mut off = 9;
    for _ in 0..n_present {
      if off + 5 > bytes.len() {
        return Err(truncated());
      }
      let sym = u32::from_le_bytes(bytes[off..off + 4].try_into().unwrap()) as usize;
      let len = bytes[off + 4];
      if sym >= alphabet {
        return Err(QszError::header_invalid("huffman code-book symbol out of range"));
      }
      lengths[sym] = len;
      off += 5;
    }

    let codes = assign_canonical_codes(&lengths, width)?;
    Ok((
      CodeBook {
        width,
        lengths,
        codes,
      },
      off,
    ))
  }
}

struct TreeNode {
  id: usize,
  weight: u64,
  left: Option<usize>,
  right: Option<usize>,
  leaf_symbol: Option<u32>,
}

/// Min-heap key. Ties broken by ascending symbol id, matching spec.md
/// §4.3's canonical tie-break rule.
#[derive(Eq, PartialEq)]
struct HeapKey {
  weight: u64,
  tie: u32,
  node_id: usize,
}

impl Ord for HeapKey {
  fn cmp(&self, other: &Self) -> Ordering {
    other
      .weight
      .cmp(&self.weight)
      .then_with(|| other.tie.cmp(&self.tie))
  }
}

impl PartialOrd for HeapKey {
  fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
    Some(self.cmp(other))
  }
}

/// Builds a canonical code-book from a symbol histogram, trying `width`
/// first and returning `CapacityExceeded` (`is_code_length_overflow`)
/// if the longest code would not fit.
pub fn build_codebook(counts: &HashMap<u32, u64>, width: CodeWidth) -> QszResult<CodeBook> {
  if counts.is_empty() {
    return Err(QszError::config_invalid(
      "cannot build a huffman code-book over an empty histogram",
    ));
  }

  let mut symbols: Vec<u32> = counts.keys().copied().collect();
  symbols.sort_unstable();
  let max_symbol = *symbols.last().unwrap();
  let alphabet = max_symbol as usize + 1;

  if symbols.len() == 1 {
    // A single-symbol alphabet still needs a 1-bit codeword: an empty
    // codeword can't be counted in a chunk's bit-length metadata.
    let mut lengths = vec![0u8; alphabet];
    lengths[symbols[0] as usize] = 1;
    let codes = assign_canonical_codes(&lengths, width)?;
    return Ok(CodeBook {
      width,
      lengths,
      codes,
    });
  }

  let mut nodes: Vec<TreeNode> = Vec::new();
  let mut heap: BinaryHeap<HeapKey> = BinaryHeap::with_capacity(symbols.len());
  for &sym in &symbols {
    let id = nodes.len();
    nodes.push(TreeNode {
      id,
      weight: counts[&sym],
      left: None,
      right: None,
      leaf_symbol: Some(sym),
    });
    heap.push(HeapKey {
      weight: counts[&sym],
      tie: sym,
      node_id: id,
    });
  }

  // Internal nodes use a tie key above every real symbol so that, among
  // equal weights, original symbols are always preferred (ascending).
  let mut internal_tie = u32::MAX;
  while heap.len() > 1 {
    let a = heap.pop().unwrap();
    let b = heap.pop().unwrap();
    let id = nodes.len();
    nodes.push(TreeNode {
      id,
      weight: a.weight + b.weight,
      left: Some(a.node_id),
      right: Some(b.node_id),
      leaf_symbol: None,
    });
    heap.push(HeapKey {
      weight: a.weight + b.weight,
      tie: internal_tie,
      node_id: id,
    });
    internal_tie -= 1;
  }

  let root = heap.pop().unwrap().node_id;
  let mut lengths = vec![0u8; alphabet];
  assign_depths(&nodes, root, 0, &mut lengths)?;

  let codes = assign_canonical_codes(&lengths, width)?;
  Ok(CodeBook {
    width,
    lengths,
    codes,
  })
}

fn assign_depths(nodes: &[TreeNode], id: usize, depth: usize, lengths: &mut [u8]) -> QszResult<()> {
  let node = &nodes[id];
  if let Some(sym) = node.leaf_symbol {
    if depth > 255 {
      return Err(QszError::capacity_exceeded(
        "huffman code length exceeds the 255-bit depth limit",
      ));
    }
    lengths[sym as usize] = depth as u8;
    return Ok(());
  }
  assign_depths(nodes, node.left.unwrap(), depth + 1, lengths)?;
  assign_depths(nodes, node.right.unwrap(), depth + 1, lengths)?;
  Ok(())
}

/// Standard canonical assignment: symbols ordered by `(length, symbol
/// id)` ascending, codes incrementing and left-shifting on length
/// increases.
fn assign_canonical_codes(lengths: &[u8], width: CodeWidth) -> QszResult<HashMap<u32, Code>> {
  let mut present: Vec<(u8, u32)> = lengths
    .iter()
    .enumerate()
    .filter(|(_, &len)| len > 0)
    .map(|(sym, &len)| (len, sym as u32))
    .collect();

  if present.is_empty() {
    return Ok(HashMap::new());
  }

  present.sort_unstable();
  let max_len = present.last().unwrap().0 as usize;
  if max_len > width.max_len() {
    return Err(QszError::capacity_exceeded(format!(
      "huffman code length {} exceeds {}-bit width",
      max_len,
      width.max_len()
    )));
  }

  let mut codes = HashMap::with_capacity(present.len());
  let mut code: u64 = 0;
  let mut prev_len = present[0].0;
  for &(len, sym) in &present {
    code <<= len - prev_len;
    codes.insert(sym, Code { length: len, bits: code });
    code += 1;
    prev_len = len;
  }
  Ok(codes)
}
