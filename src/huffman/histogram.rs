use std::collections::HashMap;

/// Counts occurrences of each symbol. Quant codes form a dense alphabet
/// around `radius` but a `HashMap` keeps this agnostic to how sparse the
/// actual observed set turns out to be.
pub fn histogram(symbols: &[u32]) -> HashMap<u32, u64> {
  let mut counts = HashMap::with_capacity(symbols.len().min(1 << 16));
  for &s in symbols {
    *counts.entry(s).or_insert(0u64) += 1;
  }
  counts
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn counts_each_symbol() {
    let symbols = vec![1, 1, 2, 3, 3, 3];
    let h = histogram(&symbols);
    assert_eq!(h.get(&1), Some(&2));
    assert_eq!(h.get(&2), Some(&1));
    assert_eq!(h.get(&3), Some(&3));
    assert_eq!(h.len(), 3);
  }
}
