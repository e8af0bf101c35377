/// Rounds `value` up to the heap's alignment unit (a double word, 8 bytes).
///
/// # Examples
///
/// ```rust
/// use tagalloc::align;
///
/// assert_eq!(align!(13), 16);
/// assert_eq!(align!(16), 16);
/// assert_eq!(align!(0), 0);
/// ```
#[macro_export]
macro_rules! align {
  ($value:expr) => {
    ($value + $crate::block::DSIZE - 1) & !($crate::block::DSIZE - 1)
  };
}

#[cfg(test)]
mod tests {
  use crate::block::DSIZE;

  #[test]
  fn test_align() {
    let mut alignments = Vec::new();

    for i in 0..10 {
      let sizes = (DSIZE * i + 1)..=(DSIZE * (i + 1));

      let expected_alignment = DSIZE * (i + 1);

      alignments.push((sizes, expected_alignment));
    }

    for (sizes, expected) in alignments {
      for size in sizes {
        assert_eq!(expected, align!(size));
      }
    }
  }

  #[test]
  fn aligned_values_are_unchanged() {
    for value in [0, 8, 16, 4096] {
      assert_eq!(value, align!(value));
    }
  }
}
