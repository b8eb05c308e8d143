#[macro_export]
macro_rules! into_vec {
  ($($x:expr),* $(,)?) => {
    vec![
      $(
        $x.into(),
      )*
    ]
  };
}

#[macro_export]
macro_rules! ref_vec {
  ($t:ty, [$($x:expr),* $(,)?]$(,)?) => {
    vec![
      $(
        AsRef::<$t>::as_ref($x),
      )*
    ]
  };
}

#[macro_export]
macro_rules! into_array {
  ($($x:expr),* $(,)?) => {
    [
      $(
        $x.into(),
      )*
    ]
  };
}

/// Returns the index of the first element of `list` satisfying `predicate`.
pub(crate) fn list_index<T: AsRef<str>>(list: &[T], predicate: fn(&str) -> bool) -> Option<usize> {
  list.iter().position(|x| predicate(x.as_ref()))
}

#[inline]
pub(crate) fn printable_base10_digits(x: usize) -> u32 {
  (((x as f64).log10() + 1.0).floor() as u32).max(1)
}

pub(crate) fn read_bytes(path: impl AsRef<std::path::Path>) -> std::io::Result<Vec<u8>> {
  std::fs::read(path)
}
