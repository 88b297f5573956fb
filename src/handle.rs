//! Stable integer handles into per-kind arenas.
//!
//! Every AST and type entity is referenced by an opaque, never-invalidated
//! index into a per-kind vector (spec §9, "Arena + handle over pointer
//! graphs"). This lets recursive structures (a struct containing a pointer
//! to itself, a function referencing its own symbol) exist without an
//! ownership cycle: the only thing anyone holds onto is a `u32`.

/// Declares a zero-cost newtype handle backed by `u32`, plus the
/// index-conversion boilerplate every arena-indexed entity needs.
macro_rules! define_handle {
  ($(#[$attr:meta])* $name:ident) => {
    $(#[$attr])*
    #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
    pub struct $name(u32);

    impl $name {
      /// Wrap a raw dense index. Only arena owners should call this.
      #[must_use] pub(crate) fn from_usize(i: usize) -> Self {
        Self(u32::try_from(i).expect("arena overflow (more than u32::MAX entries)"))
      }
      /// This handle's dense index into its owning arena.
      #[must_use] pub fn into_usize(self) -> usize { self.0 as usize }
    }

    impl std::fmt::Debug for $name {
      fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", stringify!($name), self.0)
      }
    }
  };
}

pub(crate) use define_handle;

/// A half-open `[start, end)` range into an append-only arena vector, used
/// wherever the spec calls for a type or declaration to refer to a
/// contiguous slice of another arena (record members, function parameters,
/// flattened initializer nodes) rather than owning a `Vec` directly.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
pub struct HandleRange<H> {
  start: u32,
  end: u32,
  _marker: std::marker::PhantomData<H>,
}

impl<H> HandleRange<H> {
  /// Range containing no entries.
  #[must_use] pub fn empty() -> Self { Self { start: 0, end: 0, _marker: std::marker::PhantomData } }
  #[must_use] pub(crate) fn new(start: usize, end: usize) -> Self {
    Self {
      start: u32::try_from(start).expect("arena overflow"),
      end: u32::try_from(end).expect("arena overflow"),
      _marker: std::marker::PhantomData,
    }
  }
  /// Number of entries covered by this range.
  #[must_use] pub fn len(&self) -> usize { (self.end - self.start) as usize }
  #[must_use] pub fn is_empty(&self) -> bool { self.start == self.end }
  #[must_use] pub(crate) fn as_usize_range(&self) -> std::ops::Range<usize> {
    self.start as usize..self.end as usize
  }
}
