//! Series identifiers for the two graphed quantities.
//!
//! The graph and statistics only ever track two series: solar production and
//! derived household usage. Per-series state is stored in a [`PerSeries`]
//! two-entry array indexed by [`Series`] instead of being looked up by name.

use core::ops::{Index, IndexMut};

/// A graphed series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Series {
    /// Instantaneous solar production
    Solar,
    /// Derived consumption (solar + grid)
    Usage,
}

impl Series {
    /// Both series, in storage order.
    pub const ALL: [Series; 2] = [Series::Solar, Series::Usage];

    /// Storage slot for this series.
    pub const fn index(self) -> usize {
        match self {
            Self::Solar => 0,
            Self::Usage => 1,
        }
    }

    /// Display label used in menu lines.
    pub const fn label(self) -> &'static str {
        match self {
            Self::Solar => "Solar",
            Self::Usage => "Usage",
        }
    }
}

/// One value of `T` per [`Series`].
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PerSeries<T> {
    slots: [T; 2],
}

impl<T> PerSeries<T> {
    pub const fn new(solar: T, usage: T) -> Self {
        Self {
            slots: [solar, usage],
        }
    }

    /// Iterate `(series, value)` pairs in storage order.
    pub fn iter(&self) -> impl Iterator<Item = (Series, &T)> {
        Series::ALL.into_iter().zip(self.slots.iter())
    }
}

impl<T> Index<Series> for PerSeries<T> {
    type Output = T;

    fn index(&self, series: Series) -> &T {
        &self.slots[series.index()]
    }
}

impl<T> IndexMut<Series> for PerSeries<T> {
    fn index_mut(&mut self, series: Series) -> &mut T {
        &mut self.slots[series.index()]
    }
}
