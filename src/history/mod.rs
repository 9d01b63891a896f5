//! Direction-typed history sequences.
//!
//! Every sequence of observations carries its ordering in the type:
//! `Sequence<NewestFirst>` has the newest item at index 0,
//! `Sequence<OldestFirst>` has the oldest item at index 0. The only way to
//! change direction is to reverse the items, so a window can never be
//! silently reinterpreted the wrong way round.

pub mod normalizer;

use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::marker::PhantomData;

use crate::types::Observation;

pub use normalizer::{HistoryNormalizer, RawRecord};

// ---------------------------------------------------------------------------
// Direction markers
// ---------------------------------------------------------------------------

/// Runtime declaration of the order in which raw records were supplied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputOrder {
    #[default]
    NewestFirst,
    OldestFirst,
}

impl fmt::Display for InputOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputOrder::NewestFirst => write!(f, "newest-first"),
            InputOrder::OldestFirst => write!(f, "oldest-first"),
        }
    }
}

/// Type-level sequence direction.
pub trait Direction: Copy + Send + Sync + 'static {
    const ORDER: InputOrder;
}

/// Index 0 is the most recent item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewestFirst;

/// Index 0 is the oldest item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OldestFirst;

impl Direction for NewestFirst {
    const ORDER: InputOrder = InputOrder::NewestFirst;
}

impl Direction for OldestFirst {
    const ORDER: InputOrder = InputOrder::OldestFirst;
}

// ---------------------------------------------------------------------------
// Sequence
// ---------------------------------------------------------------------------

/// An ordered run of items whose direction is part of its type.
pub struct Sequence<D: Direction, T = Observation> {
    items: Vec<T>,
    _direction: PhantomData<D>,
}

impl<D: Direction, T> Sequence<D, T> {
    /// Wrap items that are already in direction `D`.
    pub fn new(items: Vec<T>) -> Self {
        Self {
            items,
            _direction: PhantomData,
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.items
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    pub fn into_vec(self) -> Vec<T> {
        self.items
    }

    /// The direction of this sequence, for logging and boundary checks.
    pub fn order(&self) -> InputOrder {
        D::ORDER
    }

    /// Map every item, keeping the direction.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Sequence<D, U> {
        Sequence::new(self.items.into_iter().map(f).collect())
    }

    /// Keep only items matching `pred`, preserving relative order.
    pub fn retain(&mut self, pred: impl FnMut(&T) -> bool) {
        self.items.retain(pred);
    }
}

impl<T> Sequence<NewestFirst, T> {
    /// Reverse into chronological order.
    pub fn into_oldest_first(mut self) -> Sequence<OldestFirst, T> {
        self.items.reverse();
        Sequence::new(self.items)
    }

    /// The most recent item.
    pub fn newest(&self) -> Option<&T> {
        self.items.first()
    }

    /// Keep at most the `take` most recent items.
    pub fn truncate(&mut self, take: usize) {
        self.items.truncate(take);
    }
}

impl<T> Sequence<OldestFirst, T> {
    /// Reverse into most-recent-first order.
    pub fn into_newest_first(mut self) -> Sequence<NewestFirst, T> {
        self.items.reverse();
        Sequence::new(self.items)
    }

    /// The most recent item.
    pub fn newest(&self) -> Option<&T> {
        self.items.last()
    }
}

impl<T: Clone> Sequence<OldestFirst, T> {
    /// Most-recent-first window of the `width` items immediately preceding
    /// position `end` (positions `end-1 ..= end-width`). Shorter near the start.
    pub fn window_before(&self, end: usize, width: usize) -> Sequence<NewestFirst, T> {
        let end = end.min(self.items.len());
        let start = end.saturating_sub(width);
        Sequence::new(self.items[start..end].iter().rev().cloned().collect())
    }
}

impl<T> Sequence<NewestFirst, T> {
    /// Build from a runtime-declared order, reversing when needed.
    pub fn from_declared(items: Vec<T>, order: InputOrder) -> Self {
        match order {
            InputOrder::NewestFirst => Sequence::new(items),
            InputOrder::OldestFirst => Sequence::<OldestFirst, T>::new(items).into_newest_first(),
        }
    }
}

impl<T> Sequence<OldestFirst, T> {
    /// Build from a runtime-declared order, reversing when needed.
    pub fn from_declared(items: Vec<T>, order: InputOrder) -> Self {
        match order {
            InputOrder::OldestFirst => Sequence::new(items),
            InputOrder::NewestFirst => Sequence::<NewestFirst, T>::new(items).into_oldest_first(),
        }
    }
}

impl<D: Direction, T: Clone> Clone for Sequence<D, T> {
    fn clone(&self) -> Self {
        Sequence::new(self.items.clone())
    }
}

impl<D: Direction, T: fmt::Debug> fmt::Debug for Sequence<D, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sequence")
            .field("order", &D::ORDER)
            .field("items", &self.items)
            .finish()
    }
}

impl<D: Direction, T: PartialEq> PartialEq for Sequence<D, T> {
    fn eq(&self, other: &Self) -> bool {
        self.items == other.items
    }
}

impl<D: Direction, T: Serialize> Serialize for Sequence<D, T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.items.serialize(serializer)
    }
}

impl<'a, D: Direction, T> IntoIterator for &'a Sequence<D, T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
