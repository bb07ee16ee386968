//! Dimension identifiers and storage arrangements.

use rand::seq::{index, SliceRandom};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use crate::errors::{ArError, ArResult};
use crate::arrangement_error;

/// Identifier of a single cube dimension.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Dimension(String);

impl Dimension {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Dimension {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for Dimension {
    fn from(name: String) -> Self {
        Self(name)
    }
}

/// An ordered, duplicate-free sequence of dimensions.
///
/// Every arrangement produced from another one (by swapping or shuffling)
/// holds exactly the same set of dimensions; only the order changes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<Dimension>", into = "Vec<Dimension>")]
pub struct Arrangement {
    dimensions: Vec<Dimension>,
}

impl Arrangement {
    /// Build an arrangement, rejecting empty input and duplicates.
    pub fn new(dimensions: Vec<Dimension>) -> ArResult<Self> {
        if dimensions.is_empty() {
            return Err(arrangement_error!("arrangement must contain at least one dimension"));
        }

        let mut seen = HashSet::with_capacity(dimensions.len());
        for dimension in &dimensions {
            if !seen.insert(dimension) {
                return Err(arrangement_error!("duplicate dimension '{}'", dimension));
            }
        }

        Ok(Self { dimensions })
    }

    pub fn from_names<I, S>(names: I) -> ArResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(names.into_iter().map(|n| Dimension::new(n)).collect())
    }

    pub fn len(&self) -> usize {
        self.dimensions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dimensions.is_empty()
    }

    pub fn dimensions(&self) -> &[Dimension] {
        &self.dimensions
    }

    pub fn iter(&self) -> impl Iterator<Item = &Dimension> {
        self.dimensions.iter()
    }

    pub fn get(&self, position: usize) -> Option<&Dimension> {
        self.dimensions.get(position)
    }

    /// The trailing dimension, conventionally the measure dimension.
    pub fn last(&self) -> &Dimension {
        &self.dimensions[self.dimensions.len() - 1]
    }

    pub fn position_of(&self, dimension: &Dimension) -> Option<usize> {
        self.dimensions.iter().position(|d| d == dimension)
    }

    pub fn contains(&self, dimension: &Dimension) -> bool {
        self.position_of(dimension).is_some()
    }

    /// Copy of this arrangement with the dimensions at `i` and `j` exchanged.
    ///
    /// Panics if either position is out of range.
    pub fn swapped(&self, i: usize, j: usize) -> Self {
        let mut dimensions = self.dimensions.clone();
        dimensions.swap(i, j);
        Self { dimensions }
    }

    /// Swap two distinct positions chosen uniformly at random. Returns `None`
    /// when the arrangement has fewer than two dimensions.
    pub fn swapped_random<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<Self> {
        if self.len() < 2 {
            return None;
        }
        let picked = index::sample(rng, self.len(), 2);
        Some(self.swapped(picked.index(0), picked.index(1)))
    }

    /// Uniformly random reordering. With `keep_last` the trailing dimension
    /// stays in place and only the leading ones are shuffled.
    pub fn shuffled<R: Rng + ?Sized>(&self, rng: &mut R, keep_last: bool) -> Self {
        let mut dimensions = self.dimensions.clone();
        let end = if keep_last {
            dimensions.len() - 1
        } else {
            dimensions.len()
        };
        dimensions[..end].shuffle(rng);
        Self { dimensions }
    }

    /// Same dimensions as `other`, in any order.
    pub fn is_permutation_of(&self, other: &Arrangement) -> bool {
        if self.len() != other.len() {
            return false;
        }
        let mine: HashSet<&Dimension> = self.dimensions.iter().collect();
        other.iter().all(|d| mine.contains(d))
    }

    /// Reject arrangements that do not cover exactly `reference`'s dimensions.
    pub fn ensure_permutation_of(&self, reference: &Arrangement) -> ArResult<()> {
        if self.is_permutation_of(reference) {
            return Ok(());
        }
        let missing: Vec<&str> = reference
            .iter()
            .filter(|d| !self.contains(d))
            .map(Dimension::as_str)
            .collect();
        let unexpected: Vec<&str> = self
            .iter()
            .filter(|d| !reference.contains(d))
            .map(Dimension::as_str)
            .collect();
        Err(arrangement_error!(
            "{} is not a reordering of {} (missing: {:?}, unexpected: {:?})",
            self,
            reference,
            missing,
            unexpected
        ))
    }
}

impl TryFrom<Vec<Dimension>> for Arrangement {
    type Error = ArError;

    fn try_from(dimensions: Vec<Dimension>) -> ArResult<Self> {
        Self::new(dimensions)
    }
}

impl From<Arrangement> for Vec<Dimension> {
    fn from(arrangement: Arrangement) -> Self {
        arrangement.dimensions
    }
}

impl fmt::Display for Arrangement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, dimension) in self.dimensions.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", dimension)?;
        }
        write!(f, "]")
    }
}
