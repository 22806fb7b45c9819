//! Pixel-size and cache-capacity value types.
use std::fmt;

/// The size of an image in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub fn new(width: u32, height: u32) -> Size {
        Size { width, height }
    }

    /// True when either dimension is zero, which no request may carry.
    pub fn is_degenerate(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// True when this size is larger than `other` in at least one dimension.
    pub fn exceeds(&self, other: Size) -> bool {
        self.width > other.width || self.height > other.height
    }

    /// The axis along which sizes of this shape are compared: width for
    /// landscape images, height otherwise.
    pub fn dominant_axis(&self) -> Axis {
        if self.width > self.height {
            Axis::Width
        } else {
            Axis::Height
        }
    }

    /// Scale this size uniformly so it fits inside `target`.
    ///
    /// Both axes are multiplied by the smaller of the two axis ratios and
    /// rounded to the nearest pixel, so the driving axis lands exactly on the
    /// target while the other keeps the original aspect ratio.  Dimensions
    /// never round below 1.
    pub fn fit_within(&self, target: Size) -> Size {
        let ratio_w = f64::from(target.width) / f64::from(self.width);
        let ratio_h = f64::from(target.height) / f64::from(self.height);
        let scale = if ratio_w < ratio_h { ratio_w } else { ratio_h };

        Size {
            width: ((f64::from(self.width) * scale).round() as u32).max(1),
            height: ((f64::from(self.height) * scale).round() as u32).max(1),
        }
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// One of the two size dimensions.  Candidate ranking and the finality
/// decision both compare sizes along a single axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Width,
    Height,
}

impl Axis {
    /// The extent of `size` along this axis.
    pub fn of(&self, size: Size) -> u32 {
        match self {
            Axis::Width => size.width,
            Axis::Height => size.height,
        }
    }

    /// Whether two sizes agree along this axis.
    pub fn matches(&self, a: Size, b: Size) -> bool {
        self.of(a) == self.of(b)
    }
}

/// What a cached entry costs against a [`CacheCapacity`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapacityUnit {
    /// Entries cost their byte size.
    Bytes,
    /// Every entry costs exactly 1, so the budget is an entry count.
    Items,
}

impl CapacityUnit {
    /// The weight of an entry of `size_bytes` under this unit.
    pub fn weight_of(&self, size_bytes: u64) -> u64 {
        match self {
            CapacityUnit::Bytes => size_bytes,
            CapacityUnit::Items => 1,
        }
    }
}

/// A cache budget: a magnitude in either bytes or entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheCapacity {
    pub magnitude: u64,
    pub unit: CapacityUnit,
}

impl CacheCapacity {
    pub fn bytes(magnitude: u64) -> CacheCapacity {
        CacheCapacity {
            magnitude,
            unit: CapacityUnit::Bytes,
        }
    }

    pub fn items(magnitude: u64) -> CacheCapacity {
        CacheCapacity {
            magnitude,
            unit: CapacityUnit::Items,
        }
    }
}
