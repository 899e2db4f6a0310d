//! Fixed-point math utilities for deterministic simulation.
//!
//! Positions, speeds, and the simulation clock all use fixed-point
//! arithmetic so that a seeded game replays identically on every
//! machine. Decimal values only appear at the serialization boundary.

use fixed::types::I32F32;
use serde::{Deserialize, Serialize};

/// Fixed-point number type for all simulation math.
///
/// Uses 32 bits for integer part and 32 bits for fractional part.
/// Range: approximately -2,147,483,648 to 2,147,483,647
/// Precision: approximately 0.00000000023
pub type Fixed = I32F32;

/// Fixed-point 2D vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Vec2Fixed {
    /// X coordinate.
    #[serde(with = "fixed_serde")]
    pub x: Fixed,
    /// Y coordinate.
    #[serde(with = "fixed_serde")]
    pub y: Fixed,
}

/// Serde support for fixed-point numbers.
///
/// Values are written as decimals so configuration, scenario files and
/// protocol messages stay human-editable. Deserialization rejects values
/// that do not fit the fixed-point range (including NaN).
pub mod fixed_serde {
    use super::Fixed;
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    /// Serialize a fixed-point number as a decimal.
    pub fn serialize<S>(value: &Fixed, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_f64(value.to_num::<f64>())
    }

    /// Deserialize a fixed-point number from a decimal.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Fixed, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = f64::deserialize(deserializer)?;
        Fixed::checked_from_num(value)
            .ok_or_else(|| D::Error::custom(format!("{value} is out of fixed-point range")))
    }
}

impl Vec2Fixed {
    /// Create a new fixed-point vector.
    #[must_use]
    pub const fn new(x: Fixed, y: Fixed) -> Self {
        Self { x, y }
    }

    /// Create a vector from integer coordinates.
    #[must_use]
    pub fn from_ints(x: i32, y: i32) -> Self {
        Self::new(Fixed::from_num(x), Fixed::from_num(y))
    }

    /// Zero vector.
    pub const ZERO: Self = Self {
        x: Fixed::ZERO,
        y: Fixed::ZERO,
    };

    /// Calculate squared distance (avoids sqrt for comparisons).
    ///
    /// Saturates instead of overflowing for far-apart points.
    #[must_use]
    pub fn distance_squared(self, other: Self) -> Fixed {
        let dx = self.x.saturating_sub(other.x);
        let dy = self.y.saturating_sub(other.y);
        dx.saturating_mul(dx).saturating_add(dy.saturating_mul(dy))
    }

    /// Euclidean distance between two points.
    #[must_use]
    pub fn distance(self, other: Self) -> Fixed {
        fixed_sqrt(self.distance_squared(other))
    }

    /// Whether `other` lies within `range` of this point (inclusive).
    #[must_use]
    pub fn within(self, other: Self, range: Fixed) -> bool {
        self.distance_squared(other) <= range.saturating_mul(range)
    }

    /// Move towards `target` by at most `max_step`.
    ///
    /// Snaps onto the target instead of overshooting it.
    #[must_use]
    pub fn step_towards(self, target: Self, max_step: Fixed) -> Self {
        if max_step <= Fixed::ZERO {
            return self;
        }
        let distance = self.distance(target);
        if distance <= max_step {
            return target;
        }
        let dx = target.x.saturating_sub(self.x);
        let dy = target.y.saturating_sub(self.y);
        if self.distance_squared(target) == Fixed::MAX {
            // Saturated distance; walk along the unit direction instead.
            let scale = dx.saturating_abs().max(dy.saturating_abs());
            let (ux, uy) = (dx.saturating_div(scale), dy.saturating_div(scale));
            let length = fixed_sqrt(ux.saturating_mul(ux).saturating_add(uy.saturating_mul(uy)));
            return Self::new(
                self.x
                    .saturating_add(ux.saturating_mul(max_step).saturating_div(length)),
                self.y
                    .saturating_add(uy.saturating_mul(max_step).saturating_div(length)),
            );
        }
        // Scale before dividing so whole-number steps stay exact.
        Self::new(
            self.x
                .saturating_add(dx.saturating_mul(max_step).saturating_div(distance)),
            self.y
                .saturating_add(dy.saturating_mul(max_step).saturating_div(distance)),
        )
    }
}

/// Computes the square root of a fixed-point number using binary search.
fn fixed_sqrt(value: Fixed) -> Fixed {
    if value <= Fixed::ZERO {
        return Fixed::ZERO;
    }

    let mut low = Fixed::ZERO;
    // Invariant: low² <= value < high².
    let mut high = value.max(Fixed::ONE).saturating_add(Fixed::ONE);

    // 64 halvings cover the full integer and fractional width.
    for _ in 0..64 {
        let mid = low + (high - low) / Fixed::from_num(2);
        if mid == low {
            break;
        }
        let mid_sq = mid.saturating_mul(mid);

        if mid_sq <= value {
            low = mid;
        } else {
            high = mid;
        }
    }

    low
}

impl std::ops::Add for Vec2Fixed {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self {
            x: self.x + rhs.x,
            y: self.y + rhs.y,
        }
    }
}

impl std::ops::Sub for Vec2Fixed {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self {
            x: self.x - rhs.x,
            y: self.y - rhs.y,
        }
    }
}

/// Axis-aligned rectangle in world space (inclusive bounds).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Rect {
    /// Minimum corner.
    pub min: Vec2Fixed,
    /// Maximum corner.
    pub max: Vec2Fixed,
}

impl Rect {
    /// Build a rectangle from two arbitrary corners, e.g. a drag box.
    #[must_use]
    pub fn from_corners(a: Vec2Fixed, b: Vec2Fixed) -> Self {
        Self {
            min: Vec2Fixed::new(a.x.min(b.x), a.y.min(b.y)),
            max: Vec2Fixed::new(a.x.max(b.x), a.y.max(b.y)),
        }
    }

    /// Check whether a point lies inside the rectangle.
    #[must_use]
    pub fn contains(&self, point: Vec2Fixed) -> bool {
        point.x >= self.min.x
            && point.x <= self.max.x
            && point.y >= self.min.y
            && point.y <= self.max.y
    }

    /// The point inside the rectangle closest to `point`.
    #[must_use]
    pub fn clamp(&self, point: Vec2Fixed) -> Vec2Fixed {
        Vec2Fixed::new(
            point.x.max(self.min.x).min(self.max.x),
            point.y.max(self.min.y).min(self.max.y),
        )
    }

    /// Check whether this rectangle lies entirely inside `outer`.
    #[must_use]
    pub fn is_inside(&self, outer: &Self) -> bool {
        outer.contains(self.min) && outer.contains(self.max)
    }
}
