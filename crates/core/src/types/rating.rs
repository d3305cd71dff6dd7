//! Review star ratings.

use serde::{Deserialize, Serialize};

/// Lowest accepted rating.
pub const MIN_RATING: u8 = 1;

/// Highest accepted rating.
pub const MAX_RATING: u8 = 5;

/// Errors that can occur when building a [`Rating`].
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RatingError {
    /// Value outside 1..=5.
    #[error("rating must be between 1 and 5, got {0}")]
    OutOfRange(u8),
}

/// A 1-5 star rating attached to a review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Rating(u8);

impl Rating {
    /// Create a rating.
    ///
    /// # Errors
    ///
    /// Returns `RatingError::OutOfRange` unless `1 <= value <= 5`.
    pub const fn new(value: u8) -> Result<Self, RatingError> {
        if value < MIN_RATING || value > MAX_RATING {
            return Err(RatingError::OutOfRange(value));
        }
        Ok(Self(value))
    }

    /// The numeric value.
    #[must_use]
    pub const fn value(&self) -> u8 {
        self.0
    }

    /// Number of filled and empty stars to draw.
    #[must_use]
    pub const fn stars(&self) -> (u8, u8) {
        (self.0, MAX_RATING - self.0)
    }
}

impl TryFrom<u8> for Rating {
    type Error = RatingError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Rating> for u8 {
    fn from(rating: Rating) -> Self {
        rating.0
    }
}

/// Filled and empty star counts for an average such as `4.4`.
///
/// Averages are rounded to the nearest whole star and clamped to 0..=5;
/// non-finite values draw no filled stars.
#[must_use]
pub fn average_stars(average: f64) -> (u8, u8) {
    let filled = if average.is_finite() {
        // Clamped to 0..=5 before the cast, so truncation is impossible.
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let rounded = average.round().clamp(0.0, f64::from(MAX_RATING)) as u8;
        rounded
    } else {
        0
    };
    (filled, MAX_RATING - filled)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_rating_bounds() {
        assert!(Rating::new(1).is_ok());
        assert!(Rating::new(5).is_ok());
        assert_eq!(Rating::new(0), Err(RatingError::OutOfRange(0)));
        assert_eq!(Rating::new(6), Err(RatingError::OutOfRange(6)));
    }

    #[test]
    fn test_rating_stars() {
        assert_eq!(Rating::new(4).unwrap().stars(), (4, 1));
        assert_eq!(Rating::new(5).unwrap().stars(), (5, 0));
    }

    #[test]
    fn test_rating_deserialize_rejects_out_of_range() {
        assert!(serde_json::from_str::<Rating>("3").is_ok());
        assert!(serde_json::from_str::<Rating>("9").is_err());
    }

    #[test]
    fn test_average_stars() {
        assert_eq!(average_stars(4.4), (4, 1));
        assert_eq!(average_stars(4.5), (5, 0));
        assert_eq!(average_stars(0.0), (0, 5));
        assert_eq!(average_stars(7.0), (5, 0));
        assert_eq!(average_stars(f64::NAN), (0, 5));
    }
}
