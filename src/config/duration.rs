//! human readable durations like `30m`, `1d` or `2w`

use std::{fmt, str::FromStr, time::Duration};

use serde_with::{DeserializeFromStr, SerializeDisplay};
use thiserror::Error;

/// milliseconds per unit, largest unit first
const UNITS: [(&str, u64); 7] = [
	("y", 1000 * 60 * 60 * 24 * 365),
	("w", 1000 * 60 * 60 * 24 * 7),
	("d", 1000 * 60 * 60 * 24),
	("h", 1000 * 60 * 60),
	("m", 1000 * 60),
	("s", 1000),
	("ms", 1),
];

/// Error returned when parsing a [ReopenDuration]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DurationError {
	/// the string isn't of the form `<integer><unit>`
	#[error("not a valid duration string: {0:?}")]
	Invalid(String),
	/// the unit is not one of `y`, `w`, `d`, `h`, `m`, `s`, `ms`
	#[error("invalid time unit in duration string: {0:?}")]
	Unit(String),
	/// the duration doesn't fit into 64 bit milliseconds
	#[error("duration out of range: {0:?}")]
	Overflow(String),
}

/// A duration with millisecond precision, written as `<integer><unit>` where
/// the unit is one of `y` (365d), `w` (7d), `d` (24h), `h`, `m`, `s`, `ms`.
#[derive(
	Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, DeserializeFromStr, SerializeDisplay,
)]
pub struct ReopenDuration {
	/// length in milliseconds
	millis: u64,
}

impl ReopenDuration {
	/// construct from milliseconds
	pub const fn from_millis(millis: u64) -> Self {
		Self { millis }
	}

	/// length in milliseconds
	pub const fn as_millis(&self) -> u64 {
		self.millis
	}

	/// true for the zero duration
	pub const fn is_zero(&self) -> bool {
		self.millis == 0
	}

	/// convert for date arithmetic, saturating at chrono's limit
	pub fn to_chrono(&self) -> chrono::Duration {
		i64::try_from(self.millis)
			.ok()
			.and_then(chrono::Duration::try_milliseconds)
			.unwrap_or(chrono::Duration::MAX)
	}
}

impl From<ReopenDuration> for Duration {
	fn from(duration: ReopenDuration) -> Self {
		Duration::from_millis(duration.millis)
	}
}

impl FromStr for ReopenDuration {
	type Err = DurationError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let split = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
		let (number, unit) = s.split_at(split);

		if number.is_empty() || unit.is_empty() {
			return Err(DurationError::Invalid(s.to_owned()));
		}

		let factor = UNITS
			.iter()
			.find(|(name, _)| *name == unit)
			.map(|(_, factor)| *factor)
			.ok_or_else(|| DurationError::Unit(unit.to_owned()))?;

		let n: u64 = number.parse().map_err(|_| DurationError::Overflow(s.to_owned()))?;

		n.checked_mul(factor)
			.map(Self::from_millis)
			.ok_or_else(|| DurationError::Overflow(s.to_owned()))
	}
}

impl fmt::Display for ReopenDuration {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		if self.millis == 0 {
			return f.write_str("0s");
		}

		// "ms" divides everything, so there's always a match
		let (unit, factor) =
			UNITS.iter().find(|(_, factor)| self.millis % factor == 0).copied().unwrap_or(("ms", 1));

		write!(f, "{}{}", self.millis / factor, unit)
	}
}
