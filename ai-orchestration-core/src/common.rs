//! Small helpers shared across modules that don't belong to any one component.

/// `serde(with = "crate::common::duration_serde")` for human-readable durations.
///
/// Accepts `"30s"`, `"500ms"`, `"5m"`, `"1h"` on the way in and always writes
/// whole seconds on the way out, mirroring the config file format used
/// throughout this crate's provider and circuit-breaker configuration structs.
pub mod duration_serde {
    use serde::{Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format!("{}s", duration.as_secs()))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        use serde::de::Error;
        use serde_json::Value;

        let value = Value::deserialize(deserializer)?;
        match value {
            Value::String(s) => parse(&s).map_err(Error::custom),
            Value::Object(obj) => {
                let secs = obj
                    .get("secs")
                    .and_then(|v| v.as_u64())
                    .ok_or_else(|| Error::custom("missing 'secs' field"))?;
                let nanos = obj.get("nanos").and_then(|v| v.as_u64()).unwrap_or(0);
                Ok(Duration::new(secs, nanos as u32))
            }
            _ => Err(Error::custom("invalid duration format")),
        }
    }

    fn parse(s: &str) -> Result<Duration, String> {
        let s = s.trim();
        if s.is_empty() {
            return Err("empty duration string".to_string());
        }
        if let Some(stripped) = s.strip_suffix("ms") {
            let num: u64 = stripped
                .parse()
                .map_err(|_| format!("invalid number: {stripped}"))?;
            return Ok(Duration::from_millis(num));
        }
        if let Some(stripped) = s.strip_suffix('h') {
            let num: u64 = stripped
                .parse()
                .map_err(|_| format!("invalid number: {stripped}"))?;
            return Ok(Duration::from_secs(num * 3600));
        }
        if let Some(stripped) = s.strip_suffix('m') {
            let num: u64 = stripped
                .parse()
                .map_err(|_| format!("invalid number: {stripped}"))?;
            return Ok(Duration::from_secs(num * 60));
        }
        if let Some(stripped) = s.strip_suffix('s') {
            let num: f64 = stripped
                .parse()
                .map_err(|_| format!("invalid number: {stripped}"))?;
            let secs = num.trunc() as u64;
            let nanos = (num.fract() * 1_000_000_000.0).round() as u32;
            return Ok(Duration::new(secs, nanos));
        }
        Err(format!("unknown duration unit in '{s}'"))
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn parses_all_units() {
            assert_eq!(parse("30s").unwrap(), Duration::from_secs(30));
            assert_eq!(parse("500ms").unwrap(), Duration::from_millis(500));
            assert_eq!(parse("5m").unwrap(), Duration::from_secs(300));
            assert_eq!(parse("1h").unwrap(), Duration::from_secs(3600));
        }

        #[test]
        fn rejects_empty_and_unitless() {
            assert!(parse("").is_err());
            assert!(parse("30").is_err());
        }
    }
}

/// Fixed-point money: 1,000,000 microcents == $1.00.
///
/// All cost arithmetic in this crate is carried in this type and converted
/// to a floating-point dollar amount only at the `AIResponse` reporting
/// boundary, to avoid the accumulation drift that repeated floating-point
/// addition introduces over a long-running process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Hash)]
pub struct Microcents(pub u64);

impl Microcents {
    pub const ZERO: Microcents = Microcents(0);

    pub fn from_dollars(dollars: f64) -> Self {
        Microcents((dollars * 1_000_000.0).round() as u64)
    }

    pub fn to_dollars(self) -> f64 {
        self.0 as f64 / 1_000_000.0
    }

    /// `price` is in microcents per million tokens (the natural unit for the
    /// per-million-token prices providers publish).
    pub fn for_tokens(tokens: u32, price_per_million: u64) -> Self {
        Microcents((tokens as u64 * price_per_million) / 1_000_000)
    }

    pub fn saturating_add(self, other: Microcents) -> Microcents {
        Microcents(self.0.saturating_add(other.0))
    }
}

impl std::iter::Sum for Microcents {
    fn sum<I: Iterator<Item = Microcents>>(iter: I) -> Self {
        iter.fold(Microcents::ZERO, Microcents::saturating_add)
    }
}

impl std::ops::Add for Microcents {
    type Output = Microcents;
    fn add(self, rhs: Microcents) -> Microcents {
        self.saturating_add(rhs)
    }
}

#[cfg(test)]
mod microcents_tests {
    use super::*;

    #[test]
    fn round_trips_dollars() {
        let m = Microcents::from_dollars(1.2345);
        assert!((m.to_dollars() - 1.2345).abs() < 1e-9);
    }

    #[test]
    fn for_tokens_matches_manual_math() {
        // 1000 tokens at $3 per million tokens = $0.003 = 3000 microcents
        let price_per_million = Microcents::from_dollars(3.0).0;
        let cost = Microcents::for_tokens(1000, price_per_million);
        assert_eq!(cost.0, 3000);
    }
}
