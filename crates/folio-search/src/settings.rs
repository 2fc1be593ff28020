//! Runtime search settings.
//!
//! Everything defaults to the behavior of plain `ts_rank` with every
//! conversion operator enabled. Environment variables can narrow it:
//!
//! - `FOLIO_RANK_NORMALIZATION`: `ts_rank` normalization bitmask (0-63)
//! - `FOLIO_TSQUERY_OR`, `FOLIO_TSQUERY_NEGATION`, `FOLIO_TSQUERY_PREFIX`,
//!   `FOLIO_TSQUERY_PHRASE`: toggle converter operators (default: true)

use std::env;

use folio_core::{Error, Result};

use crate::tsquery::ConversionOptions;

/// Largest meaningful `ts_rank` normalization mask (flags 1, 2, 4, 8, 16, 32).
pub const MAX_RANK_NORMALIZATION: u32 = 63;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchSettings {
    /// Passed as the third `ts_rank` argument when set.
    pub rank_normalization: Option<u32>,
    pub conversion: ConversionOptions,
}

impl SearchSettings {
    /// Constructs settings from environment variables.
    ///
    /// Boolean values are parsed as "true", "1", "yes", "on" (case-insensitive).
    /// An unparseable or out-of-range normalization is a configuration error.
    pub fn from_env() -> Result<Self> {
        let rank_normalization = match env::var("FOLIO_RANK_NORMALIZATION") {
            Ok(raw) if !raw.trim().is_empty() => Some(parse_normalization(raw.trim())?),
            _ => None,
        };

        Ok(Self {
            rank_normalization,
            conversion: ConversionOptions {
                or: parse_bool_env("FOLIO_TSQUERY_OR", true),
                negation: parse_bool_env("FOLIO_TSQUERY_NEGATION", true),
                prefix: parse_bool_env("FOLIO_TSQUERY_PREFIX", true),
                phrase: parse_bool_env("FOLIO_TSQUERY_PHRASE", true),
            },
        })
    }

    pub fn with_rank_normalization(mut self, mask: u32) -> Result<Self> {
        self.rank_normalization = Some(validate_rank_normalization(mask)?);
        Ok(self)
    }
}

/// Reject `ts_rank` normalization masks above [`MAX_RANK_NORMALIZATION`].
pub fn validate_rank_normalization(mask: u32) -> Result<u32> {
    if mask > MAX_RANK_NORMALIZATION {
        return Err(Error::Config(format!(
            "Rank normalization {} exceeds {}",
            mask, MAX_RANK_NORMALIZATION
        )));
    }
    Ok(mask)
}

fn parse_normalization(raw: &str) -> Result<u32> {
    let mask = raw.parse::<u32>().map_err(|_| {
        Error::Config(format!("Invalid FOLIO_RANK_NORMALIZATION '{}'", raw))
    })?;
    validate_rank_normalization(mask)
}

/// Parses a boolean environment variable with a default fallback.
///
/// Recognizes "true", "1", "yes", "on" (case-insensitive) as true.
/// Any other value or missing variable returns the default.
fn parse_bool_env(key: &str, default: bool) -> bool {
    env::var(key)
        .ok()
        .and_then(|val| match val.to_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Some(true),
            "false" | "0" | "no" | "off" => Some(false),
            _ => None,
        })
        .unwrap_or(default)
}
