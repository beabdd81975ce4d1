//! Transform parameters.
//!
//! Every transform declares a closed list of [`ParameterSpec`]s. Values arrive
//! as strings (from code, config files or the command line) and are parsed and
//! range-checked by the transform itself.
//!
//! # Example
//!
//! ```
//! use soundfeat_core::parameter::{parse_in_range, ParameterError};
//!
//! let bands: usize = parse_in_range("32", 1..=2048).unwrap();
//! assert_eq!(bands, 32);
//! assert!(matches!(parse_in_range::<usize>("0", 1..=2048), Err(ParameterError::Invalid(_))));
//! ```

use std::collections::HashMap;
use std::fmt::Display;
use std::ops::RangeInclusive;
use std::str::FromStr;

/// Parameter values keyed by parameter name.
pub type TransformParams = HashMap<String, String>;

/// Create a [`TransformParams`] map with key-value pairs.
///
/// Values may be anything implementing `ToString`.
///
/// # Example
/// ```
/// use soundfeat_core::params;
///
/// let params = params! {
///     "length" => 512,
///     "type" => "hamming",
/// };
/// assert_eq!(params["length"], "512");
/// ```
#[macro_export]
macro_rules! params {
    ($($key:expr => $value:expr),* $(,)?) => {{
        #[allow(unused_mut)]
        let mut map = $crate::parameter::TransformParams::new();
        $(
            map.insert($key.to_string(), $value.to_string());
        )*
        map
    }};
}

/// Description of one recognized parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParameterSpec {
    pub name: &'static str,
    pub description: &'static str,
    /// Default value, in the same string form `set_parameter` accepts.
    pub default: &'static str,
}

impl ParameterSpec {
    pub const fn new(name: &'static str, description: &'static str, default: &'static str) -> Self {
        Self {
            name,
            description,
            default,
        }
    }
}

/// Failure of a single `set_parameter` call.
///
/// The transform and parameter names are attached by the caller when this is
/// turned into a crate [`Error`](crate::Error).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParameterError {
    #[error("unknown parameter")]
    Unknown,

    #[error("{0}")]
    Invalid(String),
}

/// Parse `value` as `T`.
pub fn parse_value<T>(value: &str) -> Result<T, ParameterError>
where
    T: FromStr,
    T::Err: Display,
{
    value
        .trim()
        .parse::<T>()
        .map_err(|e| ParameterError::Invalid(e.to_string()))
}

/// Parse `value` as `T` and check it lies in `range`.
pub fn parse_in_range<T>(value: &str, range: RangeInclusive<T>) -> Result<T, ParameterError>
where
    T: FromStr + PartialOrd + Display,
    T::Err: Display,
{
    let parsed = parse_value::<T>(value)?;
    if !range.contains(&parsed) {
        return Err(ParameterError::Invalid(format!(
            "must be in range [{}, {}]",
            range.start(),
            range.end()
        )));
    }
    Ok(parsed)
}

/// Parse a strictly positive float.
pub fn parse_positive(value: &str) -> Result<f32, ParameterError> {
    let parsed = parse_value::<f32>(value)?;
    if !(parsed.is_finite() && parsed > 0.0) {
        return Err(ParameterError::Invalid("must be greater than 0".to_string()));
    }
    Ok(parsed)
}

/// Parse `true`/`false` (also `1`/`0`, `yes`/`no`).
pub fn parse_bool(value: &str) -> Result<bool, ParameterError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        other => Err(ParameterError::Invalid(format!("'{other}' is not a boolean"))),
    }
}

/// Parse one of a closed set of keywords.
pub fn parse_choice<T: Copy>(value: &str, choices: &[(&str, T)]) -> Result<T, ParameterError> {
    let value = value.trim();
    choices
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(value))
        .map(|(_, choice)| *choice)
        .ok_or_else(|| {
            let names: Vec<&str> = choices.iter().map(|(name, _)| *name).collect();
            ParameterError::Invalid(format!("must be one of: {}", names.join(", ")))
        })
}

/// Parse a comma or whitespace separated list.
pub fn parse_list<T>(value: &str) -> Result<Vec<T>, ParameterError>
where
    T: FromStr,
    T::Err: Display,
{
    value
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .map(parse_value::<T>)
        .collect()
}
