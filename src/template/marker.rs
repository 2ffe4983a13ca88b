//! Marker tokens recognized structurally by the renderer.
//!
//! Markers are literal prefixes/suffixes. They are never nested or escaped.
//! Everything downstream works with [`Marker`] instead of slicing strings.

/// Prefix of a rendered value whose remainder is JSON to decode.
pub const JSON_DECODE: &str = "_workflow_templater_parsejson:";

/// Key suffix: drop the entry while rendering a resumed artifact.
pub const EXCLUDE_SOFT_SUFFIX: &str = "_workflow_templater_no_update";

/// Value prefix with the same meaning as [`EXCLUDE_SOFT_SUFFIX`].
pub const EXCLUDE_SOFT_PREFIX: &str = "_workflow_templater_no_update:";

/// Key suffix: drop the entry in every update render.
pub const EXCLUDE_FORCE_SUFFIX: &str = "_workflow_templater_force_no_update";

/// Value prefix with the same meaning as [`EXCLUDE_FORCE_SUFFIX`].
pub const EXCLUDE_FORCE_PREFIX: &str = "_workflow_templater_force_no_update:";

/// Prefix of a common value that is asked from the operator.
pub const ASK: &str = "_workflow_templater_ask:";

/// Kind of value an `ask` marker requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AskKind {
    Bool,
    Str,
}

/// A marker recognized on a key or value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Marker {
    Plain,
    JsonDecode,
    ExcludeSoft,
    ExcludeForce,
    Ask(AskKind),
}

/// Phase flags threaded through every render call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Phase {
    /// The artifact being rendered was supplied through the resume identifier map.
    pub resuming: bool,
    /// The render belongs to an update call.
    pub updating: bool,
}

impl Phase {
    /// Phase of a creation render.
    pub fn creation(resuming: bool) -> Self {
        Self {
            resuming,
            updating: false,
        }
    }

    /// Phase of an update render.
    pub fn update(resuming: bool) -> Self {
        Self {
            resuming,
            updating: true,
        }
    }

    /// Whether an exclusion marker drops its entry in this phase.
    pub fn excludes(&self, marker: &Marker) -> bool {
        match marker {
            Marker::ExcludeSoft => self.resuming,
            Marker::ExcludeForce => self.updating,
            _ => false,
        }
    }
}

impl Marker {
    /// Split a mapping key into its marker and the unmarked key.
    pub fn parse_key(key: &str) -> (Marker, &str) {
        if let Some(stripped) = key.strip_suffix(EXCLUDE_FORCE_SUFFIX) {
            (Marker::ExcludeForce, stripped)
        } else if let Some(stripped) = key.strip_suffix(EXCLUDE_SOFT_SUFFIX) {
            (Marker::ExcludeSoft, stripped)
        } else {
            (Marker::Plain, key)
        }
    }

    /// Split a rendered value into its marker and the remaining payload.
    pub fn parse_value(value: &str) -> (Marker, &str) {
        if let Some(rest) = value.strip_prefix(JSON_DECODE) {
            (Marker::JsonDecode, rest)
        } else if let Some(rest) = value.strip_prefix(EXCLUDE_FORCE_PREFIX) {
            (Marker::ExcludeForce, rest)
        } else if let Some(rest) = value.strip_prefix(EXCLUDE_SOFT_PREFIX) {
            (Marker::ExcludeSoft, rest)
        } else {
            (Marker::Plain, value)
        }
    }

    /// Parse an `ask` marker. [`Marker::Plain`] when the value carries none.
    pub fn parse_ask(value: &str) -> Result<Marker, String> {
        match value.strip_prefix(ASK) {
            None => Ok(Marker::Plain),
            Some("bool") => Ok(Marker::Ask(AskKind::Bool)),
            Some("str") => Ok(Marker::Ask(AskKind::Str)),
            Some(other) => Err(format!("unknown type for {} '{}'", ASK, other)),
        }
    }
}
