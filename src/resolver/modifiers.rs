//! Field path modifiers (`:lower`, `:each`, `:length`, `:isset`).

use std::fmt;

use super::errors::ResolverError;

/// Suffix modifier of the last path segment (`name:modifier`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Modifier {
    /// Case-folded value
    Lower,
    /// One row per array element
    Each,
    /// Array element count
    Length,
    /// Key presence of a request value
    IsSet,
}

impl Modifier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Modifier::Lower => "lower",
            Modifier::Each => "each",
            Modifier::Length => "length",
            Modifier::IsSet => "isset",
        }
    }

    fn parse(name: &str) -> Option<Self> {
        match name {
            "lower" => Some(Modifier::Lower),
            "each" => Some(Modifier::Each),
            "length" => Some(Modifier::Length),
            "isset" => Some(Modifier::IsSet),
            _ => None,
        }
    }
}

impl fmt::Display for Modifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Split `name:modifier` into its parts. Only one modifier is allowed.
pub fn split_modifier(segment: &str) -> Result<(&str, Option<Modifier>), ResolverError> {
    match segment.split_once(':') {
        None => Ok((segment, None)),
        Some((name, modifier)) => Modifier::parse(modifier)
            .map(|m| (name, Some(m)))
            .ok_or_else(|| ResolverError::invalid_modifier(modifier, name)),
    }
}
