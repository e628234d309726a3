use std::fmt;

use crate::error::RegistrationError;

/// One path segment of a registered route.
///
/// Variant order is match priority: a static segment shadows a parameter, which shadows a
/// wildcard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathNode {
    Static(String),
    Dynamic(String),
    Wildcard,
}

pub const WILDCARD: &str = "*";

impl PathNode {
    /// Classify segment `index` of `path`.
    pub fn parse(path: &str, index: usize, segment: &str) -> Result<Self, RegistrationError> {
        if segment == WILDCARD {
            return Ok(Self::Wildcard);
        }

        if segment.len() >= 2 && segment.starts_with('{') && segment.ends_with('}') {
            let name = &segment[1..segment.len() - 1];
            if name.trim().is_empty() {
                return Err(RegistrationError::BlankParameter {
                    path: path.to_string(),
                    index,
                });
            }
            return Ok(Self::Dynamic(name.to_string()));
        }

        if segment.trim().is_empty() {
            return Err(RegistrationError::BlankSegment {
                path: path.to_string(),
                index,
            });
        }

        Ok(Self::Static(segment.to_string()))
    }

    pub fn id(&self) -> &str {
        match self {
            Self::Static(text) => text,
            Self::Dynamic(name) => name,
            Self::Wildcard => WILDCARD,
        }
    }

    pub(crate) fn rank(&self) -> u8 {
        match self {
            Self::Static(_) => 0,
            Self::Dynamic(_) => 1,
            Self::Wildcard => 2,
        }
    }

    pub fn is_wildcard(&self) -> bool {
        matches!(self, Self::Wildcard)
    }

    pub fn matches(&self, segment: &str) -> bool {
        match self {
            Self::Static(text) => text.eq_ignore_ascii_case(segment),
            Self::Dynamic(_) => !segment.is_empty(),
            Self::Wildcard => true,
        }
    }

    /// Whether a registration for `other` can reuse the node holding `self`.
    pub fn same_identity(&self, other: &PathNode) -> bool {
        match (self, other) {
            (Self::Static(a), Self::Static(b)) => a.eq_ignore_ascii_case(b),
            (Self::Dynamic(a), Self::Dynamic(b)) => a == b,
            (Self::Wildcard, Self::Wildcard) => true,
            _ => false,
        }
    }
}

impl fmt::Display for PathNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Static(text) => f.write_str(text),
            Self::Dynamic(name) => write!(f, "{{{}}}", name),
            Self::Wildcard => f.write_str(WILDCARD),
        }
    }
}
