//! Deployment environment tag.

use std::fmt;
use std::str::FromStr;

/// Deployment context used to select among endpoint variants.
///
/// `Default` is a marker asking the registry to resolve the actual
/// environment through its environment resolver.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum Environment {
    /// Resolve the environment at lookup time.
    #[default]
    Default,
    /// A concrete, named environment.
    Named(String),
}

impl Environment {
    /// Creates a named environment.
    ///
    /// The name `default` (any case) yields [`Environment::Default`].
    pub fn named(name: impl Into<String>) -> Self {
        let name = name.into();
        if name.eq_ignore_ascii_case("default") {
            Environment::Default
        } else {
            Environment::Named(name)
        }
    }

    /// Returns true for the default marker.
    pub fn is_default(&self) -> bool {
        matches!(self, Environment::Default)
    }

    /// Returns the environment name.
    pub fn as_str(&self) -> &str {
        match self {
            Environment::Default => "default",
            Environment::Named(name) => name,
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Environment::named(s))
    }
}

impl From<&str> for Environment {
    fn from(s: &str) -> Self {
        Environment::named(s)
    }
}

impl From<String> for Environment {
    fn from(s: String) -> Self {
        Environment::named(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_marker_parsing() {
        assert_eq!(Environment::named("default"), Environment::Default);
        assert_eq!(Environment::named("DEFAULT"), Environment::Default);
        assert_eq!(Environment::from("qa"), Environment::Named("qa".to_string()));
    }

    #[test]
    fn test_display() {
        assert_eq!(Environment::Default.to_string(), "default");
        assert_eq!(Environment::named("staging").to_string(), "staging");
    }
}
