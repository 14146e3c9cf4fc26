//! Request arguments as they arrive from the client.

use std::fmt;

/// One named argument
///
/// Both the name and value are immutable for the life of the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Argument {
    name: String,
    value: String,
}

impl Argument {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    /// Argument names are matched case-insensitively
    pub fn is_named(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }
}

/// The ordered list of arguments on a request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Arguments(Vec<Argument>);

impl Arguments {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, value: &str) -> Self {
        self.push(Argument::new(name, value));
        self
    }

    pub fn push(&mut self, argument: Argument) {
        self.0.push(argument);
    }

    /// Find an argument by name
    ///
    /// Arguments with an empty value are treated as absent, and when the same
    /// name appears more than once the first non-empty one wins.
    pub fn get(&self, name: &str) -> Option<&Argument> {
        self.0
            .iter()
            .find(|a| a.is_named(name) && !a.value.is_empty())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Argument> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<Argument>> for Arguments {
    fn from(value: Vec<Argument>) -> Self {
        Self(value)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Arguments {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| Argument::new(k, v))
                .collect(),
        )
    }
}

impl fmt::Display for Arguments {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, arg) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}={}", arg.name, arg.value)?;
        }
        write!(f, "]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_non_empty_match() {
        let args: Arguments = [("beam", ""), ("BEAM", "10"), ("Beam", "8")]
            .into_iter()
            .collect();
        assert_eq!(args.get("beam").map(Argument::value), Some("10"));
        assert_eq!(args.get("dgrp"), None);
        assert_eq!(args.len(), 3);
    }

    #[test]
    fn display() {
        let args = Arguments::new().with("BEAM", "1").with("DGRP", "LIN_KLYS");
        assert_eq!(args.to_string(), "[BEAM=1, DGRP=LIN_KLYS]");
        assert_eq!(Arguments::new().to_string(), "[]");
    }
}
