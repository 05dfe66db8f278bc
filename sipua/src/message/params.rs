use std::fmt;

use sipua_util::ArcStr;

/// A parameter.
///
/// This struct represents a parameter in a SIP message,
/// consisting of a name and an optional value. Names are
/// lowercased when parsed from the wire; values are kept
/// verbatim.
#[derive(Debug, PartialEq, Eq, Default, Clone)]
pub struct Param {
    /// The parameter name.
    pub name: ArcStr,

    /// The parameter optional value
    pub value: Option<ArcStr>,
}

impl Param {
    /// Creates a parameter from a name and optional value.
    pub fn new(name: &str, value: Option<&str>) -> Self {
        Param {
            name: name.into(),
            value: value.map(|v| v.into()),
        }
    }
}

#[derive(Debug, PartialEq, Eq, Default, Clone)]
/// A collection of SIP parameters.
///
/// A parameter takes the form `name=value` and can appear in a SIP message
/// as either a URI parameter or a header parameter. Insertion order is
/// preserved for serialization; lookups ignore ASCII case.
pub struct Params(Vec<Param>);

impl Params {
    /// Creates an empty `Params` list.
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Returns the number of parameters.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Gets the value of a parameter by name.
    ///
    /// Returns the value associated with the given name, if it exists.
    /// The outer `Option` tells whether the parameter is present, the
    /// inner one whether it carries a value.
    pub fn get(&self, name: &str) -> Option<Option<&str>> {
        self.0
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
            .map(|p| p.value.as_deref())
    }

    /// Returns `true` if a parameter with the given name exists.
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Returns an iterator over the parameters.
    pub fn iter(&self) -> impl Iterator<Item = &Param> {
        self.0.iter()
    }

    /// Pushes a name-value parameter pair.
    pub fn push(&mut self, param: Param) {
        self.0.push(param)
    }

    /// Removes the parameter with the given name, returning it if present.
    pub fn remove(&mut self, name: &str) -> Option<Param> {
        let idx = self.0.iter().position(|p| p.name.eq_ignore_ascii_case(name))?;
        Some(self.0.remove(idx))
    }

    /// Checks if the parameter list is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Params {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, Param { name, value }) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ";")?;
            }
            match value {
                Some(value) => write!(f, "{}={}", name, value)?,
                None => write!(f, "{}", name)?,
            }
        }
        Ok(())
    }
}

impl<const N: usize> From<[(&str, &str); N]> for Params {
    fn from(params: [(&str, &str); N]) -> Self {
        Self(params.map(|(name, value)| Param::new(name, Some(value))).to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_is_case_insensitive() {
        let mut params = Params::new();
        params.push(Param::new("Branch", Some("z9hG4bK776asdhds")));

        assert_eq!(params.get("branch"), Some(Some("z9hG4bK776asdhds")));
        assert_eq!(params.get("BRANCH"), Some(Some("z9hG4bK776asdhds")));
        assert_eq!(params.get("received"), None);
    }

    #[test]
    fn test_display_preserves_insertion_order() {
        let mut params = Params::new();
        params.push(Param::new("lr", None));
        params.push(Param::new("transport", Some("ws")));

        assert_eq!(params.to_string(), "lr;transport=ws");
    }
}
