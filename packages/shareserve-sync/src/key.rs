//! Query keys: identity for cacheable units of server-derived state.

use std::borrow::Cow;
use std::fmt;

use smallvec::SmallVec;

/// A scalar parameter of a [`QueryKey`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum QueryParam {
    Str(String),
    Int(i64),
    Bool(bool),
}

impl fmt::Display for QueryParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryParam::Str(s) => write!(f, "{s:?}"),
            QueryParam::Int(i) => write!(f, "{i}"),
            QueryParam::Bool(b) => write!(f, "{b}"),
        }
    }
}

impl From<&str> for QueryParam {
    fn from(value: &str) -> Self {
        QueryParam::Str(value.to_string())
    }
}

impl From<String> for QueryParam {
    fn from(value: String) -> Self {
        QueryParam::Str(value)
    }
}

impl From<&String> for QueryParam {
    fn from(value: &String) -> Self {
        QueryParam::Str(value.clone())
    }
}

impl From<i64> for QueryParam {
    fn from(value: i64) -> Self {
        QueryParam::Int(value)
    }
}

impl From<bool> for QueryParam {
    fn from(value: bool) -> Self {
        QueryParam::Bool(value)
    }
}

/// Identifier for one cacheable, fetchable unit of state: a logical
/// resource name plus zero or more scalar parameters.
///
/// Two keys are equal iff the resource and every parameter are equal, in
/// order. All subscribers constructing the same key share one cache entry
/// and one in-flight fetch.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey {
    resource: Cow<'static, str>,
    params: SmallVec<[QueryParam; 2]>,
}

impl QueryKey {
    /// Create a key for a logical resource with no parameters.
    pub fn new(resource: impl Into<Cow<'static, str>>) -> Self {
        Self {
            resource: resource.into(),
            params: SmallVec::new(),
        }
    }

    /// Append a scalar parameter.
    pub fn param(mut self, param: impl Into<QueryParam>) -> Self {
        self.params.push(param.into());
        self
    }

    /// The logical resource name.
    pub fn resource(&self) -> &str {
        &self.resource
    }

    /// The ordered parameter list.
    pub fn params(&self) -> &[QueryParam] {
        &self.params
    }

    /// True when `other` names the same resource and starts with this
    /// key's parameters. Invalidation matches by prefix, so a bare
    /// resource key addresses every parameterization of that resource.
    pub fn is_prefix_of(&self, other: &QueryKey) -> bool {
        self.resource == other.resource && other.params.starts_with(&self.params)
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.resource)?;
        if !self.params.is_empty() {
            write!(f, "(")?;
            for (i, param) in self.params.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{param}")?;
            }
            write!(f, ")")?;
        }
        Ok(())
    }
}
