//! The error entries a GraphQL response carries next to a nulled field.

use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;

pub type Object = Map<String, Value>;

/// A path element inside a GraphQL response.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum PathElement {
    Index(usize),
    Key(String),
}

/// The path of a field inside a GraphQL response, root first.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct Path(pub Vec<PathElement>);

impl Path {
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.0.push(PathElement::Key(key.into()));
        self
    }

    pub fn index(mut self, index: usize) -> Self {
        self.0.push(PathElement::Index(index));
        self
    }
}

impl<'a> FromIterator<&'a str> for Path {
    fn from_iter<T: IntoIterator<Item = &'a str>>(iter: T) -> Self {
        Path(
            iter.into_iter()
                .map(|key| PathElement::Key(key.to_string()))
                .collect(),
        )
    }
}

/// A GraphQL error entry.
///
/// See the [GraphQL specification](https://spec.graphql.org/October2021/#sec-Errors).
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct Error {
    /// The error message.
    pub message: String,

    /// The path of the field whose value was replaced by null.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub path: Option<Path>,

    /// Additional machine readable details.
    #[serde(skip_serializing_if = "Object::is_empty", default)]
    pub extensions: Object,
}
