//! POST payload preparation.
//!
//! Callers hand over a [`PostData`]; the builders turn it into the flat
//! payload the engine's one-level POST field model can carry. A payload with
//! any nested field degrades wholesale to a single URL-encoded string: total,
//! not partial, flattening. That policy is long-standing caller-visible
//! behavior and is preserved exactly.

use std::path::Path;

use crate::engine::{FieldValue, PostPayload};
use crate::error::Error;

/// Caller-facing POST payload.
#[derive(Debug, Clone, PartialEq)]
pub enum PostData {
    /// Pre-serialized body, passed through untouched.
    Raw(String),
    /// Named fields, possibly with one level of nesting.
    Fields(Vec<(String, PostField)>),
}

/// One caller-facing POST field.
#[derive(Debug, Clone, PartialEq)]
pub enum PostField {
    Scalar(String),
    /// One level of nested pairs, serialized as `parent[child]` keys.
    Nested(Vec<(String, String)>),
}

impl PostData {
    pub fn raw(body: impl Into<String>) -> Self {
        PostData::Raw(body.into())
    }

    /// Flat scalar fields.
    pub fn fields<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        PostData::Fields(
            pairs
                .into_iter()
                .map(|(name, value)| (name.into(), PostField::Scalar(value.into())))
                .collect(),
        )
    }

    pub fn is_raw(&self) -> bool {
        matches!(self, PostData::Raw(_))
    }
}

/// Applies the flattening policy: fields stay discrete unless any of them is
/// nested, in which case the entire payload becomes one URL-encoded string.
pub(crate) fn prepare_post(data: PostData) -> PostPayload {
    match data {
        PostData::Raw(body) => PostPayload::Raw(body),
        PostData::Fields(fields) => {
            let nested = fields
                .iter()
                .any(|(_, field)| matches!(field, PostField::Nested(_)));
            if nested {
                return PostPayload::Raw(build_query(&fields));
            }
            PostPayload::Fields(
                fields
                    .into_iter()
                    .filter_map(|(name, field)| match field {
                        PostField::Scalar(value) => Some((name, FieldValue::Text(value))),
                        PostField::Nested(_) => None,
                    })
                    .collect(),
            )
        }
    }
}

/// Resolves each upload path to an absolute location and wraps it as a
/// file-upload marker under the same field name.
pub(crate) fn prepare_files(files: &[(&str, &Path)]) -> Result<Vec<(String, FieldValue)>, Error> {
    files
        .iter()
        .map(|(name, path)| {
            let resolved = path.canonicalize().map_err(|source| Error::File {
                path: path.to_path_buf(),
                source,
            })?;
            Ok((name.to_string(), FieldValue::File(resolved)))
        })
        .collect()
}

/// Standard URL encoding of a field list, nested pairs serialized under
/// `parent[child]` keys.
pub(crate) fn build_query(fields: &[(String, PostField)]) -> String {
    let mut pairs: Vec<(String, String)> = Vec::new();
    for (name, field) in fields {
        match field {
            PostField::Scalar(value) => pairs.push((name.clone(), value.clone())),
            PostField::Nested(inner) => {
                for (key, value) in inner {
                    pairs.push((format!("{name}[{key}]"), value.clone()));
                }
            }
        }
    }
    serde_urlencoded::to_string(&pairs).unwrap_or_default()
}

/// URL-encodes one `name=value` pair.
pub(crate) fn encode_pair(name: &str, value: &str) -> String {
    serde_urlencoded::to_string([(name, value)]).unwrap_or_default()
}
