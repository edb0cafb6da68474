//! Decoding, encoding and hashing of metadata structures.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_bencode::value::Value;
use sha1::{Digest, Sha1};

use super::files::FileEntry;
use super::CodecError;

/// Typed view of the `info` dictionary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Info {
    pub name: String,
    #[serde(rename = "piece length")]
    pub piece_length: i64,
    #[serde(with = "serde_bytes")]
    pub pieces: Vec<u8>,
    /// Present for single-file structures only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub files: Option<Vec<FileEntry>>,
}

/// A decoded torrent metadata structure.
///
/// The `info` dictionary is retained with every key, including ones the typed
/// view ignores. [`Structure::hash`] is taken over the canonical encoding of
/// `info`, which equals the input bytes when the input was itself canonical.
#[derive(Debug, Clone, PartialEq)]
pub struct Structure {
    pub announce: Option<String>,
    pub comment: Option<String>,
    pub created_by: Option<String>,
    pub creation_date: Option<i64>,
    pub private: Option<i64>,
    pub bot: Option<String>,
    info: Value,
    info_bytes: Vec<u8>,
    view: Info,
}

impl Structure {
    /// Build a structure with an empty envelope around the given info.
    pub fn from_info(info: Info) -> Result<Self, CodecError> {
        let info_bytes = serde_bencode::to_bytes(&info)?;
        let value: Value = serde_bencode::from_bytes(&info_bytes)?;

        Ok(Self {
            announce: None,
            comment: None,
            created_by: None,
            creation_date: None,
            private: None,
            bot: None,
            info: value,
            info_bytes,
            view: info,
        })
    }

    /// Decode a bencoded structure.
    ///
    /// Top-level keys other than the envelope fields and `info` are dropped.
    pub fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        let value: Value = serde_bencode::from_bytes(bytes)?;
        let Value::Dict(mut top) = value else {
            return Err(CodecError::MalformedFormat(
                "top-level value is not a dictionary".to_string(),
            ));
        };

        let info = top
            .remove("info".as_bytes())
            .ok_or_else(|| CodecError::MalformedFormat("missing info dictionary".to_string()))?;
        if !matches!(info, Value::Dict(_)) {
            return Err(CodecError::MalformedFormat(
                "info is not a dictionary".to_string(),
            ));
        }

        let info_bytes = serde_bencode::to_bytes(&info)?;
        let view: Info = serde_bencode::from_bytes(&info_bytes)
            .map_err(|e| CodecError::MalformedFormat(format!("invalid info dictionary: {}", e)))?;

        if view.length.is_none() && view.files.is_none() {
            return Err(CodecError::MalformedFormat(
                "info has neither length nor files".to_string(),
            ));
        }

        Ok(Self {
            announce: take_string(&mut top, "announce"),
            comment: take_string(&mut top, "comment"),
            created_by: take_string(&mut top, "created by"),
            creation_date: take_int(&mut top, "creation date"),
            private: take_int(&mut top, "private"),
            bot: take_string(&mut top, "bot"),
            info,
            info_bytes,
            view,
        })
    }

    /// Encode the structure using canonical (sorted key) bencode.
    pub fn encode(&self) -> Result<Vec<u8>, CodecError> {
        let mut top = HashMap::new();
        put_string(&mut top, "announce", &self.announce);
        put_string(&mut top, "comment", &self.comment);
        put_string(&mut top, "created by", &self.created_by);
        put_int(&mut top, "creation date", self.creation_date);
        put_int(&mut top, "private", self.private);
        put_string(&mut top, "bot", &self.bot);
        top.insert(b"info".to_vec(), self.info.clone());

        Ok(serde_bencode::to_bytes(&Value::Dict(top))?)
    }

    /// Lowercase hex SHA-1 over the canonical encoding of `info`.
    pub fn hash(&self) -> String {
        hex::encode(Sha1::digest(&self.info_bytes))
    }

    pub fn info(&self) -> &Info {
        &self.view
    }

    pub fn name(&self) -> &str {
        &self.view.name
    }

    /// Canonical bytes of the `info` dictionary.
    pub fn info_bytes(&self) -> &[u8] {
        &self.info_bytes
    }
}

fn take_string(dict: &mut HashMap<Vec<u8>, Value>, key: &str) -> Option<String> {
    match dict.remove(key.as_bytes()) {
        Some(Value::Bytes(bytes)) => Some(String::from_utf8_lossy(&bytes).into_owned()),
        _ => None,
    }
}

fn take_int(dict: &mut HashMap<Vec<u8>, Value>, key: &str) -> Option<i64> {
    match dict.remove(key.as_bytes()) {
        Some(Value::Int(n)) => Some(n),
        _ => None,
    }
}

fn put_string(dict: &mut HashMap<Vec<u8>, Value>, key: &str, value: &Option<String>) {
    if let Some(s) = value {
        dict.insert(key.as_bytes().to_vec(), Value::Bytes(s.as_bytes().to_vec()));
    }
}

fn put_int(dict: &mut HashMap<Vec<u8>, Value>, key: &str, value: Option<i64>) {
    if let Some(n) = value {
        dict.insert(key.as_bytes().to_vec(), Value::Int(n));
    }
}
