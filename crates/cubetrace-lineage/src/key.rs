//! Canonical argument encoding and logical source keys
//!
//! Process arguments are arbitrary nested JSON structures. Two argument
//! values that are structurally equal must produce the same key regardless of
//! the insertion order of object members, while array order stays
//! significant.

use serde_json::Value;
use std::fmt::{self, Display, Formatter, Write as _};

/// Render a JSON value in canonical form.
///
/// Object members are emitted sorted by key, arrays keep their order and
/// scalars use their standard JSON rendering. The output is stable across
/// runs and independent of how the value was built.
#[must_use]
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        Value::Object(members) => {
            let mut keys: Vec<&String> = members.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                // Writing to a String cannot fail.
                let _ = write!(out, "{}:", Value::String(key.clone()));
                write_canonical(&members[key.as_str()], out);
            }
            out.push('}');
        }
        scalar => {
            let _ = write!(out, "{scalar}");
        }
    }
}

/// Content-based identifier of a data source.
///
/// Groups constraints independently of node identity: two `load_collection`
/// calls for the same collection produce distinct source nodes with equal
/// keys.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SourceKey {
    process: String,
    arguments: String,
}

impl SourceKey {
    /// Build the key for a process and its arguments
    #[must_use]
    pub fn new(process: impl Into<String>, arguments: &Value) -> Self {
        Self {
            process: process.into(),
            arguments: canonical_json(arguments),
        }
    }

    /// Process tag, e.g. `load_collection`
    #[inline]
    #[must_use]
    pub fn process(&self) -> &str {
        &self.process
    }

    /// Canonical JSON rendering of the arguments
    #[inline]
    #[must_use]
    pub fn canonical_arguments(&self) -> &str {
        &self.arguments
    }

    /// Arguments decoded back into a JSON value
    #[must_use]
    pub fn arguments(&self) -> Value {
        // The canonical form is produced by `canonical_json` and always parses.
        serde_json::from_str(&self.arguments).unwrap_or(Value::Null)
    }

    /// Short Blake3 digest (first 16 hex chars), handy as a log field
    #[must_use]
    pub fn digest(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.process.as_bytes());
        hasher.update(&[0]);
        hasher.update(self.arguments.as_bytes());
        hex::encode(&hasher.finalize().as_bytes()[..8])
    }
}

impl Display for SourceKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.process, self.arguments)
    }
}

// Keys are used as JSON object keys in constraint reports, so they serialize
// as their display string.
impl serde::Serialize for SourceKey {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}
