//! Decoding of micro-event values into detections
//!
//! The tracker reports one of three payload shapes under a kind's key:
//!
//! | value                                   | detection |
//! |-----------------------------------------|-----------|
//! | `[]`                                    | lost      |
//! | `[0, label]`                            | brief     |
//! | `[d, id, kind, x, y, label]` with d ≠ 0 | full      |
//!
//! Positions past the end of the value, or holding `null`, decode as absent.

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// Position of the label in a brief payload
pub const BRIEF_LABEL: usize = 1;

/// Position of the label in a full payload
pub const FULL_LABEL: usize = 5;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PayloadError {
    #[error("Discriminator {0} is not an integer")]
    BadDiscriminator(Value),
}

/// A decoded tracker report for one object kind
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "shape", rename_all = "kebab-case")]
pub enum Detection {
    /// Object left the field of view
    Lost,
    Brief {
        label: Option<Value>,
    },
    Full {
        discriminator: i64,
        object_id: Option<i64>,
        kind: Option<i64>,
        centroid: Option<(f64, f64)>,
        label: Option<Value>,
    },
}

fn present(value: &[Value], index: usize) -> Option<&Value> {
    value.get(index).filter(|v| !v.is_null())
}

impl Detection {
    pub fn decode(value: &[Value]) -> Result<Self, PayloadError> {
        let Some(first) = value.first() else {
            return Ok(Detection::Lost);
        };
        let discriminator = first
            .as_i64()
            .ok_or_else(|| PayloadError::BadDiscriminator(first.clone()))?;

        if discriminator == 0 {
            return Ok(Detection::Brief {
                label: present(value, BRIEF_LABEL).cloned(),
            });
        }

        let centroid = match (
            present(value, 3).and_then(Value::as_f64),
            present(value, 4).and_then(Value::as_f64),
        ) {
            (Some(x), Some(y)) => Some((x, y)),
            _ => None,
        };
        Ok(Detection::Full {
            discriminator,
            object_id: present(value, 1).and_then(Value::as_i64),
            kind: present(value, 2).and_then(Value::as_i64),
            centroid,
            label: present(value, FULL_LABEL).cloned(),
        })
    }

    pub fn label(&self) -> Option<&Value> {
        match self {
            Detection::Lost => None,
            Detection::Brief { label } | Detection::Full { label, .. } => label.as_ref(),
        }
    }

    /// Label rendered for logs and speech
    pub fn label_text(&self) -> Option<String> {
        self.label().map(|label| match label {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
    }

    pub fn is_lost(&self) -> bool {
        matches!(self, Detection::Lost)
    }
}
