use serde::{Deserialize, Serialize};
use std::fmt;

/// Static description of a map variant. Reclamation schemes describe
/// themselves with the same shape, and the map nests them as `reclaimer`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Descriptor {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reclaimer: Option<Box<Descriptor>>,
}

impl Descriptor {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            reclaimer: None,
        }
    }

    pub fn with_reclaimer(mut self, reclaimer: Descriptor) -> Self {
        self.reclaimer = Some(Box::new(reclaimer));
        self
    }

    /// `type` of every nesting level joined by `/`,
    /// e.g. `harris_michael_hash_map/epoch_based`.
    pub fn name(&self) -> String {
        let mut name = self.kind.clone();
        let mut curr = self.reclaimer.as_deref();
        while let Some(d) = curr {
            name.push('/');
            name.push_str(&d.kind);
            curr = d.reclaimer.as_deref();
        }
        name
    }
}

impl fmt::Display for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string(self) {
            Ok(s) => f.write_str(&s),
            Err(_) => Err(fmt::Error),
        }
    }
}

/// Implemented by maps and reclamation schemes.
pub trait Describe {
    fn descriptor() -> Descriptor;
}
