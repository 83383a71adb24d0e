use std::fmt;

use serde::{Deserialize, Serialize};

use crate::engine::VerifyMethod;
use crate::error::TemplateError;

/// Selects which verification engine configuration and which stored
/// enrollment template a call uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TemplateMode {
    /// The speaker repeats an enrolled phrase; higher accuracy.
    TextDependent,
    /// Free speech; content does not matter.
    TextIndependent,
}

impl TemplateMode {
    /// The verification sub-methods an engine for this mode combines.
    ///
    /// Text-dependent pairs the content-matching method with the
    /// content-independent one for higher accuracy, at the cost of requiring
    /// the speaker to repeat the enrolled phrase. The set is fixed once, at
    /// engine construction.
    pub fn methods(self) -> &'static [VerifyMethod] {
        match self {
            Self::TextDependent => &[VerifyMethod::ContentMatching, VerifyMethod::ContentIndependent],
            Self::TextIndependent => &[VerifyMethod::ContentIndependent],
        }
    }
}

impl fmt::Display for TemplateMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TextDependent => write!(f, "text-dependent"),
            Self::TextIndependent => write!(f, "text-independent"),
        }
    }
}

/// Opaque biometric fingerprint produced by a verification engine.
///
/// Two flavors share this type: a freshly computed probe template and an
/// enrolled template deserialized from a [`TemplateStore`] blob. The byte
/// layout belongs to the engine that produced it; this crate only moves the
/// bytes around.
///
/// [`TemplateStore`]: crate::store::TemplateStore
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceTemplate {
    bytes: Vec<u8>,
}

impl VoiceTemplate {
    /// Wraps serialized template bytes, rejecting an empty blob.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, TemplateError> {
        if bytes.is_empty() {
            return Err(TemplateError::Empty);
        }
        Ok(Self { bytes })
    }

    /// Serialized form, suitable for persisting through a template store.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}
