// SPDX-License-Identifier: Apache-2.0

use std::collections::BTreeMap;

/// Values the codec cannot find in the tree itself: discriminants used by
/// variant guards (like the protocol version of a DHCP relay group) and the
/// parsing mode.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[non_exhaustive]
pub struct CodecContext {
    discriminants: BTreeMap<String, String>,
    strict: bool,
}

impl CodecContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_discriminant(&mut self, name: &str, value: &str) -> &mut Self {
        self.discriminants
            .insert(name.to_string(), value.to_string());
        self
    }

    pub fn discriminant(&self, name: &str) -> Option<&str> {
        self.discriminants.get(name).map(|s| s.as_str())
    }

    /// When set to true, decompiling a statement not described by the model
    /// fails with [crate::ErrorKind::UnrecognizedStatement] listing all of
    /// them, instead of ignoring them.
    /// Default is false.
    pub fn set_strict(&mut self, value: bool) -> &mut Self {
        self.strict = value;
        self
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }
}
