//! A registry of codec adapters, keyed by transfer syntax.
//!
//! Adapter selection is deterministic: candidates for a transfer
//! syntax are kept in registration order, and the first available one
//! wins unless the caller pins a specific adapter by name. The
//! built-in adapters are registered into a global [`struct@REGISTRY`]
//! at first use; applications with their own codec bindings can build
//! an [`AdapterRegistry`] of their own instead.

use lazy_static::lazy_static;
use snafu::Snafu;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use tracing::{debug, warn};

use crate::adapters::DynCodecAdapter;

#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum SelectionError {
    /// No adapter is registered for the transfer syntax at all.
    #[snafu(display("no codec adapter registered for transfer syntax `{}`", uid))]
    UnsupportedTransferSyntax { uid: String },

    /// The caller pinned an adapter that is not registered
    /// for this transfer syntax.
    #[snafu(display(
        "adapter `{}` is not registered for transfer syntax `{}`",
        name,
        uid
    ))]
    AdapterNotRegistered { name: String, uid: String },

    /// The caller pinned an adapter whose codec is missing.
    #[snafu(display(
        "adapter `{}` is not available; it requires {}",
        name,
        dependencies.join(", ")
    ))]
    AdapterNotAvailable {
        name: String,
        dependencies: Vec<String>,
    },

    /// Adapters are registered for the transfer syntax,
    /// but none of their codecs is present.
    #[snafu(display(
        "no available codec adapter for transfer syntax `{}`: {}",
        uid,
        candidates.join("; ")
    ))]
    NoAvailableAdapter {
        uid: String,
        /// One diagnostic line per registered candidate.
        candidates: Vec<String>,
    },
}

/// The intended direction of a codec adapter lookup.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum CodecDirection {
    Decode,
    Encode,
}

/// An ordered collection of codec adapters per transfer syntax.
#[derive(Default)]
pub struct AdapterRegistry {
    decoders: HashMap<&'static str, Vec<DynCodecAdapter>>,
    encoders: HashMap<&'static str, Vec<DynCodecAdapter>>,
}

impl std::fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let names = |map: &HashMap<&'static str, Vec<DynCodecAdapter>>| {
            map.iter()
                .map(|(uid, adapters)| {
                    (
                        *uid,
                        adapters.iter().map(|a| a.name()).collect::<Vec<_>>(),
                    )
                })
                .collect::<HashMap<_, _>>()
        };
        f.debug_struct("AdapterRegistry")
            .field("decoders", &names(&self.decoders))
            .field("encoders", &names(&self.encoders))
            .finish()
    }
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a decoding adapter for every transfer syntax it claims.
    ///
    /// Candidates keep their registration order during selection.
    pub fn register_decoder(&mut self, adapter: DynCodecAdapter) -> &mut Self {
        for uid in adapter.supported_transfer_syntaxes() {
            self.decoders.entry(uid).or_default().push(adapter);
        }
        self
    }

    /// Register an encoding adapter for every transfer syntax it claims.
    pub fn register_encoder(&mut self, adapter: DynCodecAdapter) -> &mut Self {
        for uid in adapter.supported_transfer_syntaxes() {
            self.encoders.entry(uid).or_default().push(adapter);
        }
        self
    }

    /// The native requirements of every candidate for a transfer
    /// syntax, one human-readable line per adapter.
    ///
    /// This is diagnostic material for error reports and tooling;
    /// availability itself is decided by [`CodecAdapter::is_available`].
    ///
    /// [`CodecAdapter::is_available`]: crate::adapters::CodecAdapter::is_available
    pub fn dependencies(&self, uid: &str, direction: CodecDirection) -> Vec<String> {
        self.candidates(uid, direction)
            .iter()
            .map(|a| {
                let deps = a.dependencies();
                if deps.is_empty() {
                    format!("{}: no native dependencies", a.name())
                } else {
                    format!("{}: requires {}", a.name(), deps.join(", "))
                }
            })
            .collect()
    }

    /// All registered candidates for a transfer syntax, in order.
    pub fn candidates(&self, uid: &str, direction: CodecDirection) -> &[DynCodecAdapter] {
        let map = match direction {
            CodecDirection::Decode => &self.decoders,
            CodecDirection::Encode => &self.encoders,
        };
        map.get(uid).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Pick the adapter to use for one operation.
    ///
    /// With `preferred` set, that adapter must be registered for the
    /// transfer syntax and available, and is returned unconditionally;
    /// otherwise the first available candidate in registration order
    /// is chosen.
    pub fn select(
        &self,
        uid: &str,
        direction: CodecDirection,
        preferred: Option<&str>,
    ) -> Result<DynCodecAdapter, SelectionError> {
        let candidates = self.candidates(uid, direction);
        if candidates.is_empty() {
            return UnsupportedTransferSyntaxSnafu { uid }.fail();
        }

        if let Some(name) = preferred {
            let adapter = candidates
                .iter()
                .find(|a| a.name() == name)
                .copied()
                .ok_or_else(|| {
                    AdapterNotRegisteredSnafu { name, uid }.build()
                })?;
            if !adapter.is_available() {
                return AdapterNotAvailableSnafu {
                    name,
                    dependencies: adapter
                        .dependencies()
                        .iter()
                        .map(|d| d.to_string())
                        .collect::<Vec<_>>(),
                }
                .fail();
            }
            return Ok(adapter);
        }

        for adapter in candidates {
            if adapter.is_available() {
                return Ok(*adapter);
            }
            // warn once per adapter, then stay quiet
            if WARNED_UNAVAILABLE.lock().unwrap().insert(adapter.name()) {
                warn!(
                    adapter = adapter.name(),
                    requires = adapter.dependencies().join(", "),
                    "skipping unavailable codec adapter"
                );
            } else {
                debug!(
                    adapter = adapter.name(),
                    "skipping unavailable codec adapter"
                );
            }
        }

        NoAvailableAdapterSnafu {
            uid,
            candidates: candidates
                .iter()
                .map(|a| format!("{} requires {}", a.name(), a.dependencies().join(", ")))
                .collect::<Vec<_>>(),
        }
        .fail()
    }
}

/// The native requirements of the built-in decoders for a transfer
/// syntax, one human-readable line per registered adapter.
pub fn decoder_dependencies(uid: &str) -> Vec<String> {
    REGISTRY.dependencies(uid, CodecDirection::Decode)
}

/// The native requirements of the built-in encoders for a transfer
/// syntax, one human-readable line per registered adapter.
pub fn encoder_dependencies(uid: &str) -> Vec<String> {
    REGISTRY.dependencies(uid, CodecDirection::Encode)
}

lazy_static! {
    // adapters already reported as unavailable at warn level
    static ref WARNED_UNAVAILABLE: Mutex<HashSet<&'static str>> = Mutex::new(HashSet::new());

    /// The global registry holding the built-in codec adapters.
    pub static ref REGISTRY: AdapterRegistry = {
        #[allow(unused_mut)]
        let mut registry = AdapterRegistry::new();
        #[cfg(feature = "rle")]
        {
            registry.register_decoder(&crate::adapters::rle::RleAdapter);
            registry.register_encoder(&crate::adapters::rle::RleAdapter);
        }
        #[cfg(feature = "jpeg")]
        {
            registry.register_decoder(&crate::adapters::jpeg::JpegAdapter);
            registry.register_encoder(&crate::adapters::jpeg::JpegAdapter);
        }
        registry
    };
}
