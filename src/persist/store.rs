//! Named resource storage for layer vectors and the device configuration.
//!
//! A resource is an opaque byte blob keyed by `<name>.<suffix>`. The
//! trait deliberately reports a missing resource as `Ok(None)`: that is
//! the documented first-run condition, not an error. Size-mismatched
//! records are rejected outright rather than read partially.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::control::layer::Layer;
use crate::error::{Result, StrataError};
use crate::persist::codec::{decode_q13, encode_q13};

/// Byte-blob storage keyed by resource name.
pub trait ResourceStore {
    /// Fetch a resource. `Ok(None)` means it does not exist yet.
    fn load(&self, name: &str) -> Result<Option<Vec<u8>>>;

    /// Create or replace a resource.
    fn save(&mut self, name: &str, data: &[u8]) -> Result<()>;
}

/// In-memory store for hosts and tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    resources: HashMap<String, Vec<u8>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.resources.contains_key(name)
    }
}

impl ResourceStore for MemoryStore {
    fn load(&self, name: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.resources.get(name).cloned())
    }

    fn save(&mut self, name: &str, data: &[u8]) -> Result<()> {
        self.resources.insert(name.to_string(), data.to_vec());
        Ok(())
    }
}

/// Filesystem-backed store: one file per resource under a directory.
#[derive(Debug, Clone)]
pub struct DirStore {
    dir: PathBuf,
}

impl DirStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn resource_path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }
}

impl ResourceStore for DirStore {
    fn load(&self, name: &str) -> Result<Option<Vec<u8>>> {
        let path = self.resource_path(name);
        match fs::read(&path) {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StrataError::ResourceRead { path, source: e }),
        }
    }

    fn save(&mut self, name: &str, data: &[u8]) -> Result<()> {
        if !self.dir.exists() {
            fs::create_dir_all(&self.dir).map_err(|e| StrataError::ResourceWrite {
                path: self.dir.clone(),
                source: e,
            })?;
        }
        let path = self.resource_path(name);
        fs::write(&path, data).map_err(|e| StrataError::ResourceWrite { path, source: e })
    }
}

/// Resource name for a layer's vector, e.g. `patch.prm`.
pub fn layer_resource_name(base: &str, layer: Layer) -> String {
    format!("{}.{}", base, layer.suffix())
}

/// Resource name for the configuration record.
pub fn config_resource_name(base: &str) -> String {
    format!("{base}.cfg")
}

/// Encode a layer vector as little-endian Q13 slots.
pub fn encode_layer_record(values: &[f32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(values.len() * 2);
    for v in values {
        out.extend_from_slice(&encode_q13(*v).to_le_bytes());
    }
    out
}

/// Decode a layer record, enforcing the exact expected slot count.
pub fn decode_layer_record(name: &str, bytes: &[u8], expected_slots: usize) -> Result<Vec<f32>> {
    if bytes.len() != expected_slots * 2 {
        return Err(StrataError::MalformedResource {
            name: name.to_string(),
            expected: expected_slots * 2,
            actual: bytes.len(),
        });
    }
    Ok(bytes
        .chunks_exact(2)
        .map(|c| decode_q13(i16::from_le_bytes([c[0], c[1]])))
        .collect())
}

/// Device configuration carried by the `.cfg` resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Mod-amount knobs act as attenuverters (bipolar) instead of
    /// attenuators.
    pub mod_attenuverters: bool,
    /// Same for the CV-amount knobs.
    pub cv_attenuverters: bool,
    /// Hardware revision code.
    pub revision: i32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mod_attenuverters: false,
            cv_attenuverters: false,
            revision: 0,
        }
    }
}

impl Config {
    /// Wire size of the record: two flag bytes plus a little-endian i32.
    pub const ENCODED_LEN: usize = 6;

    /// Defaults selected by a hardware revision: revision 1 and later
    /// ship with attenuverter behavior enabled.
    pub fn for_revision(revision: i32) -> Self {
        let attenuverters = revision >= 1;
        Self {
            mod_attenuverters: attenuverters,
            cv_attenuverters: attenuverters,
            revision,
        }
    }

    pub fn encode(&self) -> [u8; Self::ENCODED_LEN] {
        let rev = self.revision.to_le_bytes();
        [
            self.mod_attenuverters as u8,
            self.cv_attenuverters as u8,
            rev[0],
            rev[1],
            rev[2],
            rev[3],
        ]
    }

    pub fn decode(name: &str, bytes: &[u8]) -> Result<Self> {
        if bytes.len() != Self::ENCODED_LEN {
            return Err(StrataError::MalformedResource {
                name: name.to_string(),
                expected: Self::ENCODED_LEN,
                actual: bytes.len(),
            });
        }
        Ok(Self {
            mod_attenuverters: bytes[0] != 0,
            cv_attenuverters: bytes[1] != 0,
            revision: i32::from_le_bytes([bytes[2], bytes[3], bytes[4], bytes[5]]),
        })
    }
}

/// Load one layer's vector from a store, degrading to `None` (defaults
/// apply) when the resource is absent or malformed.
pub fn load_layer_vector<S: ResourceStore>(
    store: &S,
    base: &str,
    layer: Layer,
) -> Result<Option<Vec<f32>>> {
    let name = layer_resource_name(base, layer);
    let Some(bytes) = store.load(&name)? else {
        return Ok(None);
    };
    match decode_layer_record(&name, &bytes, layer.slot_count()) {
        Ok(values) => Ok(Some(values)),
        Err(e) if e.degrades_to_defaults() => {
            warn!(resource = %name, error = %e, "rejecting malformed layer record");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

/// Load the configuration, falling back to revision defaults when absent
/// or malformed.
pub fn load_config<S: ResourceStore>(store: &S, base: &str) -> Result<Config> {
    let name = config_resource_name(base);
    let Some(bytes) = store.load(&name)? else {
        return Ok(Config::default());
    };
    match Config::decode(&name, &bytes) {
        Ok(config) => Ok(config),
        Err(e) if e.degrades_to_defaults() => {
            warn!(resource = %name, error = %e, "rejecting malformed config record");
            Ok(Config::default())
        }
        Err(e) => Err(e),
    }
}
