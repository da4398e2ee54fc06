//! 🗺️ Zones: the three neighborhoods of the bucket.
//!
//! 🎬 *[a CSV lands in `pending/`. it does not know it is about to move house.]*
//!
//! Objects carry their lifecycle state in the key prefix:
//!
//! ```text
//!   pending/cars.csv  ──relocate──▶  done/cars_processed.csv
//!          │
//!          └──────────report──────▶  errors/cars_errors.csv
//! ```
//!
//! 🧠 Knowledge graph:
//! - `Zone` is the explicit discriminant. Strings stay at the edges.
//! - `ZonedKey` is a key split into (zone, relative path).
//! - A key with no `pending/` prefix is treated as if it had one. The relocator
//!   copies from and deletes the *normalized* key, so `cars.csv` is moved out of
//!   `pending/cars.csv`. Yes, even though the event said `cars.csv`. 🦆

use std::fmt;

use serde::Serialize;

/// 🔍 Substring the event filter looks for in the raw object key.
/// Containment, not prefix. `uploads/pending-stuff.csv` qualifies.
pub const PENDING_MARKER: &str = "pending";

/// 🏘️ Where an object lives, logically speaking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Zone {
    /// 📥 freshly landed, waiting for us
    Pending,
    /// ✅ processed (and "processed" includes "every row failed", see DESIGN.md)
    Done,
    /// 💀 side-reports of rows that did not make it
    Errors,
}

impl Zone {
    /// 🏷️ Key prefix for this zone, trailing slash included.
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Pending => "pending/",
            Self::Done => "done/",
            Self::Errors => "errors/",
        }
    }

    /// 🖍️ Marker spliced in front of the file extension when an object is
    /// rendered into this zone. Pending keys are left alone.
    pub fn marker(&self) -> Option<&'static str> {
        match self {
            Self::Pending => None,
            Self::Done => Some("_processed"),
            Self::Errors => Some("_errors"),
        }
    }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix().trim_end_matches('/'))
    }
}

/// 📍 A (container, key) pair. Derived on the fly, never stored.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct ObjectLocation {
    pub container: String,
    pub key: String,
}

impl ObjectLocation {
    pub fn new(container: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            container: container.into(),
            key: key.into(),
        }
    }

    /// 📥 The same object, with its key forced under `pending/`.
    pub fn pending_normalized(&self) -> Self {
        let the_zoned_key = ZonedKey::from_pending(&self.key);
        Self::new(self.container.clone(), the_zoned_key.render())
    }

    /// 🚚 Where this (pending) object ends up when rendered into `zone`.
    ///
    /// `pending/cars.csv` into `Zone::Done` is `done/cars_processed.csv`.
    pub fn relocated_to(&self, zone: Zone) -> Self {
        let the_zoned_key = ZonedKey::from_pending(&self.key).into_zone(zone);
        Self::new(self.container.clone(), the_zoned_key.render())
    }
}

impl fmt::Display for ObjectLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s3://{}/{}", self.container, self.key)
    }
}

/// 🔑 A key taken apart: which zone, and what comes after the prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZonedKey {
    pub zone: Zone,
    pub relative: String,
}

impl ZonedKey {
    /// 📥 Parse a key that is pending whether it says so or not.
    ///
    /// Only the `pending/` prefix is stripped. Anything else (even `done/x.csv`)
    /// is taken as a relative path under pending.
    pub fn from_pending(key: &str) -> Self {
        let relative = key.strip_prefix(Zone::Pending.prefix()).unwrap_or(key);
        Self {
            zone: Zone::Pending,
            relative: relative.to_string(),
        }
    }

    pub fn into_zone(self, zone: Zone) -> Self {
        Self { zone, ..self }
    }

    /// 🖨️ Back to a string key, zone marker included.
    pub fn render(&self) -> String {
        let the_relative = match self.zone.marker() {
            Some(marker) => splice_marker(&self.relative, marker),
            None => self.relative.clone(),
        };
        format!("{}{}", self.zone.prefix(), the_relative)
    }
}

/// ✂️ `dir/cars.csv` + `_errors` is `dir/cars_errors.csv`. Only the trailing
/// extension of the last path segment moves. No extension: marker goes at the end.
/// A leading dot (`.env`) is a name, not an extension.
fn splice_marker(relative: &str, marker: &str) -> String {
    let file_start = relative.rfind('/').map_or(0, |slash| slash + 1);
    match relative[file_start..].rfind('.') {
        Some(dot) if dot > 0 => {
            let the_split = file_start + dot;
            format!(
                "{}{}{}",
                &relative[..the_split],
                marker,
                &relative[the_split..]
            )
        }
        _ => format!("{relative}{marker}"),
    }
}
