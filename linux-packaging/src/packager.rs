// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Packager capability and registry. */

use {
    crate::{
        error::{PackageError, Result},
        manifest::PackageManifest,
    },
    std::{collections::BTreeMap, io::Write},
};

/// A producer of packages in a specific format.
///
/// Implementations turn a [PackageManifest] into package file content
/// written to a caller supplied sink.
pub trait Packager: Send + Sync {
    /// Build the package described by `manifest`, writing it to `writer`.
    fn package(&self, manifest: &PackageManifest, writer: &mut dyn Write) -> Result<()>;
}

/// Maps format identifier strings to [Packager] implementations.
///
/// A registry is built once at startup and is read-only afterwards: lookups
/// take `&self` and instances can be shared across threads.
pub struct PackagerRegistry {
    packagers: BTreeMap<String, Box<dyn Packager>>,
}

impl Default for PackagerRegistry {
    /// Obtain a registry with all built-in packagers registered.
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register("deb", Box::new(crate::deb::DebPackager::default()));
        registry.register("rpm", Box::new(crate::rpm::RpmPackager::default()));

        registry
    }
}

impl PackagerRegistry {
    /// Obtain a registry with no registered packagers.
    pub fn empty() -> Self {
        Self {
            packagers: BTreeMap::new(),
        }
    }

    /// Register a packager for a format identifier.
    ///
    /// An existing registration for the same format is replaced.
    pub fn register(&mut self, format: impl ToString, packager: Box<dyn Packager>) {
        self.packagers.insert(format.to_string(), packager);
    }

    /// Obtain the packager for a format identifier.
    pub fn get(&self, format: &str) -> Result<&dyn Packager> {
        self.packagers
            .get(format)
            .map(|packager| packager.as_ref())
            .ok_or_else(|| PackageError::UnknownFormat(format.to_string()))
    }

    /// Iterate registered format identifiers, in sorted order.
    pub fn formats(&self) -> impl Iterator<Item = &str> {
        self.packagers.keys().map(|format| format.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NullPackager {}

    impl Packager for NullPackager {
        fn package(&self, _manifest: &PackageManifest, writer: &mut dyn Write) -> Result<()> {
            writer.write_all(b"null package")?;

            Ok(())
        }
    }

    #[test]
    fn default_registry_formats() {
        let registry = PackagerRegistry::default();

        assert_eq!(registry.formats().collect::<Vec<_>>(), vec!["deb", "rpm"]);
    }

    #[test]
    fn register_and_get() -> Result<()> {
        let mut registry = PackagerRegistry::empty();
        registry.register("null", Box::new(NullPackager {}));

        let packager = registry.get("null")?;

        let mut buffer = vec![];
        packager.package(&PackageManifest::default(), &mut buffer)?;
        assert_eq!(buffer, b"null package");

        Ok(())
    }

    #[test]
    fn unknown_format_error() {
        let registry = PackagerRegistry::default();

        match registry.get("snap") {
            Err(PackageError::UnknownFormat(format)) => assert_eq!(format, "snap"),
            _ => panic!("expected unknown format error"),
        }
    }
}
