// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Linux packaging primitives.

This crate implements functionality for building Linux software packages
from a declarative manifest, without requiring a distribution's packaging
toolchain where possible.

# A Tour of Functionality

[manifest::PackageManifest] describes a package: identity and metadata
fields plus mappings of source files to installed destinations. Manifests
are typically deserialized from YAML documents.

[packager::Packager] is the interface for producing a package file from a
manifest. [packager::PackagerRegistry] maps format identifiers like `deb`
and `rpm` to implementations. [build_package] ties the two together and
is the main entrypoint for callers.

The [deb] module writes `.deb` files directly in Rust:
[deb::DebPackageBuilder] assembles the `ar` container and its tar members
and [deb::DebSigner] produces `dpkg-sig` style `_gpgorigin` signatures.
[signing_key] can generate PGP signing keys.

The [rpm] module produces `.rpm` files by delegating to the system
`rpmbuild` tool.

Lower level primitives live in [control] (Debian control file model) and
[io] (compression formats and multi-digest computation).
*/

pub mod control;
pub mod deb;
pub mod error;
pub mod io;
pub mod manifest;
pub mod packager;
pub mod rpm;
pub mod signing_key;

use std::io::Write;

/// Build a package of the requested format from a manifest.
///
/// Manifest defaults are applied, `format` is resolved against the
/// registry, and package file content is written to `writer`.
pub fn build_package(
    registry: &packager::PackagerRegistry,
    manifest: manifest::PackageManifest,
    format: &str,
    writer: &mut dyn Write,
) -> error::Result<()> {
    let manifest = manifest.with_defaults();

    registry.get(format)?.package(&manifest, writer)
}
