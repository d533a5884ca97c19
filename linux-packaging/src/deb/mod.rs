// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Build and sign `.deb` packages.

`.deb` files are `ar` archives holding a `debian-binary` version member,
a `control.tar` archive describing the package, and a `data.tar` archive
holding the files to install. This module implements writing that format
directly, without shelling out to `dpkg-deb`.

[builder::DebPackageBuilder] assembles a `.deb` file from a
[crate::manifest::PackageManifest]. [signer::DebSigner] produces the
optional `_gpgorigin` archive signature.
*/

pub mod builder;
pub mod signer;

pub use self::{
    builder::{DebPackageBuilder, DebPackager},
    signer::DebSigner,
};
