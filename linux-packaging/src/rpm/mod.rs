// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Build `.rpm` packages by driving `rpmbuild`.

Unlike the `.deb` support, this module does not encode the RPM format
itself. It stages manifest files into an `rpmbuild` build area, renders a
spec file, and invokes the system `rpmbuild` to produce the package.
*/

pub mod builder;

pub use self::builder::RpmPackager;
