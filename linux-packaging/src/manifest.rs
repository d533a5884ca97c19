// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Package manifests.

A [PackageManifest] is the declarative input to every packager: package
identity, dependency relations, and file placement. Manifests typically
arrive as YAML documents and deserialize with serde; every field is
optional in the serialized form.
*/

use {serde::Deserialize, std::collections::BTreeMap};

/// Describes a package to build.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(default)]
pub struct PackageManifest {
    /// Package name.
    pub name: String,

    /// Target machine architecture. e.g. `amd64`.
    pub arch: String,

    /// Target platform. Defaults to `linux`.
    pub platform: String,

    /// Package version. A single leading `v` is stripped when applying
    /// defaults so tag names like `v1.0.0` can be used directly.
    pub version: String,

    pub section: String,

    pub priority: String,

    pub replaces: Vec<String>,

    pub provides: Vec<String>,

    pub depends: Vec<String>,

    pub recommends: Vec<String>,

    pub suggests: Vec<String>,

    pub conflicts: Vec<String>,

    pub maintainer: String,

    pub description: String,

    pub vendor: String,

    pub homepage: String,

    pub license: String,

    /// Directory binaries install to. Defaults to `/usr/local/bin`.
    pub bindir: String,

    /// Content files, keyed by source path with the absolute installation
    /// path as the value.
    pub files: BTreeMap<String, String>,

    /// Configuration files, in the same form as `files`. Destinations are
    /// additionally recorded as *conffiles* so package managers preserve
    /// local modifications.
    pub config_files: BTreeMap<String, String>,

    /// ASCII armored PGP private key used to sign built `.deb` files.
    ///
    /// When present, builds produce a signed package. When absent, builds
    /// are unsigned.
    pub deb_signing_key: Option<String>,

    /// Passphrase unlocking `deb_signing_key`, if the key is protected.
    pub deb_signing_key_password: Option<String>,
}

impl PackageManifest {
    /// Apply default values for fields that were not provided.
    ///
    /// Sets `bindir` to `/usr/local/bin` and `platform` to `linux` when
    /// empty and strips a single leading `v` from the version.
    pub fn with_defaults(mut self) -> Self {
        if self.bindir.is_empty() {
            self.bindir = "/usr/local/bin".to_string();
        }
        if self.platform.is_empty() {
            self.platform = "linux".to_string();
        }
        if let Some(version) = self.version.strip_prefix('v') {
            self.version = version.to_string();
        }

        self
    }

    /// Obtain every file placement in build traversal order.
    ///
    /// Content files come first, then configuration files. Within each group,
    /// placements are sorted by destination path so build output is stable
    /// regardless of how the manifest was written.
    pub fn file_placements(&self) -> Vec<FilePlacement<'_>> {
        let mut placements = sorted_placements(&self.files, false);
        placements.extend(sorted_placements(&self.config_files, true));

        placements
    }

    /// Obtain configuration file destinations in build traversal order.
    pub fn config_file_destinations(&self) -> Vec<&str> {
        let mut destinations = self
            .config_files
            .values()
            .map(|destination| destination.as_str())
            .collect::<Vec<_>>();
        destinations.sort_unstable();

        destinations
    }
}

/// A single source → destination file mapping from a manifest.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct FilePlacement<'a> {
    /// Path of the source file on the build machine.
    pub source: &'a str,

    /// Absolute path the file installs to.
    pub destination: &'a str,

    /// Whether this file was declared as a configuration file.
    pub is_config: bool,
}

fn sorted_placements(files: &BTreeMap<String, String>, is_config: bool) -> Vec<FilePlacement<'_>> {
    let mut placements = files
        .iter()
        .map(|(source, destination)| FilePlacement {
            source,
            destination,
            is_config,
        })
        .collect::<Vec<_>>();
    placements.sort_by_key(|placement| placement.destination);

    placements
}
