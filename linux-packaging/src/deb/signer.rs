// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! PGP signing of `.deb` archives.

Implements the `dpkg-sig` signature scheme. The signature is a PGP
cleartext signed manifest describing the container members and is stored
as a `_gpgorigin` member appended to the archive. Verifiers recompute the
member digests and check them against the signed manifest.
*/

use {
    crate::{
        error::{PackageError, Result},
        io::MemberDigest,
        manifest::PackageManifest,
    },
    chrono::Utc,
    pgp::{crypto::HashAlgorithm, Deserializable, SignedSecretKey},
    pgp_cleartext::cleartext_sign,
    std::io::Cursor,
};

/// Date format used in signature manifests. e.g. `Mon Jan 2 15:04:05 2006`.
const DATE_FORMAT: &str = "%a %b %-d %H:%M:%S %Y";

/// Produces `dpkg-sig` style signatures over `.deb` container members.
///
/// The signing key is an ASCII armored PGP secret key taken from the
/// package manifest. Signing is optional. When the manifest doesn't
/// configure a key, [Self::sign] returns `Ok(None)` and the archive is
/// left unsigned.
pub struct DebSigner<'a> {
    signing_key: Option<&'a str>,
    key_passphrase: Option<&'a str>,
}

impl<'a> DebSigner<'a> {
    /// Construct a signer from the signing settings on a package manifest.
    pub fn from_manifest(manifest: &'a PackageManifest) -> Self {
        Self {
            signing_key: manifest.deb_signing_key.as_deref(),
            key_passphrase: manifest.deb_signing_key_password.as_deref(),
        }
    }

    /// Produce a cleartext signature over container member digests.
    ///
    /// The signed message is a `Version: 4` signature manifest. It records
    /// the signer identity, the signing time, the `origin` role, and one
    /// line per member holding its MD5 digest, SHA-1 digest, size in
    /// bytes, and name.
    ///
    /// Returns `Ok(None)` when no signing key is configured.
    pub fn sign(&self, members: &[MemberDigest]) -> Result<Option<String>> {
        let key_data = match self.signing_key {
            Some(data) if !data.is_empty() => data,
            _ => return Ok(None),
        };

        let (key, _) = SignedSecretKey::from_armor_single(Cursor::new(key_data.as_bytes()))?;

        let signer = key
            .details
            .users
            .first()
            .map(|user| String::from_utf8_lossy(user.id.id().as_ref()).to_string())
            .ok_or(PackageError::SigningKeyNoIdentity)?;

        let mut message = format!(
            "Version: 4\nSigner: {}\nDate: {}\nRole: origin\nFiles:\n",
            signer,
            Utc::now().format(DATE_FORMAT)
        );
        for member in members {
            message.push_str(&format!(
                "\t{} {} {} {}\n",
                member.md5_hex(),
                member.sha1_hex(),
                member.size,
                member.name
            ));
        }

        let passphrase = self.key_passphrase.unwrap_or("").to_string();

        let mut signature = cleartext_sign(
            &key,
            move || passphrase,
            HashAlgorithm::SHA2_256,
            Cursor::new(message.into_bytes()),
        )?;

        if !signature.ends_with('\n') {
            signature.push('\n');
        }

        Ok(Some(signature))
    }
}
