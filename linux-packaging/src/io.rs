// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! I/O primitives for package archives. */

use {
    crate::error::Result,
    digest::Digest,
    md5::Md5,
    sha1::Sha1,
    std::io::Read,
};

/// Compression format to apply to archive members inside packages.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Compression {
    /// Do not compress.
    Uncompressed,
    /// Compress as `.gz` files.
    Gzip,
    /// Compress as `.xz` files using a specified compression level.
    Xz(u32),
    /// Compress as `.zst` files using a specified compression level.
    Zstandard(i32),
}

impl Compression {
    /// Obtain the filename extension for this compression format.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Uncompressed => "",
            Self::Gzip => ".gz",
            Self::Xz(_) => ".xz",
            Self::Zstandard(_) => ".zst",
        }
    }

    /// Compress input data from a reader.
    pub fn compress(&self, reader: &mut impl Read) -> Result<Vec<u8>> {
        let mut buffer = vec![];

        match self {
            Self::Uncompressed => {
                std::io::copy(reader, &mut buffer)?;
            }
            Self::Gzip => {
                let header = libflate::gzip::HeaderBuilder::new().finish();

                let mut encoder = libflate::gzip::Encoder::with_options(
                    &mut buffer,
                    libflate::gzip::EncodeOptions::new().header(header),
                )?;
                std::io::copy(reader, &mut encoder)?;
                encoder.finish().into_result()?;
            }
            Self::Xz(level) => {
                let mut encoder = xz2::write::XzEncoder::new(buffer, *level);
                std::io::copy(reader, &mut encoder)?;
                buffer = encoder.finish()?;
            }
            Self::Zstandard(level) => {
                let mut encoder = zstd::Encoder::new(buffer, *level)?;
                std::io::copy(reader, &mut encoder)?;
                buffer = encoder.finish()?;
            }
        }

        Ok(buffer)
    }
}

/// The checksum record for a file installed by a package.
///
/// Ordering of records matches the order file entries were written to the
/// data archive.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FileChecksum {
    /// Relative installation path, without a leading slash.
    pub path: String,
    /// MD5 digest of the file content.
    pub md5: Vec<u8>,
    /// Size of the file content in bytes.
    pub size: u64,
}

impl FileChecksum {
    /// Obtain the hex encoded MD5 digest.
    pub fn md5_hex(&self) -> String {
        hex::encode(&self.md5)
    }
}

/// Digests of a member written to the outer package container.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct MemberDigest {
    /// Name of the container member.
    pub name: String,
    /// MD5 digest of the member content.
    pub md5: Vec<u8>,
    /// SHA-1 digest of the member content.
    pub sha1: Vec<u8>,
    /// Size of the member content in bytes.
    pub size: u64,
}

impl MemberDigest {
    /// Obtain the hex encoded MD5 digest.
    pub fn md5_hex(&self) -> String {
        hex::encode(&self.md5)
    }

    /// Obtain the hex encoded SHA-1 digest.
    pub fn sha1_hex(&self) -> String {
        hex::encode(&self.sha1)
    }
}

/// Computes MD5 and SHA-1 digests of content in a single pass.
pub struct MultiDigester {
    md5: Md5,
    sha1: Sha1,
    size: u64,
}

impl Default for MultiDigester {
    fn default() -> Self {
        Self {
            md5: Md5::new(),
            sha1: Sha1::new(),
            size: 0,
        }
    }
}

impl MultiDigester {
    /// Write content into the digesters.
    pub fn update(&mut self, data: &[u8]) {
        self.md5.update(data);
        self.sha1.update(data);
        self.size += data.len() as u64;
    }

    /// Finish digesting content.
    ///
    /// Consumes the instance and returns a [MemberDigest] describing the named
    /// container member.
    pub fn finish(self, name: impl ToString) -> MemberDigest {
        MemberDigest {
            name: name.to_string(),
            md5: self.md5.finalize().to_vec(),
            sha1: self.sha1.finalize().to_vec(),
            size: self.size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compression_extensions() {
        assert_eq!(Compression::Uncompressed.extension(), "");
        assert_eq!(Compression::Gzip.extension(), ".gz");
        assert_eq!(Compression::Xz(6).extension(), ".xz");
        assert_eq!(Compression::Zstandard(3).extension(), ".zst");
    }

    #[test]
    fn gzip_compress_is_decodable() -> Result<()> {
        let data = b"hello world".repeat(64);

        let compressed = Compression::Gzip.compress(&mut std::io::Cursor::new(&data))?;

        let mut decoder = libflate::gzip::Decoder::new(std::io::Cursor::new(compressed))?;
        let mut decoded = vec![];
        decoder.read_to_end(&mut decoded)?;

        assert_eq!(decoded, data);

        Ok(())
    }

    #[test]
    fn multi_digester_digests() {
        let mut digester = MultiDigester::default();
        digester.update(b"ab");
        digester.update(b"c");

        let digest = digester.finish("debian-binary");

        assert_eq!(digest.name, "debian-binary");
        assert_eq!(digest.size, 3);
        assert_eq!(digest.md5_hex(), "900150983cd24fb0d6963f7d28e17f72");
        assert_eq!(digest.sha1_hex(), "a9993e364706816aba3e25717850c26c9cd0d89d");
    }
}
