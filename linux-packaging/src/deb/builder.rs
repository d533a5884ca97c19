// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Assemble `.deb` package files.

The outer container is an `ar` archive with members in a fixed order:
`debian-binary`, `control.tar`, `data.tar`, and an optional `_gpgorigin`
holding a detached archive signature. Member digests are captured as the
container is written so the signature covers exactly the bytes emitted.
*/

use {
    crate::{
        control::ControlParagraph,
        deb::signer::DebSigner,
        error::{PackageError, Result},
        io::{Compression, FileChecksum, MemberDigest, MultiDigester},
        manifest::PackageManifest,
        packager::Packager,
    },
    digest::Digest,
    md5::Md5,
    std::{
        collections::BTreeSet,
        fs::File,
        io::{Cursor, Read, Write},
        time::SystemTime,
    },
};

/// A [Packager] producing Debian `.deb` packages.
pub struct DebPackager {
    compression: Compression,
}

impl Default for DebPackager {
    fn default() -> Self {
        Self {
            compression: Compression::Gzip,
        }
    }
}

impl DebPackager {
    /// Obtain an instance using a specific compression for tar members.
    pub fn new(compression: Compression) -> Self {
        Self { compression }
    }
}

impl Packager for DebPackager {
    fn package(&self, manifest: &PackageManifest, mut writer: &mut dyn Write) -> Result<()> {
        DebPackageBuilder::new(manifest)
            .set_compression(self.compression)
            .write(&mut writer)
    }
}

/// Build a `.deb` package file from a package manifest.
///
/// Instances are constructed from a [PackageManifest] describing the
/// package metadata and the files to install. Calling [Self::write] emits
/// a complete `.deb` file.
pub struct DebPackageBuilder<'a> {
    manifest: &'a PackageManifest,
    compression: Compression,
    mtime: Option<SystemTime>,
}

impl<'a> DebPackageBuilder<'a> {
    /// Construct a builder from a package manifest.
    pub fn new(manifest: &'a PackageManifest) -> Self {
        Self {
            manifest,
            compression: Compression::Gzip,
            mtime: None,
        }
    }

    /// Set the compression to apply to the `control.tar` and `data.tar` members.
    ///
    /// Not all compression formats are supported by all versions of dpkg.
    /// Gzip is the most portable and is the default.
    pub fn set_compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }

    /// Set the modified time to use on archive members.
    ///
    /// If set, all archive members will use the specified time, helping to
    /// make archive content deterministic.
    ///
    /// If not set, the current time will be used.
    pub fn set_mtime(mut self, time: Option<SystemTime>) -> Self {
        self.mtime = time;
        self
    }

    fn mtime(&self) -> u64 {
        self.mtime
            .unwrap_or_else(SystemTime::now)
            .duration_since(SystemTime::UNIX_EPOCH)
            .expect("times before UNIX epoch not accepted")
            .as_secs()
    }

    /// Write `.deb` file content to a writer.
    pub fn write<W: Write>(&self, writer: &mut W) -> Result<()> {
        let mtime = self.mtime();

        let data_archive = build_data_archive(self.manifest, mtime)?;
        let control_tar = build_control_archive(
            self.manifest,
            &data_archive.checksums,
            data_archive.installed_size,
            mtime,
        )?;

        let control_tar = self.compression.compress(&mut Cursor::new(control_tar))?;
        let data_tar = self
            .compression
            .compress(&mut Cursor::new(data_archive.tar_data))?;

        let mut ar_builder = ar::Builder::new(writer);
        let mut digests = vec![];

        // First member is a debian-binary file with static content.
        digests.push(append_digested_member(
            &mut ar_builder,
            "debian-binary",
            b"2.0\n",
            mtime,
        )?);

        // Second member is the control.tar with package metadata.
        digests.push(append_digested_member(
            &mut ar_builder,
            &format!("control.tar{}", self.compression.extension()),
            &control_tar,
            mtime,
        )?);

        // Third member is the data.tar with file content.
        digests.push(append_digested_member(
            &mut ar_builder,
            &format!("data.tar{}", self.compression.extension()),
            &data_tar,
            mtime,
        )?);

        // A `_gpgorigin` member is appended when the manifest configures a
        // signing key.
        if let Some(signature) = DebSigner::from_manifest(self.manifest).sign(&digests)? {
            append_container_member(&mut ar_builder, "_gpgorigin", signature.as_bytes(), mtime)?;
        }

        Ok(())
    }
}

/// The `data.tar` archive for a package plus metadata collected while
/// writing it.
struct DataArchive {
    /// Uncompressed tar data.
    tar_data: Vec<u8>,
    /// Checksums of file entries, in archive order.
    checksums: Vec<FileChecksum>,
    /// Sum of installed file sizes in bytes.
    installed_size: u64,
}

/// Build the `data.tar` archive from a manifest's file placements.
///
/// Placements are visited in the order defined by
/// [PackageManifest::file_placements]. Before each file entry, directory
/// entries for not-yet-seen ancestors are emitted nearest the root first.
fn build_data_archive(manifest: &PackageManifest, mtime: u64) -> Result<DataArchive> {
    let mut builder = tar::Builder::new(Vec::new());
    let mut seen_directories = BTreeSet::new();
    let mut checksums = vec![];
    let mut installed_size = 0;

    for placement in manifest.file_placements() {
        let dest_rel = placement.destination.strip_prefix('/').ok_or_else(|| {
            PackageError::DestinationNotAbsolute(placement.destination.to_string())
        })?;

        append_ancestor_directories(&mut builder, dest_rel, mtime, &mut seen_directories)?;

        let checksum = append_source_file(&mut builder, placement.source, dest_rel, mtime)?;
        installed_size += checksum.size;
        checksums.push(checksum);
    }

    let tar_data = builder.into_inner()?;

    Ok(DataArchive {
        tar_data,
        checksums,
        installed_size,
    })
}

/// Append directory entries for all unseen ancestors of an archive path.
///
/// `seen` records directories already in the archive so each is emitted
/// exactly once across the whole archive.
fn append_ancestor_directories(
    builder: &mut tar::Builder<impl Write>,
    dest_rel: &str,
    mtime: u64,
    seen: &mut BTreeSet<String>,
) -> Result<()> {
    let mut ancestor = String::new();

    let mut components = dest_rel.split('/').peekable();
    while let Some(component) = components.next() {
        // The final component is the file itself.
        if components.peek().is_none() {
            break;
        }

        if !ancestor.is_empty() {
            ancestor.push('/');
        }
        ancestor.push_str(component);

        if seen.contains(&ancestor) {
            continue;
        }

        let mut header = new_tar_header(mtime)?;
        header.set_entry_type(tar::EntryType::Directory);
        header.set_mode(0o755);
        header.set_size(0);
        builder.append_data(&mut header, format!("{}/", ancestor), std::io::empty())?;

        seen.insert(ancestor.clone());
    }

    Ok(())
}

/// Append a regular file entry whose content comes from a source file on
/// the filesystem.
///
/// Content is read in chunks so its MD5 digest and size are computed in
/// the same pass that buffers it for the archive.
fn append_source_file(
    builder: &mut tar::Builder<impl Write>,
    source: &str,
    dest_rel: &str,
    mtime: u64,
) -> Result<FileChecksum> {
    let mut file =
        File::open(source).map_err(|e| PackageError::SourceFileIo(source.to_string(), e))?;
    let metadata = file
        .metadata()
        .map_err(|e| PackageError::SourceFileIo(source.to_string(), e))?;

    if metadata.is_dir() {
        return Err(PackageError::SourceIsDirectory(source.to_string()));
    }

    let mut context = Md5::new();
    let mut data = Vec::with_capacity(metadata.len() as usize);
    let mut buffer = [0; 32768];

    loop {
        let read = file
            .read(&mut buffer)
            .map_err(|e| PackageError::SourceFileIo(source.to_string(), e))?;
        if read == 0 {
            break;
        }

        context.update(&buffer[0..read]);
        data.extend_from_slice(&buffer[0..read]);
    }

    let mut header = new_tar_header(mtime)?;
    header.set_entry_type(tar::EntryType::Regular);
    header.set_mode(source_file_mode(&metadata));
    header.set_size(data.len() as u64);
    builder.append_data(&mut header, dest_rel, data.as_slice())?;

    Ok(FileChecksum {
        path: dest_rel.to_string(),
        md5: context.finalize().to_vec(),
        size: data.len() as u64,
    })
}

#[cfg(unix)]
fn source_file_mode(metadata: &std::fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;

    metadata.permissions().mode() & 0o7777
}

#[cfg(not(unix))]
fn source_file_mode(_metadata: &std::fs::Metadata) -> u32 {
    0o644
}

fn new_tar_header(mtime: u64) -> Result<tar::Header> {
    let mut header = tar::Header::new_gnu();
    header.set_uid(0);
    header.set_gid(0);
    header.set_username("root")?;
    header.set_groupname("root")?;
    header.set_mtime(mtime);

    Ok(header)
}

/// Build the `control.tar` archive holding package metadata.
fn build_control_archive(
    manifest: &PackageManifest,
    checksums: &[FileChecksum],
    installed_size: u64,
    mtime: u64,
) -> Result<Vec<u8>> {
    let mut builder = tar::Builder::new(Vec::new());

    let mut control = vec![];
    control_paragraph(manifest, installed_size).write(&mut control)?;

    append_control_member(&mut builder, "control", &control, mtime)?;
    append_control_member(&mut builder, "md5sums", &md5sums_content(checksums), mtime)?;
    append_control_member(&mut builder, "conffiles", &conffiles_content(manifest), mtime)?;

    Ok(builder.into_inner()?)
}

fn append_control_member(
    builder: &mut tar::Builder<impl Write>,
    name: &str,
    content: &[u8],
    mtime: u64,
) -> Result<()> {
    let mut header = new_tar_header(mtime)?;
    header.set_entry_type(tar::EntryType::Regular);
    header.set_mode(0o644);
    header.set_size(content.len() as u64);
    builder.append_data(&mut header, name, content)?;

    Ok(())
}

/// Derive the `control` file paragraph for a package.
///
/// Fields are emitted in a fixed order. Relationship fields are omitted
/// when their value lists are empty.
fn control_paragraph(manifest: &PackageManifest, installed_size: u64) -> ControlParagraph<'_> {
    let mut para = ControlParagraph::default();

    para.set_field_from_string("Package".into(), manifest.name.as_str().into());
    para.set_field_from_string("Version".into(), manifest.version.as_str().into());
    para.set_field_from_string("Section".into(), manifest.section.as_str().into());
    para.set_field_from_string("Priority".into(), manifest.priority.as_str().into());
    para.set_field_from_string("Architecture".into(), manifest.arch.as_str().into());
    para.set_field_from_string("Maintainer".into(), manifest.maintainer.as_str().into());
    para.set_field_from_string("Vendor".into(), manifest.vendor.as_str().into());
    para.set_field_from_string(
        "Installed-Size".into(),
        (installed_size / 1024).to_string().into(),
    );

    for (name, values) in [
        ("Replaces", &manifest.replaces),
        ("Provides", &manifest.provides),
        ("Depends", &manifest.depends),
        ("Recommends", &manifest.recommends),
        ("Suggests", &manifest.suggests),
        ("Conflicts", &manifest.conflicts),
    ] {
        if !values.is_empty() {
            para.set_field_from_string(name.into(), join_relations(values).into());
        }
    }

    para.set_field_from_string("Homepage".into(), manifest.homepage.as_str().into());
    para.set_field_from_string("Description".into(), manifest.description.as_str().into());

    para
}

fn join_relations(values: &[String]) -> String {
    values.join(", ").trim_matches(' ').to_string()
}

/// Derive the content of the `md5sums` control member.
///
/// Each line holds the lowercase hex MD5 digest and the archive-relative
/// path of a file entry, separated by two spaces.
fn md5sums_content(checksums: &[FileChecksum]) -> Vec<u8> {
    let mut content = vec![];

    for checksum in checksums {
        content.extend_from_slice(checksum.md5_hex().as_bytes());
        content.extend_from_slice(b"  ");
        content.extend_from_slice(checksum.path.as_bytes());
        content.extend_from_slice(b"\n");
    }

    content
}

/// Derive the content of the `conffiles` control member.
///
/// Lists the absolute destination of every config file, one per line. The
/// member is empty when the manifest declares no config files.
fn conffiles_content(manifest: &PackageManifest) -> Vec<u8> {
    let mut content = vec![];

    for destination in manifest.config_file_destinations() {
        content.extend_from_slice(destination.as_bytes());
        content.extend_from_slice(b"\n");
    }

    content
}

/// Append a member to the outer `ar` container.
fn append_container_member<W: Write>(
    ar_builder: &mut ar::Builder<W>,
    name: &str,
    data: &[u8],
    mtime: u64,
) -> Result<()> {
    let mut header = ar::Header::new(name.as_bytes().to_vec(), data.len() as u64);
    header.set_mode(0o644);
    header.set_mtime(mtime);
    header.set_uid(0);
    header.set_gid(0);
    ar_builder
        .append(&header, data)
        .map_err(|e| PackageError::ContainerMemberWrite(name.to_string(), e))
}

/// Append a container member, digesting the written bytes so the member can
/// be listed in a signature manifest.
fn append_digested_member<W: Write>(
    ar_builder: &mut ar::Builder<W>,
    name: &str,
    data: &[u8],
    mtime: u64,
) -> Result<MemberDigest> {
    append_container_member(ar_builder, name, data, mtime)?;

    let mut digester = MultiDigester::default();
    digester.update(data);

    Ok(digester.finish(name))
}
