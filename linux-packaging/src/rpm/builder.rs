// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Assemble `.rpm` package files via `rpmbuild`. */

use {
    crate::{
        error::{PackageError, Result},
        manifest::PackageManifest,
        packager::Packager,
    },
    duct::cmd,
    log::warn,
    std::{
        collections::BTreeSet,
        fs::File,
        io::{BufRead, BufReader, Write},
        path::Path,
    },
};

/// A [Packager] producing `.rpm` packages through the system `rpmbuild`.
///
/// A temporary directory holding the canonical `rpmbuild` layout is
/// created per invocation. Manifest sources are staged into `SOURCES/`
/// under their destination-relative paths and a spec file is rendered
/// into `SPECS/`. The produced package is copied to the output writer and
/// the build area is deleted.
#[derive(Debug, Default)]
pub struct RpmPackager {}

impl Packager for RpmPackager {
    fn package(&self, manifest: &PackageManifest, writer: &mut dyn Write) -> Result<()> {
        let build_dir = tempfile::Builder::new()
            .prefix("linux-packaging-rpm")
            .tempdir()?;
        let topdir = build_dir.path();

        for name in ["BUILD", "RPMS", "SOURCES", "SPECS", "SRPMS", "tmp"] {
            std::fs::create_dir(topdir.join(name))?;
        }

        stage_sources(manifest, &topdir.join("SOURCES"))?;

        let spec_path = topdir.join("SPECS").join(format!("{}.spec", manifest.name));
        {
            let mut spec_file = File::create(&spec_path)?;
            write_spec(manifest, &mut spec_file)?;
        }

        let mut args = vec![
            "-bb".to_string(),
            "--define".to_string(),
            format!("_topdir {}", topdir.display()),
            "--define".to_string(),
            format!("_tmppath {}", topdir.join("tmp").display()),
        ];
        if !manifest.arch.is_empty() {
            args.push("--target".to_string());
            args.push(manifest.arch.clone());
        }
        args.push(spec_path.display().to_string());

        warn!("invoking rpmbuild with args: {:?}", &args);
        let command = cmd("rpmbuild", &args)
            .stderr_to_stdout()
            .unchecked()
            .reader()
            .map_err(PackageError::RpmbuildRun)?;
        {
            let reader = BufReader::new(&command);
            for line in reader.lines() {
                warn!("{}", line.map_err(PackageError::RpmbuildRun)?);
            }
        }

        let output = command
            .try_wait()
            .map_err(PackageError::RpmbuildRun)?
            .ok_or_else(|| {
                PackageError::RpmbuildRun(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    "rpmbuild did not report an exit status",
                ))
            })?;
        if !output.status.success() {
            return Err(PackageError::RpmbuildStatus(output.status));
        }

        let pattern = format!("{}/RPMS/**/*.rpm", topdir.display());
        let product = glob::glob(&pattern)?
            .next()
            .ok_or(PackageError::RpmbuildNoOutput)??;

        let mut file = File::open(product)?;
        std::io::copy(&mut file, writer)?;

        Ok(())
    }
}

/// Copy manifest sources into `SOURCES/` under destination-relative paths.
fn stage_sources(manifest: &PackageManifest, sources_dir: &Path) -> Result<()> {
    for placement in manifest.file_placements() {
        let dest_rel = placement.destination.strip_prefix('/').ok_or_else(|| {
            PackageError::DestinationNotAbsolute(placement.destination.to_string())
        })?;

        let metadata = std::fs::metadata(placement.source)
            .map_err(|e| PackageError::SourceFileIo(placement.source.to_string(), e))?;
        if metadata.is_dir() {
            return Err(PackageError::SourceIsDirectory(placement.source.to_string()));
        }

        let staged = sources_dir.join(dest_rel);
        if let Some(parent) = staged.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::copy(placement.source, &staged)
            .map_err(|e| PackageError::SourceFileIo(placement.source.to_string(), e))?;
    }

    Ok(())
}

/// Render the spec file describing the package to `rpmbuild`.
///
/// Tags with no value in the manifest are omitted. Relationship tags are
/// mapped to their RPM equivalents and emitted only when non-empty. The
/// `%install` section copies staged sources into the build root, so no
/// `%prep` or `%build` sections are needed.
fn write_spec(manifest: &PackageManifest, writer: &mut impl Write) -> Result<()> {
    writeln!(writer, "%define __spec_install_post %{{nil}}")?;
    writeln!(writer, "%define debug_package %{{nil}}")?;
    writeln!(writer, "%define _build_id_links none")?;
    writeln!(writer)?;

    writeln!(writer, "Name: {}", manifest.name)?;
    writeln!(writer, "Version: {}", manifest.version)?;
    writeln!(writer, "Release: 1")?;
    writeln!(
        writer,
        "Summary: {}",
        manifest.description.lines().next().unwrap_or_default()
    )?;
    writeln!(writer, "License: {}", manifest.license)?;

    for (tag, value) in [
        ("Group", &manifest.section),
        ("URL", &manifest.homepage),
        ("Vendor", &manifest.vendor),
        ("Packager", &manifest.maintainer),
    ] {
        if !value.is_empty() {
            writeln!(writer, "{}: {}", tag, value)?;
        }
    }

    writeln!(
        writer,
        "BuildRoot: %{{_tmppath}}/%{{name}}-%{{version}}-%{{release}}-root"
    )?;

    for (tag, values) in [
        ("Requires", &manifest.depends),
        ("Conflicts", &manifest.conflicts),
        ("Provides", &manifest.provides),
        ("Obsoletes", &manifest.replaces),
        ("Recommends", &manifest.recommends),
        ("Suggests", &manifest.suggests),
    ] {
        if !values.is_empty() {
            writeln!(writer, "{}: {}", tag, values.join(", "))?;
        }
    }

    writeln!(writer)?;
    writeln!(writer, "%description")?;
    writeln!(writer, "{}", manifest.description)?;

    writeln!(writer, "%install")?;
    writeln!(writer, "rm -rf %{{buildroot}}")?;

    let mut parents = BTreeSet::new();
    for placement in manifest.file_placements() {
        if let Some(parent) = Path::new(placement.destination).parent() {
            parents.insert(parent.display().to_string());
        }
    }
    for parent in parents {
        writeln!(writer, "mkdir -p \"%{{buildroot}}{}\"", parent)?;
    }

    for placement in manifest.file_placements() {
        let dest_rel = placement.destination.strip_prefix('/').ok_or_else(|| {
            PackageError::DestinationNotAbsolute(placement.destination.to_string())
        })?;

        writeln!(
            writer,
            "cp -a \"%{{_sourcedir}}/{}\" \"%{{buildroot}}{}\"",
            dest_rel, placement.destination
        )?;
    }

    writeln!(writer)?;
    writeln!(writer, "%clean")?;
    writeln!(writer, "rm -rf %{{buildroot}}")?;

    writeln!(writer)?;
    writeln!(writer, "%files")?;
    writeln!(writer, "%defattr(-,root,root,-)")?;
    for placement in manifest.file_placements() {
        if placement.is_config {
            writeln!(writer, "%config(noreplace) {}", placement.destination)?;
        } else {
            writeln!(writer, "{}", placement.destination)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_manifest(temp_dir: &Path) -> Result<PackageManifest> {
        let bin = temp_dir.join("app");
        std::fs::write(&bin, b"#!/bin/sh\nexit 0\n")?;
        let conf = temp_dir.join("app.conf");
        std::fs::write(&conf, b"setting = 1\n")?;

        let mut manifest = PackageManifest {
            name: "app".to_string(),
            version: "1.2.3".to_string(),
            description: "An app\nWith a longer description".to_string(),
            license: "MIT".to_string(),
            section: "default".to_string(),
            homepage: "https://example.com".to_string(),
            maintainer: "Me <me@example.com>".to_string(),
            depends: vec!["bash".to_string()],
            replaces: vec!["oldapp".to_string()],
            ..Default::default()
        };
        manifest
            .files
            .insert(bin.display().to_string(), "/usr/bin/app".to_string());
        manifest
            .config_files
            .insert(conf.display().to_string(), "/etc/app.conf".to_string());

        Ok(manifest)
    }

    fn rendered_spec(manifest: &PackageManifest) -> Result<String> {
        let mut buffer = vec![];
        write_spec(manifest, &mut buffer)?;

        Ok(String::from_utf8(buffer).unwrap())
    }

    #[test]
    fn spec_render() -> Result<()> {
        let temp_dir = tempfile::Builder::new()
            .prefix("linux-packaging-test")
            .tempdir()?;

        let spec = rendered_spec(&test_manifest(temp_dir.path())?)?;

        assert!(spec.contains("Name: app\n"));
        assert!(spec.contains("Version: 1.2.3\n"));
        assert!(spec.contains("Release: 1\n"));
        assert!(spec.contains("Summary: An app\n"));
        assert!(spec.contains("License: MIT\n"));
        assert!(spec.contains("Group: default\n"));
        assert!(spec.contains("URL: https://example.com\n"));
        assert!(spec.contains("Packager: Me <me@example.com>\n"));
        assert!(spec.contains("Requires: bash\n"));
        assert!(spec.contains("Obsoletes: oldapp\n"));
        assert!(spec.contains("%description\nAn app\nWith a longer description\n"));
        assert!(spec.contains("mkdir -p \"%{buildroot}/usr/bin\"\n"));
        assert!(spec.contains("cp -a \"%{_sourcedir}/usr/bin/app\" \"%{buildroot}/usr/bin/app\"\n"));
        assert!(spec.contains("cp -a \"%{_sourcedir}/etc/app.conf\" \"%{buildroot}/etc/app.conf\"\n"));
        assert!(spec.contains("%files\n%defattr(-,root,root,-)\n/usr/bin/app\n%config(noreplace) /etc/app.conf\n"));

        Ok(())
    }

    #[test]
    fn spec_render_omits_empty_tags() -> Result<()> {
        let manifest = PackageManifest {
            name: "bare".to_string(),
            version: "1.0.0".to_string(),
            ..Default::default()
        };

        let spec = rendered_spec(&manifest)?;

        assert!(!spec.contains("Group:"));
        assert!(!spec.contains("URL:"));
        assert!(!spec.contains("Vendor:"));
        assert!(!spec.contains("Packager:"));
        assert!(!spec.contains("Requires:"));
        assert!(!spec.contains("Obsoletes:"));

        Ok(())
    }

    #[test]
    fn staging_rejects_relative_destination() -> Result<()> {
        let temp_dir = tempfile::Builder::new()
            .prefix("linux-packaging-test")
            .tempdir()?;

        let source = temp_dir.path().join("a");
        std::fs::write(&source, b"a")?;

        let mut manifest = PackageManifest {
            name: "relative".to_string(),
            version: "1.0.0".to_string(),
            ..Default::default()
        };
        manifest
            .files
            .insert(source.display().to_string(), "usr/bin/a".to_string());

        let res = stage_sources(&manifest, &temp_dir.path().join("SOURCES"));
        assert!(matches!(res, Err(PackageError::DestinationNotAbsolute(_))));

        Ok(())
    }

    #[test]
    fn staging_places_sources_under_destination_paths() -> Result<()> {
        let temp_dir = tempfile::Builder::new()
            .prefix("linux-packaging-test")
            .tempdir()?;

        let manifest = test_manifest(temp_dir.path())?;

        let sources_dir = temp_dir.path().join("SOURCES");
        stage_sources(&manifest, &sources_dir)?;

        assert!(sources_dir.join("usr/bin/app").exists());
        assert!(sources_dir.join("etc/app.conf").exists());

        Ok(())
    }

    #[test]
    fn build_rpm_with_rpmbuild() -> Result<()> {
        if cmd("rpmbuild", vec!["--version"])
            .stderr_to_stdout()
            .stdout_capture()
            .run()
            .is_err()
        {
            eprintln!("rpmbuild not available; skipping test");
            return Ok(());
        }

        let temp_dir = tempfile::Builder::new()
            .prefix("linux-packaging-test")
            .tempdir()?;

        let manifest = test_manifest(temp_dir.path())?;

        let mut buffer = vec![];
        RpmPackager::default().package(&manifest, &mut buffer)?;

        // RPM lead magic.
        assert_eq!(&buffer[0..4], &[0xed, 0xab, 0xee, 0xdb]);

        Ok(())
    }
}
