// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Error handling. */

use thiserror::Error;

/// Primary crate error type.
#[derive(Debug, Error)]
pub enum PackageError {
    #[error("I/O error: {0:?}")]
    Io(#[from] std::io::Error),

    #[error("PGP error: {0:?}")]
    Pgp(#[from] pgp::errors::Error),

    #[error("glob pattern error: {0:?}")]
    GlobPattern(#[from] glob::PatternError),

    #[error("glob iteration error: {0:?}")]
    Glob(#[from] glob::GlobError),

    #[error("no packager registered for format: {0}")]
    UnknownFormat(String),

    #[error("destination path is not absolute: {0}")]
    DestinationNotAbsolute(String),

    #[error("source path is a directory: {0}")]
    SourceIsDirectory(String),

    #[error("I/O error reading source file {0}: {1:?}")]
    SourceFileIo(String, std::io::Error),

    #[error("I/O error writing container member {0}: {1:?}")]
    ContainerMemberWrite(String, std::io::Error),

    #[error("signing key defines no user id")]
    SigningKeyNoIdentity,

    #[error("error running rpmbuild: {0:?}")]
    RpmbuildRun(std::io::Error),

    #[error("rpmbuild exited with {0}")]
    RpmbuildStatus(std::process::ExitStatus),

    #[error("rpmbuild did not produce a package file")]
    RpmbuildNoOutput,
}

/// Result wrapper for this crate.
pub type Result<T> = std::result::Result<T, PackageError>;
