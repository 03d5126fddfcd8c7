//! Single-member archive extraction

use std::fs::File;
use std::io;
use std::path::Path;

use flate2::read::GzDecoder;
use thiserror::Error;

/// Supported archive containers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    Zip,
    Tar,
    TarGz,
}

impl ArchiveFormat {
    /// Map an archive extension (with leading dot) to its format.
    pub fn from_ext(ext: &str) -> Option<Self> {
        match ext {
            ".zip" => Some(Self::Zip),
            ".tar" => Some(Self::Tar),
            ".tar.gz" | ".tgz" => Some(Self::TarGz),
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("archive member not found: {0}")]
    MemberMissing(String),

    #[error("invalid archive: {0}")]
    Format(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Stream the named member of the archive at `archive_path` into `output`.
/// Blocking; callers on the async runtime run this under `spawn_blocking`.
pub fn extract_member(
    archive_path: &Path,
    format: ArchiveFormat,
    member: &str,
    output: &mut File,
) -> Result<(), ExtractError> {
    match format {
        ArchiveFormat::Zip => extract_zip(archive_path, member, output),
        ArchiveFormat::Tar => {
            let input = File::open(archive_path)?;
            extract_tar(input, member, output)
        }
        ArchiveFormat::TarGz => {
            let input = GzDecoder::new(File::open(archive_path)?);
            extract_tar(input, member, output)
        }
    }
}

fn extract_zip(archive_path: &Path, member: &str, output: &mut File) -> Result<(), ExtractError> {
    let file = File::open(archive_path)?;
    let mut archive = zip::ZipArchive::new(file)
        .map_err(|error| ExtractError::Format(error.to_string()))?;
    let mut entry = match archive.by_name(member) {
        Ok(entry) => entry,
        Err(zip::result::ZipError::FileNotFound) => {
            return Err(ExtractError::MemberMissing(member.to_string()));
        }
        Err(error) => return Err(ExtractError::Format(error.to_string())),
    };
    io::copy(&mut entry, output)?;
    Ok(())
}

fn extract_tar(input: impl io::Read, member: &str, output: &mut File) -> Result<(), ExtractError> {
    let mut archive = tar::Archive::new(input);
    for entry in archive.entries()? {
        let mut entry = entry?;
        let path = entry.path()?;
        if path.to_string_lossy() == member {
            io::copy(&mut entry, output)?;
            return Ok(());
        }
    }
    Err(ExtractError::MemberMissing(member.to_string()))
}
