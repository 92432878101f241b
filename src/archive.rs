use std::fs;
use std::io::{self, Read};
use std::path::Path;

use flate2::read::GzDecoder;
use log::{debug, info, warn};
use sha2::{Digest, Sha256};
use tar::Archive;
use zip::read::ZipArchive;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArchiveKind {
    TarGz,
    Zip,
}

impl ArchiveKind {
    /// Pick the archive format from a release asset name.
    pub fn from_name(name: &str) -> Option<Self> {
        let lower = name.to_ascii_lowercase();
        if lower.ends_with(".zip") {
            Some(ArchiveKind::Zip)
        } else if lower.ends_with(".tar.gz") || lower.ends_with(".tgz") {
            Some(ArchiveKind::TarGz)
        } else {
            None
        }
    }
}

/// Expand `archive_path` into `dest`, replacing files that already exist there.
pub fn extract(archive_path: &Path, dest: &Path, kind: ArchiveKind) -> Result<(), String> {
    info!("archive: extracting {} as {:?}", archive_path.display(), kind);
    fs::create_dir_all(dest).map_err(|e| format!("unable to create {}: {e}", dest.display()))?;
    match kind {
        ArchiveKind::TarGz => extract_targz(archive_path, dest),
        ArchiveKind::Zip => extract_zip(archive_path, dest),
    }
}

fn extract_targz(archive_path: &Path, dest: &Path) -> Result<(), String> {
    let file = fs::File::open(archive_path).map_err(|e| format!("tar.gz open error: {e}"))?;
    let mut archive = Archive::new(GzDecoder::new(file));
    archive.set_overwrite(true);
    archive
        .unpack(dest)
        .map_err(|e| format!("tar.gz extract error: {e}"))
}

fn extract_zip(archive_path: &Path, dest: &Path) -> Result<(), String> {
    let file = fs::File::open(archive_path).map_err(|e| format!("zip open error: {e}"))?;
    let mut archive = ZipArchive::new(file).map_err(|e| format!("zip parse error: {e}"))?;

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|e| format!("zip entry error: {e}"))?;
        let Some(relative) = entry.enclosed_name() else {
            return Err(format!("zip entry escapes destination: {}", entry.name()));
        };
        let out_path = dest.join(relative);
        if entry.is_dir() {
            fs::create_dir_all(&out_path).map_err(|e| format!("zip dir create error: {e}"))?;
            continue;
        }
        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent).map_err(|e| format!("zip parent dir error: {e}"))?;
        }
        let mut out_file =
            fs::File::create(&out_path).map_err(|e| format!("zip create file error: {e}"))?;
        io::copy(&mut entry, &mut out_file).map_err(|e| format!("zip write error: {e}"))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Some(mode) = entry.unix_mode()
                && let Err(err) =
                    fs::set_permissions(&out_path, fs::Permissions::from_mode(mode & 0o777))
            {
                warn!(
                    "archive: could not set mode {:o} on {}: {err}",
                    mode & 0o777,
                    out_path.display()
                );
            }
        }
    }

    debug!("archive: wrote {} zip entries to {}", archive.len(), dest.display());
    Ok(())
}

/// Compare the SHA-256 of `path` against a hex digest.
pub fn verify_sha256(path: &Path, expected: &str) -> Result<(), String> {
    let mut file = fs::File::open(path).map_err(|e| format!("checksum open error: {e}"))?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 8192];
    loop {
        let read = file
            .read(&mut buf)
            .map_err(|e| format!("checksum read error: {e}"))?;
        if read == 0 {
            break;
        }
        hasher.update(&buf[..read]);
    }
    let actual = format!("{:x}", hasher.finalize());
    if actual != expected.to_lowercase() {
        return Err(format!(
            "checksum mismatch: expected {expected}, got {actual}"
        ));
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::{Cursor, Write};
    use zip::write::SimpleFileOptions;
    use zip::{CompressionMethod, ZipWriter};

    /// Build an in-memory zip from `(name, contents)` pairs.
    pub(crate) fn zip_bytes(files: &[(&str, &[u8])]) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .unix_permissions(0o755);
        for (name, contents) in files {
            writer.start_file(*name, options).unwrap();
            writer.write_all(contents).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn picks_kind_from_asset_name() {
        assert_eq!(ArchiveKind::from_name("DumpCsv.zip"), Some(ArchiveKind::Zip));
        assert_eq!(ArchiveKind::from_name("tool.TAR.GZ"), Some(ArchiveKind::TarGz));
        assert_eq!(ArchiveKind::from_name("tool.tgz"), Some(ArchiveKind::TarGz));
        assert_eq!(ArchiveKind::from_name("tool.exe"), None);
    }

    #[test]
    fn zip_extraction_overwrites_existing_files() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("a.zip");
        let dest = dir.path().join("out");
        fs::create_dir_all(&dest).unwrap();
        fs::write(dest.join("DumpCsv.exe"), b"old binary, longer than new").unwrap();
        fs::write(dest.join("keep.txt"), b"untouched").unwrap();
        fs::write(
            &archive,
            zip_bytes(&[("DumpCsv.exe", b"new"), ("lib/dep.dll", b"dep")]),
        )
        .unwrap();

        extract(&archive, &dest, ArchiveKind::Zip).unwrap();

        assert_eq!(fs::read(dest.join("DumpCsv.exe")).unwrap(), b"new");
        assert_eq!(fs::read(dest.join("lib").join("dep.dll")).unwrap(), b"dep");
        assert_eq!(fs::read(dest.join("keep.txt")).unwrap(), b"untouched");
    }

    #[cfg(unix)]
    #[test]
    fn zip_extraction_applies_stored_unix_mode() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("a.zip");
        let dest = dir.path().join("out");
        fs::write(&archive, zip_bytes(&[("DumpCsv", b"bin")])).unwrap();

        extract(&archive, &dest, ArchiveKind::Zip).unwrap();

        let mode = fs::metadata(dest.join("DumpCsv")).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
    }

    #[test]
    fn truncated_zip_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("a.zip");
        let bytes = zip_bytes(&[("x", b"y")]);
        fs::write(&archive, &bytes[..bytes.len() / 2]).unwrap();

        let err = extract(&archive, &dir.path().join("out"), ArchiveKind::Zip).unwrap_err();
        assert!(err.contains("zip parse error"));
    }

    #[test]
    fn targz_extraction_writes_entries() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("a.tar.gz");
        {
            let file = fs::File::create(&archive).unwrap();
            let encoder = flate2::write::GzEncoder::new(file, flate2::Compression::default());
            let mut builder = tar::Builder::new(encoder);
            let mut header = tar::Header::new_gnu();
            header.set_size(5);
            header.set_mode(0o644);
            header.set_cksum();
            builder
                .append_data(&mut header, "bin/tool", &b"hello"[..])
                .unwrap();
            builder.into_inner().unwrap().finish().unwrap();
        }

        let dest = dir.path().join("out");
        extract(&archive, &dest, ArchiveKind::TarGz).unwrap();
        assert_eq!(fs::read(dest.join("bin").join("tool")).unwrap(), b"hello");
    }

    #[test]
    fn verifies_sha256() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f");
        fs::write(&path, b"abc").unwrap();
        let expected = "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad";
        verify_sha256(&path, expected).unwrap();
        verify_sha256(&path, &expected.to_uppercase()).unwrap();
        assert!(verify_sha256(&path, "00").unwrap_err().contains("mismatch"));
    }
}
