//! Zip archiver used by the log sweep

use std::fs::{self, File};
use std::io::{self, BufWriter};
use std::path::Path;

use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::BoxError;
use crate::traits::Archiver;

/// Archives a directory tree into a deflated zip file
///
/// Entries are stored relative to the archived directory, in file name
/// order, with `/` as separator.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZipArchiver;

impl Archiver for ZipArchiver {
    fn compress(&self, source: &Path, archive: &Path) -> Result<(), BoxError> {
        if let Some(parent) = archive.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut zip = ZipWriter::new(BufWriter::new(File::create(archive)?));
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        let mut entries = 0usize;
        for entry in WalkDir::new(source).sort_by_file_name() {
            let entry = entry?;
            let relative = entry.path().strip_prefix(source)?;
            if relative.as_os_str().is_empty() {
                continue;
            }

            let name = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");

            if entry.file_type().is_dir() {
                zip.add_directory(name, options)?;
            } else if entry.file_type().is_file() {
                zip.start_file(name, options)?;
                let mut file = File::open(entry.path())?;
                io::copy(&mut file, &mut zip)?;
                entries += 1;
            }
        }

        zip.finish()?;
        tracing::debug!(
            source = %source.display(),
            archive = %archive.display(),
            files = entries,
            "Compressed directory"
        );
        Ok(())
    }

    fn remove_tree(&self, dir: &Path) -> Result<(), BoxError> {
        fs::remove_dir_all(dir)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    fn entry_names(archive: &Path) -> Vec<String> {
        let file = File::open(archive).unwrap();
        let zip = zip::ZipArchive::new(file).unwrap();
        zip.file_names().map(str::to_string).collect()
    }

    #[test]
    fn test_compress_keeps_relative_layout() {
        let dir = tempfile::tempdir().unwrap();
        let logs = dir.path().join("logs");
        fs::create_dir_all(logs.join("geonames")).unwrap();
        fs::write(logs.join("geonames").join("2026-10-16-12-30-45.txt"), "a\nb\n").unwrap();
        fs::write(logs.join("server.log"), "started").unwrap();

        let archive = dir.path().join("logs-geonames.zip");
        ZipArchiver.compress(&logs, &archive).unwrap();

        let mut names = entry_names(&archive);
        names.sort();
        assert_eq!(
            names,
            vec![
                "geonames/",
                "geonames/2026-10-16-12-30-45.txt",
                "server.log",
            ]
        );

        let mut zip = zip::ZipArchive::new(File::open(&archive).unwrap()).unwrap();
        let mut contents = String::new();
        zip.by_name("geonames/2026-10-16-12-30-45.txt")
            .unwrap()
            .read_to_string(&mut contents)
            .unwrap();
        assert_eq!(contents, "a\nb\n");
    }

    #[test]
    fn test_compress_missing_source_fails() {
        let dir = tempfile::tempdir().unwrap();
        let result = ZipArchiver.compress(&dir.path().join("missing"), &dir.path().join("out.zip"));
        assert!(result.is_err());
    }

    #[test]
    fn test_remove_tree() {
        let dir = tempfile::tempdir().unwrap();
        let logs = dir.path().join("logs");
        fs::create_dir_all(logs.join("nested")).unwrap();
        fs::write(logs.join("nested").join("file.txt"), "x").unwrap();

        ZipArchiver.remove_tree(&logs).unwrap();
        assert!(!logs.exists());
    }
}
