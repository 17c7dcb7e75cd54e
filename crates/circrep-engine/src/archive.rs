//! Zip archives of a job's working directory.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDateTime, TimeZone};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::ArchiveError;
use crate::state::JobId;

const ARCHIVE_PREFIX: &str = "customer_reports";
const STAMP_FORMAT: &str = "%Y%m%d%H%M%S";
const FALLBACK_DOWNLOAD_NAME: &str = "Customer Report by Hour.zip";

/// `customer_reports_<job_id>_<YYYYmmddHHMMSS>.zip`
#[must_use]
pub fn archive_file_name<Tz: TimeZone>(job_id: JobId, at: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!("{ARCHIVE_PREFIX}_{job_id}_{}.zip", at.format(STAMP_FORMAT))
}

/// Name offered to the browser: `CustomerReport(Hourly)_<YYYY-mm-dd>.zip`,
/// dated from the archive's own timestamp suffix.
#[must_use]
pub fn download_name(archive_path: &Path) -> String {
    let stamp = archive_path
        .file_stem()
        .and_then(|s| s.to_str())
        .and_then(|stem| stem.rsplit_once('_'))
        .map(|(_, stamp)| stamp)
        .filter(|stamp| stamp.len() == 14);

    match stamp.and_then(|s| NaiveDateTime::parse_from_str(s, STAMP_FORMAT).ok()) {
        Some(at) => format!("CustomerReport(Hourly)_{}.zip", at.format("%Y-%m-%d")),
        None => FALLBACK_DOWNLOAD_NAME.to_string(),
    }
}

/// Zips every file under `source_dir` into `dest_zip`, storing paths relative
/// to `source_dir` with `/` separators.
///
/// # Errors
///
/// Returns [`ArchiveError::MissingSource`] if `source_dir` is not a directory,
/// or an I/O, walk or zip error if writing fails.
pub fn archive_directory(source_dir: &Path, dest_zip: &Path) -> Result<PathBuf, ArchiveError> {
    if !source_dir.is_dir() {
        return Err(ArchiveError::MissingSource(source_dir.to_path_buf()));
    }
    if let Some(parent) = dest_zip.parent() {
        std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
    }

    let file = File::create(dest_zip).map_err(|e| io_err(dest_zip, e))?;
    let mut zip = ZipWriter::new(BufWriter::new(file));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    let mut entries = 0usize;
    for entry in WalkDir::new(source_dir).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let Ok(relative) = path.strip_prefix(source_dir) else {
            continue;
        };
        let name = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        zip.start_file(name, options)?;
        let mut input = File::open(path).map_err(|e| io_err(path, e))?;
        std::io::copy(&mut input, &mut zip).map_err(|e| io_err(path, e))?;
        entries += 1;
    }

    let mut out = zip.finish()?;
    out.flush().map_err(|e| io_err(dest_zip, e))?;
    tracing::debug!(
        source = %source_dir.display(),
        archive = %dest_zip.display(),
        entries,
        "archived working directory"
    );
    Ok(dest_zip.to_path_buf())
}

fn io_err(path: &Path, source: std::io::Error) -> ArchiveError {
    ArchiveError::Io {
        path: path.to_path_buf(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use super::*;

    #[test]
    fn archive_name_embeds_job_and_stamp() {
        let id = Uuid::nil();
        let at = Utc.with_ymd_and_hms(2024, 3, 5, 7, 8, 9).unwrap();
        assert_eq!(
            archive_file_name(id, &at),
            "customer_reports_00000000-0000-0000-0000-000000000000_20240305070809.zip"
        );
    }

    #[test]
    fn download_name_uses_archive_date() {
        let path = Path::new("/tmp/customer_reports_abc_20240305070809.zip");
        assert_eq!(download_name(path), "CustomerReport(Hourly)_2024-03-05.zip");
    }

    #[test]
    fn download_name_falls_back() {
        assert_eq!(download_name(Path::new("/tmp/other.zip")), FALLBACK_DOWNLOAD_NAME);
        assert_eq!(
            download_name(Path::new("/tmp/customer_reports_abc_20241399999999.zip")),
            FALLBACK_DOWNLOAD_NAME
        );
    }

    #[test]
    fn archives_nested_files_with_relative_names() {
        let src = tempfile::tempdir().unwrap();
        let nested = src.path().join("CSV").join("กระทรวง").join("Office");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(nested.join("node.csv"), "a,b\n").unwrap();
        std::fs::create_dir_all(src.path().join("PDF")).unwrap();
        std::fs::write(src.path().join("PDF").join("node.pdf"), b"%PDF-1.3").unwrap();

        let out = tempfile::tempdir().unwrap();
        let dest = out.path().join("bundle.zip");
        let written = archive_directory(src.path(), &dest).unwrap();
        assert_eq!(written, dest);

        let mut archive = zip::ZipArchive::new(File::open(&dest).unwrap()).unwrap();
        let mut names: Vec<String> = (0..archive.len())
            .map(|i| archive.by_index(i).unwrap().name().to_string())
            .collect();
        names.sort();
        assert_eq!(names, vec!["CSV/กระทรวง/Office/node.csv", "PDF/node.pdf"]);
    }

    #[test]
    fn missing_source_is_an_error() {
        let out = tempfile::tempdir().unwrap();
        let err = archive_directory(&out.path().join("gone"), &out.path().join("x.zip"))
            .unwrap_err();
        assert!(matches!(err, ArchiveError::MissingSource(_)));
    }
}
