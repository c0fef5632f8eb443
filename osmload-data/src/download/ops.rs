use std::path::{Path, PathBuf};

use log::{info, warn};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use url::Url;

use super::source::ExtractSource;
use super::{DownloadError, Transfer};

const EXTRACT_SUFFIX: &str = "-latest.osm.pbf";

/// Result of a completed download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadReport {
    /// URL the extract was fetched from.
    pub url: Url,
    /// Bytes written to disk.
    pub bytes_written: u64,
    /// File the extract was written to.
    pub output_path: PathBuf,
}

/// URL of the latest extract for `region` on `mirror`.
///
/// # Errors
/// Returns [`DownloadError::InvalidRegion`] for empty or relative segments
/// and [`DownloadError::InvalidUrl`] when the mirror is not a URL.
///
/// # Examples
/// ```
/// use osmload_data::download::extract_url;
///
/// let url = extract_url("https://download.geofabrik.de/", "/europe/monaco")?;
/// assert_eq!(url.as_str(), "https://download.geofabrik.de/europe/monaco-latest.osm.pbf");
/// # Ok::<(), osmload_data::download::DownloadError>(())
/// ```
pub fn extract_url(mirror: &str, region: &str) -> Result<Url, DownloadError> {
    let region = validate_region(region)?;
    let mirror = mirror.trim().trim_end_matches('/');
    Url::parse(&format!("{mirror}/{region}{EXTRACT_SUFFIX}")).map_err(|source| {
        DownloadError::InvalidUrl {
            mirror: mirror.to_owned(),
            source,
        }
    })
}

/// Local file name for the extract of `region`, such as `berlin-latest.osm.pbf`.
///
/// # Errors
/// Returns [`DownloadError::InvalidRegion`] like [`extract_url`].
pub fn extract_file_name(region: &str) -> Result<String, DownloadError> {
    let region = validate_region(region)?;
    let leaf = region.rsplit('/').next().unwrap_or(region);
    Ok(format!("{leaf}{EXTRACT_SUFFIX}"))
}

fn validate_region(region: &str) -> Result<&str, DownloadError> {
    let trimmed = region.trim().trim_matches('/');
    let valid = !trimmed.is_empty()
        && trimmed.split('/').all(|segment| {
            !segment.is_empty()
                && segment != "."
                && segment != ".."
                && segment
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        });
    if valid {
        Ok(trimmed)
    } else {
        Err(DownloadError::InvalidRegion {
            region: region.to_owned(),
        })
    }
}

/// Download the latest extract of `region` into `output_dir`.
///
/// The file is created exclusively unless `overwrite` is set. A failed or
/// short transfer removes the partial file.
///
/// # Errors
/// Returns [`DownloadError`] for invalid regions, filesystem failures,
/// transport failures and size mismatches.
///
/// # Examples
/// ```
/// use osmload_data::download::download_extract;
/// use osmload_data::test_support::StubExtractSource;
///
/// # let runtime = tokio::runtime::Builder::new_current_thread().build()?;
/// let temp = tempfile::tempdir()?;
/// let source = StubExtractSource::new(b"PBF".to_vec());
/// let report = runtime.block_on(download_extract(&source, "europe/monaco", temp.path(), false))?;
/// assert_eq!(report.bytes_written, 3);
/// assert!(report.output_path.ends_with("monaco-latest.osm.pbf"));
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub async fn download_extract<S: ExtractSource + ?Sized>(
    source: &S,
    region: &str,
    output_dir: &Path,
    overwrite: bool,
) -> Result<DownloadReport, DownloadError> {
    let url = extract_url(source.mirror(), region)?;
    let output_path = output_dir.join(extract_file_name(region)?);
    fs::create_dir_all(output_dir)
        .await
        .map_err(|source| DownloadError::CreateDir {
            source,
            path: output_dir.to_path_buf(),
        })?;

    let mut options = OpenOptions::new();
    options.write(true);
    if overwrite {
        options.create(true).truncate(true);
    } else {
        options.create_new(true);
    }
    let mut file = options
        .open(&output_path)
        .await
        .map_err(|source| DownloadError::WriteFile {
            source,
            path: output_path.clone(),
        })?;

    info!("downloading {url} to {}", output_path.display());
    let outcome = transfer(source, url.as_str(), &mut file, &output_path).await;
    drop(file);
    let bytes_written = match outcome {
        Ok(bytes) => bytes,
        Err(err) => {
            discard_partial(&output_path).await;
            return Err(err);
        }
    };
    info!("downloaded {bytes_written} bytes to {}", output_path.display());
    Ok(DownloadReport {
        url,
        bytes_written,
        output_path,
    })
}

async fn transfer<S: ExtractSource + ?Sized>(
    source: &S,
    url: &str,
    file: &mut fs::File,
    path: &Path,
) -> Result<u64, DownloadError> {
    let Transfer {
        bytes_written,
        expected_bytes,
    } = source
        .fetch_extract(url, file)
        .await
        .map_err(|source| DownloadError::Download { source })?;
    file.flush()
        .await
        .map_err(|source| DownloadError::WriteFile {
            source,
            path: path.to_path_buf(),
        })?;
    if let Some(expected) = expected_bytes
        && expected != bytes_written
    {
        return Err(DownloadError::SizeMismatch {
            expected,
            actual: bytes_written,
        });
    }
    Ok(bytes_written)
}

async fn discard_partial(path: &Path) {
    if let Err(err) = fs::remove_file(path).await {
        warn!("could not remove partial download {}: {err}", path.display());
    }
}
