use anyhow::{Context, Result};
use futures_util::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::io::{self, Write};
use std::path::Path;

/// Streams `url` into `local_path`, replacing whatever was there.
///
/// A transfer that fails midway removes the partial file before the error is
/// returned.
pub async fn download_file(client: &reqwest::Client, url: &str, local_path: &Path) -> Result<()> {
    tracing::info!("Downloading {} to {}", url, local_path.display());

    let result = stream_to_file(client, url, local_path).await;
    if result.is_err() && local_path.exists() {
        if let Err(e) = fs::remove_file(local_path) {
            tracing::warn!("Could not remove partial download {}: {}", local_path.display(), e);
        }
    }
    result
}

async fn stream_to_file(client: &reqwest::Client, url: &str, local_path: &Path) -> Result<()> {
    let response = client
        .get(url)
        .send()
        .await
        .with_context(|| format!("Failed to request {}", url))?
        .error_for_status()
        .with_context(|| format!("Download of {} was refused", url))?;
    let total_size = response.content_length().unwrap_or(0);

    let filename = local_path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let pb = ProgressBar::new(total_size);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{msg} {spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})")?
            .progress_chars("#>-"),
    );
    pb.set_message(format!("Downloading {}", filename));

    let mut file = fs::File::create(local_path)
        .with_context(|| format!("Could not create {}", local_path.display()))?;
    let mut downloaded = 0u64;
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.with_context(|| format!("Download of {} was interrupted", url))?;
        file.write_all(&chunk)?;
        downloaded += chunk.len() as u64;
        pb.set_position(downloaded);
    }
    file.flush()?;

    pb.finish_with_message("Download complete");
    tracing::debug!("Wrote {} bytes to {}", downloaded, local_path.display());
    Ok(())
}

/// Unpacks every entry of the zip at `archive_path` under `extract_dir`,
/// keeping the archive's own directory layout.
pub fn extract_archive(archive_path: &Path, extract_dir: &Path) -> Result<usize> {
    tracing::info!(
        "Extracting {} into {}",
        archive_path.display(),
        extract_dir.display()
    );

    let file = fs::File::open(archive_path)
        .with_context(|| format!("Failed to open archive {}", archive_path.display()))?;
    let mut archive = zip::ZipArchive::new(file)
        .with_context(|| format!("Failed to read zip archive {}", archive_path.display()))?;

    fs::create_dir_all(extract_dir)?;

    let mut extracted = 0;
    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .with_context(|| format!("Failed to read archive entry {}", i))?;

        let Some(relative_path) = entry.enclosed_name().map(Path::to_path_buf) else {
            tracing::warn!("Skipping unsafe path in zip: {}", entry.name());
            continue;
        };
        let outpath = extract_dir.join(relative_path);

        if entry.is_dir() {
            fs::create_dir_all(&outpath)?;
            continue;
        }

        if let Some(parent) = outpath.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut outfile = fs::File::create(&outpath)
            .with_context(|| format!("Failed to create {}", outpath.display()))?;
        io::copy(&mut entry, &mut outfile)
            .with_context(|| format!("Failed to extract {}", outpath.display()))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = entry.unix_mode().unwrap_or(0) & 0o777;
            if mode != 0 {
                fs::set_permissions(&outpath, fs::Permissions::from_mode(mode))?;
            }
        }

        extracted += 1;
    }

    tracing::debug!("Extracted {} files", extracted);
    Ok(extracted)
}
