// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::{Path, PathBuf};

use futures::StreamExt;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::config::{Config, CoverFormat};
use crate::error::ArtworkError;
use crate::http::HttpClient;

/// Size placeholder used by catalog artwork URL templates
const SIZE_PLACEHOLDER: &str = "{w}x{h}";

/// Turn an artwork URL template into a concrete URL for the configured size and format
pub fn cover_url(template: &str, config: &Config) -> String {
    let url = template.replace(SIZE_PLACEHOLDER, &config.cover_size);
    match config.cover_format {
        CoverFormat::Png => url.replace(".jpg", ".png"),
        CoverFormat::Jpg => url,
    }
}

/// Download artwork to `<dir>/<stem>.<cover-format>`.
///
/// Streams the response body to disk and returns the written path.
pub async fn download_artwork<C: HttpClient + ?Sized>(
    client: &C,
    template: &str,
    config: &Config,
    dir: &Path,
    stem: &str,
) -> Result<PathBuf, ArtworkError> {
    let url = cover_url(template, config);
    let output_path = dir.join(format!("{stem}.{}", config.cover_format.extension()));

    debug!(%url, path = %output_path.display(), "downloading artwork");
    let response = client
        .get_stream(&url)
        .await
        .map_err(|e| ArtworkError::HttpFailed {
            url: url.clone(),
            source: e,
        })?;

    if !response.is_success() {
        return Err(ArtworkError::HttpStatus {
            url,
            status: response.status,
        });
    }

    let mut file =
        File::create(&output_path)
            .await
            .map_err(|e| ArtworkError::FileCreateFailed {
                path: output_path.clone(),
                source: e,
            })?;

    let mut stream = response.body;
    while let Some(chunk_result) = stream.next().await {
        let chunk = chunk_result.map_err(|e| ArtworkError::StreamFailed {
            url: url.clone(),
            source: e,
        })?;

        file.write_all(&chunk)
            .await
            .map_err(|e| ArtworkError::FileWriteFailed {
                path: output_path.clone(),
                source: e,
            })?;
    }

    file.flush()
        .await
        .map_err(|e| ArtworkError::FileWriteFailed {
            path: output_path.clone(),
            source: e,
        })?;

    Ok(output_path)
}
