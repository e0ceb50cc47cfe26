// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use bytes::Bytes;
use tracing::debug;
use url::Url;

use crate::error::ManifestError;
use crate::http::HttpClient;

/// A downloaded manifest together with the URL relative URIs resolve against
#[derive(Debug, Clone)]
pub struct Manifest {
    pub base_url: Url,
    pub body: Bytes,
}

/// Fetch a manifest over HTTP
pub async fn fetch_manifest<C: HttpClient + ?Sized>(
    client: &C,
    url: &str,
) -> Result<Manifest, ManifestError> {
    let base_url = Url::parse(url)?;

    debug!(%url, "fetching manifest");
    let body = client
        .get_bytes(url)
        .await
        .map_err(|e| ManifestError::FetchFailed {
            url: url.to_string(),
            source: e,
        })?;

    Ok(Manifest { base_url, body })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::HttpResponse;
    use async_trait::async_trait;

    struct MockHttpClient {
        body: &'static str,
    }

    #[async_trait]
    impl HttpClient for MockHttpClient {
        async fn get_bytes(&self, _url: &str) -> Result<Bytes, reqwest::Error> {
            Ok(Bytes::from_static(self.body.as_bytes()))
        }

        async fn get_stream(&self, _url: &str) -> Result<HttpResponse, reqwest::Error> {
            unimplemented!("manifests are fetched whole")
        }
    }

    #[tokio::test]
    async fn fetch_keeps_base_url() {
        let client = MockHttpClient { body: "#EXTM3U\n" };

        let manifest = fetch_manifest(&client, "https://cdn.example.com/a/b/master.m3u8")
            .await
            .unwrap();

        assert_eq!(manifest.body.as_ref(), b"#EXTM3U\n");
        assert_eq!(
            manifest.base_url.join("v.m3u8").unwrap().as_str(),
            "https://cdn.example.com/a/b/v.m3u8"
        );
    }

    #[tokio::test]
    async fn fetch_rejects_invalid_url() {
        let client = MockHttpClient { body: "" };

        let result = fetch_manifest(&client, "not a url").await;
        assert!(matches!(result, Err(ManifestError::InvalidUrl(_))));
    }
}
