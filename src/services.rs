use std::sync::Arc;

use crate::catalog::CatalogClient;
use crate::config::Config;
use crate::http::HttpClient;
use crate::manifest::ManifestUpgrader;
use crate::progress::SharedProgressReporter;
use crate::prompt::Prompter;
use crate::tools::{Decryptor, Tagger, Transcoder, find_program};

#[derive(Clone)]
pub struct Services {
    pub catalog: Arc<dyn CatalogClient>,
    pub http: Arc<dyn HttpClient>,
    pub decryptor: Arc<dyn Decryptor>,
    pub tagger: Arc<dyn Tagger>,
    pub transcoder: Arc<dyn Transcoder>,
    pub upgrader: Arc<dyn ManifestUpgrader>,
    pub prompter: Arc<dyn Prompter>,
    pub reporter: SharedProgressReporter,
    /// mp4decrypt and MP4Box are both installed
    pub video_toolchain: bool,
}

/// Whether the programs the music-video flow shells out to can be found
pub fn video_toolchain_present(config: &Config) -> bool {
    find_program(&config.mp4decrypt_path).is_some() && find_program(&config.mp4box_path).is_some()
}

#[cfg(test)]
pub(crate) mod tests {
    //! Recording collaborators shared by the pipeline, collection and batch tests.

    use super::*;
    use crate::catalog::{
        AlbumInfo, ArtistItem, ArtistRelation, PlaylistInfo, SearchHit, SearchKind, SongInfo,
        StationInfo,
    };
    use crate::error::{CatalogError, DecryptError, DeviceError, TagError, ToolError};
    use crate::http::{ByteStream, HttpResponse};
    use crate::progress::tests::RecordingReporter;
    use crate::state::Counter;
    use crate::track::MetadataRecord;
    use async_trait::async_trait;
    use bytes::Bytes;
    use std::collections::{HashMap, HashSet};
    use std::path::Path;
    use std::sync::Mutex;
    use url::Url;

    pub(crate) const LOSSLESS_MASTER: &str = "#EXTM3U
#EXT-X-STREAM-INF:BANDWIDTH=2000000,CODECS=\"alac\",AUDIO=\"audio-alac-stereo-44100-16\"
alac/44100.m3u8
#EXT-X-STREAM-INF:BANDWIDTH=256000,CODECS=\"mp4a.40.2\",AUDIO=\"audio-stereo-256\"
aac/256.m3u8
";

    pub(crate) const VIDEO_MASTER: &str = "#EXTM3U
#EXT-X-MEDIA:TYPE=AUDIO,GROUP-ID=\"audio-stereo-256\",NAME=\"Stereo\",URI=\"audio/stereo_gr256_x.m3u8\"
#EXT-X-STREAM-INF:BANDWIDTH=9000000,CODECS=\"avc1\",AUDIO=\"audio-stereo-256\"
video/avc_1920x1080_9000.m3u8
";

    /// Every collaborator call, in order
    #[derive(Default)]
    pub(crate) struct CallLog {
        calls: Mutex<Vec<String>>,
    }

    impl CallLog {
        pub fn push(&self, call: impl Into<String>) {
            self.calls.lock().unwrap().push(call.into());
        }

        pub fn take(&self) -> Vec<String> {
            std::mem::take(&mut *self.calls.lock().unwrap())
        }

        pub fn count(&self, prefix: &str) -> usize {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter(|call| call.starts_with(prefix))
                .count()
        }
    }

    fn not_found(kind: &'static str, id: &str) -> CatalogError {
        CatalogError::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    #[derive(Default)]
    pub(crate) struct MockCatalog {
        pub log: Arc<CallLog>,
        pub songs: HashMap<String, SongInfo>,
        pub albums: HashMap<String, AlbumInfo>,
        pub playlists: HashMap<String, PlaylistInfo>,
        pub stations: HashMap<String, StationInfo>,
        pub artist_items: Vec<ArtistItem>,
        pub hits: Vec<SearchHit>,
        pub lyrics: Option<String>,
    }

    #[async_trait]
    impl CatalogClient for MockCatalog {
        async fn song(&self, _storefront: &str, id: &str) -> Result<SongInfo, CatalogError> {
            self.log.push(format!("catalog.song {id}"));
            self.songs.get(id).cloned().ok_or_else(|| not_found("songs", id))
        }

        async fn album(&self, _storefront: &str, id: &str) -> Result<AlbumInfo, CatalogError> {
            self.log.push(format!("catalog.album {id}"));
            self.albums.get(id).cloned().ok_or_else(|| not_found("albums", id))
        }

        async fn playlist(&self, _storefront: &str, id: &str) -> Result<PlaylistInfo, CatalogError> {
            self.log.push(format!("catalog.playlist {id}"));
            self.playlists
                .get(id)
                .cloned()
                .ok_or_else(|| not_found("playlists", id))
        }

        async fn station(&self, _storefront: &str, id: &str) -> Result<StationInfo, CatalogError> {
            self.log.push(format!("catalog.station {id}"));
            self.stations
                .get(id)
                .cloned()
                .ok_or_else(|| not_found("stations", id))
        }

        async fn music_video(&self, _storefront: &str, id: &str) -> Result<SongInfo, CatalogError> {
            self.log.push(format!("catalog.music_video {id}"));
            self.songs
                .get(id)
                .cloned()
                .ok_or_else(|| not_found("music-videos", id))
        }

        async fn artist_name(&self, _storefront: &str, id: &str) -> Result<String, CatalogError> {
            self.log.push(format!("catalog.artist_name {id}"));
            Ok("Artist".to_string())
        }

        async fn artist_items(
            &self,
            _storefront: &str,
            id: &str,
            relation: ArtistRelation,
        ) -> Result<Vec<ArtistItem>, CatalogError> {
            self.log
                .push(format!("catalog.artist_items {id} {}", relation.path()));
            Ok(match relation {
                ArtistRelation::Albums => self.artist_items.clone(),
                ArtistRelation::MusicVideos => Vec::new(),
            })
        }

        async fn search(
            &self,
            _storefront: &str,
            _kind: SearchKind,
            query: &str,
        ) -> Result<Vec<SearchHit>, CatalogError> {
            self.log.push(format!("catalog.search {query}"));
            Ok(self.hits.clone())
        }

        async fn lyrics(&self, _storefront: &str, id: &str) -> Result<String, CatalogError> {
            self.log.push(format!("catalog.lyrics {id}"));
            self.lyrics.clone().ok_or_else(|| not_found("lyrics", id))
        }
    }

    /// Serves the lossless master for audio, the video master for `/mv/`
    /// URLs, and a few bytes of "image" for every stream
    pub(crate) struct MockHttp {
        pub log: Arc<CallLog>,
    }

    #[async_trait]
    impl HttpClient for MockHttp {
        async fn get_bytes(&self, url: &str) -> Result<Bytes, reqwest::Error> {
            self.log.push(format!("http.get {url}"));
            let body = if url.contains("/mv/") {
                VIDEO_MASTER
            } else {
                LOSSLESS_MASTER
            };
            Ok(Bytes::from_static(body.as_bytes()))
        }

        async fn get_stream(&self, url: &str) -> Result<HttpResponse, reqwest::Error> {
            self.log.push(format!("http.stream {url}"));
            let body: ByteStream = Box::pin(futures::stream::once(async {
                Ok(Bytes::from_static(b"image"))
            }));
            Ok(HttpResponse {
                status: 200,
                content_length: Some(5),
                body,
            })
        }
    }

    /// Writes a placeholder file for every successful fetch
    #[derive(Default)]
    pub(crate) struct MockDecryptor {
        pub log: Arc<CallLog>,
        /// Ids the helper reports as not offered
        pub unavailable: HashSet<String>,
        /// Ids that fail once, then succeed
        pub fail_once: Mutex<HashSet<String>>,
    }

    impl MockDecryptor {
        fn outcome(&self, id: &str, out: &Path) -> Result<(), DecryptError> {
            if self.unavailable.contains(id) {
                return Err(DecryptError::Unavailable);
            }
            if self.fail_once.lock().unwrap().remove(id) {
                return Err(DecryptError::Tool(ToolError::Failed {
                    program: "amdl-decrypt".to_string(),
                    status: "exit status: 1".to_string(),
                    code: Some(1),
                    stderr: "connection reset".to_string(),
                }));
            }
            std::fs::write(out, b"decrypted").unwrap();
            Ok(())
        }
    }

    #[async_trait]
    impl Decryptor for MockDecryptor {
        async fn fetch_and_decrypt(&self, id: &str, out: &Path) -> Result<(), DecryptError> {
            self.log.push(format!("decrypt.aac_lc {id}"));
            self.outcome(id, out)
        }

        async fn stream_decrypt(&self, id: &str, stream: &Url, out: &Path) -> Result<(), DecryptError> {
            self.log.push(format!("decrypt.stream {id} {stream}"));
            self.outcome(id, out)
        }

        async fn video_manifest(&self, id: &str) -> Result<String, DecryptError> {
            self.log.push(format!("decrypt.mv_manifest {id}"));
            Ok(format!("https://video.example.com/mv/{id}/master.m3u8"))
        }

        async fn decrypt_video_stream(
            &self,
            id: &str,
            stream: &Url,
            out: &Path,
        ) -> Result<(), DecryptError> {
            self.log.push(format!("decrypt.mv_stream {id} {stream}"));
            self.outcome(id, out)
        }
    }

    #[derive(Default)]
    pub(crate) struct MockTagger {
        pub log: Arc<CallLog>,
        pub records: Mutex<Vec<MetadataRecord>>,
    }

    #[async_trait]
    impl Tagger for MockTagger {
        async fn embed_tags(&self, path: &Path, tags: &str) -> Result<(), TagError> {
            self.log
                .push(format!("tagger.embed {} {tags}", path.display()));
            Ok(())
        }

        async fn mux_video(
            &self,
            _video: &Path,
            _audio: &Path,
            tags: &str,
            out: &Path,
        ) -> Result<(), TagError> {
            self.log.push(format!("tagger.mux {tags}"));
            std::fs::write(out, b"muxed").unwrap();
            Ok(())
        }

        async fn write_metadata(&self, path: &Path, record: &MetadataRecord) -> Result<(), TagError> {
            self.log
                .push(format!("tagger.metadata {}", path.display()));
            self.records.lock().unwrap().push(record.clone());
            Ok(())
        }
    }

    pub(crate) struct MockTranscoder {
        pub log: Arc<CallLog>,
    }

    #[async_trait]
    impl Transcoder for MockTranscoder {
        fn is_available(&self) -> bool {
            true
        }

        async fn transcode(
            &self,
            input: &Path,
            output: &Path,
            _format: crate::config::ConvertFormat,
            _extra_args: &str,
        ) -> Result<(), ToolError> {
            self.log
                .push(format!("ffmpeg.transcode {}", input.display()));
            std::fs::write(output, b"converted").unwrap();
            Ok(())
        }

        async fn copy_stream(&self, url: &str, output: &Path) -> Result<(), ToolError> {
            self.log.push(format!("ffmpeg.copy {url}"));
            std::fs::write(output, b"motion").unwrap();
            Ok(())
        }
    }

    pub(crate) struct MockUpgrader {
        pub log: Arc<CallLog>,
        pub reply: Option<String>,
    }

    #[async_trait]
    impl ManifestUpgrader for MockUpgrader {
        async fn upgrade(&self, id: &str) -> Result<Option<String>, DeviceError> {
            self.log.push(format!("device.upgrade {id}"));
            Ok(self.reply.clone())
        }
    }

    /// Answers every prompt from fixed choices
    #[derive(Default)]
    pub(crate) struct MockPrompter {
        pub log: Arc<CallLog>,
        /// 1-based ordinals returned for track selection
        pub tracks: Vec<usize>,
        /// Retry answers, consumed front to back; `false` once exhausted
        pub retries: Mutex<Vec<bool>>,
    }

    impl Prompter for MockPrompter {
        fn select_items(&self, title: &str, items: &[ArtistItem]) -> Vec<usize> {
            self.log.push(format!("prompt.items {title}"));
            (0..items.len()).collect()
        }

        fn select_tracks(&self, album_name: &str, _tracks: &[SongInfo]) -> Vec<usize> {
            self.log.push(format!("prompt.tracks {album_name}"));
            self.tracks.clone()
        }

        fn pick_search_hit(&self, hits: &[SearchHit]) -> Option<usize> {
            self.log.push("prompt.search");
            (!hits.is_empty()).then_some(0)
        }

        fn acknowledge_retry(&self, counter: &Counter) -> bool {
            self.log.push(format!("prompt.retry {}", counter.error));
            let mut retries = self.retries.lock().unwrap();
            if retries.is_empty() {
                false
            } else {
                retries.remove(0)
            }
        }
    }

    /// Mocks wired to one shared call log
    pub(crate) struct Harness {
        pub log: Arc<CallLog>,
        pub reporter: Arc<RecordingReporter>,
        pub tagger: Arc<MockTagger>,
        pub services: Services,
    }

    impl Harness {
        pub fn new(catalog: MockCatalog, decryptor: MockDecryptor, prompter: MockPrompter) -> Self {
            let log = Arc::new(CallLog::default());
            let reporter = Arc::new(RecordingReporter::default());
            let tagger = Arc::new(MockTagger {
                log: log.clone(),
                ..Default::default()
            });

            let services = Services {
                catalog: Arc::new(MockCatalog {
                    log: log.clone(),
                    ..catalog
                }),
                http: Arc::new(MockHttp { log: log.clone() }),
                decryptor: Arc::new(MockDecryptor {
                    log: log.clone(),
                    ..decryptor
                }),
                tagger: tagger.clone(),
                transcoder: Arc::new(MockTranscoder { log: log.clone() }),
                upgrader: Arc::new(MockUpgrader {
                    log: log.clone(),
                    reply: None,
                }),
                prompter: Arc::new(MockPrompter {
                    log: log.clone(),
                    ..prompter
                }),
                reporter: reporter.clone(),
                video_toolchain: true,
            };

            Self {
                log,
                reporter,
                tagger,
                services,
            }
        }
    }
}
