// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use tracing::{debug, info, warn};

use crate::catalog::{ArtistRelation, ItemKind, SearchKind};
use crate::collection::CollectionOrchestrator;
use crate::config::Settings;
use crate::error::CatalogError;
use crate::link::CatalogLink;
use crate::progress::{ProgressEvent, SkipReason};
use crate::services::Services;
use crate::state::{Counter, Outcome, RunState};
use crate::track::naming::artist_folder;
use crate::track::{Origin, Track, TrackPipeline};

/// Result of a batch run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchReport {
    /// Number of passes over the queue, including retries
    pub passes: usize,
    /// Tally of the last pass
    pub counter: Counter,
}

/// Drives a queue of catalog links until a pass ends without errors or the
/// operator stops retrying
pub struct BatchRunner<'a> {
    settings: &'a Settings,
    services: &'a Services,
}

impl<'a> BatchRunner<'a> {
    pub fn new(settings: &'a Settings, services: &'a Services) -> Self {
        Self { settings, services }
    }

    /// Download every link in `urls`
    ///
    /// This is the main entry point for the library. It:
    /// 1. Expands artist links into album and music video links, once
    /// 2. Runs one pass over the expanded queue
    /// 3. Reports the pass summary
    /// 4. When the pass had errors and the operator agrees, resets the counter
    ///    and runs the same queue again; remembered tracks are not refetched
    pub async fn run(&self, urls: &[String]) -> BatchReport {
        let queue = self.expand_artists(urls).await;
        let mut state = RunState::new();
        let mut pass = 1;

        loop {
            info!(pass, queued = queue.len(), "starting pass");
            self.run_pass(&queue, &mut state).await;

            self.services.reporter.report(ProgressEvent::PassCompleted {
                pass,
                counter: state.counter,
            });

            if state.counter.error == 0
                || !self.services.prompter.acknowledge_retry(&state.counter)
            {
                break;
            }

            state.counter.reset();
            pass += 1;
            self.services
                .reporter
                .report(ProgressEvent::RetryScheduled { pass });
        }

        BatchReport {
            passes: pass,
            counter: state.counter,
        }
    }

    /// Search the catalog and let the operator pick one hit. Returns its link.
    pub async fn search(
        &self,
        kind: SearchKind,
        query: &str,
    ) -> Result<Option<String>, CatalogError> {
        let storefront = &self.settings.config.storefront;
        let hits = self.services.catalog.search(storefront, kind, query).await?;
        debug!(%query, hits = hits.len(), "search finished");

        if hits.is_empty() {
            self.services.reporter.report(ProgressEvent::Notice {
                message: format!("No results for \"{query}\""),
            });
            return Ok(None);
        }

        Ok(self
            .services
            .prompter
            .pick_search_hit(&hits)
            .and_then(|index| hits.get(index))
            .map(|hit| hit.url.clone()))
    }

    async fn expand_artists(&self, urls: &[String]) -> Vec<String> {
        let mut queue = Vec::with_capacity(urls.len());

        for url in urls {
            let CatalogLink::Artist { storefront, id } = CatalogLink::parse(url) else {
                queue.push(url.clone());
                continue;
            };

            let name = match self.services.catalog.artist_name(&storefront, &id).await {
                Ok(name) => name,
                Err(e) => {
                    warn!(%id, error = %e, "artist lookup failed");
                    self.services.reporter.report(ProgressEvent::Notice {
                        message: format!("Failed to get artist {id}: {e}"),
                    });
                    continue;
                }
            };

            for relation in [ArtistRelation::Albums, ArtistRelation::MusicVideos] {
                let items = match self
                    .services
                    .catalog
                    .artist_items(&storefront, &id, relation)
                    .await
                {
                    Ok(items) => items,
                    Err(e) => {
                        warn!(%id, relation = relation.path(), error = %e, "artist listing failed");
                        continue;
                    }
                };
                if items.is_empty() {
                    continue;
                }

                let picked = if relation == ArtistRelation::Albums && self.settings.all_albums {
                    (0..items.len()).collect()
                } else {
                    let title = format!("{name}: {}", relation.path());
                    self.services.prompter.select_items(&title, &items)
                };
                queue.extend(
                    picked
                        .into_iter()
                        .filter_map(|index| items.get(index))
                        .map(|item| item.url.clone()),
                );
            }
        }

        queue
    }

    async fn run_pass(&self, queue: &[String], state: &mut RunState) {
        let collections = CollectionOrchestrator::new(self.settings, self.services);

        for (index, url) in queue.iter().enumerate() {
            let link = CatalogLink::parse(url);
            self.services.reporter.report(ProgressEvent::QueueItem {
                position: index + 1,
                total: queue.len(),
                url: url.clone(),
                kind: link.kind(),
            });

            match link {
                CatalogLink::Album {
                    storefront,
                    id,
                    song,
                } => {
                    collections
                        .album(&storefront, &id, song.as_deref(), state)
                        .await
                }
                CatalogLink::Song { storefront, id } => {
                    self.song(&collections, &storefront, &id, state).await
                }
                CatalogLink::Playlist { storefront, id } => {
                    collections.playlist(&storefront, &id, state).await
                }
                CatalogLink::Station { storefront, id } => {
                    if self.settings.config.has_media_user_token() {
                        collections.station(&storefront, &id, state).await
                    } else {
                        self.services.reporter.report(ProgressEvent::Notice {
                            message: "media-user-token is not set, skipping station".to_string(),
                        });
                    }
                }
                CatalogLink::MusicVideo { storefront, id } => {
                    if !self.settings.debug {
                        self.music_video(&storefront, &id, state).await
                    }
                }
                // Expanded before the first pass
                CatalogLink::Artist { .. } => debug!(%url, "artist link left in queue"),
                CatalogLink::Invalid => self
                    .services
                    .reporter
                    .report(ProgressEvent::InvalidLink { url: url.clone() }),
            }
        }
    }

    /// A song link is downloaded as the single matching track of its album
    async fn song(
        &self,
        collections: &CollectionOrchestrator<'_>,
        storefront: &str,
        id: &str,
        state: &mut RunState,
    ) {
        let album_id = match self.services.catalog.song(storefront, id).await {
            Ok(song) => song.album_id,
            Err(e) => {
                warn!(%id, error = %e, "song lookup failed");
                self.services.reporter.report(ProgressEvent::Notice {
                    message: format!("Failed to get song {id}: {e}"),
                });
                state.counter.tally(Outcome::Error);
                return;
            }
        };

        match album_id {
            Some(album_id) => collections.album(storefront, &album_id, Some(id), state).await,
            None => {
                self.services.reporter.report(ProgressEvent::Notice {
                    message: format!("Song {id} has no album"),
                });
                state.counter.tally(Outcome::Error);
            }
        }
    }

    async fn music_video(&self, storefront: &str, id: &str, state: &mut RunState) {
        if state.memo.contains(id, 1) {
            state.counter.tally(Outcome::Success);
            self.services.reporter.report(ProgressEvent::TrackSkipped {
                ordinal: 1,
                total: 1,
                name: id.to_string(),
                reason: SkipReason::Remembered,
            });
            return;
        }

        let mut video = match self.services.catalog.music_video(storefront, id).await {
            Ok(video) => video,
            Err(e) => {
                warn!(%id, error = %e, "music video lookup failed");
                self.services.reporter.report(ProgressEvent::Notice {
                    message: format!("Failed to get music video {id}: {e}"),
                });
                state.counter.tally(Outcome::Error);
                return;
            }
        };
        video.kind = ItemKind::MusicVideo;

        let config = &self.settings.config;
        let root = self.settings.codec.save_root(config);
        let folder = artist_folder(
            config,
            &video.artist_name,
            video.artist_id.as_deref().unwrap_or_default(),
        );
        let save_dir = if folder.is_empty() {
            root.to_path_buf()
        } else {
            root.join(folder)
        };

        let mut track = Track::new(video, 1, 1, Origin::Standalone);
        track.storefront = storefront.to_string();
        track.save_dir = save_dir;
        TrackPipeline::new(self.settings, self.services)
            .run(&mut track, state)
            .await;
    }
}
