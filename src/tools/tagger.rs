use std::borrow::Cow;
use std::ffi::OsStr;
use std::path::Path;

use async_trait::async_trait;
use lofty::config::WriteOptions;
use lofty::mp4::{AdvisoryRating, Atom, AtomData, AtomIdent, Ilst};
use lofty::picture::Picture;
use lofty::tag::{Accessor, TagExt};
use tracing::debug;

use crate::catalog::ContentRating;
use crate::error::TagError;
use crate::tools::run_tool;
use crate::track::MetadataRecord;

const ITUNES_MEAN: &str = "com.apple.iTunes";

/// Container tagging and muxing
#[async_trait]
pub trait Tagger: Send + Sync {
    /// Apply a colon-joined `key=value` tag string to a file in place
    async fn embed_tags(&self, path: &Path, tags: &str) -> Result<(), TagError>;

    /// Mux a video and an audio rendition into `out`, tagging the result
    async fn mux_video(
        &self,
        video: &Path,
        audio: &Path,
        tags: &str,
        out: &Path,
    ) -> Result<(), TagError>;

    /// Replace the file's item list with a full metadata record
    async fn write_metadata(&self, path: &Path, record: &MetadataRecord) -> Result<(), TagError>;
}

/// Join `key=value` pairs the way MP4Box's `-itags` expects them
pub fn join_tags<K, V>(pairs: &[(K, V)]) -> String
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    pairs
        .iter()
        .map(|(k, v)| format!("{}={}", k.as_ref(), v.as_ref()))
        .collect::<Vec<_>>()
        .join(":")
}

/// MP4Box for tag strings and muxing, lofty for the metadata record
#[derive(Debug, Clone)]
pub struct Mp4Tagger {
    mp4box: String,
}

impl Mp4Tagger {
    pub fn new(mp4box: impl Into<String>) -> Self {
        Self {
            mp4box: mp4box.into(),
        }
    }
}

#[async_trait]
impl Tagger for Mp4Tagger {
    async fn embed_tags(&self, path: &Path, tags: &str) -> Result<(), TagError> {
        run_tool(
            &self.mp4box,
            [OsStr::new("-itags"), OsStr::new(tags), path.as_os_str()],
        )
        .await?;
        Ok(())
    }

    async fn mux_video(
        &self,
        video: &Path,
        audio: &Path,
        tags: &str,
        out: &Path,
    ) -> Result<(), TagError> {
        run_tool(
            &self.mp4box,
            [
                OsStr::new("-itags"),
                OsStr::new(tags),
                OsStr::new("-quiet"),
                OsStr::new("-add"),
                video.as_os_str(),
                OsStr::new("-add"),
                audio.as_os_str(),
                OsStr::new("-keep-utc"),
                OsStr::new("-new"),
                out.as_os_str(),
            ],
        )
        .await?;
        Ok(())
    }

    async fn write_metadata(&self, path: &Path, record: &MetadataRecord) -> Result<(), TagError> {
        let picture = match &record.cover {
            Some(cover) => {
                let bytes = tokio::fs::read(cover)
                    .await
                    .map_err(|e| TagError::CoverReadFailed {
                        path: cover.clone(),
                        source: e,
                    })?;
                let picture = Picture::from_reader(&mut bytes.as_slice()).map_err(|e| {
                    TagError::CoverDecodeFailed {
                        path: cover.clone(),
                        source: e,
                    }
                })?;
                Some(picture)
            }
            None => None,
        };

        let ilst = build_ilst(record, picture);
        debug!(path = %path.display(), items = ilst.len(), "writing metadata");
        ilst.save_to_path(path, WriteOptions::default())
            .map_err(|e| TagError::WriteFailed {
                path: path.to_path_buf(),
                source: e,
            })
    }
}

fn text(ident: [u8; 4], value: &str) -> Option<Atom<'static>> {
    (!value.is_empty())
        .then(|| Atom::new(AtomIdent::Fourcc(ident), AtomData::UTF8(value.to_string())))
}

fn freeform(name: &'static str, value: &str) -> Option<Atom<'static>> {
    (!value.is_empty()).then(|| {
        Atom::new(
            AtomIdent::Freeform {
                mean: Cow::Borrowed(ITUNES_MEAN),
                name: Cow::Borrowed(name),
            },
            AtomData::UTF8(value.to_string()),
        )
    })
}

/// Catalog ids are stored as 32-bit integers; larger ids are left out
fn catalog_id(ident: [u8; 4], id: Option<&str>) -> Option<Atom<'static>> {
    let value = id?.parse::<i32>().ok()?;
    Some(Atom::new(
        AtomIdent::Fourcc(ident),
        AtomData::SignedInteger(value),
    ))
}

fn build_ilst(record: &MetadataRecord, picture: Option<Picture>) -> Ilst {
    let mut ilst = Ilst::default();

    ilst.set_title(record.title.clone());
    ilst.set_artist(record.artist.clone());
    ilst.set_album(record.album.clone());
    if !record.genre.is_empty() {
        ilst.set_genre(record.genre.clone());
    }
    ilst.set_track(record.track_number);
    ilst.set_track_total(record.track_total);
    ilst.set_disk(record.disc_number);
    ilst.set_disk_total(record.disc_total);

    let atoms = [
        text(*b"aART", &record.album_artist),
        text(*b"\xa9wrt", &record.composer),
        text(*b"\xa9day", &record.release_date),
        text(*b"cprt", &record.copyright),
        record.lyrics.as_deref().and_then(|l| text(*b"\xa9lyr", l)),
        freeform("ISRC", &record.isrc),
        freeform("UPC", &record.upc),
        freeform("LABEL", &record.record_label),
        catalog_id(*b"cnID", record.song_id.as_deref()),
        catalog_id(*b"plID", record.album_id.as_deref()),
        catalog_id(*b"atID", record.artist_id.as_deref()),
    ];
    for atom in atoms.into_iter().flatten() {
        ilst.insert(atom);
    }

    match record.content_rating {
        ContentRating::Explicit => ilst.set_advisory_rating(AdvisoryRating::Explicit),
        ContentRating::Clean => ilst.set_advisory_rating(AdvisoryRating::Clean),
        ContentRating::None => ilst.set_advisory_rating(AdvisoryRating::Inoffensive),
    }

    if let Some(picture) = picture {
        ilst.insert_picture(picture);
    }

    ilst
}
