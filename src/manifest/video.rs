use std::sync::LazyLock;

use m3u8_rs::AlternativeMedia;
use regex::Regex;
use url::Url;

use crate::config::MvAudioType;
use crate::error::ManifestError;
use crate::manifest::select::{decode_master, decode_variants};

static RESOLUTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"_(\d+)x(\d+)").expect("valid resolution pattern"));

static GROUP_RANK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"_gr(\d+)_").expect("valid rank pattern"));

/// Pick the highest-bandwidth video variant whose height fits the ceiling.
///
/// The height comes from a `_<width>x<height>` token in the variant URI;
/// variants without one are ignored.
pub fn select_video_variant(
    manifest: &[u8],
    base_url: &Url,
    height_ceiling: u32,
) -> Result<Option<Url>, ManifestError> {
    let variants = decode_variants(manifest, base_url)?;

    Ok(variants
        .into_iter()
        .find(|variant| {
            video_height(&variant.uri).is_some_and(|height| height <= height_ceiling)
        })
        .map(|variant| variant.url))
}

fn video_height(uri: &str) -> Option<u32> {
    RESOLUTION
        .captures(uri)
        .and_then(|caps| caps.get(2))
        .and_then(|m| m.as_str().parse().ok())
}

/// Audio group identifiers to try, most preferred first
fn audio_priority(preference: MvAudioType) -> &'static [&'static str] {
    match preference {
        MvAudioType::Atmos => &["audio-atmos", "audio-ac3", "audio-stereo-256"],
        MvAudioType::Ac3 => &["audio-ac3", "audio-stereo-256"],
        MvAudioType::Aac => &["audio-stereo-256"],
    }
}

/// Pick the audio rendition to mux with a music video.
///
/// Only the first priority tier that has any ranked rendition is considered;
/// within it the highest `_gr<rank>_` wins, earlier entries winning ties.
pub fn select_audio_for_video(
    manifest: &[u8],
    base_url: &Url,
    preference: MvAudioType,
) -> Result<Option<Url>, ManifestError> {
    let master = decode_master(manifest)?;

    for group in audio_priority(preference) {
        let mut best: Option<(u32, &AlternativeMedia)> = None;

        for media in master.alternatives.iter().filter(|m| m.group_id == *group) {
            let Some(uri) = media.uri.as_deref() else {
                continue;
            };
            let Some(rank) = GROUP_RANK
                .captures(uri)
                .and_then(|caps| caps.get(1))
                .and_then(|m| m.as_str().parse::<u32>().ok())
            else {
                continue;
            };
            if best.is_none_or(|(current, _)| rank > current) {
                best = Some((rank, media));
            }
        }

        if let Some((_, media)) = best
            && let Some(uri) = media.uri.as_deref()
        {
            return Ok(Some(base_url.join(uri)?));
        }
    }

    Ok(None)
}
