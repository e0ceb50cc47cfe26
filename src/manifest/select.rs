use std::fmt;
use std::sync::LazyLock;

use m3u8_rs::{MasterPlaylist, Playlist};
use regex::Regex;
use url::Url;

use crate::config::{AacType, CodecMode, Config};
use crate::error::ManifestError;

const CODEC_ALAC: &str = "alac";
const CODEC_AAC: &str = "mp4a.40.2";
const CODEC_EC3: &str = "ec-3";
const CODEC_AC3: &str = "ac-3";

/// Sample rates above this are "Hi-Res Lossless"
const HI_RES_THRESHOLD: u32 = 48_000;

static AAC_STEREO: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"audio-stereo-(\d+)").expect("valid AAC group pattern"));

/// One entry of a master manifest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantDescriptor {
    pub codec: String,
    pub audio_group: String,
    pub bandwidth: u64,
    /// URI as written in the manifest
    pub uri: String,
    /// `uri` resolved against the manifest URL
    pub url: Url,
}

/// Quality ceilings and codec flavour for audio selection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioConstraints {
    /// Highest acceptable lossless sample rate in Hz
    pub alac_max: u32,
    /// Highest acceptable Atmos bitrate in kbps (compared after correction)
    pub atmos_max: u32,
    /// AAC group to accept
    pub aac_type: AacType,
}

impl AudioConstraints {
    pub fn from_config(config: &Config) -> Self {
        Self {
            alac_max: config.alac_max,
            atmos_max: config.atmos_max,
            aac_type: config.aac_type,
        }
    }
}

/// The chosen stream and its human-readable quality label
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioSelection {
    pub stream_url: Url,
    pub quality: String,
}

/// Decode a manifest into its master playlist, rejecting media playlists
pub(crate) fn decode_master(manifest: &[u8]) -> Result<MasterPlaylist, ManifestError> {
    match m3u8_rs::parse_playlist_res(manifest) {
        Ok(Playlist::MasterPlaylist(master)) => Ok(master),
        Ok(Playlist::MediaPlaylist(_)) => Err(ManifestError::NotMaster),
        Err(e) => Err(ManifestError::ParseFailed(e.to_string())),
    }
}

/// Decode a master manifest into variants ordered by descending bandwidth.
///
/// The sort is stable, so equal bandwidths keep manifest order.
pub fn decode_variants(
    manifest: &[u8],
    base_url: &Url,
) -> Result<Vec<VariantDescriptor>, ManifestError> {
    let master = decode_master(manifest)?;

    let mut variants = master
        .variants
        .into_iter()
        .filter(|variant| !variant.is_i_frame)
        .map(|variant| {
            Ok(VariantDescriptor {
                url: base_url.join(&variant.uri)?,
                uri: variant.uri,
                codec: variant.codecs.unwrap_or_default(),
                audio_group: variant.audio.unwrap_or_default(),
                bandwidth: variant.average_bandwidth.unwrap_or(variant.bandwidth),
            })
        })
        .collect::<Result<Vec<_>, ManifestError>>()?;

    variants.sort_by(|a, b| b.bandwidth.cmp(&a.bandwidth));
    Ok(variants)
}

/// Select the best audio variant for a codec mode.
///
/// Returns `Ok(None)` when no variant satisfies the codec predicate; callers
/// treat that as "unavailable", not as a failure.
///
/// Groups look like `audio-alac-stereo-<rate>-<depth>`,
/// `audio-stereo-<kbps>[-binaural|-downmix]` and `audio-atmos-<kbps>`.
pub fn select_audio_variant(
    manifest: &[u8],
    base_url: &Url,
    mode: CodecMode,
    constraints: &AudioConstraints,
) -> Result<Option<AudioSelection>, ManifestError> {
    let variants = decode_variants(manifest, base_url)?;
    Ok(select_from_variants(&variants, mode, constraints))
}

fn select_from_variants(
    variants: &[VariantDescriptor],
    mode: CodecMode,
    constraints: &AudioConstraints,
) -> Option<AudioSelection> {
    let pick = |variant: &VariantDescriptor, quality: String| AudioSelection {
        stream_url: variant.url.clone(),
        quality,
    };

    match mode {
        CodecMode::Lossless => variants.iter().find_map(|variant| {
            if variant.codec != CODEC_ALAC {
                return None;
            }
            let (sample_rate, bit_depth) = parse_alac_group(&variant.audio_group)?;
            (sample_rate <= constraints.alac_max)
                .then(|| pick(variant, lossless_label(bit_depth, sample_rate)))
        }),

        CodecMode::Aac => variants.iter().find_map(|variant| {
            if variant.codec != CODEC_AAC
                || normalize_aac_group(&variant.audio_group) != constraints.aac_type.group_name()
            {
                return None;
            }
            let quality = aac_bitrate(&variant.audio_group)
                .map(|kbps| format!("{kbps}Kbps"))
                .unwrap_or_default();
            Some(pick(variant, quality))
        }),

        CodecMode::Atmos => variants
            .iter()
            .find_map(|variant| {
                if !is_atmos(variant) {
                    return None;
                }
                let kbps = atmos_bitrate(&variant.audio_group)?;
                (kbps <= constraints.atmos_max).then(|| pick(variant, format!("{kbps}Kbps")))
            })
            .or_else(|| {
                // No ceiling check for the Dolby Audio fallback
                variants
                    .iter()
                    .find(|variant| variant.codec == CODEC_AC3)
                    .map(|variant| {
                        let quality = last_token_number(&variant.audio_group)
                            .map(|kbps| format!("{kbps}Kbps"))
                            .unwrap_or_default();
                        pick(variant, quality)
                    })
            }),
    }
}

fn is_atmos(variant: &VariantDescriptor) -> bool {
    variant.codec == CODEC_EC3 && variant.audio_group.contains("atmos")
}

/// Sample rate (second-to-last token) and bit depth (last token)
fn parse_alac_group(group: &str) -> Option<(u32, u32)> {
    let mut tokens = group.rsplit('-');
    let bit_depth = tokens.next()?.parse().ok()?;
    let sample_rate = tokens.next()?.parse().ok()?;
    Some((sample_rate, bit_depth))
}

fn lossless_label(bit_depth: u32, sample_rate: u32) -> String {
    format!("{}B-{:.1}kHz", bit_depth, f64::from(sample_rate) / 1000.0)
}

/// Replace the `audio-stereo-<kbps>` stem with the canonical `aac` marker
fn normalize_aac_group(group: &str) -> String {
    AAC_STEREO.replace_all(group, "aac").into_owned()
}

fn aac_bitrate(group: &str) -> Option<u32> {
    AAC_STEREO
        .captures(group)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Trailing Atmos bitrate token.
///
/// Upstream names some groups `...-2768` for a 768 kbps stream: a token of
/// exactly four digits starting with `2` loses that first digit. Keep this
/// rule as is; it is not derivable from any documented naming scheme.
fn atmos_bitrate(group: &str) -> Option<u32> {
    let token = group.rsplit('-').next()?;
    let token = if token.len() == 4 && token.starts_with('2') {
        &token[1..]
    } else {
        token
    };
    token.parse().ok()
}

fn last_token_number(group: &str) -> Option<u32> {
    group.rsplit('-').next()?.parse().ok()
}

/// Best rendition found per format family, for diagnostics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormatSummary {
    pub aac: Option<String>,
    pub lossless: Option<String>,
    pub hi_res: Option<String>,
    pub atmos: Option<String>,
    pub dolby_audio: Option<String>,
}

/// Scan every variant and report the best example of each format family
pub fn enumerate_audio_formats(manifest: &[u8]) -> Result<FormatSummary, ManifestError> {
    let master = decode_master(manifest)?;

    let mut aac: Option<(u32, String)> = None;
    let mut lossless: Option<((u32, u32), String)> = None;
    let mut hi_res: Option<((u32, u32), String)> = None;
    let mut atmos: Option<(u32, String)> = None;
    let mut dolby: Option<(u32, String)> = None;

    for variant in master.variants.iter().filter(|v| !v.is_i_frame) {
        let codec = variant.codecs.as_deref().unwrap_or_default();
        let group = variant.audio.as_deref().unwrap_or_default();

        match codec {
            CODEC_AAC => {
                if let Some(kbps) = aac_bitrate(group) {
                    keep_best(&mut aac, kbps, || {
                        format!("AAC | 2 Channel | {kbps} Kbps")
                    });
                }
            }
            CODEC_EC3 if group.contains("atmos") => {
                if let Some(kbps) = atmos_bitrate(group) {
                    keep_best(&mut atmos, kbps, || {
                        format!("E-AC-3 | 16 Channel | {kbps} Kbps")
                    });
                }
            }
            CODEC_ALAC => {
                if let Some((sample_rate, bit_depth)) = parse_alac_group(group) {
                    let slot = if sample_rate > HI_RES_THRESHOLD {
                        &mut hi_res
                    } else {
                        &mut lossless
                    };
                    keep_best(slot, (sample_rate, bit_depth), || {
                        format!(
                            "ALAC | 2 Channel | {}-bit/{} kHz",
                            bit_depth,
                            sample_rate / 1000
                        )
                    });
                }
            }
            CODEC_AC3 => {
                if let Some(kbps) = last_token_number(group) {
                    keep_best(&mut dolby, kbps, || {
                        format!("AC-3 | 16 Channel | {kbps} Kbps")
                    });
                }
            }
            _ => {}
        }
    }

    Ok(FormatSummary {
        aac: aac.map(|(_, text)| text),
        lossless: lossless.map(|(_, text)| text),
        hi_res: hi_res.map(|(_, text)| text),
        atmos: atmos.map(|(_, text)| text),
        dolby_audio: dolby.map(|(_, text)| text),
    })
}

fn keep_best<R: PartialOrd>(slot: &mut Option<(R, String)>, rank: R, text: impl FnOnce() -> String) {
    let better = slot.as_ref().is_none_or(|(current, _)| rank > *current);
    if better {
        *slot = Some((rank, text()));
    }
}

impl fmt::Display for FormatSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rows = [
            ("AAC", &self.aac),
            ("Lossless", &self.lossless),
            ("Hi-Res Lossless", &self.hi_res),
            ("Dolby Atmos", &self.atmos),
            ("Dolby Audio", &self.dolby_audio),
        ];

        writeln!(f, "Available Audio Formats:")?;
        writeln!(f, "------------------------")?;
        for (name, value) in rows {
            writeln!(
                f,
                "{:<16}: {}",
                name,
                value.as_deref().unwrap_or("Not Available")
            )?;
        }
        write!(f, "------------------------")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://media.example.com/item/1/master.m3u8").unwrap()
    }

    /// Build a master manifest from (codec, audio group, bandwidth, uri) rows
    fn manifest(rows: &[(&str, &str, u64, &str)]) -> Vec<u8> {
        let mut text = String::from("#EXTM3U\n#EXT-X-INDEPENDENT-SEGMENTS\n");
        for (codec, group, bandwidth, uri) in rows {
            text.push_str(&format!(
                "#EXT-X-STREAM-INF:BANDWIDTH={bandwidth},CODECS=\"{codec}\",AUDIO=\"{group}\"\n{uri}\n"
            ));
        }
        text.into_bytes()
    }

    fn constraints() -> AudioConstraints {
        AudioConstraints {
            alac_max: 48_000,
            atmos_max: 2768,
            aac_type: AacType::Aac,
        }
    }

    #[test]
    fn rejects_media_playlist() {
        let media = b"#EXTM3U\n#EXT-X-TARGETDURATION:10\n#EXTINF:9.0,\nseg0.mp4\n#EXT-X-ENDLIST\n";
        let result = select_audio_variant(media, &base(), CodecMode::Lossless, &constraints());
        assert!(matches!(result, Err(ManifestError::NotMaster)));
    }

    #[test]
    fn variants_sorted_by_descending_bandwidth() {
        let text = manifest(&[
            ("alac", "audio-alac-stereo-44100-16", 1_000_000, "low.m3u8"),
            ("alac", "audio-alac-stereo-96000-24", 3_000_000, "high.m3u8"),
        ]);

        let variants = decode_variants(&text, &base()).unwrap();
        assert_eq!(variants[0].bandwidth, 3_000_000);
        assert_eq!(
            variants[0].url.as_str(),
            "https://media.example.com/item/1/high.m3u8"
        );
    }

    #[test]
    fn alac_ceiling_skips_higher_sample_rate() {
        let text = manifest(&[
            ("alac", "audio-alac-stereo-96000-24", 3_000_000, "alac96.m3u8"),
            ("alac", "audio-alac-stereo-44100-16", 1_000_000, "alac44.m3u8"),
        ]);

        let selection = select_audio_variant(&text, &base(), CodecMode::Lossless, &constraints())
            .unwrap()
            .unwrap();

        assert!(selection.stream_url.as_str().ends_with("alac44.m3u8"));
        assert_eq!(selection.quality, "16B-44.1kHz");
    }

    #[test]
    fn alac_takes_highest_bandwidth_within_ceiling() {
        let text = manifest(&[
            ("alac", "audio-alac-stereo-48000-24", 1_500_000, "alac48.m3u8"),
            ("alac", "audio-alac-stereo-192000-24", 5_000_000, "alac192.m3u8"),
            ("mp4a.40.2", "audio-stereo-256", 256_000, "aac.m3u8"),
        ]);
        let wide = AudioConstraints {
            alac_max: 192_000,
            ..constraints()
        };

        let selection = select_audio_variant(&text, &base(), CodecMode::Lossless, &wide)
            .unwrap()
            .unwrap();
        assert!(selection.stream_url.as_str().ends_with("alac192.m3u8"));
        assert_eq!(selection.quality, "24B-192.0kHz");
    }

    #[test]
    fn no_qualifying_variant_is_none() {
        let text = manifest(&[("alac", "audio-alac-stereo-96000-24", 3_000_000, "a.m3u8")]);

        let selection =
            select_audio_variant(&text, &base(), CodecMode::Lossless, &constraints()).unwrap();
        assert!(selection.is_none());
    }

    #[test]
    fn aac_matches_normalized_group_exactly() {
        let text = manifest(&[
            ("mp4a.40.2", "audio-stereo-256-binaural", 300_000, "binaural.m3u8"),
            ("mp4a.40.2", "audio-stereo-256", 260_000, "stereo.m3u8"),
        ]);

        let selection = select_audio_variant(&text, &base(), CodecMode::Aac, &constraints())
            .unwrap()
            .unwrap();
        assert!(selection.stream_url.as_str().ends_with("stereo.m3u8"));
        assert_eq!(selection.quality, "256Kbps");

        let binaural = AudioConstraints {
            aac_type: AacType::AacBinaural,
            ..constraints()
        };
        let selection = select_audio_variant(&text, &base(), CodecMode::Aac, &binaural)
            .unwrap()
            .unwrap();
        assert!(selection.stream_url.as_str().ends_with("binaural.m3u8"));
    }

    #[test]
    fn atmos_bitrate_strips_leading_two_of_four_digits() {
        assert_eq!(atmos_bitrate("audio-atmos-2768"), Some(768));
        assert_eq!(atmos_bitrate("audio-atmos-768"), Some(768));
        assert_eq!(atmos_bitrate("audio-atmos-1536"), Some(1536));
        assert_eq!(atmos_bitrate("audio-atmos-x"), None);
    }

    #[test]
    fn atmos_compares_corrected_bitrate_against_ceiling() {
        let text = manifest(&[("ec-3", "audio-atmos-2768", 800_000, "atmos.m3u8")]);
        let ceiling = AudioConstraints {
            atmos_max: 768,
            ..constraints()
        };

        let selection = select_audio_variant(&text, &base(), CodecMode::Atmos, &ceiling)
            .unwrap()
            .unwrap();
        assert!(selection.stream_url.as_str().ends_with("atmos.m3u8"));
        assert_eq!(selection.quality, "768Kbps");
    }

    #[test]
    fn atmos_falls_back_to_first_dolby_audio_variant() {
        let text = manifest(&[
            ("ec-3", "audio-atmos-2768", 800_000, "atmos.m3u8"),
            ("ac-3", "audio-ac3-640", 640_000, "ac3-640.m3u8"),
            ("ac-3", "audio-ac3-384", 384_000, "ac3-384.m3u8"),
        ]);
        let ceiling = AudioConstraints {
            atmos_max: 500,
            ..constraints()
        };

        let selection = select_audio_variant(&text, &base(), CodecMode::Atmos, &ceiling)
            .unwrap()
            .unwrap();
        assert!(selection.stream_url.as_str().ends_with("ac3-640.m3u8"));
        assert_eq!(selection.quality, "640Kbps");
    }

    #[test]
    fn atmos_prefers_qualifying_atmos_over_earlier_dolby_audio() {
        let text = manifest(&[
            ("ac-3", "audio-ac3-640", 900_000, "ac3.m3u8"),
            ("ec-3", "audio-atmos-2448", 500_000, "atmos.m3u8"),
        ]);

        let selection = select_audio_variant(&text, &base(), CodecMode::Atmos, &constraints())
            .unwrap()
            .unwrap();
        assert!(selection.stream_url.as_str().ends_with("atmos.m3u8"));
        assert_eq!(selection.quality, "448Kbps");
    }

    #[test]
    fn enumerate_reports_best_per_family() {
        let text = manifest(&[
            ("alac", "audio-alac-stereo-192000-24", 5_000_000, "a.m3u8"),
            ("alac", "audio-alac-stereo-96000-24", 3_000_000, "b.m3u8"),
            ("alac", "audio-alac-stereo-44100-16", 1_000_000, "c.m3u8"),
            ("ec-3", "audio-atmos-2768", 800_000, "d.m3u8"),
            ("mp4a.40.2", "audio-stereo-64", 64_000, "e.m3u8"),
            ("mp4a.40.2", "audio-stereo-256", 256_000, "f.m3u8"),
        ]);

        let summary = enumerate_audio_formats(&text).unwrap();
        assert_eq!(summary.aac.as_deref(), Some("AAC | 2 Channel | 256 Kbps"));
        assert_eq!(
            summary.hi_res.as_deref(),
            Some("ALAC | 2 Channel | 24-bit/192 kHz")
        );
        assert_eq!(
            summary.lossless.as_deref(),
            Some("ALAC | 2 Channel | 16-bit/44 kHz")
        );
        assert_eq!(
            summary.atmos.as_deref(),
            Some("E-AC-3 | 16 Channel | 768 Kbps")
        );
        assert!(summary.dolby_audio.is_none());
    }

    #[test]
    fn summary_renders_five_rows() {
        let summary = FormatSummary {
            aac: Some("AAC | 2 Channel | 256 Kbps".to_string()),
            ..Default::default()
        };
        let rendered = summary.to_string();

        assert!(rendered.contains("AAC             : AAC | 2 Channel | 256 Kbps"));
        assert_eq!(rendered.matches("Not Available").count(), 4);
        assert!(rendered.contains("Hi-Res Lossless : Not Available"));
    }
}
