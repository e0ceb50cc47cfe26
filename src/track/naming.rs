use chrono::{Datelike, NaiveDate};

use crate::catalog::{AlbumInfo, ContentRating, SongInfo};
use crate::config::Config;

const QUALITY_PLACEHOLDER: &str = "{Quality}";

/// Fill `{Key}` placeholders from `values`
pub fn fill_template(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let candidate = &rest[open..];

        let replaced = candidate.find('}').and_then(|close| {
            let key = &candidate[1..close];
            values
                .iter()
                .find(|(name, _)| *name == key)
                .map(|(_, value)| (*value, close + 1))
        });

        match replaced {
            Some((value, consumed)) => {
                out.push_str(value);
                rest = &candidate[consumed..];
            }
            None => {
                out.push('{');
                rest = &candidate[1..];
            }
        }
    }

    out.push_str(rest);
    out
}

/// Whether expanding `template` needs a resolved quality label
pub fn needs_quality(template: &str) -> bool {
    template.contains(QUALITY_PLACEHOLDER)
}

/// Truncate a catalog name to `max` characters
pub fn limit(name: &str, max: usize) -> String {
    name.chars().take(max).collect()
}

/// Replace characters that are not allowed in file names with `_`
pub fn sanitize(name: &str) -> String {
    sanitize_filename::sanitize_with_options(
        name,
        sanitize_filename::Options {
            truncate: false,
            windows: false,
            replacement: "_",
        },
    )
}

/// Folder names lose their dots when they end in one, then surrounding whitespace
pub fn trim_folder_name(name: &str) -> String {
    let name = if name.ends_with('.') {
        name.replace('.', "")
    } else {
        name.to_string()
    };
    name.trim().to_string()
}

/// Space-joined advisory markers for the `{Tag}` placeholder
pub fn advisory_tag(config: &Config, mastered: bool, rating: ContentRating) -> String {
    let rating_choice = match rating {
        ContentRating::Explicit => config.explicit_choice.as_str(),
        ContentRating::Clean => config.clean_choice.as_str(),
        ContentRating::None => "",
    };
    let master_choice = if mastered {
        config.apple_master_choice.as_str()
    } else {
        ""
    };

    [master_choice, rating_choice]
        .into_iter()
        .filter(|choice| !choice.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn release_year(date: &str) -> String {
    NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map(|d| d.year().to_string())
        .unwrap_or_else(|_| date.chars().take(4).collect())
}

/// File stem (no extension) of a song inside its collection
pub fn song_file_stem(
    config: &Config,
    song: &SongInfo,
    ordinal: usize,
    quality: &str,
    codec: &str,
) -> String {
    let number = format!("{ordinal:02}");
    let name = limit(&song.name, config.limit_max);
    let disc = song.disc_number.to_string();
    let track = song.track_number.to_string();
    let tag = advisory_tag(config, song.is_apple_digital_master, song.content_rating);

    let stem = fill_template(
        &config.song_file_format,
        &[
            ("SongId", song.id.as_str()),
            ("SongNumer", number.as_str()),
            ("SongName", name.as_str()),
            ("DiscNumber", disc.as_str()),
            ("TrackNumber", track.as_str()),
            ("Quality", quality),
            ("Tag", tag.as_str()),
            ("Codec", codec),
        ],
    );
    sanitize(&stem)
}

/// File stem of a music video: `NN. Title` inside a collection, `Title (id)` otherwise
pub fn video_file_stem(song: &SongInfo, ordinal: Option<usize>) -> String {
    let stem = match ordinal {
        Some(ordinal) => format!("{ordinal:02}. {}", song.name),
        None => format!("{} ({})", song.name, song.id),
    };
    sanitize(&stem)
}

/// Folder holding an artist's albums
pub fn artist_folder(config: &Config, artist_name: &str, artist_id: &str) -> String {
    let name = limit(artist_name, config.limit_max);
    let folder = fill_template(
        &config.artist_folder_format,
        &[
            ("UrlArtistName", name.as_str()),
            ("ArtistName", name.as_str()),
            ("ArtistId", artist_id),
        ],
    );
    sanitize(&trim_folder_name(&folder))
}

/// Folder of one album below the artist folder
pub fn album_folder(config: &Config, album: &AlbumInfo, quality: &str, codec: &str) -> String {
    let artist = limit(&album.artist_name, config.limit_max);
    let name = limit(&album.name, config.limit_max);
    let year = release_year(&album.release_date);
    let tag = advisory_tag(
        config,
        album.is_apple_digital_master || album.is_mastered_for_itunes,
        album.content_rating,
    );

    let folder = fill_template(
        &config.album_folder_format,
        &[
            ("ReleaseDate", album.release_date.as_str()),
            ("ReleaseYear", year.as_str()),
            ("ArtistName", artist.as_str()),
            ("AlbumName", name.as_str()),
            ("UPC", album.upc.as_str()),
            ("RecordLabel", album.record_label.as_str()),
            ("Copyright", album.copyright.as_str()),
            ("AlbumId", album.id.as_str()),
            ("Quality", quality),
            ("Codec", codec),
            ("Tag", tag.as_str()),
        ],
    );
    sanitize(&trim_folder_name(&folder))
}

/// Folder of a playlist, falling back to its name when the template expands to nothing
pub fn playlist_folder(config: &Config, playlist_name: &str, playlist_id: &str) -> String {
    let name = limit(playlist_name, config.limit_max);
    let folder = fill_template(
        &config.playlist_folder_format,
        &[
            ("ArtistName", "Apple Music"),
            ("PlaylistName", name.as_str()),
            ("PlaylistId", playlist_id),
        ],
    );
    let folder = trim_folder_name(&folder);
    if folder.is_empty() {
        sanitize(&name)
    } else {
        sanitize(&folder)
    }
}
