use std::io;

use colored::Colorize;
use console::Term;

use crate::catalog::{ArtistItem, SearchHit, SongInfo};
use crate::state::Counter;

pub trait Prompter: Send + Sync {
    /// Pick any number of an artist's albums or music videos; returns indices into `items`
    fn select_items(&self, title: &str, items: &[ArtistItem]) -> Vec<usize>;

    /// Pick album tracks; returns 1-based ordinals
    fn select_tracks(&self, album_name: &str, tracks: &[SongInfo]) -> Vec<usize>;

    /// Pick one search hit; `None` cancels
    fn pick_search_hit(&self, hits: &[SearchHit]) -> Option<usize>;

    /// Ask whether to run the queue again after a pass with errors
    fn acknowledge_retry(&self, counter: &Counter) -> bool;
}

/// Parse a selection such as `1,3-5` or `all` into sorted 1-based ordinals.
///
/// Out-of-range numbers and malformed tokens are ignored.
pub fn parse_selection(input: &str, max: usize) -> Vec<usize> {
    let mut picked = Vec::new();

    for token in input.split([',', ' ']).map(str::trim).filter(|t| !t.is_empty()) {
        if token.eq_ignore_ascii_case("all") {
            return (1..=max).collect();
        }

        let range: Option<(usize, usize)> = match token.split_once('-') {
            Some((start, end)) => start.trim().parse().ok().zip(end.trim().parse().ok()),
            None => token.parse().ok().map(|n| (n, n)),
        };
        if let Some((start, end)) = range {
            picked.extend(start.max(1)..=end.min(max));
        }
    }

    picked.sort_unstable();
    picked.dedup();
    picked
}

/// Prompter reading answers from the terminal
pub struct ConsolePrompter {
    term: Term,
}

impl ConsolePrompter {
    pub fn new() -> Self {
        Self {
            term: Term::stderr(),
        }
    }

    fn ask(&self, question: &str) -> io::Result<String> {
        self.term.write_str(&format!("{} ", question.bold()))?;
        self.term.read_line()
    }

    fn list<'a>(&self, rows: impl Iterator<Item = String> + 'a) -> io::Result<()> {
        for (index, row) in rows.enumerate() {
            self.term
                .write_line(&format!("{:>4}  {}", (index + 1).to_string().cyan(), row))?;
        }
        Ok(())
    }
}

impl Default for ConsolePrompter {
    fn default() -> Self {
        Self::new()
    }
}

impl Prompter for ConsolePrompter {
    fn select_items(&self, title: &str, items: &[ArtistItem]) -> Vec<usize> {
        let answer = self
            .term
            .write_line(&title.bold().to_string())
            .and_then(|_| {
                self.list(
                    items
                        .iter()
                        .map(|item| format!("{}  {}", item.release_date.dimmed(), item.name)),
                )
            })
            .and_then(|_| self.ask("Select (e.g. 1,3-5 or all):"));

        match answer {
            Ok(answer) => parse_selection(&answer, items.len())
                .into_iter()
                .map(|ordinal| ordinal - 1)
                .collect(),
            Err(_) => Vec::new(),
        }
    }

    fn select_tracks(&self, album_name: &str, tracks: &[SongInfo]) -> Vec<usize> {
        let answer = self
            .term
            .write_line(&album_name.bold().to_string())
            .and_then(|_| {
                self.list(
                    tracks
                        .iter()
                        .map(|track| format!("{} - {}", track.name, track.artist_name.dimmed())),
                )
            })
            .and_then(|_| self.ask("Select tracks (e.g. 1,3-5 or all):"));

        answer
            .map(|answer| parse_selection(&answer, tracks.len()))
            .unwrap_or_default()
    }

    fn pick_search_hit(&self, hits: &[SearchHit]) -> Option<usize> {
        let answer = self
            .list(
                hits.iter()
                    .map(|hit| format!("{}  {}", hit.name, hit.detail.dimmed())),
            )
            .and_then(|_| self.ask("Pick one (empty to cancel):"))
            .ok()?;

        let ordinal: usize = answer.trim().parse().ok()?;
        (1..=hits.len()).contains(&ordinal).then(|| ordinal - 1)
    }

    fn acknowledge_retry(&self, counter: &Counter) -> bool {
        let question = format!(
            "{} tracks failed. Press Enter to retry, or type q to stop:",
            counter.error
        );
        match self.ask(&question) {
            Ok(answer) => !answer.trim().eq_ignore_ascii_case("q"),
            Err(_) => false,
        }
    }
}
