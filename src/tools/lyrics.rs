use std::sync::LazyLock;

use regex::Regex;

static PARAGRAPH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)<p\b([^>]*)>(.*?)</p>"#).expect("valid paragraph pattern")
});

static BEGIN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\bbegin="([^"]+)""#).expect("valid begin pattern"));

static MARKUP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]+>").expect("valid markup pattern"));

/// Parse a TTML clock value (`12.3`, `1:02.345` or `1:01:02.345`) into centiseconds
fn centiseconds(clock: &str) -> Option<u64> {
    let clock = clock.trim_end_matches('s');
    let mut parts = clock.rsplit(':');
    let seconds: f64 = parts.next()?.parse().ok()?;
    let minutes: u64 = parts.next().map_or(Ok(0), str::parse).ok()?;
    let hours: u64 = parts.next().map_or(Ok(0), str::parse).ok()?;
    if parts.next().is_some() || seconds < 0.0 {
        return None;
    }
    let whole = (hours * 3600 + minutes * 60) * 100;
    Some(whole + (seconds * 100.0).round() as u64)
}

fn lrc_stamp(cs: u64) -> String {
    format!("[{:02}:{:02}.{:02}]", cs / 6000, (cs % 6000) / 100, cs % 100)
}

/// Convert catalog TTML lyrics into LRC.
///
/// Lines without timing are emitted as plain text.
pub fn ttml_to_lrc(ttml: &str) -> String {
    let mut lines = Vec::new();

    for paragraph in PARAGRAPH.captures_iter(ttml) {
        let text = MARKUP.replace_all(&paragraph[2], "");
        let text = html_escape::decode_html_entities(text.trim()).into_owned();

        let stamp = BEGIN
            .captures(&paragraph[1])
            .and_then(|begin| centiseconds(&begin[1]));
        match stamp {
            Some(cs) => lines.push(format!("{}{text}", lrc_stamp(cs))),
            None => lines.push(text),
        }
    }

    lines.join("\n")
}
