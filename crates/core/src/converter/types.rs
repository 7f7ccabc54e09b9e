//! File naming and tag extraction for converted audio.

use once_cell::sync::Lazy;
use regex_lite::Regex;

/// Characters that cannot appear in a file name on common filesystems.
const INVALID_FILE_NAME_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

static ARTIST_TITLE: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"^(?P<artist>.*?)\s+-\s+(?P<title>.*?)$").ok());

/// Artist and title embedded into the output file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackTags {
    pub artist: String,
    pub title: String,
}

impl TrackTags {
    /// `-metadata` arguments for ffmpeg.
    pub fn to_ffmpeg_args(&self) -> Vec<String> {
        vec![
            "-metadata".to_string(),
            format!("artist={}", self.artist),
            "-metadata".to_string(),
            format!("title={}", self.title),
        ]
    }
}

/// Longest file stem kept, in bytes. Leaves room for the extension and the
/// scratch suffix within the usual 255-byte name limit.
pub const MAX_STEM_BYTES: usize = 200;

/// Replaces control characters and characters invalid in file names with `_`.
pub fn replace_invalid_chars(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_control() || INVALID_FILE_NAME_CHARS.contains(&c) {
                '_'
            } else {
                c
            }
        })
        .collect()
}

fn truncate_to_char_boundary(s: &mut String, max_bytes: usize) {
    if s.len() <= max_bytes {
        return;
    }
    let mut end = max_bytes;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    s.truncate(end);
}

/// Builds the output file name: invalid characters become `_`, the stem is
/// cut to [`MAX_STEM_BYTES`], then the extension is appended.
pub fn sanitize_file_name(title: &str, extension: &str) -> String {
    let mut clean = replace_invalid_chars(title);
    truncate_to_char_boundary(&mut clean, MAX_STEM_BYTES);
    if clean.trim().is_empty() {
        clean = "untitled".to_string();
    }
    format!("{}.{}", clean, extension)
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Splits a display title of the form `Artist - Title`.
///
/// Interior whitespace runs are collapsed. Returns `None` when there is no
/// separator or either half is blank.
pub fn extract_tags(display_title: &str) -> Option<TrackTags> {
    let re = ARTIST_TITLE.as_ref()?;
    let caps = re.captures(display_title.trim())?;
    let artist = collapse_whitespace(caps.name("artist")?.as_str());
    let title = collapse_whitespace(caps.name("title")?.as_str());
    if artist.is_empty() || title.is_empty() {
        return None;
    }
    Some(TrackTags { artist, title })
}
