//! Caption timing estimated from narration text.

use crate::common::Caption;

/// Average narration speed.
pub const WORDS_PER_SECOND: f64 = 2.5;

/// Silence between sentences.
pub const SENTENCE_PAUSE: f64 = 0.5;

/// Split `text` into sentences on `.`, `!` and `?` and time each one at
/// [`WORDS_PER_SECOND`], with a [`SENTENCE_PAUSE`] gap between them.
///
/// Blank fragments are skipped. Times are in seconds from the start.
pub fn estimate_timestamps(text: &str) -> Vec<Caption> {
    let mut cursor = 0.0;

    text.split(['.', '!', '?'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|sentence| {
            let words = sentence.split_whitespace().count() as f64;
            let duration = words / WORDS_PER_SECOND;
            let caption = Caption {
                text: sentence.to_string(),
                start_time: cursor,
                end_time: cursor + duration,
            };
            cursor += duration + SENTENCE_PAUSE;
            caption
        })
        .collect()
}
