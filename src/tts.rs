//! Text preparation for speech synthesis
//!
//! Article bodies arrive as lightly formatted HTML. Before synthesis they are
//! reduced to plain sentences and packed into bounded chunks, since synthesis
//! services cap the length of a single request.

use serde::{Deserialize, Serialize};

pub const DEFAULT_CHUNK_SIZE: usize = 200;

const SENTENCE_TERMINATORS: &[char] = &['。', '！', '？', '.', '!', '?'];
const KEPT_PUNCTUATION: &str = ".,!?;:()\"'【】《》，。！？；：（）“”‘’";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechOptions {
    pub voice: String,
    pub speed: f32,
    pub volume: f32,
    pub pitch: f32,
    pub language: String,
}

impl Default for SpeechOptions {
    fn default() -> Self {
        Self {
            voice: "standard_female".to_string(),
            speed: 1.0,
            volume: 0.8,
            pitch: 1.0,
            language: "zh-CN".to_string(),
        }
    }
}

impl SpeechOptions {
    /// Collect every out-of-range setting.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();
        if !(0.5..=2.0).contains(&self.speed) {
            errors.push(format!("speed must be between 0.5 and 2.0, got {}", self.speed));
        }
        if !(0.0..=1.0).contains(&self.volume) {
            errors.push(format!("volume must be between 0 and 1, got {}", self.volume));
        }
        if !(0.5..=2.0).contains(&self.pitch) {
            errors.push(format!("pitch must be between 0.5 and 2.0, got {}", self.pitch));
        }
        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

/// Strip markup and characters a synthesizer cannot read.
pub fn clean_text(text: &str) -> String {
    let mut stripped = String::with_capacity(text.len());
    let mut in_tag = false;
    for c in text.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if !in_tag => stripped.push(c),
            _ => {}
        }
    }

    let decoded = stripped
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#x27;", "'")
        .replace("&#39;", "'")
        .replace("&amp;", "&");

    let mut out = String::with_capacity(decoded.len());
    for line in decoded.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if !out.is_empty() {
            if !out.ends_with(SENTENCE_TERMINATORS) {
                out.push('。');
            }
            out.push(' ');
        }
        let mut last_space = false;
        for c in line.chars() {
            if c.is_whitespace() {
                if !last_space {
                    out.push(' ');
                }
                last_space = true;
            } else if c.is_alphanumeric() || KEPT_PUNCTUATION.contains(c) {
                out.push(c);
                last_space = false;
            }
        }
    }
    out.trim().to_string()
}

/// Pack sentences into chunks of at most `max_chars` characters.
///
/// Sentences longer than `max_chars` are hard-split. Non-empty input always
/// yields at least one chunk.
pub fn split_into_chunks(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for sentence in sentences(text) {
        for piece in hard_split(&sentence, max_chars) {
            let piece_len = piece.chars().count();
            if current_len + piece_len > max_chars && !current.is_empty() {
                chunks.push(current.trim().to_string());
                current.clear();
                current_len = 0;
            }
            current.push_str(&piece);
            current_len += piece_len;
        }
    }

    if !current.trim().is_empty() {
        chunks.push(current.trim().to_string());
    }
    if chunks.is_empty() && !text.trim().is_empty() {
        chunks.push(text.trim().to_string());
    }
    chunks
}

fn sentences(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    for c in text.chars() {
        current.push(c);
        if SENTENCE_TERMINATORS.contains(&c) {
            if !current.trim().trim_matches(SENTENCE_TERMINATORS).is_empty() {
                out.push(std::mem::take(&mut current));
            } else {
                current.clear();
            }
        }
    }
    if !current.trim().is_empty() {
        out.push(current);
    }
    out
}

fn hard_split(sentence: &str, max_chars: usize) -> Vec<String> {
    let chars: Vec<char> = sentence.chars().collect();
    chars.chunks(max_chars).map(|c| c.iter().collect()).collect()
}

/// Rough spoken length: about 5 characters per second for plain ASCII prose,
/// 3 for everything else, scaled by the speech rate.
pub fn estimate_speech_seconds(text: &str, speed: f32) -> f64 {
    if text.is_empty() {
        return 0.0;
    }
    let plain_ascii = text
        .chars()
        .all(|c| c.is_ascii_alphabetic() || c.is_whitespace() || ",.!?".contains(c));
    let chars_per_second = if plain_ascii { 5.0 } else { 3.0 } * f64::from(speed.max(0.1));
    (text.chars().count() as f64 / chars_per_second).ceil()
}

/// Estimated reading time in whole seconds at `chars_per_minute`
pub fn estimate_reading_seconds(text: &str, chars_per_minute: u32) -> f64 {
    let chars = text.chars().count() as f64;
    (chars / f64::from(chars_per_minute.max(1)) * 60.0).ceil()
}
