//! Text normalization, boilerplate filtering, and oversize splitting.
//!
//! Shared by all segmentation algorithms. Everything here is a pure
//! function of its inputs; the oversize splitter in particular must be
//! deterministic because the part numbers it assigns feed the point-key
//! hash.

use regex::Regex;
use std::sync::LazyLock;

use crate::models::Chunk;

static MULTI_SPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[ \t]+").unwrap());
static MULTI_BLANK: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{4,}").unwrap());

/// Lines that are publishing artifacts, not content. Matched against the
/// trimmed line.
static BOILERPLATE: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        // Document-number footers: "Drucksache 20/1234"
        r"^Drucksache\s+\d+/\d+",
        // Page headers: "Deutscher Bundestag – 20. Wahlperiode – 15. Sitzung"
        r"^Deutscher Bundestag\s+[–-]\s+\d+\.\s*Wahlperiode",
        r"^ISSN\s+\d{4}[–-]\d{3,4}",
        // Distribution and printing notices on the last page
        r"^(Gesamtherstellung|Vertrieb|Satz|Druck):",
        r"^Vertrieb:\s",
        r"^Telefon[: ]",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

pub fn is_boilerplate(line: &str) -> bool {
    let trimmed = line.trim();
    BOILERPLATE.iter().any(|re| re.is_match(trimmed))
}

/// Normalize whitespace: trim line ends, collapse interior runs of
/// spaces/tabs, and collapse 3+ consecutive blank lines to a single
/// paragraph break.
pub fn normalize(text: &str) -> String {
    let joined = text
        .lines()
        .map(|l| MULTI_SPACE.replace_all(l.trim_end(), " ").into_owned())
        .collect::<Vec<_>>()
        .join("\n");
    MULTI_BLANK.replace_all(&joined, "\n\n").trim().to_string()
}

/// Split text into sentences, keeping terminators attached.
///
/// Intentionally simple: a terminator followed by whitespace ends a
/// sentence. Abbreviations ("Dr.", "z. B.") over-split occasionally,
/// which only moves a part boundary, never content.
pub fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let bytes = text.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if (b == b'.' || b == b'!' || b == b'?')
            && bytes.get(i + 1).map_or(true, |&n| n == b' ' || n == b'\n')
        {
            let end = i + 1;
            let s = text[start..end].trim();
            if !s.is_empty() {
                sentences.push(s);
            }
            start = end;
        }
        i += 1;
    }
    let tail = text[start..].trim();
    if !tail.is_empty() {
        sentences.push(tail);
    }
    sentences
}

/// Re-split a chunk whose text exceeds `max_chars` into sequentially
/// numbered parts, each under the limit, each carrying the original
/// chunk's metadata. Chunks under the limit pass through unchanged
/// (part stays 0).
///
/// When more than one part results and the chunk carries a section
/// title, the title gets a part suffix so retrieved results stay
/// distinguishable.
pub fn split_oversized(chunk: Chunk, max_chars: usize) -> Vec<Chunk> {
    if chunk.char_len() <= max_chars {
        return vec![chunk];
    }

    let mut part_texts: Vec<String> = Vec::new();
    let mut buf = String::new();
    for sentence in split_sentences(&chunk.text) {
        let sentence_len = sentence.chars().count();
        let buf_len = buf.chars().count();
        if buf_len > 0 && buf_len + 1 + sentence_len > max_chars {
            part_texts.push(std::mem::take(&mut buf));
        }
        // A single sentence over the limit is hard-wrapped on char
        // boundaries; pathological but must terminate.
        if sentence_len > max_chars {
            if !buf.is_empty() {
                part_texts.push(std::mem::take(&mut buf));
            }
            let chars: Vec<char> = sentence.chars().collect();
            for piece in chars.chunks(max_chars) {
                part_texts.push(piece.iter().collect());
            }
            continue;
        }
        if !buf.is_empty() {
            buf.push(' ');
        }
        buf.push_str(sentence);
    }
    if !buf.is_empty() {
        part_texts.push(buf);
    }

    let multi = part_texts.len() > 1;
    part_texts
        .into_iter()
        .enumerate()
        .map(|(part, text)| {
            let mut attrs = chunk.attrs.clone();
            if multi {
                if let Some(section) = &chunk.attrs.section {
                    attrs.section = Some(format!("{} (Teil {})", section, part + 1));
                }
            }
            Chunk {
                doc_id: chunk.doc_id.clone(),
                index: chunk.index,
                part: part as u32,
                kind: chunk.kind,
                attrs,
                text,
            }
        })
        .collect()
}
