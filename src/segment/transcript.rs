//! Plenary transcript segmentation.
//!
//! An explicit finite-state machine over the transcript's lines with
//! three states:
//!
//! ```text
//!            session-start marker
//!   Header ──────────────────────▶ Body ◀──────────────┐
//!      │                            │                  │ speaker line
//!      │ speaker line               │ speaker line     │ (speech emitted)
//!      └──────────────▶ InSpeech ◀──┘                  │
//!                           └──────────────────────────┘
//! ```
//!
//! Every line is first classified into a [`LineClass`]; the (state,
//! class) pair decides the action and the next state. The header —
//! attendance lists, table of contents — is discarded entirely.
//! Four speaker-line grammars are recognized: party-affiliated MPs,
//! government members (chancellor/ministers), presiding officers, and
//! state-level officials, all tolerating academic titles.

use regex::Regex;
use std::sync::LazyLock;

use super::RawSegment;
use crate::models::{ChunkAttrs, ChunkKind};
use crate::segment::clean;

/// MP with party affiliation: "Dr. Eva Muster (SPD):"
static SPEAKER_MP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?x)^
        (?P<name>(?:(?:Prof\.|Dr\.|h\.\s?c\.)\s+)*[\p{Lu}][\p{L}'’.\-]*(?:\s+(?:von|zu|van|de|der))?(?:\s+[\p{Lu}][\p{L}'’.\-]*){1,4})
        \s*\(\s*(?P<party>CDU/CSU|SPD|BÜNDNIS\s90/DIE\sGRÜNEN|FDP|AfD|DIE\sLINKE|Die\sLinke|BSW|fraktionslos)\s*\)\s*:
        \s*(?P<rest>.*)$",
    )
    .unwrap()
});

/// Government member: "Olaf Muster, Bundeskanzler:" /
/// "Annalena Muster, Bundesministerin des Auswärtigen:"
static SPEAKER_GOVERNMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?x)^
        (?P<name>(?:(?:Prof\.|Dr\.|h\.\s?c\.)\s+)*[\p{Lu}][^,:()]{2,60}?)
        ,\s*(?P<role>Bundeskanzler(?:in)?|Bundesminister(?:in)?[^:]{0,80})\s*:
        \s*(?P<rest>.*)$",
    )
    .unwrap()
});

/// Presiding officer: "Präsidentin Petra Muster:" / "Vizepräsident Kurt Muster:"
static SPEAKER_PRESIDING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?x)^
        (?P<role>Alterspräsident(?:in)?|Vizepräsident(?:in)?|Präsident(?:in)?)
        \s+(?P<name>(?:(?:Prof\.|Dr\.|h\.\s?c\.)\s+)*[\p{Lu}][^:]{2,60}?)\s*:
        \s*(?P<rest>.*)$",
    )
    .unwrap()
});

/// State-level official: "Anna Muster, Staatsministerin beim Bundeskanzler:" /
/// "Jens Muster, Parl. Staatssekretär beim Bundesminister der Finanzen:"
static SPEAKER_STATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?x)^
        (?P<name>(?:(?:Prof\.|Dr\.|h\.\s?c\.)\s+)*[\p{Lu}][^,:()]{2,60}?)
        ,\s*(?P<role>(?:Parl\.\s+)?Staatssekretär(?:in)?[^:]{0,80}|Staatsminister(?:in)?[^:]{0,80})\s*:
        \s*(?P<rest>.*)$",
    )
    .unwrap()
});

/// Agenda-item markers: "Tagesordnungspunkt 5:" / "Zusatzpunkt 2"
static AGENDA_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:Tagesordnungspunkt|Zusatzpunkt)\s+(\d+)\s*:?\s*$").unwrap());

/// Procedural start-of-sitting marker: "Beginn: 9.00 Uhr"
static SESSION_START: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^Beginn:?\s+\d{1,2}[.:]\d{2}\s*Uhr").unwrap());

/// Purely parenthetical audience reactions.
static REACTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\((?:Beifall|Zuruf|Zurufe|Heiterkeit|Lachen|Widerspruch|Unruhe|Gegenruf)[^)]*\)\s*[–-]?\s*$")
        .unwrap()
});

/// FSM states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Before the session body; everything is discarded.
    Header,
    /// In the body but between speeches.
    Body,
    /// Accumulating the current speech.
    InSpeech,
}

/// Classification of a single transcript line.
#[derive(Debug)]
enum LineClass {
    Speaker {
        name: String,
        affiliation: String,
        rest: String,
    },
    AgendaMarker(u32),
    SessionStart,
    Reaction,
    Blank,
    Boilerplate,
    Text,
}

fn classify(line: &str) -> LineClass {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return LineClass::Blank;
    }
    if clean::is_boilerplate(trimmed) {
        return LineClass::Boilerplate;
    }
    if SESSION_START.is_match(trimmed) {
        return LineClass::SessionStart;
    }
    if let Some(caps) = AGENDA_MARKER.captures(trimmed) {
        let number = caps[1].parse().unwrap_or(0);
        return LineClass::AgendaMarker(number);
    }
    if REACTION.is_match(trimmed) {
        return LineClass::Reaction;
    }
    if let Some(caps) = SPEAKER_MP.captures(trimmed) {
        return LineClass::Speaker {
            name: caps["name"].to_string(),
            affiliation: normalize_party(&caps["party"]),
            rest: caps["rest"].to_string(),
        };
    }
    if let Some(caps) = SPEAKER_PRESIDING.captures(trimmed) {
        return LineClass::Speaker {
            name: caps["name"].trim().to_string(),
            affiliation: caps["role"].to_string(),
            rest: caps["rest"].to_string(),
        };
    }
    if let Some(caps) = SPEAKER_GOVERNMENT.captures(trimmed) {
        return LineClass::Speaker {
            name: caps["name"].trim().to_string(),
            affiliation: caps["role"].trim().to_string(),
            rest: caps["rest"].to_string(),
        };
    }
    if let Some(caps) = SPEAKER_STATE.captures(trimmed) {
        return LineClass::Speaker {
            name: caps["name"].trim().to_string(),
            affiliation: caps["role"].trim().to_string(),
            rest: caps["rest"].to_string(),
        };
    }
    LineClass::Text
}

fn normalize_party(raw: &str) -> String {
    // The regex tolerates flexible interior whitespace in multi-word
    // party names; store the canonical single-spaced form.
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Working buffer for the speech currently being accumulated.
struct Speech {
    speaker: String,
    affiliation: String,
    lines: Vec<String>,
}

/// An agenda item whose marker was seen but whose title line is still
/// pending.
struct PendingAgenda {
    number: u32,
}

pub struct TranscriptSegmenter {
    min_chars: usize,
}

impl TranscriptSegmenter {
    pub fn new(min_chars: usize) -> Self {
        Self { min_chars }
    }

    /// Walk the transcript and emit speeches and agenda items.
    pub fn segment(&self, text: &str) -> Vec<RawSegment> {
        let mut segments = Vec::new();
        let mut state = State::Header;
        let mut speech: Option<Speech> = None;
        let mut pending_agenda: Option<PendingAgenda> = None;
        // Section title attached to subsequent speeches.
        let mut current_item: Option<String> = None;

        for line in text.lines() {
            let class = classify(line);
            match (state, class) {
                // ── Header: discard until the body starts ──
                (State::Header, LineClass::SessionStart) => {
                    state = State::Body;
                }
                (State::Header, LineClass::Speaker { name, affiliation, rest }) => {
                    speech = Some(new_speech(name, affiliation, rest));
                    state = State::InSpeech;
                }
                (State::Header, _) => {}

                // ── Speaker lines end the current speech and start the next ──
                (State::Body | State::InSpeech, LineClass::Speaker { name, affiliation, rest }) => {
                    if let Some(done) = speech.take() {
                        self.emit_speech(&mut segments, done, current_item.as_deref());
                    }
                    speech = Some(new_speech(name, affiliation, rest));
                    state = State::InSpeech;
                }

                // ── Agenda markers interrupt whatever was running ──
                (State::Body | State::InSpeech, LineClass::AgendaMarker(number)) => {
                    if let Some(done) = speech.take() {
                        self.emit_speech(&mut segments, done, current_item.as_deref());
                    }
                    pending_agenda = Some(PendingAgenda { number });
                    state = State::Body;
                }

                // ── Body text: either an agenda title or stray prose ──
                (State::Body, LineClass::Text) => {
                    if let Some(agenda) = pending_agenda.take() {
                        let title = line.trim().to_string();
                        current_item = Some(title.clone());
                        segments.push(RawSegment {
                            kind: ChunkKind::AgendaItem,
                            attrs: ChunkAttrs {
                                section: Some(title.clone()),
                                number: Some(agenda.number),
                                ..Default::default()
                            },
                            text: title,
                        });
                    }
                    // Non-speech prose between speeches is procedural
                    // narration; dropped.
                }
                (State::Body, _) => {}

                // ── Inside a speech ──
                (State::InSpeech, LineClass::Text) => {
                    if let Some(s) = speech.as_mut() {
                        s.lines.push(line.trim().to_string());
                    }
                }
                (State::InSpeech, LineClass::Reaction) => {
                    // Reactions inside a running speech stay inline; they
                    // carry the interjection context of the speech.
                    if let Some(s) = speech.as_mut() {
                        s.lines.push(line.trim().to_string());
                    }
                }
                (State::InSpeech, LineClass::Blank) => {
                    if let Some(s) = speech.as_mut() {
                        if s.lines.last().map_or(false, |l| !l.is_empty()) {
                            s.lines.push(String::new());
                        }
                    }
                }
                (State::InSpeech, LineClass::SessionStart | LineClass::Boilerplate) => {}
            }
        }

        if let Some(done) = speech.take() {
            self.emit_speech(&mut segments, done, current_item.as_deref());
        }

        segments
    }

    fn emit_speech(&self, out: &mut Vec<RawSegment>, speech: Speech, section: Option<&str>) {
        let text = clean::normalize(&speech.lines.join("\n"));
        if text.chars().count() < self.min_chars {
            return;
        }
        out.push(RawSegment {
            kind: ChunkKind::Speech,
            attrs: ChunkAttrs {
                speaker: Some(speech.speaker),
                affiliation: Some(speech.affiliation),
                section: section.map(str::to_string),
                number: None,
            },
            text,
        });
    }
}

fn new_speech(name: String, affiliation: String, rest: String) -> Speech {
    let mut lines = Vec::new();
    let rest = rest.trim();
    if !rest.is_empty() {
        lines.push(rest.to_string());
    }
    Speech {
        speaker: name,
        affiliation,
        lines,
    }
}

/// Heuristic for text-detected transcripts: a session-start marker or a
/// recognized speaker line early in the document.
pub fn looks_like_transcript(text: &str) -> bool {
    text.lines().take(200).any(|line| {
        let t = line.trim();
        SESSION_START.is_match(t)
            || SPEAKER_PRESIDING.is_match(t)
            || SPEAKER_MP.is_match(t)
            || SPEAKER_GOVERNMENT.is_match(t)
            || SPEAKER_STATE.is_match(t)
    })
}
