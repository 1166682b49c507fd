//! Structured-document segmentation for printed matter (Drucksachen).
//!
//! Dispatches on document category to one of several line parsers:
//!
//! - bills: overview sections `A.`–`F.`, `Artikel N` headers, and the
//!   rationale (`Begründung`) with its general/specific parts and
//!   per-article subsections;
//! - inquiries: preamble up to the "Wir fragen die Bundesregierung"
//!   marker, then sequentially numbered questions;
//! - motions: the "Der Bundestag wolle beschließen" marker, numbered
//!   resolution points, and a rationale whose "Zu Nummer N" references
//!   link back to point numbers;
//! - reports: roman-numeral and lettered major headers;
//! - everything else: fixed-size paragraph fallback.
//!
//! All parsers drop known boilerplate lines before accumulation.

use regex::Regex;
use std::sync::LazyLock;

use super::RawSegment;
use crate::models::{ChunkAttrs, ChunkKind, DocCategory};
use crate::segment::clean;

/// Overview-section header in a bill: "A. Problem und Ziel" … "F. Weitere Kosten".
static OVERVIEW_HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-F])\.\s+(\S.*)$").unwrap());

/// "Artikel 1" / "Artikel 12 Änderung des …"
static ARTICLE_HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^Artikel\s+(\d+)\s*(.*)$").unwrap());

static RATIONALE_HEADER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^Begründung$").unwrap());

static GENERAL_PART: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:[AB]\.\s+)?Allgemeiner Teil$").unwrap());

static SPECIFIC_PART: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:[AB]\.\s+)?Besonderer Teil$").unwrap());

/// Per-article rationale subsection: "Zu Artikel 3"
static TO_ARTICLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^Zu Artikel\s+(\d+)\b.*$").unwrap());

/// Inquiry marker: "Wir fragen die Bundesregierung:"
static INQUIRY_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^Wir fragen die Bundesregierung:?$").unwrap());

/// Resolution marker: "Der Bundestag wolle beschließen:"
static RESOLUTION_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^Der Bundestag wolle beschließen:?$").unwrap());

/// Numbered item: "1. Wie viele …"
static NUMBERED_ITEM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{1,3})\.\s+(\S.*)$").unwrap());

/// Rationale reference to a resolution point: "Zu Nummer 2"
static TO_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^Zu Nummer\s+(\d+)\b.*$").unwrap());

/// Roman-numeral major header in reports: "II. Beratungsverlauf"
static ROMAN_HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(X{0,3}(?:IX|IV|V?I{1,3}|V|X))\.\s+(\S.*)$").unwrap());

/// Lettered major header in reports: "B. Lösung" (same shape as the
/// bill overview but without the fixed A–F meaning).
static LETTER_HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Z])\.\s+(\S.*)$").unwrap());

pub struct DocumentSegmenter {
    fallback_chars: usize,
}

impl DocumentSegmenter {
    pub fn new(fallback_chars: usize) -> Self {
        Self { fallback_chars }
    }

    pub fn segment(&self, category: DocCategory, text: &str) -> Vec<RawSegment> {
        let lines: Vec<&str> = text
            .lines()
            .filter(|l| !clean::is_boilerplate(l))
            .collect();

        match category {
            DocCategory::Bill => parse_bill(&lines),
            DocCategory::Inquiry => parse_inquiry(&lines),
            DocCategory::Motion => parse_motion(&lines),
            DocCategory::Report => parse_report(&lines, self.fallback_chars),
            _ => paragraph_fallback(&lines, self.fallback_chars),
        }
    }
}

/// Accumulates lines for the segment currently being built and flushes
/// it when the next header starts. Shared by all line parsers.
struct Builder {
    out: Vec<RawSegment>,
    kind: ChunkKind,
    attrs: ChunkAttrs,
    lines: Vec<String>,
}

impl Builder {
    fn new(kind: ChunkKind) -> Self {
        Self {
            out: Vec::new(),
            kind,
            attrs: ChunkAttrs::default(),
            lines: Vec::new(),
        }
    }

    fn push_line(&mut self, line: &str) {
        self.lines.push(line.trim().to_string());
    }

    /// Flush the current segment and start a new one.
    fn next(&mut self, kind: ChunkKind, attrs: ChunkAttrs) {
        self.flush();
        self.kind = kind;
        self.attrs = attrs;
    }

    fn flush(&mut self) {
        let text = clean::normalize(&self.lines.join("\n"));
        self.lines.clear();
        if !text.is_empty() {
            self.out.push(RawSegment {
                kind: self.kind,
                attrs: self.attrs.clone(),
                text,
            });
        }
    }

    fn finish(mut self) -> Vec<RawSegment> {
        self.flush();
        self.out
    }
}

fn section_attrs(title: &str) -> ChunkAttrs {
    ChunkAttrs {
        section: Some(title.trim().to_string()),
        ..Default::default()
    }
}

/// Lettered-section/article parser for bills.
fn parse_bill(lines: &[&str]) -> Vec<RawSegment> {
    #[derive(PartialEq)]
    enum Mode {
        Overview,
        Rationale,
    }

    let mut b = Builder::new(ChunkKind::Preamble);
    let mut mode = Mode::Overview;

    for raw in lines {
        let line = raw.trim();
        if mode == Mode::Overview && RATIONALE_HEADER.is_match(line) {
            mode = Mode::Rationale;
            b.next(ChunkKind::Rationale, section_attrs("Begründung"));
            continue;
        }

        match mode {
            Mode::Overview => {
                if let Some(caps) = OVERVIEW_HEADER.captures(line) {
                    b.next(ChunkKind::Section, section_attrs(&caps[2]));
                } else if let Some(caps) = ARTICLE_HEADER.captures(line) {
                    let number: u32 = caps[1].parse().unwrap_or(0);
                    let title = caps[2].trim();
                    let mut attrs = ChunkAttrs {
                        number: Some(number),
                        ..Default::default()
                    };
                    attrs.section = if title.is_empty() {
                        Some(format!("Artikel {}", number))
                    } else {
                        Some(format!("Artikel {} {}", number, title))
                    };
                    b.next(ChunkKind::Article, attrs);
                } else {
                    b.push_line(line);
                }
            }
            Mode::Rationale => {
                if GENERAL_PART.is_match(line) {
                    b.next(ChunkKind::Rationale, section_attrs("Allgemeiner Teil"));
                } else if SPECIFIC_PART.is_match(line) {
                    b.next(ChunkKind::Rationale, section_attrs("Besonderer Teil"));
                } else if let Some(caps) = TO_ARTICLE.captures(line) {
                    let number: u32 = caps[1].parse().unwrap_or(0);
                    let mut attrs = section_attrs(line);
                    attrs.number = Some(number);
                    b.next(ChunkKind::Rationale, attrs);
                } else {
                    b.push_line(line);
                }
            }
        }
    }
    b.finish()
}

/// Numbered-question parser for inquiries.
///
/// Only a number that is exactly one greater than the previous question
/// starts a new question; interior enumerations inside a question body
/// do not.
fn parse_inquiry(lines: &[&str]) -> Vec<RawSegment> {
    let mut b = Builder::new(ChunkKind::Preamble);
    let mut in_questions = false;
    let mut next_number: u32 = 1;

    for raw in lines {
        let line = raw.trim();
        if !in_questions {
            if INQUIRY_MARKER.is_match(line) {
                in_questions = true;
            } else {
                b.push_line(line);
            }
            continue;
        }
        match NUMBERED_ITEM.captures(line) {
            Some(caps) if caps[1].parse() == Ok(next_number) => {
                let mut attrs = ChunkAttrs::default();
                attrs.number = Some(next_number);
                b.next(ChunkKind::Question, attrs);
                b.push_line(&caps[2]);
                next_number += 1;
            }
            _ => b.push_line(line),
        }
    }
    b.finish()
}

/// Numbered-resolution-point parser for motions.
fn parse_motion(lines: &[&str]) -> Vec<RawSegment> {
    #[derive(PartialEq)]
    enum Mode {
        Preamble,
        Points,
        Rationale,
    }

    let mut b = Builder::new(ChunkKind::Preamble);
    let mut mode = Mode::Preamble;
    let mut next_number: u32 = 1;

    for raw in lines {
        let line = raw.trim();
        if mode != Mode::Rationale && RATIONALE_HEADER.is_match(line) {
            mode = Mode::Rationale;
            b.next(ChunkKind::Rationale, section_attrs("Begründung"));
            continue;
        }

        match mode {
            Mode::Preamble => {
                if RESOLUTION_MARKER.is_match(line) {
                    mode = Mode::Points;
                } else {
                    b.push_line(line);
                }
            }
            Mode::Points => match NUMBERED_ITEM.captures(line) {
                Some(caps) if caps[1].parse() == Ok(next_number) => {
                    let mut attrs = ChunkAttrs::default();
                    attrs.number = Some(next_number);
                    b.next(ChunkKind::ResolutionPoint, attrs);
                    b.push_line(&caps[2]);
                    next_number += 1;
                }
                _ => b.push_line(line),
            },
            Mode::Rationale => {
                if let Some(caps) = TO_NUMBER.captures(line) {
                    let number: u32 = caps[1].parse().unwrap_or(0);
                    let mut attrs = section_attrs(line);
                    attrs.number = Some(number);
                    b.next(ChunkKind::Rationale, attrs);
                } else {
                    b.push_line(line);
                }
            }
        }
    }
    b.finish()
}

/// Generic roman/major-header parser for reports. Falls back to
/// paragraph chunking when no headers are found at all.
fn parse_report(lines: &[&str], fallback_chars: usize) -> Vec<RawSegment> {
    let has_headers = lines
        .iter()
        .any(|l| ROMAN_HEADER.is_match(l.trim()) || LETTER_HEADER.is_match(l.trim()));
    if !has_headers {
        return paragraph_fallback(lines, fallback_chars);
    }

    let mut b = Builder::new(ChunkKind::Preamble);
    for raw in lines {
        let line = raw.trim();
        if let Some(caps) = ROMAN_HEADER.captures(line) {
            b.next(
                ChunkKind::Section,
                section_attrs(&format!("{}. {}", &caps[1], &caps[2])),
            );
        } else if let Some(caps) = LETTER_HEADER.captures(line) {
            b.next(
                ChunkKind::Section,
                section_attrs(&format!("{}. {}", &caps[1], &caps[2])),
            );
        } else {
            b.push_line(line);
        }
    }
    b.finish()
}

/// Fixed-size paragraph fallback for unrecognized categories.
///
/// Accumulates paragraphs up to a soft cap, flushing between them.
/// Direct generalization of the paragraph chunker used elsewhere in the
/// pipeline's ancestry: indices stay contiguous and the split points
/// depend only on the input text.
fn paragraph_fallback(lines: &[&str], soft_cap: usize) -> Vec<RawSegment> {
    let text = clean::normalize(&lines.join("\n"));
    let mut out = Vec::new();
    let mut buf = String::new();

    for para in text.split("\n\n") {
        let para = para.trim();
        if para.is_empty() {
            continue;
        }
        let buf_len = buf.chars().count();
        let para_len = para.chars().count();
        if buf_len > 0 && buf_len + 2 + para_len > soft_cap {
            out.push(RawSegment {
                kind: ChunkKind::Paragraph,
                attrs: ChunkAttrs::default(),
                text: std::mem::take(&mut buf),
            });
        }
        if !buf.is_empty() {
            buf.push_str("\n\n");
        }
        buf.push_str(para);
    }
    if !buf.is_empty() {
        out.push(RawSegment {
            kind: ChunkKind::Paragraph,
            attrs: ChunkAttrs::default(),
            text: buf,
        });
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segmenter() -> DocumentSegmenter {
        DocumentSegmenter::new(3500)
    }

    const BILL: &str = "\
Deutscher Bundestag – 20. Wahlperiode
Drucksache 20/4321
Gesetzentwurf der Bundesregierung

A. Problem und Ziel
Die bestehenden Regelungen genügen den Anforderungen nicht mehr
und müssen grundlegend überarbeitet werden.

B. Lösung
Erlass der nachstehenden Vorschriften mit klaren Zuständigkeiten.

C. Alternativen
Keine.

D. Haushaltsausgaben ohne Erfüllungsaufwand
Keine unmittelbaren Mehrausgaben für den Bundeshaushalt.

E. Erfüllungsaufwand
Für die Wirtschaft entsteht einmaliger Umstellungsaufwand.

F. Weitere Kosten
Auswirkungen auf das Preisniveau sind nicht zu erwarten.

Artikel 1 Änderung des Beispielgesetzes
Das Beispielgesetz wird wie folgt geändert: Paragraf 1 erhält die
aus der Anlage ersichtliche Fassung.

Artikel 2 Inkrafttreten
Dieses Gesetz tritt am Tag nach der Verkündung in Kraft.

Begründung

Allgemeiner Teil
Der Entwurf dient der Umsetzung der angekündigten Reform.

Besonderer Teil

Zu Artikel 1
Die Änderung stellt die Vereinbarkeit mit dem Unionsrecht her.

Zu Artikel 2
Die Vorschrift regelt das Inkrafttreten.
ISSN 0722-8333
";

    #[test]
    fn bill_yields_one_chunk_per_section_and_article() {
        let segs = segmenter().segment(DocCategory::Bill, BILL);
        let sections: Vec<_> = segs.iter().filter(|s| s.kind == ChunkKind::Section).collect();
        let articles: Vec<_> = segs.iter().filter(|s| s.kind == ChunkKind::Article).collect();

        assert_eq!(sections.len(), 6);
        assert_eq!(sections[0].attrs.section.as_deref(), Some("Problem und Ziel"));
        assert_eq!(sections[5].attrs.section.as_deref(), Some("Weitere Kosten"));

        assert_eq!(articles.len(), 2);
        assert_eq!(articles[0].attrs.number, Some(1));
        assert_eq!(
            articles[0].attrs.section.as_deref(),
            Some("Artikel 1 Änderung des Beispielgesetzes")
        );
        assert_eq!(articles[1].attrs.number, Some(2));
    }

    #[test]
    fn bill_boilerplate_is_filtered() {
        let segs = segmenter().segment(DocCategory::Bill, BILL);
        for s in &segs {
            assert!(!s.text.contains("Drucksache"), "boilerplate in: {}", s.text);
            assert!(!s.text.contains("ISSN"));
            assert!(!s.text.contains("Wahlperiode"));
        }
    }

    #[test]
    fn bill_rationale_subsections() {
        let segs = segmenter().segment(DocCategory::Bill, BILL);
        let rationale: Vec<_> = segs.iter().filter(|s| s.kind == ChunkKind::Rationale).collect();
        let sections: Vec<_> = rationale
            .iter()
            .filter_map(|s| s.attrs.section.as_deref())
            .collect();
        assert!(sections.contains(&"Allgemeiner Teil"));
        assert!(sections.contains(&"Zu Artikel 1"));
        let per_article: Vec<_> = rationale
            .iter()
            .filter(|s| s.attrs.number.is_some())
            .collect();
        assert_eq!(per_article.len(), 2);
        assert_eq!(per_article[0].attrs.number, Some(1));
        assert!(per_article[0].text.contains("Unionsrecht"));
    }

    const INQUIRY: &str = "\
Kleine Anfrage
der Abgeordneten Dr. Eva Beispiel und der Fraktion

Die Digitalisierung der Verwaltung kommt seit Jahren nur schleppend
voran, wie mehrere Prüfberichte übereinstimmend feststellen.

Wir fragen die Bundesregierung:

1. Wie viele Verwaltungsleistungen sind bislang vollständig digital
verfügbar?

2. Welche Mittel wurden seit 2020 dafür aufgewendet?

3. Wie bewertet die Bundesregierung den bisherigen Fortschritt?

4. Welche Hindernisse sieht sie bei der Umsetzung, insbesondere
1. bei den Ländern und 2. bei den Kommunen?

5. Bis wann sollen alle Leistungen digital verfügbar sein?
";

    #[test]
    fn inquiry_yields_numbered_questions_plus_preamble() {
        let segs = segmenter().segment(DocCategory::Inquiry, INQUIRY);
        let preambles: Vec<_> = segs.iter().filter(|s| s.kind == ChunkKind::Preamble).collect();
        let questions: Vec<_> = segs.iter().filter(|s| s.kind == ChunkKind::Question).collect();

        assert_eq!(preambles.len(), 1);
        assert!(preambles[0].text.contains("Digitalisierung"));

        assert_eq!(questions.len(), 5);
        for (i, q) in questions.iter().enumerate() {
            assert_eq!(q.attrs.number, Some(i as u32 + 1));
        }
        // The interior enumeration in question 4 must not split it.
        assert!(questions[3].text.contains("bei den Kommunen"));
    }

    const MOTION: &str = "\
Antrag
der Fraktion Beispiel

Der Bundestag stellt fest, dass der Ausbau erneuerbarer Energien
weiter beschleunigt werden muss.

Der Bundestag wolle beschließen:

1. Die Bundesregierung wird aufgefordert, ein Maßnahmenpaket
vorzulegen.

2. Die Genehmigungsverfahren sind deutlich zu verkürzen.

3. Über den Fortschritt ist jährlich zu berichten.

Begründung

Der Ausbau stockt seit Jahren an denselben Stellen.

Zu Nummer 1
Ein gebündeltes Paket schafft Planungssicherheit.

Zu Nummer 3
Regelmäßige Berichte ermöglichen parlamentarische Kontrolle.
";

    #[test]
    fn motion_points_and_linked_rationale() {
        let segs = segmenter().segment(DocCategory::Motion, MOTION);
        let points: Vec<_> = segs
            .iter()
            .filter(|s| s.kind == ChunkKind::ResolutionPoint)
            .collect();
        assert_eq!(points.len(), 3);
        assert_eq!(points[0].attrs.number, Some(1));
        assert_eq!(points[2].attrs.number, Some(3));

        let linked: Vec<_> = segs
            .iter()
            .filter(|s| s.kind == ChunkKind::Rationale && s.attrs.number.is_some())
            .collect();
        assert_eq!(linked.len(), 2);
        assert_eq!(linked[0].attrs.number, Some(1));
        assert_eq!(linked[1].attrs.number, Some(3));
        assert!(linked[1].text.contains("parlamentarische Kontrolle"));
    }

    #[test]
    fn report_headers_become_sections() {
        let text = "\
Bericht des Ausschusses

I. Überweisung
Der Gesetzentwurf wurde federführend überwiesen.

II. Beratungsverlauf
Der Ausschuss hat den Entwurf in zwei Sitzungen beraten.
";
        let segs = segmenter().segment(DocCategory::Report, text);
        let sections: Vec<_> = segs.iter().filter(|s| s.kind == ChunkKind::Section).collect();
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].attrs.section.as_deref(), Some("I. Überweisung"));
        assert_eq!(sections[1].attrs.section.as_deref(), Some("II. Beratungsverlauf"));
    }

    #[test]
    fn unrecognized_category_uses_paragraph_fallback() {
        let paragraphs: Vec<String> = (0..8)
            .map(|i| format!("Absatz {} mit etwas erzählendem Inhalt, der sich wiederholt.", i))
            .collect();
        let text = paragraphs.join("\n\n");
        let segs = DocumentSegmenter::new(120).segment(DocCategory::Proceeding, &text);
        assert!(segs.len() > 1);
        assert!(segs.iter().all(|s| s.kind == ChunkKind::Paragraph));
        assert!(segs.iter().all(|s| s.text.chars().count() <= 120 + 64));
        // No content lost.
        let rejoined = segs
            .iter()
            .map(|s| s.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");
        assert_eq!(rejoined, text);
    }

    #[test]
    fn segmentation_is_deterministic() {
        let a = segmenter().segment(DocCategory::Bill, BILL);
        let b = segmenter().segment(DocCategory::Bill, BILL);
        assert_eq!(a, b);
    }
}
