//! Heuristic segmentation of free-text abstracts into labeled sections.
//!
//! Two-stage pipeline: a deliberately narrow detection regex proposes header
//! candidates, then a fixed allow-list of known scientific-abstract headers
//! filters them. The allow-list can grow without touching the detection
//! pattern. This is a heuristic, not a grammar; occasional false
//! positives/negatives are an accepted trade-off.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// One rendering fragment. `display_label` is `None` for preamble text that
/// precedes the first detected header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbstractSection {
    pub display_label: Option<String>,
    pub content: String,
}

const MAX_HEADER_LEN: usize = 30;
const MIN_PREAMBLE_LEN: usize = 20;
/// Candidates starting this close to an accepted one are the same header
/// matched twice by overlapping anchor alternatives.
const DEDUPE_WINDOW: usize = 3;

/// Known section headers, lowercased. "X and Y" joins are accepted when
/// every joined part is independently listed.
const KNOWN_HEADERS: &[&str] = &[
    "abstract",
    "aim",
    "aims",
    "analysis",
    "background",
    "conclusion",
    "conclusions",
    "context",
    "data sources",
    "design",
    "discussion",
    "findings",
    "funding",
    "hypothesis",
    "implications",
    "importance",
    "interpretation",
    "intervention",
    "interventions",
    "introduction",
    "limitations",
    "main outcome measures",
    "materials",
    "measurements",
    "measures",
    "methodology",
    "methods",
    "objective",
    "objectives",
    "observations",
    "outcomes",
    "participants",
    "patients",
    "population",
    "purpose",
    "rationale",
    "relevance",
    "results",
    "setting",
    "significance",
    "study design",
    "subjects",
    "summary",
    "trial registration",
];

/// Short capitalized phrase (1-4 words) ending in a colon, anchored at
/// start-of-text or a sentence boundary. Long declarative sentences that
/// happen to contain a colon do not match.
static HEADER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:^|[.!?;]\s+)([A-Z][A-Za-z]*(?: (?:and )?[A-Z][A-Za-z]*){0,3}):")
        .expect("valid header regex")
});

static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").expect("valid tag regex"));
static DEC_ENTITY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"&#(\d+);").expect("valid entity regex"));
static HEX_ENTITY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"&#x([0-9A-Fa-f]+);").expect("valid entity regex"));

const NAMED_ENTITIES: &[(&str, &str)] = &[
    ("&amp;", "&"),
    ("&lt;", "<"),
    ("&gt;", ">"),
    ("&quot;", "\""),
    ("&apos;", "'"),
    ("&nbsp;", " "),
    ("&alpha;", "α"),
    ("&beta;", "β"),
    ("&mu;", "μ"),
    ("&le;", "≤"),
    ("&ge;", "≥"),
    ("&plusmn;", "±"),
    ("&ndash;", "\u{2013}"),
    ("&mdash;", "\u{2014}"),
    ("&rsquo;", "\u{2019}"),
];

#[derive(Debug)]
struct HeaderCandidate {
    label: String,
    header_start: usize,
    content_start: usize,
}

/// Segment a raw (possibly HTML-entity-laden) abstract into ordered
/// fragments. Pure: segmenting the same input twice is byte-identical.
pub fn segment(raw: &str) -> Vec<AbstractSection> {
    if raw.trim().is_empty() {
        return vec![AbstractSection {
            display_label: Some("Abstract".to_string()),
            content: "No abstract available.".to_string(),
        }];
    }

    let text = sanitize(raw);
    let headers = detect_headers(&text);

    // One signal is not worth segmenting over.
    if headers.len() < 2 {
        return vec![AbstractSection {
            display_label: Some("Abstract".to_string()),
            content: clean_content(&text, None),
        }];
    }

    let mut sections = Vec::new();

    let leading = text[..headers[0].header_start].trim();
    if leading.len() > MIN_PREAMBLE_LEN {
        sections.push(AbstractSection {
            display_label: None,
            content: clean_content(leading, None),
        });
    }

    for (i, header) in headers.iter().enumerate() {
        let span_end = headers
            .get(i + 1)
            .map(|next| next.header_start)
            .unwrap_or(text.len());
        let body = &text[header.content_start..span_end];
        sections.push(AbstractSection {
            display_label: Some(display_label(&header.label)),
            content: clean_content(body, Some(&header.label)),
        });
    }

    sections
}

fn sanitize(raw: &str) -> String {
    let mut text = TAG_RE.replace_all(raw, " ").to_string();
    for (entity, replacement) in NAMED_ENTITIES {
        text = text.replace(entity, replacement);
    }
    text = DEC_ENTITY_RE
        .replace_all(&text, |caps: &regex::Captures| {
            caps[1]
                .parse::<u32>()
                .ok()
                .and_then(char::from_u32)
                .map(|c| c.to_string())
                .unwrap_or_else(|| caps[0].to_string())
        })
        .to_string();
    text = HEX_ENTITY_RE
        .replace_all(&text, |caps: &regex::Captures| {
            u32::from_str_radix(&caps[1], 16)
                .ok()
                .and_then(char::from_u32)
                .map(|c| c.to_string())
                .unwrap_or_else(|| caps[0].to_string())
        })
        .to_string();

    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Stage one (detection) and stage two (allow-list filter), plus
/// near-adjacent dedupe.
fn detect_headers(text: &str) -> Vec<HeaderCandidate> {
    let mut accepted: Vec<HeaderCandidate> = Vec::new();

    for caps in HEADER_RE.captures_iter(text) {
        let Some(label_match) = caps.get(1) else {
            continue;
        };
        let label = label_match.as_str();
        if label.len() > MAX_HEADER_LEN || !is_known_header(label) {
            continue;
        }
        let header_start = label_match.start();
        if accepted
            .last()
            .is_some_and(|prev| header_start.saturating_sub(prev.header_start) <= DEDUPE_WINDOW)
        {
            continue;
        }
        accepted.push(HeaderCandidate {
            label: label.to_string(),
            header_start,
            content_start: caps.get(0).map(|m| m.end()).unwrap_or(header_start),
        });
    }

    accepted
}

fn is_known_header(label: &str) -> bool {
    let key = label.to_lowercase();
    if KNOWN_HEADERS.contains(&key.as_str()) {
        return true;
    }
    let parts: Vec<&str> = key.split(" and ").collect();
    parts.len() > 1 && parts.iter().all(|part| KNOWN_HEADERS.contains(part))
}

/// Title-case only fully upper-case headers ("METHODS" -> "Methods");
/// intentional mixed-case phrasing is preserved as-is.
fn display_label(label: &str) -> String {
    let fully_upper = label
        .chars()
        .filter(|c| c.is_alphabetic())
        .all(|c| c.is_uppercase());
    if !fully_upper {
        return label.to_string();
    }
    label
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>()
                    + &chars.as_str().to_lowercase(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Normalize a section body: drop a redundant repetition of its own header,
/// trim stray punctuation, and close with sentence punctuation.
fn clean_content(body: &str, label: Option<&str>) -> String {
    let mut content = body.trim();

    if let Some(label) = label {
        content = strip_repeated_header(content, label);
    }

    let content = content
        .trim_start_matches([' ', '.', ',', ';', ':', '-'])
        .trim_end_matches([' ', ',', ';', ':', '-'])
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");

    if content.is_empty() {
        return content;
    }
    if content.ends_with(['.', '!', '?']) {
        content
    } else {
        format!("{content}.")
    }
}

/// Some feeds reopen a section body with its own header ("Methods: Methods:
/// We ..."). Match tolerantly in both directions: the repeated phrase may be
/// a superstring or substring of the section's label.
fn strip_repeated_header<'a>(content: &'a str, label: &str) -> &'a str {
    // Scan by char so the window never lands inside a multibyte character.
    let Some(colon) = content
        .char_indices()
        .take_while(|(i, _)| *i <= MAX_HEADER_LEN + 10)
        .find(|(_, c)| *c == ':')
        .map(|(i, _)| i)
    else {
        return content;
    };
    let prefix = content[..colon].trim().to_lowercase();
    let label = label.to_lowercase();
    if !prefix.is_empty() && (prefix.contains(&label) || label.contains(&prefix)) {
        &content[colon + 1..]
    } else {
        content
    }
}
