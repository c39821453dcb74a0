//! Cover-letter cleanup: turns raw model output into a bare letter body.
//!
//! The document-composition step adds its own header, greeting and signature, so
//! anything of that kind the model wrote anyway is removed here. The passes run in a
//! fixed order; header removal must see the text before placeholders are stripped, and
//! whitespace is normalised last.

use once_cell::sync::Lazy;
use regex::Regex;

/// How many leading lines are inspected when deciding whether a header block exists.
const HEADER_SCAN_LINES: usize = 8;
/// How many trailing non-empty lines may hold the closing phrase.
const SIGNATURE_SCAN_LINES: usize = 6;

static FENCE_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*```").expect("valid regex"));

static GREETING_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^\s*(?:dear\s+[^\n]{1,80}?[,:!]?|to whom it may concern[,:!.]?|(?:hello|hi|greetings)(?:\s+[^\n]{0,60}?)?[,:!])\s*$",
    )
    .expect("valid regex")
});

static DATE_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^\s*(?:(?:jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec)[a-z]*\.?\s+\d{1,2}(?:st|nd|rd|th)?,?\s+\d{4}|\d{1,2}\s+(?:jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec)[a-z]*\.?,?\s+\d{4}|\d{1,2}[/.\-]\d{1,2}[/.\-]\d{2,4}|\d{4}-\d{2}-\d{2}|\[(?:today'?s\s+)?date\])\s*$",
    )
    .expect("valid regex")
});

static CONTACT_MARKER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)[\w.+\-]+@[\w\-]+\.[\w.\-]+|(?:\+\d{1,3}[\s.\-]?)?(?:\(\d{3}\)\s?|\b\d{3}[\s.\-])\d{3}[\s.\-]\d{4}\b|^\s*(?:phone|tel|mobile|email|e-mail|address|linkedin)\s*:|\b(?:street|avenue|ave\.|road|rd\.|boulevard|blvd|suite|apt\.?|lane|p\.?\s?o\.?\s+box)\b|\[(?:your\s+|company\s+)?(?:address|email|phone)[^\]]*\]",
    )
    .expect("valid regex")
});

/// `Springfield, IL 62704`: a ZIP code only counts next to a state abbreviation.
static CITY_STATE_ZIP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[A-Za-z],\s*[A-Z]{2}\s+\d{5}(?:-\d{4})?\b").expect("valid regex"));

static WHOLE_PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*\[[^\]\n]+\]\s*$").expect("valid regex"));

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\[(?:your|company|hiring|recipient|today'?s|date|employer|job|position|role|address|city|state|zip|phone|email|platform|source|name|manager|insert)[^\]\n]{0,40}\]",
    )
    .expect("valid regex")
});

static SPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t]{2,}").expect("valid regex"));

static CLOSING_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^\s*(?:sincerely|best regards|kind regards|warm regards|warmest regards|regards|respectfully|yours truly|yours sincerely|yours faithfully|thank you|thanks|cheers|best|with gratitude)[\s,.!]*$",
    )
    .expect("valid regex")
});

static EXCESS_NEWLINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").expect("valid regex"));

static MISSING_SPACE_AFTER_PERIOD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([a-z])\.([A-Z][a-z])").expect("valid regex"));

static MISSING_SPACE_AFTER_COMMA: Lazy<Regex> =
    Lazy::new(|| Regex::new(r",([A-Za-z])").expect("valid regex"));

/// Cleans a generated cover-letter body. `clean(clean(x)) == clean(x)`.
/// Passes repeat until the text stops changing.
pub fn clean(raw: &str) -> String {
    let mut text = clean_once(raw);
    loop {
        let next = clean_once(&text);
        if next == text {
            return text;
        }
        text = next;
    }
}

fn clean_once(raw: &str) -> String {
    let lines: Vec<&str> = raw.lines().map(str::trim_end).collect();

    let lines = strip_fences(lines);
    let lines = strip_greetings(lines);
    let lines = strip_header_block(lines);
    let lines = strip_placeholders(lines);
    let lines = strip_signature(lines);

    let text = lines.join("\n");
    let text = EXCESS_NEWLINES.replace_all(&text, "\n\n");
    let text = MISSING_SPACE_AFTER_PERIOD.replace_all(&text, "$1. $2");
    let text = MISSING_SPACE_AFTER_COMMA.replace_all(&text, ", $1");
    text.trim().to_string()
}

fn strip_fences(lines: Vec<&str>) -> Vec<&str> {
    lines.into_iter().filter(|l| !FENCE_LINE.is_match(l)).collect()
}

fn strip_greetings(lines: Vec<&str>) -> Vec<&str> {
    lines.into_iter().filter(|l| !GREETING_LINE.is_match(l)).collect()
}

/// Removes a leading date/address/contact block, but only when the opening lines
/// actually look like one.
fn strip_header_block(lines: Vec<&str>) -> Vec<&str> {
    let has_header = lines
        .iter()
        .filter(|l| !l.trim().is_empty())
        .take(HEADER_SCAN_LINES)
        .any(|l| looks_like_contact_or_date(l));
    if !has_header {
        return lines;
    }
    let body_start = lines
        .iter()
        .position(|l| !l.trim().is_empty() && !is_header_line(l))
        .unwrap_or(lines.len());
    lines[body_start..].to_vec()
}

fn looks_like_contact_or_date(line: &str) -> bool {
    DATE_LINE.is_match(line) || CONTACT_MARKER.is_match(line) || CITY_STATE_ZIP.is_match(line)
}

/// A line of four or more words ending in `.`, `!` or `?` is prose. `123 Main Ave.` is not.
fn reads_as_sentence(line: &str) -> bool {
    line.ends_with(['.', '!', '?']) && line.split_whitespace().count() >= 4
}

fn is_header_line(line: &str) -> bool {
    let line = line.trim();
    if reads_as_sentence(line) {
        return false;
    }
    let len = line.chars().count();
    if len <= 60 && (looks_like_contact_or_date(line) || WHOLE_PLACEHOLDER.is_match(line)) {
        return true;
    }
    // Short unpunctuated lines in a header are names, titles and company names.
    len <= 40 && !line.ends_with(['.', '!', '?'])
}

/// Removes known bracketed placeholders; lines left empty by the removal are dropped.
fn strip_placeholders(lines: Vec<&str>) -> Vec<String> {
    lines
        .into_iter()
        .filter_map(|line| {
            if !PLACEHOLDER.is_match(line) {
                return Some(line.to_string());
            }
            let replaced = PLACEHOLDER.replace_all(line, "");
            let replaced = SPACE_RUN.replace_all(replaced.trim_end(), " ");
            (!replaced.trim().is_empty()).then(|| replaced.into_owned())
        })
        .collect()
}

/// Cuts everything from the first closing phrase among the last few non-empty lines,
/// so stacked sign-offs go in one pass.
fn strip_signature(mut lines: Vec<String>) -> Vec<String> {
    let tail_start = lines
        .iter()
        .enumerate()
        .rev()
        .filter(|(_, l)| !l.trim().is_empty())
        .take(SIGNATURE_SCAN_LINES)
        .last()
        .map(|(i, _)| i)
        .unwrap_or(0);

    if let Some(cut) = (tail_start..lines.len()).find(|&i| CLOSING_LINE.is_match(&lines[i])) {
        lines.truncate(cut);
    }
    lines
}
