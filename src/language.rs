//! Seam for the language classifier.
//!
//! Storage keeps whatever language id it is given; nothing here validates ids
//! against a known set.

use tracing::debug;

/// Language id used when nothing better is known.
pub const PLAINTEXT: &str = "plaintext";

/// A best-guess language for some text.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub language_id: String,
    pub confidence: f32,
}

pub trait LanguageDetector: Send + Sync {
    fn detect(&self, text: &str) -> Option<Detection>;
}

/// Best guess for `text`, or [`PLAINTEXT`].
pub fn language_or_plaintext(detector: &dyn LanguageDetector, text: &str) -> String {
    match detector.detect(text) {
        Some(detection) => {
            debug!(
                "detected language '{}' with confidence {:.2}",
                detection.language_id, detection.confidence
            );
            detection.language_id
        }
        None => PLAINTEXT.to_owned(),
    }
}

/// Recognizes scripts by their `#!` line.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShebangDetector;

impl LanguageDetector for ShebangDetector {
    fn detect(&self, text: &str) -> Option<Detection> {
        let language_id = match shebang_interpreter(text)?.as_str() {
            "python" | "python2" | "python3" | "pypy" | "pypy3" => "python",
            "node" | "nodejs" | "deno" | "bun" => "javascript",
            "sh" | "bash" | "zsh" | "ksh" | "dash" | "ash" => "shell",
            "perl" => "perl",
            "ruby" => "ruby",
            "php" => "php",
            "lua" => "lua",
            _ => return None,
        };
        Some(Detection {
            language_id: language_id.to_owned(),
            confidence: 1.0,
        })
    }
}

/// Shebang first, then the shape of the text, then keyword counts.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicDetector;

impl LanguageDetector for HeuristicDetector {
    fn detect(&self, text: &str) -> Option<Detection> {
        if let Some(detection) = ShebangDetector.detect(text) {
            return Some(detection);
        }

        let trimmed = text.trim();
        if trimmed.is_empty() {
            return None;
        }
        let sample = utf8_prefix(trimmed, SAMPLE_BYTES);
        let lower = sample.to_ascii_lowercase();
        let truncated = sample.len() < trimmed.len();

        let (language_id, confidence) = structured(sample, &lower, truncated)
            .map(|language_id| (language_id, 0.9))
            .or_else(|| scored(&lower))?;
        Some(Detection {
            language_id: language_id.to_owned(),
            confidence,
        })
    }
}

const SAMPLE_BYTES: usize = 32 * 1024;

/// Distinct keyword hits a language needs before it is considered.
const MIN_KEYWORD_HITS: usize = 2;

// Lowercase. Later entries win ties.
const KEYWORDS: &[(&str, &[&str])] = &[
    (
        "rust",
        &["fn ", "let mut ", "impl ", "pub ", "use std::", "println!", "match ", "-> "],
    ),
    (
        "python",
        &["def ", "import ", "elif ", "self.", "print(", "__init__", "):\n"],
    ),
    (
        "javascript",
        &["function ", "const ", "=>", "console.log", "require(", "export ", "document."],
    ),
    (
        "typescript",
        &["interface ", ": string", ": number", "readonly ", "implements "],
    ),
    (
        "go",
        &["package main", "func ", "fmt.", ":= ", "defer ", "chan "],
    ),
    (
        "java",
        &["public class", "import java.", "system.out", "void main", "extends "],
    ),
    (
        "sql",
        &["select ", " from ", "where ", "insert into", "create table", "join "],
    ),
    (
        "shell",
        &["echo ", "\nfi", "\ndone", "if [", "then\n", "esac"],
    ),
];

/// Formats recognizable from their shape alone.
fn structured(sample: &str, lower: &str, truncated: bool) -> Option<&'static str> {
    if sample.starts_with('{') || sample.starts_with('[') {
        let closed = sample.ends_with('}') || sample.ends_with(']');
        if sample.contains('"')
            && (sample.contains(':') || sample.starts_with('['))
            && (closed || truncated)
        {
            return Some("json");
        }
    }

    if lower.starts_with("<!doctype html") || lower.contains("<html") {
        return Some("html");
    }
    if lower.starts_with("<?xml") || (sample.starts_with('<') && lower.contains("</")) {
        return Some("xml");
    }

    if lower.contains("#include") {
        if lower.contains("std::") || lower.contains("cout") || lower.contains("template <") {
            return Some("cpp");
        }
        if lower.contains("int main") || lower.contains("printf") {
            return Some("c");
        }
    }

    if looks_like_toml(sample) {
        return Some("toml");
    }

    None
}

/// A `[section]` header followed somewhere by a `key = value` line.
fn looks_like_toml(sample: &str) -> bool {
    let mut lines = sample.lines().map(str::trim);
    let has_header = lines
        .by_ref()
        .any(|line| line.len() > 2 && line.starts_with('[') && line.ends_with(']'));
    has_header
        && lines.any(|line| {
            !line.starts_with('#') && line.contains(" = ") && !line.contains("==")
        })
}

fn scored(lower: &str) -> Option<(&'static str, f32)> {
    KEYWORDS
        .iter()
        .map(|(language_id, keywords)| {
            let hits = keywords.iter().filter(|keyword| lower.contains(**keyword)).count();
            (*language_id, hits, keywords.len())
        })
        .filter(|(_, hits, _)| *hits >= MIN_KEYWORD_HITS)
        .max_by_key(|(_, hits, _)| *hits)
        .map(|(language_id, hits, total)| (language_id, hits as f32 / total as f32))
}

fn utf8_prefix(text: &str, max_bytes: usize) -> &str {
    if text.len() <= max_bytes {
        return text;
    }
    let mut end = max_bytes;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

fn shebang_interpreter(text: &str) -> Option<String> {
    let line = text.lines().next()?.trim().strip_prefix("#!")?.trim();

    let mut parts = line.split_whitespace();
    let mut interpreter = parts.next()?;
    // `#!/usr/bin/env -S python3 -u`
    if basename(interpreter) == "env" {
        interpreter = parts.find(|arg| !arg.starts_with('-'))?;
    }

    let name = basename(interpreter);
    (!name.is_empty()).then(|| name.to_ascii_lowercase())
}

fn basename(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}
