use regex::Regex;
use std::sync::LazyLock;

/// Subject used when a message carries no `Subject` header at all.
pub const MISSING_SUBJECT: &str = "No Subject";

static LEADING_ORDINAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[(\[{]*\s*([0-9]+)[)\]}]*[,.\-_/:\s]*([^\d].*)$").expect("valid regex")
});

static TRAILING_ORDINAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(.*?[^\d])[\s,.\-_/:()\[\]]*([0-9]+)[)\]}]*\s*$").expect("valid regex")
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedSubject {
    pub base: String,
    pub part: Option<u32>,
}

impl ParsedSubject {
    pub fn is_trackable(&self) -> bool {
        self.part.is_some()
    }
}

fn is_anchor_punctuation(ch: char) -> bool {
    ch.is_whitespace()
        || matches!(
            ch,
            ',' | '.' | '-' | '_' | '/' | ':' | '(' | ')' | '[' | ']' | '{' | '}'
        )
}

/// A base left with nothing but brackets and separators, as in `(2)`, cannot
/// name a set. Digits are fine: `1) 2024` is part 1 of `2024`.
fn usable_base(raw: &str) -> Option<String> {
    let base = raw.trim();
    if base.chars().all(is_anchor_punctuation) {
        return None;
    }
    Some(base.to_string())
}

fn leading_form(subject: &str) -> Option<ParsedSubject> {
    let caps = LEADING_ORDINAL.captures(subject)?;
    let part = caps.get(1)?.as_str().parse::<u32>().ok()?;
    let base = usable_base(caps.get(2)?.as_str())?;
    Some(ParsedSubject {
        base,
        part: Some(part),
    })
}

fn trailing_form(subject: &str) -> Option<ParsedSubject> {
    let caps = TRAILING_ORDINAL.captures(subject)?;
    let base = usable_base(caps.get(1)?.as_str())?;
    let part = caps.get(2)?.as_str().parse::<u32>().ok()?;
    Some(ParsedSubject {
        base,
        part: Some(part),
    })
}

/// Split a free-text subject into its set key and ordinal.
///
/// A number at the very start wins over one at the very end. Subjects with
/// neither come back whole with `part == None` and are never tracked.
pub fn parse_subject(raw: &str) -> ParsedSubject {
    let subject = raw.trim();

    if let Some(parsed) = leading_form(subject) {
        return parsed;
    }
    if let Some(parsed) = trailing_form(subject) {
        return parsed;
    }

    ParsedSubject {
        base: subject.to_string(),
        part: None,
    }
}
