// SPDX-License-Identifier: GPL-3.0-only

//! Best-effort field extraction from semi-structured tool output
//!
//! A rule set maps field names to regular expressions plus a coercion.
//! Extraction never fails: a field whose pattern does not match, or whose
//! captured text cannot be coerced, is simply absent from the result.

use std::collections::HashMap;
use std::sync::{LazyLock, Mutex, PoisonError};

use nvme_qual_types::{FieldMap, FieldValue};
use regex::{Captures, Regex};
use tracing::warn;

use crate::error::{Result, SysError};

/// Compiled rule patterns, keyed by pattern text. Rule tables are static, so
/// each pattern compiles once per process.
static COMPILED: LazyLock<Mutex<HashMap<&'static str, Regex>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

/// How captured text becomes a [`FieldValue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Coercion {
    /// Hexadecimal integer, with or without a `0x` prefix.
    Hex,
    /// Decimal integer; thousands separators are tolerated.
    Decimal,
    /// Trimmed text; empty text is treated as missing.
    Text,
}

impl Coercion {
    pub fn coerce(self, raw: &str) -> Option<FieldValue> {
        let raw = raw.trim();
        match self {
            Self::Hex => {
                let digits = raw
                    .strip_prefix("0x")
                    .or_else(|| raw.strip_prefix("0X"))
                    .unwrap_or(raw);
                u64::from_str_radix(digits, 16).ok().map(FieldValue::Int)
            }
            Self::Decimal => {
                let digits: String = raw.chars().filter(|c| *c != ',').collect();
                digits.parse::<u64>().ok().map(FieldValue::Int)
            }
            Self::Text => {
                if raw.is_empty() {
                    None
                } else {
                    Some(FieldValue::Text(raw.to_string()))
                }
            }
        }
    }
}

/// A numbered capture group inside a repeated-group match.
#[derive(Debug, Clone, Copy)]
pub struct Capture {
    pub name: &'static str,
    pub group: usize,
    pub coercion: Coercion,
}

impl Capture {
    pub const fn new(name: &'static str, group: usize, coercion: Coercion) -> Self {
        Self {
            name,
            group,
            coercion,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub enum RuleKind {
    /// First match only, value taken from capture group 1.
    Scalar(Coercion),
    /// Every match becomes one entry built from the listed captures.
    Group(&'static [Capture]),
    /// The pattern matches section headers; each section's body (up to the
    /// next header) is parsed with the nested rules and merged with the
    /// header captures.
    Sections {
        header: &'static [Capture],
        fields: &'static [FieldRule],
    },
}

#[derive(Debug, Clone, Copy)]
pub struct FieldRule {
    pub name: &'static str,
    pub pattern: &'static str,
    pub kind: RuleKind,
}

impl FieldRule {
    pub const fn hex(name: &'static str, pattern: &'static str) -> Self {
        Self::scalar(name, pattern, Coercion::Hex)
    }

    pub const fn decimal(name: &'static str, pattern: &'static str) -> Self {
        Self::scalar(name, pattern, Coercion::Decimal)
    }

    pub const fn text(name: &'static str, pattern: &'static str) -> Self {
        Self::scalar(name, pattern, Coercion::Text)
    }

    pub const fn scalar(name: &'static str, pattern: &'static str, coercion: Coercion) -> Self {
        Self {
            name,
            pattern,
            kind: RuleKind::Scalar(coercion),
        }
    }

    pub const fn group(
        name: &'static str,
        pattern: &'static str,
        captures: &'static [Capture],
    ) -> Self {
        Self {
            name,
            pattern,
            kind: RuleKind::Group(captures),
        }
    }

    pub const fn sections(
        name: &'static str,
        pattern: &'static str,
        header: &'static [Capture],
        fields: &'static [FieldRule],
    ) -> Self {
        Self {
            name,
            pattern,
            kind: RuleKind::Sections { header, fields },
        }
    }

    pub fn compile(&self) -> Result<Regex> {
        let mut compiled = COMPILED.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(regex) = compiled.get(self.pattern) {
            return Ok(regex.clone());
        }
        let regex = Regex::new(self.pattern).map_err(|error| SysError::InvalidPattern {
            field: self.name.to_string(),
            reason: error.to_string(),
        })?;
        compiled.insert(self.pattern, regex.clone());
        Ok(regex)
    }

    /// Check this rule and any nested rules compile.
    pub fn validate(&self) -> Result<()> {
        self.compile()?;
        if let RuleKind::Sections { fields, .. } = self.kind {
            for field in fields {
                field.validate()?;
            }
        }
        Ok(())
    }

    /// Apply the rule to `text`. `Ok(None)` means the field is absent.
    ///
    /// Repeated-group rules always yield a (possibly empty) list.
    pub fn apply(&self, text: &str) -> Result<Option<FieldValue>> {
        let pattern = self.compile()?;
        let value = match self.kind {
            RuleKind::Scalar(coercion) => pattern
                .captures(text)
                .and_then(|caps| caps.get(1))
                .and_then(|m| coercion.coerce(m.as_str())),
            RuleKind::Group(captures) => {
                let entries = pattern
                    .captures_iter(text)
                    .map(|caps| collect_captures(&caps, captures))
                    .collect::<Vec<_>>();
                Some(FieldValue::Group(entries))
            }
            RuleKind::Sections { header, fields } => {
                let headers: Vec<Captures<'_>> = pattern.captures_iter(text).collect();
                let mut entries = Vec::with_capacity(headers.len());
                for (index, caps) in headers.iter().enumerate() {
                    let body_start = caps.get(0).map_or(0, |m| m.end());
                    let body_end = headers
                        .get(index + 1)
                        .and_then(|next| next.get(0))
                        .map_or(text.len(), |m| m.start());
                    let mut entry = collect_captures(caps, header);
                    entry.extend(extract(&text[body_start..body_end], fields));
                    entries.push(entry);
                }
                Some(FieldValue::Group(entries))
            }
        };
        Ok(value)
    }
}

fn collect_captures(caps: &Captures<'_>, captures: &[Capture]) -> FieldMap {
    captures
        .iter()
        .filter_map(|capture| {
            let raw = caps.get(capture.group)?;
            let value = capture.coercion.coerce(raw.as_str())?;
            Some((capture.name.to_string(), value))
        })
        .collect()
}

/// Extract every rule's field from `text`.
///
/// Rules are applied in order; a later rule for a name that is already
/// present is skipped, which lets a rule set list fallback patterns. An
/// empty repeated group does not count as present.
pub fn extract(text: &str, rules: &[FieldRule]) -> FieldMap {
    let mut fields = FieldMap::new();
    for rule in rules {
        let settled = match fields.get(rule.name) {
            None => false,
            Some(FieldValue::Group(entries)) => !entries.is_empty(),
            Some(_) => true,
        };
        if settled {
            continue;
        }
        match rule.apply(text) {
            Ok(Some(value)) => {
                fields.insert(rule.name.to_string(), value);
            }
            Ok(None) => {}
            Err(error) => warn!("Skipping field '{}': {}", rule.name, error),
        }
    }
    fields
}

#[cfg(test)]
mod tests {
    use super::*;
    use nvme_qual_types::FieldMapExt;

    #[test]
    fn coercions_are_best_effort() {
        assert_eq!(Coercion::Hex.coerce("0x1f"), Some(FieldValue::Int(0x1f)));
        assert_eq!(Coercion::Hex.coerce("ff"), Some(FieldValue::Int(0xff)));
        assert_eq!(Coercion::Hex.coerce("0xzz"), None);
        assert_eq!(Coercion::Hex.coerce("0x1ffffffffffffffff"), None);
        assert_eq!(Coercion::Decimal.coerce("1,234"), Some(FieldValue::Int(1234)));
        assert_eq!(Coercion::Decimal.coerce("12a"), None);
        assert_eq!(Coercion::Text.coerce("  SAMSUNG  "), Some(FieldValue::from("SAMSUNG")));
        assert_eq!(Coercion::Text.coerce("   "), None);
    }

    #[test]
    fn missing_and_malformed_fields_are_absent() {
        const RULES: &[FieldRule] = &[
            FieldRule::hex("csts", r"(?i)\bcsts\s*:\s*0x([0-9a-z]+)"),
            FieldRule::hex("cc", r"(?i)\bcc\s*:\s*0x([0-9a-f]+)"),
            FieldRule::decimal("mdts", r"(?i)\bmdts\s*:\s*(\d+)"),
        ];
        let fields = extract("csts : 0xnothex\nmdts : 5\n", RULES);
        assert_eq!(fields.int("csts"), None);
        assert_eq!(fields.int("cc"), None);
        assert_eq!(fields.int("mdts"), Some(5));
        assert_eq!(fields.len(), 1);
    }

    #[test]
    fn later_rules_act_as_fallbacks() {
        const RULES: &[FieldRule] = &[
            FieldRule::hex("critical_warning", r"(?i)\bcritical_warning\s*:\s*0x([0-9a-f]+)"),
            FieldRule::decimal("critical_warning", r"(?i)\bcritical_warning\s*:\s*(\d+)\b"),
        ];
        assert_eq!(extract("critical_warning : 0x10", RULES).int("critical_warning"), Some(0x10));
        assert_eq!(extract("critical_warning : 4", RULES).int("critical_warning"), Some(4));
    }

    #[test]
    fn group_collects_every_match_in_order() {
        const CAPTURES: &[Capture] = &[
            Capture::new("format_id", 1, Coercion::Decimal),
            Capture::new("metadata_size", 2, Coercion::Decimal),
        ];
        const RULES: &[FieldRule] = &[FieldRule::group(
            "lba_formats",
            r"(?i)\blbaf\s*(\d+)\s*:\s*ms:(\d+)",
            CAPTURES,
        )];
        let fields = extract("lbaf  0 : ms:0\nlbaf  1 : ms:8\n", RULES);
        let formats = fields.group("lba_formats").unwrap();
        assert_eq!(formats.len(), 2);
        assert_eq!(formats[1].int("format_id"), Some(1));
        assert_eq!(formats[1].int("metadata_size"), Some(8));

        let empty = extract("no formats", RULES);
        assert_eq!(empty.group("lba_formats").map(<[FieldMap]>::len), Some(0));
    }

    #[test]
    fn empty_group_yields_to_fallback_layout() {
        const PRIMARY: &[Capture] = &[Capture::new("slot", 1, Coercion::Decimal)];
        const FALLBACK: &[Capture] = &[
            Capture::new("slot", 1, Coercion::Decimal),
            Capture::new("version", 2, Coercion::Text),
        ];
        const RULES: &[FieldRule] = &[
            FieldRule::group("slots", r"(?i)\bfrs(\d+)\s*\(", PRIMARY),
            FieldRule::group("slots", r"(?i)\bfrs(\d+)\s*:\s*0x[0-9a-f]+\s*\(([^)]*)\)", FALLBACK),
        ];
        let fields = extract("frs1 : 0x3141 (1A)\n", RULES);
        let slots = fields.group("slots").unwrap();
        assert_eq!(slots.len(), 1);
        assert_eq!(slots[0].text("version"), Some("1A"));
    }

    #[test]
    fn sections_parse_each_body_separately() {
        const HEADER: &[Capture] = &[Capture::new("entry_number", 1, Coercion::Decimal)];
        const FIELDS: &[FieldRule] = &[
            FieldRule::decimal("sqid", r"(?i)\bsqid\s*:\s*(\d+)"),
            FieldRule::hex("lba", r"(?i)\blba\s*:\s*0x([0-9a-f]+)"),
        ];
        const RULES: &[FieldRule] = &[FieldRule::sections(
            "entries",
            r"(?i)Error Log Entry\s+(\d+)\s*:",
            HEADER,
            FIELDS,
        )];
        let text = "Error Log Entry 0:\n sqid : 1\n lba : 0x10\nError Log Entry 1:\n sqid : 2\n";
        let fields = extract(text, RULES);
        let entries = fields.group("entries").unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].int("lba"), Some(0x10));
        assert_eq!(entries[1].int("sqid"), Some(2));
        assert_eq!(entries[1].int("lba"), None);
    }

    #[test]
    fn invalid_pattern_is_skipped_not_fatal() {
        const RULES: &[FieldRule] = &[
            FieldRule::hex("broken", r"(unclosed"),
            FieldRule::hex("vid", r"(?i)\bvid\s*:\s*0x([0-9a-f]+)"),
        ];
        let fields = extract("vid : 0x144d", RULES);
        assert_eq!(fields.int("vid"), Some(0x144d));
        assert!(!fields.contains_key("broken"));
        assert!(RULES[0].validate().is_err());
    }

    #[test]
    fn compiled_patterns_are_reused() {
        const PATTERN: &str = r"(?i)\bmdts\s*:\s*(\d+)\b";
        const RULE: FieldRule = FieldRule::decimal("mdts", PATTERN);
        assert_eq!(RULE.apply("mdts : 5").unwrap(), Some(FieldValue::Int(5)));
        let cached = COMPILED
            .lock()
            .unwrap()
            .get(PATTERN)
            .map(|regex| regex.as_str().to_string());
        assert_eq!(cached.as_deref(), Some(PATTERN));
        assert_eq!(RULE.apply("mdts : 7").unwrap(), Some(FieldValue::Int(7)));
    }
}
