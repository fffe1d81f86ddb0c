//! Combo resource limit derivation.
//!
//! Scans a generated combo-definition artifact (devicetree text) for
//! `key-positions = <...>;` records and derives the two table sizes the
//! firmware needs: the most combos any single key takes part in, and the
//! most keys any single combo spans.
//!
//! Derivation is a pure function of the artifact text. Writing the result
//! into the Kconfig fragment is a separate step so the two can be tested
//! independently.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::LazyLock;

use anyhow::{Context, Result};
use miette::NamedSource;
use regex::Regex;

use crate::core::errors::{ComboParseError, ConfigError};
use crate::core::limits::ResourceLimits;
use crate::util::fs::write_atomic;

static BLOCK_COMMENT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"/\*[\s\S]*?\*/").unwrap());
static LINE_COMMENT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"//[^\n]*").unwrap());
static KEY_POSITIONS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|[^\w-])(key-positions)\s*=").unwrap());

/// One combo declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComboRecord {
    /// 1-based line of the `key-positions` property
    pub line: usize,
    /// Key positions in declaration order, without repeats
    pub positions: Vec<u32>,
}

/// Derive the limit pair from combo artifact text.
pub fn derive_limits(text: &str) -> Result<ResourceLimits, ComboParseError> {
    let records = parse_combo_records(text, "combos")?;
    Ok(limits_from_records(&records))
}

/// Compute the limit pair from already parsed records.
pub fn limits_from_records(records: &[ComboRecord]) -> ResourceLimits {
    let mut per_key: HashMap<u32, u32> = HashMap::new();
    let mut max_keys = 0;

    for record in records {
        max_keys = max_keys.max(record.positions.len() as u32);
        for &pos in &record.positions {
            *per_key.entry(pos).or_default() += 1;
        }
    }

    let max_combos = per_key.values().copied().max().unwrap_or(0);
    ResourceLimits::new(max_combos, max_keys)
}

/// Blank out comments while keeping byte offsets and line breaks intact.
fn mask_comments(text: &str) -> String {
    let masked = BLOCK_COMMENT.replace_all(text, blank_comment);
    LINE_COMMENT.replace_all(&masked, blank_comment).into_owned()
}

fn blank_comment(caps: &regex::Captures<'_>) -> String {
    caps[0]
        .chars()
        .map(|c| {
            if c == '\n' {
                "\n".to_string()
            } else {
                " ".repeat(c.len_utf8())
            }
        })
        .collect()
}

/// Parse every `key-positions` record in the artifact.
///
/// `name` labels the source in diagnostics. Any record that is not a clean
/// set of non-negative integers aborts the whole parse.
pub fn parse_combo_records(text: &str, name: &str) -> Result<Vec<ComboRecord>, ComboParseError> {
    let masked = mask_comments(text);
    let bytes = masked.as_bytes();
    let mut records = Vec::new();

    for caps in KEY_POSITIONS.captures_iter(&masked) {
        let Some(prop) = caps.get(1) else { continue };
        let Some(whole) = caps.get(0) else { continue };
        let line = line_of(&masked, prop.start());
        let fail = |reason: String, start: usize, end: usize| ComboParseError {
            line,
            reason,
            src: NamedSource::new(name, text.to_string()),
            span: (start, end.saturating_sub(start).max(1)).into(),
        };

        let mut positions = Vec::new();
        let mut seen = HashSet::new();
        let mut cursor = skip_ws(bytes, whole.end());

        loop {
            if bytes.get(cursor) != Some(&b'<') {
                return Err(fail(
                    "expected `<` to open the key position list".to_string(),
                    prop.start(),
                    cursor.min(bytes.len()),
                ));
            }
            let open = cursor;
            let Some(close_rel) = masked[open..].find(|c| c == '>' || c == ';') else {
                return Err(fail(
                    "unterminated key position list".to_string(),
                    prop.start(),
                    bytes.len(),
                ));
            };
            let close = open + close_rel;
            if bytes[close] != b'>' {
                return Err(fail(
                    "unterminated key position list".to_string(),
                    prop.start(),
                    close,
                ));
            }

            let mut offset = open + 1;
            for token in masked[open + 1..close].split_whitespace() {
                let token_start = offset + masked[offset..close].find(token).unwrap_or(0);
                offset = token_start + token.len();

                let Some(pos) = parse_cell(token) else {
                    return Err(fail(
                        format!("`{}` is not a key position", token),
                        token_start,
                        offset,
                    ));
                };
                if !seen.insert(pos) {
                    return Err(fail(
                        format!("key position {} is repeated", pos),
                        token_start,
                        offset,
                    ));
                }
                positions.push(pos);
            }

            cursor = skip_ws(bytes, close + 1);
            match bytes.get(cursor) {
                Some(b',') => cursor = skip_ws(bytes, cursor + 1),
                Some(b';') => break,
                _ => {
                    return Err(fail(
                        "missing `;` after key position list".to_string(),
                        prop.start(),
                        close + 1,
                    ))
                }
            }
        }

        if positions.is_empty() {
            return Err(fail(
                "empty key position list".to_string(),
                prop.start(),
                cursor,
            ));
        }

        records.push(ComboRecord { line, positions });
    }

    Ok(records)
}

/// Parse a devicetree cell: decimal or `0x` hex, optionally parenthesized.
fn parse_cell(token: &str) -> Option<u32> {
    let token = token
        .strip_prefix('(')
        .and_then(|t| t.strip_suffix(')'))
        .unwrap_or(token);
    if let Some(hex) = token
        .strip_prefix("0x")
        .or_else(|| token.strip_prefix("0X"))
    {
        u32::from_str_radix(hex, 16).ok()
    } else {
        token.parse().ok()
    }
}

fn skip_ws(bytes: &[u8], mut i: usize) -> usize {
    while i < bytes.len() && bytes[i].is_ascii_whitespace() {
        i += 1;
    }
    i
}

fn line_of(text: &str, offset: usize) -> usize {
    text[..offset].matches('\n').count() + 1
}

/// Write the limit pair into a Kconfig fragment.
///
/// Existing lines for other settings are kept. The two limit settings are
/// replaced in place, or appended when absent. The file is only rewritten
/// when its contents change.
pub fn write_limits_fragment(path: &Path, limits: &ResourceLimits) -> Result<bool> {
    let existing = if path.exists() {
        std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config fragment: {}", path.display()))?
    } else {
        String::new()
    };

    let rendered = render_fragment(&existing, limits);
    if rendered == existing {
        tracing::debug!("{} is up to date", path.display());
        return Ok(false);
    }

    write_atomic(path, rendered.as_bytes())?;
    Ok(true)
}

/// Apply the limit settings to fragment text.
pub fn render_fragment(existing: &str, limits: &ResourceLimits) -> String {
    let settings = limits.settings();
    let mut written = [false; 2];
    let mut lines: Vec<String> = Vec::new();

    for line in existing.lines() {
        let trimmed = line.trim_start();
        let slot = settings.iter().position(|(key, _)| {
            trimmed
                .strip_prefix(key)
                .is_some_and(|rest| rest.trim_start().starts_with('='))
                || trimmed == format!("# {} is not set", key)
        });

        match slot {
            Some(i) if written[i] => {}
            Some(i) => {
                let (key, value) = settings[i];
                lines.push(format!("{}={}", key, value));
                written[i] = true;
            }
            None => lines.push(line.to_string()),
        }
    }

    if written.iter().any(|w| !w) {
        if !lines.is_empty() && lines.last().is_some_and(|l| !l.trim().is_empty()) {
            lines.push(String::new());
        }
        lines.push("# Combo table sizes derived from the combo definitions".to_string());
        for (i, (key, value)) in settings.iter().enumerate() {
            if !written[i] {
                lines.push(format!("{}={}", key, value));
            }
        }
    }

    let mut out = lines.join("\n");
    out.push('\n');
    out
}

/// Derive limits from the artifact at `artifact` and write them to `fragment`.
///
/// Returns `None` when the artifact does not exist and is not required.
pub fn derive_and_write(
    artifact: &Path,
    fragment: &Path,
    required: bool,
) -> Result<Option<ResourceLimits>> {
    if !artifact.exists() {
        if required {
            return Err(ConfigError::MissingComboArtifact {
                path: artifact.to_path_buf(),
            }
            .into());
        }
        tracing::warn!(
            "combo artifact {} not found; combo limits left unchanged",
            artifact.display()
        );
        return Ok(None);
    }

    let text = std::fs::read_to_string(artifact)
        .with_context(|| format!("failed to read combo artifact: {}", artifact.display()))?;
    let records = parse_combo_records(&text, &artifact.display().to_string())
        .map_err(ConfigError::from)?;
    let limits = limits_from_records(&records);

    tracing::info!("derived {} from {} combos", limits, records.len());
    if limits.is_disabled() {
        tracing::info!("no combos declared; combo tables disabled");
    }

    if write_limits_fragment(fragment, &limits)? {
        tracing::debug!("wrote {}", fragment.display());
    }
    Ok(Some(limits))
}
