//! Sed-like pattern sets selecting the events a scenario compares.
//!
//! Supported rules, one per line:
//!
//! ```text
//! s/<regex>/<replacement>/[g][p]   substitute, optionally print
//! /<regex>/p                       print matching lines
//! /<regex>/d                       drop matching lines
//! # comment
//! ```
//!
//! Nothing is printed unless a rule says so.
//!
//! Regexes are POSIX basic regular expressions as GNU sed reads them:
//! `\(...\)` groups, `\{m,n\}` intervals, and `\|`, `\+`, `\?` are the
//! operators, while bare `( ) { } | + ?` match themselves. Back-references
//! are only allowed in the replacement.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

use crate::core::errors::ConfigError;
use crate::ops::harness::events::EventRecord;

static SED_BACKREF: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\\(.)").unwrap());

#[derive(Debug, Clone)]
enum Action {
    Substitute {
        replacement: String,
        global: bool,
        print: bool,
    },
    Print,
    Delete,
}

#[derive(Debug, Clone)]
struct Rule {
    regex: Regex,
    action: Action,
}

/// An ordered list of filter rules.
#[derive(Debug, Clone, Default)]
pub struct PatternSet {
    rules: Vec<Rule>,
}

impl PatternSet {
    /// Load a pattern file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::PatternRule {
            path: path.to_path_buf(),
            line: 0,
            message: e.to_string(),
        })?;
        Self::parse(&text, path)
    }

    /// Parse pattern text; `path` is only used in errors.
    pub fn parse(text: &str, path: &Path) -> Result<Self, ConfigError> {
        let mut rules = Vec::new();
        for (i, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let rule = parse_rule(line).map_err(|message| ConfigError::PatternRule {
                path: path.to_path_buf(),
                line: i + 1,
                message,
            })?;
            rules.push(rule);
        }
        Ok(PatternSet { rules })
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Lines printed for one input line.
    pub fn filter_line(&self, line: &str) -> Vec<String> {
        let mut current = line.to_string();
        let mut printed = Vec::new();

        for rule in &self.rules {
            if !rule.regex.is_match(&current) {
                continue;
            }
            match &rule.action {
                Action::Substitute {
                    replacement,
                    global,
                    print,
                } => {
                    current = if *global {
                        rule.regex.replace_all(&current, replacement.as_str()).into_owned()
                    } else {
                        rule.regex.replace(&current, replacement.as_str()).into_owned()
                    };
                    if *print {
                        printed.push(current.clone());
                    }
                }
                Action::Print => printed.push(current.clone()),
                Action::Delete => break,
            }
        }
        printed
    }

    /// Filter a record sequence, keeping emission order.
    pub fn apply(&self, events: &[EventRecord]) -> Vec<String> {
        events
            .iter()
            .flat_map(|event| self.filter_line(&event.text))
            .collect()
    }
}

fn parse_rule(line: &str) -> Result<Rule, String> {
    let (fields, command) = if let Some(rest) = line.strip_prefix('s') {
        let mut chars = rest.chars();
        let delim = chars
            .next()
            .filter(|c| !c.is_alphanumeric() && *c != '\\' && !c.is_whitespace())
            .ok_or_else(|| "expected a delimiter after `s`".to_string())?;
        let fields = split_fields(chars.as_str(), delim, 3)?;
        (fields, 's')
    } else if let Some(rest) = line.strip_prefix('/') {
        let fields = split_fields(rest, '/', 2)?;
        (fields, '/')
    } else {
        return Err(format!("unrecognized rule `{}`", line));
    };

    let pattern = translate_bre(&fields[0])?;
    let regex = Regex::new(&pattern).map_err(|e| format!("invalid regex `{}`: {}", fields[0], e))?;

    let action = if command == 's' {
        let flags = fields[2].trim();
        if let Some(bad) = flags.chars().find(|c| !matches!(c, 'g' | 'p')) {
            return Err(format!("unsupported substitution flag `{}`", bad));
        }
        Action::Substitute {
            replacement: convert_replacement(&fields[1]),
            global: flags.contains('g'),
            print: flags.contains('p'),
        }
    } else {
        match fields[1].trim() {
            "p" => Action::Print,
            "d" => Action::Delete,
            other => return Err(format!("unsupported command `{}`; expected `p` or `d`", other)),
        }
    };

    Ok(Rule { regex, action })
}

/// Split `text` into `count` fields on unescaped `delim`.
///
/// The last field takes the remainder. An escaped delimiter becomes literal.
fn split_fields(text: &str, delim: char, count: usize) -> Result<Vec<String>, String> {
    let mut fields = Vec::with_capacity(count);
    let mut current = String::new();
    let mut chars = text.chars();

    while let Some(c) = chars.next() {
        if fields.len() == count - 1 {
            current.push(c);
            continue;
        }
        match c {
            '\\' => match chars.next() {
                Some(next) if next == delim => current.push(next),
                Some(next) => {
                    current.push('\\');
                    current.push(next);
                }
                None => current.push('\\'),
            },
            c if c == delim => fields.push(std::mem::take(&mut current)),
            c => current.push(c),
        }
    }

    if fields.len() != count - 1 {
        return Err(format!("unterminated rule; expected {} `{}` delimiters", count, delim));
    }
    fields.push(current);
    Ok(fields)
}

/// Translate a basic regular expression into `regex` syntax.
fn translate_bre(bre: &str) -> Result<String, String> {
    let chars: Vec<char> = bre.chars().collect();
    let mut out = String::with_capacity(bre.len() + 8);
    let mut depth = 0usize;
    // `*` and `^` are only special at the start of an expression.
    let mut at_start = true;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let starts = std::mem::replace(&mut at_start, false);
        match c {
            '\\' => {
                i += 1;
                let next = *chars.get(i).ok_or("trailing `\\` in regex")?;
                match next {
                    '(' => {
                        depth += 1;
                        out.push('(');
                        at_start = true;
                    }
                    ')' => {
                        depth = depth.checked_sub(1).ok_or("unmatched `\\)` in regex")?;
                        out.push(')');
                    }
                    '|' => {
                        out.push('|');
                        at_start = true;
                    }
                    '+' | '?' if starts => out.push_str(&regex::escape(&next.to_string())),
                    '+' | '?' => out.push(next),
                    '{' => {
                        let close = (i + 1..chars.len())
                            .find(|&j| chars[j] == '\\' && chars.get(j + 1) == Some(&'}'))
                            .ok_or("unterminated `\\{` in regex")?;
                        let bounds: String = chars[i + 1..close].iter().collect();
                        if bounds.is_empty() || !bounds.chars().all(|b| b.is_ascii_digit() || b == ',') {
                            return Err(format!("invalid interval `\\{{{}\\}}` in regex", bounds));
                        }
                        out.push('{');
                        out.push_str(&bounds);
                        out.push('}');
                        i = close + 1;
                    }
                    '}' => return Err("unmatched `\\}` in regex".to_string()),
                    '1'..='9' => {
                        return Err(format!("back-reference `\\{}` is only allowed in the replacement", next))
                    }
                    '<' | '>' => out.push_str(r"\b"),
                    'w' | 'W' | 's' | 'S' | 'b' | 'B' => {
                        out.push('\\');
                        out.push(next);
                    }
                    'n' => out.push_str(r"\n"),
                    't' => out.push_str(r"\t"),
                    other => out.push_str(&regex::escape(&other.to_string())),
                }
            }
            '^' if starts => {
                out.push('^');
                at_start = true;
            }
            '*' if starts => out.push_str(r"\*"),
            '$' if ends_expression(&chars, i + 1) => out.push('$'),
            '[' => i = translate_bracket(&chars, i, &mut out)?,
            '.' | '*' => out.push(c),
            other => out.push_str(&regex::escape(&other.to_string())),
        }
        i += 1;
    }

    if depth > 0 {
        return Err("unmatched `\\(` in regex".to_string());
    }
    Ok(out)
}

/// Whether position `i` closes the expression, making a preceding `$` an anchor.
fn ends_expression(chars: &[char], i: usize) -> bool {
    match chars.get(i) {
        None => true,
        Some('\\') => matches!(chars.get(i + 1), Some(')') | Some('|')),
        Some(_) => false,
    }
}

/// Copy the bracket expression opening at `start` into `out`.
///
/// Returns the index of its closing `]`.
fn translate_bracket(chars: &[char], start: usize, out: &mut String) -> Result<usize, String> {
    let mut i = start + 1;
    out.push('[');
    if chars.get(i) == Some(&'^') {
        out.push('^');
        i += 1;
    }
    // A leading `]` is a member, not the end.
    if chars.get(i) == Some(&']') {
        out.push_str(r"\]");
        i += 1;
    }

    while let Some(&c) = chars.get(i) {
        match c {
            ']' => {
                out.push(']');
                return Ok(i);
            }
            '[' if chars.get(i + 1) == Some(&':') => {
                let end = (i + 2..chars.len())
                    .find(|&j| chars[j] == ':' && chars.get(j + 1) == Some(&']'))
                    .ok_or("unterminated character class in regex")?;
                out.extend(&chars[i..=end + 1]);
                i = end + 2;
                continue;
            }
            '[' if matches!(chars.get(i + 1), Some('.') | Some('=')) => {
                return Err("collating elements are not supported in regex".to_string());
            }
            '\\' | '[' | '&' | '~' => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
        i += 1;
    }
    Err("unterminated `[` in regex".to_string())
}

/// Translate a sed replacement into `regex` syntax.
///
/// `\1`..`\9` and `&` refer to groups; `$` is literal.
fn convert_replacement(sed: &str) -> String {
    let escaped_dollars = sed.replace('$', "$$");
    let mut out = String::with_capacity(escaped_dollars.len());
    let mut last = 0;

    for caps in SED_BACKREF.captures_iter(&escaped_dollars) {
        let whole = caps.get(0).map_or(0..0, |m| m.range());
        out.push_str(&escaped_dollars[last..whole.start].replace('&', "${0}"));
        match &caps[1] {
            d if d.chars().all(|c| c.is_ascii_digit()) => out.push_str(&format!("${{{}}}", d)),
            "n" => out.push('\n'),
            other => out.push_str(other),
        }
        last = whole.end;
    }
    out.push_str(&escaped_dollars[last..].replace('&', "${0}"));
    out
}
