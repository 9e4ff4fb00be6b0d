//! Legacy flat properties file store

use crate::error::{ConfigError, ConfigResult};
use crate::source::{RawValue, Source};
use std::collections::HashMap;
use std::iter::Peekable;
use std::path::Path;
use std::str::Chars;

/// Source backed by a `.properties` file
///
/// Supported syntax:
/// - `key=value`, `key: value` and `key value`; the key ends at the first
///   unescaped `=`, `:` or whitespace
/// - `#` and `!` comment lines, blank lines
/// - a line ending in an odd number of `\` continues on the next line
/// - escapes `\=`, `\:`, `\ `, `\\`, `\t`, `\n`, `\r`, `\f` and `\uXXXX`
///
/// All values are strings.
#[derive(Debug, Clone)]
pub struct PropertiesSource {
    name: String,
    values: HashMap<String, String>,
}

/// Whether `line` ends in an unescaped backslash
fn continues(line: &str) -> bool {
    line.chars().rev().take_while(|c| *c == '\\').count() % 2 == 1
}

/// Decode the character after a backslash
fn unescape(chars: &mut Peekable<Chars<'_>>) -> Result<Option<char>, String> {
    let Some(c) = chars.next() else {
        return Ok(None);
    };
    let decoded = match c {
        't' => '\t',
        'n' => '\n',
        'r' => '\r',
        'f' => '\u{0c}',
        'u' => {
            let hex: String = chars.by_ref().take(4).collect();
            u32::from_str_radix(&hex, 16)
                .ok()
                .filter(|_| hex.len() == 4)
                .and_then(char::from_u32)
                .ok_or_else(|| format!("malformed \\u escape '\\u{}'", hex))?
        }
        other => other,
    };
    Ok(Some(decoded))
}

/// Split one logical line into its key and value
fn parse_entry(line: &str) -> Result<(String, String), String> {
    let mut chars = line.chars().peekable();
    let mut key = String::new();
    let mut separated = false;

    while let Some(c) = chars.next() {
        match c {
            '\\' => key.extend(unescape(&mut chars)?),
            '=' | ':' => {
                separated = true;
                break;
            }
            c if c.is_whitespace() => break,
            c => key.push(c),
        }
    }
    if key.is_empty() {
        return Err("empty key".to_string());
    }

    while chars.next_if(|c| c.is_whitespace()).is_some() {}
    if !separated && chars.next_if(|c| *c == '=' || *c == ':').is_some() {
        while chars.next_if(|c| c.is_whitespace()).is_some() {}
    }

    let mut value = String::new();
    while let Some(c) = chars.next() {
        match c {
            '\\' => value.extend(unescape(&mut chars)?),
            c => value.push(c),
        }
    }
    Ok((key, value))
}

impl PropertiesSource {
    /// Parse properties text
    pub fn parse(name: impl Into<String>, content: &str) -> ConfigResult<Self> {
        let name = name.into();
        let mut values = HashMap::new();
        let mut lines = content.lines().enumerate();

        while let Some((index, line)) = lines.next() {
            let trimmed = line.trim_start();
            if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with('!') {
                continue;
            }

            let mut logical = trimmed.to_string();
            while continues(&logical) {
                logical.pop();
                match lines.next() {
                    Some((_, next)) => logical.push_str(next.trim_start()),
                    None => break,
                }
            }

            let (key, value) = parse_entry(&logical).map_err(|message| {
                ConfigError::source_load(&name, format!("line {}: {}", index + 1, message))
            })?;
            values.insert(key, value);
        }

        Ok(Self { name, values })
    }

    /// Load a properties file from disk
    pub fn from_file(name: impl Into<String>, path: impl AsRef<Path>) -> ConfigResult<Self> {
        let name = name.into();
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::source_load(&name, format!("{}: {}", path.display(), e)))?;
        Self::parse(name, &content)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl Source for PropertiesSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookup(&self, key: &str) -> Option<RawValue> {
        self.values
            .get(key)
            .map(|value| RawValue::String(value.clone()))
    }

    fn is_legacy(&self) -> bool {
        true
    }
}
