//! Section-based key/value configuration file loading.
//!
//! The accepted format follows the classic INI dialect: `[section]` headers,
//! `key = value` (or `key: value`) options, `#`/`;` comments and a `[DEFAULT]`
//! section whose options are inherited by every other section. Option names
//! are case-insensitive and stored lower-cased; section names are not.
//! Values may reference other options of the same section (or `[DEFAULT]`)
//! with `%(name)s`; `%%` is a literal percent sign.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use indexmap::map::Entry;
use tracing::debug;

use crate::error::{DeployerError, Result};

/// Name of the section whose options every other section inherits.
pub const DEFAULT_SECTION: &str = "DEFAULT";

/// Nesting limit for `%(name)s` references.
pub const MAX_INTERPOLATION_DEPTH: usize = 10;

/// Ordered option → value mapping for one configuration section.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Section {
    options: IndexMap<String, String>,
}

impl Section {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.options.get(key).map(String::as_str)
    }

    /// Insert or replace an option. A replaced option keeps its position.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.options.insert(key.into(), value.into());
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.options.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.options.len()
    }

    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }

    /// Append options from `defaults` that this section does not define.
    fn inherit(&mut self, defaults: &Section) {
        for (key, value) in defaults.iter() {
            if let Entry::Vacant(slot) = self.options.entry(key.to_string()) {
                slot.insert(value.to_string());
            }
        }
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Section {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut section = Section::new();
        for (key, value) in iter {
            section.set(key, value);
        }
        section
    }
}

/// Parsed configuration file.
#[derive(Debug, Clone, Default)]
pub struct ConfigStore {
    source: Option<PathBuf>,
    defaults: Section,
    sections: IndexMap<String, Section>,
}

impl ConfigStore {
    /// Read and parse the file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|err| {
            if err.kind() == io::ErrorKind::NotFound {
                DeployerError::ConfigNotFound(path.to_path_buf())
            } else {
                DeployerError::Io(err)
            }
        })?;
        let mut store = Self::parse(&text, path)?;
        store.source = Some(path.to_path_buf());
        debug!(
            path = %path.display(),
            sections = store.sections.len(),
            "parsed configuration file"
        );
        Ok(store)
    }

    /// Parse configuration text. `origin` is only used in error messages.
    pub fn parse(text: &str, origin: &Path) -> Result<Self> {
        let mut store = ConfigStore::default();
        let mut current: Option<String> = None;

        for (idx, raw) in text.lines().enumerate() {
            let line_no = idx + 1;
            let parse_err = |message: String| DeployerError::Parse {
                path: origin.to_path_buf(),
                line: line_no,
                message,
            };

            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }

            if let Some(rest) = line.strip_prefix('[') {
                // Anything after the closing bracket is ignored.
                let name = rest
                    .split_once(']')
                    .map(|(name, _)| name.trim())
                    .filter(|name| !name.is_empty())
                    .ok_or_else(|| parse_err(format!("malformed section header '{line}'")))?;
                if name != DEFAULT_SECTION {
                    store.sections.entry(name.to_string()).or_default();
                }
                current = Some(name.to_string());
                continue;
            }

            let Some(section_name) = current.as_deref() else {
                return Err(parse_err(format!(
                    "option '{line}' appears before any section header"
                )));
            };

            let (key, value) = split_option(line)
                .ok_or_else(|| parse_err(format!("expected 'key = value', found '{line}'")))?;
            if key.is_empty() {
                return Err(parse_err("option name is empty".to_string()));
            }

            let target = if section_name == DEFAULT_SECTION {
                &mut store.defaults
            } else {
                store.sections.entry(section_name.to_string()).or_default()
            };
            target.set(key.to_ascii_lowercase(), value);
        }

        Ok(store)
    }

    /// Path the store was loaded from, if any.
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Section names in file order, excluding `[DEFAULT]`.
    pub fn section_names(&self) -> impl Iterator<Item = &str> {
        self.sections.keys().map(String::as_str)
    }

    pub fn has_section(&self, name: &str) -> bool {
        self.sections.contains_key(name)
    }

    /// Options of `name` merged with inherited defaults and with `%(name)s`
    /// references expanded. `Ok(None)` when the file has no such section.
    pub fn section(&self, name: &str) -> Result<Option<Section>> {
        let Some(raw) = self.sections.get(name) else {
            return Ok(None);
        };
        let mut merged = raw.clone();
        merged.inherit(&self.defaults);

        let mut expanded = Section::new();
        for (option, value) in merged.iter() {
            expanded.set(option, interpolate(name, option, value, &merged)?);
        }
        Ok(Some(expanded))
    }

    /// Like [`ConfigStore::section`] but a missing section is an error.
    pub fn required_section(&self, name: &str) -> Result<Section> {
        self.section(name)?
            .ok_or_else(|| DeployerError::MissingSection(name.to_string()))
    }
}

fn split_option(line: &str) -> Option<(&str, String)> {
    let split_at = line.find(['=', ':'])?;
    let key = line[..split_at].trim();
    let mut value = strip_inline_comment(line[split_at + 1..].trim_start())
        .trim()
        .to_string();
    if value == "\"\"" {
        value.clear();
    }
    Some((key, value))
}

/// An inline comment starts at the first `;` when whitespace precedes it.
fn strip_inline_comment(value: &str) -> &str {
    match value.find(';') {
        Some(idx) if idx > 0 && value.as_bytes()[idx - 1].is_ascii_whitespace() => &value[..idx],
        _ => value,
    }
}

/// Expand `%(name)s` references in `value` against `vars`, repeating until
/// no reference is left or the nesting limit is hit.
fn interpolate(section: &str, option: &str, value: &str, vars: &Section) -> Result<String> {
    let err = |message: String| DeployerError::Interpolation {
        section: section.to_string(),
        option: option.to_string(),
        message,
    };

    let mut value = value.to_string();
    for _ in 0..MAX_INTERPOLATION_DEPTH {
        if !value.contains("%(") {
            return Ok(value);
        }
        value = expand_once(&value, vars).map_err(err)?;
    }
    if value.contains("%(") {
        return Err(err(format!(
            "references nested deeper than {MAX_INTERPOLATION_DEPTH} levels"
        )));
    }
    Ok(value)
}

fn expand_once(value: &str, vars: &Section) -> std::result::Result<String, String> {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;
    while let Some(pos) = rest.find('%') {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos + 1..];
        if let Some(after) = tail.strip_prefix('%') {
            out.push('%');
            rest = after;
        } else if let Some(reference) = tail.strip_prefix('(') {
            let (name, after) = reference
                .split_once(")s")
                .ok_or_else(|| format!("bad interpolation syntax in '{value}'"))?;
            let resolved = vars
                .get(&name.to_ascii_lowercase())
                .ok_or_else(|| format!("no option '{name}' to interpolate"))?;
            out.push_str(resolved);
            rest = after;
        } else {
            out.push('%');
            rest = tail;
        }
    }
    out.push_str(rest);
    Ok(out)
}
