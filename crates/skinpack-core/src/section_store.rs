use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SectionStoreError {
    #[error("section [{section}] does not exist")]
    NotFound { section: String },
    #[error("failed to access section store {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("section store has no backing file")]
    Detached,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    Utf16Le,
    Utf8Bom,
    Utf8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Line {
    Raw(String),
    Entry { key: String, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Section {
    name: String,
    lines: Vec<Line>,
}

impl Section {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            lines: Vec::new(),
        }
    }

    fn entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.lines.iter().filter_map(|line| match line {
            Line::Entry { key, value } => Some((key.as_str(), value.as_str())),
            Line::Raw(_) => None,
        })
    }
}

/// Sectioned `key=value` configuration text, as used by the host for skin
/// variables, package metadata and its own settings file.
///
/// Lookups of section names and keys ignore ASCII case. Comment and blank
/// lines are kept so that a load/save cycle only touches written keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionStore {
    path: Option<PathBuf>,
    encoding: TextEncoding,
    line_ending: &'static str,
    preamble: Vec<String>,
    sections: Vec<Section>,
}

impl Default for SectionStore {
    fn default() -> Self {
        Self {
            path: None,
            encoding: TextEncoding::Utf16Le,
            line_ending: "\r\n",
            preamble: Vec::new(),
            sections: Vec::new(),
        }
    }
}

impl SectionStore {
    /// Loads the store backing `path`. A missing file yields an empty store
    /// that will be created on [`SectionStore::save`].
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, SectionStoreError> {
        let path = path.into();
        let mut store = match fs::read(&path) {
            Ok(bytes) => Self::from_bytes(&bytes),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Self::default(),
            Err(source) => return Err(SectionStoreError::Io { path, source }),
        };
        store.path = Some(path);
        Ok(store)
    }

    pub fn from_bytes(bytes: &[u8]) -> Self {
        let (encoding, text) = decode_text(bytes);
        let mut store = Self::parse(&text);
        store.encoding = encoding;
        store
    }

    pub fn parse(text: &str) -> Self {
        let line_ending = if text.contains("\r\n") || text.is_empty() {
            "\r\n"
        } else {
            "\n"
        };
        let mut store = Self {
            line_ending,
            encoding: TextEncoding::Utf8,
            ..Self::default()
        };

        for raw in text.lines() {
            let raw = raw.trim_end_matches('\r');
            let trimmed = raw.trim();

            if let Some(name) = parse_header(trimmed) {
                store.sections.push(Section::new(name));
                continue;
            }

            let Some(section) = store.sections.last_mut() else {
                store.preamble.push(raw.to_string());
                continue;
            };

            if trimmed.starts_with(';') || trimmed.starts_with('#') {
                section.lines.push(Line::Raw(raw.to_string()));
                continue;
            }

            match trimmed.split_once('=') {
                Some((key, value)) if !key.trim().is_empty() => section.lines.push(Line::Entry {
                    key: key.trim().to_string(),
                    value: value.trim().to_string(),
                }),
                _ => section.lines.push(Line::Raw(raw.to_string())),
            }
        }

        store
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn encoding(&self) -> TextEncoding {
        self.encoding
    }

    pub fn section_names(&self) -> Vec<String> {
        self.sections.iter().map(|s| s.name.clone()).collect()
    }

    pub fn has_section(&self, section: &str) -> bool {
        self.find_section(section).is_some()
    }

    /// Returns the value of `key` in `section`, or an empty string when either
    /// is absent.
    pub fn read(&self, section: &str, key: &str) -> String {
        self.find_section(section)
            .and_then(|s| {
                s.entries()
                    .find(|(k, _)| k.eq_ignore_ascii_case(key))
                    .map(|(_, v)| unquote(v).to_string())
            })
            .unwrap_or_default()
    }

    pub fn read_section(&self, section: &str) -> Result<Vec<(String, String)>, SectionStoreError> {
        self.section_entries(section, unquote)
    }

    /// Like [`SectionStore::read_section`], but values keep their quotes
    /// exactly as stored so they can be written back unchanged.
    pub fn read_section_raw(
        &self,
        section: &str,
    ) -> Result<Vec<(String, String)>, SectionStoreError> {
        self.section_entries(section, |value| value)
    }

    fn section_entries(
        &self,
        section: &str,
        value_of: fn(&str) -> &str,
    ) -> Result<Vec<(String, String)>, SectionStoreError> {
        let found = self
            .find_section(section)
            .ok_or_else(|| SectionStoreError::NotFound {
                section: section.to_string(),
            })?;
        Ok(found
            .entries()
            .map(|(k, v)| (k.to_string(), value_of(v).to_string()))
            .collect())
    }

    /// Upserts `key` in `section`, creating the section when needed. A `None`
    /// value deletes the key.
    pub fn write(&mut self, section: &str, key: &str, value: Option<&str>) {
        let Some(value) = value else {
            if let Some(found) = self.find_section_mut(section) {
                found.lines.retain(|line| match line {
                    Line::Entry { key: k, .. } => !k.eq_ignore_ascii_case(key),
                    Line::Raw(_) => true,
                });
            }
            return;
        };

        if self.find_section(section).is_none() {
            self.sections.push(Section::new(section));
        }
        let Some(found) = self.find_section_mut(section) else {
            return;
        };

        for line in &mut found.lines {
            if let Line::Entry { key: k, value: v } = line {
                if k.eq_ignore_ascii_case(key) {
                    *v = value.to_string();
                    return;
                }
            }
        }

        // keep trailing blank lines after the last entry
        let insert_at = found
            .lines
            .iter()
            .rposition(|line| !matches!(line, Line::Raw(raw) if raw.trim().is_empty()))
            .map(|idx| idx + 1)
            .unwrap_or(0);
        found.lines.insert(
            insert_at,
            Line::Entry {
                key: key.to_string(),
                value: value.to_string(),
            },
        );
    }

    pub fn delete_section(&mut self, section: &str) {
        self.sections
            .retain(|found| !found.name.eq_ignore_ascii_case(section));
    }

    pub fn to_text(&self) -> String {
        let mut out = String::new();
        let eol = self.line_ending;
        for line in &self.preamble {
            out.push_str(line);
            out.push_str(eol);
        }
        for section in &self.sections {
            out.push('[');
            out.push_str(&section.name);
            out.push(']');
            out.push_str(eol);
            for line in &section.lines {
                match line {
                    Line::Raw(raw) => out.push_str(raw),
                    Line::Entry { key, value } => {
                        out.push_str(key);
                        out.push('=');
                        out.push_str(value);
                    }
                }
                out.push_str(eol);
            }
        }
        out
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        encode_text(self.encoding, &self.to_text())
    }

    pub fn save(&self) -> Result<(), SectionStoreError> {
        let path = self.path.as_deref().ok_or(SectionStoreError::Detached)?;
        self.save_to(path)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), SectionStoreError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| SectionStoreError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        fs::write(path, self.to_bytes()).map_err(|source| SectionStoreError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!(path = %path.display(), "saved section store");
        Ok(())
    }

    fn find_section(&self, section: &str) -> Option<&Section> {
        self.sections
            .iter()
            .find(|found| found.name.eq_ignore_ascii_case(section))
    }

    fn find_section_mut(&mut self, section: &str) -> Option<&mut Section> {
        self.sections
            .iter_mut()
            .find(|found| found.name.eq_ignore_ascii_case(section))
    }
}

/// Parses a null-terminated section block (`key=value\0key=value\0\0`). Two
/// consecutive terminators end the block.
pub fn parse_section_buffer(buffer: &[u16]) -> Vec<(String, String)> {
    let mut entries = Vec::new();
    let mut current = Vec::new();
    let mut previous_was_null = true;

    for &unit in buffer {
        if unit == 0 {
            if previous_was_null {
                break;
            }
            previous_was_null = true;
            let line = String::from_utf16_lossy(&current);
            current.clear();
            match line.split_once('=') {
                Some((key, value)) => entries.push((key.to_string(), value.to_string())),
                None => entries.push((line, String::new())),
            }
            continue;
        }
        previous_was_null = false;
        current.push(unit);
    }

    entries
}

fn parse_header(trimmed: &str) -> Option<&str> {
    let rest = trimmed.strip_prefix('[')?;
    let end = rest.find(']')?;
    Some(rest[..end].trim())
}

fn unquote(value: &str) -> &str {
    if value.len() >= 2 && value.starts_with('"') && value.ends_with('"') {
        &value[1..value.len() - 1]
    } else {
        value
    }
}

fn decode_text(bytes: &[u8]) -> (TextEncoding, String) {
    if let Some(rest) = bytes.strip_prefix(&[0xFF, 0xFE]) {
        return (TextEncoding::Utf16Le, decode_utf16_le(rest));
    }
    if let Some(rest) = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]) {
        return (
            TextEncoding::Utf8Bom,
            String::from_utf8_lossy(rest).into_owned(),
        );
    }
    if bytes.len() >= 2 && bytes[0] != 0 && bytes[1] == 0 {
        return (TextEncoding::Utf16Le, decode_utf16_le(bytes));
    }
    (TextEncoding::Utf8, String::from_utf8_lossy(bytes).into_owned())
}

fn decode_utf16_le(bytes: &[u8]) -> String {
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect();
    String::from_utf16_lossy(&units)
}

fn encode_text(encoding: TextEncoding, text: &str) -> Vec<u8> {
    match encoding {
        TextEncoding::Utf16Le => {
            let mut out = vec![0xFF, 0xFE];
            for unit in text.encode_utf16() {
                out.extend_from_slice(&unit.to_le_bytes());
            }
            out
        }
        TextEncoding::Utf8Bom => {
            let mut out = vec![0xEF, 0xBB, 0xBF];
            out.extend_from_slice(text.as_bytes());
            out
        }
        TextEncoding::Utf8 => text.as_bytes().to_vec(),
    }
}
