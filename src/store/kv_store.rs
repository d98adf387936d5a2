use std::collections::HashMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::store::StoreError;

/// Thread-safe string map, optionally backed by a flat file.
///
/// The file holds one `key<TAB>value` line per entry with tab, newline,
/// carriage return and backslash escaped. It is rewritten (temp file +
/// rename) after every successful mutation; a failed write rolls the
/// mutation back.
#[derive(Debug)]
pub struct Store {
    path: Option<PathBuf>,
    entries: Mutex<HashMap<String, String>>,
}

impl Store {
    /// A store that never touches the disk.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            path: None,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Opens (or starts) the store at `path`. A missing file is an empty store.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let mut entries = HashMap::new();

        match fs::read_to_string(&path) {
            Ok(contents) => {
                for (line_no, line) in contents.lines().enumerate() {
                    if line.is_empty() {
                        continue;
                    }
                    match parse_line(line) {
                        Some((k, v)) => {
                            entries.insert(k, v);
                        }
                        None => eprintln!(
                            "[Store] ignoring malformed line {} in {:?}",
                            line_no + 1,
                            path
                        ),
                    }
                }
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        Ok(Self {
            path: Some(path),
            entries: Mutex::new(entries),
        })
    }

    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Inserts or overwrites `key`.
    pub fn put(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.lock()?;
        let previous = entries.insert(key.to_owned(), value.to_owned());
        if let Err(e) = self.persist(&entries) {
            match previous {
                Some(old) => entries.insert(key.to_owned(), old),
                None => entries.remove(key),
            };
            return Err(e);
        }
        Ok(())
    }

    pub fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.lock()?.get(key).cloned())
    }

    /// Removes `key`; `Ok(false)` if it was absent.
    pub fn remove(&self, key: &str) -> Result<bool, StoreError> {
        let mut entries = self.entries.lock()?;
        let Some(old) = entries.remove(key) else {
            return Ok(false);
        };
        if let Err(e) = self.persist(&entries) {
            entries.insert(key.to_owned(), old);
            return Err(e);
        }
        Ok(true)
    }

    /// Replaces the value of an existing `key`; `Ok(false)` if it was absent.
    pub fn update(&self, key: &str, value: &str) -> Result<bool, StoreError> {
        let mut entries = self.entries.lock()?;
        let Some(slot) = entries.get_mut(key) else {
            return Ok(false);
        };
        let old = std::mem::replace(slot, value.to_owned());
        if let Err(e) = self.persist(&entries) {
            entries.insert(key.to_owned(), old);
            return Err(e);
        }
        Ok(true)
    }

    pub fn len(&self) -> Result<usize, StoreError> {
        Ok(self.entries.lock()?.len())
    }

    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.entries.lock()?.is_empty())
    }

    fn persist(&self, entries: &HashMap<String, String>) -> Result<(), StoreError> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let mut keys: Vec<&String> = entries.keys().collect();
        keys.sort();

        let mut buf = String::new();
        for key in keys {
            escape_into(&mut buf, key);
            buf.push('\t');
            escape_into(&mut buf, &entries[key]);
            buf.push('\n');
        }

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        // Write to temp file then atomically rename.
        let tmp = path.with_extension("tmp");
        {
            let mut f = fs::File::create(&tmp)?;
            f.write_all(buf.as_bytes())?;
            f.flush()?;
        }
        fs::rename(tmp, path)?;
        Ok(())
    }
}

fn escape_into(out: &mut String, s: &str) {
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
}

// Returns None on a dangling or unknown escape.
fn unescape(s: &str) -> Option<String> {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next()? {
            '\\' => out.push('\\'),
            't' => out.push('\t'),
            'n' => out.push('\n'),
            'r' => out.push('\r'),
            _ => return None,
        }
    }
    Some(out)
}

fn parse_line(line: &str) -> Option<(String, String)> {
    let (k, v) = line.split_once('\t')?;
    if v.contains('\t') {
        return None;
    }
    Some((unescape(k)?, unescape(v)?))
}
