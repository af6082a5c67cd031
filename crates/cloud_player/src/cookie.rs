use std::{
    cell::RefCell,
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};

pub const DEFAULT_COOKIE_FILE: &str = "tok_v1.cookie";

/// Where the session cookie survives restarts.
pub trait CookieStore {
    /// `Ok(None)` when nothing was stored yet.
    fn load(&self) -> Result<Option<String>>;
    fn save(&self, cookie: &str) -> Result<()>;
}

pub struct FileCookieStore {
    path: PathBuf,
}

impl FileCookieStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for FileCookieStore {
    fn default() -> Self {
        Self::new(DEFAULT_COOKIE_FILE)
    }
}

impl CookieStore for FileCookieStore {
    fn load(&self) -> Result<Option<String>> {
        match fs::read_to_string(&self.path) {
            Ok(cookie) => Ok(Some(cookie)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err)
                .with_context(|| format!("failed to read cookie from {}", self.path.display())),
        }
    }

    /// Writes a sibling temp file and renames it over the cookie, so a crash
    /// leaves either the old or the new cookie on disk.
    fn save(&self, cookie: &str) -> Result<()> {
        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        let mut temp = tempfile::NamedTempFile::new_in(dir)
            .with_context(|| format!("failed to write cookie to {}", self.path.display()))?;
        temp.write_all(cookie.as_bytes())
            .and_then(|()| temp.as_file().sync_all())
            .with_context(|| format!("failed to write cookie to {}", self.path.display()))?;
        temp.persist(&self.path)
            .with_context(|| format!("failed to replace cookie at {}", self.path.display()))?;
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryCookieStore {
    cookie: RefCell<Option<String>>,
}

impl MemoryCookieStore {
    pub fn new(cookie: Option<String>) -> Self {
        Self {
            cookie: RefCell::new(cookie),
        }
    }

    pub fn get(&self) -> Option<String> {
        self.cookie.borrow().clone()
    }
}

impl CookieStore for MemoryCookieStore {
    fn load(&self) -> Result<Option<String>> {
        Ok(self.get())
    }

    fn save(&self, cookie: &str) -> Result<()> {
        self.cookie.replace(Some(cookie.to_owned()));
        Ok(())
    }
}

#[cfg(test)]
#[path = "tests/cookie_tests.rs"]
mod tests;
