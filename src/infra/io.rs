//! Smart file reading and line-addressed text access.
//!
//! Files above 1 MiB are memory-mapped; smaller ones are read into memory.
//! `FileText` pairs the content with a newline index so the attribution
//! engine can slice and hash arbitrary line ranges cheaply.

use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result};
use memmap2::Mmap;

use crate::infra::line_index::NewlineIndex;

const MMAP_THRESHOLD: u64 = 1024 * 1024; // 1 MiB

pub enum FileContent {
    Mapped(Mmap),
    Buffered(String),
}

impl AsRef<str> for FileContent {
    fn as_ref(&self) -> &str {
        match self {
            // UTF-8 validity is checked once at load time.
            FileContent::Mapped(mmap) => std::str::from_utf8(mmap).unwrap_or(""),
            FileContent::Buffered(s) => s.as_str(),
        }
    }
}

pub fn read_file_smart<P: AsRef<Path>>(path: P) -> Result<FileContent> {
    let path = path.as_ref();
    let metadata = std::fs::metadata(path)
        .with_context(|| format!("Failed to read metadata for {}", path.display()))?;

    if metadata.len() > MMAP_THRESHOLD {
        let file =
            File::open(path).with_context(|| format!("Failed to open file {}", path.display()))?;

        // Safety: the map is only read, never written through.
        let mmap = unsafe { Mmap::map(&file) }
            .with_context(|| format!("Failed to memory-map {}", path.display()))?;
        std::str::from_utf8(&mmap)
            .map_err(|e| anyhow::anyhow!("{} is not valid UTF-8: {e}", path.display()))?;

        Ok(FileContent::Mapped(mmap))
    } else {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read file {}", path.display()))?;

        Ok(FileContent::Buffered(content))
    }
}

/// File content plus its newline index, the unit the verifier and the
/// checkpoint chain work against.
pub struct FileText {
    content: FileContent,
    index: NewlineIndex,
}

impl FileText {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = read_file_smart(path)?;
        let index = NewlineIndex::build(content.as_ref().as_bytes());
        Ok(Self { content, index })
    }

    pub fn from_string(content: String) -> Self {
        let index = NewlineIndex::build(content.as_bytes());
        Self {
            content: FileContent::Buffered(content),
            index,
        }
    }

    pub fn as_str(&self) -> &str {
        self.content.as_ref()
    }

    pub fn line_count(&self) -> usize {
        self.index.line_count()
    }

    /// A single 1-based line without its terminator.
    pub fn line(&self, line1: usize) -> Option<&str> {
        let text = self.content.as_ref();
        let (s, e) = self.index.span_of_line(line1, text.as_bytes())?;
        Some(&text[s..e])
    }

    /// Lines `[start, end]` (1-based, inclusive) joined with '\n', no
    /// trailing newline. None when the range falls outside the file.
    pub fn join_lines(&self, start: usize, end: usize) -> Option<String> {
        if start == 0 || start > end || end > self.line_count() {
            return None;
        }
        // ~60 bytes per line is a decent starting guess.
        let mut out = String::with_capacity((end - start + 1) * 60);
        for l in start..=end {
            if l > start {
                out.push('\n');
            }
            out.push_str(self.line(l)?);
        }
        Some(out)
    }
}
