//! Test fixtures for creating sample build outputs.

use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A temporary working directory populated with build outputs.
pub struct WorkspaceFixture {
    dir: TempDir,
    files: Vec<PathBuf>,
}

impl WorkspaceFixture {
    /// An empty working directory.
    pub fn empty() -> anyhow::Result<Self> {
        Ok(Self {
            dir: tempfile::tempdir()?,
            files: Vec::new(),
        })
    }

    /// A small JavaScript build: one bundle and its source map.
    pub fn js_build() -> anyhow::Result<Self> {
        let mut fixture = Self::empty()?;
        fixture.write("dist/out.js", b"console.log('hello from the cache');\n")?;
        fixture.write("dist/out.js.map", br#"{"version":3,"sources":["src/index.ts"]}"#)?;
        Ok(fixture)
    }

    /// A single file of `size` pseudo-random bytes.
    pub fn large_file(size: usize) -> anyhow::Result<Self> {
        let mut fixture = Self::empty()?;
        let data: Vec<u8> = (0..size).map(|i| (i * 31 % 251) as u8).collect();
        fixture.write("dist/bundle.bin", &data)?;
        Ok(fixture)
    }

    /// Write `contents` at `rel` and add it to the file set.
    pub fn write(&mut self, rel: &str, contents: &[u8]) -> anyhow::Result<()> {
        let path = self.dir.path().join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, contents)?;
        self.files.push(PathBuf::from(rel));
        Ok(())
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Relative paths of every file written.
    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }
}
