//! Workspace file I/O.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Component, Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Directory,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileEntry {
    pub name: String,
    /// Path relative to the workspace root, `/`-separated.
    pub path: String,
    #[serde(rename = "type")]
    pub kind: EntryKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified: Option<DateTime<Utc>>,
}

/// File operations scoped to a workspace root.
pub trait Workspace: Send + Sync {
    fn root(&self) -> &Path;
    fn list(&self, path: &str) -> Result<Vec<FileEntry>>;
    fn read(&self, path: &str) -> Result<String>;
    fn write(&self, path: &str, content: &str) -> Result<()>;
    fn mkdir(&self, path: &str) -> Result<()>;
    fn delete(&self, path: &str) -> Result<()>;
    fn rename(&self, source: &str, destination: &str) -> Result<()>;
    /// Recursive name search under `dir`.
    fn search(&self, pattern: &str, dir: &str) -> Result<Vec<FileEntry>>;
}

/// Local filesystem workspace. Every path is resolved lexically against the root and
/// rejected if it escapes it.
#[derive(Debug, Clone)]
pub struct LocalWorkspace {
    root: PathBuf,
}

impl LocalWorkspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let root = if root.is_absolute() {
            normalize_path(&root)
        } else {
            std::env::current_dir()
                .map(|cwd| normalize_path(&cwd.join(&root)))
                .unwrap_or(root)
        };
        Self { root }
    }

    fn resolve(&self, path: &str) -> Result<PathBuf> {
        resolve_within_workspace(path, &self.root)
    }

    fn entry_for(&self, path: &Path) -> Result<FileEntry> {
        let meta = fs::metadata(path)
            .with_context(|| format!("Failed to stat {}", path.display()))?;
        let kind = if meta.is_dir() {
            EntryKind::Directory
        } else {
            EntryKind::File
        };
        Ok(FileEntry {
            name: path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default(),
            path: relative_display(path, &self.root),
            kind,
            size: (kind == EntryKind::File).then(|| meta.len()),
            modified: meta.modified().ok().map(DateTime::<Utc>::from),
        })
    }

    fn search_impl(&self, dir: &Path, matcher: &NameMatcher, out: &mut Vec<FileEntry>) -> Result<()> {
        let mut items: Vec<_> = fs::read_dir(dir)
            .with_context(|| format!("Failed to read directory {}", dir.display()))?
            .filter_map(|e| e.ok())
            .collect();
        items.sort_by_key(|e| e.file_name());
        for entry in items {
            let path = entry.path();
            let name = entry.file_name().to_string_lossy().to_string();
            if matcher.matches(&name) {
                out.push(self.entry_for(&path)?);
            }
            if path.is_dir() && !SKIP_DIRS.contains(&name.as_str()) {
                self.search_impl(&path, matcher, out)?;
            }
        }
        Ok(())
    }
}

const SKIP_DIRS: &[&str] = &["node_modules", ".git"];

impl Workspace for LocalWorkspace {
    fn root(&self) -> &Path {
        &self.root
    }

    fn list(&self, path: &str) -> Result<Vec<FileEntry>> {
        let dir = self.resolve(path)?;
        fs::create_dir_all(&self.root).ok();
        let mut items: Vec<_> = fs::read_dir(&dir)
            .with_context(|| format!("Failed to read directory {}", path))?
            .filter_map(|e| e.ok())
            .collect();
        items.sort_by_key(|e| e.file_name());
        items.iter().map(|e| self.entry_for(&e.path())).collect()
    }

    fn read(&self, path: &str) -> Result<String> {
        let file = self.resolve(path)?;
        fs::read_to_string(&file).with_context(|| format!("Failed to read file {}", path))
    }

    fn write(&self, path: &str, content: &str) -> Result<()> {
        let file = self.resolve(path)?;
        if let Some(parent) = file.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }
        fs::write(&file, content).with_context(|| format!("Failed to write file {}", path))
    }

    fn mkdir(&self, path: &str) -> Result<()> {
        let dir = self.resolve(path)?;
        fs::create_dir_all(&dir).with_context(|| format!("Failed to create directory {}", path))
    }

    fn delete(&self, path: &str) -> Result<()> {
        let target = self.resolve(path)?;
        if target == self.root {
            anyhow::bail!("Refusing to delete the workspace root");
        }
        let removed = if target.is_dir() {
            fs::remove_dir_all(&target)
        } else {
            fs::remove_file(&target)
        };
        removed.with_context(|| format!("Failed to delete {}", path))
    }

    fn rename(&self, source: &str, destination: &str) -> Result<()> {
        let from = self.resolve(source)?;
        let to = self.resolve(destination)?;
        if let Some(parent) = to.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }
        fs::rename(&from, &to)
            .with_context(|| format!("Failed to move {} to {}", source, destination))
    }

    fn search(&self, pattern: &str, dir: &str) -> Result<Vec<FileEntry>> {
        if pattern.trim().is_empty() {
            anyhow::bail!("缺少搜索模式");
        }
        let base = self.resolve(dir)?;
        let matcher = NameMatcher::new(pattern)?;
        let mut out = Vec::new();
        self.search_impl(&base, &matcher, &mut out)?;
        Ok(out)
    }
}

/// Case-insensitive name matching: `*`/`?` patterns are globs, anything else is a substring.
enum NameMatcher {
    Contains(String),
    Glob(Regex),
}

impl NameMatcher {
    fn new(pattern: &str) -> Result<Self> {
        if pattern.contains('*') || pattern.contains('?') {
            let mut re = String::from("(?i)^");
            for c in pattern.chars() {
                match c {
                    '*' => re.push_str(".*"),
                    '?' => re.push('.'),
                    other => re.push_str(&regex::escape(&other.to_string())),
                }
            }
            re.push('$');
            Ok(NameMatcher::Glob(Regex::new(&re).context("Invalid search pattern")?))
        } else {
            Ok(NameMatcher::Contains(pattern.to_lowercase()))
        }
    }

    fn matches(&self, name: &str) -> bool {
        match self {
            NameMatcher::Contains(needle) => name.to_lowercase().contains(needle),
            NameMatcher::Glob(re) => re.is_match(name),
        }
    }
}

// ─── Path confinement ───────────────────────────────────────────────────────

pub(crate) fn resolve_within_workspace(path: &str, workspace: &Path) -> Result<PathBuf> {
    let input = Path::new(path);
    let resolved = if input.is_absolute() {
        input.to_path_buf()
    } else {
        workspace.join(input)
    };
    let normalized = normalize_path(&resolved);
    if !normalized.starts_with(workspace) {
        anyhow::bail!(
            "访问被拒绝：路径超出工作区范围: {} (workspace: {})",
            path,
            workspace.display()
        );
    }
    Ok(normalized)
}

pub(crate) fn normalize_path(path: &Path) -> PathBuf {
    let mut components = Vec::new();
    for component in path.components() {
        match component {
            Component::ParentDir => {
                if matches!(components.last(), Some(Component::Normal(_))) {
                    components.pop();
                }
            }
            Component::CurDir => {}
            other => components.push(other),
        }
    }
    components.iter().collect()
}

fn relative_display(path: &Path, root: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .components()
        .map(|c| c.as_os_str().to_string_lossy().to_string())
        .collect::<Vec<_>>()
        .join("/")
}
