//! Filesystem skill discovery.
//!
//! Scans the user skills directory (leading `~` expanded) and then the project skills
//! directory. Every subdirectory holding a `SKILL.md` is a skill; other subdirectories are
//! descended into when nested discovery is enabled.

use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

use super::definition::{SkillDefinition, SkillSource};
use super::metadata::parse_skill_file;
use crate::config::SkillsConfig;

pub const SKILL_FILE: &str = "SKILL.md";

const IGNORE_DIRS: &[&str] = &["node_modules", ".git", "dist", "build", ".next"];

#[derive(Debug, Clone, Serialize)]
pub struct DiscoveryError {
    pub path: PathBuf,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DiscoveryResult {
    /// Parsed definitions in scan order (user first, then project). Not yet validated.
    pub skills: Vec<SkillDefinition>,
    pub errors: Vec<DiscoveryError>,
    pub scanned_paths: Vec<PathBuf>,
}

/// Expand a leading `~` to the home directory.
pub fn expand_home(path: &str) -> PathBuf {
    if path == "~" {
        return dirs::home_dir().unwrap_or_else(|| PathBuf::from("~"));
    }
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

/// Discover skills from the configured user and project directories.
pub fn discover_skills(config: &SkillsConfig) -> DiscoveryResult {
    let mut result = DiscoveryResult::default();
    let user_root = expand_home(&config.user_skills_path);
    scan_root(&user_root, SkillSource::User, config, &mut result);
    scan_root(&config.project_skills_path, SkillSource::Project, config, &mut result);
    tracing::debug!(
        skills = result.skills.len(),
        errors = result.errors.len(),
        "skill discovery finished"
    );
    result
}

fn scan_root(root: &Path, source: SkillSource, config: &SkillsConfig, out: &mut DiscoveryResult) {
    if !root.is_dir() {
        return;
    }
    scan_dir(root, source, config, out);
}

fn scan_dir(dir: &Path, source: SkillSource, config: &SkillsConfig, out: &mut DiscoveryResult) {
    out.scanned_paths.push(dir.to_path_buf());
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            out.errors.push(DiscoveryError {
                path: dir.to_path_buf(),
                error: e.to_string(),
            });
            return;
        }
    };
    let mut children: Vec<_> = entries.flatten().collect();
    children.sort_by_key(|e| e.file_name());

    for entry in children {
        let path = entry.path();
        let name = entry.file_name().to_string_lossy().to_string();
        if !path.is_dir() || IGNORE_DIRS.contains(&name.as_str()) {
            continue;
        }
        let skill_file = path.join(SKILL_FILE);
        if skill_file.is_file() {
            match parse_skill_file(&skill_file, source, config.max_skill_content_length) {
                Ok(mut skill) => {
                    skill.supporting_files = list_supporting_files(&path);
                    out.skills.push(skill);
                }
                Err(e) => {
                    tracing::warn!(path = %skill_file.display(), error = %e, "skipping skill");
                    out.errors.push(DiscoveryError {
                        path: skill_file,
                        error: e.to_string(),
                    });
                }
            }
        } else if config.enable_nested_discovery {
            scan_dir(&path, source, config, out);
        }
    }
}

/// Every non-hidden file under `skill_dir` except `SKILL.md`, relative to `skill_dir`, sorted.
pub fn list_supporting_files(skill_dir: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    collect_files(skill_dir, skill_dir, &mut files);
    files.sort();
    files
}

fn collect_files(base: &Path, current: &Path, files: &mut Vec<PathBuf>) {
    let Ok(entries) = fs::read_dir(current) else {
        return;
    };
    for entry in entries.flatten() {
        let name = entry.file_name().to_string_lossy().to_string();
        if name.starts_with('.') || name == "node_modules" {
            continue;
        }
        let path = entry.path();
        if path.is_dir() {
            collect_files(base, &path, files);
        } else if !(current == base && name == SKILL_FILE) {
            if let Ok(rel) = path.strip_prefix(base) {
                files.push(rel.to_path_buf());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_skill(dir: &Path, name: &str) {
        fs::create_dir_all(dir).unwrap();
        fs::write(
            dir.join(SKILL_FILE),
            format!("---\nname: {}\ndescription: test skill\n---\nDo {}.\n", name, name),
        )
        .unwrap();
    }

    fn config(user: &Path, project: &Path) -> SkillsConfig {
        SkillsConfig {
            user_skills_path: user.to_string_lossy().to_string(),
            project_skills_path: project.to_path_buf(),
            ..SkillsConfig::default()
        }
    }

    #[test]
    fn test_discovers_user_then_project_with_nesting() {
        let tmp = tempfile::tempdir().unwrap();
        let user = tmp.path().join("user");
        let project = tmp.path().join("project");
        write_skill(&user.join("alpha"), "alpha");
        write_skill(&project.join("group").join("beta"), "beta");
        write_skill(&project.join("node_modules").join("ignored"), "ignored");

        let result = discover_skills(&config(&user, &project));
        let names: Vec<_> = result.skills.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["alpha", "beta"]);
        assert_eq!(result.skills[0].source, SkillSource::User);
        assert_eq!(result.skills[1].source, SkillSource::Project);
        assert!(result.errors.is_empty());
        assert!(result.scanned_paths.contains(&project.join("group")));
    }

    #[test]
    fn test_nested_discovery_disabled() {
        let tmp = tempfile::tempdir().unwrap();
        let project = tmp.path().join("project");
        write_skill(&project.join("group").join("beta"), "beta");
        let mut cfg = config(&tmp.path().join("missing"), &project);
        cfg.enable_nested_discovery = false;
        assert!(discover_skills(&cfg).skills.is_empty());
    }

    #[test]
    fn test_parse_errors_are_collected() {
        let tmp = tempfile::tempdir().unwrap();
        let project = tmp.path().join("project");
        fs::create_dir_all(project.join("broken")).unwrap();
        fs::write(project.join("broken").join(SKILL_FILE), "no front matter").unwrap();
        let result = discover_skills(&config(&tmp.path().join("none"), &project));
        assert!(result.skills.is_empty());
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].path.ends_with("broken/SKILL.md"));
    }

    #[test]
    fn test_supporting_files() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("s");
        write_skill(&dir, "s");
        fs::create_dir_all(dir.join("scripts")).unwrap();
        fs::write(dir.join("scripts").join("run.sh"), "echo").unwrap();
        fs::write(dir.join("reference.md"), "ref").unwrap();
        fs::write(dir.join(".hidden"), "x").unwrap();
        assert_eq!(
            list_supporting_files(&dir),
            vec![PathBuf::from("reference.md"), PathBuf::from("scripts/run.sh")]
        );
    }

    #[test]
    fn test_expand_home() {
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_home("~/.cowork/skills"), home.join(".cowork/skills"));
        }
        assert_eq!(expand_home("/abs/path"), PathBuf::from("/abs/path"));
    }
}
