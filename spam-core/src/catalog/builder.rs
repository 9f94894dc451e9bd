//! Filesystem scanning for skills and commands

use super::frontmatter::read_frontmatter;
use super::plugins::PluginResolver;
use super::{dedup_by_key, CatalogSnapshot};
use crate::types::{Component, ComponentKind, Lifecycle};
use chrono::Utc;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// File that marks a directory as a skill.
pub const SKILL_FILE: &str = "SKILL.md";

/// Directories the catalog builder scans.
///
/// Passed in explicitly so builds are deterministic under test.
#[derive(Debug, Clone)]
pub struct ScanRoots {
    /// User home, used to expand `~` in plugin manifests
    pub home: PathBuf,
    /// Host home (`~/.claude`), holding user-scope `skills/` and `commands/`
    pub claude_home: PathBuf,
    /// Project root; its `.claude/` directory is scanned when it exists
    pub project_dir: Option<PathBuf>,
    /// Plugin directory holding the install manifest and cache
    pub plugins_dir: PathBuf,
}

impl ScanRoots {
    /// Default layout beneath a home directory.
    pub fn under_home(home: impl Into<PathBuf>) -> Self {
        let home = home.into();
        let claude_home = home.join(".claude");
        Self {
            plugins_dir: claude_home.join("plugins"),
            claude_home,
            project_dir: None,
            home,
        }
    }

    pub fn with_project_dir(mut self, project_dir: impl Into<PathBuf>) -> Self {
        self.project_dir = Some(project_dir.into());
        self
    }
}

/// Where scanned components came from.
struct Source {
    tag: String,
    scope: String,
}

impl Source {
    fn new(tag: impl Into<String>, scope: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            scope: scope.into(),
        }
    }
}

/// Builds a [`CatalogSnapshot`] from the configured roots.
pub struct CatalogBuilder {
    roots: ScanRoots,
}

impl CatalogBuilder {
    pub fn new(roots: ScanRoots) -> Self {
        Self { roots }
    }

    /// Scan every source and assemble a fresh snapshot.
    pub fn build(&self) -> CatalogSnapshot {
        let mut skills = Vec::new();
        let mut commands = Vec::new();

        let user = Source::new("user", "user");
        skills.extend(scan_skills(&self.roots.claude_home.join("skills"), &user));
        commands.extend(scan_commands(&self.roots.claude_home.join("commands"), &user));

        if let Some(project_dir) = self.roots.project_dir.as_ref().filter(|p| p.is_dir()) {
            let project = Source::new("project", "project");
            let dot_claude = project_dir.join(".claude");
            skills.extend(scan_skills(&dot_claude.join("skills"), &project));
            commands.extend(scan_commands(&dot_claude.join("commands"), &project));
        }

        let plugins = PluginResolver::new(&self.roots.plugins_dir, &self.roots.home).resolve();
        for plugin in &plugins {
            let source = Source::new(plugin.source(), plugin.scope());
            skills.extend(scan_skills(&plugin.root.join("skills"), &source));
            commands.extend(scan_commands(&plugin.root.join("commands"), &source));
        }

        let snapshot = CatalogSnapshot {
            generated_at: Utc::now(),
            skills: dedup_by_key(skills),
            commands: dedup_by_key(commands),
        };

        tracing::info!(
            skills = snapshot.skills.len(),
            commands = snapshot.commands.len(),
            plugins = plugins.len(),
            "Catalog built"
        );

        snapshot
    }
}

/// Sorted glob matches beneath `base`; unreadable entries are dropped.
fn sorted_matches(base: &Path, pattern: &str) -> Vec<PathBuf> {
    let full = format!("{}/{}", glob::Pattern::escape(&base.to_string_lossy()), pattern);
    let mut paths: Vec<PathBuf> = match glob::glob(&full) {
        Ok(entries) => entries.flatten().collect(),
        Err(e) => {
            tracing::warn!(base = %base.display(), error = %e, "Invalid scan pattern");
            Vec::new()
        }
    };
    paths.sort();
    paths
}

/// One skill per immediate subdirectory holding `SKILL.md`.
fn scan_skills(base: &Path, source: &Source) -> Vec<Component> {
    if !base.is_dir() {
        return Vec::new();
    }

    sorted_matches(base, &format!("*/{}", SKILL_FILE))
        .into_iter()
        .filter(|skill_md| skill_md.is_file())
        .filter_map(|skill_md| {
            let name = skill_md.parent()?.file_name()?.to_string_lossy().into_owned();
            let definition_path = std::fs::canonicalize(&skill_md).unwrap_or(skill_md);
            let fm = read_frontmatter(&definition_path);

            Some(Component {
                name,
                kind: ComponentKind::Skill,
                source: source.tag.clone(),
                scope: source.scope.clone(),
                lifecycle: Lifecycle::Active,
                model: fm.non_empty("model"),
                description: fm.non_empty("description"),
                definition_path,
                activation_pattern: None,
                script_path: None,
            })
        })
        .collect()
}

/// Every `*.md` beneath `base`, collapsing aliases of the same real file.
fn scan_commands(base: &Path, source: &Source) -> Vec<Component> {
    if !base.is_dir() {
        return Vec::new();
    }

    let mut seen_real: HashSet<PathBuf> = HashSet::new();
    let mut commands = Vec::new();

    for path in sorted_matches(base, "**/*.md") {
        if !path.is_file() {
            continue;
        }

        // Identity is the resolved file, not the alias name
        let real = match std::fs::canonicalize(&path) {
            Ok(real) => real,
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "Unresolvable command file");
                continue;
            }
        };
        if !seen_real.insert(real.clone()) {
            tracing::debug!(alias = %path.display(), target = %real.display(), "Collapsed command alias");
            continue;
        }

        let Some(name) = path.file_stem().map(|s| s.to_string_lossy().into_owned()) else {
            continue;
        };

        let is_symlink = std::fs::symlink_metadata(&path)
            .map(|m| m.file_type().is_symlink())
            .unwrap_or(false);
        let script_path = if is_symlink { companion_script(&real) } else { None };
        let fm = read_frontmatter(&real);

        commands.push(Component {
            activation_pattern: Some(format!("/{}", name)),
            name,
            kind: ComponentKind::Command,
            source: source.tag.clone(),
            scope: source.scope.clone(),
            lifecycle: lifecycle_for(base, &path),
            model: fm.non_empty("model"),
            description: fm.non_empty("description"),
            definition_path: real,
            script_path,
        });
    }

    commands
}

/// Lifecycle from the first directory segment beneath the commands root.
fn lifecycle_for(base: &Path, path: &Path) -> Lifecycle {
    let Ok(rel) = path.strip_prefix(base) else {
        return Lifecycle::Active;
    };
    let mut components = rel.components();
    match (components.next(), components.next()) {
        (Some(first), Some(_)) => Lifecycle::from_segment(&first.as_os_str().to_string_lossy()),
        _ => Lifecycle::Active,
    }
}

/// First file in the `scripts/` directory beside a command's real file.
fn companion_script(real: &Path) -> Option<PathBuf> {
    let scripts = real.parent()?.join("scripts");
    if !scripts.is_dir() {
        return None;
    }

    sorted_matches(&scripts, "*")
        .into_iter()
        .find(|p| p.is_file())
        .and_then(|p| std::fs::canonicalize(p).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(path: &Path, contents: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    #[test]
    fn test_lifecycle_for_segments() {
        let base = Path::new("/c");
        assert_eq!(lifecycle_for(base, Path::new("/c/top.md")), Lifecycle::Active);
        assert_eq!(lifecycle_for(base, Path::new("/c/_dev/x.md")), Lifecycle::Dev);
        assert_eq!(lifecycle_for(base, Path::new("/c/passive/x.md")), Lifecycle::Passive);
        assert_eq!(lifecycle_for(base, Path::new("/c/act/deep/x.md")), Lifecycle::Active);
        assert_eq!(lifecycle_for(base, Path::new("/c/misc/x.md")), Lifecycle::Active);
    }

    #[test]
    fn test_scan_skills_reads_frontmatter() {
        let temp = TempDir::new().unwrap();
        let base = temp.path().join("skills");
        write(
            &base.join("pdf/SKILL.md"),
            "---\nname: pdf\ndescription: Work with PDFs\nmodel: sonnet\n---\n",
        );
        write(&base.join("notes/README.md"), "no skill file here");
        write(&base.join("stray.md"), "not a directory");

        let skills = scan_skills(&base, &Source::new("user", "user"));
        assert_eq!(skills.len(), 1);
        assert_eq!(skills[0].name, "pdf");
        assert_eq!(skills[0].description.as_deref(), Some("Work with PDFs"));
        assert_eq!(skills[0].model.as_deref(), Some("sonnet"));
        assert_eq!(skills[0].scope, "user");
        assert!(skills[0].definition_path.is_absolute());
    }

    #[test]
    fn test_scan_commands_recursive_with_lifecycle() {
        let temp = TempDir::new().unwrap();
        let base = temp.path().join("commands");
        write(&base.join("top.md"), "# top");
        write(&base.join("_dev/draft.md"), "# draft");
        write(&base.join("passive/watch.md"), "# watch");
        write(&base.join("notes.txt"), "ignored");

        let commands = scan_commands(&base, &Source::new("user", "user"));
        let summary: Vec<_> = commands
            .iter()
            .map(|c| (c.name.as_str(), c.lifecycle, c.activation_pattern.as_deref()))
            .collect();

        assert_eq!(
            summary,
            vec![
                ("draft", Lifecycle::Dev, Some("/draft")),
                ("watch", Lifecycle::Passive, Some("/watch")),
                ("top", Lifecycle::Active, Some("/top")),
            ]
        );
    }

    #[test]
    fn test_missing_roots_are_empty() {
        let source = Source::new("user", "user");
        assert!(scan_skills(Path::new("/nonexistent/skills"), &source).is_empty());
        assert!(scan_commands(Path::new("/nonexistent/commands"), &source).is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_command_discovers_script() {
        use std::os::unix::fs::symlink;

        let temp = TempDir::new().unwrap();
        let target_dir = temp.path().join("repo/tools");
        write(&target_dir.join("deploy.md"), "---\ndescription: Deploy\n---\n");
        write(&target_dir.join("scripts/deploy.sh"), "#!/bin/sh\n");

        let base = temp.path().join("commands");
        fs::create_dir_all(&base).unwrap();
        symlink(target_dir.join("deploy.md"), base.join("deploy.md")).unwrap();

        let commands = scan_commands(&base, &Source::new("user", "user"));
        assert_eq!(commands.len(), 1);
        assert_eq!(commands[0].description.as_deref(), Some("Deploy"));
        assert_eq!(
            commands[0].script_path,
            Some(fs::canonicalize(target_dir.join("scripts/deploy.sh")).unwrap())
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_dangling_symlink_is_skipped() {
        use std::os::unix::fs::symlink;

        let temp = TempDir::new().unwrap();
        let base = temp.path().join("commands");
        fs::create_dir_all(&base).unwrap();
        symlink(temp.path().join("gone.md"), base.join("gone.md")).unwrap();
        write(&base.join("kept.md"), "# kept");

        let commands = scan_commands(&base, &Source::new("user", "user"));
        let names: Vec<_> = commands.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["kept"]);
    }
}
