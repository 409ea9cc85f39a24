//! SkillRegistry: validated, precedence-aware name → skill mapping.

use serde::Serialize;

use cowork_core::config::SkillsConfig;
use cowork_core::skill::{discover_skills, DiscoveryResult, SkillDefinition, SkillSource};

/// One `match_skills` hit.
#[derive(Debug, Clone)]
pub struct SkillMatch<'a> {
    pub skill: &'a SkillDefinition,
    pub score: f64,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SourceCounts {
    pub user: usize,
    pub project: usize,
    pub plugin: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RegistryStats {
    pub total: usize,
    pub by_source: SourceCounts,
    pub user_invocable: usize,
    pub model_invocable: usize,
}

/// Registered skills in registration order.
#[derive(Debug, Default)]
pub struct SkillRegistry {
    skills: Vec<SkillDefinition>,
}

impl SkillRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and register. Returns false when the skill is invalid or an entry of equal
    /// or higher precedence already owns the name; a lower-precedence entry is replaced.
    pub fn register(&mut self, mut skill: SkillDefinition) -> bool {
        let errors = skill.validate();
        if !errors.is_empty() {
            tracing::warn!(skill = %skill.name, errors = ?errors, "Failed to register skill");
            return false;
        }

        if let Some(existing) = self.skills.iter_mut().find(|s| s.name == skill.name) {
            if existing.source.precedence() >= skill.source.precedence() {
                tracing::debug!(
                    skill = %skill.name,
                    existing = %existing.source,
                    rejected = %skill.source,
                    "Skill already registered, skipping"
                );
                return false;
            }
            tracing::info!(skill = %skill.name, source = %skill.source, "Replaced skill");
            *existing = skill;
            return true;
        }

        tracing::info!(skill = %skill.name, source = %skill.source, "Registered skill");
        self.skills.push(skill);
        true
    }

    pub fn unregister(&mut self, name: &str) -> bool {
        let before = self.skills.len();
        self.skills.retain(|s| s.name != name);
        self.skills.len() != before
    }

    pub fn clear(&mut self) {
        self.skills.clear();
    }

    pub fn get(&self, name: &str) -> Option<&SkillDefinition> {
        self.skills.iter().find(|s| s.name == name)
    }

    pub fn all(&self) -> &[SkillDefinition] {
        &self.skills
    }

    pub fn len(&self) -> usize {
        self.skills.len()
    }

    pub fn is_empty(&self) -> bool {
        self.skills.is_empty()
    }

    /// Skills offered as `/name` commands.
    pub fn user_invocable(&self) -> Vec<&SkillDefinition> {
        self.skills.iter().filter(|s| s.user_invocable).collect()
    }

    /// Skills the model may invoke on its own.
    pub fn model_invocable(&self) -> Vec<&SkillDefinition> {
        self.skills.iter().filter(|s| s.model_invocable()).collect()
    }

    /// Clear, rediscover from disk, and register everything found.
    pub fn reload(&mut self, config: &SkillsConfig) -> DiscoveryResult {
        self.clear();
        let result = discover_skills(config);
        let mut registered = 0;
        for skill in &result.skills {
            if self.register(skill.clone()) {
                registered += 1;
            }
        }
        for err in &result.errors {
            tracing::warn!(path = %err.path.display(), error = %err.error, "Skill discovery error");
        }
        tracing::info!(
            found = result.skills.len(),
            registered,
            "Skills reloaded"
        );
        result
    }

    pub fn stats(&self) -> RegistryStats {
        let mut by_source = SourceCounts::default();
        for skill in &self.skills {
            match skill.source {
                SkillSource::User => by_source.user += 1,
                SkillSource::Project => by_source.project += 1,
                SkillSource::Plugin => by_source.plugin += 1,
            }
        }
        RegistryStats {
            total: self.skills.len(),
            by_source,
            user_invocable: self.skills.iter().filter(|s| s.user_invocable).count(),
            model_invocable: self.skills.iter().filter(|s| s.model_invocable()).count(),
        }
    }

    /// Rank model-invocable skills against free text.
    ///
    /// +0.5 when the name and the input contain one another, plus up to +0.5 for the share
    /// of input words that overlap a description word.
    pub fn match_skills(&self, input: &str, limit: usize) -> Vec<SkillMatch<'_>> {
        let input_lower = input.trim().to_lowercase();
        if input_lower.is_empty() {
            return Vec::new();
        }
        let input_words: Vec<&str> = input_lower.split_whitespace().collect();

        let mut matches: Vec<SkillMatch<'_>> = Vec::new();
        for skill in self.skills.iter().filter(|s| s.model_invocable()) {
            let name_lower = skill.name.to_lowercase();
            let desc_lower = skill.description.to_lowercase();
            let mut score = 0.0;
            let mut reason = String::new();

            if input_lower.contains(&name_lower) || name_lower.contains(&input_lower) {
                score += 0.5;
                reason.push_str("Name match");
            }

            let desc_words: Vec<&str> = desc_lower.split_whitespace().collect();
            let matched = input_words
                .iter()
                .filter(|w| desc_words.iter().any(|dw| dw.contains(*w) || w.contains(dw)))
                .count();
            if matched > 0 {
                score += matched as f64 / input_words.len() as f64 * 0.5;
                reason = if reason.is_empty() {
                    "Description keywords match".to_string()
                } else {
                    format!("{}, description keywords", reason)
                };
            }

            if score > 0.0 {
                matches.push(SkillMatch {
                    skill,
                    score,
                    reason,
                });
            }
        }

        matches.sort_by(|a, b| b.score.total_cmp(&a.score));
        matches.truncate(limit);
        matches
    }

    /// The `## Available Skills` block for the system prompt.
    pub fn generate_skills_documentation(&self) -> String {
        if self.skills.is_empty() {
            return "## Available Skills\n\nNo skills are currently registered.\n".to_string();
        }

        let mut doc = String::from("## Available Skills\n\n");
        doc.push_str("You can invoke skills using the `/skill-name` format. ");
        doc.push_str("Some skills can be automatically invoked based on user intent.\n\n");

        for (source, title) in [
            (SkillSource::Project, "Project Skills"),
            (SkillSource::User, "User Skills"),
            (SkillSource::Plugin, "Plugin Skills"),
        ] {
            let list: Vec<&SkillDefinition> =
                self.skills.iter().filter(|s| s.source == source).collect();
            if list.is_empty() {
                continue;
            }
            doc.push_str(&format!("### {}\n\n", title));
            for skill in list {
                let invocation = if skill.disable_model_invocation {
                    "(user-only)"
                } else if skill.user_invocable {
                    ""
                } else {
                    "(auto-only)"
                };
                let hint = skill
                    .argument_hint
                    .as_deref()
                    .filter(|h| !h.is_empty())
                    .map(|h| format!(" {}", h))
                    .unwrap_or_default();
                doc.push_str(&format!("- **/{}**{} {}\n", skill.name, hint, invocation));
                doc.push_str(&format!("  {}\n", skill.description));
                if let Some(tools) = skill.allowed_tools.as_ref().filter(|t| !t.is_empty()) {
                    doc.push_str(&format!("  Tools: {}\n", tools.join(", ")));
                }
                doc.push('\n');
            }
        }

        doc.push_str("## Skill Invocation\n\n");
        doc.push_str("- User invokes: `/skill-name arguments`\n");
        doc.push_str("- Auto-invoke: When user intent matches skill description\n");
        doc.push_str("- Skills marked (user-only) can only be invoked by the user\n");
        doc.push_str("- Skills marked (auto-only) are background knowledge for AI\n");
        doc
    }
}
