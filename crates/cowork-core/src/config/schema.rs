//! 按领域分组的配置结构体
//!
//! 从环境变量加载，统一 fallback 逻辑。

use super::env_keys::{llm, observability as obv_keys, paths, session, skills};
use super::loader::{env_bool, env_optional, env_or, env_parse, load_dotenv};
use std::path::{Path, PathBuf};

/// LLM API 配置
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_base: String,
    pub api_key: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: Option<f64>,
}

impl LlmConfig {
    /// 从环境变量加载，空值使用默认（会自动加载 .env）
    pub fn from_env() -> Self {
        load_dotenv();
        let api_base = env_or(llm::API_BASE, llm::API_BASE_ALIASES, || {
            "https://api.openai.com/v1".to_string()
        });
        let model = env_or(llm::MODEL, llm::MODEL_ALIASES, || {
            Self::default_model_for_base(&api_base).to_string()
        });
        Self {
            api_key: env_or(llm::API_KEY, llm::API_KEY_ALIASES, String::new),
            model,
            max_tokens: env_parse(llm::MAX_TOKENS, &[], 4096),
            temperature: env_optional(llm::TEMPERATURE, &[]).and_then(|s| s.parse().ok()),
            api_base,
        }
    }

    /// 默认 model（当未显式设置时，按 api_base 推断）
    pub fn default_model_for_base(api_base: &str) -> &'static str {
        let base = api_base.to_lowercase();
        if base.contains("localhost:11434") || base.contains("127.0.0.1:11434") {
            "qwen2.5:7b"
        } else if base.contains("anthropic") {
            "claude-3-5-sonnet-20241022"
        } else if base.contains("api.deepseek.com") {
            "deepseek-chat"
        } else if base.contains("dashscope.aliyuncs.com") {
            "qwen-plus"
        } else {
            "gpt-4o"
        }
    }
}

/// 工作区与 skills 目录配置
#[derive(Debug, Clone)]
pub struct PathsConfig {
    pub workspace: PathBuf,
    /// User-scoped skills directory; may start with `~`.
    pub user_skills_dir: String,
    /// Project-scoped skills directory, relative to the workspace unless absolute.
    pub project_skills_dir: String,
}

impl PathsConfig {
    pub fn from_env() -> Self {
        load_dotenv();
        let workspace = env_optional(paths::WORKSPACE, paths::WORKSPACE_ALIASES)
            .map(PathBuf::from)
            .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));
        Self {
            workspace,
            user_skills_dir: env_or(paths::USER_SKILLS_DIR, &[], || {
                "~/.cowork/skills".to_string()
            }),
            project_skills_dir: env_or(paths::PROJECT_SKILLS_DIR, &[], || {
                ".cowork/skills".to_string()
            }),
        }
    }

    /// Same directories, re-rooted at another workspace.
    pub fn with_workspace(&self, workspace: &Path) -> Self {
        Self {
            workspace: workspace.to_path_buf(),
            ..self.clone()
        }
    }
}

/// Skill 发现与调用配置
#[derive(Debug, Clone)]
pub struct SkillsConfig {
    pub user_skills_path: String,
    pub project_skills_path: PathBuf,
    pub enable_nested_discovery: bool,
    pub max_skill_content_length: usize,
    pub auto_invoke_threshold: f64,
}

impl SkillsConfig {
    pub fn from_env() -> Self {
        Self::for_paths(&PathsConfig::from_env())
    }

    pub fn for_paths(paths: &PathsConfig) -> Self {
        load_dotenv();
        let project = PathBuf::from(&paths.project_skills_dir);
        let project_skills_path = if project.is_absolute() {
            project
        } else {
            paths.workspace.join(project)
        };
        Self {
            user_skills_path: paths.user_skills_dir.clone(),
            project_skills_path,
            enable_nested_discovery: env_bool(skills::NESTED_SKILL_DISCOVERY, &[], true),
            max_skill_content_length: env_parse(skills::MAX_SKILL_CONTENT_LENGTH, &[], 50_000),
            auto_invoke_threshold: env_parse(skills::AUTO_INVOKE_THRESHOLD, &[], 0.6),
        }
    }
}

impl Default for SkillsConfig {
    fn default() -> Self {
        Self {
            user_skills_path: "~/.cowork/skills".to_string(),
            project_skills_path: PathBuf::from(".cowork/skills"),
            enable_nested_discovery: true,
            max_skill_content_length: 50_000,
            auto_invoke_threshold: 0.6,
        }
    }
}

/// 会话编排配置
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub enable_task_planning: bool,
    pub debounce_ms: u64,
    pub shell_timeout_secs: u64,
}

impl SessionConfig {
    pub fn from_env() -> Self {
        load_dotenv();
        Self {
            enable_task_planning: env_bool(session::ENABLE_TASK_PLANNING, &[], true),
            debounce_ms: env_parse(session::DEBOUNCE_MS, &[], 800),
            shell_timeout_secs: env_parse(session::SHELL_TIMEOUT_SECS, &[], 30),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            enable_task_planning: true,
            debounce_ms: 800,
            shell_timeout_secs: 30,
        }
    }
}

/// 可观测性配置：quiet、log_level、log_json
#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    pub quiet: bool,
    pub log_level: String,
    pub log_json: bool,
}

impl ObservabilityConfig {
    pub fn from_env() -> &'static Self {
        use std::sync::OnceLock;
        static CACHE: OnceLock<ObservabilityConfig> = OnceLock::new();
        CACHE.get_or_init(|| {
            load_dotenv();
            Self {
                quiet: env_bool(obv_keys::QUIET, &[], false),
                log_level: env_or(obv_keys::LOG_LEVEL, &[], || "cowork=info".to_string()),
                log_json: env_bool(obv_keys::LOG_JSON, &[], false),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_model_for_base() {
        assert_eq!(
            LlmConfig::default_model_for_base("https://api.deepseek.com/v1"),
            "deepseek-chat"
        );
        assert_eq!(
            LlmConfig::default_model_for_base("https://api.anthropic.com"),
            "claude-3-5-sonnet-20241022"
        );
        assert_eq!(
            LlmConfig::default_model_for_base("http://localhost:11434/v1"),
            "qwen2.5:7b"
        );
        assert_eq!(LlmConfig::default_model_for_base("https://proxy.example"), "gpt-4o");
    }

    #[test]
    fn test_project_skills_path_is_rooted_at_workspace() {
        let paths = PathsConfig {
            workspace: PathBuf::from("/tmp/ws"),
            user_skills_dir: "~/.cowork/skills".into(),
            project_skills_dir: ".cowork/skills".into(),
        };
        let cfg = SkillsConfig::for_paths(&paths);
        assert_eq!(cfg.project_skills_path, PathBuf::from("/tmp/ws/.cowork/skills"));

        let moved = SkillsConfig::for_paths(&paths.with_workspace(Path::new("/srv/other")));
        assert_eq!(moved.project_skills_path, PathBuf::from("/srv/other/.cowork/skills"));
    }
}
