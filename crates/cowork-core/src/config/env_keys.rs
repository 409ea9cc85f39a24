//! 环境变量 key 常量与别名定义
//!
//! 主变量优先使用 `COWORK_*`，兼容 `OPENAI_*`、`ANTHROPIC_*` 等。

/// LLM API 配置
pub mod llm {
    /// API Base，主变量优先
    pub const API_BASE: &str = "COWORK_API_BASE";
    pub const API_BASE_ALIASES: &[&str] = &[
        "OPENAI_API_BASE",
        "OPENAI_BASE_URL",
        "BASE_URL",
        "NEXT_PUBLIC_OPENAI_BASE_URL",
    ];

    /// API Key
    pub const API_KEY: &str = "COWORK_API_KEY";
    pub const API_KEY_ALIASES: &[&str] = &[
        "OPENAI_API_KEY",
        "ANTHROPIC_API_KEY",
        "API_KEY",
        "NEXT_PUBLIC_OPENAI_API_KEY",
    ];

    /// Model
    pub const MODEL: &str = "COWORK_MODEL";
    pub const MODEL_ALIASES: &[&str] = &["OPENAI_MODEL", "MODEL", "NEXT_PUBLIC_DEFAULT_MODEL"];

    pub const MAX_TOKENS: &str = "COWORK_MAX_TOKENS";
    pub const TEMPERATURE: &str = "COWORK_TEMPERATURE";
}

/// 工作区与 skills 目录
pub mod paths {
    pub const WORKSPACE: &str = "COWORK_WORKSPACE";
    pub const WORKSPACE_ALIASES: &[&str] = &["WORKSPACE_ROOT"];

    pub const USER_SKILLS_DIR: &str = "COWORK_USER_SKILLS_DIR";
    pub const PROJECT_SKILLS_DIR: &str = "COWORK_PROJECT_SKILLS_DIR";
}

/// Skill 发现与调用
pub mod skills {
    pub const MAX_SKILL_CONTENT_LENGTH: &str = "COWORK_MAX_SKILL_CONTENT_LENGTH";
    pub const NESTED_SKILL_DISCOVERY: &str = "COWORK_NESTED_SKILL_DISCOVERY";
    /// Minimum match score for model-initiated (non-slash) skill invocation.
    pub const AUTO_INVOKE_THRESHOLD: &str = "COWORK_SKILL_AUTO_INVOKE_THRESHOLD";
}

/// 会话编排
pub mod session {
    pub const ENABLE_TASK_PLANNING: &str = "COWORK_ENABLE_TASK_PLANNING";
    pub const DEBOUNCE_MS: &str = "COWORK_DEBOUNCE_MS";
    pub const SHELL_TIMEOUT_SECS: &str = "COWORK_SHELL_TIMEOUT_SECS";
}

/// 可观测性与日志
pub mod observability {
    pub const QUIET: &str = "COWORK_QUIET";
    pub const LOG_LEVEL: &str = "COWORK_LOG_LEVEL";
    pub const LOG_JSON: &str = "COWORK_LOG_JSON";
}

/// 废弃变量 → 推荐变量映射（用于检测并提示迁移）
pub const DEPRECATED_PAIRS: &[(&str, &str)] = &[
    ("NEXT_PUBLIC_OPENAI_API_KEY", llm::API_KEY),
    ("NEXT_PUBLIC_OPENAI_BASE_URL", llm::API_BASE),
    ("NEXT_PUBLIC_DEFAULT_MODEL", llm::MODEL),
    ("WORKSPACE_ROOT", paths::WORKSPACE),
];
