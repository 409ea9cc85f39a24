//! Task plans: the numbered `plan` fence DSL and its step state machine.
//!
//! Each non-blank line of the fence reads `N. description [tool_name]`, the tool being
//! optional. `engine` drives a parsed plan one step at a time, fail-fast.

mod engine;

#[cfg(test)]
mod tests;

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::{truncate_chars, ProgressStep};

pub use engine::{execute_plan, PlanContext, PlanOutcome};

/// Characters of a step result kept in the prior-results summary.
const PRIOR_RESULT_MAX_CHARS: usize = 300;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl StepStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            StepStatus::Pending => "pending",
            StepStatus::InProgress => "in_progress",
            StepStatus::Completed => "completed",
            StepStatus::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskStep {
    pub id: String,
    pub description: String,
    /// Tool the step must call, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool: Option<String>,
    pub status: StepStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TaskStep {
    fn new(id: String, description: String, tool: Option<String>) -> Self {
        Self {
            id,
            description,
            tool,
            status: StepStatus::Pending,
            result: None,
            error: None,
        }
    }
}

/// Ordered steps of one plan execution.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskPlan {
    pub steps: Vec<TaskStep>,
}

impl TaskPlan {
    pub fn new(steps: Vec<TaskStep>) -> Self {
        Self { steps }
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Step `index` becomes `in_progress`; earlier steps `completed`, later ones `pending`.
    pub fn mark_running(&mut self, index: usize) {
        for (i, step) in self.steps.iter_mut().enumerate() {
            step.status = match i.cmp(&index) {
                std::cmp::Ordering::Less => StepStatus::Completed,
                std::cmp::Ordering::Equal => StepStatus::InProgress,
                std::cmp::Ordering::Greater => StepStatus::Pending,
            };
        }
    }

    pub fn complete_all(&mut self) {
        for step in &mut self.steps {
            step.status = StepStatus::Completed;
        }
    }

    /// Progress display entries, one per step.
    pub fn progress(&self) -> Vec<ProgressStep> {
        self.steps
            .iter()
            .map(|s| ProgressStep {
                label: s.description.clone(),
                status: s.status,
            })
            .collect()
    }

    /// Compact summary of every step before `index` that has finished.
    pub fn prior_results(&self, index: usize) -> String {
        let mut out = String::new();
        for (i, step) in self.steps.iter().take(index).enumerate() {
            if !matches!(step.status, StepStatus::Completed | StepStatus::Failed) {
                continue;
            }
            out.push_str(&format!("{}. {} [{}]", i + 1, step.description, step.status.as_str()));
            let detail = match (&step.result, &step.error) {
                (_, Some(err)) => Some(err.clone()),
                (Some(Value::String(s)), _) => Some(s.clone()),
                (Some(v), _) => Some(v.to_string()),
                _ => None,
            };
            if let Some(detail) = detail {
                let (head, cut) = truncate_chars(&detail, PRIOR_RESULT_MAX_CHARS);
                out.push_str(": ");
                out.push_str(head);
                if cut {
                    out.push_str("...");
                }
            }
            out.push('\n');
        }
        out
    }
}

// ─── Parsing ────────────────────────────────────────────────────────────────

fn plan_block_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)```plan\r?\n(.*?)```").expect("plan block regex"))
}

fn plan_line_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\d+\.\s+(.+?)(?:\s+\[([A-Za-z0-9_]+)\])?$").expect("plan line regex")
    })
}

/// Parse the first `plan` fence. `None` when there is no block or no valid line.
///
/// Malformed lines are skipped but still count toward step numbering.
pub fn parse_plan(text: &str) -> Option<TaskPlan> {
    let body = plan_block_re().captures(text)?.get(1)?.as_str();

    let steps: Vec<TaskStep> = body
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .enumerate()
        .filter_map(|(index, line)| {
            let Some(caps) = plan_line_re().captures(line) else {
                tracing::debug!(line, "Skipping malformed plan line");
                return None;
            };
            Some(TaskStep::new(
                format!("step_{}", index + 1),
                caps[1].trim().to_string(),
                caps.get(2).map(|m| m.as_str().to_string()),
            ))
        })
        .collect();

    if steps.is_empty() {
        return None;
    }
    tracing::info!(steps = steps.len(), "Parsed task plan");
    Some(TaskPlan::new(steps))
}

/// The "## Task Planning" section of the system prompt.
pub fn planning_prompt() -> &'static str {
    r#"
## Task Planning

When the user asks you to perform a complex task, you should FIRST create a task plan before executing any tools.

**Planning Format:**
```plan
1. Step description [tool_name]
2. Another step description
3. Final step [tool_name]
```

**Rules:**
- Break down complex tasks into clear steps
- Specify which tool to use for each step (if needed)
- Some steps may not need tools (like analysis or thinking)
- Keep steps concise and actionable

**Example 1 - Stock Query:**
User: "查询英伟达最近一周的股价并生成报告"

You should respond:
我来帮你完成这个任务，让我先规划一下步骤：

```plan
1. 查询英伟达股票数据 [fetch_url]
2. 分析股票走势和关键指标
3. 生成分析报告文件 [write_file]
```

现在开始执行...

**Example 2 - File Operations:**
User: "帮我整理项目文档"

You should respond:
好的，我来规划整理步骤：

```plan
1. 列出当前目录的所有文件 [list_directory]
2. 识别文档类型并分类
3. 创建分类文件夹 [create_directory]
4. 移动文件到对应文件夹
```

开始执行...

**When to create a plan:**
- Task involves multiple steps
- Task requires different tools
- Task needs data processing between steps
- User explicitly asks for a structured approach

**When NOT to create a plan:**
- Simple single-step tasks (just use the tool directly)
- User asks a simple question
- Task is just reading or listing information
"#
}
