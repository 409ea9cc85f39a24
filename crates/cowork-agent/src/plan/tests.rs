use std::sync::Arc;

use serde_json::{json, Value};

use cowork_core::skill::{SkillDefinition, SkillSource};

use super::*;
use crate::artifacts::{extract_artifacts, ArtifactMap, ArtifactStore, FALLBACK_KEY};
use crate::error::ModelError;
use crate::test_support::{skill, MemoryWorkspace, RecordingSink, ScriptedModel, StaticFetcher};
use crate::tools::ToolRegistry;
use crate::types::{CancelFlag, ChatMessage, ToolResult};

// ─── Parsing ────────────────────────────────────────────────────────────────

#[test]
fn test_parse_plan_with_and_without_tools() {
    let plan = parse_plan("```plan\n1. a [x]\n2. b\n```").unwrap();
    assert_eq!(plan.len(), 2);
    assert_eq!(plan.steps[0].id, "step_1");
    assert_eq!(plan.steps[0].description, "a");
    assert_eq!(plan.steps[0].tool.as_deref(), Some("x"));
    assert_eq!(plan.steps[1].description, "b");
    assert_eq!(plan.steps[1].tool, None);
    assert!(plan.steps.iter().all(|s| s.status == StepStatus::Pending));
}

#[test]
fn test_parse_plan_rejects_empty_or_missing_block() {
    assert!(parse_plan("```plan\nnot a step\n- also not\n```").is_none());
    assert!(parse_plan("```plan\n\n```").is_none());
    assert!(parse_plan("1. no fence at all [write_file]").is_none());
}

#[test]
fn test_parse_plan_skips_malformed_lines_and_trims() {
    let text = "我来规划一下：\r\n\r\n```plan\r\n  1. 查询数据 [fetch_url]  \r\nnotes here\r\n3. 生成报告文件 [write_file]\r\n```\r\n开始执行...";
    let plan = parse_plan(text).unwrap();
    assert_eq!(plan.len(), 2);
    assert_eq!(plan.steps[0].description, "查询数据");
    assert_eq!(plan.steps[0].tool.as_deref(), Some("fetch_url"));
    // Malformed lines still consume a number.
    assert_eq!(plan.steps[1].id, "step_3");
    assert_eq!(plan.steps[1].tool.as_deref(), Some("write_file"));
}

#[test]
fn test_brackets_that_are_not_tool_names_stay_in_description() {
    let plan = parse_plan("```plan\n1. Compare [A vs B]\n```").unwrap();
    assert_eq!(plan.steps[0].description, "Compare [A vs B]");
    assert_eq!(plan.steps[0].tool, None);

    // Tool names are ASCII identifiers; CJK brackets are part of the description.
    let plan = parse_plan("```plan\n1. 分析数据 [思考]\n2. 写入报告 [write_file]\n```").unwrap();
    assert_eq!(plan.steps[0].description, "分析数据 [思考]");
    assert_eq!(plan.steps[0].tool, None);
    assert_eq!(plan.steps[1].description, "写入报告");
    assert_eq!(plan.steps[1].tool.as_deref(), Some("write_file"));
}

#[test]
fn test_mark_running_and_progress() {
    let mut plan = parse_plan("```plan\n1. a\n2. b\n3. c\n```").unwrap();
    plan.mark_running(1);
    let statuses: Vec<StepStatus> = plan.progress().iter().map(|p| p.status).collect();
    assert_eq!(
        statuses,
        vec![StepStatus::Completed, StepStatus::InProgress, StepStatus::Pending]
    );
    assert_eq!(plan.progress()[2].label, "c");

    plan.complete_all();
    assert!(plan.steps.iter().all(|s| s.status == StepStatus::Completed));
}

#[test]
fn test_prior_results_are_truncated() {
    let mut plan = parse_plan("```plan\n1. fetch [fetch_url]\n2. analyse\n3. write [write_file]\n```").unwrap();
    plan.steps[0].status = StepStatus::Completed;
    plan.steps[0].result = Some(json!({ "status": 200 }));
    plan.steps[1].status = StepStatus::Completed;
    plan.steps[1].result = Some(Value::String("长".repeat(400)));

    let summary = plan.prior_results(2);
    let lines: Vec<&str> = summary.lines().collect();
    assert_eq!(lines[0], r#"1. fetch [completed]: {"status":200}"#);
    assert!(lines[1].starts_with("2. analyse [completed]: 长"));
    assert!(lines[1].ends_with("..."));
    assert_eq!(lines[1].chars().filter(|c| *c == '长').count(), 300);
    assert!(plan.prior_results(0).is_empty());
}

#[test]
fn test_step_status_serialization() {
    assert_eq!(serde_json::to_value(StepStatus::InProgress).unwrap(), "in_progress");
    let step = &parse_plan("```plan\n1. a\n```").unwrap().steps[0];
    let json = serde_json::to_value(step).unwrap();
    assert_eq!(json, json!({ "id": "step_1", "description": "a", "status": "pending" }));
}

#[test]
fn test_planning_prompt_is_stable() {
    let prompt = planning_prompt();
    assert!(prompt.starts_with("\n## Task Planning\n\nWhen the user asks you to perform a complex task"));
    assert!(prompt.contains("```plan\n1. Step description [tool_name]\n2. Another step description\n3. Final step [tool_name]\n```"));
    assert!(prompt.contains("**When NOT to create a plan:**"));
    // Both examples must themselves be parseable plans.
    let example = &prompt[prompt.find("**Example 2").unwrap()..];
    let plan = parse_plan(example).unwrap();
    assert_eq!(plan.len(), 4);
    assert_eq!(plan.steps[2].tool.as_deref(), Some("create_directory"));
}

// ─── Execution ──────────────────────────────────────────────────────────────

struct Harness {
    workspace: Arc<MemoryWorkspace>,
    tools: ToolRegistry,
    artifacts: ArtifactStore,
    transcript: Vec<ChatMessage>,
    sink: RecordingSink,
    cancel: CancelFlag,
    tool_results: Vec<ToolResult>,
}

impl Harness {
    fn new(workspace: MemoryWorkspace) -> Self {
        let workspace = Arc::new(workspace);
        let tools = ToolRegistry::with_builtins(
            workspace.clone(),
            Arc::new(StaticFetcher::json(200, json!({ "price": 1 }))),
        );
        Self {
            workspace,
            tools,
            artifacts: ArtifactStore::new(),
            transcript: vec![ChatMessage::system("sys"), ChatMessage::user("do it")],
            sink: RecordingSink::default(),
            cancel: CancelFlag::new(),
            tool_results: Vec::new(),
        }
    }

    async fn run(
        &mut self,
        plan: &mut TaskPlan,
        model: &ScriptedModel,
        artifact_map: ArtifactMap,
        active_skill: Option<&SkillDefinition>,
    ) -> PlanOutcome {
        let mut ctx = PlanContext {
            model,
            tools: &self.tools,
            artifacts: &mut self.artifacts,
            artifact_map,
            transcript: &mut self.transcript,
            sink: &mut self.sink,
            cancel: &self.cancel,
            active_skill,
            tool_results: Vec::new(),
        };
        let outcome = execute_plan(plan, &mut ctx).await;
        self.tool_results = ctx.tool_results;
        outcome
    }
}

fn tool_reply(tool: &str, params: Value) -> String {
    format!("```tool:{}\n{}\n```", tool, params)
}

#[tokio::test]
async fn test_fail_fast_leaves_later_steps_pending() {
    let mut h = Harness::new(MemoryWorkspace::new().with_file("a.txt", "A"));
    let model = ScriptedModel::new([
        tool_reply("read_file", json!({ "path": "a.txt" })),
        tool_reply("read_file", json!({ "path": "missing.txt" })),
        tool_reply("write_file", json!({ "path": "out.txt", "content": "never" })),
    ]);
    let mut plan =
        parse_plan("```plan\n1. read a [read_file]\n2. read missing [read_file]\n3. write out [write_file]\n```")
            .unwrap();

    let outcome = h.run(&mut plan, &model, ArtifactMap::new(), None).await;

    match outcome {
        PlanOutcome::Failed { step_id, error } => {
            assert_eq!(step_id, "step_2");
            assert!(error.contains("missing.txt"));
        }
        other => panic!("unexpected outcome: {:?}", other),
    }
    assert_eq!(plan.steps[0].status, StepStatus::Completed);
    assert_eq!(plan.steps[0].result.as_ref().unwrap()["content"], "A");
    assert_eq!(plan.steps[1].status, StepStatus::Failed);
    assert_eq!(plan.steps[2].status, StepStatus::Pending);

    assert_eq!(model.request_count(), 2);
    assert_eq!(h.sink.tools_called(), vec!["read_file", "read_file"]);
    assert!(h.workspace.file("out.txt").is_none());
    assert!(h.sink.last_message().starts_with("❌ 步骤 2「read missing」失败"));
}

#[tokio::test]
async fn test_tool_step_reply_and_results_are_reported() {
    let mut h = Harness::new(MemoryWorkspace::new().with_file("a.txt", "A"));
    let step_reply = tool_reply("read_file", json!({ "path": "a.txt" }));
    let model = ScriptedModel::new([
        step_reply.clone(),
        tool_reply("read_file", json!({ "path": "missing.txt" })),
    ]);
    let mut plan = parse_plan("```plan\n1. read a [read_file]\n2. read missing [read_file]\n```").unwrap();

    h.run(&mut plan, &model, ArtifactMap::new(), None).await;

    assert_eq!(h.sink.messages[0].content, step_reply);
    assert_eq!(h.tool_results.len(), 2);
    assert!(h.tool_results[0].success);
    assert!(!h.tool_results[1].success);
}

#[tokio::test]
async fn test_plan_fence_never_fills_path_only_write() {
    let mut h = Harness::new(MemoryWorkspace::new());
    let plan_reply = "```plan\n1. write the report [write_file]\n```";
    let model = ScriptedModel::new([tool_reply("write_file", json!({ "path": "report.md" }))]);
    let mut plan = parse_plan(plan_reply).unwrap();

    let outcome = h.run(&mut plan, &model, extract_artifacts(plan_reply), None).await;

    let PlanOutcome::Failed { error, .. } = outcome else {
        panic!("plan should fail");
    };
    assert_eq!(error, "Missing required parameter: content");
    assert!(h.workspace.file("report.md").is_none());
}

#[tokio::test]
async fn test_tool_step_without_tool_call_fails() {
    let mut h = Harness::new(MemoryWorkspace::new());
    let model = ScriptedModel::new(["Sure, I will write the file now."]);
    let mut plan = parse_plan("```plan\n1. write report [write_file]\n2. done\n```").unwrap();

    let outcome = h.run(&mut plan, &model, ArtifactMap::new(), None).await;

    let PlanOutcome::Failed { step_id, error } = outcome else {
        panic!("plan should fail");
    };
    assert_eq!(step_id, "step_1");
    assert!(error.contains("write_file"));
    assert_eq!(plan.steps[1].status, StepStatus::Pending);
    assert!(h.sink.tool_calls.is_empty());
}

#[tokio::test]
async fn test_full_plan_with_reasoning_step_and_artifacts() {
    let mut h = Harness::new(MemoryWorkspace::new());
    let model = ScriptedModel::new([
        tool_reply("fetch_url", json!({ "url": "https://example.com/nvda" })),
        "The price is stable.".to_string(),
        tool_reply("write_file", json!({ "path": "reports/report.md" })),
    ]);
    let mut artifact_map = ArtifactMap::new();
    artifact_map.insert("report.md".into(), "# Report\n".into());
    let mut plan = parse_plan(
        "```plan\n1. 查询数据 [fetch_url]\n2. 分析走势\n3. 生成报告 [write_file]\n```",
    )
    .unwrap();

    let outcome = h.run(&mut plan, &model, artifact_map, None).await;

    assert_eq!(outcome, PlanOutcome::Completed);
    assert!(plan.steps.iter().all(|s| s.status == StepStatus::Completed));
    assert_eq!(plan.steps[1].result, Some(Value::String("The price is stable.".into())));
    assert_eq!(h.workspace.file("reports/report.md").as_deref(), Some("# Report\n"));
    assert_eq!(h.artifacts.len(), 1);
    assert_eq!(h.sink.artifacts[0].filename, "reports/report.md");

    // The write step was told what the earlier steps produced.
    let last = model.last_request();
    let request = &last.last().unwrap().content;
    assert!(request.contains("You MUST call the `write_file` tool"));
    assert!(request.contains("2. 分析走势 [completed]: The price is stable."));

    let final_progress = h.sink.progress.last().unwrap();
    assert!(final_progress.iter().all(|p| p.status == StepStatus::Completed));
}

#[tokio::test]
async fn test_step_reply_blocks_resolve_write_content() {
    let mut h = Harness::new(MemoryWorkspace::new());
    let reply = format!(
        "```html\n<h1>Hi</h1>\n```\n{}",
        tool_reply("write_file", json!({ "path": "index.html", "content": "[see code block above]" }))
    );
    let model = ScriptedModel::new([reply]);
    let mut plan = parse_plan("```plan\n1. write page [write_file]\n```").unwrap();
    let mut artifact_map = ArtifactMap::new();
    artifact_map.insert(FALLBACK_KEY.into(), "stale".into());

    assert_eq!(
        h.run(&mut plan, &model, artifact_map, None).await,
        PlanOutcome::Completed
    );
    assert_eq!(h.workspace.file("index.html").as_deref(), Some("<h1>Hi</h1>\n"));
}

#[tokio::test]
async fn test_transport_error_fails_step() {
    let mut h = Harness::new(MemoryWorkspace::new());
    let model = ScriptedModel::new(Vec::<String>::new());
    model.push_error(ModelError::Api {
        status: 429,
        body: "quota".into(),
    });
    let mut plan = parse_plan("```plan\n1. think\n2. list [list_directory]\n```").unwrap();

    let outcome = h.run(&mut plan, &model, ArtifactMap::new(), None).await;

    assert_eq!(
        outcome,
        PlanOutcome::Failed {
            step_id: "step_1".into(),
            error: "API error (429): quota".into()
        }
    );
    assert_eq!(plan.steps[1].status, StepStatus::Pending);
}

#[tokio::test]
async fn test_cancelled_plan_runs_nothing() {
    let mut h = Harness::new(MemoryWorkspace::new());
    h.cancel.cancel();
    let model = ScriptedModel::new([tool_reply("list_directory", json!({}))]);
    let mut plan = parse_plan("```plan\n1. list [list_directory]\n2. think\n```").unwrap();

    let outcome = h.run(&mut plan, &model, ArtifactMap::new(), None).await;

    assert_eq!(outcome, PlanOutcome::Cancelled);
    assert_eq!(model.request_count(), 0);
    assert!(plan.steps.iter().all(|s| s.status == StepStatus::Pending));
}

#[tokio::test]
async fn test_active_skill_blocks_disallowed_tool() {
    let mut h = Harness::new(MemoryWorkspace::new().with_file("a.txt", "A"));
    let mut skill = skill("reader", SkillSource::User);
    skill.allowed_tools = Some(vec!["read_*".into()]);
    let model = ScriptedModel::new([tool_reply("delete_file", json!({ "path": "a.txt" }))]);
    let mut plan = parse_plan("```plan\n1. clean up [delete_file]\n```").unwrap();

    let outcome = h.run(&mut plan, &model, ArtifactMap::new(), Some(&skill)).await;

    let PlanOutcome::Failed { error, .. } = outcome else {
        panic!("plan should fail");
    };
    assert!(error.contains("not allowed"));
    assert_eq!(h.workspace.file("a.txt").as_deref(), Some("A"));
    assert!(!h.workspace.calls().iter().any(|c| c.starts_with("delete")));
}
