//! CLI entry-points: single-shot, interactive REPL, and registry listings.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};

use cowork_agent::llm::LlmClient;
use cowork_agent::runtime::{LocalWorkspace, ReqwestFetcher};
use cowork_agent::skills::SkillRegistry;
use cowork_agent::tools::ToolRegistry;
use cowork_agent::{AgentConfig, Session, SubmitOutcome};

use crate::cli::GlobalOptions;
use crate::terminal::TerminalEventSink;

/// Environment config with command-line overrides applied.
pub fn build_config(options: &GlobalOptions) -> Result<AgentConfig> {
    let mut config = AgentConfig::from_env();
    if let Some(base) = &options.api_base {
        config.api_base = base.clone();
    }
    if let Some(key) = &options.api_key {
        config.api_key = key.clone();
    }
    if let Some(model) = &options.model {
        config.model = model.clone();
    }
    if let Some(ws) = &options.workspace {
        config = config.with_workspace(resolve_workspace(ws)?);
    }
    if options.no_plan {
        config.enable_task_planning = false;
    }
    config.verbose = options.verbose;
    Ok(config)
}

fn resolve_workspace(ws: &str) -> Result<PathBuf> {
    let path = Path::new(ws);
    path.canonicalize()
        .with_context(|| format!("Workspace does not exist: {}", path.display()))
}

fn new_session(config: AgentConfig) -> Result<Session> {
    if config.api_key.trim().is_empty() {
        anyhow::bail!("API key required. Set COWORK_API_KEY (or OPENAI_API_KEY) or use --api-key.");
    }
    let model = LlmClient::from_config(&config).context("Failed to create model client")?;
    tracing::info!(model = %model.model(), format = ?model.format(), "Model client ready");
    Session::new(config, Arc::new(model))
}

fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Runtime::new().context("Failed to create tokio runtime")
}

/// Print what a finished submission means for the user, when the sink has not already.
fn report_outcome(outcome: &SubmitOutcome) {
    match outcome {
        SubmitOutcome::Completed(report) if report.cancelled => eprintln!("⏹️ 已取消"),
        SubmitOutcome::Completed(_) => {}
        SubmitOutcome::Busy => eprintln!("⏳ 上一个请求仍在处理中"),
        SubmitOutcome::Duplicate => eprintln!("ℹ️  重复的请求已忽略"),
        SubmitOutcome::Empty => {}
    }
}

/// `cowork run <message>`: one turn, reply on stdout.
pub fn run_single(options: &GlobalOptions, message: &str) -> Result<()> {
    let config = build_config(options)?;
    let session = new_session(config)?;
    let mut sink = TerminalEventSink::new(options.verbose);

    let outcome = runtime()?.block_on(async { session.submit(message, Vec::new(), &mut sink).await });
    report_outcome(&outcome);
    if let SubmitOutcome::Completed(report) = &outcome {
        if let Some(error) = &report.error {
            anyhow::bail!("{}", error);
        }
    }
    Ok(())
}

/// `cowork chat`: rustyline REPL. Ctrl-C during a turn cancels the turn.
pub fn run_chat(options: &GlobalOptions) -> Result<()> {
    let config = build_config(options)?;
    eprintln!("┌────────────────────────────────────────────────────────────");
    eprintln!("│  🤝 Cowork Chat  ·  model: {}", config.model);
    eprintln!("│  workspace: {}", config.workspace.display());
    eprintln!("│  /exit 退出  ·  /clear 清空  ·  /技能名 参数 调用技能");
    eprintln!("└────────────────────────────────────────────────────────────\n");

    let session = new_session(config)?;
    let rt = runtime()?;
    rt.block_on(interactive_loop(session, options.verbose))
}

async fn interactive_loop(session: Session, verbose: bool) -> Result<()> {
    let mut sink = TerminalEventSink::new(verbose);
    let mut rl = rustyline::DefaultEditor::new()
        .map_err(|e| anyhow::anyhow!("Failed to create line editor: {}", e))?;

    loop {
        match rl.readline("You> ") {
            Ok(line) => {
                let input = line.trim();
                if input.is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(input);

                match input {
                    "/exit" | "/quit" | "/q" => {
                        eprintln!("👋 Bye!");
                        break;
                    }
                    "/clear" => {
                        session.clear().await;
                        eprintln!("🗑️  Session cleared.");
                        continue;
                    }
                    _ => {}
                }

                eprintln!();
                let turn = session.submit(input, Vec::new(), &mut sink);
                tokio::pin!(turn);
                let outcome = tokio::select! {
                    outcome = &mut turn => outcome,
                    _ = tokio::signal::ctrl_c() => {
                        session.cancel();
                        turn.await
                    }
                };
                report_outcome(&outcome);
                eprintln!();
            }
            Err(rustyline::error::ReadlineError::Interrupted) => {
                eprintln!("\n^C");
                eprintln!("👋 Bye!");
                break;
            }
            Err(rustyline::error::ReadlineError::Eof) => {
                eprintln!("👋 Bye!");
                break;
            }
            Err(e) => {
                eprintln!("Error: {}", e);
                break;
            }
        }
    }
    Ok(())
}

/// `cowork skills [--docs]`
pub fn list_skills(options: &GlobalOptions, docs: bool) -> Result<()> {
    let config = build_config(options)?;
    let mut registry = SkillRegistry::new();
    let discovery = registry.reload(&config.skills);

    if docs {
        println!("{}", registry.generate_skills_documentation());
        return Ok(());
    }

    let stats = registry.stats();
    println!(
        "{} skill(s): {} project, {} user, {} plugin  ·  {} user-invocable, {} model-invocable",
        stats.total,
        stats.by_source.project,
        stats.by_source.user,
        stats.by_source.plugin,
        stats.user_invocable,
        stats.model_invocable
    );
    for skill in registry.all() {
        let hint = skill
            .argument_hint
            .as_deref()
            .map(|h| format!(" {}", h))
            .unwrap_or_default();
        println!("  /{}{}  [{}]  {}", skill.name, hint, skill.source, skill.description);
    }
    for err in &discovery.errors {
        eprintln!("  ⚠️  {}: {}", err.path.display(), err.error);
    }
    Ok(())
}

/// `cowork tools`
pub fn list_tools(options: &GlobalOptions) -> Result<()> {
    let config = build_config(options)?;
    let tools = ToolRegistry::with_builtins(
        Arc::new(LocalWorkspace::new(config.workspace.clone())),
        Arc::new(ReqwestFetcher::new()?),
    );
    println!("{}", tools.documentation());
    Ok(())
}
