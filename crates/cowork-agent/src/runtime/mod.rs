//! Collaborator capabilities consumed by the tools and the skill engine.
//!
//! - `workspace`: file I/O confined to a workspace root
//! - `http`:      outbound HTTP for `fetch_url`
//! - `shell`:     shell commands for dynamic skill context and hooks
//!
//! The orchestration code only sees the traits, so tests swap in in-memory fakes.

pub mod http;
pub mod shell;
pub mod workspace;

pub use http::{HttpFetcher, HttpRequest, HttpResponse, ReqwestFetcher};
pub use shell::{CommandOutput, LocalShell, ShellRunner};
pub use workspace::{EntryKind, FileEntry, LocalWorkspace, Workspace};
