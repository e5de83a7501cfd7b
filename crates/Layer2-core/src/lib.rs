//! taskd-core: Core Runtime for taskd
//!
//! Layer2 - task discovery, 실행 정책, JSON-RPC 도구 서버
//!
//! # 주요 모듈
//!
//! - `registry`: Makefile / package.json task 탐색
//! - `allowlist`: 실행 허용 정책 (TOML)
//! - `mcp`: supervisor를 도구로 노출하는 JSON-RPC 서버
//!
//! # 사용 예시
//!
//! ```ignore
//! use std::sync::Arc;
//! use taskd_core::{McpServer, SharedRegistry, ToolDispatcher};
//! use taskd_task::{JobSupervisor, SupervisorConfig};
//!
//! let registry = Arc::new(SharedRegistry::new(root, allowlist_path));
//! registry.refresh();
//!
//! let supervisor = JobSupervisor::new(registry.clone(), SupervisorConfig::default());
//! let server = McpServer::new(ToolDispatcher::new(registry, supervisor.clone()));
//! server.serve_stdio().await?;
//! supervisor.shutdown(Duration::from_secs(5)).await;
//! ```

pub mod allowlist;
pub mod mcp;
pub mod registry;

// Re-exports: Policy
pub use allowlist::{AllowScope, Allowlist, AllowlistEntry};

// Re-exports: Registry
pub use registry::{PackageManager, SharedRegistry, TaskDefinition, TaskEntry, TaskRegistry, TaskRunner};

// Re-exports: MCP
pub use mcp::{
    JsonRpcError, JsonRpcRequest, JsonRpcResponse, McpContent, McpServer, McpTool, McpToolCall,
    McpToolResult, ToolDispatcher,
};
