//! MCP Server - Model Context Protocol 서버
//!
//! Supervisor를 도구로 노출합니다.
//!
//! ## 구성
//! - `transport`: JSON-RPC 2.0 타입과 응답 writer
//! - `server`: 줄 단위 요청 루프 (`initialize`, `ping`, `tools/list`, `tools/call`)
//! - `dispatcher`: 도구 → registry/supervisor 연산
//! - `errors`: 도메인 에러 → 프로토콜 코드
//!
//! ## 참고
//! - https://modelcontextprotocol.io/

mod dispatcher;
mod dto;
pub mod errors;
mod server;
mod transport;
mod types;

pub use dispatcher::ToolDispatcher;
pub use dto::{JobDto, OutputDto, StartDto, StopDto, TaskDto};
pub use errors::to_rpc_error;
pub use server::{McpServer, DEFAULT_PROTOCOL_VERSION, SERVER_NAME};
pub use transport::{encode_frame, JsonRpcError, JsonRpcRequest, JsonRpcResponse};
pub use types::{McpContent, McpTool, McpToolCall, McpToolResult};
