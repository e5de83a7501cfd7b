//! MCP Types - MCP 관련 타입 정의

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 서버가 제공하는 도구 정보
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpTool {
    /// 도구 이름
    pub name: String,

    /// 도구 설명
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// 입력 스키마 (JSON Schema)
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

impl McpTool {
    pub fn new(name: impl Into<String>, description: impl Into<String>, input_schema: Value) -> Self {
        Self {
            name: name.into(),
            description: Some(description.into()),
            input_schema,
        }
    }
}

/// `tools/call` 파라미터
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpToolCall {
    /// 도구 이름
    pub name: String,

    /// 인자
    #[serde(default)]
    pub arguments: Value,
}

/// 도구 실행 결과
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpToolResult {
    /// 결과 콘텐츠
    pub content: Vec<McpContent>,

    /// 구조화된 결과 (content의 텍스트와 같은 JSON)
    #[serde(rename = "structuredContent", skip_serializing_if = "Option::is_none")]
    pub structured_content: Option<Value>,

    /// 실패 여부
    #[serde(rename = "isError", default)]
    pub is_error: bool,
}

/// MCP 콘텐츠
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum McpContent {
    /// 텍스트 콘텐츠
    Text { text: String },
}

impl McpToolResult {
    /// JSON payload로 성공 결과 생성
    pub fn json(value: Value) -> Self {
        Self {
            content: vec![McpContent::Text {
                text: value.to_string(),
            }],
            structured_content: Some(value),
            is_error: false,
        }
    }

    /// 텍스트 결과 추출
    pub fn text(&self) -> Option<&str> {
        self.content.iter().find_map(|content| match content {
            McpContent::Text { text } => Some(text.as_str()),
        })
    }
}
