//! MCP Server - 줄 단위 JSON-RPC 서버
//!
//! 요청 루프는 어떤 도구 호출도 기다리지 않습니다. `tools/call`은 각각
//! 별도 task에서 실행되고, 응답은 완료되는 순서대로 기록됩니다.

use super::dispatcher::ToolDispatcher;
use super::transport::{spawn_writer, JsonRpcError, JsonRpcRequest, JsonRpcResponse};
use super::types::McpToolCall;
use serde_json::{json, Value};
use taskd_foundation::{Error, Result};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// 클라이언트가 버전을 보내지 않았을 때 사용
pub const DEFAULT_PROTOCOL_VERSION: &str = "2024-11-05";

pub const SERVER_NAME: &str = "taskd";

/// JSON-RPC 서버
#[derive(Debug, Clone)]
pub struct McpServer {
    dispatcher: ToolDispatcher,
    name: String,
    version: String,
}

impl McpServer {
    pub fn new(dispatcher: ToolDispatcher) -> Self {
        Self {
            dispatcher,
            name: SERVER_NAME.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    pub fn dispatcher(&self) -> &ToolDispatcher {
        &self.dispatcher
    }

    /// stdin/stdout에서 실행
    pub async fn serve_stdio(&self) -> Result<()> {
        self.serve(tokio::io::stdin(), tokio::io::stdout()).await
    }

    /// 입력이 끝날 때까지 요청 처리
    ///
    /// EOF 이후 진행 중인 호출의 응답을 모두 기록한 뒤 반환합니다.
    pub async fn serve<R, W>(&self, reader: R, writer: W) -> Result<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (tx, writer_handle) = spawn_writer(writer);
        let mut reader = BufReader::new(reader);
        let mut calls = JoinSet::new();
        let mut buf = Vec::new();

        info!("{} {} serving", self.name, self.version);

        loop {
            buf.clear();
            let read = reader.read_until(b'\n', &mut buf).await?;
            if read == 0 {
                break;
            }

            let line = String::from_utf8_lossy(&buf);
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            debug!("MCP recv: {}", line);

            self.handle_line(line, &tx, &mut calls).await;

            while calls.try_join_next().is_some() {}
        }

        debug!("Input closed, waiting for {} in-flight calls", calls.len());
        while let Some(joined) = calls.join_next().await {
            if let Err(e) = joined {
                warn!("Tool call task failed: {}", e);
            }
        }

        drop(tx);
        writer_handle
            .await
            .map_err(|e| Error::Internal(format!("response writer panicked: {}", e)))?
    }

    async fn handle_line(
        &self,
        line: &str,
        tx: &mpsc::Sender<JsonRpcResponse>,
        calls: &mut JoinSet<()>,
    ) {
        let value: Value = match serde_json::from_str(line) {
            Ok(value) => value,
            Err(e) => {
                debug!("Unparseable frame: {}", e);
                send(tx, JsonRpcResponse::failure(Value::Null, JsonRpcError::parse_error())).await;
                return;
            }
        };

        if !value.is_object() {
            send(tx, JsonRpcResponse::failure(Value::Null, JsonRpcError::invalid_request())).await;
            return;
        }

        let id = value.get("id").cloned().unwrap_or(Value::Null);
        let request: JsonRpcRequest = match serde_json::from_value(value) {
            Ok(request) => request,
            Err(_) => {
                send(tx, JsonRpcResponse::failure(id, JsonRpcError::invalid_request())).await;
                return;
            }
        };

        if request.jsonrpc != "2.0" {
            send(tx, JsonRpcResponse::failure(id, JsonRpcError::invalid_request())).await;
            return;
        }

        let Some(id) = request.id.clone() else {
            debug!("Notification: {}", request.method);
            return;
        };

        match request.method.as_str() {
            "tools/call" => {
                let call: McpToolCall = match request
                    .params
                    .map(serde_json::from_value::<McpToolCall>)
                    .transpose()
                {
                    Ok(Some(call)) => call,
                    Ok(None) => {
                        let err = JsonRpcError::invalid_params("Missing tool call params");
                        send(tx, JsonRpcResponse::failure(id, err)).await;
                        return;
                    }
                    Err(e) => {
                        let err = JsonRpcError::invalid_params(format!("Invalid tool call: {}", e));
                        send(tx, JsonRpcResponse::failure(id, err)).await;
                        return;
                    }
                };

                let dispatcher = self.dispatcher.clone();
                let tx = tx.clone();
                calls.spawn(async move {
                    let response = match dispatcher.call(&call.name, call.arguments).await {
                        Ok(result) => match serde_json::to_value(&result) {
                            Ok(value) => JsonRpcResponse::success(id, value),
                            Err(e) => JsonRpcResponse::failure(
                                id,
                                JsonRpcError::internal_error(e.to_string()),
                            ),
                        },
                        Err(err) => JsonRpcResponse::failure(id, err),
                    };
                    send(&tx, response).await;
                });
            }
            method => {
                let response = match self.handle_method(method, request.params.as_ref()) {
                    Ok(result) => JsonRpcResponse::success(id, result),
                    Err(err) => JsonRpcResponse::failure(id, err),
                };
                send(tx, response).await;
            }
        }
    }

    /// 즉시 응답하는 메소드
    fn handle_method(
        &self,
        method: &str,
        params: Option<&Value>,
    ) -> std::result::Result<Value, JsonRpcError> {
        match method {
            "initialize" => {
                let protocol_version = params
                    .and_then(|p| p.get("protocolVersion"))
                    .and_then(Value::as_str)
                    .unwrap_or(DEFAULT_PROTOCOL_VERSION);
                Ok(json!({
                    "protocolVersion": protocol_version,
                    "capabilities": { "tools": { "listChanged": false } },
                    "serverInfo": { "name": self.name, "version": self.version }
                }))
            }
            "ping" => Ok(json!({})),
            "tools/list" => {
                let tools = serde_json::to_value(ToolDispatcher::tools())
                    .map_err(|e| JsonRpcError::internal_error(e.to_string()))?;
                Ok(json!({ "tools": tools }))
            }
            other => Err(JsonRpcError::method_not_found(other)),
        }
    }
}

async fn send(tx: &mpsc::Sender<JsonRpcResponse>, response: JsonRpcResponse) {
    if tx.send(response).await.is_err() {
        warn!("Response writer closed, dropping response");
    }
}
