//! `taskd mcp` - JSON-RPC 서버 실행

use crate::project::Project;
use anyhow::Result;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use taskd_core::{McpServer, SharedRegistry, ToolDispatcher};
use taskd_task::{JobSupervisor, SupervisorConfig};
use tracing::{info, warn};

/// 종료 시 running job 정리 대기 시간
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// 서버 루프 종료 원인
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServeExit {
    /// 클라이언트가 입력을 닫음
    Eof,
    /// Ctrl-C
    Interrupted,
}

pub async fn run(project: &Project) -> Result<()> {
    let (server, supervisor) = build(project);

    let exit = serve_until(server.serve_stdio(), interrupted(), &supervisor).await?;
    if exit == ServeExit::Interrupted {
        // stdin의 blocking read는 취소할 수 없어 runtime drop이 끝나지 않음
        std::process::exit(0);
    }
    Ok(())
}

fn build(project: &Project) -> (McpServer, JobSupervisor) {
    let registry = Arc::new(SharedRegistry::new(&project.root, &project.allowlist_path));
    let discovered = registry.refresh();
    info!(
        "Serving {} tasks from {} (allowlist: {})",
        discovered.len(),
        project.root.display(),
        project.allowlist_path.display()
    );

    let config = SupervisorConfig::from(&project.config.supervisor);
    let supervisor = JobSupervisor::new(registry.clone(), config);
    let server = McpServer::new(ToolDispatcher::new(registry, supervisor.clone()));
    (server, supervisor)
}

/// Ctrl-C 대기 (핸들러 등록 실패 시 영원히 대기)
async fn interrupted() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Cannot listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}

/// 서버가 끝나거나 인터럽트될 때까지 실행한 뒤 job 정리
async fn serve_until<S, I>(serving: S, interrupt: I, supervisor: &JobSupervisor) -> Result<ServeExit>
where
    S: Future<Output = taskd_foundation::Result<()>>,
    I: Future<Output = ()>,
{
    let result = tokio::select! {
        result = serving => result.map(|()| ServeExit::Eof),
        _ = interrupt => {
            warn!("Interrupted, shutting down");
            Ok(ServeExit::Interrupted)
        }
    };

    supervisor.shutdown(SHUTDOWN_TIMEOUT).await;
    info!("Stopped");
    Ok(result?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_interrupt_returns_while_client_is_connected() {
        let dir = TempDir::new().unwrap();
        let project = Project::open(Some(dir.path().to_path_buf()), None).unwrap();
        let (server, supervisor) = build(&project);

        // Client ends stay open, so the reader never sees EOF
        let (_client_write, server_read) = tokio::io::duplex(1024);
        let (server_write, _client_read) = tokio::io::duplex(1024);

        let exit = tokio::time::timeout(
            Duration::from_secs(5),
            serve_until(server.serve(server_read, server_write), async {}, &supervisor),
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(exit, ServeExit::Interrupted);
    }

    #[tokio::test]
    async fn test_closed_input_is_eof() {
        let dir = TempDir::new().unwrap();
        let project = Project::open(Some(dir.path().to_path_buf()), None).unwrap();
        let (server, supervisor) = build(&project);

        let (client_write, server_read) = tokio::io::duplex(1024);
        let (server_write, _client_read) = tokio::io::duplex(1024);
        drop(client_write);

        let exit = tokio::time::timeout(
            Duration::from_secs(5),
            serve_until(
                server.serve(server_read, server_write),
                std::future::pending(),
                &supervisor,
            ),
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(exit, ServeExit::Eof);
    }
}
