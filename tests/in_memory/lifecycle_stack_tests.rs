//! In-memory integration tests for lifecycle stack shutdown ordering.

use std::sync::Arc;

use rstest::{fixture, rstest};
use switchboard::tool_connection::{
    adapters::{InMemoryToolServerLauncher, memory::LaunchFault},
    domain::{ServerLaunchSpec, ServerName},
    ports::{ToolConnection, ToolConnectionError, ToolServerLauncher},
    services::{LifecycleStack, LifecycleStackError},
};

fn server(name: &str) -> ServerName {
    ServerName::new(name).expect("server name should be valid")
}

fn spec() -> ServerLaunchSpec {
    ServerLaunchSpec::new("mcp-server").expect("launch spec should be valid")
}

#[fixture]
fn launcher() -> InMemoryToolServerLauncher {
    InMemoryToolServerLauncher::new()
}

async fn open(launcher: &InMemoryToolServerLauncher, name: &str) -> Arc<dyn ToolConnection> {
    launcher
        .launch(&server(name), &spec())
        .await
        .expect("launch should succeed")
}

#[rstest]
#[tokio::test]
async fn close_all_releases_in_reverse_order(launcher: InMemoryToolServerLauncher) {
    let mut stack = LifecycleStack::new();
    for name in ["alpha", "bravo", "charlie"] {
        stack
            .register(open(&launcher, name).await)
            .expect("registration should succeed");
    }

    let failures = stack.close_all().await;

    assert!(failures.is_empty());
    assert_eq!(
        launcher.journal().entries(),
        vec![server("charlie"), server("bravo"), server("alpha")]
    );
    assert!(stack.is_empty());
}

#[rstest]
#[tokio::test]
async fn failing_close_is_reported_and_siblings_still_close(launcher: InMemoryToolServerLauncher) {
    launcher.fail_close(server("bravo"), "broken pipe");
    let mut stack = LifecycleStack::new();
    for name in ["alpha", "bravo", "charlie"] {
        stack
            .register(open(&launcher, name).await)
            .expect("registration should succeed");
    }

    let failures = stack.close_all().await;

    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].server, server("bravo"));
    assert!(matches!(failures[0].error, ToolConnectionError::Close { .. }));
    assert!(
        launcher
            .launched()
            .iter()
            .all(|connection| connection.state().as_str() == "closed")
    );
    assert!(stack.close_all().await.is_empty());
}

#[rstest]
#[tokio::test]
async fn duplicate_registration_keeps_count(launcher: InMemoryToolServerLauncher) {
    let mut stack = LifecycleStack::new();
    let connection = open(&launcher, "alpha").await;
    stack
        .register(Arc::clone(&connection))
        .expect("first registration should succeed");

    let result = stack.register(Arc::clone(&connection));

    assert!(matches!(
        result,
        Err(LifecycleStackError::DuplicateRegistration { .. })
    ));
    assert_eq!(stack.len(), 1);
    stack.shutdown().await.expect("shutdown should succeed");
    assert_eq!(launcher.journal().entries(), vec![server("alpha")]);
}

#[rstest]
#[tokio::test]
async fn failed_launch_opens_nothing(launcher: InMemoryToolServerLauncher) {
    launcher.fail_launch(server("alpha"), LaunchFault::Spawn);

    let result = launcher.launch(&server("alpha"), &spec()).await;

    assert!(matches!(result, Err(ToolConnectionError::Launch { .. })));
    assert!(launcher.launched().is_empty());
    assert!(launcher.journal().entries().is_empty());
}

#[rstest]
#[tokio::test]
async fn shutdown_aggregates_failures(launcher: InMemoryToolServerLauncher) {
    launcher.fail_close(server("alpha"), "timeout");
    launcher.fail_close(server("charlie"), "timeout");
    let mut stack = LifecycleStack::new();
    for name in ["alpha", "bravo", "charlie"] {
        stack
            .register(open(&launcher, name).await)
            .expect("registration should succeed");
    }

    let error = stack.shutdown().await.expect_err("shutdown should fail");

    let failed: Vec<_> = error
        .failures()
        .iter()
        .map(|failure| failure.server.as_str())
        .collect();
    assert_eq!(failed, ["charlie", "alpha"]);
}
