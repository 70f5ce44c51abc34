//! Integration coverage for the recording helpers.

use std::time::Duration;

use linkframe::Router;
use linkframe_testing::{CountingRegistry, HookEvent, RecordingHooks, TestContext};
use tokio::time::timeout;

#[tokio::test]
async fn hooks_and_registry_see_one_lifecycle() {
    let hooks = RecordingHooks::new();
    let registry = CountingRegistry::new();
    let (conn, client) = TestContext::new(Router::new())
        .hooks(hooks.hooks())
        .registry(&registry)
        .duplex_connection(12);

    conn.start().expect("fresh connection");
    drop(client);
    timeout(Duration::from_secs(2), conn.wait_closed())
        .await
        .expect("loops exit");

    assert_eq!(
        hooks.events(),
        vec![HookEvent::Start(conn.id()), HookEvent::Stop(conn.id())]
    );
    assert_eq!((registry.added(), registry.removed()), (1, 1));
}
