use std::time::Duration;

use tokio::time::timeout;

use crate::Ready;

#[tokio::test]
async fn timeout_from_incomplete() -> anyhow::Result<()> {
    let ready = Ready::<()>::new();
    let subscription = ready.subscribe();

    let task = tokio::spawn(async move {
        timeout(Duration::from_millis(100), subscription.wait())
            .await
            .expect_err("subscription.wait() shouldn't return here");
    });
    task.await?;

    Ok(())
}

#[tokio::test]
async fn wait_after_ready() {
    let ready = Ready::new();

    let subscription_pre = ready.subscribe();
    ready.complete(42u32);
    let subscription_post = ready.subscribe();

    // wait should return immediately after completion.
    let pre = timeout(Duration::from_millis(100), subscription_pre.wait())
        .await
        .expect("subscription_pre.wait() should not have timed out");
    let post = timeout(Duration::from_millis(100), subscription_post.wait())
        .await
        .expect("subscription_post.wait() should not have timed out");
    assert_eq!(pre, 42);
    assert_eq!(post, 42);
}

#[tokio::test]
async fn wait_before_ready() -> anyhow::Result<()> {
    let ready = Ready::new();
    let subscription = ready.subscribe();

    let handle = tokio::spawn(async move {
        timeout(Duration::from_millis(100), subscription.wait())
            .await
            .expect("subscription.wait() should not have timed out")
    });
    tokio::spawn(async move {
        ready.complete("done".to_string());
    });
    assert_eq!(handle.await?, "done");

    Ok(())
}

#[tokio::test]
async fn complete_only_once() {
    let ready = Ready::new();
    assert!(!ready.is_complete());
    assert_eq!(ready.get(), None);

    assert!(ready.complete(1));
    assert!(!ready.complete(2));
    assert!(ready.is_complete());
    assert_eq!(ready.get(), Some(1));
    assert_eq!(ready.wait().await, 1);
}

#[tokio::test]
async fn dropped_latch_keeps_subscription_pending() -> anyhow::Result<()> {
    let subscription = {
        let ready = Ready::<()>::new();
        ready.subscribe()
    };

    let task = tokio::spawn(async move {
        timeout(Duration::from_millis(100), subscription.wait())
            .await
            .expect_err("an abandoned latch should never complete");
    });
    task.await?;

    Ok(())
}
