mod support;

use ipcgate::LoopbackTransport;

const TASKS: usize = 100;
const ROUNDS: usize = 1000;

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn hammering_acquire_release_leaves_every_counter_at_zero() {
    let manager =
        support::ready_manager(LoopbackTransport::new(), &[support::channel("svc", "3")]).await;

    let handles: Vec<_> = (0..TASKS)
        .map(|task| {
            let manager = manager.clone();
            tokio::spawn(async move {
                for round in 0..ROUNDS {
                    let service_id = format!("op-{}", (task + round) % 4);
                    let session = manager
                        .acquire("svc", "Svc", &service_id)
                        .await
                        .expect("acquire");
                    manager.release(&session).await;
                }
            })
        })
        .collect();

    for handle in handles {
        handle.await.expect("task panicked");
    }

    assert_eq!(support::loads(&manager, "svc").await, vec![0, 0, 0]);
    assert!(manager.registry().is_empty());
    assert_eq!(manager.transport().live_sessions(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_holders_never_exceed_a_balanced_spread() {
    let manager =
        support::ready_manager(LoopbackTransport::new(), &[support::channel("svc", "3")]).await;

    // 30 sessions held at once must land 10/10/10: every pick happens under
    // the pool lock, so no two acquirers see the same counter value.
    let handles: Vec<_> = (0..30)
        .map(|_| {
            let manager = manager.clone();
            tokio::spawn(async move { manager.acquire("svc", "Svc", "get").await.unwrap() })
        })
        .collect();

    let mut sessions = Vec::new();
    for handle in handles {
        sessions.push(handle.await.unwrap());
    }
    assert_eq!(support::loads(&manager, "svc").await, vec![10, 10, 10]);
    assert_eq!(manager.outstanding_sessions(), 30);

    let releases: Vec<_> = sessions
        .into_iter()
        .map(|session| {
            let manager = manager.clone();
            tokio::spawn(async move {
                manager.release(&session).await;
                manager.release(&session).await;
            })
        })
        .collect();
    for handle in releases {
        handle.await.unwrap();
    }

    assert_eq!(support::loads(&manager, "svc").await, vec![0, 0, 0]);
    assert!(manager.registry().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_releases_of_one_session_tear_it_down_once() {
    let manager =
        support::ready_manager(LoopbackTransport::new(), &[support::channel("svc", "1")]).await;

    let keep = manager.acquire("svc", "Svc", "get").await.unwrap();
    let victim = manager.acquire("svc", "Svc", "get").await.unwrap();
    assert_eq!(support::loads(&manager, "svc").await, vec![2]);

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let manager = manager.clone();
            let victim = victim.clone();
            tokio::spawn(async move { manager.release(&victim).await })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(support::loads(&manager, "svc").await, vec![1]);
    assert!(manager.registry().contains(keep.key()));
    assert!(manager.transport().is_live(keep.remote()));
}
