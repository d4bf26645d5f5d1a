mod support;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use ipcgate::LoopbackTransport;

// Random interleavings of acquire, release and duplicate release. After every
// step the counters must be non-negative, sum to the number of open sessions,
// and the registry must hold exactly the open sessions.
#[tokio::test]
async fn counters_and_registry_track_open_sessions() {
    for seed in 0..20u64 {
        let mut rng = StdRng::seed_from_u64(seed);
        let size = rng.random_range(1..=5usize);
        let manager = support::ready_manager(
            LoopbackTransport::new(),
            &[support::channel("svc", &size.to_string())],
        )
        .await;

        let mut open = Vec::new();
        let mut closed = Vec::new();

        for _ in 0..400 {
            let roll = rng.random_range(0..10);
            if roll < 5 || open.is_empty() {
                open.push(manager.acquire("svc", "Svc", "get").await.unwrap());
            } else if roll < 9 {
                let index = rng.random_range(0..open.len());
                let session = open.swap_remove(index);
                manager.release(&session).await;
                closed.push(session);
            } else if !closed.is_empty() {
                let index = rng.random_range(0..closed.len());
                manager.release(&closed[index]).await;
            }

            let loads = support::loads(&manager, "svc").await;
            assert_eq!(loads.len(), size);
            assert_eq!(loads.iter().sum::<usize>(), open.len(), "seed {seed}");

            assert_eq!(manager.outstanding_sessions(), open.len(), "seed {seed}");
            assert!(open.iter().all(|s| manager.registry().contains(s.key())));
            assert!(closed.iter().all(|s| !manager.registry().contains(s.key())));
        }

        for session in &open {
            manager.release(session).await;
        }
        assert_eq!(support::loads(&manager, "svc").await, vec![0; size]);
        assert!(manager.registry().is_empty());
    }
}
