use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use tokio::{
    sync::mpsc,
    time::{self, Duration, MissedTickBehavior},
};

use crate::reconcile::Reconciler;

/// Run a pass right away and then every `every`, until the process exits.
///
/// A trigger that arrives while a pass is still running is dropped, so passes
/// never overlap. Pass failures are logged and never stop the loop.
pub async fn reconcile_loop(reconciler: Arc<Reconciler>, every: Duration) {
    let (tx, mut rx) = mpsc::channel::<()>(1);
    let is_reconciling = Arc::new(AtomicBool::new(false));

    tokio::spawn(async move {
        let mut interval = time::interval(every);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            tracing::debug!("Triggering periodic reconcile");
            if tx.send(()).await.is_err() {
                break;
            }
        }
    });

    while rx.recv().await.is_some() {
        if is_reconciling
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::debug!("[reconcile] Already running, dropped request");
            continue;
        }

        let reconciler = Arc::clone(&reconciler);
        let is_reconciling = Arc::clone(&is_reconciling);
        tokio::spawn(async move {
            tracing::debug!("[reconcile] Begin");

            let pass = tokio::spawn(async move { reconciler.run_pass().await }).await;
            match pass {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => tracing::error!("[reconcile] Error: {}", e),
                Err(e) => tracing::error!("[reconcile] Pass task failed: {}", e),
            }

            is_reconciling.store(false, Ordering::SeqCst);
            tracing::debug!("[reconcile] Done");
        });
    }
}
