//! Integration tests for single-owner lanes shared across threads

use runcontext::continuation::ContextFuture;
use runcontext::error::ContextError;
use runcontext::execution::{ContextOptions, ExecutionContextService};
use runcontext::View;
use std::sync::mpsc;
use std::thread::JoinHandle;
use std::time::Duration;

use crate::integration::test_utils::{simple_registration, Simple, SimpleLog};

fn simple_index(view: &View) -> anyhow::Result<usize> {
    view.active_segment_as::<Simple, _>("simple", |s| s.index)?
        .ok_or_else(|| anyhow::anyhow!("active segment is not Simple"))
}

/// Enter a `simple` frame on `view` from a background thread and stay inside
/// it until the returned sender fires.
fn hold_lane(view: View) -> (mpsc::Sender<()>, JoinHandle<Result<usize, ContextError>>) {
    let (entered_tx, entered_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel::<()>();
    let holder = std::thread::spawn(move || {
        view.run(&ContextOptions::new().enter("simple"), || {
            entered_tx.send(())?;
            release_rx.recv()?;
            simple_index(&view)
        })
    });
    entered_rx.recv().unwrap();
    (release_tx, holder)
}

#[test]
fn test_second_thread_on_held_lane_is_refused() {
    let service = ExecutionContextService::new();
    let log = SimpleLog::default();
    service.register(simple_registration(&log)).unwrap();
    let view = service.for_continuations();
    let (release, holder) = hold_lane(view.clone());

    let contender = view.clone();
    let refused = std::thread::spawn(move || {
        contender.run(&ContextOptions::new().enter("simple"), || Ok("contender"))
    })
    .join()
    .unwrap();
    assert!(matches!(
        refused,
        Err(ContextError::LaneBusy { ref lane }) if lane == "PromiseThread"
    ));
    assert_eq!(view.depth(), 1);

    release.send(()).unwrap();
    assert_eq!(holder.join().unwrap().unwrap(), 1);
    assert_eq!(view.depth(), 0);
    assert!(service.lane_names().is_empty());
    // Root and the holder's child; the refused call built nothing.
    assert_eq!(log.created(), 2);
}

#[test]
fn test_reaction_on_held_lane_runs_on_private_fork() {
    let service = ExecutionContextService::new();
    let log = SimpleLog::default();
    service.register(simple_registration(&log)).unwrap();
    let view = service.for_continuations();
    let (release, holder) = hold_lane(view.clone());

    let future = ContextFuture::resolved(view.clone(), ())
        .then(|_, view| Ok((view.lane().to_string(), simple_index(view)?)));
    let (lane, index) = futures::executor::block_on(future).unwrap();

    // The holder's live child is not visible to the reaction.
    assert_eq!(lane, "PromiseThread.0");
    assert_eq!(index, 0);
    assert_eq!(service.lane_names(), vec!["PromiseThread".to_string()]);

    release.send(()).unwrap();
    assert_eq!(holder.join().unwrap().unwrap(), 1);
    assert!(service.lane_names().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_spawned_chains_share_continuation_lane() {
    let service = ExecutionContextService::new();
    let log = SimpleLog::default();
    service.register(simple_registration(&log)).unwrap();
    let view = service.for_continuations();
    view.active_segment("simple").unwrap();

    let chains: Vec<_> = (0..32u64)
        .map(|i| {
            ContextFuture::resolved(view.clone(), i)
                .then_in(ContextOptions::new().enter("simple"), |v, view| {
                    std::thread::sleep(Duration::from_millis(1));
                    simple_index(view)?;
                    Ok(v * 2)
                })
                .spawn()
        })
        .collect();
    for (i, chain) in chains.into_iter().enumerate() {
        assert_eq!(chain.await.unwrap(), i as u64 * 2);
    }

    // One root plus one child per reaction, wherever it ran.
    assert_eq!(log.created(), 33);
    assert_eq!(view.depth(), 0);
    assert!(service.lane_names().is_empty());
}
