//! Dispatch scenarios driving an agent over the memory engine.

use std::time::Duration;

use miner::memory::{MemoryChain, MemoryEngine, MemorySeal};
use miner::{Agent, SealOutcome, Work};
use tokio::sync::mpsc;
use tokio::time::timeout;

/// A block waiting for its seal. Identified by number only.
#[derive(Clone, Debug, Eq, PartialEq)]
struct Block {
    number: u64,
}

type TestEngine = MemoryEngine<Block>;
type Outcomes = mpsc::Receiver<SealOutcome<TestEngine>>;

/// An agent over a memory engine, with a sink already configured. The
/// returned engine clone shares the attempt counter with the agent's.
fn new_agent(mode: MemorySeal) -> (Agent<TestEngine>, TestEngine, Outcomes) {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let engine = MemoryEngine::new(mode);
    let agent = Agent::new(MemoryChain, engine.clone());
    let (result_tx, result_rx) = mpsc::channel(8);
    agent.set_result_sink(result_tx);

    (agent, engine, result_rx)
}

fn block(number: u64) -> Work<Block> {
    Work::new(Block { number })
}

async fn wait_for(mut cond: impl FnMut() -> bool) {
    timeout(Duration::from_secs(5), async {
        while !cond() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

async fn next_outcome(outcomes: &mut Outcomes) -> SealOutcome<TestEngine> {
    timeout(Duration::from_secs(5), outcomes.recv())
        .await
        .expect("timed out waiting for a seal outcome")
        .expect("result sink closed")
}

#[tokio::test]
async fn seal_success_delivers_paired_result() {
    let (agent, engine, mut outcomes) = new_agent(MemorySeal::Complete);
    agent.start();

    agent.submit(block(1)).await;

    let result = next_outcome(&mut outcomes)
        .await
        .expect("a completed seal delivers a result");
    assert_eq!(result.work().block(), &Block { number: 1 });
    assert_eq!(*result.sealed(), 1);
    assert_eq!(engine.attempts(), 1);

    agent.stop().await;
}

#[tokio::test]
async fn engine_failure_delivers_absent_marker() {
    let (agent, _engine, mut outcomes) = new_agent(MemorySeal::Fail("bad nonce".into()));
    agent.start();

    agent.submit(block(1)).await;

    assert!(next_outcome(&mut outcomes).await.is_none());

    agent.stop().await;
}

#[tokio::test]
async fn stop_cancels_seal_in_flight() {
    let (agent, engine, mut outcomes) = new_agent(MemorySeal::Hold);
    agent.start();

    agent.submit(block(1)).await;
    wait_for(|| engine.attempts() == 1).await;

    agent.stop().await;

    // The held attempt observed its token and reported nothing.
    assert!(next_outcome(&mut outcomes).await.is_none());
}

#[tokio::test]
async fn resubmit_supersedes_seal_in_flight() {
    let (agent, engine, mut outcomes) = new_agent(MemorySeal::Hold);
    agent.start();

    agent.submit(block(1)).await;
    wait_for(|| engine.attempts() == 1).await;

    // The second submission closes the first attempt's token before its own
    // attempt starts; the first attempt surfaces as an absent marker while
    // the second is still held.
    agent.submit(block(2)).await;
    wait_for(|| engine.attempts() == 2).await;

    assert!(next_outcome(&mut outcomes).await.is_none());

    agent.stop().await;
    assert!(next_outcome(&mut outcomes).await.is_none());
}

#[tokio::test]
async fn start_is_idempotent() {
    let (agent, engine, mut outcomes) = new_agent(MemorySeal::Complete);
    agent.start();
    agent.start();

    agent.submit(block(1)).await;
    let first = next_outcome(&mut outcomes).await.expect("first result");
    agent.submit(block(2)).await;
    let second = next_outcome(&mut outcomes).await.expect("second result");

    // A single dispatch loop consumed both submissions, once each.
    assert_eq!(first.work().block(), &Block { number: 1 });
    assert_eq!(second.work().block(), &Block { number: 2 });
    assert_eq!(engine.attempts(), 2);
    assert!(outcomes.try_recv().is_err());

    agent.stop().await;
}

#[tokio::test]
async fn stop_when_stopped_is_a_noop() {
    let (agent, _engine, mut outcomes) = new_agent(MemorySeal::Complete);

    agent.stop().await;
    agent.stop().await;

    // The redundant calls left the agent fully operational.
    agent.start();
    agent.submit(block(1)).await;
    assert!(next_outcome(&mut outcomes).await.is_some());

    agent.stop().await;
    agent.stop().await;
}

#[tokio::test]
async fn stop_leaves_the_mailbox_empty() {
    let (agent, engine, _outcomes) = new_agent(MemorySeal::Hold);
    agent.start();

    agent.submit(block(1)).await;
    wait_for(|| engine.attempts() == 1).await;
    agent.submit(block(2)).await;

    agent.stop().await;

    // Whether the second submission was dispatched or drained, the mailbox
    // has space again, and queries stay serviceable.
    assert!(agent.work_channel().try_send(block(3)).is_ok());
    assert_eq!(agent.hashrate(), 0.0);
}

#[tokio::test]
async fn agent_restarts_after_stop() {
    let (agent, engine, mut outcomes) = new_agent(MemorySeal::Complete);

    agent.start();
    agent.submit(block(1)).await;
    assert!(next_outcome(&mut outcomes).await.is_some());
    agent.stop().await;

    agent.start();
    agent.submit(block(2)).await;
    let result = next_outcome(&mut outcomes).await.expect("second run result");
    assert_eq!(result.work().block(), &Block { number: 2 });
    assert_eq!(engine.attempts(), 2);

    agent.stop().await;
}

#[tokio::test]
async fn back_to_back_submissions_deliver_the_later_work() {
    let (agent, _engine, mut outcomes) = new_agent(MemorySeal::Complete);
    agent.start();

    agent.submit(block(1)).await;
    agent.submit(block(2)).await;

    let first = next_outcome(&mut outcomes).await;
    let second = next_outcome(&mut outcomes).await;
    let delivered: Vec<_> = [first, second].into_iter().flatten().collect();

    // The later work's outcome is guaranteed; an outcome for the earlier
    // work is permitted, and must carry it unmodified.
    assert!(delivered
        .iter()
        .any(|result| result.work().block() == &Block { number: 2 }));
    for result in &delivered {
        assert!(matches!(result.work().block().number, 1 | 2));
    }

    agent.stop().await;
}

#[test]
fn hashrate_defaults_to_zero() {
    let engine: TestEngine = MemoryEngine::new(MemorySeal::Complete);
    let agent = Agent::new(MemoryChain, engine);

    assert_eq!(agent.hashrate(), 0.0);
}

#[test]
fn hashrate_reports_the_engine_capability() {
    let engine: TestEngine = MemoryEngine::new(MemorySeal::Complete).with_hashrate(42.5);
    let agent = Agent::new(MemoryChain, engine);

    assert_eq!(agent.hashrate(), 42.5);
}
