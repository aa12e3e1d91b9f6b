//! Memory ordering scenarios.

use o3sim_core::{SimError, StopReason};
use o3sim_core::config::{
    BranchPredictor, HitMissPredictor, MemDepPredictor, RecoveryFrom, RecoveryPolicy,
    RemovePolicy,
};
use pretty_assertions::assert_eq;
use rstest::rstest;

use crate::common::harness::{TestContext, small_core};
use crate::common::mocks::cache::FixedLatencyCache;

const SUM_DEMO: &str = include_str!("../../../../../demos/sum.s");

/// The store address depends on a twelve-cycle divide, so the younger load to the same
/// address executes first and reads stale memory.
const LATE_STORE: &str = "li   r1, 0x2000
li   r2, 0x4000
li   r3, 2
div  r4, r2, r3
li   r6, 42
sd   r6, 0(r4)
ld   r7, 0(r1)
exit r7
";

/// The word store executes early but cannot commit behind the divide. The doubleword load
/// runs after it and covers the stored bytes only partly, so the exit code is 1 only if the
/// load sees both memory and the store.
const PARTIAL_LOAD: &str = "li   r1, 0x2000
li   r2, 1
li   r10, 1
div  r9, r2, r10
sw   r2, 4(r1)
mul  r8, r1, r10
ld   r3, 0(r8)
li   r5, 32
srl  r4, r3, r5
exit r4
";

/// Every iteration stores through a divide result and then loads the same address, so an
/// optimistic core runs the load ahead of the store each time. The stored counters sum to 15.
const LOOP_CONFLICT: &str = "      li   r1, 0x2000
      li   r3, 1
      li   r9, 0
      li   r10, 6
loop: div  r4, r1, r3
      sd   r9, 0(r4)
      ld   r7, 0(r1)
      add  r8, r8, r7
      addi r9, r9, 1
      blt  r9, r10, loop
      exit r8
";

/// Eight loads to fresh cache lines, each missing the L1. Two of them find preloaded values.
const STREAMING_MISSES: &str = ".quad 0x10000, 1
      .quad 0x10040, 2
      li   r1, 0x10000
      li   r9, 0
      li   r10, 8
loop: ld   r2, 0(r1)
      add  r3, r3, r2
      addi r1, r1, 64
      addi r9, r9, 1
      blt  r9, r10, loop
      exit r3
";

#[test]
fn test_sum_demo() {
    let (sim, summary) = TestContext::new(SUM_DEMO).with_config(small_core()).run();
    assert_eq!(summary.stop, StopReason::Finished);
    assert_eq!(summary.exit_codes, vec![Some(36)]);

    // 3 setup, 8 iterations of 3, store, load, exit.
    assert_eq!(summary.retired_insts, 30);
    let stats = sim.stats();
    // Each `ldadd` is a load micro-op plus an add micro-op.
    assert_eq!(stats.core.committed_ops, 30 + 8);
    assert_eq!(stats.core.inst_mix.get("load"), Some(&9));
    assert_eq!(stats.core.inst_mix.get("store"), Some(&1));
    assert_eq!(stats.mem_order.retired_loads, 9);
}

#[test]
fn test_store_value_reaches_younger_load() {
    let source = "li r1, 0x3000\nli r2, 77\nsd r2, 0(r1)\nld r3, 0(r1)\nexit r3\n";
    let (sim, summary) = TestContext::new(source).with_config(small_core()).run();
    assert_eq!(summary.exit_codes, vec![Some(77)]);

    // The load either forwarded from the in-flight store or ran first and was recovered.
    let stats = sim.stats();
    assert!(stats.mem_order.executed_forwardings + stats.recovery.address_match.count >= 1);
}

#[test]
fn test_access_order_violation() {
    let (sim, summary) = TestContext::new(LATE_STORE).with_config(small_core()).run();
    assert_eq!(summary.exit_codes, vec![Some(42)]);
    let recovery = sim.stats().recovery;
    assert!(recovery.address_match.count >= 1);
    assert!(recovery.address_match.ops >= 1);
}

#[rstest]
#[case::reissue_all(RecoveryFrom::NextOfProducer, RecoveryPolicy::ReissueAll)]
#[case::selective(RecoveryFrom::Consumer, RecoveryPolicy::ReissueSelective)]
#[case::refetch_consumer(RecoveryFrom::Consumer, RecoveryPolicy::Refetch)]
fn test_access_order_policies(#[case] from: RecoveryFrom, #[case] policy: RecoveryPolicy) {
    let (sim, summary) = TestContext::new(LATE_STORE)
        .with_config(small_core())
        .configure(|c| {
            c.recovery.address_match.from = from;
            c.recovery.address_match.policy = policy;
        })
        .run();
    assert_eq!(summary.exit_codes, vec![Some(42)]);
    assert!(sim.stats().recovery.address_match.count >= 1);
}

/// Skipping finished ops would leave the load that read stale memory in place, so that
/// mechanism is refused for memory violations before the run starts.
#[rstest]
#[case::address_match_consumer(RecoveryFrom::Consumer)]
#[case::address_match_producer(RecoveryFrom::Producer)]
#[case::address_match_next(RecoveryFrom::NextOfProducer)]
fn test_not_finished_reissue_rejected_for_violations(#[case] from: RecoveryFrom) {
    let result = TestContext::new(LATE_STORE)
        .with_config(small_core())
        .configure(|c| {
            c.recovery.address_match.from = from;
            c.recovery.address_match.policy = RecoveryPolicy::ReissueNotFinished;
        })
        .try_build();
    let err = result.unwrap_err();
    assert!(matches!(err, SimError::Config(_)), "{err}");
}

#[rstest]
#[case::ideal(true, RecoveryPolicy::Refetch)]
#[case::refetch(false, RecoveryPolicy::Refetch)]
#[case::reissue_all(false, RecoveryPolicy::ReissueAll)]
#[case::selective(false, RecoveryPolicy::ReissueSelective)]
fn test_partial_load(#[case] ideal: bool, #[case] policy: RecoveryPolicy) {
    let (sim, summary) = TestContext::new(PARTIAL_LOAD)
        .with_config(small_core())
        .configure(|c| {
            c.memory.ideal_partial_load = ideal;
            c.recovery.partial_load.policy = policy;
        })
        .run();
    assert_eq!(summary.exit_codes, vec![Some(1)]);
    let recovery = sim.stats().recovery;
    if ideal {
        assert_eq!(recovery.partial_load.count, 0);
    } else {
        assert!(recovery.partial_load.count >= 1);
    }
    assert_eq!(recovery.address_match.count, 0);
}

/// A cold cache makes loads slower than their consumers were scheduled for. Every latency
/// recovery policy still produces the right sum.
#[rstest]
#[case(RecoveryFrom::Producer, RecoveryPolicy::ReissueSelective)]
#[case(RecoveryFrom::Producer, RecoveryPolicy::ReissueAll)]
#[case(RecoveryFrom::Producer, RecoveryPolicy::ReissueNotFinished)]
#[case(RecoveryFrom::Producer, RecoveryPolicy::Refetch)]
#[case(RecoveryFrom::NextOfProducer, RecoveryPolicy::Refetch)]
#[case(RecoveryFrom::NextOfProducer, RecoveryPolicy::ReissueAll)]
#[case(RecoveryFrom::NextOfProducer, RecoveryPolicy::ReissueNotFinished)]
#[case(RecoveryFrom::Consumer, RecoveryPolicy::Refetch)]
#[case(RecoveryFrom::Consumer, RecoveryPolicy::ReissueAll)]
fn test_latency_recovery(#[case] from: RecoveryFrom, #[case] policy: RecoveryPolicy) {
    let (sim, summary) = TestContext::new(SUM_DEMO)
        .configure(|c| {
            c.recovery.latency.from = from;
            c.recovery.latency.policy = policy;
        })
        .run();
    assert_eq!(summary.exit_codes, vec![Some(36)]);
    let stats = sim.stats();
    assert!(stats.recovery.latency.count >= 1);
    assert!(stats.caches[0].misses >= 1);
}

/// Ops that leave the window at issue can only be recovered by refetching.
#[test]
fn test_remove_at_issue_with_refetch() {
    let (_, summary) = TestContext::new(SUM_DEMO)
        .configure(|c| {
            c.pipeline.remove_policy = RemovePolicy::Remove;
            c.recovery.latency.policy = RecoveryPolicy::Refetch;
        })
        .run();
    assert_eq!(summary.exit_codes, vec![Some(36)]);
}

#[test]
fn test_remove_after_finish() {
    let (_, summary) = TestContext::new(LATE_STORE)
        .with_config(small_core())
        .configure(|c| c.pipeline.remove_policy = RemovePolicy::RemoveAfterFinish)
        .run();
    assert_eq!(summary.exit_codes, vec![Some(42)]);
}

/// A custom cache sees every load execution and every committed store.
#[test]
fn test_custom_cache() {
    let (sim, summary) = TestContext::new(SUM_DEMO)
        .with_config(small_core())
        .with_cache(FixedLatencyCache::new(1))
        .run();
    assert_eq!(summary.exit_codes, vec![Some(36)]);
    assert!(sim.core().stats().load_accesses >= 9);
    assert_eq!(sim.stats().recovery.latency.count, 0);
}

fn run_loop_conflict(predictor: MemDepPredictor) -> o3sim_core::SimStats {
    let (sim, summary) = TestContext::new(LOOP_CONFLICT)
        .with_config(small_core())
        .predictor(BranchPredictor::StaticTaken)
        .configure(|c| c.memory.dependence_predictor = predictor)
        .run();
    assert_eq!(summary.exit_codes, vec![Some(15)], "{predictor:?}");
    sim.stats()
}

/// The store set predictor learns the conflicting pair after one violation; the
/// conservative predictor never lets the load pass the store.
#[test]
fn test_memory_dependence_prediction() {
    let optimistic = run_loop_conflict(MemDepPredictor::Optimistic);
    let store_set = run_loop_conflict(MemDepPredictor::StoreSet);
    let conservative = run_loop_conflict(MemDepPredictor::Conservative);

    let violations = optimistic.recovery.address_match.count;
    assert!(violations >= 2, "{violations} violations");
    assert_eq!(optimistic.mem_dep.dependences, 0);

    assert_eq!(store_set.recovery.address_match.count, 1);
    assert_eq!(store_set.mem_dep.conflicts, 1);
    assert!(store_set.mem_dep.dependences >= 1);

    assert_eq!(conservative.recovery.address_match.count, 0);
    assert!(conservative.mem_dep.dependences >= 5);
}

/// Predicting misses for a load that keeps missing schedules its consumer for the miss
/// latency instead of recovering every iteration.
#[test]
fn test_hit_miss_prediction() {
    let run = |predictor| {
        let mut config = small_core();
        config.cache.l1_d.enabled = true;
        config.cache.l2.enabled = false;
        config.pipeline.hit_miss_predictor = predictor;
        let (sim, summary) = TestContext::new(STREAMING_MISSES)
            .with_config(config)
            .predictor(BranchPredictor::StaticTaken)
            .run();
        assert_eq!(summary.exit_codes, vec![Some(3)], "{predictor:?}");
        sim.stats()
    };
    let always_hit = run(HitMissPredictor::AlwaysHit);
    let counter = run(HitMissPredictor::Counter);

    assert!(always_hit.recovery.latency.count > 0);
    assert_eq!(always_hit.hit_miss.predicted_misses, 0);
    assert!(counter.hit_miss.predicted_misses >= 1);
    assert!(
        counter.recovery.latency.count < always_hit.recovery.latency.count,
        "{} vs {}",
        counter.recovery.latency.count,
        always_hit.recovery.latency.count
    );
}
