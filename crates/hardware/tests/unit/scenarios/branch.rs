//! Branch prediction scenarios.

use o3sim_core::StopReason;
use o3sim_core::config::BranchPredictor;
use pretty_assertions::assert_eq;
use rstest::rstest;

use crate::common::harness::{TestContext, small_core};

/// Ten retired instructions with one always-taken branch in the middle.
const FORWARD_BRANCH: &str = "        li   r1, 1
        li   r2, 2
        add  r3, r1, r2
        addi r4, r3, 1
        beq  r1, r1, target
        li   r9, 99
        li   r9, 98
target: add  r5, r4, r1
        addi r5, r5, 1
        sub  r6, r5, r1
        xor  r7, r6, r6
        exit r5
";

const COUNT_TO_20: &str = "      li   r1, 0
      li   r2, 20
loop: addi r1, r1, 1
      blt  r1, r2, loop
      exit r1
";

/// Two call sites in a loop share one function, so its return alternates between targets.
const CALL_RETURN: &str = "      li   r9, 0
      li   r10, 4
loop: call inc
      call inc
      addi r9, r9, 1
      blt  r9, r10, loop
      exit r1
inc:  addi r1, r1, 1
      ret
";

#[rstest]
#[case::predicted(BranchPredictor::StaticTaken, 0)]
#[case::mispredicted(BranchPredictor::StaticNotTaken, 1)]
fn test_forward_branch(#[case] predictor: BranchPredictor, #[case] recoveries: u64) {
    let (sim, summary) = TestContext::new(FORWARD_BRANCH)
        .with_config(small_core())
        .predictor(predictor)
        .run();

    assert_eq!(summary.stop, StopReason::Finished);
    assert_eq!(summary.exit_codes, vec![Some(6)]);
    assert_eq!(summary.retired_insts, 10);

    let stats = sim.stats();
    assert_eq!(stats.recovery.bpred.count, recoveries);
    assert_eq!(stats.core.inst_mix.get("branch"), Some(&1));
    // Ops fetched past the exit are squashed too, so only the branch recovery's own
    // squashes tell the two cases apart.
    if recoveries == 0 {
        assert_eq!(stats.recovery.bpred.ops, 0);
    } else {
        assert!(stats.recovery.bpred.ops > 0);
    }
    assert!(stats.core.flushed_ops >= stats.recovery.bpred.ops);
}

/// The wrong-path `li r9` instructions never become architectural.
#[test]
fn test_wrong_path_is_not_committed() {
    let (sim, _) = TestContext::new(FORWARD_BRANCH)
        .with_config(small_core())
        .predictor(BranchPredictor::StaticNotTaken)
        .run();
    let stats = sim.stats();
    assert_eq!(stats.core.committed_insts, 10);
    assert_eq!(stats.core.inst_mix.get("int_alu"), Some(&8));
}

#[rstest]
fn test_loop_under_every_predictor(
    #[values(
        BranchPredictor::StaticNotTaken,
        BranchPredictor::StaticTaken,
        BranchPredictor::GShare
    )]
    predictor: BranchPredictor,
) {
    let (sim, summary) = TestContext::new(COUNT_TO_20)
        .with_config(small_core())
        .predictor(predictor)
        .run();
    assert_eq!(summary.exit_codes, vec![Some(20)]);
    assert_eq!(summary.retired_insts, 2 + 2 * 20 + 1);

    let bpred = sim.stats().recovery.bpred.count;
    match predictor {
        BranchPredictor::StaticNotTaken => assert!(bpred >= 19, "{bpred} recoveries"),
        _ => assert!(bpred >= 1, "the loop exit is always mispredicted"),
    }
}

/// A dynamic predictor learns a long loop and mispredicts far less than static not-taken.
#[test]
fn test_gshare_learns_loop() {
    let source = COUNT_TO_20.replace("li   r2, 20", "li   r2, 200");
    let run = |predictor| {
        let (sim, _) = TestContext::new(&source)
            .with_config(small_core())
            .predictor(predictor)
            .run();
        sim.stats().core.branch_mispredictions
    };
    let gshare = run(BranchPredictor::GShare);
    let static_not_taken = run(BranchPredictor::StaticNotTaken);
    assert!(static_not_taken >= 199);
    assert!(gshare < static_not_taken / 2, "{gshare} vs {static_not_taken}");
}

#[test]
fn test_recovery_latency_stalls_fetch() {
    let run = |latency| {
        let (_, summary) = TestContext::new(FORWARD_BRANCH)
            .with_config(small_core())
            .predictor(BranchPredictor::StaticNotTaken)
            .configure(|c| c.recovery.bpred_recovery_latency = latency)
            .run();
        assert_eq!(summary.exit_codes, vec![Some(6)]);
        summary.cycles
    };
    assert!(run(20) > run(0));
}

/// The return address stack predicts every return; the BTB alone keeps predicting the
/// previous call site.
#[test]
fn test_return_address_stack() {
    let run = |ras_size| {
        let (sim, summary) = TestContext::new(CALL_RETURN)
            .with_config(small_core())
            .predictor(BranchPredictor::StaticTaken)
            .configure(|c| c.pipeline.ras_size = ras_size)
            .run();
        assert_eq!(summary.exit_codes, vec![Some(8)]);
        sim.stats().core.branch_mispredictions
    };
    let with_ras = run(16);
    let without_ras = run(0);
    assert_eq!(with_ras, 1, "only the loop exit is mispredicted");
    assert!(without_ras >= 7, "{without_ras} mispredictions");
}
