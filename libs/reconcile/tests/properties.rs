//! Property tests for the reconciliation engine.
//!
//! The engine's contract is set arithmetic; proptest checks it holds for
//! arbitrary snapshot shapes, not just the handful of fixtures in the unit
//! tests.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use proptest::prelude::*;

use slurmfix_reconcile::{
    build_repair_statements, find_orphans, find_stale, JobId, JobRecord, JobState, ProcessRecord,
    RepairPolicy, TerminalState,
};

// Small id/name spaces so overlap between generated sets is common.
fn queue_record() -> impl Strategy<Value = JobRecord> {
    (0u64..40, 0u8..6, proptest::collection::vec(0u8..8, 0..3)).prop_map(|(id, user, nodes)| {
        JobRecord::queue(
            JobId::new(id),
            format!("user{user}"),
            nodes.into_iter().map(|n| format!("n{n}")).collect(),
        )
    })
}

fn acct_record() -> impl Strategy<Value = JobRecord> {
    (queue_record(), 0u32..4).prop_map(|(mut record, raw_state)| {
        record.source = slurmfix_reconcile::RecordSource::Accounting;
        record.state = JobState::from_raw(raw_state);
        record
    })
}

fn process_map() -> impl Strategy<Value = BTreeMap<String, Vec<ProcessRecord>>> {
    proptest::collection::btree_map(
        (0u8..8).prop_map(|n| format!("n{n}")),
        proptest::collection::vec((0u8..6, 1u32..10_000), 0..5),
        0..6,
    )
    .prop_map(|nodes| {
        nodes
            .into_iter()
            .map(|(node, procs)| {
                let records = procs
                    .into_iter()
                    .map(|(user, pid)| ProcessRecord {
                        node: node.clone(),
                        owner: format!("user{user}"),
                        pid,
                        command: "./work".to_string(),
                    })
                    .collect();
                (node, records)
            })
            .collect()
    })
}

proptest! {
    #[test]
    fn stale_is_exactly_accounting_minus_queue(
        queue in proptest::collection::vec(queue_record(), 0..20),
        acct in proptest::collection::vec(acct_record(), 0..20),
    ) {
        let live: HashSet<JobId> = queue.iter().map(|j| j.job_id).collect();
        let findings = find_stale(&queue, &acct);

        // Exactly the accounting records whose id is not live, in input order.
        let expected: Vec<JobId> = acct
            .iter()
            .map(|j| j.job_id)
            .filter(|id| !live.contains(id))
            .collect();
        let actual: Vec<JobId> = findings.iter().map(|f| f.job_id).collect();
        prop_assert_eq!(actual, expected);

        // No overlap with the queue ever survives.
        prop_assert!(findings.iter().all(|f| !live.contains(&f.job_id)));
    }

    #[test]
    fn stale_is_idempotent(
        queue in proptest::collection::vec(queue_record(), 0..20),
        acct in proptest::collection::vec(acct_record(), 0..20),
    ) {
        prop_assert_eq!(find_stale(&queue, &acct), find_stale(&queue, &acct));
    }

    #[test]
    fn one_repair_statement_per_finding_in_order(
        acct in proptest::collection::vec(acct_record(), 0..20),
        cancelled in proptest::bool::ANY,
    ) {
        let findings = find_stale(&[], &acct);
        let policy = RepairPolicy {
            cluster: "testcluster".to_string(),
            terminal_state: if cancelled {
                TerminalState::Cancelled
            } else {
                TerminalState::Failed
            },
        };

        let statements = build_repair_statements(&findings, &policy);

        prop_assert_eq!(statements.len(), findings.len());
        for (statement, finding) in statements.iter().zip(&findings) {
            prop_assert_eq!(statement.job_id, finding.job_id);
            prop_assert!(statement.sql.contains(&format!("id_job = {}", finding.job_id)), "sql missing id_job clause: {}", statement.sql);
            prop_assert!(statement.sql.contains(&format!("state = {}", policy.terminal_state.code())), "sql missing state clause: {}", statement.sql);
        }
    }

    #[test]
    fn service_accounts_never_reported(
        queue in proptest::collection::vec(queue_record(), 0..10),
        processes in process_map(),
        shielded in 0u8..6,
    ) {
        let owner = format!("user{shielded}");
        let service_accounts: BTreeSet<String> = [owner.clone()].into();

        let findings = find_orphans(&queue, &processes, &service_accounts);
        prop_assert!(findings.iter().all(|f| f.owner != owner));
    }

    #[test]
    fn orphans_never_match_a_claimed_node_owner_pair(
        queue in proptest::collection::vec(queue_record(), 0..10),
        processes in process_map(),
    ) {
        let claimed: HashSet<(String, String)> = queue
            .iter()
            .flat_map(|j| j.nodes.iter().map(|n| (n.clone(), j.user.clone())))
            .collect();

        let findings = find_orphans(&queue, &processes, &BTreeSet::new());
        prop_assert!(findings
            .iter()
            .all(|f| !claimed.contains(&(f.node.clone(), f.owner.clone()))));
    }
}
