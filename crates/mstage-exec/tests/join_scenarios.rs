//! End-to-end hash-join scenarios driven through scripted block sources.

use mstage_error::ExecError;
use mstage_exec::{
    Block, HashJoinOperator, JoinDescriptor, JoinOptions, JoinRelType, JoinState, KeySelector,
    Operator, QueuedBlockSource, ResidualFilter, collect_rows, explain_tree,
};
use mstage_types::{DataType, Row, Schema, SchemaRef, Value};

const ALL_TYPES: [JoinRelType; 6] = [
    JoinRelType::Inner,
    JoinRelType::Left,
    JoinRelType::Right,
    JoinRelType::Full,
    JoinRelType::Semi,
    JoinRelType::Anti,
];

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn left_schema() -> SchemaRef {
    Schema::from_pairs([("k", DataType::Long)]).unwrap().into_ref()
}

fn right_schema() -> SchemaRef {
    Schema::from_pairs([("k", DataType::Long), ("v", DataType::String)])
        .unwrap()
        .into_ref()
}

fn right_rows() -> Vec<Row> {
    vec![
        vec![Value::Long(1), Value::from("a")],
        vec![Value::Long(1), Value::from("b")],
        vec![Value::Long(2), Value::from("c")],
    ]
}

fn left_rows(keys: &[i64]) -> Vec<Row> {
    keys.iter().map(|&k| vec![Value::Long(k)]).collect()
}

fn build(join_type: JoinRelType, left: Vec<Vec<Row>>, right: Vec<Vec<Row>>) -> HashJoinOperator {
    let descriptor = JoinDescriptor::new(
        join_type,
        left_schema(),
        right_schema(),
        KeySelector::new([0]),
        KeySelector::new([0]),
    );
    HashJoinOperator::try_new(
        Box::new(QueuedBlockSource::from_batches(&left_schema(), left)),
        Box::new(QueuedBlockSource::from_batches(&right_schema(), right)),
        descriptor,
    )
    .unwrap()
}

fn sorted(mut rows: Vec<Row>) -> Vec<Row> {
    rows.sort_by_key(|row| format!("{row:?}"));
    rows
}

fn run(join_type: JoinRelType, left_keys: &[i64], right: Vec<Row>) -> Vec<Row> {
    let mut op = build(join_type, vec![left_rows(left_keys)], vec![right]);
    sorted(collect_rows(&mut op, 8).unwrap())
}

#[test]
fn inner_key_one_yields_both_bucket_rows() {
    init_tracing();
    let rows = run(JoinRelType::Inner, &[1], right_rows());
    assert_eq!(
        rows,
        vec![
            vec![Value::Long(1), Value::Long(1), Value::from("a")],
            vec![Value::Long(1), Value::Long(1), Value::from("b")],
        ]
    );
}

#[test]
fn left_missing_key_yields_null_right_side() {
    let rows = run(JoinRelType::Left, &[3], right_rows());
    assert_eq!(rows, vec![vec![Value::Long(3), Value::Null, Value::Null]]);
}

#[test]
fn full_join_appends_unmatched_right_row_after_left_ends() {
    let mut op = build(JoinRelType::Full, vec![left_rows(&[1])], vec![right_rows()]);
    assert_eq!(op.next_block().rows().len(), 2);
    assert_eq!(op.state(), JoinState::Probing);
    let sweep = op.next_block();
    assert_eq!(
        sweep.rows(),
        &[vec![Value::Null, Value::Long(2), Value::from("c")]]
    );
    assert_eq!(op.state(), JoinState::Done);
    assert!(op.next_block().is_end_of_stream());
}

#[test]
fn right_join_represents_every_right_row_exactly_once() {
    let mut op = build(
        JoinRelType::Right,
        vec![left_rows(&[1]), left_rows(&[1, 5])],
        vec![right_rows()],
    );
    let rows = collect_rows(&mut op, 8).unwrap();
    // Key 1 probed twice; the sweep only adds the never-matched row.
    assert_eq!(rows.len(), 5);
    let right_originated: Vec<_> = rows.iter().filter(|row| row[0].is_null()).collect();
    assert_eq!(
        right_originated,
        vec![&vec![Value::Null, Value::Long(2), Value::from("c")]]
    );
    assert_eq!(op.stats().unmatched_right_rows, 1);
}

#[test]
fn semi_counts_left_rows_not_right_duplicates() {
    let rows = run(JoinRelType::Semi, &[1, 1, 2, 7], right_rows());
    assert_eq!(rows.len(), 3);
    assert!(rows.iter().all(|row| row[1].is_null() && row[2].is_null()));
}

#[test]
fn anti_keeps_only_absent_keys() {
    let rows = run(JoinRelType::Anti, &[1, 2, 7, 8], right_rows());
    assert_eq!(
        rows,
        vec![
            vec![Value::Long(7), Value::Null, Value::Null],
            vec![Value::Long(8), Value::Null, Value::Null],
        ]
    );
}

#[test]
fn every_row_has_left_plus_right_width() {
    for ty in ALL_TYPES {
        let rows = run(ty, &[1, 2, 3], right_rows());
        assert!(rows.iter().all(|row| row.len() == 3), "join_type={ty}");
    }
}

#[test]
fn empty_right_side_per_join_type() {
    for ty in ALL_TYPES {
        let rows = run(ty, &[1, 2], Vec::new());
        match ty {
            JoinRelType::Inner | JoinRelType::Semi => assert!(rows.is_empty(), "join_type={ty}"),
            JoinRelType::Left | JoinRelType::Anti | JoinRelType::Full => {
                assert_eq!(
                    rows,
                    vec![
                        vec![Value::Long(1), Value::Null, Value::Null],
                        vec![Value::Long(2), Value::Null, Value::Null],
                    ],
                    "join_type={ty}"
                );
            }
            // RIGHT has no unmatched-left padding and no right rows to sweep.
            JoinRelType::Right => assert!(rows.is_empty(), "join_type={ty}"),
            JoinRelType::AsOf | JoinRelType::LeftAsOf => unreachable!(),
        }
    }
}

#[test]
fn end_of_stream_is_idempotent_for_every_type() {
    for ty in ALL_TYPES {
        let mut op = build(ty, vec![left_rows(&[1])], vec![right_rows()]);
        let _ = collect_rows(&mut op, 8).unwrap();
        for _ in 0..3 {
            let block = op.next_block();
            assert!(block.is_end_of_stream(), "join_type={ty} got {block:?}");
        }
    }
}

#[test]
fn empty_key_selector_is_a_cross_product() {
    let descriptor = JoinDescriptor::new(
        JoinRelType::Inner,
        left_schema(),
        right_schema(),
        KeySelector::empty(),
        KeySelector::empty(),
    );
    let mut op = HashJoinOperator::try_new(
        Box::new(QueuedBlockSource::from_batches(
            &left_schema(),
            vec![left_rows(&[10, 20])],
        )),
        Box::new(QueuedBlockSource::from_batches(&right_schema(), vec![right_rows()])),
        descriptor,
    )
    .unwrap();
    assert_eq!(collect_rows(&mut op, 8).unwrap().len(), 6);
}

#[test]
fn null_keys_share_a_bucket() {
    let right = vec![vec![Value::Null, Value::from("n")]];
    let mut op = build(
        JoinRelType::Inner,
        vec![vec![vec![Value::Null]]],
        vec![right],
    );
    assert_eq!(
        collect_rows(&mut op, 8).unwrap(),
        vec![vec![Value::Null, Value::Null, Value::from("n")]]
    );
}

#[test]
fn no_output_before_build_completes() {
    let right = QueuedBlockSource::new(vec![
        Block::data(right_rows(), right_schema()),
        Block::NoOp,
        Block::NoOp,
        Block::EndOfStream,
    ]);
    let left = QueuedBlockSource::from_batches(&left_schema(), vec![left_rows(&[1])]);
    let left_probe = left.probe();
    let descriptor = JoinDescriptor::new(
        JoinRelType::Inner,
        left_schema(),
        right_schema(),
        KeySelector::new([0]),
        KeySelector::new([0]),
    );
    let mut op = HashJoinOperator::try_new(Box::new(left), Box::new(right), descriptor).unwrap();
    assert!(op.next_block().is_noop());
    assert!(op.next_block().is_noop());
    assert_eq!(left_probe.pulls(), 0);
    assert_eq!(op.next_block().rows().len(), 2);
    assert_eq!(left_probe.pulls(), 1);
}

#[test]
fn first_observed_failure_wins_when_both_children_fail() {
    let right = QueuedBlockSource::new(vec![Block::error(ExecError::upstream("right"))]);
    let left = QueuedBlockSource::new(vec![Block::error(ExecError::upstream("left"))]);
    let descriptor = JoinDescriptor::new(
        JoinRelType::Full,
        left_schema(),
        right_schema(),
        KeySelector::new([0]),
        KeySelector::new([0]),
    );
    let mut op = HashJoinOperator::try_new(Box::new(left), Box::new(right), descriptor).unwrap();
    for _ in 0..2 {
        assert_eq!(
            op.next_block().error_cause(),
            Some(&ExecError::Upstream("right".to_owned()))
        );
    }
}

#[test]
fn left_failure_during_probe_is_propagated_verbatim() {
    let left = QueuedBlockSource::new(vec![
        Block::data(left_rows(&[1]), left_schema()),
        Block::error(ExecError::upstream("left mailbox closed")),
    ]);
    let left_probe = left.probe();
    let descriptor = JoinDescriptor::new(
        JoinRelType::Left,
        left_schema(),
        right_schema(),
        KeySelector::new([0]),
        KeySelector::new([0]),
    );
    let mut op = HashJoinOperator::try_new(
        Box::new(left),
        Box::new(QueuedBlockSource::from_batches(&right_schema(), vec![right_rows()])),
        descriptor,
    )
    .unwrap();
    assert_eq!(op.next_block().rows().len(), 2);
    let err = collect_rows(&mut op, 8).unwrap_err();
    assert_eq!(err, ExecError::Upstream("left mailbox closed".to_owned()));
    assert!(op.next_block().is_error());
    assert_eq!(left_probe.pulls(), 2);
}

#[test]
fn residual_predicate_filters_candidates() {
    // Keep pairs where the right value sorts after 'a'.
    let residuals = ResidualFilter::none().with(|row: &[Value]| -> mstage_error::Result<Value> {
        Ok(match &row[2] {
            Value::String(v) => Value::Boolean(v.as_str() > "a"),
            _ => Value::Null,
        })
    });
    let descriptor = JoinDescriptor::new(
        JoinRelType::Left,
        left_schema(),
        right_schema(),
        KeySelector::new([0]),
        KeySelector::new([0]),
    )
    .with_residuals(residuals);
    let mut op = HashJoinOperator::try_new(
        Box::new(QueuedBlockSource::from_batches(
            &left_schema(),
            vec![left_rows(&[1, 2, 3])],
        )),
        Box::new(QueuedBlockSource::from_batches(&right_schema(), vec![right_rows()])),
        descriptor,
    )
    .unwrap();
    assert_eq!(
        sorted(collect_rows(&mut op, 8).unwrap()),
        vec![
            vec![Value::Long(1), Value::Long(1), Value::from("b")],
            vec![Value::Long(2), Value::Long(2), Value::from("c")],
            vec![Value::Long(3), Value::Null, Value::Null],
        ]
    );
}

#[test]
fn row_limit_from_query_options() {
    let options = JoinOptions::from_query_options(
        &[("maxRowsInJoin".to_owned(), "2".to_owned())]
            .into_iter()
            .collect(),
    )
    .unwrap();
    let descriptor = JoinDescriptor::new(
        JoinRelType::Inner,
        left_schema(),
        right_schema(),
        KeySelector::new([0]),
        KeySelector::new([0]),
    );
    let mut op = HashJoinOperator::with_options(
        Box::new(QueuedBlockSource::from_batches(&left_schema(), vec![left_rows(&[1])])),
        Box::new(QueuedBlockSource::from_batches(
            &right_schema(),
            vec![right_rows()[..2].to_vec(), right_rows()[2..].to_vec()],
        )),
        descriptor,
        options,
    )
    .unwrap();
    let err = collect_rows(&mut op, 8).unwrap_err();
    assert_eq!(err, ExecError::BuildRowLimitExceeded { limit: 2 });
    assert_eq!(op.state(), JoinState::Error);
}

#[test]
fn explain_shows_join_over_both_children() {
    let op = build(JoinRelType::Inner, vec![], vec![]);
    assert_eq!(
        explain_tree(&op),
        "HASH_JOIN\n  QUEUED_SOURCE\n  QUEUED_SOURCE\n"
    );
}

#[test]
fn stats_track_both_phases() {
    let mut op = build(
        JoinRelType::Full,
        vec![left_rows(&[1]), left_rows(&[9])],
        vec![right_rows()[..1].to_vec(), right_rows()[1..].to_vec()],
    );
    let rows = collect_rows(&mut op, 8).unwrap();
    let stats = op.stats();
    assert_eq!(stats.right_blocks, 2);
    assert_eq!(stats.right_rows, 3);
    assert_eq!(stats.build_keys, 2);
    assert_eq!(stats.left_blocks, 2);
    assert_eq!(stats.left_rows, 2);
    assert_eq!(stats.emitted_rows, rows.len() as u64);
    assert_eq!(rows.len(), 4);
}
