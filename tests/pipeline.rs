//! End-to-end tests of chain composition through the public API.

use std::cell::RefCell;
use std::io::{BufRead, BufReader, Write};
use std::rc::Rc;

use streamchain::{Aggregate, Chain, GroupBy, PipelineError, Source, Stage};

#[test]
fn chained_transforms_end_to_end() {
    // add 2, multiply 2, add 2, add 2 over [2, 3]
    let chain = Source::new([2_i64, 3])
        .append(Stage::transform_fn("add2", |n| Ok(n + 2)))
        .append(Stage::transform_fn("mul2", |n| Ok(n * 2)))
        .append(Stage::transform_fn("add2", |n| Ok(n + 2)))
        .append(Stage::transform_fn("add2", |n| Ok(n + 2)));

    assert_eq!(chain.collect().unwrap(), vec![12, 14]);
}

#[test]
fn chain_is_iterable() {
    let chain = Source::new(["eagle", "UNICORN", "beaR"])
        .append(Stage::transform_fn("noop", |s: &str| Ok(s)))
        .append(Stage::transform_fn("noop", |s| Ok(s)));

    let mut seen = Vec::new();
    for record in chain {
        seen.push(record.unwrap());
    }
    assert_eq!(seen, vec!["eagle", "UNICORN", "beaR"]);
}

#[test]
fn running_balance_with_stateful_transform() {
    // Amounts in cents; each record gains a running balance.
    let amounts = [20000_i64, -1050, 40003, -2200];
    let mut total = 0_i64;
    let chain = Source::new(amounts.map(|a| (a, 0_i64))).append(Stage::transform_fn(
        "balance",
        move |(amount, _)| {
            total += amount;
            Ok((amount, total))
        },
    ));

    let balances: Vec<i64> = chain
        .collect()
        .unwrap()
        .into_iter()
        .map(|(_, balance)| balance)
        .collect();
    assert_eq!(balances, vec![20000, 18950, 58953, 56753]);
}

#[test]
fn outputs_write_to_external_sinks_across_runs() {
    let first_sink: Rc<RefCell<Vec<i64>>> = Rc::new(RefCell::new(Vec::new()));

    let sink = first_sink.clone();
    Source::new([2_i64, 3])
        .append(Stage::output_fn("sink", move |n: &i64| {
            sink.borrow_mut().push(*n);
            Ok(())
        }))
        .run()
        .unwrap();
    assert_eq!(*first_sink.borrow(), vec![2, 3]);

    // Rebuild the chain with a fresh second sink; the first sink is
    // still attached, so it sees the records again.
    let second_sink: Rc<RefCell<Vec<i64>>> = Rc::new(RefCell::new(Vec::new()));
    let old = first_sink.clone();
    let new = second_sink.clone();
    Source::new([2_i64, 3])
        .append(Stage::output_fn("sink", move |n: &i64| {
            old.borrow_mut().push(*n);
            Ok(())
        }))
        .append(Stage::output_fn("sink", move |n: &i64| {
            new.borrow_mut().push(*n);
            Ok(())
        }))
        .run()
        .unwrap();

    assert_eq!(*second_sink.borrow(), vec![2, 3]);
    assert_eq!(*first_sink.borrow(), vec![2, 3, 2, 3]);
}

/// Record shape for the grouping pipeline: raw rows are grouped by id,
/// then each group is reduced to a total.
#[derive(Clone, Debug, PartialEq)]
enum Rec {
    Row { id: u32, value: f64 },
    Group { id: u32, rows: Vec<Rec> },
    Total { id: u32, sum: f64 },
}

fn row_id(record: &Rec) -> u32 {
    match record {
        Rec::Row { id, .. } => *id,
        other => panic!("grouping saw a non-row record: {other:?}"),
    }
}

fn build_group(id: &u32, rows: &[Rec]) -> Rec {
    Rec::Group {
        id: *id,
        rows: rows.to_vec(),
    }
}

fn sum_group(record: Rec) -> Result<Rec, PipelineError> {
    match record {
        Rec::Group { id, rows } => {
            let sum = rows
                .iter()
                .map(|r| match r {
                    Rec::Row { value, .. } => *value,
                    _ => 0.0,
                })
                .sum();
            Ok(Rec::Total { id, sum })
        }
        other => Ok(other),
    }
}

#[test]
fn group_by_id_then_sum() {
    let rows = vec![
        Rec::Row { id: 1, value: 100.0 },
        Rec::Row { id: 1, value: -10.0 },
        Rec::Row { id: 2, value: 300.0 },
    ];

    let groups: GroupBy<Rec, u32, fn(&Rec) -> u32, fn(&u32, &[Rec]) -> Rec> =
        GroupBy::new(row_id, build_group);
    let chain = Source::new(rows)
        .append(Stage::Aggregate(Box::new(groups)))
        .append(Stage::transform_fn("sum", sum_group));

    assert_eq!(
        chain.collect().unwrap(),
        vec![
            Rec::Total { id: 1, sum: 90.0 },
            Rec::Total { id: 2, sum: 300.0 },
        ]
    );
}

type SharedGroups = Rc<RefCell<GroupBy<Rec, u32, fn(&Rec) -> u32, fn(&u32, &[Rec]) -> Rec>>>;

/// Aggregate delegating to shared state, so one grouping instance can
/// be attached to two chains.
struct SharedGroupBy(SharedGroups);

impl Aggregate<Rec> for SharedGroupBy {
    fn name(&self) -> &str {
        "shared-group-by"
    }
    fn accumulate(&mut self, record: Rec) -> Result<(), PipelineError> {
        self.0.borrow_mut().accumulate(record)
    }
    fn extract(&mut self) -> Vec<Rec> {
        self.0.borrow_mut().extract()
    }
}

#[test]
fn shared_aggregator_state_leaks_across_runs() {
    let groups: SharedGroups = Rc::new(RefCell::new(GroupBy::new(row_id, build_group)));

    let first = Source::new(vec![Rec::Row { id: 1, value: 1.0 }])
        .append(Stage::Aggregate(Box::new(SharedGroupBy(groups.clone()))));
    let first_out = first.collect().unwrap();
    assert_eq!(first_out.len(), 1);

    // The second run inherits the first run's group for id 1.
    let second = Source::new(vec![Rec::Row { id: 2, value: 2.0 }])
        .append(Stage::Aggregate(Box::new(SharedGroupBy(groups.clone()))));
    let second_out = second.collect().unwrap();
    assert_eq!(second_out.len(), 2);
    assert!(matches!(second_out[0], Rec::Group { id: 1, .. }));
    assert!(matches!(second_out[1], Rec::Group { id: 2, .. }));

    // Resetting restores independence.
    groups.borrow_mut().reset();
    let third = Source::new(vec![Rec::Row { id: 3, value: 3.0 }])
        .append(Stage::Aggregate(Box::new(SharedGroupBy(groups))));
    let third_out = third.collect().unwrap();
    assert_eq!(third_out.len(), 1);
    assert!(matches!(third_out[0], Rec::Group { id: 3, .. }));
}

#[test]
fn splice_order_matters() {
    let add2 = || Stage::transform_fn("add2", |n: i64| Ok(n + 2));
    let mul2 = || Stage::transform_fn("mul2", |n: i64| Ok(n * 2));

    let plain = Source::new([2_i64, 3]).append(add2()).append(mul2());
    assert_eq!(plain.collect().unwrap(), vec![8, 10]);

    let sub = Chain::from_stage(mul2()).append(add2());
    let spliced = Source::new([2_i64, 3]).append(add2()).concat(sub).unwrap();
    assert_eq!(spliced.collect().unwrap(), vec![10, 12]);
}

#[test]
fn file_backed_source_flows_through_chain() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "smith sales").unwrap();
    writeln!(file, "jones engineer").unwrap();
    file.flush().unwrap();

    let reader = BufReader::new(std::fs::File::open(file.path()).unwrap());
    let chain = Source::from_results(reader.lines())
        .append(Stage::transform_fn("upper", |line: String| {
            Ok(line.to_uppercase())
        }));

    assert_eq!(
        chain.collect().unwrap(),
        vec!["SMITH SALES".to_string(), "JONES ENGINEER".to_string()]
    );
}
