//! Distinct-term-scan join against in-memory triple relations.


use std::sync::Arc;

use bopline_access::{AccessError, Catalog, RelationResolver, SortedIndex};
use bopline_bop::annotations::names;
use bopline_bop::chunk::chunk_of;
use bopline_bop::{BOp, BOpRef, BindingSet, Chunk, Constraint, Predicate};
use bopline_core::config::EngineConfig;
use bopline_core::value::Value;
use bopline_core::var::Var;
use bopline_exec::{
    bounded, AsyncSource, BopContext, DistinctTermScanOp, ExecError, PipelineOperator,
};
use test_data_gen::{catalog_of, distinct_scan, duplicated_subjects, terms_of, triples};

fn s() -> Var {
    Var::named("dst_s")
}

fn p() -> Var {
    Var::named("dst_p")
}

fn o() -> Var {
    Var::named("dst_o")
}

fn open_predicate(relation: &str) -> Predicate {
    Predicate::builder(relation)
        .var("dst_s")
        .var("dst_p")
        .var("dst_o")
        .build()
}

/// Run one scan operator over `inputs` and collect the chunks it emits.
async fn run_scan(
    bop: &BOpRef,
    resolver: Arc<dyn RelationResolver>,
    inputs: Vec<BindingSet>,
) -> Result<Vec<Chunk>, ExecError> {
    let op = Arc::new(DistinctTermScanOp::from_bop(bop)?);
    let (sink, mut out) = bounded(64);
    let ctx = BopContext::new(
        AsyncSource::from_chunks([chunk_of(inputs)]),
        sink,
        resolver,
        Arc::new(EngineConfig::default()),
    );
    let task = tokio::spawn(op.eval(ctx));
    let mut chunks = Vec::new();
    while let Some(chunk) = out.next().await {
        chunks.push(chunk);
    }
    task.await.map_err(|e| ExecError::Task(e.to_string()))??;
    Ok(chunks)
}

fn solutions(chunks: &[Chunk]) -> Vec<BindingSet> {
    chunks.iter().flat_map(|c| c.iter().cloned()).collect()
}

#[tokio::test]
async fn test_duplicate_leading_terms_yield_each_value_once() {
    let rel = duplicated_subjects("dst_c");
    let bop = distinct_scan(1, &open_predicate("dst_c"), s()).build();

    let chunks = run_scan(&bop, catalog_of(&[Arc::clone(&rel)]), vec![BindingSet::new()])
        .await
        .unwrap();
    assert_eq!(terms_of(&solutions(&chunks), s()), vec![1, 2, 3]);

    // one cursor read per distinct subject, not one per tuple
    let spo = rel.memory_index("SPO").unwrap();
    assert_eq!(spo.visited(), 3);
    assert_eq!(spo.len(), 6);
}

#[tokio::test]
async fn test_chunk_capacity_annotation_sizes_output() {
    let rel = duplicated_subjects("dst_cap");
    let bop = distinct_scan(1, &open_predicate("dst_cap"), s())
        .chunk_capacity(1)
        .build();
    let chunks = run_scan(&bop, catalog_of(&[rel]), vec![BindingSet::new()])
        .await
        .unwrap();
    assert_eq!(chunks.len(), 3);
    assert!(chunks.iter().all(|c| c.len() == 1));
}

#[tokio::test]
async fn test_bound_inputs_narrow_the_scan_and_join_back() {
    let rel = triples(
        "dst_j",
        &[[1, 10, 100], [2, 10, 100], [3, 10, 101], [1, 20, 100]],
    );
    let bop = distinct_scan(1, &open_predicate("dst_j"), o()).build();
    let inputs = vec![
        BindingSet::new().with(p(), Value::Term(10)),
        BindingSet::new().with(p(), Value::Term(20)),
    ];

    let out = solutions(&run_scan(&bop, catalog_of(&[rel]), inputs).await.unwrap());
    let mut pairs: Vec<(u64, u64)> = out
        .iter()
        .filter_map(|bs| {
            let pt = bs.get(p())?.as_term()?;
            let ot = bs.get(o())?.as_term()?;
            Some((pt, ot))
        })
        .collect();
    pairs.sort_unstable();
    assert_eq!(pairs, vec![(10, 100), (10, 101), (20, 100)]);
    assert!(out.iter().all(|bs| !bs.is_bound(s())));
}

#[tokio::test]
async fn test_solutions_follow_input_order_then_key_order() {
    let rel = triples(
        "dst_ord",
        &[[1, 10, 100], [2, 10, 101], [3, 20, 102], [4, 20, 103]],
    );
    let bop = distinct_scan(1, &open_predicate("dst_ord"), o()).build();
    let inputs = vec![
        BindingSet::new().with(p(), Value::Term(20)),
        BindingSet::new().with(p(), Value::Term(10)),
    ];

    let out = solutions(&run_scan(&bop, catalog_of(&[rel]), inputs).await.unwrap());
    let pairs: Vec<(u64, u64)> = out
        .iter()
        .filter_map(|bs| Some((bs.get(p())?.as_term()?, bs.get(o())?.as_term()?)))
        .collect();
    assert_eq!(pairs, vec![(20, 102), (20, 103), (10, 100), (10, 101)]);
}

#[tokio::test]
async fn test_bound_position_after_distinct_var_is_checked_per_tuple() {
    // no key order puts ?s right after a bound ?p, so ?p is checked per tuple
    let rel = triples(
        "dst_res",
        &[[1, 5, 99], [1, 10, 100], [1, 20, 100], [2, 10, 101], [3, 20, 102]],
    );
    let bop = distinct_scan(1, &open_predicate("dst_res"), s()).build();
    let inputs = vec![BindingSet::new().with(p(), Value::Term(10))];

    let out = solutions(
        &run_scan(&bop, catalog_of(&[Arc::clone(&rel)]), inputs)
            .await
            .unwrap(),
    );
    let subjects: Vec<u64> = out
        .iter()
        .filter_map(|bs| bs.get(s())?.as_term())
        .collect();
    assert_eq!(subjects, vec![1, 2]);
    assert!(out.iter().all(|bs| bs.get(p()) == Some(&Value::Term(10))));
}

#[tokio::test]
async fn test_constraints_and_select_apply_to_joined_solutions() {
    let rel = triples("dst_cs", &[[1, 10, 100], [2, 10, 101], [3, 10, 102]]);
    let not_first = Constraint::ne(BOp::var(o()), BOp::constant(Value::Term(100)));
    let bop = distinct_scan(1, &open_predicate("dst_cs"), o())
        .annotate(names::CONSTRAINTS, vec![not_first.bop().clone()])
        .annotate(names::SELECT, vec![o()])
        .build();
    let inputs = vec![BindingSet::new().with(p(), Value::Term(10))];

    let out = solutions(&run_scan(&bop, catalog_of(&[rel]), inputs).await.unwrap());
    assert_eq!(terms_of(&out, o()), vec![101, 102]);
    assert!(out.iter().all(|bs| bs.len() == 1 && !bs.is_bound(p())));
}

#[tokio::test]
async fn test_term_filter_drops_values_before_the_join() {
    let rel = duplicated_subjects("dst_tf");
    let past_one = Constraint::gt(BOp::var(s()), BOp::constant(Value::Term(1)));
    let bop = distinct_scan(1, &open_predicate("dst_tf"), s())
        .annotate(names::TERM_FILTER, past_one.bop().clone())
        .build();

    let out = solutions(
        &run_scan(&bop, catalog_of(&[rel]), vec![BindingSet::new()])
            .await
            .unwrap(),
    );
    assert_eq!(terms_of(&out, s()), vec![2, 3]);
}

#[tokio::test]
async fn test_non_term_bindings_are_skipped() {
    let rel = duplicated_subjects("dst_nt");
    let bop = distinct_scan(1, &open_predicate("dst_nt"), s()).build();
    let inputs = vec![
        BindingSet::new().with(o(), 103i64),
        BindingSet::new().with(o(), Value::Term(103)),
    ];

    let out = solutions(&run_scan(&bop, catalog_of(&[rel]), inputs).await.unwrap());
    // only the term-bound input reaches the index
    assert_eq!(terms_of(&out, s()), vec![2]);
    assert_eq!(out.len(), 1);
}

#[tokio::test]
async fn test_filtered_access_paths_are_refused() {
    let rel = duplicated_subjects("dst_f");
    let filter = Constraint::bound(o());
    let pred = Predicate::builder("dst_f")
        .var("dst_s")
        .var("dst_p")
        .var("dst_o")
        .index_local_filter(filter.bop().clone())
        .build();
    let bop = distinct_scan(1, &pred, s()).build();

    let err = run_scan(&bop, catalog_of(&[rel]), vec![BindingSet::new()])
        .await
        .unwrap_err();
    assert!(matches!(err, ExecError::Invariant(_)), "got {err}");
}

#[tokio::test]
async fn test_unknown_relation_fails_the_operator() {
    let bop = distinct_scan(1, &open_predicate("dst_missing"), s()).build();
    let err = run_scan(&bop, Arc::new(Catalog::new()), vec![BindingSet::new()])
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ExecError::Access(AccessError::UnknownRelation(_))
    ));
}
