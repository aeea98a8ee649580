//! End-to-end runs of the row processing publisher

mod common;

use common::builders::{numbered_source, text_source, JobBuilder};
use common::mock_helpers::{OrderRecorder, OverlapTracker, Picky, Repeat};
use common::{config_with_workers, WORKER_COUNTS};
use rowflow_rs::config::ExecutionConfig;
use rowflow_rs::pipeline::components::{
    value_selector, NumberRangeFilter, NumberStatisticsAnalyzer, SampleRowsAnalyzer,
    ValueDistributionAnalyzer, NULL_KEY,
};
use rowflow_rs::pipeline::{
    run_job, Category, Component, ComponentDefinition, ComponentRegistry, ExecutionPlanBuilder,
    GraphValidationError, JobConfig, Outcome, PipelineError, ResultError, RowId, Value,
    VecSource,
};
use std::sync::atomic::Ordering;

#[test]
fn test_five_rows_split_three_match_two_non_match() {
    let mut builder = JobBuilder::new(&["name"]);
    let filter = builder.equals("is bob", "name", &["bob"]);
    builder.count("matched", "name", Some((filter, Category::MATCH)));
    builder.count("unmatched", "name", Some((filter, Category::NON_MATCH)));
    builder.count("all", "name", None);
    let job = builder.build();

    let mut source = text_source(&["bob", "ann", "bob", "cid", "bob"]);
    let result = run_job(&job, &mut source, &ExecutionConfig::inline()).unwrap();

    assert_eq!(result.results.result("matched").unwrap().as_count(), Some(3));
    assert_eq!(result.results.result("unmatched").unwrap().as_count(), Some(2));
    assert_eq!(result.results.result("all").unwrap().as_count(), Some(5));

    let stats = result.summary.node(filter).unwrap();
    assert_eq!(stats.category_count(&Category::MATCH), 3);
    assert_eq!(stats.category_count(&Category::NON_MATCH), 2);
    let matched = result.summary.node_by_name("matched").unwrap();
    assert_eq!((matched.processed, matched.excluded), (3, 2));
}

#[test]
fn test_tokens_are_processed_before_next_source_row() {
    let mut builder = JobBuilder::new(&["tags"]);
    builder.splitter("split", "tags", ";");
    builder.add(
        ComponentDefinition::new("order", Component::analyzer(OrderRecorder)).input("tags (token)"),
    );
    let job = builder.build();

    let mut source = text_source(&["a;b;c", "d"]);
    let result = run_job(&job, &mut source, &ExecutionConfig::inline()).unwrap();

    let rows = result.results.result("order").unwrap().as_rows().unwrap().clone();
    let seen: Vec<(RowId, Value)> = rows
        .rows
        .into_iter()
        .map(|r| (r.row_id, r.values[0].clone()))
        .collect();
    assert_eq!(
        seen,
        vec![
            (RowId(1), Value::from("a")),
            (RowId(1), Value::from("b")),
            (RowId(1), Value::from("c")),
            (RowId(2), Value::from("d")),
        ]
    );
}

#[test]
fn test_fan_out_is_linear() {
    let repeat = Repeat::new(3);
    let calls = repeat.calls.clone();

    let mut builder = JobBuilder::new(&["v"]);
    let copy = builder.add(ComponentDefinition::new("copy", Component::transformer(repeat)).input("v"));
    builder.count("copies", "v (copy)", None);
    builder.count("sources", "v", None);
    let job = builder.build();

    let result = run_job(&job, &mut numbered_source(7), &ExecutionConfig::inline()).unwrap();

    assert_eq!(result.results.result("copies").unwrap().as_count(), Some(21));
    assert_eq!(result.results.result("sources").unwrap().as_count(), Some(7));
    assert_eq!(calls.load(Ordering::SeqCst), 7);
    assert_eq!(result.summary.node(copy).unwrap().emitted, 21);
}

#[test]
fn test_gated_transformer_only_fans_out_matching_rows() {
    let mut builder = JobBuilder::new(&["v"]);
    let filter = builder.add(
        ComponentDefinition::new(
            "is x",
            Component::filter(Picky {
                matches: "x",
                fails_on: None,
                rogue_on: None,
            }),
        )
        .input("v"),
    );
    builder.add(
        ComponentDefinition::new("copy", Component::transformer(Repeat::new(2)))
            .input("v")
            .requires(filter, Category::MATCH),
    );
    builder.count("copies", "v (copy)", None);
    let job = builder.build();

    let mut source = text_source(&["x", "y", "x"]);
    let result = run_job(&job, &mut source, &ExecutionConfig::inline()).unwrap();
    assert_eq!(result.results.result("copies").unwrap().as_count(), Some(4));
    assert_eq!(result.summary.node_by_name("copy").unwrap().excluded, 1);
}

#[test]
fn test_results_do_not_depend_on_worker_count() {
    let values: Vec<Value> = (0..500)
        .map(|i| match i % 7 {
            0 => Value::Null,
            1 => Value::from("n/a"),
            n => Value::Integer((i * n) as i64 % 97),
        })
        .collect();

    let mut reference = None;
    for workers in WORKER_COUNTS {
        let mut builder = JobBuilder::new(&["n"]);
        let range = builder.add(
            ComponentDefinition::new("range", Component::filter(NumberRangeFilter::new(10.0, 50.0)))
                .input("n"),
        );
        builder.add(
            ComponentDefinition::new("stats", Component::analyzer(NumberStatisticsAnalyzer))
                .input("n")
                .requires(range, NumberRangeFilter::WITHIN),
        );
        builder.add(
            ComponentDefinition::new("dist", Component::analyzer(ValueDistributionAnalyzer::new(3)))
                .input("n"),
        );
        builder.add(
            ComponentDefinition::new("sample", Component::analyzer(SampleRowsAnalyzer::new(5)))
                .input("n")
                .requires(range, NumberRangeFilter::ABOVE),
        );
        let job = builder.build();

        let mut source = VecSource::single_column(values.clone());
        let result = run_job(&job, &mut source, &config_with_workers(workers)).unwrap();

        let stats = result.results.result("stats").unwrap().clone();
        let dist = result.results.result("dist").unwrap().clone();
        let dist_node = result.results.find("dist").unwrap();
        let detail = result
            .results
            .result_producer(dist_node, Some("42"))
            .map(|p| p.get_result().unwrap());
        let sample_total = result.results.result("sample").unwrap().as_rows().unwrap().total;
        let counts: Vec<_> = result
            .summary
            .nodes
            .iter()
            .map(|n| (n.processed, n.excluded, n.errored, n.categories.clone()))
            .collect();

        // Integer sums are exact, so statistics compare exactly.
        let observed = (stats, dist, detail.ok(), sample_total, counts);
        match &reference {
            None => reference = Some(observed),
            Some(expected) => assert_eq!(&observed, expected, "workers = {workers}"),
        }
    }
}

#[test]
fn test_serial_transformer_never_overlaps() {
    let tracker = OverlapTracker::new(false);
    let max_in_flight = tracker.max_in_flight.clone();

    let mut builder = JobBuilder::new(&["v"]);
    builder.add(ComponentDefinition::new("tracker", Component::transformer(tracker)).input("v"));
    builder.count("tracked", "tracked", None);
    let job = builder.build();

    let result = run_job(&job, &mut numbered_source(200), &config_with_workers(4)).unwrap();
    assert_eq!(result.results.result("tracked").unwrap().as_count(), Some(200));
    assert_eq!(max_in_flight.load(Ordering::SeqCst), 1);
}

#[test]
fn test_forced_serial_overrides_concurrent_component() {
    let tracker = OverlapTracker::new(true);
    let max_in_flight = tracker.max_in_flight.clone();

    let mut builder = JobBuilder::new(&["v"]);
    builder.add(
        ComponentDefinition::new("tracker", Component::transformer(tracker))
            .input("v")
            .serial(),
    );
    let job = builder.build();

    run_job(&job, &mut numbered_source(100), &config_with_workers(4)).unwrap();
    assert_eq!(max_in_flight.load(Ordering::SeqCst), 1);
}

#[test]
fn test_cycle_rejected_before_any_row_is_read() {
    let repeat_a = Repeat::new(1);
    let repeat_b = Repeat::new(1);
    let mut builder = JobBuilder::new(&["v"]);
    // a consumes b's output and b consumes a's output.
    builder.add(
        ComponentDefinition::new("a", Component::transformer(repeat_a))
            .input("b (copy)")
            .rename_outputs(["a (copy)"]),
    );
    builder.add(
        ComponentDefinition::new("b", Component::transformer(repeat_b))
            .input("a (copy)")
            .rename_outputs(["b (copy)"]),
    );
    let job = builder.build();

    let mut source = common::mock_helpers::FailingSource::new(0);
    let failure = run_job(&job, &mut source, &ExecutionConfig::inline()).unwrap_err();

    assert!(matches!(
        failure.error,
        PipelineError::GraphValidation(GraphValidationError::Cycle { .. })
    ));
    assert_eq!(failure.report.summary.rows_read, 0);
    assert!(failure.partial.is_none());
}

#[test]
fn test_finalize_is_idempotent() {
    let mut builder = JobBuilder::new(&["v"]);
    builder.add(
        ComponentDefinition::new("dist", Component::analyzer(ValueDistributionAnalyzer::default()))
            .input("v"),
    );
    let job = builder.build();

    let mut source = text_source(&["a", "b", "a"]);
    let result = run_job(&job, &mut source, &ExecutionConfig::inline()).unwrap();
    let node = result.results.find("dist").unwrap();

    let first = result.results.finalize_result(node).unwrap();
    let second = result.results.finalize_result(node).unwrap();
    assert!(std::ptr::eq(first, second));
    assert_eq!(first.as_distribution().unwrap().count("a"), 2);
}

#[test]
fn test_null_rows_and_null_lookalike_text_drill_down_separately() {
    let mut builder = JobBuilder::new(&["v"]);
    builder.add(
        ComponentDefinition::new("dist", Component::analyzer(ValueDistributionAnalyzer::default()))
            .input("v"),
    );
    let job = builder.build();

    let mut source = VecSource::single_column(vec![Value::Null, Value::from(NULL_KEY), Value::Null]);
    let result = run_job(&job, &mut source, &ExecutionConfig::inline()).unwrap();
    let node = result.results.find("dist").unwrap();

    let dist = result.results.result("dist").unwrap().as_distribution().unwrap().clone();
    assert_eq!((dist.count(NULL_KEY), dist.null_count, dist.total), (1, 2, 3));

    let detail = |selector: &str| {
        let rows = result
            .results
            .result_producer(node, Some(selector))
            .unwrap()
            .get_result()
            .unwrap();
        let rows = rows.as_rows().unwrap().clone();
        (rows.total, rows.rows.iter().map(|r| r.row_id).collect::<Vec<_>>())
    };
    assert_eq!(detail(NULL_KEY), (2, vec![RowId(1), RowId(3)]));
    assert_eq!(detail(&value_selector(NULL_KEY)), (1, vec![RowId(2)]));
}

#[test]
fn test_drill_down_producers() {
    let mut builder = JobBuilder::new(&["city"]);
    builder.add(
        ComponentDefinition::new("cities", Component::analyzer(ValueDistributionAnalyzer::new(10)))
            .input("city"),
    );
    let count = builder.count("count", "city", None);
    let job = builder.build();

    let mut source = text_source(&["oslo", "rome", "oslo", "lima"]);
    let result = run_job(&job, &mut source, &config_with_workers(4)).unwrap();
    let node = result.results.find("cities").unwrap();

    assert_eq!(result.results.drill_down_keys(node).unwrap(), vec!["lima", "oslo", "rome"]);

    let producer = result.results.result_producer(node, Some("oslo")).unwrap();
    let detail = producer.get_result().unwrap();
    let rows = detail.as_rows().unwrap();
    let ids: Vec<_> = rows.rows.iter().map(|r| r.row_id).collect();
    assert_eq!(ids, vec![RowId(1), RowId(3)]);
    // Repeatable and read-only.
    assert_eq!(producer.get_result().unwrap(), detail);

    let whole = result.results.result_producer(node, None).unwrap();
    assert_eq!(whole.get_result().unwrap().as_distribution().unwrap().total, 4);

    assert!(matches!(
        result.results.result_producer(node, Some("paris")),
        Err(ResultError::UnknownSelector { .. })
    ));
    assert!(matches!(
        result.results.result_producer(count, Some("x")),
        Err(ResultError::UnknownSelector { .. })
    ));
}

#[test]
fn test_compound_requirement() {
    let mut builder = JobBuilder::new(&["v"]);
    let is_a = builder.equals("is a", "v", &["a"]);
    let is_b = builder.equals("is b", "v", &["b"]);
    builder.add(
        ComponentDefinition::new(
            "a or b",
            Component::analyzer(rowflow_rs::pipeline::components::RowCountAnalyzer),
        )
        .input("v")
        .requires_any([
            Outcome::new(is_a, Category::MATCH),
            Outcome::new(is_b, Category::MATCH),
        ]),
    );
    let job = builder.build();

    let mut source = text_source(&["a", "b", "c", "a"]);
    let result = run_job(&job, &mut source, &ExecutionConfig::inline()).unwrap();
    assert_eq!(result.results.result("a or b").unwrap().as_count(), Some(3));
}

#[test]
fn test_unwired_category_only_reaches_ungated_nodes() {
    let mut builder = JobBuilder::new(&["v"]);
    let filter = builder.equals("is a", "v", &["a"]);
    builder.count("matched", "v", Some((filter, Category::MATCH)));
    builder.count("all", "v", None);
    let job = builder.build();

    let plan = ExecutionPlanBuilder::build(&job).unwrap();
    assert_eq!(plan.stats().unwired_categories, 1);

    let mut source = text_source(&["a", "b"]);
    let result = run_job(&job, &mut source, &ExecutionConfig::inline()).unwrap();
    assert_eq!(result.results.result("matched").unwrap().as_count(), Some(1));
    assert_eq!(result.results.result("all").unwrap().as_count(), Some(2));
}

#[test]
fn test_job_from_json_config() {
    let config = JobConfig::from_json_str(
        r#"{
            "columns": [{ "name": "tags", "column_type": "text" }],
            "components": [
                { "name": "split", "kind": "token_splitter", "config": { "delimiter": "," }, "inputs": ["tags"] },
                { "name": "is urgent", "kind": "equals", "config": { "values": ["urgent"] }, "inputs": ["tags (token)"] },
                { "name": "urgent", "kind": "row_count", "inputs": ["tags (token)"],
                  "requires": [{ "filter": "is urgent", "category": "MATCH" }] },
                { "name": "tags", "kind": "value_distribution", "inputs": ["tags (token)"] }
            ]
        }"#,
    )
    .unwrap();
    let job = config.build(&ComponentRegistry::with_builtins()).unwrap();

    let mut source = text_source(&["urgent, bug", "feature", "bug,urgent,urgent"]);
    let result = run_job(&job, &mut source, &config_with_workers(4)).unwrap();

    assert_eq!(result.results.result("urgent").unwrap().as_count(), Some(3));
    let tags = result.results.result("tags").unwrap().as_distribution().unwrap().clone();
    assert_eq!((tags.count("bug"), tags.count("feature"), tags.total), (2, 1, 6));
}

#[test]
fn test_script_transformer_in_a_job() {
    let config = JobConfig::from_json_str(
        r#"{
            "columns": [{ "name": "n" }],
            "components": [
                { "name": "double", "kind": "script",
                  "config": { "script": "let v = to_number(values[0]); if !is_null(v) { out.push(v * 2.0); }", "outputs": ["doubled"] },
                  "inputs": ["n"] },
                { "name": "stats", "kind": "number_statistics", "inputs": ["doubled"] }
            ]
        }"#,
    )
    .unwrap();
    let job = config.build(&ComponentRegistry::with_builtins()).unwrap();

    let mut source = text_source(&["1", "x", "2.5"]);
    let result = run_job(&job, &mut source, &config_with_workers(4)).unwrap();
    let stats = result.results.result("stats").unwrap().as_statistics().unwrap().clone();
    assert_eq!(stats.count, 2);
    common::assert_float_eq(stats.sum, 7.0, 1e-9);
}
