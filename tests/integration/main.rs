//! Integration tests for Callweave
//!
//! These tests drive the whole pipeline on a real Java project on disk:
//! config, parsing, incremental builds, the snapshot cache and rendering.

use callweave::{CallweaveConfig, OutputFormat, RenderSink, Session, load_config, render_pairs};
use callweave_core::ViewScope;
use callweave_engine::BuildRequest;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

fn write(root: &Path, path: &str, content: &str) {
    let full = root.join(path);
    if let Some(parent) = full.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(full, content).unwrap();
}

fn sample_project() -> TempDir {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        "core/src/Store.java",
        "public class Store {\n    public String get(String key) { return key; }\n    public void put(String key, String value) { validate(key); }\n    private void validate(String key) {}\n}\n",
    );
    write(
        dir.path(),
        "web/src/Handler.java",
        "public class Handler {\n    private Store store = new Store();\n    public String handle(String key) {\n        store.put(key, \"v\");\n        return store.get(key);\n    }\n}\n",
    );
    write(
        dir.path(),
        "web/src/test/HandlerTest.java",
        "public class HandlerTest {\n    void handles() { new Handler().handle(\"k\"); }\n}\n",
    );
    dir
}

fn open(root: &Path) -> Session {
    let config = load_config(root).unwrap();
    Session::open(root, &config, None, None).unwrap()
}

#[test]
fn test_full_build() {
    let project = sample_project();
    let session = open(project.path());

    let report = session.build(&BuildRequest::default()).unwrap();

    assert!(report.is_committed());
    assert!(report.failures.is_empty());
    assert_eq!(report.stats.new_units, 3);
    // handle -> put, handle -> get, put -> validate, handles -> handle
    assert_eq!(report.snapshot().unwrap().edges.len(), 4);
    let pairs = render_pairs(&session.coordinator().snapshot());
    assert!(pairs.contains("Caller: Handler::handle(String key)\nCallee: Store::put(String key,String value)\n"));
    assert!(pairs.contains("Caller: Store::put(String key,String value)\nCallee: Store::validate(String key)\n"));
    assert!(pairs.contains("Caller: HandlerTest::handles()\nCallee: Handler::handle(String key)\n"));
}

#[test]
fn test_cache_survives_restart() {
    let project = sample_project();
    let first = open(project.path());
    let built = first.build(&BuildRequest::default()).unwrap();
    let edges = built.snapshot().unwrap().edges.clone();
    first.persist().unwrap();
    drop(first);

    let second = open(project.path());
    assert_eq!(second.coordinator().snapshot().edges, edges);

    let rebuilt = second.build(&BuildRequest::default()).unwrap();
    assert_eq!(rebuilt.stats.reparsed_units, 0);
    assert_eq!(rebuilt.stats.valid_edges, edges.len());
    assert_eq!(rebuilt.snapshot().unwrap().edges, edges);
    assert_eq!(rebuilt.graph().unwrap().edge_count(), edges.len());
}

#[test]
fn test_edit_after_restart() {
    let project = sample_project();
    let first = open(project.path());
    first.build(&BuildRequest::default()).unwrap();
    first.persist().unwrap();
    drop(first);

    write(
        project.path(),
        "core/src/Store.java",
        "public class Store {\n    public String get(String key) { return key; }\n    public void put(String key, String value) {}\n}\n",
    );

    let second = open(project.path());
    let report = second.build(&BuildRequest::default()).unwrap();

    assert_eq!(report.stats.changed_units, 1);
    let pairs = render_pairs(&second.coordinator().snapshot());
    assert!(!pairs.contains("validate"));
    assert!(pairs.contains("Callee: Store::put(String key,String value)\n"));
}

#[test]
fn test_clear_cache_forces_full_build() {
    let project = sample_project();
    let first = open(project.path());
    first.build(&BuildRequest::default()).unwrap();
    first.persist().unwrap();
    drop(first);

    callweave_core::clear_cache(project.path()).unwrap();

    let second = open(project.path());
    assert!(second.coordinator().snapshot().edges.is_empty());
    let report = second.build(&BuildRequest::default()).unwrap();
    assert_eq!(report.stats.new_units, 3);
}

#[test]
fn test_scoped_builds() {
    let project = sample_project();
    let session = open(project.path());

    let without_tests = session
        .build(&BuildRequest::new(ViewScope::WholeProject { include_tests: false }))
        .unwrap();
    // The test caller of Handler::handle is still pulled in.
    let graph = without_tests.graph().unwrap();
    assert_eq!(graph.node_count(), 5);
    assert_eq!(graph.edge_count(), 4);

    let core = session
        .build(&BuildRequest::new(ViewScope::Module("core".into())))
        .unwrap();
    assert!(core.scope_warning.is_none());
    assert_eq!(core.graph().unwrap().node_count(), 4);
    assert_eq!(core.graph().unwrap().edge_count(), 3);

    let missing = session
        .build(&BuildRequest::new(ViewScope::Units(vec![callweave_core::UnitId::new("nope/Missing.java")])))
        .unwrap();
    assert!(missing.is_committed());
    assert_eq!(missing.scope_warning.unwrap().unknown.len(), 1);
}

#[test]
fn test_focus_on_method_shows_its_call_chains() {
    let project = sample_project();
    let session = open(project.path());

    let report = session
        .build(&BuildRequest::new(ViewScope::UpstreamDownstream("Store::put".into())))
        .unwrap();

    // handles -> handle -> put -> validate; Store::get is off the chain.
    let graph = report.graph().unwrap();
    assert_eq!(graph.node_count(), 4);
    assert_eq!(graph.edge_count(), 3);
    assert_eq!(report.snapshot().unwrap().edges.len(), 4);

    let by_signature = session
        .build(&BuildRequest::new(ViewScope::UpstreamDownstream(
            "Store::validate(String key)".into(),
        )))
        .unwrap();
    assert_eq!(by_signature.graph().unwrap().node_count(), 4);
    assert_eq!(by_signature.graph().unwrap().edge_count(), 3);
}

#[test]
fn test_config_excludes_and_renders() {
    let project = sample_project();
    write(
        project.path(),
        "callweave.toml",
        "[build]\nworkers = 2\n\n[scope]\nexclude = [\"**/test/**\"]\n\n[output]\nformat = \"dot\"\n",
    );
    let out_dir = TempDir::new().unwrap();
    let out = out_dir.path().join("graph.dot");

    let config: CallweaveConfig = load_config(project.path()).unwrap();
    assert_eq!(config.output_format(), OutputFormat::Dot);
    let sink = Arc::new(RenderSink::new(config.output_format(), Some(out.clone())));
    let session = Session::open(project.path(), &config, None, Some(sink)).unwrap();

    let report = session.build(&BuildRequest::default()).unwrap();
    assert_eq!(report.stats.units, 2);

    let dot = std::fs::read_to_string(&out).unwrap();
    assert!(dot.starts_with("digraph callweave {"));
    assert!(dot.contains("Handler::handle(String key)"));
    assert!(!dot.contains("HandlerTest"));
}
