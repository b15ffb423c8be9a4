use std::collections::BTreeSet;

const API_MOD_SOURCE: &str = include_str!("../src/api/mod.rs");
const GIT_HANDLERS_SOURCE: &str = include_str!("../src/api/git.rs");
const MAIN_SOURCE: &str = include_str!("../src/main.rs");
const PROTO_SOURCE: &str = include_str!("../src/rpc/proto.rs");
const PROTO_DOC: &str = include_str!("../proto/gitgrpc.proto");

#[test]
fn relay_routes_are_declared() {
    let expected_paths = [
        "/v1/git/{model_name}/{id}/commit",
        "/v1/git/{model_name}/{id}/history",
        "/v1/git/{model_name}/{id}/commits/{commit_hash}",
    ];

    let missing: BTreeSet<_> =
        expected_paths.into_iter().filter(|path| !API_MOD_SOURCE.contains(path)).collect();

    assert!(missing.is_empty(), "missing route declarations for: {missing:?}");
}

#[test]
fn relay_routes_bind_expected_http_methods() {
    let expectations = [
        ("/v1/git/{model_name}/{id}/commit", "post(git::commit)"),
        ("/v1/git/{model_name}/{id}/history", "get(git::history)"),
        ("/v1/git/{model_name}/{id}/commits/{commit_hash}", "get(git::commit_content)"),
    ];

    for (path, binding) in expectations {
        let declaration = format!(".route(\"{path}\", {binding})");
        assert!(API_MOD_SOURCE.contains(&declaration), "expected {declaration} in api/mod.rs");
    }
}

#[test]
fn every_relay_route_sits_behind_the_token_gate() {
    assert!(
        API_MOD_SOURCE.contains("route_layer(middleware::from_fn_with_state(store, require_access_token))"),
        "relay routes must be gated by the access token check"
    );
    assert!(
        API_MOD_SOURCE.contains("route_layer(middleware::from_fn_with_state(sessions, load_session))"),
        "sessions must be resolved before the gate runs"
    );
}

#[test]
fn health_check_stays_outside_the_gate() {
    assert!(MAIN_SOURCE.contains(".route(\"/healthz\", get(healthz))"));
    assert!(!API_MOD_SOURCE.contains("/healthz"));
}

#[test]
fn configuration_is_checked_before_any_remote_call() {
    assert!(GIT_HANDLERS_SOURCE.contains("invalid_config_short_circuits_all_operations"));
    assert!(GIT_HANDLERS_SOURCE.contains("commit_without_author_fails_before_any_call"));
}

#[test]
fn wire_method_paths_match_the_service_definition() {
    for method in ["SaveToGit", "ReadFileHistory", "ReadCommitContent"] {
        let path = format!("/gitgrpc.GitService/{method}");
        assert!(PROTO_SOURCE.contains(&path), "missing method path {path}");
        assert!(PROTO_DOC.contains(&format!("rpc {method}")), "missing rpc {method} in proto");
    }
    assert!(PROTO_DOC.contains("package gitgrpc;"));
}
