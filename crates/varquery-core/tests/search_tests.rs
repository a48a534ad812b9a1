//! Integration tests for the search surface.
//!
//! These run complete searches against in-process and IPC-served registries
//! and check the exact bytes written to the sink.

use std::sync::Arc;
use varquery::config::{IpcConfig, QueryConfig};
use varquery::registry::{VarEntry, VarValue};
use varquery::{
    search, CriteriaSet, MemoryRegistry, RegistryServer, RemoteRegistry, ResultCode,
    SearchBuilder, SearchOutcome, VarFlags,
};

/// A small registry resembling a device configuration store.
fn create_test_registry() -> MemoryRegistry {
    MemoryRegistry::from_entries([
        VarEntry::new("sys.uptime", VarValue::U64(86400)).with_flags(VarFlags::VOLATILE),
        VarEntry::new("sys.name", VarValue::Str("gateway".into())).with_tags(["config"]),
        VarEntry::new("eth.ip", VarValue::Str("192.168.1.1".into()))
            .with_instance(1)
            .with_tags(["net", "config"]),
        VarEntry::new("eth.ip", VarValue::Str("10.0.0.1".into()))
            .with_instance(2)
            .with_tags(["net"]),
        VarEntry::new("sys.key", VarValue::Str("secret".into()))
            .with_flags(VarFlags::HIDDEN | VarFlags::READONLY),
        VarEntry::new("temp", VarValue::Float(21.5)).with_flags(VarFlags::VOLATILE),
    ])
    .expect("fixture entries are unique")
}

fn run_raw(
    registry: &MemoryRegistry,
    criteria: CriteriaSet,
    name: Option<&str>,
    tags: Option<&str>,
    instance: u32,
    flags: VarFlags,
) -> (String, ResultCode) {
    let mut out = Vec::new();
    let result = search(
        registry,
        criteria.bits(),
        name,
        tags,
        instance,
        flags.bits(),
        &mut out,
    );
    (String::from_utf8(out).unwrap(), ResultCode::from_result(&result))
}

#[test]
fn test_unrestricted_scan_lists_everything() {
    let registry = create_test_registry();
    let (out, code) = run_raw(&registry, CriteriaSet::empty(), None, None, 0, VarFlags::empty());

    assert_eq!(
        out,
        "sys.uptime\nsys.name\n[1]eth.ip\n[2]eth.ip\nsys.key\ntemp\n"
    );
    assert_eq!(code, ResultCode::Success);
}

#[test]
fn test_criteria_combine_with_and() {
    let registry = create_test_registry();
    let (out, _) = run_raw(
        &registry,
        CriteriaSet::NAME_EXACT | CriteriaSet::TAGS_MATCH | CriteriaSet::SHOW_VALUE,
        Some("eth.ip"),
        Some("config"),
        0,
        VarFlags::empty(),
    );
    assert_eq!(out, "[1]eth.ip=192.168.1.1\n");
}

#[test]
fn test_negated_flags_hide_hidden_variables() {
    let registry = create_test_registry();
    let (out, _) = run_raw(
        &registry,
        CriteriaSet::NEGATE_FLAGS | CriteriaSet::NAME_REGEX,
        Some("^sys"),
        None,
        0,
        VarFlags::HIDDEN,
    );
    assert_eq!(out, "sys.uptime\nsys.name\n");
}

#[test]
fn test_float_value_rendering() {
    let registry = create_test_registry();
    let (out, _) = run_raw(
        &registry,
        CriteriaSet::NAME_EXACT | CriteriaSet::SHOW_VALUE,
        Some("temp"),
        None,
        0,
        VarFlags::empty(),
    );
    assert_eq!(out, "temp=21.5\n");
}

#[test]
fn test_tag_spec_length_boundary() {
    let registry = create_test_registry();
    let limit = QueryConfig::MAX_TAGSPEC_LEN - 1;

    // Exactly the longest accepted spec: applied. Pad "net" with commas so the
    // tokens stay meaningful.
    let at_limit = format!("net{}", ",".repeat(limit - 3));
    assert_eq!(at_limit.len(), limit);
    let spec = SearchBuilder::new().tags(at_limit.as_str()).build().unwrap();
    assert!(!spec.tag_filter_dropped());
    let (out, _) = run_raw(
        &registry,
        CriteriaSet::TAGS_MATCH,
        None,
        Some(&at_limit),
        0,
        VarFlags::empty(),
    );
    assert_eq!(out, "[1]eth.ip\n[2]eth.ip\n");

    // One byte longer: the tag filter is dropped and everything matches.
    let over_limit = format!("{},", at_limit);
    let spec = SearchBuilder::new().tags(over_limit.as_str()).build().unwrap();
    assert!(spec.tag_filter_dropped());
    let (out, code) = run_raw(
        &registry,
        CriteriaSet::TAGS_MATCH,
        None,
        Some(&over_limit),
        0,
        VarFlags::empty(),
    );
    let (unfiltered, _) = run_raw(&registry, CriteriaSet::empty(), None, None, 0, VarFlags::empty());
    assert_eq!(out, unfiltered);
    assert_eq!(code, ResultCode::Success);
}

#[test]
fn test_no_matches_is_success_not_invalid_arguments() {
    let registry = create_test_registry();

    let (out, empty) = run_raw(
        &registry,
        CriteriaSet::NAME_EXACT,
        Some("missing"),
        None,
        0,
        VarFlags::empty(),
    );
    assert!(out.is_empty());
    assert_eq!(empty, ResultCode::NoMatches);

    let (out, invalid) = run_raw(
        &registry,
        CriteriaSet::NAME_REGEX,
        Some("[unclosed"),
        None,
        0,
        VarFlags::empty(),
    );
    assert!(out.is_empty());
    assert_eq!(invalid, ResultCode::InvalidArguments);
    assert_ne!(empty, invalid);
}

#[test]
fn test_identical_builds_search_identically() {
    let registry = create_test_registry();
    let first = SearchBuilder::new().name_regex("ip$").show_value(true).build().unwrap();
    let second = SearchBuilder::new().name_regex("ip$").show_value(true).build().unwrap();
    assert_eq!(first, second);

    let mut a = Vec::new();
    let mut b = Vec::new();
    varquery::run(&registry, &first, &mut a).unwrap();
    varquery::run(&registry, &second, &mut b).unwrap();
    assert_eq!(a, b);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_remote_search_matches_local_search() {
    let registry = Arc::new(create_test_registry());
    let mut handle = RegistryServer::start(registry.clone(), 0).await.unwrap();
    let addr = handle.addr();

    let spec = SearchBuilder::new()
        .without_flags(VarFlags::HIDDEN)
        .show_value(true)
        .build()
        .unwrap();

    let mut local = Vec::new();
    let local_outcome = varquery::run(&*registry, &spec, &mut local).unwrap();

    let remote_spec = spec.clone();
    let (remote, remote_outcome) = tokio::task::spawn_blocking(move || {
        let client = RemoteRegistry::connect(addr).unwrap();
        let mut out = Vec::new();
        let outcome = varquery::run(&client, &remote_spec, &mut out).unwrap();
        (out, outcome)
    })
    .await
    .unwrap();

    assert_eq!(remote, local);
    assert_eq!(remote_outcome, local_outcome);
    assert_eq!(local_outcome, SearchOutcome::Matched { count: 5 });

    handle.shutdown();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_remote_registry_rejection_keeps_its_kind() {
    let registry = Arc::new(create_test_registry());
    let mut handle = RegistryServer::start(registry, 0).await.unwrap();
    let addr = handle.addr();

    let code = tokio::task::spawn_blocking(move || {
        let client = RemoteRegistry::connect(addr).unwrap();
        let spec = SearchBuilder::new().instance(0).build().unwrap();
        let mut out = Vec::new();
        ResultCode::from_result(&varquery::run(&client, &spec, &mut out))
    })
    .await
    .unwrap();

    assert_eq!(code, ResultCode::InvalidArguments);

    handle.shutdown();
}

/// Run the same raw search in process and through a served copy of `registry`.
async fn local_and_remote(
    registry: MemoryRegistry,
    criteria: CriteriaSet,
    name: Option<&'static str>,
    flags: u32,
) -> ((String, ResultCode), (String, ResultCode)) {
    let registry = Arc::new(registry);
    let mut handle = RegistryServer::start(registry.clone(), 0).await.unwrap();
    let addr = handle.addr();

    let mut local = Vec::new();
    let local_result = search(&*registry, criteria.bits(), name, None, 0, flags, &mut local);
    let local = (
        String::from_utf8(local).unwrap(),
        ResultCode::from_result(&local_result),
    );

    let remote = tokio::task::spawn_blocking(move || {
        let client = RemoteRegistry::connect(addr).unwrap();
        let mut out = Vec::new();
        let result = search(&client, criteria.bits(), name, None, 0, flags, &mut out);
        (String::from_utf8(out).unwrap(), ResultCode::from_result(&result))
    })
    .await
    .unwrap();

    handle.shutdown();
    (local, remote)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_unnamed_flag_bits_match_nothing_locally_and_remotely() {
    let (local, remote) = local_and_remote(
        create_test_registry(),
        CriteriaSet::FLAGS_MATCH,
        None,
        1 << 5,
    )
    .await;

    assert_eq!(local, (String::new(), ResultCode::NoMatches));
    assert_eq!(remote, local);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_oversized_remote_value_is_transport_failure() {
    let registry = MemoryRegistry::from_entries([
        VarEntry::new("a", VarValue::U16(1)),
        VarEntry::new(
            "blob",
            VarValue::Str("x".repeat(2 * IpcConfig::MAX_IPC_MESSAGE_SIZE)),
        ),
    ])
    .unwrap();

    let (_, (out, code)) = local_and_remote(
        registry,
        CriteriaSet::SHOW_VALUE,
        None,
        0,
    )
    .await;

    assert_eq!(out, "a=1\n");
    assert_eq!(code, ResultCode::TransportFailure);
}
