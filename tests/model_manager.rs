use httpmock::prelude::*;
use rand::{rngs::StdRng, RngCore, SeedableRng};
use sha2::{Digest, Sha256};
use tempfile::tempdir;

use unmix::model::ensure_model;

fn make_fake_model_bytes(len: usize) -> (Vec<u8>, String, u64) {
    let mut data = vec![0u8; len];

    let mut rng = StdRng::seed_from_u64(42);
    rng.fill_bytes(&mut data);

    let mut h = Sha256::new();
    h.update(&data);
    let sha = hex::encode(h.finalize());

    (data, sha, len as u64)
}

fn manifest_json(model_name: &str, model_url: &str, sha256_hex: &str, size: u64) -> String {
    format!(
        r#"{{
  "name": "{name}",
  "version": "1.0.0",
  "backend": "onnx",
  "sample_rate": 44100,
  "channels": 2,
  "window": 441000,
  "hop": 441000,
  "stems": ["vocals", "drums", "bass", "other"],
  "input_name": "mix",
  "output_name": "stems",
  "url": "{url}",
  "sha256": "{sha}",
  "filesize": {size}
}}"#,
        name = model_name,
        url = model_url,
        sha = sha256_hex,
        size = size
    )
}

#[test]
fn downloads_and_caches_model_then_reuses_cache() {
    let tmp_cache = tempdir().unwrap();
    std::env::set_var("XDG_CACHE_HOME", tmp_cache.path());

    let (model_bytes, sha_hex, size) = make_fake_model_bytes(256 * 1024);

    let server = MockServer::start();

    let model_mock = server.mock(|when, then| {
        when.method(GET).path("/htdemucs.onnx");
        then.status(200)
            .header("Content-Length", size.to_string().as_str())
            .body(model_bytes.clone());
    });

    let model_url = format!("{}/htdemucs.onnx", server.base_url());
    let manifest_body = manifest_json("htdemucs", &model_url, &sha_hex, size);

    let manifest_mock = server.mock(|when, then| {
        when.method(GET).path("/htdemucs.json");
        then.status(200)
            .header("Content-Type", "application/json")
            .body(manifest_body.clone());
    });

    let manifest_url = format!("{}/htdemucs.json", server.base_url());

    let handle = ensure_model("ignored", Some(&manifest_url)).expect("first ensure_model failed");
    assert!(handle.local_path.exists(), "cached model should exist");
    assert_eq!(handle.manifest.stems.len(), 4);
    assert_eq!(handle.manifest.sample_rate, 44100);

    assert!(manifest_mock.hits() >= 1);
    model_mock.assert_hits(1);

    let handle2 = ensure_model("ignored", Some(&manifest_url)).expect("second ensure_model failed");
    assert_eq!(
        handle.local_path, handle2.local_path,
        "cache path should be stable"
    );

    model_mock.assert_hits(1); // still exactly one download
}

#[test]
fn checksum_mismatch_returns_error() {
    let tmp_cache = tempdir().unwrap();
    std::env::set_var("XDG_CACHE_HOME", tmp_cache.path());

    let (model_bytes, sha_hex, size) = make_fake_model_bytes(64 * 1024);
    let mut bad_sha = sha_hex.clone();
    let first = &bad_sha[0..1];
    bad_sha.replace_range(0..1, if first == "a" { "b" } else { "a" });

    let server = MockServer::start();

    let _model_mock = server.mock(|when, then| {
        when.method(GET).path("/bad.onnx");
        then.status(200)
            .header("Content-Length", size.to_string().as_str())
            .body(model_bytes.clone());
    });

    let model_url = format!("{}/bad.onnx", server.base_url());
    let manifest_body = manifest_json("bad_model", &model_url, &bad_sha, size);

    let _manifest_mock = server.mock(|when, then| {
        when.method(GET).path("/bad.json");
        then.status(200)
            .header("Content-Type", "application/json")
            .body(manifest_body.clone());
    });

    let manifest_url = format!("{}/bad.json", server.base_url());

    match ensure_model("ignored", Some(&manifest_url)) {
        Ok(_) => panic!("expected checksum error, but got Ok"),
        Err(e) => {
            let msg = e.to_string().to_lowercase();
            assert!(
                msg.contains("checksum"),
                "expected checksum error, got: {msg}"
            );
        }
    }
}

#[test]
fn download_reports_progress_for_the_artifact() {
    use std::sync::{Arc, Mutex};

    let tmp_cache = tempdir().unwrap();
    std::env::set_var("XDG_CACHE_HOME", tmp_cache.path());

    let (model_bytes, sha_hex, size) = make_fake_model_bytes(128 * 1024);

    let server = MockServer::start();

    let _model_mock = server.mock(|when, then| {
        when.method(GET).path("/prog.onnx");
        then.status(200)
            .header("Content-Length", size.to_string().as_str())
            .body(model_bytes.clone());
    });

    let model_url = format!("{}/prog.onnx", server.base_url());
    let manifest_body = manifest_json("prog_model", &model_url, &sha_hex, size);

    let _manifest_mock = server.mock(|when, then| {
        when.method(GET).path("/prog.json");
        then.status(200)
            .header("Content-Type", "application/json")
            .body(manifest_body.clone());
    });

    let seen: Arc<Mutex<Vec<(String, u64, Option<u64>)>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    unmix::set_download_progress_callback(move |model, p| {
        sink.lock().unwrap().push((model.to_string(), p.received, p.total));
    });

    let manifest_url = format!("{}/prog.json", server.base_url());
    ensure_model("ignored", Some(&manifest_url)).expect("ensure_model failed");

    let events: Vec<_> = seen
        .lock()
        .unwrap()
        .iter()
        .filter(|(model, _, _)| model == "prog_model")
        .cloned()
        .collect();

    assert!(!events.is_empty(), "no progress reported");
    assert_eq!(events.first().unwrap().1, 0, "first event should be zero bytes");
    assert_eq!(events.last().unwrap().1, size, "last event should cover the artifact");
    for (_, received, total) in &events {
        assert_eq!(*total, Some(size));
        assert!(*received <= size);
    }
}

#[test]
fn size_mismatch_invalidates_the_artifact() {
    let tmp_cache = tempdir().unwrap();
    std::env::set_var("XDG_CACHE_HOME", tmp_cache.path());

    let (model_bytes, sha_hex, size) = make_fake_model_bytes(32 * 1024);

    let server = MockServer::start();

    let _model_mock = server.mock(|when, then| {
        when.method(GET).path("/short.onnx");
        then.status(200)
            .header("Content-Length", size.to_string().as_str())
            .body(model_bytes.clone());
    });

    let model_url = format!("{}/short.onnx", server.base_url());
    // manifest declares more bytes than the server will ever send
    let manifest_body = manifest_json("short_model", &model_url, &sha_hex, size + 1);

    let _manifest_mock = server.mock(|when, then| {
        when.method(GET).path("/short.json");
        then.status(200)
            .header("Content-Type", "application/json")
            .body(manifest_body.clone());
    });

    let manifest_url = format!("{}/short.json", server.base_url());
    match ensure_model("ignored", Some(&manifest_url)) {
        Ok(_) => panic!("expected a verification error, but got Ok"),
        Err(e) => {
            let msg = e.to_string().to_lowercase();
            assert!(msg.contains("checksum"), "got: {msg}");
        }
    }
}

#[test]
fn unknown_model_name_is_a_registry_error() {
    let err = ensure_model("no_such_model", None).unwrap_err();
    let msg = err.to_string().to_lowercase();
    assert!(msg.contains("registry"), "got: {msg}");
}
