// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use tempfile::TempDir;

fn decoders_with(tool_dir: &Path) -> Decoders {
    Decoders::new(DecoderConfig {
        gunzip: tool_dir.join("fake-gunzip"),
        unzip: tool_dir.join("fake-unzip"),
        crx2rnx: tool_dir.join("fake-crx2rnx"),
        sbf2rin: tool_dir.join("fake-sbf2rin"),
    })
}

fn install_fake(tool_dir: &Path, name: &str, script: &str) {
    use std::os::unix::fs::PermissionsExt;
    let path = tool_dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{script}\n")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
}

#[tokio::test]
async fn gunzip_strips_suffix_and_keeps_source() {
    let tools = TempDir::new().unwrap();
    let spool = TempDir::new().unwrap();
    install_fake(tools.path(), "fake-gunzip", "echo decoded");

    let src = spool.path().join("FILE_MO.rnx.gz");
    std::fs::write(&src, b"compressed").unwrap();
    let dest_dir = spool.path().join("unpack.a");

    let dest = decoders_with(tools.path())
        .gunzip(&src, &dest_dir)
        .await
        .unwrap();

    assert_eq!(dest, dest_dir.join("FILE_MO.rnx"));
    assert_eq!(std::fs::read_to_string(&dest).unwrap(), "decoded\n");
    assert!(src.exists());
}

#[tokio::test]
async fn nonzero_exit_is_terminal() {
    let tools = TempDir::new().unwrap();
    let spool = TempDir::new().unwrap();
    install_fake(tools.path(), "fake-unzip", "echo broken >&2; exit 3");

    let err = decoders_with(tools.path())
        .unzip(&spool.path().join("a.zip"), &spool.path().join("out"))
        .await
        .unwrap_err();

    match err {
        DecodeError::Failed { tool, code, stderr } => {
            assert_eq!(tool, "unzip");
            assert_eq!(code, Some(3));
            assert_eq!(stderr, "broken");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn missing_binary_is_a_spawn_error() {
    let tools = TempDir::new().unwrap();
    let spool = TempDir::new().unwrap();

    let err = decoders_with(tools.path())
        .unzip(&spool.path().join("a.zip"), &spool.path().join("out"))
        .await
        .unwrap_err();
    assert!(matches!(err, DecodeError::Spawn { .. }));
}

#[tokio::test]
async fn crx2rnx_checks_for_the_produced_file() {
    let tools = TempDir::new().unwrap();
    let spool = TempDir::new().unwrap();
    // Tool "succeeds" but produces nothing.
    install_fake(tools.path(), "fake-crx2rnx", "exit 0");

    let src = spool.path().join("FILE_MO.crx");
    std::fs::write(&src, b"hatanaka").unwrap();

    let err = decoders_with(tools.path())
        .crx2rnx(&src)
        .await
        .unwrap_err();
    assert!(matches!(err, DecodeError::Failed { .. }));
}

#[tokio::test]
async fn crx2rnx_returns_the_sibling_rnx() {
    let tools = TempDir::new().unwrap();
    let spool = TempDir::new().unwrap();
    let src = spool.path().join("FILE_MO.crx");
    let produced = spool.path().join("FILE_MO.rnx");
    install_fake(
        tools.path(),
        "fake-crx2rnx",
        &format!("touch {}", produced.display()),
    );
    std::fs::write(&src, b"hatanaka").unwrap();

    let dest = decoders_with(tools.path()).crx2rnx(&src).await.unwrap();
    assert_eq!(dest, produced);
}

#[test]
fn default_config_uses_path_lookup() {
    let config = DecoderConfig::default();
    assert_eq!(config.gunzip, PathBuf::from("gunzip"));
    assert_eq!(config.sbf2rin, PathBuf::from("sbf2rin"));
}
