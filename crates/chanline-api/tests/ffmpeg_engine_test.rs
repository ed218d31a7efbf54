//! Drives `FfmpegEngine` against small shell scripts standing in for the
//! ffmpeg binary.
#![cfg(unix)]
#![allow(clippy::unwrap_used)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chanline_api::{FfmpegEngine, FfmpegOptions, OpenError, OpenRequest, TranscodeEngine};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

// ── Helpers ─────────────────────────────────────────────────────────

fn script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

fn engine(dir: &TempDir, program: PathBuf) -> FfmpegEngine {
    FfmpegEngine::new(FfmpegOptions {
        program,
        device_query: None,
        output_dir: dir.path().join("out"),
        command_timeout: Duration::from_secs(5),
        ready_timeout: Duration::from_secs(5),
        segment_seconds: 2,
    })
}

fn request(label: &str) -> OpenRequest {
    OpenRequest {
        label: label.into(),
        source: url::Url::parse("http://origin.example/live.m3u8").unwrap(),
        proxy: None,
        hwaccel: None,
        decoder: None,
        encoder: "libx264".into(),
        width: 854,
        height: 480,
        video_bitrate_kbps: 1500,
    }
}

const LISTINGS: &str = r#"case "$*" in
  *-version*) echo "ffmpeg version 7.0.2 Copyright (c) 2000-2024" ;;
  *-hwaccels*) printf 'Hardware acceleration methods:\ncuda\n\n' ;;
  *-encoders*) printf 'Encoders:\n ------\n V....D libx264    H.264\n V....D h264_nvenc NVENC\n A....D aac        AAC\n' ;;
  *-decoders*) printf 'Decoders:\n ------\n V....D h264       H.264\n V....D h264_cuvid CUVID\n' ;;
esac"#;

// ── Capabilities ────────────────────────────────────────────────────

#[tokio::test]
async fn capabilities_from_listings() {
    let dir = TempDir::new().unwrap();
    let ffmpeg = script(dir.path(), "ffmpeg", LISTINGS);

    let caps = engine(&dir, ffmpeg).capabilities().await.unwrap();

    assert_eq!(caps.version.as_deref(), Some("7.0.2"));
    assert_eq!(caps.hwaccels, vec!["cuda"]);
    assert_eq!(caps.encoders, vec!["libx264", "h264_nvenc"]);
    assert!(caps.has_decoder("h264_cuvid"));
    assert!(caps.devices.is_empty());
}

#[tokio::test]
async fn missing_binary_is_reported() {
    let dir = TempDir::new().unwrap();
    let err = engine(&dir, dir.path().join("nope"))
        .capabilities()
        .await
        .unwrap_err();

    assert!(err.is_engine_missing(), "{err}");
}

// ── Pipelines ───────────────────────────────────────────────────────

#[tokio::test]
async fn open_waits_for_playlist_and_close_cleans_up() {
    let dir = TempDir::new().unwrap();
    let ffmpeg = script(
        dir.path(),
        "ffmpeg",
        "for last; do :; done\ntouch \"$last\"\nexec sleep 30",
    );
    let engine = engine(&dir, ffmpeg);

    let pipeline = engine.open(request("s1-1")).await.unwrap();
    let output = PathBuf::from(pipeline.output());
    assert!(output.ends_with("s1-1/index.m3u8"));
    assert!(output.exists());

    pipeline.close().await;
    assert!(!dir.path().join("out/s1-1").exists());
}

#[tokio::test]
async fn early_exit_is_classified_from_stderr() {
    let dir = TempDir::new().unwrap();
    let ffmpeg = script(
        dir.path(),
        "ffmpeg",
        "echo \"[h264_nvenc @ 0x1] Cannot load libcuda.so.1\" >&2\nexit 1",
    );

    let err = engine(&dir, ffmpeg).open(request("s2-1")).await.unwrap_err();

    assert!(matches!(err, OpenError::AccelerationUnavailable(_)), "{err}");
    assert!(!dir.path().join("out/s2-1").exists());
}

#[tokio::test]
async fn silent_pipeline_times_out() {
    let dir = TempDir::new().unwrap();
    let ffmpeg = script(dir.path(), "ffmpeg", "exec sleep 30");
    let mut options = engine(&dir, ffmpeg).options().clone();
    options.ready_timeout = Duration::from_millis(300);

    let err = FfmpegEngine::new(options)
        .open(request("s3-1"))
        .await
        .unwrap_err();

    assert!(matches!(err, OpenError::SourceUnreachable(_)), "{err}");
}
