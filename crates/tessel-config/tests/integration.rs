//! Integration tests for tessel-config.
//!
//! These tests cover file round-trips and rendering from a loaded
//! configuration.

use tempfile::TempDir;
use tessel_config::{ConfigError, EngineConfig};
use tessel_synth::{Note, Tuning};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new("tessel_config=debug"))
        .with_test_writer()
        .try_init();
}

/// Test saving a configuration and loading it back.
#[test]
fn test_save_and_load_round_trip() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("engine.toml");

    let config = EngineConfig {
        sample_rate: 48000.0,
        block_size: 256,
        polyphony: 8,
        tuning: Tuning::Hz432Inaccurate5Synced.name().to_string(),
        inaccuracy_seed: 0.75,
    };

    config.save(&path).expect("should save config");
    let loaded = EngineConfig::load(&path).expect("should load config");

    assert_eq!(loaded, config);
}

/// Test that save creates missing parent directories.
#[test]
fn test_save_creates_parent_directories() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("deeper").join("engine.toml");

    EngineConfig::default().save(&path).unwrap();

    assert!(path.exists());
}

/// Test that a missing file reports its path.
#[test]
fn test_load_missing_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("absent.toml");

    match EngineConfig::load(&path) {
        Err(ConfigError::ReadFile { path: reported, .. }) => assert_eq!(reported, path),
        other => panic!("expected a read error, got {other:?}"),
    }
}

/// Test that malformed files are parse errors.
#[test]
fn test_load_malformed_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("broken.toml");
    std::fs::write(&path, "sample_rate = [").unwrap();

    assert!(matches!(
        EngineConfig::load(&path),
        Err(ConfigError::TomlParse(_))
    ));
}

/// Test that a hand-written file with integer rates loads and validates.
#[test]
fn test_load_hand_written_file() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("engine.toml");
    std::fs::write(
        &path,
        "sample_rate = 96000\nblock_size = 64\ntuning = \"mts-esp-note-on\"\n",
    )
    .unwrap();

    let config = EngineConfig::load(&path).unwrap();

    assert_eq!(config.sample_rate, 96000.0);
    assert_eq!(config.block_size, 64);
    assert_eq!(config.polyphony, 16);
    assert_eq!(config.tuning().unwrap(), Tuning::MtsEspNoteOn);
    assert!(config.validate().is_ok());
}

/// Test that an invalid file loads but refuses to build a bus.
#[test]
fn test_invalid_file_does_not_build() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("engine.toml");
    std::fs::write(&path, "polyphony = 0\n").unwrap();

    let config = EngineConfig::load(&path).unwrap();

    assert!(matches!(
        config.build_bus(),
        Err(ConfigError::OutOfRange {
            field: "polyphony",
            ..
        })
    ));
}

/// Test rendering audio from a bus built out of a loaded file.
#[test]
fn test_loaded_config_renders() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("engine.toml");
    std::fs::write(
        &path,
        "sample_rate = 48000.0\nblock_size = 128\npolyphony = 2\ntuning = \"440hz-inaccurate-3\"\n",
    )
    .unwrap();

    let config = EngineConfig::load(&path).unwrap();
    let mut bus = config.build_bus().unwrap();
    bus.note_on(
        0,
        0.0,
        Note {
            id: 1,
            note: 69,
            channel: 0,
            velocity: 1.0,
            previous_note: 69,
        },
    );

    let mut left = vec![0.0f32; 512];
    let mut right = vec![0.0f32; 512];
    bus.render(&mut left, &mut right);

    assert_eq!(bus.round(), 4);
    assert!(left.iter().chain(&right).all(|s| s.is_finite()));
    assert!(left.iter().any(|&s| s != 0.0));

    // Drifted, but only by a few cents.
    let frequency = bus.pair(0).unwrap().carrier().frequency();
    assert!((frequency - 440.0).abs() < 2.0, "frequency {frequency}");
    assert!((frequency - 440.0).abs() > 1e-6, "frequency {frequency}");
}
