//! Integration tests for config module

use super::*;
use std::io::Write;
use std::path::PathBuf;
use tempfile::NamedTempFile;

const BASE_YAML: &str = r#"
inputs:
  prompt: a man reading the news
  audio_path: /data/news.wav

generation:
  mode: ta
  frames: 97
  height: 480
  width: 832
  scale_t: 5.0
  scale_a: 5.5
  sequence_parallel: 1

dit:
  sp_size: 1
  attention: flash

diffusion:
  timesteps:
    sampling:
      steps: 50
      shift: 5.0

vae:
  checkpoint: ./weights/Wan2.1_VAE.pth

model:
  variant: 1_7b
"#;

fn write_yaml(yaml: &str) -> NamedTempFile {
    let mut temp_file = NamedTempFile::new().unwrap();
    temp_file.write_all(yaml.as_bytes()).unwrap();
    temp_file
}

#[test]
fn test_end_to_end_config_loading() {
    let temp_file = write_yaml(BASE_YAML);

    let base = load_config(temp_file.path()).unwrap();
    let overrides = OverrideSet {
        prompt: Some("a woman singing".into()),
        frames: Some(49),
        steps: Some(30),
        sp_size: Some(2),
        ..Default::default()
    };

    let resolved = resolve(&base, &overrides).unwrap();
    validate_config(&resolved).unwrap();

    assert_eq!(resolved.inputs.prompt.as_deref(), Some("a woman singing"));
    assert_eq!(resolved.generation.mode.as_deref(), Some("TA"));
    assert_eq!(resolved.generation.frames, Some(49));
    assert_eq!(resolved.generation.height, Some(480));
    assert_eq!(resolved.diffusion.timesteps.sampling.steps, Some(30));
    assert_eq!(resolved.dit.sp_size, Some(ParallelDegree::Count(2)));
    assert_eq!(resolved.model.variant.as_deref(), Some("1.3B"));
    assert_eq!(
        resolved.outputs.directory,
        Some(PathBuf::from(DEFAULT_OUTPUT_DIR))
    );
}

#[test]
fn test_unmodeled_keys_survive_resolution() {
    let temp_file = write_yaml(BASE_YAML);
    let base = load_config(temp_file.path()).unwrap();
    let resolved = resolve(&base, &OverrideSet::new()).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("generate_resolved.yaml");
    save_config(&resolved, &path).unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    let value: serde_yaml::Value = serde_yaml::from_str(&text).unwrap();
    assert_eq!(value["dit"]["attention"].as_str(), Some("flash"));
    assert_eq!(
        value["diffusion"]["timesteps"]["sampling"]["shift"].as_f64(),
        Some(5.0)
    );
    assert_eq!(
        value["vae"]["checkpoint"].as_str(),
        Some("./weights/Wan2.1_VAE.pth")
    );
    assert_eq!(value["model"]["variant"].as_str(), Some("1.3B"));
}

#[test]
fn test_minimal_config() {
    let temp_file = write_yaml("inputs:\n  audio_path: speech.wav\n");
    let base = load_config(temp_file.path()).unwrap();

    let overrides = OverrideSet {
        prompt: Some("hello".into()),
        ..Default::default()
    };
    let resolved = resolve(&base, &overrides).unwrap();
    assert!(validate_config(&resolved).is_ok());
    assert_eq!(resolved.generation.mode.as_deref(), Some("TA"));
    assert_eq!(resolved.model.variant.as_deref(), Some("1.3B"));
}

#[test]
fn test_tia_end_to_end_with_real_inputs() {
    let dir = tempfile::tempdir().unwrap();
    let audio = dir.path().join("voice.wav");
    let image = dir.path().join("face.png");
    std::fs::write(&audio, b"RIFF").unwrap();
    std::fs::write(&image, b"PNG").unwrap();

    let base = parse_config(BASE_YAML).unwrap();
    let overrides = OverrideSet {
        audio_path: Some(audio),
        image_path: Some(image.clone()),
        mode: Some(GenerationMode::Tia),
        variant: Some(ModelVariant::Large),
        ..Default::default()
    };

    let resolved = resolve(&base, &overrides).unwrap();
    validate_config(&resolved).unwrap();
    validate_inputs(&resolved).unwrap();

    assert_eq!(resolved.generation.mode.as_deref(), Some("TIA"));
    assert_eq!(resolved.inputs.image_path, Some(image));
    assert_eq!(resolved.model.variant.as_deref(), Some("14B"));
}

#[test]
fn test_missing_inputs_caught_after_resolution() {
    let base = parse_config(BASE_YAML).unwrap();
    let resolved = resolve(&base, &OverrideSet::new()).unwrap();

    assert!(validate_config(&resolved).is_ok());
    assert!(matches!(
        validate_inputs(&resolved),
        Err(ValidationError::AudioNotFound(_))
    ));
}

#[test]
fn test_invalid_base_values_rejected_after_merge() {
    let yaml = r#"
inputs:
  prompt: x
  audio_path: a.wav
generation:
  frames: 0
"#;
    let base = parse_config(yaml).unwrap();
    let resolved = resolve(&base, &OverrideSet::new()).unwrap();
    assert!(matches!(
        validate_config(&resolved),
        Err(ValidationError::NonPositive { .. })
    ));

    // An override repairs it
    let overrides = OverrideSet {
        frames: Some(97),
        ..Default::default()
    };
    let resolved = resolve(&base, &overrides).unwrap();
    assert!(validate_config(&resolved).is_ok());
}

#[test]
fn test_metadata_merges_into_extra_and_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let metadata = dir.path().join("meta.json");
    std::fs::write(&metadata, r#"{"job_id": "abc-123", "priority": 3}"#).unwrap();

    let base = parse_config(BASE_YAML).unwrap();
    let overrides = OverrideSet {
        metadata_file: Some(metadata),
        ..Default::default()
    };
    let resolved = resolve(&base, &overrides).unwrap();

    let path = dir.path().join("resolved.yaml");
    save_config(&resolved, &path).unwrap();
    let reloaded = load_config(&path).unwrap();

    assert_eq!(reloaded.extra["job_id"].as_str(), Some("abc-123"));
    assert_eq!(reloaded.extra["priority"].as_i64(), Some(3));
    assert_eq!(resolved, reloaded);
}

#[test]
fn test_cli_args_flow_into_resolution() {
    let cli = parse_args([
        "humo-runner",
        "generate",
        "--prompt",
        "a dog barking",
        "--audio",
        "/tmp/bark.wav",
        "--variant",
        "17B",
        "--steps",
        "40",
    ])
    .unwrap();

    let Command::Generate(args) = cli.command else {
        panic!("expected generate subcommand");
    };
    let overrides = args.to_overrides();
    let base = parse_config(BASE_YAML).unwrap();
    let resolved = resolve(&base, &overrides).unwrap();

    assert_eq!(resolved.inputs.prompt.as_deref(), Some("a dog barking"));
    assert_eq!(
        resolved.inputs.audio_path,
        Some(PathBuf::from("/tmp/bark.wav"))
    );
    assert_eq!(resolved.model.variant.as_deref(), Some("14B"));
    assert_eq!(resolved.diffusion.timesteps.sampling.steps, Some(40));
}
