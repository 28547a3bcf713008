//! End-to-end pipeline tests: submit → dispatch → stages → export.

use scribed::config::Config;
use scribed::dispatcher::Dispatcher;
use scribed::engine::{EnergyDiarizer, FixtureEngine};
use scribed::export::{ArtifactFormat, Exporter, TextVariant};
use scribed::job::{JobId, JobOptions, JobStatus};
use scribed::queue::QueueSet;
use scribed::service::{JobService, StatusView};
use scribed::stage::{DialectMapper, Redactor, StageRegistry};
use scribed::store::{MemoryStore, PersistenceGateway};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

struct Harness {
    service: JobService,
    gateway: Arc<PersistenceGateway>,
    queues: Arc<QueueSet>,
    registry: Arc<StageRegistry>,
    exporter: Arc<Exporter>,
    config: Config,
}

impl Harness {
    fn new(dir: &Path) -> Self {
        let mut config = Config::default();
        config.storage.data_dir = Some(dir.to_path_buf());
        config.worker.workers = 2;
        config.worker.recovery_interval = "50ms".to_string();

        let gateway = Arc::new(PersistenceGateway::new(Arc::new(MemoryStore::new())));
        let queues = Arc::new(QueueSet::new());
        let exporter = Arc::new(Exporter::new(dir.join("artifacts")));
        let registry = Arc::new(StageRegistry::standard(
            Arc::new(FixtureEngine::new()),
            Arc::new(EnergyDiarizer::default()),
            DialectMapper::default(),
            Redactor::default(),
        ));
        let service =
            JobService::new(gateway.clone(), queues.clone(), exporter.clone(), &config).unwrap();
        Harness {
            service,
            gateway,
            queues,
            registry,
            exporter,
            config,
        }
    }

    fn start(&self) -> scribed::DispatcherHandle {
        Dispatcher::new(
            self.gateway.clone(),
            self.queues.clone(),
            self.registry.clone(),
            self.exporter.clone(),
            self.config.clone(),
        )
        .start()
        .unwrap()
    }

    fn wait_terminal(&self, id: JobId) -> StatusView {
        let deadline = Instant::now() + Duration::from_secs(10);
        loop {
            let view = self.service.status(id).unwrap();
            if view.status == JobStatus::Finished || view.status == JobStatus::Error {
                return view;
            }
            assert!(Instant::now() < deadline, "job never reached a terminal state");
            std::thread::sleep(Duration::from_millis(20));
        }
    }
}

fn write_wav(path: &Path, samples: &[i16]) {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 16_000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).unwrap();
    for &s in samples {
        writer.write_sample(s).unwrap();
    }
    writer.finalize().unwrap();
}

fn write_sidecar(wav_path: &Path, json: &str) {
    std::fs::write(wav_path.with_extension("json"), json).unwrap();
}

#[test]
fn sidecar_transcript_flows_through_to_artifacts() {
    let dir = tempfile::tempdir().unwrap();
    let harness = Harness::new(dir.path());

    let wav = dir.path().join("interview.wav");
    write_wav(&wav, &vec![2000i16; 32_000]);
    write_sidecar(
        &wav,
        r#"{"segments":[
            {"start":0.0,"end":1.2,"text":"สวัสดีครับ","confidence":0.95},
            {"start":1.2,"end":2.5,"text":"วันนี้อากาศดี","confidence":0.92}
        ]}"#,
    );

    let record = harness
        .service
        .submit_path(&wav, JobOptions::default(), None)
        .unwrap();
    let handle = harness.start();
    let view = harness.wait_terminal(record.id);
    handle.stop();

    assert_eq!(view.status, JobStatus::Finished);
    assert_eq!(view.progress, 1.0);
    let text = view.text.unwrap();
    assert!(text.contains("สวัสดีครับ"), "{text}");
    assert!(text.contains("วันนี้อากาศดี"), "{text}");

    // The standard artifact set is written up front.
    assert_eq!(view.artifacts.len(), 4);
    let formats: Vec<_> = view.artifacts.iter().map(|a| a.format).collect();
    for format in ArtifactFormat::ALL {
        assert!(formats.contains(&format));
    }

    let (artifact, bytes) = harness
        .service
        .artifact(record.id, ArtifactFormat::Srt, TextVariant::Standard, false)
        .unwrap();
    assert_eq!(artifact.version, 1);
    let srt = String::from_utf8(bytes).unwrap();
    assert!(srt.contains("00:00:00,000 --> 00:00:01,200"), "{srt}");
    assert!(srt.contains("สวัสดีครับ"), "{srt}");
}

#[test]
fn near_silent_clip_finishes_with_empty_transcript() {
    let dir = tempfile::tempdir().unwrap();
    let harness = Harness::new(dir.path());

    let wav = dir.path().join("silence.wav");
    write_wav(&wav, &vec![1i16; 16_000]);

    let record = harness
        .service
        .submit_path(&wav, JobOptions::default(), None)
        .unwrap();
    let handle = harness.start();
    let view = harness.wait_terminal(record.id);
    handle.stop();

    // Empty speech is a successful outcome, not an error.
    assert_eq!(view.status, JobStatus::Finished);
    assert_eq!(view.text.as_deref(), Some(""));
    assert_eq!(view.artifacts.len(), 4);
}

#[test]
fn dialect_mapping_produces_distinct_variant() {
    let dir = tempfile::tempdir().unwrap();
    let harness = Harness::new(dir.path());

    let wav = dir.path().join("isan.wav");
    write_wav(&wav, &vec![2000i16; 16_000]);
    write_sidecar(
        &wav,
        r#"{"segments":[{"start":0.0,"end":1.0,"text":"กินเข่า แล้ว เฮ็ด งาน","confidence":0.9}]}"#,
    );

    let options = JobOptions {
        enable_dialect_map: true,
        // Punctuation and ITN would also rewrite the text; keep the
        // comparison down to the dialect tables.
        enable_punct: false,
        enable_itn: false,
        ..JobOptions::default()
    };
    let record = harness.service.submit_path(&wav, options, None).unwrap();
    let handle = harness.start();
    let view = harness.wait_terminal(record.id);
    handle.stop();

    assert_eq!(view.status, JobStatus::Finished);
    assert_eq!(view.text.as_deref(), Some("กินเข่า แล้ว เฮ็ด งาน"));

    let (_, standard) = harness
        .service
        .artifact(record.id, ArtifactFormat::Txt, TextVariant::Standard, false)
        .unwrap();
    let (_, dialect) = harness
        .service
        .artifact(record.id, ArtifactFormat::Txt, TextVariant::Dialect, false)
        .unwrap();
    assert_eq!(String::from_utf8(standard).unwrap(), "กินเข่า แล้ว เฮ็ด งาน\n");
    assert_eq!(String::from_utf8(dialect).unwrap(), "กินข้าว แล้ว ทำ งาน\n");
}

#[test]
fn redaction_masks_artifact_but_not_raw_text() {
    let dir = tempfile::tempdir().unwrap();
    let harness = Harness::new(dir.path());

    let wav = dir.path().join("call.wav");
    write_wav(&wav, &vec![2000i16; 16_000]);
    write_sidecar(
        &wav,
        r#"{"segments":[{"start":0.0,"end":2.0,"text":"โทรหาเบอร์ 0812345678 นะ","confidence":0.9}]}"#,
    );

    let options = JobOptions {
        enable_redaction: true,
        enable_itn: false,
        ..JobOptions::default()
    };
    let record = harness.service.submit_path(&wav, options, None).unwrap();
    let handle = harness.start();
    let view = harness.wait_terminal(record.id);
    handle.stop();

    assert_eq!(view.status, JobStatus::Finished);
    assert!(view.text.unwrap().contains("0812345678"));

    let (_, bytes) = harness
        .service
        .artifact(record.id, ArtifactFormat::Txt, TextVariant::Standard, true)
        .unwrap();
    let masked = String::from_utf8(bytes).unwrap();
    assert!(!masked.contains("0812345678"), "{masked}");
    assert!(masked.contains("**********"), "{masked}");
}

#[test]
fn dialect_variant_unavailable_without_toggle() {
    let dir = tempfile::tempdir().unwrap();
    let harness = Harness::new(dir.path());

    let wav = dir.path().join("plain.wav");
    write_wav(&wav, &vec![2000i16; 16_000]);
    write_sidecar(
        &wav,
        r#"{"segments":[{"start":0.0,"end":1.0,"text":"สวัสดี","confidence":0.9}]}"#,
    );

    let record = harness
        .service
        .submit_path(&wav, JobOptions::default(), None)
        .unwrap();
    let handle = harness.start();
    let view = harness.wait_terminal(record.id);
    handle.stop();
    assert_eq!(view.status, JobStatus::Finished);

    let err = harness
        .service
        .artifact(record.id, ArtifactFormat::Txt, TextVariant::Dialect, false)
        .unwrap_err();
    assert!(matches!(err, scribed::ScribedError::Validation { .. }));
}

#[test]
fn repeated_artifact_requests_are_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let harness = Harness::new(dir.path());

    let wav = dir.path().join("clip.wav");
    write_wav(&wav, &vec![2000i16; 16_000]);
    write_sidecar(
        &wav,
        r#"{"segments":[{"start":0.0,"end":1.0,"text":"ทดสอบ","confidence":0.9}]}"#,
    );

    let record = harness
        .service
        .submit_path(&wav, JobOptions::default(), None)
        .unwrap();
    let handle = harness.start();
    harness.wait_terminal(record.id);
    handle.stop();

    let (first, _) = harness
        .service
        .artifact(record.id, ArtifactFormat::Vtt, TextVariant::Standard, false)
        .unwrap();
    let (second, _) = harness
        .service
        .artifact(record.id, ArtifactFormat::Vtt, TextVariant::Standard, false)
        .unwrap();
    assert_eq!(first, second);
    assert_eq!(second.version, 1);

    // Artifact count is stable across repeated requests.
    let view = harness.service.status(record.id).unwrap();
    assert_eq!(
        view.artifacts
            .iter()
            .filter(|a| a.format == ArtifactFormat::Vtt)
            .count(),
        1
    );
}

#[test]
fn many_jobs_complete_under_concurrent_workers() {
    let dir = tempfile::tempdir().unwrap();
    let harness = Harness::new(dir.path());

    let mut ids = Vec::new();
    for n in 0..6 {
        let wav = dir.path().join(format!("clip_{n}.wav"));
        write_wav(&wav, &vec![2000i16; 16_000]);
        write_sidecar(
            &wav,
            &format!(
                r#"{{"segments":[{{"start":0.0,"end":1.0,"text":"คลิปที่ {n}","confidence":0.9}}]}}"#
            ),
        );
        ids.push(
            harness
                .service
                .submit_path(&wav, JobOptions::default(), None)
                .unwrap()
                .id,
        );
    }

    let handle = harness.start();
    for id in &ids {
        let view = harness.wait_terminal(*id);
        assert_eq!(view.status, JobStatus::Finished, "{:?}", view.error_message);
    }
    handle.stop();

    // Every job ran exactly once; no duplicate artifact sets.
    for id in &ids {
        assert_eq!(harness.service.status(*id).unwrap().artifacts.len(), 4);
    }
}
