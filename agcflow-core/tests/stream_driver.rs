use std::path::PathBuf;

use agcflow_core::audio::wav::{WavSink, WavSource};
use agcflow_core::batch::process_wav_file;
use agcflow_core::stream::memory::{VecSink, VecSource};
use agcflow_core::{
    AgcError, GainConfig, Pipeline, PipelineConfig, SampleFormat, SampleSink, SampleSource,
    StreamDriver,
};
use approx::assert_relative_eq;

fn unity(rate: u32, channels: usize) -> PipelineConfig {
    PipelineConfig::new(rate, channels).with_gain(GainConfig {
        fixed_gain_db: 0.0,
        adaptive_enabled: false,
        vad_attack_probability: 1.0,
    })
}

fn ramp(len: usize) -> Vec<f32> {
    (0..len).map(|i| ((i % 200) as f32 - 100.0) / 400.0).collect()
}

fn temp_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("agcflow-driver-{}-{name}", std::process::id()))
}

#[test]
fn tail_is_zero_padded_and_trimmed() {
    let mut pipeline = Pipeline::new(unity(16_000, 1)).unwrap();
    let input = ramp(1_000);
    let mut source = VecSource::new(input.clone());
    let mut sink = VecSink::new();

    let report = StreamDriver::new(&mut pipeline)
        .run(&mut source, &mut sink)
        .unwrap();

    assert_eq!(report.chunks, 7);
    assert_eq!(report.samples_in, 1_000);
    assert_eq!(report.samples_out, 1_000);
    assert_eq!(report.padded_samples, 120);
    assert!(sink.is_finished());
    assert_eq!(sink.samples(), input.as_slice());
}

#[test]
fn short_reads_are_reassembled_into_chunks() {
    let input = ramp(48_000 / 100 * 2 * 5 + 17);

    let mut whole = Pipeline::new(PipelineConfig::new(48_000, 2)).unwrap();
    let mut expected = VecSink::new();
    StreamDriver::new(&mut whole)
        .run(&mut VecSource::new(input.clone()), &mut expected)
        .unwrap();

    let mut trickle = Pipeline::new(PipelineConfig::new(48_000, 2)).unwrap();
    let mut actual = VecSink::new();
    let report = StreamDriver::new(&mut trickle)
        .run(
            &mut VecSource::new(input.clone()).with_max_read(37),
            &mut actual,
        )
        .unwrap();

    assert_eq!(report.samples_out, input.len());
    assert_eq!(actual.samples(), expected.samples());
}

#[test]
fn empty_source_finishes_sink_without_chunks() {
    let mut pipeline = Pipeline::new(PipelineConfig::new(16_000, 1)).unwrap();
    let mut sink = VecSink::new();
    let report = StreamDriver::new(&mut pipeline)
        .run(&mut VecSource::new(Vec::new()), &mut sink)
        .unwrap();
    assert_eq!(report.chunks, 0);
    assert!(sink.samples().is_empty());
    assert!(sink.is_finished());
}

struct FailingSink {
    writes_before_failure: usize,
}

impl SampleSink for FailingSink {
    fn write(&mut self, _samples: &[f32]) -> agcflow_core::Result<()> {
        if self.writes_before_failure == 0 {
            return Err(AgcError::Io(std::io::Error::other("sink closed")));
        }
        self.writes_before_failure -= 1;
        Ok(())
    }
}

struct FailingSource;

impl SampleSource for FailingSource {
    fn read(&mut self, _buf: &mut [f32]) -> agcflow_core::Result<usize> {
        Err(AgcError::Io(std::io::Error::other("device unplugged")))
    }
}

#[test]
fn sink_errors_abort_the_run() {
    let mut pipeline = Pipeline::new(PipelineConfig::new(16_000, 1)).unwrap();
    let mut sink = FailingSink {
        writes_before_failure: 2,
    };
    let err = StreamDriver::new(&mut pipeline)
        .run(&mut VecSource::new(ramp(1_600)), &mut sink)
        .unwrap_err();
    assert!(matches!(err, AgcError::Io(_)));
    assert_eq!(pipeline.diagnostics().snapshot().chunks_processed, 3);
}

#[test]
fn source_errors_abort_the_run() {
    let mut pipeline = Pipeline::new(PipelineConfig::new(16_000, 1)).unwrap();
    let mut sink = VecSink::new();
    let err = StreamDriver::new(&mut pipeline)
        .run(&mut FailingSource, &mut sink)
        .unwrap_err();
    assert!(matches!(err, AgcError::Io(_)));
    assert!(!sink.is_finished());
}

#[test]
fn integer_scaled_stream_is_rescaled_on_the_way_out() {
    let mut cfg = PipelineConfig::new(16_000, 1).with_gain(GainConfig {
        fixed_gain_db: 6.0,
        adaptive_enabled: false,
        vad_attack_probability: 1.0,
    });
    cfg.sample_format = SampleFormat::IntegerScaled;
    let mut pipeline = Pipeline::new(cfg).unwrap();

    let mut sink = VecSink::new();
    StreamDriver::new(&mut pipeline)
        .run(&mut VecSource::new(vec![500.0; 800]), &mut sink)
        .unwrap();
    for &s in &sink.samples()[160..] {
        assert_relative_eq!(s, 997.63, max_relative = 1e-3);
    }
}

#[test]
fn wav_batch_at_unity_preserves_int16_samples() {
    let input = temp_path("in16.wav");
    let output = temp_path("out16.wav");

    let original: Vec<f32> = (0..3_333)
        .map(|i| ((i * 37) % 20_000) as f32 - 10_000.0)
        .collect();
    let mut sink = WavSink::create(&input, 16_000, 1, SampleFormat::IntegerScaled).unwrap();
    sink.write(&original).unwrap();
    sink.finish().unwrap();

    let report = process_wav_file(&input, &output, &unity(8_000, 4)).unwrap();
    assert_eq!(report.samples_out, original.len());
    assert_eq!(report.chunks, 21);

    let mut result = WavSource::open(&output).unwrap();
    assert_eq!(result.sample_rate(), 16_000);
    assert_eq!(result.channels(), 1);
    assert_eq!(result.sample_format(), SampleFormat::IntegerScaled);
    let mut samples = vec![0f32; original.len() + 10];
    let n = result.read(&mut samples).unwrap();
    assert_eq!(&samples[..n], original.as_slice());

    let _ = std::fs::remove_file(input);
    let _ = std::fs::remove_file(output);
}

#[test]
fn wav_batch_applies_gain_to_float_stereo() {
    let input = temp_path("in32.wav");
    let output = temp_path("out32.wav");

    let original = vec![0.05f32; 48_000 / 100 * 2 * 10];
    let mut sink = WavSink::create(&input, 48_000, 2, SampleFormat::UnitFloat).unwrap();
    sink.write(&original).unwrap();
    sink.finish().unwrap();

    let template = PipelineConfig::default().with_gain(GainConfig {
        fixed_gain_db: 6.0,
        adaptive_enabled: false,
        vad_attack_probability: 1.0,
    });
    process_wav_file(&input, &output, &template).unwrap();

    let mut result = WavSource::open(&output).unwrap();
    assert_eq!(result.sample_format(), SampleFormat::UnitFloat);
    assert_eq!(result.len(), original.len());
    let mut samples = vec![0f32; original.len()];
    result.read(&mut samples).unwrap();
    for &s in &samples {
        assert_relative_eq!(s, 0.05 * 1.9953, max_relative = 1e-3);
    }

    let _ = std::fs::remove_file(input);
    let _ = std::fs::remove_file(output);
}

#[test]
fn wav_batch_writes_debug_mirror_when_enabled() {
    let input = temp_path("mirror-in.wav");
    let output = temp_path("mirror-out.wav");
    let debug_dir = temp_path("mirror-dir");
    std::fs::create_dir_all(&debug_dir).unwrap();

    let original = ramp(1_600);
    let mut sink = WavSink::create(&input, 16_000, 1, SampleFormat::UnitFloat).unwrap();
    sink.write(&original).unwrap();
    sink.finish().unwrap();

    let mut template = unity(16_000, 1);
    template.debug_dir = Some(debug_dir.clone());
    template.debug_mirror = true;
    process_wav_file(&input, &output, &template).unwrap();

    for name in ["agcflow.in.wav", "agcflow.out.wav"] {
        let mut mirrored = WavSource::open(&debug_dir.join(name)).unwrap();
        assert_eq!(mirrored.len(), original.len());
        let mut samples = vec![0f32; original.len()];
        mirrored.read(&mut samples).unwrap();
        assert_eq!(samples, original);
    }

    let _ = std::fs::remove_file(input);
    let _ = std::fs::remove_file(output);
    let _ = std::fs::remove_dir_all(debug_dir);
}

#[test]
fn wav_batch_without_mirror_leaves_debug_dir_empty() {
    let input = temp_path("nomirror-in.wav");
    let output = temp_path("nomirror-out.wav");
    let debug_dir = temp_path("nomirror-dir");
    std::fs::create_dir_all(&debug_dir).unwrap();

    let mut sink = WavSink::create(&input, 16_000, 1, SampleFormat::UnitFloat).unwrap();
    sink.write(&ramp(320)).unwrap();
    sink.finish().unwrap();

    let mut template = unity(16_000, 1);
    template.debug_dir = Some(debug_dir.clone());
    process_wav_file(&input, &output, &template).unwrap();
    assert_eq!(std::fs::read_dir(&debug_dir).unwrap().count(), 0);

    let _ = std::fs::remove_file(input);
    let _ = std::fs::remove_file(output);
    let _ = std::fs::remove_dir_all(debug_dir);
}

#[test]
fn wav_batch_at_40khz_splits_and_reconstructs() {
    let input = temp_path("in40k.wav");
    let output = temp_path("out40k.wav");

    let original = ramp(40_000 / 100 * 8);
    let mut sink = WavSink::create(&input, 40_000, 1, SampleFormat::UnitFloat).unwrap();
    sink.write(&original).unwrap();
    sink.finish().unwrap();

    let report = process_wav_file(&input, &output, &unity(16_000, 1)).unwrap();
    assert_eq!(report.chunks, 8);

    let mut result = WavSource::open(&output).unwrap();
    let mut samples = vec![0f32; original.len()];
    result.read(&mut samples).unwrap();
    for (&out, &inp) in samples.iter().zip(&original) {
        assert_relative_eq!(out, inp, epsilon = 1e-4);
    }

    let _ = std::fs::remove_file(input);
    let _ = std::fs::remove_file(output);
}

#[test]
fn missing_wav_is_an_error() {
    let err = process_wav_file(
        &temp_path("does-not-exist.wav"),
        &temp_path("never-written.wav"),
        &PipelineConfig::default(),
    )
    .unwrap_err();
    assert!(matches!(err, AgcError::Wav(_)));
}
