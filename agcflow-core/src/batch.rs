//! File-based batch mode: WAV in, WAV out.

use std::path::Path;
use std::time::Instant;

use tracing::info;

use crate::audio::wav::{WavSink, WavSource};
use crate::diagnostics::DebugMirror;
use crate::error::Result;
use crate::pipeline::{Pipeline, PipelineConfig};
use crate::stream::{StreamDriver, StreamReport};

/// Run a pipeline over a whole WAV file.
///
/// Sample rate, channel count and sample format come from the input header;
/// everything else (gain settings, band split override, debug dir) comes from
/// `template`. The output file has the same header shape as the input. With
/// `template.debug_mirror` set, the pipeline's input and output are also
/// written to WAV files in the debug dir.
pub fn process_wav_file(
    input: &Path,
    output: &Path,
    template: &PipelineConfig,
) -> Result<StreamReport> {
    let started = Instant::now();
    let mut source = WavSource::open(input)?;

    let config = PipelineConfig {
        sample_rate_hz: source.sample_rate(),
        channel_count: source.channels(),
        sample_format: source.sample_format(),
        ..template.clone()
    };
    info!(
        input = %input.display(),
        output = %output.display(),
        sample_rate_hz = config.sample_rate_hz,
        channels = config.channel_count,
        samples = source.len(),
        "batch started"
    );

    let mirror = config.debug_mirror;
    let mut pipeline = Pipeline::new(config)?;
    let stream = pipeline.stream();
    let mut sink = WavSink::create(
        output,
        stream.sample_rate_hz,
        stream.channel_count,
        pipeline.sample_format(),
    )?;

    if mirror {
        let debug = DebugMirror::wav(
            pipeline.debug_dir(),
            pipeline.geometry(),
            pipeline.sample_format(),
        );
        if debug.is_active() {
            info!(dir = %pipeline.debug_dir().display(), "debug mirror on");
        }
        pipeline.set_debug_mirror(Some(debug))?;
    }

    let report = StreamDriver::new(&mut pipeline).run(&mut source, &mut sink)?;
    // Finishes the mirror files too.
    pipeline.close();

    info!(
        chunks = report.chunks,
        padded = report.padded_samples,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "batch finished"
    );
    Ok(report)
}
