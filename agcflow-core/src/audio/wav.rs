//! WAV container source and sink backed by `hound`.
//!
//! Two layouts are supported, one per [`SampleFormat`]:
//!
//! | WAV layout | Samples delivered as |
//! |------------|----------------------|
//! | 16-bit integer PCM | `IntegerScaled` (`i16` widened to `f32`) |
//! | 32-bit IEEE float | `UnitFloat` |
//!
//! Anything else is rejected with `UnsupportedWav`.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use hound::{WavReader, WavSpec, WavWriter};

use super::convert::{float_s16_to_unit, unit_to_s16};
use super::SampleFormat;
use crate::error::{AgcError, Result};
use crate::stream::{SampleSink, SampleSource};

fn format_of(spec: &WavSpec) -> Result<SampleFormat> {
    match (spec.sample_format, spec.bits_per_sample) {
        (hound::SampleFormat::Int, 16) => Ok(SampleFormat::IntegerScaled),
        (hound::SampleFormat::Float, 32) => Ok(SampleFormat::UnitFloat),
        (fmt, bits) => Err(AgcError::UnsupportedWav(format!("{bits}-bit {fmt:?}"))),
    }
}

fn spec_for(sample_rate_hz: u32, channels: usize, format: SampleFormat) -> Result<WavSpec> {
    let channels = u16::try_from(channels)
        .map_err(|_| AgcError::UnsupportedWav(format!("{channels} channels")))?;
    let (bits_per_sample, sample_format) = match format {
        SampleFormat::IntegerScaled => (16, hound::SampleFormat::Int),
        SampleFormat::UnitFloat => (32, hound::SampleFormat::Float),
    };
    Ok(WavSpec {
        channels,
        sample_rate: sample_rate_hz,
        bits_per_sample,
        sample_format,
    })
}

/// Reads interleaved samples from a WAV file.
pub struct WavSource {
    reader: WavReader<BufReader<File>>,
    format: SampleFormat,
}

impl WavSource {
    /// # Errors
    /// `Wav` if the file cannot be parsed, `UnsupportedWav` for other layouts.
    pub fn open(path: &Path) -> Result<Self> {
        let reader = WavReader::open(path)?;
        let format = format_of(&reader.spec())?;
        Ok(Self { reader, format })
    }

    pub fn sample_rate(&self) -> u32 {
        self.reader.spec().sample_rate
    }

    pub fn channels(&self) -> usize {
        usize::from(self.reader.spec().channels)
    }

    pub fn sample_format(&self) -> SampleFormat {
        self.format
    }

    /// Total interleaved samples in the file.
    pub fn len(&self) -> usize {
        self.reader.len() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.reader.len() == 0
    }
}

impl SampleSource for WavSource {
    fn read(&mut self, buf: &mut [f32]) -> Result<usize> {
        let mut n = 0;
        match self.format {
            SampleFormat::IntegerScaled => {
                for (slot, sample) in buf.iter_mut().zip(self.reader.samples::<i16>()) {
                    *slot = sample? as f32;
                    n += 1;
                }
            }
            SampleFormat::UnitFloat => {
                for (slot, sample) in buf.iter_mut().zip(self.reader.samples::<f32>()) {
                    *slot = sample?;
                    n += 1;
                }
            }
        }
        Ok(n)
    }
}

/// Writes interleaved samples to a WAV file.
///
/// `IntegerScaled` input is rounded and saturated to 16-bit on write.
pub struct WavSink {
    writer: Option<WavWriter<BufWriter<File>>>,
    format: SampleFormat,
}

impl WavSink {
    /// # Errors
    /// `Wav` if the file cannot be created, `UnsupportedWav` for more than
    /// 65535 channels.
    pub fn create(
        path: &Path,
        sample_rate_hz: u32,
        channels: usize,
        format: SampleFormat,
    ) -> Result<Self> {
        let spec = spec_for(sample_rate_hz, channels, format)?;
        let writer = WavWriter::create(path, spec)?;
        Ok(Self {
            writer: Some(writer),
            format,
        })
    }
}

impl SampleSink for WavSink {
    fn write(&mut self, samples: &[f32]) -> Result<()> {
        let writer = self.writer.as_mut().ok_or_else(|| {
            AgcError::Io(std::io::Error::other("WAV sink already finalized"))
        })?;
        match self.format {
            SampleFormat::IntegerScaled => {
                for &s in samples {
                    writer.write_sample(unit_to_s16(float_s16_to_unit(s)))?;
                }
            }
            SampleFormat::UnitFloat => {
                for &s in samples {
                    writer.write_sample(s)?;
                }
            }
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        if let Some(writer) = self.writer.take() {
            writer.finalize()?;
        }
        Ok(())
    }
}
