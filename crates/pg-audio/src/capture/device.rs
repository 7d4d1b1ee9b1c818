use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, Sample, SampleFormat, SizedSample};

use crate::capture::{ActiveCapture, CaptureBackend, CaptureConfig};
use crate::channel::FrameSink;
use crate::error::CaptureError;

/// Audio capture via cpal, default input device of the default host.
///
/// Native channel count is down-mixed to mono inside the callback. The
/// requested sample rate is used when the device supports it, otherwise the
/// device default; frames carry the rate actually delivered.
#[derive(Clone, Copy, Debug, Default)]
pub struct CpalBackend;

struct CpalCapture {
    _stream: cpal::Stream,
    sample_rate: u32,
}

impl ActiveCapture for CpalCapture {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

impl CaptureBackend for CpalBackend {
    fn name(&self) -> &'static str {
        "cpal"
    }

    fn open(
        &self,
        config: &CaptureConfig,
        mut sink: FrameSink,
    ) -> Result<Box<dyn ActiveCapture>, CaptureError> {
        let host = cpal::default_host();
        let device = host.default_input_device().ok_or_else(|| {
            CaptureError::DeviceUnavailable(format!(
                "pas de périphérique d'entrée sur l'hôte {:?}",
                host.id()
            ))
        })?;
        if let Ok(name) = device.name() {
            log::debug!("Périphérique d'entrée : {name}");
        }

        let supported = pick_config(&device, config.sample_rate)?;
        let sample_format = supported.sample_format();
        let stream_config: cpal::StreamConfig = supported.into();
        let sample_rate = stream_config.sample_rate.0;
        if sample_rate != config.sample_rate {
            log::warn!(
                "{}Hz non supporté par le périphérique, capture @ {sample_rate}Hz",
                config.sample_rate
            );
        }
        sink.set_sample_rate(sample_rate);

        let stream = match sample_format {
            SampleFormat::F32 => build_stream::<f32>(&device, &stream_config, sink),
            SampleFormat::I16 => build_stream::<i16>(&device, &stream_config, sink),
            SampleFormat::U16 => build_stream::<u16>(&device, &stream_config, sink),
            SampleFormat::I32 => build_stream::<i32>(&device, &stream_config, sink),
            other => {
                return Err(CaptureError::BackendError(format!(
                    "format d'échantillon non supporté : {other:?}"
                )));
            }
        }
        .map_err(|e| match e {
            cpal::BuildStreamError::DeviceNotAvailable => {
                CaptureError::DeviceUnavailable(e.to_string())
            }
            other => CaptureError::BackendError(other.to_string()),
        })?;

        stream
            .play()
            .map_err(|e| CaptureError::BackendError(e.to_string()))?;

        Ok(Box::new(CpalCapture {
            _stream: stream,
            sample_rate,
        }))
    }
}

/// Prefer a config at the requested rate, fall back to the device default.
fn pick_config(
    device: &cpal::Device,
    sample_rate: u32,
) -> Result<cpal::SupportedStreamConfig, CaptureError> {
    let wanted = cpal::SampleRate(sample_rate);
    if let Ok(ranges) = device.supported_input_configs() {
        let mut candidates: Vec<_> = ranges
            .filter(|r| r.min_sample_rate() <= wanted && wanted <= r.max_sample_rate())
            .collect();
        // f32 first, then fewest channels
        candidates.sort_by_key(|r| (r.sample_format() != SampleFormat::F32, r.channels()));
        if let Some(range) = candidates.into_iter().next() {
            return Ok(range.with_sample_rate(wanted));
        }
    }

    device.default_input_config().map_err(|e| match e {
        cpal::DefaultStreamConfigError::DeviceNotAvailable => {
            CaptureError::DeviceUnavailable(e.to_string())
        }
        other => CaptureError::BackendError(other.to_string()),
    })
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mut sink: FrameSink,
) -> Result<cpal::Stream, cpal::BuildStreamError>
where
    T: SizedSample + Send + 'static,
    f32: FromSample<T>,
{
    let channels = usize::from(config.channels);
    device.build_input_stream(
        config,
        move |data: &[T], _: &cpal::InputCallbackInfo| {
            sink.push_interleaved_with(data, channels, |s: T| s.to_sample::<f32>());
        },
        |err| {
            log::error!("Audio stream error: {err}");
        },
        None,
    )
}
