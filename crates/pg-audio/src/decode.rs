use std::fs::File;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{Decoder, DecoderOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::{MediaSourceStream, MediaSourceStreamOptions};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::error::CaptureError;

/// Décodeur de fichier audio en flux mono, paquet par paquet.
///
/// Lets the file backend stream a track of any length without holding the
/// whole decoded signal in memory. Errors are already [`CaptureError`]s: a
/// missing file is `DeviceUnavailable`, anything the container or codec
/// rejects is `BackendError`.
///
/// # Example
/// ```no_run
/// use pg_audio::decode::MonoDecoder;
///
/// let mut decoder = MonoDecoder::open("track.flac").unwrap();
/// let mut samples = Vec::new();
/// while decoder.next_block(&mut samples).unwrap() {}
/// println!("{} samples @ {}Hz", samples.len(), decoder.sample_rate());
/// ```
pub struct MonoDecoder {
    path: PathBuf,
    format: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    sample_rate: u32,
    scratch: Option<SampleBuffer<f32>>,
}

impl MonoDecoder {
    /// Probe `path` and prepare a decoder for its default track.
    ///
    /// # Errors
    /// `DeviceUnavailable` if the file does not exist, `BackendError` if it
    /// cannot be read, probed, or has no decodable track.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, CaptureError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => {
                CaptureError::DeviceUnavailable(format!("fichier introuvable : {}", path.display()))
            }
            _ => CaptureError::BackendError(format!("{} : {e}", path.display())),
        })?;
        let mss = MediaSourceStream::new(Box::new(file), MediaSourceStreamOptions::default());

        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| backend_error(path, "format non reconnu", &e))?;
        let format = probed.format;

        let track = format.default_track().ok_or_else(|| {
            CaptureError::BackendError(format!("aucune piste audio : {}", path.display()))
        })?;
        let sample_rate = track.codec_params.sample_rate.filter(|&r| r > 0).ok_or_else(|| {
            CaptureError::BackendError(format!(
                "fréquence d'échantillonnage inconnue : {}",
                path.display()
            ))
        })?;
        let track_id = track.id;
        let decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|e| backend_error(path, "codec non supporté", &e))?;

        Ok(Self {
            path: path.to_path_buf(),
            format,
            decoder,
            track_id,
            sample_rate,
            scratch: None,
        })
    }

    /// Native sample rate of the track.
    #[must_use]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Decode the next packet and append its down-mixed samples to `out`.
    ///
    /// Returns `false` at end of stream. Corrupt packets are skipped with a
    /// warning.
    ///
    /// # Errors
    /// `BackendError` if the container stops being readable mid-stream.
    pub fn next_block(&mut self, out: &mut Vec<f32>) -> Result<bool, CaptureError> {
        loop {
            let packet = match self.format.next_packet() {
                Ok(p) => p,
                Err(SymphoniaError::IoError(ref e)) if e.kind() == ErrorKind::UnexpectedEof => {
                    return Ok(false);
                }
                Err(e) => return Err(backend_error(&self.path, "lecture interrompue", &e)),
            };
            if packet.track_id() != self.track_id {
                continue;
            }

            let decoded = match self.decoder.decode(&packet) {
                Ok(d) => d,
                Err(SymphoniaError::DecodeError(e)) => {
                    log::warn!("Paquet audio ignoré ({}) : {e}", self.path.display());
                    continue;
                }
                Err(e) => return Err(backend_error(&self.path, "décodage impossible", &e)),
            };

            let spec = *decoded.spec();
            let channels = spec.channels.count();
            let needed = decoded.capacity() * channels.max(1);
            if self.scratch.as_ref().is_none_or(|b| b.capacity() < needed) {
                self.scratch = Some(SampleBuffer::new(decoded.capacity() as u64, spec));
            }
            let Some(buf) = self.scratch.as_mut() else {
                continue;
            };
            buf.copy_interleaved_ref(decoded);
            downmix_into(out, buf.samples(), channels);
            return Ok(true);
        }
    }

    /// Reopen the file and start again from its first packet.
    ///
    /// # Errors
    /// Same as [`open`](Self::open).
    pub fn rewind(&mut self) -> Result<(), CaptureError> {
        *self = Self::open(&self.path)?;
        Ok(())
    }
}

/// Decode a whole file to mono samples at its native rate.
///
/// # Errors
/// Same as [`MonoDecoder::open`] and [`MonoDecoder::next_block`].
pub fn decode_file(path: impl AsRef<Path>) -> Result<(Vec<f32>, u32), CaptureError> {
    let mut decoder = MonoDecoder::open(path)?;
    let mut samples = Vec::new();
    while decoder.next_block(&mut samples)? {}
    Ok((samples, decoder.sample_rate()))
}

/// Average each interleaved group of `channels` samples into one.
///
/// A zero channel count is treated as mono.
pub(crate) fn downmix_into(out: &mut Vec<f32>, interleaved: &[f32], channels: usize) {
    let channels = channels.max(1);
    out.reserve(interleaved.len() / channels);
    out.extend(
        interleaved
            .chunks(channels)
            .map(|group| group.iter().sum::<f32>() / group.len() as f32),
    );
}

fn backend_error(path: &Path, what: &str, err: &SymphoniaError) -> CaptureError {
    CaptureError::BackendError(format!("{what} ({}) : {err}", path.display()))
}
