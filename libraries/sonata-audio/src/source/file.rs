//! File-backed source decoded with Symphonia
//!
//! `open` decodes the whole file to interleaved `f32` at its native rate and
//! channel count; `close` drops the decoded samples. The engine reads the
//! remainder of a track in one block anyway, so there is no streaming state.

use sonata_core::{AudioFormat, AudioSource, MetadataFields, PcmBuffer, PlaybackError, Result};
use std::path::{Path, PathBuf};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::{MetadataOptions, MetadataRevision};
use symphonia::core::probe::Hint;
use tracing::{debug, warn};

struct Decoded {
    samples: Vec<f32>,
    format: AudioFormat,
    metadata: MetadataFields,
}

/// Audio file on disk
pub struct FileSource {
    path: PathBuf,
    decoded: Option<Decoded>,
    // Survive close so the engine can validate a re-open
    format: AudioFormat,
    total_frames: u64,
    metadata: MetadataFields,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            decoded: None,
            format: AudioFormat::new(0, 0),
            total_frames: 0,
            metadata: MetadataFields::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn decode(path: &Path) -> Result<Decoded> {
        if !path.exists() {
            return Err(PlaybackError::FileNotFound(path.display().to_string()));
        }

        let file = std::fs::File::open(path)?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        let mut probed = symphonia::default::get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| PlaybackError::invalid_format(format!("failed to probe file: {e}")))?;

        let mut metadata = MetadataFields::new();
        if let Some(log) = probed.metadata.get() {
            if let Some(revision) = log.current() {
                collect_tags(revision, &mut metadata);
            }
        }
        if let Some(revision) = probed.format.metadata().current() {
            collect_tags(revision, &mut metadata);
        }

        let mut reader = probed.format;
        let track = reader
            .default_track()
            .ok_or_else(|| PlaybackError::invalid_format("no audio tracks found"))?;
        let track_id = track.id;
        let sample_rate = track.codec_params.sample_rate.unwrap_or(0);
        let channels = track
            .codec_params
            .channels
            .map_or(0, |c| c.count() as u16);

        let mut decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|e| PlaybackError::invalid_format(format!("unsupported codec: {e}")))?;

        let mut samples = Vec::new();
        let mut channels = channels;
        let mut sample_rate = sample_rate;

        loop {
            let packet = match reader.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    break;
                }
                Err(SymphoniaError::ResetRequired) => break,
                Err(e) => {
                    return Err(PlaybackError::invalid_format(format!(
                        "error reading packet: {e}"
                    )))
                }
            };

            if packet.track_id() != track_id {
                continue;
            }

            let decoded = match decoder.decode(&packet) {
                Ok(decoded) => decoded,
                Err(SymphoniaError::DecodeError(e)) => {
                    // Corrupt packet; keep going
                    warn!(path = %path.display(), error = e, "Skipping undecodable packet");
                    continue;
                }
                Err(e) => {
                    return Err(PlaybackError::invalid_format(format!("decode error: {e}")));
                }
            };

            let spec = *decoded.spec();
            channels = spec.channels.count() as u16;
            sample_rate = spec.rate;

            let mut buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
            buffer.copy_interleaved_ref(decoded);
            samples.extend_from_slice(buffer.samples());
        }

        let format = AudioFormat::new(sample_rate, channels);
        if !format.is_valid() {
            return Err(PlaybackError::invalid_format(format!(
                "{} reports {format}",
                path.display()
            )));
        }

        debug!(
            path = %path.display(),
            %format,
            frames = samples.len() / usize::from(channels),
            "Decoded file"
        );

        Ok(Decoded {
            samples,
            format,
            metadata,
        })
    }
}

fn collect_tags(revision: &MetadataRevision, fields: &mut MetadataFields) {
    for tag in revision.tags() {
        let key = tag
            .std_key
            .map(|k| format!("{k:?}"))
            .unwrap_or_else(|| tag.key.clone());
        fields.insert(key, tag.value.to_string());
    }
}

impl AudioSource for FileSource {
    fn open(&mut self) -> Result<()> {
        if self.decoded.is_some() {
            return Ok(());
        }
        let decoded = Self::decode(&self.path)?;
        self.format = decoded.format;
        self.total_frames = (decoded.samples.len() / usize::from(decoded.format.channels)) as u64;
        self.metadata = decoded.metadata.clone();
        self.decoded = Some(decoded);
        Ok(())
    }

    fn close(&mut self) {
        self.decoded = None;
    }

    fn is_open(&self) -> bool {
        self.decoded.is_some()
    }

    fn format(&self) -> AudioFormat {
        self.format
    }

    fn total_frames(&self) -> u64 {
        self.total_frames
    }

    fn read(&mut self, frame_offset: u64, buffer: &mut PcmBuffer) -> Result<usize> {
        let decoded = self.decoded.as_ref().ok_or_else(|| {
            PlaybackError::InvalidState(format!("{} is not open", self.path.display()))
        })?;
        Ok(super::copy_frames(
            &decoded.samples,
            decoded.format.channels,
            frame_offset,
            buffer,
        ))
    }

    fn metadata(&self) -> MetadataFields {
        self.metadata.clone()
    }
}
