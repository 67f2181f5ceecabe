use sonata_core::{
    AudioFormat, AudioSource, MetadataFields, PcmBuffer, PlaybackError, Result,
};
use std::sync::Arc;

/// Already-decoded PCM held in memory
///
/// Samples are shared, so closing and re-opening is free.
#[derive(Debug, Clone)]
pub struct MemorySource {
    samples: Arc<Vec<f32>>,
    format: AudioFormat,
    metadata: MetadataFields,
    open: bool,
}

impl MemorySource {
    /// Wrap interleaved samples; a trailing partial frame is ignored
    pub fn new(format: AudioFormat, samples: Vec<f32>) -> Self {
        Self {
            samples: Arc::new(samples),
            format,
            metadata: MetadataFields::new(),
            open: false,
        }
    }

    /// `seconds` of silence
    pub fn silence(format: AudioFormat, seconds: f64) -> Self {
        let frames = format.frame_at(seconds) as usize;
        Self::new(format, vec![0.0; frames * usize::from(format.channels)])
    }

    pub fn with_metadata(mut self, metadata: MetadataFields) -> Self {
        self.metadata = metadata;
        self
    }
}

impl AudioSource for MemorySource {
    fn open(&mut self) -> Result<()> {
        if !self.format.is_valid() {
            return Err(PlaybackError::invalid_format(format!(
                "memory source has unusable format {}",
                self.format
            )));
        }
        self.open = true;
        Ok(())
    }

    fn close(&mut self) {
        self.open = false;
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn format(&self) -> AudioFormat {
        self.format
    }

    fn total_frames(&self) -> u64 {
        if self.format.channels == 0 {
            return 0;
        }
        (self.samples.len() / usize::from(self.format.channels)) as u64
    }

    fn read(&mut self, frame_offset: u64, buffer: &mut PcmBuffer) -> Result<usize> {
        if !self.open {
            return Err(PlaybackError::InvalidState("memory source is closed".into()));
        }
        Ok(super::copy_frames(
            &self.samples,
            self.format.channels,
            frame_offset,
            buffer,
        ))
    }

    fn metadata(&self) -> MetadataFields {
        self.metadata.clone()
    }
}
