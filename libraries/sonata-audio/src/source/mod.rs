//! Audio source implementations

mod file;
mod memory;

pub use file::FileSource;
pub use memory::MemorySource;

use sonata_core::PcmBuffer;

/// Copy frames starting at `frame_offset` from interleaved `samples`
fn copy_frames(samples: &[f32], channels: u16, frame_offset: u64, buffer: &mut PcmBuffer) -> usize {
    let ch = usize::from(channels);
    if ch == 0 {
        return 0;
    }
    let total = samples.len() / ch;
    let Ok(start) = usize::try_from(frame_offset) else {
        return 0;
    };
    if start >= total {
        return 0;
    }

    let frames = buffer.frames().min(total - start);
    let len = frames * ch;
    buffer.samples_mut()[..len].copy_from_slice(&samples[start * ch..start * ch + len]);
    frames
}
