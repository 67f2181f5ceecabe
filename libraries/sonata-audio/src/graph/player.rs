use sonata_core::PcmBuffer;

/// One-shot callback fired when a scheduled buffer has been fully rendered
pub type CompletionCallback = Box<dyn FnOnce() + Send>;

/// Source node: plays one scheduled buffer and exposes the render clock
///
/// The render clock (`frames_rendered`) counts frames output since the node
/// was last stopped. Pausing holds it; stopping resets it.
#[derive(Default)]
pub(crate) struct PlayerNode {
    buffer: PcmBuffer,
    cursor: usize,
    completion: Option<CompletionCallback>,
    frames_rendered: u64,
    playing: bool,
}

impl PlayerNode {
    /// Replace the pending buffer; a previous completion is dropped unfired
    pub(crate) fn schedule(&mut self, buffer: PcmBuffer, completion: CompletionCallback) {
        self.buffer = buffer;
        self.cursor = 0;
        self.completion = Some(completion);
    }

    pub(crate) fn play(&mut self) {
        self.playing = true;
    }

    pub(crate) fn pause(&mut self) {
        self.playing = false;
    }

    pub(crate) fn stop(&mut self) {
        self.playing = false;
        self.buffer = PcmBuffer::default();
        self.cursor = 0;
        self.completion = None;
        self.frames_rendered = 0;
    }

    fn remaining(&self) -> usize {
        self.buffer.frames().saturating_sub(self.cursor)
    }

    /// Started and still has frames to output
    pub(crate) fn is_playing(&self) -> bool {
        self.playing && self.remaining() > 0
    }

    /// Render clock, available only while the node is started
    pub(crate) fn sample_time(&self) -> Option<u64> {
        self.playing.then_some(self.frames_rendered)
    }

    /// Fill `out` (interleaved, `channels` wide) and advance the clock
    ///
    /// Returns the completion callback when this call consumed the last
    /// frame; the caller fires it outside any lock.
    pub(crate) fn render(
        &mut self,
        out: &mut [f32],
        channels: usize,
    ) -> Option<CompletionCallback> {
        if !self.playing || channels == 0 {
            out.fill(0.0);
            return None;
        }

        let wanted = out.len() / channels;
        let frames = wanted.min(self.remaining());
        let start = self.cursor * channels;
        let len = frames * channels;

        out[..len].copy_from_slice(&self.buffer.samples()[start..start + len]);
        out[len..].fill(0.0);

        self.cursor += frames;
        self.frames_rendered += frames as u64;

        if frames > 0 && self.remaining() == 0 {
            return self.completion.take();
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counting_completion(counter: &Arc<AtomicUsize>) -> CompletionCallback {
        let counter = Arc::clone(counter);
        Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn test_renders_then_completes_once() {
        let fired = Arc::new(AtomicUsize::new(0));
        let mut player = PlayerNode::default();
        player.schedule(
            PcmBuffer::from_interleaved(1, vec![0.1, 0.2, 0.3]),
            counting_completion(&fired),
        );
        player.play();

        let mut out = [0.0; 2];
        assert!(player.render(&mut out, 1).is_none());
        assert_eq!(out, [0.1, 0.2]);

        let done = player.render(&mut out, 1);
        assert_eq!(out, [0.3, 0.0]);
        done.expect("last frame returns the completion")();

        assert!(player.render(&mut out, 1).is_none());
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(player.sample_time(), Some(3));
        assert!(!player.is_playing());
    }

    #[test]
    fn test_paused_holds_clock() {
        let mut player = PlayerNode::default();
        player.schedule(PcmBuffer::new(2, 10), Box::new(|| {}));
        player.play();

        let mut out = [1.0; 8];
        player.render(&mut out, 2);
        player.pause();
        assert_eq!(player.sample_time(), None);

        player.render(&mut out, 2);
        assert!(out.iter().all(|s| *s == 0.0));

        player.play();
        assert_eq!(player.sample_time(), Some(4));
    }

    #[test]
    fn test_stop_drops_completion_and_resets_clock() {
        let fired = Arc::new(AtomicUsize::new(0));
        let mut player = PlayerNode::default();
        player.schedule(PcmBuffer::new(1, 4), counting_completion(&fired));
        player.play();
        let mut out = [0.0; 2];
        player.render(&mut out, 1);

        player.stop();
        player.play();
        assert_eq!(player.sample_time(), Some(0));
        assert!(player.render(&mut out, 1).is_none());
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }
}
