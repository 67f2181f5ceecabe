//! CPAL output device
//!
//! `cpal::Stream` is not `Send` on every platform, so a dedicated device
//! thread owns it. The control side talks to that thread over a channel and
//! waits for replies where the result matters.

use super::{ErrorSink, OutputDevice};
use crate::graph::Renderer;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BufferSize, Device, Stream, StreamConfig};
use crossbeam_channel::{bounded, Receiver, Sender};
use sonata_core::{AudioFormat, PlaybackError, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, error, warn};

/// Commands sent to the device thread
enum DeviceCommand {
    Connect {
        format: AudioFormat,
        renderer: Renderer,
        errors: ErrorSink,
        reply: Sender<Result<AudioFormat>>,
    },
    Start {
        reply: Sender<Result<()>>,
    },
    Stop,
    Disconnect,
    Shutdown,
}

/// Default output device of the default host
pub struct CpalOutput {
    commands: Sender<DeviceCommand>,
    running: Arc<AtomicBool>,
    name: String,
    thread: Option<JoinHandle<()>>,
}

impl CpalOutput {
    /// Open the default output device
    ///
    /// # Errors
    /// `Node` if the host has no output device
    pub fn new() -> Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| PlaybackError::node("no default output device"))?;
        let name = device.name().unwrap_or_else(|_| "default".to_string());

        let (commands, command_rx) = bounded::<DeviceCommand>(16);
        let running = Arc::new(AtomicBool::new(false));
        let thread_running = Arc::clone(&running);

        let thread = thread::Builder::new()
            .name("sonata-output".to_string())
            .spawn(move || Self::device_thread(device, command_rx, thread_running))?;

        Ok(Self {
            commands,
            running,
            name,
            thread: Some(thread),
        })
    }

    fn device_thread(device: Device, commands: Receiver<DeviceCommand>, running: Arc<AtomicBool>) {
        let mut stream: Option<Stream> = None;

        while let Ok(command) = commands.recv() {
            match command {
                DeviceCommand::Connect {
                    format,
                    renderer,
                    errors,
                    reply,
                } => {
                    stream = None;
                    running.store(false, Ordering::SeqCst);
                    let result = Self::build_stream(&device, format, renderer, errors).map(
                        |(built, device_format)| {
                            stream = Some(built);
                            device_format
                        },
                    );
                    let _ = reply.send(result);
                }
                DeviceCommand::Start { reply } => {
                    let result = match &stream {
                        Some(s) => s.play().map_err(|e| PlaybackError::engine(e.to_string())),
                        None => Err(PlaybackError::node("output stream is not connected")),
                    };
                    running.store(result.is_ok(), Ordering::SeqCst);
                    let _ = reply.send(result);
                }
                DeviceCommand::Stop => {
                    if let Some(s) = &stream {
                        if let Err(e) = s.pause() {
                            warn!(error = %e, "Failed to pause output stream");
                        }
                    }
                    running.store(false, Ordering::SeqCst);
                }
                DeviceCommand::Disconnect => {
                    stream = None;
                    running.store(false, Ordering::SeqCst);
                }
                DeviceCommand::Shutdown => break,
            }
        }
        debug!("Output device thread exiting");
    }

    fn build_stream(
        device: &Device,
        format: AudioFormat,
        renderer: Renderer,
        errors: ErrorSink,
    ) -> Result<(Stream, AudioFormat)> {
        let default_config = device
            .default_output_config()
            .map_err(|e| PlaybackError::node(format!("no output config: {e}")))?;
        let channels = default_config.channels();

        // Run at the source rate; the mixer maps channels onto the device layout
        let config = StreamConfig {
            channels,
            sample_rate: format.sample_rate,
            buffer_size: BufferSize::Default,
        };

        let stream = device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    renderer.render(data, channels);
                },
                move |err| {
                    error!(error = %err, "Output stream error");
                    errors(err.to_string());
                },
                None,
            )
            .map_err(|e| PlaybackError::node(format!("failed to build output stream: {e}")))?;

        // Some hosts start streams on creation
        let _ = stream.pause();

        Ok((stream, AudioFormat::new(format.sample_rate, channels)))
    }

    fn request<T>(&self, make: impl FnOnce(Sender<Result<T>>) -> DeviceCommand) -> Result<T> {
        let (reply, response) = bounded(1);
        self.commands
            .send(make(reply))
            .map_err(|_| PlaybackError::engine("output device thread is gone"))?;
        response
            .recv()
            .map_err(|_| PlaybackError::engine("output device thread is gone"))?
    }
}

impl OutputDevice for CpalOutput {
    fn connect(
        &mut self,
        format: AudioFormat,
        renderer: Renderer,
        errors: ErrorSink,
    ) -> Result<AudioFormat> {
        self.request(|reply| DeviceCommand::Connect {
            format,
            renderer,
            errors,
            reply,
        })
    }

    fn disconnect(&mut self) {
        let _ = self.commands.send(DeviceCommand::Disconnect);
    }

    fn start(&mut self) -> Result<()> {
        self.request(|reply| DeviceCommand::Start { reply })
    }

    fn stop(&mut self) {
        let _ = self.commands.send(DeviceCommand::Stop);
        self.running.store(false, Ordering::SeqCst);
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for CpalOutput {
    fn drop(&mut self) {
        let _ = self.commands.send(DeviceCommand::Shutdown);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}
