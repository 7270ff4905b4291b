//! Audio output using cpal
//!
//! A dedicated audio thread owns the cpal stream (the persistent sink). The
//! stream callback pulls from the shared [`Mixer`]; everything else talks to
//! the thread through a command channel.
//!
//! Device selection by name falls back to the default device when the
//! requested one cannot be found.

use crate::audio::backend::{AudioBackend, EndCallback, SourceId};
use crate::audio::mixer::Mixer;
use crate::audio::resampler::Resampler;
use crate::audio::SampleBuffer;
use crate::error::{Error, Result};
use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, FromSample, Sample, SampleFormat, SizedSample, Stream, StreamConfig};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

/// Commands handled by the audio thread
enum StreamCommand {
    Pause(oneshot::Sender<Result<()>>),
    Play(oneshot::Sender<Result<()>>),
    Close,
}

/// Device facts reported back once the stream is running
struct StreamInfo {
    device_name: String,
    sample_rate: u32,
    channels: u16,
}

fn lock_mixer(mixer: &Mutex<Mixer>) -> MutexGuard<'_, Mixer> {
    mixer.lock().unwrap_or_else(PoisonError::into_inner)
}

/// cpal-backed output graph
pub struct CpalOutput {
    mixer: Arc<Mutex<Mixer>>,
    commands: Mutex<mpsc::Sender<StreamCommand>>,
    suspended: AtomicBool,
    closed: AtomicBool,
    device_name: String,
    sample_rate: u32,
    channels: u16,
}

impl CpalOutput {
    /// Open the output device and start the persistent stream.
    ///
    /// # Arguments
    /// - `device_name`: Optional device name (None = default device)
    /// - `volume`: Master gain for the mixing node
    ///
    /// # Errors
    /// - Device not found and default device unavailable
    /// - Stream could not be built or started
    pub fn open(device_name: Option<String>, volume: f32) -> Result<Self> {
        let mixer = Arc::new(Mutex::new(Mixer::new(volume)));
        let (command_tx, command_rx) = mpsc::channel::<StreamCommand>();
        let (ready_tx, ready_rx) = mpsc::channel::<Result<StreamInfo>>();

        let thread_mixer = Arc::clone(&mixer);
        std::thread::Builder::new()
            .name("chaptercast-audio".to_string())
            .spawn(move || audio_thread(device_name, thread_mixer, command_rx, ready_tx))
            .map_err(|e| Error::AudioOutput(format!("Failed to spawn audio thread: {}", e)))?;

        let info = ready_rx
            .recv()
            .map_err(|_| Error::AudioOutput("Audio thread exited during startup".to_string()))??;

        info!(
            "Audio output ready: device={}, sample_rate={}, channels={}",
            info.device_name, info.sample_rate, info.channels
        );

        Ok(Self {
            mixer,
            commands: Mutex::new(command_tx),
            suspended: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            device_name: info.device_name,
            sample_rate: info.sample_rate,
            channels: info.channels,
        })
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    fn send(&self, command: StreamCommand) -> Result<()> {
        self.commands
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .send(command)
            .map_err(|_| Error::AudioOutput("Audio thread is not running".to_string()))
    }

    async fn round_trip(
        &self,
        make: impl FnOnce(oneshot::Sender<Result<()>>) -> StreamCommand,
    ) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.send(make(tx))?;
        rx.await
            .map_err(|_| Error::AudioOutput("Audio thread dropped the request".to_string()))?
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::AudioOutput("Output is closed".to_string()));
        }
        Ok(())
    }
}

/// Downmix interleaved audio to mono
fn to_mono(buffer: &SampleBuffer) -> Vec<f32> {
    let channels = buffer.channel_count.max(1) as usize;
    if channels == 1 {
        return buffer.samples.clone();
    }
    buffer
        .samples
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

/// True when `buffer` can go to the mixer without conversion
fn matches_device(buffer: &SampleBuffer, device_rate: u32) -> bool {
    buffer.channel_count == 1 && buffer.sample_rate == device_rate
}

/// Downmix and resample `buffer` to mono at `device_rate`
fn conform(buffer: &SampleBuffer, device_rate: u32) -> Result<SampleBuffer> {
    let mono = to_mono(buffer);
    let samples = Resampler::resample(&mono, buffer.sample_rate, device_rate)?;
    Ok(SampleBuffer::mono(samples, device_rate))
}

#[async_trait]
impl AudioBackend for CpalOutput {
    async fn prepare(&self, buffer: Arc<SampleBuffer>) -> Result<Arc<SampleBuffer>> {
        if matches_device(&buffer, self.sample_rate) {
            return Ok(buffer);
        }
        let device_rate = self.sample_rate;
        let converted = tokio::task::spawn_blocking(move || conform(&buffer, device_rate))
            .await
            .map_err(|e| Error::AudioOutput(format!("Resample task failed: {}", e)))??;
        Ok(Arc::new(converted))
    }

    fn create_source(&self, buffer: Arc<SampleBuffer>) -> Result<SourceId> {
        self.ensure_open()?;

        let samples = if matches_device(&buffer, self.sample_rate) {
            buffer.samples.clone()
        } else {
            warn!("Source was not prepared for the device, converting inline");
            conform(&buffer, self.sample_rate)?.samples
        };
        let id = lock_mixer(&self.mixer).add_source(samples);

        debug!(
            source_id = id,
            duration_ms = buffer.duration_ms(),
            "Created output source"
        );
        Ok(id)
    }

    fn connect(&self, id: SourceId) -> Result<()> {
        lock_mixer(&self.mixer).connect(id)
    }

    fn on_natural_end(&self, id: SourceId, callback: EndCallback) -> Result<()> {
        lock_mixer(&self.mixer).set_end_callback(id, callback)
    }

    fn start(&self, id: SourceId) -> Result<()> {
        lock_mixer(&self.mixer).start(id)
    }

    fn stop(&self, id: SourceId) {
        if lock_mixer(&self.mixer).remove(id) {
            debug!(source_id = id, "Stopped output source");
        }
    }

    async fn suspend(&self) -> Result<()> {
        self.ensure_open()?;
        self.round_trip(StreamCommand::Pause).await?;
        self.suspended.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn resume(&self) -> Result<()> {
        self.ensure_open()?;
        self.round_trip(StreamCommand::Play).await?;
        self.suspended.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_suspended(&self) -> bool {
        self.suspended.load(Ordering::SeqCst)
    }

    async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        lock_mixer(&self.mixer).clear();
        // Thread may already be gone; nothing left to tear down then
        let _ = self.send(StreamCommand::Close);
        info!("Audio output closed");
        Ok(())
    }
}

impl Drop for CpalOutput {
    fn drop(&mut self) {
        let _ = self.send(StreamCommand::Close);
    }
}

/// Audio thread body: owns the stream until Close or channel hang-up
fn audio_thread(
    device_name: Option<String>,
    mixer: Arc<Mutex<Mixer>>,
    commands: mpsc::Receiver<StreamCommand>,
    ready: mpsc::Sender<Result<StreamInfo>>,
) {
    let stream = match open_stream(device_name, mixer) {
        Ok((stream, info)) => {
            let _ = ready.send(Ok(info));
            stream
        }
        Err(e) => {
            let _ = ready.send(Err(e));
            return;
        }
    };

    while let Ok(command) = commands.recv() {
        match command {
            StreamCommand::Pause(reply) => {
                let result = stream
                    .pause()
                    .map_err(|e| Error::AudioOutput(format!("Failed to pause stream: {}", e)));
                let _ = reply.send(result);
            }
            StreamCommand::Play(reply) => {
                let result = stream
                    .play()
                    .map_err(|e| Error::AudioOutput(format!("Failed to resume stream: {}", e)));
                let _ = reply.send(result);
            }
            StreamCommand::Close => break,
        }
    }

    if let Err(e) = stream.pause() {
        warn!("Failed to pause stream during shutdown: {}", e);
    }
    debug!("Audio thread exiting");
}

fn select_device(device_name: Option<&str>) -> Result<Device> {
    let host = cpal::default_host();

    if let Some(name) = device_name {
        let mut devices = host
            .output_devices()
            .map_err(|e| Error::AudioOutput(format!("Failed to enumerate devices: {}", e)))?;

        if let Some(dev) = devices.find(|d| d.name().ok().as_deref() == Some(name)) {
            info!("Found requested audio device: {}", name);
            return Ok(dev);
        }

        warn!(
            "Requested device '{}' not found, falling back to default device",
            name
        );
    }

    host.default_output_device()
        .ok_or_else(|| Error::AudioOutput("No default output device found".to_string()))
}

fn open_stream(
    device_name: Option<String>,
    mixer: Arc<Mutex<Mixer>>,
) -> Result<(Stream, StreamInfo)> {
    let device = select_device(device_name.as_deref())?;
    let name = device.name().unwrap_or_else(|_| "Unknown".to_string());

    let supported = device
        .default_output_config()
        .map_err(|e| Error::AudioOutput(format!("Failed to get default config: {}", e)))?;
    let sample_format = supported.sample_format();
    let config: StreamConfig = supported.config();

    debug!(
        "Audio config: sample_rate={}, channels={}, format={:?}",
        config.sample_rate.0, config.channels, sample_format
    );

    let stream = match sample_format {
        SampleFormat::F32 => build_stream::<f32>(&device, &config, mixer)?,
        SampleFormat::I16 => build_stream::<i16>(&device, &config, mixer)?,
        SampleFormat::U16 => build_stream::<u16>(&device, &config, mixer)?,
        other => {
            return Err(Error::AudioOutput(format!(
                "Unsupported sample format: {:?}",
                other
            )))
        }
    };

    stream
        .play()
        .map_err(|e| Error::AudioOutput(format!("Failed to start stream: {}", e)))?;

    let info = StreamInfo {
        device_name: name,
        sample_rate: config.sample_rate.0,
        channels: config.channels,
    };
    Ok((stream, info))
}

fn build_stream<T>(device: &Device, config: &StreamConfig, mixer: Arc<Mutex<Mixer>>) -> Result<Stream>
where
    T: SizedSample + FromSample<f32>,
{
    let channels = config.channels as usize;
    let mut scratch: Vec<f32> = Vec::new();

    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                scratch.resize(data.len(), 0.0);
                let ended = lock_mixer(&mixer).mix_into(&mut scratch, channels);

                for (out, sample) in data.iter_mut().zip(scratch.iter()) {
                    *out = T::from_sample(*sample);
                }

                for callback in ended {
                    callback();
                }
            },
            move |err| {
                error!("Audio stream error: {}", err);
            },
            None,
        )
        .map_err(|e| Error::AudioOutput(format!("Failed to build stream: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_mono_passthrough() {
        let buffer = SampleBuffer::mono(vec![0.1, 0.2, 0.3], 24_000);
        assert_eq!(to_mono(&buffer), vec![0.1, 0.2, 0.3]);
    }

    #[test]
    fn test_to_mono_averages_stereo() {
        let buffer = SampleBuffer {
            samples: vec![0.5, 0.1, -0.2, -0.4],
            sample_rate: 48_000,
            channel_count: 2,
        };
        let mono = to_mono(&buffer);
        assert!((mono[0] - 0.3).abs() < 1e-6);
        assert!((mono[1] + 0.3).abs() < 1e-6);
    }

    #[test]
    fn test_conform_downmixes_and_resamples() {
        let buffer = SampleBuffer {
            samples: vec![0.25; 4800],
            sample_rate: 24_000,
            channel_count: 2,
        };
        assert!(!matches_device(&buffer, 48_000));

        let converted = conform(&buffer, 48_000).unwrap();

        assert!(matches_device(&converted, 48_000));
        let frames = converted.samples.len();
        assert!((4780..=4820).contains(&frames), "got {} frames", frames);
    }

    #[test]
    fn test_matching_buffer_needs_no_conversion() {
        let buffer = SampleBuffer::mono(vec![0.1, 0.2], 48_000);
        assert!(matches_device(&buffer, 48_000));
        assert!(!matches_device(&buffer, 44_100));
    }

    // Opening a real device requires audio hardware and is exercised manually
}
