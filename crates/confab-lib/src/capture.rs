//! Microphone capture over cpal.
//!
//! [`AudioCapture`] is a scoped resource: constructing it opens the system
//! default input device and starts a capture thread; dropping it stops the
//! stream and joins the thread, so the microphone is released on every exit
//! path. Samples are delivered as 16 kHz mono i16 regardless of the device's
//! native format, rate, or channel count.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::SampleFormat;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::error;

use confab_core::wav::SAMPLE_RATE;

/// Samples per [`AudioCapture::read_chunk`] — 100 ms at 16 kHz mono.
pub const CHUNK_SAMPLES: usize = 1_600;

pub struct AudioCapture {
    rx: mpsc::UnboundedReceiver<Vec<i16>>,
    pending: Vec<i16>,
    stop: Arc<AtomicBool>,
    thread: Option<std::thread::JoinHandle<()>>,
}

impl AudioCapture {
    /// Open the default input device and start capturing.
    pub fn new() -> Result<Self, String> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or("No microphone found. Please connect an audio input device.")?;

        let supported = device
            .default_input_config()
            .map_err(|e| format!("failed to read input config: {e}"))?;

        let native_rate = supported.sample_rate().0;
        let channels = supported.channels();
        let sample_format = supported.sample_format();
        let config: cpal::StreamConfig = supported.into();

        let (tx, rx) = mpsc::unbounded_channel::<Vec<i16>>();
        let stop = Arc::new(AtomicBool::new(false));
        let stop_for_thread = stop.clone();

        // cpal streams are !Send on macOS, so the stream lives on its own
        // OS thread and parks until asked to stop.
        let thread = std::thread::spawn(move || {
            let deliver = {
                let stop = stop_for_thread.clone();
                move |samples: Vec<i16>| {
                    if !stop.load(Ordering::Relaxed) {
                        let mono = downmix(&samples, channels);
                        let _ = tx.send(resample(&mono, native_rate, SAMPLE_RATE));
                    }
                }
            };

            let stream = match sample_format {
                SampleFormat::I16 => device.build_input_stream(
                    &config,
                    move |data: &[i16], _: &cpal::InputCallbackInfo| {
                        deliver(data.to_vec());
                    },
                    |e| error!("capture stream error: {e}"),
                    None,
                ),
                SampleFormat::F32 => device.build_input_stream(
                    &config,
                    move |data: &[f32], _: &cpal::InputCallbackInfo| {
                        deliver(data.iter().map(|&s| float_to_i16(s)).collect());
                    },
                    |e| error!("capture stream error: {e}"),
                    None,
                ),
                other => {
                    error!("unsupported input sample format: {other:?}");
                    return;
                }
            };

            let stream = match stream {
                Ok(s) => s,
                Err(e) => {
                    error!("failed to build input stream: {e}");
                    return;
                }
            };
            if let Err(e) = stream.play() {
                error!("failed to start input stream: {e}");
                return;
            }

            loop {
                std::thread::park();
                if stop_for_thread.load(Ordering::Relaxed) {
                    break;
                }
            }
            // stream drops here, releasing the device
        });

        Ok(AudioCapture {
            rx,
            pending: Vec::new(),
            stop,
            thread: Some(thread),
        })
    }

    /// Read exactly [`CHUNK_SAMPLES`] samples, waiting for more as needed.
    /// Errors if the capture thread went away.
    pub async fn read_chunk(&mut self) -> Result<Vec<i16>, String> {
        while self.pending.len() < CHUNK_SAMPLES {
            match self.rx.recv().await {
                Some(samples) => self.pending.extend_from_slice(&samples),
                None => return Err("audio capture stream ended".to_string()),
            }
        }
        Ok(self.pending.drain(..CHUNK_SAMPLES).collect())
    }
}

impl Drop for AudioCapture {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.thread.take() {
            handle.thread().unpark();
            let _ = handle.join();
        }
    }
}

// ─── Sample conversion ─────────────────────────────────────────────────────

fn float_to_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * 32767.0) as i16
}

/// Average interleaved channels down to mono.
fn downmix(input: &[i16], channels: u16) -> Vec<i16> {
    if channels <= 1 {
        return input.to_vec();
    }
    input
        .chunks_exact(channels as usize)
        .map(|frame| {
            let sum: i32 = frame.iter().map(|&s| s as i32).sum();
            (sum / channels as i32) as i16
        })
        .collect()
}

/// Linear-interpolation resampling. Good enough for speech.
fn resample(input: &[i16], from_rate: u32, to_rate: u32) -> Vec<i16> {
    if from_rate == to_rate || input.is_empty() {
        return input.to_vec();
    }
    let ratio = from_rate as f64 / to_rate as f64;
    let out_len = (input.len() as f64 / ratio) as usize;
    let mut out = Vec::with_capacity(out_len);
    for i in 0..out_len {
        let pos = i as f64 * ratio;
        let idx = pos as usize;
        let frac = pos - idx as f64;
        let a = input[idx] as f64;
        let b = input.get(idx + 1).map(|&s| s as f64).unwrap_or(a);
        out.push((a + frac * (b - a)) as i16);
    }
    out
}
