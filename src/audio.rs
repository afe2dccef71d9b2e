use anyhow::Result;
use futures_util::stream::StreamExt;
use log::{debug, info, warn};
use rodio::{OutputStream, OutputStreamHandle, Sink};
use std::io::{Read, Seek, SeekFrom};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;
use symphonia::core::audio::{AudioBufferRef, Signal};
use symphonia::core::codecs::{Decoder, DecoderOptions};
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::{MediaSource, MediaSourceStream, MediaSourceStreamOptions};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::default::{get_codecs, get_probe};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::utils::parsing::ParsingUtils;

const MAX_BUFFERED: usize = 6 * 1024 * 1024;
const COMPACT_AFTER: usize = 2 * 1024 * 1024;
const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackState {
    Stopped,
    Connecting,
    Playing,
    Error(String),
}

/// Where the tuner sends its audio. Implemented by the stream player and by
/// the silent stand-in used with `--no-audio`.
pub trait AudioOutput {
    fn play(&mut self, url: &str) -> Result<()>;
    fn stop(&mut self) -> Result<()>;
    fn set_volume(&mut self, volume: f32);
    fn state(&self) -> PlaybackState;
}

/// Network bytes shared between the fetch task and the blocking decoder.
#[derive(Default)]
struct StreamBuffer {
    data: Vec<u8>,
    pos: usize,
    finished: bool,
}

type SharedBuffer = Arc<(Mutex<StreamBuffer>, Condvar)>;

/// Lets symphonia read from the network buffer. Reads block until data
/// arrives or the fetch task marks the stream finished.
struct StreamingSource {
    shared: SharedBuffer,
}

impl Read for StreamingSource {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let (lock, ready) = &*self.shared;
        let mut stream = lock
            .lock()
            .map_err(|_| std::io::Error::new(std::io::ErrorKind::Other, "stream buffer poisoned"))?;

        while stream.pos >= stream.data.len() && !stream.finished {
            stream = ready
                .wait(stream)
                .map_err(|_| std::io::Error::new(std::io::ErrorKind::Other, "stream buffer poisoned"))?;
        }

        let available = stream.data.len() - stream.pos;
        let n = available.min(buf.len());
        let start = stream.pos;
        buf[..n].copy_from_slice(&stream.data[start..start + n]);
        stream.pos += n;

        if stream.pos > COMPACT_AFTER {
            let consumed = stream.pos;
            stream.data.drain(..consumed);
            stream.pos = 0;
        }
        ready.notify_all();
        Ok(n)
    }
}

impl Seek for StreamingSource {
    fn seek(&mut self, _: SeekFrom) -> std::io::Result<u64> {
        Err(std::io::Error::new(std::io::ErrorKind::Unsupported, "seek not supported"))
    }
}

impl MediaSource for StreamingSource {
    fn is_seekable(&self) -> bool {
        false
    }

    fn byte_len(&self) -> Option<u64> {
        None
    }
}

fn finish(shared: &SharedBuffer) {
    let (lock, ready) = &**shared;
    if let Ok(mut stream) = lock.lock() {
        stream.finished = true;
    }
    ready.notify_all();
}

struct PlayerState {
    playback_state: PlaybackState,
    sink: Option<Arc<Sink>>,
    cancellation_token: Option<CancellationToken>,
    volume: f32,
}

impl PlayerState {
    fn set_state(&mut self, state: PlaybackState) {
        debug!("Player state changing from {:?} to {:?}", self.playback_state, state);
        self.playback_state = state;
    }
}

/// Plays one internet radio stream at a time through the default output device.
pub struct SimpleAudioPlayer {
    state: Arc<Mutex<PlayerState>>,
    _stream: OutputStream,
    stream_handle: OutputStreamHandle,
}

impl SimpleAudioPlayer {
    pub fn new() -> Result<Self> {
        let (stream, stream_handle) = OutputStream::try_default()?;
        Ok(Self {
            state: Arc::new(Mutex::new(PlayerState {
                playback_state: PlaybackState::Stopped,
                sink: None,
                cancellation_token: None,
                volume: 1.0,
            })),
            _stream: stream,
            stream_handle,
        })
    }

    fn lock_state(&self) -> Result<std::sync::MutexGuard<'_, PlayerState>> {
        self.state
            .lock()
            .map_err(|_| anyhow::anyhow!("Failed to acquire state lock"))
    }

    async fn run_stream(
        url: String,
        state: Arc<Mutex<PlayerState>>,
        sink: Arc<Sink>,
        cancellation_token: CancellationToken,
    ) -> Result<()> {
        let actual_url = match resolve_stream_url(&url).await {
            Ok(resolved) => resolved,
            Err(e) => {
                warn!("Failed to resolve stream URL: {}. Using original URL.", e);
                url
            }
        };
        debug!("Fetching stream from {}", actual_url);

        let client = reqwest::Client::builder().connect_timeout(CONNECT_TIMEOUT).build()?;
        let response = client.get(&actual_url).send().await?;
        if !response.status().is_success() {
            anyhow::bail!("HTTP error: {}", response.status());
        }

        let shared: SharedBuffer = Arc::new((Mutex::new(StreamBuffer::default()), Condvar::new()));

        let fetch_task = {
            let shared = shared.clone();
            let cancellation_token = cancellation_token.clone();
            tokio::spawn(async move {
                let mut body = response.bytes_stream();
                let mut total_bytes = 0usize;
                loop {
                    let chunk = tokio::select! {
                        _ = cancellation_token.cancelled() => break,
                        chunk = body.next() => chunk,
                    };
                    let Some(Ok(chunk)) = chunk else { break };
                    total_bytes += chunk.len();

                    // Hold off while the decoder is far behind.
                    loop {
                        let unread = {
                            let (lock, _) = &*shared;
                            match lock.lock() {
                                Ok(stream) => stream.data.len() - stream.pos,
                                Err(_) => 0,
                            }
                        };
                        if unread < MAX_BUFFERED {
                            break;
                        }
                        tokio::select! {
                            _ = cancellation_token.cancelled() => {
                                finish(&shared);
                                return;
                            }
                            _ = tokio::time::sleep(Duration::from_millis(20)) => {}
                        }
                    }

                    let (lock, ready) = &*shared;
                    if let Ok(mut stream) = lock.lock() {
                        stream.data.extend_from_slice(&chunk);
                    }
                    ready.notify_all();
                }
                debug!("Network stream ended after {}KB", total_bytes / 1024);
                finish(&shared);
            })
        };

        let (audio_tx, mut audio_rx) = mpsc::channel::<rodio::buffer::SamplesBuffer<f32>>(16);
        let decode_task = {
            let source = StreamingSource { shared: shared.clone() };
            let cancellation_token = cancellation_token.clone();
            tokio::task::spawn_blocking(move || decode_blocking(source, audio_tx, cancellation_token))
        };

        let mut started = false;
        loop {
            tokio::select! {
                samples = audio_rx.recv() => match samples {
                    Some(samples) => {
                        sink.append(samples);
                        if !started && !cancellation_token.is_cancelled() {
                            started = true;
                            if let Ok(mut guard) = state.lock() {
                                guard.set_state(PlaybackState::Playing);
                            }
                        }
                    }
                    None => break,
                },
                _ = cancellation_token.cancelled() => break,
            }
        }

        // A cancelled stream may leave the decoder parked in a read or a send.
        finish(&shared);
        drop(audio_rx);
        fetch_task.abort();
        match decode_task.await {
            Ok(result) => result,
            Err(e) => Err(anyhow::anyhow!("decoder task failed: {}", e)),
        }
    }
}

impl AudioOutput for SimpleAudioPlayer {
    fn play(&mut self, url: &str) -> Result<()> {
        debug!("Playing audio from URL: {}", url);
        self.stop()?;

        let cancellation_token = CancellationToken::new();
        let sink = Arc::new(Sink::try_new(&self.stream_handle)?);
        {
            let mut state = self.lock_state()?;
            sink.set_volume(state.volume);
            state.sink = Some(sink.clone());
            state.cancellation_token = Some(cancellation_token.clone());
            state.set_state(PlaybackState::Connecting);
        }

        let state = self.state.clone();
        let url = url.to_string();
        tokio::spawn(async move {
            let result = Self::run_stream(url, state.clone(), sink, cancellation_token.clone()).await;
            if cancellation_token.is_cancelled() {
                return;
            }
            if let Ok(mut guard) = state.lock() {
                match result {
                    Ok(()) => guard.set_state(PlaybackState::Stopped),
                    Err(e) => {
                        warn!("Stream failed: {}", e);
                        guard.set_state(PlaybackState::Error(e.to_string()));
                    }
                }
            }
        });
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        let mut state = self.lock_state()?;
        if let Some(token) = state.cancellation_token.take() {
            token.cancel();
        }
        if let Some(sink) = state.sink.take() {
            sink.stop();
        }
        state.set_state(PlaybackState::Stopped);
        Ok(())
    }

    fn set_volume(&mut self, volume: f32) {
        if let Ok(mut state) = self.state.lock() {
            state.volume = volume;
            if let Some(sink) = state.sink.as_ref() {
                sink.set_volume(volume);
            }
        }
    }

    fn state(&self) -> PlaybackState {
        match self.state.lock() {
            Ok(state) => state.playback_state.clone(),
            Err(_) => PlaybackState::Error("Failed to acquire state lock".to_string()),
        }
    }
}

/// Stand-in output for machines without a sound device. Tracks what would
/// be playing so the receiver panel still shows a sensible state.
pub struct NullOutput {
    playback_state: PlaybackState,
}

impl NullOutput {
    pub fn new() -> Self {
        Self { playback_state: PlaybackState::Stopped }
    }
}

impl AudioOutput for NullOutput {
    fn play(&mut self, url: &str) -> Result<()> {
        info!("(no audio) would play {}", url);
        self.playback_state = PlaybackState::Playing;
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.playback_state = PlaybackState::Stopped;
        Ok(())
    }

    fn set_volume(&mut self, volume: f32) {
        debug!("(no audio) volume {:.2}", volume);
    }

    fn state(&self) -> PlaybackState {
        self.playback_state.clone()
    }
}

fn decode_blocking(
    source: StreamingSource,
    audio_tx: mpsc::Sender<rodio::buffer::SamplesBuffer<f32>>,
    cancellation_token: CancellationToken,
) -> Result<()> {
    let mss = MediaSourceStream::new(
        Box::new(source) as Box<dyn MediaSource>,
        MediaSourceStreamOptions::default(),
    );
    let probed = get_probe().format(
        &Hint::new(),
        mss,
        &FormatOptions::default(),
        &MetadataOptions::default(),
    )?;
    let mut format: Box<dyn FormatReader> = probed.format;

    let track = format
        .default_track()
        .ok_or_else(|| anyhow::anyhow!("no default track"))?;
    let track_id = track.id;
    let mut decoder: Box<dyn Decoder> = get_codecs().make(&track.codec_params, &DecoderOptions::default())?;
    debug!(
        "Found audio track: codec={:?}, sample_rate={:?}, channels={:?}",
        track.codec_params.codec, track.codec_params.sample_rate, track.codec_params.channels
    );

    while !cancellation_token.is_cancelled() {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(symphonia::core::errors::Error::IoError(e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                debug!("Stream reached end of data");
                break;
            }
            Err(e) => return Err(e.into()),
        };
        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(audio_buf) => {
                let spec = *audio_buf.spec();
                let Some(samples) = interleave(&audio_buf) else {
                    debug!("Unsupported sample format, skipping packet");
                    continue;
                };
                let buffer = rodio::buffer::SamplesBuffer::new(
                    spec.channels.count() as u16,
                    spec.rate,
                    samples,
                );
                if audio_tx.blocking_send(buffer).is_err() {
                    break;
                }
            }
            // Corrupt frames are common on live streams; skip them.
            Err(symphonia::core::errors::Error::DecodeError(e)) => debug!("Decode error: {}", e),
            Err(e) => return Err(e.into()),
        }
    }

    debug!("Decode task ended");
    Ok(())
}

/// Flattens planar symphonia buffers into interleaved f32 samples for rodio.
fn interleave(audio_buf: &AudioBufferRef) -> Option<Vec<f32>> {
    fn collect<S: symphonia::core::sample::Sample>(
        buf: &symphonia::core::audio::AudioBuffer<S>,
        convert: impl Fn(S) -> f32,
    ) -> Vec<f32> {
        let chans = buf.spec().channels.count();
        let frames = buf.frames();
        let mut samples = Vec::with_capacity(frames * chans);
        for frame in 0..frames {
            for ch in 0..chans {
                samples.push(convert(buf.chan(ch)[frame]));
            }
        }
        samples
    }

    let samples = match audio_buf {
        AudioBufferRef::F32(buf) => collect(&**buf, |s| s),
        AudioBufferRef::F64(buf) => collect(&**buf, |s| s as f32),
        AudioBufferRef::S16(buf) => collect(&**buf, |s| s as f32 / i16::MAX as f32),
        AudioBufferRef::S32(buf) => collect(&**buf, |s| s as f32 / i32::MAX as f32),
        AudioBufferRef::U8(buf) => collect(&**buf, |s| (s as i16 - 128) as f32 / 128.0),
        _ => return None,
    };
    Some(samples)
}

/// Follows .pls/.m3u playlists to the first stream entry.
async fn resolve_stream_url(url: &str) -> Result<String> {
    if !ParsingUtils::is_playlist_url(url) {
        return Ok(url.to_string());
    }
    debug!("Parsing playlist from URL: {}", url);
    let content = reqwest::get(url).await?.error_for_status()?.text().await?;
    ParsingUtils::first_stream_in_playlist(url, &content)
}
