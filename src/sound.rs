//! Loading a user-chosen sound file and replaying it on demand

use rodio::decoder::DecoderError;
use rodio::{Decoder, OutputStream, OutputStreamHandle, PlayError, Sink, StreamError};
use std::fs;
use std::io::{self, Cursor};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SoundError {
    #[error("cannot read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{} is empty", .0.display())]
    Empty(PathBuf),
    #[error("{name} is not a playable audio file: {source}")]
    Decode {
        name: String,
        #[source]
        source: DecoderError,
    },
    #[error("no audio output device: {0}")]
    Output(#[from] StreamError),
    #[error("playback failed: {0}")]
    Play(#[from] PlayError),
}

/// Something the trigger key can play
pub trait Playable {
    /// Rewind to the start and begin playing, cutting off any playback in progress
    fn restart(&mut self) -> Result<(), SoundError>;

    /// Short display name
    fn name(&self) -> &str;
}

/// Encoded audio held in memory. The output device is opened on first playback.
pub struct SoundClip {
    name: String,
    bytes: Arc<[u8]>,
    output: Option<Output>,
}

struct Output {
    _stream: OutputStream,
    handle: OutputStreamHandle,
    sink: Option<Sink>,
}

impl Output {
    fn open() -> Result<Self, SoundError> {
        let (stream, handle) = OutputStream::try_default()?;
        Ok(Self {
            _stream: stream,
            handle,
            sink: None,
        })
    }
}

/// Read and validate a sound file. Nothing is installed unless this succeeds.
pub fn load_sound(path: &Path) -> Result<SoundClip, SoundError> {
    let bytes = fs::read(path).map_err(|source| SoundError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    if bytes.is_empty() {
        return Err(SoundError::Empty(path.to_path_buf()));
    }

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    let clip = SoundClip {
        name,
        bytes: bytes.into(),
        output: None,
    };
    clip.decoder()?;
    tracing::debug!(sound = %clip.name, bytes = clip.bytes.len(), "sound loaded");
    Ok(clip)
}

impl SoundClip {
    fn decoder(&self) -> Result<Decoder<Cursor<Arc<[u8]>>>, SoundError> {
        Decoder::new(Cursor::new(Arc::clone(&self.bytes))).map_err(|source| SoundError::Decode {
            name: self.name.clone(),
            source,
        })
    }
}

impl Playable for SoundClip {
    fn restart(&mut self) -> Result<(), SoundError> {
        let source = self.decoder()?;
        let output = match &mut self.output {
            Some(output) => output,
            slot => slot.insert(Output::open()?),
        };

        if let Some(previous) = output.sink.take() {
            previous.stop();
        }
        let sink = Sink::try_new(&output.handle)?;
        sink.append(source);
        output.sink = Some(sink);
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}
