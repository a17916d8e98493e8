//! WAV assets, decoded once at startup
//!
//! Every track is decoded into interleaved f32 samples up front so starting
//! or restarting a voice never touches the disk.

use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::info;

use crate::slot::{Side, SlotId, TrackId, SLOT_COUNT};

#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to decode {path}: {source}")]
    Decode {
        path: PathBuf,
        source: hound::Error,
    },

    #[error("{path} has no audio frames")]
    Empty { path: PathBuf },

    #[error("expected {expected} {kind} assets, got {got}")]
    Count {
        kind: &'static str,
        expected: usize,
        got: usize,
    },
}

/// Decoded audio ready for playback
#[derive(Debug, Clone)]
pub struct Asset {
    /// File name, for logs
    pub name: String,
    /// Interleaved samples (L, R, L, R, ...)
    pub samples: Arc<[f32]>,
    pub sample_rate: u32,
    /// Number of channels (1 = mono, 2 = stereo)
    pub channels: u16,
}

impl Asset {
    /// Total number of frames (samples per channel)
    pub fn frames(&self) -> usize {
        if self.channels == 0 {
            0
        } else {
            self.samples.len() / self.channels as usize
        }
    }

    /// One second of stereo silence; used by headless runs and tests
    pub fn silent(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            samples: vec![0.0; 44_100 * 2].into(),
            sample_rate: 44_100,
            channels: 2,
        }
    }
}

/// Decode WAV bytes to interleaved f32 in [-1, 1]
pub fn decode_wav(name: &str, data: &[u8]) -> Result<Asset, hound::Error> {
    let reader = hound::WavReader::new(Cursor::new(data))?;

    let spec = reader.spec();
    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader.into_samples::<f32>().collect::<Result<_, _>>()?,
        hound::SampleFormat::Int => {
            let max_val = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 / max_val))
                .collect::<Result<_, _>>()?
        }
    };

    Ok(Asset {
        name: name.to_string(),
        samples: samples.into(),
        sample_rate: spec.sample_rate,
        channels: spec.channels,
    })
}

/// The eight assets of the installation, addressed by [`TrackId`]
#[derive(Debug, Clone)]
pub struct AssetLibrary {
    foreground: Vec<Arc<Asset>>,
    background: [Arc<Asset>; 2],
}

impl AssetLibrary {
    pub fn new(foreground: Vec<Asset>, background: [Asset; 2]) -> Result<Self, AssetError> {
        if foreground.len() != SLOT_COUNT {
            return Err(AssetError::Count {
                kind: "foreground",
                expected: SLOT_COUNT,
                got: foreground.len(),
            });
        }
        let [a, b] = background;
        Ok(Self {
            foreground: foreground.into_iter().map(Arc::new).collect(),
            background: [Arc::new(a), Arc::new(b)],
        })
    }

    /// Silent placeholders for every track
    pub fn silent() -> Self {
        Self {
            foreground: SlotId::all()
                .map(|slot| Arc::new(Asset::silent(format!("silent-{}", slot.index() + 1))))
                .collect(),
            background: [
                Arc::new(Asset::silent("silent-a")),
                Arc::new(Asset::silent("silent-b")),
            ],
        }
    }

    /// Load `foreground` and `background` file names relative to `dir`
    pub fn load(dir: &Path, foreground: &[String], background: &[String]) -> Result<Self, AssetError> {
        if background.len() != 2 {
            return Err(AssetError::Count {
                kind: "background",
                expected: 2,
                got: background.len(),
            });
        }

        let fg = foreground
            .iter()
            .map(|name| load_file(&dir.join(name)))
            .collect::<Result<Vec<_>, _>>()?;
        let a = load_file(&dir.join(&background[0]))?;
        let b = load_file(&dir.join(&background[1]))?;

        let library = Self::new(fg, [a, b])?;
        info!(dir = %dir.display(), "loaded {} assets", SLOT_COUNT + 2);
        Ok(library)
    }

    pub fn get(&self, track: TrackId) -> &Arc<Asset> {
        match track {
            TrackId::Foreground(slot) => &self.foreground[slot.index()],
            TrackId::Background(side) => &self.background[side.index()],
        }
    }

    pub fn background(&self, side: Side) -> &Arc<Asset> {
        &self.background[side.index()]
    }
}

fn load_file(path: &Path) -> Result<Asset, AssetError> {
    let data = std::fs::read(path).map_err(|source| AssetError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    let asset = decode_wav(&name, &data).map_err(|source| AssetError::Decode {
        path: path.to_path_buf(),
        source,
    })?;
    if asset.frames() == 0 {
        return Err(AssetError::Empty {
            path: path.to_path_buf(),
        });
    }
    Ok(asset)
}
