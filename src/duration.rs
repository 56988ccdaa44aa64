//! Audio duration extraction.
//!
//! Walks an MP3 file frame by frame with the symphonia demuxer and adds up
//! each frame's playback time.  Duration only decorates the feed, so every
//! failure is logged and reported as `0`.
//!
//! The demuxer reports a file cut inside a frame the same way as a clean end
//! of stream, so after the last packet the bytes left in the file are checked
//! for the start of an incomplete frame.

use std::fs::File;
use std::io::{ErrorKind, Read, Seek, SeekFrom};
use std::path::Path;

use symphonia::core::codecs::CODEC_TYPE_NULL;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::warn;

/// Playback length of an audio file in whole seconds, `0` on any error.
///
/// A decode error before the end of the stream, or a stream that stops
/// inside a frame, also yields `0` rather than the partial sum.
pub fn duration(path: impl AsRef<Path>) -> u32 {
    let path = path.as_ref();
    match scan(path) {
        Ok(secs) => secs,
        Err(e) => {
            warn!(file = %path.display(), error = %e, "can't get duration");
            0
        }
    }
}

fn scan(path: &Path) -> Result<u32, SymphoniaError> {
    let file = File::open(path)?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    hint.with_extension(
        path.extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or("mp3"),
    );

    let format_opts = FormatOptions {
        enable_gapless: false,
        ..Default::default()
    };
    let probed = symphonia::default::get_probe().format(
        &hint,
        mss,
        &format_opts,
        &MetadataOptions::default(),
    )?;
    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or(SymphoniaError::Unsupported("no audio track"))?;
    let track_id = track.id;
    let time_base = track
        .codec_params
        .time_base
        .ok_or(SymphoniaError::Unsupported("track has no time base"))?;

    let mut total: u64 = 0;
    let mut last: Option<Box<[u8]>> = None;
    loop {
        match format.next_packet() {
            Ok(packet) => {
                if packet.track_id() == track_id {
                    total += packet.dur();
                    last = Some(packet.data);
                }
            }
            Err(SymphoniaError::IoError(e)) if e.kind() == ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(e),
        }
    }

    if let Some(last) = last {
        if ends_mid_frame(path, &last)? {
            return Err(SymphoniaError::DecodeError("stream ends inside a frame"));
        }
    }

    let secs = time_base.calc_time(total).seconds;
    Ok(u32::try_from(secs).unwrap_or(u32::MAX))
}

/// How far past the last complete frame to look for a cut-off one.
const TAIL_SLACK: u64 = 8 * 1024;

/// Whether the bytes after the last complete frame `last` start another frame.
///
/// Trailing tags and junk are fine; a frame sync word, or a lone first sync
/// byte, means the final frame was cut short.
fn ends_mid_frame(path: &Path, last: &[u8]) -> std::io::Result<bool> {
    let mut file = File::open(path)?;
    let len = file.metadata()?.len();
    let window = (last.len() as u64 + TAIL_SLACK).min(len);
    file.seek(SeekFrom::Start(len - window))?;
    let mut tail = Vec::with_capacity(window as usize);
    file.read_to_end(&mut tail)?;

    let Some(at) = tail.windows(last.len()).rposition(|w| w == last) else {
        return Ok(false);
    };
    Ok(match &tail[at + last.len()..] {
        [0xFF] => true,
        [0xFF, next, ..] => next & 0xE0 == 0xE0,
        _ => false,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
