//! Parameter set extraction from recorded MP4/3GP files
//!
//! Reads the container header with the `mp4` crate and takes the SPS/PPS
//! from the `avcC` record of the first AVC track.

use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufReader};
use std::path::Path;

use mp4::{Mp4Reader, Mp4Track};

use crate::error::{Error, Result};

/// Read the first SPS/PPS pair from the container at `path`
pub fn read_parameter_sets<P: AsRef<Path>>(path: P) -> Result<(Vec<u8>, Vec<u8>)> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => Error::FileNotFound(path.to_path_buf()),
        _ => Error::Io(e),
    })?;
    let size = file.metadata()?.len();

    log::debug!("Reading container header from {:?} ({} bytes)", path, size);

    let reader = Mp4Reader::read_header(BufReader::new(file), size).map_err(|e| {
        Error::InvalidFormat(format!("failed to read container header {:?}: {}", path, e))
    })?;

    first_avc_parameter_sets(reader.tracks())
        .ok_or_else(|| Error::InvalidFormat(format!("no AVC track with SPS and PPS in {:?}", path)))
}

/// SPS and PPS of the lowest-numbered track that carries both
fn first_avc_parameter_sets(tracks: &HashMap<u32, Mp4Track>) -> Option<(Vec<u8>, Vec<u8>)> {
    let mut ids: Vec<u32> = tracks.keys().copied().collect();
    ids.sort_unstable();

    ids.iter().filter_map(|id| tracks.get(id)).find_map(|track| {
        let sps = track.sequence_parameter_set().ok()?;
        let pps = track.picture_parameter_set().ok()?;
        if sps.is_empty() || pps.is_empty() {
            return None;
        }
        log::debug!(
            "Track {}: SPS {} bytes, PPS {} bytes",
            track.track_id(),
            sps.len(),
            pps.len()
        );
        Some((sps.to_vec(), pps.to_vec()))
    })
}
