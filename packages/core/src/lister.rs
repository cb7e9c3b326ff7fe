//! Directory listing.

use std::iter::FusedIterator;

use tracing::{debug, info};

use crate::volume::{DirStream, Volume};
use crate::{DirEntry, Error, VolumePath};

/// Entries of one open directory.
///
/// Lazy, finite and single-pass. The sequence ends at the first read error
/// or end-of-directory marker; the two are not distinguished. The directory
/// handle is released as soon as the sequence ends, or when the listing is
/// dropped early.
pub struct Listing<'a> {
    stream: Option<Box<dyn DirStream + 'a>>,
}

impl Iterator for Listing<'_> {
    type Item = DirEntry;

    fn next(&mut self) -> Option<DirEntry> {
        let stream = self.stream.as_mut()?;
        match stream.read_next() {
            Ok(entry) if !entry.is_end() => Some(entry),
            Ok(_) => {
                self.stream = None;
                None
            }
            Err(e) => {
                debug!(error = %e, "directory read ended with error");
                self.stream = None;
                None
            }
        }
    }
}

impl FusedIterator for Listing<'_> {}

/// Open `path` for listing.
pub fn list<'a, V: Volume + ?Sized>(volume: &'a V, path: &VolumePath) -> Result<Listing<'a>, Error> {
    let stream = volume.open_dir(path).map_err(|source| Error::DirOpen {
        path: path.to_string(),
        source,
    })?;
    Ok(Listing {
        stream: Some(stream),
    })
}

/// List `path`, logging every entry, and return what was seen.
pub fn log_listing<V: Volume + ?Sized>(volume: &V, path: &VolumePath) -> Result<Vec<DirEntry>, Error> {
    let listing = list(volume, path)?;
    info!("Listing dir {} ...", path);
    let entries: Vec<DirEntry> = listing
        .inspect(|entry| {
            if entry.is_dir() {
                info!("[DIR ] {}", entry.name);
            } else {
                info!("[FILE] {} (size = {})", entry.name, entry.size);
            }
        })
        .collect();
    Ok(entries)
}
