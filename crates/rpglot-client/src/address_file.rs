//! Persisted navigation address.
//!
//! One line holding the encoded address; an empty file is the default
//! address. Written through a temp file and renamed into place.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use rpglot_client_core::address::NavAddress;
use tracing::{debug, warn};

const FILE_NAME: &str = "address";

pub struct AddressFile {
    path: PathBuf,
}

impl AddressFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<data dir>/rpglot-client/address`, if the platform has a data dir.
    pub fn default_path() -> Option<PathBuf> {
        dirs::data_dir().map(|d| d.join("rpglot-client").join(FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the stored address. A missing or unreadable file yields `None`.
    pub fn load(&self) -> Option<NavAddress> {
        match fs::read_to_string(&self.path) {
            Ok(contents) => Some(NavAddress::decode(contents.trim())),
            Err(e) if e.kind() == io::ErrorKind::NotFound => None,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "cannot read address file");
                None
            }
        }
    }

    pub fn save(&self, address: &NavAddress) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp_path = self.path.with_extension("tmp");
        let mut file = fs::File::create(&tmp_path)?;
        writeln!(file, "{}", address.encode())?;
        file.sync_all()?;
        drop(file);

        fs::rename(&tmp_path, &self.path)?;
        debug!(path = %self.path.display(), %address, "address saved");
        Ok(())
    }
}
