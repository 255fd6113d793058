use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;

use tracing::{debug, info};
use zip::ZipArchive;

use crate::error::Result;
use crate::parser::{IngestStatus, StreamingIngestor};

/// Reads the XML documents packed in a ZIP archive.
pub struct ZipHandler {
    path: PathBuf,
}

impl ZipHandler {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Names of the `.xml` entries, sorted.
    pub fn xml_entries(&self) -> Result<Vec<String>> {
        let file = File::open(&self.path)?;
        let archive = ZipArchive::new(BufReader::new(file))?;
        let mut names: Vec<String> = archive
            .file_names()
            .filter(|name| name.to_lowercase().ends_with(".xml"))
            .map(str::to_string)
            .collect();
        names.sort();
        Ok(names)
    }

    /// Streams every XML entry into `ingestor`, so all entries share one
    /// session. Stops at the first cancelled entry.
    pub fn ingest_into(
        &self,
        ingestor: &mut StreamingIngestor,
        cancel: &AtomicBool,
    ) -> Result<IngestStatus> {
        let names = self.xml_entries()?;
        info!("Found {} XML files in {:?}", names.len(), self.path);

        let file = File::open(&self.path)?;
        let mut archive = ZipArchive::new(BufReader::new(file))?;
        for name in &names {
            let entry = archive.by_name(name)?;
            if !entry.is_file() {
                continue;
            }
            debug!("Reading {} ({} bytes)", name, entry.size());
            let source = format!("{}/{}", self.path.display(), name);
            if ingestor.ingest(BufReader::new(entry), &source, cancel)? == IngestStatus::Cancelled {
                return Ok(IngestStatus::Cancelled);
            }
        }
        Ok(IngestStatus::Completed)
    }
}
