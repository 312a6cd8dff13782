//! ZIP serialisation of downloaded images.

use crate::error::BundleError;
use crate::output::EntryResult;
use std::io::{Cursor, Write};
use tracing::info;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// DEFLATE level used unless configured otherwise.
pub const DEFAULT_COMPRESSION_LEVEL: u8 = 6;

fn zip_err(e: impl std::fmt::Display) -> BundleError {
    BundleError::ArchiveGeneration(e.to_string())
}

/// Write every present entry into an in-memory ZIP, in index order.
///
/// Absent entries (failed downloads) are skipped without a trace.
pub fn write_zip(entries: &[EntryResult], level: u8) -> Result<Vec<u8>, BundleError> {
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .compression_level(Some(i64::from(level.min(9))));

    let mut ordered: Vec<&EntryResult> = entries.iter().filter(|e| e.is_present()).collect();
    ordered.sort_by_key(|e| e.index);

    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for entry in &ordered {
        let Some(bytes) = &entry.bytes else { continue };
        writer.start_file(entry.name.as_str(), options).map_err(zip_err)?;
        writer.write_all(bytes).map_err(zip_err)?;
    }
    let buf = writer.finish().map_err(zip_err)?.into_inner();

    info!("ZIP assembled: {} entries, {} bytes", ordered.len(), buf.len());
    Ok(buf)
}

/// [`write_zip`] on the blocking pool; DEFLATE over a whole chapter is not cheap.
pub async fn render_zip(entries: Vec<EntryResult>, level: u8) -> Result<Vec<u8>, BundleError> {
    tokio::task::spawn_blocking(move || write_zip(&entries, level))
        .await
        .map_err(|e| BundleError::Internal(format!("ZIP task panicked: {e}")))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ImageError;
    use crate::pipeline::entry::entry_name;
    use bytes::Bytes;
    use std::io::Read;

    fn present(index: usize, body: &'static [u8]) -> EntryResult {
        EntryResult {
            index,
            name: entry_name(index),
            bytes: Some(Bytes::from_static(body)),
            error: None,
        }
    }

    fn absent(index: usize) -> EntryResult {
        EntryResult {
            index,
            name: entry_name(index),
            bytes: None,
            error: Some(ImageError::HttpStatus { status: 404 }),
        }
    }

    #[test]
    fn only_present_entries_are_written() {
        let entries = vec![present(2, b"third"), absent(1), present(0, b"first")];
        let bytes = write_zip(&entries, DEFAULT_COMPRESSION_LEVEL).unwrap();

        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        assert_eq!(archive.len(), 2);
        assert_eq!(archive.by_index(0).unwrap().name(), "image_001.jpg");
        assert_eq!(archive.by_index(1).unwrap().name(), "image_003.jpg");

        let mut body = String::new();
        archive
            .by_name("image_003.jpg")
            .unwrap()
            .read_to_string(&mut body)
            .unwrap();
        assert_eq!(body, "third");
    }

    #[test]
    fn entries_are_deflated() {
        let entries = vec![present(0, &[b'a'; 4096])];
        let bytes = write_zip(&entries, DEFAULT_COMPRESSION_LEVEL).unwrap();
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        let file = archive.by_index(0).unwrap();
        assert_eq!(file.compression(), CompressionMethod::Deflated);
        assert!(file.compressed_size() < file.size());
    }
}
