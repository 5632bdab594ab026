//! Program image loading.

use sailfoil_mem::{MemResult, Memory};
use serde::{Deserialize, Serialize};

/// Name of the section whose address the host polls for completion.
pub const TOHOST_SECTION: &str = ".tohost";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub name: String,
    pub base: u64,
    pub data: Vec<u8>,
}

/// A loadable binary: ordered sections plus the entry address.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Image {
    pub sections: Vec<Section>,
    pub entry: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadReport {
    pub entry: u64,
    pub tohost: Option<u64>,
    pub bytes: u64,
}

/// Copy every section into `memory` at its base address, in order.
/// Later sections overwrite earlier ones where they overlap.
pub fn load_image(memory: &mut impl Memory, image: &Image) -> MemResult<LoadReport> {
    let mut report = LoadReport {
        entry: image.entry,
        tohost: None,
        bytes: 0,
    };
    for section in &image.sections {
        memory.write_bytes(section.base, &section.data)?;
        report.bytes += section.data.len() as u64;
        tracing::debug!(
            section = %section.name,
            base = section.base,
            len = section.data.len(),
            "loaded section"
        );
        if section.name == TOHOST_SECTION {
            report.tohost = Some(section.base);
        }
    }
    Ok(report)
}
