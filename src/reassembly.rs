use std::io::Read;

use log::{debug, trace};

use crate::codec::reader::Reader;
use crate::errors::{Error, Result};

// App ids below this are GoldSource titles with the nibble-packed header.
const GOLDSOURCE_APP_ID_LIMIT: u16 = 200;

// Legacy Source titles whose fragments omit the size field.
const NO_SIZE_FIELD_APP_IDS: [u16; 4] = [215, 17550, 17700, 240];
const NO_SIZE_FIELD_PROTOCOL: u8 = 7;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Compression {
    uncompressed_size: u32,
    crc32: u32,
}

#[derive(Debug)]
pub struct Reassembly {
    total: usize,
    fragments: Vec<Option<Vec<u8>>>,
    compression: Option<Compression>,
}

impl Reassembly {
    fn new(total: usize) -> Self {
        Self {
            total,
            fragments: (0..total).map(|_| None).collect(),
            compression: None,
        }
    }

    fn is_complete(&self) -> bool {
        self.fragments.iter().all(Option::is_some)
    }

    fn combine(self) -> Result<Vec<u8>> {
        let mut combined = Vec::new();
        for fragment in self.fragments.into_iter().flatten() {
            combined.extend_from_slice(&fragment);
        }

        match self.compression {
            None => Ok(combined),
            Some(meta) => {
                let mut decompressed = Vec::with_capacity(meta.uncompressed_size as usize);
                bzip2::read::BzDecoder::new(combined.as_slice())
                    .read_to_end(&mut decompressed)
                    .map_err(|e| Error::Decompress(e.to_string()))?;

                if decompressed.len() != meta.uncompressed_size as usize {
                    return Err(Error::Decompress(format!(
                        "expected {} bytes, got {}",
                        meta.uncompressed_size,
                        decompressed.len()
                    )));
                }

                let actual = crc32fast::hash(&decompressed);
                if actual != meta.crc32 {
                    return Err(Error::Checksum {
                        expected: meta.crc32,
                        actual,
                    });
                }

                Ok(decompressed)
            }
        }
    }
}

/// The combined payload still carries the inner single-packet framing
/// prefix; the dispatcher re-reads it once reassembly completes.
pub fn feed(
    slot: &mut Option<Reassembly>,
    body: &[u8],
    app_id: Option<u16>,
    protocol: Option<u8>,
) -> Result<Option<Vec<u8>>> {
    let mut r = Reader::new(body);

    let id = r.read_i32()?;
    let goldsource = matches!(app_id, Some(app) if app < GOLDSOURCE_APP_ID_LIMIT);

    let (index, total, compression) = if goldsource {
        let packed = r.read_u8()?;
        let index = (packed >> 4) as usize;
        let total = (packed & 0x0F) as usize;
        (index, total, None)
    } else {
        // Compression is flagged by the sign bit of the request id.
        let compressed = (id as u32) & 0x8000_0000 != 0;
        let total = r.read_u8()? as usize;
        let index = r.read_u8()? as usize;

        let legacy = protocol == Some(NO_SIZE_FIELD_PROTOCOL)
            && matches!(app_id, Some(app) if NO_SIZE_FIELD_APP_IDS.contains(&app));
        if !legacy {
            // Read but unused; its presence only moves the cursor.
            let _size = r.read_i16()?;
        }

        let compression = if index == 0 && compressed {
            Some(Compression {
                uncompressed_size: r.read_i32()? as u32,
                crc32: r.read_i32()? as u32,
            })
        } else {
            None
        };
        (index, total, compression)
    };

    if total == 0 {
        return Err(Error::Fragment("fragment count of zero".into()));
    }
    if index >= total {
        return Err(Error::Fragment(format!(
            "fragment id {} out of range 0..{}",
            index, total
        )));
    }

    let ctx = slot.get_or_insert_with(|| Reassembly::new(total));
    if ctx.total != total {
        return Err(Error::Fragment(format!(
            "fragment count changed from {} to {}",
            ctx.total, total
        )));
    }
    if compression.is_some() {
        ctx.compression = compression;
    }

    trace!(
        "fragment {}/{} of response {:#x}, {} bytes",
        index + 1,
        total,
        id,
        r.remaining()
    );
    ctx.fragments[index] = Some(r.rest().to_vec());

    if !ctx.is_complete() {
        return Ok(None);
    }

    debug!("reassembled {}-fragment response {:#x}", total, id);
    match slot.take() {
        Some(ctx) => ctx.combine().map(Some),
        None => Ok(None),
    }
}
