//! Chunk filter pipeline
//!
//! Filters are recorded in application order and undone in reverse when
//! a chunk is read. A failing filter whose optional flag is set is
//! skipped; any other failure is fatal for the chunk. SZIP is
//! deliberately unsupported and always returns the same error.

use std::io::Read;

use h5f_core::constants::filter;
use h5f_core::message::{FilterDescription, FilterPipeline};
use h5f_core::FormatError;

use crate::error::Result;

/// Undo a pipeline: apply each filter's inverse in reverse index order.
pub fn apply_pipeline(data: Vec<u8>, pipeline: &FilterPipeline) -> Result<Vec<u8>> {
    let mut data = data;
    for filter in pipeline.filters.iter().rev() {
        match apply_filter(&data, filter) {
            Ok(out) => data = out,
            Err(err) if filter.is_optional() => {
                log::warn!(
                    "optional filter {} failed ({err}); passing chunk through",
                    filter.id
                );
            }
            Err(err) => return Err(err),
        }
    }
    Ok(data)
}

fn apply_filter(data: &[u8], filter: &FilterDescription) -> Result<Vec<u8>> {
    match filter.id {
        filter::DEFLATE => inflate(data),
        filter::SHUFFLE => {
            let element_size = filter.client_data.first().copied().unwrap_or(1) as usize;
            unshuffle(data, element_size)
        }
        filter::FLETCHER32 => strip_fletcher32(data),
        filter::BZIP2 => bunzip(data),
        filter::LZF => lzf_decompress(data),
        filter::SZIP => Err(FormatError::Unsupported("szip decoding").into()),
        _ => Err(FormatError::Unsupported("unrecognized filter id").into()),
    }
}

fn inflate(data: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    flate2::read::ZlibDecoder::new(data).read_to_end(&mut out)?;
    Ok(out)
}

fn bunzip(data: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    bzip2::read::BzDecoder::new(data).read_to_end(&mut out)?;
    Ok(out)
}

/// Invert the byte shuffle: the input holds all byte-0 values, then all
/// byte-1 values, and so on.
fn unshuffle(data: &[u8], element_size: usize) -> Result<Vec<u8>> {
    if element_size <= 1 {
        return Ok(data.to_vec());
    }
    if data.len() % element_size != 0 {
        return Err(FormatError::Inconsistent(
            "shuffled chunk length is not a multiple of the element size",
        )
        .into());
    }
    let count = data.len() / element_size;
    let mut out = vec![0u8; data.len()];
    for byte_index in 0..element_size {
        for element in 0..count {
            out[element * element_size + byte_index] = data[byte_index * count + element];
        }
    }
    Ok(out)
}

/// Drop the trailing checksum word. Verification stays deferred; the
/// stored sum is only logged for debugging.
fn strip_fletcher32(data: &[u8]) -> Result<Vec<u8>> {
    if data.len() < 4 {
        return Err(FormatError::Truncated("fletcher32 checksum trailer").into());
    }
    let split = data.len() - 4;
    let stored = u32::from_le_bytes([data[split], data[split + 1], data[split + 2], data[split + 3]]);
    log::debug!("fletcher32 trailer {stored:#010x} stripped without verification");
    Ok(data[..split].to_vec())
}

/// LZF decompression. Control bytes below 0x20 introduce a literal run
/// of `ctrl + 1` bytes; otherwise the top three bits give the
/// back-reference length (7 selects the long form with an extra length
/// byte) and the remaining bits plus the next byte give the 1-based
/// offset. Back-references may overlap the output being produced.
fn lzf_decompress(input: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(input.len() * 2);
    let mut pos = 0usize;
    while pos < input.len() {
        let ctrl = input[pos] as usize;
        pos += 1;
        if ctrl < 0x20 {
            let run = ctrl + 1;
            let literal = input
                .get(pos..pos + run)
                .ok_or(FormatError::Truncated("lzf literal run"))?;
            out.extend_from_slice(literal);
            pos += run;
        } else {
            let mut length = (ctrl >> 5) + 2;
            if ctrl >> 5 == 7 {
                let extra = *input
                    .get(pos)
                    .ok_or(FormatError::Truncated("lzf long back-reference"))?;
                length = extra as usize + 9;
                pos += 1;
            }
            let low = *input
                .get(pos)
                .ok_or(FormatError::Truncated("lzf back-reference offset"))?;
            pos += 1;
            let offset = ((ctrl & 0x1F) << 8 | low as usize) + 1;
            if offset > out.len() {
                return Err(FormatError::Inconsistent(
                    "lzf back-reference precedes the start of output",
                )
                .into());
            }
            // Byte-at-a-time so self-overlapping copies repeat.
            let mut from = out.len() - offset;
            for _ in 0..length {
                let byte = out[from];
                out.push(byte);
                from += 1;
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use flate2::write::ZlibEncoder;
    use flate2::Compression;
    use std::io::Write;

    fn deflate(data: &[u8]) -> Vec<u8> {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    fn shuffle(data: &[u8], element_size: usize) -> Vec<u8> {
        let count = data.len() / element_size;
        let mut out = vec![0u8; data.len()];
        for element in 0..count {
            for byte_index in 0..element_size {
                out[byte_index * count + element] = data[element * element_size + byte_index];
            }
        }
        out
    }

    #[test]
    fn test_shuffle_deflate_pipeline_inverse() {
        // Chunk on disk = deflate(shuffle(raw)); the inverse runs the
        // filters in reverse index order.
        let raw: Vec<u8> = [1i32, 2]
            .iter()
            .flat_map(|v| v.to_le_bytes())
            .collect();
        let on_disk = deflate(&shuffle(&raw, 4));

        let pipeline = FilterPipeline::new_v2(vec![
            FilterDescription::new(filter::SHUFFLE, 0, vec![4]),
            FilterDescription::new(filter::DEFLATE, 0, vec![]),
        ]);
        let restored = apply_pipeline(on_disk, &pipeline).unwrap();
        assert_eq!(restored, vec![0x01, 0, 0, 0, 0x02, 0, 0, 0]);
    }

    #[test]
    fn test_unshuffle_random_round_trip() {
        use rand::{Rng, SeedableRng};
        let mut rng = rand::rngs::StdRng::seed_from_u64(7);
        for element_size in [2usize, 4, 8] {
            let count: usize = rng.gen_range(1..64);
            let raw: Vec<u8> = (0..count * element_size).map(|_| rng.gen()).collect();
            assert_eq!(
                unshuffle(&shuffle(&raw, element_size), element_size).unwrap(),
                raw
            );
        }
    }

    #[test]
    fn test_unshuffle_rejects_ragged_input() {
        assert!(unshuffle(&[1, 2, 3], 2).is_err());
        assert_eq!(unshuffle(&[7, 8], 1).unwrap(), vec![7, 8]);
    }

    #[test]
    fn test_fletcher32_strips_trailer() {
        let out = strip_fletcher32(&[1, 2, 3, 0xAA, 0xBB, 0xCC, 0xDD]).unwrap();
        assert_eq!(out, vec![1, 2, 3]);
        assert!(strip_fletcher32(&[1, 2]).is_err());
    }

    #[test]
    fn test_bzip2_round_trip() {
        let raw = b"compressible compressible compressible".to_vec();
        let mut encoder =
            bzip2::write::BzEncoder::new(Vec::new(), bzip2::Compression::default());
        encoder.write_all(&raw).unwrap();
        let on_disk = encoder.finish().unwrap();

        let pipeline =
            FilterPipeline::new_v2(vec![FilterDescription::new(filter::BZIP2, 0, vec![])]);
        assert_eq!(apply_pipeline(on_disk, &pipeline).unwrap(), raw);
    }

    #[test]
    fn test_lzf_literal_run() {
        let input = [0x04, b'a', b'b', b'c', b'd', b'e'];
        assert_eq!(lzf_decompress(&input).unwrap(), b"abcde");
    }

    #[test]
    fn test_lzf_short_back_reference() {
        // Literal "abcde", then ctrl 0x20 0x04: length 3, offset 5.
        let input = [0x04, b'a', b'b', b'c', b'd', b'e', 0x20, 0x04];
        assert_eq!(lzf_decompress(&input).unwrap(), b"abcdeabc");
    }

    #[test]
    fn test_lzf_overlapping_self_copy() {
        // Literal "ab", then a back-reference of length 6 at offset 2
        // repeats the pair three times.
        let input = [0x01, b'a', b'b', 0x80, 0x01];
        assert_eq!(lzf_decompress(&input).unwrap(), b"abababab");
    }

    #[test]
    fn test_lzf_long_back_reference() {
        let mut input = vec![0x00, b'x']; // literal "x"
        input.extend_from_slice(&[0xE0, 0x03, 0x00]); // length 3 + 9, offset 1
        let out = lzf_decompress(&input).unwrap();
        assert_eq!(out, vec![b'x'; 13]);
    }

    #[test]
    fn test_lzf_bad_back_reference() {
        assert!(lzf_decompress(&[0x20, 0x10]).is_err());
    }

    #[test]
    fn test_szip_fixed_error() {
        let pipeline =
            FilterPipeline::new_v2(vec![FilterDescription::new(filter::SZIP, 0, vec![])]);
        match apply_pipeline(vec![1, 2, 3], &pipeline) {
            Err(Error::Format(FormatError::Unsupported(msg))) => {
                assert_eq!(msg, "szip decoding")
            }
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[test]
    fn test_optional_filter_failure_is_skipped() {
        // Corrupt deflate stream, but the filter is flagged optional.
        let pipeline =
            FilterPipeline::new_v2(vec![FilterDescription::new(filter::DEFLATE, 0x1, vec![])]);
        let out = apply_pipeline(vec![1, 2, 3], &pipeline).unwrap();
        assert_eq!(out, vec![1, 2, 3]);
    }

    #[test]
    fn test_non_optional_failure_is_fatal() {
        let pipeline =
            FilterPipeline::new_v2(vec![FilterDescription::new(filter::DEFLATE, 0, vec![])]);
        assert!(apply_pipeline(vec![1, 2, 3], &pipeline).is_err());
    }
}
