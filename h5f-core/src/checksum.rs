//! Metadata checksums used by the on-disk structures
//!
//! Jenkins lookup3 is the workhorse: it protects v2/v3 superblocks and
//! B-tree v2 nodes, and doubles as the name hash of the dense-attribute
//! name index. The v4 superblock instead declares its algorithm: CRC32
//! (code 1) or the 16-bit Fletcher variant (code 2).

/// Jenkins lookup3 `hashlittle` over a byte slice.
///
/// This is the byte-oriented variant: the result does not depend on the
/// alignment of the input.
pub fn lookup3(data: &[u8], init: u32) -> u32 {
    let mut a: u32 = 0xdead_beef_u32
        .wrapping_add(data.len() as u32)
        .wrapping_add(init);
    let mut b = a;
    let mut c = a;

    let word = |k: &[u8], off: usize| -> u32 {
        u32::from_le_bytes([k[off], k[off + 1], k[off + 2], k[off + 3]])
    };

    let mut k = data;
    while k.len() > 12 {
        a = a.wrapping_add(word(k, 0));
        b = b.wrapping_add(word(k, 4));
        c = c.wrapping_add(word(k, 8));

        a = a.wrapping_sub(c);
        a ^= c.rotate_left(4);
        c = c.wrapping_add(b);
        b = b.wrapping_sub(a);
        b ^= a.rotate_left(6);
        a = a.wrapping_add(c);
        c = c.wrapping_sub(b);
        c ^= b.rotate_left(8);
        b = b.wrapping_add(a);
        a = a.wrapping_sub(c);
        a ^= c.rotate_left(16);
        c = c.wrapping_add(b);
        b = b.wrapping_sub(a);
        b ^= a.rotate_left(19);
        a = a.wrapping_add(c);
        c = c.wrapping_sub(b);
        c ^= b.rotate_left(4);
        b = b.wrapping_add(a);

        k = &k[12..];
    }

    if k.is_empty() {
        return c;
    }

    // The reference tail switch is equivalent to zero-extending the last
    // block to 12 bytes.
    let mut tail = [0u8; 12];
    tail[..k.len()].copy_from_slice(k);
    a = a.wrapping_add(word(&tail, 0));
    b = b.wrapping_add(word(&tail, 4));
    c = c.wrapping_add(word(&tail, 8));

    c ^= b;
    c = c.wrapping_sub(b.rotate_left(14));
    a ^= c;
    a = a.wrapping_sub(c.rotate_left(11));
    b ^= a;
    b = b.wrapping_sub(a.rotate_left(25));
    c ^= b;
    c = c.wrapping_sub(b.rotate_left(16));
    a ^= c;
    a = a.wrapping_sub(c.rotate_left(4));
    b ^= a;
    b = b.wrapping_sub(a.rotate_left(14));
    c ^= b;
    c = c.wrapping_sub(b.rotate_left(24));
    c
}

/// The metadata checksum: lookup3 with a zero seed.
pub fn metadata_checksum(data: &[u8]) -> u32 {
    lookup3(data, 0)
}

/// CRC32 (the v4 superblock's algorithm 1).
pub fn crc32(data: &[u8]) -> u32 {
    crc32fast::hash(data)
}

/// The Fletcher-32 variant over 16-bit big-endian words, with the odd
/// trailing byte treated as the high half of a final word. Used by the
/// Fletcher32 filter and the v4 superblock's algorithm 2.
pub fn fletcher32(data: &[u8]) -> u32 {
    const FOLD_RUN: usize = 360;

    let fold = |sum: u32| (sum & 0xFFFF) + (sum >> 16);

    let mut sum1: u32 = 0;
    let mut sum2: u32 = 0;
    let mut run = 0usize;

    // Folding every 360 words keeps the 32-bit sums from overflowing.
    let words = data.chunks_exact(2);
    let odd_tail = words.remainder().first().copied();
    for w in words {
        sum1 = sum1.wrapping_add(((w[0] as u32) << 8) | w[1] as u32);
        sum2 = sum2.wrapping_add(sum1);
        run += 1;
        if run == FOLD_RUN {
            sum1 = fold(sum1);
            sum2 = fold(sum2);
            run = 0;
        }
    }
    if run > 0 {
        sum1 = fold(sum1);
        sum2 = fold(sum2);
    }

    if let Some(last) = odd_tail {
        sum1 = sum1.wrapping_add((last as u32) << 8);
        sum2 = sum2.wrapping_add(sum1);
        sum1 = fold(sum1);
        sum2 = fold(sum2);
    }

    sum1 = (sum1 & 0xFFFF) + (sum1 >> 16);
    sum2 = (sum2 & 0xFFFF) + (sum2 >> 16);
    (sum2 << 16) | sum1
}
