//! Overbridge wire format: constants, block layout, and codec helpers.
//!
//! All multi-byte values on the wire are big-endian. The device streams
//! audio at 48kHz as interrupt transfers on endpoint `0x83` while the host
//! keeps a matching stream of silence flowing to endpoint `0x03`; the
//! device desynchronizes if either direction goes quiet.
//!
//! Both directions share the same block structure:
//!
//! ```text
//! +--------+-----------------+----------------+--------------------------+
//! | tag u16| counter u16 BE  | 28 reserved B  | samples i32 BE, channel- |
//! |        | (+7 per block)  |                | interleaved              |
//! +--------+-----------------+----------------+--------------------------+
//! ```
//!
//! Inbound blocks carry 7 samples x 12 channels (368 bytes); outbound
//! blocks carry 7 samples x 2 channels of silence (88 bytes). One inbound
//! transfer is 128 blocks, decoded into a single 10752-sample frame.
//!
//! Elektron's protocol notes describe 24-block transfers, but the transfer
//! sizes actually exchanged correspond to 128 inbound / 64 outbound blocks;
//! the larger values are what this module uses throughout.

/// Device sample rate in Hz.
pub const SAMPLE_RATE: u32 = 48_000;

/// Channels carried per inbound sample index, in wire order.
pub const IN_CHANNELS: usize = 12;

/// Channels carried per outbound (keep-alive) sample index.
pub const OUT_CHANNELS: usize = 2;

/// Samples per channel in a single block.
pub const SAMPLES_PER_BLOCK: usize = 7;

/// Blocks in one inbound transfer.
pub const BLOCKS_PER_TRANSFER: usize = 128;

/// Blocks in one outbound transfer.
pub const OUT_BLOCKS_PER_TRANSFER: usize = 64;

/// Tag bytes opening every device-to-host block.
pub const DEVICE_BLOCK_TAG: [u8; 2] = [0x07, 0x00];

/// Tag bytes opening every host-to-device block.
pub const HOST_BLOCK_TAG: [u8; 2] = [0x07, 0xff];

/// Bytes from the start of a block to its sample payload: tag (2),
/// counter (2), reserved (28).
pub const BLOCK_HEADER_LEN: usize = 32;

/// Total length of one inbound block in bytes.
pub const IN_BLOCK_LEN: usize = BLOCK_HEADER_LEN + IN_CHANNELS * SAMPLES_PER_BLOCK * 4;

/// Total length of one outbound block in bytes.
pub const OUT_BLOCK_LEN: usize = BLOCK_HEADER_LEN + OUT_CHANNELS * SAMPLES_PER_BLOCK * 4;

/// Byte length of one inbound interrupt transfer.
pub const IN_TRANSFER_LEN: usize = IN_BLOCK_LEN * BLOCKS_PER_TRANSFER;

/// Byte length of one outbound interrupt transfer.
pub const OUT_TRANSFER_LEN: usize = OUT_BLOCK_LEN * OUT_BLOCKS_PER_TRANSFER;

/// Samples in one fully decoded frame (one inbound transfer).
pub const FRAME_SAMPLES: usize = BLOCKS_PER_TRANSFER * SAMPLES_PER_BLOCK * IN_CHANNELS;

/// Expected advance of the device's sample counter between consecutive
/// inbound transfers. A larger observed delta means data was lost.
pub const TRANSFER_STRIDE: u16 = (BLOCKS_PER_TRANSFER * SAMPLES_PER_BLOCK) as u16;

/// Inbound (device-to-host) interrupt endpoint.
pub const ENDPOINT_IN: u8 = 0x83;

/// Outbound (host-to-device) interrupt endpoint.
pub const ENDPOINT_OUT: u8 = 0x03;

/// Inbound channel labels in wire order, repeating per sample index.
pub const CHANNEL_NAMES: [&str; IN_CHANNELS] = [
    "Master/FX 1",
    "Master/FX 2",
    "CH1",
    "CH2",
    "CH3",
    "CH4",
    "CH5",
    "CH6",
    "CH7",
    "CH8",
    "EXT IN 1",
    "EXT IN 2",
];

/// Reads the sample counter from the first block of a raw transfer.
///
/// Every block in a transfer carries a counter, but consecutive blocks
/// within one transfer are always contiguous; only the first block's value
/// is needed for gap detection across transfers.
pub fn transfer_counter(raw: &[u8]) -> u16 {
    u16::from_be_bytes([raw[2], raw[3]])
}

/// Decodes one raw inbound transfer into `samples`, preserving the wire's
/// channel interleaving and converting each value to host byte order.
///
/// Walks the transfer block by block, skipping each header and appending
/// the payload at a strictly increasing cursor. The loop bounds are fixed
/// by the transfer geometry; there is no per-sample conditional logic, so
/// the decode fits comfortably inside the transfer timeout it runs under.
///
/// `samples` should hold [`FRAME_SAMPLES`] entries; shorter buffers are
/// filled to capacity, trailing bytes of a short `raw` are ignored.
pub fn decode_transfer(raw: &[u8], samples: &mut [i32]) {
    let mut cursor = samples.iter_mut();
    for block in raw.chunks_exact(IN_BLOCK_LEN) {
        let payload = &block[BLOCK_HEADER_LEN..];
        for (dst, src) in cursor.by_ref().zip(payload.chunks_exact(4)) {
            *dst = i32::from_be_bytes([src[0], src[1], src[2], src[3]]);
        }
    }
}

/// Rewrites the block headers of an outbound keep-alive buffer, starting
/// at `counter`, and returns the counter value for the next transfer.
///
/// Only the headers change between submissions; the sample payload stays
/// zeroed, which the device accepts as silence.
pub fn fill_keepalive(buf: &mut [u8], counter: u16) -> u16 {
    let mut counter = counter;
    for block in buf.chunks_exact_mut(OUT_BLOCK_LEN) {
        block[..2].copy_from_slice(&HOST_BLOCK_TAG);
        block[2..4].copy_from_slice(&counter.to_be_bytes());
        counter = counter.wrapping_add(SAMPLES_PER_BLOCK as u16);
    }
    counter
}

/// Builds one raw inbound block with the given counter and a closure
/// producing the sample for (sample index, channel). Test helper shared
/// with the pipeline tests.
#[cfg(test)]
pub(crate) fn build_block(counter: u16, sample: impl Fn(usize, usize) -> i32) -> Vec<u8> {
    let mut block = vec![0u8; IN_BLOCK_LEN];
    block[..2].copy_from_slice(&DEVICE_BLOCK_TAG);
    block[2..4].copy_from_slice(&counter.to_be_bytes());
    let mut offset = BLOCK_HEADER_LEN;
    for s in 0..SAMPLES_PER_BLOCK {
        for ch in 0..IN_CHANNELS {
            block[offset..offset + 4].copy_from_slice(&sample(s, ch).to_be_bytes());
            offset += 4;
        }
    }
    block
}

/// Builds a full synthetic inbound transfer whose blocks start at
/// `first_counter` and advance contiguously. Test helper.
#[cfg(test)]
pub(crate) fn build_transfer(first_counter: u16, sample: impl Fn(usize) -> i32) -> Vec<u8> {
    let mut raw = Vec::with_capacity(IN_TRANSFER_LEN);
    for b in 0..BLOCKS_PER_TRANSFER {
        let counter = first_counter.wrapping_add((b * SAMPLES_PER_BLOCK) as u16);
        let base = b * SAMPLES_PER_BLOCK * IN_CHANNELS;
        raw.extend_from_slice(&build_block(counter, |s, ch| {
            sample(base + s * IN_CHANNELS + ch)
        }));
    }
    raw
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geometry_matches_wire_sizes() {
        // Sizes observed on the wire: 368-byte inbound blocks in 47104-byte
        // transfers, 88-byte outbound blocks in 5632-byte transfers.
        assert_eq!(IN_BLOCK_LEN, 368);
        assert_eq!(OUT_BLOCK_LEN, 88);
        assert_eq!(IN_TRANSFER_LEN, 47_104);
        assert_eq!(OUT_TRANSFER_LEN, 5_632);
        assert_eq!(FRAME_SAMPLES, 10_752);
        assert_eq!(TRANSFER_STRIDE, 896);
    }

    #[test]
    fn test_decode_single_block_ramp() {
        // Each (sample, channel) cell gets a unique value so ordering
        // mistakes cannot cancel out.
        let block = build_block(0, |s, ch| (s * IN_CHANNELS + ch) as i32);
        let mut samples = vec![0i32; SAMPLES_PER_BLOCK * IN_CHANNELS];
        decode_transfer(&block, &mut samples);

        for s in 0..SAMPLES_PER_BLOCK {
            for ch in 0..IN_CHANNELS {
                let idx = s * IN_CHANNELS + ch;
                assert_eq!(samples[idx], idx as i32, "sample {s} channel {ch}");
            }
        }
    }

    #[test]
    fn test_decode_is_big_endian() {
        let block = build_block(0, |_, _| 0x0102_0304);
        let mut samples = vec![0i32; SAMPLES_PER_BLOCK * IN_CHANNELS];
        decode_transfer(&block, &mut samples);
        assert_eq!(samples[0], 0x0102_0304);
        // The raw payload really is MSB-first.
        assert_eq!(&block[BLOCK_HEADER_LEN..BLOCK_HEADER_LEN + 4], &[1, 2, 3, 4]);
    }

    #[test]
    fn test_decode_negative_samples() {
        let block = build_block(0, |_, _| -1);
        let mut samples = vec![0i32; SAMPLES_PER_BLOCK * IN_CHANNELS];
        decode_transfer(&block, &mut samples);
        assert!(samples.iter().all(|&s| s == -1));
    }

    #[test]
    fn test_decode_full_transfer_cursor_advances_per_block() {
        let raw = build_transfer(0, |i| i as i32);
        assert_eq!(raw.len(), IN_TRANSFER_LEN);

        let mut samples = vec![0i32; FRAME_SAMPLES];
        decode_transfer(&raw, &mut samples);

        let expected: Vec<i32> = (0..FRAME_SAMPLES as i32).collect();
        assert_eq!(samples, expected);
    }

    #[test]
    fn test_transfer_counter_is_big_endian() {
        let block = build_block(0x1234, |_, _| 0);
        assert_eq!(transfer_counter(&block), 0x1234);
    }

    #[test]
    fn test_fill_keepalive_headers() {
        let mut buf = vec![0u8; OUT_TRANSFER_LEN];
        let next = fill_keepalive(&mut buf, 0);

        for (i, block) in buf.chunks_exact(OUT_BLOCK_LEN).enumerate() {
            assert_eq!(&block[..2], &HOST_BLOCK_TAG);
            let counter = u16::from_be_bytes([block[2], block[3]]);
            assert_eq!(counter as usize, i * SAMPLES_PER_BLOCK);
            // Payload stays silent.
            assert!(block[BLOCK_HEADER_LEN..].iter().all(|&b| b == 0));
        }
        assert_eq!(next as usize, OUT_BLOCKS_PER_TRANSFER * SAMPLES_PER_BLOCK);
    }

    #[test]
    fn test_fill_keepalive_counter_wraps() {
        let mut buf = vec![0u8; OUT_TRANSFER_LEN];
        let next = fill_keepalive(&mut buf, u16::MAX - 2);
        // First block keeps the seed value, later ones wrap modulo 2^16.
        assert_eq!(u16::from_be_bytes([buf[2], buf[3]]), u16::MAX - 2);
        let second = &buf[OUT_BLOCK_LEN..];
        assert_eq!(
            u16::from_be_bytes([second[2], second[3]]),
            (u16::MAX - 2).wrapping_add(SAMPLES_PER_BLOCK as u16)
        );
        assert_eq!(
            next,
            (u16::MAX - 2).wrapping_add((OUT_BLOCKS_PER_TRANSFER * SAMPLES_PER_BLOCK) as u16)
        );
    }
}
