//! # Reference Kernel
//!
//! CPU implementation of the upscale kernel, byte-exact with the GPU
//! compute path: same quantization, same atlas walk, same integer
//! accumulate-and-round. Backs the deterministic tests and the tool's
//! `--cpu` mode on machines without an adapter.
//!
//! Pure functions over plain byte planes; any plane size works here, the
//! filter's admission gate is what pins the supported shapes.

use crate::lut::{LutTable, DELTA_BIAS, TILE_SIDE};

const T: u32 = TILE_SIDE;

/// Atlas walk offsets from a corner base. Matched to the table layout;
/// never reorder without regenerating the table.
const TAP_OFFSETS: [(u32, u32); 5] = [(0, 0), (0, T), (0, T + 1), (T, T + 1), (T + 1, T + 1)];

/// Texel channel per corner table (SE, NE, NW, SW) for each parity case.
const PARITY_CHANNELS: [[u32; 4]; 4] = [
    [0, 1, 3, 2],
    [1, 3, 2, 0],
    [2, 0, 1, 3],
    [3, 2, 0, 1],
];

/// Split an 8-bit level into its coarse atlas index and fine remainder.
#[inline]
fn quantize(level: u32) -> (u32, i32) {
    (level >> 4, (level & 15) as i32)
}

/// Blend weights for one corner walk. They telescope to a sum of 16 for
/// every remainder combination, keeping the blend a true weighted average.
#[inline]
fn simplex_weights(e: i32, n1: i32, n2: i32, n3: i32) -> [i32; 5] {
    [16 - e, e - n1, n1 - n2, n2 - n3, n3]
}

/// Compute one destination pixel.
pub fn upscale_pixel(
    lut: &LutTable,
    src: &[u8],
    src_w: u32,
    src_h: u32,
    dx: u32,
    dy: u32,
) -> u8 {
    let sx = (dx / 2) as i32;
    let sy = (dy / 2) as i32;

    // 3x3 stencil with clamp-to-edge sampling.
    let sample = |ox: i32, oy: i32| -> u32 {
        let x = (sx + ox).clamp(0, src_w as i32 - 1) as u32;
        let y = (sy + oy).clamp(0, src_h as i32 - 1) as u32;
        src[(y * src_w + x) as usize] as u32
    };

    let (qa, ra) = quantize(sample(-1, -1));
    let (qb, rb) = quantize(sample(0, -1));
    let (qc, rc) = quantize(sample(1, -1));
    let (qd, rd) = quantize(sample(-1, 0));
    let (qe, re) = quantize(sample(0, 0));
    let (qf, rf) = quantize(sample(1, 0));
    let (qg, rg) = quantize(sample(-1, 1));
    let (qh, rh) = quantize(sample(0, 1));
    let (qi, ri) = quantize(sample(1, 1));

    let parity = ((dx & 1) + 2 * (dy & 1)) as usize;

    // One table per quadrant, walked SE, NE, NW, SW to line up with the
    // parity channel order. Base packs (major * 17 + minor) per axis.
    let corners: [(u32, u32, [i32; 5]); 4] = [
        (qh * T + qi, qe * T + qf, simplex_weights(re, rf, rh, ri)),
        (qf * T + qc, qe * T + qb, simplex_weights(re, rb, rf, rc)),
        (qb * T + qa, qe * T + qd, simplex_weights(re, rd, rb, ra)),
        (qd * T + qg, qe * T + qh, simplex_weights(re, rh, rd, rg)),
    ];

    let mut acc: i32 = 0;
    for (&(base_x, base_y, weights), channel) in corners.iter().zip(PARITY_CHANNELS[parity]) {
        for (&(ox, oy), weight) in TAP_OFFSETS.iter().zip(weights) {
            let byte = lut.read_channel(base_x + ox, base_y + oy, channel) as i32;
            acc += weight * (byte - DELTA_BIAS);
        }
    }

    let clamped = acc.clamp(0, 16 * 255);
    ((clamped + 8) >> 4) as u8
}

/// Upscale a luma plane by 2x.
pub fn upscale_plane(lut: &LutTable, src: &[u8], src_w: u32, src_h: u32) -> Vec<u8> {
    debug_assert_eq!(src.len(), (src_w * src_h) as usize);
    let dst_w = src_w * crate::SCALE_FACTOR;
    let dst_h = src_h * crate::SCALE_FACTOR;
    let mut dst = vec![0u8; (dst_w * dst_h) as usize];
    for dy in 0..dst_h {
        for dx in 0..dst_w {
            dst[(dy * dst_w + dx) as usize] = upscale_pixel(lut, src, src_w, src_h, dx, dy);
        }
    }
    dst
}

/// Row-parallel variant of [`upscale_plane`].
#[cfg(feature = "rayon")]
pub fn upscale_plane_parallel(lut: &LutTable, src: &[u8], src_w: u32, src_h: u32) -> Vec<u8> {
    use rayon::prelude::*;

    debug_assert_eq!(src.len(), (src_w * src_h) as usize);
    let dst_w = src_w * crate::SCALE_FACTOR;
    let dst_h = src_h * crate::SCALE_FACTOR;
    let mut dst = vec![0u8; (dst_w * dst_h) as usize];
    dst.par_chunks_mut(dst_w as usize)
        .enumerate()
        .for_each(|(dy, row)| {
            for dx in 0..dst_w {
                row[dx as usize] = upscale_pixel(lut, src, src_w, src_h, dx, dy as u32);
            }
        });
    dst
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lut::{ATLAS_CHANNELS, ATLAS_SIDE, TABLE_BYTES};

    fn table_with(markers: &[(u32, u32, u32, u8)]) -> LutTable {
        let mut raw = vec![128u8; TABLE_BYTES];
        for &(x, y, channel, value) in markers {
            raw[((y * ATLAS_SIDE + x) * ATLAS_CHANNELS + channel) as usize] = value;
        }
        LutTable::from_bytes(raw).unwrap()
    }

    #[test]
    fn weights_always_sum_to_sixteen() {
        for e in 0..16 {
            for n1 in 0..16 {
                for n2 in 0..16 {
                    for n3 in 0..16 {
                        let w = simplex_weights(e, n1, n2, n3);
                        assert_eq!(w.iter().sum::<i32>(), 16, "weights {w:?}");
                    }
                }
            }
        }
    }

    #[test]
    fn quantize_splits_levels() {
        assert_eq!(quantize(0), (0, 0));
        assert_eq!(quantize(15), (0, 15));
        assert_eq!(quantize(16), (1, 0));
        assert_eq!(quantize(128), (8, 0));
        assert_eq!(quantize(255), (15, 15));
    }

    #[test]
    fn neutral_table_replicates_source() {
        let lut = LutTable::builtin();
        let src_w = 8u32;
        let src_h = 6u32;
        let src: Vec<u8> = (0..src_w * src_h)
            .map(|i| ((i * 41 + 7) % 256) as u8)
            .collect();

        let dst = upscale_plane(&lut, &src, src_w, src_h);
        assert_eq!(dst.len(), (src_w * src_h * 4) as usize);
        for dy in 0..src_h * 2 {
            for dx in 0..src_w * 2 {
                let expected = src[((dy / 2) * src_w + dx / 2) as usize];
                assert_eq!(
                    dst[(dy * src_w * 2 + dx) as usize],
                    expected,
                    "pixel ({dx},{dy})"
                );
            }
        }
    }

    #[test]
    fn flat_midtone_plane_stays_flat() {
        // Level 8 with remainder 0, the degenerate interpolation path.
        let lut = LutTable::builtin();
        let src = vec![128u8; 640 * 360];
        let dst = upscale_plane(&lut, &src, 640, 360);
        assert_eq!(dst.len(), 1280 * 720);
        assert!(dst.iter().all(|&v| v == 128));
    }

    #[test]
    fn portrait_orientation_doubles_both_axes() {
        let lut = LutTable::builtin();
        let src = vec![50u8; 6 * 10];
        let dst = upscale_plane(&lut, &src, 6, 10);
        assert_eq!(dst.len(), 12 * 20);
        assert!(dst.iter().all(|&v| v == 50));
    }

    #[test]
    fn single_pixel_source_clamps_the_stencil() {
        // Every stencil tap clamps to the one source pixel; level 200 has
        // remainder 8, so both the base and the carry row contribute.
        let lut = LutTable::builtin();
        let dst = upscale_plane(&lut, &[200], 1, 1);
        assert_eq!(dst, vec![200; 4]);
    }

    #[test]
    fn hand_computed_neighborhood() {
        // src (row-major 2x2): 16 32 / 48 64; all remainders 0, so only
        // each corner's base texel contributes, with weight 16.
        //
        // For destination (0,0) (parity 0, channels SE=0 NE=1 NW=3 SW=2)
        // the corner bases are SE (55,19), NE (36,18), NW (18,18),
        // SW (20,20). Destination (1,0) is parity 1 with channels rotated
        // to SE=1 NE=3 NW=2 SW=0.
        let lut = table_with(&[
            (55, 19, 0, 131), // +3  -> parity 0, SE
            (36, 18, 1, 133), // +5  -> parity 0, NE
            (18, 18, 3, 135), // +7  -> parity 0, NW
            (20, 20, 2, 139), // +11 -> parity 0, SW
            (55, 19, 1, 130), // +2  -> parity 1, SE
        ]);
        let src = [16u8, 32, 48, 64];
        let dst = upscale_plane(&lut, &src, 2, 2);

        // 16 * (3 + 5 + 7 + 11) / 16 = 26
        assert_eq!(dst[0], 26);
        // 16 * 2 / 16 = 2; the other three corners read unmarked texels
        assert_eq!(dst[1], 2);
    }

    #[test]
    fn accumulator_saturates_both_ways() {
        let hot = LutTable::from_bytes(vec![255u8; TABLE_BYTES]).unwrap();
        let cold = LutTable::from_bytes(vec![0u8; TABLE_BYTES]).unwrap();
        let src = vec![0u8; 4 * 4];

        assert!(upscale_plane(&hot, &src, 4, 4).iter().all(|&v| v == 255));
        assert!(upscale_plane(&cold, &src, 4, 4).iter().all(|&v| v == 0));
    }

    #[cfg(feature = "rayon")]
    #[test]
    fn parallel_path_matches_scalar() {
        let lut = LutTable::builtin();
        let src: Vec<u8> = (0..32 * 18).map(|i| (i % 251) as u8).collect();
        assert_eq!(
            upscale_plane(&lut, &src, 32, 18),
            upscale_plane_parallel(&lut, &src, 32, 18)
        );
    }
}
