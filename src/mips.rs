// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! CPU mip generation shared by the devices.

/**
Halves an image by averaging 2x2 blocks of every byte channel.

Odd dimensions clamp the block to the last row/column, so a 3x1 image becomes 1x1 built from
texels 0 and 1.  Returns the new image with its dimensions.
*/
pub fn downsample_box(
    src: &[u8],
    width: u32,
    height: u32,
    bytes_per_pixel: usize,
) -> (Vec<u8>, u32, u32) {
    let (width, height) = (width as usize, height as usize);
    assert_eq!(
        src.len(),
        width * height * bytes_per_pixel,
        "source does not match its dimensions"
    );
    let dst_width = (width / 2).max(1);
    let dst_height = (height / 2).max(1);
    let mut dst = vec![0u8; dst_width * dst_height * bytes_per_pixel];
    for y in 0..dst_height {
        let y0 = (y * 2).min(height - 1);
        let y1 = (y * 2 + 1).min(height - 1);
        for x in 0..dst_width {
            let x0 = (x * 2).min(width - 1);
            let x1 = (x * 2 + 1).min(width - 1);
            for c in 0..bytes_per_pixel {
                let texel = |tx: usize, ty: usize| src[(ty * width + tx) * bytes_per_pixel + c] as u32;
                let sum = texel(x0, y0) + texel(x1, y0) + texel(x0, y1) + texel(x1, y1);
                //round to nearest
                dst[(y * dst_width + x) * bytes_per_pixel + c] = ((sum + 2) / 4) as u8;
            }
        }
    }
    (dst, dst_width as u32, dst_height as u32)
}

/// Builds levels `1..` from `base` until the chain has `levels` entries (base excluded).
pub fn build_chain(
    base: &[u8],
    width: u32,
    height: u32,
    bytes_per_pixel: usize,
    levels: u16,
) -> Vec<Vec<u8>> {
    let mut chain = Vec::with_capacity(levels as usize);
    let (mut current, mut w, mut h) = (base.to_vec(), width, height);
    for _ in 0..levels {
        let (next, nw, nh) = downsample_box(&current, w, h, bytes_per_pixel);
        chain.push(next.clone());
        current = next;
        w = nw;
        h = nh;
    }
    chain
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn averages_quads() {
        let src = [0u8, 10, 20, 30, 40, 50, 60, 70];
        //2x2 RG8
        let (dst, w, h) = downsample_box(&src, 2, 2, 2);
        assert_eq!((w, h), (1, 1));
        assert_eq!(dst, vec![30, 40]);
    }

    #[test]
    fn odd_width_clamps() {
        let (dst, w, h) = downsample_box(&[0, 100, 200], 3, 1, 1);
        assert_eq!((w, h), (1, 1));
        assert_eq!(dst, vec![50]);
    }

    #[test]
    fn chain_lengths() {
        let base = vec![255u8; 4 * 4 * 4];
        let chain = build_chain(&base, 4, 4, 4, 2);
        assert_eq!(chain.len(), 2);
        assert_eq!(chain[0].len(), 2 * 2 * 4);
        assert_eq!(chain[1], vec![255u8; 4]);
    }
}
