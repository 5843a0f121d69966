//! Nintendo LZ77, compression type `0x11`.
//!
//! Same flag layout as [`crate::lz10`], but the high nibble of the first reference byte selects
//! one of three reference sizes:
//!
//! | Nibble | Bytes | Length                         | Distance                |
//! |--------|-------|--------------------------------|-------------------------|
//! | `0`    | 3     | 8 bits + 0x11                  | 12 bits + 1             |
//! | `1`    | 4     | 16 bits + 0x111                | 12 bits + 1             |
//! | `2..F` | 2     | nibble + 1                     | 12 bits + 1             |

use crate::{
    error::Result,
    stream::{Input, Output},
};

fn read_reference(input: &mut Input<'_>) -> Result<(usize, usize)> {
    let b0 = usize::from(input.read_u8()?);
    Ok(match b0 >> 4 {
        0 => {
            let b1 = usize::from(input.read_u8()?);
            let b2 = usize::from(input.read_u8()?);
            let length = ((b0 & 0x0F) << 4 | b1 >> 4) + 0x11;
            let distance = ((b1 & 0x0F) << 8 | b2) + 1;
            (length, distance)
        }
        1 => {
            let b1 = usize::from(input.read_u8()?);
            let b2 = usize::from(input.read_u8()?);
            let b3 = usize::from(input.read_u8()?);
            let length = ((b0 & 0x0F) << 12 | b1 << 4 | b2 >> 4) + 0x111;
            let distance = ((b2 & 0x0F) << 8 | b3) + 1;
            (length, distance)
        }
        nibble => {
            let b1 = usize::from(input.read_u8()?);
            let length = nibble + 1;
            let distance = ((b0 & 0x0F) << 8 | b1) + 1;
            (length, distance)
        }
    })
}

/// Decodes an LZ11 payload (the data following the 4-byte type and size header)
pub fn decompress(input: &[u8], declared_len: usize) -> Result<Vec<u8>> {
    let mut output = Output::new(declared_len)?;
    let mut input = Input::new(input);

    while !output.is_full() {
        let flags = input.read_u8()?;
        for bit in (0..8).rev() {
            if output.is_full() {
                break;
            }

            if flags & (1 << bit) != 0 {
                let (length, distance) = read_reference(&mut input)?;
                output.copy_back(distance, length)?;
            } else {
                output.push(input.read_u8()?);
            }
        }
    }

    Ok(output.into_inner())
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::decompress;
    use crate::error::{Error, Result};

    #[test]
    fn short_reference() -> Result<()> {
        let input = [0x10, b'A', b'B', b'C', 0x50, 0x02];
        assert_eq!(decompress(&input, 9)?, b"ABCABCABC");
        Ok(())
    }

    #[test]
    fn medium_reference() -> Result<()> {
        let input = [0x40, b'A', 0x00, 0x20, 0x00];
        assert_eq!(decompress(&input, 20)?, vec![b'A'; 20]);
        Ok(())
    }

    #[test]
    fn long_reference() -> Result<()> {
        // 0x111 + 0x10 = 289 copies of the previous byte
        let input = [0x40, b'x', 0x10, 0x01, 0x00, 0x00];
        assert_eq!(decompress(&input, 290)?, vec![b'x'; 290]);
        Ok(())
    }

    #[test]
    fn partial_reference_is_truncation() {
        let input = [0x40, b'A', 0x00, 0x20];
        assert!(matches!(decompress(&input, 20), Err(Error::TruncatedInput)));
    }
}
