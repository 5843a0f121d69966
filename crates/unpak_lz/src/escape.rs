//! Run-length coding with an in-band escape byte.
//!
//! The first payload byte names the escape value. Every other byte is copied as is. After an
//! escape, a second escape stands for one literal escape byte; any other count `n` is followed by
//! the value to repeat `n` times, where a count of zero means 256.

use crate::{
    error::Result,
    stream::{Input, Output},
};

/// Decodes an escape RLE payload, starting with the escape byte
pub fn decompress(input: &[u8], declared_len: usize) -> Result<Vec<u8>> {
    let mut output = Output::new(declared_len)?;
    let mut input = Input::new(input);
    let escape = input.read_u8()?;

    while !output.is_full() {
        let byte = input.read_u8()?;
        if byte != escape {
            output.push(byte);
            continue;
        }

        let count = input.read_u8()?;
        if count == escape {
            output.push(escape);
            continue;
        }

        let value = input.read_u8()?;
        let count = match count {
            0 => 256,
            n => usize::from(n),
        };
        output.fill(value, count);
    }

    Ok(output.into_inner())
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::decompress;
    use crate::error::{Error, Result};

    #[test]
    fn literals_runs_and_escaped_escape() -> Result<()> {
        let input = [0xFE, b'A', 0xFE, 0x04, b'B', 0xFE, 0xFE, b'C'];
        assert_eq!(decompress(&input, 7)?, [b'A', b'B', b'B', b'B', b'B', 0xFE, b'C']);
        Ok(())
    }

    #[test]
    fn zero_count_is_a_full_run() -> Result<()> {
        let input = [0xFE, 0xFE, 0x00, b'z'];
        assert_eq!(decompress(&input, 256)?, vec![b'z'; 256]);
        Ok(())
    }

    #[test]
    fn literal_only_payload() -> Result<()> {
        let input = [0x1B, b'p', b'l', b'a', b'i', b'n'];
        assert_eq!(decompress(&input, 5)?, b"plain");
        Ok(())
    }

    #[test]
    fn dangling_escape_is_truncation() {
        let input = [0xFE, b'A', 0xFE];
        assert!(matches!(decompress(&input, 3), Err(Error::TruncatedInput)));
    }
}
