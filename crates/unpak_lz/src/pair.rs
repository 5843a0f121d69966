//! Byte-pair substitution.
//!
//! The payload is a sequence of blocks. Each block opens with a pair table that redefines some
//! byte codes as a pair of other codes, then a big-endian 16-bit count of packed bytes. Packed
//! bytes are expanded through the table with an explicit stack until only literal codes remain.
//!
//! Pair table encoding: a count byte above 127 skips `count - 127` codes that stay literal;
//! otherwise `count + 1` consecutive codes are defined, each by a left code and, when the left
//! code differs from the code itself, a right code. The table ends once code 256 is reached.
//!
//! The decoded total must match the declared size exactly.

use tracing::trace;

use crate::{
    error::{Error, Result},
    stream::{Input, Output},
};

const CODES: usize = 256;
const STACK_LIMIT: usize = 256;

struct PairTable {
    left: [u8; CODES],
    right: [u8; CODES],
}

impl PairTable {
    fn read(input: &mut Input<'_>) -> Result<Self> {
        let mut table = PairTable {
            left: [0u8; CODES],
            right: [0u8; CODES],
        };
        for (code, left) in table.left.iter_mut().enumerate() {
            *left = code as u8;
        }

        let mut code = 0usize;
        loop {
            let mut count = usize::from(input.read_u8()?);
            if count > 127 {
                code += count - 127;
                count = 0;
            }
            if code == CODES {
                return Ok(table);
            }

            for _ in 0..=count {
                if code >= CODES {
                    return Err(Error::CorruptStream(format!(
                        "pair table defines code {code}"
                    )));
                }
                let left = input.read_u8()?;
                table.left[code] = left;
                if usize::from(left) != code {
                    table.right[code] = input.read_u8()?;
                }
                code += 1;
            }

            if code == CODES {
                return Ok(table);
            }
        }
    }

    fn is_literal(&self, code: u8) -> bool {
        self.left[usize::from(code)] == code
    }
}

fn expand_block(
    input: &mut Input<'_>,
    table: &PairTable,
    packed_len: u16,
    output: &mut Output,
) -> Result<()> {
    let mut stack: Vec<u8> = Vec::with_capacity(STACK_LIMIT);
    let mut remaining = packed_len;
    loop {
        let code = match stack.pop() {
            Some(code) => code,
            None if remaining == 0 => return Ok(()),
            None => {
                remaining -= 1;
                input.read_u8()?
            }
        };

        if table.is_literal(code) {
            output.push_strict(code)?;
            continue;
        }

        if stack.len() + 2 > STACK_LIMIT {
            return Err(Error::CorruptStream(
                "pair expansion exceeds the stack limit".into(),
            ));
        }
        stack.push(table.right[usize::from(code)]);
        stack.push(table.left[usize::from(code)]);
    }
}

/// Decodes a byte-pair payload (the data following the 8-byte header)
pub fn decompress(input: &[u8], declared_len: usize) -> Result<Vec<u8>> {
    let mut output = Output::new(declared_len)?;
    let mut input = Input::new(input);

    while !input.is_empty() {
        let table = PairTable::read(&mut input)?;
        let packed_len = input.read_u16_be()?;
        trace!(packed_len, "expanding pair block");
        expand_block(&mut input, &table, packed_len, &mut output)?;
    }

    if output.position() != declared_len {
        return Err(Error::CorruptStream(format!(
            "decoded {} bytes but {declared_len} were declared",
            output.position()
        )));
    }
    Ok(output.into_inner())
}
