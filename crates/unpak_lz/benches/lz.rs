use divan::AllocProfiler;

#[global_allocator]
static ALLOC: AllocProfiler = AllocProfiler::system();

fn main() {
    divan::main();
}

pub mod decompress {
    use divan::Bencher;
    use unpak_lz::Codec;

    const GROUPS: usize = 4096;

    /// eight literals followed by groups of eight maximal references
    fn lz10_input() -> (Vec<u8>, usize) {
        let mut input = vec![0x00];
        input.extend_from_slice(b"abcdefgh");
        for _ in 0..GROUPS {
            input.push(0xFF);
            for _ in 0..8 {
                input.extend_from_slice(&[0xF0, 0x07]);
            }
        }
        (input, 8 + GROUPS * 8 * 18)
    }

    fn rle_input() -> (Vec<u8>, usize) {
        let mut input = Vec::new();
        for i in 0..GROUPS {
            input.extend_from_slice(&[0xFF, i as u8]);
        }
        (input, GROUPS * 130)
    }

    #[divan::bench]
    fn lz10(bencher: Bencher) {
        bencher.with_inputs(lz10_input).bench_refs(|(input, len)| {
            divan::black_box(Codec::Lz10.decompress(input, *len).unwrap());
        });
    }

    #[divan::bench]
    fn rle(bencher: Bencher) {
        bencher.with_inputs(rle_input).bench_refs(|(input, len)| {
            divan::black_box(Codec::Rle.decompress(input, *len).unwrap());
        });
    }

    #[divan::bench]
    fn crilayla_literals(bencher: Bencher) {
        // a zero bit stream decodes to zero literals
        let body = 0x4000usize;
        let mut input = b"CRILAYLA".to_vec();
        input.extend_from_slice(&(body as u32).to_le_bytes());
        input.extend_from_slice(&((body * 9 / 8 + 1) as u32).to_le_bytes());
        input.extend(std::iter::repeat(0u8).take(body * 9 / 8 + 1));
        input.extend_from_slice(&[0u8; 0x100]);

        bencher.bench(|| {
            divan::black_box(Codec::CriLayla.decompress(&input, body).unwrap());
        });
    }
}
