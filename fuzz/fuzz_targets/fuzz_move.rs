#![no_main]
use libfuzzer_sys::fuzz_target;

use arbitrary::Arbitrary;
use fastmove::{Capabilities, Dispatcher, NativePrimitives};

#[derive(Debug, Arbitrary)]
struct Input {
    fast_byte_move: bool,
    fast_word_arch: bool,
    dst_len: u16,
    src: Vec<u8>,
}

fuzz_target!(|input: Input| {
    let caps = Capabilities::new(input.fast_byte_move, input.fast_word_arch);
    let dispatcher = Dispatcher::with_capabilities(caps, NativePrimitives::default());
    let mut dst = vec![0xAAu8; input.dst_len as usize];
    let n = dst.len().min(input.src.len());

    assert_eq!(dispatcher.move_slice(&mut dst, &input.src), n);
    assert_eq!(&dst[..n], &input.src[..n]);
    assert!(dst[n..].iter().all(|&b| b == 0xAA));
});
