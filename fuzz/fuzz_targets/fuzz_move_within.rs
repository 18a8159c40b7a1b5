#![no_main]
use libfuzzer_sys::fuzz_target;

use arbitrary::Arbitrary;
use fastmove::{Capabilities, Dispatcher, NativePrimitives};

#[derive(Debug, Arbitrary)]
enum Path {
    Auto,
    Bytewise,
    Wordwise,
}

#[derive(Debug, Arbitrary)]
struct Input {
    fast_byte_move: bool,
    fast_word_arch: bool,
    path: Path,
    len: u16,
    src: u16,
    dest: u16,
    count: u16,
}

fuzz_target!(|input: Input| {
    let len = input.len as usize;
    let src = (input.src as usize).min(len);
    let count = (input.count as usize).min(len - src);
    let dest = (input.dest as usize).min(len - count);

    let original = (0..len).map(|i| (i % 251) as u8).collect::<Vec<_>>();
    let mut expected = original.clone();
    expected.copy_within(src..src + count, dest);

    let caps = Capabilities::new(input.fast_byte_move, input.fast_word_arch);
    let dispatcher = Dispatcher::with_capabilities(caps, NativePrimitives::default());
    let mut buf = original;
    let (dst_span, src_span) = fastmove::overlapping_spans(&mut buf, src..src + count, dest);
    let moved = match input.path {
        Path::Bytewise if caps.fast_byte_move => dispatcher.move_span_bytewise(dst_span, src_span),
        Path::Wordwise if caps.fast_word_arch => dispatcher.move_span_wordwise(dst_span, src_span),
        _ => dispatcher.move_span(dst_span, src_span),
    };

    assert_eq!(buf, expected);
    assert_eq!(moved, if src == dest { 0 } else { count });
});
