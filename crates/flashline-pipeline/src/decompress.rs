//! Streaming decompression of the handed-off compressed bytes.

use std::io::Read;

/// Wraps a compressed byte reader into a decompressed one.
pub trait Decompressor: Send + Sync {
    fn name(&self) -> &'static str;

    fn decoder<'a>(&self, input: Box<dyn Read + 'a>) -> Box<dyn Read + 'a>;
}

/// bzip2, accepting concatenated streams as one image.
#[derive(Debug, Clone, Copy, Default)]
pub struct Bzip2;

impl Decompressor for Bzip2 {
    fn name(&self) -> &'static str { "bzip2" }

    fn decoder<'a>(&self, input: Box<dyn Read + 'a>) -> Box<dyn Read + 'a> {
        Box::new(bzip2::read::MultiBzDecoder::new(input))
    }
}

/// Decompress `input` lazily with `codec`.
pub fn decompress<'a, R: Read + 'a>(codec: &dyn Decompressor, input: R) -> Box<dyn Read + 'a> {
    codec.decoder(Box::new(input))
}
