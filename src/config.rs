// ABOUTME: Configuration and constants for the Lissp transpiler

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Primary REPL prompt.
pub const PS1: &str = "#> ";

/// Continuation REPL prompt.
pub const PS2: &str = "#..";

/// The number of bytes gensym hashes have.
///
/// The default 5 bytes (40 bits) is more than sufficient space to
/// eliminate collisions with typical usage: dozens of gensyms in the
/// same scope have less than a one-in-a-billion chance of collision,
/// even assuming they all share a suffix. Each hash character encodes
/// 5 bits (Base32), so a multiple of 5 keeps the encoding dense.
pub const GENSYM_BYTES: usize = 5;

/// Highest pickle protocol the binary fallback arm may use.
///
/// Protocol 0 (the readable text protocol) is always considered as
/// well; the emitter picks whichever encoding is shorter.
pub const MAX_PICKLE_PROTOCOL: u8 = 3;
