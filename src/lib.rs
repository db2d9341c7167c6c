pub use z80asm_common::*;
pub use z80asm_macros::*;

#[cfg(test)]
mod tests;
