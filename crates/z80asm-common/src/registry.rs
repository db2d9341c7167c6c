//! The mnemonic → variant table.
//!
//! The table is data, not code: it is deserialized from JSON, validated once
//! at load time and then shared read-only between any number of assemblies.

use once_cell::sync::Lazy;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

const BUNDLED_JSON: &str = include_str!("../data/z80.json");

static BUNDLED: Lazy<Arc<Registry>> = Lazy::new(|| {
    Arc::new(Registry::from_json(BUNDLED_JSON).expect("bundled Z80 variant table is valid"))
});

/// Typed operand slot of a pattern or opcode template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlaceholderKind {
    Imm8,
    Imm16,
    IndexDisplacement,
    RelativeOffset,
    BitIndex,
    ConditionCode,
}

impl PlaceholderKind {
    /// Maps the names used in the table data (`nn`, `nnnn`, `dd`, `offset`, `bit`, `cc`).
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "nn" => Some(Self::Imm8),
            "nnnn" => Some(Self::Imm16),
            "dd" => Some(Self::IndexDisplacement),
            "offset" => Some(Self::RelativeOffset),
            "bit" => Some(Self::BitIndex),
            "cc" => Some(Self::ConditionCode),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Imm8 => "nn",
            Self::Imm16 => "nnnn",
            Self::IndexDisplacement => "dd",
            Self::RelativeOffset => "offset",
            Self::BitIndex => "bit",
            Self::ConditionCode => "cc",
        }
    }

    /// Number of bytes the slot occupies in the emitted instruction.
    pub fn width(self) -> usize {
        match self {
            Self::Imm16 => 2,
            _ => 1,
        }
    }

    /// Inclusive range of values accepted for the slot. `Imm8` additionally
    /// accepts -128..=-1 when the source wrote a signed literal.
    pub fn bounds(self) -> (i64, i64) {
        match self {
            Self::Imm8 => (0, 0xFF),
            Self::Imm16 => (0, 0xFFFF),
            Self::IndexDisplacement | Self::RelativeOffset => (-128, 127),
            Self::BitIndex | Self::ConditionCode => (0, 7),
        }
    }

    /// Whether an operand expression of this static category can fill the slot.
    pub fn accepts(self, category: crate::expr::ExprCategory) -> bool {
        use crate::expr::ExprCategory;
        match self {
            Self::BitIndex | Self::ConditionCode => category == ExprCategory::Number,
            _ => true,
        }
    }
}

impl fmt::Display for PlaceholderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One element of a variant's operand pattern.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Token {
    /// Register, condition, punctuation or fixed number, stored lower-case.
    Literal(String),
    Placeholder(PlaceholderKind),
}

impl Token {
    /// Value of a fixed numeric literal such as the `3` in `bit 3,a`.
    pub fn numeric_literal(&self) -> Option<i64> {
        match self {
            Token::Literal(text) => text.parse().ok(),
            Token::Placeholder(_) => None,
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Literal(text) => f.write_str(text),
            Token::Placeholder(kind) => write!(f, "{}", kind),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemplateByte {
    Fixed(u8),
    Slot(PlaceholderKind),
}

/// Flags tracked per variant, in the positional order of the table's flag string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Flag {
    Carry,
    Subtract,
    ParityOverflow,
    HalfCarry,
    Zero,
    Sign,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlagEffect {
    Set,
    Clear,
    Preserved,
    Computed,
    Toggled,
    Parity,
    Overflow,
}

impl FlagEffect {
    fn from_char(c: char) -> Option<Self> {
        match c {
            '1' => Some(Self::Set),
            '0' => Some(Self::Clear),
            '-' => Some(Self::Preserved),
            '+' => Some(Self::Computed),
            '*' => Some(Self::Toggled),
            'P' => Some(Self::Parity),
            'V' => Some(Self::Overflow),
            _ => None,
        }
    }

    fn as_char(self) -> char {
        match self {
            Self::Set => '1',
            Self::Clear => '0',
            Self::Preserved => '-',
            Self::Computed => '+',
            Self::Toggled => '*',
            Self::Parity => 'P',
            Self::Overflow => 'V',
        }
    }
}

/// Parsed form of the six-character flag string, e.g. `"+0P0++"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FlagEffects([FlagEffect; 6]);

impl FlagEffects {
    pub fn parse(flags: &str) -> Option<Self> {
        let mut effects = [FlagEffect::Preserved; 6];
        let mut chars = flags.chars();
        for slot in effects.iter_mut() {
            *slot = FlagEffect::from_char(chars.next()?)?;
        }
        if chars.next().is_some() {
            return None;
        }
        Some(Self(effects))
    }

    pub fn get(&self, flag: Flag) -> FlagEffect {
        self.0[flag as usize]
    }
}

impl fmt::Display for FlagEffects {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for effect in self.0 {
            write!(f, "{}", effect.as_char())?;
        }
        Ok(())
    }
}

/// T-states when a conditional branch is taken and when it falls through.
/// Unconditional instructions carry the same count twice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CycleCounts {
    pub taken: u8,
    pub not_taken: u8,
}

/// One operand-pattern/opcode-encoding form of a mnemonic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variant {
    pub mnemonic: String,
    pub pattern: Vec<Token>,
    pub template: Vec<TemplateByte>,
    pub byte_count: u8,
    pub cycles: CycleCounts,
    pub flags: FlagEffects,
    pub documented: bool,
    pub description: String,
    /// Set on the shorthand generated from an `a,x` row.
    pub implicit_accumulator: bool,
    /// Set on alternate spellings generated at load time, like `jp hl`.
    pub alias: bool,
    /// Convenience form that expands to more than one real instruction.
    pub pseudo: bool,
}

impl Variant {
    /// Placeholder slots in template order.
    pub fn slots(&self) -> impl Iterator<Item = PlaceholderKind> + '_ {
        self.template.iter().filter_map(|byte| match byte {
            TemplateByte::Slot(kind) => Some(*kind),
            TemplateByte::Fixed(_) => None,
        })
    }

    /// Width of the template: fixed bytes plus placeholder widths.
    pub fn template_width(&self) -> usize {
        self.template
            .iter()
            .map(|byte| match byte {
                TemplateByte::Fixed(_) => 1,
                TemplateByte::Slot(kind) => kind.width(),
            })
            .sum()
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.mnemonic)?;
        if self.pattern.is_empty() {
            return Ok(());
        }
        f.write_str(" ")?;
        let mut last_was_word = false;
        for token in &self.pattern {
            let is_word = !matches!(token, Token::Literal(t) if matches!(t.as_str(), "(" | ")" | "," | "+"));
            if last_was_word && is_word {
                f.write_str(" ")?;
            }
            write!(f, "{}", token)?;
            last_was_word = is_word;
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Invalid registry JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{variant}: unknown placeholder `{name}` in opcode template")]
    UnknownPlaceholder { variant: String, name: String },

    #[error("{variant}: declared byte count {declared} but template is {computed} bytes")]
    ByteCountMismatch {
        variant: String,
        declared: u8,
        computed: usize,
    },

    #[error("{variant}: pattern placeholders do not match template placeholders")]
    PlaceholderOrder { variant: String },

    #[error("{variant}: malformed flag string `{flags}`")]
    BadFlags { variant: String, flags: String },

    #[error("{variant}: pattern listed more than once")]
    DuplicatePattern { variant: String },

    #[error("{variant}: implicit accumulator form requires a pattern starting with `a,`")]
    NotAccumulatorForm { variant: String },
}

#[derive(Debug, Deserialize)]
struct RawRegistry {
    mnemonics: BTreeMap<String, Vec<RawVariant>>,
}

#[derive(Debug, Deserialize)]
struct RawVariant {
    tokens: Vec<String>,
    opcode: Vec<RawTemplateByte>,
    byte_count: u8,
    cycles: (u8, u8),
    flags: String,
    #[serde(default)]
    undocumented: bool,
    #[serde(default)]
    implicit_accumulator: bool,
    #[serde(default)]
    pseudo: bool,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawTemplateByte {
    Byte(u8),
    Name(String),
}

/// Immutable mnemonic → ordered variant list.
#[derive(Debug, Default)]
pub struct Registry {
    mnemonics: HashMap<String, Vec<Arc<Variant>>>,
}

impl Registry {
    /// The full Z80 table shipped with this crate.
    pub fn bundled() -> Arc<Registry> {
        Arc::clone(&BUNDLED)
    }

    pub fn from_json(json: &str) -> Result<Registry, RegistryError> {
        let raw: RawRegistry = serde_json::from_str(json)?;
        let mut registry = Registry {
            mnemonics: HashMap::with_capacity(raw.mnemonics.len()),
        };
        let mut aliases = Vec::new();

        for (mnemonic, rows) in raw.mnemonics {
            let mnemonic = mnemonic.to_ascii_lowercase();
            registry.mnemonics.entry(mnemonic.clone()).or_default();
            for row in rows {
                let wants_shorthand = row.implicit_accumulator;
                let variant = build_variant(&mnemonic, row)?;
                aliases.extend(aliases_of(&variant));
                let shorthand = if wants_shorthand {
                    Some(shorthand_of(&variant)?)
                } else {
                    None
                };
                for v in std::iter::once(variant).chain(shorthand) {
                    registry.insert(v)?;
                }
            }
        }

        // Rows written out in the table take precedence over generated spellings.
        for alias in aliases {
            if !registry.has_pattern(&alias.mnemonic, &alias.pattern) {
                registry.insert(alias)?;
            }
        }

        Ok(registry)
    }

    fn insert(&mut self, variant: Variant) -> Result<(), RegistryError> {
        if self.has_pattern(&variant.mnemonic, &variant.pattern) {
            return Err(RegistryError::DuplicatePattern {
                variant: variant.to_string(),
            });
        }
        self.mnemonics
            .entry(variant.mnemonic.clone())
            .or_default()
            .push(Arc::new(variant));
        Ok(())
    }

    fn has_pattern(&self, mnemonic: &str, pattern: &[Token]) -> bool {
        self.mnemonics
            .get(mnemonic)
            .map_or(false, |variants| variants.iter().any(|v| v.pattern == pattern))
    }

    /// Candidates for `mnemonic` in table order; lookup ignores case.
    pub fn variants(&self, mnemonic: &str) -> Option<&[Arc<Variant>]> {
        self.mnemonics
            .get(&mnemonic.to_ascii_lowercase())
            .map(Vec::as_slice)
    }

    pub fn contains(&self, mnemonic: &str) -> bool {
        self.variants(mnemonic).is_some()
    }

    /// Every variant, mnemonics in alphabetical order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Variant>> {
        let mut names: Vec<&String> = self.mnemonics.keys().collect();
        names.sort();
        names
            .into_iter()
            .flat_map(move |name| self.mnemonics[name].iter())
    }

    pub fn mnemonic_count(&self) -> usize {
        self.mnemonics.len()
    }

    pub fn len(&self) -> usize {
        self.mnemonics.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.mnemonics.is_empty()
    }
}

fn build_variant(mnemonic: &str, row: RawVariant) -> Result<Variant, RegistryError> {
    let describe = || format!("{} {}", mnemonic, row.tokens.join(""));

    let pattern: Vec<Token> = row
        .tokens
        .iter()
        .map(|t| match PlaceholderKind::from_name(t) {
            Some(kind) => Token::Placeholder(kind),
            None => Token::Literal(t.to_ascii_lowercase()),
        })
        .collect();

    let mut template = Vec::with_capacity(row.opcode.len());
    for byte in &row.opcode {
        template.push(match byte {
            RawTemplateByte::Byte(b) => TemplateByte::Fixed(*b),
            RawTemplateByte::Name(name) => {
                let kind = PlaceholderKind::from_name(name).ok_or_else(|| {
                    RegistryError::UnknownPlaceholder {
                        variant: describe(),
                        name: name.clone(),
                    }
                })?;
                TemplateByte::Slot(kind)
            }
        });
    }

    let flags = FlagEffects::parse(&row.flags).ok_or_else(|| RegistryError::BadFlags {
        variant: describe(),
        flags: row.flags.clone(),
    })?;

    let variant = Variant {
        mnemonic: mnemonic.to_string(),
        pattern,
        template,
        byte_count: row.byte_count,
        cycles: CycleCounts {
            taken: row.cycles.0,
            not_taken: row.cycles.1,
        },
        flags,
        documented: !row.undocumented,
        description: row.description,
        implicit_accumulator: false,
        alias: false,
        pseudo: row.pseudo,
    };

    let computed = variant.template_width();
    if computed != usize::from(variant.byte_count) {
        return Err(RegistryError::ByteCountMismatch {
            variant: variant.to_string(),
            declared: variant.byte_count,
            computed,
        });
    }

    let in_pattern = variant.pattern.iter().filter_map(|t| match t {
        Token::Placeholder(kind) => Some(*kind),
        Token::Literal(_) => None,
    });
    if !in_pattern.eq(variant.slots()) {
        return Err(RegistryError::PlaceholderOrder {
            variant: variant.to_string(),
        });
    }

    Ok(variant)
}

/// `add a,b` → `add b`, sharing the template and metadata.
fn shorthand_of(canonical: &Variant) -> Result<Variant, RegistryError> {
    let accumulator = Token::Literal("a".to_string());
    let comma = Token::Literal(",".to_string());
    match canonical.pattern.as_slice() {
        [first, second, rest @ ..] if *first == accumulator && *second == comma => Ok(Variant {
            pattern: rest.to_vec(),
            implicit_accumulator: true,
            ..canonical.clone()
        }),
        _ => Err(RegistryError::NotAccumulatorForm {
            variant: canonical.to_string(),
        }),
    }
}

fn is_literal(token: &Token, text: &str) -> bool {
    matches!(token, Token::Literal(t) if t == text)
}

/// Other accepted spellings of a table row:
///
/// * `jp hl` for `jp (hl)`, and likewise for `ix` and `iy`;
/// * `nv` and `v` for the `po` and `pe` conditions;
/// * `ex af,af` for `ex af,af'`;
/// * `ld b,rlc (ix+d)` for the undocumented `rlc (ix+d),b` register copies.
fn aliases_of(variant: &Variant) -> Vec<Variant> {
    let literal = |text: &str| Token::Literal(text.to_string());
    let alias = |mnemonic: &str, pattern: Vec<Token>| Variant {
        mnemonic: mnemonic.to_string(),
        pattern,
        alias: true,
        ..variant.clone()
    };
    let pattern = variant.pattern.as_slice();
    let mut aliases = Vec::new();

    if variant.mnemonic == "jp" {
        if let [open, register, close] = pattern {
            if is_literal(open, "(")
                && is_literal(close, ")")
                && ["hl", "ix", "iy"].iter().any(|r| is_literal(register, r))
            {
                aliases.push(alias("jp", vec![register.clone()]));
            }
        }
    }

    if let Some((first, rest)) = pattern.split_first() {
        let renamed = if is_literal(first, "po") {
            Some("nv")
        } else if is_literal(first, "pe") {
            Some("v")
        } else {
            None
        };
        if let Some(condition) = renamed {
            let tokens = std::iter::once(literal(condition))
                .chain(rest.iter().cloned())
                .collect();
            aliases.push(alias(variant.mnemonic.as_str(), tokens));
        }
    }

    if pattern.iter().any(|t| is_literal(t, "af'")) {
        let tokens = pattern
            .iter()
            .map(|t| if is_literal(t, "af'") { literal("af") } else { t.clone() })
            .collect();
        aliases.push(alias(variant.mnemonic.as_str(), tokens));
    }

    if let [TemplateByte::Fixed(0xDD | 0xFD), TemplateByte::Fixed(0xCB), ..] =
        variant.template.as_slice()
    {
        if let [operand @ .., comma, register] = pattern {
            if is_literal(comma, ",") {
                let mut tokens = vec![
                    register.clone(),
                    literal(","),
                    literal(variant.mnemonic.as_str()),
                ];
                tokens.extend(operand.iter().cloned());
                aliases.push(alias("ld", tokens));
            }
        }
    }

    aliases
}
