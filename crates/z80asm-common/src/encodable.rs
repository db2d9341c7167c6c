/// Rust values that can stand in for an operand expression.
pub trait Z80Encodable {
    fn to_operand_value(&self) -> i64;
}

impl Z80Encodable for u8 {
    fn to_operand_value(&self) -> i64 {
        i64::from(*self)
    }
}

impl Z80Encodable for i8 {
    fn to_operand_value(&self) -> i64 {
        i64::from(*self)
    }
}

impl Z80Encodable for u16 {
    fn to_operand_value(&self) -> i64 {
        i64::from(*self)
    }
}

impl Z80Encodable for i16 {
    fn to_operand_value(&self) -> i64 {
        i64::from(*self)
    }
}

impl Z80Encodable for u32 {
    fn to_operand_value(&self) -> i64 {
        i64::from(*self)
    }
}

impl Z80Encodable for i32 {
    fn to_operand_value(&self) -> i64 {
        i64::from(*self)
    }
}

impl Z80Encodable for i64 {
    fn to_operand_value(&self) -> i64 {
        *self
    }
}

impl Z80Encodable for char {
    fn to_operand_value(&self) -> i64 {
        i64::from(u32::from(*self))
    }
}

impl Z80Encodable for bool {
    fn to_operand_value(&self) -> i64 {
        i64::from(*self)
    }
}
