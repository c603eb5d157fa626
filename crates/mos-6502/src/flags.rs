//! 6502 processor status register (P).

/// Carry.
pub const C: u8 = 0x01;
/// Zero.
pub const Z: u8 = 0x02;
/// Interrupt disable.
pub const I: u8 = 0x04;
/// Decimal mode.
pub const D: u8 = 0x08;
/// Break; only exists in pushed copies of P.
pub const B: u8 = 0x10;
/// Unused; always reads as 1.
pub const U: u8 = 0x20;
/// Overflow.
pub const V: u8 = 0x40;
/// Negative.
pub const N: u8 = 0x80;

/// Processor status register.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Status(pub u8);

impl Status {
    /// Power-on value: I and U set.
    #[must_use]
    pub const fn new() -> Self {
        Self(U | I)
    }

    #[must_use]
    pub const fn is_set(self, flag: u8) -> bool {
        self.0 & flag != 0
    }

    pub fn set_if(&mut self, flag: u8, condition: bool) {
        if condition {
            self.0 |= flag;
        } else {
            self.0 &= !flag;
        }
    }

    /// Update N and Z from a loaded or computed value.
    pub fn update_nz(&mut self, value: u8) {
        self.set_if(N, value & 0x80 != 0);
        self.set_if(Z, value == 0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_nz_tracks_sign_and_zero() {
        let mut p = Status::new();
        p.update_nz(0x80);
        assert!(p.is_set(N));
        assert!(!p.is_set(Z));
        p.update_nz(0x00);
        assert!(!p.is_set(N));
        assert!(p.is_set(Z));
        assert!(p.is_set(I), "load does not touch I");
    }
}
