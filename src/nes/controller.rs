pub const BUTTON_A: u8 = 0x01;
pub const BUTTON_B: u8 = 0x02;
pub const BUTTON_SELECT: u8 = 0x04;
pub const BUTTON_START: u8 = 0x08;
pub const BUTTON_UP: u8 = 0x10;
pub const BUTTON_DOWN: u8 = 0x20;
pub const BUTTON_LEFT: u8 = 0x40;
pub const BUTTON_RIGHT: u8 = 0x80;

/// Standard pad: an 8-bit parallel-in/serial-out shift register.
///
/// Bit `n` of the button state is reported on the `n`th read after the
/// strobe falls, in the order A, B, Select, Start, Up, Down, Left, Right.
#[derive(Debug, Clone, Default)]
pub struct Controller {
    buttons: u8,
    index: u8,
    strobe: bool,
}

impl Controller {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_buttons(&mut self, buttons: u8) {
        self.buttons = buttons;
    }

    pub fn buttons(&self) -> u8 {
        self.buttons
    }

    pub fn write_strobe(&mut self, value: u8) {
        self.strobe = (value & 0x01) != 0;
        if self.strobe {
            self.index = 0;
        }
    }

    pub fn read(&mut self) -> u8 {
        if self.strobe {
            return self.buttons & 0x01;
        }
        if self.index >= 8 {
            return 1;
        }
        let bit = (self.buttons >> self.index) & 0x01;
        self.index += 1;
        bit
    }

    /// Next bit `read` would return, without shifting.
    pub fn peek(&self) -> u8 {
        if self.strobe {
            self.buttons & 0x01
        } else if self.index >= 8 {
            1
        } else {
            (self.buttons >> self.index) & 0x01
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_buttons_in_hardware_order_then_ones() {
        let mut pad = Controller::new();
        pad.set_buttons(BUTTON_A | BUTTON_START | BUTTON_LEFT);

        pad.write_strobe(1);
        pad.write_strobe(0);

        let bits: Vec<u8> = (0..8).map(|_| pad.read()).collect();
        assert_eq!(bits, vec![1, 0, 0, 1, 0, 0, 1, 0]);
        assert_eq!(pad.read(), 1);
        assert_eq!(pad.read(), 1);
    }

    #[test]
    fn strobe_high_keeps_returning_button_a() {
        let mut pad = Controller::new();
        pad.set_buttons(BUTTON_B);
        pad.write_strobe(1);

        for _ in 0..10 {
            assert_eq!(pad.read(), 0);
        }

        pad.set_buttons(BUTTON_A);
        assert_eq!(pad.read(), 1);
    }

    #[test]
    fn new_strobe_restarts_sequence() {
        let mut pad = Controller::new();
        pad.set_buttons(BUTTON_RIGHT);
        pad.write_strobe(1);
        pad.write_strobe(0);
        for _ in 0..9 {
            pad.read();
        }

        pad.write_strobe(1);
        pad.write_strobe(0);
        let bits: Vec<u8> = (0..8).map(|_| pad.read()).collect();
        assert_eq!(bits, vec![0, 0, 0, 0, 0, 0, 0, 1]);
        assert_eq!(pad.peek(), 1);
    }
}
