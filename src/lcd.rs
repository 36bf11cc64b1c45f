//! 20x4 HD44780 character LCD behind a PCF8574 I2C backpack.
//!
//! The PCF8574 maps its eight outputs to the panel's 4-bit bus:
//! P0=RS, P1=RW, P2=E, P3=backlight, P4..P7=D4..D7. Every byte is
//! sent as two nibbles with an enable pulse each.

use esp_idf_svc::hal::delay::{Ets, FreeRtos};
use esp_idf_svc::hal::i2c::I2cDriver;

use hydronode::config::{LCD_COLS, LCD_ROWS};
use hydronode::ui::DisplayLines;

const RS_BIT: u8 = 0x01;
const ENABLE_BIT: u8 = 0x04;
const BACKLIGHT_BIT: u8 = 0x08;

/// DDRAM base address per row on a 20x4 panel.
const ROW_ADDR: [u8; LCD_ROWS] = [0x80, 0xC0, 0x94, 0xD4];

const I2C_TIMEOUT: u32 = 100;

pub struct Lcd<'d> {
    i2c: I2cDriver<'d>,
    addr: u8,
    backlight: u8,
}

impl<'d> Lcd<'d> {
    pub fn new(i2c: I2cDriver<'d>, addr: u8) -> Self {
        let mut lcd = Self {
            i2c,
            addr,
            backlight: BACKLIGHT_BIT,
        };
        lcd.init();
        lcd
    }

    fn init(&mut self) {
        FreeRtos::delay_ms(50);

        // Force 8-bit mode three times, then switch to 4-bit.
        self.write_nibble(0x30, false);
        FreeRtos::delay_ms(5);
        self.write_nibble(0x30, false);
        Ets::delay_us(150);
        self.write_nibble(0x30, false);
        Ets::delay_us(150);
        self.write_nibble(0x20, false);
        Ets::delay_us(150);

        self.command(0x28); // 4-bit, two logical lines, 5x8 font
        self.command(0x0C); // display on, cursor off
        self.command(0x06); // entry mode: increment, no shift
        self.command(0x01); // clear
        FreeRtos::delay_ms(2);
    }

    fn bus_write(&mut self, byte: u8) {
        if let Err(e) = self.i2c.write(self.addr, &[byte], I2C_TIMEOUT) {
            log::warn!("lcd i2c write failed: {}", e);
        }
    }

    fn pulse_enable(&mut self, byte: u8) {
        self.bus_write(byte | ENABLE_BIT);
        Ets::delay_us(1);
        self.bus_write(byte & !ENABLE_BIT);
        Ets::delay_us(50);
    }

    fn write_nibble(&mut self, nibble: u8, is_data: bool) {
        let mut byte = (nibble & 0xF0) | self.backlight;
        if is_data {
            byte |= RS_BIT;
        }
        self.bus_write(byte);
        self.pulse_enable(byte);
    }

    fn send(&mut self, byte: u8, is_data: bool) {
        self.write_nibble(byte & 0xF0, is_data);
        self.write_nibble(byte << 4, is_data);
    }

    fn command(&mut self, cmd: u8) {
        self.send(cmd, false);
    }

    fn write_char(&mut self, c: u8) {
        self.send(c, true);
    }
}

impl DisplayLines for Lcd<'_> {
    fn set_line(&mut self, row: u8, text: &str) {
        let row = row as usize;
        if row >= LCD_ROWS {
            return;
        }
        self.command(ROW_ADDR[row]);

        let mut written = 0;
        for c in text.bytes().take(LCD_COLS) {
            // HD44780 ROM is ASCII-ish; anything else renders as a blank.
            let c = if (0x20..0x7F).contains(&c) { c } else { b' ' };
            self.write_char(c);
            written += 1;
        }
        for _ in written..LCD_COLS {
            self.write_char(b' ');
        }
    }

    fn set_backlight(&mut self, on: bool) {
        let bit = if on { BACKLIGHT_BIT } else { 0 };
        if bit != self.backlight {
            self.backlight = bit;
            self.bus_write(bit);
        }
    }
}
