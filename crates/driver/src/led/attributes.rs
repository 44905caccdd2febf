//! LED control attributes
//!
//! One generic show/store pair serves all three attributes; the table below
//! supplies the per-LED name and bit.

use crate::error::LedError;
use crate::led::context::DeviceContext;
use crate::led::controller::LedController;
use protocol::{Led, format_state, parse_switch};
use tracing::debug;

/// Owner may write
const MODE_OWNER_WRITE: u16 = 0o200;
/// Everyone may read
const MODE_READ_ALL: u16 = 0o444;

/// Who is performing an attribute operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Caller {
    /// The attribute's privileged owner
    Owner,
    /// Anyone else
    Other,
}

/// A named per-device control point
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedAttribute {
    pub name: &'static str,
    pub led: Led,
    /// Permission bits, `0o644`
    pub mode: u16,
}

impl LedAttribute {
    const fn new(led: Led) -> Self {
        Self {
            name: led.name(),
            led,
            mode: MODE_OWNER_WRITE | MODE_READ_ALL,
        }
    }

    pub fn readable_by(&self, caller: Caller) -> bool {
        match caller {
            Caller::Owner => self.mode & 0o400 != 0,
            Caller::Other => self.mode & 0o004 != 0,
        }
    }

    pub fn writable_by(&self, caller: Caller) -> bool {
        match caller {
            Caller::Owner => self.mode & 0o200 != 0,
            Caller::Other => self.mode & 0o002 != 0,
        }
    }

    /// Current state of this LED as `"0\n"` or `"1\n"`
    pub fn show(&self, ctx: &DeviceContext, caller: Caller) -> Result<String, LedError> {
        if !self.readable_by(caller) {
            return Err(LedError::PermissionDenied(self.name.to_string()));
        }

        let state = ctx.color().is_on(self.led);
        debug!("{}: show {} = {}", ctx.key(), self.name, u8::from(state));
        Ok(format_state(state))
    }

    /// Switch this LED from attribute text, returning the bytes consumed
    ///
    /// Input other than `0` or `1` (one trailing newline allowed) is rejected
    /// before anything is sent.
    pub fn store(
        &self,
        ctx: &DeviceContext,
        controller: &LedController,
        caller: Caller,
        input: &str,
    ) -> Result<usize, LedError> {
        if !self.writable_by(caller) {
            return Err(LedError::PermissionDenied(self.name.to_string()));
        }

        let val = parse_switch(input)?;
        debug!("{}: store {} = {}", ctx.key(), self.name, u8::from(val));

        controller.change_color(ctx, self.name, val)?;
        Ok(input.len())
    }
}

/// Attributes exposed for every attached device
pub static LED_ATTRIBUTES: [LedAttribute; 3] = [
    LedAttribute::new(Led::Led1),
    LedAttribute::new(Led::Led2),
    LedAttribute::new(Led::Led3),
];

/// Look up an attribute by name
pub fn find_attribute(name: &str) -> Result<&'static LedAttribute, LedError> {
    LED_ATTRIBUTES
        .iter()
        .find(|attr| attr.name == name)
        .ok_or_else(|| LedError::UnknownAttribute(name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{MockTransport, TransferLog, led_endpoints};
    use common::InterfaceKey;
    use protocol::LedMask;

    fn context() -> (DeviceContext, TransferLog) {
        let transport = MockTransport::new();
        let log = transport.log();
        let ctx = DeviceContext::new(
            InterfaceKey::new(1, 3, 0),
            0x10c4,
            0xea60,
            Box::new(transport),
            led_endpoints(),
        )
        .unwrap();
        (ctx, log)
    }

    #[test]
    fn test_table_names_and_mode() {
        let names: Vec<_> = LED_ATTRIBUTES.iter().map(|a| a.name).collect();
        assert_eq!(names, vec!["led1", "led2", "led3"]);
        assert!(LED_ATTRIBUTES.iter().all(|a| a.mode == 0o644));
    }

    #[test]
    fn test_find_attribute() {
        assert_eq!(find_attribute("led2").unwrap().led, Led::Led2);
        assert!(matches!(
            find_attribute("led4"),
            Err(LedError::UnknownAttribute(_))
        ));
    }

    #[test]
    fn test_store_then_show_reports_true_bit() {
        let (ctx, _) = context();
        let controller = LedController::default();
        let led3 = find_attribute("led3").unwrap();

        assert_eq!(led3.store(&ctx, &controller, Caller::Owner, "1\n").unwrap(), 2);

        // Each attribute reports its own bit, not its index
        for attr in &LED_ATTRIBUTES {
            let expected = if attr.led == Led::Led3 { "1\n" } else { "0\n" };
            assert_eq!(attr.show(&ctx, Caller::Other).unwrap(), expected);
        }
    }

    #[test]
    fn test_store_returns_input_length() {
        let (ctx, _) = context();
        let controller = LedController::default();
        let led1 = find_attribute("led1").unwrap();

        assert_eq!(led1.store(&ctx, &controller, Caller::Owner, "1").unwrap(), 1);
        assert_eq!(led1.store(&ctx, &controller, Caller::Owner, "0\n").unwrap(), 2);
    }

    #[test]
    fn test_invalid_input_leaves_state_unchanged() {
        let (ctx, log) = context();
        let controller = LedController::default();
        let led2 = find_attribute("led2").unwrap();
        led2.store(&ctx, &controller, Caller::Owner, "1").unwrap();

        let before = ctx.color();
        for input in ["2", "-1", "abc", "", "01", "+1", "1 "] {
            let err = led2
                .store(&ctx, &controller, Caller::Owner, input)
                .unwrap_err();
            assert!(matches!(err, LedError::InvalidArgument(_)), "{:?}", input);
            assert_eq!(ctx.color(), before);
        }
        assert_eq!(log.transfers().len(), 1);
    }

    #[test]
    fn test_other_caller_cannot_write() {
        let (ctx, log) = context();
        let controller = LedController::default();
        let led1 = find_attribute("led1").unwrap();

        let err = led1
            .store(&ctx, &controller, Caller::Other, "1")
            .unwrap_err();
        assert!(matches!(err, LedError::PermissionDenied(name) if name == "led1"));
        assert_eq!(ctx.color(), LedMask::EMPTY);
        assert!(log.transfers().is_empty());

        assert_eq!(led1.show(&ctx, Caller::Other).unwrap(), "0\n");
    }
}
