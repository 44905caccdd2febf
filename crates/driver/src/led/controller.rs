//! LED state controller
//!
//! Turns "switch LED n on/off" into a new bitmask, sends it to the device in
//! a single bulk OUT transfer and updates the cached state.

use crate::error::LedError;
use crate::led::context::DeviceContext;
use crate::usb::transport::{BULK_TIMEOUT, write_led_byte};
use protocol::{Led, LedMask};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// What the cached state does when a transfer fails or is short
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CachePolicy {
    /// Update the cache anyway and only log the failure
    ///
    /// Keeps the control interface available; the cache may then disagree
    /// with the physical LEDs until the next successful write.
    #[default]
    Optimistic,
    /// Keep the cache unchanged and return the transport error
    FailClosed,
}

/// Applies LED changes to a device context
#[derive(Debug, Clone, Copy)]
pub struct LedController {
    timeout: Duration,
    policy: CachePolicy,
}

impl Default for LedController {
    fn default() -> Self {
        Self::new(BULK_TIMEOUT, CachePolicy::default())
    }
}

impl LedController {
    pub fn new(timeout: Duration, policy: CachePolicy) -> Self {
        Self { timeout, policy }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn policy(&self) -> CachePolicy {
        self.policy
    }

    /// Switch the named LED and return the resulting cached state
    ///
    /// An unknown name is logged and ignored; the current state is returned
    /// and nothing is sent.
    pub fn change_color(
        &self,
        ctx: &DeviceContext,
        led_name: &str,
        val: bool,
    ) -> Result<LedMask, LedError> {
        let Some(led) = Led::from_name(led_name) else {
            warn!("Invalid LED name received: {:?}", led_name);
            return Ok(ctx.color());
        };

        self.set_led(ctx, led, val)
    }

    /// Switch one LED and return the resulting cached state
    ///
    /// The color lock is held across the transfer, so concurrent writes to
    /// the same device are applied one at a time and none is lost.
    pub fn set_led(&self, ctx: &DeviceContext, led: Led, val: bool) -> Result<LedMask, LedError> {
        let mut color = ctx.lock_color();

        let current = *color;
        let new_color = current.with(led, val);
        debug!(
            "{}: {} -> {} (current {}, new {})",
            ctx.key(),
            led,
            u8::from(val),
            current,
            new_color
        );

        match write_led_byte(
            ctx.transport(),
            ctx.bulk_out_address(),
            new_color,
            self.timeout,
        ) {
            Ok(()) => {
                *color = new_color;
                Ok(new_color)
            }
            Err(e) => match self.policy {
                CachePolicy::Optimistic => {
                    warn!("{}: {}; caching {} anyway", ctx.key(), e, new_color);
                    *color = new_color;
                    Ok(new_color)
                }
                CachePolicy::FailClosed => {
                    warn!("{}: {}; keeping cached {}", ctx.key(), e, current);
                    Err(e.into())
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use crate::test_utils::{MockBehavior, MockControl, MockTransport, TransferLog, led_endpoints};
    use common::InterfaceKey;

    fn context() -> (DeviceContext, TransferLog, MockControl) {
        let transport = MockTransport::new();
        let log = transport.log();
        let control = transport.control();
        let ctx = DeviceContext::new(
            InterfaceKey::new(1, 2, 0),
            0x10c4,
            0xea60,
            Box::new(transport),
            led_endpoints(),
        )
        .unwrap();
        (ctx, log, control)
    }

    #[test]
    fn test_end_to_end_sequence() {
        let (ctx, log, _) = context();
        let controller = LedController::default();

        assert_eq!(controller.change_color(&ctx, "led2", true).unwrap().bits(), 0x02);
        assert_eq!(controller.change_color(&ctx, "led1", true).unwrap().bits(), 0x03);
        assert_eq!(controller.change_color(&ctx, "led2", false).unwrap().bits(), 0x01);

        assert_eq!(log.bytes(), vec![0x02, 0x03, 0x01]);
        assert_eq!(ctx.color().bits(), 0x01);
        assert!(log.transfers().iter().all(|t| t.endpoint == 0x01));
    }

    #[test]
    fn test_unknown_name_is_noop() {
        let (ctx, log, _) = context();
        let controller = LedController::default();

        controller.change_color(&ctx, "led3", true).unwrap();
        let state = controller.change_color(&ctx, "led4", true).unwrap();

        assert_eq!(state.bits(), 0x04);
        assert_eq!(log.transfers().len(), 1);
    }

    #[test]
    fn test_optimistic_caches_on_failure() {
        let (ctx, log, control) = context();
        control.set_behavior(MockBehavior::Fail(rusb::Error::NoDevice));

        let controller = LedController::new(BULK_TIMEOUT, CachePolicy::Optimistic);
        let state = controller.set_led(&ctx, Led::Led3, true).unwrap();

        assert_eq!(state.bits(), 0x04);
        assert_eq!(ctx.color().bits(), 0x04);
        assert_eq!(log.bytes(), vec![0x04]);
    }

    #[test]
    fn test_optimistic_caches_on_short_write() {
        let (ctx, _, control) = context();
        control.set_behavior(MockBehavior::Short(0));

        let controller = LedController::default();
        controller.set_led(&ctx, Led::Led1, true).unwrap();
        assert_eq!(ctx.color().bits(), 0x01);
    }

    #[test]
    fn test_fail_closed_keeps_cache() {
        let (ctx, _, control) = context();
        let controller = LedController::new(BULK_TIMEOUT, CachePolicy::FailClosed);

        controller.set_led(&ctx, Led::Led1, true).unwrap();

        control.set_behavior(MockBehavior::Fail(rusb::Error::Timeout));
        let err = controller.set_led(&ctx, Led::Led2, true).unwrap_err();

        assert!(matches!(
            err,
            LedError::Transport(TransportError::Failed {
                source: rusb::Error::Timeout,
                ..
            })
        ));
        assert_eq!(ctx.color().bits(), 0x01);
    }

    #[test]
    fn test_fail_closed_rejects_short_write() {
        let (ctx, _, control) = context();
        control.set_behavior(MockBehavior::Short(0));

        let controller = LedController::new(BULK_TIMEOUT, CachePolicy::FailClosed);
        let err = controller.set_led(&ctx, Led::Led2, true).unwrap_err();

        assert!(matches!(
            err,
            LedError::Transport(TransportError::ShortWrite { written: 0, .. })
        ));
        assert_eq!(ctx.color(), LedMask::EMPTY);
    }

    #[test]
    fn test_custom_timeout_is_used() {
        let (ctx, log, _) = context();
        let controller = LedController::new(Duration::from_secs(3), CachePolicy::Optimistic);

        controller.set_led(&ctx, Led::Led1, false).unwrap();
        assert_eq!(log.transfers()[0].timeout, Duration::from_secs(3));
    }

    #[test]
    fn test_high_bits_never_sent() {
        let (ctx, log, _) = context();
        let controller = LedController::default();

        for led in Led::ALL {
            controller.set_led(&ctx, led, true).unwrap();
        }
        for led in Led::ALL {
            controller.set_led(&ctx, led, false).unwrap();
        }

        assert!(log.bytes().iter().all(|b| b & !protocol::LED_BITS == 0));
        assert_eq!(log.bytes(), vec![0x01, 0x03, 0x07, 0x06, 0x04, 0x00]);
    }
}
