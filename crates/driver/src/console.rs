//! Daemon console commands
//!
//! The `serve` daemon reads one command per line from stdin:
//!
//! ```text
//! list                      attached devices and their LED state
//! led2                      read led2 of the only attached device
//! led2 1                    write led2 of the only attached device
//! 001-004:0 led3 0          address a device explicitly
//! help | quit
//! ```

use crate::error::LedError;
use crate::led::Caller;
use crate::usb::LifecycleManager;
use common::InterfaceKey;
use std::io;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    List,
    Help,
    Quit,
    Show {
        key: Option<InterfaceKey>,
        attribute: String,
    },
    Store {
        key: Option<InterfaceKey>,
        attribute: String,
        value: String,
    },
}

#[derive(Debug, Error)]
pub enum ConsoleError {
    #[error("Cannot parse command: {0}")]
    Parse(String),

    #[error("No LED device attached")]
    NoDevice,

    #[error("{0} LED devices attached, prefix the command with a device key")]
    Ambiguous(usize),

    #[error(transparent)]
    Led(#[from] LedError),
}

pub const HELP: &str = "\
commands:
  list                       list attached devices
  [<device>] <led>           read an LED (led1, led2, led3)
  [<device>] <led> <0|1>     write an LED
  help                       show this help
  quit                       stop the daemon
devices are written BBB-AAA:I, e.g. 001-004:0";

/// Parse one console line; blank lines yield `None`
pub fn parse_command(line: &str) -> Result<Option<ConsoleCommand>, ConsoleError> {
    let mut tokens: Vec<&str> = line.split_whitespace().collect();

    let Some(first) = tokens.first().copied() else {
        return Ok(None);
    };

    match first {
        "list" | "ls" if tokens.len() == 1 => return Ok(Some(ConsoleCommand::List)),
        "help" | "?" if tokens.len() == 1 => return Ok(Some(ConsoleCommand::Help)),
        "quit" | "exit" if tokens.len() == 1 => return Ok(Some(ConsoleCommand::Quit)),
        _ => {}
    }

    let key = match first.parse::<InterfaceKey>() {
        Ok(key) => {
            tokens.remove(0);
            Some(key)
        }
        Err(_) => None,
    };

    match tokens.as_slice() {
        [attribute] => Ok(Some(ConsoleCommand::Show {
            key,
            attribute: attribute.to_string(),
        })),
        [attribute, value] => Ok(Some(ConsoleCommand::Store {
            key,
            attribute: attribute.to_string(),
            value: value.to_string(),
        })),
        _ => Err(ConsoleError::Parse(line.trim().to_string())),
    }
}

/// Run a show or store command against the manager
///
/// Blocks for the duration of the bulk transfer on stores. `List`, `Help`
/// and `Quit` are handled by the caller and produce an empty reply here.
pub fn execute(
    manager: &LifecycleManager,
    caller: Caller,
    command: ConsoleCommand,
) -> Result<String, ConsoleError> {
    match command {
        ConsoleCommand::Show { key, attribute } => {
            let key = resolve_key(manager, key)?;
            let value = manager.show(key, &attribute, caller)?;
            Ok(format!("{} {} = {}", key, attribute, value.trim_end()))
        }
        ConsoleCommand::Store {
            key,
            attribute,
            value,
        } => {
            let key = resolve_key(manager, key)?;
            manager.store(key, &attribute, caller, &value)?;
            let state = manager
                .context(key)
                .map(|ctx| ctx.color().to_string())
                .unwrap_or_else(|| "detached".to_string());
            Ok(format!("{} {} <- {} (state {})", key, attribute, value, state))
        }
        ConsoleCommand::List | ConsoleCommand::Help | ConsoleCommand::Quit => Ok(String::new()),
    }
}

/// Outcome of one read from the console
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleInput {
    Line(String),
    /// End of input or a read error; the daemon shuts down
    Closed,
}

impl ConsoleInput {
    pub fn from_read(read: io::Result<Option<String>>) -> Self {
        match read {
            Ok(Some(line)) => ConsoleInput::Line(line),
            Ok(None) => ConsoleInput::Closed,
            Err(e) => {
                warn!("Failed to read console input: {}", e);
                ConsoleInput::Closed
            }
        }
    }
}

fn resolve_key(
    manager: &LifecycleManager,
    key: Option<InterfaceKey>,
) -> Result<InterfaceKey, ConsoleError> {
    if let Some(key) = key {
        return Ok(key);
    }

    match manager.attached().as_slice() {
        [] => Err(ConsoleError::NoDevice),
        [only] => Ok(only.key),
        many => Err(ConsoleError::Ambiguous(many.len())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::led::{AttributeDirectory, LedController};
    use crate::test_utils::MockInterface;
    use std::sync::Arc;

    fn manager() -> LifecycleManager {
        LifecycleManager::new(Arc::new(AttributeDirectory::new()), LedController::default())
    }

    #[test]
    fn test_console_input_closes_on_eof() {
        assert_eq!(
            ConsoleInput::from_read(Ok(Some("led1 1".to_string()))),
            ConsoleInput::Line("led1 1".to_string())
        );
        assert_eq!(ConsoleInput::from_read(Ok(None)), ConsoleInput::Closed);
        assert_eq!(
            ConsoleInput::from_read(Err(io::Error::other("broken pipe"))),
            ConsoleInput::Closed
        );
    }

    #[test]
    fn test_parse_keywords() {
        assert_eq!(parse_command("list").unwrap(), Some(ConsoleCommand::List));
        assert_eq!(parse_command("  help ").unwrap(), Some(ConsoleCommand::Help));
        assert_eq!(parse_command("quit").unwrap(), Some(ConsoleCommand::Quit));
        assert_eq!(parse_command("   ").unwrap(), None);
    }

    #[test]
    fn test_parse_show_and_store() {
        assert_eq!(
            parse_command("led2").unwrap(),
            Some(ConsoleCommand::Show {
                key: None,
                attribute: "led2".to_string()
            })
        );
        assert_eq!(
            parse_command("001-004:0 led3 1").unwrap(),
            Some(ConsoleCommand::Store {
                key: Some(InterfaceKey::new(1, 4, 0)),
                attribute: "led3".to_string(),
                value: "1".to_string()
            })
        );
    }

    #[test]
    fn test_parse_rejects_extra_tokens() {
        assert!(parse_command("led1 1 2").is_err());
        assert!(parse_command("001-004:0").is_err());
    }

    #[test]
    fn test_execute_single_device() {
        let manager = manager();
        let interface = MockInterface::led_device(4);
        manager.attach(&interface).unwrap();

        let reply = execute(
            &manager,
            Caller::Owner,
            parse_command("led2 1").unwrap().unwrap(),
        )
        .unwrap();
        assert_eq!(reply, "001-004:0 led2 <- 1 (state 0x02)");

        let reply = execute(
            &manager,
            Caller::Owner,
            parse_command("led2").unwrap().unwrap(),
        )
        .unwrap();
        assert_eq!(reply, "001-004:0 led2 = 1");
    }

    #[test]
    fn test_execute_needs_key_with_two_devices() {
        let manager = manager();
        let first = MockInterface::led_device(4);
        let second = MockInterface::led_device(5);
        manager.attach(&first).unwrap();
        manager.attach(&second).unwrap();

        let command = parse_command("led1 1").unwrap().unwrap();
        assert!(matches!(
            execute(&manager, Caller::Owner, command),
            Err(ConsoleError::Ambiguous(2))
        ));

        let command = parse_command("001-005:0 led1 1").unwrap().unwrap();
        execute(&manager, Caller::Owner, command).unwrap();
        assert_eq!(second.log.bytes(), vec![0x01]);
        assert!(first.log.bytes().is_empty());
    }

    #[test]
    fn test_execute_without_device() {
        let command = parse_command("led1").unwrap().unwrap();
        assert!(matches!(
            execute(&manager(), Caller::Owner, command),
            Err(ConsoleError::NoDevice)
        ));
    }

    #[test]
    fn test_execute_read_only_caller() {
        let manager = manager();
        let interface = MockInterface::led_device(4);
        manager.attach(&interface).unwrap();

        let command = parse_command("led1 1").unwrap().unwrap();
        assert!(matches!(
            execute(&manager, Caller::Other, command),
            Err(ConsoleError::Led(LedError::PermissionDenied(_)))
        ));
    }
}
