//! Server instructions as a closed command set.
//!
//! The wire protocol names instructions with strings and positional JSON
//! arguments. They are parsed into [`Command`] variants up front so that
//! dispatch is exhaustive and a typo'd or unknown instruction becomes a
//! typed error the listener can log and drop.

use serde::Deserialize;
use serde_json::Value;
use spoke_core::BikeStatus;

/// One event from the instruction stream, before routing.
#[derive(Debug, Deserialize)]
pub struct InstructionEvent {
    /// Instruction addressed to every bike the listener owns.
    pub instruction_all: Option<String>,
    /// Target bike for a single-bike instruction. Servers send this as a
    /// number or a string; see [`InstructionEvent::target_bike_id`].
    pub bike_id: Option<Value>,
    pub instruction: Option<String>,
    #[serde(default)]
    pub args: Vec<Value>,
}

impl InstructionEvent {
    pub fn target_bike_id(&self) -> Option<i64> {
        match self.bike_id.as_ref()? {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.parse().ok(),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Replay the bike's scripted trips.
    RunSimulation,
    /// Force the bike back to available (subject to the status policy).
    Lock,
    /// Server-side rental unlock; no local state change.
    Unlock,
    /// Explicit status override.
    SetStatus(BikeStatus),
    /// Re-fetch and replace the bike's zone set.
    RecacheZones,
}

impl Command {
    /// Parse an instruction name plus positional arguments.
    pub fn parse(name: &str, args: &[Value]) -> Result<Self, CommandError> {
        match name {
            "run_simulation" => Ok(Self::RunSimulation),
            "lock_bike" => Ok(Self::Lock),
            "unlock_bike" => Ok(Self::Unlock),
            "recache_zones" => Ok(Self::RecacheZones),
            "set_status" => {
                let id = args
                    .first()
                    .and_then(Value::as_u64)
                    .ok_or(CommandError::MissingArg("set_status", "status id"))?;
                let status = u8::try_from(id)
                    .ok()
                    .and_then(|id| BikeStatus::from_id(id).ok())
                    .ok_or(CommandError::BadStatus(id))?;
                Ok(Self::SetStatus(status))
            }
            other => Err(CommandError::Unknown(other.to_string())),
        }
    }

    /// Whether the command runs long enough to need its own task.
    pub fn is_async(self) -> bool {
        matches!(self, Self::RunSimulation | Self::RecacheZones)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("unknown instruction: {0}")]
    Unknown(String),

    #[error("instruction {0} is missing its {1} argument")]
    MissingArg(&'static str, &'static str),

    #[error("set_status got an invalid status id: {0}")]
    BadStatus(u64),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_simple_instructions() {
        assert_eq!(
            Command::parse("run_simulation", &[]).unwrap(),
            Command::RunSimulation
        );
        assert_eq!(Command::parse("lock_bike", &[]).unwrap(), Command::Lock);
        assert_eq!(Command::parse("unlock_bike", &[]).unwrap(), Command::Unlock);
        assert_eq!(
            Command::parse("recache_zones", &[]).unwrap(),
            Command::RecacheZones
        );
    }

    #[test]
    fn test_parse_set_status() {
        assert_eq!(
            Command::parse("set_status", &[json!(2)]).unwrap(),
            Command::SetStatus(BikeStatus::Rented)
        );
    }

    #[test]
    fn test_set_status_without_args_fails() {
        assert!(matches!(
            Command::parse("set_status", &[]),
            Err(CommandError::MissingArg(..))
        ));
    }

    #[test]
    fn test_set_status_with_bad_id_fails() {
        assert!(matches!(
            Command::parse("set_status", &[json!(9)]),
            Err(CommandError::BadStatus(9))
        ));
        assert!(matches!(
            Command::parse("set_status", &[json!("two")]),
            Err(CommandError::MissingArg(..))
        ));
    }

    #[test]
    fn test_unknown_instruction_fails() {
        assert!(matches!(
            Command::parse("self_destruct", &[]),
            Err(CommandError::Unknown(_))
        ));
    }

    #[test]
    fn test_async_split() {
        assert!(Command::RunSimulation.is_async());
        assert!(Command::RecacheZones.is_async());
        assert!(!Command::Lock.is_async());
        assert!(!Command::SetStatus(BikeStatus::Maintenance).is_async());
    }

    #[test]
    fn test_bike_id_coercion() {
        let event: InstructionEvent =
            serde_json::from_value(json!({"bike_id": 7, "instruction": "lock_bike"})).unwrap();
        assert_eq!(event.target_bike_id(), Some(7));

        let event: InstructionEvent =
            serde_json::from_value(json!({"bike_id": "7", "instruction": "lock_bike"})).unwrap();
        assert_eq!(event.target_bike_id(), Some(7));

        let event: InstructionEvent =
            serde_json::from_value(json!({"instruction_all": "lock_bike"})).unwrap();
        assert_eq!(event.target_bike_id(), None);
    }
}
