//! Enumerated configuration options for the ramp engine and regulation layer.
//!
//! Option keys are the lower-case names used by scenario files and control
//! tooling (`"rampup"`, `"regfrac"`, ...). Parsing a key that is not in the
//! table yields [`ParamError::UnknownOption`] rather than being ignored.

use std::str::FromStr;

use thiserror::Error;

/// Error raised when setting or reading an option.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParamError {
    #[error("unknown option \"{0}\"")]
    UnknownOption(String),
    #[error("invalid value \"{value}\" for option \"{option}\"")]
    InvalidValue { option: String, value: String },
}

/// Numeric options understood by [`RampEngine`](super::engine::RampEngine).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RampOption {
    /// Sets both ramp limits.
    Ramp,
    RampUp,
    RampDown,
    Ramp10,
    Ramp10Up,
    Ramp10Down,
    Ramp30,
    Ramp30Up,
    Ramp30Down,
    /// Minimum ramp duration for the midpoint and delayed policies.
    RampTime,
    /// Commands a target effective immediately.
    Target,
    /// Reserve headroom held available.
    Reserve,
    /// Time allowed to bring the reserve online.
    ReserveRampTime,
    Min,
    Max,
}

impl FromStr for RampOption {
    type Err = ParamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let option = match s {
            "ramp" => Self::Ramp,
            "rampup" => Self::RampUp,
            "rampdown" => Self::RampDown,
            "ramp10" => Self::Ramp10,
            "ramp10up" => Self::Ramp10Up,
            "ramp10down" => Self::Ramp10Down,
            "ramp30" => Self::Ramp30,
            "ramp30up" => Self::Ramp30Up,
            "ramp30down" => Self::Ramp30Down,
            "ramptime" => Self::RampTime,
            "target" => Self::Target,
            "reserve" => Self::Reserve,
            "reserveramptime" => Self::ReserveRampTime,
            "min" => Self::Min,
            "max" => Self::Max,
            _ => return Err(ParamError::UnknownOption(s.to_string())),
        };
        Ok(option)
    }
}

/// Numeric options understood by [`RegulationLayer`](super::regulation::RegulationLayer).
///
/// The limit options (`max`, `min`, `ramp`, `rampup`, `rampdown`) address the
/// unit's unshrunk envelope; the engine limits are derived from them.
/// Everything else is forwarded to the wrapped engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegulationOption {
    Max,
    Min,
    Ramp,
    RampUp,
    RampDown,
    /// Machine rating used as the per-unit base (`rating` or `base`).
    Rating,
    /// Sets both participation fractions.
    RegFrac,
    RegUpFrac,
    RegDownFrac,
    /// Enables regulation when the value is positive.
    RegEnabled,
    Engine(RampOption),
}

impl FromStr for RegulationOption {
    type Err = ParamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let option = match s {
            "max" => Self::Max,
            "min" => Self::Min,
            "ramp" => Self::Ramp,
            "rampup" => Self::RampUp,
            "rampdown" => Self::RampDown,
            "rating" | "base" => Self::Rating,
            "regfrac" => Self::RegFrac,
            "regupfrac" => Self::RegUpFrac,
            "regdownfrac" => Self::RegDownFrac,
            "regenabled" => Self::RegEnabled,
            other => Self::Engine(other.parse()?),
        };
        Ok(option)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ramp_option_keys_parse() {
        assert_eq!("rampup".parse::<RampOption>(), Ok(RampOption::RampUp));
        assert_eq!("ramp30down".parse::<RampOption>(), Ok(RampOption::Ramp30Down));
        assert_eq!(
            "reserveramptime".parse::<RampOption>(),
            Ok(RampOption::ReserveRampTime)
        );
    }

    #[test]
    fn unknown_key_is_reported() {
        let err = "rampsideways".parse::<RampOption>();
        assert_eq!(err, Err(ParamError::UnknownOption("rampsideways".into())));
    }

    #[test]
    fn regulation_limits_shadow_engine_limits() {
        assert_eq!("max".parse::<RegulationOption>(), Ok(RegulationOption::Max));
        assert_eq!("ramp".parse::<RegulationOption>(), Ok(RegulationOption::Ramp));
        assert_eq!("base".parse::<RegulationOption>(), Ok(RegulationOption::Rating));
    }

    #[test]
    fn regulation_forwards_engine_keys() {
        assert_eq!(
            "ramptime".parse::<RegulationOption>(),
            Ok(RegulationOption::Engine(RampOption::RampTime))
        );
        assert!(matches!(
            "bogus".parse::<RegulationOption>(),
            Err(ParamError::UnknownOption(_))
        ));
    }

    #[test]
    fn error_messages_name_the_option() {
        let e = ParamError::InvalidValue {
            option: "rampmode".into(),
            value: "sideways".into(),
        };
        assert!(e.to_string().contains("rampmode"));
        assert!(ParamError::UnknownOption("x".into()).to_string().contains("\"x\""));
    }
}
