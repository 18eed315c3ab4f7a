//! Key symbol to state mutation.

use crate::consts::DEFAULT_THRESHOLD_C;
use crate::models::{InputWriter, WindMode};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Action {
    SetSpeed(u8),
    SetMode(WindMode),
    SetThreshold(u8),
}

/// What the foreground must do right away, if anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Effect {
    None,
    /// No pattern is running and the interlock is clear: push this duty now.
    ApplyDuty(u8),
}

pub fn action_for(key: char) -> Option<Action> {
    let action = match key {
        '0' => Action::SetSpeed(0),
        '1' => Action::SetSpeed(30),
        '2' => Action::SetSpeed(60),
        '3' => Action::SetSpeed(80),
        '4' => Action::SetSpeed(100),
        'A' => Action::SetMode(WindMode::Normal),
        'B' => Action::SetMode(WindMode::Natural),
        'C' => Action::SetMode(WindMode::Sleep),
        'D' => Action::SetMode(WindMode::Unset),
        '7' => Action::SetThreshold(30),
        '8' => Action::SetThreshold(40),
        '9' => Action::SetThreshold(50),
        '*' => Action::SetThreshold(DEFAULT_THRESHOLD_C),
        _ => return None,
    };
    Some(action)
}

pub fn dispatch(key: char, input: &mut InputWriter<'_>) -> Effect {
    let Some(action) = action_for(key) else {
        return Effect::None;
    };
    info!("key {} -> {}", key, action);

    match action {
        Action::SetSpeed(percent) => {
            input.set_speed(percent);
            let snap = input.state().snapshot();
            if snap.wind_mode == WindMode::Unset && !snap.interlock {
                Effect::ApplyDuty(percent)
            } else {
                Effect::None
            }
        }
        Action::SetMode(mode) => {
            input.set_mode(mode);
            Effect::None
        }
        Action::SetThreshold(celsius) => {
            input.set_threshold(celsius);
            Effect::None
        }
    }
}
