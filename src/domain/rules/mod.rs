// Domain rules - Session transitions and input policies

use crate::domain::model::SessionState;
use crate::error::{SplitError, SplitResult};

impl SessionState {
    /// Whether the state machine permits moving from `self` to `next`.
    ///
    /// `Failed` and `Cancelled` are reachable from every non-terminal state.
    /// Terminal states have no successors; a new interaction resets the
    /// session instead.
    pub fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;

        if self.is_terminal() {
            return false;
        }
        if matches!(next, Failed | Cancelled) {
            return true;
        }
        matches!(
            (self, next),
            (Idle, AwaitingFile)
                | (Idle, AwaitingDuration)
                | (AwaitingFile, AwaitingDuration)
                | (AwaitingDuration, AwaitingDuration)
                | (AwaitingDuration, Probing)
                | (Probing, Planning)
                | (Planning, Cutting)
                | (Planning, Delivering)
                | (Cutting, Delivering)
                | (Delivering, Done)
        )
    }
}

/// Parse the segment length a user typed.
///
/// Accepts whole seconds (`90`, `90s`), `MM:SS` or `HH:MM:SS`. The value
/// must be at least one second and no more than `max_seconds`.
pub fn parse_segment_length(input: &str, max_seconds: u32) -> SplitResult<u32> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(SplitError::Validation(
            "Please send the segment length in seconds, for example 30".to_string(),
        ));
    }

    let seconds = if trimmed.contains(':') {
        parse_clock(trimmed)?
    } else {
        let digits = trimmed.strip_suffix('s').unwrap_or(trimmed).trim();
        parse_whole(digits)?
    };

    if seconds == 0 {
        return Err(SplitError::Validation(
            "Segment length must be greater than 0 seconds".to_string(),
        ));
    }
    if seconds > u64::from(max_seconds) {
        return Err(SplitError::Validation(format!(
            "Segment length must be at most {} seconds",
            max_seconds
        )));
    }

    // Bounded by max_seconds above
    Ok(seconds as u32)
}

fn parse_whole(text: &str) -> SplitResult<u64> {
    if let Some(rest) = text.strip_prefix('-') {
        if !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit()) {
            return Err(SplitError::Validation(
                "Segment length must be greater than 0 seconds".to_string(),
            ));
        }
    }
    if text.is_empty() || !text.chars().all(|c| c.is_ascii_digit()) {
        return Err(SplitError::Validation(format!(
            "'{}' is not a number of seconds; send a whole number such as 30",
            text
        )));
    }
    text.parse::<u64>()
        .map_err(|_| SplitError::Validation("Segment length is too large".to_string()))
}

fn parse_clock(text: &str) -> SplitResult<u64> {
    let parts: Vec<&str> = text.split(':').collect();
    if parts.len() > 3 {
        return Err(SplitError::Validation(format!(
            "'{}' is not a valid time; use MM:SS or HH:MM:SS",
            text
        )));
    }

    let mut total: u64 = 0;
    for (pos, part) in parts.iter().enumerate() {
        let value = parse_whole(part.trim()).map_err(|_| {
            SplitError::Validation(format!(
                "'{}' is not a valid time; use MM:SS or HH:MM:SS",
                text
            ))
        })?;
        // Minutes and seconds fields past the leading one are base 60
        if pos > 0 && value >= 60 {
            return Err(SplitError::Validation(format!(
                "'{}' has a field of 60 or more",
                text
            )));
        }
        total = total.saturating_mul(60).saturating_add(value);
    }
    Ok(total)
}
