use crate::error::{Error, ErrorKind};
use derive_more::Display;
use std::str::FromStr;

/// Who marked a node soft-deleted.
///
/// The marker is a small explicit state machine rather than a loose string:
///
/// | from      | to        | set by                                        |
/// |-----------|-----------|-----------------------------------------------|
/// | `none`    | `user`    | explicit trash of this exact node             |
/// | `none`    | `process` | a subtree trash dragging a descendant along   |
/// | `user`    | `none`    | explicit restore of this exact node           |
/// | `process` | `none`    | subtree restore, or ancestor-chain repair     |
///
/// Traversals never write `user`, and a subtree restore never clears it on
/// nodes it merely passes over, which is how an independently trashed child
/// survives the restore of its parent.
#[derive(Debug, Display, Clone, Copy, Default, PartialEq, Eq)]
pub enum DeleteMarker {
    #[default]
    #[display("none")]
    None,
    #[display("user")]
    User,
    #[display("process")]
    Process,
}

impl FromStr for DeleteMarker {
    type Err = Error;
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "none" => Ok(Self::None),
            "user" => Ok(Self::User),
            "process" => Ok(Self::Process),
            _ => exn::bail!(ErrorKind::InvalidData("delete marker")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("none", DeleteMarker::None)]
    #[case("user", DeleteMarker::User)]
    #[case("process", DeleteMarker::Process)]
    fn test_round_trip(#[case] text: &str, #[case] marker: DeleteMarker) {
        assert_eq!(text.parse::<DeleteMarker>().unwrap(), marker);
        assert_eq!(marker.to_string(), text);
    }

    #[test]
    fn test_unknown_marker_is_rejected() {
        assert!("admin".parse::<DeleteMarker>().is_err());
        assert!("".parse::<DeleteMarker>().is_err());
    }
}
