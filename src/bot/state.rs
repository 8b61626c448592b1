use serde::{Deserialize, Serialize};

/// Represents the current state of the user dialogue
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, Eq)]
pub enum State {
    /// Commands and buttons only
    #[default]
    Start,
    /// The next text message is the thumbnail description
    AwaitingImagePrompt,
}
