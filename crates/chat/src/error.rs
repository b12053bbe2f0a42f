use snafu::Snafu;

use plume_bridge::ServiceError;
use plume_protocol::MessageId;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ChatError {
    #[snafu(display("an edit is in progress; submit or cancel it first"))]
    EditInProgress,
    #[snafu(display("a generation is already in progress"))]
    GenerationInProgress,
    #[snafu(display("no generation is in progress"))]
    NotReceiving,
    #[snafu(display("no edit is in progress"))]
    NoEditInProgress,
    #[snafu(display("message '{id}' does not exist in this conversation"))]
    UnknownMessage { id: MessageId },
    #[snafu(display("only user messages can be edited; '{id}' is not one"))]
    NotAUserMessage { id: MessageId },
    #[snafu(display("{source}"))]
    Backend { source: ServiceError },
}

pub type ChatResult<T> = Result<T, ChatError>;
