/// Status codes returned by the GazeLink runtime for every call.
///
/// The runtime classifies failures three ways, and callers depend on the
/// distinction to avoid busy-looping on a permanent error:
/// - transient (`Timeout`): retry after a short backoff
/// - precondition (`NotRegistered`, `HandleClosed`): permanent for the
///   current configuration, the remedy is to change the configuration
/// - fatal setup (`ConnectFailed`, `VersionTooOld`, `CapabilitiesRejected`,
///   `NotConnected`): abort the calling workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ErrorCode {
    #[error("could not connect to the GazeLink runtime")]
    ConnectFailed,

    #[error("client requires a newer runtime version")]
    VersionTooOld,

    #[error("runtime rejected the requested capabilities")]
    CapabilitiesRejected,

    #[error("request timed out")]
    Timeout,

    #[error("capability was not registered for this session")]
    NotRegistered,

    #[error("no connection to the runtime service")]
    NotConnected,

    #[error("handle used after close")]
    HandleClosed,

    #[error("no data available for the current frame")]
    NoData,

    #[error("internal runtime error")]
    Internal,
}

impl ErrorCode {
    /// True only for errors where retrying the same call can succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorCode::Timeout)
    }
}

/// Outcome of a frame-synchronized wait.
///
/// `Retry` and `Fatal` are deliberately separate variants: a timeout means
/// the caller should back off briefly and call again, while a fatal code
/// (e.g. `NotRegistered`) will never resolve by retrying.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome<T> {
    /// Synced with a new frame; associated data is fresh.
    Ready(T),
    /// Transient failure; back off briefly and retry.
    Retry(ErrorCode),
    /// Permanent failure for this configuration; stop polling.
    Fatal(ErrorCode),
}

impl<T> FrameOutcome<T> {
    /// Classify a raw runtime result into the three-way outcome.
    pub(crate) fn classify(result: Result<T, ErrorCode>) -> FrameOutcome<T> {
        match result {
            Ok(v) => FrameOutcome::Ready(v),
            Err(code) if code.is_retryable() => FrameOutcome::Retry(code),
            Err(code) => FrameOutcome::Fatal(code),
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, FrameOutcome::Ready(_))
    }

    /// The synced value, if any.
    pub fn ready(self) -> Option<T> {
        match self {
            FrameOutcome::Ready(v) => Some(v),
            _ => None,
        }
    }
}

/// Errors from decoding the bitmap container format used by research images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum BitmapError {
    #[error("buffer too short for a bitmap header ({0} bytes)")]
    Truncated(usize),

    #[error("bad magic bytes, expected \"BM\"")]
    BadMagic,

    #[error("pixel data extends past the end of the buffer")]
    PayloadOutOfBounds,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_is_the_only_retryable_code() {
        assert!(ErrorCode::Timeout.is_retryable());
        assert!(!ErrorCode::NotRegistered.is_retryable());
        assert!(!ErrorCode::NotConnected.is_retryable());
        assert!(!ErrorCode::HandleClosed.is_retryable());
        assert!(!ErrorCode::VersionTooOld.is_retryable());
    }

    #[test]
    fn classify_splits_retry_and_fatal() {
        assert_eq!(
            FrameOutcome::classify(Err::<(), _>(ErrorCode::Timeout)),
            FrameOutcome::Retry(ErrorCode::Timeout)
        );
        assert_eq!(
            FrameOutcome::classify(Err::<(), _>(ErrorCode::NotRegistered)),
            FrameOutcome::Fatal(ErrorCode::NotRegistered)
        );
        assert!(FrameOutcome::classify(Ok(7)).is_ready());
    }
}
