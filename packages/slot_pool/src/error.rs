use thiserror::Error;

/// Errors that can occur when requesting memory from a pool.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Storage for a new block of slots could not be obtained from the underlying allocator.
    ///
    /// The pool that reported this is left exactly as it was before the failed call.
    #[error("storage for a new block of slots could not be obtained from the underlying allocator")]
    OutOfMemory,

    /// The allocator adapter was asked for something the underlying pool cannot express:
    /// more than one element per request, or a placement hint.
    #[error("the pool allocator only serves single-element requests without a placement hint")]
    UnsupportedRequest,
}

/// A specialized `Result` type for pool operations, returning the crate's
/// [`Error`] type as the error value.
pub(crate) type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use std::fmt::Debug;

    use static_assertions::assert_impl_all;

    use super::*;

    assert_impl_all!(Error: Send, Sync, Debug);

    #[test]
    fn out_of_memory_is_error() {
        let result: Result<()> = Err(Error::OutOfMemory);
        assert!(result.is_err());
    }

    #[test]
    fn display_names_the_failed_request() {
        let message = Error::UnsupportedRequest.to_string();
        assert!(message.contains("single-element"));
    }
}
