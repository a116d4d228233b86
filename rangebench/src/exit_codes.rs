#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    Success = 0,

    /// At least one recorded request failed.
    RequestsFailed = 1,

    /// Invalid CLI/profile/setup (bad flags, no content ids, missing credentials, invalid profile values).
    InvalidInput = 2,

    /// Sign-in or token exchange failed.
    AuthFailed = 3,

    /// Internal/runtime error (IO errors, unreadable result files).
    RuntimeError = 4,
}

impl ExitCode {
    #[must_use]
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    #[must_use]
    pub fn from_failed_requests(failed: usize) -> Self {
        if failed == 0 {
            Self::Success
        } else {
            Self::RequestsFailed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_requests_decide_the_run_outcome() {
        assert_eq!(ExitCode::from_failed_requests(0).as_i32(), 0);
        assert_eq!(ExitCode::from_failed_requests(3).as_i32(), 1);
        assert_eq!(ExitCode::AuthFailed.as_i32(), 3);
    }
}
