//! Status Word (SW) constants for reader responses
//!
//! The subset of ISO 7816-4 and PC/SC part 3 status words a contactless
//! reader returns for storage card commands.

/// Status Word constants
pub struct SW;

impl SW {
    // Success
    pub const SUCCESS: u16 = 0x9000;

    // Warnings
    pub const WARNING_NO_CHANGE: u16 = 0x6200;
    /// Reader reports the operation failed, e.g. authentication rejected
    pub const OPERATION_FAILED: u16 = 0x6300;

    // Execution errors
    pub const MEMORY_FAILURE: u16 = 0x6581;

    // Checking errors
    pub const WRONG_LENGTH: u16 = 0x6700;
    pub const SECURITY_STATUS_NOT_SATISFIED: u16 = 0x6982;
    pub const AUTH_METHOD_BLOCKED: u16 = 0x6983;
    pub const COMMAND_NOT_ALLOWED_NO_EF: u16 = 0x6986;
    pub const FUNCTION_NOT_SUPPORTED: u16 = 0x6A81;
    pub const FILE_NOT_FOUND: u16 = 0x6A82;
    pub const WRONG_P1_P2: u16 = 0x6B00;
    pub const INS_NOT_SUPPORTED: u16 = 0x6D00;
    pub const CLA_NOT_SUPPORTED: u16 = 0x6E00;
    pub const UNKNOWN_ERROR: u16 = 0x6F00;

    /// Check if a status word indicates success
    #[inline]
    pub fn is_success(sw: u16) -> bool {
        sw == Self::SUCCESS
    }

    /// Short description for logs and error messages
    pub fn describe(sw: u16) -> &'static str {
        match sw {
            Self::SUCCESS => "success",
            Self::WARNING_NO_CHANGE => "no information given",
            Self::OPERATION_FAILED => "operation failed",
            Self::MEMORY_FAILURE => "memory failure",
            Self::WRONG_LENGTH => "wrong length",
            Self::SECURITY_STATUS_NOT_SATISFIED => "security status not satisfied",
            Self::AUTH_METHOD_BLOCKED => "authentication method blocked",
            Self::COMMAND_NOT_ALLOWED_NO_EF => "command not allowed",
            Self::FUNCTION_NOT_SUPPORTED => "function not supported",
            Self::FILE_NOT_FOUND => "block not found",
            Self::WRONG_P1_P2 => "wrong parameters P1-P2",
            Self::INS_NOT_SUPPORTED => "instruction not supported",
            Self::CLA_NOT_SUPPORTED => "class not supported",
            _ => "unknown status",
        }
    }
}
