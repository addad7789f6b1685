/// Stable numeric error categories shared by every layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum ErrorCode {
    Success = 0,
    GeneralError = 1,
    ParseError = 2,
    ValidationError = 3,
    TaskNotFound = 10,
    DependencyError = 11,
    CircularDependency = 12,
    AgentNotFound = 13,
    BackendError = 20,
    SchemaError = 23,
    SecurityPolicy = 25,
    Timeout = 30,
    Cancelled = 31,
    NetworkError = 40,
    AuthError = 41,
    FileNotFound = 60,
    EncodingError = 67,
}

impl ErrorCode {
    pub fn as_u16(self) -> u16 {
        self as u16
    }
}
