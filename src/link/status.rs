/// HCI status codes the adapter core inspects. Anything else is carried
/// through numerically.
#[derive(Debug, Copy, Clone, PartialEq, Eq, FromPrimitive)]
#[repr(u8)]
pub enum HciStatus {
    Success = 0x00,
    UnknownCommand = 0x01,
    NoConnection = 0x02,
    HardwareFailure = 0x03,
    PageTimeout = 0x04,
    AuthenticationFailure = 0x05,
    KeyMissing = 0x06,
    MemoryFull = 0x07,
    ConnectionTimeout = 0x08,
    MaxConnections = 0x09,
    CommandDisallowed = 0x0C,
    RejectedLimitedResources = 0x0D,
    RejectedSecurity = 0x0E,
    HostTimeout = 0x10,
}
