use std::fmt;

/// Protocol version carried in every header.
pub const RPC_VERSION: u8 = 1;

/// Number of words taken by the header at the start of a frame.
pub const HEADER_WORDS: usize = 1;

/// Firmware service identifier.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Service(pub u8);

impl Service {
    pub const RM: Service = Service(3);
    pub const MISC: Service = Service(7);
    pub const SECO: Service = Service(9);
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Service::RM => f.write_str("svc(rm)"),
            Service::MISC => f.write_str("svc(misc)"),
            Service::SECO => f.write_str("svc(seco)"),
            Service(other) => write!(f, "svc({other})"),
        }
    }
}

/// The first word of every frame.
///
/// The byte order on the wire is `ver`, `size`, `svc`, `func`. `size` counts the words of the
/// whole frame, header included. On responses the firmware reuses `func` for its own result code,
/// so only `svc` is expected to echo the request.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RpcHeader {
    pub ver: u8,
    pub size: u8,
    pub svc: Service,
    pub func: u8,
}

impl RpcHeader {
    pub const BYTES: usize = 4;

    #[inline]
    pub fn new(svc: Service, func: u8, size: u8) -> Self {
        RpcHeader {
            ver: RPC_VERSION,
            size,
            svc,
            func,
        }
    }

    #[inline]
    pub fn to_bytes(self) -> [u8; Self::BYTES] {
        [self.ver, self.size, self.svc.0, self.func]
    }

    #[inline]
    pub fn from_bytes(bytes: [u8; Self::BYTES]) -> Self {
        RpcHeader {
            ver: bytes[0],
            size: bytes[1],
            svc: Service(bytes[2]),
            func: bytes[3],
        }
    }

    #[inline]
    pub fn to_word(self) -> u32 {
        u32::from_le_bytes(self.to_bytes())
    }

    #[inline]
    pub fn from_word(word: u32) -> Self {
        Self::from_bytes(word.to_le_bytes())
    }
}

mod sa {
    use super::*;
    use static_assertions::const_assert_eq;
    use std::mem::size_of;

    const_assert_eq!(size_of::<Service>(), 1);
    const_assert_eq!(size_of::<RpcHeader>(), RpcHeader::BYTES);
    const_assert_eq!(RpcHeader::BYTES, HEADER_WORDS * size_of::<u32>());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_wire_order() {
        let hdr = RpcHeader::new(Service::MISC, 15, 1);
        assert_eq!(hdr.to_bytes(), [RPC_VERSION, 1, 7, 15]);
        assert_eq!(hdr.to_word(), 0x0f07_0101);
    }

    #[test]
    fn unknown_service_display() {
        assert_eq!(Service::SECO.to_string(), "svc(seco)");
        assert_eq!(Service(42).to_string(), "svc(42)");
    }
}
