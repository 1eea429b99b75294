pub mod device;
pub mod node;

/// 48-bit hardware address of a radio interface, as burned in by the vendor.
pub type MacAddress = [u8; 6];

/// Address accepted by every listening interface in range.
pub const BROADCAST_ADDRESS: MacAddress = [0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF];

/// Canonical `AA:BB:CC:DD:EE:FF` rendering, for logs.
pub fn format_mac(address: &MacAddress) -> String {
    format!(
        "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
        address[0], address[1], address[2], address[3], address[4], address[5]
    )
}
