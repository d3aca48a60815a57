use std::path::PathBuf;

pub fn fixture_path(name: &str) -> PathBuf {
    let mut path =
        PathBuf::from(std::env::var("CARGO_MANIFEST_DIR").expect("CARGO_MANIFEST_DIR not set"));
    path.push("tests/fixtures");
    path.push(name);
    path
}

/// Telemetry packet with a PUS data field header. `raw_len` is written to the length field
/// as-is.
pub fn build_packet(
    apid: u16,
    count: u16,
    raw_len: u16,
    service: (u8, u8),
    synchronized: bool,
    coarse: u32,
    fine: u16,
    payload: &[u8],
) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.extend((0x0800 | (apid & 0x7ff)).to_be_bytes());
    buf.extend((0xc000 | (count & 0x3fff)).to_be_bytes());
    buf.extend(raw_len.to_be_bytes());
    buf.extend([0x10, service.0, service.1, 0x00]);
    let time = (u32::from(!synchronized) << 31) | (coarse & 0x7fff_ffff);
    buf.extend(time.to_be_bytes());
    buf.extend(fine.to_be_bytes());
    buf.extend_from_slice(payload);
    buf
}
