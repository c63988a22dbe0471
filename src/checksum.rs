use std::sync::LazyLock;

/// Reflected Castagnoli polynomial.
const CASTAGNOLI: u32 = 0x82F6_3B78;

static CRC32C_TABLE: LazyLock<[u32; 256]> = LazyLock::new(|| {
    let mut table = [0u32; 256];
    for (i, slot) in table.iter_mut().enumerate() {
        let mut crc = i as u32;
        for _ in 0..8 {
            crc = if crc & 1 == 1 {
                (crc >> 1) ^ CASTAGNOLI
            } else {
                crc >> 1
            };
        }
        *slot = crc;
    }
    table
});

/// CRC32C of `value`, widened to the `int64` Cloud KMS uses for its
/// `*_crc32c` fields.
pub fn compute_checksum(value: &[u8]) -> i64 {
    let table = &*CRC32C_TABLE;
    let crc = value.iter().fold(!0u32, |crc, byte| {
        table[((crc ^ *byte as u32) & 0xFF) as usize] ^ (crc >> 8)
    });
    i64::from(!crc)
}
